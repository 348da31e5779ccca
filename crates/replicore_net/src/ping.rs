//! Round-trip time bookkeeping, kept as a small adapter helper rather
//! than core tick logic: the update controller never schedules pings
//! itself, but a transport adapter wiring ticks into the wire needs
//! somewhere to keep this state, so it is provided ready-made.

/// Tracks one peer's outstanding ping request, measured interval, and
/// loss count.
#[derive(Debug, Clone)]
pub struct PingTracker {
    interval_ticks: u32,
    timeout_ticks: u32,
    ticks_since_last: u32,
    outstanding: Option<PendingPing>,
    lost_packets: u32,
    last_rtt_ticks: u32,
}

#[derive(Debug, Clone, Copy)]
struct PendingPing {
    signature: u32,
    sent_at_tick: u64,
}

impl PingTracker {
    /// Creates a tracker that pings every `interval_ticks` and considers
    /// a request lost after `timeout_ticks` without a response.
    #[must_use]
    pub fn new(interval_ticks: u32, timeout_ticks: u32) -> Self {
        Self {
            interval_ticks,
            timeout_ticks,
            ticks_since_last: 0,
            outstanding: None,
            lost_packets: 0,
            last_rtt_ticks: 0,
        }
    }

    /// Called once per tick. Returns `Some(signature)` when a new ping
    /// request should be sent this tick, and marks the previous request
    /// lost if it timed out without a response.
    pub fn tick(&mut self, current_tick: u64) -> Option<u32> {
        if let Some(pending) = self.outstanding {
            let elapsed = current_tick.saturating_sub(pending.sent_at_tick);
            if elapsed >= u64::from(self.timeout_ticks) {
                self.lost_packets += 1;
                self.outstanding = None;
            }
        }

        if self.outstanding.is_some() {
            return None;
        }

        self.ticks_since_last += 1;
        if self.ticks_since_last < self.interval_ticks {
            return None;
        }
        self.ticks_since_last = 0;
        let signature = pending_signature(current_tick);
        self.outstanding = Some(PendingPing {
            signature,
            sent_at_tick: current_tick,
        });
        Some(signature)
    }

    /// Records a ping response, computing the round-trip tick count and
    /// clearing the outstanding request. Returns `None` if `signature`
    /// does not match the currently outstanding request (a stale or
    /// duplicate reply).
    pub fn on_response(&mut self, signature: u32, current_tick: u64) -> Option<u32> {
        let pending = self.outstanding?;
        if pending.signature != signature {
            return None;
        }
        let rtt = (current_tick.saturating_sub(pending.sent_at_tick)) as u32;
        self.last_rtt_ticks = rtt;
        self.outstanding = None;
        Some(rtt)
    }

    /// Most recently measured round-trip time, in ticks.
    #[must_use]
    pub fn last_rtt_ticks(&self) -> u32 {
        self.last_rtt_ticks
    }

    /// Count of requests that timed out without a response.
    #[must_use]
    pub fn lost_packets(&self) -> u32 {
        self.lost_packets
    }
}

fn pending_signature(tick: u64) -> u32 {
    (tick & u64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pings_fire_on_interval_and_not_while_outstanding() {
        let mut tracker = PingTracker::new(3, 10);
        assert!(tracker.tick(0).is_none());
        assert!(tracker.tick(1).is_none());
        let sig = tracker.tick(2).expect("interval elapsed");
        assert!(tracker.tick(3).is_none(), "still outstanding");
        tracker.on_response(sig, 4);
        assert_eq!(tracker.last_rtt_ticks(), 2);
    }

    #[test]
    fn timeout_counts_as_lost() {
        let mut tracker = PingTracker::new(1, 2);
        tracker.tick(0);
        tracker.tick(1);
        tracker.tick(2); // timeout reached, request considered lost
        assert_eq!(tracker.lost_packets(), 1);
    }
}
