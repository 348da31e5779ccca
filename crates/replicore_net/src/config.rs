//! Replication tuning knobs, loaded once at startup: a plain struct with
//! a validating constructor, `Default`, and `serde::Deserialize` for TOML.

use serde::Deserialize;

/// Default depth of the server's per-tick snapshot history ring buffer.
pub const DEFAULT_MAX_HISTORY: usize = 64;

/// Default depth of a client's predicted-snapshot history ring buffer.
pub const DEFAULT_MAX_CLIENT_HISTORY: usize = 32;

/// Default number of unacknowledged snapshots before forcing a full
/// resync rather than another delta.
pub const DEFAULT_FULL_SNAP_THRESHOLD: usize = 8;

/// Tuning knobs for the replication core. Construct via [`Self::new`] to
/// get the `max_history`-vs-`full_snap_threshold` invariant enforced, or
/// deserialize from TOML and call [`Self::validated`] afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Depth of the server's snapshot history ring buffer.
    pub max_history: usize,
    /// Depth of a client's predicted-snapshot history ring buffer.
    pub max_client_history: usize,
    /// Unacknowledged-snapshot count after which the server forces a
    /// full resync instead of another delta.
    pub full_snap_threshold: usize,
    /// Quantize analog input axes before sending.
    pub quantize_analog: bool,
    /// Send mouse-look as a relative delta rather than an absolute value.
    pub use_mouse_relative: bool,
    /// Include instantaneous mouse speed alongside relative motion.
    pub use_mouse_speed: bool,
    /// Broadcast measured RTT to other clients (e.g. for a scoreboard
    /// ping column) rather than keeping it server-local.
    pub broadcast_ping: bool,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            max_client_history: DEFAULT_MAX_CLIENT_HISTORY,
            full_snap_threshold: DEFAULT_FULL_SNAP_THRESHOLD,
            quantize_analog: true,
            use_mouse_relative: true,
            use_mouse_speed: false,
            broadcast_ping: false,
        }
    }
}

impl ReplicationConfig {
    /// Builds a config from the given `full_snap_threshold`, raising
    /// `max_history` to `full_snap_threshold + 1` if it would otherwise
    /// be too shallow to ever retain the oldest unacknowledged snapshot.
    #[must_use]
    pub fn new(full_snap_threshold: usize) -> Self {
        Self {
            full_snap_threshold,
            ..Default::default()
        }
        .validated()
    }

    /// Applies the same invariant a TOML-loaded config needs checked:
    /// `max_history` must exceed `full_snap_threshold`, since a history
    /// that can't hold one more entry than the forced-resync threshold
    /// would evict the very snapshot the threshold is tracking.
    #[must_use]
    pub fn validated(mut self) -> Self {
        if self.max_history <= self.full_snap_threshold {
            self.max_history = self.full_snap_threshold + 1;
        }
        self
    }
}
