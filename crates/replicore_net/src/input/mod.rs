//! Per-player input buffers: a server-side cache keyed by input
//! signature, and a client-side ordered buffer of locally-generated
//! input awaiting acknowledgment.

mod codec;

pub use codec::{InputCodec, InputFieldSpec, InputFieldValue};

use replicore_types::Vec2;
use std::collections::HashMap;

/// One tick's worth of a single player's input: the registered named
/// fields that were set, keyed by name, plus the two mouse-delta fields
/// the codec may carry outside the registered field list. Fields absent
/// from the map were not pressed/moved and decode back to their default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    /// Signature identifying this input relative to others from the same
    /// player.
    pub signature: u32,
    /// Mouse movement since the previous poll, present only when the
    /// codec is configured with `use_mouse_relative`.
    pub mouse_relative: Option<Vec2>,
    /// Instantaneous mouse speed, present only when the codec is
    /// configured with `use_mouse_speed`.
    pub mouse_speed: Option<Vec2>,
    /// Set fields, keyed by the name they were registered under.
    pub values: HashMap<String, InputFieldValue>,
}

impl InputState {
    /// An input state carrying no set fields — used as the "no input
    /// this tick" placeholder rather than omitting the tick entirely.
    #[must_use]
    pub fn empty(signature: u32) -> Self {
        Self {
            signature,
            mouse_relative: None,
            mouse_speed: None,
            values: HashMap::new(),
        }
    }

    /// True iff any analog value is non-zero, any bool is pressed, any
    /// custom vector is non-zero, or any mouse delta is non-zero —
    /// exactly the condition under which the codec writes a non-empty
    /// body rather than just the `has_input` flag.
    #[must_use]
    pub fn has_input(&self) -> bool {
        let mouse_moved = |v: Option<Vec2>| v.is_some_and(|v| v.x != 0.0 || v.y != 0.0);
        if mouse_moved(self.mouse_relative) || mouse_moved(self.mouse_speed) {
            return true;
        }
        self.values.values().any(|v| match v {
            InputFieldValue::Bool(b) => *b,
            InputFieldValue::Analog(a) => *a != 0.0,
            InputFieldValue::Vec2(v) => v.x != 0.0 || v.y != 0.0,
            InputFieldValue::Vec3(v) => v.x != 0.0 || v.y != 0.0 || v.z != 0.0,
        })
    }
}

/// Server-side store of input received from clients, keyed by input
/// signature rather than ordered, since input can arrive out of order or
/// duplicated over an unreliable transport.
#[derive(Debug, Default)]
pub struct ServerInputCache {
    buffer: HashMap<u32, InputState>,
    /// The input signature most recently handed out by [`Self::take_next`].
    /// An arrival with a signature at or below this is a duplicate or
    /// reordered packet for input already consumed, and is discarded on
    /// insert rather than stored.
    last_used_sig: u32,
    /// Maps a snapshot signature to the input signature consumed to
    /// produce it, so that later an ack for that snapshot can be
    /// translated back into an input ack.
    snap_to_input: HashMap<u32, u32>,
    /// Count of consecutive snapshots built from empty input that the
    /// client has not yet acknowledged. While positive, the per-client
    /// policy (see [`crate::client::ClientTracker`]) prefers sending a
    /// full snapshot over a delta, since there is no guarantee the
    /// client's reference snapshot is still valid.
    no_input_count: u32,
    last_ack_snap: u32,
}

impl ServerInputCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The input signature most recently consumed by [`Self::take_next`].
    #[must_use]
    pub fn last_used_sig(&self) -> u32 {
        self.last_used_sig
    }

    /// Stores input received from a client, keyed by its own signature.
    /// Arrivals at or below [`Self::last_used_sig`] are stale — input for
    /// that tick has already been consumed — and are silently dropped
    /// rather than inserted, tolerating out-of-order and duplicate
    /// delivery over an unreliable transport.
    pub fn cache_remote_input(&mut self, input: InputState) {
        if input.signature <= self.last_used_sig {
            return;
        }
        self.buffer.insert(input.signature, input);
    }

    /// Returns the input at `last_used_sig + 1`, advancing the cursor and
    /// removing the entry from the buffer. Falls back to an empty input
    /// if none arrived in time (a dropped or late packet) so a single
    /// missing tick never blocks simulation from advancing.
    pub fn take_next(&mut self) -> InputState {
        self.last_used_sig += 1;
        self.buffer
            .remove(&self.last_used_sig)
            .unwrap_or_else(|| InputState::empty(self.last_used_sig))
    }

    /// Records which input signature was used to build a given snapshot.
    /// `input_sig == 0` ("no input recorded") bumps `no_input_count`; it
    /// is decremented only once the corresponding mapping is erased by
    /// [`Self::acknowledge`], per entry, not per ack call.
    pub fn associate(&mut self, snapshot_sig: u32, input_sig: u32) {
        self.snap_to_input.insert(snapshot_sig, input_sig);
        if input_sig == 0 {
            self.no_input_count += 1;
        }
    }

    /// Acknowledges a snapshot. Acking is monotonic and collapsing: acking
    /// signature `K` implies acking every signature `K' <= K`, so every
    /// `snap_to_input` entry at or below `K` is erased (decrementing
    /// `no_input_count` for each one that was built from empty input),
    /// regardless of the order acks for different `K` arrive in.
    pub fn acknowledge(&mut self, snapshot_sig: u32) {
        if snapshot_sig > self.last_ack_snap {
            self.last_ack_snap = snapshot_sig;
        }
        let stale: Vec<u32> = self
            .snap_to_input
            .keys()
            .copied()
            .filter(|sig| *sig <= snapshot_sig)
            .collect();
        for sig in stale {
            if let Some(input_sig) = self.snap_to_input.remove(&sig) {
                if input_sig == 0 && self.no_input_count > 0 {
                    self.no_input_count -= 1;
                }
            }
        }
    }

    /// True if there is an outstanding streak of unacknowledged
    /// empty-input snapshots.
    #[must_use]
    pub fn has_no_input_streak(&self) -> bool {
        self.no_input_count > 0
    }

    /// Number of snapshots awaiting acknowledgment.
    #[must_use]
    pub fn non_acked_count(&self) -> usize {
        self.snap_to_input.len()
    }

    /// The most recently acknowledged snapshot signature.
    #[must_use]
    pub fn last_ack_snap(&self) -> u32 {
        self.last_ack_snap
    }

    /// Drops every buffered input older than `input_sig`.
    pub fn clear_older(&mut self, input_sig: u32) {
        self.buffer.retain(|sig, _| *sig >= input_sig);
    }
}

/// Client-side ordered buffer of local input awaiting acknowledgment
/// from the server, used both to resend unacknowledged input and to
/// replay it during reconciliation.
#[derive(Debug, Default)]
pub struct ClientInputBuffer {
    entries: Vec<InputState>,
    last_sig: u32,
}

impl ClientInputBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates the next signature and stores the given input under it,
    /// appending to the back — callers are expected to generate input in
    /// increasing signature order.
    pub fn push_local_input(&mut self, mut input: InputState) -> u32 {
        self.last_sig += 1;
        input.signature = self.last_sig;
        self.entries.push(input);
        self.last_sig
    }

    /// All entries, in ascending signature order.
    #[must_use]
    pub fn entries(&self) -> &[InputState] {
        &self.entries
    }

    /// Entries with a signature strictly greater than `input_sig`, used
    /// to replay unacknowledged input after a reconciliation correction.
    #[must_use]
    pub fn after(&self, input_sig: u32) -> Vec<&InputState> {
        self.entries
            .iter()
            .filter(|e| e.signature > input_sig)
            .collect()
    }

    /// Removes every entry with a signature less than or equal to
    /// `input_sig` — input the server has confirmed using.
    pub fn clear_older(&mut self, input_sig: u32) {
        self.entries.retain(|e| e.signature > input_sig);
    }

    /// Number of entries still buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
