//! The per-tick update controller: owns the snapshot being built during a
//! frame, accumulates events, and exposes an explicit two-phase
//! `start_tick`/`finish_tick` lifecycle rather than a deferred callback —
//! the adapter driving the tick loop is responsible for invoking
//! `finish_tick` itself.

use crate::event::NetEvent;
use crate::registry::EntityTypeRegistry;
use crate::snapshot::{EntityRecord, Snapshot};
use std::collections::HashMap;

/// The result of finishing a tick: the completed snapshot and the events
/// accumulated while it was being built. The caller is responsible for
/// encoding and sending the snapshot, dispatching the events, and
/// flushing any dirty custom properties — this struct only carries the
/// data those steps need.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedTick {
    /// The snapshot built during the tick.
    pub snapshot: Snapshot,
    /// Events pushed during the tick, in push order.
    pub events: Vec<NetEvent>,
}

/// Builds one snapshot per tick and accumulates events pushed during it.
#[derive(Debug)]
pub struct UpdateController {
    next_signature: u32,
    building: Option<Snapshot>,
    events: Vec<NetEvent>,
}

impl Default for UpdateController {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateController {
    /// Creates a controller with its signature counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_signature: 0,
            building: None,
            events: Vec::new(),
        }
    }

    /// True while a tick is being built (between `start_tick` and
    /// `finish_tick`).
    #[must_use]
    pub fn is_building(&self) -> bool {
        self.building.is_some()
    }

    /// The signature of the snapshot currently being built, or the next
    /// one to be assigned if no tick is in progress.
    #[must_use]
    pub fn signature(&self) -> u32 {
        self.building
            .as_ref()
            .map_or(self.next_signature, |s| s.signature)
    }

    /// Begins building a new snapshot for `input_sig` (the input
    /// signature this tick consumed). Assigns the next snapshot
    /// signature, pre-populates the snapshot with an empty collection for
    /// every type in `registered_types` so that decoding on the other end
    /// never has to invent a type it hasn't seen an entity for yet, and
    /// clears any events left over from a prior tick that was never
    /// finished. Returns the assigned tick id (the snapshot signature).
    pub fn start_tick(&mut self, registered_types: &EntityTypeRegistry, input_sig: u32) -> u32 {
        self.next_signature += 1;
        let mut snapshot = Snapshot::new(self.next_signature, input_sig);
        for descriptor in registered_types.iter_ordered() {
            snapshot.entities.entry(descriptor.name_hash).or_insert_with(HashMap::new);
        }
        self.building = Some(snapshot);
        self.events.clear();
        self.next_signature
    }

    /// Adds or replaces an entity in the snapshot under construction.
    /// Idempotent on the entity's uid: calling this twice for the same
    /// uid within one tick overwrites the first value rather than
    /// duplicating the entity.
    ///
    /// Panics if called outside a `start_tick`/`finish_tick` pair —
    /// callers only ever invoke this from inside a tick.
    pub fn add_to_snapshot(&mut self, type_hash: u32, record: EntityRecord) {
        self.building
            .as_mut()
            .expect("add_to_snapshot called outside a tick")
            .add_entity(type_hash, record);
    }

    /// Accumulates an event to be dispatched when the tick finishes.
    pub fn push_event(&mut self, event: NetEvent) {
        self.events.push(event);
    }

    /// Ends the tick, returning the completed snapshot and accumulated
    /// events. The caller drives every subsequent step (encode, send,
    /// dispatch events, flush custom properties) explicitly.
    ///
    /// Panics if called without a matching `start_tick`.
    pub fn finish_tick(&mut self) -> FinishedTick {
        let snapshot = self
            .building
            .take()
            .expect("finish_tick called without start_tick");
        FinishedTick {
            snapshot,
            events: std::mem::take(&mut self.events),
        }
    }

    /// Resets the controller to its initial state, discarding any
    /// in-progress tick.
    pub fn reset(&mut self) {
        self.next_signature = 0;
        self.building = None;
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FieldSpec, FieldType, FieldValue};

    fn empty_registry() -> EntityTypeRegistry {
        EntityTypeRegistry::new()
    }

    #[test]
    fn add_to_snapshot_is_idempotent_on_uid() {
        let registry = empty_registry();
        let mut ctl = UpdateController::new();
        ctl.start_tick(&registry, 1);
        ctl.add_to_snapshot(
            10,
            EntityRecord {
                uid: 1,
                class_hash: None,
                fields: vec![FieldValue::U8(1)],
            },
        );
        ctl.add_to_snapshot(
            10,
            EntityRecord {
                uid: 1,
                class_hash: None,
                fields: vec![FieldValue::U8(2)],
            },
        );
        let finished = ctl.finish_tick();
        assert_eq!(finished.snapshot.entities[&10].len(), 1);
        assert_eq!(
            finished.snapshot.entities[&10][&1].fields[0],
            FieldValue::U8(2)
        );
    }

    #[test]
    fn events_reset_between_ticks() {
        let registry = empty_registry();
        let mut ctl = UpdateController::new();
        ctl.start_tick(&registry, 1);
        ctl.push_event(NetEvent {
            code: 1,
            params: vec![],
        });
        let first = ctl.finish_tick();
        assert_eq!(first.events.len(), 1);

        ctl.start_tick(&registry, 2);
        let second = ctl.finish_tick();
        assert!(second.events.is_empty());
    }

    #[test]
    fn signature_increments_each_tick() {
        let registry = empty_registry();
        let mut ctl = UpdateController::new();
        assert_eq!(ctl.start_tick(&registry, 1), 1);
        assert_eq!(ctl.signature(), 1);
        ctl.finish_tick();
        assert_eq!(ctl.start_tick(&registry, 2), 2);
        assert_eq!(ctl.signature(), 2);
    }

    #[test]
    fn start_tick_prepopulates_registered_types() {
        let mut registry = empty_registry();
        let hash = registry
            .register("Player", vec![FieldSpec::exact("hp", FieldType::U8)], false)
            .unwrap();
        let mut ctl = UpdateController::new();
        ctl.start_tick(&registry, 1);
        let finished = ctl.finish_tick();
        assert!(finished.snapshot.entities.contains_key(&hash));
        assert!(finished.snapshot.entities[&hash].is_empty());
    }
}
