//! Typed replicated events: a declared, ordered parameter-type list per
//! event code, encoded without a change mask since every event carries
//! its full parameter list.

use crate::codec::Buffer;
use crate::error::{ReplicationError, ReplicationResult};
use crate::registry::{FieldType, FieldValue};
use std::collections::HashMap;

/// One dispatched event: its declared type code and parameter values.
#[derive(Debug, Clone, PartialEq)]
pub struct NetEvent {
    /// The event's registered type code.
    pub code: u16,
    /// Parameter values, in the order declared at registration.
    pub params: Vec<FieldValue>,
}

/// Declares the parameter shape for one event type code.
#[derive(Debug, Clone)]
struct EventTypeDescriptor {
    param_types: Vec<FieldType>,
}

/// Registry of known event type codes and their declared parameter
/// shapes, mirroring how the entity-type registry fixes a field list at
/// registration time.
#[derive(Debug, Default)]
pub struct EventRegistry {
    by_code: HashMap<u16, EventTypeDescriptor>,
}

impl EventRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an event code with its ordered parameter type list.
    pub fn register(&mut self, code: u16, param_types: Vec<FieldType>) -> ReplicationResult<()> {
        if self.by_code.contains_key(&code) {
            return Err(ReplicationError::RegistrationError {
                name: format!("event {code}"),
                reason: "event code already registered".to_string(),
            });
        }
        self.by_code.insert(code, EventTypeDescriptor { param_types });
        Ok(())
    }

    /// Encodes `event`, validating its parameter count and types against
    /// the declaration for `event.code`.
    pub fn encode(&self, event: &NetEvent, into: &mut Buffer) -> ReplicationResult<()> {
        let descriptor = self.by_code.get(&event.code).ok_or_else(|| {
            ReplicationError::RegistrationError {
                name: format!("event {}", event.code),
                reason: "event code not registered".to_string(),
            }
        })?;
        if descriptor.param_types.len() != event.params.len() {
            return Err(ReplicationError::RegistrationError {
                name: format!("event {}", event.code),
                reason: format!(
                    "expected {} params, got {}",
                    descriptor.param_types.len(),
                    event.params.len()
                ),
            });
        }
        into.write_u16(event.code);
        for (expected, value) in descriptor.param_types.iter().zip(event.params.iter()) {
            if *expected != value.field_type() {
                return Err(ReplicationError::UnsupportedType(0));
            }
            value.encode("event-param", into)?;
        }
        Ok(())
    }

    /// Decodes an event previously written by [`Self::encode`].
    pub fn decode(&self, from: &mut Buffer) -> ReplicationResult<NetEvent> {
        let code = from.read_u16()?;
        let descriptor = self
            .by_code
            .get(&code)
            .ok_or(ReplicationError::RegistrationError {
                name: format!("event {code}"),
                reason: "event code not registered".to_string(),
            })?;
        let mut params = Vec::with_capacity(descriptor.param_types.len());
        for field_type in &descriptor.param_types {
            params.push(FieldValue::decode(*field_type, from)?);
        }
        Ok(NetEvent { code, params })
    }

    /// Encodes a full event packet: a `u16` count followed by each
    /// event's `(code, typed params)` in order, for best-effort delivery
    /// to clients as a single batch.
    pub fn encode_packet(&self, events: &[NetEvent], into: &mut Buffer) -> ReplicationResult<()> {
        into.write_u16(u16::try_from(events.len()).unwrap_or(u16::MAX));
        for event in events {
            self.encode(event, into)?;
        }
        Ok(())
    }

    /// Decodes a full event packet previously written by
    /// [`Self::encode_packet`].
    pub fn decode_packet(&self, from: &mut Buffer) -> ReplicationResult<Vec<NetEvent>> {
        let count = from.read_u16()?;
        let mut events = Vec::with_capacity(count as usize);
        for _ in 0..count {
            events.push(self.decode(from)?);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_round_trips_through_registered_shape() {
        let mut registry = EventRegistry::new();
        registry
            .register(7, vec![FieldType::U32, FieldType::String])
            .unwrap();

        let event = NetEvent {
            code: 7,
            params: vec![
                FieldValue::U32(42),
                FieldValue::String("boom".to_string()),
            ],
        };

        let mut buf = Buffer::new();
        registry.encode(&event, &mut buf).unwrap();
        let mut read = Buffer::from_bytes(buf.into_bytes());
        let decoded = registry.decode(&mut read).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn wrong_param_count_is_rejected() {
        let mut registry = EventRegistry::new();
        registry.register(1, vec![FieldType::Bool]).unwrap();
        let event = NetEvent {
            code: 1,
            params: vec![],
        };
        let mut buf = Buffer::new();
        assert!(registry.encode(&event, &mut buf).is_err());
    }

    #[test]
    fn packet_round_trips_multiple_events() {
        let mut registry = EventRegistry::new();
        registry.register(1, vec![FieldType::Bool]).unwrap();
        registry.register(2, vec![]).unwrap();

        let events = vec![
            NetEvent {
                code: 1,
                params: vec![FieldValue::Bool(true)],
            },
            NetEvent {
                code: 2,
                params: vec![],
            },
        ];

        let mut buf = Buffer::new();
        registry.encode_packet(&events, &mut buf).unwrap();
        let mut read = Buffer::from_bytes(buf.into_bytes());
        let decoded = registry.decode_packet(&mut read).unwrap();
        assert_eq!(decoded, events);
    }
}
