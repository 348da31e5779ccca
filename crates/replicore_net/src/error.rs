//! Error types for the replication core.

use thiserror::Error;

/// Errors that can occur while encoding, decoding or registering
/// replicated state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReplicationError {
    /// A read or rewrite touched a byte offset outside the buffer.
    #[error("codec out of range: offset {offset} with {requested} bytes requested, buffer holds {size}")]
    CodecOutOfRange {
        /// Byte offset the operation attempted to touch.
        offset: usize,
        /// Number of bytes the operation tried to read or rewrite.
        requested: usize,
        /// Current size of the buffer.
        size: usize,
    },

    /// A snapshot referenced an entity type hash with no matching
    /// registration.
    #[error("unknown entity type: hash {0}")]
    UnknownEntityType(u32),

    /// An entity type was registered with an invalid field list.
    #[error("registration error for entity type '{name}': {reason}")]
    RegistrationError {
        /// Name of the entity type being registered.
        name: String,
        /// Human-readable reason the registration was rejected.
        reason: String,
    },

    /// A client's acknowledged input signature is older than the
    /// oldest entry still held in local history.
    #[error("stale frame: input signature {input_sig} is older than oldest retained {oldest}")]
    StaleFrame {
        /// Input signature the client referenced.
        input_sig: u32,
        /// Oldest input signature still present in history.
        oldest: u32,
    },

    /// An array-typed field exceeded the maximum encodable length.
    #[error("array too long: field '{field}' has {len} elements, max is {max}")]
    ArrayTooLong {
        /// Name of the offending field.
        field: String,
        /// Length the caller attempted to encode.
        len: usize,
        /// Maximum length the wire format allows.
        max: usize,
    },

    /// A delta snapshot was requested but no reference (previous) snapshot
    /// is available to diff against. Never raised by this crate's own
    /// delta policy, which falls back to a full snapshot instead of
    /// erroring when no reference is held — kept as public surface for a
    /// caller that wants to enforce delta-or-fail itself.
    #[error("no reference snapshot available for delta encoding")]
    NoReferenceSnapshot,

    /// A field was declared with a type tag the codec has no case for.
    /// [`FieldType`](crate::registry::FieldType) is an exhaustive enum
    /// covering every wire tag the codec understands, so the registry and
    /// snapshot codec never raise this themselves; [`crate::event::EventRegistry`]
    /// does, when an event's parameter list is encoded with a value whose
    /// type doesn't match what was declared at registration.
    #[error("unsupported field type: {0}")]
    UnsupportedType(u8),
}

/// Result type for replication operations.
pub type ReplicationResult<T> = Result<T, ReplicationError>;
