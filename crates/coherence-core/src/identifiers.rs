//! Identifier types
//!
//! Participants, components and operation models are named by callers, so
//! their identifiers wrap strings. Records and runs are minted by the system
//! and wrap UUIDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! named_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string-like value
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

named_id!(
    /// Independent consumer/producer holding a local view of shared components
    ParticipantId
);

named_id!(
    /// Named unit of shared, logically replicated data
    ComponentId
);

named_id!(
    /// Global operation model identifier
    GomId
);

/// Identity of a persisted component-state record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub Uuid);

impl RecordId {
    /// Mint a fresh record id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record-{}", self.0)
    }
}

/// Identity of one operation model run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    /// Mint a fresh instance id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance-{}", self.0)
    }
}

/// Natural key of a component-state record: one record per pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    /// Owning participant
    pub participant_id: ParticipantId,
    /// Shared component
    pub component_id: ComponentId,
}

impl RecordKey {
    /// Build a key from its parts
    pub fn new(participant_id: impl Into<ParticipantId>, component_id: impl Into<ComponentId>) -> Self {
        Self {
            participant_id: participant_id.into(),
            component_id: component_id.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.participant_id, self.component_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_ids_serialize_transparently() {
        let id = ParticipantId::new("orders");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"orders\"");
    }

    #[test]
    fn record_key_display() {
        let key = RecordKey::new("orders", "cart");
        assert_eq!(key.to_string(), "orders/cart");
    }

    #[test]
    fn record_keys_order_by_participant_then_component() {
        let a = RecordKey::new("a", "z");
        let b = RecordKey::new("b", "a");
        assert!(a < b);
    }
}
