//! Record identifier newtypes with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A record identifier was zero or negative.
    #[error("{field} must be positive, got {value}")]
    NonPositiveId { field: &'static str, value: i64 },

    /// A stored movement type value did not map to a known variant.
    #[error("unknown movement type: {value}")]
    UnknownMovementType { value: i64 },

    /// A batch movement list was not sorted by animal id.
    #[error("movement list is not sorted by animal id (position {position})")]
    UnsortedMovements { position: usize },
}

/// Generates a validated integer ID newtype with common trait implementations.
macro_rules! define_record_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(try_from = "i64", into = "i64")]
        pub struct $name(i64);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: i64) -> Result<Self, ValidationError> {
                if id < 1 {
                    return Err(ValidationError::NonPositiveId {
                        field: $field_name,
                        value: id,
                    });
                }
                Ok(Self(id))
            }

            /// Returns the raw identifier value.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = ValidationError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_record_id!(
    /// A validated animal record identifier.
    ///
    /// Animal IDs are positive database rowids. Uniqueness is enforced at the
    /// database level.
    AnimalId, "animal ID"
);

define_record_id!(
    /// A validated movement record identifier.
    MovementId, "movement ID"
);

define_record_id!(
    /// A validated owner record identifier.
    OwnerId, "owner ID"
);
