//! Core domain logic for the shelter lifecycle engine.
//!
//! This crate contains the fundamental types and logic for:
//! - Status resolution: deriving an animal's lifecycle state from its
//!   movement history
//! - Time in care: elapsed-days, cumulative stays and age brackets
//! - Code generation: unique human-facing identifiers from token templates

pub mod animal;
pub mod care;
pub mod code;
pub mod movement;
pub mod status;
mod types;

pub use animal::AnimalFacts;
pub use care::{AgeBand, AgeGroupBands, CareBundle, compute_care, days_in_care, total_days_in_care};
pub use code::{CodeCounters, CodeError, CodeFormat, CodeNames, GeneratedCode, generate_code};
pub use movement::{Movement, MovementType, MovementsByAnimal};
pub use status::{
    ActiveMovement, StatusBundle, StatusConfig, resolve_population, resolve_status,
};
pub use types::{AnimalId, MovementId, OwnerId, ValidationError};
