//! Placement movement events and their batch partitioning.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::types::{AnimalId, MovementId, OwnerId, ValidationError};

/// Movement types as the single source of truth for the stored values.
///
/// The discriminants are the values persisted in the movement table, so they
/// must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum MovementType {
    /// A reservation-only record with no executed movement.
    Reservation = 0,
    Adoption = 1,
    Foster = 2,
    Transfer = 3,
    Escaped = 4,
    Reclaimed = 5,
    Stolen = 6,
    Released = 7,
    Retailer = 8,
}

impl MovementType {
    /// The stored integer value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self as i64
    }

    /// Maps a stored integer value back to a variant.
    pub const fn from_i64(value: i64) -> Result<Self, ValidationError> {
        match value {
            0 => Ok(Self::Reservation),
            1 => Ok(Self::Adoption),
            2 => Ok(Self::Foster),
            3 => Ok(Self::Transfer),
            4 => Ok(Self::Escaped),
            5 => Ok(Self::Reclaimed),
            6 => Ok(Self::Stolen),
            7 => Ok(Self::Released),
            8 => Ok(Self::Retailer),
            _ => Err(ValidationError::UnknownMovementType { value }),
        }
    }

    /// Human-facing label, used as the base of display locations.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Reservation => "Reservation",
            Self::Adoption => "Adoption",
            Self::Foster => "Foster",
            Self::Transfer => "Transfer",
            Self::Escaped => "Escaped",
            Self::Reclaimed => "Reclaimed",
            Self::Stolen => "Stolen",
            Self::Released => "Released",
            Self::Retailer => "Retailer",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for MovementType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reservation" | "none" => Ok(Self::Reservation),
            "adoption" => Ok(Self::Adoption),
            "foster" => Ok(Self::Foster),
            "transfer" => Ok(Self::Transfer),
            "escaped" => Ok(Self::Escaped),
            "reclaimed" => Ok(Self::Reclaimed),
            "stolen" => Ok(Self::Stolen),
            "released" => Ok(Self::Released),
            "retailer" => Ok(Self::Retailer),
            _ => Err(ValidationError::UnknownMovementType { value: -1 }),
        }
    }
}

/// A placement event for one animal.
///
/// Movements are append-mostly: collaborators outside this crate insert and
/// edit them, the engine only reads them. A movement with no movement date has
/// not been executed yet (a bare reservation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movement {
    pub id: MovementId,
    pub animal_id: AnimalId,
    pub owner_id: Option<OwnerId>,
    pub owner_name: Option<String>,
    pub movement_type: MovementType,
    pub movement_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub is_trial: bool,
    pub is_permanent_foster: bool,
    pub reservation_date: Option<NaiveDate>,
    pub reservation_cancelled_date: Option<NaiveDate>,
}

/// A movement list pre-sorted by animal id, partitionable per animal.
///
/// Batch sweeps load the whole working set's movements in one query and hand
/// each animal its own slice. The sort order is a hard precondition of the
/// partitioning, so the constructor verifies it instead of trusting callers.
#[derive(Debug, Clone, Copy)]
pub struct MovementsByAnimal<'a> {
    movements: &'a [Movement],
}

impl<'a> MovementsByAnimal<'a> {
    /// Wraps a movement list, verifying it is sorted by animal id ascending.
    pub fn new(movements: &'a [Movement]) -> Result<Self, ValidationError> {
        for (position, pair) in movements.windows(2).enumerate() {
            if pair[0].animal_id > pair[1].animal_id {
                return Err(ValidationError::UnsortedMovements {
                    position: position + 1,
                });
            }
        }
        Ok(Self { movements })
    }

    /// Returns the contiguous slice of movements for one animal.
    #[must_use]
    pub fn for_animal(&self, animal_id: AnimalId) -> &'a [Movement] {
        let start = self
            .movements
            .partition_point(|m| m.animal_id < animal_id);
        let end = self
            .movements
            .partition_point(|m| m.animal_id <= animal_id);
        &self.movements[start..end]
    }

    /// Total number of movements across all animals.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.movements.len()
    }

    /// Returns true if the list holds no movements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn movement(id: i64, animal_id: i64) -> Movement {
        Movement {
            id: MovementId::new(id).unwrap(),
            animal_id: AnimalId::new(animal_id).unwrap(),
            owner_id: None,
            owner_name: None,
            movement_type: MovementType::Adoption,
            movement_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            return_date: None,
            is_trial: false,
            is_permanent_foster: false,
            reservation_date: None,
            reservation_cancelled_date: None,
        }
    }

    #[test]
    fn movement_type_roundtrips_stored_values() {
        for value in 0..=8 {
            let parsed = MovementType::from_i64(value).expect("known type");
            assert_eq!(parsed.as_i64(), value);
        }
        assert!(MovementType::from_i64(9).is_err());
        assert!(MovementType::from_i64(-1).is_err());
    }

    #[test]
    fn movement_type_parses_names() {
        assert_eq!(
            "foster".parse::<MovementType>().unwrap(),
            MovementType::Foster
        );
        assert_eq!(
            "none".parse::<MovementType>().unwrap(),
            MovementType::Reservation
        );
        assert!("carried".parse::<MovementType>().is_err());
    }

    #[test]
    fn partition_rejects_unsorted_input() {
        let movements = vec![movement(1, 5), movement(2, 3)];
        let err = MovementsByAnimal::new(&movements).unwrap_err();
        assert_eq!(err, ValidationError::UnsortedMovements { position: 1 });
    }

    #[test]
    fn partition_slices_by_animal() {
        let movements = vec![
            movement(1, 2),
            movement(2, 2),
            movement(3, 7),
            movement(4, 9),
        ];
        let by_animal = MovementsByAnimal::new(&movements).unwrap();

        assert_eq!(by_animal.for_animal(AnimalId::new(2).unwrap()).len(), 2);
        assert_eq!(by_animal.for_animal(AnimalId::new(7).unwrap()).len(), 1);
        assert!(by_animal.for_animal(AnimalId::new(4).unwrap()).is_empty());
        assert_eq!(by_animal.len(), 4);
    }

    #[test]
    fn partition_accepts_empty_list() {
        let by_animal = MovementsByAnimal::new(&[]).unwrap();
        assert!(by_animal.is_empty());
        assert!(by_animal.for_animal(AnimalId::new(1).unwrap()).is_empty());
    }
}
