//! Animal fact rows and their stored derived fields.

use chrono::NaiveDate;

use crate::movement::MovementType;
use crate::types::{AnimalId, MovementId};

/// One animal's facts plus the denormalized fields the engine maintains.
///
/// The plain facts are written at intake by collaborators outside this crate.
/// Everything from `archived` down is owned by the status resolver and the
/// care calculator and is overwritten on every recompute.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimalFacts {
    pub id: AnimalId,
    pub name: String,

    /// Human-facing identifying code, unique across all animals.
    pub code: String,
    pub short_code: String,

    pub animal_type: String,
    pub species: String,
    pub entry_category: String,

    pub date_of_birth: NaiveDate,
    pub date_brought_in: NaiveDate,
    pub deceased_date: Option<NaiveDate>,
    pub put_to_sleep: bool,

    /// Death reason name, qualifies the deceased display location when the
    /// animal was put to sleep.
    pub death_reason: Option<String>,
    pub died_off_shelter: bool,

    /// Non-shelter records (owned animals, templates) are never on premises.
    pub non_shelter: bool,

    /// Physical location, used for display when no movement is active.
    pub location_name: String,
    pub location_unit: Option<String>,

    // Derived status fields, owned by the resolver.
    pub archived: bool,
    pub active_movement_id: Option<MovementId>,
    pub active_movement_date: Option<NaiveDate>,
    pub active_movement_type: Option<MovementType>,
    pub active_movement_return: Option<NaiveDate>,
    pub has_active_reserve: bool,
    pub has_trial_adoption: bool,
    pub has_permanent_foster: bool,
    pub most_recent_entry_date: NaiveDate,
    pub display_location: String,

    // Derived care fields, owned by the calculator.
    pub days_on_shelter: i64,
    pub total_days_on_shelter: i64,
    pub time_on_shelter: String,
    pub total_time_on_shelter: String,
    pub animal_age: String,
    pub age_group: String,
    pub age_group_active_movement: String,
}

impl AnimalFacts {
    /// Whether the animal is currently in the shelter's care on premises.
    #[must_use]
    pub const fn on_shelter(&self) -> bool {
        !self.archived && !self.non_shelter
    }
}
