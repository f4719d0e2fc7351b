//! Time-in-care and age calculations.
//!
//! Pure date arithmetic over fact rows and movement histories: elapsed days
//! in care (current stay and cumulative), age brackets, and the readable
//! period strings persisted alongside the day counts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::animal::AnimalFacts;
use crate::movement::{Movement, MovementType};

/// Calendar days between two dates, negative when `end` precedes `start`.
#[must_use]
pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// An animal's age in days at `as_of`.
#[must_use]
pub fn age_in_days(date_of_birth: NaiveDate, as_of: NaiveDate) -> i64 {
    days_between(date_of_birth, as_of)
}

/// One age bracket: the first band whose threshold covers the age wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeBand {
    pub label: String,
    pub threshold_years: f64,
}

/// Ordered age brackets, evaluated ascending by threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgeGroupBands(Vec<AgeBand>);

impl AgeGroupBands {
    /// Wraps a band list in its configured order.
    #[must_use]
    pub const fn new(bands: Vec<AgeBand>) -> Self {
        Self(bands)
    }

    /// Returns the label of the first band covering an age in days.
    ///
    /// Empty string when the age falls past every band.
    #[must_use]
    pub fn group_for_days(&self, age_days: i64) -> &str {
        #[expect(clippy::cast_precision_loss, reason = "ages in days stay far below 2^52")]
        let age = age_days as f64;
        self.0
            .iter()
            .find(|band| age <= band.threshold_years * 365.0)
            .map_or("", |band| band.label.as_str())
    }

    /// Returns the bracket label for a birth date at `as_of`.
    #[must_use]
    pub fn group_for(&self, date_of_birth: NaiveDate, as_of: NaiveDate) -> &str {
        self.group_for_days(age_in_days(date_of_birth, as_of))
    }
}

impl Default for AgeGroupBands {
    fn default() -> Self {
        Self(vec![
            AgeBand {
                label: "Baby".to_string(),
                threshold_years: 0.5,
            },
            AgeBand {
                label: "Young Adult".to_string(),
                threshold_years: 2.0,
            },
            AgeBand {
                label: "Adult".to_string(),
                threshold_years: 7.0,
            },
            AgeBand {
                label: "Senior".to_string(),
                threshold_years: 50.0,
            },
        ])
    }
}

/// The stop date for elapsed-time calculations.
///
/// Deceased on premises stops the clock at death; off premises stops it at
/// the departure. Otherwise time keeps accruing until `today`.
fn care_stop_date(facts: &AnimalFacts, today: NaiveDate) -> NaiveDate {
    if let Some(deceased) = facts.deceased_date {
        if !facts.died_off_shelter {
            return deceased;
        }
    }
    if facts.archived {
        if let Some(moved) = facts.active_movement_date {
            return moved;
        }
    }
    today
}

/// Days in care for the current stay, from the most recent entry.
#[must_use]
pub fn days_in_care(facts: &AnimalFacts, today: NaiveDate) -> i64 {
    days_between(facts.most_recent_entry_date, care_stop_date(facts, today))
}

/// Cumulative days in care across all stays.
///
/// Counts from first intake to the stop date, deducting every closed exit
/// stay. Foster placements are not deducted. The movement list may be a
/// shared batch load; rows are matched by animal id, never taken
/// positionally.
#[must_use]
pub fn total_days_in_care(facts: &AnimalFacts, movements: &[Movement], today: NaiveDate) -> i64 {
    let mut days = days_between(facts.date_brought_in, care_stop_date(facts, today));

    for movement in movements {
        if movement.animal_id != facts.id {
            continue;
        }
        if matches!(
            movement.movement_type,
            MovementType::Reservation | MovementType::Foster
        ) {
            continue;
        }
        if let (Some(moved), Some(ret)) = (movement.movement_date, movement.return_date) {
            days -= days_between(moved, ret);
        }
    }

    days
}

/// Formats a day count as a readable period, eg "6 weeks and 3 days".
#[must_use]
pub fn format_period(days: i64) -> String {
    fn unit(value: i64, singular: &str) -> String {
        if value == 1 {
            format!("1 {singular}")
        } else {
            format!("{value} {singular}s")
        }
    }

    fn pair(major: i64, major_name: &str, minor: i64, minor_name: &str) -> String {
        if minor == 0 {
            unit(major, major_name)
        } else {
            format!(
                "{} and {}",
                unit(major, major_name),
                unit(minor, minor_name)
            )
        }
    }

    if days < 0 {
        return "0 days".to_string();
    }
    if days < 7 {
        return unit(days, "day");
    }
    if days < 182 {
        return pair(days / 7, "week", days % 7, "day");
    }
    if days < 365 {
        return pair(days / 30, "month", (days % 30) / 7, "week");
    }
    pair(days / 365, "year", (days % 365) / 30, "month")
}

/// The derived care fields for one animal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CareBundle {
    pub days_on_shelter: i64,
    pub total_days_on_shelter: i64,
    pub time_on_shelter: String,
    pub total_time_on_shelter: String,
    pub animal_age: String,
    pub age_group: String,
    pub age_group_active_movement: String,
}

impl CareBundle {
    /// Returns true if any stored care field differs from this bundle.
    #[must_use]
    pub fn differs_from(&self, facts: &AnimalFacts) -> bool {
        facts.days_on_shelter != self.days_on_shelter
            || facts.total_days_on_shelter != self.total_days_on_shelter
            || facts.time_on_shelter != self.time_on_shelter
            || facts.total_time_on_shelter != self.total_time_on_shelter
            || facts.animal_age != self.animal_age
            || facts.age_group != self.age_group
            || facts.age_group_active_movement != self.age_group_active_movement
    }

    /// Writes the bundle back onto an in-memory fact row.
    pub fn apply_to(&self, facts: &mut AnimalFacts) {
        facts.days_on_shelter = self.days_on_shelter;
        facts.total_days_on_shelter = self.total_days_on_shelter;
        facts.time_on_shelter.clone_from(&self.time_on_shelter);
        facts
            .total_time_on_shelter
            .clone_from(&self.total_time_on_shelter);
        facts.animal_age.clone_from(&self.animal_age);
        facts.age_group.clone_from(&self.age_group);
        facts
            .age_group_active_movement
            .clone_from(&self.age_group_active_movement);
    }
}

/// Computes the full set of care fields for one animal.
///
/// Age stops accruing at death. The at-entry age group uses the most recent
/// entry date; the at-departure group uses the active movement date when one
/// exists.
#[must_use]
pub fn compute_care(
    facts: &AnimalFacts,
    movements: &[Movement],
    bands: &AgeGroupBands,
    today: NaiveDate,
) -> CareBundle {
    let days = days_in_care(facts, today);
    let total_days = total_days_in_care(facts, movements, today);
    let age_stop = facts.deceased_date.unwrap_or(today);

    CareBundle {
        days_on_shelter: days,
        total_days_on_shelter: total_days,
        time_on_shelter: format_period(days),
        total_time_on_shelter: format_period(total_days),
        animal_age: format_period(age_in_days(facts.date_of_birth, age_stop)),
        age_group: bands
            .group_for(facts.date_of_birth, facts.most_recent_entry_date)
            .to_string(),
        age_group_active_movement: bands
            .group_for(
                facts.date_of_birth,
                facts.active_movement_date.unwrap_or(today),
            )
            .to_string(),
    }
}
