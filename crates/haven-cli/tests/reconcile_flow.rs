//! End-to-end integration tests for the maintenance flow.
//!
//! Tests the full pipeline: intake → movement edits → reconcile sweep →
//! status summary, driving the installed binary the way a scheduled job
//! runner would.

use std::process::Command;

use chrono::NaiveDate;
use haven_core::MovementType;
use haven_db::{Database, NewAnimal, NewMovement};
use tempfile::TempDir;

fn haven_binary() -> String {
    env!("CARGO_BIN_EXE_haven").to_string()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

fn run_command(db_path: &std::path::Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(haven_binary())
        .env("HAVEN_DATABASE_PATH", db_path)
        .args(args)
        .output()
        .expect("failed to run haven");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

/// Seed a small population: one resident, one adopted out yesterday.
fn seed_population(db_path: &std::path::Path) {
    let mut db = Database::open(db_path).unwrap();
    let today = chrono::Local::now().date_naive();

    let resident = NewAnimal {
        name: "Biscuit".to_string(),
        animal_type: "Dog".to_string(),
        species: "Dog".to_string(),
        entry_category: "Stray".to_string(),
        date_of_birth: date(2022, 6, 1),
        date_brought_in: date(2024, 1, 10),
        non_shelter: false,
        location_name: "Kennel Block".to_string(),
        location_unit: Some("Pen 3".to_string()),
    };
    db.insert_animal(&resident, today).unwrap();

    let adopted = NewAnimal {
        name: "Scout".to_string(),
        ..resident
    };
    let adopted = db.insert_animal(&adopted, today).unwrap();
    let owner = db.insert_owner("Jane Doe").unwrap();
    db.insert_movement(&NewMovement {
        animal_id: adopted,
        owner_id: Some(owner),
        movement_type: MovementType::Adoption,
        movement_date: Some(today - chrono::Duration::days(1)),
        return_date: None,
        is_trial: false,
        is_permanent_foster: false,
        reservation_date: None,
        reservation_cancelled_date: None,
    })
    .unwrap();
}

#[test]
fn test_init_reports_database_path() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("haven.db");

    let (stdout, stderr, success) = run_command(&db_path, &["init"]);

    assert!(success, "haven init should succeed: {stderr}");
    assert!(stdout.starts_with("Database ready:"), "got: {stdout}");
    assert!(db_path.exists());
}

#[test]
fn test_reconcile_sweep_then_settles() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("haven.db");
    seed_population(&db_path);

    // First sweep picks up the adoption inserted after intake.
    let (stdout, stderr, success) = run_command(&db_path, &["reconcile"]);
    assert!(success, "reconcile should succeed: {stderr}");
    assert_eq!(stdout, "Reconciled 1 of 2 animal(s).\n");

    // Second sweep finds nothing to do.
    let (stdout, _, success) = run_command(&db_path, &["reconcile"]);
    assert!(success);
    assert_eq!(stdout, "Reconciled 0 of 2 animal(s).\n");
}

#[test]
fn test_reconcile_updates_derived_fields() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("haven.db");
    seed_population(&db_path);

    let (_, stderr, success) = run_command(&db_path, &["reconcile"]);
    assert!(success, "reconcile should succeed: {stderr}");

    let db = Database::open(&db_path).unwrap();
    let facts = db
        .get_animal(haven_core::AnimalId::new(2).unwrap())
        .unwrap()
        .unwrap();
    assert!(facts.archived, "adopted animal is off premises");
    assert_eq!(facts.display_location, "Adoption::Jane Doe");
    assert_eq!(facts.active_movement_type, Some(MovementType::Adoption));
}

#[test]
fn test_status_summarizes_population() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("haven.db");
    seed_population(&db_path);
    run_command(&db_path, &["reconcile"]);

    let (stdout, stderr, success) = run_command(&db_path, &["status"]);

    assert!(success, "status should succeed: {stderr}");
    assert!(stdout.contains("Animals on file: 2"), "got: {stdout}");
    assert!(stdout.contains("On shelter: 1"), "got: {stdout}");
}

#[test]
fn test_recompute_updates_care_fields() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("haven.db");
    seed_population(&db_path);
    run_command(&db_path, &["reconcile"]);

    // The adopted animal's clock stopped at its departure, so the sweep has
    // something to write for it.
    let (stdout, stderr, success) = run_command(&db_path, &["recompute"]);
    assert!(success, "recompute should succeed: {stderr}");
    assert_eq!(stdout, "Updated care fields for 1 of 2 animal(s).\n");

    let db = Database::open(&db_path).unwrap();
    let facts = db
        .get_animal(haven_core::AnimalId::new(2).unwrap())
        .unwrap()
        .unwrap();
    assert!(facts.days_on_shelter > 0);
    assert!(!facts.time_on_shelter.is_empty());
    assert!(!facts.age_group.is_empty());
}

#[test]
fn test_recode_scoped_to_shelter() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("haven.db");
    seed_population(&db_path);
    run_command(&db_path, &["reconcile"]);

    let (stdout, stderr, success) =
        run_command(&db_path, &["recode", "--target", "on-shelter"]);

    assert!(success, "recode should succeed: {stderr}");
    assert_eq!(stdout, "Reassigned codes for 1 animal(s).\n");
}
