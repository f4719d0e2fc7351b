//! Storage layer and batch reconciliation for the shelter lifecycle engine.
//!
//! Provides persistence for animals, movements and configuration using
//! `rusqlite`, plus the reconciliation sweeps that recompute the derived
//! status and care fields for whole population slices.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but
//! not `Sync`. A `Database` instance can be moved between threads but cannot
//! be shared across threads without external synchronization.
//!
//! # Schema
//!
//! Dates are stored as TEXT in ISO 8601 date format (e.g. `2024-03-01`), so
//! lexicographic ordering matches chronological ordering and values stay
//! readable in the database.
//!
//! The `record_version` column backs the optimistic check used by
//! single-record updates. Bulk reconciliation flushes deliberately bypass the
//! check (last writer wins) but still increment the version, so interactive
//! editors can detect that a sweep touched a row under them.

use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use haven_core::code::CodeError;
use haven_core::status::display_location_base;
use haven_core::{
    AgeGroupBands, AnimalFacts, AnimalId, CareBundle, CodeCounters, CodeFormat, CodeNames,
    GeneratedCode, Movement, MovementId, MovementType, MovementsByAnimal, OwnerId, StatusBundle,
    StatusConfig, ValidationError, compute_care, generate_code, resolve_population, resolve_status,
};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value failed domain validation.
    #[error("invalid stored value: {0}")]
    Domain(#[from] ValidationError),

    /// A configuration value could not be parsed.
    #[error("invalid config value for {key}: {message}")]
    Config { key: String, message: String },

    /// The configured code format cannot resolve collisions.
    #[error("code format {format:?} has no counter token to resolve a collision")]
    CodeFormat { format: String },

    /// A single-record update lost an optimistic version check.
    #[error("stale record version for animal {animal_id}")]
    VersionConflict { animal_id: i64 },
}

/// Which population slice a sweep covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileScope {
    /// Every animal on file.
    All,
    /// Animals on premises, or returned from a movement since yesterday.
    OnShelter,
    /// Animals off premises via an active foster.
    Foster,
}

/// Which records a code reassignment covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecodeScope {
    All,
    OnShelter,
}

/// Summary of one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Records examined.
    pub examined: usize,
    /// Records whose stored fields actually changed.
    pub updated: usize,
}

/// Population counts for the status summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShelterCounts {
    pub total: i64,
    pub on_shelter: i64,
    pub on_foster: i64,
    pub reserved: i64,
}

/// A new animal record at intake.
///
/// The identifying code pair is generated during insertion; the derived
/// fields are resolved immediately afterwards.
#[derive(Debug, Clone)]
pub struct NewAnimal {
    pub name: String,
    pub animal_type: String,
    pub species: String,
    pub entry_category: String,
    pub date_of_birth: NaiveDate,
    pub date_brought_in: NaiveDate,
    pub non_shelter: bool,
    pub location_name: String,
    pub location_unit: Option<String>,
}

/// A new movement row, inserted by movement-edit collaborators.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub animal_id: AnimalId,
    pub owner_id: Option<OwnerId>,
    pub movement_type: MovementType,
    pub movement_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub is_trial: bool,
    pub is_permanent_foster: bool,
    pub reservation_date: Option<NaiveDate>,
    pub reservation_cancelled_date: Option<NaiveDate>,
}

const ANIMAL_COLUMNS: &str = "a.id, a.name, a.code, a.short_code, a.animal_type, a.species, \
     a.entry_category, a.date_of_birth, a.date_brought_in, a.deceased_date, a.put_to_sleep, \
     a.death_reason, a.died_off_shelter, a.non_shelter, a.location_name, a.location_unit, \
     a.archived, a.active_movement_id, a.active_movement_date, a.active_movement_type, \
     a.active_movement_return, a.has_active_reserve, a.has_trial_adoption, \
     a.has_permanent_foster, a.most_recent_entry_date, a.display_location, a.days_on_shelter, \
     a.total_days_on_shelter, a.time_on_shelter, a.total_time_on_shelter, a.animal_age, \
     a.age_group, a.age_group_active_movement";

const MOVEMENT_COLUMNS: &str = "m.id, m.animal_id, m.owner_id, o.name, m.movement_type, \
     m.movement_date, m.return_date, m.is_trial, m.is_permanent_foster, m.reservation_date, \
     m.reservation_cancelled_date";

const STATUS_UPDATE_SQL: &str = "UPDATE animal SET \
     archived = ?, active_movement_id = ?, active_movement_date = ?, active_movement_type = ?, \
     active_movement_return = ?, has_active_reserve = ?, has_trial_adoption = ?, \
     has_permanent_foster = ?, died_off_shelter = ?, most_recent_entry_date = ?, \
     display_location = ?, record_version = record_version + 1 \
     WHERE id = ?";

const CARE_UPDATE_SQL: &str = "UPDATE animal SET \
     days_on_shelter = ?, total_days_on_shelter = ?, time_on_shelter = ?, \
     total_time_on_shelter = ?, animal_age = ?, age_group = ?, age_group_active_movement = ?, \
     record_version = record_version + 1 \
     WHERE id = ?";

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection
    /// closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// Idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS owner (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS animal (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                code TEXT NOT NULL DEFAULT '',
                short_code TEXT NOT NULL DEFAULT '',
                animal_type TEXT NOT NULL,
                species TEXT NOT NULL,
                entry_category TEXT NOT NULL DEFAULT '',
                date_of_birth TEXT NOT NULL,
                date_brought_in TEXT NOT NULL,
                deceased_date TEXT,
                put_to_sleep INTEGER NOT NULL DEFAULT 0,
                death_reason TEXT,
                died_off_shelter INTEGER NOT NULL DEFAULT 0,
                non_shelter INTEGER NOT NULL DEFAULT 0,
                location_name TEXT NOT NULL DEFAULT '',
                location_unit TEXT,
                archived INTEGER NOT NULL DEFAULT 0,
                active_movement_id INTEGER,
                active_movement_date TEXT,
                active_movement_type INTEGER,
                active_movement_return TEXT,
                has_active_reserve INTEGER NOT NULL DEFAULT 0,
                has_trial_adoption INTEGER NOT NULL DEFAULT 0,
                has_permanent_foster INTEGER NOT NULL DEFAULT 0,
                most_recent_entry_date TEXT NOT NULL,
                display_location TEXT NOT NULL DEFAULT '',
                days_on_shelter INTEGER NOT NULL DEFAULT 0,
                total_days_on_shelter INTEGER NOT NULL DEFAULT 0,
                time_on_shelter TEXT NOT NULL DEFAULT '',
                total_time_on_shelter TEXT NOT NULL DEFAULT '',
                animal_age TEXT NOT NULL DEFAULT '',
                age_group TEXT NOT NULL DEFAULT '',
                age_group_active_movement TEXT NOT NULL DEFAULT '',
                unique_code INTEGER NOT NULL DEFAULT 0,
                year_code INTEGER NOT NULL DEFAULT 0,
                created_date TEXT NOT NULL,
                record_version INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_animal_archived ON animal(archived);
            CREATE INDEX IF NOT EXISTS idx_animal_brought_in ON animal(date_brought_in);

            CREATE TABLE IF NOT EXISTS movement (
                id INTEGER PRIMARY KEY,
                animal_id INTEGER NOT NULL,
                owner_id INTEGER,
                movement_type INTEGER NOT NULL,
                movement_date TEXT,
                return_date TEXT,
                is_trial INTEGER NOT NULL DEFAULT 0,
                is_permanent_foster INTEGER NOT NULL DEFAULT 0,
                reservation_date TEXT,
                reservation_cancelled_date TEXT,
                FOREIGN KEY (animal_id) REFERENCES animal(id),
                FOREIGN KEY (owner_id) REFERENCES owner(id)
            );

            CREATE INDEX IF NOT EXISTS idx_movement_animal ON movement(animal_id);

            -- Denormalized location text consumed by the scheduling
            -- subsystem; refreshed when an animal's display location changes.
            CREATE TABLE IF NOT EXISTS schedule_note (
                id INTEGER PRIMARY KEY,
                animal_id INTEGER NOT NULL,
                note TEXT NOT NULL DEFAULT '',
                link_info TEXT NOT NULL DEFAULT '',
                FOREIGN KEY (animal_id) REFERENCES animal(id)
            );

            CREATE INDEX IF NOT EXISTS idx_schedule_note_animal ON schedule_note(animal_id);

            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // ── Configuration ─────────────────────────────────────────────────────

    /// Sets a configuration value, replacing any existing one.
    pub fn set_config(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    fn config_value(&self, key: &str) -> Result<Option<String>, DbError> {
        let value = self
            .conn
            .query_row("SELECT value FROM config WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn config_bool(&self, key: &str) -> Result<bool, DbError> {
        Ok(self
            .config_value(key)?
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true")))
    }

    /// The three on-shelter flags, all defaulting to off.
    pub fn status_config(&self) -> Result<StatusConfig, DbError> {
        Ok(StatusConfig {
            foster_on_shelter: self.config_bool("foster_on_shelter")?,
            retailer_on_shelter: self.config_bool("retailer_on_shelter")?,
            trial_on_shelter: self.config_bool("trial_on_shelter")?,
        })
    }

    /// The configured age bracket bands, as a JSON array of
    /// `{label, threshold_years}` objects.
    pub fn age_group_bands(&self) -> Result<AgeGroupBands, DbError> {
        match self.config_value("age_group_bands")? {
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|err| DbError::Config {
                    key: "age_group_bands".to_string(),
                    message: err.to_string(),
                })
            }
            None => Ok(AgeGroupBands::default()),
        }
    }

    /// The configured code templates.
    pub fn code_format(&self) -> Result<CodeFormat, DbError> {
        let default = CodeFormat::default();
        Ok(CodeFormat {
            format: self
                .config_value("coding_format")?
                .unwrap_or(default.format),
            short_format: self
                .config_value("coding_format_short")?
                .unwrap_or(default.short_format),
        })
    }

    // ── Animals ───────────────────────────────────────────────────────────

    /// Loads one animal's facts. Returns `None` for an unknown id.
    pub fn get_animal(&self, id: AnimalId) -> Result<Option<AnimalFacts>, DbError> {
        Ok(self.get_animal_with_version(id)?.map(|(facts, _)| facts))
    }

    fn get_animal_with_version(
        &self,
        id: AnimalId,
    ) -> Result<Option<(AnimalFacts, i64)>, DbError> {
        let sql =
            format!("SELECT {ANIMAL_COLUMNS}, a.record_version FROM animal a WHERE a.id = ?");
        let row = self
            .conn
            .query_row(&sql, [id.get()], |row| {
                Ok((facts_from_row(row)?, row.get::<_, i64>(33)?))
            })
            .optional()?;
        Ok(row)
    }

    /// Loads the fact rows for a population slice, ordered by id.
    pub fn load_facts(
        &self,
        scope: ReconcileScope,
        today: NaiveDate,
    ) -> Result<Vec<AnimalFacts>, DbError> {
        let base = format!("SELECT {ANIMAL_COLUMNS} FROM animal a");
        let mut facts = Vec::new();
        match scope {
            ReconcileScope::All => {
                let mut stmt = self.conn.prepare(&format!("{base} ORDER BY a.id ASC"))?;
                let rows = stmt.query_map([], facts_from_row)?;
                for row in rows {
                    facts.push(row?);
                }
            }
            ReconcileScope::OnShelter => {
                let cutoff = today - Duration::days(1);
                let mut stmt = self.conn.prepare(&format!(
                    "{base} WHERE a.archived = 0 \
                     OR (a.archived = 1 AND a.active_movement_return > ?) \
                     ORDER BY a.id ASC"
                ))?;
                let rows = stmt.query_map([cutoff], facts_from_row)?;
                for row in rows {
                    facts.push(row?);
                }
            }
            ReconcileScope::Foster => {
                let mut stmt = self.conn.prepare(&format!(
                    "{base} WHERE a.active_movement_type = ? AND a.archived = 1 \
                     ORDER BY a.id ASC"
                ))?;
                let rows =
                    stmt.query_map([MovementType::Foster.as_i64()], facts_from_row)?;
                for row in rows {
                    facts.push(row?);
                }
            }
        }
        Ok(facts)
    }

    /// Creates a new animal record at intake.
    ///
    /// Generates the identifying code pair, inserts the row, then resolves
    /// its status and care fields.
    pub fn insert_animal(&mut self, animal: &NewAnimal, today: NaiveDate) -> Result<AnimalId, DbError> {
        let generated = self.generate_code_for(
            &animal.animal_type,
            &animal.species,
            &animal.entry_category,
            animal.date_brought_in,
            today,
        )?;

        self.conn.execute(
            "INSERT INTO animal (name, code, short_code, animal_type, species, entry_category, \
             date_of_birth, date_brought_in, non_shelter, location_name, location_unit, \
             most_recent_entry_date, display_location, unique_code, year_code, created_date) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                animal.name,
                generated.code,
                generated.short_code,
                animal.animal_type,
                animal.species,
                animal.entry_category,
                animal.date_of_birth,
                animal.date_brought_in,
                animal.non_shelter,
                animal.location_name,
                animal.location_unit,
                animal.date_brought_in,
                animal.location_name,
                generated.ever,
                generated.type_year,
                today,
            ],
        )?;
        let id = AnimalId::new(self.conn.last_insert_rowid())?;

        self.update_animal_status(id, today)?;
        self.update_animal_care(id, today)?;
        tracing::debug!(animal_id = id.get(), code = %generated.code, "inserted animal");
        Ok(id)
    }

    // ── Movements ─────────────────────────────────────────────────────────

    /// Inserts a movement row. Callers refresh the animal's status afterwards.
    pub fn insert_movement(&self, movement: &NewMovement) -> Result<MovementId, DbError> {
        self.conn.execute(
            "INSERT INTO movement (animal_id, owner_id, movement_type, movement_date, \
             return_date, is_trial, is_permanent_foster, reservation_date, \
             reservation_cancelled_date) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                movement.animal_id.get(),
                movement.owner_id.map(OwnerId::get),
                movement.movement_type.as_i64(),
                movement.movement_date,
                movement.return_date,
                movement.is_trial,
                movement.is_permanent_foster,
                movement.reservation_date,
                movement.reservation_cancelled_date,
            ],
        )?;
        Ok(MovementId::new(self.conn.last_insert_rowid())?)
    }

    /// Creates an owner record, returning its id.
    pub fn insert_owner(&self, name: &str) -> Result<OwnerId, DbError> {
        self.conn
            .execute("INSERT INTO owner (name) VALUES (?)", [name])?;
        Ok(OwnerId::new(self.conn.last_insert_rowid())?)
    }

    /// Loads one animal's movements, newest first.
    pub fn load_movements_for_animal(&self, id: AnimalId) -> Result<Vec<Movement>, DbError> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM movement m \
             LEFT OUTER JOIN owner o ON o.id = m.owner_id \
             WHERE m.animal_id = ? \
             ORDER BY m.movement_date DESC, m.id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([id.get()], movement_from_row)?;
        let mut movements = Vec::new();
        for row in rows {
            movements.push(row?);
        }
        Ok(movements)
    }

    /// Loads the movements for a population slice in one pass, ordered by
    /// animal id so the result can be partitioned per animal.
    pub fn load_movements(
        &self,
        scope: ReconcileScope,
        today: NaiveDate,
    ) -> Result<Vec<Movement>, DbError> {
        let base = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM movement m \
             LEFT OUTER JOIN owner o ON o.id = m.owner_id"
        );
        let order = "ORDER BY m.animal_id ASC, m.movement_date DESC, m.id DESC";
        let mut movements = Vec::new();
        match scope {
            ReconcileScope::All => {
                let mut stmt = self.conn.prepare(&format!("{base} {order}"))?;
                let rows = stmt.query_map([], movement_from_row)?;
                for row in rows {
                    movements.push(row?);
                }
            }
            ReconcileScope::OnShelter => {
                let cutoff = today - Duration::days(1);
                let mut stmt = self.conn.prepare(&format!(
                    "{base} WHERE m.animal_id IN \
                     (SELECT id FROM animal WHERE archived = 0 \
                      OR (archived = 1 AND active_movement_return > ?)) {order}"
                ))?;
                let rows = stmt.query_map([cutoff], movement_from_row)?;
                for row in rows {
                    movements.push(row?);
                }
            }
            ReconcileScope::Foster => {
                let mut stmt = self.conn.prepare(&format!(
                    "{base} WHERE m.animal_id IN \
                     (SELECT id FROM animal WHERE active_movement_type = ? AND archived = 1) \
                     {order}"
                ))?;
                let rows =
                    stmt.query_map([MovementType::Foster.as_i64()], movement_from_row)?;
                for row in rows {
                    movements.push(row?);
                }
            }
        }
        Ok(movements)
    }

    // ── Single-record recompute ───────────────────────────────────────────

    /// Recomputes one animal's status fields after an interactive edit.
    ///
    /// Unknown ids are a silent no-op. Returns true when stored fields
    /// changed. The write carries an optimistic version check; a concurrent
    /// edit surfaces as [`DbError::VersionConflict`].
    pub fn update_animal_status(&mut self, id: AnimalId, today: NaiveDate) -> Result<bool, DbError> {
        let Some((facts, version)) = self.get_animal_with_version(id)? else {
            return Ok(false);
        };
        let movements = self.load_movements_for_animal(id)?;
        let config = self.status_config()?;
        let bundle = resolve_status(&facts, &movements, &config, today);

        if !bundle.differs_from(&facts) {
            return Ok(false);
        }

        let sql = format!("{STATUS_UPDATE_SQL} AND record_version = ?");
        let changed = self.conn.execute(
            &sql,
            status_update_params(&facts.id, &bundle)
                .iter()
                .map(|p| p.as_ref())
                .chain(std::iter::once(&version as &dyn rusqlite::ToSql))
                .collect::<Vec<_>>()
                .as_slice(),
        )?;
        if changed == 0 {
            return Err(DbError::VersionConflict {
                animal_id: id.get(),
            });
        }

        if facts.display_location != bundle.display_location {
            self.refresh_schedule_notes(&facts, &bundle.display_location)?;
        }
        tracing::debug!(animal_id = id.get(), location = %bundle.display_location, "status updated");
        Ok(true)
    }

    /// Recomputes one animal's care fields.
    ///
    /// Unknown ids are a silent no-op. Returns true when stored fields
    /// changed.
    pub fn update_animal_care(&mut self, id: AnimalId, today: NaiveDate) -> Result<bool, DbError> {
        let Some(facts) = self.get_animal(id)? else {
            return Ok(false);
        };
        let movements = self.load_movements_for_animal(id)?;
        let bands = self.age_group_bands()?;
        let bundle = compute_care(&facts, &movements, &bands, today);

        if !bundle.differs_from(&facts) {
            return Ok(false);
        }

        self.conn.execute(
            CARE_UPDATE_SQL,
            params![
                bundle.days_on_shelter,
                bundle.total_days_on_shelter,
                bundle.time_on_shelter,
                bundle.total_time_on_shelter,
                bundle.animal_age,
                bundle.age_group,
                bundle.age_group_active_movement,
                id.get(),
            ],
        )?;
        Ok(true)
    }

    // ── Batch reconciliation ──────────────────────────────────────────────

    /// Recomputes status fields for a population slice.
    ///
    /// Loads the slice's facts and movement histories once, resolves every
    /// animal (in parallel), and flushes the changed rows in a single
    /// transaction. Unchanged rows produce no writes, so a repeated sweep
    /// reports zero updates. `progress` receives `(current, total)` as the
    /// sweep advances.
    pub fn reconcile_statuses(
        &mut self,
        scope: ReconcileScope,
        today: NaiveDate,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<ReconcileStats, DbError> {
        let config = self.status_config()?;
        let facts = self.load_facts(scope, today)?;
        let movements = self.load_movements(scope, today)?;
        let by_animal = MovementsByAnimal::new(&movements)?;
        let bundles = resolve_population(&facts, &by_animal, &config, today);

        let mut animal_batch: Vec<(AnimalId, StatusBundle)> = Vec::new();
        let mut note_batch: Vec<(String, AnimalId)> = Vec::new();
        let total = facts.len();
        for (index, (animal, bundle)) in facts.iter().zip(bundles).enumerate() {
            progress(index + 1, total);
            if !bundle.differs_from(animal) {
                continue;
            }
            if animal.display_location != bundle.display_location {
                note_batch.push((schedule_link_info(animal, &bundle.display_location), animal.id));
            }
            animal_batch.push((animal.id, bundle));
        }

        let updated = animal_batch.len();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(STATUS_UPDATE_SQL)?;
            for (id, bundle) in &animal_batch {
                stmt.execute(
                    status_update_params(id, bundle)
                        .iter()
                        .map(|p| p.as_ref())
                        .collect::<Vec<_>>()
                        .as_slice(),
                )?;
            }
        }
        {
            let mut stmt =
                tx.prepare("UPDATE schedule_note SET link_info = ? WHERE animal_id = ?")?;
            for (link_info, id) in &note_batch {
                stmt.execute(params![link_info, id.get()])?;
            }
        }
        tx.commit()?;

        tracing::info!(?scope, examined = total, updated, "status reconciliation complete");
        Ok(ReconcileStats {
            examined: total,
            updated,
        })
    }

    /// Recomputes care fields for a population slice.
    ///
    /// Same shape as [`Self::reconcile_statuses`]: one bulk load, changed
    /// rows only, single-transaction flush.
    pub fn recompute_care(
        &mut self,
        scope: ReconcileScope,
        today: NaiveDate,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<ReconcileStats, DbError> {
        let bands = self.age_group_bands()?;
        let facts = self.load_facts(scope, today)?;
        let movements = self.load_movements(scope, today)?;
        let by_animal = MovementsByAnimal::new(&movements)?;

        let mut batch: Vec<(AnimalId, CareBundle)> = Vec::new();
        let total = facts.len();
        for (index, animal) in facts.iter().enumerate() {
            progress(index + 1, total);
            let bundle = compute_care(animal, by_animal.for_animal(animal.id), &bands, today);
            if bundle.differs_from(animal) {
                batch.push((animal.id, bundle));
            }
        }

        let updated = batch.len();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(CARE_UPDATE_SQL)?;
            for (id, bundle) in &batch {
                stmt.execute(params![
                    bundle.days_on_shelter,
                    bundle.total_days_on_shelter,
                    bundle.time_on_shelter,
                    bundle.total_time_on_shelter,
                    bundle.animal_age,
                    bundle.age_group,
                    bundle.age_group_active_movement,
                    id.get(),
                ])?;
            }
        }
        tx.commit()?;

        tracing::info!(?scope, examined = total, updated, "care recomputation complete");
        Ok(ReconcileStats {
            examined: total,
            updated,
        })
    }

    // ── Codes ─────────────────────────────────────────────────────────────

    /// Returns true if any animal already holds the code, case-insensitively.
    pub fn code_exists(&self, code: &str) -> Result<bool, DbError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM animal WHERE code = ? COLLATE NOCASE",
            [code],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Seeds the code counters from the store's current maxima.
    ///
    /// Each seed query runs only when its token family appears in a template.
    fn seed_code_counters(
        &self,
        format: &CodeFormat,
        animal_type: &str,
        brought_in: NaiveDate,
        today: NaiveDate,
    ) -> Result<CodeCounters, DbError> {
        let mut counters = CodeCounters::default();
        let year = i64::from(brought_in.year());

        if format.uses_type_year() {
            let highest: Option<i64> = self.conn.query_row(
                "SELECT MAX(year_code) FROM animal \
                 WHERE CAST(strftime('%Y', date_brought_in) AS INTEGER) = ? \
                 AND animal_type = ?",
                params![year, animal_type],
                |row| row.get(0),
            )?;
            counters.type_year = highest.unwrap_or(0) + 1;
        }

        if format.uses_year() {
            let count: i64 = self.conn.query_row(
                "SELECT COUNT(id) FROM animal \
                 WHERE CAST(strftime('%Y', date_brought_in) AS INTEGER) = ?",
                [year],
                |row| row.get(0),
            )?;
            counters.year = count + 1;
        }

        if format.uses_ever() {
            let one_year_ago = today - Duration::days(365);
            let highest: Option<i64> = self.conn.query_row(
                "SELECT MAX(unique_code) FROM animal WHERE created_date >= ?",
                [one_year_ago],
                |row| row.get(0),
            )?;
            counters.ever = highest.unwrap_or(0) + 1;
        }

        Ok(counters)
    }

    /// Generates a unique code pair for a record of the given type.
    pub fn generate_code_for(
        &self,
        animal_type: &str,
        species: &str,
        entry_category: &str,
        brought_in: NaiveDate,
        today: NaiveDate,
    ) -> Result<GeneratedCode, DbError> {
        let format = self.code_format()?;
        let names = CodeNames::new(animal_type, species, entry_category);
        let counters = self.seed_code_counters(&format, animal_type, brought_in, today)?;

        match generate_code(&format, &names, brought_in, counters, |code| {
            self.code_exists(code)
        }) {
            Ok(generated) => Ok(generated),
            Err(CodeError::FormatCannotResolve { format }) => Err(DbError::CodeFormat { format }),
            Err(CodeError::Uniqueness(err)) => Err(err),
        }
    }

    /// Clears and regenerates identifying codes.
    ///
    /// Every animal's counters are reset and its code replaced by its raw id
    /// first, so regeneration starts from a clean sequence. Returns the
    /// number of records recoded.
    pub fn reassign_codes(
        &mut self,
        scope: RecodeScope,
        today: NaiveDate,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<usize, DbError> {
        self.conn.execute(
            "UPDATE animal SET year_code = 0, unique_code = 0, \
             code = CAST(id AS TEXT), short_code = CAST(id AS TEXT)",
            [],
        )?;

        let filter = match scope {
            RecodeScope::All => "",
            RecodeScope::OnShelter => "WHERE archived = 0 ",
        };
        let sql = format!(
            "SELECT id, animal_type, species, entry_category, date_brought_in \
             FROM animal {filter}ORDER BY id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, NaiveDate>(4)?,
            ))
        })?;
        let mut animals = Vec::new();
        for row in rows {
            animals.push(row?);
        }
        drop(stmt);

        let total = animals.len();
        for (index, (id, animal_type, species, entry_category, brought_in)) in
            animals.into_iter().enumerate()
        {
            progress(index + 1, total);
            let generated =
                self.generate_code_for(&animal_type, &species, &entry_category, brought_in, today)?;
            self.conn.execute(
                "UPDATE animal SET code = ?, short_code = ?, unique_code = ?, year_code = ?, \
                 record_version = record_version + 1 WHERE id = ?",
                params![
                    generated.code,
                    generated.short_code,
                    generated.ever,
                    generated.type_year,
                    id,
                ],
            )?;
            tracing::debug!(animal_id = id, code = %generated.code, "reassigned code");
        }
        Ok(total)
    }

    // ── Schedule notes ────────────────────────────────────────────────────

    /// Creates a schedule note linked to an animal.
    pub fn insert_schedule_note(&self, animal_id: AnimalId, note: &str) -> Result<(), DbError> {
        let link_info = self
            .get_animal(animal_id)?
            .map(|facts| schedule_link_info(&facts, &facts.display_location))
            .unwrap_or_default();
        self.conn.execute(
            "INSERT INTO schedule_note (animal_id, note, link_info) VALUES (?, ?, ?)",
            params![animal_id.get(), note, link_info],
        )?;
        Ok(())
    }

    /// Lists the denormalized link texts of an animal's schedule notes.
    pub fn schedule_note_links(&self, animal_id: AnimalId) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT link_info FROM schedule_note WHERE animal_id = ? ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([animal_id.get()], |row| row.get(0))?;
        let mut links = Vec::new();
        for row in rows {
            links.push(row?);
        }
        Ok(links)
    }

    fn refresh_schedule_notes(
        &self,
        facts: &AnimalFacts,
        new_location: &str,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE schedule_note SET link_info = ? WHERE animal_id = ?",
            params![schedule_link_info(facts, new_location), facts.id.get()],
        )?;
        Ok(())
    }

    // ── Summary ───────────────────────────────────────────────────────────

    /// Population counts for the status summary.
    pub fn shelter_counts(&self) -> Result<ShelterCounts, DbError> {
        let count = |sql: &str, params: &[&dyn rusqlite::ToSql]| -> Result<i64, DbError> {
            Ok(self.conn.query_row(sql, params, |row| row.get(0))?)
        };
        Ok(ShelterCounts {
            total: count("SELECT COUNT(*) FROM animal WHERE non_shelter = 0", &[])?,
            on_shelter: count(
                "SELECT COUNT(*) FROM animal WHERE archived = 0 AND non_shelter = 0",
                &[],
            )?,
            on_foster: count(
                "SELECT COUNT(*) FROM animal WHERE active_movement_type = ? AND archived = 1",
                &[&MovementType::Foster.as_i64()],
            )?,
            reserved: count(
                "SELECT COUNT(*) FROM animal WHERE has_active_reserve = 1",
                &[],
            )?,
        })
    }

    /// The animal's current record version, for tests and diagnostics.
    pub fn record_version(&self, id: AnimalId) -> Result<i64, DbError> {
        Ok(self.conn.query_row(
            "SELECT record_version FROM animal WHERE id = ?",
            [id.get()],
            |row| row.get(0),
        )?)
    }
}

/// Denormalized schedule text: code, name and unqualified location.
fn schedule_link_info(facts: &AnimalFacts, display_location: &str) -> String {
    format!(
        "{} - {} [{}]",
        facts.code,
        facts.name,
        display_location_base(display_location)
    )
}

fn status_update_params(id: &AnimalId, bundle: &StatusBundle) -> Vec<Box<dyn rusqlite::ToSql>> {
    vec![
        Box::new(!bundle.on_shelter),
        Box::new(bundle.active.as_ref().map(|a| a.id.get())),
        Box::new(bundle.active.as_ref().map(|a| a.date)),
        Box::new(bundle.active.as_ref().map(|a| a.movement_type.as_i64())),
        Box::new(bundle.active.as_ref().and_then(|a| a.return_date)),
        Box::new(bundle.has_active_reserve),
        Box::new(bundle.has_trial_adoption),
        Box::new(bundle.has_permanent_foster),
        Box::new(bundle.died_off_shelter),
        Box::new(bundle.most_recent_entry_date),
        Box::new(bundle.display_location.clone()),
        Box::new(id.get()),
    ]
}

fn domain_err(index: usize, err: ValidationError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Integer,
        Box::new(err),
    )
}

fn facts_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AnimalFacts> {
    let id = AnimalId::new(row.get(0)?).map_err(|err| domain_err(0, err))?;
    let active_movement_id = row
        .get::<_, Option<i64>>(17)?
        .map(MovementId::new)
        .transpose()
        .map_err(|err| domain_err(17, err))?;
    let active_movement_type = row
        .get::<_, Option<i64>>(19)?
        .map(MovementType::from_i64)
        .transpose()
        .map_err(|err| domain_err(19, err))?;

    Ok(AnimalFacts {
        id,
        name: row.get(1)?,
        code: row.get(2)?,
        short_code: row.get(3)?,
        animal_type: row.get(4)?,
        species: row.get(5)?,
        entry_category: row.get(6)?,
        date_of_birth: row.get(7)?,
        date_brought_in: row.get(8)?,
        deceased_date: row.get(9)?,
        put_to_sleep: row.get(10)?,
        death_reason: row.get(11)?,
        died_off_shelter: row.get(12)?,
        non_shelter: row.get(13)?,
        location_name: row.get(14)?,
        location_unit: row.get(15)?,
        archived: row.get(16)?,
        active_movement_id,
        active_movement_date: row.get(18)?,
        active_movement_type,
        active_movement_return: row.get(20)?,
        has_active_reserve: row.get(21)?,
        has_trial_adoption: row.get(22)?,
        has_permanent_foster: row.get(23)?,
        most_recent_entry_date: row.get(24)?,
        display_location: row.get(25)?,
        days_on_shelter: row.get(26)?,
        total_days_on_shelter: row.get(27)?,
        time_on_shelter: row.get(28)?,
        total_time_on_shelter: row.get(29)?,
        animal_age: row.get(30)?,
        age_group: row.get(31)?,
        age_group_active_movement: row.get(32)?,
    })
}

fn movement_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Movement> {
    let id = MovementId::new(row.get(0)?).map_err(|err| domain_err(0, err))?;
    let animal_id = AnimalId::new(row.get(1)?).map_err(|err| domain_err(1, err))?;
    let owner_id = row
        .get::<_, Option<i64>>(2)?
        .map(OwnerId::new)
        .transpose()
        .map_err(|err| domain_err(2, err))?;
    let movement_type =
        MovementType::from_i64(row.get(4)?).map_err(|err| domain_err(4, err))?;

    Ok(Movement {
        id,
        animal_id,
        owner_id,
        owner_name: row.get(3)?,
        movement_type,
        movement_date: row.get(5)?,
        return_date: row.get(6)?,
        is_trial: row.get(7)?,
        is_permanent_foster: row.get(8)?,
        reservation_date: row.get(9)?,
        reservation_cancelled_date: row.get(10)?,
    })
}
