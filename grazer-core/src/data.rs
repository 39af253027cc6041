use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{Place, PlacePatch};
use crate::session::Session;

/// Outcome of one insert attempt through the deduplicating writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    /// The coordinate pair is already stored. Expected near sector
    /// boundaries where views overlap; never an application error.
    AlreadyExists,
    /// The record violated a store constraint other than coordinate
    /// uniqueness and could not be kept.
    Failed,
}

pub struct Database {
    conn: Connection,
}

fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl Database {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("cannot create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS places (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                address TEXT,
                phone TEXT,
                website TEXT,
                listing_url TEXT,
                description TEXT,
                category TEXT,
                price_range TEXT,
                rating REAL,
                review_count INTEGER,
                hours TEXT,
                features TEXT,         -- JSON array
                images TEXT,           -- JSON array
                is_vegan INTEGER NOT NULL DEFAULT 0,
                is_vegetarian INTEGER NOT NULL DEFAULT 0,
                has_veg_options INTEGER NOT NULL DEFAULT 0,
                scraped_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(latitude, longitude),
                CHECK(latitude BETWEEN -90 AND 90),
                CHECK(longitude BETWEEN -180 AND 180)
            );

            CREATE INDEX IF NOT EXISTS idx_places_name ON places(name);
            CREATE INDEX IF NOT EXISTS idx_places_diet
                ON places(is_vegan, is_vegetarian, has_veg_options);

            -- Crawl sessions
            CREATE TABLE IF NOT EXISTS scrape_sessions (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL CHECK(kind IN ('scrape', 'enrich')),
                total_units INTEGER NOT NULL,
                processed_units INTEGER NOT NULL DEFAULT 0,
                cursor INTEGER NOT NULL DEFAULT 0,
                completed INTEGER NOT NULL DEFAULT 0,
                plan TEXT,             -- JSON run configuration
                error TEXT,
                started_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                ended_at INTEGER
            );

            -- At most one incomplete session per kind, enforced by the
            -- store rather than operator discipline.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_active
                ON scrape_sessions(kind) WHERE completed = 0;

            -- Enrichment resume point: single row, last place id that
            -- was successfully enriched.
            CREATE TABLE IF NOT EXISTS enrich_checkpoint (
                id INTEGER PRIMARY KEY CHECK(id = 1),
                last_place_id INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // Deduplicating writer

    pub fn insert_place(&self, place: &Place) -> Result<InsertOutcome> {
        let now = current_timestamp();
        let result = self.conn.execute(
            "INSERT INTO places (
                name, latitude, longitude, address, phone, website, listing_url,
                description, category, price_range, rating, review_count, hours,
                features, images, is_vegan, is_vegetarian, has_veg_options,
                scraped_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                      ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            params![
                &place.name,
                place.latitude,
                place.longitude,
                &place.address,
                &place.phone,
                &place.website,
                &place.listing_url,
                &place.description,
                &place.category,
                &place.price_range,
                place.rating,
                place.review_count,
                &place.hours,
                serde_json::to_string(&place.features)?,
                serde_json::to_string(&place.images)?,
                place.is_vegan,
                place.is_vegetarian,
                place.has_veg_options,
                place.scraped_at,
                now,
                now,
            ],
        );

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted(self.conn.last_insert_rowid())),
            Err(e) if is_unique_violation(&e) => {
                debug!(
                    "Duplicate coordinates ({}, {}) for '{}'",
                    place.latitude, place.longitude, place.name
                );
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert a sector's records as a unit. The whole set goes into one
    /// transaction first; if that fails for a non-duplicate reason the
    /// records are retried individually so a single bad row cannot
    /// discard the rest of the sector.
    pub fn insert_batch(&mut self, places: &[Place]) -> Result<Vec<InsertOutcome>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut outcomes = Vec::with_capacity(places.len());
        let mut set_failed = false;

        for place in places {
            match self.insert_place(place) {
                Ok(outcome) => outcomes.push(outcome),
                Err(_) => {
                    set_failed = true;
                    break;
                }
            }
        }

        if !set_failed {
            tx.commit()?;
            return Ok(outcomes);
        }

        // Per-record fallback outside any transaction.
        drop(tx);
        info!("Batch insert failed; retrying {} records individually", places.len());
        let mut outcomes = Vec::with_capacity(places.len());
        for place in places {
            match self.insert_place(place) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    debug!("Unstorable record '{}': {}", place.name, e);
                    outcomes.push(InsertOutcome::Failed);
                }
            }
        }
        Ok(outcomes)
    }

    pub fn count_places(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM places", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn get_place(&self, id: i64) -> Result<Option<Place>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PLACE_COLUMNS} FROM places WHERE id = ?1"
        ))?;
        let place = stmt
            .query_row(params![id], place_from_row)
            .optional()?;
        Ok(place)
    }

    pub fn place_at(&self, latitude: f64, longitude: f64) -> Result<Option<Place>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PLACE_COLUMNS} FROM places WHERE latitude = ?1 AND longitude = ?2"
        ))?;
        let place = stmt
            .query_row(params![latitude, longitude], place_from_row)
            .optional()?;
        Ok(place)
    }

    // Enrichment queries

    /// Records still missing at least `threshold` optional descriptive
    /// fields, ascending id order, optionally bounded below and capped.
    pub fn enrichment_candidates(
        &self,
        threshold: u32,
        start_id: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Place>> {
        let sql = format!(
            "SELECT {PLACE_COLUMNS} FROM places
             WHERE (
                 (address IS NULL) + (phone IS NULL) + (website IS NULL) +
                 (description IS NULL) + (category IS NULL) + (price_range IS NULL) +
                 (rating IS NULL) + (review_count IS NULL) + (hours IS NULL) +
                 (features IS NULL OR features = '[]') +
                 (images IS NULL OR images = '[]')
             ) >= ?1
             AND id > ?2
             ORDER BY id ASC
             LIMIT ?3"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let places = stmt
            .query_map(params![threshold, start_id.unwrap_or(0), limit], place_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(places)
    }

    /// Fill only the columns that are currently null; populated values,
    /// including manual corrections, survive untouched.
    pub fn update_missing_fields(&self, id: i64, patch: &PlacePatch) -> Result<()> {
        let features_json = patch
            .features
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let images_json = patch
            .images
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            "UPDATE places SET
                address      = COALESCE(address, ?1),
                phone        = COALESCE(phone, ?2),
                website      = COALESCE(website, ?3),
                description  = COALESCE(description, ?4),
                category     = COALESCE(category, ?5),
                price_range  = COALESCE(price_range, ?6),
                rating       = COALESCE(rating, ?7),
                review_count = COALESCE(review_count, ?8),
                hours        = COALESCE(hours, ?9),
                features     = CASE WHEN features IS NULL OR features = '[]'
                                    THEN COALESCE(?10, features) ELSE features END,
                images       = CASE WHEN images IS NULL OR images = '[]'
                                    THEN COALESCE(?11, images) ELSE images END,
                updated_at   = ?12
             WHERE id = ?13",
            params![
                &patch.address,
                &patch.phone,
                &patch.website,
                &patch.description,
                &patch.category,
                &patch.price_range,
                patch.rating,
                patch.review_count,
                &patch.hours,
                features_json,
                images_json,
                current_timestamp(),
                id,
            ],
        )?;
        Ok(())
    }

    pub fn enrich_checkpoint(&self) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT last_place_id FROM enrich_checkpoint WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn set_enrich_checkpoint(&self, last_place_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO enrich_checkpoint (id, last_place_id, updated_at)
             VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                 last_place_id = excluded.last_place_id,
                 updated_at = excluded.updated_at",
            params![last_place_id, current_timestamp()],
        )?;
        Ok(())
    }

    // Session rows (state machine semantics live in session.rs)

    pub fn create_session(
        &self,
        kind: &'static str,
        total_units: i64,
        plan: Option<&str>,
    ) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let now = current_timestamp();

        let result = self.conn.execute(
            "INSERT INTO scrape_sessions (id, kind, total_units, plan, started_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![&session_id, kind, total_units, plan, now, now],
        );

        match result {
            Ok(_) => Ok(session_id),
            Err(e) if is_unique_violation(&e) => Err(Error::ActiveSessionExists(kind)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM scrape_sessions WHERE id = ?1"
        ))?;
        let session = stmt
            .query_row(params![session_id], session_from_row)
            .optional()?;
        Ok(session)
    }

    /// Idempotent, monotonic progress write: replays with stale values
    /// never move the cursor backwards.
    pub fn update_session_progress(
        &self,
        session_id: &str,
        processed_units: i64,
        cursor: i64,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE scrape_sessions SET
                processed_units = MAX(processed_units, ?1),
                cursor = MAX(cursor, ?2),
                updated_at = ?3
             WHERE id = ?4",
            params![processed_units, cursor, current_timestamp(), session_id],
        )?;
        Ok(())
    }

    pub fn mark_session_completed(&self, session_id: &str) -> Result<()> {
        let now = current_timestamp();
        self.conn.execute(
            "UPDATE scrape_sessions SET completed = 1, error = NULL,
                 updated_at = ?1, ended_at = ?1
             WHERE id = ?2",
            params![now, session_id],
        )?;
        Ok(())
    }

    /// Close an interrupted session without claiming success: progress
    /// and any recorded error stay on the row, but the kind's active
    /// slot frees up for a new run.
    pub fn mark_session_superseded(&self, session_id: &str) -> Result<()> {
        let now = current_timestamp();
        self.conn.execute(
            "UPDATE scrape_sessions SET completed = 1, updated_at = ?1, ended_at = ?1
             WHERE id = ?2",
            params![now, session_id],
        )?;
        Ok(())
    }

    /// Record the failure but keep the session incomplete: a transient
    /// site outage should leave the run resumable, not dead.
    pub fn mark_session_failed(&self, session_id: &str, message: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE scrape_sessions SET error = ?1, updated_at = ?2 WHERE id = ?3",
            params![message, current_timestamp(), session_id],
        )?;
        Ok(())
    }

    pub fn incomplete_sessions(&self) -> Result<Vec<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM scrape_sessions
             WHERE completed = 0 ORDER BY started_at DESC"
        ))?;
        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    pub fn all_sessions(&self) -> Result<Vec<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM scrape_sessions ORDER BY started_at DESC"
        ))?;
        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    // Maintenance

    pub fn clear(&self, include_sessions: bool) -> Result<()> {
        self.conn.execute("DELETE FROM places", [])?;
        self.conn.execute("DELETE FROM enrich_checkpoint", [])?;
        if include_sessions {
            self.conn.execute("DELETE FROM scrape_sessions", [])?;
        }
        info!(
            "Cleared record store (sessions {})",
            if include_sessions { "included" } else { "kept" }
        );
        Ok(())
    }
}

const PLACE_COLUMNS: &str = "id, name, latitude, longitude, address, phone, website, \
    listing_url, description, category, price_range, rating, review_count, hours, \
    features, images, is_vegan, is_vegetarian, has_veg_options, scraped_at";

fn place_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Place> {
    let features: Option<String> = row.get(14)?;
    let images: Option<String> = row.get(15)?;
    Ok(Place {
        id: row.get(0)?,
        name: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        address: row.get(4)?,
        phone: row.get(5)?,
        website: row.get(6)?,
        listing_url: row.get(7)?,
        description: row.get(8)?,
        category: row.get(9)?,
        price_range: row.get(10)?,
        rating: row.get(11)?,
        review_count: row.get(12)?,
        hours: row.get(13)?,
        features: features
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default(),
        images: images
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default(),
        is_vegan: row.get(16)?,
        is_vegetarian: row.get(17)?,
        has_veg_options: row.get(18)?,
        scraped_at: row.get(19)?,
    })
}

const SESSION_COLUMNS: &str = "id, kind, total_units, processed_units, cursor, \
    completed, plan, error, started_at, updated_at, ended_at";

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        kind: row.get(1)?,
        total_units: row.get(2)?,
        processed_units: row.get(3)?,
        cursor: row.get(4)?,
        completed: row.get(5)?,
        plan: row.get(6)?,
        error: row.get(7)?,
        started_at: row.get(8)?,
        updated_at: row.get(9)?,
        ended_at: row.get(10)?,
    })
}
