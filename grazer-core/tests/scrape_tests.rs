// Tests for sector crawl orchestration

use std::collections::VecDeque;

use grazer_core::config::Config;
use grazer_core::data::Database;
use grazer_core::error::Error;
use grazer_core::grid::Region;
use grazer_core::scrape::{ScrapeOptions, run_resume, run_scrape};
use grazer_core::session::{SessionKind, SessionManager, SessionPlan};
use grazer_reader::{MapView, PageReader, RawDetailFragment, RawFragment, ReadError};
use tempfile::TempDir;

/// Scripted stand-in for the HTTP reader. Consumes `steps` in order and
/// after that yields one synthetic venue per view, placed at the view
/// center so every sector produces a distinct record.
struct ScriptedReader {
    steps: VecDeque<Step>,
    calls: Vec<(f64, f64)>,
}

enum Step {
    Fragments(Vec<RawFragment>),
    Transient,
    Blocked,
}

impl ScriptedReader {
    fn new() -> Self {
        ScriptedReader {
            steps: VecDeque::new(),
            calls: Vec::new(),
        }
    }

    fn with_steps(steps: Vec<Step>) -> Self {
        ScriptedReader {
            steps: steps.into(),
            calls: Vec::new(),
        }
    }
}

impl PageReader for ScriptedReader {
    async fn load_map(&mut self, view: &MapView) -> grazer_reader::error::Result<Vec<RawFragment>> {
        self.calls.push((view.lat, view.lng));
        match self.steps.pop_front() {
            Some(Step::Fragments(fragments)) => Ok(fragments),
            Some(Step::Transient) => Err(ReadError::Status {
                status: 503,
                url: "https://example.com/searchmap/".to_string(),
            }),
            Some(Step::Blocked) => Err(ReadError::Blocked { status: 429 }),
            None => Ok(vec![RawFragment::new(
                format!("Venue {}", self.calls.len()),
                view.lat,
                view.lng,
            )]),
        }
    }

    async fn load_detail(&mut self, _url: &str) -> grazer_reader::error::Result<RawDetailFragment> {
        Ok(RawDetailFragment::default())
    }
}

fn test_config() -> Config {
    Config {
        delay_secs: 0,
        ..Config::default()
    }
}

fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();
    (temp_dir, db)
}

// ============================================================================
// Full Crawl Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_full_grid_crawl_completes() {
    let (_temp_dir, mut db) = create_test_db();
    let mut reader = ScriptedReader::new();
    let config = test_config();

    let summary = run_scrape(&mut db, &mut reader, &config, &ScrapeOptions::default())
        .await
        .unwrap();

    assert!(summary.completed);
    assert_eq!(summary.sectors_processed, 48);
    assert_eq!(summary.inserted, 48);
    assert_eq!(summary.duplicates, 0);
    assert_eq!(reader.calls.len(), 48);
    assert_eq!(db.count_places().unwrap(), 48);

    let session = db.get_session(&summary.session_id).unwrap().unwrap();
    assert!(session.completed);
    assert_eq!(session.processed_units, 48);
}

#[tokio::test(start_paused = true)]
async fn test_region_crawl_covers_only_region_sectors() {
    let (_temp_dir, mut db) = create_test_db();
    let mut reader = ScriptedReader::new();
    let config = test_config();

    let options = ScrapeOptions {
        region: Some(Region::East),
        ..ScrapeOptions::default()
    };
    let summary = run_scrape(&mut db, &mut reader, &config, &options).await.unwrap();

    // East is columns 7-8 of the 6x8 grid.
    assert!(summary.completed);
    assert_eq!(summary.sectors_processed, 12);
    assert_eq!(reader.calls.len(), 12);
}

// ============================================================================
// Bounded Run and Resume Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_max_two_processes_two_and_pauses() {
    let (_temp_dir, mut db) = create_test_db();
    let mut reader = ScriptedReader::new();
    let config = test_config();

    let options = ScrapeOptions {
        max: Some(2),
        ..ScrapeOptions::default()
    };
    let summary = run_scrape(&mut db, &mut reader, &config, &options).await.unwrap();

    assert!(!summary.completed);
    assert_eq!(summary.sectors_processed, 2);
    assert_eq!(reader.calls.len(), 2);

    let session = db.get_session(&summary.session_id).unwrap().unwrap();
    assert!(!session.completed);
    assert_eq!(session.processed_units, 2);
    assert_eq!(session.total_units, 48);
    assert_eq!(session.cursor, 2);
}

#[tokio::test(start_paused = true)]
async fn test_resume_continues_from_cursor() {
    let (_temp_dir, mut db) = create_test_db();
    let config = test_config();

    let mut reader = ScriptedReader::new();
    let options = ScrapeOptions {
        max: Some(2),
        ..ScrapeOptions::default()
    };
    let summary = run_scrape(&mut db, &mut reader, &config, &options).await.unwrap();
    let first_calls = reader.calls.clone();

    // Resume with a budget covering the rest of the grid.
    let mut reader = ScriptedReader::new();
    let resumed = run_resume(&mut db, &mut reader, &config, &summary.session_id, Some(46))
        .await
        .unwrap();

    assert!(resumed.completed);
    assert_eq!(resumed.sectors_processed, 46);
    // No sector is fetched twice across the two runs.
    assert!(!reader.calls.iter().any(|c| first_calls.contains(c)));
    assert_eq!(db.count_places().unwrap(), 48);
}

#[tokio::test(start_paused = true)]
async fn test_start_offset_skips_leading_sectors() {
    let (_temp_dir, mut db) = create_test_db();
    let mut reader = ScriptedReader::new();
    let config = test_config();

    let options = ScrapeOptions {
        start: Some(46),
        ..ScrapeOptions::default()
    };
    let summary = run_scrape(&mut db, &mut reader, &config, &options).await.unwrap();

    assert!(summary.completed);
    assert_eq!(summary.sectors_processed, 2);
    assert_eq!(reader.calls.len(), 2);

    // Skipped sectors move the cursor but do not count as work done.
    let session = db.get_session(&summary.session_id).unwrap().unwrap();
    assert!(session.completed);
    assert_eq!(session.processed_units, 2);
    assert_eq!(session.cursor, 48);
}

#[tokio::test(start_paused = true)]
async fn test_resume_refuses_non_crawl_session() {
    let (_temp_dir, mut db) = create_test_db();
    let config = test_config();

    let session = SessionManager::new(&db)
        .start(SessionKind::Enrich, 5, &SessionPlan::default())
        .unwrap();

    let mut reader = ScriptedReader::new();
    let result = run_resume(&mut db, &mut reader, &config, &session.id, None).await;

    assert!(matches!(result, Err(Error::SessionKindMismatch { .. })));
    assert!(reader.calls.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_second_active_scrape_refused() {
    let (_temp_dir, mut db) = create_test_db();
    let config = test_config();

    let mut reader = ScriptedReader::new();
    let options = ScrapeOptions {
        max: Some(1),
        ..ScrapeOptions::default()
    };
    run_scrape(&mut db, &mut reader, &config, &options).await.unwrap();

    let mut reader = ScriptedReader::new();
    let second = run_scrape(&mut db, &mut reader, &config, &ScrapeOptions::default()).await;
    assert!(matches!(second, Err(Error::ActiveSessionExists("scrape"))));
}

// ============================================================================
// Failure Handling Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_retried() {
    let (_temp_dir, mut db) = create_test_db();
    let mut reader = ScriptedReader::with_steps(vec![Step::Transient]);
    let config = test_config();

    let options = ScrapeOptions {
        max: Some(1),
        ..ScrapeOptions::default()
    };
    let summary = run_scrape(&mut db, &mut reader, &config, &options).await.unwrap();

    // First attempt fails with a 503, the retry succeeds.
    assert_eq!(reader.calls.len(), 2);
    assert_eq!(summary.sectors_processed, 1);
    assert_eq!(summary.inserted, 1);
    assert!(summary.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_block_halts_run_but_keeps_session() {
    let (_temp_dir, mut db) = create_test_db();
    let mut reader = ScriptedReader::with_steps(vec![
        Step::Fragments(vec![RawFragment::new("Survivor", 1.3, 103.7)]),
        Step::Blocked,
    ]);
    let config = test_config();

    let summary = run_scrape(&mut db, &mut reader, &config, &ScrapeOptions::default())
        .await
        .unwrap();

    assert!(!summary.completed);
    assert_eq!(summary.sectors_processed, 1);
    assert!(summary.error.as_deref().unwrap().contains("sector 1"));
    // The record from the completed sector survives the halt.
    assert_eq!(db.count_places().unwrap(), 1);

    let session = db.get_session(&summary.session_id).unwrap().unwrap();
    assert!(!session.completed);
    assert_eq!(session.cursor, 1);
    assert!(session.error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_resume_after_block_finishes_grid() {
    let (_temp_dir, mut db) = create_test_db();
    let config = test_config();

    let mut reader = ScriptedReader::with_steps(vec![Step::Blocked]);
    let summary = run_scrape(&mut db, &mut reader, &config, &ScrapeOptions::default())
        .await
        .unwrap();
    assert!(!summary.completed);

    let mut reader = ScriptedReader::new();
    let resumed = run_resume(&mut db, &mut reader, &config, &summary.session_id, None)
        .await
        .unwrap();

    assert!(resumed.completed);
    assert_eq!(resumed.sectors_processed, 48);
}

// ============================================================================
// Deduplication Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_overlapping_sectors_store_one_record() {
    let (_temp_dir, mut db) = create_test_db();
    // The same venue shows up in two adjacent views.
    let shared = RawFragment::new("Boundary Cafe", 1.3125, 103.7);
    let mut reader = ScriptedReader::with_steps(vec![
        Step::Fragments(vec![shared.clone()]),
        Step::Fragments(vec![shared]),
    ]);
    let config = test_config();

    let options = ScrapeOptions {
        max: Some(2),
        ..ScrapeOptions::default()
    };
    let summary = run_scrape(&mut db, &mut reader, &config, &options).await.unwrap();

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(db.count_places().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_marker_within_sector_counted_once() {
    let (_temp_dir, mut db) = create_test_db();
    let marker = RawFragment::new("Twice Listed", 1.3, 103.7);
    let mut reader =
        ScriptedReader::with_steps(vec![Step::Fragments(vec![marker.clone(), marker])]);
    let config = test_config();

    let options = ScrapeOptions {
        max: Some(1),
        ..ScrapeOptions::default()
    };
    let summary = run_scrape(&mut db, &mut reader, &config, &options).await.unwrap();

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(db.count_places().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_fragments_rejected_not_fatal() {
    let (_temp_dir, mut db) = create_test_db();
    let mut reader = ScriptedReader::with_steps(vec![Step::Fragments(vec![
        RawFragment::new("Valid", 1.3, 103.7),
        RawFragment {
            name: Some("No Coordinates".to_string()),
            ..RawFragment::default()
        },
        RawFragment {
            lat: Some("1.31".to_string()),
            lng: Some("103.71".to_string()),
            ..RawFragment::default()
        },
    ])]);
    let config = test_config();

    let options = ScrapeOptions {
        max: Some(1),
        ..ScrapeOptions::default()
    };
    let summary = run_scrape(&mut db, &mut reader, &config, &options).await.unwrap();

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.rejected, 2);
    assert!(summary.error.is_none());
}
