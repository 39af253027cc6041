// Tests for session state machine functionality

use grazer_core::data::Database;
use grazer_core::error::Error;
use grazer_core::session::{SessionKind, SessionManager, SessionPlan};
use tempfile::TempDir;

fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();
    (temp_dir, db)
}

// ============================================================================
// Session Creation Tests
// ============================================================================

#[test]
fn test_start_session() {
    let (_temp_dir, db) = create_test_db();
    let manager = SessionManager::new(&db);

    let session = manager
        .start(SessionKind::Scrape, 48, &SessionPlan::default())
        .unwrap();

    assert_eq!(session.kind, "scrape");
    assert_eq!(session.total_units, 48);
    assert_eq!(session.processed_units, 0);
    assert_eq!(session.cursor, 0);
    assert!(!session.completed);
    assert!(session.error.is_none());
}

#[test]
fn test_second_active_session_of_same_kind_refused() {
    let (_temp_dir, db) = create_test_db();
    let manager = SessionManager::new(&db);

    manager
        .start(SessionKind::Scrape, 48, &SessionPlan::default())
        .unwrap();
    let second = manager.start(SessionKind::Scrape, 48, &SessionPlan::default());

    assert!(matches!(second, Err(Error::ActiveSessionExists("scrape"))));
}

#[test]
fn test_active_sessions_of_different_kinds_allowed() {
    let (_temp_dir, db) = create_test_db();
    let manager = SessionManager::new(&db);

    manager
        .start(SessionKind::Scrape, 48, &SessionPlan::default())
        .unwrap();
    let enrich = manager.start(SessionKind::Enrich, 10, &SessionPlan::default());
    assert!(enrich.is_ok());
}

#[test]
fn test_new_session_allowed_after_completion() {
    let (_temp_dir, db) = create_test_db();
    let manager = SessionManager::new(&db);

    let mut session = manager
        .start(SessionKind::Scrape, 48, &SessionPlan::default())
        .unwrap();
    manager.complete(&mut session).unwrap();

    let next = manager.start(SessionKind::Scrape, 48, &SessionPlan::default());
    assert!(next.is_ok());
}

// ============================================================================
// Progress Tests
// ============================================================================

#[test]
fn test_advance_persists_progress() {
    let (_temp_dir, db) = create_test_db();
    let manager = SessionManager::new(&db);

    let mut session = manager
        .start(SessionKind::Scrape, 48, &SessionPlan::default())
        .unwrap();
    manager.advance(&mut session, 5, 5).unwrap();

    let reloaded = db.get_session(&session.id).unwrap().unwrap();
    assert_eq!(reloaded.processed_units, 5);
    assert_eq!(reloaded.cursor, 5);
}

#[test]
fn test_advance_is_monotonic() {
    let (_temp_dir, db) = create_test_db();
    let manager = SessionManager::new(&db);

    let mut session = manager
        .start(SessionKind::Scrape, 48, &SessionPlan::default())
        .unwrap();
    manager.advance(&mut session, 5, 5).unwrap();
    // A stale replay must not move progress backwards.
    manager.advance(&mut session, 3, 3).unwrap();

    let reloaded = db.get_session(&session.id).unwrap().unwrap();
    assert_eq!(reloaded.processed_units, 5);
    assert_eq!(reloaded.cursor, 5);
}

#[test]
fn test_progress_percent() {
    let (_temp_dir, db) = create_test_db();
    let manager = SessionManager::new(&db);

    let mut session = manager
        .start(SessionKind::Scrape, 48, &SessionPlan::default())
        .unwrap();
    manager.advance(&mut session, 12, 12).unwrap();
    assert_eq!(session.progress_percent(), 25.0);
}

// ============================================================================
// Resume Tests
// ============================================================================

#[test]
fn test_resume_incomplete_session() {
    let (_temp_dir, db) = create_test_db();
    let manager = SessionManager::new(&db);

    let mut session = manager
        .start(SessionKind::Scrape, 48, &SessionPlan::default())
        .unwrap();
    manager.advance(&mut session, 2, 2).unwrap();

    let resumed = manager.resume(&session.id).unwrap();
    assert_eq!(resumed.cursor, 2);
    assert!(!resumed.completed);
}

#[test]
fn test_resume_unknown_session() {
    let (_temp_dir, db) = create_test_db();
    let manager = SessionManager::new(&db);

    let result = manager.resume("no-such-id");
    assert!(matches!(result, Err(Error::SessionNotFound(_))));
}

#[test]
fn test_resume_completed_session_refused() {
    let (_temp_dir, db) = create_test_db();
    let manager = SessionManager::new(&db);

    let mut session = manager
        .start(SessionKind::Scrape, 48, &SessionPlan::default())
        .unwrap();
    manager.complete(&mut session).unwrap();

    let result = manager.resume(&session.id);
    assert!(matches!(result, Err(Error::SessionCompleted(_))));
}

#[test]
fn test_failed_session_stays_resumable() {
    let (_temp_dir, db) = create_test_db();
    let manager = SessionManager::new(&db);

    let mut session = manager
        .start(SessionKind::Scrape, 48, &SessionPlan::default())
        .unwrap();
    manager.advance(&mut session, 7, 7).unwrap();
    manager.fail(&mut session, "sector 7: request blocked").unwrap();

    let resumed = manager.resume(&session.id).unwrap();
    assert_eq!(resumed.cursor, 7);
    assert_eq!(resumed.error.as_deref(), Some("sector 7: request blocked"));

    let incomplete = manager.incomplete().unwrap();
    assert_eq!(incomplete.len(), 1);
}

// ============================================================================
// Plan Round-Trip Tests
// ============================================================================

#[test]
fn test_plan_round_trip() {
    let (_temp_dir, db) = create_test_db();
    let manager = SessionManager::new(&db);

    let plan = SessionPlan {
        region: Some("east".to_string()),
        start: Some(3),
        max: Some(5),
    };
    let session = manager.start(SessionKind::Scrape, 12, &plan).unwrap();

    let stored = manager.plan_of(&session).unwrap();
    assert_eq!(stored.region.as_deref(), Some("east"));
    assert_eq!(stored.start, Some(3));
    assert_eq!(stored.max, Some(5));
}

#[test]
fn test_completion_clears_error() {
    let (_temp_dir, db) = create_test_db();
    let manager = SessionManager::new(&db);

    let mut session = manager
        .start(SessionKind::Scrape, 48, &SessionPlan::default())
        .unwrap();
    manager.fail(&mut session, "transient trouble").unwrap();
    manager.complete(&mut session).unwrap();

    let reloaded = db.get_session(&session.id).unwrap().unwrap();
    assert!(reloaded.completed);
    assert!(reloaded.error.is_none());
    assert!(reloaded.ended_at.is_some());
}
