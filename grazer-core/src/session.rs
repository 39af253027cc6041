use serde::{Deserialize, Serialize};

use crate::data::Database;
use crate::error::{Error, Result};

/// The two long-running jobs that persist progress across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Scrape,
    Enrich,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Scrape => "scrape",
            SessionKind::Enrich => "enrich",
        }
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted run. `cursor` is the next unit to process, so a crash
/// between "advance" and "exit" replays at most one unit of work, and
/// the deduplicating writer makes that replay harmless.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub kind: String,
    pub total_units: i64,
    pub processed_units: i64,
    pub cursor: i64,
    pub completed: bool,
    pub plan: Option<String>,
    pub error: Option<String>,
    pub started_at: i64,
    pub updated_at: i64,
    pub ended_at: Option<i64>,
}

impl Session {
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(8)]
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total_units == 0 {
            return 100.0;
        }
        self.processed_units as f64 / self.total_units as f64 * 100.0
    }
}

/// Run configuration persisted with the session so resume can rebuild
/// the exact sector plan without re-reading CLI flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionPlan {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
}

pub struct SessionManager<'a> {
    db: &'a Database,
}

impl<'a> SessionManager<'a> {
    pub fn new(db: &'a Database) -> Self {
        SessionManager { db }
    }

    /// Open a new session. Fails with `ActiveSessionExists` while an
    /// incomplete session of the same kind is on disk; the caller must
    /// resume or abandon that one first.
    pub fn start(
        &self,
        kind: SessionKind,
        total_units: i64,
        plan: &SessionPlan,
    ) -> Result<Session> {
        let plan_json = serde_json::to_string(plan)?;
        let id = self
            .db
            .create_session(kind.as_str(), total_units, Some(&plan_json))?;
        tracing::info!("Started {} session {}", kind, &id[..8]);
        self.require(&id)
    }

    /// Load an incomplete session for continuation. Completed sessions
    /// are refused rather than silently re-run.
    pub fn resume(&self, session_id: &str) -> Result<Session> {
        let session = self.require(session_id)?;
        if session.completed {
            return Err(Error::SessionCompleted(session_id.to_string()));
        }
        tracing::info!(
            "Resuming {} session {} at unit {}/{}",
            session.kind,
            session.short_id(),
            session.cursor,
            session.total_units
        );
        Ok(session)
    }

    /// Record that every unit below `cursor` is durably done.
    pub fn advance(&self, session: &mut Session, processed: i64, cursor: i64) -> Result<()> {
        self.db.update_session_progress(&session.id, processed, cursor)?;
        session.processed_units = session.processed_units.max(processed);
        session.cursor = session.cursor.max(cursor);
        Ok(())
    }

    pub fn complete(&self, session: &mut Session) -> Result<()> {
        self.db.mark_session_completed(&session.id)?;
        session.completed = true;
        session.error = None;
        tracing::info!("Completed {} session {}", session.kind, session.short_id());
        Ok(())
    }

    pub fn fail(&self, session: &mut Session, message: &str) -> Result<()> {
        self.db.mark_session_failed(&session.id, message)?;
        session.error = Some(message.to_string());
        tracing::warn!(
            "Session {} halted (resumable): {}",
            session.short_id(),
            message
        );
        Ok(())
    }

    pub fn incomplete(&self) -> Result<Vec<Session>> {
        self.db.incomplete_sessions()
    }

    /// Retire any incomplete session of `kind` so a new one can start.
    /// Enrichment uses this: its resume point is the checkpoint table,
    /// not the session cursor, so a halted run never blocks the next.
    pub fn supersede_incomplete(&self, kind: SessionKind) -> Result<Option<String>> {
        let stale = self
            .incomplete()?
            .into_iter()
            .find(|s| s.kind == kind.as_str());
        match stale {
            Some(session) => {
                self.db.mark_session_superseded(&session.id)?;
                tracing::info!("Superseded {} session {}", kind, session.short_id());
                Ok(Some(session.id))
            }
            None => Ok(None),
        }
    }

    pub fn plan_of(&self, session: &Session) -> Result<SessionPlan> {
        match &session.plan {
            Some(raw) => Ok(serde_json::from_str(raw)?),
            None => Ok(SessionPlan::default()),
        }
    }

    fn require(&self, session_id: &str) -> Result<Session> {
        self.db
            .get_session(session_id)?
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }
}
