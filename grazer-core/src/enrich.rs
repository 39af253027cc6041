use std::time::Duration;

use grazer_reader::PageReader;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::data::Database;
use crate::error::{Error, Result};
use crate::extract::detail_patch;
use crate::session::{SessionKind, SessionManager, SessionPlan};

/// A record qualifies for enrichment once at least this many of its
/// optional descriptive fields are still empty.
pub const DEFAULT_MISSING_THRESHOLD: u32 = 2;

#[derive(Debug, Clone, Default)]
pub struct EnrichOptions {
    /// Enrich exactly one record, ignoring checkpoint and threshold.
    pub id: Option<i64>,
    /// Override the stored checkpoint and begin after this id.
    pub start_id: Option<i64>,
    pub limit: Option<usize>,
    pub threshold: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct EnrichSummary {
    pub session_id: String,
    pub candidates: usize,
    pub enriched: usize,
    pub skipped: usize,
    pub completed: bool,
    pub error: Option<String>,
}

/// Visit detail pages for under-filled records and patch in whatever
/// each page yields. Every fetch is preceded by the full pacing delay;
/// there is no burst mode.
pub async fn run_enrich<R: PageReader>(
    db: &mut Database,
    reader: &mut R,
    config: &Config,
    options: &EnrichOptions,
) -> Result<EnrichSummary> {
    let threshold = options.threshold.unwrap_or(DEFAULT_MISSING_THRESHOLD);

    let candidates = if let Some(id) = options.id {
        match db.get_place(id)? {
            Some(place) => vec![place],
            None => return Err(Error::Config(format!("no place with id {id}"))),
        }
    } else {
        let after = match options.start_id {
            Some(id) => Some(id),
            None => db.enrich_checkpoint()?,
        };
        db.enrichment_candidates(threshold, after, options.limit)?
    };

    // A previous halted run stays on disk for the audit trail but must
    // not block this one; the checkpoint already carries its progress.
    SessionManager::new(db).supersede_incomplete(SessionKind::Enrich)?;

    let mut session = SessionManager::new(db).start(
        SessionKind::Enrich,
        candidates.len() as i64,
        &SessionPlan::default(),
    )?;

    let mut summary = EnrichSummary {
        session_id: session.id.clone(),
        candidates: candidates.len(),
        ..EnrichSummary::default()
    };

    if candidates.is_empty() {
        info!("Nothing to enrich at threshold {}", threshold);
        SessionManager::new(db).complete(&mut session)?;
        summary.completed = true;
        return Ok(summary);
    }

    let bar = ProgressBar::new(candidates.len() as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} records {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );

    for (position, place) in candidates.iter().enumerate() {
        bar.set_message(place.name.clone());

        let Some(url) = place.listing_url.as_deref() else {
            debug!("Place {} '{}' has no listing URL; skipping", place.id, place.name);
            summary.skipped += 1;
            finish_record(db, &mut session, place.id, position, options.id.is_none())?;
            bar.inc(1);
            continue;
        };

        debug!(
            "Place {} '{}' missing {} fields",
            place.id,
            place.name,
            place.missing_field_count()
        );

        // Pacing comes first so even the initial fetch is delayed.
        tokio::time::sleep(Duration::from_secs(config.enhance_delay_secs)).await;

        match fetch_detail(reader, config, url).await {
            Ok(fragment) => {
                let patch = detail_patch(&fragment);
                if patch.is_empty() {
                    debug!("Detail page for place {} yielded nothing new", place.id);
                    summary.skipped += 1;
                } else {
                    db.update_missing_fields(place.id, &patch)?;
                    summary.enriched += 1;
                }
            }
            Err(e) if e.is_transient() => {
                // Retries are exhausted; one record lost to a flaky
                // response is acceptable and the run keeps going.
                warn!("Place {} fetch failed ({}); skipping", place.id, e);
                summary.skipped += 1;
            }
            Err(e) => {
                let message = format!("place {}: {e}", place.id);
                SessionManager::new(db).fail(&mut session, &message)?;
                summary.error = Some(message);
                bar.abandon_with_message("halted");
                return Ok(summary);
            }
        }

        finish_record(db, &mut session, place.id, position, options.id.is_none())?;
        bar.inc(1);
    }

    SessionManager::new(db).complete(&mut session)?;
    summary.completed = true;
    bar.finish_with_message("done");
    Ok(summary)
}

/// One detail fetch with bounded retries, the same policy the crawl
/// pass applies to map views. Only transient failures are retried.
async fn fetch_detail<R: PageReader>(
    reader: &mut R,
    config: &Config,
    url: &str,
) -> grazer_reader::error::Result<grazer_reader::RawDetailFragment> {
    let mut attempt = 0u32;
    loop {
        match reader.load_detail(url).await {
            Ok(fragment) => return Ok(fragment),
            Err(e) if e.is_transient() && attempt + 1 < config.max_retries => {
                attempt += 1;
                let backoff = config.enhance_delay_secs * u64::from(attempt);
                warn!(
                    "Detail fetch attempt {}/{} failed ({}); retrying in {}s",
                    attempt, config.max_retries, e, backoff
                );
                tokio::time::sleep(Duration::from_secs(backoff)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Durable per-record bookkeeping: session progress plus the resume
/// checkpoint. Single-record runs leave the checkpoint alone.
fn finish_record(
    db: &Database,
    session: &mut crate::session::Session,
    place_id: i64,
    position: usize,
    move_checkpoint: bool,
) -> Result<()> {
    SessionManager::new(db).advance(session, (position + 1) as i64, (position + 1) as i64)?;
    if move_checkpoint {
        db.set_enrich_checkpoint(place_id)?;
    }
    Ok(())
}
