use std::time::Duration;

use grazer_reader::PageReader;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::data::{Database, InsertOutcome};
use crate::error::{Error, Result};
use crate::extract::extract_place;
use crate::grid::{Region, Sector, SectorGrid};
use crate::session::{Session, SessionKind, SessionManager, SessionPlan};

#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    pub region: Option<Region>,
    /// Plan position to begin from; skipped sectors still count toward
    /// the total so a later resume covers them.
    pub start: Option<usize>,
    /// Cap on sectors processed during this invocation.
    pub max: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ScrapeSummary {
    pub session_id: String,
    pub sectors_processed: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub completed: bool,
    pub error: Option<String>,
}

/// Start a fresh crawl session and drive it as far as the options
/// allow. Refuses to start while an incomplete scrape session exists.
pub async fn run_scrape<R: PageReader>(
    db: &mut Database,
    reader: &mut R,
    config: &Config,
    options: &ScrapeOptions,
) -> Result<ScrapeSummary> {
    let grid = SectorGrid::from_config(config);
    let plan = plan_sectors(&grid, options.region);

    let session_plan = SessionPlan {
        region: options.region.map(|r| r.as_str().to_string()),
        start: options.start,
        max: options.max,
    };
    let mut session = SessionManager::new(db)
        .start(SessionKind::Scrape, plan.len() as i64, &session_plan)?;

    // Skipped leading sectors move the cursor but are not work done.
    if let Some(start) = options.start
        && start > 0
    {
        let start = start.min(plan.len());
        SessionManager::new(db).advance(&mut session, 0, start as i64)?;
    }

    drive(db, reader, config, &mut session, &plan, options.max).await
}

/// Continue a previously interrupted session from its stored cursor,
/// rebuilding the sector plan from the persisted run configuration.
pub async fn run_resume<R: PageReader>(
    db: &mut Database,
    reader: &mut R,
    config: &Config,
    session_id: &str,
    max: Option<usize>,
) -> Result<ScrapeSummary> {
    let manager = SessionManager::new(db);
    let mut session = manager.resume(session_id)?;
    if session.kind != SessionKind::Scrape.as_str() {
        return Err(Error::SessionKindMismatch {
            id: session.id,
            kind: session.kind,
        });
    }
    let stored = manager.plan_of(&session)?;

    let region = stored
        .region
        .as_deref()
        .map(str::parse::<Region>)
        .transpose()?;
    let grid = SectorGrid::from_config(config);
    let plan = plan_sectors(&grid, region);

    let max = max.or(stored.max);
    drive(db, reader, config, &mut session, &plan, max).await
}

fn plan_sectors(grid: &SectorGrid, region: Option<Region>) -> Vec<Sector> {
    match region {
        Some(region) => grid.sectors_in(region),
        None => grid.sectors(),
    }
}

async fn drive<R: PageReader>(
    db: &mut Database,
    reader: &mut R,
    config: &Config,
    session: &mut Session,
    plan: &[Sector],
    max: Option<usize>,
) -> Result<ScrapeSummary> {
    let begin = (session.cursor as usize).min(plan.len());
    let budget = max.unwrap_or(usize::MAX);

    let mut summary = ScrapeSummary {
        session_id: session.id.clone(),
        ..ScrapeSummary::default()
    };

    let bar = ProgressBar::new(plan.len() as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} sectors {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );
    bar.set_position(begin as u64);

    for (offset, sector) in plan[begin..].iter().enumerate() {
        if offset >= budget {
            break;
        }
        let position = begin + offset;
        bar.set_message(format!("sector {} (r{} c{})", sector.index, sector.row, sector.col));

        match fetch_sector(reader, config, sector).await {
            Ok(fragments) => {
                let (inserted, duplicates, rejected) = store_fragments(db, &fragments)?;
                summary.inserted += inserted;
                summary.duplicates += duplicates;
                summary.rejected += rejected;
                debug!(
                    "Sector {}: {} new, {} duplicate, {} rejected",
                    sector.index, inserted, duplicates, rejected
                );
            }
            Err(e) => {
                // Fatal for the run, not for the session.
                let message = format!("sector {}: {e}", sector.index);
                SessionManager::new(db).fail(session, &message)?;
                summary.sectors_processed = position - begin;
                summary.error = Some(message);
                bar.abandon_with_message("halted");
                return Ok(summary);
            }
        }

        // Progress is durable before pacing, so an interrupt during the
        // sleep replays nothing.
        let processed = session.processed_units + 1;
        SessionManager::new(db).advance(session, processed, (position + 1) as i64)?;
        summary.sectors_processed = position + 1 - begin;
        bar.inc(1);

        if position + 1 < plan.len() && summary.sectors_processed < budget {
            tokio::time::sleep(Duration::from_secs(config.delay_secs)).await;
        }
    }

    if session.cursor as usize >= plan.len() {
        SessionManager::new(db).complete(session)?;
        summary.completed = true;
        bar.finish_with_message("done");
    } else {
        bar.finish_with_message("paused");
        info!(
            "Session {} paused at sector {}/{}; resume with this id",
            session.short_id(),
            session.cursor,
            plan.len()
        );
    }

    Ok(summary)
}

/// One sector fetch with bounded retries. Only transient failures are
/// retried; a block signal or parse-level failure surfaces immediately.
async fn fetch_sector<R: PageReader>(
    reader: &mut R,
    config: &Config,
    sector: &Sector,
) -> grazer_reader::error::Result<Vec<grazer_reader::RawFragment>> {
    let view = sector.view(config.zoom);
    let mut attempt = 0u32;
    loop {
        match reader.load_map(&view).await {
            Ok(fragments) => return Ok(fragments),
            Err(e) if e.is_transient() && attempt + 1 < config.max_retries => {
                attempt += 1;
                let backoff = config.delay_secs * u64::from(attempt + 1);
                warn!(
                    "Sector {} attempt {}/{} failed ({}); retrying in {}s",
                    sector.index, attempt, config.max_retries, e, backoff
                );
                tokio::time::sleep(Duration::from_secs(backoff)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn store_fragments(
    db: &mut Database,
    fragments: &[grazer_reader::RawFragment],
) -> Result<(usize, usize, usize)> {
    let mut places = Vec::with_capacity(fragments.len());
    let mut rejected = 0;
    let mut duplicates = 0;
    // The page repeats some markers across card variants; drop repeats
    // of a coordinate pair before they reach the store.
    let mut seen = std::collections::HashSet::new();
    for fragment in fragments {
        match extract_place(fragment) {
            Ok(place) => {
                if seen.insert((place.latitude.to_bits(), place.longitude.to_bits())) {
                    places.push(place);
                } else {
                    duplicates += 1;
                }
            }
            Err(reason) => {
                rejected += 1;
                debug!("Rejected fragment: {}", reason);
            }
        }
    }

    let mut inserted = 0;
    for outcome in db.insert_batch(&places)? {
        match outcome {
            InsertOutcome::Inserted(_) => inserted += 1,
            InsertOutcome::AlreadyExists => duplicates += 1,
            InsertOutcome::Failed => rejected += 1,
        }
    }
    Ok((inserted, duplicates, rejected))
}
