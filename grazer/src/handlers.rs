use std::io::{self, Write};

use anyhow::{Context, bail};
use chrono::DateTime;
use clap::ArgMatches;
use colored::Colorize;
use grazer_core::config::Config;
use grazer_core::data::Database;
use grazer_core::enrich::{EnrichOptions, run_enrich};
use grazer_core::grid::{Region, SectorGrid};
use grazer_core::scrape::{ScrapeOptions, ScrapeSummary, run_resume, run_scrape};
use grazer_core::session::SessionManager;
use grazer_reader::{HttpPageReader, PageReader};

fn open_database(config: &Config) -> anyhow::Result<Database> {
    Database::new(&config.db_path)
        .with_context(|| format!("cannot open database at {}", config.db_path.display()))
}

fn print_divider() {
    println!("{}", "─".repeat(60).bright_green());
}

fn print_prompt(msg: &str) -> String {
    print!("{} ", msg.bright_cyan().bold());
    let _ = io::stdout().flush();
    let mut response = String::new();
    let _ = io::stdin().read_line(&mut response);
    response.trim().to_lowercase()
}

fn print_scrape_summary(summary: &ScrapeSummary) {
    print_divider();
    println!(
        "  {} sectors processed, {} new, {} duplicate, {} rejected",
        summary.sectors_processed.to_string().bright_white().bold(),
        summary.inserted.to_string().green(),
        summary.duplicates.to_string().yellow(),
        summary.rejected.to_string().red(),
    );
    if summary.completed {
        println!("  {} session {}", "Completed".green().bold(), summary.session_id);
    } else {
        println!(
            "  {} session {} (resume with: grazer resume {})",
            "Paused".yellow().bold(),
            summary.session_id,
            &summary.session_id[..8]
        );
    }
    print_divider();
}

pub async fn handle_scrape(args: &ArgMatches) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let mut db = open_database(&config)?;
    let mut reader = HttpPageReader::new(config.base_url.clone());

    let region = args
        .get_one::<String>("region")
        .map(|r| r.parse::<Region>())
        .transpose()?;
    let options = ScrapeOptions {
        region,
        start: args.get_one::<usize>("start").copied(),
        max: args.get_one::<usize>("max").copied(),
    };

    println!(
        "{} {} sectors, {}s between requests",
        "Scraping".bright_green().bold(),
        match region {
            Some(r) => r.as_str().to_string(),
            None => "all".to_string(),
        },
        config.delay_secs
    );

    let summary = run_scrape(&mut db, &mut reader, &config, &options).await?;
    print_scrape_summary(&summary);
    if let Some(error) = &summary.error {
        bail!("run halted: {error}");
    }
    Ok(())
}

pub async fn handle_resume(args: &ArgMatches) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let mut db = open_database(&config)?;

    let session_id = match args.get_one::<String>("SESSION_ID") {
        Some(id) => id.clone(),
        None => {
            let incomplete = SessionManager::new(&db).incomplete()?;
            match incomplete.iter().find(|s| s.kind == "scrape") {
                Some(session) => session.id.clone(),
                None => bail!("no incomplete scrape session to resume"),
            }
        }
    };

    let mut reader = HttpPageReader::new(config.base_url.clone());
    let max = args.get_one::<usize>("max").copied();

    let summary = run_resume(&mut db, &mut reader, &config, &session_id, max).await?;
    print_scrape_summary(&summary);
    if let Some(error) = &summary.error {
        bail!("run halted: {error}");
    }
    Ok(())
}

fn format_timestamp(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub fn handle_list_sessions(args: &ArgMatches) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let db = open_database(&config)?;

    let sessions = if args.get_flag("all") {
        db.all_sessions()?
    } else {
        db.incomplete_sessions()?
    };

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    print_divider();
    for session in &sessions {
        let status = if session.completed {
            "done".green()
        } else if session.error.is_some() {
            "halted".red()
        } else {
            "active".yellow()
        };
        println!(
            "  {} {:7} [{:6}] {:>3}/{:<3} ({:.0}%) started {}",
            session.short_id().bright_white().bold(),
            session.kind,
            status,
            session.processed_units,
            session.total_units,
            session.progress_percent(),
            format_timestamp(session.started_at),
        );
        if let Some(error) = &session.error {
            println!("           {}", error.red());
        }
    }
    print_divider();
    Ok(())
}

pub async fn handle_enhance(args: &ArgMatches) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let mut db = open_database(&config)?;
    let mut reader = HttpPageReader::new(config.base_url.clone());

    let options = EnrichOptions {
        id: args.get_one::<i64>("id").copied(),
        start_id: args.get_one::<i64>("start-id").copied(),
        limit: args.get_one::<usize>("limit").copied(),
        threshold: args.get_one::<u32>("threshold").copied(),
    };

    println!(
        "{} with {}s between detail pages",
        "Enriching".bright_green().bold(),
        config.enhance_delay_secs
    );

    let summary = run_enrich(&mut db, &mut reader, &config, &options).await?;
    print_divider();
    println!(
        "  {} candidates, {} enriched, {} skipped",
        summary.candidates.to_string().bright_white().bold(),
        summary.enriched.to_string().green(),
        summary.skipped.to_string().yellow(),
    );
    print_divider();
    if let Some(error) = &summary.error {
        bail!("run halted: {error}");
    }
    Ok(())
}

/// Open the store and fetch one central sector, reporting what the
/// parser sees. No records are written, so this is a safe smoke check
/// against the live site.
pub async fn handle_test() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let db = open_database(&config)?;
    println!(
        "Store at {} holds {} records",
        config.db_path.display(),
        db.count_places()?.to_string().bright_white().bold()
    );

    let grid = SectorGrid::from_config(&config);
    let sectors = grid.sectors_in(Region::Central);
    let Some(sector) = sectors.first() else {
        bail!("grid too small to contain a central sector");
    };

    println!(
        "{} sector {} (r{} c{}) at ({:.4}, {:.4})",
        "Testing".bright_green().bold(),
        sector.index,
        sector.row,
        sector.col,
        sector.center_lat,
        sector.center_lng
    );

    let mut reader = HttpPageReader::new(config.base_url.clone());
    let fragments = reader.load_map(&sector.view(config.zoom)).await?;

    println!("Parsed {} fragments", fragments.len().to_string().bright_white().bold());
    for fragment in fragments.iter().take(5) {
        println!(
            "  {} ({}, {})",
            fragment.name.as_deref().unwrap_or("<unnamed>"),
            fragment.lat.as_deref().unwrap_or("?"),
            fragment.lng.as_deref().unwrap_or("?"),
        );
    }
    if fragments.is_empty() {
        println!(
            "{}",
            "No fragments parsed. The site layout may have changed.".yellow()
        );
    }
    Ok(())
}

pub fn handle_clear_db(args: &ArgMatches) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let include_sessions = args.get_flag("sessions");

    if !Database::exists(&config.db_path) {
        println!("No database at {}", config.db_path.display());
        return Ok(());
    }

    let db = open_database(&config)?;
    let count = db.count_places()?;

    if !args.get_flag("yes") {
        let response = print_prompt(&format!(
            "Delete {count} records from {}? [y/N]:",
            config.db_path.display()
        ));
        if response != "y" && response != "yes" {
            println!("Cancelled.");
            return Ok(());
        }
    }

    db.clear(include_sessions)?;
    println!("{} {count} records deleted", "Cleared.".green().bold());
    Ok(())
}
