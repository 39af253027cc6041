use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Enrichment pacing never goes below this, whatever the environment
/// says. Operators wanting a faster pass narrow the selection instead.
pub const MIN_ENHANCE_DELAY_SECS: u64 = 2;

/// Process-wide configuration, read from the environment exactly once
/// at startup and passed by reference into each component. Component
/// logic never touches ambient state itself.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub base_url: String,
    pub delay_secs: u64,
    pub enhance_delay_secs: u64,
    pub max_retries: u32,
    pub grid_rows: usize,
    pub grid_cols: usize,
    pub zoom: u8,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let db_path = env::var("GRAZER_DB")
            .unwrap_or_else(|_| "~/.config/grazer/grazer.db".to_string());
        let db_path = PathBuf::from(shellexpand::tilde(&db_path).as_ref());

        let base_url = env::var("GRAZER_BASE_URL")
            .unwrap_or_else(|_| "https://www.happycow.net".to_string());

        let config = Self {
            db_path,
            base_url,
            delay_secs: parse_var("GRAZER_DELAY_SECS", 2)?,
            enhance_delay_secs: parse_var("GRAZER_ENHANCE_DELAY_SECS", 3)?
                .max(MIN_ENHANCE_DELAY_SECS),
            max_retries: parse_var("GRAZER_MAX_RETRIES", 3)?,
            grid_rows: parse_var("GRAZER_GRID_ROWS", 6)?,
            grid_cols: parse_var("GRAZER_GRID_COLS", 8)?,
            zoom: 11,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.grid_rows == 0 || self.grid_cols == 0 {
            return Err(Error::Config(
                "grid dimensions must be non-zero".to_string(),
            ));
        }
        if self.base_url.is_empty() {
            return Err(Error::Config("GRAZER_BASE_URL must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("grazer.db"),
            base_url: "https://www.happycow.net".to_string(),
            delay_secs: 2,
            enhance_delay_secs: 3,
            max_retries: 3,
            grid_rows: 6,
            grid_cols: 8,
            zoom: 11,
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{name} has invalid value '{raw}'"))),
        Err(_) => Ok(default),
    }
}
