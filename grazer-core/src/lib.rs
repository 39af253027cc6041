pub mod config;
pub mod data;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod grid;
pub mod model;
pub mod scrape;
pub mod session;

pub use config::Config;
pub use data::{Database, InsertOutcome};
pub use enrich::{EnrichOptions, EnrichSummary, run_enrich};
pub use error::{Error, Result};
pub use extract::{RejectReason, detail_patch, extract_place};
pub use grid::{Bounds, Region, Sector, SectorGrid};
pub use model::{Place, PlacePatch};
pub use scrape::{ScrapeOptions, ScrapeSummary, run_resume, run_scrape};
pub use session::{Session, SessionKind, SessionManager, SessionPlan};
