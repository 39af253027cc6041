use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("record store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error(transparent)]
    Reader(#[from] grazer_reader::ReadError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown region '{0}' (expected central, east, west, north, northeast or south)")]
    UnknownRegion(String),

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("session {0} is already completed and cannot be resumed")]
    SessionCompleted(String),

    #[error("session {id} is a {kind} session and cannot be resumed as a crawl")]
    SessionKindMismatch { id: String, kind: String },

    #[error("an incomplete {0} session already exists; resume it or run clear-db --sessions")]
    ActiveSessionExists(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
