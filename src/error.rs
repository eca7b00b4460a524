/// Failures at the I/O edges of the crate.
///
/// Domain operations never fail; only loading, saving and parsing do.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid transcript: {0}")]
    Transcript(String),
}

pub type Result<T> = std::result::Result<T, Error>;
