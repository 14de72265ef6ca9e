use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClipVaultError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Dataset not found at {}: run a crawl for this profile first", .0.display())]
    DatasetMissing(PathBuf),

    #[error("Vector index not found at {}: build the index for this profile first", .0.display())]
    IndexMissing(PathBuf),

    #[error("Query vector dimension {query} does not match index dimension {index}")]
    DimensionMismatch { query: usize, index: usize },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
