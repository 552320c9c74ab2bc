//! Error taxonomy shared across the comprehension pipeline.
//!
//! Every fallible operation in the crate returns [`Error`]. Per-chunk
//! embedding failures are the only errors absorbed locally (the aggregator
//! is fail-soft); everything else propagates to the workflow controller,
//! which maps it to an HTTP status in the server layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// PDF (or other document) text extraction failed.
    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),

    /// Upload to object storage failed.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// The embedding endpoint produced no usable vectors.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Chunk vectors (or reference/candidate vectors) disagree on dimensionality.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A vector is empty or has zero norm, so similarity is undefined.
    #[error("invalid vector: {0}")]
    InvalidVector(String),

    /// A referenced entity does not exist in the knowledge store.
    #[error("{0} not found")]
    NotFound(String),

    /// The knowledge store could not be reached or rejected the operation.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Question generation failed or returned nothing parseable.
    #[error("question generation failed: {0}")]
    GenerationFailed(String),

    /// Speech-to-text transcription failed.
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Error::NotFound("row".to_string()),
            other => Error::StoreUnavailable(other.to_string()),
        }
    }
}
