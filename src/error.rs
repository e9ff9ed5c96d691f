use thiserror::Error;

/// Errors surfaced by the evaluation pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// An event row could not be parsed. Ingestion aborts on the first
    /// malformed row; there is no best-effort mode.
    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// Negative sampling hit the retry cap for a user. Retryable: the
    /// caller may sample again or drop the user.
    #[error("negative sampling exhausted after {retries} attempts for user index {user}")]
    SamplingExhausted { user: usize, retries: usize },

    /// The item-embedding collaborator has no vector for an item needed by
    /// soft-MRR. The affected user's soft score is unavailable.
    #[error("missing embedding for item {item}")]
    MissingEmbedding { item: u64 },

    /// A model consumer referenced a user or item index outside the range
    /// the model was constructed with.
    #[error("index out of range: {kind} {index} (size {size})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        size: usize,
    },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache error: {0}")]
    Cache(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
