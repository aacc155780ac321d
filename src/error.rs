use thiserror::Error;

/// Per-record failure taxonomy. The batch runner turns these into typed
/// outcomes; none of them abort the batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("photo not found for cardholder {0}")]
    PhotoMissing(i64),

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("face detector failure: {0}")]
    Detector(String),

    #[error("cardholder api: {0}")]
    Api(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
