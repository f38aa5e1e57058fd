#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
