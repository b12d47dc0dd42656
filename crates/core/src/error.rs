#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Counter store error: {0}")]
    Store(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
