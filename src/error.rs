use thiserror::Error;

/// Errors raised at the host-facing edges of the editor. Editing operations
/// themselves never fail.
#[derive(Debug, Error)]
pub enum TrimapError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("trimap is {}x{} but the image is {}x{}", found.0, found.1, expected.0, expected.1)]
    DimensionMismatch { expected: (u32, u32), found: (u32, u32) },

    #[error("image has zero area")]
    EmptyImage,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings error: {0}")]
    Settings(#[from] serde_json::Error),
}
