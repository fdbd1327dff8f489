//! Error type shared by every part of the application.
//!
//! The three user-facing kinds map to what a researcher can run into while
//! working: an image the manifest cannot locate, an action the current state
//! does not allow, and a prediction file that is not what we expect. The
//! remaining variants wrap lower-level failures so `?` works everywhere.

use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Cannot locate image for '{0}'")]
    UnresolvableResource(String),

    #[error("{0}")]
    InvalidUserAction(String),

    #[error("Malformed prediction file: {0}")]
    MalformedImport(String),

    #[error("Class label must be 1 or more (got {0})")]
    InvalidClassLabel(u32),

    #[error("Image size must be non-zero (got {width}x{height})")]
    InvalidImageSize { width: f64, height: f64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings file error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Window error: {0}")]
    Gui(String),
}
