//! Error types for the conversion pipeline

use thiserror::Error;

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while converting an SVG into a PNG
#[derive(Error, Debug)]
pub enum Error {
    /// The rasterization engine failed to initialize
    #[error("Engine initialization failed: {0}")]
    InitializationError(String),

    /// A render reached the engine before its initialization settled
    #[error("Engine is not ready")]
    EngineNotReady,

    /// Uploaded content is not parseable as SVG
    #[error("Malformed SVG input: {0}")]
    MalformedInput(String),

    /// The SVG root lacks a usable explicit width/height
    #[error("SVG document has no explicit dimensions")]
    MissingDimensions,

    /// The engine rejected or failed a render
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// A render exceeded the configured timeout
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// The uploaded file is not an `.svg`
    #[error("Unsupported file: {0}")]
    UnsupportedFile(String),

    /// Materializing the artifact failed
    #[error("Export failed: {0}")]
    ExportError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Filesystem error from the host boundary
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures caused by the uploaded content rather than the engine.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Error::MalformedInput(_) | Error::MissingDimensions)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}
