//! svgscale
//!
//! Convert an SVG image into a PNG at one of a fixed set of integer scale
//! factors, keeping the preview and the exported file consistent.
//!
//! # Features
//!
//! - **resvg backend** (default): pure-Rust rasterization via `resvg`
//! - **Pluggable engines**: anything implementing [`Rasterizer`] can drive the pipeline
//! - **Stale-result safety**: renders are tagged and late results are discarded
//!
//! # Example
//!
//! ```no_run
//! use svgscale::{ConverterConfig, DirectoryHost, Pipeline, ScaleFactor, SourceDocument};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConverterConfig::default();
//! let pipeline = Pipeline::new(svgscale::engine::default_rasterizer(), &config);
//! pipeline.ready().await?;
//!
//! pipeline.upload(SourceDocument::from_path("logo.svg")?).await;
//! pipeline.set_scale(ScaleFactor::X4).await;
//!
//! let written = pipeline.export(&DirectoryHost::new(&config.output_dir)).await?;
//! println!("{:?}", written); // Some("./logo-4x.png")
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod error;
pub use error::{Error, Result};

pub mod dimensions;
pub mod engine;
pub mod export;
pub mod pipeline;
pub mod render;
pub mod scale;
pub mod source;

pub use dimensions::{extract_dimensions, Metadata};
pub use engine::{EngineResource, Rasterizer, ReadinessState, RenderOptions, Rgba};
pub use export::{artifact_name, Artifact, DirectoryHost, DownloadHost};
pub use pipeline::{Phase, Pipeline, PipelineStats, RasterResult, RenderOutcome, RenderTag, SkipReason};
pub use scale::{ScaleFactor, TargetSize};
pub use source::SourceDocument;

/// Configuration for the conversion pipeline
///
/// The defaults are conservative:
/// - fonts come from the bundled directory plus the host's installed fonts
/// - a single render may take up to 30 seconds
/// - exports land in the current directory
///
/// # Examples
///
/// ```
/// let cfg = svgscale::ConverterConfig::default();
/// assert_eq!(cfg.render_timeout_ms, 30_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Resource handed to the engine's one-time initialization
    pub engine_resource: EngineResource,
    /// Per-render timeout in milliseconds (0 => disabled)
    pub render_timeout_ms: u64,
    /// Directory the directory download host writes into
    pub output_dir: PathBuf,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            engine_resource: EngineResource::default(),
            render_timeout_ms: 30_000,
            output_dir: PathBuf::from("."),
        }
    }
}

impl ConverterConfig {
    /// Load a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::ConfigError("output_dir must not be empty".into()));
        }
        if self.output_dir.is_file() {
            return Err(Error::ConfigError(format!(
                "output_dir {} is a file",
                self.output_dir.display()
            )));
        }
        Ok(())
    }
}
