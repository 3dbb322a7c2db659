//! Render invocation: readiness gating and target-size derivation.

use crate::dimensions::Metadata;
use crate::engine::{Rasterizer, Readiness, RenderOptions, Rgba};
use crate::scale::{ScaleFactor, TargetSize};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// Calls the engine on behalf of the pipeline.
///
/// Every call first awaits the shared [`Readiness`], so a render issued while
/// the engine is still initializing is deferred rather than dropped.
pub struct RenderInvoker<R: Rasterizer> {
    engine: Arc<R>,
    readiness: Readiness,
    timeout: Option<Duration>,
}

impl<R: Rasterizer> RenderInvoker<R> {
    /// `timeout_ms == 0` disables the per-render timeout.
    pub fn new(engine: Arc<R>, readiness: Readiness, timeout_ms: u64) -> Self {
        Self {
            engine,
            readiness,
            timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
        }
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    /// Options for rendering `metadata` at `scale` on a transparent background.
    pub fn options_for(metadata: Metadata, scale: ScaleFactor) -> RenderOptions {
        let TargetSize { width, height } = scale.apply(metadata);
        RenderOptions {
            background_color: Rgba::TRANSPARENT,
            scale: scale.value(),
            width,
            height,
        }
    }

    /// Render `svg` at `scale`, returning PNG bytes.
    ///
    /// Zero-sized targets are refused before the engine is touched.
    pub async fn invoke(&self, svg: Arc<str>, metadata: Metadata, scale: ScaleFactor) -> Result<Vec<u8>> {
        let options = Self::options_for(metadata, scale);
        if options.width == 0 || options.height == 0 {
            return Err(Error::MissingDimensions);
        }

        self.readiness.wait().await?;

        log::debug!(
            "rendering {}x{} at {} ({} bytes of SVG)",
            options.width,
            options.height,
            scale,
            svg.len()
        );
        let render = self.engine.render(svg, options);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, render)
                .await
                .map_err(|_| Error::Timeout(limit.as_millis() as u64))?,
            None => render.await,
        }
    }
}
