//! Rasterization engine boundary.
//!
//! The engine is a black box: it is initialized once with an
//! [`EngineResource`] and then turns SVG text plus already-scaled target
//! dimensions into PNG bytes. Both calls complete asynchronously.

pub mod readiness;

#[cfg(feature = "resvg")]
pub mod resvg;

pub use readiness::{Readiness, ReadinessState};

use crate::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Font directory shipped with the crate, resolved at build time.
pub const BUNDLED_FONT_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/fonts");

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// Fully transparent black, the only background this system renders with
    pub const TRANSPARENT: Rgba = Rgba { r: 0, g: 0, b: 0, a: 0 };

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({},{},{},{})", self.r, self.g, self.b, f32::from(self.a) / 255.0)
    }
}

/// Options passed to the engine with each render call.
///
/// `width`/`height` are the scaled target pixel dimensions; `scale` is the
/// factor that produced them and must agree with them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub background_color: Rgba,
    pub scale: u32,
    pub width: u32,
    pub height: u32,
}

/// Resource consumed by the one-time engine initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineResource {
    /// Directory of `.ttf`/`.otf` files loaded into the font database
    pub font_dir: PathBuf,
    /// Also load fonts installed on the host
    pub system_fonts: bool,
}

impl EngineResource {
    /// Whether `font_dir` is the build-time default (allowed to be absent).
    pub fn is_bundled(&self) -> bool {
        self.font_dir == PathBuf::from(BUNDLED_FONT_DIR)
    }
}

impl Default for EngineResource {
    fn default() -> Self {
        Self {
            font_dir: PathBuf::from(BUNDLED_FONT_DIR),
            system_fonts: true,
        }
    }
}

/// Core trait for rasterization engine implementations.
///
/// Implementations must be deterministic: identical `(svg, options)` input
/// yields identical bytes.
pub trait Rasterizer: Send + Sync + 'static {
    /// One-time asynchronous setup. Called exactly once, before any render.
    fn initialize(&self, resource: EngineResource) -> BoxFuture<'static, Result<()>>;

    /// Render `svg` to PNG bytes at `options.width` x `options.height`.
    fn render(&self, svg: Arc<str>, options: RenderOptions) -> BoxFuture<'static, Result<Vec<u8>>>;
}

impl<R: Rasterizer + ?Sized> Rasterizer for Arc<R> {
    fn initialize(&self, resource: EngineResource) -> BoxFuture<'static, Result<()>> {
        (**self).initialize(resource)
    }

    fn render(&self, svg: Arc<str>, options: RenderOptions) -> BoxFuture<'static, Result<Vec<u8>>> {
        (**self).render(svg, options)
    }
}

/// Create the default engine for this build.
#[cfg(feature = "resvg")]
pub fn default_rasterizer() -> self::resvg::ResvgRasterizer {
    self::resvg::ResvgRasterizer::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transparent_background_formats_as_css() {
        assert_eq!(Rgba::TRANSPARENT.to_string(), "rgba(0,0,0,0)");
        assert!(Rgba::TRANSPARENT.is_transparent());
    }

    #[test]
    fn default_resource_points_at_bundled_fonts() {
        let res = EngineResource::default();
        assert!(res.is_bundled());
        assert!(res.system_fonts);
        assert!(res.font_dir.ends_with("assets/fonts"));
    }
}
