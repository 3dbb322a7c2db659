//! resvg-backed rasterizer.
//!
//! Parsing and painting are CPU bound, so both run on tokio's blocking pool
//! and the caller's task only suspends while waiting for them.

use super::{EngineResource, Rasterizer, RenderOptions};
use crate::{Error, Result};
use futures::future::{BoxFuture, FutureExt};
use ::resvg::tiny_skia::{Color, Pixmap, Transform};
use ::resvg::usvg::{self, fontdb};
use std::sync::{Arc, OnceLock};

/// Rasterizer that renders with `resvg` and encodes with `tiny-skia`.
#[derive(Clone, Default)]
pub struct ResvgRasterizer {
    fonts: Arc<OnceLock<Arc<fontdb::Database>>>,
}

impl ResvgRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of font faces loaded, `None` before initialization.
    pub fn font_count(&self) -> Option<usize> {
        self.fonts.get().map(|db| db.len())
    }
}

impl std::fmt::Debug for ResvgRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResvgRasterizer")
            .field("fonts", &self.font_count())
            .finish()
    }
}

impl Rasterizer for ResvgRasterizer {
    fn initialize(&self, resource: EngineResource) -> BoxFuture<'static, Result<()>> {
        let slot = Arc::clone(&self.fonts);
        async move {
            let db = tokio::task::spawn_blocking(move || load_fonts(&resource))
                .await
                .map_err(|e| Error::InitializationError(format!("font loader panicked: {}", e)))??;
            log::debug!("font database holds {} faces", db.len());
            slot.set(Arc::new(db))
                .map_err(|_| Error::InitializationError("engine already initialized".into()))
        }
        .boxed()
    }

    fn render(&self, svg: Arc<str>, options: RenderOptions) -> BoxFuture<'static, Result<Vec<u8>>> {
        let fonts = self.fonts.get().cloned();
        async move {
            let fonts = fonts.ok_or(Error::EngineNotReady)?;
            tokio::task::spawn_blocking(move || render_png(&svg, options, fonts))
                .await
                .map_err(|e| Error::RenderError(format!("render task panicked: {}", e)))?
        }
        .boxed()
    }
}

fn load_fonts(resource: &EngineResource) -> Result<fontdb::Database> {
    let mut db = fontdb::Database::new();

    if resource.font_dir.is_dir() {
        db.load_fonts_dir(&resource.font_dir);
    } else if resource.is_bundled() {
        log::debug!("bundled font directory {} not present", resource.font_dir.display());
    } else {
        return Err(Error::InitializationError(format!(
            "font directory {} does not exist",
            resource.font_dir.display()
        )));
    }

    if resource.system_fonts {
        db.load_system_fonts();
    }
    Ok(db)
}

fn render_png(svg: &str, options: RenderOptions, fonts: Arc<fontdb::Database>) -> Result<Vec<u8>> {
    if options.scale == 0 {
        return Err(Error::RenderError("scale must be positive".into()));
    }

    let opt = usvg::Options {
        fontdb: fonts,
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_str(svg, &opt)
        .map_err(|e| Error::RenderError(format!("failed to parse SVG: {}", e)))?;

    let mut pixmap = Pixmap::new(options.width, options.height).ok_or_else(|| {
        Error::RenderError(format!(
            "cannot allocate a {}x{} pixmap",
            options.width, options.height
        ))
    })?;

    let bg = options.background_color;
    if !bg.is_transparent() {
        pixmap.fill(Color::from_rgba8(bg.r, bg.g, bg.b, bg.a));
    }

    // Stretch the document's own size onto the target; with flooring the two
    // axes can differ by less than a pixel.
    let size = tree.size();
    let transform = Transform::from_scale(
        options.width as f32 / size.width(),
        options.height as f32 / size.height(),
    );
    ::resvg::render(&tree, transform, &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| Error::RenderError(format!("PNG encoding failed: {}", e)))
}
