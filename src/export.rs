//! Export: naming the artifact and handing it to the host for download.

use crate::engine::Rasterizer;
use crate::pipeline::{Pipeline, RenderOutcome};
use crate::scale::{ScaleFactor, TargetSize};
use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A named PNG ready to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub bytes: Arc<[u8]>,
    pub size: TargetSize,
}

impl Artifact {
    /// Hex-encoded SHA-256 of the PNG bytes
    pub fn digest(&self) -> String {
        sha256_hex(&self.bytes)
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// `<name without .svg>-<scale>x.png`
///
/// Only a trailing `.svg` (any case) is stripped; other extensions are kept
/// as part of the stem.
pub fn artifact_name(display_name: &str, scale: ScaleFactor) -> String {
    let stem = match display_name.len().checked_sub(4) {
        Some(cut)
            if display_name.is_char_boundary(cut)
                && display_name[cut..].eq_ignore_ascii_case(".svg") =>
        {
            &display_name[..cut]
        }
        _ => display_name,
    };
    format!("{}-{}.png", stem, scale)
}

/// Host capability that turns an artifact into a user download.
///
/// A handle is a transient reference to staged bytes (think object URL). The
/// export handler always gives it back through [`DownloadHost::release`],
/// whether delivery succeeded or not.
pub trait DownloadHost {
    type Handle;
    type Delivered;

    fn create_handle(&self, artifact: &Artifact) -> Result<Self::Handle>;

    fn deliver(&self, handle: &Self::Handle, artifact: &Artifact) -> Result<Self::Delivered>;

    fn release(&self, handle: Self::Handle);
}

// Releases its handle on drop, covering early returns and panics alike.
struct ScopedHandle<'h, H: DownloadHost> {
    host: &'h H,
    handle: Option<H::Handle>,
}

impl<'h, H: DownloadHost> ScopedHandle<'h, H> {
    fn acquire(host: &'h H, artifact: &Artifact) -> Result<Self> {
        let handle = host.create_handle(artifact)?;
        Ok(Self {
            host,
            handle: Some(handle),
        })
    }

    fn get(&self) -> Result<&H::Handle> {
        self.handle
            .as_ref()
            .ok_or_else(|| Error::ExportError("download handle already released".into()))
    }
}

impl<H: DownloadHost> Drop for ScopedHandle<'_, H> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.host.release(handle);
        }
    }
}

/// Materialize `artifact` through `host`, releasing the handle afterwards.
pub fn deliver<H: DownloadHost>(host: &H, artifact: &Artifact) -> Result<H::Delivered> {
    let handle = ScopedHandle::acquire(host, artifact)?;
    // Bound first so the borrow of `handle` ends before it is released.
    #[allow(clippy::let_and_return)]
    let delivered = host.deliver(handle.get()?, artifact);
    delivered
}

/// Force a fresh render, then deliver the result.
///
/// Returns `Ok(None)` when there is nothing to export (no document, or a
/// document without renderable dimensions). A failed forced render is an
/// error here because the cached raster can no longer be trusted.
pub async fn export<R, H>(pipeline: &Pipeline<R>, host: &H) -> Result<Option<H::Delivered>>
where
    R: Rasterizer,
    H: DownloadHost,
{
    let outcome = pipeline.force_render().await;

    let Some((name, scale, raster)) = pipeline.fresh_raster() else {
        return match outcome {
            RenderOutcome::Failed(msg) => Err(Error::RenderError(msg)),
            _ => {
                log::debug!("nothing to export ({:?})", outcome);
                Ok(None)
            }
        };
    };

    let artifact = Artifact {
        name: artifact_name(&name, scale),
        bytes: raster.bytes,
        size: raster.size,
    };
    let delivered = deliver(host, &artifact)?;
    log::info!("exported {} ({})", artifact.name, artifact.size);
    Ok(Some(delivered))
}

impl<R: Rasterizer> Pipeline<R> {
    /// See [`export`].
    pub async fn export<H: DownloadHost>(&self, host: &H) -> Result<Option<H::Delivered>> {
        export(self, host).await
    }
}

/// Download host that writes artifacts into a directory.
///
/// The handle is a hidden `.part` file next to the destination; delivery
/// renames it into place and release removes whatever is left of it.
#[derive(Debug, Clone)]
pub struct DirectoryHost {
    dir: PathBuf,
}

/// Staged bytes on disk
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DirectoryHost {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadHost for DirectoryHost {
    type Handle = StagedFile;
    type Delivered = PathBuf;

    fn create_handle(&self, artifact: &Artifact) -> Result<StagedFile> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(format!(".{}.{}.part", artifact.name, std::process::id()));
        std::fs::write(&path, &artifact.bytes)?;
        Ok(StagedFile { path })
    }

    fn deliver(&self, handle: &StagedFile, artifact: &Artifact) -> Result<PathBuf> {
        let dest = self.dir.join(&artifact.name);
        std::fs::rename(&handle.path, &dest).map_err(|e| {
            Error::ExportError(format!("cannot write {}: {}", dest.display(), e))
        })?;
        Ok(dest)
    }

    fn release(&self, handle: StagedFile) {
        match std::fs::remove_file(&handle.path) {
            Ok(()) => log::debug!("removed staged {}", handle.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("failed to remove {}: {}", handle.path.display(), e),
        }
    }
}
