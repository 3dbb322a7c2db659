//! Pipeline controller: owns the canonical conversion state.
//!
//! Every state change goes through [`State::apply`], which is the transition
//! table for upload, scale change, export and cancel. A change that needs a
//! fresh raster yields a [`RenderJob`] tagged with the (document revision,
//! scale) pair it targets; when the render resolves, its bytes are committed
//! only if that tag still matches the current state. Overlapping renders are
//! allowed to race and stale results are discarded instead of cancelled.
//!
//! The state mutex is never held across an await, so the controller is
//! usable from a single cooperative thread as well as from spawned tasks.

use crate::dimensions::{extract_dimensions, Metadata};
use crate::engine::{Rasterizer, Readiness, ReadinessState};
use crate::render::RenderInvoker;
use crate::scale::{ScaleFactor, TargetSize};
use crate::source::SourceDocument;
use crate::{ConverterConfig, Result};
use base64::Engine as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type OnRenderHandler = Arc<dyn Fn(&RenderOutcome) + Send + Sync>;

/// Coarse pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No document loaded
    Empty,
    /// A document is loaded but no raster matches it yet
    Loaded,
    /// At least one render is in flight
    Rendering,
    /// The raster matches the current document and scale
    Rendered,
}

/// Identifies the state a render was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTag {
    pub revision: u64,
    pub scale: ScaleFactor,
}

/// Why a change did not lead to a render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoDocument,
    ZeroDimensions,
}

/// Result of a state change that may have triggered a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The render resolved and its bytes are now the current raster
    Rendered(RenderTag),
    /// No render was issued
    Skipped(SkipReason),
    /// The render resolved after the state moved on; its bytes were dropped
    Superseded(RenderTag),
    /// The engine failed; the previous raster was left in place
    Failed(String),
}

impl RenderOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, RenderOutcome::Rendered(_))
    }
}

/// PNG bytes together with the state that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterResult {
    pub bytes: Arc<[u8]>,
    pub tag: RenderTag,
    pub size: TargetSize,
}

/// Counters exposed for observability and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub extractions: u64,
    pub renders_issued: u64,
    pub renders_committed: u64,
    pub renders_discarded: u64,
    pub render_failures: u64,
}

/// Events that drive the transition table
#[derive(Debug)]
enum Change {
    DocumentReplaced(SourceDocument),
    ScaleChanged(ScaleFactor),
    ExportRequested,
    Cancelled,
}

/// Work item for one render, snapshotting everything it needs.
struct RenderJob {
    tag: RenderTag,
    svg: Arc<str>,
    metadata: Metadata,
}

#[derive(Default)]
struct State {
    document: Option<SourceDocument>,
    revision: u64,
    metadata: Metadata,
    scale: ScaleFactor,
    raster: Option<RasterResult>,
    in_flight: usize,
    stats: PipelineStats,
}

impl State {
    fn current_tag(&self) -> RenderTag {
        RenderTag {
            revision: self.revision,
            scale: self.scale,
        }
    }

    fn is_fresh(&self) -> bool {
        self.document.is_some()
            && self
                .raster
                .as_ref()
                .is_some_and(|r| r.tag == self.current_tag())
    }

    fn phase(&self) -> Phase {
        if self.document.is_none() {
            Phase::Empty
        } else if self.in_flight > 0 {
            Phase::Rendering
        } else if self.is_fresh() {
            Phase::Rendered
        } else {
            Phase::Loaded
        }
    }

    fn apply(&mut self, change: Change) -> std::result::Result<RenderJob, SkipReason> {
        match change {
            Change::DocumentReplaced(doc) => {
                self.revision += 1;
                self.stats.extractions += 1;
                // Extraction completes here, before the render it feeds is issued.
                self.metadata = match extract_dimensions(doc.text()) {
                    Ok(m) => m,
                    Err(e) => {
                        log::warn!("{}: {}", doc.name(), e);
                        Metadata::default()
                    }
                };
                log::debug!(
                    "loaded {} (revision {}, {}w x {}h)",
                    doc.name(),
                    self.revision,
                    self.metadata.width,
                    self.metadata.height
                );
                self.document = Some(doc);
                // The previous document's raster never previews the new one.
                self.raster = None;
                self.issue()
            }
            Change::ScaleChanged(scale) => {
                log::debug!("scale {} -> {}", self.scale, scale);
                self.scale = scale;
                self.issue()
            }
            Change::ExportRequested => self.issue(),
            Change::Cancelled => {
                // Outstanding InFlight guards still decrement this count.
                *self = State {
                    revision: self.revision + 1,
                    in_flight: self.in_flight,
                    stats: self.stats,
                    ..State::default()
                };
                log::debug!("cancelled, pipeline reset");
                Err(SkipReason::NoDocument)
            }
        }
    }

    fn issue(&mut self) -> std::result::Result<RenderJob, SkipReason> {
        let doc = self.document.as_ref().ok_or(SkipReason::NoDocument)?;
        if !self.metadata.is_renderable() || self.scale.apply(self.metadata).is_empty() {
            return Err(SkipReason::ZeroDimensions);
        }
        self.in_flight += 1;
        self.stats.renders_issued += 1;
        Ok(RenderJob {
            tag: self.current_tag(),
            svg: doc.shared_text(),
            metadata: self.metadata,
        })
    }
}

struct Inner<R: Rasterizer> {
    invoker: RenderInvoker<R>,
    state: Mutex<State>,
    on_render: Mutex<Option<OnRenderHandler>>,
}

impl<R: Rasterizer> Inner<R> {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Decrements the in-flight count even when a render future is dropped early.
struct InFlight<'a>(&'a Mutex<State>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut st = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        st.in_flight = st.in_flight.saturating_sub(1);
    }
}

/// The conversion pipeline for a single image.
///
/// Cheap to clone; clones share the same state.
pub struct Pipeline<R: Rasterizer> {
    inner: Arc<Inner<R>>,
}

impl<R: Rasterizer> Clone for Pipeline<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Rasterizer> Pipeline<R> {
    /// Create a pipeline and schedule the engine's one-time initialization.
    ///
    /// Inside a tokio runtime initialization starts in the background right
    /// away; otherwise it starts the first time anything awaits it.
    pub fn new(engine: R, config: &ConverterConfig) -> Self {
        let engine = Arc::new(engine);
        let readiness = Readiness::begin(engine.initialize(config.engine_resource.clone()));
        if tokio::runtime::Handle::try_current().is_ok() {
            readiness.spawn();
        }
        Self {
            inner: Arc::new(Inner {
                invoker: RenderInvoker::new(engine, readiness, config.render_timeout_ms),
                state: Mutex::new(State::default()),
                on_render: Mutex::new(None),
            }),
        }
    }

    /// Await engine initialization.
    pub async fn ready(&self) -> Result<()> {
        self.inner.invoker.readiness().wait().await
    }

    pub fn readiness_state(&self) -> ReadinessState {
        self.inner.invoker.readiness().state()
    }

    /// Replace the source document, extract its dimensions and render it.
    pub async fn upload(&self, doc: SourceDocument) -> RenderOutcome {
        self.dispatch(Change::DocumentReplaced(doc)).await
    }

    /// Select a new scale and re-render the current document.
    pub async fn set_scale(&self, scale: ScaleFactor) -> RenderOutcome {
        self.dispatch(Change::ScaleChanged(scale)).await
    }

    /// Render the current state again regardless of freshness.
    pub async fn force_render(&self) -> RenderOutcome {
        self.dispatch(Change::ExportRequested).await
    }

    /// Drop the document and reset everything to defaults.
    ///
    /// Renders still in flight resolve against a newer revision and are
    /// discarded.
    pub fn cancel(&self) {
        let _ = self.inner.lock().apply(Change::Cancelled);
    }

    /// Register a callback invoked with every render outcome.
    pub fn on_render<F>(&self, cb: F)
    where
        F: Fn(&RenderOutcome) + Send + Sync + 'static,
    {
        *self
            .inner
            .on_render
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(cb));
    }

    /// Remove a previously registered on_render callback if any
    pub fn clear_on_render(&self) {
        *self
            .inner
            .on_render
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase()
    }

    pub fn metadata(&self) -> Metadata {
        self.inner.lock().metadata
    }

    pub fn scale(&self) -> ScaleFactor {
        self.inner.lock().scale
    }

    /// Current metadata at the current scale
    pub fn scaled_size(&self) -> TargetSize {
        let st = self.inner.lock();
        st.scale.apply(st.metadata)
    }

    pub fn document_name(&self) -> Option<String> {
        self.inner.lock().document.as_ref().map(|d| d.name().to_string())
    }

    pub fn has_document(&self) -> bool {
        self.inner.lock().document.is_some()
    }

    /// Last committed raster, which may be stale.
    pub fn raster(&self) -> Option<RasterResult> {
        self.inner.lock().raster.clone()
    }

    /// Whether the last committed raster matches the current document and scale.
    pub fn is_fresh(&self) -> bool {
        self.inner.lock().is_fresh()
    }

    /// The raster and document name, only when the raster is fresh.
    pub(crate) fn fresh_raster(&self) -> Option<(String, ScaleFactor, RasterResult)> {
        let st = self.inner.lock();
        if !st.is_fresh() {
            return None;
        }
        let doc = st.document.as_ref()?;
        let raster = st.raster.clone()?;
        Some((doc.name().to_string(), st.scale, raster))
    }

    /// `data:` URI of the current raster for preview display.
    pub fn preview_data_uri(&self) -> Option<String> {
        let raster = self.raster()?;
        let b64 = base64::engine::general_purpose::STANDARD.encode(&raster.bytes);
        Some(format!("data:image/png;base64,{}", b64))
    }

    pub fn stats(&self) -> PipelineStats {
        self.inner.lock().stats
    }

    async fn dispatch(&self, change: Change) -> RenderOutcome {
        let job = self.inner.lock().apply(change);
        let outcome = match job {
            Ok(job) => self.run(job).await,
            Err(reason) => {
                log::debug!("render skipped: {:?}", reason);
                RenderOutcome::Skipped(reason)
            }
        };
        self.notify(&outcome);
        outcome
    }

    async fn run(&self, job: RenderJob) -> RenderOutcome {
        let _in_flight = InFlight(&self.inner.state);
        let scale = job.tag.scale;
        let result = self.inner.invoker.invoke(job.svg, job.metadata, scale).await;

        let mut st = self.inner.lock();
        match result {
            Ok(bytes) if st.current_tag() == job.tag && st.document.is_some() => {
                log::info!("generated {} bytes at {}", bytes.len(), scale);
                st.raster = Some(RasterResult {
                    bytes: bytes.into(),
                    tag: job.tag,
                    size: scale.apply(job.metadata),
                });
                st.stats.renders_committed += 1;
                RenderOutcome::Rendered(job.tag)
            }
            Ok(_) => {
                log::debug!(
                    "discarding render for {:?}; current is {:?}",
                    job.tag,
                    st.current_tag()
                );
                st.stats.renders_discarded += 1;
                RenderOutcome::Superseded(job.tag)
            }
            Err(e) => {
                log::warn!("render at {} failed: {}", scale, e);
                st.stats.render_failures += 1;
                RenderOutcome::Failed(e.to_string())
            }
        }
    }

    fn notify(&self, outcome: &RenderOutcome) {
        let cb = self
            .inner
            .on_render
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(cb) = cb {
            cb(outcome);
        }
    }
}
