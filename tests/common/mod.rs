//! Shared helpers for pipeline integration tests
#![allow(dead_code)]

use futures::future::{BoxFuture, FutureExt};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use svgscale::{Artifact, DownloadHost, EngineResource, Error, Rasterizer, RenderOptions, Result};
use tokio::sync::oneshot;

pub const LOGO: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="16"><rect width="24" height="16"/></svg>"#;
pub const BADGE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10.5" height="3.25"/>"#;

/// Deterministic fake engine with hooks for ordering and failure tests.
///
/// Bytes are `PNG magic + sha256(svg, width, height)`, so identical input
/// always gives identical output.
#[derive(Default)]
pub struct ScriptedRasterizer {
    init_gate: Mutex<Option<oneshot::Receiver<()>>>,
    init_error: Mutex<Option<String>>,
    width_gates: Mutex<HashMap<u32, oneshot::Receiver<()>>>,
    failing_widths: Mutex<HashSet<u32>>,
    calls: Mutex<Vec<RenderOptions>>,
    completed: Arc<Mutex<Vec<RenderOptions>>>,
}

impl ScriptedRasterizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hold initialization until the returned sender fires.
    pub fn gate_initialization(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.init_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn fail_initialization(&self, msg: &str) {
        *self.init_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Hold the next render targeting `width` until the sender fires.
    pub fn gate_width(&self, width: u32) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.width_gates.lock().unwrap().insert(width, rx);
        tx
    }

    pub fn fail_width(&self, width: u32) {
        self.failing_widths.lock().unwrap().insert(width);
    }

    pub fn heal_width(&self, width: u32) {
        self.failing_widths.lock().unwrap().remove(&width);
    }

    /// Every render call that reached the engine, in call order
    pub fn calls(&self) -> Vec<RenderOptions> {
        self.calls.lock().unwrap().clone()
    }

    /// Renders that finished, in completion order
    pub fn completed(&self) -> Vec<RenderOptions> {
        self.completed.lock().unwrap().clone()
    }

    pub fn expected_bytes(svg: &str, width: u32, height: u32) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(svg.as_bytes());
        hasher.update(width.to_be_bytes());
        hasher.update(height.to_be_bytes());
        let mut out = b"\x89PNG\r\n\x1a\n".to_vec();
        out.extend_from_slice(&hasher.finalize());
        out
    }
}

impl Rasterizer for ScriptedRasterizer {
    fn initialize(&self, _resource: EngineResource) -> BoxFuture<'static, Result<()>> {
        let gate = self.init_gate.lock().unwrap().take();
        let error = self.init_error.lock().unwrap().clone();
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            match error {
                Some(msg) => Err(Error::InitializationError(msg)),
                None => Ok(()),
            }
        }
        .boxed()
    }

    fn render(&self, svg: Arc<str>, options: RenderOptions) -> BoxFuture<'static, Result<Vec<u8>>> {
        self.calls.lock().unwrap().push(options);
        let gate = self.width_gates.lock().unwrap().remove(&options.width);
        let fail = self.failing_widths.lock().unwrap().contains(&options.width);
        let completed = Arc::clone(&self.completed);
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            completed.lock().unwrap().push(options);
            if fail {
                Err(Error::RenderError(format!("scripted failure at width {}", options.width)))
            } else {
                Ok(ScriptedRasterizer::expected_bytes(&svg, options.width, options.height))
            }
        }
        .boxed()
    }
}

/// Download host that keeps deliveries in memory and counts open handles.
#[derive(Default)]
pub struct MemoryHost {
    pub delivered: Mutex<Vec<(String, Vec<u8>)>>,
    pub open_handles: Mutex<usize>,
    pub handles_created: Mutex<usize>,
}

impl DownloadHost for MemoryHost {
    type Handle = Vec<u8>;
    type Delivered = String;

    fn create_handle(&self, artifact: &Artifact) -> Result<Vec<u8>> {
        *self.open_handles.lock().unwrap() += 1;
        *self.handles_created.lock().unwrap() += 1;
        Ok(artifact.bytes.to_vec())
    }

    fn deliver(&self, handle: &Vec<u8>, artifact: &Artifact) -> Result<String> {
        self.delivered
            .lock()
            .unwrap()
            .push((artifact.name.clone(), handle.clone()));
        Ok(artifact.name.clone())
    }

    fn release(&self, _handle: Vec<u8>) {
        *self.open_handles.lock().unwrap() -= 1;
    }
}

/// Yield until `cond` holds, panicking after a bounded number of rounds.
pub async fn settle(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
