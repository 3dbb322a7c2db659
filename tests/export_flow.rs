mod common;

use common::{MemoryHost, ScriptedRasterizer, LOGO};
use std::sync::Arc;
use svgscale::{ConverterConfig, DirectoryHost, Error, Pipeline, ScaleFactor, SourceDocument};

fn pipeline(engine: &Arc<ScriptedRasterizer>) -> Pipeline<Arc<ScriptedRasterizer>> {
    Pipeline::new(Arc::clone(engine), &ConverterConfig::default())
}

#[tokio::test]
async fn export_names_artifact_after_source_and_scale() {
    let engine = ScriptedRasterizer::new();
    let p = pipeline(&engine);
    p.upload(SourceDocument::new("logo.svg", LOGO)).await;
    p.set_scale(ScaleFactor::X4).await;

    let host = MemoryHost::default();
    let name = p.export(&host).await.unwrap();
    assert_eq!(name.as_deref(), Some("logo-4x.png"));

    let delivered = host.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].1, ScriptedRasterizer::expected_bytes(LOGO, 96, 64));
    assert_eq!(*host.open_handles.lock().unwrap(), 0);
}

#[tokio::test]
async fn export_always_forces_a_fresh_render() {
    let engine = ScriptedRasterizer::new();
    let p = pipeline(&engine);
    p.upload(SourceDocument::new("logo.svg", LOGO)).await;
    assert!(p.is_fresh());
    let before = engine.calls().len();

    p.export(&MemoryHost::default()).await.unwrap();
    assert_eq!(engine.calls().len(), before + 1);
}

#[tokio::test]
async fn consecutive_exports_are_byte_identical() {
    let engine = ScriptedRasterizer::new();
    let p = pipeline(&engine);
    p.upload(SourceDocument::new("logo.svg", LOGO)).await;
    p.set_scale(ScaleFactor::X2).await;

    let host = MemoryHost::default();
    p.export(&host).await.unwrap();
    p.export(&host).await.unwrap();

    let delivered = host.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0], delivered[1]);
    assert_eq!(*host.handles_created.lock().unwrap(), 2);
    assert_eq!(*host.open_handles.lock().unwrap(), 0);
}

#[tokio::test]
async fn export_refuses_stale_raster_after_failed_render() {
    let engine = ScriptedRasterizer::new();
    let p = pipeline(&engine);
    p.upload(SourceDocument::new("logo.svg", LOGO)).await;

    engine.fail_width(48);
    p.set_scale(ScaleFactor::X2).await;
    assert!(!p.is_fresh());

    let host = MemoryHost::default();
    let err = p.export(&host).await.unwrap_err();
    assert!(matches!(err, Error::RenderError(_)));
    assert!(host.delivered.lock().unwrap().is_empty());

    // The forced render of the next export recovers.
    engine.heal_width(48);
    assert_eq!(p.export(&host).await.unwrap().as_deref(), Some("logo-2x.png"));
}

#[tokio::test]
async fn export_of_dimensionless_document_is_a_noop() {
    let engine = ScriptedRasterizer::new();
    let p = pipeline(&engine);
    p.upload(SourceDocument::new("text.svg", "plain words")).await;

    let host = MemoryHost::default();
    assert_eq!(p.export(&host).await.unwrap(), None);
    assert_eq!(*host.handles_created.lock().unwrap(), 0);
}

#[tokio::test]
async fn export_after_cancel_is_a_noop() {
    let engine = ScriptedRasterizer::new();
    let p = pipeline(&engine);
    p.upload(SourceDocument::new("logo.svg", LOGO)).await;
    p.cancel();

    assert_eq!(p.export(&MemoryHost::default()).await.unwrap(), None);
}

#[tokio::test]
async fn directory_host_writes_named_png() {
    let engine = ScriptedRasterizer::new();
    let p = pipeline(&engine);
    p.upload(SourceDocument::new("Logo.SVG", LOGO)).await;
    p.set_scale(ScaleFactor::X8).await;

    let dir = std::env::temp_dir().join(format!("svgscale-export-flow-{}", std::process::id()));
    let host = DirectoryHost::new(&dir);
    let path = p.export(&host).await.unwrap().unwrap();

    assert_eq!(path, dir.join("Logo-8x.png"));
    assert_eq!(
        std::fs::read(&path).unwrap(),
        ScriptedRasterizer::expected_bytes(LOGO, 192, 128)
    );
    let names: Vec<String> = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["Logo-8x.png".to_string()]);

    std::fs::remove_dir_all(&dir).ok();
}
