//! Full-pipeline tests with stand-in external tools.
//!
//! Each test builds a tool directory of small shell scripts that emit the
//! per-frame logs a real quality tool would, then drives the runners
//! through extraction, assembly, fusion, and caching against a file-backed
//! store.

#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;

use vqe_engine::{
    EngineConfig, EngineError, FileResultStore, FusedQualityRunner, FusionSpec, Kernel,
    Producer, PsnrQualityRunner, ResultStore, RunContext, SvrArtifact, SvrModel,
};
use vqe_models::{Asset, FrameRange, PixelFormat};

fn write_tool(dir: &Path, name: &str, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
}

fn test_asset() -> Asset {
    Asset::new(
        "/data/ref/src01.yuv",
        "/data/dis/src01_crf30.yuv",
        PixelFormat::Yuv420p,
        1920,
        1080,
    )
    .with_frame_range(FrameRange::new(0, 1))
}

struct Fixture {
    _root: tempfile::TempDir,
    ctx: Arc<RunContext>,
    tools: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let root = tempfile::tempdir().unwrap();
    let tools = root.path().join("tools");
    std::fs::create_dir_all(&tools).unwrap();

    let config = EngineConfig {
        work_dir: root.path().join("work"),
        cache_dir: root.path().join("cache"),
        tool_dir: Some(tools.clone()),
        model_dir: root.path().join("models"),
        max_parallel_assets: 1,
        tool_timeout: None,
    };
    let store = Arc::new(FileResultStore::new(root.path().join("cache")));
    let ctx = Arc::new(RunContext::new(config, store).unwrap());

    Fixture {
        _root: root,
        ctx,
        tools,
    }
}

/// Linear four-input model: 40·vif' + 10·adm' + 20·ansnr' + 10·motion' + 20.
fn linear_artifact() -> SvrArtifact {
    SvrArtifact {
        format_version: 1,
        kernel: Kernel::Linear,
        gamma: None,
        rho: -20.0,
        support_vectors: vec![vec![40.0, 10.0, 20.0, 10.0]],
        coefficients: vec![1.0],
        feature_norms: None,
    }
}

const SIGNAL_TOOL: &str = "printf 'vif: 0 0.5\\nvif: 1 0.9\\n\
adm: 0 0.6\\nadm: 1 0.8\\n\
ansnr: 0 30.0\\nansnr: 1 40.0\\n\
motion: 0 5.0\\nmotion: 1 15.0\\n'";

#[tokio::test]
async fn test_psnr_runner_end_to_end() {
    let fx = fixture();
    write_tool(&fx.tools, "psnr", "printf 'psnr: 0 30.0\\npsnr: 1 40.0\\n'");

    let runner = PsnrQualityRunner::new();
    let results = runner.run(&fx.ctx, &[test_asset()]).await.unwrap();

    assert_eq!(results[0].series("psnr_scores").unwrap(), &[30.0, 40.0]);
    assert_eq!(results[0].scalar("psnr_score").unwrap(), 35.0);
}

#[tokio::test]
async fn test_psnr_rerun_is_served_from_cache_not_tool() {
    let fx = fixture();
    write_tool(&fx.tools, "psnr", "printf 'psnr: 0 30.0\\npsnr: 1 40.0\\n'");

    let runner = PsnrQualityRunner::new();
    let asset = test_asset();
    let first = runner.run(&fx.ctx, &[asset.clone()]).await.unwrap();

    // Break the tool; a second run must not notice.
    write_tool(&fx.tools, "psnr", "exit 1");
    let second = runner.run(&fx.ctx, &[asset]).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_failing_tool_is_external_tool_failure() {
    let fx = fixture();
    write_tool(&fx.tools, "psnr", "echo 'cannot open input' >&2; exit 2");

    let runner = PsnrQualityRunner::new();
    let err = runner.run(&fx.ctx, &[test_asset()]).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Media(vqe_media::MediaError::ToolFailed { .. })
    ));
}

#[tokio::test]
async fn test_log_gap_is_parse_error() {
    let fx = fixture();
    // frame index 2 missing
    write_tool(
        &fx.tools,
        "psnr",
        "printf 'psnr: 0 30.0\\npsnr: 1 40.0\\npsnr: 3 41.0\\n'",
    );

    let runner = PsnrQualityRunner::new();
    let asset = Asset::new("/r/a.yuv", "/d/b.yuv", PixelFormat::Yuv420p, 640, 480);
    let err = runner.run(&fx.ctx, &[asset]).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Media(vqe_media::MediaError::LogParse(
            vqe_media::LogParseError::NonContiguous { .. }
        ))
    ));
}

#[tokio::test]
async fn test_fused_runner_end_to_end_with_real_model() {
    let fx = fixture();
    write_tool(&fx.tools, "signal_features", SIGNAL_TOOL);

    let model = SvrModel::from_artifact(linear_artifact(), Path::new("test")).unwrap();
    let runner =
        FusedQualityRunner::with_model(FusionSpec::fused_default(), Arc::new(model)).unwrap();

    let results = runner.run(&fx.ctx, &[test_asset()]).await.unwrap();
    let scores = results[0].series("fused_scores").unwrap();

    // rescaled features: vif' [0.5, 0.9], adm' [1/3, 2/3],
    // ansnr' [0.5, 0.75], motion' [0.25, 0.75]
    // frame 0: 20 + 10/3 + 10 + 2.5 + 20 = 55.8333…, motion 5 → uncorrected
    let frame0 = 40.0 * 0.5 + 10.0 / 3.0 + 20.0 * 0.5 + 10.0 * 0.25 + 20.0;
    // frame 1: 36 + 20/3 + 15 + 7.5 + 20 = 85.1666…, motion 15 → ×1.045
    let frame1 = (40.0 * 0.9 + 10.0 * (2.0 / 3.0) + 20.0 * 0.75 + 10.0 * 0.75 + 20.0) * 1.045;

    assert!((scores[0] - frame0).abs() < 1e-9, "got {}", scores[0]);
    assert!((scores[1] - frame1).abs() < 1e-9, "got {}", scores[1]);

    // extractor row was cached independently of the runner's
    assert!(fx
        .ctx
        .store
        .get(
            &test_asset().identity(),
            &vqe_engine::SignalFeatureExtractor::ID
        )
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_fused_remove_log_deletes_extractor_log() {
    let fx = fixture();
    write_tool(&fx.tools, "signal_features", SIGNAL_TOOL);

    let model = SvrModel::from_artifact(linear_artifact(), Path::new("test")).unwrap();
    let runner =
        FusedQualityRunner::with_model(FusionSpec::fused_default(), Arc::new(model)).unwrap();

    let asset = test_asset();
    runner.run(&fx.ctx, &[asset.clone()]).await.unwrap();

    let log_path = fx
        .ctx
        .log_file_path(&vqe_engine::SignalFeatureExtractor::ID, &asset);
    assert!(log_path.exists());

    runner.remove_log(&fx.ctx, &asset).await.unwrap();
    assert!(!log_path.exists());
}
