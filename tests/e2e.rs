//! End-to-end tests against the live Gemini API.
//!
//! These build a synthetic "scan" in memory and make real restoration calls.
//! They are gated behind the `E2E_ENABLED` environment variable and need
//! `GEMINI_API_KEY` (or `API_KEY`), so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use colorifx::{
    find_preset, GeminiRestorationClient, RestorationConfig, TransformationWorkflow,
    WorkflowState,
};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("target/e2e-output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test unless E2E_ENABLED is set and an API key is available.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        match RestorationConfig::default().resolve_api_key() {
            Some(_) => {}
            None => {
                println!("SKIP: set GEMINI_API_KEY to run e2e tests");
                return;
            }
        }
    }};
}

/// A grey, slightly rotated "photocopy": dark horizontal rules on a noisy
/// background. Enough structure for the model to straighten and clean.
fn synthetic_scan() -> Vec<u8> {
    let (w, h) = (320u32, 240u32);
    let img = image::RgbImage::from_fn(w, h, |x, y| {
        let skewed = (y as i64 + x as i64 / 12) % 24;
        let grain = ((x * 7 + y * 13) % 17) as u8;
        if skewed < 2 {
            image::Rgb([70 + grain, 70 + grain, 70 + grain])
        } else {
            image::Rgb([190 + grain, 188 + grain, 180 + grain])
        }
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode synthetic scan");
    out.into_inner()
}

fn live_workflow() -> TransformationWorkflow {
    let config = RestorationConfig::default();
    let client = GeminiRestorationClient::from_config(&config).expect("client");
    TransformationWorkflow::new(Arc::new(client), config)
}

// ── Restoration tests (need the API) ─────────────────────────────────────────

#[tokio::test]
async fn test_restore_synthetic_scan() {
    e2e_skip_unless_ready!();
    let wf = live_workflow();
    assert!(wf.acquire(synthetic_scan(), "image/png"));

    let record = wf
        .transform_with("Make it perfectly vertical")
        .await
        .expect("restoration should succeed");

    assert_eq!(wf.state(), WorkflowState::Completed);
    assert!(record.result().mime_type().starts_with("image/"));
    assert!(!record.result().is_empty());
    assert_ne!(record.result().bytes(), record.original().bytes());

    let path = wf
        .export_result(Some(output_dir().as_path()))
        .await
        .expect("export should succeed");
    println!("✓ restored {} bytes → {}", record.result().len(), path.display());
}

#[tokio::test]
async fn test_restore_with_preset() {
    e2e_skip_unless_ready!();
    let wf = live_workflow();
    assert!(wf.acquire(synthetic_scan(), "image/png"));
    let preset = find_preset("Digital Scan (Clean)").expect("preset");

    let record = wf.apply_preset(preset).await.expect("restoration should succeed");

    assert_eq!(record.instruction(), preset.prompt);
    assert_eq!(wf.history_len(), 1);
    println!("✓ preset '{}' → {} bytes", preset.label, record.result().len());
}

#[tokio::test]
async fn test_bad_key_fails_cleanly() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }
    let config = RestorationConfig::builder()
        .api_key("definitely-not-a-key")
        .build()
        .expect("valid config");
    let client = GeminiRestorationClient::from_config(&config).expect("client");
    let wf = TransformationWorkflow::new(Arc::new(client), config);
    assert!(wf.acquire(synthetic_scan(), "image/png"));

    let err = wf.transform().await.expect_err("a bad key must fail");
    assert!(err.is_restoration_failure(), "{err}");
    assert_eq!(wf.state(), WorkflowState::Loaded);
    assert_eq!(wf.history_len(), 0);
}
