// Rust guideline compliant 2026-10-12

//! Recommendation engine entry point.
//!
//! Builds a snapshot from the synthetic `DemoDataset` adapter, prints one
//! query of each kind plus an offline hold-out evaluation as JSON, then keeps
//! re-publishing fresh snapshots until CTRL+C.
//!
//! # Usage
//!
//! ```text
//! # Refresh every 30 s -- press CTRL+C to stop
//! RUST_LOG=info cargo run
//!
//! # Also show per-query and per-row debug output
//! RUST_LOG=debug cargo run
//! ```

mod adapters;
mod output;

use std::sync::Arc;
use std::time::Duration;

use adapters::demo_dataset::DemoDataset;
use anyhow::Context as _;
use domain::{DatasetSource as _, EngineConfig};
use engine::{Recommender, evaluate_holdout};

/// Results per sample query.
const TOP_K: usize = 5;
/// Seed of the first snapshot, so the printed sample is reproducible.
const DEMO_SEED: u64 = 42;
/// Pause between background refreshes.
const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize the tracing subscriber before any async work.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = EngineConfig::builder()
        .build()
        .context("failed to build engine config")?;
    let engine = Arc::new(Recommender::new(config.clone()));

    // -- First snapshot: seeded, so the sample output is stable across runs --
    let snapshot = DemoDataset::new(Some(DEMO_SEED))
        .load_snapshot()
        .await
        .context("failed to load demo snapshot")?;
    engine.refresh(&snapshot).context("initial build failed")?;
    output::print_sample_queries(&engine, TOP_K)?;

    let evaluation =
        evaluate_holdout(&snapshot, &config, TOP_K).context("hold-out evaluation failed")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "holdout": evaluation }))
            .context("failed to render evaluation")?
    );

    // -- Background refresh: OS-seeded source, a new dataset every tick --
    let source = DemoDataset::new(None);

    // Race the refresh loop against CTRL+C.
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("main.shutdown: ctrl_c received, serving snapshot={:?}",
                engine.snapshot_info().map(|i| i.id));
        }
        result = refresh_forever(&engine, &source, REFRESH_INTERVAL) => {
            result?;
        }
    }

    Ok(())
}

/// Rebuild from `source` every `every`. A failed rebuild keeps the current snapshot.
///
/// The build runs on the blocking pool so the CTRL+C branch stays responsive.
async fn refresh_forever(
    engine: &Arc<Recommender>,
    source: &DemoDataset,
    every: Duration,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately; the initial build already ran.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let snapshot = source.load_snapshot().await.context("demo source failed")?;
        let engine = Arc::clone(engine);
        let rebuilt = tokio::task::spawn_blocking(move || engine.refresh(&snapshot))
            .await
            .context("rebuild task panicked")?;
        match rebuilt {
            Ok(info) => tracing::info!(
                "main.refresh: snapshot={} customers={} rules={}",
                info.id,
                info.customers,
                info.rules
            ),
            Err(e) => tracing::warn!("main.refresh: kept previous snapshot, error={e}"),
        }
    }
}
