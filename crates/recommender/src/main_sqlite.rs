// Rust guideline compliant 2026-10-12

//! Recommendation engine entry point -- `SQLite` dataset demo.
//!
//! Same flow as the main `recommender` binary, except that snapshots are read
//! from a `SQLite` file (`recommender.db` in the current working directory)
//! through the `DatasetSource` port. On first run the file is created and
//! seeded with one synthetic dataset; every later refresh re-reads the tables,
//! so rows inserted by an external ETL job show up in the next snapshot.
//!
//! # Usage
//!
//! ```text
//! # Refresh every 30 s -- press CTRL+C to stop
//! RUST_LOG=info cargo run --bin recommender_sqlite
//! ```
//!
//! Inspect or edit rows with any `SQLite` browser between refreshes.

mod adapters;
mod output;

// Load sqlite_dataset directly so it only enters this binary's module tree.
#[path = "adapters/sqlite_dataset.rs"]
mod sqlite_dataset;

use std::sync::Arc;
use std::time::Duration;

use adapters::demo_dataset::DemoDataset;
use anyhow::Context as _;
use domain::{DatasetSource as _, EngineConfig};
use engine::Recommender;
use sqlite_dataset::SqliteDataset;

/// Database file created in the current working directory on first run.
const DB_URL: &str = "sqlite:recommender.db";
/// Seed of the dataset written into an empty database.
const SEED: u64 = 42;
/// Results per sample query.
const TOP_K: usize = 5;
/// Pause between refreshes from the database.
const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = EngineConfig::builder()
        .build()
        .context("failed to build engine config")?;
    let engine = Arc::new(Recommender::new(config));

    let dataset = SqliteDataset::new(DB_URL)
        .await
        .context("failed to open SQLite dataset")?;
    if dataset.product_count().await.context("failed to count products")? == 0 {
        tracing::info!("main.seed: empty database, writing demo dataset seed={SEED}");
        dataset
            .insert_snapshot(&DemoDataset::new(Some(SEED)).generate())
            .await
            .context("failed to seed SQLite dataset")?;
    }

    engine
        .refresh_from(&dataset)
        .await
        .context("initial build failed")?;
    output::print_sample_queries(&engine, TOP_K)?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("main.shutdown: ctrl_c received");
        }
        () = refresh_forever(&engine, &dataset, REFRESH_INTERVAL) => {}
    }

    Ok(())
}

/// Re-read the database every `every`. Failed loads and rebuilds keep the current snapshot.
///
/// The build runs on the blocking pool so the CTRL+C branch stays responsive.
async fn refresh_forever(engine: &Arc<Recommender>, dataset: &SqliteDataset, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let snapshot = match dataset.load_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("main.refresh: kept previous snapshot, error={e}");
                continue;
            }
        };
        let engine = Arc::clone(engine);
        let rebuilt = match tokio::task::spawn_blocking(move || engine.refresh(&snapshot)).await {
            Ok(rebuilt) => rebuilt,
            Err(e) => {
                tracing::error!("main.refresh: rebuild task failed, error={e}");
                continue;
            }
        };
        match rebuilt {
            Ok(info) => tracing::info!(
                "main.refresh: snapshot={} customers={} products={} rules={}",
                info.id,
                info.customers,
                info.products,
                info.rules
            ),
            Err(e) => tracing::warn!("main.refresh: kept previous snapshot, error={e}"),
        }
    }
}
