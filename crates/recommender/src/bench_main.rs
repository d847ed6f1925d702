// Rust guideline compliant 2026-10-12

//! Snapshot rebuild and query throughput benchmark.
//!
//! For a range of synthetic dataset sizes, measures:
//!
//! - rebuild: wall time of one full [`RecommendationModel::build`]
//!   (validation, matrix, neighbour tables, rule mining, content vectors)
//! - query: customer recommendations per second over every customer of the
//!   snapshot, run sequentially against the built model
//!
//! Each size is run `ROUNDS` times with a fixed seed; min/avg/max is printed.
//!
//! No tracing subscriber is installed: log macros short-circuit, so log I/O
//! stays out of the measurements.
//!
//! # Usage
//!
//! ```text
//! # Accurate numbers (release build)
//! cargo run --bin recommender_bench --release
//! ```

mod adapters;

use std::time::{Duration, Instant};

use adapters::demo_dataset::DemoDataset;
use anyhow::Context as _;
use chrono::DateTime;
use domain::EngineConfig;
use engine::RecommendationModel;

// ---------------------------------------------------------------------------
// Benchmark parameters
// ---------------------------------------------------------------------------

/// Runs averaged per dataset size.
const ROUNDS: u32 = 3;

/// `(customers, products)` exercised.
const SIZES: &[(usize, usize)] = &[(100, 50), (1_000, 200), (5_000, 500), (10_000, 1_000)];

/// Results per customer query.
const TOP_K: usize = 10;

/// Fixed anchor so every round sees the same timestamps.
const ANCHOR_SECS: i64 = 1_750_000_000;

// ---------------------------------------------------------------------------
// Single run
// ---------------------------------------------------------------------------

/// Build once and query every customer once; return `(build, queries, query_time)`.
///
/// # Errors
///
/// Returns an error if the config or the model build fails.
fn run_bench(customers: usize, products: usize) -> anyhow::Result<(Duration, usize, Duration)> {
    let anchor = DateTime::from_timestamp(ANCHOR_SECS, 0).context("invalid bench anchor")?;
    let snapshot = DemoDataset::new(Some(42))
        .with_size(customers, products)
        .with_anchor(anchor)
        .generate();
    let config = EngineConfig::builder().build()?;

    let start = Instant::now();
    let model = RecommendationModel::build(&snapshot, &config)?;
    let build = start.elapsed();

    let start = Instant::now();
    let mut served = 0_usize;
    for customer in &snapshot.customers {
        served += model.recommend_for_customer(&customer.id, TOP_K).len();
    }
    // Keep the results observable so the loop is not optimized away.
    std::hint::black_box(served);

    Ok((build, snapshot.customers.len(), start.elapsed()))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "benchmark figures are display-only"
)]
fn main() -> anyhow::Result<()> {
    println!("bench: ROUNDS={ROUNDS}  TOP_K={TOP_K}");
    println!(
        "{:>18} | {:>10} | {:>10} | {:>10} | {:>10} | {:>10} | {:>10}",
        "customers/products", "min ms", "avg ms", "max ms", "min q/s", "avg q/s", "max q/s"
    );
    println!("{:-<19}+{:-<12}+{:-<12}+{:-<12}+{:-<12}+{:-<12}+{:-<11}", "", "", "", "", "", "", "");

    for &(customers, products) in SIZES {
        let mut min_ms = f64::MAX;
        let mut max_ms = 0.0_f64;
        let mut sum_ms = 0.0_f64;
        let mut min_qps = f64::MAX;
        let mut max_qps = 0.0_f64;
        let mut sum_qps = 0.0_f64;

        for _ in 0..ROUNDS {
            let (build, queries, query_time) = run_bench(customers, products)?;
            let ms = build.as_secs_f64() * 1_000.0;
            let qps = queries as f64 / query_time.as_secs_f64().max(f64::EPSILON);
            min_ms = min_ms.min(ms);
            max_ms = max_ms.max(ms);
            sum_ms += ms;
            min_qps = min_qps.min(qps);
            max_qps = max_qps.max(qps);
            sum_qps += qps;
        }

        println!(
            "{:>18} | {:>10} | {:>10} | {:>10} | {:>10} | {:>10} | {:>10}",
            format!("{}/{}", fmt_number(customers), fmt_number(products)),
            fmt_number(min_ms as usize),
            fmt_number((sum_ms / f64::from(ROUNDS)) as usize),
            fmt_number(max_ms as usize),
            fmt_number(min_qps as usize),
            fmt_number((sum_qps / f64::from(ROUNDS)) as usize),
            fmt_number(max_qps as usize),
        );
    }

    Ok(())
}

/// Format a `usize` with space-separated thousands groups (e.g. `1 234 567`).
fn fmt_number(n: usize) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    out.chars().rev().collect()
}
