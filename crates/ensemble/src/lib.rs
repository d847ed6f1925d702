// Rust guideline compliant 2026-10-12

//! Hybrid ensemble ranking.
//!
//! Blends per-strategy [`CandidateSet`]s into one ranked list:
//!
//! 1. min-max normalize each strategy's raw scores to `[0, 1]`;
//! 2. `final = sum over strategies of weight * normalized score`, with the
//!    weights of the strategies that ran rescaled to sum to 1;
//! 3. deduplicate by product, sort descending by final score, lower product
//!    id first on ties;
//! 4. truncate to `k`.
//!
//! All-empty input gives an empty ranking. That is "no signal", not an error.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use domain::{
    CandidateSet, ConfidenceBands, EnsembleWeights, ProductId, Recommendation, Strategy,
};

// ---------------------------------------------------------------------------
// RankedCandidate
// ---------------------------------------------------------------------------

/// One blended candidate before presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub product: ProductId,
    /// Blended score in `[0, 1]`.
    pub score: f64,
    /// Normalized score per strategy that proposed this product.
    pub contributions: BTreeMap<Strategy, f64>,
}

impl RankedCandidate {
    /// Contributing strategies in ensemble order.
    #[must_use]
    pub fn strategies(&self) -> Vec<Strategy> {
        self.contributions.keys().copied().collect()
    }

    /// Attach the presentation label and produce the external record.
    #[must_use]
    pub fn into_recommendation(self, bands: &ConfidenceBands) -> Recommendation {
        Recommendation {
            contributing_strategies: self.strategies(),
            confidence_label: bands.label(self.score),
            score: self.score,
            product_id: self.product,
        }
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Min-max normalize one strategy's scores. Duplicate products keep their best score.
///
/// When every raw score is equal the candidates map to `1.0` if that score is
/// positive and `0.0` otherwise.
#[must_use]
pub fn normalize(set: &CandidateSet) -> BTreeMap<ProductId, f64> {
    let mut best: BTreeMap<ProductId, f64> = BTreeMap::new();
    for c in &set.candidates {
        if !c.raw_score.is_finite() {
            continue;
        }
        best.entry(c.product.clone())
            .and_modify(|s| *s = s.max(c.raw_score))
            .or_insert(c.raw_score);
    }
    let (min, max) = best
        .values()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| (lo.min(*s), hi.max(*s)));
    let span = max - min;
    for score in best.values_mut() {
        *score = if span > 0.0 {
            (*score - min) / span
        } else if *score > 0.0 {
            1.0
        } else {
            0.0
        };
    }
    best
}

/// Blend, deduplicate, sort and truncate candidate sets.
///
/// Products in `exclude` never appear. Several sets for the same strategy are
/// merged, keeping each product's best normalized score.
#[must_use]
pub fn rank(
    sets: &[CandidateSet],
    weights: EnsembleWeights,
    exclude: &BTreeSet<ProductId>,
    k: usize,
) -> Vec<RankedCandidate> {
    let weights = effective_weights(sets, weights);
    let mut merged: BTreeMap<ProductId, BTreeMap<Strategy, f64>> = BTreeMap::new();
    for set in sets {
        for (product, score) in normalize(set) {
            if exclude.contains(&product) {
                continue;
            }
            merged
                .entry(product)
                .or_default()
                .entry(set.strategy)
                .and_modify(|s| *s = s.max(score))
                .or_insert(score);
        }
    }

    let mut ranked: Vec<RankedCandidate> = merged
        .into_iter()
        .map(|(product, contributions)| {
            let score = contributions
                .iter()
                .map(|(strategy, s)| weights.weight(*strategy) * s)
                .sum::<f64>()
                .clamp(0.0, 1.0);
            RankedCandidate { product, score, contributions }
        })
        .collect();
    ranked.sort_by(by_score_then_id);
    ranked.truncate(k);
    tracing::debug!(
        "ensemble.rank.done: strategies={} cold={} results={}",
        sets.len(),
        sets.iter().filter(|s| s.cold_start).count(),
        ranked.len()
    );
    ranked
}

/// Rank and convert straight to [`Recommendation`]s.
#[must_use]
pub fn recommend(
    sets: &[CandidateSet],
    weights: EnsembleWeights,
    exclude: &BTreeSet<ProductId>,
    k: usize,
    bands: &ConfidenceBands,
) -> Vec<Recommendation> {
    rank(sets, weights, exclude, k)
        .into_iter()
        .map(|c| c.into_recommendation(bands))
        .collect()
}

/// Zero the weight of strategies the query context did not run, then rescale.
///
/// A cold-start set still counts as run: its weight stays in the denominator.
fn effective_weights(sets: &[CandidateSet], weights: EnsembleWeights) -> EnsembleWeights {
    let ran = |strategy: Strategy| {
        if sets.iter().any(|s| s.strategy == strategy) {
            weights.weight(strategy)
        } else {
            0.0
        }
    };
    let masked = EnsembleWeights {
        collaborative: ran(Strategy::Collaborative),
        basket: ran(Strategy::Basket),
        content: ran(Strategy::Content),
    };
    if masked.collaborative + masked.basket + masked.content > 0.0 {
        masked.normalized()
    } else {
        weights.normalized()
    }
}

/// Descending score, then ascending product id.
fn by_score_then_id(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.product.cmp(&b.product))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
