// Rust guideline compliant 2026-10-12

//! Collaborative filtering over the interaction matrix.
//!
//! [`CollaborativeModel::build`] precomputes two neighbour tables in parallel:
//! customer -> most similar customers, and product -> most similar products.
//! Customer queries use the first, basket and product queries the second.
//! A customer absent from the matrix yields a cold-start [`CandidateSet`],
//! never an error.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;

use domain::{CandidateSet, CustomerId, EngineConfig, ProductId, SimilarityMetric, Strategy};
use interactions::InteractionMatrix;
use rayon::prelude::*;

// ---------------------------------------------------------------------------
// CollaborativeModel
// ---------------------------------------------------------------------------

/// Precomputed neighbour tables for one snapshot. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct CollaborativeModel {
    customer_neighbours: HashMap<CustomerId, Vec<(CustomerId, f64)>>,
    product_neighbours: HashMap<ProductId, Vec<(ProductId, f64)>>,
}

impl CollaborativeModel {
    /// Build both neighbour tables. Rows are computed in parallel.
    #[must_use]
    pub fn build(matrix: &InteractionMatrix, config: &EngineConfig) -> Self {
        let by_customer: BTreeMap<CustomerId, BTreeMap<ProductId, f64>> = matrix
            .customers()
            .filter_map(|c| {
                let row = matrix.row(c)?;
                Some((c.clone(), row.iter().map(|(p, cell)| (p.clone(), cell.weight)).collect()))
            })
            .collect();
        let by_product: BTreeMap<ProductId, BTreeMap<CustomerId, f64>> = matrix
            .products()
            .filter_map(|p| Some((p.clone(), matrix.column(p)?.clone())))
            .collect();

        let metric = config.similarity_metric;
        let keep = config.neighbourhood_size;
        let (customer_neighbours, product_neighbours) = rayon::join(
            || neighbour_table(&by_customer, &by_product, metric, keep),
            || neighbour_table(&by_product, &by_customer, metric, keep),
        );
        tracing::info!(
            "collaborative.build.done: customers={} products={} metric={metric:?}",
            customer_neighbours.len(),
            product_neighbours.len()
        );
        Self { customer_neighbours, product_neighbours }
    }

    /// Most similar customers, most similar first.
    #[must_use]
    pub fn customer_neighbours(&self, customer: &CustomerId) -> &[(CustomerId, f64)] {
        self.customer_neighbours.get(customer).map_or(&[], Vec::as_slice)
    }

    /// Most similar products, most similar first.
    #[must_use]
    pub fn product_neighbours(&self, product: &ProductId) -> &[(ProductId, f64)] {
        self.product_neighbours.get(product).map_or(&[], Vec::as_slice)
    }

    /// Score candidates for `customer` from what similar customers bought.
    ///
    /// `score(p) = sum over neighbours n of sim(customer, n) * weight(n, p)`,
    /// skipping products the customer already holds at `>= owned_ratio` of
    /// their top weight. Returns a cold-start set for unknown customers.
    #[must_use]
    pub fn score_customer(
        &self,
        matrix: &InteractionMatrix,
        customer: &CustomerId,
        owned_ratio: f64,
    ) -> CandidateSet {
        if matrix.row(customer).is_none() {
            tracing::debug!("collaborative.customer.cold_start: customer={customer}");
            return CandidateSet::cold(Strategy::Collaborative);
        }
        let owned = matrix.owned_products(customer, owned_ratio);
        let mut scores: BTreeMap<ProductId, f64> = BTreeMap::new();
        for (neighbour, similarity) in self.customer_neighbours(customer) {
            let Some(row) = matrix.row(neighbour) else { continue };
            for (product, cell) in row {
                if owned.contains(product) {
                    continue;
                }
                *scores.entry(product.clone()).or_default() += similarity * cell.weight;
            }
        }
        CandidateSet::scored(Strategy::Collaborative, scores)
    }

    /// Score candidates similar to any of `seeds` (item-item).
    ///
    /// `score(p) = sum over seeds s of sim(s, p)`. Seeds and `exclude` are never
    /// returned. Cold-start when no seed has any purchase history.
    #[must_use]
    pub fn score_items(&self, seeds: &[ProductId], exclude: &BTreeSet<ProductId>) -> CandidateSet {
        if !seeds.iter().any(|s| self.product_neighbours.contains_key(s)) {
            return CandidateSet::cold(Strategy::Collaborative);
        }
        let mut scores: BTreeMap<ProductId, f64> = BTreeMap::new();
        for seed in seeds {
            for (product, similarity) in self.product_neighbours(seed) {
                if seeds.contains(product) || exclude.contains(product) {
                    continue;
                }
                *scores.entry(product.clone()).or_default() += similarity;
            }
        }
        CandidateSet::scored(Strategy::Collaborative, scores)
    }
}

// ---------------------------------------------------------------------------
// Similarity
// ---------------------------------------------------------------------------

/// Norm of one sparse vector under `metric`.
fn norm<J>(vector: &BTreeMap<J, f64>, metric: SimilarityMetric) -> f64 {
    match metric {
        SimilarityMetric::Cosine => vector.values().map(|w| w * w).sum::<f64>().sqrt(),
        #[expect(clippy::cast_precision_loss, reason = "set sizes are far below 2^52")]
        SimilarityMetric::Jaccard => vector.len() as f64,
    }
}

/// For every key in `vectors`, the `keep` most similar other keys.
///
/// `postings` is the transpose of `vectors` and lets each row visit only keys
/// it actually overlaps with. Ties are broken by the lower key.
fn neighbour_table<K, J>(
    vectors: &BTreeMap<K, BTreeMap<J, f64>>,
    postings: &BTreeMap<J, BTreeMap<K, f64>>,
    metric: SimilarityMetric,
    keep: usize,
) -> HashMap<K, Vec<(K, f64)>>
where
    K: Ord + Hash + Clone + Send + Sync,
    J: Ord + Send + Sync,
{
    let norms: HashMap<&K, f64> = vectors.iter().map(|(k, v)| (k, norm(v, metric))).collect();
    let rows: Vec<(&K, &BTreeMap<J, f64>)> = vectors.iter().collect();

    rows.par_iter()
        .map(|&(key, vector)| {
            let mut overlap: HashMap<&K, f64> = HashMap::new();
            for (j, wa) in vector {
                let Some(posting) = postings.get(j) else { continue };
                for (other, wb) in posting {
                    if other == key {
                        continue;
                    }
                    *overlap.entry(other).or_default() += match metric {
                        SimilarityMetric::Cosine => wa * wb,
                        SimilarityMetric::Jaccard => 1.0,
                    };
                }
            }

            let na = norms.get(key).copied().unwrap_or(0.0);
            let mut neighbours: Vec<(K, f64)> = overlap
                .into_iter()
                .filter_map(|(other, shared)| {
                    let nb = norms.get(other).copied().unwrap_or(0.0);
                    let similarity = match metric {
                        SimilarityMetric::Cosine if na > 0.0 && nb > 0.0 => shared / (na * nb),
                        SimilarityMetric::Jaccard if na + nb - shared > 0.0 => {
                            shared / (na + nb - shared)
                        }
                        _ => 0.0,
                    };
                    (similarity > 0.0).then(|| (other.clone(), similarity.min(1.0)))
                })
                .collect();
            neighbours.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            neighbours.truncate(keep);
            (key.clone(), neighbours)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
