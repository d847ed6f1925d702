// Rust guideline compliant 2026-10-12

//! Content-based product similarity.
//!
//! Every catalog product is turned into a sparse weighted feature vector
//! (category, brand, price quartile, tags, normalized price) once per
//! snapshot. Similarity is the cosine of two vectors. This scorer answers for
//! any product in the catalog, which makes it the fallback when the
//! interaction-driven scorers have nothing to say.

use std::collections::{BTreeMap, BTreeSet};

use domain::{AttributeWeights, CandidateSet, Catalog, NotFoundError, Product, ProductId, Strategy};
use rayon::prelude::*;

/// Price quartiles used for the `tier:` feature.
const PRICE_TIERS: usize = 4;

// ---------------------------------------------------------------------------
// Feature vectors
// ---------------------------------------------------------------------------

/// Sparse feature vector with its cached Euclidean norm.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    features: BTreeMap<String, f64>,
    norm: f64,
}

impl FeatureVector {
    fn new(features: BTreeMap<String, f64>) -> Self {
        let norm = features.values().map(|v| v * v).sum::<f64>().sqrt();
        Self { features, norm }
    }

    /// Weight of a named feature, `0.0` when absent.
    #[must_use]
    pub fn get(&self, feature: &str) -> f64 {
        self.features.get(feature).copied().unwrap_or(0.0)
    }

    /// Cosine similarity in `[0, 1]`; `0.0` if either vector is all zeros.
    #[must_use]
    pub fn cosine(&self, other: &Self) -> f64 {
        if self.norm == 0.0 || other.norm == 0.0 {
            return 0.0;
        }
        let (small, large) = if self.features.len() <= other.features.len() {
            (self, other)
        } else {
            (other, self)
        };
        let dot: f64 = small
            .features
            .iter()
            .filter_map(|(name, a)| large.features.get(name).map(|b| a * b))
            .sum();
        (dot / (self.norm * other.norm)).clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// ContentModel
// ---------------------------------------------------------------------------

/// Feature vectors for every catalog product in one snapshot.
#[derive(Debug, Clone, Default)]
pub struct ContentModel {
    vectors: BTreeMap<ProductId, FeatureVector>,
}

impl ContentModel {
    #[must_use]
    pub fn build(catalog: &Catalog, weights: &AttributeWeights) -> Self {
        let mut prices: Vec<f64> = catalog.values().map(|p| p.price).collect();
        prices.sort_by(f64::total_cmp);
        let (min, max) = match (prices.first(), prices.last()) {
            (Some(&lo), Some(&hi)) => (lo, hi),
            _ => (0.0, 0.0),
        };

        let vectors: BTreeMap<ProductId, FeatureVector> = catalog
            .values()
            .map(|product| {
                let tier = price_tier(&prices, product.price);
                let scaled = if max > min { (product.price - min) / (max - min) } else { 1.0 };
                (product.id.clone(), features(product, tier, scaled, weights))
            })
            .collect();
        tracing::info!("content.build.done: products={}", vectors.len());
        Self { vectors }
    }

    #[must_use]
    pub fn vector(&self, product: &ProductId) -> Option<&FeatureVector> {
        self.vectors.get(product)
    }

    #[must_use]
    pub fn contains(&self, product: &ProductId) -> bool {
        self.vectors.contains_key(product)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Similarity between two catalog products, `None` if either is unknown.
    #[must_use]
    pub fn similarity(&self, a: &ProductId, b: &ProductId) -> Option<f64> {
        Some(self.vectors.get(a)?.cosine(self.vectors.get(b)?))
    }

    /// Every other catalog product scored against `seed`.
    ///
    /// # Errors
    ///
    /// [`NotFoundError::Product`] if `seed` is not in the catalog.
    pub fn similar(&self, seed: &ProductId) -> Result<CandidateSet, NotFoundError> {
        if !self.contains(seed) {
            return Err(NotFoundError::Product(seed.clone()));
        }
        Ok(self.score_seeds(std::slice::from_ref(seed), &BTreeSet::new()))
    }

    /// Score catalog products against several seeds.
    ///
    /// `score(p) = max over seeds s of sim(s, p)`. Seeds and `exclude` are
    /// never candidates. Seeds missing from the catalog are ignored; if none
    /// remain the set is cold-start.
    #[must_use]
    pub fn score_seeds(&self, seeds: &[ProductId], exclude: &BTreeSet<ProductId>) -> CandidateSet {
        let seeds: Vec<(&ProductId, &FeatureVector)> = seeds
            .iter()
            .filter_map(|s| self.vectors.get_key_value(s))
            .collect();
        if seeds.is_empty() {
            return CandidateSet::cold(Strategy::Content);
        }
        let scores: Vec<(ProductId, f64)> = self
            .vectors
            .par_iter()
            .filter(|(id, _)| !exclude.contains(*id) && !seeds.iter().any(|(s, _)| s == id))
            .map(|(id, vector)| {
                let best = seeds
                    .iter()
                    .map(|(_, seed)| seed.cosine(vector))
                    .fold(0.0_f64, f64::max);
                (id.clone(), best)
            })
            .collect();
        CandidateSet::scored(Strategy::Content, scores)
    }
}

/// Quartile index of `price` within the sorted catalog prices. Equal prices share a tier.
fn price_tier(sorted_prices: &[f64], price: f64) -> usize {
    if sorted_prices.is_empty() {
        return 0;
    }
    let below = sorted_prices.partition_point(|p| *p < price);
    (below * PRICE_TIERS / sorted_prices.len()).min(PRICE_TIERS - 1)
}

fn features(
    product: &Product,
    tier: usize,
    scaled_price: f64,
    weights: &AttributeWeights,
) -> FeatureVector {
    let mut features = BTreeMap::new();
    let mut put = |name: String, value: f64| {
        if value > 0.0 {
            *features.entry(name).or_insert(0.0) += value;
        }
    };
    put(format!("category:{}", product.category.to_lowercase()), weights.category);
    if let Some(brand) = &product.brand {
        put(format!("brand:{}", brand.to_lowercase()), weights.brand);
    }
    put(format!("tier:{tier}"), weights.price_tier);
    put("price".to_owned(), weights.price * scaled_price);

    let tags: BTreeSet<String> = product
        .tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if !tags.is_empty() {
        #[expect(clippy::cast_precision_loss, reason = "tag counts are tiny")]
        let share = weights.tags / tags.len() as f64;
        for tag in tags {
            put(format!("tag:{tag}"), share);
        }
    }
    FeatureVector::new(features)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn product(
        id: &str,
        category: &str,
        brand: Option<&str>,
        price: f64,
        tags: &[&str],
    ) -> Product {
        Product {
            id: id.into(),
            category: category.to_owned(),
            brand: brand.map(str::to_owned),
            price,
            tags: tags.iter().map(|t| (*t).to_owned()).collect(),
        }
    }

    fn catalog() -> Catalog {
        [
            product("P1", "Skincare", Some("Glow"), 20.0, &["vegan", "hydrating"]),
            product("P2", "Skincare", Some("Glow"), 22.0, &["vegan"]),
            product("P3", "Skincare", Some("Derma"), 90.0, &[]),
            product("P4", "Fragrance", Some("Aura"), 140.0, &["luxury"]),
            product("P5", "Makeup", None, 35.0, &[]),
        ]
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect()
    }

    fn score(set: &CandidateSet, id: &str) -> f64 {
        set.candidates.iter().find(|c| c.product.as_str() == id).unwrap().raw_score
    }

    // ------------------------------------------------------------------
    // Features
    // ------------------------------------------------------------------

    #[test]
    fn price_tiers_follow_quartiles() {
        let prices = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0];
        assert_eq!(price_tier(&prices, 10.0), 0);
        assert_eq!(price_tier(&prices, 30.0), 1);
        assert_eq!(price_tier(&prices, 60.0), 2);
        assert_eq!(price_tier(&prices, 80.0), 3);
        assert_eq!(price_tier(&[5.0, 5.0, 5.0], 5.0), 0);
    }

    #[test]
    fn vector_carries_weighted_features() {
        let model = ContentModel::build(&catalog(), &AttributeWeights::default());
        let v = model.vector(&"P1".into()).unwrap();
        assert!((v.get("category:skincare") - 1.0).abs() < 1e-12);
        assert!((v.get("brand:glow") - 0.5).abs() < 1e-12);
        assert!((v.get("tag:vegan") - 0.25).abs() < 1e-12);
        assert!((v.get("tag:hydrating") - 0.25).abs() < 1e-12);
        // Cheapest product: normalized price 0 drops out.
        assert!(v.get("price").abs() < 1e-12);
        assert!(model.vector(&"P5".into()).unwrap().get("brand:none").abs() < 1e-12);
    }

    #[test]
    fn cosine_is_symmetric_and_bounded() {
        let model = ContentModel::build(&catalog(), &AttributeWeights::default());
        let ids: Vec<ProductId> = catalog().keys().cloned().collect();
        for a in &ids {
            assert!((model.similarity(a, a).unwrap() - 1.0).abs() < 1e-9);
            for b in &ids {
                let ab = model.similarity(a, b).unwrap();
                assert!((0.0..=1.0).contains(&ab));
                assert!((ab - model.similarity(b, a).unwrap()).abs() < 1e-12);
            }
        }
    }

    // ------------------------------------------------------------------
    // Scoring
    // ------------------------------------------------------------------

    #[test]
    fn similar_ranks_shared_attributes_higher() {
        let model = ContentModel::build(&catalog(), &AttributeWeights::default());
        let set = model.similar(&"P1".into()).unwrap();
        assert!(!set.cold_start);
        assert_eq!(set.candidates.len(), 4);
        assert!(set.candidates.iter().all(|c| c.product.as_str() != "P1"));
        assert!(score(&set, "P2") > score(&set, "P3"));
        assert!(score(&set, "P3") > score(&set, "P4"));
    }

    #[test]
    fn unknown_seed_is_not_found() {
        let model = ContentModel::build(&catalog(), &AttributeWeights::default());
        assert_eq!(
            model.similar(&"nope".into()),
            Err(NotFoundError::Product("nope".into()))
        );
    }

    #[test]
    fn multi_seed_takes_max_and_honours_exclusions() {
        let model = ContentModel::build(&catalog(), &AttributeWeights::default());
        let seeds = [ProductId::from("P1"), ProductId::from("P4"), ProductId::from("ghost")];
        let exclude = BTreeSet::from([ProductId::from("P2")]);
        let set = model.score_seeds(&seeds, &exclude);
        let products: Vec<&str> = set.candidates.iter().map(|c| c.product.as_str()).collect();
        assert_eq!(products.len(), 2);
        assert!(products.contains(&"P3") && products.contains(&"P5"));
        let p3 = model
            .similarity(&"P1".into(), &"P3".into())
            .unwrap()
            .max(model.similarity(&"P4".into(), &"P3".into()).unwrap());
        assert!((score(&set, "P3") - p3).abs() < 1e-12);
    }

    #[test]
    fn no_known_seed_is_cold_start() {
        let model = ContentModel::build(&catalog(), &AttributeWeights::default());
        let set = model.score_seeds(&["ghost".into()], &BTreeSet::new());
        assert!(set.cold_start);
        assert!(set.is_empty());
    }
}
