// Rust guideline compliant 2026-10-12

//! Shared domain types for the hybrid recommendation engine.
//!
//! Defines the dataset snapshot consumed from the ETL side, the derived
//! records every scorer speaks (`Interaction`, `Basket`, `AssociationRule`,
//! `ScoredCandidate`), the externally visible `Recommendation`, the error
//! taxonomy, the immutable [`EngineConfig`], and the `DatasetSource` port.
//! All engine crates depend on this crate; no other workspace crate is imported here.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Customer identifier as supplied by the ETL collaborator (e.g. `"CUST001"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(String);

/// Product identifier. Ordering is lexical and drives the ranking tie-break.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

macro_rules! string_id {
    ($ty:ident) => {
        impl $ty {
            /// Wrap a raw identifier. No validation is performed here.
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(raw: &str) -> Self {
                Self::new(raw)
            }
        }
    };
}

string_id!(CustomerId);
string_id!(ProductId);

/// Why a raw identifier was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierIssue {
    /// Empty or whitespace-only.
    Blank,
    /// Contains interior whitespace or control characters.
    Malformed,
}

/// Check a raw identifier without allocating.
///
/// Returns `None` when the identifier is usable as-is.
#[must_use]
pub fn identifier_issue(raw: &str) -> Option<IdentifierIssue> {
    if raw.trim().is_empty() {
        return Some(IdentifierIssue::Blank);
    }
    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Some(IdentifierIssue::Malformed);
    }
    None
}

/// Identifier of one published derived model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(uuid::Uuid);

impl SnapshotId {
    /// Allocate a fresh random snapshot id.
    #[must_use]
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Input snapshot (from the ETL collaborator)
// ---------------------------------------------------------------------------

/// Ordinal customer segment tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

/// A customer record. Descriptive only; scoring never requires one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub segment: SegmentTier,
    /// Lifetime-value estimate in the normalized reporting currency.
    pub lifetime_value: f64,
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub category: String,
    #[serde(default)]
    pub brand: Option<String>,
    /// Unit price in the normalized reporting currency.
    pub price: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One raw purchase row. Identifiers are unvalidated at this point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Groups rows purchased together into one basket.
    pub basket_id: String,
    pub customer_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub timestamp: DateTime<Utc>,
}

/// Immutable dataset snapshot a derived model is built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    pub customers: Vec<Customer>,
    pub products: Vec<Product>,
    pub transactions: Vec<RawTransaction>,
}

// ---------------------------------------------------------------------------
// Derived records
// ---------------------------------------------------------------------------

/// Collapsed, recency-weighted signal between one customer and one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub customer: CustomerId,
    pub product: ProductId,
    /// `sum(quantity * decay(timestamp))`; always `>= 0`.
    pub weight: f64,
    /// Number of contributing rows.
    pub purchases: u32,
    pub last_seen: DateTime<Utc>,
}

/// Items purchased together, deduplicated in first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Basket {
    pub id: String,
    pub customer: CustomerId,
    pub items: Vec<ProductId>,
    /// Latest row timestamp within the basket.
    pub timestamp: DateTime<Utc>,
}

/// `antecedent -> consequent` with standard association metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRule {
    /// Sorted ascending; never contains `consequent`.
    pub antecedent: Vec<ProductId>,
    pub consequent: ProductId,
    /// Fraction of all baskets containing antecedent and consequent.
    pub support: f64,
    /// `P(consequent | antecedent)`.
    pub confidence: f64,
    /// `confidence / support(consequent)`.
    pub lift: f64,
}

impl AssociationRule {
    /// Score used when this rule fires for a basket query.
    #[must_use]
    pub fn strength(&self) -> f64 {
        self.confidence * self.lift
    }
}

/// Scoring strategy that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Collaborative,
    Basket,
    Content,
}

impl Strategy {
    /// Human-readable explanation shown next to a recommendation.
    #[must_use]
    pub fn reason(self) -> &'static str {
        match self {
            Self::Collaborative => "customers with similar purchase histories also bought this",
            Self::Basket => "frequently bought together",
            Self::Content => "shares attributes with items you viewed",
        }
    }
}

/// Per-query candidate; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub product: ProductId,
    /// Strategy-specific scale; normalized by the ensemble.
    pub raw_score: f64,
    pub strategy: Strategy,
}

/// One strategy's output for one query.
///
/// `cold_start` is set when the strategy had no signal for the query subject,
/// as opposed to having signal but no candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSet {
    pub strategy: Strategy,
    pub candidates: Vec<ScoredCandidate>,
    pub cold_start: bool,
}

impl CandidateSet {
    /// Candidate set for a subject the strategy knows nothing about.
    #[must_use]
    pub fn cold(strategy: Strategy) -> Self {
        Self { strategy, candidates: vec![], cold_start: true }
    }

    /// Build a set from `(product, raw_score)` pairs.
    #[must_use]
    pub fn scored(strategy: Strategy, scores: impl IntoIterator<Item = (ProductId, f64)>) -> Self {
        let candidates = scores
            .into_iter()
            .map(|(product, raw_score)| ScoredCandidate { product, raw_score, strategy })
            .collect();
        Self { strategy, candidates, cold_start: false }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Presentation band for a final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLabel {
    High,
    Medium,
    Low,
}

/// Externally visible, immutable recommendation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product_id: ProductId,
    /// Final blended score in `[0, 1]`.
    pub score: f64,
    pub confidence_label: ConfidenceLabel,
    /// Strategies that produced a candidate for this product, in ensemble order.
    pub contributing_strategies: Vec<Strategy>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A malformed input row. Recoverable: the row is skipped and counted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    #[error("row {row}: missing {field}")]
    MissingField { row: usize, field: &'static str },
    #[error("row {row}: malformed {field} {value:?}")]
    MalformedIdentifier { row: usize, field: &'static str, value: String },
    #[error("row {row}: quantity must be >= 1")]
    ZeroQuantity { row: usize },
    #[error("row {row}: product {product} is not in the catalog")]
    UnknownProduct { row: usize, product: ProductId },
}

impl DataError {
    /// Stable short name used as a counter key in build reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "missing_field",
            Self::MalformedIdentifier { .. } => "malformed_identifier",
            Self::ZeroQuantity { .. } => "zero_quantity",
            Self::UnknownProduct { .. } => "unknown_product",
        }
    }
}

/// A referenced product or basket item is absent from the catalog.
///
/// Unknown customers are not an error: they are the cold-start case and get
/// an empty result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    #[error("product {0} not found")]
    Product(ProductId),
}

/// Malformed query parameters. Raised before any computation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("result count must be >= 1")]
    ZeroResultCount,
    #[error("malformed {field} {value:?}")]
    MalformedIdentifier { field: &'static str, value: String },
}

/// Failure reported by a `DatasetSource` adapter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    #[error("dataset source unavailable: {reason}")]
    Unavailable {
        /// Human-readable description.
        reason: String,
    },
}

/// A rebuild could not produce a publishable model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RebuildError {
    #[error("no valid transactions ({rows_total} rows, {rows_skipped} skipped)")]
    NoValidTransactions { rows_total: usize, rows_skipped: usize },
    #[error("product catalog is empty")]
    EmptyCatalog,
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Invalid engine configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid engine configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// EngineConfig + builder
// ---------------------------------------------------------------------------

/// Pairwise similarity used by the collaborative scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Cosine over recency-decayed weights.
    Cosine,
    /// Jaccard over purchase sets, ignoring weights.
    Jaccard,
}

/// Per-strategy ensemble coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights {
    pub collaborative: f64,
    pub basket: f64,
    pub content: f64,
}

impl EnsembleWeights {
    /// Equal weighting.
    #[must_use]
    pub fn balanced() -> Self {
        Self { collaborative: 1.0 / 3.0, basket: 1.0 / 3.0, content: 1.0 / 3.0 }
    }

    /// Content-dominated weighting for customers with little history.
    #[must_use]
    pub fn cold_start() -> Self {
        Self { collaborative: 0.15, basket: 0.15, content: 0.70 }
    }

    /// Coefficient for `strategy`.
    #[must_use]
    pub fn weight(&self, strategy: Strategy) -> f64 {
        match strategy {
            Strategy::Collaborative => self.collaborative,
            Strategy::Basket => self.basket,
            Strategy::Content => self.content,
        }
    }

    /// Rescale so the coefficients sum to 1. Returns `self` unchanged if the sum is not positive.
    #[must_use]
    pub fn normalized(self) -> Self {
        let sum = self.collaborative + self.basket + self.content;
        if sum <= 0.0 {
            return self;
        }
        Self {
            collaborative: self.collaborative / sum,
            basket: self.basket / sum,
            content: self.content / sum,
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let all = [self.collaborative, self.basket, self.content];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(invalid(format!("{name} must be finite and >= 0")));
        }
        if all.iter().sum::<f64>() <= 0.0 {
            return Err(invalid(format!("{name} must not all be zero")));
        }
        Ok(())
    }
}

/// Feature weights for content similarity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttributeWeights {
    pub category: f64,
    pub brand: f64,
    pub price_tier: f64,
    /// Min-max normalized numeric price.
    pub price: f64,
    /// Total weight shared across a product's tags.
    pub tags: f64,
}

impl Default for AttributeWeights {
    fn default() -> Self {
        Self { category: 1.0, brand: 0.5, price_tier: 0.5, price: 0.25, tags: 0.5 }
    }
}

/// Score thresholds for [`ConfidenceLabel`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBands {
    pub high: f64,
    pub medium: f64,
}

impl ConfidenceBands {
    /// Map a final score onto its presentation band.
    #[must_use]
    pub fn label(&self, score: f64) -> ConfidenceLabel {
        if score >= self.high {
            ConfidenceLabel::High
        } else if score >= self.medium {
            ConfidenceLabel::Medium
        } else {
            ConfidenceLabel::Low
        }
    }
}

impl Default for ConfidenceBands {
    fn default() -> Self {
        Self { high: 0.7, medium: 0.4 }
    }
}

/// Immutable engine tunables, passed explicitly into builds and queries.
///
/// Construct via [`EngineConfig::builder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Age (days) at which an interaction counts half.
    pub recency_half_life_days: f64,
    pub similarity_metric: SimilarityMetric,
    /// Neighbours kept per customer and per product.
    pub neighbourhood_size: usize,
    /// Products at or above this fraction of a customer's top weight are not re-recommended.
    pub owned_weight_ratio: f64,
    /// Minimum itemset support, as a fraction of baskets.
    pub min_support: f64,
    pub min_confidence: f64,
    /// Largest itemset mined (antecedent size is one less).
    pub max_itemset_len: usize,
    pub weights: EnsembleWeights,
    pub cold_start_weights: EnsembleWeights,
    /// Customers with fewer interactions than this use `cold_start_weights`.
    pub min_interactions: usize,
    /// Upper cap applied to every requested result count.
    pub max_results: usize,
    pub trending_window_days: u32,
    pub confidence_bands: ConfidenceBands,
    pub attribute_weights: AttributeWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recency_half_life_days: 90.0,
            similarity_metric: SimilarityMetric::Cosine,
            neighbourhood_size: 20,
            owned_weight_ratio: 0.5,
            min_support: 0.01,
            min_confidence: 0.1,
            max_itemset_len: 3,
            weights: EnsembleWeights::balanced(),
            cold_start_weights: EnsembleWeights::cold_start(),
            min_interactions: 3,
            max_results: 50,
            trending_window_days: 30,
            confidence_bands: ConfidenceBands::default(),
            attribute_weights: AttributeWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Create a builder pre-loaded with the defaults.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder { config: Self::default() }
    }
}

/// Builder for [`EngineConfig`].
///
/// Obtain via [`EngineConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    #[must_use]
    pub fn recency_half_life_days(mut self, days: f64) -> Self {
        self.config.recency_half_life_days = days;
        self
    }

    #[must_use]
    pub fn similarity_metric(mut self, metric: SimilarityMetric) -> Self {
        self.config.similarity_metric = metric;
        self
    }

    #[must_use]
    pub fn neighbourhood_size(mut self, n: usize) -> Self {
        self.config.neighbourhood_size = n;
        self
    }

    #[must_use]
    pub fn owned_weight_ratio(mut self, ratio: f64) -> Self {
        self.config.owned_weight_ratio = ratio;
        self
    }

    #[must_use]
    pub fn min_support(mut self, support: f64) -> Self {
        self.config.min_support = support;
        self
    }

    #[must_use]
    pub fn min_confidence(mut self, confidence: f64) -> Self {
        self.config.min_confidence = confidence;
        self
    }

    #[must_use]
    pub fn max_itemset_len(mut self, len: usize) -> Self {
        self.config.max_itemset_len = len;
        self
    }

    #[must_use]
    pub fn weights(mut self, weights: EnsembleWeights) -> Self {
        self.config.weights = weights;
        self
    }

    #[must_use]
    pub fn cold_start_weights(mut self, weights: EnsembleWeights) -> Self {
        self.config.cold_start_weights = weights;
        self
    }

    #[must_use]
    pub fn min_interactions(mut self, n: usize) -> Self {
        self.config.min_interactions = n;
        self
    }

    #[must_use]
    pub fn max_results(mut self, n: usize) -> Self {
        self.config.max_results = n;
        self
    }

    #[must_use]
    pub fn trending_window_days(mut self, days: u32) -> Self {
        self.config.trending_window_days = days;
        self
    }

    #[must_use]
    pub fn confidence_bands(mut self, bands: ConfidenceBands) -> Self {
        self.config.confidence_bands = bands;
        self
    }

    #[must_use]
    pub fn attribute_weights(mut self, weights: AttributeWeights) -> Self {
        self.config.attribute_weights = weights;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfig`] naming the first out-of-range field.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let c = self.config;
        if !(c.recency_half_life_days.is_finite() && c.recency_half_life_days > 0.0) {
            return Err(invalid("recency_half_life_days must be > 0"));
        }
        if c.neighbourhood_size == 0 {
            return Err(invalid("neighbourhood_size must be >= 1"));
        }
        if !(c.owned_weight_ratio > 0.0 && c.owned_weight_ratio <= 1.0) {
            return Err(invalid("owned_weight_ratio must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&c.min_support) {
            return Err(invalid("min_support must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&c.min_confidence) {
            return Err(invalid("min_confidence must be in [0, 1]"));
        }
        if c.max_itemset_len < 2 {
            return Err(invalid("max_itemset_len must be >= 2"));
        }
        c.weights.validate("weights")?;
        c.cold_start_weights.validate("cold_start_weights")?;
        if c.max_results == 0 {
            return Err(invalid("max_results must be >= 1"));
        }
        if c.trending_window_days == 0 {
            return Err(invalid("trending_window_days must be >= 1"));
        }
        let bands = c.confidence_bands;
        if !(0.0 <= bands.medium && bands.medium <= bands.high && bands.high <= 1.0) {
            return Err(invalid("confidence bands must satisfy 0 <= medium <= high <= 1"));
        }
        let aw = c.attribute_weights;
        if [aw.category, aw.brand, aw.price_tier, aw.price, aw.tags]
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(invalid("attribute weights must be finite and >= 0"));
        }
        Ok(c)
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidConfig { reason: reason.into() }
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Hexagonal port: supplies dataset snapshots to the engine.
///
/// Implemented by adapters outside the engine (synthetic demo data, SQLite,
/// ...). The engine assumes the returned snapshot is immutable.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait DatasetSource {
    /// Fetch the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Unavailable` when the snapshot cannot be read.
    async fn load_snapshot(&self) -> Result<DatasetSnapshot, SourceError>;

    /// Short adapter name for logs (e.g. `"demo"`).
    fn name(&self) -> &str;
}

/// Lookup of catalog entries by id, kept sorted for reproducible iteration.
pub type Catalog = BTreeMap<ProductId, Product>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------
    // Identifiers
    // ------------------------------------------------------------------

    #[test]
    fn identifier_issue_detects_blank_and_malformed() {
        assert_eq!(identifier_issue(""), Some(IdentifierIssue::Blank));
        assert_eq!(identifier_issue("   "), Some(IdentifierIssue::Blank));
        assert_eq!(identifier_issue("CUST 001"), Some(IdentifierIssue::Malformed));
        assert_eq!(identifier_issue("PROD\u{7}"), Some(IdentifierIssue::Malformed));
        assert_eq!(identifier_issue("PROD001"), None);
    }

    #[test]
    fn product_ids_order_lexically() {
        let mut ids = vec![ProductId::from("PROD010"), ProductId::from("PROD002")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "PROD002");
    }

    #[test]
    fn segment_tiers_are_ordinal() {
        assert!(SegmentTier::Bronze < SegmentTier::Silver);
        assert!(SegmentTier::Gold < SegmentTier::Platinum);
    }

    // ------------------------------------------------------------------
    // Derived records
    // ------------------------------------------------------------------

    #[test]
    fn rule_strength_is_confidence_times_lift() {
        let rule = AssociationRule {
            antecedent: vec!["A".into()],
            consequent: "B".into(),
            support: 0.2,
            confidence: 0.5,
            lift: 2.0,
        };
        assert!((rule.strength() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn candidate_set_constructors() {
        let cold = CandidateSet::cold(Strategy::Collaborative);
        assert!(cold.cold_start && cold.is_empty());

        let scored = CandidateSet::scored(Strategy::Basket, [(ProductId::from("P1"), 0.4)]);
        assert!(!scored.cold_start);
        assert_eq!(scored.candidates[0].strategy, Strategy::Basket);
    }

    #[test]
    fn recommendation_serializes_to_output_contract() {
        let rec = Recommendation {
            product_id: "PROD001".into(),
            score: 0.75,
            confidence_label: ConfidenceLabel::High,
            contributing_strategies: vec![Strategy::Collaborative, Strategy::Content],
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["product_id"], "PROD001");
        assert_eq!(json["confidence_label"], "high");
        assert_eq!(json["contributing_strategies"][1], "content");
    }

    #[test]
    fn data_error_kinds_are_stable() {
        let e = DataError::ZeroQuantity { row: 3 };
        assert_eq!(e.kind(), "zero_quantity");
        assert_eq!(e.to_string(), "row 3: quantity must be >= 1");
    }

    // ------------------------------------------------------------------
    // EngineConfig
    // ------------------------------------------------------------------

    #[test]
    fn default_config_builds() {
        let config = EngineConfig::builder().build().unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_results, 50);
    }

    #[test]
    fn config_rejects_out_of_range_values() {
        assert!(matches!(
            EngineConfig::builder().min_support(1.5).build(),
            Err(ConfigError::InvalidConfig { .. })
        ));
        assert!(EngineConfig::builder().max_itemset_len(1).build().is_err());
        assert!(EngineConfig::builder().max_results(0).build().is_err());
        assert!(EngineConfig::builder().owned_weight_ratio(0.0).build().is_err());
        assert!(
            EngineConfig::builder()
                .weights(EnsembleWeights { collaborative: 0.0, basket: 0.0, content: 0.0 })
                .build()
                .is_err()
        );
        assert!(
            EngineConfig::builder()
                .confidence_bands(ConfidenceBands { high: 0.3, medium: 0.6 })
                .build()
                .is_err()
        );
    }

    #[test]
    fn weights_normalize_to_one() {
        let w = EnsembleWeights { collaborative: 2.0, basket: 1.0, content: 1.0 }.normalized();
        assert!((w.collaborative - 0.5).abs() < 1e-12);
        assert!((w.collaborative + w.basket + w.content - 1.0).abs() < 1e-12);
    }

    #[test]
    fn confidence_bands_label_scores() {
        let bands = ConfidenceBands::default();
        assert_eq!(bands.label(0.7), ConfidenceLabel::High);
        assert_eq!(bands.label(0.5), ConfidenceLabel::Medium);
        assert_eq!(bands.label(0.39), ConfidenceLabel::Low);
    }

    // ------------------------------------------------------------------
    // DatasetSource port -- compile check
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn dataset_source_compiles_with_minimal_impl() {
        struct EmptySource;

        impl DatasetSource for EmptySource {
            async fn load_snapshot(&self) -> Result<DatasetSnapshot, SourceError> {
                Ok(DatasetSnapshot::default())
            }

            fn name(&self) -> &str {
                "empty"
            }
        }

        let snapshot = EmptySource.load_snapshot().await.unwrap();
        assert!(snapshot.transactions.is_empty());
        assert_eq!(EmptySource.name(), "empty");
    }
}
