// Rust guideline compliant 2026-10-12

//! Derived-model build, snapshot publishing, and the query facade.
//!
//! [`RecommendationModel::build`] turns one [`DatasetSnapshot`] into every
//! derived structure the scorers need (interaction matrix, neighbour tables,
//! association rules, content vectors, trending table). The three scorer
//! structures are independent and built in parallel.
//!
//! [`Recommender`] owns the published model behind a single swappable
//! pointer. A refresh builds the next model off to the side and swaps it in
//! only on success; a failed rebuild leaves the previous model serving.
//! Queries clone the pointer and never hold the lock while scoring.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use basket::RuleSet;
use chrono::{DateTime, Utc};
use collaborative::CollaborativeModel;
use content::ContentModel;
use domain::{
    Basket, Catalog, CustomerId, DatasetSnapshot, DatasetSource, EngineConfig, NotFoundError,
    Product, ProductId, RebuildError, Recommendation, SnapshotId, ValidationError, identifier_issue,
};
use interactions::{BuildReport, InteractionMatrix, MatrixBuild};
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;

/// Top-weighted products used as content seeds for a customer query.
const CUSTOMER_CONTENT_SEEDS: usize = 5;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a facade query. An empty result is not an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecommendError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error("no snapshot has been published yet")]
    NotReady,
}

// ---------------------------------------------------------------------------
// SnapshotInfo
// ---------------------------------------------------------------------------

/// Metadata of one published model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotInfo {
    pub id: SnapshotId,
    pub built_at: DateTime<Utc>,
    /// Customers with at least one accepted transaction.
    pub customers: usize,
    pub products: usize,
    pub baskets: usize,
    pub rules: usize,
    pub report: BuildReport,
}

// ---------------------------------------------------------------------------
// RecommendationModel
// ---------------------------------------------------------------------------

/// Everything derived from one snapshot. Never mutated after build.
#[derive(Debug)]
pub struct RecommendationModel {
    info: SnapshotInfo,
    config: EngineConfig,
    catalog: Catalog,
    matrix: InteractionMatrix,
    latest_basket: HashMap<CustomerId, Vec<ProductId>>,
    collaborative: CollaborativeModel,
    rules: RuleSet,
    content: ContentModel,
    /// Normalized recent purchase counts, best first.
    trending: Vec<(ProductId, f64)>,
}

impl RecommendationModel {
    /// Build a complete model from `snapshot`.
    ///
    /// # Errors
    ///
    /// - [`RebuildError::EmptyCatalog`] if no usable product record exists.
    /// - [`RebuildError::NoValidTransactions`] if every transaction row is rejected.
    pub fn build(snapshot: &DatasetSnapshot, config: &EngineConfig) -> Result<Self, RebuildError> {
        let catalog = build_catalog(&snapshot.products);
        if catalog.is_empty() {
            return Err(RebuildError::EmptyCatalog);
        }
        let MatrixBuild { matrix, baskets, recent_purchases, report } =
            interactions::build(&snapshot.transactions, &catalog, config)?;

        let (collaborative, (rules, content)) = rayon::join(
            || CollaborativeModel::build(&matrix, config),
            || {
                rayon::join(
                    || RuleSet::mine(&baskets, config),
                    || ContentModel::build(&catalog, &config.attribute_weights),
                )
            },
        );

        let latest_basket = interactions::latest_baskets(&baskets)
            .into_iter()
            .map(|(customer, basket)| (customer, basket.items.clone()))
            .collect();
        let info = SnapshotInfo {
            id: SnapshotId::new_v4(),
            built_at: Utc::now(),
            customers: matrix.customer_count(),
            products: catalog.len(),
            baskets: baskets.len(),
            rules: rules.len(),
            report,
        };
        Ok(Self {
            info,
            config: config.clone(),
            catalog,
            matrix,
            latest_basket,
            collaborative,
            rules,
            content,
            trending: trending_table(recent_purchases),
        })
    }

    #[must_use]
    pub fn info(&self) -> &SnapshotInfo {
        &self.info
    }

    #[must_use]
    pub fn matrix(&self) -> &InteractionMatrix {
        &self.matrix
    }

    /// Hybrid recommendations for one customer.
    ///
    /// Unknown customers produce three cold sets and therefore an empty list.
    /// Customers below `min_interactions` are ranked with the cold-start weights.
    #[must_use]
    pub fn recommend_for_customer(&self, customer: &CustomerId, k: usize) -> Vec<Recommendation> {
        let config = &self.config;
        let owned = self.matrix.owned_products(customer, config.owned_weight_ratio);
        let recent_basket = self.latest_basket.get(customer).map_or(&[][..], Vec::as_slice);
        let seeds = self.matrix.top_products(customer, CUSTOMER_CONTENT_SEEDS);
        let sets = [
            self.collaborative.score_customer(&self.matrix, customer, config.owned_weight_ratio),
            self.rules.score_basket(recent_basket),
            self.content.score_seeds(&seeds, &owned),
        ];
        let weights = if self.matrix.interaction_count(customer) < config.min_interactions {
            config.cold_start_weights
        } else {
            config.weights
        };
        ensemble::recommend(&sets, weights, &owned, k, &config.confidence_bands)
    }

    /// Hybrid recommendations completing a basket. Basket items are never returned.
    ///
    /// # Errors
    ///
    /// [`NotFoundError::Product`] for the first item absent from the catalog.
    pub fn recommend_for_basket(
        &self,
        items: &[ProductId],
        k: usize,
    ) -> Result<Vec<Recommendation>, NotFoundError> {
        if let Some(missing) = items.iter().find(|p| !self.catalog.contains_key(*p)) {
            return Err(NotFoundError::Product(missing.clone()));
        }
        let exclude: BTreeSet<ProductId> = items.iter().cloned().collect();
        let basket: Vec<ProductId> = exclude.iter().cloned().collect();
        let sets = [
            self.collaborative.score_items(&basket, &exclude),
            self.rules.score_basket(&basket),
            self.content.score_seeds(&basket, &exclude),
        ];
        let bands = &self.config.confidence_bands;
        Ok(ensemble::recommend(&sets, self.config.weights, &exclude, k, bands))
    }

    /// Products similar to `product` by co-purchase and attributes.
    ///
    /// # Errors
    ///
    /// [`NotFoundError::Product`] if `product` is not in the catalog.
    pub fn similar_products(
        &self,
        product: &ProductId,
        k: usize,
    ) -> Result<Vec<Recommendation>, NotFoundError> {
        let by_content = self.content.similar(product)?;
        let exclude = BTreeSet::from([product.clone()]);
        let sets = [
            self.collaborative.score_items(std::slice::from_ref(product), &exclude),
            by_content,
        ];
        let bands = &self.config.confidence_bands;
        Ok(ensemble::recommend(&sets, self.config.weights, &exclude, k, bands))
    }

    /// Most purchased products in the trending window. No strategy contributes.
    #[must_use]
    pub fn trending(&self, k: usize) -> Vec<Recommendation> {
        let bands = &self.config.confidence_bands;
        self.trending
            .iter()
            .take(k)
            .map(|(product, score)| Recommendation {
                product_id: product.clone(),
                score: *score,
                confidence_label: bands.label(*score),
                contributing_strategies: vec![],
            })
            .collect()
    }
}

/// Catalog keyed by id. Malformed ids are dropped; the first record for an id wins.
fn build_catalog(products: &[Product]) -> Catalog {
    let mut catalog = Catalog::new();
    for product in products {
        if let Some(issue) = identifier_issue(product.id.as_str()) {
            tracing::debug!(
                "engine.catalog.skipped: product={:?} issue={issue:?}",
                product.id.as_str()
            );
            continue;
        }
        catalog.entry(product.id.clone()).or_insert_with(|| product.clone());
    }
    catalog
}

#[expect(clippy::cast_precision_loss, reason = "purchase counts are far below 2^52")]
fn trending_table(recent: BTreeMap<ProductId, u64>) -> Vec<(ProductId, f64)> {
    let Some(&max) = recent.values().max() else { return vec![] };
    if max == 0 {
        return vec![];
    }
    let mut table: Vec<(ProductId, u64)> = recent.into_iter().filter(|(_, n)| *n > 0).collect();
    table.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    table.into_iter().map(|(p, n)| (p, n as f64 / max as f64)).collect()
}

// ---------------------------------------------------------------------------
// Recommender
// ---------------------------------------------------------------------------

/// Query facade over the currently published [`RecommendationModel`].
///
/// Safe to share across threads; all queries are reads of an immutable model.
#[derive(Debug)]
pub struct Recommender {
    config: EngineConfig,
    current: RwLock<Option<Arc<RecommendationModel>>>,
}

impl Recommender {
    /// Create a facade with no published snapshot.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config, current: RwLock::new(None) }
    }

    /// Rebuild from `snapshot` and publish the result atomically.
    ///
    /// # Errors
    ///
    /// Any [`RebuildError`]; the previously published model stays active.
    pub fn refresh(&self, snapshot: &DatasetSnapshot) -> Result<SnapshotInfo, RebuildError> {
        match RecommendationModel::build(snapshot, &self.config) {
            Ok(model) => {
                let info = model.info().clone();
                let previous = self.current.write().replace(Arc::new(model));
                tracing::info!(
                    "engine.refresh.published: snapshot={} previous={} customers={} \
                     products={} rules={} skipped={}",
                    info.id,
                    previous.map_or_else(|| "none".to_owned(), |m| m.info().id.to_string()),
                    info.customers,
                    info.products,
                    info.rules,
                    info.report.rows_skipped()
                );
                Ok(info)
            }
            Err(e) => {
                tracing::warn!(
                    "engine.refresh.failed: error={e} serving={}",
                    self.snapshot_info().map_or_else(|| "none".to_owned(), |i| i.id.to_string())
                );
                Err(e)
            }
        }
    }

    /// Load a snapshot from `source`, then [`refresh`](Self::refresh).
    ///
    /// Only the load is asynchronous: the CPU-bound build runs on the calling
    /// thread and blocks its executor until done. Callers that must stay
    /// responsive load the snapshot themselves and run `refresh` on a
    /// blocking thread.
    ///
    /// # Errors
    ///
    /// [`RebuildError::Source`] if the adapter fails, otherwise as `refresh`.
    pub async fn refresh_from<S: DatasetSource>(
        &self,
        source: &S,
    ) -> Result<SnapshotInfo, RebuildError> {
        let snapshot = source.load_snapshot().await.inspect_err(|e| {
            tracing::warn!("engine.refresh.source_failed: source={} error={e}", source.name());
        })?;
        tracing::debug!(
            "engine.refresh.loaded: source={} customers={} products={} rows={}",
            source.name(),
            snapshot.customers.len(),
            snapshot.products.len(),
            snapshot.transactions.len()
        );
        self.refresh(&snapshot)
    }

    /// Metadata of the published model, if any.
    #[must_use]
    pub fn snapshot_info(&self) -> Option<SnapshotInfo> {
        self.current.read().as_ref().map(|m| m.info().clone())
    }

    /// The published model.
    ///
    /// # Errors
    ///
    /// [`RecommendError::NotReady`] before the first successful refresh.
    pub fn model(&self) -> Result<Arc<RecommendationModel>, RecommendError> {
        self.current.read().as_ref().map(Arc::clone).ok_or(RecommendError::NotReady)
    }

    /// Top-`k` recommendations for a customer. Unknown customers get an empty list.
    ///
    /// # Errors
    ///
    /// [`RecommendError::Validation`] for `k == 0` or a malformed id,
    /// [`RecommendError::NotReady`] before the first refresh.
    pub fn recommend_for_customer(
        &self,
        customer_id: &str,
        k: usize,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        let k = self.result_count(k)?;
        let customer = CustomerId::new(checked_id("customer_id", customer_id)?);
        let recs = self.model()?.recommend_for_customer(&customer, k);
        tracing::debug!("engine.query.customer: customer={customer} k={k} results={}", recs.len());
        Ok(recs)
    }

    /// Top-`k` products completing a basket.
    ///
    /// # Errors
    ///
    /// As [`recommend_for_customer`](Self::recommend_for_customer), plus
    /// [`RecommendError::NotFound`] for items absent from the catalog.
    pub fn recommend_for_basket<S: AsRef<str>>(
        &self,
        item_ids: &[S],
        k: usize,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        let k = self.result_count(k)?;
        let items = item_ids
            .iter()
            .map(|id| checked_id("item_id", id.as_ref()).map(ProductId::new))
            .collect::<Result<Vec<_>, _>>()?;
        let recs = self.model()?.recommend_for_basket(&items, k)?;
        tracing::debug!("engine.query.basket: items={} k={k} results={}", items.len(), recs.len());
        Ok(recs)
    }

    /// Top-`k` products similar to one product.
    ///
    /// # Errors
    ///
    /// As [`recommend_for_basket`](Self::recommend_for_basket).
    pub fn similar_products(
        &self,
        product_id: &str,
        k: usize,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        let k = self.result_count(k)?;
        let product = ProductId::new(checked_id("product_id", product_id)?);
        let recs = self.model()?.similar_products(&product, k)?;
        tracing::debug!("engine.query.similar: product={product} k={k} results={}", recs.len());
        Ok(recs)
    }

    /// Top-`k` trending products.
    ///
    /// # Errors
    ///
    /// [`RecommendError::Validation`] for `k == 0`, [`RecommendError::NotReady`]
    /// before the first refresh.
    pub fn trending(&self, k: usize) -> Result<Vec<Recommendation>, RecommendError> {
        let k = self.result_count(k)?;
        Ok(self.model()?.trending(k))
    }

    fn result_count(&self, k: usize) -> Result<usize, ValidationError> {
        if k == 0 {
            return Err(ValidationError::ZeroResultCount);
        }
        Ok(k.min(self.config.max_results))
    }
}

fn checked_id<'a>(field: &'static str, raw: &'a str) -> Result<&'a str, ValidationError> {
    if identifier_issue(raw).is_some() {
        return Err(ValidationError::MalformedIdentifier { field, value: raw.to_owned() });
    }
    Ok(raw)
}

// ---------------------------------------------------------------------------
// Offline evaluation
// ---------------------------------------------------------------------------

/// Averages over every evaluated customer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HoldoutReport {
    pub customers_evaluated: usize,
    pub precision_at_k: f64,
    pub recall_at_k: f64,
    pub hit_rate: f64,
}

/// Leave-latest-basket-out evaluation of customer recommendations.
///
/// For each customer with at least two baskets the most recent basket is held
/// out; one model is built from the remaining rows and each such customer's
/// top-`k` is compared with the held-out items. Baskets are grouped and the
/// latest one chosen exactly as for the model (first-seen wins a timestamp
/// tie). `k` is capped at `max_results` and never below 1.
///
/// # Errors
///
/// Any [`RebuildError`] from building the training model.
#[expect(clippy::cast_precision_loss, reason = "counts are far below 2^52")]
pub fn evaluate_holdout(
    snapshot: &DatasetSnapshot,
    config: &EngineConfig,
    k: usize,
) -> Result<HoldoutReport, RebuildError> {
    let k = k.min(config.max_results).max(1);

    // Same grouping and latest-basket rule the model uses.
    let catalog = build_catalog(&snapshot.products);
    if catalog.is_empty() {
        return Err(RebuildError::EmptyCatalog);
    }
    let baskets = interactions::build(&snapshot.transactions, &catalog, config)?.baskets;
    let mut basket_counts: HashMap<&CustomerId, usize> = HashMap::new();
    for basket in &baskets {
        *basket_counts.entry(&basket.customer).or_default() += 1;
    }
    let held_out: BTreeMap<&str, &Basket> = interactions::latest_baskets(&baskets)
        .into_values()
        .filter(|basket| basket_counts.get(&basket.customer).is_some_and(|n| *n >= 2))
        .map(|basket| (basket.customer.as_str(), basket))
        .collect();

    let mut training = DatasetSnapshot {
        customers: snapshot.customers.clone(),
        products: snapshot.products.clone(),
        transactions: Vec::with_capacity(snapshot.transactions.len()),
    };
    training.transactions.extend(
        snapshot
            .transactions
            .iter()
            .filter(|row| {
                held_out
                    .get(row.customer_id.as_str())
                    .is_none_or(|basket| basket.id != row.basket_id)
            })
            .cloned(),
    );

    let model = RecommendationModel::build(&training, config)?;
    let outcomes: Vec<(f64, f64, bool)> = held_out
        .par_iter()
        .map(|(_, basket)| {
            let items = &basket.items;
            let recs = model.recommend_for_customer(&basket.customer, k);
            let hits = recs.iter().filter(|r| items.contains(&r.product_id)).count();
            (hits as f64 / k as f64, hits as f64 / items.len() as f64, hits > 0)
        })
        .collect();

    let n = outcomes.len();
    let report = if n == 0 {
        HoldoutReport {
            customers_evaluated: 0,
            precision_at_k: 0.0,
            recall_at_k: 0.0,
            hit_rate: 0.0,
        }
    } else {
        let total = n as f64;
        HoldoutReport {
            customers_evaluated: n,
            precision_at_k: outcomes.iter().map(|o| o.0).sum::<f64>() / total,
            recall_at_k: outcomes.iter().map(|o| o.1).sum::<f64>() / total,
            hit_rate: outcomes.iter().filter(|o| o.2).count() as f64 / total,
        }
    };
    tracing::info!(
        "engine.evaluate.done: customers={} k={k} precision={:.4} recall={:.4} hit_rate={:.4}",
        report.customers_evaluated,
        report.precision_at_k,
        report.recall_at_k,
        report.hit_rate
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
