// Rust guideline compliant 2026-10-12

//! Interaction matrix builder.
//!
//! Turns raw transaction rows into a sparse customer x product weight matrix
//! (recency-decayed implicit feedback), groups rows into baskets, and counts
//! recent purchases for trending. Malformed rows are skipped and counted in a
//! [`BuildReport`]; they never abort the build.
//!
//! Entry point: [`build`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, TimeDelta, Utc};
use domain::{
    Basket, Catalog, CustomerId, DataError, EngineConfig, IdentifierIssue, Interaction, ProductId,
    RawTransaction, RebuildError, identifier_issue,
};
use serde::Serialize;

// ---------------------------------------------------------------------------
// BuildReport
// ---------------------------------------------------------------------------

/// Row accounting for one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub rows_total: usize,
    pub rows_accepted: usize,
    /// Skipped rows keyed by [`DataError::kind`].
    pub skipped: BTreeMap<&'static str, usize>,
}

impl BuildReport {
    #[must_use]
    pub fn rows_skipped(&self) -> usize {
        self.skipped.values().sum()
    }

    fn record(&mut self, error: &DataError) {
        *self.skipped.entry(error.kind()).or_default() += 1;
    }
}

// ---------------------------------------------------------------------------
// InteractionMatrix
// ---------------------------------------------------------------------------

/// One collapsed matrix cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    /// Recency-decayed weight, `>= 0`.
    pub weight: f64,
    pub purchases: u32,
    pub last_seen: DateTime<Utc>,
}

/// Sparse customer x product matrix with both row and column access.
///
/// Backed by `BTreeMap`s so every iteration (and every floating-point sum
/// derived from one) happens in the same order for the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct InteractionMatrix {
    rows: BTreeMap<CustomerId, BTreeMap<ProductId, Cell>>,
    columns: BTreeMap<ProductId, BTreeMap<CustomerId, f64>>,
    latest: Option<DateTime<Utc>>,
}

impl InteractionMatrix {
    /// Row for `customer`, or `None` for a cold-start customer.
    #[must_use]
    pub fn row(&self, customer: &CustomerId) -> Option<&BTreeMap<ProductId, Cell>> {
        self.rows.get(customer)
    }

    /// Column for `product`: every customer that bought it, with their weight.
    #[must_use]
    pub fn column(&self, product: &ProductId) -> Option<&BTreeMap<CustomerId, f64>> {
        self.columns.get(product)
    }

    /// Weight for one pair; `0.0` when absent.
    #[must_use]
    pub fn weight(&self, customer: &CustomerId, product: &ProductId) -> f64 {
        self.rows
            .get(customer)
            .and_then(|row| row.get(product))
            .map_or(0.0, |cell| cell.weight)
    }

    /// Number of distinct products the customer has interacted with.
    #[must_use]
    pub fn interaction_count(&self, customer: &CustomerId) -> usize {
        self.rows.get(customer).map_or(0, BTreeMap::len)
    }

    /// Highest weight in the customer's row.
    #[must_use]
    pub fn max_weight(&self, customer: &CustomerId) -> Option<f64> {
        self.rows
            .get(customer)?
            .values()
            .map(|cell| cell.weight)
            .max_by(f64::total_cmp)
    }

    /// Products the customer already buys heavily: weight `>= ratio * max_weight`.
    #[must_use]
    pub fn owned_products(&self, customer: &CustomerId, ratio: f64) -> BTreeSet<ProductId> {
        let (Some(row), Some(max)) = (self.rows.get(customer), self.max_weight(customer)) else {
            return BTreeSet::new();
        };
        let threshold = ratio * max;
        row.iter()
            .filter(|(_, cell)| cell.weight >= threshold)
            .map(|(product, _)| product.clone())
            .collect()
    }

    /// The customer's `n` heaviest products, heaviest first, lower id on ties.
    #[must_use]
    pub fn top_products(&self, customer: &CustomerId, n: usize) -> Vec<ProductId> {
        let Some(row) = self.rows.get(customer) else {
            return vec![];
        };
        let mut entries: Vec<(&ProductId, f64)> = row.iter().map(|(p, c)| (p, c.weight)).collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries.into_iter().take(n).map(|(p, _)| p.clone()).collect()
    }

    pub fn customers(&self) -> impl Iterator<Item = &CustomerId> {
        self.rows.keys()
    }

    pub fn products(&self) -> impl Iterator<Item = &ProductId> {
        self.columns.keys()
    }

    #[must_use]
    pub fn customer_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn product_count(&self) -> usize {
        self.columns.len()
    }

    /// Latest valid timestamp in the snapshot (decay reference point).
    #[must_use]
    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.latest
    }

    /// The customer's interactions as owned records, in product order.
    /// Empty for a cold-start customer.
    #[must_use]
    pub fn history(&self, customer: &CustomerId) -> Vec<Interaction> {
        let Some(row) = self.rows.get(customer) else {
            return vec![];
        };
        row.iter()
            .map(|(product, cell)| Interaction {
                customer: customer.clone(),
                product: product.clone(),
                weight: cell.weight,
                purchases: cell.purchases,
                last_seen: cell.last_seen,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Everything derived from the raw rows in one pass.
#[derive(Debug, Clone)]
pub struct MatrixBuild {
    pub matrix: InteractionMatrix,
    /// Baskets keyed by `(customer, basket_id)`, in first-seen order.
    pub baskets: Vec<Basket>,
    /// Quantity purchased per product within the trending window.
    pub recent_purchases: BTreeMap<ProductId, u64>,
    pub report: BuildReport,
}

/// A row that passed validation.
#[derive(Debug)]
struct ValidRow<'a> {
    basket_id: &'a str,
    customer: CustomerId,
    product: ProductId,
    quantity: u32,
    timestamp: DateTime<Utc>,
}

/// Build the interaction matrix, baskets, and trending counts from `rows`.
///
/// Rows with missing/malformed identifiers, zero quantity, or a product
/// absent from `catalog` are skipped and counted in the report.
///
/// # Errors
///
/// Returns [`RebuildError::NoValidTransactions`] when no row survives validation.
pub fn build(
    rows: &[RawTransaction],
    catalog: &Catalog,
    config: &EngineConfig,
) -> Result<MatrixBuild, RebuildError> {
    let mut report = BuildReport { rows_total: rows.len(), ..BuildReport::default() };
    let mut valid = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        match validate_row(index, row, catalog) {
            Ok(v) => valid.push(v),
            Err(e) => {
                tracing::debug!("interactions.row.skipped: {e}");
                report.record(&e);
            }
        }
    }
    report.rows_accepted = valid.len();

    let Some(latest) = valid.iter().map(|r| r.timestamp).max() else {
        return Err(RebuildError::NoValidTransactions {
            rows_total: report.rows_total,
            rows_skipped: report.rows_skipped(),
        });
    };

    let half_life = config.recency_half_life_days;
    // `None` when the window reaches past the representable range: every row is recent.
    let window_start = TimeDelta::try_days(i64::from(config.trending_window_days))
        .and_then(|window| latest.checked_sub_signed(window));
    let mut matrix = InteractionMatrix { latest: Some(latest), ..InteractionMatrix::default() };
    let mut recent_purchases: BTreeMap<ProductId, u64> = BTreeMap::new();
    let mut baskets: Vec<Basket> = vec![];
    let mut basket_index: HashMap<(&str, &str), usize> = HashMap::new();

    for row in &valid {
        let decay = recency_decay(latest, row.timestamp, half_life);
        let contribution = f64::from(row.quantity) * decay;
        let cell = matrix
            .rows
            .entry(row.customer.clone())
            .or_default()
            .entry(row.product.clone())
            .or_insert(Cell { weight: 0.0, purchases: 0, last_seen: row.timestamp });
        cell.weight += contribution;
        cell.purchases += 1;
        cell.last_seen = cell.last_seen.max(row.timestamp);

        if window_start.is_none_or(|start| row.timestamp > start) {
            *recent_purchases.entry(row.product.clone()).or_default() += u64::from(row.quantity);
        }

        let key = (row.customer.as_str(), row.basket_id);
        match basket_index.get(&key) {
            Some(&i) => {
                let basket = &mut baskets[i];
                if !basket.items.contains(&row.product) {
                    basket.items.push(row.product.clone());
                }
                basket.timestamp = basket.timestamp.max(row.timestamp);
            }
            None => {
                basket_index.insert(key, baskets.len());
                baskets.push(Basket {
                    id: row.basket_id.to_owned(),
                    customer: row.customer.clone(),
                    items: vec![row.product.clone()],
                    timestamp: row.timestamp,
                });
            }
        }
    }

    for (customer, row) in &matrix.rows {
        for (product, cell) in row {
            matrix
                .columns
                .entry(product.clone())
                .or_default()
                .insert(customer.clone(), cell.weight);
        }
    }

    tracing::info!(
        "interactions.build.done: rows={} accepted={} customers={} products={} baskets={}",
        report.rows_total,
        report.rows_accepted,
        matrix.customer_count(),
        matrix.product_count(),
        baskets.len()
    );
    Ok(MatrixBuild { matrix, baskets, recent_purchases, report })
}

/// Exponential decay relative to `latest`: `2^(-age_days / half_life_days)`.
///
/// Equals 1 for the most recent interaction and is never negative.
#[must_use]
pub fn recency_decay(latest: DateTime<Utc>, at: DateTime<Utc>, half_life_days: f64) -> f64 {
    #[expect(clippy::cast_precision_loss, reason = "millisecond ages fit comfortably in f64")]
    let age_days = ((latest - at).num_milliseconds().max(0) as f64) / 86_400_000.0;
    (-std::f64::consts::LN_2 * age_days / half_life_days).exp()
}

/// Most recent basket per customer. On equal timestamps the first-seen basket wins.
#[must_use]
pub fn latest_baskets(baskets: &[Basket]) -> HashMap<CustomerId, &Basket> {
    let mut latest: HashMap<CustomerId, &Basket> = HashMap::new();
    for basket in baskets {
        latest
            .entry(basket.customer.clone())
            .and_modify(|current| {
                if basket.timestamp > current.timestamp {
                    *current = basket;
                }
            })
            .or_insert(basket);
    }
    latest
}

fn validate_row<'a>(
    row: usize,
    raw: &'a RawTransaction,
    catalog: &Catalog,
) -> Result<ValidRow<'a>, DataError> {
    check_identifier(row, "basket_id", &raw.basket_id)?;
    check_identifier(row, "customer_id", &raw.customer_id)?;
    check_identifier(row, "product_id", &raw.product_id)?;
    if raw.quantity == 0 {
        return Err(DataError::ZeroQuantity { row });
    }
    let product = ProductId::new(raw.product_id.as_str());
    if !catalog.contains_key(&product) {
        return Err(DataError::UnknownProduct { row, product });
    }
    Ok(ValidRow {
        basket_id: &raw.basket_id,
        customer: CustomerId::new(raw.customer_id.as_str()),
        product,
        quantity: raw.quantity,
        timestamp: raw.timestamp,
    })
}

fn check_identifier(row: usize, field: &'static str, value: &str) -> Result<(), DataError> {
    match identifier_issue(value) {
        None => Ok(()),
        Some(IdentifierIssue::Blank) => Err(DataError::MissingField { row, field }),
        Some(IdentifierIssue::Malformed) => Err(DataError::MalformedIdentifier {
            row,
            field,
            value: value.to_owned(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Product;

    fn ts(days_ago: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_750_000_000, 0).unwrap() - TimeDelta::days(days_ago)
    }

    fn row(basket: &str, customer: &str, product: &str, qty: u32, days_ago: i64) -> RawTransaction {
        RawTransaction {
            basket_id: basket.to_owned(),
            customer_id: customer.to_owned(),
            product_id: product.to_owned(),
            quantity: qty,
            timestamp: ts(days_ago),
        }
    }

    fn catalog(ids: &[&str]) -> Catalog {
        ids.iter()
            .map(|id| {
                let p = Product {
                    id: ProductId::from(*id),
                    category: "Skincare".to_owned(),
                    brand: None,
                    price: 10.0,
                    tags: vec![],
                };
                (p.id.clone(), p)
            })
            .collect()
    }

    fn config() -> EngineConfig {
        EngineConfig::builder().recency_half_life_days(10.0).build().unwrap()
    }

    // ------------------------------------------------------------------
    // Weights
    // ------------------------------------------------------------------

    #[test]
    fn most_recent_interaction_has_decay_one() {
        assert!((recency_decay(ts(0), ts(0), 10.0) - 1.0).abs() < 1e-12);
        assert!((recency_decay(ts(0), ts(10), 10.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn weights_sum_quantity_times_decay() {
        let rows = vec![row("T1", "C1", "P1", 2, 0), row("T2", "C1", "P1", 4, 10)];
        let built = build(&rows, &catalog(&["P1"]), &config()).unwrap();
        let c1 = CustomerId::from("C1");
        let p1 = ProductId::from("P1");
        // 2 * 1.0 + 4 * 0.5
        assert!((built.matrix.weight(&c1, &p1) - 4.0).abs() < 1e-9);
        let cell = built.matrix.row(&c1).unwrap()[&p1];
        assert_eq!(cell.purchases, 2);
        assert_eq!(cell.last_seen, ts(0));
    }

    #[test]
    fn insertion_order_does_not_change_weights() {
        let mut rows = vec![
            row("T1", "C1", "P1", 1, 3),
            row("T2", "C1", "P2", 2, 1),
            row("T3", "C2", "P1", 3, 0),
        ];
        let a = build(&rows, &catalog(&["P1", "P2"]), &config()).unwrap();
        rows.reverse();
        let b = build(&rows, &catalog(&["P1", "P2"]), &config()).unwrap();
        for customer in ["C1", "C2"] {
            let customer = CustomerId::from(customer);
            assert_eq!(a.matrix.history(&customer), b.matrix.history(&customer));
        }
    }

    #[test]
    fn history_lists_collapsed_cells() {
        let rows = vec![row("T1", "C1", "P2", 1, 0), row("T2", "C1", "P1", 3, 10)];
        let built = build(&rows, &catalog(&["P1", "P2"]), &config()).unwrap();
        let history = built.matrix.history(&CustomerId::from("C1"));
        let products: Vec<&str> = history.iter().map(|i| i.product.as_str()).collect();
        assert_eq!(products, ["P1", "P2"]);
        assert!((history[0].weight - 1.5).abs() < 1e-9);
        assert_eq!(history[0].last_seen, ts(10));
        assert!(built.matrix.history(&CustomerId::from("C9")).is_empty());
    }

    #[test]
    fn columns_mirror_rows() {
        let rows = vec![row("T1", "C1", "P1", 1, 0), row("T2", "C2", "P1", 1, 0)];
        let built = build(&rows, &catalog(&["P1"]), &config()).unwrap();
        assert_eq!(built.matrix.column(&ProductId::from("P1")).unwrap().len(), 2);
    }

    // ------------------------------------------------------------------
    // Skipped rows
    // ------------------------------------------------------------------

    #[test]
    fn malformed_rows_are_skipped_and_counted() {
        let rows = vec![
            row("T1", "", "P1", 1, 0),
            row("T2", "C 1", "P1", 1, 0),
            row("T3", "C1", "P1", 0, 0),
            row("T4", "C1", "NOPE", 1, 0),
            row("T5", "C1", "P1", 1, 0),
        ];
        let built = build(&rows, &catalog(&["P1"]), &config()).unwrap();
        let report = &built.report;
        assert_eq!(report.rows_total, 5);
        assert_eq!(report.rows_accepted, 1);
        assert_eq!(report.rows_skipped(), 4);
        assert_eq!(report.skipped["missing_field"], 1);
        assert_eq!(report.skipped["malformed_identifier"], 1);
        assert_eq!(report.skipped["zero_quantity"], 1);
        assert_eq!(report.skipped["unknown_product"], 1);
    }

    #[test]
    fn zero_valid_rows_is_a_rebuild_error() {
        let rows = vec![row("T1", "", "P1", 1, 0)];
        let result = build(&rows, &catalog(&["P1"]), &config());
        assert!(matches!(
            result,
            Err(RebuildError::NoValidTransactions { rows_total: 1, rows_skipped: 1 })
        ));
        assert!(build(&[], &catalog(&["P1"]), &config()).is_err());
    }

    // ------------------------------------------------------------------
    // Baskets + trending
    // ------------------------------------------------------------------

    #[test]
    fn baskets_group_rows_and_dedupe_items() {
        let rows = vec![
            row("T1", "C1", "P2", 1, 2),
            row("T1", "C1", "P1", 1, 2),
            row("T1", "C1", "P2", 1, 2),
            row("T2", "C1", "P3", 1, 1),
        ];
        let built = build(&rows, &catalog(&["P1", "P2", "P3"]), &config()).unwrap();
        assert_eq!(built.baskets.len(), 2);
        assert_eq!(built.baskets[0].items, vec![ProductId::from("P2"), ProductId::from("P1")]);

        let latest = latest_baskets(&built.baskets);
        assert_eq!(latest[&CustomerId::from("C1")].id, "T2");
    }

    #[test]
    fn trending_counts_only_the_window() {
        let rows = vec![row("T1", "C1", "P1", 3, 0), row("T2", "C2", "P2", 5, 45)];
        let built = build(&rows, &catalog(&["P1", "P2"]), &config()).unwrap();
        assert_eq!(built.recent_purchases.get(&ProductId::from("P1")), Some(&3));
        assert_eq!(built.recent_purchases.get(&ProductId::from("P2")), None);
    }

    #[test]
    fn huge_trending_window_counts_every_row() {
        let config = EngineConfig::builder()
            .trending_window_days(200_000_000)
            .build()
            .unwrap();
        let rows = vec![row("T1", "C1", "P1", 3, 0), row("T2", "C2", "P2", 5, 4_000)];
        let built = build(&rows, &catalog(&["P1", "P2"]), &config).unwrap();
        assert_eq!(built.recent_purchases.get(&ProductId::from("P1")), Some(&3));
        assert_eq!(built.recent_purchases.get(&ProductId::from("P2")), Some(&5));
    }

    #[test]
    fn basket_ids_are_scoped_per_customer() {
        let rows = vec![
            row("T1", "C1", "P1", 1, 5),
            row("T1", "C2", "P2", 1, 1),
            row("T1", "C1", "P3", 1, 5),
        ];
        let built = build(&rows, &catalog(&["P1", "P2", "P3"]), &config()).unwrap();
        assert_eq!(built.baskets.len(), 2);
        assert_eq!(built.baskets[0].items, vec![ProductId::from("P1"), ProductId::from("P3")]);

        let latest = latest_baskets(&built.baskets);
        assert_eq!(latest[&CustomerId::from("C1")].items.len(), 2);
        assert_eq!(latest[&CustomerId::from("C2")].items, vec![ProductId::from("P2")]);
    }

    #[test]
    fn latest_basket_ties_keep_first_seen() {
        let rows = vec![row("T7", "C1", "P1", 1, 2), row("T3", "C1", "P2", 1, 2)];
        let built = build(&rows, &catalog(&["P1", "P2"]), &config()).unwrap();
        assert_eq!(latest_baskets(&built.baskets)[&CustomerId::from("C1")].id, "T7");
    }

    #[test]
    fn top_products_break_ties_by_id() {
        let rows = vec![
            row("T1", "C1", "P2", 1, 0),
            row("T1", "C1", "P1", 1, 0),
            row("T2", "C1", "P3", 5, 0),
        ];
        let built = build(&rows, &catalog(&["P1", "P2", "P3"]), &config()).unwrap();
        let top = built.matrix.top_products(&CustomerId::from("C1"), 2);
        assert_eq!(top, vec![ProductId::from("P3"), ProductId::from("P1")]);
        assert_eq!(built.matrix.interaction_count(&CustomerId::from("C1")), 3);
    }

    #[test]
    fn owned_products_use_ratio_of_max_weight() {
        let rows = vec![
            row("T1", "C1", "P1", 4, 0),
            row("T1", "C1", "P2", 2, 0),
            row("T1", "C1", "P3", 1, 0),
        ];
        let built = build(&rows, &catalog(&["P1", "P2", "P3"]), &config()).unwrap();
        let owned = built.matrix.owned_products(&CustomerId::from("C1"), 0.5);
        assert!(owned.contains(&ProductId::from("P1")));
        assert!(owned.contains(&ProductId::from("P2")));
        assert!(!owned.contains(&ProductId::from("P3")));
        assert!(built.matrix.owned_products(&CustomerId::from("C9"), 0.5).is_empty());
    }
}
