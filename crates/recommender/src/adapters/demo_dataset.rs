// Rust guideline compliant 2026-10-12

//! Synthetic beauty-retail dataset for the `DatasetSource` port.
//!
//! Generates customers, a product catalog and purchase baskets in the shape
//! the ETL side delivers: `CUST001`.., `PROD001`.., `TXN000001`.. ids, five
//! categories, nine brands, 1-5 baskets per customer, 1-4 distinct products
//! per basket, quantity 1-2, timestamps within the year before the anchor.
//! Supports seeded randomness for reproducible runs.

use chrono::{DateTime, TimeDelta, Utc};
use domain::{
    Customer, CustomerId, DatasetSnapshot, DatasetSource, Product, ProductId, RawTransaction,
    SegmentTier, SourceError,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

const CATEGORIES: [&str; 5] = ["Skincare", "Makeup", "Haircare", "Fragrance", "Body Care"];
const TAGS: [&str; 5] = ["vegan", "cruelty-free", "bestseller", "organic", "limited-edition"];
const BRANDS: u32 = 9;

/// Segment tiers with their population share.
const SEGMENTS: [(SegmentTier, f64); 4] = [
    (SegmentTier::Bronze, 0.60),
    (SegmentTier::Silver, 0.25),
    (SegmentTier::Gold, 0.12),
    (SegmentTier::Platinum, 0.03),
];

/// Synthetic dataset adapter.
///
/// `seed = Some(s)` yields the same snapshot on every load; `None` draws a
/// fresh dataset each time, which makes periodic refreshes visible.
#[derive(Debug, Clone)]
pub struct DemoDataset {
    seed: Option<u64>,
    customers: usize,
    products: usize,
    anchor: DateTime<Utc>,
}

impl DemoDataset {
    /// 100 customers, 50 products, anchored at the current time.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed, customers: 100, products: 50, anchor: Utc::now() }
    }

    #[must_use]
    pub fn with_size(mut self, customers: usize, products: usize) -> Self {
        self.customers = customers;
        self.products = products;
        self
    }

    /// Latest possible purchase time.
    #[must_use]
    pub fn with_anchor(mut self, anchor: DateTime<Utc>) -> Self {
        self.anchor = anchor;
        self
    }

    /// Draw one snapshot.
    #[must_use]
    pub fn generate(&self) -> DatasetSnapshot {
        let mut rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };

        let products: Vec<Product> = (1..=self.products)
            .map(|i| {
                let category = CATEGORIES[rng.random_range(0..CATEGORIES.len())];
                let tags = TAGS
                    .iter()
                    .filter(|_| rng.random_bool(0.2))
                    .map(|t| (*t).to_owned())
                    .collect();
                Product {
                    id: ProductId::new(format!("PROD{i:03}")),
                    category: category.to_owned(),
                    brand: Some(format!("Brand{}", rng.random_range(1..=BRANDS))),
                    price: (rng.random_range(10.0..150.0_f64) * 100.0).round() / 100.0,
                    tags,
                }
            })
            .collect();

        let customers: Vec<Customer> = (1..=self.customers)
            .map(|i| {
                let (segment, rank) = pick_segment(rng.random());
                let value = rng.random_range(50.0..500.0) * f64::from(rank + 1);
                Customer {
                    id: CustomerId::new(format!("CUST{i:03}")),
                    segment,
                    lifetime_value: (value * 100.0).round() / 100.0,
                }
            })
            .collect();

        let mut transactions = vec![];
        let mut basket_no = 0_u32;
        if !products.is_empty() {
            for customer in &customers {
                for _ in 0..rng.random_range(1..=5) {
                    basket_no += 1;
                    let size = rng.random_range(1..=4_usize).min(products.len());
                    let at = self.anchor
                        - TimeDelta::days(rng.random_range(1..365))
                        - TimeDelta::seconds(rng.random_range(0..86_400));
                    for index in rand::seq::index::sample(&mut rng, products.len(), size) {
                        transactions.push(RawTransaction {
                            basket_id: format!("TXN{basket_no:06}"),
                            customer_id: customer.id.as_str().to_owned(),
                            product_id: products[index].id.as_str().to_owned(),
                            quantity: rng.random_range(1..=2),
                            timestamp: at,
                        });
                    }
                }
            }
        }
        tracing::debug!(
            "demo_dataset.generate: customers={} products={} rows={} baskets={basket_no}",
            customers.len(),
            products.len(),
            transactions.len()
        );
        DatasetSnapshot { customers, products, transactions }
    }
}

/// Segment for a uniform roll in `[0, 1)`, with its ordinal rank.
fn pick_segment(roll: f64) -> (SegmentTier, u32) {
    let mut cumulative = 0.0;
    for (rank, (segment, share)) in (0_u32..).zip(SEGMENTS) {
        cumulative += share;
        if roll < cumulative {
            return (segment, rank);
        }
    }
    (SegmentTier::Platinum, 3)
}

impl DatasetSource for DemoDataset {
    /// Generate a snapshot. Infallible.
    async fn load_snapshot(&self) -> Result<DatasetSnapshot, SourceError> {
        Ok(self.generate())
    }

    fn name(&self) -> &str {
        "demo"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;

    fn anchor() -> DateTime<Utc> {
        DateTime::from_timestamp(1_750_000_000, 0).unwrap()
    }

    // ------------------------------------------------------------------
    // Shape
    // ------------------------------------------------------------------

    #[test]
    fn default_size_matches_demo_catalog() {
        let snapshot = DemoDataset::new(Some(7)).generate();
        assert_eq!(snapshot.customers.len(), 100);
        assert_eq!(snapshot.products.len(), 50);
        assert_eq!(snapshot.products[0].id.as_str(), "PROD001");
        assert_eq!(snapshot.customers[99].id.as_str(), "CUST100");
    }

    #[test]
    fn rows_respect_generation_bounds() {
        let snapshot = DemoDataset::new(Some(11)).with_anchor(anchor()).generate();
        let catalog: BTreeSet<&str> = snapshot.products.iter().map(|p| p.id.as_str()).collect();
        let mut baskets: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut per_customer: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for row in &snapshot.transactions {
            assert!(catalog.contains(row.product_id.as_str()));
            assert!((1..=2).contains(&row.quantity));
            assert!(row.timestamp < anchor());
            assert!(row.timestamp > anchor() - TimeDelta::days(366));
            baskets.entry(&row.basket_id).or_default().push(&row.product_id);
            per_customer.entry(&row.customer_id).or_default().insert(&row.basket_id);
        }
        for items in baskets.values() {
            let distinct: BTreeSet<&&str> = items.iter().collect();
            assert!((1..=4).contains(&items.len()));
            assert_eq!(distinct.len(), items.len());
        }
        assert_eq!(per_customer.len(), 100);
        assert!(per_customer.values().all(|b| (1..=5).contains(&b.len())));
        for p in &snapshot.products {
            assert!((10.0..=150.0).contains(&p.price));
            assert!(CATEGORIES.contains(&p.category.as_str()));
        }
    }

    // ------------------------------------------------------------------
    // Determinism
    // ------------------------------------------------------------------

    #[test]
    fn same_seed_same_snapshot() {
        let a = DemoDataset::new(Some(42)).with_anchor(anchor()).generate();
        let b = DemoDataset::new(Some(42)).with_anchor(anchor()).generate();
        assert_eq!(a, b);
        let c = DemoDataset::new(Some(43)).with_anchor(anchor()).generate();
        assert_ne!(a.transactions, c.transactions);
    }

    #[test]
    fn segments_follow_cumulative_shares() {
        assert_eq!(pick_segment(0.0), (SegmentTier::Bronze, 0));
        assert_eq!(pick_segment(0.7), (SegmentTier::Silver, 1));
        assert_eq!(pick_segment(0.9), (SegmentTier::Gold, 2));
        assert_eq!(pick_segment(0.999), (SegmentTier::Platinum, 3));
    }

    #[test]
    fn empty_catalog_generates_no_rows() {
        let snapshot = DemoDataset::new(Some(1)).with_size(5, 0).generate();
        assert_eq!(snapshot.customers.len(), 5);
        assert!(snapshot.transactions.is_empty());
    }

    #[tokio::test]
    async fn load_snapshot_delegates_to_generate() {
        let source = DemoDataset::new(Some(3)).with_anchor(anchor()).with_size(10, 8);
        let loaded = source.load_snapshot().await.unwrap();
        assert_eq!(loaded, source.generate());
        assert_eq!(source.name(), "demo");
    }
}
