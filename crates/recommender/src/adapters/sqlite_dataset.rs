// Rust guideline compliant 2026-10-12

//! SQLite adapter for the `DatasetSource` port.
//!
//! Reads the `customers`, `products` and `transactions` tables of an
//! ETL-produced SQLite file via `sqlx`. Timestamps are stored as unix
//! seconds; product tags as one comma-separated string.
//!
//! Rows that cannot be mapped into the domain (unknown segment name,
//! out-of-range timestamp) are skipped with a warning. Row-level validation
//! of identifiers and quantities is left to the engine, which counts those
//! rejections in its build report.

use chrono::DateTime;
use domain::{
    Customer, CustomerId, DatasetSnapshot, DatasetSource, Product, ProductId, RawTransaction,
    SegmentTier, SourceError,
};

/// `DatasetSource` adapter backed by a SQLite database via `sqlx`.
#[derive(Debug, Clone)]
pub struct SqliteDataset {
    pool: sqlx::SqlitePool,
}

impl SqliteDataset {
    /// Open or create a SQLite database and ensure the three tables exist.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` when the connection or schema creation fails.
    pub async fn new(db_url: &str) -> Result<Self, sqlx::Error> {
        let opts = db_url
            .parse::<sqlx::sqlite::SqliteConnectOptions>()?
            .create_if_missing(true);
        let pool = sqlx::SqlitePool::connect_with(opts).await?;
        for ddl in [
            "CREATE TABLE IF NOT EXISTS customers (
                customer_id    TEXT PRIMARY KEY,
                segment        TEXT NOT NULL,
                lifetime_value REAL NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS products (
                product_id TEXT PRIMARY KEY,
                category   TEXT NOT NULL,
                brand      TEXT,
                price      REAL NOT NULL,
                tags       TEXT NOT NULL DEFAULT ''
            )",
            "CREATE TABLE IF NOT EXISTS transactions (
                basket_id    TEXT    NOT NULL,
                customer_id  TEXT    NOT NULL,
                product_id   TEXT    NOT NULL,
                quantity     INTEGER NOT NULL,
                purchased_at INTEGER NOT NULL   -- unix seconds, UTC
            )",
        ] {
            sqlx::query(ddl).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    /// Number of rows in `products`.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` on query failure.
    pub async fn product_count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM products").fetch_one(&self.pool).await
    }

    /// Write a whole snapshot in one transaction. Existing ids are replaced.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` on any failed statement; nothing is committed then.
    pub async fn insert_snapshot(&self, snapshot: &DatasetSnapshot) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for c in &snapshot.customers {
            sqlx::query(
                "INSERT OR REPLACE INTO customers (customer_id, segment, lifetime_value)
                 VALUES (?, ?, ?)",
            )
            .bind(c.id.as_str())
            .bind(segment_name(c.segment))
            .bind(c.lifetime_value)
            .execute(&mut *tx)
            .await?;
        }
        for p in &snapshot.products {
            sqlx::query(
                "INSERT OR REPLACE INTO products (product_id, category, brand, price, tags)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(p.id.as_str())
            .bind(&p.category)
            .bind(p.brand.as_deref())
            .bind(p.price)
            .bind(p.tags.join(","))
            .execute(&mut *tx)
            .await?;
        }
        for t in &snapshot.transactions {
            sqlx::query(
                "INSERT INTO transactions
                     (basket_id, customer_id, product_id, quantity, purchased_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&t.basket_id)
            .bind(&t.customer_id)
            .bind(&t.product_id)
            .bind(i64::from(t.quantity))
            .bind(t.timestamp.timestamp())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        tracing::info!(
            "sqlite_dataset.insert: customers={} products={} rows={}",
            snapshot.customers.len(),
            snapshot.products.len(),
            snapshot.transactions.len()
        );
        Ok(())
    }

    async fn customers(&self) -> Result<Vec<Customer>, sqlx::Error> {
        let rows: Vec<(String, String, f64)> = sqlx::query_as(
            "SELECT customer_id, segment, lifetime_value FROM customers ORDER BY customer_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(id, segment, lifetime_value)| {
                let Some(segment) = parse_segment(&segment) else {
                    tracing::warn!(
                        "sqlite_dataset.customer.skipped: customer={id} segment={segment:?}"
                    );
                    return None;
                };
                Some(Customer { id: CustomerId::new(id), segment, lifetime_value })
            })
            .collect())
    }

    async fn products(&self) -> Result<Vec<Product>, sqlx::Error> {
        let rows: Vec<(String, String, Option<String>, f64, String)> = sqlx::query_as(
            "SELECT product_id, category, brand, price, tags FROM products ORDER BY product_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, category, brand, price, tags)| Product {
                id: ProductId::new(id),
                category,
                brand,
                price,
                tags: tags
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_owned)
                    .collect(),
            })
            .collect())
    }

    async fn transactions(&self) -> Result<Vec<RawTransaction>, sqlx::Error> {
        let rows: Vec<(String, String, String, i64, i64)> = sqlx::query_as(
            "SELECT basket_id, customer_id, product_id, quantity, purchased_at
             FROM transactions ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(basket_id, customer_id, product_id, quantity, purchased_at)| {
                let Some(timestamp) = DateTime::from_timestamp(purchased_at, 0) else {
                    tracing::warn!(
                        "sqlite_dataset.transaction.skipped: basket={basket_id} \
                         purchased_at={purchased_at}"
                    );
                    return None;
                };
                Some(RawTransaction {
                    basket_id,
                    customer_id,
                    product_id,
                    // Negative or oversized quantities become 0 and are rejected downstream.
                    quantity: u32::try_from(quantity).unwrap_or(0),
                    timestamp,
                })
            })
            .collect())
    }
}

impl DatasetSource for SqliteDataset {
    /// Read all three tables into one snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Unavailable` on any `sqlx` error. The underlying
    /// error is logged at `error` level before mapping.
    async fn load_snapshot(&self) -> Result<DatasetSnapshot, SourceError> {
        let read = async {
            Ok::<_, sqlx::Error>(DatasetSnapshot {
                customers: self.customers().await?,
                products: self.products().await?,
                transactions: self.transactions().await?,
            })
        };
        read.await.map_err(|e| {
            tracing::error!("sqlite_dataset.load: {e}");
            SourceError::Unavailable { reason: e.to_string() }
        })
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

fn segment_name(segment: SegmentTier) -> &'static str {
    match segment {
        SegmentTier::Bronze => "bronze",
        SegmentTier::Silver => "silver",
        SegmentTier::Gold => "gold",
        SegmentTier::Platinum => "platinum",
    }
}

fn parse_segment(raw: &str) -> Option<SegmentTier> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "bronze" => Some(SegmentTier::Bronze),
        "silver" => Some(SegmentTier::Silver),
        "gold" => Some(SegmentTier::Gold),
        "platinum" => Some(SegmentTier::Platinum),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::SqliteDataset;
    use chrono::DateTime;
    use domain::{
        Customer, DatasetSnapshot, DatasetSource as _, Product, RawTransaction, SegmentTier,
    };

    // Every call opens a fresh pool over a new in-memory database, so tests
    // are isolated and leave nothing on disk.
    async fn make_dataset() -> SqliteDataset {
        SqliteDataset::new("sqlite::memory:")
            .await
            .expect("in-memory SQLite should open")
    }

    fn snapshot() -> DatasetSnapshot {
        DatasetSnapshot {
            customers: vec![Customer {
                id: "CUST001".into(),
                segment: SegmentTier::Gold,
                lifetime_value: 812.5,
            }],
            products: vec![
                Product {
                    id: "PROD001".into(),
                    category: "Skincare".to_owned(),
                    brand: Some("Brand3".to_owned()),
                    price: 24.99,
                    tags: vec!["vegan".to_owned(), "organic".to_owned()],
                },
                Product {
                    id: "PROD002".into(),
                    category: "Makeup".to_owned(),
                    brand: None,
                    price: 12.0,
                    tags: vec![],
                },
            ],
            transactions: vec![
                RawTransaction {
                    basket_id: "TXN000001".to_owned(),
                    customer_id: "CUST001".to_owned(),
                    product_id: "PROD001".to_owned(),
                    quantity: 2,
                    timestamp: DateTime::from_timestamp(1_750_000_000, 0).unwrap(),
                },
                RawTransaction {
                    basket_id: "TXN000001".to_owned(),
                    customer_id: "CUST001".to_owned(),
                    product_id: "PROD002".to_owned(),
                    quantity: 1,
                    timestamp: DateTime::from_timestamp(1_750_000_000, 0).unwrap(),
                },
            ],
        }
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_tables() {
        let dataset = make_dataset().await;
        dataset.insert_snapshot(&snapshot()).await.unwrap();
        let loaded = dataset.load_snapshot().await.unwrap();
        assert_eq!(loaded, snapshot());
        assert_eq!(dataset.product_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn empty_database_loads_empty_snapshot() {
        let dataset = make_dataset().await;
        let loaded = dataset.load_snapshot().await.unwrap();
        assert_eq!(loaded, DatasetSnapshot::default());
        assert_eq!(dataset.name(), "sqlite");
    }

    #[tokio::test]
    async fn unknown_segment_is_skipped() {
        let dataset = make_dataset().await;
        sqlx::query(
            "INSERT INTO customers VALUES ('CUST009', 'diamond', 10.0), ('CUST010', 'Silver', 5.0)",
        )
        .execute(&dataset.pool)
        .await
        .unwrap();
        let loaded = dataset.load_snapshot().await.unwrap();
        assert_eq!(loaded.customers.len(), 1);
        assert_eq!(loaded.customers[0].segment, SegmentTier::Silver);
    }

    #[tokio::test]
    async fn negative_quantity_maps_to_zero() {
        let dataset = make_dataset().await;
        sqlx::query("INSERT INTO transactions VALUES ('T1', 'CUST001', 'PROD001', -3, 1750000000)")
            .execute(&dataset.pool)
            .await
            .unwrap();
        let loaded = dataset.load_snapshot().await.unwrap();
        assert_eq!(loaded.transactions[0].quantity, 0);
    }

    #[tokio::test]
    async fn missing_table_is_unavailable() {
        let dataset = make_dataset().await;
        sqlx::query("DROP TABLE products").execute(&dataset.pool).await.unwrap();
        assert!(matches!(
            dataset.load_snapshot().await,
            Err(domain::SourceError::Unavailable { .. })
        ));
    }
}
