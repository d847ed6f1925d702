// Rust guideline compliant 2026-10-12

//! JSON rendering of query results for the demo binaries.

use anyhow::Context as _;
use domain::{CustomerId, Recommendation};
use engine::{RecommendError, Recommender};
use serde_json::{Value, json};

/// Customer used for the sample customer query.
const SAMPLE_CUSTOMER: &str = "CUST001";
/// Basket used for the sample basket query.
const SAMPLE_BASKET: [&str; 2] = ["PROD001", "PROD002"];
/// Seed product for the sample similar-products query.
const SAMPLE_PRODUCT: &str = "PROD001";

/// One recommendation plus the human-readable reason of each contributing strategy.
fn explain(rec: &Recommendation) -> anyhow::Result<Value> {
    let mut value = serde_json::to_value(rec).context("failed to serialize recommendation")?;
    let reasons: Vec<&str> = rec.contributing_strategies.iter().map(|s| s.reason()).collect();
    if let Some(object) = value.as_object_mut() {
        object.insert("reasons".to_owned(), json!(reasons));
    }
    Ok(value)
}

fn render(
    query: &str,
    subject: Value,
    result: Result<Vec<Recommendation>, RecommendError>,
) -> anyhow::Result<Value> {
    match result {
        Ok(recs) => {
            let explained = recs.iter().map(explain).collect::<anyhow::Result<Vec<_>>>()?;
            Ok(json!({ "query": query, "subject": subject, "recommendations": explained }))
        }
        Err(e) => Ok(json!({ "query": query, "subject": subject, "error": e.to_string() })),
    }
}

/// Collapsed interactions the customer query is based on.
fn history(engine: &Recommender, customer: &str) -> anyhow::Result<Value> {
    let model = match engine.model() {
        Ok(model) => model,
        Err(e) => return Ok(json!({ "error": e.to_string() })),
    };
    let interactions = model.matrix().history(&CustomerId::from(customer));
    serde_json::to_value(interactions).context("failed to serialize interactions")
}

/// Run one query of each kind against `engine` and print the results as JSON.
///
/// Query errors (unknown ids in a sparse demo catalog) are printed, not returned.
///
/// # Errors
///
/// Returns an error only if serialization fails.
pub fn print_sample_queries(engine: &Recommender, k: usize) -> anyhow::Result<()> {
    let customer = engine.recommend_for_customer(SAMPLE_CUSTOMER, k);
    let queries = vec![
        render("customer", json!(SAMPLE_CUSTOMER), customer)?,
        render("basket", json!(SAMPLE_BASKET), engine.recommend_for_basket(&SAMPLE_BASKET, k))?,
        render("similar", json!(SAMPLE_PRODUCT), engine.similar_products(SAMPLE_PRODUCT, k))?,
        render("trending", Value::Null, engine.trending(k))?,
    ];
    let interactions = history(engine, SAMPLE_CUSTOMER)?;
    let report = json!({
        "snapshot": engine.snapshot_info(),
        "history": { "customer": SAMPLE_CUSTOMER, "interactions": interactions },
        "queries": queries,
    });
    println!("{}", serde_json::to_string_pretty(&report).context("failed to render report")?);
    Ok(())
}
