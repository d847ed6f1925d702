// Rust guideline compliant 2026-10-12

//! Dataset adapters for the recommender binaries.
//!
//! Each sub-module implements the `domain::DatasetSource` port. The SQLite
//! adapter is loaded with `#[path]` by the binary that needs it.

pub mod demo_dataset;
