//! Document-store collaborator contract.
//!
//! The workflow is stateless per call; everything durable lives behind this
//! trait. Two backends:
//! - `RedisStore`: production, one redis hash per document plus a
//!   per-collection id index set.
//! - `MemoryStore`: in-process maps, used by the test suite and for local
//!   runs without a redis instance.

use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod memory;
pub mod redis;

/// Field name to JSON value, one document's worth.
pub type Fields = Map<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("document {collection}/{id} does not exist")]
    Missing { collection: String, id: String },

    #[error("field {0} does not support this update")]
    BadUpdate(String),

    #[error("backend error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A partial field update. `Increment` is atomic at the backend and treats a
/// missing field as 0.
#[derive(Debug, Clone)]
pub enum FieldUpdate {
    Set(Value),
    Increment(i64),
}

/// Sort direction for `query`'s optional ordering.
#[derive(Debug, Clone, Copy)]
pub enum Order {
    Ascending,
    Descending,
}

pub(crate) fn sort_documents(documents: &mut [Fields], field: &str, order: Order) {
    documents.sort_by(|a, b| {
        let ordering = compare_values(a.get(field), b.get(field));
        match order {
            Order::Ascending => ordering,
            Order::Descending => ordering.reverse(),
        }
    });
}

/// Numbers compare numerically; strings compare lexically, which orders
/// uniform-precision RFC 3339 timestamps chronologically. Missing fields
/// sort first.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            a.as_f64().unwrap_or(0.0).total_cmp(&b.as_f64().unwrap_or(0.0))
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Write a new document under the given id.
    async fn create(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// Fetch one document, `None` if absent.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Fields>, StoreError>;

    /// Equality-filtered scan, optionally sorted by one field, bounded by
    /// `limit` after sorting. Unordered scans run in id order. An empty
    /// result is not an error.
    async fn query(
        &self,
        collection: &str,
        filters: &[(&str, Value)],
        order_by: Option<(&str, Order)>,
        limit: Option<usize>,
    ) -> Result<Vec<Fields>, StoreError>;

    /// Partial update of an existing document. Fails with
    /// [`StoreError::Missing`] if the document was never created.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        updates: &[(&str, FieldUpdate)],
    ) -> Result<(), StoreError>;

    /// Atomic add-if-absent on a string-array field. Returns whether the
    /// member was added; `false` means it was already present.
    async fn add_to_set(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        member: &str,
    ) -> Result<bool, StoreError>;
}
