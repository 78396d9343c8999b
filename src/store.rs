//! Document store abstraction.
//!
//! Every resource is kept as a JSON document in a named collection, scoped to
//! a workspace. [`crate::pg_store::PgStore`] is the production backend and
//! [`crate::memory_store::MemoryStore`] backs tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;
use crate::query::{Filter, ListQuery};

/// A stored document row.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StoredDocument {
    pub id: Uuid,
    pub collection: String,
    pub workspace_id: Uuid,
    pub data: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredDocument {
    pub fn new(collection: &str, workspace_id: Uuid, data: Value, is_active: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            collection: collection.to_string(),
            workspace_id,
            data,
            is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Collection plus tenant: the unit every query is confined to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope<'a> {
    pub collection: &'a str,
    pub workspace_id: Uuid,
}

impl<'a> Scope<'a> {
    pub fn new(collection: &'a str, workspace_id: Uuid) -> Self {
        Self {
            collection,
            workspace_id,
        }
    }
}

/// One page of a listing plus the unpaged match count.
#[derive(Debug, Clone)]
pub struct FindResult {
    pub documents: Vec<StoredDocument>,
    pub total: u64,
}

/// Group-by aggregation declared by a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSpec {
    pub group_by: &'static str,
    pub sum: &'static [&'static str],
    pub avg: &'static [&'static str],
}

impl StatsSpec {
    pub const fn count_by(group_by: &'static str) -> Self {
        Self {
            group_by,
            sum: &[],
            avg: &[],
        }
    }
}

/// One aggregation group.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsBucket {
    /// Group key; `Null` when documents lack the field.
    pub key: Value,
    pub count: u64,
    pub totals: Vec<(&'static str, f64)>,
    pub averages: Vec<(&'static str, Option<f64>)>,
}

impl StatsBucket {
    /// `{"_id": key, "count": n, "totalValue": …, "avgScore": …}`
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("_id".into(), self.key.clone());
        out.insert("count".into(), Value::from(self.count));
        for (field, total) in &self.totals {
            out.insert(prefixed("total", field), Value::from(*total));
        }
        for (field, avg) in &self.averages {
            out.insert(
                prefixed("avg", field),
                avg.map(Value::from).unwrap_or(Value::Null),
            );
        }
        Value::Object(out)
    }
}

/// `prefixed("total", "value")` is `totalValue`.
fn prefixed(prefix: &str, field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => format!("{}{}{}", prefix, first.to_uppercase(), chars.as_str()),
        None => prefix.to_string(),
    }
}

/// Sorts buckets by count descending, then by key.
pub fn order_buckets(buckets: &mut [StatsBucket]) {
    buckets.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.key.to_string().cmp(&b.key.to_string()))
    });
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs and health output.
    fn name(&self) -> &'static str;

    async fn ping(&self) -> Result<(), AppError>;

    async fn insert(&self, doc: &StoredDocument) -> Result<(), AppError>;

    async fn find(&self, scope: Scope<'_>, query: &ListQuery) -> Result<FindResult, AppError>;

    async fn find_by_id(
        &self,
        scope: Scope<'_>,
        id: Uuid,
    ) -> Result<Option<StoredDocument>, AppError>;

    /// Overwrites body, `is_active` and `updated_at`. `false` when the id is gone.
    async fn replace(&self, doc: &StoredDocument) -> Result<bool, AppError>;

    /// `false` when nothing was deleted.
    async fn delete(&self, scope: Scope<'_>, id: Uuid) -> Result<bool, AppError>;

    async fn aggregate(
        &self,
        scope: Scope<'_>,
        filters: &[Filter],
        spec: &StatsSpec,
    ) -> Result<Vec<StatsBucket>, AppError>;

    /// Documents of `collection` in any workspace whose body field equals `value`.
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<StoredDocument>, AppError>;
}
