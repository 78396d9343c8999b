//! In-process document store.
//!
//! Evaluates the same filters, sorts and aggregations as the PostgreSQL store
//! over documents held in memory. Selected with `DATABASE_URL=memory://`.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::query::{Field, Filter, FilterValue, ListQuery, Op, SortKey};
use crate::store::{
    order_buckets, DocumentStore, FindResult, Scope, StatsBucket, StatsSpec, StoredDocument,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<Uuid, StoredDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn in_scope(doc: &StoredDocument, scope: Scope<'_>) -> bool {
    doc.collection == scope.collection && doc.workspace_id == scope.workspace_id
}

/// Value a field holds, as JSON, for comparisons.
fn field_value(doc: &StoredDocument, field: Field) -> Value {
    match field {
        Field::Data(name) => doc.data.get(name).cloned().unwrap_or(Value::Null),
        Field::IsActive => Value::Bool(doc.is_active),
        Field::CreatedAt => Value::String(doc.created_at.to_rfc3339()),
        Field::UpdatedAt => Value::String(doc.updated_at.to_rfc3339()),
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn as_date(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

/// Applies one filter. A missing field only satisfies `ne`, matching SQL
/// `IS DISTINCT FROM` semantics.
fn matches(doc: &StoredDocument, filter: &Filter) -> bool {
    let value = field_value(doc, filter.field);

    let ordering = match &filter.value {
        FilterValue::Text(expected) => as_text(&value).map(|actual| actual.cmp(expected)),
        FilterValue::Number(expected) => value.as_f64().and_then(|n| n.partial_cmp(expected)),
        FilterValue::Bool(expected) => value.as_bool().map(|b| b.cmp(expected)),
        FilterValue::Date(expected) => as_date(&value).map(|d| d.cmp(expected)),
    };

    match ordering {
        Some(ordering) => filter.op.accepts(ordering),
        None => filter.op == Op::Ne,
    }
}

/// JSON ordering used for sorts: nulls last, then numbers, strings, booleans.
fn compare_json(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (x, y) => x.to_string().cmp(&y.to_string()),
    }
}

fn compare_docs(a: &StoredDocument, b: &StoredDocument, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let (va, vb) = (field_value(a, key.field), field_value(b, key.field));
        let ordering = match (key.field, key.descending) {
            (Field::CreatedAt, _) | (Field::UpdatedAt, _) => {
                let ordering = match key.field {
                    Field::CreatedAt => a.created_at.cmp(&b.created_at),
                    _ => a.updated_at.cmp(&b.updated_at),
                };
                if key.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
            // nulls stay last in both directions
            (_, true) => match (&va, &vb) {
                (Value::Null, _) | (_, Value::Null) => compare_json(&va, &vb),
                _ => compare_json(&va, &vb).reverse(),
            },
            (_, false) => compare_json(&va, &vb),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.id.cmp(&b.id)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert(&self, doc: &StoredDocument) -> Result<(), AppError> {
        let mut documents = self.documents.write().await;
        if documents.contains_key(&doc.id) {
            return Err(AppError::Conflict(format!("Document {} already exists", doc.id)));
        }
        documents.insert(doc.id, doc.clone());
        Ok(())
    }

    async fn find(&self, scope: Scope<'_>, query: &ListQuery) -> Result<FindResult, AppError> {
        let documents = self.documents.read().await;
        let mut matched: Vec<&StoredDocument> = documents
            .values()
            .filter(|d| in_scope(d, scope))
            .filter(|d| query.filters.iter().all(|f| matches(d, f)))
            .collect();

        matched.sort_by(|a, b| compare_docs(a, b, &query.sort));

        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();

        Ok(FindResult {
            documents: page,
            total,
        })
    }

    async fn find_by_id(
        &self,
        scope: Scope<'_>,
        id: Uuid,
    ) -> Result<Option<StoredDocument>, AppError> {
        let documents = self.documents.read().await;
        Ok(documents.get(&id).filter(|d| in_scope(d, scope)).cloned())
    }

    async fn replace(&self, doc: &StoredDocument) -> Result<bool, AppError> {
        let mut documents = self.documents.write().await;
        let scope = Scope::new(&doc.collection, doc.workspace_id);
        match documents.get_mut(&doc.id) {
            Some(existing) if in_scope(existing, scope) => {
                existing.data = doc.data.clone();
                existing.is_active = doc.is_active;
                existing.updated_at = doc.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, scope: Scope<'_>, id: Uuid) -> Result<bool, AppError> {
        let mut documents = self.documents.write().await;
        if documents.get(&id).is_some_and(|d| in_scope(d, scope)) {
            documents.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn aggregate(
        &self,
        scope: Scope<'_>,
        filters: &[Filter],
        spec: &StatsSpec,
    ) -> Result<Vec<StatsBucket>, AppError> {
        struct Acc {
            key: Value,
            count: u64,
            sums: Vec<f64>,
            avg_sums: Vec<f64>,
            avg_counts: Vec<u64>,
        }

        let documents = self.documents.read().await;
        let mut groups: HashMap<String, Acc> = HashMap::new();

        for doc in documents
            .values()
            .filter(|d| in_scope(d, scope))
            .filter(|d| filters.iter().all(|f| matches(d, f)))
        {
            let key = doc.data.get(spec.group_by).cloned().unwrap_or(Value::Null);
            let acc = groups.entry(key.to_string()).or_insert_with(|| Acc {
                key,
                count: 0,
                sums: vec![0.0; spec.sum.len()],
                avg_sums: vec![0.0; spec.avg.len()],
                avg_counts: vec![0; spec.avg.len()],
            });

            acc.count += 1;
            for (i, field) in spec.sum.iter().enumerate() {
                acc.sums[i] += doc.data.get(*field).and_then(Value::as_f64).unwrap_or(0.0);
            }
            for (i, field) in spec.avg.iter().enumerate() {
                if let Some(n) = doc.data.get(*field).and_then(Value::as_f64) {
                    acc.avg_sums[i] += n;
                    acc.avg_counts[i] += 1;
                }
            }
        }

        let mut buckets: Vec<StatsBucket> = groups
            .into_values()
            .map(|acc| StatsBucket {
                key: acc.key,
                count: acc.count,
                totals: spec.sum.iter().copied().zip(acc.sums).collect(),
                averages: spec
                    .avg
                    .iter()
                    .enumerate()
                    .map(|(i, field)| {
                        let avg = (acc.avg_counts[i] > 0)
                            .then(|| acc.avg_sums[i] / acc.avg_counts[i] as f64);
                        (*field, avg)
                    })
                    .collect(),
            })
            .collect();

        order_buckets(&mut buckets);
        Ok(buckets)
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<StoredDocument>, AppError> {
        let documents = self.documents.read().await;
        Ok(documents
            .values()
            .filter(|d| d.collection == collection)
            .filter(|d| d.data.get(field).and_then(Value::as_str) == Some(value))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FilterField, PageLimits};
    use serde_json::json;

    const LIMITS: PageLimits = PageLimits {
        default_limit: 20,
        max_limit: 100,
    };

    const FIELDS: &[FilterField] = &[
        FilterField::text("status"),
        FilterField::number("score"),
    ];

    async fn seeded(workspace: Uuid) -> MemoryStore {
        let store = MemoryStore::new();
        for (status, score) in [("new", 10), ("new", 30), ("lost", 50)] {
            let doc = StoredDocument::new(
                "leads",
                workspace,
                json!({"status": status, "score": score}),
                true,
            );
            store.insert(&doc).await.unwrap();
        }
        // a lead with no score, and one in another workspace
        store
            .insert(&StoredDocument::new("leads", workspace, json!({"status": "new"}), false))
            .await
            .unwrap();
        store
            .insert(&StoredDocument::new(
                "leads",
                Uuid::new_v4(),
                json!({"status": "new", "score": 99}),
                true,
            ))
            .await
            .unwrap();
        store
    }

    fn query(q: &str) -> ListQuery {
        ListQuery::parse(&crate::query::decode_pairs(Some(q)), FIELDS, LIMITS).unwrap()
    }

    #[tokio::test]
    async fn test_find_is_workspace_scoped_and_filtered() {
        let workspace = Uuid::new_v4();
        let store = seeded(workspace).await;
        let scope = Scope::new("leads", workspace);

        assert_eq!(store.find(scope, &query("")).await.unwrap().total, 4);
        assert_eq!(store.find(scope, &query("status=new")).await.unwrap().total, 3);
        assert_eq!(store.find(scope, &query("score[gte]=30")).await.unwrap().total, 2);
        assert_eq!(store.find(scope, &query("isActive=false")).await.unwrap().total, 1);
        // missing field only matches ne
        assert_eq!(store.find(scope, &query("score[ne]=10")).await.unwrap().total, 3);
    }

    #[tokio::test]
    async fn test_sort_and_pages() {
        let workspace = Uuid::new_v4();
        let store = seeded(workspace).await;
        let scope = Scope::new("leads", workspace);

        let result = store.find(scope, &query("sort=-score&limit=2")).await.unwrap();
        let scores: Vec<_> = result.documents.iter().map(|d| d.data["score"].clone()).collect();
        assert_eq!(scores, vec![json!(50), json!(30)]);
        assert_eq!(result.total, 4);

        let last = store
            .find(scope, &query("sort=-score&limit=2&page=2"))
            .await
            .unwrap();
        let scores: Vec<_> = last.documents.iter().map(|d| d.data.get("score").cloned()).collect();
        assert_eq!(scores, vec![Some(json!(10)), None]);
    }

    #[tokio::test]
    async fn test_aggregate_groups_and_averages() {
        let workspace = Uuid::new_v4();
        let store = seeded(workspace).await;
        let spec = StatsSpec {
            group_by: "status",
            sum: &["score"],
            avg: &["score"],
        };

        let buckets = store
            .aggregate(Scope::new("leads", workspace), &[], &spec)
            .await
            .unwrap();

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].key, json!("new"));
        assert_eq!(buckets[0].count, 3);
        assert_eq!(buckets[0].totals, vec![("score", 40.0)]);
        assert_eq!(buckets[0].averages, vec![("score", Some(20.0))]);
        assert_eq!(buckets[1].key, json!("lost"));
    }

    #[tokio::test]
    async fn test_replace_and_delete_respect_scope() {
        let workspace = Uuid::new_v4();
        let store = MemoryStore::new();
        let mut doc = StoredDocument::new("leads", workspace, json!({"status": "new"}), true);
        store.insert(&doc).await.unwrap();

        let foreign = Scope::new("leads", Uuid::new_v4());
        assert!(store.find_by_id(foreign, doc.id).await.unwrap().is_none());
        assert!(!store.delete(foreign, doc.id).await.unwrap());

        doc.data = json!({"status": "lost"});
        assert!(store.replace(&doc).await.unwrap());
        let stored = store
            .find_by_id(Scope::new("leads", workspace), doc.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.data["status"], "lost");

        assert!(store.delete(Scope::new("leads", workspace), doc.id).await.unwrap());
        assert!(!store.replace(&doc).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_by_field_crosses_workspaces() {
        let store = MemoryStore::new();
        for _ in 0..2 {
            store
                .insert(&StoredDocument::new(
                    "white_label_configs",
                    Uuid::new_v4(),
                    json!({"domain": "shop.example.com"}),
                    true,
                ))
                .await
                .unwrap();
        }

        let found = store
            .find_by_field("white_label_configs", "domain", "shop.example.com")
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
    }
}
