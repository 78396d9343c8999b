use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::query::{Field, Filter, FilterValue, ListQuery};
use crate::store::{DocumentStore, FindResult, Scope, StatsBucket, StatsSpec, StoredDocument};

const COLUMNS: &str =
    "id, collection, workspace_id, data, is_active, created_at, updated_at";

/// PostgreSQL document store: one `documents` table with a JSONB body.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends `collection = $ AND workspace_id = $` and every filter.
fn push_scope_and_filters(qb: &mut QueryBuilder<'_, Postgres>, scope: Scope<'_>, filters: &[Filter]) {
    qb.push(" WHERE collection = ")
        .push_bind(scope.collection.to_string())
        .push(" AND workspace_id = ")
        .push_bind(scope.workspace_id);

    for filter in filters {
        qb.push(" AND ");
        push_filter(qb, filter);
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    let op = filter.op.sql();

    match (filter.field, &filter.value) {
        (Field::Data(name), FilterValue::Text(v)) => {
            qb.push("data->>")
                .push_bind(name)
                .push(format!(" {} ", op))
                .push_bind(v.clone());
        }
        (Field::Data(name), FilterValue::Number(v)) => {
            qb.push("(data->>")
                .push_bind(name)
                .push(format!(")::float8 {} ", op))
                .push_bind(*v);
        }
        (Field::Data(name), FilterValue::Bool(v)) => {
            qb.push("(data->>")
                .push_bind(name)
                .push(format!(")::boolean {} ", op))
                .push_bind(*v);
        }
        (Field::Data(name), FilterValue::Date(v)) => {
            qb.push("(data->>")
                .push_bind(name)
                .push(format!(")::timestamptz {} ", op))
                .push_bind(*v);
        }
        (Field::IsActive, value) => {
            let v = matches!(value, FilterValue::Bool(true));
            qb.push(format!("is_active {} ", op)).push_bind(v);
        }
        (Field::CreatedAt, FilterValue::Date(v)) => {
            qb.push(format!("created_at {} ", op)).push_bind(*v);
        }
        (Field::UpdatedAt, FilterValue::Date(v)) => {
            qb.push(format!("updated_at {} ", op)).push_bind(*v);
        }
        // timestamps only ever parse as dates
        (Field::CreatedAt, _) | (Field::UpdatedAt, _) => {
            qb.push("FALSE");
        }
    }
}

fn push_order(qb: &mut QueryBuilder<'_, Postgres>, query: &ListQuery) {
    qb.push(" ORDER BY ");
    for (i, key) in query.sort.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        let direction = if key.descending { "DESC" } else { "ASC" };
        match key.field {
            Field::Data(name) => {
                qb.push("data->")
                    .push_bind(name)
                    .push(format!(" {} NULLS LAST", direction));
            }
            Field::IsActive => {
                qb.push(format!("is_active {}", direction));
            }
            Field::CreatedAt => {
                qb.push(format!("created_at {}", direction));
            }
            Field::UpdatedAt => {
                qb.push(format!("updated_at {}", direction));
            }
        }
    }
    qb.push(", id");
}

#[async_trait]
impl DocumentStore for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("pinging database")?;
        Ok(())
    }

    async fn insert(&self, doc: &StoredDocument) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, collection, workspace_id, data, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(doc.id)
        .bind(&doc.collection)
        .bind(doc.workspace_id)
        .bind(&doc.data)
        .bind(doc.is_active)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("inserting into {}", doc.collection))?;

        Ok(())
    }

    async fn find(&self, scope: Scope<'_>, query: &ListQuery) -> Result<FindResult, AppError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents");
        push_scope_and_filters(&mut count, scope, &query.filters);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("counting {}", scope.collection))?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM documents", COLUMNS));
        push_scope_and_filters(&mut select, scope, &query.filters);
        push_order(&mut select, query);
        select
            .push(" LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(query.offset() as i64);

        let documents = select
            .build_query_as::<StoredDocument>()
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("listing {}", scope.collection))?;

        Ok(FindResult {
            documents,
            total: total.max(0) as u64,
        })
    }

    async fn find_by_id(
        &self,
        scope: Scope<'_>,
        id: Uuid,
    ) -> Result<Option<StoredDocument>, AppError> {
        let doc = sqlx::query_as::<_, StoredDocument>(&format!(
            "SELECT {} FROM documents WHERE id = $1 AND collection = $2 AND workspace_id = $3",
            COLUMNS
        ))
        .bind(id)
        .bind(scope.collection)
        .bind(scope.workspace_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(doc)
    }

    async fn replace(&self, doc: &StoredDocument) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET data = $4, is_active = $5, updated_at = $6
            WHERE id = $1 AND collection = $2 AND workspace_id = $3
            "#,
        )
        .bind(doc.id)
        .bind(&doc.collection)
        .bind(doc.workspace_id)
        .bind(&doc.data)
        .bind(doc.is_active)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("updating {} {}", doc.collection, doc.id))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, scope: Scope<'_>, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM documents WHERE id = $1 AND collection = $2 AND workspace_id = $3",
        )
        .bind(id)
        .bind(scope.collection)
        .bind(scope.workspace_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn aggregate(
        &self,
        scope: Scope<'_>,
        filters: &[Filter],
        spec: &StatsSpec,
    ) -> Result<Vec<StatsBucket>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT data->");
        qb.push_bind(spec.group_by).push(" AS key, COUNT(*) AS count");

        for field in spec.sum {
            qb.push(", COALESCE(SUM((data->>")
                .push_bind(*field)
                .push(")::float8), 0)");
        }
        for field in spec.avg {
            qb.push(", AVG((data->>").push_bind(*field).push(")::float8)");
        }

        qb.push(" FROM documents");
        push_scope_and_filters(&mut qb, scope, filters);
        // ordinal positions: bound parameters cannot be repeated as GROUP BY expressions
        qb.push(" GROUP BY 1 ORDER BY 2 DESC, 1");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("aggregating {}", scope.collection))?;

        let mut buckets = Vec::with_capacity(rows.len());
        for row in rows {
            let key: Option<Value> = row.try_get(0)?;
            let count: i64 = row.try_get(1)?;

            let mut totals = Vec::with_capacity(spec.sum.len());
            for (i, field) in spec.sum.iter().enumerate() {
                let total: f64 = row.try_get(2 + i)?;
                totals.push((*field, total));
            }

            let offset = 2 + spec.sum.len();
            let mut averages = Vec::with_capacity(spec.avg.len());
            for (i, field) in spec.avg.iter().enumerate() {
                let avg: Option<f64> = row.try_get(offset + i)?;
                averages.push((*field, avg));
            }

            buckets.push(StatsBucket {
                key: key.unwrap_or(Value::Null),
                count: count.max(0) as u64,
                totals,
                averages,
            });
        }

        Ok(buckets)
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<StoredDocument>, AppError> {
        let docs = sqlx::query_as::<_, StoredDocument>(&format!(
            "SELECT {} FROM documents WHERE collection = $1 AND data->>$2 = $3",
            COLUMNS
        ))
        .bind(collection)
        .bind(field)
        .bind(value)
        .fetch_all(&self.pool)
        .await?;

        Ok(docs)
    }
}
