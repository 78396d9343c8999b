use std::env;

use serde_json::json;
use uuid::Uuid;

use mewayz_api::db::Database;
use mewayz_api::pg_store::PgStore;
use mewayz_api::query::{FilterField, ListQuery, PageLimits};
use mewayz_api::store::{DocumentStore, Scope, StatsSpec, StoredDocument};

/// Integration smoke test for the PostgreSQL document store.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn pg_store_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url, 2).await?;
    let store = PgStore::new(db.pool.clone());
    store.ping().await?;

    // a fresh workspace keeps repeated runs independent
    let workspace = Uuid::new_v4();
    let scope = Scope::new("leads", workspace);

    let mut first = StoredDocument::new(
        "leads",
        workspace,
        json!({"name": "Ada", "status": "new", "score": 80, "value": 100}),
        true,
    );
    let second = StoredDocument::new(
        "leads",
        workspace,
        json!({"name": "Grace", "status": "new", "score": 40, "value": 50}),
        true,
    );
    let third = StoredDocument::new(
        "leads",
        workspace,
        json!({"name": "Linus", "status": "lost", "score": 10}),
        false,
    );
    for doc in [&first, &second, &third] {
        store.insert(doc).await?;
    }

    let limits = PageLimits {
        default_limit: 20,
        max_limit: 100,
    };
    let query = ListQuery::parse(
        &[
            ("score[gte]".to_string(), "20".to_string()),
            ("sort".to_string(), "-score".to_string()),
        ],
        &[FilterField::number("score")],
        limits,
    )?;
    let found = store.find(scope, &query).await?;
    assert_eq!(found.total, 2);
    assert_eq!(found.documents[0].id, first.id);

    let buckets = store
        .aggregate(
            scope,
            &[],
            &StatsSpec {
                group_by: "status",
                sum: &["value"],
                avg: &["score"],
            },
        )
        .await?;
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0].key, json!("new"));
    assert_eq!(buckets[0].count, 2);
    assert_eq!(buckets[0].totals, vec![("value", 150.0)]);

    first.data["status"] = json!("contacted");
    first.updated_at = chrono::Utc::now();
    assert!(store.replace(&first).await?);
    let reloaded = store.find_by_id(scope, first.id).await?.expect("reloaded");
    assert_eq!(reloaded.data["status"], "contacted");

    let other_scope = Scope::new("leads", Uuid::new_v4());
    assert!(store.find_by_id(other_scope, first.id).await?.is_none());

    for doc in [&first, &second, &third] {
        assert!(store.delete(scope, doc.id).await?);
    }
    assert!(!store.delete(scope, first.id).await?);

    Ok(())
}
