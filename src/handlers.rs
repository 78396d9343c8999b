use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, RawQuery, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use moka::future::Cache;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{AuthUser, JwtKeys};
use crate::config::Config;
use crate::crypto::FieldCipher;
use crate::errors::AppError;
use crate::integration_probe::IntegrationProbe;
use crate::models::WhiteLabelConfig;
use crate::query::{decode_pairs, Filter, ListQuery, PageLimits};
use crate::resource::{build, merge_patch, split_body, to_data, Resource, WriteContext};
use crate::response;
use crate::store::{order_buckets, DocumentStore, Scope, StoredDocument};

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Config,
    pub jwt: JwtKeys,
    /// Encrypts sensitive document fields at rest.
    pub cipher: FieldCipher,
    /// Lower-cased domain -> active white-label config (`None` caches a miss).
    pub white_label_cache: Cache<String, Option<StoredDocument>>,
    /// Bumped on every white-label write; guards cache fills against races.
    white_label_generation: Arc<AtomicU64>,
    pub probe: IntegrationProbe,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn DocumentStore>) -> Result<Self, AppError> {
        let cipher = FieldCipher::from_base64_key(&config.field_encryption_key)?;
        let probe = IntegrationProbe::new(config.integration_timeout)?;
        let white_label_cache = Cache::builder()
            .time_to_live(config.white_label_cache_ttl)
            .max_capacity(10_000)
            .build();

        Ok(Self {
            store,
            jwt: JwtKeys::new(&config.jwt_secret),
            cipher,
            white_label_cache,
            white_label_generation: Arc::new(AtomicU64::new(0)),
            probe,
            config,
        })
    }

    pub fn write_context(&self) -> WriteContext<'_> {
        WriteContext {
            cipher: &self.cipher,
            phone_region: self.config.default_phone_region,
        }
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_limit: self.config.default_page_limit,
            max_limit: self.config.max_page_limit,
        }
    }

    /// Drops cached state derived from `collection`.
    pub fn after_write(&self, collection: &str) {
        if collection == WhiteLabelConfig::COLLECTION {
            self.white_label_generation.fetch_add(1, Ordering::SeqCst);
            self.white_label_cache.invalidate_all();
            tracing::debug!("White-label cache invalidated");
        }
    }
}

impl AppState {
    /// Current white-label write generation. Read it before querying the store.
    pub fn white_label_generation(&self) -> u64 {
        self.white_label_generation.load(Ordering::SeqCst)
    }

    /// Caches a white-label lookup made at generation `seen`.
    ///
    /// A write that lands between the lookup and the insert either clears
    /// the entry through `invalidate_all` or moves the generation, in which
    /// case the entry is dropped again here.
    ///
    /// # Arguments
    /// * `domain` - Canonical domain the lookup was made for
    /// * `found` - Lookup result, `None` for a miss
    /// * `seen` - Generation read before the lookup started
    ///
    /// # Returns
    /// * `bool` - Whether the entry stayed in the cache
    pub async fn cache_white_label(
        &self,
        domain: String,
        found: Option<StoredDocument>,
        seen: u64,
    ) -> bool {
        if self.white_label_generation() != seen {
            return false;
        }
        self.white_label_cache.insert(domain.clone(), found).await;
        if self.white_label_generation() != seen {
            self.white_label_cache.invalidate(&domain).await;
            tracing::debug!("Discarded stale white-label fill for {}", domain);
            return false;
        }
        true
    }
}

/// Health check endpoint.
///
/// Reports 200 while the document store answers, 503 otherwise.
///
/// # Arguments
///
/// * `state` - The application state.
///
/// # Returns
///
/// * `(StatusCode, Json<Value>)` - Service status plus the store backend and its reachability.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let (status, store_status) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "up"),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "down")
        }
    };

    (
        status,
        Json(json!({
            "status": if status.is_success() { "healthy" } else { "unhealthy" },
            "service": "mewayz-api",
            "version": env!("CARGO_PKG_VERSION"),
            "store": { "backend": state.store.name(), "status": store_status },
        })),
    )
}

/// Parses a path id; malformed ids are a client error.
pub fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid id: {}", raw)))
}

/// Rejects a body whose unique fields collide with another document of the collection.
///
/// Uniqueness is global, so the lookup crosses workspaces.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `data` - Normalized body about to be written.
/// * `except` - Id of the document being updated, which may keep its own values.
///
/// # Returns
///
/// * `Result<(), AppError>` - Conflict naming the first colliding field.
pub async fn ensure_unique<R: Resource>(
    state: &AppState,
    data: &Value,
    except: Option<Uuid>,
) -> Result<(), AppError> {
    for field in R::UNIQUE {
        let Some(Value::String(value)) = data.get(*field) else {
            continue;
        };

        let existing = state
            .store
            .find_by_field(R::COLLECTION, field, value)
            .await?;
        if existing.iter().any(|doc| Some(doc.id) != except) {
            return Err(AppError::Conflict(format!(
                "Duplicate field value: {} '{}' is already in use",
                field, value
            )));
        }
    }
    Ok(())
}

/// Loads a document of `R` in the caller's workspace or fails with 404.
///
/// Does not check roles; callers decide who may see the document.
pub async fn load<R: Resource>(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> Result<StoredDocument, AppError> {
    state
        .store
        .find_by_id(Scope::new(R::COLLECTION, user.workspace_id), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No {} found with that ID", R::SINGULAR)))
}

/// Deserializes a stored body back into `R`.
pub fn decode<R: Resource>(doc: &StoredDocument) -> Result<R, AppError> {
    serde_json::from_value(doc.data.clone()).map_err(|e| {
        AppError::InternalError(format!("Stored {} {} is malformed: {}", R::SINGULAR, doc.id, e))
    })
}

/// POST /api/v1/<resource>
///
/// Builds `R` from the body, writes it into the caller's workspace and returns
/// it under the resource's singular key.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - Authenticated caller; needs one of `R::WRITE_ROLES`.
/// * `body` - JSON object of resource fields, optionally with `isActive`.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<Value>), AppError>` - 201 with the stored document, or 400/403/409.
pub async fn create<R: Resource>(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    user.require_any(R::WRITE_ROLES)?;
    let Json(body) = body?;

    let (fields, is_active) = split_body(body)?;
    let resource: R = build(fields, &state.write_context())?;
    let data = to_data(&resource)?;
    ensure_unique::<R>(&state, &data, None).await?;

    let doc = StoredDocument::new(
        R::COLLECTION,
        user.workspace_id,
        data,
        is_active.unwrap_or(true),
    );
    state.store.insert(&doc).await?;
    state.after_write(R::COLLECTION);

    tracing::info!(
        collection = R::COLLECTION,
        id = %doc.id,
        user = %user.user_id,
        "Document created"
    );

    Ok((StatusCode::CREATED, Json(response::one::<R>(&doc)?)))
}

/// GET /api/v1/<resource>
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - Authenticated caller; needs one of `R::READ_ROLES`.
/// * `raw` - Query string with filters, `sort`, `page` and `limit`.
///
/// # Returns
///
/// * `Result<Json<Value>, AppError>` - One page of the workspace's documents with the total count.
pub async fn list<R: Resource>(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    RawQuery(raw): RawQuery,
) -> Result<Json<Value>, AppError> {
    user.require_any(R::READ_ROLES)?;

    let query = ListQuery::parse(&decode_pairs(raw.as_deref()), R::FILTERS, state.page_limits())?;
    let found = state
        .store
        .find(Scope::new(R::COLLECTION, user.workspace_id), &query)
        .await?;

    tracing::debug!(
        collection = R::COLLECTION,
        results = found.documents.len(),
        total = found.total,
        "Listed documents"
    );

    Ok(Json(response::page::<R>(&found, &query)?))
}

/// GET /api/v1/<resource>/:id
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - Authenticated caller; needs one of `R::READ_ROLES`.
/// * `id` - Document id from the path.
///
/// # Returns
///
/// * `Result<Json<Value>, AppError>` - The document, 400 for a malformed id or 404.
pub async fn get_one<R: Resource>(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    user.require_any(R::READ_ROLES)?;
    let doc = load::<R>(&state, &user, parse_id(&id)?).await?;
    Ok(Json(response::one::<R>(&doc)?))
}

/// PATCH /api/v1/<resource>/:id
///
/// Top-level body keys replace the stored ones; the merged document is
/// normalized and validated again before it is written.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - Authenticated caller; needs one of `R::WRITE_ROLES`.
/// * `id` - Document id from the path.
/// * `body` - Fields to replace, optionally with `isActive`.
///
/// # Returns
///
/// * `Result<Json<Value>, AppError>` - The updated document, or 400/403/404/409.
pub async fn update<R: Resource>(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    user.require_any(R::WRITE_ROLES)?;
    let id = parse_id(&id)?;
    let Json(body) = body?;
    let (patch, is_active) = split_body(body)?;

    let mut doc = load::<R>(&state, &user, id).await?;

    let merged = merge_patch::<R>(doc.data.take(), patch);
    let resource: R = build(merged, &state.write_context())?;
    doc.data = to_data(&resource)?;
    ensure_unique::<R>(&state, &doc.data, Some(id)).await?;

    if let Some(active) = is_active {
        doc.is_active = active;
    }
    doc.updated_at = Utc::now();

    if !state.store.replace(&doc).await? {
        return Err(AppError::NotFound(format!(
            "No {} found with that ID",
            R::SINGULAR
        )));
    }
    state.after_write(R::COLLECTION);

    tracing::info!(
        collection = R::COLLECTION,
        id = %doc.id,
        user = %user.user_id,
        "Document updated"
    );

    Ok(Json(response::one::<R>(&doc)?))
}

/// DELETE /api/v1/<resource>/:id
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - Authenticated caller; needs one of `R::WRITE_ROLES`.
/// * `id` - Document id from the path.
///
/// # Returns
///
/// * `Result<StatusCode, AppError>` - 204 once removed, 404 if there was nothing to remove.
pub async fn delete<R: Resource>(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    user.require_any(R::WRITE_ROLES)?;
    let id = parse_id(&id)?;

    let deleted = state
        .store
        .delete(Scope::new(R::COLLECTION, user.workspace_id), id)
        .await?;
    if !deleted {
        return Err(AppError::NotFound(format!(
            "No {} found with that ID",
            R::SINGULAR
        )));
    }
    state.after_write(R::COLLECTION);

    tracing::info!(
        collection = R::COLLECTION,
        id = %id,
        user = %user.user_id,
        "Document deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/<resource>/stats
///
/// Groups the filtered collection by the resource's stats field.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - Authenticated caller; needs one of `R::READ_ROLES`.
/// * `raw` - Query string with the same filters `list` accepts.
///
/// # Returns
///
/// * `Result<Json<Value>, AppError>` - `data.stats`, one bucket per group value.
pub async fn stats<R: Resource>(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    RawQuery(raw): RawQuery,
) -> Result<Json<Value>, AppError> {
    user.require_any(R::READ_ROLES)?;
    let spec = R::STATS
        .ok_or_else(|| AppError::NotFound(format!("{} has no statistics", R::PLURAL)))?;

    let query = ListQuery::parse(&decode_pairs(raw.as_deref()), R::FILTERS, state.page_limits())?;
    let mut buckets = state
        .store
        .aggregate(
            Scope::new(R::COLLECTION, user.workspace_id),
            &query.filters,
            &spec,
        )
        .await?;
    order_buckets(&mut buckets);

    let stats: Vec<Value> = buckets.iter().map(|b| b.to_json()).collect();
    Ok(Json(response::success(json!({ "stats": stats }))))
}

/// GET /api/v1/<resource>/<parent>/:parent_id
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - Authenticated caller; needs one of `R::READ_ROLES`.
/// * `parent_id` - Id of the parent document from the path.
/// * `raw` - Query string; the parent filter is added on top of it.
///
/// # Returns
///
/// * `Result<Json<Value>, AppError>` - One page of documents pointing at the parent.
pub async fn list_related<R: Resource>(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(parent_id): Path<String>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Value>, AppError> {
    user.require_any(R::READ_ROLES)?;
    let relation = R::RELATION
        .ok_or_else(|| AppError::NotFound(format!("{} has no parent listing", R::PLURAL)))?;
    let parent_id = parse_id(&parent_id)?;

    let mut query =
        ListQuery::parse(&decode_pairs(raw.as_deref()), R::FILTERS, state.page_limits())?;
    query.filters.push(Filter::id_eq(relation.field, parent_id));

    let found = state
        .store
        .find(Scope::new(R::COLLECTION, user.workspace_id), &query)
        .await?;

    Ok(Json(response::page::<R>(&found, &query)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
        assert!(matches!(parse_id("not-an-id"), Err(AppError::BadRequest(_))));
    }
}
