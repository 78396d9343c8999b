//! White-label resolution, secret reveal and integration connection tests.

use std::sync::Arc;

use axum::{
    extract::{Path, RawQuery, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::auth::{AuthUser, Role};
use crate::errors::AppError;
use crate::handlers::{decode, load, parse_id, AppState};
use crate::models::platform::{canonical_domain, IntegrationStatus};
use crate::models::{IntegrationHub, SecurityConfiguration, WhiteLabelConfig};
use crate::resource::{render, to_data, Resource};
use crate::query::decode_pairs;
use crate::response;
use crate::store::StoredDocument;

/// GET /api/v1/white-label/resolve?domain=
///
/// Public. Looks the domain up across every workspace. Results, misses
/// included, are cached until the next white-label write.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `raw` - Query string carrying `domain`.
///
/// # Returns
///
/// * `Result<Json<Value>, AppError>` - The active config for the domain, 400 without a domain or 404.
pub async fn resolve_white_label(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Value>, AppError> {
    let domain = decode_pairs(raw.as_deref())
        .into_iter()
        .find(|(key, _)| key == "domain")
        .map(|(_, value)| canonical_domain(&value))
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AppError::BadRequest("Query parameter 'domain' is required".into()))?;

    let resolved = match state.white_label_cache.get(&domain).await {
        Some(hit) => {
            tracing::debug!("White-label cache hit for {}", domain);
            hit
        }
        None => {
            let seen = state.white_label_generation();
            let found = find_active_config(&state, &domain).await?;
            state
                .cache_white_label(domain.clone(), found.clone(), seen)
                .await;
            found
        }
    };

    let doc = resolved.ok_or_else(|| {
        AppError::NotFound(format!("No white-label configuration for {}", domain))
    })?;

    Ok(Json(response::one::<WhiteLabelConfig>(&doc)?))
}

async fn find_active_config(
    state: &AppState,
    domain: &str,
) -> Result<Option<StoredDocument>, AppError> {
    let docs = state
        .store
        .find_by_field(WhiteLabelConfig::COLLECTION, "domain", domain)
        .await?;
    Ok(docs.into_iter().find(|d| d.is_active))
}

/// GET /api/v1/security-configurations/:id/secrets
///
/// Admin only. Every reveal is logged.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - Authenticated caller.
/// * `id` - Security configuration id from the path.
///
/// # Returns
///
/// * `Result<Json<Value>, AppError>` - `data.secrets` with each value decrypted.
pub async fn reveal_secrets(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    user.require_any(Role::ADMIN_ONLY)?;
    let id = parse_id(&id)?;

    let doc = load::<SecurityConfiguration>(&state, &user, id).await?;
    let config: SecurityConfiguration = decode(&doc)?;
    let secrets = config.reveal_secrets(&state.cipher)?;

    tracing::warn!(
        config = %id,
        user = %user.user_id,
        count = secrets.len(),
        "Security secrets revealed"
    );

    Ok(Json(response::success(json!({ "secrets": secrets }))))
}

/// POST /api/v1/integrations/:id/test
///
/// Probes the integration and records the outcome on the document.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - Authenticated caller; needs one of `IntegrationHub::WRITE_ROLES`.
/// * `id` - Integration id from the path.
///
/// # Returns
///
/// * `Result<Json<Value>, AppError>` - `data.result` with the probe outcome and `data.integration`.
pub async fn test_integration(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    user.require_any(IntegrationHub::WRITE_ROLES)?;
    let id = parse_id(&id)?;

    let mut doc = load::<IntegrationHub>(&state, &user, id).await?;
    let mut integration: IntegrationHub = decode(&doc)?;

    let outcome = state
        .probe
        .check(&integration.base_url, &integration.health_path)
        .await;

    let now = Utc::now();
    integration.status = if outcome.ok {
        IntegrationStatus::Active
    } else {
        IntegrationStatus::Error
    };
    integration.last_checked_at = Some(now);
    integration.last_latency_ms = Some(outcome.latency_ms);
    integration.last_error = outcome.error.clone();

    doc.data = to_data(&integration)?;
    doc.updated_at = now;
    if !state.store.replace(&doc).await? {
        return Err(AppError::NotFound("No integration found with that ID".into()));
    }

    tracing::info!(
        integration = %id,
        ok = outcome.ok,
        latency_ms = outcome.latency_ms,
        "Integration connection tested"
    );

    Ok(Json(response::success(json!({
        "result": outcome,
        "integration": render::<IntegrationHub>(&doc)?,
    }))))
}
