//! Recipient-facing notification endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, RawQuery, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::handlers::{decode, load, parse_id, AppState};
use crate::models::Notification;
use crate::query::{decode_pairs, Field, Filter, ListQuery, SortKey};
use crate::resource::{to_data, Resource};
use crate::response;
use crate::store::Scope;

/// Unread notifications are marked in batches of this size.
const READ_ALL_BATCH: u32 = 200;

fn unread_for(user: &AuthUser, limit: u32) -> ListQuery {
    ListQuery {
        filters: vec![
            Filter::id_eq("recipient", user.user_id),
            Filter::bool_eq("read", false),
        ],
        sort: vec![SortKey {
            field: Field::CreatedAt,
            descending: false,
        }],
        page: 1,
        limit,
    }
}

/// GET /api/v1/notifications/me
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - Authenticated caller, any role.
/// * `raw` - Query string with notification filters and paging.
///
/// # Returns
///
/// * `Result<Json<Value>, AppError>` - One page of the caller's own notifications.
pub async fn my_notifications(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    RawQuery(raw): RawQuery,
) -> Result<Json<Value>, AppError> {
    let mut query = ListQuery::parse(
        &decode_pairs(raw.as_deref()),
        Notification::FILTERS,
        state.page_limits(),
    )?;
    query.filters.push(Filter::id_eq("recipient", user.user_id));

    let found = state
        .store
        .find(Scope::new(Notification::COLLECTION, user.workspace_id), &query)
        .await?;

    Ok(Json(response::page::<Notification>(&found, &query)?))
}

/// GET /api/v1/notifications/unread-count
///
/// # Returns
///
/// * `Result<Json<Value>, AppError>` - `data.count`, the caller's unread notifications.
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let found = state
        .store
        .find(
            Scope::new(Notification::COLLECTION, user.workspace_id),
            &unread_for(&user, 1),
        )
        .await?;

    Ok(Json(response::success(json!({ "count": found.total }))))
}

/// PATCH /api/v1/notifications/:id/read
///
/// Allowed for the recipient and for staff.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - Authenticated caller.
/// * `id` - Notification id from the path.
///
/// # Returns
///
/// * `Result<Json<Value>, AppError>` - The notification, 403 for anyone else or 404.
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id)?;
    let mut doc = load::<Notification>(&state, &user, id).await?;
    let mut notification: Notification = decode(&doc)?;

    if notification.recipient != user.user_id && !user.is_staff() {
        return Err(AppError::Forbidden(
            "You can only mark your own notifications as read".into(),
        ));
    }

    if !notification.read {
        let now = Utc::now();
        notification.mark_read(now);
        doc.data = to_data(&notification)?;
        doc.updated_at = now;
        if !state.store.replace(&doc).await? {
            return Err(AppError::NotFound(
                "No notification found with that ID".into(),
            ));
        }
    }

    Ok(Json(response::one::<Notification>(&doc)?))
}

/// PATCH /api/v1/notifications/read-all
///
/// Marks the caller's unread notifications in batches.
///
/// # Returns
///
/// * `Result<Json<Value>, AppError>` - `data.updated`, the number of notifications marked.
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let scope = Scope::new(Notification::COLLECTION, user.workspace_id);
    let query = unread_for(&user, READ_ALL_BATCH);
    let mut updated: u64 = 0;

    // marked documents drop out of the filter, so page 1 always holds the next batch
    loop {
        let batch = state.store.find(scope, &query).await?;
        if batch.documents.is_empty() {
            break;
        }

        let mut progressed = false;
        for mut doc in batch.documents {
            let mut notification: Notification = decode(&doc)?;
            let now = Utc::now();
            notification.mark_read(now);
            doc.data = to_data(&notification)?;
            doc.updated_at = now;
            if state.store.replace(&doc).await? {
                updated += 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    tracing::info!(user = %user.user_id, updated, "Marked notifications as read");
    Ok(Json(response::success(json!({ "updated": updated }))))
}
