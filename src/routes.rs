//! Router assembly.

use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::handlers::{self, AppState};
use crate::models::*;
use crate::notification_handler;
use crate::platform_handler;
use crate::resource::Resource;

/// Request bodies above this size are rejected with 413.
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

const OPENAPI_SPEC: &str = include_str!("../openapi.yml");

/// Per-IP request budget applied to everything except `/health`.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub per_second: u64,
    pub burst: u32,
}

/// CRUD routes for `R`, plus `/stats` and the parent listing when declared.
pub fn resource_routes<R: Resource>() -> Router<Arc<AppState>> {
    let mut router = Router::new()
        .route("/", post(handlers::create::<R>).get(handlers::list::<R>))
        .route(
            "/:id",
            get(handlers::get_one::<R>)
                .patch(handlers::update::<R>)
                .delete(handlers::delete::<R>),
        );

    if R::STATS.is_some() {
        router = router.route("/stats", get(handlers::stats::<R>));
    }
    if let Some(relation) = R::RELATION {
        router = router.route(
            &format!("/{}/:parent_id", relation.segment),
            get(handlers::list_related::<R>),
        );
    }
    router
}

/// Every `/api/v1` route.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/leads", resource_routes::<Lead>())
        .nest(
            "/notifications",
            resource_routes::<Notification>()
                .route("/me", get(notification_handler::my_notifications))
                .route("/unread-count", get(notification_handler::unread_count))
                .route("/read-all", patch(notification_handler::mark_all_read))
                .route("/:id/read", patch(notification_handler::mark_read)),
        )
        .nest("/statements", resource_routes::<Statement>())
        .nest("/countries", resource_routes::<Country>())
        .nest("/traffic-channels", resource_routes::<TrafficChannel>())
        .nest("/device-analytics", resource_routes::<DeviceAnalytics>())
        .nest("/compatibility", resource_routes::<Compatibility>())
        .nest("/product-activities", resource_routes::<ProductActivity>())
        .nest("/product-drafts", resource_routes::<ProductDraft>())
        .nest("/product-purchases", resource_routes::<ProductPurchaseHistory>())
        .nest("/product-shares", resource_routes::<ProductShare>())
        .nest(
            "/product-traffic-sources",
            resource_routes::<ProductTrafficSource>(),
        )
        .nest("/product-viewers", resource_routes::<ProductViewer>())
        .nest("/social-posts", resource_routes::<SocialPost>())
        .nest(
            "/white-label",
            resource_routes::<WhiteLabelConfig>()
                .route("/resolve", get(platform_handler::resolve_white_label)),
        )
        .nest(
            "/security-configurations",
            resource_routes::<SecurityConfiguration>()
                .route("/:id/secrets", get(platform_handler::reveal_secrets)),
        )
        .nest("/data-warehouses", resource_routes::<DataWarehouse>())
        .nest(
            "/integrations",
            resource_routes::<IntegrationHub>()
                .route("/:id/test", post(platform_handler::test_integration)),
        )
}

/// Serves the bundled OpenAPI document.
async fn serve_openapi_spec() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/yaml")],
        OPENAPI_SPEC,
    )
}

/// Swagger UI page loading `/api-docs/openapi.yml`.
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>MEWAYZ API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.yml",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

/// Builds the application router.
///
/// `rate_limit` is optional so tests can drive the router without a peer
/// address; the server always passes one.
pub fn build_router(state: Arc<AppState>, rate_limit: Option<RateLimit>) -> anyhow::Result<Router> {
    let mut protected = Router::new()
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.yml", get(serve_openapi_spec))
        .nest("/api/v1", api_routes())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    if let Some(limit) = rate_limit {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(limit.per_second)
                .burst_size(limit.burst)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?,
        );
        protected = protected.layer(ServiceBuilder::new().layer(GovernorLayer {
            config: governor_conf,
        }));
        tracing::info!(
            "Rate limiting: {} req/s per IP, burst {}",
            limit.per_second,
            limit.burst
        );
    }

    // health bypasses rate limiting for load balancer probes
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    Ok(app)
}
