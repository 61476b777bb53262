//! HTTP API.
//!
//! Organization routes authorize every mutation against the caller's
//! ability inside the target organization. Identity comes from the
//! authenticating gateway through [`IdentifyCallerLayer`].
//!
//! | Method | Path                              | Requires                            |
//! |--------|-----------------------------------|-------------------------------------|
//! | GET    | `/health`                         |                                     |
//! | GET    | `/metrics`                        |                                     |
//! | GET    | `/profile`                        | caller                              |
//! | POST   | `/organizations`                  | caller                              |
//! | GET    | `/organizations`                  | caller                              |
//! | GET    | `/organizations/:slug`            | membership                          |
//! | GET    | `/organizations/:slug/membership` | membership                          |
//! | GET    | `/organizations/:slug/abilities`  | membership                          |
//! | PUT    | `/organizations/:slug`            | `update` on the organization        |
//! | DELETE | `/organizations/:slug`            | `delete` on the organization        |
//! | PATCH  | `/organizations/:slug/owner`      | `transfer_ownership` on it          |

mod handlers;
pub mod middleware;

use axum::{
    middleware as axum_middleware,
    routing::{get, patch},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::rbac::{IdentifyCallerLayer, PolicyEngine};
use crate::store::OrganizationStore;
use crate::telemetry::MetricsHandle;

pub use handlers::{
    CreateOrganizationResponse, OrganizationRequest, OrganizationSummary, TransferOwnershipRequest,
};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: PolicyEngine,
    pub store: Arc<dyn OrganizationStore>,
    pub metrics: MetricsHandle,
}

impl AppState {
    pub fn new(engine: PolicyEngine, store: Arc<dyn OrganizationStore>) -> Self {
        Self {
            engine,
            store,
            metrics: MetricsHandle::disabled(),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Build the API router.
pub fn build_router(state: AppState, identify: IdentifyCallerLayer) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/profile", get(handlers::get_profile))
        .route(
            "/organizations",
            get(handlers::list_organizations).post(handlers::create_organization),
        )
        .route(
            "/organizations/:slug",
            get(handlers::get_organization)
                .put(handlers::update_organization)
                .delete(handlers::shutdown_organization),
        )
        .route("/organizations/:slug/membership", get(handlers::get_membership))
        .route("/organizations/:slug/abilities", get(handlers::get_abilities))
        .route("/organizations/:slug/owner", patch(handlers::transfer_ownership))
        .layer(identify)
        .layer(axum_middleware::from_fn(middleware::request_metrics))
        .layer(axum_middleware::from_fn(middleware::request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
