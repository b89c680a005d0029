//! hai-md library - medical diagnosis service
//!
//! Routes a diagnosis request to one of the registered clinical models and
//! returns a uniform result with recommendations and an urgency tier.

pub mod api;
pub mod artifacts;
pub mod dispatcher;
pub mod error;
pub mod inference;
pub mod model_id;
pub mod preprocess;
pub mod recommend;
pub mod registry;
pub mod schema;

pub use crate::dispatcher::Dispatcher;
pub use crate::error::{ApiError, ApiResult, DispatchError};
pub use crate::model_id::ModelId;
pub use crate::registry::{ModelEntry, ModelRegistry};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Module name reported by health and build-info endpoints
pub const MODULE_NAME: &str = "hai-md";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            dispatcher: Dispatcher::new(registry),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::diagnosis_routes())
        .merge(api::model_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
