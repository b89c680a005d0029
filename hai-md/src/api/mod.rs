//! HTTP API handlers for hai-md

pub mod diagnosis;
pub mod health;
pub mod models;

pub use diagnosis::{diagnosis_routes, ml_diagnosis};
pub use health::{get_build_info, health_check, health_routes};
pub use models::{list_models, model_routes};
