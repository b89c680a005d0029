//! API module for shared HTTP API types
//!
//! Contains only framework-independent request/response types. Each service
//! wraps these with its own handlers (Axum, etc.).

pub mod types;

pub use types::{DispatchRequest, ErrorResponse, PredictionResult, Urgency};
