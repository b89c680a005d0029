//! # HealthAI Common Library
//!
//! Shared code for the HealthAI services including:
//! - Error and result types
//! - Bootstrap configuration loading (TOML + environment)
//! - API request/response types for the diagnosis endpoints

pub mod api;
pub mod config;
pub mod error;

pub use error::{Error, Result};
