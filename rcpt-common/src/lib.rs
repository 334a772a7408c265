//! # Receipt Ingestion Common Library
//!
//! Shared code for the receipt ingestion services including:
//! - Database initialization and schema creation
//! - Row models for organization-scoped entities
//! - Configuration loading (TOML file + environment overrides)
//! - Common error types

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
