//! # licensr Common Library
//!
//! Shared code for the licensr catalog services:
//! - Catalog models (tracks, synonym entries, search log records)
//! - Database initialization and schema
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
