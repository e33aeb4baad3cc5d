//! # ml-core
//!
//! Core types, errors, and configuration for MediaLib RS.
//!
//! This crate provides the foundational building blocks used across all other crates:
//! - The media error taxonomy and its HTTP status mapping
//! - Result type aliases and the uniform operation envelope
//! - Application configuration
//! - The translation lookup table

pub mod config;
pub mod error;
pub mod i18n;
pub mod result;

pub use error::*;
pub use result::*;

/// Primary key type for attachments
pub type Id = i64;
