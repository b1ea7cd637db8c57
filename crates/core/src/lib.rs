//! Pasal Core - Shared domain types and catalog search.
//!
//! This crate provides the types used across all Pasal components:
//! - `api` - JSON REST API for the storefront and admin dashboard
//! - `cli` - Command-line tools for migrations, seeding and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Database encode/decode support for the newtypes is
//! gated behind the `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, money, ratings and statuses
//! - [`search`] - Relevance-scored catalog search with filters and sorting

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod search;
pub mod types;

pub use types::*;
