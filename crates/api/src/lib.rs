//! Pasal API library.
//!
//! The JSON REST API behind the Pasal storefront and admin dashboard, exposed
//! as a library so the CLI and tests can reuse its configuration, repositories
//! and services.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
