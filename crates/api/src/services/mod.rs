//! Business logic services.
//!
//! - `auth` - Password accounts and bearer tokens
//! - `catalog` - Cached catalog snapshot for search
//! - `payments` - Stripe, eSewa and Khalti adapters

pub mod auth;
pub mod catalog;
pub mod payments;
