//! Coffeehouse Core - Shared types library.
//!
//! This crate provides the domain types shared by the Coffeehouse components:
//! - `storefront` - Server-rendered storefront and admin console
//! - `integration-tests` - Fake backend and end-to-end tests
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. The backend
//! REST API is the source of truth; these types describe what travels over it.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, roles, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
