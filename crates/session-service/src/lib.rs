//! Session Service Library
//!
//! Issues and verifies short-lived signed access tokens and manages the
//! rotation of the keys that sign them.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `crypto` - HMAC signing and key generation
//! - `errors` - Operational errors and refresh reasons
//! - `models` - Signing keys, claims, verification outcomes
//! - `observability` - Metrics and log correlation
//! - `repositories` - Signing key stores
//! - `services` - Token codec, key manager, access token engine
//! - `tasks` - Background key rotation

pub mod config;
pub mod crypto;
pub mod errors;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod services;
pub mod tasks;
