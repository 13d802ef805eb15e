//! Common utilities and types shared across the session token crates.

#![warn(clippy::pedantic)]

/// Module for the wall-clock abstraction supplied by the host process
pub mod clock;

/// Module for secret types that prevent accidental logging
pub mod secret;
