//! Secret types for protecting key material from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Signing-key bytes
//! held in memory are wrapped in [`SecretBox`], so any struct that derives
//! `Debug` around them prints a redaction marker instead of the key.
//!
//! Secrets are zeroized when dropped.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretBox};
//!
//! #[derive(Debug)]
//! struct KeyHolder {
//!     version: u64,
//!     material: SecretBox<Vec<u8>>,
//! }
//!
//! let holder = KeyHolder {
//!     version: 7,
//!     material: SecretBox::new(Box::new(vec![0xAB; 32])),
//! };
//!
//! assert!(!format!("{holder:?}").contains("171"));
//! assert_eq!(holder.material.expose_secret().len(), 32);
//! ```
//!
//! Use `SecretString` for secrets that arrive as text (connection strings
//! with embedded passwords, base64 key material read from configuration) and
//! `SecretBox<Vec<u8>>` for raw key bytes.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
