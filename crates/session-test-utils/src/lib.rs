//! # Session Test Utilities
//!
//! Shared test utilities for the session service.
//!
//! This crate provides:
//! - Deterministic key fixtures (fixed HMAC keys for reproducible tests)
//! - Claims builders (TestClaimsBuilder)
//! - A wired-up service harness on a manual clock (TestSessionHarness)
//! - Fault-injecting signing key stores
//! - Database time manipulation for rotation tests
//! - Fixed test IDs
//! - Custom assertions (VerificationAssertions trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use session_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let harness = TestSessionHarness::new();
//!
//!     let issued = TestClaimsBuilder::new()
//!         .for_user(TEST_USER_ALICE)
//!         .issue(&harness.service)
//!         .await?;
//!
//!     harness
//!         .verify(&issued.token)
//!         .await?
//!         .assert_valid()
//!         .assert_user_id(TEST_USER_ALICE);
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod claims_builders;
pub mod crypto_fixtures;
pub mod harness;
pub mod rotation_time;
pub mod store_fixtures;
pub mod test_ids;

// Re-export commonly used items
pub use assertions::*;
pub use claims_builders::*;
pub use crypto_fixtures::*;
pub use harness::*;
pub use rotation_time::*;
pub use store_fixtures::*;
pub use test_ids::*;
