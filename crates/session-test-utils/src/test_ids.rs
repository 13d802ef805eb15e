//! Fixed test IDs for deterministic tests
//!
//! Using fixed values prevents flaky tests caused by random data. Use
//! [`unique_session_handle`] only where distinct sessions are the point.

use uuid::Uuid;

// Session handles
pub const TEST_SESSION_HANDLE_1: &str = "00000000-0000-0000-0000-000000000001";
pub const TEST_SESSION_HANDLE_2: &str = "00000000-0000-0000-0000-000000000002";

// User IDs
pub const TEST_USER_ALICE: &str = "user-alice";
pub const TEST_USER_BOB: &str = "user-bob";

// Refresh token hashes (hex SHA-256 shaped)
pub const TEST_REFRESH_TOKEN_HASH: &str =
    "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8";
pub const TEST_PARENT_REFRESH_TOKEN_HASH: &str =
    "a665a45920422f9d417e4867efdc4fb8a04a1f3fff1fa07e998e86f7f7a27ae3";

pub const TEST_ANTI_CSRF_TOKEN: &str = "anti-csrf-test-value";

/// A fresh random session handle.
pub fn unique_session_handle() -> String {
    Uuid::new_v4().to_string()
}
