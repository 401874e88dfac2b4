//! AWS test utilities
//!
//! Live tests are `#[ignore]`d and read their target from the environment.

/// Get the AWS region for tests.
///
/// Checks environment variables in order:
/// 1. AWS_REGION
/// 2. AWS_DEFAULT_REGION
/// 3. Falls back to us-east-1
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-1".to_string())
}

/// Credential profile for live tests, from `SRA_CLEANUP_TEST_PROFILE`.
///
/// Returns `None` when unset so live tests can skip themselves.
pub fn test_profile() -> Option<String> {
    std::env::var("SRA_CLEANUP_TEST_PROFILE")
        .ok()
        .filter(|p| !p.is_empty())
}
