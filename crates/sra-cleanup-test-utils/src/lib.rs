//! Shared test utilities for sra-cleanup
//!
//! ## Modules
//!
//! - [`aws`]: Region and profile selection for live tests
//! - [`fake`]: In-memory provider and session factory that record every call

pub mod aws;
pub mod fake;

// Re-export commonly used items
pub use aws::{get_test_region, test_profile};
pub use fake::{Call, FakeProvider, FakeSessionFactory, Op, StackBehavior};
