//! sra-cleanup-common - Shared catalog types and rules
//!
//! This crate holds the fixed rules of the cleanup tool without any AWS SDK
//! dependencies, so they can be tested and reused in isolation.
//!
//! ## Modules
//!
//! - [`defaults`]: Fixed catalogs and default tuning values
//! - [`naming`]: Baseline naming filter applied to every resource type
//! - [`resource_kind`]: Resource type catalog and teardown ordering

pub mod defaults;
pub mod naming;
pub mod resource_kind;

// Re-export commonly used types
pub use naming::matches_baseline;
pub use resource_kind::{OrderError, ResourceKind, Scope, resolve_order, teardown_order};
