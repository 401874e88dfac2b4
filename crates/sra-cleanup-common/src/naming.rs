//! Baseline naming filter
//!
//! Every resource type is selected by the same rule: its name contains the
//! baseline token, compared case-insensitively. Tags are not consulted.

use crate::defaults::BASELINE_TOKEN;

/// Returns true if `name` belongs to the security baseline.
pub fn matches_baseline(name: &str) -> bool {
    contains_token(name, BASELINE_TOKEN)
}

/// Case-insensitive substring match.
pub fn contains_token(name: &str, token: &str) -> bool {
    name.to_lowercase().contains(&token.to_lowercase())
}
