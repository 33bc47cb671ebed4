//! Numeric constants fixed by the specification's edge algebra (§3, §4.3)
//! and the predictor's danger filter (§4.9).

use crate::types::{EdgeSource, EdgeType};

/// `weight = TYPE[type] x SOURCE[source]`.
#[must_use]
pub fn type_weight(edge_type: EdgeType) -> f64 {
    match edge_type {
        EdgeType::Dependency => 1.0,
        EdgeType::Contains => 0.8,
        EdgeType::Provides => 0.7,
        EdgeType::Alternative => 0.6,
        EdgeType::Sequence => 0.5,
    }
}

/// Source modifier. `User` carries a fixed confidence of 0.90 rather than
/// being folded into the type/source product (see `EdgeAttrs::new_user`).
#[must_use]
pub fn source_modifier(source: EdgeSource) -> f64 {
    match source {
        EdgeSource::Observed | EdgeSource::User => 1.0,
        EdgeSource::Inferred => 0.7,
        EdgeSource::Template => 0.5,
    }
}

/// Observation count at which an `inferred` edge promotes to `observed`.
pub const PROMOTION_THRESHOLD: u64 = 3;

/// Confidence filter applied when loading dependency rows during `Sync`.
pub const SYNC_CONFIDENCE_FILTER: f64 = 0.3;

/// Fixed confidence assigned to user-defined edges on creation.
pub const USER_EDGE_CONFIDENCE: f64 = 0.90;

/// Observation-count threshold below which `LocalAlpha` uses the Bayesian
/// cold-start algorithm (§4.5).
pub const COLD_START_THRESHOLD: u64 = 5;

/// Bounds of the locally adaptive blending coefficient (§4.5).
pub const ALPHA_MIN: f64 = 0.5;
pub const ALPHA_MAX: f64 = 1.0;

/// Tool ids containing any of these substrings are excluded from
/// predictions regardless of score (§4.9 step 2).
pub const DANGER_SUBSTRINGS: &[&str] = &[
    "delete",
    "remove",
    "deploy",
    "payment",
    "send_email",
    "execute_shell",
    "drop",
    "truncate",
    "transfer",
    "admin",
];

/// Returns true if the tool/capability id matches the danger list.
#[must_use]
pub fn is_dangerous(id: &str) -> bool {
    let lower = id.to_ascii_lowercase();
    DANGER_SUBSTRINGS.iter().any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_is_product_of_type_and_source() {
        let w = type_weight(EdgeType::Sequence) * source_modifier(EdgeSource::Inferred);
        assert!((w - 0.35).abs() < 1e-9);
        let w = type_weight(EdgeType::Sequence) * source_modifier(EdgeSource::Observed);
        assert!((w - 0.5).abs() < 1e-9);
    }

    #[test]
    fn danger_filter_matches_substrings() {
        assert!(is_dangerous("fs:delete_file"));
        assert!(is_dangerous("payments:REFUND_transfer"));
        assert!(!is_dangerous("fs:read_file"));
        assert!(!is_dangerous("json:parse"));
    }
}
