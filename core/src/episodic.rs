//! Episodic-memory confidence adjustment (spec.md §4.9.2), shared by
//! capability injection (§4.8.1) and `Predictor` (§4.9).

use crate::config::EpisodicConfig;
use crate::types::EpisodeAggregate;

/// Adjust `base` confidence using `aggregate`'s observed success/failure
/// rates. Returns `None` when the aggregate's failure rate excludes the
/// candidate outright.
#[must_use]
pub fn adjust(base: f64, aggregate: Option<&EpisodeAggregate>, config: &EpisodicConfig) -> Option<f64> {
    let Some(aggregate) = aggregate else {
        return Some(base);
    };
    if aggregate.failure_rate() > config.failure_exclude_threshold {
        return None;
    }
    let boost = (aggregate.success_rate() * config.success_rate_weight).min(config.success_rate_cap);
    let penalty = (aggregate.failure_rate() * config.failure_rate_weight).min(config.failure_rate_cap);
    Some((base + boost - penalty).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_aggregate_passes_through_unchanged() {
        let config = EpisodicConfig::default();
        assert_eq!(adjust(0.5, None, &config), Some(0.5));
    }

    #[test]
    fn high_failure_rate_excludes() {
        let config = EpisodicConfig::default();
        let agg = EpisodeAggregate {
            total: 10,
            successes: 2,
            failures: 8,
        };
        assert_eq!(adjust(0.5, Some(&agg), &config), None);
    }

    #[test]
    fn success_boosts_and_failure_penalizes_within_caps() {
        let config = EpisodicConfig::default();
        let agg = EpisodeAggregate {
            total: 10,
            successes: 9,
            failures: 1,
        };
        let adjusted = adjust(0.5, Some(&agg), &config).unwrap();
        assert!(adjusted > 0.5);
    }
}
