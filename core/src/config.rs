//! Two YAML-loaded configuration structs (§6 "Configuration"): DAG scoring
//! and local-alpha. Both validate their bounds and probability groups at
//! load time; a failed validation is a startup error (`Error::ConfigInvalid`).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const SUM_TOLERANCE: f64 = 1e-3;

fn approx_sums_to_one(values: &[f64]) -> bool {
    (values.iter().sum::<f64>() - 1.0).abs() <= SUM_TOLERANCE
}

/// Per-hop confidence, decreasing in hop count (§4.8 step 6, §8 property 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopConfidence {
    pub one_hop: f64,
    pub two_hop: f64,
    pub three_hop: f64,
    pub four_plus_hop: f64,
}

impl Default for HopConfidence {
    fn default() -> Self {
        Self {
            one_hop: 0.95,
            two_hop: 0.80,
            three_hop: 0.65,
            four_plus_hop: 0.50,
        }
    }
}

impl HopConfidence {
    #[must_use]
    pub fn for_hops(&self, hops: usize) -> f64 {
        match hops {
            0 | 1 => self.one_hop,
            2 => self.two_hop,
            3 => self.three_hop,
            _ => self.four_plus_hop,
        }
    }

    fn validate(&self) -> Result<()> {
        let seq = [self.one_hop, self.two_hop, self.three_hop, self.four_plus_hop];
        if seq.windows(2).any(|w| w[1] > w[0]) {
            return Err(Error::ConfigInvalid(
                "hop_confidence must be non-increasing in hop count".into(),
            ));
        }
        Ok(())
    }
}

/// Interpolation bounds for a scoring weight as a function of `avg_alpha`
/// (§4.8 step 7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeightBounds {
    pub low: f64,
    pub high: f64,
}

impl WeightBounds {
    /// Linear interpolation by `avg_alpha` in `[0.5, 1.0]`, mapped to `[0, 1]`.
    #[must_use]
    pub fn interpolate(&self, avg_alpha: f64) -> f64 {
        let t = ((avg_alpha - 0.5) / 0.5).clamp(0.0, 1.0);
        self.low + (self.high - self.low) * t
    }
}

/// Suggestion/rejection thresholds (§6, §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    pub suggestion_reject: f64,
    pub suggestion_floor: f64,
    pub dependency: f64,
    pub replan: f64,
    pub tool_search: f64,
    pub context_search: f64,
    pub intent_search: f64,
    pub alternative_success_rate: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            suggestion_reject: 0.60,
            suggestion_floor: 0.65,
            dependency: 0.50,
            replan: 0.50,
            tool_search: 0.30,
            context_search: 0.30,
            intent_search: 0.30,
            alternative_success_rate: 0.70,
        }
    }
}

impl Thresholds {
    fn validate(&self) -> Result<()> {
        if self.suggestion_reject > self.suggestion_floor {
            return Err(Error::ConfigInvalid(
                "suggestion_reject must be <= suggestion_floor".into(),
            ));
        }
        Ok(())
    }
}

/// Capability injection tuning (§4.8.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityConfig {
    pub overlap_threshold: f64,
    pub confidence_floor: f64,
    pub confidence_ceiling: f64,
    pub min_adjusted_confidence: f64,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: 0.3,
            confidence_floor: 0.4,
            confidence_ceiling: 0.85,
            min_adjusted_confidence: 0.4,
        }
    }
}

/// Community/co-occurrence/alternatives tuning for the predictor (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityConfig {
    pub base_confidence: f64,
    pub max_members: usize,
    pub pagerank_weight: f64,
    pub pagerank_cap: f64,
    pub edge_weight_weight: f64,
    pub edge_weight_cap: f64,
    pub adamic_adar_weight: f64,
    pub adamic_adar_cap: f64,
    pub confidence_cap: f64,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            base_confidence: 0.40,
            max_members: 5,
            pagerank_weight: 2.0,
            pagerank_cap: 0.20,
            edge_weight_weight: 0.25,
            edge_weight_cap: 0.25,
            adamic_adar_weight: 0.1,
            adamic_adar_cap: 0.10,
            confidence_cap: 0.95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooccurrenceConfig {
    pub edge_weight_cap: f64,
    pub count_boost_cap: f64,
    pub recency_boost_cap: f64,
    pub confidence_cap: f64,
}

impl Default for CooccurrenceConfig {
    fn default() -> Self {
        Self {
            edge_weight_cap: 0.60,
            count_boost_cap: 0.20,
            recency_boost_cap: 0.10,
            confidence_cap: 0.95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicConfig {
    pub failure_exclude_threshold: f64,
    pub success_rate_weight: f64,
    pub success_rate_cap: f64,
    pub failure_rate_weight: f64,
    pub failure_rate_cap: f64,
}

impl Default for EpisodicConfig {
    fn default() -> Self {
        Self {
            failure_exclude_threshold: 0.50,
            success_rate_weight: 0.20,
            success_rate_cap: 0.15,
            failure_rate_weight: 0.25,
            failure_rate_cap: 0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativesConfig {
    pub primary_score_factor: f64,
}

impl Default for AlternativesConfig {
    fn default() -> Self {
        Self {
            primary_score_factor: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    pub min_success_rate_for_alternative: f64,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            min_success_rate_for_alternative: 0.7,
        }
    }
}

/// Top-level DAG-scoring configuration (spec.md §6, config file 1 of 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DagScoringConfig {
    pub candidate_limit: usize,
    pub top_n: usize,
    pub ranking_hybrid_weight: f64,
    pub ranking_pagerank_weight: f64,
    pub confidence_hybrid_bounds: WeightBounds,
    pub confidence_pagerank_bounds: WeightBounds,
    pub confidence_path_bounds: WeightBounds,
    pub hop_confidence: HopConfidence,
    pub thresholds: Thresholds,
    pub community: CommunityConfig,
    pub cooccurrence: CooccurrenceConfig,
    pub episodic: EpisodicConfig,
    pub alternatives: AlternativesConfig,
    pub reliability: ReliabilityConfig,
    pub capability: CapabilityConfig,
    pub max_dependency_hops: usize,
}

impl Default for DagScoringConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 10,
            top_n: 5,
            ranking_hybrid_weight: 0.8,
            ranking_pagerank_weight: 0.2,
            confidence_hybrid_bounds: WeightBounds { low: 0.55, high: 0.85 },
            confidence_pagerank_bounds: WeightBounds { low: 0.05, high: 0.30 },
            confidence_path_bounds: WeightBounds { low: 0.10, high: 0.15 },
            hop_confidence: HopConfidence::default(),
            thresholds: Thresholds::default(),
            community: CommunityConfig::default(),
            cooccurrence: CooccurrenceConfig::default(),
            episodic: EpisodicConfig::default(),
            alternatives: AlternativesConfig::default(),
            reliability: ReliabilityConfig::default(),
            capability: CapabilityConfig::default(),
            max_dependency_hops: 4,
        }
    }
}

impl DagScoringConfig {
    /// Load and validate from a YAML file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let cfg: Self = serde_yaml::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate ranges and ensure weight groups that sum to 1.0 actually do
    /// (within tolerance), matching §6's validation requirement.
    pub fn validate(&self) -> Result<()> {
        if (self.ranking_hybrid_weight + self.ranking_pagerank_weight - 1.0).abs() > SUM_TOLERANCE {
            return Err(Error::ConfigInvalid(
                "ranking_hybrid_weight + ranking_pagerank_weight must sum to 1.0".into(),
            ));
        }
        let max_conf_sum = self.confidence_hybrid_bounds.high
            + self.confidence_pagerank_bounds.high
            + self.confidence_path_bounds.high;
        if max_conf_sum > 1.0 + SUM_TOLERANCE {
            return Err(Error::ConfigInvalid(
                "confidence weight upper bounds must sum to at most 1.0".into(),
            ));
        }
        self.hop_confidence.validate()?;
        self.thresholds.validate()?;
        if self.candidate_limit == 0 || self.top_n == 0 || self.top_n > self.candidate_limit {
            return Err(Error::ConfigInvalid(
                "top_n must be nonzero and <= candidate_limit".into(),
            ));
        }
        Ok(())
    }
}

/// Cold-start (Bayesian) configuration (§4.5.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColdStartConfig {
    pub threshold: u64,
    pub prior: f64,
    pub target: f64,
}

impl Default for ColdStartConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            prior: 1.0,
            target: 0.7,
        }
    }
}

/// Heat-diffusion weights for the passive, tool-kind case (§4.5.3): must
/// sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatDiffusionWeights {
    pub intrinsic: f64,
    pub neighbor: f64,
    pub path: f64,
}

impl Default for HeatDiffusionWeights {
    fn default() -> Self {
        Self {
            intrinsic: 0.4,
            neighbor: 0.3,
            path: 0.3,
        }
    }
}

/// Degree-normalization weights inside `h(v)` (§4.5.3): must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegreeHeatWeights {
    pub own_degree: f64,
    pub neighbor_degree: f64,
}

impl Default for DegreeHeatWeights {
    fn default() -> Self {
        Self {
            own_degree: 0.6,
            neighbor_degree: 0.4,
        }
    }
}

/// Per-kind hierarchy weights for the passive, capability/meta case
/// (§4.5.4): each row (intrinsic, neighbor, hierarchy) must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyWeights {
    pub tool: [f64; 3],
    pub capability: [f64; 3],
    pub meta: [f64; 3],
}

impl Default for HierarchyWeights {
    fn default() -> Self {
        Self {
            tool: [0.5, 0.3, 0.2],
            capability: [0.3, 0.4, 0.3],
            meta: [0.2, 0.2, 0.6],
        }
    }
}

/// Bottom-up/top-down propagation factors and depth cap (§4.5.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InheritanceConfig {
    pub meta_to_capability: f64,
    pub capability_to_tool: f64,
    pub max_depth: usize,
}

impl Default for InheritanceConfig {
    fn default() -> Self {
        Self {
            meta_to_capability: 0.7,
            capability_to_tool: 0.5,
            max_depth: 3,
        }
    }
}

/// Top-level local-alpha configuration (spec.md §6, config file 2 of 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalAlphaConfig {
    pub alpha_min: f64,
    pub alpha_max: f64,
    pub cold_start: ColdStartConfig,
    pub degree_heat: DegreeHeatWeights,
    pub heat_diffusion: HeatDiffusionWeights,
    pub hierarchy: HierarchyWeights,
    pub inheritance: InheritanceConfig,
    pub heat_cache_ttl_secs: u64,
    pub spectral_cache_ttl_secs: u64,
}

impl Default for LocalAlphaConfig {
    fn default() -> Self {
        Self {
            alpha_min: 0.5,
            alpha_max: 1.0,
            cold_start: ColdStartConfig::default(),
            degree_heat: DegreeHeatWeights::default(),
            heat_diffusion: HeatDiffusionWeights::default(),
            hierarchy: HierarchyWeights::default(),
            inheritance: InheritanceConfig::default(),
            heat_cache_ttl_secs: 60,
            spectral_cache_ttl_secs: 300,
        }
    }
}

impl LocalAlphaConfig {
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let cfg: Self = serde_yaml::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.alpha_min < 0.0 || self.alpha_max > 1.0 || self.alpha_min > self.alpha_max {
            return Err(Error::ConfigInvalid("alpha bounds out of range".into()));
        }
        if !approx_sums_to_one(&[self.degree_heat.own_degree, self.degree_heat.neighbor_degree]) {
            return Err(Error::ConfigInvalid("degree_heat weights must sum to 1.0".into()));
        }
        if !approx_sums_to_one(&[
            self.heat_diffusion.intrinsic,
            self.heat_diffusion.neighbor,
            self.heat_diffusion.path,
        ]) {
            return Err(Error::ConfigInvalid("heat_diffusion weights must sum to 1.0".into()));
        }
        for row in [self.hierarchy.tool, self.hierarchy.capability, self.hierarchy.meta] {
            if !approx_sums_to_one(&row) {
                return Err(Error::ConfigInvalid(
                    "hierarchy weights per kind must sum to 1.0".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        DagScoringConfig::default().validate().unwrap();
        LocalAlphaConfig::default().validate().unwrap();
    }

    #[test]
    fn bad_hierarchy_weights_rejected() {
        let mut cfg = LocalAlphaConfig::default();
        cfg.hierarchy.tool = [0.9, 0.3, 0.2];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_monotonic_hop_confidence_rejected() {
        let mut cfg = DagScoringConfig::default();
        cfg.hop_confidence.two_hop = 0.99;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn weight_bounds_interpolate_linearly() {
        let b = WeightBounds { low: 0.55, high: 0.85 };
        assert!((b.interpolate(0.5) - 0.55).abs() < 1e-9);
        assert!((b.interpolate(1.0) - 0.85).abs() < 1e-9);
        assert!((b.interpolate(0.75) - 0.70).abs() < 1e-9);
    }
}
