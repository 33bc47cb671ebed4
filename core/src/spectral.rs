//! C4: `SpectralCluster` — bipartite spectral clustering over the
//! tool/capability incidence matrix (spec.md §4.4), used to boost
//! capability discovery scores and to compute a hypergraph-PageRank
//! centrality over capabilities.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use nalgebra::{DMatrix, SymmetricEigen};

use crate::types::Capability;

const MIN_CLUSTERS: usize = 2;
const MAX_CLUSTERS: usize = 5;
const MAX_EIGENVALUES_CONSIDERED: usize = 10;
const KMEANS_MAX_ITERS: usize = 50;
const BOUNDARY_MULTIPLIER: f64 = 0.25;
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Output of a clustering run: per-node cluster assignment plus a
/// hypergraph-PageRank centrality score per capability.
#[derive(Debug, Clone, Default)]
pub struct ClusterAssignment {
    tool_clusters: HashMap<String, usize>,
    capability_clusters: HashMap<String, usize>,
    capability_pagerank: HashMap<String, f64>,
    cluster_count: usize,
}

impl ClusterAssignment {
    /// The active cluster for a query context: the cluster containing the
    /// plurality of `context_tools` (§4.4 step 4). `None` if no context
    /// tool is clustered.
    #[must_use]
    pub fn active_cluster(&self, context_tools: &[String]) -> Option<usize> {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for tool in context_tools {
            if let Some(c) = self.tool_clusters.get(tool) {
                *counts.entry(*c).or_insert(0) += 1;
            }
        }
        counts.into_iter().max_by_key(|(_, n)| *n).map(|(c, _)| c)
    }

    /// `ClusterBoost(capability, activeCluster) ∈ [0, 0.5]` (§4.4 step 5),
    /// plus `0.3 × hypergraph pagerank`, capped at 0.5 total.
    #[must_use]
    pub fn cluster_boost(&self, capability_id: &str, active_cluster: Option<usize>) -> f64 {
        let membership = match (self.capability_clusters.get(capability_id), active_cluster) {
            (Some(c), Some(active)) if *c == active => 0.2,
            (Some(_), Some(_)) => BOUNDARY_MULTIPLIER * 0.2,
            _ => 0.0,
        };
        let pagerank_boost = 0.3 * self.capability_pagerank.get(capability_id).copied().unwrap_or(0.0);
        (membership + pagerank_boost).min(0.5)
    }

    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }
}

/// Owns the cache and computes assignments on demand. Cache is keyed by a
/// hash of the (tool-id set, capability (id, tools_used) set) and expires
/// on a fixed TTL or explicit invalidation (§4.4 "Caching").
pub struct SpectralCluster {
    cache: Option<(u64, Instant, ClusterAssignment)>,
    ttl: Duration,
}

impl Default for SpectralCluster {
    fn default() -> Self {
        Self {
            cache: None,
            ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl SpectralCluster {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { cache: None, ttl }
    }

    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Recompute (or return the cached) cluster assignment for the given
    /// tool ids and capabilities. Returns an empty assignment rather than
    /// erroring when fewer than 2 tools or 2 capabilities are present
    /// (§4.4 "Failure semantics").
    pub fn assignment(&mut self, tool_ids: &[String], capabilities: &[Capability]) -> ClusterAssignment {
        let key = cache_key(tool_ids, capabilities);
        if let Some((cached_key, at, assignment)) = &self.cache {
            if *cached_key == key && at.elapsed() < self.ttl {
                return assignment.clone();
            }
        }

        let assignment = compute(tool_ids, capabilities);
        self.cache = Some((key, Instant::now(), assignment.clone()));
        assignment
    }
}

fn cache_key(tool_ids: &[String], capabilities: &[Capability]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    let mut sorted_tools = tool_ids.to_vec();
    sorted_tools.sort_unstable();
    sorted_tools.hash(&mut hasher);
    let mut sorted_caps: Vec<(&str, Vec<&str>)> = capabilities
        .iter()
        .map(|c| (c.id.as_str(), c.tools_used.iter().map(String::as_str).collect()))
        .collect();
    sorted_caps.sort_by_key(|(id, _)| *id);
    for (id, mut tools) in sorted_caps {
        tools.sort_unstable();
        id.hash(&mut hasher);
        tools.hash(&mut hasher);
    }
    hasher.finish()
}

fn compute(tool_ids: &[String], capabilities: &[Capability]) -> ClusterAssignment {
    if tool_ids.len() < 2 || capabilities.len() < 2 {
        return ClusterAssignment::default();
    }

    let n_tools = tool_ids.len();
    let n_caps = capabilities.len();
    let tool_index: HashMap<&str, usize> = tool_ids.iter().map(|s| s.as_str()).zip(0..).collect();

    // Bipartite incidence matrix B (tools x capabilities).
    let mut incidence = DMatrix::<f64>::zeros(n_tools, n_caps);
    for (j, cap) in capabilities.iter().enumerate() {
        for tool in &cap.tools_used {
            if let Some(&i) = tool_index.get(tool.as_str()) {
                incidence[(i, j)] = 1.0;
            }
        }
    }

    // Full bipartite adjacency: [[0, B], [B^T, 0]].
    let n = n_tools + n_caps;
    let mut adjacency = DMatrix::<f64>::zeros(n, n);
    for i in 0..n_tools {
        for j in 0..n_caps {
            let w = incidence[(i, j)];
            adjacency[(i, n_tools + j)] = w;
            adjacency[(n_tools + j, i)] = w;
        }
    }

    let degrees: Vec<f64> = (0..n).map(|i| adjacency.row(i).sum()).collect();

    // Symmetric normalized Laplacian: L = I - D^-1/2 A D^-1/2.
    let mut laplacian = DMatrix::<f64>::identity(n, n);
    for i in 0..n {
        for j in 0..n {
            if adjacency[(i, j)] != 0.0 && degrees[i] > 0.0 && degrees[j] > 0.0 {
                laplacian[(i, j)] -= adjacency[(i, j)] / (degrees[i].sqrt() * degrees[j].sqrt());
            }
        }
    }

    let eigen = SymmetricEigen::new(laplacian);
    let mut indexed_eigenvalues: Vec<(usize, f64)> = eigen.eigenvalues.iter().copied().enumerate().collect();
    indexed_eigenvalues.sort_by(|a, b| a.1.total_cmp(&b.1));

    let considered = indexed_eigenvalues.len().min(MAX_EIGENVALUES_CONSIDERED);
    // Skip the trivial (near-zero) eigenvalue, then take up to MAX_CLUSTERS.
    let chosen: Vec<usize> = indexed_eigenvalues[..considered]
        .iter()
        .skip(1)
        .take(MAX_CLUSTERS)
        .map(|(idx, _)| *idx)
        .collect();
    let k = chosen.len().clamp(MIN_CLUSTERS, MAX_CLUSTERS).min(n.max(1));
    let chosen = if chosen.len() >= k {
        &chosen[..k]
    } else {
        &chosen[..]
    };

    let embedding: Vec<Vec<f64>> = (0..n)
        .map(|row| chosen.iter().map(|&col| eigen.eigenvectors[(row, col)]).collect())
        .collect();

    let clusters = kmeans(&embedding, k.max(MIN_CLUSTERS));

    let mut tool_clusters = HashMap::new();
    for (i, tool_id) in tool_ids.iter().enumerate() {
        tool_clusters.insert(tool_id.clone(), clusters[i]);
    }
    let mut capability_clusters = HashMap::new();
    for (j, cap) in capabilities.iter().enumerate() {
        capability_clusters.insert(cap.id.clone(), clusters[n_tools + j]);
    }

    let pagerank = hypergraph_pagerank(&incidence, tool_ids, capabilities);

    ClusterAssignment {
        tool_clusters,
        capability_clusters,
        capability_pagerank: pagerank,
        cluster_count: k.max(MIN_CLUSTERS),
    }
}

/// Bounded-iteration k-means over the spectral embedding, deterministic
/// initialization (first k distinct points) rather than random restarts.
fn kmeans(embedding: &[Vec<f64>], k: usize) -> Vec<usize> {
    let n = embedding.len();
    if n == 0 || k == 0 {
        return Vec::new();
    }
    let dims = embedding[0].len().max(1);
    let k = k.min(n);

    let mut centroids: Vec<Vec<f64>> = (0..k).map(|i| embedding[i * n / k].clone()).collect();
    let mut assignment = vec![0usize; n];

    for _ in 0..KMEANS_MAX_ITERS {
        let mut changed = false;
        for (i, point) in embedding.iter().enumerate() {
            let mut best = 0usize;
            let mut best_dist = f64::MAX;
            for (c, centroid) in centroids.iter().enumerate() {
                let dist: f64 = point.iter().zip(centroid).map(|(a, b)| (a - b).powi(2)).sum();
                if dist < best_dist {
                    best_dist = dist;
                    best = c;
                }
            }
            if assignment[i] != best {
                assignment[i] = best;
                changed = true;
            }
        }

        let mut sums = vec![vec![0.0; dims]; k];
        let mut counts = vec![0usize; k];
        for (i, point) in embedding.iter().enumerate() {
            let c = assignment[i];
            counts[c] += 1;
            for d in 0..dims {
                sums[c][d] += point[d];
            }
        }
        for c in 0..k {
            if counts[c] > 0 {
                for d in 0..dims {
                    centroids[c][d] = sums[c][d] / counts[c] as f64;
                }
            }
        }

        if !changed {
            break;
        }
    }

    assignment
}

/// Centrality over the bipartite hypergraph: power iteration on the
/// incidence-weighted adjacency, restricted to capability-side scores.
fn hypergraph_pagerank(
    incidence: &DMatrix<f64>,
    tool_ids: &[String],
    capabilities: &[Capability],
) -> HashMap<String, f64> {
    let n_tools = tool_ids.len();
    let n_caps = capabilities.len();
    if n_caps == 0 {
        return HashMap::new();
    }

    let mut tool_rank = vec![1.0 / n_tools.max(1) as f64; n_tools];
    let mut cap_rank = vec![1.0 / n_caps as f64; n_caps];

    for _ in 0..50 {
        let mut next_cap = vec![0.0; n_caps];
        for j in 0..n_caps {
            let col_sum: f64 = (0..n_tools).map(|i| incidence[(i, j)]).sum();
            if col_sum <= 0.0 {
                continue;
            }
            next_cap[j] = (0..n_tools).map(|i| incidence[(i, j)] * tool_rank[i]).sum::<f64>() / col_sum;
        }
        let mut next_tool = vec![0.0; n_tools];
        for i in 0..n_tools {
            let row_sum: f64 = (0..n_caps).map(|j| incidence[(i, j)]).sum();
            if row_sum <= 0.0 {
                continue;
            }
            next_tool[i] = (0..n_caps).map(|j| incidence[(i, j)] * cap_rank[j]).sum::<f64>() / row_sum;
        }
        cap_rank = normalize(next_cap);
        tool_rank = normalize(next_tool);
    }

    capabilities
        .iter()
        .enumerate()
        .map(|(j, cap)| (cap.id.clone(), cap_rank[j]))
        .collect()
}

fn normalize(values: Vec<f64>) -> Vec<f64> {
    let sum: f64 = values.iter().sum();
    if sum <= 0.0 {
        return values;
    }
    values.into_iter().map(|v| v / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(id: &str, tools: &[&str]) -> Capability {
        Capability {
            id: id.to_string(),
            name: id.to_string(),
            tools_used: tools.iter().map(|s| s.to_string()).collect(),
            success_rate: 1.0,
            code_snippet: None,
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn too_few_tools_or_capabilities_yields_empty_assignment() {
        let tools = vec!["a".to_string()];
        let caps = vec![cap("c1", &["a"])];
        let assignment = compute(&tools, &caps);
        assert_eq!(assignment.cluster_count(), 0);
        assert_eq!(assignment.cluster_boost("c1", None), 0.0);
    }

    #[test]
    fn clusters_partition_all_tools_and_capabilities() {
        let tools = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        let caps = vec![cap("c1", &["a", "b"]), cap("c2", &["c", "d"]), cap("c3", &["a", "c"])];
        let assignment = compute(&tools, &caps);
        assert!(assignment.cluster_count() >= MIN_CLUSTERS);
        for t in &tools {
            assert!(assignment.tool_clusters.contains_key(t));
        }
        for c in &caps {
            assert!(assignment.capability_clusters.contains_key(&c.id));
        }
    }

    #[test]
    fn cluster_boost_is_bounded() {
        let tools = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        let caps = vec![cap("c1", &["a", "b"]), cap("c2", &["c", "d"])];
        let assignment = compute(&tools, &caps);
        for c in &caps {
            let boost = assignment.cluster_boost(&c.id, Some(0));
            assert!((0.0..=0.5).contains(&boost));
        }
    }

    #[test]
    fn cache_hits_within_ttl_and_invalidates_after() {
        let mut sc = SpectralCluster::new(Duration::from_millis(20));
        let tools = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        let caps = vec![cap("c1", &["a", "b"]), cap("c2", &["c", "d"])];
        let first = sc.assignment(&tools, &caps);
        let second = sc.assignment(&tools, &caps);
        assert_eq!(first.cluster_count(), second.cluster_count());
        std::thread::sleep(Duration::from_millis(30));
        sc.invalidate();
        let third = sc.assignment(&tools, &caps);
        assert_eq!(third.cluster_count(), first.cluster_count());
    }
}
