//! C7: `DAGBuilder` — turns an ordered candidate list into a validated
//! DAG of [`Task`]s by finding pairwise shortest paths and breaking any
//! cycles that result (spec.md §4.7).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::error::{Error, Result};
use crate::graph::GraphStore;
use crate::types::{NodeId, Task, TaskKind};

const MAX_HOPS: usize = 4;

#[derive(Clone)]
struct HeapEntry {
    cost: f64,
    node: NodeId,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the smallest cost first.
        other.cost.total_cmp(&self.cost)
    }
}

/// Dijkstra over `EdgeAttrs::cost()`, bounded at `MAX_HOPS` edges. Returns
/// `(total_cost, hop_count, avg_edge_weight_along_path)` if a path exists
/// within the hop bound.
fn shortest_path(graph: &GraphStore, from: &str, to: &str) -> Option<(f64, usize, f64)> {
    let mut best_cost: HashMap<NodeId, f64> = HashMap::new();
    let mut hops: HashMap<NodeId, usize> = HashMap::new();
    let mut weight_sum: HashMap<NodeId, f64> = HashMap::new();
    let mut heap = BinaryHeap::new();

    best_cost.insert(from.to_string(), 0.0);
    hops.insert(from.to_string(), 0);
    weight_sum.insert(from.to_string(), 0.0);
    heap.push(HeapEntry {
        cost: 0.0,
        node: from.to_string(),
    });

    while let Some(HeapEntry { cost, node }) = heap.pop() {
        if node == to {
            return Some((cost, hops[&node], weight_sum[&node]));
        }
        if cost > best_cost.get(&node).copied().unwrap_or(f64::MAX) {
            continue;
        }
        let current_hops = hops[&node];
        if current_hops >= MAX_HOPS {
            continue;
        }
        for neighbor in graph.out_neighbors(&node).to_vec() {
            let Some(attrs) = graph.edge(&node, &neighbor) else {
                continue;
            };
            let next_cost = cost + attrs.cost();
            let next_hops = current_hops + 1;
            if next_cost < best_cost.get(&neighbor).copied().unwrap_or(f64::MAX) {
                best_cost.insert(neighbor.clone(), next_cost);
                hops.insert(neighbor.clone(), next_hops);
                weight_sum.insert(neighbor.clone(), weight_sum[&node] + attrs.weight());
                heap.push(HeapEntry {
                    cost: next_cost,
                    node: neighbor,
                });
            }
        }
    }
    None
}

/// Hop count of the shortest path from `from` to `to`, if one exists
/// within `MAX_HOPS` edges. Exposed for dependency-path enumeration
/// (§4.8 step 6).
#[must_use]
pub fn hop_count(graph: &GraphStore, from: &str, to: &str) -> Option<usize> {
    shortest_path(graph, from, to).map(|(_, hops, _)| hops)
}

/// Build the N x N dependency matrix: `adj[i][j]` true means candidate
/// `j` depends on candidate `i` (§4.7 steps 1-2).
fn build_matrix(graph: &GraphStore, candidates: &[NodeId]) -> Vec<Vec<Option<f64>>> {
    let n = candidates.len();
    let mut matrix = vec![vec![None; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            if let Some((_, path_hops, weight_sum)) = shortest_path(graph, &candidates[i], &candidates[j]) {
                let path_len = path_hops.max(1) as f64;
                let avg_weight = weight_sum / path_len;
                matrix[i][j] = Some((1.0 / path_len) * avg_weight);
            }
        }
    }
    matrix
}

/// Break `i<->j` cycles by keeping the higher-weighted direction (§4.7
/// "Cycle breaking").
fn break_cycles(matrix: &mut [Vec<Option<f64>>]) {
    let n = matrix.len();
    for i in 0..n {
        for j in (i + 1)..n {
            if let (Some(wij), Some(wji)) = (matrix[i][j], matrix[j][i]) {
                if wij >= wji {
                    matrix[j][i] = None;
                } else {
                    matrix[i][j] = None;
                }
            }
        }
    }
}

/// Kahn's algorithm; returns an error if a cycle remains (§4.7
/// "Post-build validity").
fn topological_sort_ok(matrix: &[Vec<Option<f64>>]) -> bool {
    let n = matrix.len();
    let mut indegree = vec![0usize; n];
    for row in matrix.iter().take(n) {
        for (j, cell) in row.iter().enumerate().take(n) {
            if cell.is_some() {
                indegree[j] += 1;
            }
        }
    }
    let mut queue: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut visited = 0;
    while let Some(i) = queue.pop() {
        visited += 1;
        for j in 0..n {
            if matrix[i][j].is_some() {
                indegree[j] -= 1;
                if indegree[j] == 0 {
                    queue.push(j);
                }
            }
        }
    }
    visited == n
}

/// Build a validated DAG of tasks over `candidates`, in order. On a
/// topological-sort failure, the caller should retain `previous` (§4.7).
///
/// # Errors
///
/// Returns [`Error::CycleDetected`] if the post-cycle-breaking matrix
/// still fails to topologically sort.
pub fn build(graph: &GraphStore, candidates: &[NodeId]) -> Result<Vec<Task>> {
    let mut matrix = build_matrix(graph, candidates);
    break_cycles(&mut matrix);

    if !topological_sort_ok(&matrix) {
        return Err(Error::CycleDetected);
    }

    let tasks = candidates
        .iter()
        .enumerate()
        .map(|(j, node_id)| {
            let depends_on: Vec<String> = (0..candidates.len())
                .filter(|&i| matrix[i][j].is_some())
                .map(|i| format!("task_{i}"))
                .collect();
            Task {
                task_id: format!("task_{j}"),
                node_id: node_id.clone(),
                kind: TaskKind::Tool,
                depends_on,
            }
        })
        .collect();

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EdgeAttrs, EdgeSource, EdgeType};

    fn chain_graph() -> GraphStore {
        let mut g = GraphStore::new();
        g.add_edge("a", "b", EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 1))
            .unwrap();
        g.add_edge("b", "c", EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 1))
            .unwrap();
        g
    }

    #[test]
    fn linear_chain_produces_linear_dependencies() {
        let g = chain_graph();
        let candidates = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let tasks = build(&g, &candidates).unwrap();
        assert_eq!(tasks[0].depends_on, Vec::<String>::new());
        assert_eq!(tasks[1].depends_on, vec!["task_0".to_string()]);
        assert_eq!(tasks[2].depends_on, vec!["task_1".to_string()]);
    }

    #[test]
    fn mutual_edges_keep_only_higher_weight_direction() {
        let mut g = GraphStore::new();
        g.add_edge("a", "b", EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 1))
            .unwrap();
        g.add_edge("b", "a", EdgeAttrs::new(EdgeType::Sequence, EdgeSource::Template, 1))
            .unwrap();
        let candidates = vec!["a".to_string(), "b".to_string()];
        let tasks = build(&g, &candidates).unwrap();
        assert_eq!(tasks[1].depends_on, vec!["task_0".to_string()]);
        assert_eq!(tasks[0].depends_on, Vec::<String>::new());
    }

    #[test]
    fn path_beyond_max_hops_is_not_a_dependency() {
        let mut g = GraphStore::new();
        let chain = ["a", "b", "c", "d", "e", "f"];
        for pair in chain.windows(2) {
            g.add_edge(pair[0], pair[1], EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 1))
                .unwrap();
        }
        let candidates = vec!["a".to_string(), "f".to_string()];
        let tasks = build(&g, &candidates).unwrap();
        assert!(tasks[1].depends_on.is_empty());
    }

    #[test]
    fn disconnected_candidates_have_no_dependencies() {
        let g = GraphStore::new();
        let candidates = vec!["x".to_string(), "y".to_string()];
        let tasks = build(&g, &candidates).unwrap();
        assert!(tasks.iter().all(|t| t.depends_on.is_empty()));
    }
}
