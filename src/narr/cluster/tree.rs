use std::collections::BTreeSet;

use super::{hdbscan::Merge, params::ClusterSelectionMethod};
use crate::narr::{
    error::ClusterError,
    model::{ClusterAssignment, ClusterLabel},
};

/// One row of the condensed tree. `child < n_points` is a point falling out
/// of `parent`; otherwise `child` is a cluster split off from `parent`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CondensedEdge {
    pub parent: usize,
    pub child: usize,
    pub lambda: f64,
    pub child_size: usize,
}

/// The dendrogram with every branch smaller than the minimum cluster size
/// collapsed into its parent. Cluster nodes are numbered from `n_points`
/// (the root) upwards.
#[derive(Debug, Clone)]
pub(crate) struct CondensedTree {
    n_points: usize,
    n_clusters: usize,
    edges: Vec<CondensedEdge>,
    /// Lambda at which each cluster node was born; 0 for the root.
    birth: Vec<f64>,
    cluster_parent: Vec<Option<usize>>,
    cluster_children: Vec<Vec<usize>>,
}

fn lambda_of(distance: f64) -> f64 {
    if distance > 0.0 {
        1.0 / distance
    } else {
        f64::INFINITY
    }
}

/// Every dendrogram node under `root`, breadth first, `root` included.
fn bfs_hierarchy(hierarchy: &[Merge], n_points: usize, root: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut frontier = vec![root];
    while !frontier.is_empty() {
        out.extend_from_slice(&frontier);
        frontier = frontier
            .iter()
            .filter(|&&node| node >= n_points)
            .flat_map(|&node| {
                let merge = &hierarchy[node - n_points];
                [merge.left, merge.right]
            })
            .collect();
    }
    out
}

impl CondensedTree {
    /// Build from a single-linkage dendrogram over `hierarchy.len() + 1` points.
    pub fn from_hierarchy(hierarchy: &[Merge], min_cluster_size: usize) -> Self {
        let n_points = hierarchy.len() + 1;
        let root = 2 * hierarchy.len();
        let mut relabel = vec![0usize; root + 1];
        relabel[root] = n_points;
        let mut next_label = n_points + 1;
        let mut ignore = vec![false; root + 1];
        let mut edges = Vec::new();

        let size_of = |node: usize| {
            if node >= n_points {
                hierarchy[node - n_points].size
            } else {
                1
            }
        };

        for node in bfs_hierarchy(hierarchy, n_points, root) {
            if node < n_points || ignore[node] {
                continue;
            }
            let merge = hierarchy[node - n_points];
            let lambda = lambda_of(merge.distance);
            let parent = relabel[node];
            let (left, right) = (merge.left, merge.right);
            let (left_count, right_count) = (size_of(left), size_of(right));

            let mut shed = |sub_root: usize, edges: &mut Vec<CondensedEdge>| {
                for sub in bfs_hierarchy(hierarchy, n_points, sub_root) {
                    if sub < n_points {
                        edges.push(CondensedEdge {
                            parent,
                            child: sub,
                            lambda,
                            child_size: 1,
                        });
                    }
                    ignore[sub] = true;
                }
            };

            match (
                left_count >= min_cluster_size,
                right_count >= min_cluster_size,
            ) {
                (true, true) => {
                    for (child, count) in [(left, left_count), (right, right_count)] {
                        relabel[child] = next_label;
                        next_label += 1;
                        edges.push(CondensedEdge {
                            parent,
                            child: relabel[child],
                            lambda,
                            child_size: count,
                        });
                    }
                }
                (false, false) => {
                    shed(left, &mut edges);
                    shed(right, &mut edges);
                }
                (false, true) => {
                    relabel[right] = parent;
                    shed(left, &mut edges);
                }
                (true, false) => {
                    relabel[left] = parent;
                    shed(right, &mut edges);
                }
            }
        }

        let n_clusters = next_label - n_points;
        let mut birth = vec![0.0; n_clusters];
        let mut cluster_parent = vec![None; n_clusters];
        let mut cluster_children = vec![Vec::new(); n_clusters];
        for edge in edges.iter().filter(|e| e.child >= n_points) {
            birth[edge.child - n_points] = edge.lambda;
            cluster_parent[edge.child - n_points] = Some(edge.parent);
            cluster_children[edge.parent - n_points].push(edge.child);
        }

        Self {
            n_points,
            n_clusters,
            edges,
            birth,
            cluster_parent,
            cluster_children,
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    fn root(&self) -> usize {
        self.n_points
    }

    fn idx(&self, node: usize) -> usize {
        node - self.n_points
    }

    fn has_cluster_edges(&self) -> bool {
        self.edges.iter().any(|e| e.child >= self.n_points)
    }

    /// Excess of mass of every cluster node, indexed by `node - n_points`.
    pub fn stability(&self) -> Vec<f64> {
        let mut stability = vec![0.0; self.n_clusters];
        for edge in &self.edges {
            let born = self.birth[self.idx(edge.parent)];
            // both infinite for duplicate points; they contribute nothing
            let persistence = if edge.lambda == born {
                0.0
            } else {
                edge.lambda - born
            };
            stability[self.idx(edge.parent)] += persistence * edge.child_size as f64;
        }
        stability
    }

    /// Cluster nodes strictly below `node`.
    fn descendants(&self, node: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = self.cluster_children[self.idx(node)].clone();
        while let Some(next) = stack.pop() {
            stack.extend(self.cluster_children[self.idx(next)].iter().copied());
            out.push(next);
        }
        out
    }

    fn leaves(&self) -> BTreeSet<usize> {
        if !self.has_cluster_edges() {
            return BTreeSet::new();
        }
        let mut leaves = BTreeSet::new();
        let mut stack = vec![self.root()];
        while let Some(node) = stack.pop() {
            let children = &self.cluster_children[self.idx(node)];
            if children.is_empty() {
                leaves.insert(node);
            } else {
                stack.extend(children.iter().copied());
            }
        }
        leaves
    }

    /// Pick the flat clustering. Returns selected cluster node ids.
    pub fn select_clusters(
        &self,
        method: ClusterSelectionMethod,
        epsilon: f64,
        allow_single_cluster: bool,
    ) -> BTreeSet<usize> {
        match method {
            ClusterSelectionMethod::ExcessOfMass => {
                self.select_excess_of_mass(epsilon, allow_single_cluster)
            }
            ClusterSelectionMethod::Leaf => self.select_leaves(epsilon, allow_single_cluster),
        }
    }

    fn select_excess_of_mass(&self, epsilon: f64, allow_single_cluster: bool) -> BTreeSet<usize> {
        let root = self.root();
        let mut stability = self.stability();
        let mut is_cluster = vec![true; self.n_clusters];
        is_cluster[0] = allow_single_cluster;

        let first = if allow_single_cluster { root } else { root + 1 };
        for node in (first..root + self.n_clusters).rev() {
            let subtree: f64 = self.cluster_children[self.idx(node)]
                .iter()
                .map(|child| stability[self.idx(*child)])
                .sum();
            if subtree > stability[self.idx(node)] {
                is_cluster[self.idx(node)] = false;
                stability[self.idx(node)] = subtree;
            } else {
                for sub in self.descendants(node) {
                    is_cluster[self.idx(sub)] = false;
                }
            }
        }

        let selected = (0..self.n_clusters)
            .filter(|i| is_cluster[*i])
            .map(|i| i + root)
            .collect::<BTreeSet<usize>>();

        if epsilon == 0.0 || !self.has_cluster_edges() {
            return selected;
        }
        if selected.len() == 1 && selected.contains(&root) {
            return if allow_single_cluster {
                selected
            } else {
                BTreeSet::new()
            };
        }
        self.epsilon_search(&selected, epsilon, allow_single_cluster)
    }

    fn select_leaves(&self, epsilon: f64, allow_single_cluster: bool) -> BTreeSet<usize> {
        let leaves = self.leaves();
        if leaves.is_empty() {
            return if allow_single_cluster {
                BTreeSet::from([self.root()])
            } else {
                BTreeSet::new()
            };
        }
        if epsilon == 0.0 {
            leaves
        } else {
            self.epsilon_search(&leaves, epsilon, allow_single_cluster)
        }
    }

    /// Replace candidates born below `epsilon` with their closest ancestor
    /// born above it.
    fn epsilon_search(
        &self,
        candidates: &BTreeSet<usize>,
        epsilon: f64,
        allow_single_cluster: bool,
    ) -> BTreeSet<usize> {
        let mut selected = BTreeSet::new();
        let mut processed = BTreeSet::new();
        for &candidate in candidates {
            let candidate_eps = 1.0 / self.birth[self.idx(candidate)];
            if candidate_eps < epsilon {
                if processed.contains(&candidate) {
                    continue;
                }
                let chosen = self.traverse_upwards(candidate, epsilon, allow_single_cluster);
                selected.insert(chosen);
                processed.extend(self.descendants(chosen));
            } else {
                selected.insert(candidate);
            }
        }
        selected
    }

    fn traverse_upwards(&self, leaf: usize, epsilon: f64, allow_single_cluster: bool) -> usize {
        let root = self.root();
        let mut node = leaf;
        while let Some(parent) = self.cluster_parent[self.idx(node)] {
            if parent == root {
                return if allow_single_cluster { parent } else { node };
            }
            if 1.0 / self.birth[self.idx(parent)] > epsilon {
                return parent;
            }
            node = parent;
        }
        node
    }

    /// Label every point with its nearest selected ancestor, or noise.
    pub fn label_points(
        &self,
        selected: &BTreeSet<usize>,
        allow_single_cluster: bool,
        epsilon: f64,
    ) -> Result<ClusterAssignment, ClusterError> {
        let root = self.root();
        let total = self.n_points + self.n_clusters;
        let mut parent_of = vec![None; total];
        let mut point_lambda = vec![0.0; self.n_points];
        for edge in &self.edges {
            parent_of[edge.child] = Some(edge.parent);
            if edge.child < self.n_points {
                point_lambda[edge.child] = edge.lambda;
            }
        }
        let root_max_lambda = self
            .edges
            .iter()
            .filter(|e| e.parent == root)
            .map(|e| e.lambda)
            .fold(f64::NEG_INFINITY, f64::max);
        let only_root = allow_single_cluster && selected.len() == 1 && selected.contains(&root);

        let label_for = |node: usize| {
            selected
                .iter()
                .position(|c| *c == node)
                .and_then(|pos| i32::try_from(pos).ok())
                .map(ClusterLabel::from)
                .unwrap_or(ClusterLabel::NOISE)
        };

        (0..self.n_points)
            .map(|point| {
                let missing =
                    || ClusterError::failure(format!("point {} is missing from the tree", point));
                let mut node = parent_of[point].ok_or_else(missing)?;
                while node != root && !selected.contains(&node) {
                    node = parent_of[node].ok_or_else(missing)?;
                }
                if node != root {
                    return Ok(label_for(node));
                }
                if !only_root {
                    return Ok(ClusterLabel::NOISE);
                }
                let threshold = if epsilon != 0.0 {
                    1.0 / epsilon
                } else {
                    root_max_lambda
                };
                Ok(if point_lambda[point] >= threshold {
                    label_for(root)
                } else {
                    ClusterLabel::NOISE
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge(left: usize, right: usize, distance: f64, size: usize) -> Merge {
        Merge {
            left,
            right,
            distance,
            size,
        }
    }

    /// Points 0..4 on a line at 0, 1, 10, 11.
    fn two_pairs() -> Vec<Merge> {
        vec![
            merge(0, 1, 1.0, 2),
            merge(2, 3, 1.0, 2),
            merge(4, 5, 9.0, 4),
        ]
    }

    #[test]
    fn test_condense_splits_into_two_clusters() {
        let tree = CondensedTree::from_hierarchy(&two_pairs(), 2);
        assert_eq!(tree.n_clusters, 3);
        let cluster_edges = tree
            .edges
            .iter()
            .filter(|e| e.child >= 4)
            .collect::<Vec<_>>();
        assert_eq!(cluster_edges.len(), 2);
        assert!(cluster_edges.iter().all(|e| e.parent == 4 && e.child_size == 2));
        assert_eq!(tree.len(), 6);
    }

    #[test]
    fn test_condense_collapses_small_branches() {
        let tree = CondensedTree::from_hierarchy(&two_pairs(), 3);
        assert_eq!(tree.n_clusters, 1);
        assert!(tree.edges.iter().all(|e| e.parent == 4 && e.child < 4));
        assert!(tree.edges.iter().all(|e| (e.lambda - 1.0 / 9.0).abs() < 1e-12));
    }

    #[test]
    fn test_stability() {
        let tree = CondensedTree::from_hierarchy(&two_pairs(), 2);
        let stability = tree.stability();
        let root_split = 1.0 / 9.0;
        assert!((stability[0] - root_split * 4.0).abs() < 1e-12);
        assert!((stability[1] - (1.0 - root_split) * 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_selection_and_labels() {
        let tree = CondensedTree::from_hierarchy(&two_pairs(), 2);
        let selected = tree.select_clusters(ClusterSelectionMethod::ExcessOfMass, 0.0, false);
        assert_eq!(selected, BTreeSet::from([5, 6]));
        let labels = tree.label_points(&selected, false, 0.0).unwrap();
        assert_eq!(
            labels.to_vec(),
            [0, 0, 1, 1].map(ClusterLabel::from).to_vec()
        );
    }

    #[test]
    fn test_leaf_without_leaves() {
        let tree = CondensedTree::from_hierarchy(&two_pairs(), 3);
        assert!(
            tree.select_clusters(ClusterSelectionMethod::Leaf, 0.0, false)
                .is_empty()
        );
        assert_eq!(
            tree.select_clusters(ClusterSelectionMethod::Leaf, 0.0, true),
            BTreeSet::from([4])
        );
    }

    #[test]
    fn test_epsilon_reaches_root_only_when_single_allowed() {
        let tree = CondensedTree::from_hierarchy(&two_pairs(), 2);
        let kept = tree.select_clusters(ClusterSelectionMethod::ExcessOfMass, 20.0, false);
        assert_eq!(kept, BTreeSet::from([5, 6]));
        let merged = tree.select_clusters(ClusterSelectionMethod::Leaf, 20.0, true);
        assert_eq!(merged, BTreeSet::from([4]));
        let labels = tree.label_points(&merged, true, 20.0).unwrap();
        assert!(labels.iter().all(|l| *l == ClusterLabel::from(0)));
    }
}
