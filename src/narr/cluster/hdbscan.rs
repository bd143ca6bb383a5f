//! Explicit HDBSCAN over a dense distance matrix.
//!
//! Steps:
//! 1. Pairwise distances (parallel by row).
//! 2. Core distances: distance to the `min_samples`-th nearest other point.
//! 3. Mutual reachability: `max(core(a), core(b), d(a, b) / alpha)`.
//! 4. Minimum spanning tree with Prim's algorithm.
//! 5. Single-linkage dendrogram via union-find.
//! 6. Condensed tree, stability, flat selection and labelling (see [`super::tree`]).

use ndarray::Array2;
use rayon::prelude::*;
use tracing::debug;

use super::{
    Clusterer, PreparedMatrix,
    params::{DistanceMetric, HdbscanParams},
    tree::CondensedTree,
};
use crate::narr::{
    error::ClusterError,
    model::{ClusterAssignment, ClusteringOutcome, FeatureVectors},
};

/// Weighted edge of the minimum spanning tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Edge {
    pub a: usize,
    pub b: usize,
    pub weight: f64,
}

impl Edge {
    fn endpoints(&self) -> (usize, usize) {
        (self.a.min(self.b), self.a.max(self.b))
    }
}

/// One row of the single-linkage dendrogram. Nodes `< n` are points, node
/// `n + i` is the cluster created by row `i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub size: usize,
}

/// The primary density clusterer.
#[derive(Debug, Clone, Default)]
pub struct HdbscanClusterer {
    params: HdbscanParams,
}

impl HdbscanClusterer {
    pub fn new(params: HdbscanParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &HdbscanParams {
        &self.params
    }

    fn fit(&self, data: &Array2<f64>) -> Result<ClusterAssignment, ClusterError> {
        let params = &self.params;
        let n = data.nrows();
        let condense_size = params.min_cluster_size.max(2);

        let distances = pairwise_distances(data, params.metric)?;
        let core = core_distances(&distances, params.effective_min_samples());
        let mst = minimum_spanning_tree(&distances, &core, params.alpha)?;
        let hierarchy = single_linkage(&mst, n)?;
        let tree = CondensedTree::from_hierarchy(&hierarchy, condense_size);

        let selected = tree.select_clusters(
            params.cluster_selection_method,
            params.cluster_selection_epsilon,
            params.allow_single_cluster,
        );
        debug!(
            points = n,
            condensed_edges = tree.len(),
            selected = selected.len(),
            "condensed tree built"
        );
        tree.label_points(
            &selected,
            params.allow_single_cluster,
            params.cluster_selection_epsilon,
        )
    }
}

impl Clusterer for HdbscanClusterer {
    fn name(&self) -> &'static str {
        "hdbscan"
    }

    fn cluster(&self, vectors: &FeatureVectors) -> Result<ClusteringOutcome, ClusterError> {
        self.params.validate()?;
        let prepared = PreparedMatrix::new(vectors, self.params.metric)?;
        let n = prepared.len();

        if n < self.params.min_cluster_size.max(2) {
            debug!(
                points = n,
                min_cluster_size = self.params.min_cluster_size,
                "too few points to form a cluster"
            );
            return Ok(prepared.all_noise());
        }

        let fitted = ClusteringOutcome::from_labels(self.fit(&prepared.data)?);
        if !self.params.allow_single_cluster && fitted.n_clusters == 1 && fitted.n_noise == 0 {
            debug!(points = n, "single cluster rejected");
            return Ok(prepared.all_noise());
        }
        Ok(ClusteringOutcome::from_labels(prepared.restore(fitted.labels)))
    }
}

/// Full `n × n` distance matrix. Rows are computed in parallel; each cell
/// depends only on its two rows, so the result doesn't depend on scheduling.
pub(crate) fn pairwise_distances(
    data: &Array2<f64>,
    metric: DistanceMetric,
) -> Result<Array2<f64>, ClusterError> {
    let n = data.nrows();
    let rows = data
        .outer_iter()
        .map(|r| r.to_vec())
        .collect::<Vec<Vec<f64>>>();
    let flat = rows
        .par_iter()
        .enumerate()
        .flat_map_iter(|(i, a)| {
            rows.iter()
                .enumerate()
                .map(move |(j, b)| if i == j { 0.0 } else { metric.distance(a, b) })
        })
        .collect::<Vec<f64>>();
    Array2::from_shape_vec((n, n), flat).map_err(|e| ClusterError::failure(e.to_string()))
}

/// Distance from every point to its `min_samples`-th nearest other point,
/// with `min_samples` capped at `n - 1`.
pub(crate) fn core_distances(distances: &Array2<f64>, min_samples: usize) -> Vec<f64> {
    let n = distances.nrows();
    let k = min_samples.min(n.saturating_sub(1));
    if k == 0 {
        return vec![0.0; n];
    }
    (0..n)
        .into_par_iter()
        .map(|i| {
            let mut others = distances
                .row(i)
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, d)| *d)
                .collect::<Vec<f64>>();
            others.sort_by(f64::total_cmp);
            others.get(k - 1).copied().unwrap_or(0.0)
        })
        .collect()
}

fn mutual_reachability(
    distances: &Array2<f64>,
    core: &[f64],
    alpha: f64,
    i: usize,
    j: usize,
) -> f64 {
    (distances[[i, j]] / alpha).max(core[i]).max(core[j])
}

/// Prim's algorithm over the implicit mutual-reachability graph, starting at
/// point 0. Ties go to the lowest index. Returns the `n - 1` edges sorted by
/// weight, then by endpoints.
pub(crate) fn minimum_spanning_tree(
    distances: &Array2<f64>,
    core: &[f64],
    alpha: f64,
) -> Result<Vec<Edge>, ClusterError> {
    let n = core.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut source = vec![0usize; n];
    let mut edges = Vec::with_capacity(n - 1);

    let mut current = 0;
    in_tree[current] = true;
    for _ in 1..n {
        let mut next: Option<usize> = None;
        for j in 0..n {
            if in_tree[j] {
                continue;
            }
            let d = mutual_reachability(distances, core, alpha, current, j);
            if d < best[j] {
                best[j] = d;
                source[j] = current;
            }
            match next {
                Some(k) if best[j] >= best[k] => {}
                _ => next = Some(j),
            }
        }
        let Some(next) = next else { break };
        in_tree[next] = true;
        edges.push(Edge {
            a: source[next],
            b: next,
            weight: best[next],
        });
        current = next;
    }

    if edges.len() != n - 1 {
        return Err(ClusterError::failure(format!(
            "spanning tree has {} edges, expected {}",
            edges.len(),
            n - 1
        )));
    }
    edges.sort_by(|x, y| {
        x.weight
            .total_cmp(&y.weight)
            .then_with(|| x.endpoints().cmp(&y.endpoints()))
    });
    Ok(edges)
}

struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
    next_label: usize,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        let total = (2 * n).saturating_sub(1);
        Self {
            parent: (0..total).collect(),
            size: (0..total).map(|i| usize::from(i < n)).collect(),
            next_label: n,
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    /// Merge two roots under a fresh label and return the merged size.
    fn union(&mut self, a: usize, b: usize) -> usize {
        let label = self.next_label;
        self.parent[a] = label;
        self.parent[b] = label;
        self.size[label] = self.size[a] + self.size[b];
        self.next_label += 1;
        self.size[label]
    }
}

/// Turn sorted spanning-tree edges into a single-linkage dendrogram.
pub(crate) fn single_linkage(edges: &[Edge], n: usize) -> Result<Vec<Merge>, ClusterError> {
    let mut components = UnionFind::new(n);
    edges
        .iter()
        .map(|edge| {
            let left = components.find(edge.a);
            let right = components.find(edge.b);
            if left == right {
                return Err(ClusterError::failure(format!(
                    "edge {}-{} closes a cycle",
                    edge.a, edge.b
                )));
            }
            let size = components.union(left, right);
            Ok(Merge {
                left,
                right,
                distance: edge.weight,
                size,
            })
        })
        .collect()
}
