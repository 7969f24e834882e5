//! Shallow regression trees used as the rule-generation engine.
//!
//! Trees grow best-first: the split with the largest variance reduction is
//! applied next, until the leaf budget, the depth bound or the minimum node
//! size stops growth. Columns are referenced by index into a dense column
//! store materialized once per generation run.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::rngs::StdRng;
use rand::Rng;

const MIN_SPLIT_GAIN: f64 = 1e-12;

#[derive(Clone, Debug)]
pub struct TreeParams {
    /// Minimum number of samples in each child.
    pub node_size: usize,
    /// Maximum number of leaves.
    pub max_nodes: usize,
    /// Maximum depth of any node.
    pub max_depth: usize,
    /// Number of columns considered per split (all when `None`).
    pub mtry: Option<usize>,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Leaf,
    Split {
        column: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Clone, Debug)]
pub struct TreeNode {
    pub kind: NodeKind,
    pub depth: usize,
    pub n_samples: usize,
    pub value: f64,
}

// Candidate for the priority queue (best-first by highest gain)
struct SplitCandidate {
    gain: f64,
    node_index: usize,
    column: usize,
    threshold: f64,
    left_rows: Vec<u32>,
    right_rows: Vec<u32>,
}

impl PartialEq for SplitCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.gain == other.gain
    }
}
impl Eq for SplitCandidate {}
impl PartialOrd for SplitCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        // max-heap on gain; node index breaks exact ties deterministically
        Some(
            self.gain
                .partial_cmp(&other.gain)
                .unwrap_or(Ordering::Equal)
                .then_with(|| other.node_index.cmp(&self.node_index)),
        )
    }
}
impl Ord for SplitCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap_or(Ordering::Equal)
    }
}

pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Fit a tree on the rows in `rows` (repeats allowed for bootstrap
    /// samples) against `target`, splitting over the columns of `cols`.
    pub fn fit(
        cols: &[Vec<f64>],
        target: &[f64],
        rows: &[u32],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut nodes = vec![TreeNode {
            kind: NodeKind::Leaf,
            depth: 0,
            n_samples: rows.len(),
            value: mean(target, rows),
        }];

        let mut heap: BinaryHeap<SplitCandidate> = BinaryHeap::new();
        if let Some(cand) = best_split(cols, target, rows, 0, 0, params, rng) {
            heap.push(cand);
        }

        let mut leaves = 1usize;
        while leaves < params.max_nodes {
            let Some(cand) = heap.pop() else {
                break;
            };

            let depth = nodes[cand.node_index].depth;
            let left_idx = nodes.len();
            nodes.push(TreeNode {
                kind: NodeKind::Leaf,
                depth: depth + 1,
                n_samples: cand.left_rows.len(),
                value: mean(target, &cand.left_rows),
            });
            let right_idx = nodes.len();
            nodes.push(TreeNode {
                kind: NodeKind::Leaf,
                depth: depth + 1,
                n_samples: cand.right_rows.len(),
                value: mean(target, &cand.right_rows),
            });
            nodes[cand.node_index].kind = NodeKind::Split {
                column: cand.column,
                threshold: cand.threshold,
                left: left_idx,
                right: right_idx,
            };
            leaves += 1;

            if let Some(next) =
                best_split(cols, target, &cand.left_rows, left_idx, depth + 1, params, rng)
            {
                heap.push(next);
            }
            if let Some(next) =
                best_split(cols, target, &cand.right_rows, right_idx, depth + 1, params, rng)
            {
                heap.push(next);
            }
        }

        RegressionTree { nodes }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn predict_row(&self, cols: &[Vec<f64>], row: usize) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode {
                    kind: NodeKind::Leaf,
                    value,
                    ..
                } => return *value,
                TreeNode {
                    kind:
                        NodeKind::Split {
                            column,
                            threshold,
                            left,
                            right,
                        },
                    ..
                } => {
                    idx = if cols[*column][row] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

fn mean(target: &[f64], rows: &[u32]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&i| target[i as usize]).sum::<f64>() / rows.len() as f64
}

/// Scan the (possibly subsampled) columns for the variance-minimizing split
/// of this node. Returns `None` when no admissible split exists.
fn best_split(
    cols: &[Vec<f64>],
    target: &[f64],
    rows: &[u32],
    node_index: usize,
    depth: usize,
    params: &TreeParams,
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    let m = rows.len();
    if depth >= params.max_depth || m < 2 * params.node_size {
        return None;
    }

    let candidates = sample_columns(cols.len(), params.mtry, rng);

    let total_sum: f64 = rows.iter().map(|&i| target[i as usize]).sum();
    let total_sq: f64 = rows
        .iter()
        .map(|&i| target[i as usize] * target[i as usize])
        .sum();
    let parent_sse = total_sq - total_sum * total_sum / m as f64;

    let mut best: Option<(f64, usize, f64)> = None;
    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(m);
    for &col in &candidates {
        pairs.clear();
        pairs.extend(
            rows.iter()
                .map(|&i| (cols[col][i as usize], target[i as usize])),
        );
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for i in 0..m - 1 {
            left_sum += pairs[i].1;
            left_sq += pairs[i].1 * pairs[i].1;
            if pairs[i + 1].0 <= pairs[i].0 {
                continue; // no boundary between equal values
            }
            let nl = i + 1;
            let nr = m - nl;
            if nl < params.node_size || nr < params.node_size {
                continue;
            }
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse_left = left_sq - left_sum * left_sum / nl as f64;
            let sse_right = right_sq - right_sum * right_sum / nr as f64;
            let gain = parent_sse - sse_left - sse_right;
            if gain > MIN_SPLIT_GAIN && best.map_or(true, |(g, _, _)| gain > g) {
                let threshold = (pairs[i].0 + pairs[i + 1].0) / 2.0;
                best = Some((gain, col, threshold));
            }
        }
    }

    best.map(|(gain, column, threshold)| {
        let mut left_rows = Vec::new();
        let mut right_rows = Vec::new();
        for &i in rows {
            if cols[column][i as usize] <= threshold {
                left_rows.push(i);
            } else {
                right_rows.push(i);
            }
        }
        SplitCandidate {
            gain,
            node_index,
            column,
            threshold,
            left_rows,
            right_rows,
        }
    })
}

/// Draw the column subset considered for one split, in ascending order so
/// the scan is deterministic for a fixed rng state.
fn sample_columns(p: usize, mtry: Option<usize>, rng: &mut StdRng) -> Vec<usize> {
    match mtry {
        Some(k) if k < p => {
            let mut all: Vec<usize> = (0..p).collect();
            for i in 0..k {
                let j = rng.random_range(i..p);
                all.swap(i, j);
            }
            let mut picked = all[..k].to_vec();
            picked.sort_unstable();
            picked
        }
        _ => (0..p).collect(),
    }
}
