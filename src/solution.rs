//! Solution selector (spec §4.7): a compatibility graph over candidate
//! systems, a lazy Bron-Kerbosch-with-pivoting maximal-clique iterator, and
//! deterministic selection/sorting of the best solutions.

use std::collections::BTreeSet;

use petgraph::graph::{NodeIndex, UnGraph};

use crate::system::System;

const SCORE_EPSILON: f64 = 1e-9;

/// Undirected graph of systems, edge iff the two systems share no `CoreHit`
/// (spec §4.7 step 1). Built with `petgraph`; clique search runs over an
/// adjacency-set view derived from the graph's own neighbor iterators.
pub struct CompatibilityGraph {
    pub graph: UnGraph<usize, ()>,
    adjacency: Vec<BTreeSet<usize>>,
}

impl CompatibilityGraph {
    pub fn build(systems: &[System]) -> Self {
        let mut graph = UnGraph::<usize, ()>::with_capacity(systems.len(), 0);
        let nodes: Vec<_> = (0..systems.len()).map(|i| graph.add_node(i)).collect();
        for i in 0..systems.len() {
            for j in (i + 1)..systems.len() {
                if systems[i].is_compatible(&systems[j]) {
                    graph.add_edge(nodes[i], nodes[j], ());
                }
            }
        }
        // `add_node` was called once per index in order, so `NodeIndex::new(i)`
        // is exactly node `i`; read adjacency back off the graph itself rather
        // than tracking it separately.
        let adjacency = (0..systems.len())
            .map(|i| graph.neighbors(NodeIndex::new(i)).map(|n| n.index()).collect())
            .collect();
        Self { graph, adjacency }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// A lazy, allocation-light stream of maximal cliques (Design Notes §9:
    /// "produces a lazy sequence of cliques... not restartable").
    pub fn cliques(&self) -> CliqueIter {
        CliqueIter::new(self.adjacency.clone())
    }
}

struct Frame {
    r: Vec<usize>,
    candidates: Vec<usize>,
    idx: usize,
    p: BTreeSet<usize>,
    x: BTreeSet<usize>,
}

/// Bron-Kerbosch with pivoting, reified as an explicit-stack iterator so
/// cliques are produced one at a time instead of all materialized upfront.
pub struct CliqueIter {
    adjacency: Vec<BTreeSet<usize>>,
    stack: Vec<Frame>,
}

fn branch_candidates(p: &BTreeSet<usize>, x: &BTreeSet<usize>, adjacency: &[BTreeSet<usize>]) -> Vec<usize> {
    let pivot = p
        .iter()
        .chain(x.iter())
        .max_by_key(|&&v| p.intersection(&adjacency[v]).count());
    match pivot {
        Some(&pivot) => p.difference(&adjacency[pivot]).cloned().collect(),
        None => Vec::new(),
    }
}

impl CliqueIter {
    fn new(adjacency: Vec<BTreeSet<usize>>) -> Self {
        let p: BTreeSet<usize> = (0..adjacency.len()).collect();
        let x = BTreeSet::new();
        let candidates = branch_candidates(&p, &x, &adjacency);
        let frame = Frame {
            r: Vec::new(),
            candidates,
            idx: 0,
            p,
            x,
        };
        Self {
            adjacency,
            stack: vec![frame],
        }
    }
}

impl Iterator for CliqueIter {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        loop {
            let frame = self.stack.last_mut()?;
            if frame.idx >= frame.candidates.len() {
                self.stack.pop();
                continue;
            }
            let v = frame.candidates[frame.idx];
            frame.idx += 1;

            let mut r = frame.r.clone();
            r.push(v);
            let p_new: BTreeSet<usize> = frame.p.intersection(&self.adjacency[v]).cloned().collect();
            let x_new: BTreeSet<usize> = frame.x.intersection(&self.adjacency[v]).cloned().collect();

            frame.p.remove(&v);
            frame.x.insert(v);

            if p_new.is_empty() && x_new.is_empty() {
                return Some(r);
            }
            if p_new.is_empty() {
                // `x_new` non-empty: some already-excluded vertex would
                // extend `r`, so it is not maximal. Keep backtracking.
                continue;
            }
            let candidates = branch_candidates(&p_new, &x_new, &self.adjacency);
            self.stack.push(Frame {
                r,
                candidates,
                idx: 0,
                p: p_new,
                x: x_new,
            });
        }
    }
}

/// A mutually-compatible set of systems (spec §3).
#[derive(Debug, Clone)]
pub struct Solution {
    pub systems: Vec<System>,
    pub score: f64,
    pub average_wholeness: f64,
    pub hits_number: usize,
    pub hits_positions: Vec<i32>,
}

impl Solution {
    fn from_systems(mut systems: Vec<System>) -> Self {
        systems.sort_by(|a, b| {
            a.hit_positions()
                .cmp(&b.hit_positions())
                .then_with(|| a.model_fqn.cmp(&b.model_fqn))
                .then_with(|| b.score.total_cmp(&a.score))
        });
        let score: f64 = systems.iter().map(|s| s.score).sum();
        let average_wholeness = if systems.is_empty() {
            0.0
        } else {
            systems.iter().map(|s| s.wholeness).sum::<f64>() / systems.len() as f64
        };
        let hits_number: usize = systems.iter().map(|s| s.hit_ids().len()).sum();
        let mut hits_positions: Vec<i32> = systems.iter().flat_map(|s| s.hit_positions()).collect();
        hits_positions.sort_unstable();
        Self {
            systems,
            score,
            average_wholeness,
            hits_number,
            hits_positions,
        }
    }
}

/// Enumerate maximal cliques, keep only those reaching the running-maximum
/// aggregate score, then sort the survivors deterministically (spec §4.7).
pub fn find_best_solutions(systems: Vec<System>) -> Vec<Solution> {
    if systems.is_empty() {
        return Vec::new();
    }

    let graph = CompatibilityGraph::build(&systems);
    let mut best_score = f64::NEG_INFINITY;
    let mut kept: Vec<Vec<usize>> = Vec::new();

    for clique in graph.cliques() {
        let score: f64 = clique.iter().map(|&i| systems[i].score).sum();
        if score > best_score + SCORE_EPSILON {
            best_score = score;
            kept.clear();
            kept.push(clique);
        } else if (score - best_score).abs() <= SCORE_EPSILON {
            kept.push(clique);
        }
    }

    let mut solutions: Vec<Solution> = kept
        .into_iter()
        .map(|indices| Solution::from_systems(indices.into_iter().map(|i| systems[i].clone()).collect()))
        .collect();

    solutions.sort_by(|a, b| {
        b.hits_number
            .cmp(&a.hits_number)
            .then_with(|| b.systems.len().cmp(&a.systems.len()))
            .then_with(|| b.average_wholeness.total_cmp(&a.average_wholeness))
            .then_with(|| b.hits_positions.cmp(&a.hits_positions))
    });

    solutions
}
