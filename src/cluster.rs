//! Cluster construction: colocation, the distance-only sweep with circular
//! stitching, key-gene splitting, and true-loner extraction (spec §4.1-4.4).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::err::MacsyError;
use crate::hit::{
    best_hit, dedup_by_position, sort_model_hits, BestHitCriterion, HitRecord, HitWeight, ModelHit,
};
use crate::model::gene::{GeneArena, GeneStatus};
use crate::model::Model;
use crate::replicon::RepliconInfo;

/// Explicit id-generation context shared across a detection run (spec §9:
/// "forbid process-wide singletons" — this is passed by reference, never a
/// `static`).
#[derive(Debug, Default)]
pub struct ClusterIdGen(AtomicUsize);

impl ClusterIdGen {
    pub fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    pub fn next(&self) -> usize {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// An ordered sequence of hits sharing one replicon and one model (spec §3).
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: usize,
    pub model_fqn: String,
    pub replicon_name: String,
    pub hits: Vec<ModelHit>,
}

impl Cluster {
    pub fn new(id: usize, model: &Model, replicon_name: impl Into<String>, hits: Vec<ModelHit>) -> Self {
        Self {
            id,
            model_fqn: model.fqn.clone(),
            replicon_name: replicon_name.into(),
            hits,
        }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// The set of functional names (`alternate_of(gene_ref).name`) covered
    /// by this cluster's hits.
    pub fn functions(&self, genes: &GeneArena) -> BTreeSet<String> {
        self.hits
            .iter()
            .map(|h| genes.function_name(h.gene_ref()).to_owned())
            .collect()
    }

    pub fn fulfilled_function(&self, genes: &GeneArena, function: &str) -> bool {
        self.hits
            .iter()
            .any(|h| genes.function_name(h.gene_ref()) == function)
    }

    pub fn count_function(&self, genes: &GeneArena, function: &str) -> usize {
        self.hits
            .iter()
            .filter(|h| genes.function_name(h.gene_ref()) == function)
            .count()
    }

    /// `Σ_f max{weight(h) | h ∈ c, function(h) == f}` (spec §4.6, §8).
    pub fn score(&self, genes: &GeneArena, weights: &HitWeight) -> Result<f64, MacsyError> {
        let mut best_per_function: HashMap<String, f64> = HashMap::new();
        for h in &self.hits {
            let gene = genes.get(h.gene_ref());
            let base = match h.status() {
                GeneStatus::Mandatory => weights.mandatory,
                GeneStatus::Accessory => weights.accessory,
                GeneStatus::Neutral => weights.neutral,
                GeneStatus::Forbidden => {
                    return Err(MacsyError::ForbiddenHitScored {
                        hit_id: h.as_core_hit().hit_id.clone(),
                        gene: gene.name().to_owned(),
                    })
                }
            };
            let mut value = base * if gene.is_exchangeable() { weights.exchangeable } else { weights.itself };
            if self.hits.len() == 1 {
                value *= h.score_multiplier(weights);
            }
            let function = genes.function_name(h.gene_ref()).to_owned();
            best_per_function
                .entry(function)
                .and_modify(|cur| {
                    if value > *cur {
                        *cur = value;
                    }
                })
                .or_insert(value);
        }
        Ok(best_per_function.values().sum())
    }

    /// Merge `other`'s hits in front of `self`'s, in place (used by circular
    /// stitching, spec §4.2 step 4).
    pub fn merge_front(&mut self, other: Cluster) -> Result<(), MacsyError> {
        if self.model_fqn != other.model_fqn {
            return Err(MacsyError::ClusterModelMismatch {
                a: self.model_fqn.clone(),
                b: other.model_fqn,
            });
        }
        let mut merged = other.hits;
        merged.append(&mut self.hits);
        self.hits = merged;
        Ok(())
    }
}

/// Per-pair colocation predicate (spec §4.1).
pub fn colocates(h1: &ModelHit, h2: &ModelHit, model: &Model, genes: &GeneArena, replicon: &RepliconInfo) -> bool {
    let g1 = genes.get(h1.gene_ref());
    let g2 = genes.get(h2.gene_ref());
    let limit = match (g1.inter_gene_max_space, g2.inter_gene_max_space) {
        (None, None) => model.inter_gene_max_space,
        (Some(d), None) | (None, Some(d)) => d,
        (Some(d1), Some(d2)) => d1.min(d2),
    };

    let p1 = h1.as_core_hit().position;
    let p2 = h2.as_core_hit().position;
    let dist = p2 - p1 - 1;

    if (0..=limit).contains(&dist) {
        return true;
    }
    if replicon.is_circular() && dist <= 0 {
        let wrapped = (replicon.max_pos - p1) + (p2 - replicon.min_pos);
        return wrapped <= limit;
    }
    false
}

/// Turn a candidate scaffold into a `Cluster`, or discard it (spec §4.2).
///
/// The loner-gating vs. neutral-only check order below is load-bearing: the
/// loner branch is tested *before* the neutral check, mirroring the
/// specification's stated order rather than a "cleaner" reordering (see the
/// Design Notes open question on this exact point).
pub fn scaffold_to_cluster(
    scaffold: Vec<ModelHit>,
    model: &Model,
    genes: &GeneArena,
    replicon_name: &str,
    idgen: &ClusterIdGen,
) -> Option<Cluster> {
    if scaffold.is_empty() {
        return None;
    }
    let distinct_genes: BTreeSet<&str> = scaffold.iter().map(|h| genes.get(h.gene_ref()).name()).collect();

    if distinct_genes.len() > 1 {
        let all_neutral = scaffold.iter().all(|h| h.status() == GeneStatus::Neutral);
        if all_neutral {
            None
        } else {
            Some(Cluster::new(idgen.next(), model, replicon_name, scaffold))
        }
    } else {
        let gene = genes.get(scaffold[0].gene_ref());
        if gene.loner {
            Some(Cluster::new(idgen.next(), model, replicon_name, scaffold))
        } else if model.effective_min_genes() == 1 && scaffold[0].status() != GeneStatus::Neutral {
            Some(Cluster::new(idgen.next(), model, replicon_name, scaffold))
        } else {
            None
        }
    }
}

/// Sweep sorted, deduplicated hits into clusters, then stitch across the
/// replicon origin when circular (spec §4.2).
pub fn clusterize_hits_on_distance_only(
    hits: Vec<ModelHit>,
    model: &Model,
    genes: &GeneArena,
    replicon: &RepliconInfo,
    idgen: &ClusterIdGen,
) -> Vec<Cluster> {
    if hits.is_empty() {
        return Vec::new();
    }

    let mut hits = hits;
    sort_model_hits(&mut hits);
    let hits = dedup_by_position(hits);

    let mut clusters: Vec<Cluster> = Vec::new();
    let mut scaffold: Vec<ModelHit> = vec![hits[0].clone()];

    for i in 1..hits.len() {
        let prev = &hits[i - 1];
        let next = &hits[i];
        if colocates(prev, next, model, genes, replicon) {
            scaffold.push(next.clone());
        } else {
            if let Some(c) = scaffold_to_cluster(scaffold, model, genes, &replicon.name, idgen) {
                clusters.push(c);
            }
            scaffold = vec![next.clone()];
        }
    }

    // `scaffold` now holds the final, possibly-dangling group of hits; its
    // fate (merged, extended-and-closed, or closed on its own) is decided by
    // `stitch_circular` below rather than here, so it is never double-counted.
    if replicon.is_circular() && !clusters.is_empty() {
        stitch_circular(&mut clusters, scaffold, &hits, model, genes, replicon, idgen);
    } else if let Some(c) = scaffold_to_cluster(scaffold, model, genes, &replicon.name, idgen) {
        clusters.push(c);
    }

    clusters
}

/// Circular stitching (spec §4.2 step 4). The dangling-scaffold handling is
/// an if/else-if pair that stops at the first match; the last-cluster vs.
/// first-cluster merge that follows runs unconditionally afterwards,
/// regardless of whether the dangling scaffold closed (see DESIGN.md).
fn stitch_circular(
    clusters: &mut Vec<Cluster>,
    last_scaffold: Vec<ModelHit>,
    all_hits: &[ModelHit],
    model: &Model,
    genes: &GeneArena,
    replicon: &RepliconInfo,
    idgen: &ClusterIdGen,
) {
    let mut consumed = false;
    if let Some(tail) = last_scaffold.last().cloned() {
        let first_head = clusters[0].hits.first().cloned();
        let matched_head = first_head
            .as_ref()
            .is_some_and(|head| colocates(&tail, head, model, genes, replicon));
        if matched_head {
            let mut merged = last_scaffold.clone();
            merged.append(&mut clusters[0].hits);
            clusters[0].hits = merged;
            consumed = true;
        } else {
            let very_first = &all_hits[0];
            if colocates(&tail, very_first, model, genes, replicon) {
                let mut extended = last_scaffold.clone();
                extended.push(very_first.clone());
                if let Some(c) = scaffold_to_cluster(extended, model, genes, &replicon.name, idgen) {
                    clusters.push(c);
                }
                consumed = true;
            }
        }
    }

    if !consumed {
        if let Some(c) = scaffold_to_cluster(last_scaffold, model, genes, &replicon.name, idgen) {
            clusters.push(c);
        }
    }

    if clusters.len() > 1 {
        let last_idx = clusters.len() - 1;
        let tail = clusters[last_idx].hits.last().cloned();
        let head = clusters[0].hits.first().cloned();
        if let (Some(tail), Some(head)) = (tail, head) {
            if colocates(&tail, &head, model, genes, replicon) {
                let dropped = clusters.pop().expect("just checked len() > 1");
                clusters[0]
                    .merge_front(dropped)
                    .expect("both clusters share the same model by construction");
            }
        }
    }
}

fn closest_key_index(pos: i32, key_positions: &[i32]) -> usize {
    let mut best = 0usize;
    let mut best_dist = i32::MAX;
    for (k, &kp) in key_positions.iter().enumerate() {
        let dist = (pos - kp).abs();
        if dist < best_dist {
            best_dist = dist;
            best = k;
        }
    }
    best
}

/// Partition a cluster holding ≥2 key-gene hits around its closest key gene
/// (spec §4.3 step 4). Ties go to the lower-position key gene: `key_indices`
/// is in ascending-position order and only a strictly smaller distance
/// replaces the current pick.
fn split_cluster_on_key_genes(
    cluster: Cluster,
    key_indices: &[usize],
    model: &Model,
    idgen: &ClusterIdGen,
) -> Vec<Cluster> {
    let key_positions: Vec<i32> = key_indices
        .iter()
        .map(|&i| cluster.hits[i].as_core_hit().position)
        .collect();
    let mut buckets: Vec<Vec<ModelHit>> = vec![Vec::new(); key_indices.len()];
    for hit in &cluster.hits {
        let pos = hit.as_core_hit().position;
        let bucket = closest_key_index(pos, &key_positions);
        buckets[bucket].push(hit.clone());
    }
    buckets
        .into_iter()
        .filter(|b| !b.is_empty())
        .map(|mut b| {
            b.sort_by_key(|h| h.as_core_hit().position);
            Cluster::new(idgen.next(), model, &cluster.replicon_name, b)
        })
        .collect()
}

/// Distance-based clustering followed by key-gene filtering/splitting (spec
/// §4.3).
pub fn clusterize_hits_around_key_genes(
    hits: Vec<ModelHit>,
    model: &Model,
    genes: &GeneArena,
    replicon: &RepliconInfo,
    key_genes: &std::collections::HashSet<String>,
    idgen: &ClusterIdGen,
) -> Vec<Cluster> {
    let clusters = clusterize_hits_on_distance_only(hits, model, genes, replicon, idgen);
    let mut result = Vec::new();
    for cluster in clusters {
        let key_indices: Vec<usize> = cluster
            .hits
            .iter()
            .enumerate()
            .filter(|(_, h)| key_genes.contains(genes.get(h.gene_ref()).name()))
            .map(|(i, _)| i)
            .collect();
        match key_indices.len() {
            0 => continue,
            1 => result.push(cluster),
            _ => result.extend(split_cluster_on_key_genes(cluster, &key_indices, model, idgen)),
        }
    }
    result.sort_by_key(|c| c.hits.first().map(|h| h.as_core_hit().position).unwrap_or(i32::MAX));
    result
}

/// Result of true-loner extraction: non-loner clusters, and a singleton
/// cluster per function among the promoted loner/multi-system hits (spec
/// §4.4). Returned as a named struct rather than a tuple, sidestepping the
/// loner/cluster ordering discrepancy between the spec prose and the
/// original source (see DESIGN.md).
#[derive(Debug, Clone, Default)]
pub struct TrueLonersResult {
    pub true_clusters: Vec<Cluster>,
    pub true_loners: BTreeMap<String, Cluster>,
}

/// Extract true-loner clusters and promote their hits to `Loner` /
/// `LonerMultiSystem` representatives (spec §4.4).
///
/// Decision (see DESIGN.md open question on `LonerMultiSystem` counterpart
/// recomputation): the counterpart of a promoted hit is exactly the other
/// true-loner hits sharing its function — it does *not* reach into
/// cluster-embedded multi-system hits, since the spec leaves that
/// recomputation's intent unclear and this is the literal, unambiguous
/// reading of "the other loner hits for the same function".
pub fn get_true_loners(
    clusters: Vec<Cluster>,
    genes: &GeneArena,
    model: &Model,
    criterion: BestHitCriterion,
    idgen: &ClusterIdGen,
) -> TrueLonersResult {
    let mut true_clusters = Vec::new();
    let mut by_function: BTreeMap<String, Vec<HitRecord>> = BTreeMap::new();
    let mut replicon_name = String::new();

    for cluster in clusters {
        let distinct_names: BTreeSet<&str> = cluster.hits.iter().map(|h| genes.get(h.gene_ref()).name()).collect();
        let is_true_loner = distinct_names.len() == 1 && genes.get(cluster.hits[0].gene_ref()).loner;

        if is_true_loner {
            if cluster.hits.len() > 1 {
                tracing::debug!(
                    cluster_id = cluster.id,
                    hits = cluster.hits.len(),
                    "squashing multi-hit true-loner cluster into the loner registry"
                );
            }
            replicon_name = cluster.replicon_name.clone();
            let function = genes.function_name(cluster.hits[0].gene_ref()).to_owned();
            for h in cluster.hits {
                by_function.entry(function.clone()).or_default().push(HitRecord {
                    hit: h.as_core_hit().clone(),
                    gene_ref: h.gene_ref(),
                    status: h.status(),
                });
            }
        } else {
            true_clusters.push(cluster);
        }
    }

    let mut true_loners = BTreeMap::new();
    for (function, records) in by_function {
        let Some(best) = best_hit(&records, &function, genes, criterion).cloned() else {
            continue;
        };
        let counterpart: Vec<HitRecord> = records
            .iter()
            .filter(|r| r.hit.hit_id != best.hit.hit_id)
            .cloned()
            .collect();
        let promoted = if genes.get(best.gene_ref).multi_system {
            ModelHit::LonerMultiSystem(best, counterpart)
        } else {
            ModelHit::Loner(best, counterpart)
        };
        true_loners.insert(
            function,
            Cluster::new(idgen.next(), model, replicon_name.clone(), vec![promoted]),
        );
    }

    TrueLonersResult { true_clusters, true_loners }
}

/// `clusterize_hits_on_distance_only` followed by `get_true_loners` (spec
/// §4.4).
pub fn build_clusters(
    hits: Vec<ModelHit>,
    model: &Model,
    genes: &GeneArena,
    replicon: &RepliconInfo,
    criterion: BestHitCriterion,
    idgen: &ClusterIdGen,
) -> TrueLonersResult {
    let clusters = clusterize_hits_on_distance_only(hits, model, genes, replicon, idgen);
    get_true_loners(clusters, genes, model, criterion, idgen)
}

/// Split true clusters into (remaining clusters, multi-system singleton
/// clusters), promoting each singleton's hit to `ModelHit::MultiSystem`.
///
/// Grounded on `Cluster.multi_system` (original source, cluster.py: "True if
/// this cluster is made of only one hit representing a multi_system gene")
/// and `compute_best_MSHit`'s per-function best-representative grouping
/// (hit.py). The original driver that wires this into the combination step
/// is not in the retrieved source; this function reuses the `get_true_loners`
/// grouping shape for multi-system singletons, documented as an Open
/// Question resolution in DESIGN.md.
pub fn extract_multi_system_singletons(
    true_clusters: Vec<Cluster>,
    genes: &GeneArena,
    model: &Model,
    criterion: BestHitCriterion,
    idgen: &ClusterIdGen,
) -> (Vec<Cluster>, Vec<Cluster>) {
    let mut remaining = Vec::new();
    let mut by_function: BTreeMap<String, Vec<HitRecord>> = BTreeMap::new();
    let mut replicon_name = String::new();

    for cluster in true_clusters {
        let is_multi_system_singleton = cluster.hits.len() == 1 && genes.get(cluster.hits[0].gene_ref()).multi_system;
        if is_multi_system_singleton {
            replicon_name = cluster.replicon_name.clone();
            let function = genes.function_name(cluster.hits[0].gene_ref()).to_owned();
            let h = &cluster.hits[0];
            by_function.entry(function).or_default().push(HitRecord {
                hit: h.as_core_hit().clone(),
                gene_ref: h.gene_ref(),
                status: h.status(),
            });
        } else {
            remaining.push(cluster);
        }
    }

    let mut multi_system_clusters = Vec::new();
    for (function, records) in by_function {
        let Some(best) = best_hit(&records, &function, genes, criterion).cloned() else {
            continue;
        };
        let counterpart: Vec<HitRecord> = records
            .iter()
            .filter(|r| r.hit.hit_id != best.hit.hit_id)
            .cloned()
            .collect();
        let promoted = ModelHit::MultiSystem(best, counterpart);
        multi_system_clusters.push(Cluster::new(idgen.next(), model, replicon_name.clone(), vec![promoted]));
    }

    (remaining, multi_system_clusters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit::CoreHit;
    use crate::model::gene::{CoreGene, GeneArena, GeneId, ModelGene};
    use crate::replicon::Topology;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const IMGS: i32 = 11;

    fn core_hit(gene_name: &str, position: i32, score: f64) -> CoreHit {
        CoreHit {
            gene: CoreGene {
                family_name: "foo".into(),
                name: gene_name.into(),
            },
            hit_id: format!("hit_{gene_name}_{position}"),
            seq_length: 300,
            replicon_name: "rep".into(),
            position,
            i_eval: 1e-10,
            score,
            profile_coverage: 0.9,
            sequence_coverage: 0.9,
            begin_match: 1,
            end_match: 100,
        }
    }

    struct Fixture {
        model: Model,
        genes: GeneArena,
    }

    impl Fixture {
        /// Model `foo/T2SS`, genes {gspD(M), sctC(M), sctJ(A), sctN(A),
        /// abc(N, loner)} — scenario fixture from spec §8.
        fn t2ss() -> Self {
            let mut arena = GeneArena::default();
            let genes = [
                ("gspD", GeneStatus::Mandatory, false),
                ("sctC", GeneStatus::Mandatory, false),
                ("sctJ", GeneStatus::Accessory, false),
                ("sctN", GeneStatus::Accessory, false),
                ("abc", GeneStatus::Neutral, true),
            ];
            for (name, status, loner) in genes {
                arena.push(ModelGene {
                    core: CoreGene {
                        family_name: "foo".into(),
                        name: name.into(),
                    },
                    status,
                    loner,
                    multi_system: false,
                    multi_model: false,
                    inter_gene_max_space: None,
                    exchangeables: vec![],
                    primary: None,
                });
            }
            let model = Model {
                fqn: "foo/T2SS".into(),
                inter_gene_max_space: IMGS,
                min_mandatory_genes_required: None,
                min_genes_required: None,
                max_nb_genes: None,
                multi_loci: false,
                genes: arena.clone(),
            };
            Self { model, genes: arena }
        }

        fn gene_id(&self, name: &str) -> GeneId {
            self.genes.find_by_name(name).unwrap()
        }

        fn hit(&self, name: &str, position: i32) -> ModelHit {
            let gid = self.gene_id(name);
            ModelHit::Plain(HitRecord {
                hit: core_hit(name, position, 10.0),
                gene_ref: gid,
                status: self.genes.get(gid).status,
            })
        }
    }

    fn positions(hits: &[ModelHit]) -> Vec<i32> {
        hits.iter().map(|h| h.as_core_hit().position).collect()
    }

    /// Boundary behavior of `colocates` around `inter_gene_max_space` (spec
    /// §4.1: colocated iff `0 <= dist <= limit`, `dist = p2 - p1 - 1`).
    #[rstest]
    #[case(10, 22, true)] // dist == IMGS, still colocated
    #[case(10, 23, false)] // dist == IMGS + 1, too far
    #[case(10, 11, true)] // dist == 0, adjacent
    fn colocates_respects_inter_gene_max_space_boundary(#[case] p1: i32, #[case] p2: i32, #[case] expected: bool) {
        let fx = Fixture::t2ss();
        let rep = RepliconInfo::new("rep", Topology::Linear, vec![]);
        let h1 = fx.hit("gspD", p1);
        let h2 = fx.hit("sctC", p2);
        assert_eq!(colocates(&h1, &h2, &fx.model, &fx.genes, &rep), expected);
    }

    #[test]
    fn scenario_1_linear_two_clusters() {
        let fx = Fixture::t2ss();
        let rep = RepliconInfo::new("rep", Topology::Linear, vec![]);
        let hits = vec![
            fx.hit("gspD", 10),
            fx.hit("sctC", 20),
            fx.hit("sctJ", 30),
            fx.hit("sctN", 50),
            fx.hit("gspD", 60),
        ];
        let idgen = ClusterIdGen::new();
        let clusters = clusterize_hits_on_distance_only(hits, &fx.model, &fx.genes, &rep, &idgen);
        assert_eq!(clusters.len(), 2);
        assert_eq!(positions(&clusters[0].hits), vec![10, 20, 30]);
        assert_eq!(positions(&clusters[1].hits), vec![50, 60]);
    }

    #[test]
    fn scenario_2_linear_with_loner_tail() {
        let fx = Fixture::t2ss();
        let rep = RepliconInfo::new("rep", Topology::Linear, vec![]);
        let hits = vec![
            fx.hit("gspD", 10),
            fx.hit("sctC", 20),
            fx.hit("sctJ", 30),
            fx.hit("sctN", 50),
            fx.hit("gspD", 60),
            fx.hit("abc", 80),
        ];
        let idgen = ClusterIdGen::new();
        let result = build_clusters(hits, &fx.model, &fx.genes, &rep, BestHitCriterion::Score, &idgen);
        assert_eq!(result.true_clusters.len(), 2);
        assert_eq!(positions(&result.true_clusters[0].hits), vec![10, 20, 30]);
        assert_eq!(positions(&result.true_clusters[1].hits), vec![50, 60]);
        assert_eq!(result.true_loners.len(), 1);
        assert_eq!(positions(&result.true_loners["abc"].hits), vec![80]);
    }

    #[test]
    fn scenario_3_circular_wrap_merges_into_one_cluster() {
        let fx = Fixture::t2ss();
        let rep = RepliconInfo {
            name: "rep".into(),
            topology: Topology::Circular,
            min_pos: 1,
            max_pos: 60,
            genes: vec![],
        };
        let hits = vec![
            fx.hit("gspD", 10),
            fx.hit("sctC", 20),
            fx.hit("sctJ", 30),
            fx.hit("sctN", 50),
            fx.hit("gspD", 60),
        ];
        let idgen = ClusterIdGen::new();
        let clusters = clusterize_hits_on_distance_only(hits, &fx.model, &fx.genes, &rep, &idgen);
        assert_eq!(clusters.len(), 1);
        assert_eq!(positions(&clusters[0].hits), vec![50, 60, 10, 20, 30]);
    }

    #[test]
    fn scenario_4_circular_tail_colocalizes_with_isolated_head() {
        let fx = Fixture::t2ss();
        let rep = RepliconInfo {
            name: "rep".into(),
            topology: Topology::Circular,
            min_pos: 1,
            max_pos: 80,
            genes: vec![],
        };
        // 10 is isolated (too far from 50 to join it); 50,60 form a
        // cluster; 80 dangles until the wrap check joins it to the very
        // first hit (10), producing a second cluster.
        let hits = vec![fx.hit("sctJ", 10), fx.hit("sctN", 50), fx.hit("gspD", 60), fx.hit("sctC", 80)];
        let idgen = ClusterIdGen::new();
        let clusters = clusterize_hits_on_distance_only(hits, &fx.model, &fx.genes, &rep, &idgen);
        assert_eq!(clusters.len(), 2);
        assert_eq!(positions(&clusters[0].hits), vec![50, 60]);
        assert_eq!(positions(&clusters[1].hits), vec![80, 10]);
    }

    #[test]
    fn scenario_5_split_on_two_key_genes_ties_go_left() {
        let fx = Fixture::t2ss();
        let rep = RepliconInfo::new("rep", Topology::Linear, vec![]);
        // A@10, KG1@20, B@30, C@40, D@50, KG2@60, E@70 — use model genes as
        // stand-ins (key genes gspD/sctC act as KG1/KG2).
        let hits = vec![
            fx.hit("sctJ", 10),
            fx.hit("gspD", 20),
            fx.hit("sctN", 30),
            fx.hit("sctJ", 40),
            fx.hit("sctN", 50),
            fx.hit("sctC", 60),
            fx.hit("sctJ", 70),
        ];
        let key_genes: std::collections::HashSet<String> = ["gspD".to_owned(), "sctC".to_owned()].into_iter().collect();
        let idgen = ClusterIdGen::new();
        let clusters = clusterize_hits_around_key_genes(hits, &fx.model, &fx.genes, &rep, &key_genes, &idgen);
        assert_eq!(clusters.len(), 2);
        assert_eq!(positions(&clusters[0].hits), vec![10, 20, 30, 40]);
        assert_eq!(positions(&clusters[1].hits), vec![50, 60, 70]);
    }

    #[test]
    fn scenario_6_scoring_with_exchangeable() {
        let mut arena = GeneArena::default();
        let gspd = arena.push(ModelGene {
            core: CoreGene { family_name: "foo".into(), name: "gspD".into() },
            status: GeneStatus::Mandatory,
            loner: false,
            multi_system: false,
            multi_model: false,
            inter_gene_max_space: None,
            exchangeables: vec![],
            primary: None,
        });
        let tadz = arena.push(ModelGene {
            core: CoreGene { family_name: "foo".into(), name: "tadZ".into() },
            status: GeneStatus::Mandatory,
            loner: false,
            multi_system: false,
            multi_model: false,
            inter_gene_max_space: None,
            exchangeables: vec![],
            primary: None,
        });
        let sctj = arena.push(ModelGene {
            core: CoreGene { family_name: "foo".into(), name: "sctJ".into() },
            status: GeneStatus::Accessory,
            loner: false,
            multi_system: false,
            multi_model: false,
            inter_gene_max_space: None,
            exchangeables: vec![],
            primary: None,
        });
        let sctn = arena.push(ModelGene {
            core: CoreGene { family_name: "foo".into(), name: "sctN".into() },
            status: GeneStatus::Accessory,
            loner: false,
            multi_system: false,
            multi_model: false,
            inter_gene_max_space: None,
            exchangeables: vec![],
            primary: None,
        });
        let sctn_flg = arena.push(ModelGene {
            core: CoreGene { family_name: "foo".into(), name: "sctN_FLG".into() },
            status: GeneStatus::Accessory,
            loner: false,
            multi_system: false,
            multi_model: false,
            inter_gene_max_space: None,
            exchangeables: vec![],
            primary: Some(sctn),
        });

        let model = Model {
            fqn: "foo/T2SS".into(),
            inter_gene_max_space: IMGS,
            min_mandatory_genes_required: None,
            min_genes_required: None,
            max_nb_genes: None,
            multi_loci: false,
            genes: arena.clone(),
        };
        let weights = HitWeight::default();

        let mk = |gid: GeneId, name: &str, pos: i32| {
            ModelHit::Plain(HitRecord {
                hit: core_hit(name, pos, 10.0),
                gene_ref: gid,
                status: arena.get(gid).status,
            })
        };

        let cluster = Cluster::new(
            0,
            &model,
            "rep",
            vec![mk(gspd, "gspD", 10), mk(tadz, "tadZ", 20), mk(sctj, "sctJ", 30), mk(sctn, "sctN", 40)],
        );
        assert!((cluster.score(&arena, &weights).unwrap() - 3.0).abs() < 1e-9);

        let cluster_exchangeable = Cluster::new(
            1,
            &model,
            "rep",
            vec![mk(gspd, "gspD", 10), mk(tadz, "tadZ", 20), mk(sctj, "sctJ", 30), mk(sctn_flg, "sctN_FLG", 40)],
        );
        assert!((cluster_exchangeable.score(&arena, &weights).unwrap() - 2.9).abs() < 1e-9);

        let loner_cluster = Cluster::new(
            2,
            &model,
            "rep",
            vec![ModelHit::Loner(
                HitRecord { hit: core_hit("gspD", 10, 10.0), gene_ref: gspd, status: GeneStatus::Mandatory },
                vec![],
            )],
        );
        assert!((loner_cluster.score(&arena, &weights).unwrap() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn empty_hits_produce_empty_clusters() {
        let fx = Fixture::t2ss();
        let rep = RepliconInfo::new("rep", Topology::Linear, vec![]);
        let idgen = ClusterIdGen::new();
        let clusters = clusterize_hits_on_distance_only(vec![], &fx.model, &fx.genes, &rep, &idgen);
        assert!(clusters.is_empty());
    }

    #[test]
    fn single_loner_hit_becomes_true_loner_not_a_cluster() {
        let fx = Fixture::t2ss();
        let rep = RepliconInfo::new("rep", Topology::Linear, vec![]);
        let idgen = ClusterIdGen::new();
        let result = build_clusters(vec![fx.hit("abc", 10)], &fx.model, &fx.genes, &rep, BestHitCriterion::Score, &idgen);
        assert!(result.true_clusters.is_empty());
        assert_eq!(result.true_loners.len(), 1);
    }

    #[test]
    fn single_non_loner_hit_with_min_genes_required_one_becomes_cluster() {
        let mut fx = Fixture::t2ss();
        fx.model.min_genes_required = Some(1);
        let rep = RepliconInfo::new("rep", Topology::Linear, vec![]);
        let idgen = ClusterIdGen::new();
        let clusters = clusterize_hits_on_distance_only(vec![fx.hit("gspD", 10)], &fx.model, &fx.genes, &rep, &idgen);
        assert_eq!(clusters.len(), 1);
    }

    #[test]
    fn single_hit_with_min_genes_required_above_one_yields_no_cluster() {
        let fx = Fixture::t2ss();
        let rep = RepliconInfo::new("rep", Topology::Linear, vec![]);
        let idgen = ClusterIdGen::new();
        let clusters = clusterize_hits_on_distance_only(vec![fx.hit("gspD", 10)], &fx.model, &fx.genes, &rep, &idgen);
        assert!(clusters.is_empty());
    }

    #[test]
    fn cluster_invariant_hits_share_replicon_and_ascend_in_position() {
        let fx = Fixture::t2ss();
        let rep = RepliconInfo::new("rep", Topology::Linear, vec![]);
        let hits = vec![fx.hit("gspD", 10), fx.hit("sctC", 20), fx.hit("sctJ", 30)];
        let idgen = ClusterIdGen::new();
        let clusters = clusterize_hits_on_distance_only(hits, &fx.model, &fx.genes, &rep, &idgen);
        let cluster = &clusters[0];
        assert!(cluster.hits.iter().all(|h| h.as_core_hit().replicon_name == cluster.replicon_name));
        let pos = positions(&cluster.hits);
        assert!(pos.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn extract_multi_system_singletons_promotes_best_and_keeps_rest_as_counterpart() {
        let mut arena = GeneArena::default();
        arena.push(ModelGene {
            core: CoreGene {
                family_name: "foo".into(),
                name: "xerC".into(),
            },
            status: GeneStatus::Accessory,
            loner: false,
            multi_system: true,
            multi_model: false,
            inter_gene_max_space: None,
            exchangeables: vec![],
            primary: None,
        });
        let model = Model {
            fqn: "foo/T2SS".into(),
            inter_gene_max_space: IMGS,
            min_mandatory_genes_required: None,
            min_genes_required: None,
            max_nb_genes: None,
            multi_loci: false,
            genes: arena.clone(),
        };
        let gid = arena.find_by_name("xerC").unwrap();
        let singleton = |pos: i32, score: f64, replicon: &str| {
            Cluster::new(
                0,
                &model,
                replicon,
                vec![ModelHit::Plain(HitRecord {
                    hit: core_hit("xerC", pos, score),
                    gene_ref: gid,
                    status: GeneStatus::Accessory,
                })],
            )
        };
        let true_clusters = vec![singleton(10, 5.0, "rep"), singleton(200, 50.0, "rep")];
        let idgen = ClusterIdGen::new();
        let (remaining, multi_system_clusters) =
            extract_multi_system_singletons(true_clusters, &arena, &model, BestHitCriterion::Score, &idgen);
        assert!(remaining.is_empty());
        assert_eq!(multi_system_clusters.len(), 1);
        let promoted = &multi_system_clusters[0].hits[0];
        assert!(promoted.multi_system());
        assert_eq!(promoted.as_core_hit().position, 200);
        assert_eq!(promoted.counterpart().len(), 1);
        assert_eq!(promoted.counterpart()[0].hit.position, 10);
    }
}
