//! Orchestration (spec §2, §5): drives cluster → combination → validation →
//! solution selection per `(replicon, model)` pair, fanning the per-pair
//! work out over a dedicated, sized `rayon::ThreadPool` — mirroring how the
//! teacher sizes its global pool from `args.num_threads` in
//! `seqvars::aggregate::run`, scoped to its own pool here since detection
//! may run alongside other work in the same process.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::cluster::{build_clusters, clusterize_hits_around_key_genes, extract_multi_system_singletons, get_true_loners, ClusterIdGen};
use crate::combination::{combine_clusters, combine_multisystems};
use crate::hit::{dedup_by_position, sort_model_hits, BestHitCriterion, CoreHit, HitWeight};
use crate::model::gene::GeneArena;
use crate::model::{Model, ModelBank};
use crate::replicon::RepliconInfo;
use crate::solution::{find_best_solutions, Solution};
use crate::system::{validate, System};

/// Tunables shaping one detection run (spec §9 Configuration list, minus the
/// HMM-search-specific thresholds which live in `profile::SelectionThresholds`).
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub hit_weights: HitWeight,
    pub best_hit_criterion: BestHitCriterion,
    /// Key gene names that switch clustering into §4.3 mode; empty runs
    /// plain distance-only clustering (§4.2).
    pub key_genes: Vec<String>,
    /// `W`: number of `(replicon, model)` pairs processed concurrently (§5).
    pub workers: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            hit_weights: HitWeight::default(),
            best_hit_criterion: BestHitCriterion::default(),
            key_genes: Vec::new(),
            workers: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        }
    }
}

/// Run the full candidate-system pipeline for one `(replicon, model)` pair
/// (spec §4.2-§4.6): bind hits to the model's genes, cluster, extract true
/// loners and multi-system singletons, generate combinations, validate into
/// `System`s, and retry rejects through multi-system recombination.
pub fn detect_one(replicon: &RepliconInfo, model: &Model, hits: &[CoreHit], config: &DetectionConfig) -> Vec<System> {
    let genes: &GeneArena = &model.genes;

    let mut model_hits = model.filter(hits);
    sort_model_hits(&mut model_hits);
    let model_hits = dedup_by_position(model_hits);

    let idgen = ClusterIdGen::new();
    let clustered = if config.key_genes.is_empty() {
        build_clusters(model_hits, model, genes, replicon, config.best_hit_criterion, &idgen)
    } else {
        let key_set: std::collections::HashSet<String> = config.key_genes.iter().cloned().collect();
        let clusters = clusterize_hits_around_key_genes(model_hits, model, genes, replicon, &key_set, &idgen);
        get_true_loners(clusters, genes, model, config.best_hit_criterion, &idgen)
    };

    let (true_clusters, multi_system_clusters) =
        extract_multi_system_singletons(clustered.true_clusters, genes, model, config.best_hit_criterion, &idgen);

    let combinations = combine_clusters(&true_clusters, &clustered.true_loners, model.multi_loci, genes);

    let mut systems = Vec::new();
    let mut rejected = Vec::new();
    for combination in combinations {
        match validate(combination, model, genes, &config.hit_weights) {
            Ok(system) => systems.push(system),
            Err(rejected_candidate) => rejected.push(rejected_candidate),
        }
    }

    if !multi_system_clusters.is_empty() {
        for combination in combine_multisystems(&rejected, &multi_system_clusters, genes) {
            if let Ok(system) = validate(combination, model, genes, &config.hit_weights) {
                systems.push(system);
            }
        }
    }

    systems
}

/// One `(replicon, model)` pair queued for detection, already carrying the
/// hits the profile facade produced for it.
pub struct DetectionTask<'a> {
    pub replicon: &'a RepliconInfo,
    pub model_fqn: &'a str,
    pub hits: Vec<CoreHit>,
}

/// Run every queued task across a thread pool sized from `config.workers`,
/// group the resulting candidate systems by model, and select the best
/// solutions per model (spec §2, §4.7, §5).
pub fn run_detection(
    tasks: Vec<DetectionTask>,
    models: &ModelBank,
    config: &DetectionConfig,
) -> Result<Vec<(String, Vec<Solution>)>, anyhow::Error> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.max(1))
        .build()
        .map_err(|e| anyhow::anyhow!("building detection thread pool failed: {e}"))?;

    let per_task: Vec<(String, Vec<System>)> = pool.install(|| {
        tasks
            .par_iter()
            .map(|task| {
                let model = models
                    .get(task.model_fqn)
                    .unwrap_or_else(|| panic!("model '{}' not registered before dispatch", task.model_fqn));
                let systems = detect_one(task.replicon, model, &task.hits, config);
                (task.model_fqn.to_owned(), systems)
            })
            .collect()
    });

    let mut by_model: BTreeMap<String, Vec<System>> = BTreeMap::new();
    for (fqn, systems) in per_task {
        by_model.entry(fqn).or_default().extend(systems);
    }

    Ok(by_model
        .into_iter()
        .map(|(fqn, systems)| (fqn, find_best_solutions(systems)))
        .collect())
}
