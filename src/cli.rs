//! `detect` subcommand: load model definitions, read precomputed hit TSVs,
//! drive the pipeline per replicon, and report the resulting solutions.
//!
//! Model *package* loading (XML, archives, installers) is an explicit
//! Non-goal (spec §1, §6); this subcommand consumes a JSON file of
//! `ModelDefinition`s instead, leaving the XML-to-JSON step to a caller.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;

use crate::hit::BestHitCriterion;
use crate::model::gene::{CoreGene, GeneArena, ModelGene};
use crate::model::model::{GeneDefinition, Model, ModelBank, ModelDefinition};
use crate::pipeline::{run_detection, DetectionConfig, DetectionTask};
use crate::profile::read_hits_tsv;
use crate::replicon::{RepliconInfo, Topology};

/// Command line arguments for the `detect` subcommand.
#[derive(Debug, Parser)]
#[command(author, version, about = "detect macromolecular systems from HMM hits", long_about = None)]
pub struct Args {
    /// JSON file holding the model definitions to search for (a `Vec<ModelDefinition>`).
    #[clap(long)]
    pub models: PathBuf,

    /// Pre-computed hit TSVs written by `profile::write_hits_tsv`, one per replicon.
    #[clap(long, required = true)]
    pub hits: Vec<PathBuf>,

    /// Gene family the loaded models and hits belong to.
    #[clap(long)]
    pub family: String,

    /// Replicon topology; applies uniformly to every `--hits` file.
    #[clap(long, value_enum, default_value_t = CliTopology::Linear)]
    pub topology: CliTopology,

    /// Which metric breaks ties among functionally-equivalent hits (spec §4.4).
    #[clap(long, value_enum, default_value_t = CliBestHitCriterion::Score)]
    pub best_hit_criterion: CliBestHitCriterion,

    /// Key gene names switching clustering into key-gene mode (spec §4.3);
    /// empty runs plain distance-only clustering (spec §4.2).
    #[clap(long)]
    pub key_genes: Vec<String>,

    /// `W`: number of `(replicon, model)` pairs processed concurrently (spec §5).
    #[clap(long)]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliTopology {
    Linear,
    Circular,
}

impl From<CliTopology> for Topology {
    fn from(t: CliTopology) -> Self {
        match t {
            CliTopology::Linear => Topology::Linear,
            CliTopology::Circular => Topology::Circular,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliBestHitCriterion {
    Score,
    IEvalue,
    ProfileCoverage,
}

impl From<CliBestHitCriterion> for BestHitCriterion {
    fn from(c: CliBestHitCriterion) -> Self {
        match c {
            CliBestHitCriterion::Score => BestHitCriterion::Score,
            CliBestHitCriterion::IEvalue => BestHitCriterion::IEvalue,
            CliBestHitCriterion::ProfileCoverage => BestHitCriterion::ProfileCoverage,
        }
    }
}

fn build_model(def: ModelDefinition) -> Model {
    let family_name = def.fqn.split('/').next().unwrap_or(&def.fqn).to_owned();
    let mut arena = GeneArena::default();
    let mut ids_by_name = HashMap::with_capacity(def.genes.len());
    for gene_def in &def.genes {
        let id = arena.push(gene_to_model_gene(gene_def, &family_name));
        ids_by_name.insert(gene_def.name.as_str(), id);
    }

    // Second pass (model.py:312, `for ex in gene.exchangeables`): resolve each
    // gene's exchangeable *names* to the `GeneId`s of other genes declared in
    // this same model, then wire both directions — the primary gains the
    // exchangeable in its `exchangeables` list, the exchangeable records the
    // primary via `primary`.
    for gene_def in &def.genes {
        let primary_id = ids_by_name[gene_def.name.as_str()];
        for ex_name in &gene_def.exchangeables {
            let Some(&ex_id) = ids_by_name.get(ex_name.as_str()) else {
                tracing::warn!(
                    model = %def.fqn,
                    gene = %gene_def.name,
                    exchangeable = %ex_name,
                    "exchangeable gene not found in model, skipping"
                );
                continue;
            };
            arena.get_mut(primary_id).exchangeables.push(ex_id);
            arena.get_mut(ex_id).primary = Some(primary_id);
        }
    }

    Model {
        fqn: def.fqn,
        inter_gene_max_space: def.inter_gene_max_space,
        min_mandatory_genes_required: def.min_mandatory_genes_required,
        min_genes_required: def.min_genes_required,
        max_nb_genes: def.max_nb_genes,
        multi_loci: def.multi_loci,
        genes: arena,
    }
}

fn gene_to_model_gene(gene_def: &GeneDefinition, family_name: &str) -> ModelGene {
    ModelGene {
        core: CoreGene {
            family_name: family_name.to_owned(),
            name: gene_def.name.clone(),
        },
        status: gene_def.presence,
        loner: gene_def.loner,
        multi_system: gene_def.multi_system,
        multi_model: gene_def.multi_model,
        inter_gene_max_space: gene_def.inter_gene_max_space,
        exchangeables: Vec::new(),
        primary: None,
    }
}

/// Run the `detect` subcommand: load models, read hits, drive detection, and
/// log the resulting solutions per model.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:#?}", args_common);
    tracing::info!("args = {:#?}", args);
    crate::common::trace_rss_now();

    let defs_json = std::fs::read_to_string(&args.models)?;
    let defs: Vec<ModelDefinition> = serde_json::from_str(&defs_json)?;

    let mut model_bank = ModelBank::new();
    for def in defs {
        let model = build_model(def);
        model.validate()?;
        model_bank.add_model(model)?;
    }

    let topology: Topology = args.topology.into();
    let mut replicons = Vec::new();
    let mut hits_by_replicon = HashMap::new();
    for path in &args.hits {
        let hits = read_hits_tsv(path, &args.family)?;
        let replicon_name = hits.first().map(|h| h.replicon_name.clone()).unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("replicon")
                .to_owned()
        });
        // The full gene ladder (used only to bound circular-wrap distance,
        // spec §4.1) is not carried by the hits TSV; building the real
        // sequence index is an explicit Non-goal (§6). Approximate the
        // bound with the hit count for this replicon.
        let genes: Vec<(String, u32)> = (0..hits.len()).map(|i| (format!("seq_{i}"), 0)).collect();
        let replicon = RepliconInfo::new(replicon_name.clone(), topology, genes);
        hits_by_replicon.insert(replicon_name.clone(), hits);
        replicons.push(replicon);
    }

    let config = DetectionConfig {
        best_hit_criterion: args.best_hit_criterion.into(),
        key_genes: args.key_genes.clone(),
        workers: args
            .workers
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)),
        ..DetectionConfig::default()
    };

    let mut tasks = Vec::new();
    for replicon in &replicons {
        let hits = hits_by_replicon.get(&replicon.name).cloned().unwrap_or_default();
        for model in model_bank.iter() {
            tasks.push(DetectionTask {
                replicon,
                model_fqn: model.fqn.as_str(),
                hits: hits.clone(),
            });
        }
    }

    let results = run_detection(tasks, &model_bank, &config)?;

    for (fqn, solutions) in &results {
        tracing::info!(model = %fqn, solutions = solutions.len(), "detection complete");
        for (i, solution) in solutions.iter().enumerate() {
            tracing::info!(
                model = %fqn,
                solution = i,
                score = solution.score,
                systems = solution.systems.len(),
                hits = solution.hits_number,
                "best solution"
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::gene::GeneStatus;

    fn gene_def(name: &str, presence: GeneStatus) -> GeneDefinition {
        GeneDefinition {
            name: name.to_owned(),
            presence,
            loner: false,
            multi_system: false,
            multi_model: false,
            inter_gene_max_space: None,
            exchangeables: vec![],
        }
    }

    #[test]
    fn build_model_derives_family_name_from_fqn_and_binds_genes() {
        let def = ModelDefinition {
            fqn: "foo/T2SS".into(),
            vers: "1.0".into(),
            inter_gene_max_space: 11,
            min_mandatory_genes_required: None,
            min_genes_required: None,
            max_nb_genes: None,
            multi_loci: false,
            genes: vec![gene_def("gspD", GeneStatus::Mandatory)],
        };
        let model = build_model(def);
        assert_eq!(model.fqn, "foo/T2SS");
        assert_eq!(model.genes.len(), 1);
        let gid = model.genes.find_by_name("gspD").unwrap();
        assert_eq!(model.genes.get(gid).core.family_name, "foo");
        assert!(model.validate().is_ok());
    }

    #[test]
    fn build_model_resolves_exchangeable_names_to_gene_ids() {
        let mut primary = gene_def("sctJ", GeneStatus::Mandatory);
        primary.exchangeables = vec!["sctJ_FLG".to_owned()];
        let def = ModelDefinition {
            fqn: "foo/T3SS".into(),
            vers: "1.0".into(),
            inter_gene_max_space: 11,
            min_mandatory_genes_required: None,
            min_genes_required: None,
            max_nb_genes: None,
            multi_loci: false,
            genes: vec![primary, gene_def("sctJ_FLG", GeneStatus::Accessory)],
        };
        let model = build_model(def);
        let primary_id = model.genes.find_by_name("sctJ").unwrap();
        let alt_id = model.genes.find_by_name("sctJ_FLG").unwrap();

        assert_eq!(model.genes.get(primary_id).exchangeables, vec![alt_id]);
        assert!(!model.genes.get(primary_id).is_exchangeable());
        assert!(model.genes.get(alt_id).is_exchangeable());
        assert_eq!(model.genes.alternate_of(alt_id), primary_id);
        assert_eq!(model.genes.function_name(alt_id), "sctJ");
    }

    #[test]
    fn build_model_skips_unresolvable_exchangeable_name() {
        let mut primary = gene_def("sctJ", GeneStatus::Mandatory);
        primary.exchangeables = vec!["does_not_exist".to_owned()];
        let def = ModelDefinition {
            fqn: "foo/T3SS".into(),
            vers: "1.0".into(),
            inter_gene_max_space: 11,
            min_mandatory_genes_required: None,
            min_genes_required: None,
            max_nb_genes: None,
            multi_loci: false,
            genes: vec![primary],
        };
        let model = build_model(def);
        let primary_id = model.genes.find_by_name("sctJ").unwrap();
        assert!(model.genes.get(primary_id).exchangeables.is_empty());
    }

    #[test]
    fn models_json_round_trips_through_serde() {
        let defs = vec![ModelDefinition {
            fqn: "foo/T2SS".into(),
            vers: "1.0".into(),
            inter_gene_max_space: 11,
            min_mandatory_genes_required: Some(1),
            min_genes_required: None,
            max_nb_genes: None,
            multi_loci: false,
            genes: vec![gene_def("gspD", GeneStatus::Mandatory)],
        }];
        let json = serde_json::to_string(&defs).unwrap();
        let parsed: Vec<ModelDefinition> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].fqn, "foo/T2SS");
        assert_eq!(parsed[0].min_mandatory_genes_required, Some(1));
    }
}
