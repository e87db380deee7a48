//! System validation and scoring (spec §4.6): a candidate combination
//! becomes a `System` iff it clears the model's quorum and carries no
//! forbidden hit; otherwise it is kept as a `RejectedCandidate` for
//! multi-system re-combination.

use std::collections::BTreeSet;

use crate::cluster::Cluster;
use crate::combination::Combination;
use crate::err::MacsyError;
use crate::hit::HitWeight;
use crate::model::gene::{GeneArena, GeneStatus};
use crate::model::Model;

/// A validated combination: carries wholeness, score, and the covered hit
/// ids needed to test compatibility with other systems (spec §3, §4.7).
#[derive(Debug, Clone)]
pub struct System {
    pub model_fqn: String,
    pub clusters: Vec<Cluster>,
    pub score: f64,
    pub wholeness: f64,
}

impl System {
    /// Hit ids covered by this system, used for the §4.7 compatibility test
    /// (two systems are compatible iff they share no `CoreHit`).
    pub fn hit_ids(&self) -> BTreeSet<String> {
        self.clusters
            .iter()
            .flat_map(|c| c.hits.iter().map(|h| h.as_core_hit().hit_id.clone()))
            .collect()
    }

    /// Ascending positions of every covered hit, used as the deterministic
    /// tie-breaker in `Solution` sorting (spec §4.7).
    pub fn hit_positions(&self) -> Vec<i32> {
        let mut positions: Vec<i32> = self
            .clusters
            .iter()
            .flat_map(|c| c.hits.iter().map(|h| h.as_core_hit().position))
            .collect();
        positions.sort_unstable();
        positions
    }

    /// Two systems are compatible iff they share zero `CoreHit`s.
    pub fn is_compatible(&self, other: &System) -> bool {
        self.hit_ids().is_disjoint(&other.hit_ids())
    }
}

/// A combination that failed quorum/forbidden-gene validation; kept around
/// so the multi-system recombination pass (spec §4.5) can still extend it.
#[derive(Debug, Clone)]
pub struct RejectedCandidate {
    pub model_fqn: String,
    pub clusters: Vec<Cluster>,
    pub reason: String,
}

fn covered_functions(combination: &Combination, genes: &GeneArena, status: GeneStatus) -> BTreeSet<String> {
    combination
        .clusters
        .iter()
        .flat_map(|c| &c.hits)
        .filter(|h| h.status() == status)
        .map(|h| genes.function_name(h.gene_ref()).to_owned())
        .collect()
}

/// Validate a combination against the model's quorum and forbidden-gene
/// rules, turning it into a `System` or a `RejectedCandidate` (spec §4.6).
pub fn validate(
    combination: Combination,
    model: &Model,
    genes: &GeneArena,
    weights: &HitWeight,
) -> Result<System, RejectedCandidate> {
    let forbidden_hit = combination
        .clusters
        .iter()
        .flat_map(|c| &c.hits)
        .find(|h| h.status() == GeneStatus::Forbidden);
    if let Some(hit) = forbidden_hit {
        return Err(RejectedCandidate {
            model_fqn: model.fqn.clone(),
            clusters: combination.clusters,
            reason: format!(
                "contains forbidden hit '{}' ({})",
                hit.as_core_hit().hit_id,
                genes.get(hit.gene_ref()).name()
            ),
        });
    }

    let mandatory = covered_functions(&combination, genes, GeneStatus::Mandatory);
    let accessory = covered_functions(&combination, genes, GeneStatus::Accessory);
    let mandatory_count = mandatory.len() as u32;
    let genes_count = (mandatory.len() + accessory.len()) as u32;

    if mandatory_count < model.effective_min_mandatory_genes() {
        return Err(RejectedCandidate {
            model_fqn: model.fqn.clone(),
            clusters: combination.clusters,
            reason: format!(
                "{mandatory_count} mandatory genes covered, {} required",
                model.effective_min_mandatory_genes()
            ),
        });
    }
    if genes_count < model.effective_min_genes() {
        return Err(RejectedCandidate {
            model_fqn: model.fqn.clone(),
            clusters: combination.clusters,
            reason: format!("{genes_count} genes covered, {} required", model.effective_min_genes()),
        });
    }

    let total_hits: u32 = combination.clusters.iter().map(|c| c.len() as u32).sum();
    if total_hits > model.effective_max_nb_genes() {
        return Err(RejectedCandidate {
            model_fqn: model.fqn.clone(),
            clusters: combination.clusters,
            reason: format!("{total_hits} hits exceed max_nb_genes={}", model.effective_max_nb_genes()),
        });
    }

    let score: f64 = combination
        .clusters
        .iter()
        .map(|c| c.score(genes, weights))
        .collect::<Result<Vec<f64>, MacsyError>>()
        .map_err(|err| RejectedCandidate {
            model_fqn: model.fqn.clone(),
            clusters: combination.clusters.clone(),
            reason: err.to_string(),
        })?
        .into_iter()
        .sum();

    let wholeness = genes_count as f64 / model.effective_max_nb_genes().max(1) as f64;

    Ok(System {
        model_fqn: model.fqn.clone(),
        clusters: combination.clusters,
        score,
        wholeness,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit::{HitRecord, ModelHit};
    use crate::model::gene::{CoreGene, ModelGene};
    use pretty_assertions::assert_eq;

    fn core_hit(gene_name: &str, position: i32) -> crate::hit::CoreHit {
        crate::hit::CoreHit {
            gene: CoreGene {
                family_name: "foo".into(),
                name: gene_name.into(),
            },
            hit_id: format!("hit_{gene_name}_{position}"),
            seq_length: 300,
            replicon_name: "rep".into(),
            position,
            i_eval: 1e-10,
            score: 10.0,
            profile_coverage: 0.9,
            sequence_coverage: 0.9,
            begin_match: 1,
            end_match: 100,
        }
    }

    fn t2ss() -> (Model, GeneArena) {
        let mut arena = GeneArena::default();
        for (name, status) in [
            ("gspD", GeneStatus::Mandatory),
            ("sctC", GeneStatus::Mandatory),
            ("sctJ", GeneStatus::Accessory),
        ] {
            arena.push(ModelGene {
                core: CoreGene {
                    family_name: "foo".into(),
                    name: name.into(),
                },
                status,
                loner: false,
                multi_system: false,
                multi_model: false,
                inter_gene_max_space: None,
                exchangeables: vec![],
                primary: None,
            });
        }
        let model = Model {
            fqn: "foo/T2SS".into(),
            inter_gene_max_space: 11,
            min_mandatory_genes_required: None,
            min_genes_required: None,
            max_nb_genes: None,
            multi_loci: false,
            genes: arena.clone(),
        };
        (model, arena)
    }

    fn hit(arena: &GeneArena, name: &str, position: i32) -> ModelHit {
        let gid = arena.find_by_name(name).unwrap();
        ModelHit::Plain(HitRecord {
            hit: core_hit(name, position),
            gene_ref: gid,
            status: arena.get(gid).status,
        })
    }

    #[test]
    fn full_mandatory_combination_validates() {
        let (model, arena) = t2ss();
        let cluster = Cluster::new(0, &model, "rep", vec![hit(&arena, "gspD", 10), hit(&arena, "sctC", 20)]);
        let combination = Combination { clusters: vec![cluster] };
        let system = validate(combination, &model, &arena, &HitWeight::default()).unwrap();
        assert_eq!(system.score, 2.0);
    }

    #[test]
    fn missing_mandatory_gene_is_rejected() {
        let (model, arena) = t2ss();
        let cluster = Cluster::new(0, &model, "rep", vec![hit(&arena, "gspD", 10)]);
        let combination = Combination { clusters: vec![cluster] };
        assert!(validate(combination, &model, &arena, &HitWeight::default()).is_err());
    }

    #[test]
    fn two_systems_sharing_a_hit_are_incompatible() {
        let (model, arena) = t2ss();
        let shared = hit(&arena, "gspD", 10);
        let s1 = System {
            model_fqn: model.fqn.clone(),
            clusters: vec![Cluster::new(0, &model, "rep", vec![shared.clone()])],
            score: 1.0,
            wholeness: 1.0,
        };
        let s2 = System {
            model_fqn: model.fqn.clone(),
            clusters: vec![Cluster::new(1, &model, "rep", vec![shared])],
            score: 1.0,
            wholeness: 1.0,
        };
        assert!(!s1.is_compatible(&s2));
    }

    #[test]
    fn forbidden_hit_rejects_the_combination() {
        let mut arena = GeneArena::default();
        arena.push(ModelGene {
            core: CoreGene { family_name: "foo".into(), name: "toxN".into() },
            status: GeneStatus::Forbidden,
            loner: false,
            multi_system: false,
            multi_model: false,
            inter_gene_max_space: None,
            exchangeables: vec![],
            primary: None,
        });
        let model = Model {
            fqn: "foo/T2SS".into(),
            inter_gene_max_space: 11,
            min_mandatory_genes_required: Some(0),
            min_genes_required: Some(0),
            max_nb_genes: None,
            multi_loci: false,
            genes: arena.clone(),
        };
        let cluster = Cluster::new(0, &model, "rep", vec![hit(&arena, "toxN", 10)]);
        let combination = Combination { clusters: vec![cluster] };
        assert!(validate(combination, &model, &arena, &HitWeight::default()).is_err());
    }
}
