//! Model: the quorum and spacing rules a candidate system must satisfy.

use crate::err::MacsyError;
use crate::hit::{CoreHit, HitRecord, ModelHit};
use crate::model::gene::{GeneArena, GeneStatus};

/// `{fqn, inter_gene_max_space, quorum thresholds, multi_loci, genes}`
/// (spec §3). `fqn` is a path like `family/subfamily/name`.
#[derive(Debug, Clone)]
pub struct Model {
    pub fqn: String,
    pub inter_gene_max_space: i32,
    pub min_mandatory_genes_required: Option<u32>,
    pub min_genes_required: Option<u32>,
    pub max_nb_genes: Option<u32>,
    pub multi_loci: bool,
    pub genes: GeneArena,
}

impl Model {
    pub fn family_name(&self) -> &str {
        self.fqn.split('/').next().unwrap_or(&self.fqn)
    }

    pub fn name(&self) -> &str {
        self.fqn.rsplit('/').next().unwrap_or(&self.fqn)
    }

    fn count_by_status(&self, status: GeneStatus) -> u32 {
        self.genes
            .iter()
            .filter(|(_, g)| g.status == status && !g.is_exchangeable())
            .count() as u32
    }

    /// Effective mandatory-gene quorum: falls back to "every mandatory gene"
    /// when the model does not set it explicitly.
    pub fn effective_min_mandatory_genes(&self) -> u32 {
        self.min_mandatory_genes_required
            .unwrap_or_else(|| self.count_by_status(GeneStatus::Mandatory))
    }

    /// Effective mandatory+accessory quorum; falls back to the mandatory
    /// quorum alone.
    pub fn effective_min_genes(&self) -> u32 {
        self.min_genes_required
            .unwrap_or_else(|| self.effective_min_mandatory_genes())
    }

    /// Effective gene-count cap; falls back to "every gene the model knows
    /// about" (mandatory + accessory + neutral).
    pub fn effective_max_nb_genes(&self) -> u32 {
        self.max_nb_genes.unwrap_or_else(|| {
            self.count_by_status(GeneStatus::Mandatory)
                + self.count_by_status(GeneStatus::Accessory)
                + self.count_by_status(GeneStatus::Neutral)
        })
    }

    /// Structural validation (spec §7 `ModelInconsistency`): every gene
    /// appears once, and `min_genes_required >= min_mandatory_genes_required`.
    pub fn validate(&self) -> Result<(), MacsyError> {
        let mut seen = std::collections::HashSet::new();
        for (_, gene) in self.genes.iter() {
            if !seen.insert(gene.name()) {
                return Err(MacsyError::ModelInconsistency {
                    fqn: self.fqn.clone(),
                    reason: format!("gene '{}' appears more than once", gene.name()),
                });
            }
        }
        if self.effective_min_genes() < self.effective_min_mandatory_genes() {
            return Err(MacsyError::ModelInconsistency {
                fqn: self.fqn.clone(),
                reason: "min_genes_required < min_mandatory_genes_required".to_owned(),
            });
        }
        Ok(())
    }

    /// Binds each hit to the model gene it matches (by literal gene name),
    /// discarding hits for genes outside this model. Produces plain
    /// `ModelHit`s; promotion to `Loner`/`MultiSystem` happens later, once
    /// clusters are known (spec §4.4).
    pub fn filter(&self, hits: &[CoreHit]) -> Vec<ModelHit> {
        hits.iter()
            .filter_map(|hit| {
                let gene_id = self.genes.find_by_name(&hit.gene.name)?;
                let status = self.genes.get(gene_id).status;
                Some(ModelHit::Plain(HitRecord {
                    hit: hit.clone(),
                    gene_ref: gene_id,
                    status,
                }))
            })
            .collect()
    }
}

/// Serde-deserializable shape of a `<gene>` element in a model definition
/// file. Format-agnostic: parsing `definitions/**.xml` into this shape is a
/// loader's job (spec §6 Non-goal — no XML parser lives in this crate).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GeneDefinition {
    pub name: String,
    pub presence: GeneStatus,
    #[serde(default)]
    pub loner: bool,
    #[serde(default)]
    pub multi_system: bool,
    #[serde(default)]
    pub multi_model: bool,
    #[serde(default)]
    pub inter_gene_max_space: Option<i32>,
    #[serde(default)]
    pub exchangeables: Vec<String>,
}

/// Serde-deserializable shape of one `definitions/**.xml` model file. A
/// loader (out of scope here) turns this plus a `GeneBank` into a `Model` +
/// `GeneArena`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelDefinition {
    pub fqn: String,
    pub vers: String,
    pub inter_gene_max_space: i32,
    #[serde(default)]
    pub min_mandatory_genes_required: Option<u32>,
    #[serde(default)]
    pub min_genes_required: Option<u32>,
    #[serde(default)]
    pub max_nb_genes: Option<u32>,
    #[serde(default)]
    pub multi_loci: bool,
    pub genes: Vec<GeneDefinition>,
}

/// Write-once, read-only registry of `Model`s (spec §5), keyed by `fqn`.
#[derive(Debug, Clone, Default)]
pub struct ModelBank {
    models: indexmap::IndexMap<String, Model>,
}

impl ModelBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors if a model with the same `fqn` is already registered: unlike
    /// the gene bank, re-registering a model indicates a caller bug (two
    /// packages shipping the same model name), not a harmless re-scan.
    pub fn add_model(&mut self, model: Model) -> Result<(), MacsyError> {
        if self.models.contains_key(&model.fqn) {
            return Err(MacsyError::ModelInconsistency {
                fqn: model.fqn.clone(),
                reason: "model already registered in this bank".to_owned(),
            });
        }
        self.models.insert(model.fqn.clone(), model);
        Ok(())
    }

    pub fn get(&self, fqn: &str) -> Option<&Model> {
        self.models.get(fqn)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::gene::{CoreGene, ModelGene};
    use pretty_assertions::assert_eq;

    fn gene(arena: &mut GeneArena, name: &str, status: GeneStatus) -> crate::model::gene::GeneId {
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
        })
    }

    #[test]
    fn effective_quorum_falls_back_to_gene_counts() {
        let mut arena = GeneArena::default();
        gene(&mut arena, "gspD", GeneStatus::Mandatory);
        gene(&mut arena, "sctC", GeneStatus::Mandatory);
        gene(&mut arena, "sctJ", GeneStatus::Accessory);

        let model = Model {
            fqn: "foo/T2SS".into(),
            inter_gene_max_space: 11,
            min_mandatory_genes_required: None,
            min_genes_required: None,
            max_nb_genes: None,
            multi_loci: false,
            genes: arena,
        };

        assert_eq!(model.effective_min_mandatory_genes(), 2);
        assert_eq!(model.effective_min_genes(), 2);
        assert_eq!(model.effective_max_nb_genes(), 3);
    }

    #[test]
    fn validate_rejects_inverted_quorum() {
        let mut arena = GeneArena::default();
        gene(&mut arena, "gspD", GeneStatus::Mandatory);

        let model = Model {
            fqn: "foo/T2SS".into(),
            inter_gene_max_space: 11,
            min_mandatory_genes_required: Some(2),
            min_genes_required: Some(1),
            max_nb_genes: None,
            multi_loci: false,
            genes: arena,
        };

        assert!(model.validate().is_err());
    }

    #[test]
    fn model_bank_rejects_duplicate_fqn() {
        let model = Model {
            fqn: "foo/T2SS".into(),
            inter_gene_max_space: 11,
            min_mandatory_genes_required: None,
            min_genes_required: None,
            max_nb_genes: None,
            multi_loci: false,
            genes: GeneArena::default(),
        };
        let mut bank = ModelBank::new();
        bank.add_model(model.clone()).unwrap();
        assert!(bank.add_model(model).is_err());
    }
}
