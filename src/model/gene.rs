//! Gene identities: core genes (shared across models) and model genes
//! (a core gene bound into one model with status/spacing/exchangeable
//! attributes). See the Design Notes arena+index redesign: model genes live
//! in a `GeneArena` owned by their `Model`, addressed by `GeneId`, never by
//! pointer.

use serde::{Deserialize, Serialize};

/// A gene identifier shared across every model that references it.
///
/// Two `CoreGene`s are the same gene iff `(family_name, name)` match; the
/// gene bank enforces that identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoreGene {
    pub family_name: String,
    pub name: String,
}

/// The role a model gene plays when deciding quorum and scoring.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum GeneStatus {
    Mandatory,
    Accessory,
    Neutral,
    Forbidden,
}

/// Index of a `ModelGene` inside its owning model's `GeneArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeneId(pub usize);

/// A core gene bound into one model, carrying the model-specific attributes
/// from spec §3.
#[derive(Debug, Clone)]
pub struct ModelGene {
    pub core: CoreGene,
    pub status: GeneStatus,
    pub loner: bool,
    pub multi_system: bool,
    pub multi_model: bool,
    pub inter_gene_max_space: Option<i32>,
    /// Alternate genes (by arena index) that may substitute for this one.
    pub exchangeables: Vec<GeneId>,
    /// Set when this gene *is* an exchangeable: the primary it substitutes.
    pub primary: Option<GeneId>,
}

impl ModelGene {
    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn is_exchangeable(&self) -> bool {
        self.primary.is_some()
    }
}

/// Owns every `ModelGene` of one model; all cross-references are `GeneId`
/// indices into this vector, never pointers or `Rc` cycles.
#[derive(Debug, Clone, Default)]
pub struct GeneArena {
    genes: Vec<ModelGene>,
}

impl GeneArena {
    pub fn push(&mut self, gene: ModelGene) -> GeneId {
        let id = GeneId(self.genes.len());
        self.genes.push(gene);
        id
    }

    pub fn get(&self, id: GeneId) -> &ModelGene {
        &self.genes[id.0]
    }

    /// Mutable access for post-construction wiring (e.g. resolving
    /// exchangeable names to `GeneId`s once every gene has been pushed).
    pub fn get_mut(&mut self, id: GeneId) -> &mut ModelGene {
        &mut self.genes[id.0]
    }

    /// Resolve an exchangeable back to its primary gene; a primary resolves
    /// to itself.
    pub fn alternate_of(&self, id: GeneId) -> GeneId {
        self.get(id).primary.unwrap_or(id)
    }

    /// The functional name of `id`: the name of its primary gene.
    pub fn function_name(&self, id: GeneId) -> &str {
        self.get(self.alternate_of(id)).name()
    }

    pub fn find_by_name(&self, name: &str) -> Option<GeneId> {
        self.genes
            .iter()
            .position(|g| g.name() == name)
            .map(GeneId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (GeneId, &ModelGene)> {
        self.genes.iter().enumerate().map(|(i, g)| (GeneId(i), g))
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

/// Write-once, read-many registry of `CoreGene`s, shared across models
/// (spec §5: "write-once during setup, read-only during detection").
#[derive(Debug, Clone, Default)]
pub struct GeneBank {
    genes: indexmap::IndexMap<(String, String), CoreGene>,
}

impl GeneBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adding the same `(family_name, name)` twice is a no-op: the bank
    /// returns the existing entry rather than erroring.
    pub fn add_gene(&mut self, family_name: &str, name: &str) -> CoreGene {
        let key = (family_name.to_owned(), name.to_owned());
        self.genes
            .entry(key)
            .or_insert_with(|| CoreGene {
                family_name: family_name.to_owned(),
                name: name.to_owned(),
            })
            .clone()
    }

    pub fn get(&self, family_name: &str, name: &str) -> Option<&CoreGene> {
        self.genes.get(&(family_name.to_owned(), name.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoreGene> {
        self.genes.values()
    }
}
