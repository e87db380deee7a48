//! Replicon topology and positional information (spec data model).

use serde::{Deserialize, Serialize};

/// Topology of a replicon, controlling whether positions wrap around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Topology {
    Linear,
    Circular,
}

/// Static information about one replicon (chromosome, plasmid, ...).
///
/// `min_pos`/`max_pos` bound the 1-based rank of gene positions along the
/// replicon; `genes` is the ordered `(seq_id, length)` ladder the profile
/// facade assigns positions against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepliconInfo {
    pub name: String,
    pub topology: Topology,
    pub min_pos: i32,
    pub max_pos: i32,
    pub genes: Vec<(String, u32)>,
}

impl RepliconInfo {
    /// Build a replicon whose bounds are derived from the gene ladder: ranks
    /// run `1..=genes.len()`.
    pub fn new(name: impl Into<String>, topology: Topology, genes: Vec<(String, u32)>) -> Self {
        let min_pos = 1;
        let max_pos = genes.len() as i32;
        Self {
            name: name.into(),
            topology,
            min_pos,
            max_pos,
            genes,
        }
    }

    pub fn is_circular(&self) -> bool {
        matches!(self.topology, Topology::Circular)
    }
}
