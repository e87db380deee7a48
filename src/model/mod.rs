//! Model definitions: genes (§3 `model/gene.rs`) and models (§3 `model/model.rs`).

pub mod gene;
pub mod model;

pub use gene::{CoreGene, GeneArena, GeneBank, GeneId, GeneStatus, ModelGene};
pub use model::{Model, ModelBank};
