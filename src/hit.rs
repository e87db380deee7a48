//! Hits: the immutable `CoreHit` value produced by HMM search, and the
//! `ModelHit` tagged sum that binds a `CoreHit` to a model gene (spec §3,
//! §9 Design Notes: "model as a tagged sum, not inheritance").

use serde::{Deserialize, Serialize};

use crate::model::gene::{GeneArena, GeneId, GeneStatus};
use crate::model::CoreGene;

/// An immutable HMM hit against one protein, produced once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreHit {
    pub gene: CoreGene,
    pub hit_id: String,
    pub seq_length: u32,
    pub replicon_name: String,
    pub position: i32,
    pub i_eval: f64,
    pub score: f64,
    pub profile_coverage: f64,
    pub sequence_coverage: f64,
    pub begin_match: u32,
    pub end_match: u32,
}

impl CoreHit {
    /// Ordering used for sort stability: `hit_id`, then `score` as a
    /// tie-breaker (spec §3: "if hit_id equal, by score; else by hit_id
    /// lexicographically").
    pub fn cmp_by_hit_id_then_score(&self, other: &Self) -> std::cmp::Ordering {
        match self.hit_id.cmp(&other.hit_id) {
            std::cmp::Ordering::Equal => self.score.total_cmp(&other.score),
            ordering => ordering,
        }
    }
}

impl PartialEq for CoreHit {
    /// Field-wise equality with an ε=1e-3 tolerance on floating fields
    /// (spec §3).
    fn eq(&self, other: &Self) -> bool {
        self.gene == other.gene
            && self.hit_id == other.hit_id
            && self.seq_length == other.seq_length
            && self.replicon_name == other.replicon_name
            && self.position == other.position
            && self.begin_match == other.begin_match
            && self.end_match == other.end_match
            && float_cmp::approx_eq!(f64, self.i_eval, other.i_eval, epsilon = 1e-3)
            && float_cmp::approx_eq!(f64, self.score, other.score, epsilon = 1e-3)
            && float_cmp::approx_eq!(
                f64,
                self.profile_coverage,
                other.profile_coverage,
                epsilon = 1e-3
            )
            && float_cmp::approx_eq!(
                f64,
                self.sequence_coverage,
                other.sequence_coverage,
                epsilon = 1e-3
            )
    }
}

/// A `CoreHit` bound to the model gene it represents, plus that gene's
/// status at the time of binding.
#[derive(Debug, Clone, PartialEq)]
pub struct HitRecord {
    pub hit: CoreHit,
    pub gene_ref: GeneId,
    pub status: GeneStatus,
}

/// The hit/gene-attribute product, modeled as a tagged sum rather than an
/// inheritance hierarchy (spec §9). `Loner`/`MultiSystem`/`LonerMultiSystem`
/// carry the `counterpart` set of functionally-equivalent hits.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelHit {
    Plain(HitRecord),
    Loner(HitRecord, Vec<HitRecord>),
    MultiSystem(HitRecord, Vec<HitRecord>),
    LonerMultiSystem(HitRecord, Vec<HitRecord>),
}

impl ModelHit {
    pub fn record(&self) -> &HitRecord {
        match self {
            ModelHit::Plain(r)
            | ModelHit::Loner(r, _)
            | ModelHit::MultiSystem(r, _)
            | ModelHit::LonerMultiSystem(r, _) => r,
        }
    }

    pub fn as_core_hit(&self) -> &CoreHit {
        &self.record().hit
    }

    pub fn gene_ref(&self) -> GeneId {
        self.record().gene_ref
    }

    pub fn status(&self) -> GeneStatus {
        self.record().status
    }

    pub fn loner(&self) -> bool {
        matches!(self, ModelHit::Loner(..) | ModelHit::LonerMultiSystem(..))
    }

    pub fn multi_system(&self) -> bool {
        matches!(
            self,
            ModelHit::MultiSystem(..) | ModelHit::LonerMultiSystem(..)
        )
    }

    pub fn counterpart(&self) -> &[HitRecord] {
        match self {
            ModelHit::Plain(_) => &[],
            ModelHit::Loner(_, c) | ModelHit::MultiSystem(_, c) | ModelHit::LonerMultiSystem(_, c) => c,
        }
    }

    /// The weight multiplier this hit contributes *if it stands alone* as a
    /// single-hit cluster (spec §4.6); callers gate this on cluster size.
    pub fn score_multiplier(&self, weights: &HitWeight) -> f64 {
        if self.loner() || self.multi_system() {
            weights.out_of_cluster
        } else {
            1.0
        }
    }
}

/// Configuration: per-status and per-origin scoring weights (spec §3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HitWeight {
    pub itself: f64,
    pub exchangeable: f64,
    pub mandatory: f64,
    pub accessory: f64,
    pub neutral: f64,
    pub out_of_cluster: f64,
}

impl Default for HitWeight {
    fn default() -> Self {
        Self {
            itself: 1.0,
            exchangeable: 0.8,
            mandatory: 1.0,
            accessory: 0.5,
            neutral: 0.0,
            out_of_cluster: 0.7,
        }
    }
}

/// Which quality metric breaks ties among functionally-equivalent hits
/// (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BestHitCriterion {
    #[default]
    Score,
    IEvalue,
    ProfileCoverage,
}

impl BestHitCriterion {
    fn compare(&self, a: &HitRecord, b: &HitRecord) -> std::cmp::Ordering {
        match self {
            BestHitCriterion::Score => a.hit.score.total_cmp(&b.hit.score),
            // Smaller i-evalue is better: invert so `max_by` picks it.
            BestHitCriterion::IEvalue => b.hit.i_eval.total_cmp(&a.hit.i_eval),
            BestHitCriterion::ProfileCoverage => {
                a.hit.profile_coverage.total_cmp(&b.hit.profile_coverage)
            }
        }
    }
}

/// Sort hits by `(position asc, score desc)` — spec §4.2 step 1.
pub fn sort_model_hits(hits: &mut [ModelHit]) {
    hits.sort_by(|a, b| {
        a.as_core_hit()
            .position
            .cmp(&b.as_core_hit().position)
            .then_with(|| b.as_core_hit().score.total_cmp(&a.as_core_hit().score))
    });
}

/// Deduplicate by position, keeping the first occurrence. Assumes `hits`
/// is already sorted by `(position asc, score desc)`, so the kept hit is
/// the highest-scoring one at that position.
pub fn dedup_by_position(hits: Vec<ModelHit>) -> Vec<ModelHit> {
    let mut out: Vec<ModelHit> = Vec::with_capacity(hits.len());
    for hit in hits {
        if out
            .last()
            .map(|last| last.as_core_hit().position)
            .is_some_and(|pos| pos == hit.as_core_hit().position)
        {
            continue;
        }
        out.push(hit);
    }
    out
}

/// Best representative of `function` among `hits`, per `criterion`. Hits
/// whose literal gene name equals `function` are preferred over
/// exchangeables; within each group, `criterion` breaks ties (spec §4.4).
pub fn best_hit<'a>(
    hits: &'a [HitRecord],
    function: &str,
    genes: &GeneArena,
    criterion: BestHitCriterion,
) -> Option<&'a HitRecord> {
    hits.iter().max_by(|a, b| {
        let a_is_primary = genes.get(a.gene_ref).name() == function;
        let b_is_primary = genes.get(b.gene_ref).name() == function;
        a_is_primary
            .cmp(&b_is_primary)
            .then_with(|| criterion.compare(a, b))
    })
}
