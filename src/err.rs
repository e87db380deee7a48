//! Error taxonomy for the detection pipeline (spec §7).

use std::path::PathBuf;

/// All fatal error kinds the core pipeline can raise.
///
/// Warnings (unreferenced profile files, missing README/LICENSE, malformed
/// `GA` lines) are not part of this taxonomy: they are collected or logged,
/// never propagated as an `Err`.
#[derive(thiserror::Error, Debug, Clone)]
pub enum MacsyError {
    /// A model definition is internally inconsistent (e.g. `min_genes_required`
    /// smaller than `min_mandatory_genes_required`, or an unknown gene status).
    #[error("model '{fqn}' is inconsistent: {reason}")]
    ModelInconsistency { fqn: String, reason: String },

    /// A gene referenced by a model has no corresponding HMM profile.
    #[error("model '{fqn}': no profile for gene '{gene}'")]
    MissingProfile { fqn: String, gene: String },

    /// A cluster was asked to hold hits from more than one replicon.
    #[error("cannot build a cluster from hits on different replicons ('{a}' vs '{b}')")]
    MixedReplicon { a: String, b: String },

    /// Two clusters from different models were merged.
    #[error("cannot merge clusters from different models ('{a}' vs '{b}')")]
    ClusterModelMismatch { a: String, b: String },

    /// A `Loner` was built from a hit whose gene is not tagged `loner`.
    #[error("hit '{hit_id}' cannot be a loner: gene '{gene}' is not tagged loner")]
    InvalidLoner { hit_id: String, gene: String },

    /// A `MultiSystem` was built from a hit whose gene is not tagged `multi_system`.
    #[error("hit '{hit_id}' cannot be multi_system: gene '{gene}' is not tagged multi_system")]
    InvalidMultiSystem { hit_id: String, gene: String },

    /// Counterpart hits of a loner/multi-system hit resolve to different functions.
    #[error("counterpart hits for '{gene}' resolve to incompatible functions: {functions:?}")]
    IncompatibleCounterpart { gene: String, functions: Vec<String> },

    /// The external HMM search binary exited with a non-zero, non-termination status.
    #[error("HMM search for gene '{gene}' failed (exit {code}), see {stderr_path}")]
    ExternalSearchFailure {
        gene: String,
        code: i32,
        stderr_path: PathBuf,
    },

    /// A model package on disk is malformed (out-of-scope loaders surface this).
    #[error("model package error: {0}")]
    PackageError(String),

    /// A hit references a gene not known to the gene bank.
    #[error("hit '{hit_id}' references unknown gene '{gene}'")]
    UnknownGene { hit_id: String, gene: String },

    /// A cluster score was requested for a hit whose status is `forbidden`.
    #[error("cluster contains forbidden hit '{hit_id}' ({gene})")]
    ForbiddenHitScored { hit_id: String, gene: String },
}

/// Recoverable condition at the UX level (e.g. a model registry rate limit).
/// Never raised by the core detection pipeline; kept for interface parity
/// with callers that perform model package retrieval (out of scope here).
#[derive(thiserror::Error, Debug, Clone)]
#[error("rate limited, retry later: {0}")]
pub struct DataLimit(pub String);
