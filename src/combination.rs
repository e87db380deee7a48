//! Combination generator: candidate sets of clusters crossed with loner /
//! multi-system subsets, under the overlap veto of spec §4.5.

use std::collections::BTreeSet;

use crate::cluster::Cluster;
use crate::model::gene::GeneArena;
use crate::system::RejectedCandidate;

/// All non-empty subsets of a slice, as index sets. `2^n - 1` subsets; the
/// combination generator is only ever invoked per `(replicon, model)` pair
/// where `n` is small (a handful of clusters/loners), so this is fine.
fn non_empty_index_subsets(n: usize) -> Vec<Vec<usize>> {
    if n == 0 {
        return Vec::new();
    }
    let mut subsets = Vec::with_capacity((1usize << n) - 1);
    for mask in 1..(1usize << n) {
        let subset: Vec<usize> = (0..n).filter(|i| mask & (1 << i) != 0).collect();
        subsets.push(subset);
    }
    subsets
}

/// One candidate combination: the clusters it draws from, ready for
/// validation into a `System` (spec §4.6).
#[derive(Debug, Clone)]
pub struct Combination {
    pub clusters: Vec<Cluster>,
}

/// §4.5: cluster subsets (singletons, or all non-empty subsets when
/// `multi_loci`) crossed with loner subsets under the overlap veto.
pub fn combine_clusters(
    true_clusters: &[Cluster],
    true_loners: &std::collections::BTreeMap<String, Cluster>,
    multi_loci: bool,
    genes: &GeneArena,
) -> Vec<Combination> {
    let cluster_subsets: Vec<Vec<usize>> = if multi_loci {
        non_empty_index_subsets(true_clusters.len())
    } else {
        (0..true_clusters.len()).map(|i| vec![i]).collect()
    };

    let loner_functions: Vec<&String> = true_loners.keys().collect();
    let loner_subsets = non_empty_index_subsets(loner_functions.len());

    let mut combinations = Vec::new();

    // Bare cluster subsets (no loners attached).
    for subset in &cluster_subsets {
        combinations.push(Combination {
            clusters: subset.iter().map(|&i| true_clusters[i].clone()).collect(),
        });
    }

    for loner_subset in &loner_subsets {
        let functions: BTreeSet<&str> = loner_subset
            .iter()
            .map(|&i| loner_functions[i].as_str())
            .collect();
        let loner_clusters: Vec<Cluster> = loner_subset
            .iter()
            .map(|&i| true_loners[loner_functions[i]].clone())
            .collect();

        // The loner subset alone (pure-loner systems, or `min_genes_required
        // == 1` plus one loner).
        combinations.push(Combination {
            clusters: loner_clusters.clone(),
        });

        for subset in &cluster_subsets {
            let already_fulfilled = subset
                .iter()
                .any(|&i| functions.iter().any(|f| true_clusters[i].fulfilled_function(genes, f)));
            if already_fulfilled {
                continue;
            }
            let mut clusters: Vec<Cluster> = subset.iter().map(|&i| true_clusters[i].clone()).collect();
            clusters.extend(loner_clusters.iter().cloned());
            combinations.push(Combination { clusters });
        }
    }

    combinations
}

/// Multi-system re-combination for rejected candidates (spec §4.5): for each
/// non-empty subset of multi-system singleton clusters, append it to a
/// rejected candidate iff the candidate does not already fulfill any of the
/// subset's functions.
pub fn combine_multisystems(
    rejected: &[RejectedCandidate],
    multi_system_clusters: &[Cluster],
    genes: &GeneArena,
) -> Vec<Combination> {
    let subsets = non_empty_index_subsets(multi_system_clusters.len());
    let mut combinations = Vec::new();

    for candidate in rejected {
        for subset in &subsets {
            let functions: BTreeSet<String> = subset
                .iter()
                .flat_map(|&i| multi_system_clusters[i].functions(genes))
                .collect();
            let already_fulfilled = candidate
                .clusters
                .iter()
                .any(|c| functions.iter().any(|f| c.fulfilled_function(genes, f)));
            if already_fulfilled {
                continue;
            }
            let mut clusters = candidate.clusters.clone();
            clusters.extend(subset.iter().map(|&i| multi_system_clusters[i].clone()));
            combinations.push(Combination { clusters });
        }
    }

    combinations
}
