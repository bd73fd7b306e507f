//! Clustered maximal marginal relevance
//!
//! The scored pool is first grouped into clusters of mutually close item
//! vectors. Greedy MMR then picks `k` items, trading similarity to the request
//! against similarity to what is already selected, and within a near-tie band
//! prefers clusters that are not yet represented.

use ahash::AHashSet;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use shortlist_core::{Error, RankSignal, Result, ScoredCandidate};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversityParams {
    /// 1.0 is pure relevance, 0.0 is pure novelty
    pub lambda: f32,
    pub cluster_size: usize,
    /// Marginal scores within this distance of the best are treated as tied
    pub tie_tolerance: f32,
}

impl Default for DiversityParams {
    fn default() -> Self {
        Self { lambda: 0.7, cluster_size: 4, tie_tolerance: 0.05 }
    }
}

impl DiversityParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.lambda) {
            return Err(Error::InvalidLambda(self.lambda));
        }
        if self.cluster_size == 0 {
            return Err(Error::InvalidClusterSize);
        }
        if !self.tie_tolerance.is_finite() || self.tie_tolerance < 0.0 {
            return Err(Error::InvalidTolerance(self.tie_tolerance));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diversified {
    /// Selected candidates in pick order, each with the signal that placed it
    pub picks: Vec<(ScoredCandidate, RankSignal)>,
    /// Number of clusters the pool was partitioned into
    pub clusters: usize,
}

/// Greedy nearest-neighbor grouping over a similarity-sorted pool.
///
/// The first unassigned item seeds a cluster and pulls in the
/// `cluster_size - 1` unassigned items closest to it; ties go to the earlier
/// pool position. Returns the number of clusters.
pub fn assign_clusters(pool: &mut [ScoredCandidate], cluster_size: usize) -> usize {
    let cluster_size = cluster_size.max(1);
    let mut assignment: Vec<Option<usize>> = vec![None; pool.len()];
    let mut next_cluster = 0;

    for seed in 0..pool.len() {
        if assignment[seed].is_some() {
            continue;
        }
        assignment[seed] = Some(next_cluster);

        let mut neighbors: Vec<(usize, f32)> = (seed + 1..pool.len())
            .filter(|&i| assignment[i].is_none())
            .map(|i| (i, pool[seed].vector.cosine_similarity(&pool[i].vector)))
            .collect();
        neighbors.sort_by_key(|&(i, sim)| (Reverse(OrderedFloat(sim)), i));

        for (i, _) in neighbors.into_iter().take(cluster_size - 1) {
            assignment[i] = Some(next_cluster);
        }
        next_cluster += 1;
    }

    for (candidate, cluster) in pool.iter_mut().zip(assignment) {
        candidate.cluster = cluster;
    }
    next_cluster
}

/// Select up to `k` candidates from a similarity-sorted pool
pub fn diversify(mut pool: Vec<ScoredCandidate>, k: usize, params: &DiversityParams) -> Diversified {
    let clusters = assign_clusters(&mut pool, params.cluster_size);

    if pool.len() < k || clusters <= 1 || params.lambda >= 1.0 {
        pool.truncate(k);
        return Diversified {
            picks: pool.into_iter().map(|c| (c, RankSignal::Similarity)).collect(),
            clusters,
        };
    }

    let lambda = params.lambda;
    let mut remaining: Vec<usize> = (0..pool.len()).collect();
    // max similarity of each pool entry to anything selected so far
    let mut redundancy: Vec<f32> = vec![0.0; pool.len()];
    let mut represented: AHashSet<usize> = AHashSet::new();
    let mut previous: Option<usize> = None;
    let mut order: Vec<(usize, RankSignal)> = Vec::with_capacity(k);

    while order.len() < k && !remaining.is_empty() {
        let cluster_of = |i: usize| pool[i].cluster.unwrap_or(usize::MAX);
        let marginal = |i: usize| lambda * pool[i].similarity - (1.0 - lambda) * redundancy[i];

        // pure novelty never repeats the previous cluster while another remains
        let eligible: Vec<usize> = match previous {
            Some(prev) if lambda <= 0.0 && remaining.iter().any(|&i| cluster_of(i) != prev) => {
                remaining.iter().copied().filter(|&i| cluster_of(i) != prev).collect()
            }
            _ => remaining.clone(),
        };

        let best = eligible
            .iter()
            .map(|&i| marginal(i))
            .fold(f32::NEG_INFINITY, f32::max);
        let floor = best - params.tie_tolerance;

        let chosen = eligible
            .iter()
            .copied()
            .filter(|&i| marginal(i) >= floor)
            .min_by_key(|&i| {
                let cluster = cluster_of(i);
                (
                    represented.contains(&cluster),
                    previous == Some(cluster),
                    Reverse(OrderedFloat(marginal(i))),
                    i,
                )
            });
        let Some(chosen) = chosen else {
            break;
        };

        // remaining stays in pool order, so its head is the pure-similarity pick
        let signal = if remaining[0] == chosen { RankSignal::Similarity } else { RankSignal::Diversity };
        remaining.retain(|&i| i != chosen);

        for &i in &remaining {
            let sim = pool[i].vector.cosine_similarity(&pool[chosen].vector);
            if sim > redundancy[i] {
                redundancy[i] = sim;
            }
        }

        let cluster = cluster_of(chosen);
        represented.insert(cluster);
        previous = Some(cluster);
        order.push((chosen, signal));
    }

    let mut slots: Vec<Option<ScoredCandidate>> = pool.into_iter().map(Some).collect();
    let picks = order
        .into_iter()
        .filter_map(|(i, signal)| slots[i].take().map(|c| (c, signal)))
        .collect();

    Diversified { picks, clusters }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortlist_core::{CatalogItem, TokenVector};
    use std::sync::Arc;

    /// Candidate whose vector is the make token plus a shared body token
    fn candidate(id: &str, make: &str, similarity: f32) -> ScoredCandidate {
        let vector = TokenVector::from_weights([(format!("make:{make}"), 3.0), ("body_style:suv".to_string(), 0.5)]);
        ScoredCandidate::new(Arc::new(CatalogItem::new(id)), Arc::new(vector), similarity)
    }

    /// Two tight groups: four hondas above four mazdas
    fn two_group_pool() -> Vec<ScoredCandidate> {
        vec![
            candidate("h1", "honda", 0.95),
            candidate("h2", "honda", 0.94),
            candidate("h3", "honda", 0.93),
            candidate("h4", "honda", 0.92),
            candidate("m1", "mazda", 0.90),
            candidate("m2", "mazda", 0.89),
            candidate("m3", "mazda", 0.88),
            candidate("m4", "mazda", 0.87),
        ]
    }

    fn ids(d: &Diversified) -> Vec<&str> {
        d.picks.iter().map(|(c, _)| c.id().as_str()).collect()
    }

    #[test]
    fn test_params_validate() {
        assert!(DiversityParams::default().validate().is_ok());
        assert!(matches!(
            DiversityParams { lambda: 1.5, ..Default::default() }.validate(),
            Err(Error::InvalidLambda(_))
        ));
        assert!(matches!(
            DiversityParams { cluster_size: 0, ..Default::default() }.validate(),
            Err(Error::InvalidClusterSize)
        ));
        assert!(matches!(
            DiversityParams { tie_tolerance: f32::NAN, ..Default::default() }.validate(),
            Err(Error::InvalidTolerance(_))
        ));
    }

    #[test]
    fn test_clusters_group_close_vectors() {
        let mut pool = two_group_pool();
        let clusters = assign_clusters(&mut pool, 4);
        assert_eq!(clusters, 2);
        assert!(pool[..4].iter().all(|c| c.cluster == Some(0)));
        assert!(pool[4..].iter().all(|c| c.cluster == Some(1)));
    }

    #[test]
    fn test_lambda_one_is_similarity_order() {
        let params = DiversityParams { lambda: 1.0, ..Default::default() };
        let d = diversify(two_group_pool(), 4, &params);
        assert_eq!(ids(&d), vec!["h1", "h2", "h3", "h4"]);
        assert!(d.picks.iter().all(|(_, s)| *s == RankSignal::Similarity));
    }

    #[test]
    fn test_default_lambda_interleaves_clusters() {
        let d = diversify(two_group_pool(), 4, &DiversityParams::default());
        let picked = ids(&d);
        assert_eq!(picked[0], "h1");
        assert_eq!(picked[1], "m1");
        assert_eq!(d.picks[1].1, RankSignal::Diversity);
        assert!(picked.iter().any(|id| id.starts_with('m')));
    }

    #[test]
    fn test_lambda_zero_never_repeats_cluster() {
        let params = DiversityParams { lambda: 0.0, ..Default::default() };
        let d = diversify(two_group_pool(), 6, &params);
        let clusters: Vec<usize> = d.picks.iter().map(|(c, _)| c.cluster.unwrap()).collect();
        assert_eq!(clusters.len(), 6);
        assert!(clusters.windows(2).all(|w| w[0] != w[1]), "{:?}", clusters);
    }

    #[test]
    fn test_exactly_full_pool_is_diversified() {
        let pool: Vec<_> = two_group_pool().into_iter().take(6).collect();
        let params = DiversityParams { lambda: 0.0, cluster_size: 3, ..Default::default() };
        let d = diversify(pool, 6, &params);

        let clusters: Vec<usize> = d.picks.iter().map(|(c, _)| c.cluster.unwrap()).collect();
        assert_eq!(d.clusters, 2);
        assert_eq!(clusters.len(), 6);
        assert!(clusters.windows(2).all(|w| w[0] != w[1]), "{:?}", clusters);

        let mut picked = ids(&d);
        picked.sort_unstable();
        assert_eq!(picked, vec!["h1", "h2", "h3", "h4", "m1", "m2"]);
    }

    #[test]
    fn test_small_pool_returns_everything_sorted() {
        let pool: Vec<_> = two_group_pool().into_iter().take(3).collect();
        let d = diversify(pool, 10, &DiversityParams { lambda: 0.0, ..Default::default() });
        assert_eq!(ids(&d), vec!["h1", "h2", "h3"]);
    }

    #[test]
    fn test_k_bound_and_determinism() {
        let a = diversify(two_group_pool(), 5, &DiversityParams::default());
        let b = diversify(two_group_pool(), 5, &DiversityParams::default());
        assert_eq!(a.picks.len(), 5);
        assert_eq!(ids(&a), ids(&b));
    }
}
