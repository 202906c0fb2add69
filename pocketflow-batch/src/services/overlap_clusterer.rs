//! Overlap clustering of detected candidates
//!
//! Two candidates overlap when their centers are within
//! `center_distance_threshold` OR their residue sets have a Jaccard
//! similarity of at least `residue_jaccard_threshold`. Clusters are the
//! connected components of the overlap graph; each cluster is represented
//! by its highest `raw_score` member.

use crate::models::Candidate;
use pocketflow_common::config::DedupSection;
use std::collections::BTreeSet;
use tracing::debug;

/// Default center distance threshold (length units)
pub const DEFAULT_CENTER_DISTANCE_THRESHOLD: f64 = 5.0;

/// Default residue Jaccard threshold
pub const DEFAULT_RESIDUE_JACCARD_THRESHOLD: f64 = 0.75;

/// Groups overlapping candidates and picks one representative per group
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapClusterer {
    pub center_distance_threshold: f64,
    pub residue_jaccard_threshold: f64,
}

impl Default for OverlapClusterer {
    fn default() -> Self {
        Self {
            center_distance_threshold: DEFAULT_CENTER_DISTANCE_THRESHOLD,
            residue_jaccard_threshold: DEFAULT_RESIDUE_JACCARD_THRESHOLD,
        }
    }
}

impl OverlapClusterer {
    pub fn new(center_distance_threshold: f64, residue_jaccard_threshold: f64) -> Self {
        Self {
            center_distance_threshold,
            residue_jaccard_threshold,
        }
    }

    pub fn from_config(config: &DedupSection) -> Self {
        Self::new(
            config.center_distance_threshold,
            config.residue_jaccard_threshold,
        )
    }

    /// Jaccard similarity of two residue sets; two empty sets score 0.0
    pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
        if a.is_empty() && b.is_empty() {
            return 0.0;
        }
        let intersection = a.intersection(b).count();
        let union = a.len() + b.len() - intersection;
        if union == 0 {
            return 0.0;
        }
        intersection as f64 / union as f64
    }

    /// Whether `a` and `b` share an edge in the overlap graph
    pub fn is_overlapping(&self, a: &Candidate, b: &Candidate) -> bool {
        if a.center.distance_to(&b.center) <= self.center_distance_threshold {
            return true;
        }
        Self::jaccard(&a.membership, &b.membership) >= self.residue_jaccard_threshold
    }

    /// Connected components as index lists
    ///
    /// Each cluster is sorted ascending; clusters are ordered by their
    /// lowest index. Every input index appears in exactly one cluster.
    pub fn group(&self, candidates: &[Candidate]) -> Vec<Vec<usize>> {
        let n = candidates.len();
        let mut visited = vec![false; n];
        let mut clusters = Vec::new();
        let mut stack = Vec::new();

        for start in 0..n {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            stack.push(start);
            let mut members = Vec::new();

            while let Some(i) = stack.pop() {
                members.push(i);
                for j in 0..n {
                    if !visited[j] && self.is_overlapping(&candidates[i], &candidates[j]) {
                        visited[j] = true;
                        stack.push(j);
                    }
                }
            }

            members.sort_unstable();
            clusters.push(members);
        }

        clusters
    }

    /// One representative per cluster, in cluster order
    ///
    /// The representative is the member with the highest `raw_score`; ties
    /// go to the lowest input index.
    pub fn deduplicate(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        let clusters = self.group(candidates);
        let representatives: Vec<Candidate> = clusters
            .iter()
            .filter_map(|members| Self::representative(candidates, members))
            .map(|idx| candidates[idx].clone())
            .collect();

        debug!(
            input = candidates.len(),
            clusters = clusters.len(),
            "Overlap clustering complete"
        );

        representatives
    }

    fn representative(candidates: &[Candidate], members: &[usize]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for &idx in members {
            match best {
                Some(b) if candidates[idx].raw_score <= candidates[b].raw_score => {}
                _ => best = Some(idx),
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn residues(prefix: &str, count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("A:{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_empty_and_single_input() {
        let clusterer = OverlapClusterer::default();
        assert!(clusterer.deduplicate(&[]).is_empty());

        let single = vec![Candidate::new((1.0, 2.0, 3.0), 4.0)];
        assert_eq!(clusterer.deduplicate(&single), single);
    }

    #[test]
    fn test_close_centers_merge_keeping_higher_score() {
        let clusterer = OverlapClusterer::default();
        let candidates = vec![
            Candidate::new((0.0, 0.0, 0.0), 3.0).with_membership(residues("ALA", 3)),
            Candidate::new((1.0, 0.0, 0.0), 7.0).with_membership(residues("GLY", 3)),
        ];

        let result = clusterer.deduplicate(&candidates);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].raw_score, 7.0);
    }

    #[test]
    fn test_identical_membership_merges_distant_centers() {
        let clusterer = OverlapClusterer::default();
        let shared = residues("LEU", 10);
        let candidates = vec![
            Candidate::new((0.0, 0.0, 0.0), 2.0).with_membership(shared.clone()),
            Candidate::new((50.0, 0.0, 0.0), 1.0).with_membership(shared),
        ];

        let result = clusterer.deduplicate(&candidates);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].center.x, 0.0);
    }

    #[test]
    fn test_empty_memberships_never_match_by_jaccard() {
        let a = BTreeSet::new();
        let b = BTreeSet::new();
        assert_eq!(OverlapClusterer::jaccard(&a, &b), 0.0);

        let candidates = vec![
            Candidate::new((0.0, 0.0, 0.0), 1.0),
            Candidate::new((100.0, 0.0, 0.0), 1.0),
        ];
        assert_eq!(OverlapClusterer::new(5.0, 0.1).group(&candidates).len(), 2);
    }

    #[test]
    fn test_transitive_chain_forms_one_cluster() {
        let clusterer = OverlapClusterer::default();
        let candidates = vec![
            Candidate::new((0.0, 0.0, 0.0), 1.0),
            Candidate::new((40.0, 0.0, 0.0), 5.0),
            Candidate::new((4.0, 0.0, 0.0), 2.0),
            Candidate::new((8.0, 0.0, 0.0), 3.0),
        ];

        let clusters = clusterer.group(&candidates);
        assert_eq!(clusters, vec![vec![0, 2, 3], vec![1]]);

        let result = clusterer.deduplicate(&candidates);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].raw_score, 3.0);
        assert_eq!(result[1].raw_score, 5.0);
    }

    #[test]
    fn test_score_ties_keep_first_occurrence() {
        let clusterer = OverlapClusterer::default();
        let candidates = vec![
            Candidate::new((0.0, 0.0, 0.0), 5.0).with_membership(["A:ALA1"]),
            Candidate::new((1.0, 0.0, 0.0), 5.0).with_membership(["A:GLY2"]),
        ];

        let result = clusterer.deduplicate(&candidates);
        assert_eq!(result.len(), 1);
        assert!(result[0].membership.contains("A:ALA1"));
    }

    #[test]
    fn test_partial_overlap_below_threshold_stays_separate() {
        let clusterer = OverlapClusterer::default();
        // 2 shared out of 4 distinct: Jaccard 0.5
        let candidates = vec![
            Candidate::new((0.0, 0.0, 0.0), 1.0).with_membership(["A:R1", "A:R2", "A:R3"]),
            Candidate::new((30.0, 0.0, 0.0), 2.0).with_membership(["A:R2", "A:R3", "A:R4"]),
        ];
        assert_eq!(clusterer.deduplicate(&candidates).len(), 2);
    }
}
