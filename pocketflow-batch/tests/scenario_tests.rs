//! Worked examples for clustering and cliff analysis

use pocketflow_batch::models::Candidate;
use pocketflow_batch::services::cliff_analyzer::{analyze_cliff, CliffError};
use pocketflow_batch::services::OverlapClusterer;

fn scored(scores: &[f64]) -> Vec<pocketflow_batch::models::ScoredCandidate> {
    scores
        .iter()
        .enumerate()
        .map(|(i, &s)| Candidate::new((i as f64 * 10.0, 0.0, 0.0), 1.0).scored(s))
        .collect()
}

#[test]
fn test_cliff_after_third_candidate() {
    let result = analyze_cliff(&scored(&[10.0, 8.0, 7.0, 3.0, 2.0]), "1abc").unwrap();

    assert_eq!(result.deltas, vec![2.0, 1.0, 4.0, 1.0]);
    assert_eq!(result.max_delta, 4.0);
    assert_eq!(result.cliff_index, 2);
    assert_eq!(result.high_confidence_count, 3);
    assert!(!result.is_top1_dominant);
    assert_eq!(
        result.high_confidence_ids(),
        &[
            "Pocket_1_0.0_0.0_0.0".to_string(),
            "Pocket_2_10.0_0.0_0.0".to_string(),
            "Pocket_3_20.0_0.0_0.0".to_string(),
        ]
    );
}

#[test]
fn test_single_score_is_top1_dominant() {
    let result = analyze_cliff(&scored(&[5.0]), "1abc").unwrap();

    assert!(result.deltas.is_empty());
    assert_eq!(result.cliff_index, 0);
    assert_eq!(result.high_confidence_count, 1);
    assert!(result.is_top1_dominant);
}

#[test]
fn test_empty_scores_are_rejected() {
    assert!(matches!(analyze_cliff(&[], "1abc"), Err(CliffError::InvalidInput(_))));
}

#[test]
fn test_nearby_centers_with_disjoint_residues_merge() {
    let candidates = vec![
        Candidate::new((0.0, 0.0, 0.0), 2.0).with_membership(["A:ALA1", "A:GLY2"]),
        Candidate::new((1.0, 0.0, 0.0), 4.0).with_membership(["B:LEU7", "B:SER8"]),
    ];

    let result = OverlapClusterer::new(5.0, 0.75).deduplicate(&candidates);
    assert_eq!(result, vec![candidates[1].clone()]);
}

#[test]
fn test_distant_centers_with_identical_residues_merge() {
    let residues: Vec<String> = (1..=10).map(|i| format!("A:LYS{}", i)).collect();
    let candidates = vec![
        Candidate::new((0.0, 0.0, 0.0), 3.0).with_membership(residues.clone()),
        Candidate::new((50.0, 0.0, 0.0), 1.0).with_membership(residues),
    ];

    let clusterer = OverlapClusterer::default();
    assert_eq!(clusterer.group(&candidates), vec![vec![0, 1]]);
    assert_eq!(clusterer.deduplicate(&candidates), vec![candidates[0].clone()]);
}
