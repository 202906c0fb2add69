//! Recall of ranked predictions against known sites

use crate::models::Center;

/// Default hit distance (length units)
pub const DEFAULT_HIT_THRESHOLD: f64 = 4.0;

/// Top-(n+2) recall
///
/// With `n` known sites, only the first `n + 2` predictions are considered.
/// Returns the fraction of known sites with at least one of those
/// predictions within `hit_threshold`. An empty site list yields 0.0.
pub fn recall_top_n_plus_2(predicted: &[Center], known_sites: &[Center], hit_threshold: f64) -> f64 {
    let n = known_sites.len();
    let considered = &predicted[..predicted.len().min(n + 2)];

    let hits = known_sites
        .iter()
        .filter(|site| considered.iter().any(|p| p.distance_to(site) <= hit_threshold))
        .count();

    hits as f64 / n.max(1) as f64
}
