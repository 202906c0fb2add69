//! Candidate binding sites
//!
//! A [`Candidate`] is produced by the detection tool and never modified
//! afterwards. Rescoring wraps it in a [`ScoredCandidate`] carrying the
//! second, independent score.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Geometric center of a candidate site
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Center {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Center {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another center
    pub fn distance_to(&self, other: &Center) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Centroid of a set of points, `None` when empty
    pub fn centroid<I>(points: I) -> Option<Center>
    where
        I: IntoIterator<Item = Center>,
    {
        let mut sum = Center::default();
        let mut count = 0usize;
        for p in points {
            sum.x += p.x;
            sum.y += p.y;
            sum.z += p.z;
            count += 1;
        }
        if count == 0 {
            return None;
        }
        let n = count as f64;
        Some(Center::new(sum.x / n, sum.y / n, sum.z / n))
    }
}

impl From<(f64, f64, f64)> for Center {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self { x, y, z }
    }
}

/// Candidate site from the detection stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Site center
    pub center: Center,
    /// Detection-stage score
    pub raw_score: f64,
    /// Residue identifiers lining the site (may be empty)
    pub membership: BTreeSet<String>,
}

impl Candidate {
    pub fn new(center: impl Into<Center>, raw_score: f64) -> Self {
        Self {
            center: center.into(),
            raw_score,
            membership: BTreeSet::new(),
        }
    }

    /// Builder-style membership setter
    pub fn with_membership<I, S>(mut self, residues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.membership = residues.into_iter().map(Into::into).collect();
        self
    }

    /// Attach a rescoring score
    pub fn scored(self, score: f64) -> ScoredCandidate {
        ScoredCandidate {
            candidate: self,
            score,
        }
    }
}

/// Candidate plus its post-rescoring score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    /// Rescoring score, not comparable to `raw_score`
    pub score: f64,
}

impl ScoredCandidate {
    pub fn center(&self) -> &Center {
        &self.candidate.center
    }

    pub fn raw_score(&self) -> f64 {
        self.candidate.raw_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Center::new(0.0, 0.0, 0.0);
        let b = Center::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance_to(&b), 5.0);
        assert_eq!(b.distance_to(&a), 5.0);
    }

    #[test]
    fn test_centroid() {
        let c = Center::centroid(vec![
            Center::new(0.0, 0.0, 0.0),
            Center::new(2.0, 4.0, 6.0),
        ])
        .unwrap();
        assert_eq!(c, Center::new(1.0, 2.0, 3.0));
        assert!(Center::centroid(Vec::new()).is_none());
    }

    #[test]
    fn test_membership_is_a_set() {
        let c = Candidate::new((0.0, 0.0, 0.0), 1.0).with_membership(["A:ALA1", "A:ALA1", "A:GLY2"]);
        assert_eq!(c.membership.len(), 2);
    }
}
