//! Host selection among scored nodes.
//!
//! Order: higher score first, then the lower post-placement dominant
//! ratio, then node name. The result is independent of the order in
//! which per-node scoring finished.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// One scored candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeScore {
    pub node: String,
    pub score: i64,
    pub dominant_ratio: f64,
}

fn compare(a: &NodeScore, b: &NodeScore) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.dominant_ratio.total_cmp(&b.dominant_ratio))
        .then_with(|| a.node.cmp(&b.node))
}

/// Sort best-first in place and return the winner, if any.
pub fn rank(scores: &mut [NodeScore]) -> Option<&NodeScore> {
    scores.sort_by(compare);
    scores.first()
}
