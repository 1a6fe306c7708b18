//! 1D clustering of collinear line candidates.

use super::hough::LineCandidate;

/// Merge candidates whose positions lie within `eps` of their neighbour into
/// single lines. Cluster position is the strength-weighted mean; clusters
/// below `min_strength` total support are dropped.
pub fn cluster_candidates(
    mut candidates: Vec<LineCandidate>,
    eps: f32,
    min_strength: f32,
) -> Vec<LineCandidate> {
    if candidates.is_empty() {
        return Vec::new();
    }
    candidates.sort_by(|a, b| {
        a.position
            .partial_cmp(&b.position)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut merged: Vec<LineCandidate> = Vec::new();
    let mut cur: Vec<LineCandidate> = Vec::new();
    for c in candidates.into_iter() {
        if cur.is_empty() || (c.position - cur.last().unwrap().position).abs() <= eps {
            cur.push(c);
        } else {
            if let Some(line) = collapse(&cur, min_strength) {
                merged.push(line);
            }
            cur = vec![c];
        }
    }
    if let Some(line) = collapse(&cur, min_strength) {
        merged.push(line);
    }
    merged
}

fn collapse(cluster: &[LineCandidate], min_strength: f32) -> Option<LineCandidate> {
    let total: f32 = cluster.iter().map(|c| c.strength).sum();
    if total < min_strength {
        return None;
    }
    let position = cluster.iter().map(|c| c.position * c.strength).sum::<f32>() / total;
    Some(LineCandidate {
        position,
        strength: total,
    })
}
