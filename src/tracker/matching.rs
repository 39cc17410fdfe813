//! Matching utilities for blob-to-track association.

use ndarray::Array2;

use crate::tracker::blob::{Blob, Point};

/// Cost assigned to pairs outside the gate. Never accepted as a match.
pub const INFEASIBLE: f64 = f64::INFINITY;

/// Compute the association cost between predicted track positions and blobs.
///
/// The cost is the squared distance between prediction and centroid plus an
/// optional area term `area_weight * gate^2 * relative_area_difference`.
/// Pairs farther than `gating_distance` are marked [`INFEASIBLE`].
pub fn association_costs(
    predictions: &[(Point, f64)],
    blobs: &[Blob],
    gating_distance: f64,
    area_weight: f64,
) -> Array2<f64> {
    let gate_sq = gating_distance * gating_distance;
    let mut costs = Array2::from_elem((predictions.len(), blobs.len()), INFEASIBLE);
    for (i, (position, area)) in predictions.iter().enumerate() {
        for (j, blob) in blobs.iter().enumerate() {
            let dist_sq = position.distance_sq(&blob.center);
            if dist_sq > gate_sq {
                continue;
            }
            costs[[i, j]] = dist_sq + area_weight * gate_sq * relative_area_difference(*area, blob.area);
        }
    }
    costs
}

/// `|a - b| / max(a, b)`, zero when both are zero.
fn relative_area_difference(a: f64, b: f64) -> f64 {
    let largest = a.max(b);
    if largest > 0.0 {
        (a - b).abs() / largest
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Minimum-cost bipartite assignment. Non-finite costs are never matched.
///
/// The solver first maximises the number of feasible matches, then
/// minimises their total cost. Rows must be ordered by ascending track id.
/// Exact ties are resolved in favour of lower rows: lower ids are matched
/// first, and among equal-cost permutations lower rows take lower columns.
pub fn linear_assignment(cost_matrix: &Array2<f64>) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: vec![],
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    if num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: vec![],
        };
    }

    let size = num_rows.max(num_cols);
    let max_feasible = cost_matrix
        .iter()
        .filter(|c| c.is_finite())
        .fold(0.0_f64, |acc, &c| acc.max(c));
    // Any single padded or infeasible cell outweighs a whole feasible assignment.
    let blocked = (max_feasible + 1.0) * (size as f64 + 1.0);
    let mut padded = Array2::<f64>::from_elem((size, size), blocked);

    // The row term outweighs every permutation term, and both stay far
    // below one squared pixel.
    let row_eps = 1e-6;
    let perm_eps = row_eps / ((num_rows * num_cols) as f64 + 1.0);
    for i in 0..num_rows {
        for j in 0..num_cols {
            let cost = cost_matrix[[i, j]];
            padded[[i, j]] = if !cost.is_finite() {
                blocked
            } else {
                cost + row_eps * i as f64 + perm_eps * (num_rows * num_cols - i * j) as f64
            };
        }
    }

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask: Vec<bool> = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate().take(num_rows) {
                if col_idx < num_cols && cost_matrix[[row_idx, col_idx]].is_finite() {
                    matches.push((row_idx, col_idx));
                    unmatched_detections_mask[col_idx] = false;
                } else {
                    unmatched_tracks.push(row_idx);
                }
            }
        }
        Err(err) => {
            tracing::warn!(error = ?err, rows = num_rows, cols = num_cols, "assignment solver failed");
            unmatched_tracks = (0..num_rows).collect();
        }
    }

    let unmatched_detections: Vec<usize> = unmatched_detections_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| if u { Some(i) } else { None })
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(x: f64, y: f64) -> Blob {
        Blob::new(x, y, 30.0, 15.0, 400.0, 0)
    }

    #[test]
    fn test_costs_respect_gate() {
        let predictions = [(Point::new(0.0, 0.0), 400.0)];
        let blobs = [blob(3.0, 4.0), blob(100.0, 0.0)];
        let costs = association_costs(&predictions, &blobs, 50.0, 0.0);
        assert_eq!(costs[[0, 0]], 25.0);
        assert_eq!(costs[[0, 1]], INFEASIBLE);
    }

    #[test]
    fn test_area_term() {
        let predictions = [(Point::new(0.0, 0.0), 200.0)];
        let blobs = [blob(0.0, 0.0)];
        let costs = association_costs(&predictions, &blobs, 10.0, 1.0);
        // 100 * |200 - 400| / 400
        assert!((costs[[0, 0]] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_minimum_total_cost_beats_greedy() {
        // Greedy nearest-neighbour would give row 0 column 0 (cost 1) and
        // leave row 1 with cost 100; the optimum is 4 + 4.
        let costs = ndarray::arr2(&[[1.0, 4.0], [4.0, 100.0]]);
        let result = linear_assignment(&costs);
        let mut matches = result.matches.clone();
        matches.sort();
        assert_eq!(matches, vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_infeasible_pairs_stay_unmatched() {
        let costs = ndarray::arr2(&[[INFEASIBLE], [9.0]]);
        let result = linear_assignment(&costs);
        assert_eq!(result.matches, vec![(1, 0)]);
        assert_eq!(result.unmatched_tracks, vec![0]);
        assert!(result.unmatched_detections.is_empty());
    }

    #[test]
    fn test_tie_prefers_lower_track() {
        let costs = ndarray::arr2(&[[4.0], [4.0]]);
        let result = linear_assignment(&costs);
        assert_eq!(result.matches, vec![(0, 0)]);
        assert_eq!(result.unmatched_tracks, vec![1]);
    }

    #[test]
    fn test_tie_permutation_keeps_order() {
        let costs = ndarray::arr2(&[[4.0, 4.0], [4.0, 4.0]]);
        let result = linear_assignment(&costs);
        assert_eq!(result.matches, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_empty_inputs() {
        let no_tracks = Array2::<f64>::zeros((0, 2));
        assert_eq!(linear_assignment(&no_tracks).unmatched_detections, vec![0, 1]);

        let no_blobs = Array2::<f64>::zeros((3, 0));
        assert_eq!(linear_assignment(&no_blobs).unmatched_tracks, vec![0, 1, 2]);
    }
}
