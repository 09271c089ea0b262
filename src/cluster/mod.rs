// SPDX-License-Identifier: Apache-2.0

//! Clusterer: wraps the `dbscan` crate to turn a frame's region-filtered
//! points into [`RawCluster`]s. Label values are not stable across frames —
//! that stability is the Tracker's job (see [`tracker`]).

pub mod tracker;

use dbscan::{Classification, Model};

use crate::types::{Point, RawCluster, NOISE_CLUSTER_ID, UNPROCESSED_CLUSTER_ID};

/// Runs DBSCAN over every point not already tagged unprocessed, writing the
/// raw (frame-local) label back into `point.cluster_id` and returning one
/// [`RawCluster`] per non-noise label. Unprocessed points are left untouched.
pub fn cluster(points: &mut [Point], eps: f64, min_samples: usize) -> Vec<RawCluster> {
    let eligible: Vec<usize> = (0..points.len())
        .filter(|&i| points[i].cluster_id != UNPROCESSED_CLUSTER_ID)
        .collect();

    if eligible.is_empty() {
        return Vec::new();
    }

    let data: Vec<Vec<f32>> = eligible
        .iter()
        .map(|&i| vec![points[i].x, points[i].y, points[i].z])
        .collect();

    let labels = Model::new(eps, min_samples).run(&data);

    let mut by_label: std::collections::BTreeMap<usize, Vec<usize>> = std::collections::BTreeMap::new();

    for (pos, label) in eligible.iter().zip(labels.iter()) {
        match label {
            Classification::Noise => {
                points[*pos].cluster_id = NOISE_CLUSTER_ID;
            }
            Classification::Core(id) | Classification::Edge(id) => {
                points[*pos].cluster_id = *id as i32;
                by_label.entry(*id).or_default().push(*pos);
            }
        }
    }

    by_label
        .into_values()
        .map(|indices| {
            let n = indices.len() as f32;
            let (mut sx, mut sy, mut sz) = (0.0, 0.0, 0.0);
            for &i in &indices {
                sx += points[i].x;
                sy += points[i].y;
                sz += points[i].z;
            }
            RawCluster {
                points: indices,
                centroid: (sx / n, sy / n, sz / n),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    fn p(x: f32, y: f32, z: f32) -> Point {
        Point::new(x, y, z, 0, 0, 0, 0.0)
    }

    #[test]
    fn two_tight_groups_yield_two_clusters() {
        let mut points = vec![
            p(0.0, 0.0, 0.0),
            p(0.05, 0.0, 0.0),
            p(0.0, 0.05, 0.0),
            p(10.0, 10.0, 10.0),
            p(10.05, 10.0, 10.0),
            p(10.0, 10.05, 10.0),
        ];
        let clusters = cluster(&mut points, 0.2, 2);
        assert_eq!(clusters.len(), 2);
        for c in &clusters {
            assert_eq!(c.points.len(), 3);
        }
    }

    #[test]
    fn isolated_point_is_noise() {
        let mut points = vec![p(0.0, 0.0, 0.0), p(0.05, 0.0, 0.0), p(500.0, 500.0, 500.0)];
        let clusters = cluster(&mut points, 0.2, 2);
        assert_eq!(clusters.len(), 1);
        assert_eq!(points[2].cluster_id, NOISE_CLUSTER_ID);
    }

    #[test]
    fn unprocessed_points_are_skipped_entirely() {
        let mut points = vec![p(0.0, 0.0, 0.0), p(0.05, 0.0, 0.0)];
        points[1].cluster_id = UNPROCESSED_CLUSTER_ID;
        let clusters = cluster(&mut points, 0.2, 2);
        assert!(clusters.is_empty());
        assert_eq!(points[1].cluster_id, UNPROCESSED_CLUSTER_ID);
    }

    #[test]
    fn centroid_is_mean_of_member_points() {
        let mut points = vec![p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0), p(1.0, 2.0, 0.0)];
        let clusters = cluster(&mut points, 5.0, 1);
        assert_eq!(clusters.len(), 1);
        let (cx, cy, cz) = clusters[0].centroid;
        assert!((cx - 1.0).abs() < 1e-5);
        assert!((cy - 0.666_666_7).abs() < 1e-5);
        assert_eq!(cz, 0.0);
    }
}
