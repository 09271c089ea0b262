// SPDX-License-Identifier: Apache-2.0

//! Tracker: assigns stable ids to [`RawCluster`]s across frames by nearest
//! centroid matching, and derives the per-cluster kinematics broadcast to
//! viewers. A linear scan over live tracks stands in for a k-d tree, which
//! the design explicitly allows below roughly a hundred simultaneous tracks.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::Configuration;
use crate::types::{BoundingBox, ClusterInfo, Point, RawCluster, Track};

/// Proximity threshold below which a moved cluster is reported as stationary.
const MOVED_EPS: f32 = 0.1;
/// Proximity-to-origin threshold that raises a per-frame alert.
const ALERT_RANGE: f32 = 0.5;

#[derive(Debug, Default)]
pub struct Tracker {
    tracks: BTreeMap<i32, Track>,
    reusable_ids: BTreeSet<i32>,
    next_id: i32,
}

fn dist(a: (f32, f32, f32), b: (f32, f32, f32)) -> f32 {
    let (dx, dy, dz) = (a.0 - b.0, a.1 - b.1, a.2 - b.2);
    (dx * dx + dy * dy + dz * dz).sqrt()
}

fn bbox_of(points: &[Point], indices: &[usize]) -> BoundingBox {
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for &i in indices {
        let p = &points[i];
        for (axis, v) in [p.x, p.y, p.z].into_iter().enumerate() {
            min[axis] = min[axis].min(v);
            max[axis] = max[axis].max(v);
        }
    }
    BoundingBox { min, max }
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an id not already claimed this frame. `used` tracks every id
    /// assigned so far in the current `track()` call (matched or newly
    /// allocated) so two unmatched clusters in the same frame never collide.
    fn allocate_id(&mut self, used: &mut BTreeSet<i32>, max_cluster_id: i32) -> i32 {
        if let Some(&id) = self.reusable_ids.iter().find(|id| !used.contains(*id)) {
            self.reusable_ids.remove(&id);
            used.insert(id);
            return id;
        }

        for candidate in 0..max_cluster_id {
            if !self.tracks.contains_key(&candidate) && !used.contains(&candidate) {
                used.insert(candidate);
                return candidate;
            }
        }

        // Reuse pool and gap scan both exhausted: take `next_id` and advance
        // unconditionally, matching the reference implementation's
        // `cid = next_cluster_id; next_cluster_id = (next_cluster_id + 1) %
        // MAX_CLUSTER_ID` — no further collision search at this step.
        let id = self.next_id;
        self.next_id = (self.next_id + 1) % max_cluster_id.max(1);
        used.insert(id);
        id
    }

    /// Matches this frame's raw clusters against the live track set, writes
    /// the assigned stable id back into each member point's `cluster_id`,
    /// and returns the per-cluster broadcast info plus any proximity alerts.
    pub fn track(
        &mut self,
        clusters: &[RawCluster],
        points: &mut [Point],
        cfg: &Configuration,
        frame_number: u64,
    ) -> (BTreeMap<i32, ClusterInfo>, Vec<String>) {
        let mut used_ids: BTreeSet<i32> = BTreeSet::new();
        let mut assignments: Vec<(i32, &RawCluster, bool)> = Vec::with_capacity(clusters.len());

        for cluster in clusters {
            // Single nearest-previous-track query, first-come-wins: if the
            // closest track within range was already claimed by an earlier
            // cluster this frame, fall back to a new id rather than
            // re-searching for a second-nearest previous track.
            let best = self
                .tracks
                .iter()
                .map(|(id, t)| (*id, dist(t.centroid, cluster.centroid)))
                .filter(|(_, d)| *d <= cfg.max_match_dist)
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

            match best {
                Some((id, _)) if !used_ids.contains(&id) => {
                    used_ids.insert(id);
                    assignments.push((id, cluster, true));
                }
                _ => {
                    let id = self.allocate_id(&mut used_ids, cfg.max_cluster_id);
                    assignments.push((id, cluster, false));
                }
            }
        }

        let mut new_tracks = BTreeMap::new();
        let mut out = BTreeMap::new();
        let mut alerts = Vec::new();

        for (id, cluster, was_matched) in assignments {
            for &i in &cluster.points {
                points[i].cluster_id = id;
            }

            let velocity = if was_matched {
                let prev = self.tracks[&id];
                let dx = (cluster.centroid.0 - prev.centroid.0) / cfg.frame_dt_sec;
                let dy = (cluster.centroid.1 - prev.centroid.1) / cfg.frame_dt_sec;
                let dz = (cluster.centroid.2 - prev.centroid.2) / cfg.frame_dt_sec;
                (dx, dy, dz)
            } else {
                (0.0, 0.0, 0.0)
            };

            let moved = if was_matched {
                dist(self.tracks[&id].centroid, cluster.centroid) > MOVED_EPS
            } else {
                true
            };

            new_tracks.insert(
                id,
                Track {
                    id,
                    centroid: cluster.centroid,
                    velocity,
                    last_seen_frame: frame_number,
                },
            );

            let speed = (velocity.0 * velocity.0 + velocity.1 * velocity.1 + velocity.2 * velocity.2).sqrt();
            let range = (cluster.centroid.0 * cluster.centroid.0
                + cluster.centroid.1 * cluster.centroid.1
                + cluster.centroid.2 * cluster.centroid.2)
                .sqrt();
            if range < ALERT_RANGE {
                alerts.push(format!(
                    "Cluster {id} within {range:.2}m of origin, velocity ({:.2}, {:.2}, {:.2})",
                    velocity.0, velocity.1, velocity.2
                ));
            }

            out.insert(
                id,
                ClusterInfo {
                    centroid: [cluster.centroid.0, cluster.centroid.1, cluster.centroid.2],
                    velocity: [velocity.0, velocity.1, velocity.2],
                    speed,
                    bbox: bbox_of(points, &cluster.points),
                    moved,
                    count: cluster.points.len() as u32,
                },
            );
        }

        let gone: Vec<i32> = self
            .tracks
            .keys()
            .filter(|id| !new_tracks.contains_key(id))
            .copied()
            .collect();
        for id in gone {
            self.reusable_ids.insert(id);
        }
        for id in new_tracks.keys() {
            self.reusable_ids.remove(id);
        }

        self.tracks = new_tracks;
        (out, alerts)
    }
}
