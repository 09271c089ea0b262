// SPDX-License-Identifier: Apache-2.0

//! Core data model shared by the decoder, assembler, filter, clusterer and
//! tracker. Kept free of any transport or serialization concerns so the
//! pipeline stages can be tested in isolation.

use serde::Serialize;

/// Sentinel `cluster_id` for a point that was kept after the zero-origin
/// filter but excluded from clustering by the region-of-interest test.
pub const UNPROCESSED_CLUSTER_ID: i32 = i32::MIN;

/// Sentinel `cluster_id` for a DBSCAN noise point.
pub const NOISE_CLUSTER_ID: i32 = -1;

/// A single 3D point in sensor coordinates, plus the sensor tags the decoder
/// knows about and the `cluster_id` assigned during clustering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub layer: u32,
    pub beam: u32,
    pub echo: u32,
    pub theta: f32,
    /// Unset until the point has passed through the clusterer/tracker;
    /// `NOISE_CLUSTER_ID` for noise, `UNPROCESSED_CLUSTER_ID` for points the
    /// region filter excluded, otherwise a live track id.
    pub cluster_id: i32,
}

impl Point {
    pub fn new(x: f32, y: f32, z: f32, layer: u32, beam: u32, echo: u32, theta: f32) -> Self {
        Point {
            x,
            y,
            z,
            layer,
            beam,
            echo,
            theta,
            cluster_id: UNPROCESSED_CLUSTER_ID,
        }
    }

    #[inline]
    pub fn is_origin(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    #[inline]
    pub fn range(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// One decoded module: a slice of one scan rotation's points, plus the
/// metadata the frame assembler needs to decide whether it closes a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedModule {
    pub frame_number: u64,
    pub last_module: bool,
    pub points: Vec<Point>,
}

/// The union of every module sharing one `frame_number`: one full 360° scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub frame_number: u64,
    pub points: Vec<Point>,
}

/// A transient density cluster produced by one frame's clustering pass,
/// before stable id assignment by the tracker.
#[derive(Debug, Clone)]
pub struct RawCluster {
    pub points: Vec<usize>,
    pub centroid: (f32, f32, f32),
}

/// Axis-aligned bounding box, component-wise min/max over a cluster's points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

/// A cluster identity persisted across frames, with kinematic state.
#[derive(Debug, Clone, Copy)]
pub struct Track {
    pub id: i32,
    pub centroid: (f32, f32, f32),
    pub velocity: (f32, f32, f32),
    pub last_seen_frame: u64,
}

/// Per-cluster derived statistics broadcast alongside the tracked frame.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterInfo {
    pub centroid: [f32; 3],
    pub velocity: [f32; 3],
    pub speed: f32,
    pub bbox: BoundingBox,
    pub moved: bool,
    pub count: u32,
}

/// Region-of-interest shape used by the spatial filter.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionShape {
    Sphere,
    Cone,
}

/// Output of one frame's full pipeline run, ready for the broadcaster.
#[derive(Debug, Clone)]
pub struct TrackedFrame {
    pub frame_number: u64,
    pub points: Vec<Point>,
    pub clusters: std::collections::BTreeMap<i32, ClusterInfo>,
    pub alerts: Vec<String>,
}
