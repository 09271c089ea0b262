// SPDX-License-Identifier: Apache-2.0

//! Spatial filter: drops zero-origin points, then restricts the remaining
//! points to a configurable region of interest (sphere or cone) before they
//! reach the clusterer. Points outside the region are kept in the frame but
//! tagged `UNPROCESSED_CLUSTER_ID` so downstream consumers still see them.

use crate::config::Configuration;
use crate::types::{Point, RegionShape, UNPROCESSED_CLUSTER_ID};

/// Unit vector for the cone axis built from the configured center angles,
/// using the same spherical convention as the decoder (phi = elevation from
/// the xy-plane, theta = azimuth in the xy-plane).
fn cone_axis(center_theta: f32, center_phi: f32) -> (f32, f32, f32) {
    (
        center_phi.cos() * center_theta.cos(),
        center_phi.cos() * center_theta.sin(),
        center_phi.sin(),
    )
}

fn in_region(p: &Point, cfg: &Configuration) -> bool {
    let range = p.range();
    if range > cfg.cluster_radius {
        return false;
    }

    match cfg.region_shape {
        RegionShape::Sphere => true,
        RegionShape::Cone => {
            if range == 0.0 {
                return false;
            }
            let (ax, ay, az) = cone_axis(cfg.cone_center_theta, cfg.cone_center_phi);
            let dot = (p.x * ax + p.y * ay + p.z * az) / range;
            let angle = dot.clamp(-1.0, 1.0).acos();
            angle < cfg.cone_half_angle
        }
    }
}

/// Filters a frame's points in place: drops zero-origin points outright and
/// tags out-of-region points as unprocessed, leaving the rest untouched for
/// the clusterer to pick up.
pub fn apply(points: Vec<Point>, cfg: &Configuration) -> Vec<Point> {
    points
        .into_iter()
        .filter(|p| !p.is_origin())
        .map(|mut p| {
            if !in_region(&p, cfg) {
                p.cluster_id = UNPROCESSED_CLUSTER_ID;
            }
            p
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sphere_cfg(radius: f32) -> Configuration {
        let mut cfg = Configuration::default();
        cfg.region_shape = RegionShape::Sphere;
        cfg.cluster_radius = radius;
        cfg
    }

    fn cone_cfg(radius: f32, center_theta: f32, center_phi: f32, half_angle: f32) -> Configuration {
        let mut cfg = Configuration::default();
        cfg.region_shape = RegionShape::Cone;
        cfg.cluster_radius = radius;
        cfg.cone_center_theta = center_theta;
        cfg.cone_center_phi = center_phi;
        cfg.cone_half_angle = half_angle;
        cfg
    }

    #[test]
    fn zero_origin_points_are_dropped() {
        let pts = vec![
            Point::new(0.0, 0.0, 0.0, 0, 0, 0, 0.0),
            Point::new(1.0, 0.0, 0.0, 0, 0, 0, 0.0),
        ];
        let out = apply(pts, &sphere_cfg(10.0));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].x, 1.0);
    }

    #[test]
    fn sphere_keeps_points_within_radius_untagged() {
        let pts = vec![Point::new(3.0, 0.0, 0.0, 0, 0, 0, 0.0)];
        let out = apply(pts, &sphere_cfg(5.0));
        assert_ne!(out[0].cluster_id, UNPROCESSED_CLUSTER_ID);
    }

    #[test]
    fn sphere_tags_points_outside_radius_as_unprocessed() {
        let pts = vec![Point::new(10.0, 0.0, 0.0, 0, 0, 0, 0.0)];
        let out = apply(pts, &sphere_cfg(5.0));
        assert_eq!(out[0].cluster_id, UNPROCESSED_CLUSTER_ID);
    }

    #[test]
    fn cone_keeps_point_on_axis() {
        // Axis along +x, point on +x at range 1 inside a wide half-angle.
        let pts = vec![Point::new(1.0, 0.0, 0.0, 0, 0, 0, 0.0)];
        let out = apply(pts, &cone_cfg(5.0, 0.0, 0.0, PI / 4.0));
        assert_ne!(out[0].cluster_id, UNPROCESSED_CLUSTER_ID);
    }

    #[test]
    fn cone_rejects_point_outside_half_angle() {
        // Axis along +x, point along +y: 90 degrees off axis, half-angle 45deg.
        let pts = vec![Point::new(0.0, 1.0, 0.0, 0, 0, 0, 0.0)];
        let out = apply(pts, &cone_cfg(5.0, 0.0, 0.0, PI / 4.0));
        assert_eq!(out[0].cluster_id, UNPROCESSED_CLUSTER_ID);
    }

    #[test]
    fn cone_still_honors_radius_bound() {
        let pts = vec![Point::new(10.0, 0.0, 0.0, 0, 0, 0, 0.0)];
        let out = apply(pts, &cone_cfg(5.0, 0.0, 0.0, PI / 4.0));
        assert_eq!(out[0].cluster_id, UNPROCESSED_CLUSTER_ID);
    }
}
