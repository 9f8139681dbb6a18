//! Position projection onto the active route.
//!
//! For a live fix, finds the closest point on the route polyline, the
//! cross-track distance to it, and the geometry still ahead of the user.

use serde::Serialize;

use crate::error::{NavError, OptionExt, Result};
use crate::geo_utils::{closest_point_on_segment, haversine_distance, polyline_length};
use crate::route::Route;
use crate::GeoPoint;

/// Result of projecting a position onto a route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionResult {
    /// Nearest point on the route polyline.
    pub nearest: GeoPoint,
    /// Index of the segment containing `nearest` (segment i joins vertex i and i + 1).
    pub segment_index: usize,
    /// Great-circle distance from the position to `nearest`, in meters.
    pub cross_track_m: f64,
    /// Route distance from the start to `nearest`, in meters.
    pub distance_along_m: f64,
    /// `nearest` followed by every vertex after the containing segment.
    pub remaining: Vec<GeoPoint>,
    /// Length of `remaining` in meters.
    pub remaining_distance_m: f64,
}

/// Project a position onto a route.
pub fn project(position: &GeoPoint, route: &Route) -> Result<ProjectionResult> {
    project_on_polyline(position, route.polyline())
}

/// Project a position onto a raw polyline.
///
/// Each segment is clamped, so the nearest point never lies beyond a
/// segment's endpoints. On an exact distance tie the earlier segment wins,
/// which keeps the remaining geometry from jumping backwards.
///
/// Fails with `InvalidRoute` if the polyline has fewer than 2 points.
pub fn project_on_polyline(
    position: &GeoPoint,
    polyline: &[GeoPoint],
) -> Result<ProjectionResult> {
    if polyline.len() < 2 {
        return Err(NavError::InvalidRoute {
            point_count: polyline.len(),
            minimum_required: 2,
            message: "cannot project onto a polyline without segments".to_string(),
        });
    }

    // (segment index, nearest point, cross-track, distance along)
    let mut best: Option<(usize, GeoPoint, f64, f64)> = None;
    let mut cumulative_distance = 0.0;

    for (i, segment) in polyline.windows(2).enumerate() {
        let a = &segment[0];
        let b = &segment[1];

        let (_, projected) = closest_point_on_segment(position, a, b);
        let dist = haversine_distance(position, &projected);

        let is_better = match &best {
            Some((_, _, best_dist, _)) => dist < *best_dist,
            None => true,
        };

        if is_better {
            let along = cumulative_distance + haversine_distance(a, &projected);
            best = Some((i, projected, dist, along));
        }

        cumulative_distance += haversine_distance(a, b);
    }

    let (segment_index, nearest, cross_track_m, distance_along_m) =
        best.ok_or_invalid_route(polyline.len(), "no segment to project onto")?;

    let mut remaining = Vec::with_capacity(polyline.len() - segment_index);
    remaining.push(nearest);
    remaining.extend_from_slice(&polyline[segment_index + 1..]);
    let remaining_distance_m = polyline_length(&remaining);

    Ok(ProjectionResult {
        nearest,
        segment_index,
        cross_track_m,
        distance_along_m,
        remaining,
        remaining_distance_m,
    })
}
