//! Geographic utilities: great-circle distance, polyline length, bearings.

use geo::{Distance, Haversine, Point};

use crate::GeoPoint;

/// Haversine distance between two points in meters.
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Total length of a polyline in meters.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Initial bearing from `a` to `b` in degrees [0, 360).
pub fn bearing(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Closest point to `p` on the segment `a`-`b`, as a fraction `t` in [0, 1]
/// along the segment plus the interpolated point.
///
/// The fraction is found in a local equirectangular frame centred on `p`
/// (longitude scaled by cos(latitude)), which is accurate for city-scale
/// segments. Callers measure the resulting distance with haversine.
pub fn closest_point_on_segment(p: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> (f64, GeoPoint) {
    let cos_lat = p.latitude.to_radians().cos();

    let dx = (b.longitude - a.longitude) * cos_lat;
    let dy = b.latitude - a.latitude;
    let px = (p.longitude - a.longitude) * cos_lat;
    let py = p.latitude - a.latitude;

    let seg_len_sq = dx * dx + dy * dy;
    if seg_len_sq < 1e-24 {
        // Degenerate segment
        return (0.0, *a);
    }

    // Clamp parameter t to [0, 1] to stay on the segment
    let t = ((px * dx + py * dy) / seg_len_sq).clamp(0.0, 1.0);
    let point = if t <= 0.0 {
        *a
    } else if t >= 1.0 {
        *b
    } else {
        a.lerp(b, t)
    };
    (t, point)
}
