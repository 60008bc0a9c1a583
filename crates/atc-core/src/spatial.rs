//! Spatial math for trajectory and runway proximity calculations.
//!
//! Distances are nautical miles unless a name says otherwise.

use crate::models::Position;

/// Mean earth radius in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3440.065;

pub const FEET_PER_NM: f64 = 6076.12;

/// Great-circle distance between two points using the Haversine formula.
///
/// # Arguments
/// * `a`, `b` - Positions in decimal degrees
///
/// # Returns
/// Distance in nautical miles
pub fn haversine_nm(a: Position, b: Position) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let dphi = (b.lat - a.lat).to_radians();
    let dlambda = (b.lon - a.lon).to_radians();
    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_NM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Initial true bearing from `a` to `b` in degrees, 0-360.
pub fn bearing_deg(a: Position, b: Position) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_lambda = (b.lon - a.lon).to_radians();

    let x = delta_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    x.atan2(y).to_degrees().rem_euclid(360.0)
}

/// Linear interpolation of latitude/longitude, `fraction` clamped to 0..=1.
pub fn interpolate(a: Position, b: Position, fraction: f64) -> Position {
    let t = fraction.clamp(0.0, 1.0);
    Position::new(a.lat + (b.lat - a.lat) * t, a.lon + (b.lon - a.lon) * t)
}

/// Total length of a polyline.
pub fn path_length_nm(points: &[Position]) -> f64 {
    points.windows(2).map(|w| haversine_nm(w[0], w[1])).sum()
}

/// Position reached after flying `distance_nm` along a polyline.
///
/// Distances accumulate per great-circle leg; the position within the
/// bounding leg is interpolated linearly. Past the end returns the last point.
pub fn position_along_path(points: &[Position], distance_nm: f64) -> Option<Position> {
    let first = *points.first()?;
    if distance_nm <= 0.0 {
        return Some(first);
    }

    let mut travelled = 0.0;
    for leg in points.windows(2) {
        let leg_nm = haversine_nm(leg[0], leg[1]);
        if leg_nm > 0.0 && travelled + leg_nm >= distance_nm {
            return Some(interpolate(leg[0], leg[1], (distance_nm - travelled) / leg_nm));
        }
        travelled += leg_nm;
    }
    points.last().copied()
}

/// Minimum distance from a point to a line segment.
///
/// Uses a local flat projection around the segment start, which is accurate
/// at aerodrome scale.
pub fn distance_to_segment_nm(point: Position, seg_start: Position, seg_end: Position) -> f64 {
    let nm_per_deg_lat = 60.0;
    let nm_per_deg_lon = 60.0 * seg_start.lat.to_radians().cos();

    let px = (point.lon - seg_start.lon) * nm_per_deg_lon;
    let py = (point.lat - seg_start.lat) * nm_per_deg_lat;
    let sx = (seg_end.lon - seg_start.lon) * nm_per_deg_lon;
    let sy = (seg_end.lat - seg_start.lat) * nm_per_deg_lat;

    let seg_len_sq = sx * sx + sy * sy;
    if seg_len_sq < 1e-12 {
        return (px * px + py * py).sqrt();
    }

    // Project point onto segment line: t = ((P-A) · (B-A)) / |B-A|²
    let t = ((px * sx + py * sy) / seg_len_sq).clamp(0.0, 1.0);
    let dx = px - t * sx;
    let dy = py - t * sy;
    (dx * dx + dy * dy).sqrt()
}
