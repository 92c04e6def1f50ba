//! Visibility polygon computation.
//!
//! Builds the fog-of-war polygon around a viewer by angular sweep: rays
//! are cast at every segment endpoint angle (plus a small flank either
//! side, so the sweep sees past silhouette corners), and at uniform angles
//! when a finite sight range applies. Ray endpoints in angle order form a
//! star-shaped polygon around the viewer.

use std::f64::consts::TAU;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::geometry::{intersect_ray_segment, normalize_angle, Ray, RayHit, EPS};
use crate::segments::{extract_vision_segments, Segment};
use crate::types::{MapSize, MapState, Point, Token, VisionTuning};
use crate::units::feet_to_px;

/// Padding added to every sight range so the viewer's own square is covered.
const ORIGIN_PADDING_FT: f64 = 2.5;

/// Sight range for tokens without an explicit one, outside global light.
const DEFAULT_SIGHT_FT: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionOptions {
    #[serde(default)]
    pub tuning: VisionTuning,
}

/// One cast ray and where it ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CastRay {
    pub angle: f64,
    pub point: Point,
    pub dist: f64,
    /// Stopped by a segment rather than by the ray limit.
    pub hit: bool,
    pub endpoint_snap: bool,
    /// Index into the segment slice of the blocking segment.
    pub segment: Option<usize>,
}

/// Everything a debug overlay needs to draw one computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionTrace {
    /// Center of the token square.
    pub raw_origin: Point,
    /// Origin after nudging away from nearby wall vertices.
    pub origin: Point,
    pub max_distance: Option<f64>,
    pub ray_limit: f64,
    pub viewer_elevation: f64,
    pub segment_count: usize,
    pub rays: Vec<CastRay>,
    pub polygon: Vec<Point>,
}

/// Compute the visibility polygon for `token`.
///
/// Returns `None` (and logs) when the token or the segment list is
/// missing or the token position is not finite. Callers treat `None` as
/// "clear the overlay". An empty polygon is possible when there is
/// nothing to sweep against and no range applies.
pub fn compute_vision(
    token: Option<&Token>,
    segments: Option<&[Segment<'_>]>,
    max_distance_px: Option<f64>,
    grid_size_px: Option<f64>,
    map_size: Option<MapSize>,
    options: &VisionOptions,
) -> Option<Vec<Point>> {
    trace_vision(token, segments, max_distance_px, grid_size_px, map_size, options)
        .map(|trace| trace.polygon)
}

/// Same as [`compute_vision`], but keeps every cast ray.
pub fn trace_vision(
    token: Option<&Token>,
    segments: Option<&[Segment<'_>]>,
    max_distance_px: Option<f64>,
    grid_size_px: Option<f64>,
    map_size: Option<MapSize>,
    options: &VisionOptions,
) -> Option<VisionTrace> {
    let (Some(token), Some(segments)) = (token, segments) else {
        log::warn!(
            "compute_vision missing inputs (token: {}, segments: {})",
            token.is_some(),
            segments.is_some()
        );
        return None;
    };

    let tuning = &options.tuning.bounded();
    let raw_origin = token.center(grid_size_px);
    if !raw_origin.is_finite() {
        log::warn!("compute_vision: token {} has no finite position", token.id);
        return None;
    }

    // Negative ranges collapse to zero; infinite ones mean "no range".
    let max_distance = max_distance_px
        .filter(|d| !d.is_nan())
        .map(|d| d.max(0.0))
        .filter(|d| d.is_finite());
    let map_size = map_size.filter(MapSize::is_valid);

    let origin = nudge_origin(raw_origin, segments, map_size, tuning);
    let viewer_elevation = token.eye_elevation();
    let ray_limit = resolve_ray_limit(max_distance, map_size, tuning);

    // Segments that can occlude for this viewer at all. One-sided walls are
    // judged from the true origin, not the nudged one.
    let active: Vec<usize> = segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.applies_at(viewer_elevation) && s.blocks_sight_from(raw_origin))
        .map(|(i, _)| i)
        .collect();

    let angles = candidate_angles(origin, segments, max_distance.is_some(), tuning);
    let rays: Vec<CastRay> = angles
        .iter()
        .map(|&angle| cast_ray(origin, angle, segments, &active, ray_limit))
        .collect();
    let polygon = merge_points(rays.iter().map(|r| r.point), tuning.point_merge_px);

    log::debug!(
        "vision {}: origin ({:.2}, {:.2}), {} segments, {} angles, {} vertices",
        token.id,
        origin.x,
        origin.y,
        segments.len(),
        angles.len(),
        polygon.len()
    );

    Some(VisionTrace {
        raw_origin,
        origin,
        max_distance,
        ray_limit,
        viewer_elevation,
        segment_count: segments.len(),
        rays,
        polygon,
    })
}

/// Move the origin off any wall vertex it sits on, along the averaged
/// normal of the segments meeting there (oriented toward the map center).
fn nudge_origin(
    origin: Point,
    segments: &[Segment<'_>],
    map_size: Option<MapSize>,
    tuning: &VisionTuning,
) -> Point {
    let proximity_sq = tuning.vertex_proximity_px * tuning.vertex_proximity_px;
    let mut near = segments
        .iter()
        .filter(|s| s.a.dist2(origin) <= proximity_sq || s.b.dist2(origin) <= proximity_sq)
        .peekable();
    if near.peek().is_none() {
        return origin;
    }

    let target = map_size.map_or(Point::new(origin.x + 1.0, origin.y), |m| m.center());
    let toward_open = (target - origin)
        .normalized()
        .unwrap_or(Point::new(1.0, 0.0));

    let mut sum = Point::default();
    for seg in near {
        let Some(d) = (seg.b - seg.a).normalized() else {
            continue;
        };
        let mut n = Point::new(-d.y, d.x);
        if n.dot(toward_open) < 0.0 {
            n = n * -1.0;
        }
        sum = sum + n;
    }

    let dir = if sum.length() > EPS {
        sum.normalized().unwrap_or(toward_open)
    } else {
        toward_open
    };
    origin + dir * tuning.origin_nudge_px
}

fn resolve_ray_limit(max_distance: Option<f64>, map_size: Option<MapSize>, tuning: &VisionTuning) -> f64 {
    if let Some(d) = max_distance {
        return d;
    }
    map_size
        .map(|m| m.diagonal())
        .filter(|d| *d > 1.0)
        .unwrap_or(tuning.fallback_ray_limit_px)
}

/// Endpoint angles (with flanks), plus uniform samples when ranged.
/// Sorted ascending in [0, 2π) and deduplicated.
fn candidate_angles(
    origin: Point,
    segments: &[Segment<'_>],
    ranged: bool,
    tuning: &VisionTuning,
) -> Vec<f64> {
    let flank = tuning.endpoint_flank_rad;
    let steps = if ranged { tuning.range_sample_steps } else { 0 };
    let mut angles = Vec::with_capacity(segments.len().saturating_mul(6).saturating_add(steps));

    for seg in segments {
        for p in [seg.a, seg.b] {
            let d = p - origin;
            if d.x == 0.0 && d.y == 0.0 {
                continue;
            }
            let angle = d.y.atan2(d.x);
            angles.push(normalize_angle(angle));
            if flank > 0.0 {
                angles.push(normalize_angle(angle - flank));
                angles.push(normalize_angle(angle + flank));
            }
        }
    }
    for i in 0..steps {
        angles.push(i as f64 / steps as f64 * TAU);
    }

    angles.retain(|a| a.is_finite());
    angles.sort_unstable_by(f64::total_cmp);
    angles.dedup_by(|next, kept| (*next - *kept).abs() <= tuning.angle_epsilon);
    angles
}

fn cast_ray(
    origin: Point,
    angle: f64,
    segments: &[Segment<'_>],
    active: &[usize],
    ray_limit: f64,
) -> CastRay {
    let ray = Ray::from_angle(angle, ray_limit);
    let mut closest: Option<(usize, RayHit)> = None;
    for &i in active {
        let seg = &segments[i];
        let Some(hit) = intersect_ray_segment(origin, &ray, seg.a, seg.b, 0.0) else {
            continue;
        };
        if closest.map_or(true, |(_, best)| hit.dist < best.dist) {
            closest = Some((i, hit));
        }
    }

    match closest {
        Some((i, hit)) => CastRay {
            angle,
            point: hit.point,
            dist: hit.dist,
            hit: true,
            endpoint_snap: hit.endpoint_snap,
            segment: Some(i),
        },
        None => CastRay {
            angle,
            point: ray.end(origin),
            dist: ray_limit,
            hit: false,
            endpoint_snap: false,
            segment: None,
        },
    }
}

/// Drop consecutive points within `merge_px`, closing the loop.
fn merge_points(points: impl IntoIterator<Item = Point>, merge_px: f64) -> Vec<Point> {
    let merge_sq = merge_px * merge_px;
    let mut out: Vec<Point> = Vec::new();
    for p in points {
        if out.last().map_or(true, |last| last.dist2(p) > merge_sq) {
            out.push(p);
        }
    }
    if out.len() >= 2 && out[0].dist2(out[out.len() - 1]) <= merge_sq {
        out.pop();
    }
    out
}

/// Sight range in pixels for `token` on `map`, or `None` for unlimited.
///
/// An explicit vision distance always applies. Otherwise global light
/// lifts the range entirely; in the dark a token sees its darkvision
/// distance, or the default 60 ft. Every range gets 2.5 ft of padding.
pub fn resolve_max_distance_px(token: &Token, map: &MapState) -> Option<f64> {
    let grid = map.grid_size();
    let vision = &token.vision;

    if let Some(feet) = vision.distance.filter(|d| d.is_finite()) {
        return feet_to_px(feet + ORIGIN_PADDING_FT, grid);
    }
    if map.lighting.global {
        return None;
    }
    let feet = if vision.has_darkvision && vision.darkvision_distance.is_finite() {
        vision.darkvision_distance
    } else {
        DEFAULT_SIGHT_FT
    };
    feet_to_px(feet + ORIGIN_PADDING_FT, grid)
}

/// Extract segments, resolve the range and sweep, for one token.
pub fn compute_vision_for_map(
    token: &Token,
    map: &MapState,
    options: &VisionOptions,
) -> Option<Vec<Point>> {
    let map_size = map.valid_size();
    let segments = extract_vision_segments(&map.walls, map_size);
    compute_vision(
        Some(token),
        Some(segments.as_slice()),
        resolve_max_distance_px(token, map),
        Some(map.grid_size()),
        map_size,
        options,
    )
}

/// Visibility polygons for many viewers over one map snapshot.
/// Segments are extracted once and shared; viewers run in parallel.
/// Results are in `tokens` order.
pub fn compute_vision_batch(
    tokens: &[Token],
    map: &MapState,
    options: &VisionOptions,
) -> Vec<Option<Vec<Point>>> {
    let map_size = map.valid_size();
    let segments = extract_vision_segments(&map.walls, map_size);
    let grid = Some(map.grid_size());

    tokens
        .par_iter()
        .map(|token| {
            compute_vision(
                Some(token),
                Some(segments.as_slice()),
                resolve_max_distance_px(token, map),
                grid,
                map_size,
                options,
            )
        })
        .collect()
}
