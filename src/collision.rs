//! Swept-circle movement clamping against walls.
//!
//! A token is a circle (its radius plus a small skin) moving in a straight
//! line. The move is clamped at the first wall contact, the leftover
//! motion slides along that wall, and any residual overlap is pushed out
//! with minimum-translation vectors.

use serde::Serialize;

use crate::geometry::{
    closest_point_on_segment, point_segment_distance_squared, segment_segment_distance_squared,
};
use crate::types::{CollisionTuning, Point};
use crate::walls::{wall_blocks_movement, Wall};

/// Pushes shorter than this count as zero.
const PUSH_EPS: f64 = 1e-6;

/// Share of the leftover overlap applied after an MTV step.
const RESIDUAL_NUDGE: f64 = 0.1;

/// One movement step to clamp. `start` and `end` are circle centers.
#[derive(Debug, Clone)]
pub struct MoveRequest<'a> {
    pub start: Point,
    pub end: Point,
    pub radius: f64,
    pub walls: &'a [Wall],
    /// Extra clearance while a drag is being dropped.
    pub relax_on_drop: bool,
    pub tuning: CollisionTuning,
}

impl<'a> MoveRequest<'a> {
    pub fn new(start: Point, end: Point, radius: f64, walls: &'a [Wall]) -> Self {
        Self {
            start,
            end,
            radius,
            walls,
            relax_on_drop: false,
            tuning: CollisionTuning::default(),
        }
    }
}

/// The wall a move ran into.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionHit {
    /// Contact point on the wall.
    pub x: f64,
    pub y: f64,
    /// Resolved circle center.
    pub center: Point,
    pub a: Point,
    pub b: Point,
    pub wall_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResult {
    pub x: f64,
    pub y: f64,
    pub collided: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit: Option<CollisionHit>,
}

impl MoveResult {
    fn free(p: Point) -> Self {
        Self {
            x: p.x,
            y: p.y,
            collided: false,
            hit: None,
        }
    }
}

/// A movement-blocking wall as a bare segment.
struct Blocker<'w> {
    a: Point,
    b: Point,
    wall: &'w Wall,
}

/// Earliest contact along a path, backed off from the wall.
struct PathClamp {
    safe: Point,
    hit: Option<usize>,
}

/// Clamp one movement step against the request's walls.
///
/// Non-finite input is a no-op: a bad `end` keeps the token at `start`,
/// a bad `start` or radius lets it go to `end`.
pub fn clamp_token_movement(request: &MoveRequest<'_>) -> MoveResult {
    let MoveRequest {
        start,
        end,
        radius,
        walls,
        relax_on_drop,
        ref tuning,
    } = *request;
    let tuning = &tuning.bounded();

    if !end.is_finite() {
        return MoveResult::free(start);
    }
    if !start.is_finite() || !radius.is_finite() {
        return MoveResult::free(end);
    }

    let relax = if relax_on_drop { tuning.relax_px } else { 0.0 };
    let fat_radius = radius.max(0.0) + tuning.skin_px + relax;
    let eps = tuning.epsilon_px;

    let blockers: Vec<Blocker<'_>> = walls
        .iter()
        .filter(|w| w.a.is_finite() && w.b.is_finite())
        .filter(|w| wall_blocks_movement(w, Some(start)))
        .map(|wall| Blocker {
            a: wall.a,
            b: wall.b,
            wall,
        })
        .collect();
    if blockers.is_empty() {
        return MoveResult::free(end);
    }

    // Already overlapping a wall: step out once and carry the move along.
    let (mut from, mut to) = (start, end);
    if let Some(fixed) = depenetrate(start, &blockers, fat_radius, eps) {
        let shift = fixed - start;
        log::debug!("depenetrated start by ({:.2}, {:.2})", shift.x, shift.y);
        from = fixed;
        to = end + shift;
    }

    let first = clamp_path(from, to, &blockers, fat_radius, tuning);
    let Some(hit_index) = first.hit else {
        return MoveResult::free(first.safe);
    };

    // Slide the leftover motion along the wall that stopped us.
    let mut center = first.safe;
    let blocker = &blockers[hit_index];
    if let Some(tangent) = (blocker.b - blocker.a).normalized() {
        let slide = tangent * (to - center).dot(tangent);
        if slide.length() > PUSH_EPS {
            center = clamp_path(center, center + slide, &blockers, fat_radius, tuning).safe;
        }
    }

    for _ in 0..tuning.max_iterations {
        if penetration_vectors(center, &blockers, fat_radius, eps).is_empty() {
            break;
        }
        center = resolve_mtv(center, &blockers, fat_radius, eps);
    }

    let remaining = penetration_vectors(center, &blockers, fat_radius, eps);
    if !remaining.is_empty() {
        if let Some(dir) = sum_points(&remaining).normalized() {
            center = center + dir * tuning.corner_nudge_px;
        }
    }

    let contact = closest_point_on_segment(center, blocker.a, blocker.b);
    MoveResult {
        x: center.x,
        y: center.y,
        collided: true,
        hit: Some(CollisionHit {
            x: contact.x,
            y: contact.y,
            center,
            a: blocker.a,
            b: blocker.b,
            wall_id: blocker.wall.id.clone(),
        }),
    }
}

fn sum_points(points: &[Point]) -> Point {
    points.iter().fold(Point::default(), |acc, &p| acc + p)
}

/// Unit direction pushing `center` off the segment. A center sitting on
/// the segment is pushed along the segment's right-hand normal.
fn push_direction(center: Point, closest: Point, blocker: &Blocker<'_>) -> Point {
    let away = center - closest;
    let dir = if away.x.abs() < PUSH_EPS && away.y.abs() < PUSH_EPS {
        Point::new(blocker.b.y - blocker.a.y, -(blocker.b.x - blocker.a.x))
    } else {
        away
    };
    dir.normalized().unwrap_or(Point::new(1.0, 0.0))
}

/// Push vectors for every segment closer than `radius + eps`.
fn penetration_vectors(center: Point, blockers: &[Blocker<'_>], radius: f64, eps: f64) -> Vec<Point> {
    blockers
        .iter()
        .filter_map(|b| {
            let closest = closest_point_on_segment(center, b.a, b.b);
            let depth = radius + eps - center.dist(closest);
            (depth > 0.0).then(|| push_direction(center, closest, b) * depth)
        })
        .collect()
}

/// Push out of the single most penetrated segment.
fn depenetrate(center: Point, blockers: &[Blocker<'_>], radius: f64, eps: f64) -> Option<Point> {
    let mut best: Option<(f64, Point)> = None;
    for b in blockers {
        let closest = closest_point_on_segment(center, b.a, b.b);
        let depth = radius + eps - center.dist(closest);
        if depth > 0.0 && best.map_or(true, |(d, _)| depth > d) {
            best = Some((depth, push_direction(center, closest, b)));
        }
    }
    best.map(|(depth, dir)| center + dir * depth)
}

/// One minimum-translation step: the shortest single or summed push
/// that clears every segment, else the summed push. A tenth of whatever
/// overlap remains is applied on top.
fn resolve_mtv(center: Point, blockers: &[Blocker<'_>], radius: f64, eps: f64) -> Point {
    let pushes = penetration_vectors(center, blockers, radius, eps);
    if pushes.is_empty() {
        return center;
    }
    let sum = sum_points(&pushes);
    let clear_sq = (radius + eps) * (radius + eps) - PUSH_EPS;
    let clears_all = |v: Point| {
        let next = center + v;
        blockers
            .iter()
            .all(|b| point_segment_distance_squared(next, b.a, b.b) >= clear_sq)
    };

    let mut candidates = pushes;
    if sum.length() > PUSH_EPS {
        candidates.push(sum);
    }
    let applied = candidates
        .into_iter()
        .filter(|&v| clears_all(v))
        .min_by(|a, b| a.length().total_cmp(&b.length()))
        .unwrap_or(sum);

    let next = center + applied;
    let residual = penetration_vectors(next, blockers, radius, eps);
    if residual.is_empty() {
        next
    } else {
        next + sum_points(&residual) * RESIDUAL_NUDGE
    }
}

/// Path parameter in [0, 1] where `start`→`end` comes closest to `a`–`b`.
fn closest_approach_t(start: Point, end: Point, a: Point, b: Point) -> f64 {
    let d = end - start;
    let len2 = d.dot(d);
    if len2 == 0.0 {
        return 0.0;
    }
    let project = |p: Point| ((p - start).dot(d) / len2).clamp(0.0, 1.0);
    let e = b - a;
    let den = d.cross(e);
    let crossing = if den.abs() > 1e-12 {
        Some((a - start).cross(e) / den).filter(|t| (0.0..=1.0).contains(t))
    } else {
        None
    };

    let dist_at = |t: f64| point_segment_distance_squared(start.lerp(end, t), a, b);
    [Some(0.0), Some(1.0), Some(project(a)), Some(project(b)), crossing]
        .into_iter()
        .flatten()
        .min_by(|x, y| dist_at(*x).total_cmp(&dist_at(*y)))
        .unwrap_or(0.0)
}

/// Earliest `t` at which a circle of `radius` swept from `start` to `end`
/// touches `a`–`b`, or `None` if it never does.
fn find_collision_t(start: Point, end: Point, a: Point, b: Point, radius: f64, steps: u32) -> Option<f64> {
    let r2 = radius * radius;
    if point_segment_distance_squared(start, a, b) <= r2 {
        return Some(0.0);
    }
    if segment_segment_distance_squared(start, end, a, b) > r2 {
        return None;
    }

    // Distance along the path is convex, so it falls monotonically up to
    // the closest approach; bisect that stretch only.
    let (mut lo, mut hi) = (0.0, closest_approach_t(start, end, a, b));
    for _ in 0..steps {
        let mid = (lo + hi) / 2.0;
        if point_segment_distance_squared(start.lerp(end, mid), a, b) <= r2 {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Some(hi)
}

fn clamp_path(
    from: Point,
    to: Point,
    blockers: &[Blocker<'_>],
    radius: f64,
    tuning: &CollisionTuning,
) -> PathClamp {
    let mut earliest = 1.0;
    let mut hit = None;
    for (i, b) in blockers.iter().enumerate() {
        if let Some(t) = find_collision_t(from, to, b.a, b.b, radius, tuning.bisect_steps) {
            if t < earliest {
                earliest = t;
                hit = Some(i);
            }
        }
    }
    if hit.is_none() {
        return PathClamp { safe: to, hit: None };
    }

    let len = from.dist(to);
    let back_off = if len > 0.0 { tuning.epsilon_px / len } else { 0.0 };
    PathClamp {
        safe: from.lerp(to, (earliest - back_off).max(0.0)),
        hit,
    }
}
