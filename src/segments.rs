//! Blocking-segment extraction.
//!
//! Turns a wall list plus the map rectangle into the deduplicated,
//! endpoint-snapped segment set that the sweep, sight tests and collision
//! work against. Segments are rebuilt per query and never stored.

use std::collections::HashSet;

use crate::geometry::unit_normal;
use crate::types::{MapSize, Point};
use crate::walls::{wall_blocks_sight, Direction, ElevationSpan, Wall, WallType};

/// Endpoints closer than this are merged into one shared point.
const SNAP_PX: f64 = 0.5;

/// Segments shorter than this are dropped.
const MIN_LENGTH_PX: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Wall,
    Door,
    Window,
    Boundary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentMeta<'w> {
    pub kind: SegmentKind,
    /// Source wall; `None` for map boundary edges.
    pub wall: Option<&'w Wall>,
    /// Outward normal for one-sided walls and boundary edges.
    pub normal: Option<Point>,
    pub elevation: ElevationSpan,
    pub invisible: bool,
    pub open_pct: f64,
}

/// A blocking segment borrowed from the wall list it was extracted from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment<'w> {
    pub a: Point,
    pub b: Point,
    pub meta: SegmentMeta<'w>,
}

impl<'w> Segment<'w> {
    pub fn length(&self) -> f64 {
        self.a.dist(self.b)
    }

    /// Does this segment stop a sight ray cast from `origin`?
    ///
    /// Boundaries and two-sided walls always do; one-sided walls re-run
    /// the directional test against their source wall.
    pub fn blocks_sight_from(&self, origin: Point) -> bool {
        match self.meta.wall {
            Some(wall) if wall.dir != Direction::Both => wall_blocks_sight(wall, Some(origin)),
            _ => true,
        }
    }

    /// Does this segment occlude at height `z`?
    pub fn applies_at(&self, z: f64) -> bool {
        self.meta.elevation.contains(z)
    }
}

fn wall_normal(wall: &Wall) -> Option<Point> {
    match wall.dir {
        Direction::Both => None,
        Direction::Left => Some(unit_normal(wall.a, wall.b, true)),
        Direction::Right => Some(unit_normal(wall.a, wall.b, false)),
    }
}

/// Left normal of the edge, flipped so it faces away from the map center.
fn boundary_normal(a: Point, b: Point, map: MapSize) -> Point {
    let base = unit_normal(a, b, true);
    let mid = Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
    if base.dot(map.center() - mid) > 0.0 {
        base * -1.0
    } else {
        base
    }
}

fn boundary_segments<'w>(map: MapSize) -> [Segment<'w>; 4] {
    let (w, h) = (map.width, map.height);
    let corners = [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(w, h),
        Point::new(0.0, h),
    ];
    std::array::from_fn(|i| {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        Segment {
            a,
            b,
            meta: SegmentMeta {
                kind: SegmentKind::Boundary,
                wall: None,
                normal: Some(boundary_normal(a, b, map)),
                elevation: ElevationSpan::UNBOUNDED,
                invisible: false,
                open_pct: 0.0,
            },
        }
    })
}

/// Extract the sight-blocking segments of `walls`, plus the map boundary
/// when `map` has a positive size.
///
/// Fully open doors and walls that never block sight are skipped.
/// One-sided walls are kept (conservatively, with no origin) and carry
/// their source wall so each ray can re-test the side later.
pub fn extract_vision_segments<'w>(walls: &'w [Wall], map: Option<MapSize>) -> Vec<Segment<'w>> {
    let mut raw: Vec<Segment<'w>> = Vec::with_capacity(walls.len() + 4);

    for wall in walls {
        if !wall.a.is_finite() || !wall.b.is_finite() {
            continue;
        }
        if wall.is_door_open() || !wall_blocks_sight(wall, None) {
            continue;
        }
        let kind = match wall.kind {
            WallType::Wall => SegmentKind::Wall,
            WallType::Door => SegmentKind::Door,
            WallType::Window => SegmentKind::Window,
        };
        raw.push(Segment {
            a: wall.a,
            b: wall.b,
            meta: SegmentMeta {
                kind,
                wall: Some(wall),
                normal: wall_normal(wall),
                elevation: wall.elevation,
                invisible: wall.invisible,
                open_pct: wall.door.as_ref().map_or(0.0, |d| d.open_pct),
            },
        });
    }

    if let Some(map) = map.filter(MapSize::is_valid) {
        raw.extend(boundary_segments(map));
    }

    preprocess(raw)
}

/// Snap, canonicalize, drop slivers, dedup.
fn preprocess(raw: Vec<Segment<'_>>) -> Vec<Segment<'_>> {
    let mut clusters: Vec<Point> = Vec::new();
    let mut snap = |p: Point| -> Point {
        if let Some(&hit) = clusters.iter().find(|c| c.dist2(p) <= SNAP_PX * SNAP_PX) {
            return hit;
        }
        clusters.push(p);
        p
    };

    let mut seen: HashSet<(i64, i64, i64, i64)> = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());

    for mut seg in raw {
        seg.a = snap(seg.a);
        seg.b = snap(seg.b);
        if seg.a.dist2(seg.b) < MIN_LENGTH_PX * MIN_LENGTH_PX {
            continue;
        }
        if (seg.b.x, seg.b.y) < (seg.a.x, seg.a.y) {
            std::mem::swap(&mut seg.a, &mut seg.b);
        }
        if seen.insert(segment_key(&seg)) {
            out.push(seg);
        }
    }
    out
}

/// Endpoints rounded to a thousandth of a pixel.
fn segment_key(seg: &Segment<'_>) -> (i64, i64, i64, i64) {
    let r = |v: f64| (v * 1000.0).round() as i64;
    (r(seg.a.x), r(seg.a.y), r(seg.b.x), r(seg.b.y))
}
