//! Token-to-token line of sight and cover.
//!
//! Both queries trace five sight rays from the observer's eye to the
//! target's square (center plus the four edge midpoints). A crossed wall
//! only occludes if the ray's interpolated height at the crossing falls
//! within the wall's elevation span.

use serde::Serialize;

use crate::geometry::{intersect_ray_segment, Ray, RayHit};
use crate::segments::{extract_vision_segments, Segment, SegmentKind};
use crate::terrain::{terrain_height_at, token_elevation};
use crate::types::{MapState, Point, Token, DEFAULT_GRID_SIZE_PX};
use crate::walls::{wall_blocks_sight, ElevationSpan};

/// Slack on either side of a wall's span.
const HEIGHT_EPS: f64 = 1e-3;

/// Sight rays shorter than this see everything.
const MIN_RAY_PX: f64 = 1e-6;

/// Fraction of clear samples at which a target counts as fully visible.
const FULL_VISIBILITY_RATIO: f64 = 0.75;

/// What sight is tested against.
#[derive(Debug, Clone, Copy)]
pub enum Obstacles<'a> {
    /// Pre-extracted segments.
    Segments(&'a [Segment<'a>]),
    /// A map; segments are extracted from its walls on demand.
    Map(&'a MapState),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SightOptions<'a> {
    /// Map used for terrain and grid size when `Obstacles` is a segment list.
    pub map: Option<&'a MapState>,
    /// Overrides the observer's square center.
    pub origin_point: Option<Point>,
    pub origin_elevation: Option<f64>,
    pub target_elevation: Option<f64>,
    /// Rays passing within this distance of a segment count as crossing it.
    pub padding: f64,
}

/// Outcome of the elevation test at one wall crossing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeightTest {
    pub blocks: bool,
    pub height_at_wall: f64,
    pub wall_bottom: f64,
    pub wall_top: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SightHit {
    pub point: Point,
    pub dist: f64,
    pub wall_id: Option<String>,
    pub height: HeightTest,
}

/// One traced sight ray.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SightRay {
    pub target: Point,
    pub blocked: bool,
    /// Distance to the blocker, or to the target when clear.
    pub distance: f64,
    pub origin_elevation: f64,
    pub target_elevation: f64,
    /// Every crossing examined, nearest first, up to and including the blocker.
    pub tested: Vec<SightHit>,
}

impl SightRay {
    pub fn blocker(&self) -> Option<&SightHit> {
        self.tested.last().filter(|_| self.blocked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityState {
    None,
    Partial,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenVisibility {
    pub state: VisibilityState,
    pub visible: usize,
    pub blocked: usize,
    pub total: usize,
    pub ratio: f64,
    pub tests: Vec<SightRay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoverKind {
    None,
    Half,
    ThreeQuarters,
    Full,
}

impl CoverKind {
    /// AC bonus; `None` for full cover (cannot be targeted).
    pub fn modifier(self) -> Option<i32> {
        match self {
            CoverKind::None => Some(0),
            CoverKind::Half => Some(2),
            CoverKind::ThreeQuarters => Some(5),
            CoverKind::Full => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cover {
    #[serde(rename = "type")]
    pub kind: CoverKind,
    pub modifier: Option<i32>,
    pub blocked: usize,
    pub total: usize,
    pub tests: Vec<SightRay>,
}

/// Does the sight line from `origin` (at `origin_elevation`) to `target`
/// pass through `span` at the crossing `distance` along the line?
pub fn wall_height_intersection(
    origin: Point,
    target: Point,
    distance: f64,
    span: ElevationSpan,
    origin_elevation: f64,
    target_elevation: f64,
) -> HeightTest {
    let total = origin.dist(target);
    let t = if distance.is_finite() && total > 0.0 {
        distance / total
    } else {
        0.0
    };
    let height_at_wall = origin_elevation + (target_elevation - origin_elevation) * t;
    HeightTest {
        blocks: height_at_wall >= span.bottom - HEIGHT_EPS && height_at_wall <= span.top + HEIGHT_EPS,
        height_at_wall,
        wall_bottom: span.bottom,
        wall_top: span.top,
    }
}

fn occludes_sight(seg: &Segment<'_>, origin: Point) -> bool {
    // Sight between points on the map never leaves it.
    if seg.meta.kind == SegmentKind::Boundary {
        return false;
    }
    match seg.meta.wall {
        Some(wall) => !wall.is_door_open() && wall_blocks_sight(wall, Some(origin)),
        None => true,
    }
}

/// Trace one sight ray, stopping at the first crossing whose span
/// contains the ray's height there. Elevations default to the terrain
/// height under each end.
pub fn trace_sight_ray(
    origin: Point,
    target: Point,
    segments: &[Segment<'_>],
    map: Option<&MapState>,
    options: &SightOptions<'_>,
) -> SightRay {
    let origin_elevation = options
        .origin_elevation
        .unwrap_or_else(|| terrain_height_at(origin.x, origin.y, map).height);
    let target_elevation = options
        .target_elevation
        .unwrap_or_else(|| terrain_height_at(target.x, target.y, map).height);

    let clear = |distance: f64, tested: Vec<SightHit>| SightRay {
        target,
        blocked: false,
        distance,
        origin_elevation,
        target_elevation,
        tested,
    };

    let Some(ray) = Ray::toward(origin, target).filter(|r| r.max_distance >= MIN_RAY_PX) else {
        return clear(0.0, Vec::new());
    };

    let mut hits: Vec<(RayHit, &Segment<'_>)> = segments
        .iter()
        .filter(|seg| occludes_sight(seg, origin))
        .filter_map(|seg| {
            intersect_ray_segment(origin, &ray, seg.a, seg.b, options.padding).map(|hit| (hit, seg))
        })
        .collect();
    hits.sort_by(|a, b| a.0.dist.total_cmp(&b.0.dist));

    let mut tested = Vec::with_capacity(hits.len());
    for (hit, seg) in hits {
        let height = wall_height_intersection(
            origin,
            target,
            hit.dist,
            seg.meta.elevation,
            origin_elevation,
            target_elevation,
        );
        tested.push(SightHit {
            point: hit.point,
            dist: hit.dist,
            wall_id: seg.meta.wall.map(|w| w.id.clone()),
            height,
        });
        if height.blocks {
            return SightRay {
                target,
                blocked: true,
                distance: hit.dist,
                origin_elevation,
                target_elevation,
                tested,
            };
        }
    }

    clear(ray.max_distance, tested)
}

fn grid_size(map: Option<&MapState>) -> f64 {
    map.map_or(DEFAULT_GRID_SIZE_PX, MapState::grid_size)
}

/// Center and the four edge midpoints of the token's square.
fn sample_points(token: &Token, map: Option<&MapState>) -> [Point; 5] {
    let size = token.size_px(Some(grid_size(map)));
    let c = token.center(Some(grid_size(map)));
    [
        c,
        Point::new(token.x, c.y),
        Point::new(token.x + size, c.y),
        Point::new(c.x, token.y),
        Point::new(c.x, token.y + size),
    ]
}

fn trace_samples(
    observer: &Token,
    target: &Token,
    obstacles: Obstacles<'_>,
    options: &SightOptions<'_>,
) -> Vec<SightRay> {
    let map = options.map.or(match obstacles {
        Obstacles::Map(m) => Some(m),
        Obstacles::Segments(_) => None,
    });

    let extracted;
    let segments: &[Segment<'_>] = match obstacles {
        Obstacles::Segments(segments) => segments,
        Obstacles::Map(m) => {
            extracted = extract_vision_segments(&m.walls, m.valid_size());
            &extracted
        }
    };

    let origin = options
        .origin_point
        .unwrap_or_else(|| observer.center(Some(grid_size(map))));
    let ray_options = SightOptions {
        origin_elevation: Some(
            options
                .origin_elevation
                .unwrap_or_else(|| token_elevation(observer, map, true)),
        ),
        target_elevation: Some(
            options
                .target_elevation
                .unwrap_or_else(|| token_elevation(target, map, false)),
        ),
        ..*options
    };

    sample_points(target, map)
        .iter()
        .map(|&sample| trace_sight_ray(origin, sample, segments, map, &ray_options))
        .collect()
}

/// How much of `target` `observer` can see.
pub fn compute_token_visibility(
    observer: &Token,
    target: &Token,
    obstacles: Obstacles<'_>,
    options: &SightOptions<'_>,
) -> TokenVisibility {
    let tests = trace_samples(observer, target, obstacles, options);
    let total = tests.len();
    let blocked = tests.iter().filter(|t| t.blocked).count();
    let visible = total - blocked;
    let ratio = if total > 0 {
        visible as f64 / total as f64
    } else {
        0.0
    };
    let state = if ratio >= FULL_VISIBILITY_RATIO {
        VisibilityState::Full
    } else if ratio > 0.0 {
        VisibilityState::Partial
    } else {
        VisibilityState::None
    };

    TokenVisibility {
        state,
        visible,
        blocked,
        total,
        ratio,
        tests,
    }
}

/// Cover `target` has against `attacker`: 1–2 blocked samples give half
/// cover, 3–4 three-quarters, all five full cover.
pub fn compute_cover(
    attacker: &Token,
    target: &Token,
    obstacles: Obstacles<'_>,
    options: &SightOptions<'_>,
) -> Cover {
    let tests = trace_samples(attacker, target, obstacles, options);
    let total = tests.len();
    let blocked = tests.iter().filter(|t| t.blocked).count();
    let kind = match blocked {
        b if b >= total => CoverKind::Full,
        b if b >= 3 => CoverKind::ThreeQuarters,
        b if b >= 1 => CoverKind::Half,
        _ => CoverKind::None,
    };

    Cover {
        kind,
        modifier: kind.modifier(),
        blocked,
        total,
        tests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walls::{Direction, Wall};

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    /// Square token of side 64 centered on `(cx, cy)`.
    fn token_at(id: &str, cx: f64, cy: f64) -> Token {
        Token::new(id, cx - 32.0, cy - 32.0, 64.0)
    }

    fn cover_with(wall: Wall) -> Cover {
        let walls = [wall];
        let segments = extract_vision_segments(&walls, None);
        compute_cover(
            &token_at("attacker", 200.0, 0.0),
            &token_at("target", 0.0, 0.0),
            Obstacles::Segments(&segments),
            &SightOptions::default(),
        )
    }

    #[test]
    fn wall_between_tokens_hides_target() {
        let walls = [Wall::new("w", p(100.0, -50.0), p(100.0, 50.0))];
        let segments = extract_vision_segments(&walls, None);
        let vis = compute_token_visibility(
            &token_at("observer", 200.0, 0.0),
            &token_at("target", 0.0, 0.0),
            Obstacles::Segments(&segments),
            &SightOptions::default(),
        );
        assert_eq!(vis.state, VisibilityState::None);
        assert_eq!(vis.blocked, 5);
        assert_eq!(vis.visible, 0);
        assert_eq!(vis.ratio, 0.0);
        assert_eq!(
            vis.tests[0].blocker().and_then(|b| b.wall_id.as_deref()),
            Some("w")
        );
    }

    #[test]
    fn open_field_is_fully_visible() {
        let vis = compute_token_visibility(
            &token_at("observer", 200.0, 0.0),
            &token_at("target", 0.0, 0.0),
            Obstacles::Segments(&[]),
            &SightOptions::default(),
        );
        assert_eq!(vis.state, VisibilityState::Full);
        assert_eq!((vis.visible, vis.total), (5, 5));
    }

    #[test]
    fn partially_hidden_target() {
        // Crossings at x = 100 land at y ∈ {0, 0, 0, -16, 16}.
        let walls = [Wall::new("w", p(100.0, 5.0), p(100.0, 50.0))];
        let segments = extract_vision_segments(&walls, None);
        let vis = compute_token_visibility(
            &token_at("observer", 200.0, 0.0),
            &token_at("target", 0.0, 0.0),
            Obstacles::Segments(&segments),
            &SightOptions::default(),
        );
        assert_eq!(vis.blocked, 1);
        assert_eq!(vis.ratio, 0.8);
        assert_eq!(vis.state, VisibilityState::Full);
    }

    #[test]
    fn cover_tiers() {
        let none = cover_with(Wall::new("w", p(100.0, 200.0), p(100.0, 300.0)));
        assert_eq!((none.kind, none.modifier), (CoverKind::None, Some(0)));

        let half = cover_with(Wall::new("w", p(100.0, 5.0), p(100.0, 50.0)));
        assert_eq!((half.kind, half.modifier), (CoverKind::Half, Some(2)));

        let three = cover_with(Wall::new("w", p(100.0, -10.0), p(100.0, 50.0)));
        assert_eq!(three.blocked, 4);
        assert_eq!((three.kind, three.modifier), (CoverKind::ThreeQuarters, Some(5)));

        let full = cover_with(Wall::new("w", p(100.0, -50.0), p(100.0, 50.0)));
        assert_eq!((full.kind, full.modifier), (CoverKind::Full, None));
        assert_eq!(full.blocked, full.total);
    }

    #[test]
    fn height_test_interpolates_along_the_ray() {
        let span = ElevationSpan::new(0.0, 5.0);
        let o = p(0.0, 0.0);
        let t = p(100.0, 0.0);
        let mid = wall_height_intersection(o, t, 50.0, span, 10.0, 0.0);
        assert_eq!(mid.height_at_wall, 5.0);
        assert!(mid.blocks);

        let early = wall_height_intersection(o, t, 40.0, span, 10.0, 0.0);
        assert!(!early.blocks);

        let edge = wall_height_intersection(o, t, 50.0, span, 10.0005, 0.0);
        assert!(edge.blocks);
    }

    #[test]
    fn elevated_observer_sees_over_low_wall() {
        let walls = [Wall::new("hedge", p(100.0, -50.0), p(100.0, 50.0))
            .with_elevation(ElevationSpan::new(0.0, 5.0))];
        let segments = extract_vision_segments(&walls, None);
        let mut observer = token_at("observer", 200.0, 0.0);
        let target = token_at("target", 0.0, 0.0);

        let ground = compute_token_visibility(
            &observer,
            &target,
            Obstacles::Segments(&segments),
            &SightOptions::default(),
        );
        assert_eq!(ground.state, VisibilityState::None);

        observer.elevation = Some(30.0);
        let perched = compute_token_visibility(
            &observer,
            &target,
            Obstacles::Segments(&segments),
            &SightOptions {
                target_elevation: Some(30.0),
                ..SightOptions::default()
            },
        );
        assert_eq!(perched.state, VisibilityState::Full);
        assert_eq!(perched.tests[0].origin_elevation, 30.0);
    }

    #[test]
    fn map_obstacles_use_walls_but_not_the_boundary() {
        let map = MapState {
            width: 400.0,
            height: 200.0,
            walls: vec![Wall::new("w", p(150.0, 0.0), p(150.0, 200.0))],
            ..MapState::default()
        };
        // Target square touches the map edge at x = 0.
        let target = Token::new("target", 0.0, 50.0, 64.0);
        let observer = Token::new("observer", 40.0, 120.0, 64.0);
        let vis = compute_token_visibility(&observer, &target, Obstacles::Map(&map), &SightOptions::default());
        assert_eq!(vis.blocked, 0);

        let beyond = Token::new("beyond", 300.0, 50.0, 64.0);
        let vis = compute_token_visibility(&observer, &beyond, Obstacles::Map(&map), &SightOptions::default());
        assert_eq!(vis.blocked, 5);
    }

    #[test]
    fn one_sided_wall_in_sight_test() {
        // A→B runs +y: observers at x < 100 are on the blocking side.
        let walls = [Wall::new("w", p(100.0, -100.0), p(100.0, 100.0)).with_dir(Direction::Left)];
        let segments = extract_vision_segments(&walls, None);
        let left = token_at("left", 0.0, 0.0);
        let right = token_at("right", 200.0, 0.0);

        let from_left = compute_token_visibility(&left, &right, Obstacles::Segments(&segments), &SightOptions::default());
        assert_eq!(from_left.state, VisibilityState::None);

        let from_right = compute_token_visibility(&right, &left, Obstacles::Segments(&segments), &SightOptions::default());
        assert_eq!(from_right.state, VisibilityState::Full);
    }

    #[test]
    fn zero_length_ray_is_clear() {
        let ray = trace_sight_ray(p(5.0, 5.0), p(5.0, 5.0), &[], None, &SightOptions::default());
        assert!(!ray.blocked);
        assert_eq!(ray.distance, 0.0);
    }

    #[test]
    fn padding_catches_near_misses() {
        let walls = [Wall::new("w", p(50.0, 1.0), p(50.0, 40.0))];
        let segments = extract_vision_segments(&walls, None);
        let strict = trace_sight_ray(p(0.0, 0.0), p(100.0, 0.0), &segments, None, &SightOptions::default());
        assert!(!strict.blocked);
        let padded = trace_sight_ray(
            p(0.0, 0.0),
            p(100.0, 0.0),
            &segments,
            None,
            &SightOptions {
                padding: 2.0,
                ..SightOptions::default()
            },
        );
        assert!(padded.blocked);
    }
}
