//! Data types matching the tabletop JSON schema.
//!
//! Every struct here derives Serialize + Deserialize so map and token
//! records round-trip through the client's JSON interchange format.
//! Field names follow the client (camelCase).

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Deserializer, Serialize};

use crate::terrain::Terrain;
use crate::walls::Wall;

/// Grid size assumed when a map does not carry one.
pub const DEFAULT_GRID_SIZE_PX: f64 = 64.0;

// -- Lenient numbers -----------------------------------------------

/// The client serializes NaN as `null` and sometimes sends numbers as
/// strings. Anything that is not a finite number reads as `None`.
fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// A required coordinate; unreadable values become 0.
pub(crate) fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let raw: Option<serde_json::Value> = Option::deserialize(d)?;
    Ok(raw.as_ref().and_then(json_number).unwrap_or(0.0))
}

/// A coordinate list such as a wall's `c`; unreadable entries become 0.
pub(crate) fn lenient_coords<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<f64>>, D::Error> {
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(d)?;
    Ok(raw.map(|values| values.iter().map(|v| json_number(v).unwrap_or(0.0)).collect()))
}

// -- Geometry ------------------------------------------------------

/// A point in map-pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub x: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dist2(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn dist(self, other: Point) -> f64 {
        self.dist2(other).sqrt()
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// 2D cross product (z component of the 3D cross).
    pub fn cross(self, other: Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector.
    pub fn normalized(self) -> Option<Point> {
        let len = self.length();
        if len > 1e-12 && len.is_finite() {
            Some(Point::new(self.x / len, self.y / len))
        } else {
            None
        }
    }

    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point::new(x, y)
    }
}

/// Map rectangle (0,0)–(width,height).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapSize {
    pub width: f64,
    pub height: f64,
}

impl MapSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when both extents are finite and positive.
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn diagonal(&self) -> f64 {
        self.width.hypot(self.height)
    }
}

// -- Tokens --------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_darkvision_distance() -> f64 {
    60.0
}

/// Vision attributes of a token. Distances are in feet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionProfile {
    #[serde(default = "default_true")]
    pub has_vision: bool,
    #[serde(default)]
    pub has_darkvision: bool,
    #[serde(default = "default_darkvision_distance")]
    pub darkvision_distance: f64,
    /// Explicit sight range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye_height: Option<f64>,
    /// Extra elevation offset applied to the eye (flying, perched, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    #[serde(default)]
    pub is_player: bool,
}

impl Default for VisionProfile {
    fn default() -> Self {
        Self {
            has_vision: true,
            has_darkvision: false,
            darkvision_distance: 60.0,
            distance: None,
            eye_height: None,
            elevation: None,
            is_player: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub x: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub y: f64,
    /// Side of the bounding square in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    #[serde(default)]
    pub vision: VisionProfile,
}

fn finite_or_zero(v: Option<f64>) -> f64 {
    v.filter(|v| v.is_finite()).unwrap_or(0.0)
}

impl Token {
    pub fn new(id: impl Into<String>, x: f64, y: f64, size: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            size: Some(size),
            ..Self::default()
        }
    }

    /// Bounding-square side, falling back to the grid size when the
    /// token carries no usable size.
    pub fn size_px(&self, grid_size_px: Option<f64>) -> f64 {
        match self.size {
            Some(s) if s.is_finite() && s > 0.0 => s,
            _ => grid_size_px.filter(|g| g.is_finite()).unwrap_or(0.0),
        }
    }

    /// Center of the bounding square; the origin for vision and collision.
    pub fn center(&self, grid_size_px: Option<f64>) -> Point {
        let half = self.size_px(grid_size_px) / 2.0;
        Point::new(self.x + half, self.y + half)
    }

    /// Viewer height used by the polygon sweep:
    /// token elevation + vision elevation + eye height.
    pub fn eye_elevation(&self) -> f64 {
        finite_or_zero(self.elevation)
            + finite_or_zero(self.vision.elevation)
            + finite_or_zero(self.vision.eye_height)
    }
}

// -- Map -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Lighting {
    /// Global light: sight is not limited by range.
    #[serde(default)]
    pub global: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapState {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub width: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_size_px: Option<f64>,
    #[serde(default)]
    pub walls: Vec<Wall>,
    #[serde(default)]
    pub lighting: Lighting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terrain: Option<Terrain>,
}

impl MapState {
    pub fn size(&self) -> MapSize {
        MapSize::new(self.width, self.height)
    }

    /// Map size when it describes a usable rectangle.
    pub fn valid_size(&self) -> Option<MapSize> {
        Some(self.size()).filter(MapSize::is_valid)
    }

    pub fn grid_size(&self) -> f64 {
        self.grid_size_px
            .filter(|g| g.is_finite() && *g > 0.0)
            .unwrap_or(DEFAULT_GRID_SIZE_PX)
    }

    pub fn wall(&self, id: &str) -> Option<&Wall> {
        self.walls.iter().find(|w| w.id == id)
    }
}

// -- Tuning --------------------------------------------------------

fn default_range_sample_steps() -> usize {
    96
}
fn default_vertex_proximity_px() -> f64 {
    1.0
}
fn default_origin_nudge_px() -> f64 {
    0.75
}
fn default_angle_epsilon() -> f64 {
    1e-9
}
fn default_endpoint_flank_rad() -> f64 {
    1e-5
}
fn default_point_merge_px() -> f64 {
    0.25
}
fn default_fallback_ray_limit_px() -> f64 {
    8192.0
}

/// Knobs for the visibility polygon sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionTuning {
    /// Uniform rays added when a finite range applies.
    #[serde(default = "default_range_sample_steps")]
    pub range_sample_steps: usize,
    #[serde(default = "default_vertex_proximity_px")]
    pub vertex_proximity_px: f64,
    #[serde(default = "default_origin_nudge_px")]
    pub origin_nudge_px: f64,
    #[serde(default = "default_angle_epsilon")]
    pub angle_epsilon: f64,
    /// Extra rays either side of each endpoint angle so the sweep sees
    /// past silhouette corners. Zero disables them.
    #[serde(default = "default_endpoint_flank_rad")]
    pub endpoint_flank_rad: f64,
    #[serde(default = "default_point_merge_px")]
    pub point_merge_px: f64,
    #[serde(default = "default_fallback_ray_limit_px")]
    pub fallback_ray_limit_px: f64,
}

impl Default for VisionTuning {
    fn default() -> Self {
        Self {
            range_sample_steps: 96,
            vertex_proximity_px: 1.0,
            origin_nudge_px: 0.75,
            angle_epsilon: 1e-9,
            endpoint_flank_rad: 1e-5,
            point_merge_px: 0.25,
            fallback_ray_limit_px: 8192.0,
        }
    }
}

/// Most uniform rays a ranged sweep will cast.
pub const MAX_RANGE_SAMPLE_STEPS: usize = 4096;
pub const MAX_COLLISION_ITERATIONS: u32 = 32;
pub const MAX_BISECT_STEPS: u32 = 64;

fn non_negative_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        fallback
    }
}

impl VisionTuning {
    /// Copy with every knob inside its usable range. Request JSON can
    /// carry arbitrary values; the sweep only ever runs on these.
    pub fn bounded(&self) -> Self {
        let d = Self::default();
        Self {
            range_sample_steps: self.range_sample_steps.min(MAX_RANGE_SAMPLE_STEPS),
            vertex_proximity_px: non_negative_or(self.vertex_proximity_px, d.vertex_proximity_px),
            origin_nudge_px: non_negative_or(self.origin_nudge_px, d.origin_nudge_px),
            angle_epsilon: non_negative_or(self.angle_epsilon, d.angle_epsilon),
            endpoint_flank_rad: non_negative_or(self.endpoint_flank_rad, d.endpoint_flank_rad),
            point_merge_px: non_negative_or(self.point_merge_px, d.point_merge_px),
            fallback_ray_limit_px: Some(self.fallback_ray_limit_px)
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(d.fallback_ray_limit_px),
        }
    }
}

fn default_skin_px() -> f64 {
    6.0
}
fn default_relax_px() -> f64 {
    2.0
}
fn default_epsilon_px() -> f64 {
    0.5
}
fn default_corner_nudge_px() -> f64 {
    2.0
}
fn default_max_iterations() -> u32 {
    6
}
fn default_bisect_steps() -> u32 {
    20
}

/// Knobs for swept-circle movement clamping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionTuning {
    #[serde(default = "default_skin_px")]
    pub skin_px: f64,
    /// Extra skin while a drag is being dropped.
    #[serde(default = "default_relax_px")]
    pub relax_px: f64,
    #[serde(default = "default_epsilon_px")]
    pub epsilon_px: f64,
    #[serde(default = "default_corner_nudge_px")]
    pub corner_nudge_px: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_bisect_steps")]
    pub bisect_steps: u32,
}

impl Default for CollisionTuning {
    fn default() -> Self {
        Self {
            skin_px: 6.0,
            relax_px: 2.0,
            epsilon_px: 0.5,
            corner_nudge_px: 2.0,
            max_iterations: 6,
            bisect_steps: 20,
        }
    }
}

impl CollisionTuning {
    /// Copy with pixel sizes finite and non-negative and loop counts capped.
    pub fn bounded(&self) -> Self {
        let d = Self::default();
        Self {
            skin_px: non_negative_or(self.skin_px, d.skin_px),
            relax_px: non_negative_or(self.relax_px, d.relax_px),
            epsilon_px: non_negative_or(self.epsilon_px, d.epsilon_px),
            corner_nudge_px: non_negative_or(self.corner_nudge_px, d.corner_nudge_px),
            max_iterations: self.max_iterations.min(MAX_COLLISION_ITERATIONS),
            bisect_steps: self.bisect_steps.min(MAX_BISECT_STEPS),
        }
    }
}

// -- Tests ---------------------------------------------------------
