//! Wall and door model.
//!
//! Stored wall records come in several legacy shapes (`kind` vs `type`,
//! boolean `blocksMovement` vs the `move` channel, endpoints as `c` or
//! `a`/`b`). They are normalized once, at the serde boundary, into
//! [`Wall`]; everything downstream only sees the canonical form.

use serde::{Deserialize, Deserializer, Serialize};

use crate::geometry::orient;
use crate::types::{lenient_coords, Point};

// -- Enumerations --------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WallType {
    Wall,
    Door,
    Window,
}

impl WallType {
    /// Case-insensitive parse of `WALL`/`DOOR`/`WINDOW`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WALL" => Some(WallType::Wall),
            "DOOR" => Some(WallType::Door),
            "WINDOW" => Some(WallType::Window),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WallType::Wall => "WALL",
            WallType::Door => "DOOR",
            WallType::Window => "WINDOW",
        }
    }
}

/// Strength of a wall on one channel (movement, sight, light, sound).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Obstruction {
    None,
    #[default]
    Normal,
    Limited,
}

impl Obstruction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Some(Obstruction::None),
            "NORMAL" => Some(Obstruction::Normal),
            "LIMITED" => Some(Obstruction::Limited),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Obstruction::None => "NONE",
            Obstruction::Normal => "NORMAL",
            Obstruction::Limited => "LIMITED",
        }
    }
}

/// Which side of the directed line A→B a wall blocks from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// `dir = 0`
    #[default]
    Both,
    /// `dir = 1`: blocks viewers on the left of A→B (cross product ≥ 0).
    Left,
    /// `dir = 2`: blocks viewers on the right of A→B (cross product ≤ 0).
    Right,
}

impl Direction {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Direction::Left,
            2 => Direction::Right,
            _ => Direction::Both,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Direction::Both => 0,
            Direction::Left => 1,
            Direction::Right => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DoorState {
    Open,
    #[default]
    Closed,
    Locked,
}

impl DoorState {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Some(DoorState::Open),
            "CLOSED" => Some(DoorState::Closed),
            "LOCKED" => Some(DoorState::Locked),
            _ => None,
        }
    }
}

fn lenient_door_state<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DoorState>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.as_deref().and_then(DoorState::parse))
}

/// Case-insensitive channel level; unknown values read as absent.
fn lenient_obstruction<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Obstruction>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.as_deref().and_then(Obstruction::parse))
}

fn lenient_dir<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
    let raw: Option<serde_json::Value> = Option::deserialize(d)?;
    let code = match raw {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(code
        .filter(|c| c.is_finite())
        .map(|c| Direction::from_code(c as u8).code()))
}

// -- Doors ---------------------------------------------------------

/// A door record as stored or as sent in a mutation: every field optional.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoorPatch {
    #[serde(
        default,
        deserialize_with = "lenient_door_state",
        skip_serializing_if = "Option::is_none"
    )]
    pub state: Option<DoorState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hinge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness_px: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ac: Option<f64>,
    /// Material key, see [`DoorMaterial`].
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage_threshold: Option<f64>,
}

/// A normalized door. `open`, `locked` and `open_pct` always agree
/// with `state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "DoorPatch")]
pub struct Door {
    pub state: DoorState,
    pub open_pct: f64,
    pub open: bool,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hinge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thickness_px: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ac: Option<f64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damage_threshold: Option<f64>,
}

impl Default for Door {
    fn default() -> Self {
        normalize_door_data(&DoorPatch::default(), &DoorPatch::default())
    }
}

impl Door {
    /// Fully open doors never block movement or sight. Partially open
    /// doors (below 99%) still do.
    pub fn is_fully_open(&self) -> bool {
        self.state == DoorState::Open || self.open_pct >= 99.0
    }
}

impl From<DoorPatch> for Door {
    fn from(patch: DoorPatch) -> Self {
        normalize_door_data(&patch, &DoorPatch::default())
    }
}

impl From<&Door> for DoorPatch {
    fn from(door: &Door) -> Self {
        DoorPatch {
            state: Some(door.state),
            open_pct: Some(door.open_pct),
            open: Some(door.open),
            locked: Some(door.locked),
            hinge: door.hinge.clone(),
            swing: door.swing.clone(),
            thickness_px: door.thickness_px,
            hp: door.hp,
            ac: door.ac,
            material: door.material.clone(),
            damage_threshold: door.damage_threshold,
        }
    }
}

/// State implied by a raw record: explicit `state`, then `locked`, then `open`.
pub fn resolve_door_state(door: &DoorPatch) -> DoorState {
    if let Some(state) = door.state {
        return state;
    }
    if door.locked == Some(true) {
        return DoorState::Locked;
    }
    if door.open == Some(true) {
        return DoorState::Open;
    }
    DoorState::Closed
}

/// Merge `patch` over `existing` and re-derive a consistent door.
///
/// Every door mutation goes through here. Without an explicit state the
/// patch's `locked`/`open` flags drive the transition (a locked door
/// cannot be opened by `open` alone). Unless locked, `openPct ≥ 99`
/// forces OPEN and `openPct ≤ 1` forces CLOSED. LOCKED always ends with
/// `openPct = 0` and `open = false`.
pub fn normalize_door_data(patch: &DoorPatch, existing: &DoorPatch) -> Door {
    let prior = resolve_door_state(existing);
    let mut state = match patch.state {
        Some(state) => state,
        None => match (patch.locked, patch.open) {
            (Some(true), _) => DoorState::Locked,
            (Some(false), open) if prior == DoorState::Locked => {
                if open == Some(true) {
                    DoorState::Open
                } else {
                    DoorState::Closed
                }
            }
            (_, Some(open)) if prior != DoorState::Locked => {
                if open {
                    DoorState::Open
                } else {
                    DoorState::Closed
                }
            }
            _ => prior,
        },
    };

    // A stale percentage must not undo an explicit state change.
    let state_changed = patch.state.is_some() || patch.open.is_some() || patch.locked.is_some();
    let pct = patch
        .open_pct
        .or(if state_changed { None } else { existing.open_pct })
        .filter(|p| p.is_finite())
        .map(|p| p.clamp(0.0, 100.0));

    if state != DoorState::Locked {
        if let Some(p) = pct {
            if p >= 99.0 {
                state = DoorState::Open;
            } else if p <= 1.0 {
                state = DoorState::Closed;
            }
        }
    }

    let open_pct = match state {
        DoorState::Locked => 0.0,
        DoorState::Open => pct.unwrap_or(100.0),
        DoorState::Closed => pct.unwrap_or(0.0),
    };

    Door {
        state,
        open_pct,
        open: state == DoorState::Open,
        locked: state == DoorState::Locked,
        hinge: patch.hinge.clone().or_else(|| existing.hinge.clone()),
        swing: patch.swing.clone().or_else(|| existing.swing.clone()),
        thickness_px: patch.thickness_px.or(existing.thickness_px),
        hp: patch.hp.or(existing.hp),
        ac: patch.ac.or(existing.ac),
        material: patch.material.clone().or_else(|| existing.material.clone()),
        damage_threshold: patch.damage_threshold.or(existing.damage_threshold),
    }
}

/// Movement/sight obstruction a door imposes in a given state.
pub fn obstruction_for_state(state: DoorState) -> Obstruction {
    match state {
        DoorState::Open => Obstruction::None,
        DoorState::Closed | DoorState::Locked => Obstruction::Normal,
    }
}

// -- Walls ---------------------------------------------------------

/// Vertical extent over which a wall occludes. Unbounded by default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationSpan {
    pub bottom: f64,
    pub top: f64,
}

impl ElevationSpan {
    pub const UNBOUNDED: ElevationSpan = ElevationSpan {
        bottom: f64::NEG_INFINITY,
        top: f64::INFINITY,
    };

    pub fn new(bottom: f64, top: f64) -> Self {
        Self { bottom, top }
    }

    pub fn contains(&self, z: f64) -> bool {
        z >= self.bottom && z <= self.top
    }
}

impl Default for ElevationSpan {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// A normalized wall, door or window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawWall", into = "RawWall")]
pub struct Wall {
    pub id: String,
    pub a: Point,
    pub b: Point,
    pub kind: WallType,
    pub movement: Obstruction,
    pub sight: Obstruction,
    pub light: Obstruction,
    pub sound: Obstruction,
    pub dir: Direction,
    pub door: Option<Door>,
    pub invisible: bool,
    pub elevation: ElevationSpan,
}

impl Wall {
    /// A plain two-sided wall blocking every channel.
    pub fn new(id: impl Into<String>, a: Point, b: Point) -> Self {
        Self {
            id: id.into(),
            a,
            b,
            kind: WallType::Wall,
            movement: Obstruction::Normal,
            sight: Obstruction::Normal,
            light: Obstruction::Normal,
            sound: Obstruction::Normal,
            dir: Direction::Both,
            door: None,
            invisible: false,
            elevation: ElevationSpan::UNBOUNDED,
        }
    }

    pub fn door(id: impl Into<String>, a: Point, b: Point, door: Door) -> Self {
        let obstruction = obstruction_for_state(door.state);
        Self {
            kind: WallType::Door,
            movement: obstruction,
            sight: obstruction,
            door: Some(door),
            ..Self::new(id, a, b)
        }
    }

    pub fn with_dir(mut self, dir: Direction) -> Self {
        self.dir = dir;
        self
    }

    pub fn with_elevation(mut self, span: ElevationSpan) -> Self {
        self.elevation = span;
        self
    }

    pub fn is_door(&self) -> bool {
        self.kind == WallType::Door
    }

    /// True for a DOOR whose door record is fully open.
    pub fn is_door_open(&self) -> bool {
        self.is_door() && self.door.as_ref().is_some_and(Door::is_fully_open)
    }

    pub fn midpoint(&self) -> Point {
        Point::new((self.a.x + self.b.x) / 2.0, (self.a.y + self.b.y) / 2.0)
    }
}

/// Midpoint of a door, where interaction handles are drawn.
pub fn door_midpoint(wall: &Wall) -> Point {
    wall.midpoint()
}

fn directional_block(wall: &Wall, origin: Option<Point>) -> bool {
    // No origin (or garbage) is treated as blocking.
    let Some(origin) = origin.filter(|o| o.is_finite()) else {
        return true;
    };
    let side = orient(wall.a, wall.b, origin);
    match wall.dir {
        Direction::Both => true,
        Direction::Left => side >= 0.0,
        Direction::Right => side <= 0.0,
    }
}

/// Does `wall` stop a token moving from `origin`?
pub fn wall_blocks_movement(wall: &Wall, origin: Option<Point>) -> bool {
    if wall.is_door_open() || wall.movement == Obstruction::None {
        return false;
    }
    directional_block(wall, origin)
}

/// Does `wall` stop sight from `origin`?
pub fn wall_blocks_sight(wall: &Wall, origin: Option<Point>) -> bool {
    if wall.is_door_open() || wall.sight == Obstruction::None {
        return false;
    }
    directional_block(wall, origin)
}

// -- Storage shape -------------------------------------------------

/// Elevation bounds as stored under `flags.elevation` or `flags["wall-height"]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawSpan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
}

impl RawSpan {
    fn bottom_candidates(&self) -> [Option<f64>; 3] {
        [self.bottom, self.min, self.low]
    }

    fn top_candidates(&self) -> [Option<f64>; 3] {
        [self.top, self.max, self.high]
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawWallFlags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invisible: Option<bool>,
    #[serde(default, alias = "elevations", skip_serializing_if = "Option::is_none")]
    pub elevation: Option<RawSpan>,
    #[serde(
        default,
        rename = "wall-height",
        alias = "wallHeight",
        skip_serializing_if = "Option::is_none"
    )]
    pub wall_height: Option<RawSpan>,
}

/// A wall record exactly as persisted by the client, legacy fields included.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWall {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_coords", skip_serializing_if = "Option::is_none")]
    pub c: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b: Option<Point>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub wall_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "move", default, skip_serializing_if = "Option::is_none")]
    pub movement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks_movement: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks_vision: Option<bool>,
    #[serde(default, deserialize_with = "lenient_dir", skip_serializing_if = "Option::is_none")]
    pub dir: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub door: Option<DoorPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<RawWallFlags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_bottom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_top: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_bottom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_top: Option<f64>,
}

/// Classify a raw record: explicit `type`/`kind` wins, then the presence
/// of a door sub-record, then WALL.
pub fn resolve_wall_type(raw: &RawWall) -> WallType {
    let explicit = raw
        .wall_type
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .or(raw.kind.as_deref());
    if let Some(kind) = explicit.and_then(WallType::parse) {
        return kind;
    }
    if raw.door.is_some() {
        return WallType::Door;
    }
    WallType::Wall
}

fn raw_endpoints(raw: &RawWall) -> (Point, Point) {
    if let Some(c) = raw.c.as_deref().filter(|c| c.len() >= 4) {
        let v = |i: usize| if c[i].is_finite() { c[i] } else { 0.0 };
        return (Point::new(v(0), v(1)), Point::new(v(2), v(3)));
    }
    match (raw.a, raw.b) {
        (Some(a), Some(b)) => (a, b),
        _ => (Point::default(), Point::default()),
    }
}

fn resolve_channel(raw: Option<&str>, legacy: Option<bool>, fallback: Obstruction) -> Obstruction {
    if let Some(level) = raw.and_then(Obstruction::parse) {
        return level;
    }
    match legacy {
        Some(true) => Obstruction::Normal,
        Some(false) => Obstruction::None,
        None => fallback,
    }
}

fn first_finite(candidates: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    candidates.into_iter().flatten().find(|v| v.is_finite())
}

fn resolve_elevation_span(raw: &RawWall) -> ElevationSpan {
    let flags = raw.flags.as_ref();
    let wall_height = flags.and_then(|f| f.wall_height.as_ref());
    let elevation = flags.and_then(|f| f.elevation.as_ref());

    let mut bottoms = vec![raw.height_bottom, raw.bottom, raw.z_bottom];
    let mut tops = vec![raw.height_top, raw.top, raw.z_top];
    for span in [wall_height, elevation].into_iter().flatten() {
        bottoms.extend(span.bottom_candidates());
        tops.extend(span.top_candidates());
    }

    ElevationSpan {
        bottom: first_finite(bottoms).unwrap_or(f64::NEG_INFINITY),
        top: first_finite(tops).unwrap_or(f64::INFINITY),
    }
}

impl From<RawWall> for Wall {
    fn from(raw: RawWall) -> Self {
        let kind = resolve_wall_type(&raw);
        let (a, b) = raw_endpoints(&raw);
        let see_through = if kind == WallType::Window {
            Obstruction::None
        } else {
            Obstruction::Normal
        };
        let door = match (kind, raw.door.as_ref()) {
            (WallType::Door, Some(d)) => Some(normalize_door_data(d, &DoorPatch::default())),
            (WallType::Door, None) => Some(Door::default()),
            (_, Some(d)) => Some(normalize_door_data(d, &DoorPatch::default())),
            _ => None,
        };

        Wall {
            kind,
            a,
            b,
            movement: resolve_channel(raw.movement.as_deref(), raw.blocks_movement, Obstruction::Normal),
            sight: resolve_channel(raw.sight.as_deref(), raw.blocks_vision, see_through),
            light: resolve_channel(raw.light.as_deref(), None, see_through),
            sound: resolve_channel(raw.sound.as_deref(), None, Obstruction::Normal),
            dir: Direction::from_code(raw.dir.unwrap_or(0)),
            door,
            invisible: raw
                .flags
                .as_ref()
                .and_then(|f| f.invisible)
                .unwrap_or(false),
            elevation: resolve_elevation_span(&raw),
            id: raw.id,
        }
    }
}

impl From<Wall> for RawWall {
    fn from(wall: Wall) -> Self {
        let span = RawSpan {
            bottom: Some(wall.elevation.bottom).filter(|v| v.is_finite()),
            top: Some(wall.elevation.top).filter(|v| v.is_finite()),
            ..RawSpan::default()
        };
        let has_span = span.bottom.is_some() || span.top.is_some();
        RawWall {
            id: wall.id,
            c: Some(vec![wall.a.x, wall.a.y, wall.b.x, wall.b.y]),
            a: Some(wall.a),
            b: Some(wall.b),
            wall_type: Some(wall.kind.as_str().to_string()),
            kind: Some(wall.kind.as_str().to_ascii_lowercase()),
            movement: Some(wall.movement.as_str().to_string()),
            sight: Some(wall.sight.as_str().to_string()),
            light: Some(wall.light.as_str().to_string()),
            sound: Some(wall.sound.as_str().to_string()),
            blocks_movement: Some(wall.movement != Obstruction::None),
            blocks_vision: Some(wall.sight != Obstruction::None),
            dir: Some(wall.dir.code()),
            door: wall.door.as_ref().map(DoorPatch::from),
            flags: Some(RawWallFlags {
                invisible: Some(wall.invisible),
                elevation: has_span.then_some(span),
                wall_height: None,
            }),
            ..RawWall::default()
        }
    }
}

// -- Presets and mutations -----------------------------------------

/// Wall styles offered by the drawing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WallPreset {
    #[default]
    Normal,
    /// Slows movement, does not block sight.
    Terrain,
    /// Blocks movement only, and is hidden from players.
    Invisible,
    Window,
}

impl WallPreset {
    pub fn parse(key: &str) -> Option<Self> {
        match key.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Some(WallPreset::Normal),
            "TERRAIN" => Some(WallPreset::Terrain),
            "INVISIBLE" => Some(WallPreset::Invisible),
            "WINDOW" => Some(WallPreset::Window),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WallPreset::Normal => "Normal",
            WallPreset::Terrain => "Terrain",
            WallPreset::Invisible => "Invisible",
            WallPreset::Window => "Window",
        }
    }

    fn apply(self, wall: &mut Wall) {
        use Obstruction::{Limited, None, Normal};
        let (kind, movement, sight, light, sound) = match self {
            WallPreset::Normal => (WallType::Wall, Normal, Normal, Normal, Normal),
            WallPreset::Terrain => (WallType::Wall, Limited, None, Normal, Normal),
            WallPreset::Invisible => (WallType::Wall, Normal, None, None, Normal),
            WallPreset::Window => (WallType::Window, Normal, None, None, Normal),
        };
        wall.kind = kind;
        wall.movement = movement;
        wall.sight = sight;
        wall.light = light;
        wall.sound = sound;
        wall.invisible = self == WallPreset::Invisible;
    }
}

/// Build a new wall from a drawing gesture.
pub fn build_wall(
    id: impl Into<String>,
    start: Point,
    end: Point,
    preset: WallPreset,
    dir: Direction,
) -> Wall {
    let finite = |p: Point| Point::new(
        if p.x.is_finite() { p.x } else { 0.0 },
        if p.y.is_finite() { p.y } else { 0.0 },
    );
    let mut wall = Wall::new(id, finite(start), finite(end)).with_dir(dir);
    preset.apply(&mut wall);
    wall
}

/// Standard door constructions (5e DMG object table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoorMaterial {
    WoodSimple,
    WoodGood,
    WoodHeavy,
    WoodReinforced,
    Stone,
    Iron,
    PortcullisWood,
    PortcullisIron,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoorMaterialStats {
    pub label: &'static str,
    pub thickness_ft: f64,
    pub ac: u32,
    pub hp: u32,
    pub damage_threshold: Option<u32>,
}

/// Door thickness is drawn at this many pixels per foot.
const DOOR_THICKNESS_PX_PER_FT: f64 = 4.0;

impl DoorMaterial {
    pub const ALL: [DoorMaterial; 8] = [
        DoorMaterial::WoodSimple,
        DoorMaterial::WoodGood,
        DoorMaterial::WoodHeavy,
        DoorMaterial::WoodReinforced,
        DoorMaterial::Stone,
        DoorMaterial::Iron,
        DoorMaterial::PortcullisWood,
        DoorMaterial::PortcullisIron,
    ];

    pub fn key(self) -> &'static str {
        match self {
            DoorMaterial::WoodSimple => "WOOD_SIMPLE",
            DoorMaterial::WoodGood => "WOOD_GOOD",
            DoorMaterial::WoodHeavy => "WOOD_HEAVY",
            DoorMaterial::WoodReinforced => "WOOD_REINFORCED",
            DoorMaterial::Stone => "STONE",
            DoorMaterial::Iron => "IRON",
            DoorMaterial::PortcullisWood => "PORTCULLIS_WOOD",
            DoorMaterial::PortcullisIron => "PORTCULLIS_IRON",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|m| m.key() == key)
    }

    pub fn stats(self) -> DoorMaterialStats {
        let (label, thickness_ft, ac, hp, damage_threshold) = match self {
            DoorMaterial::WoodSimple => ("Wooden, Simple", 3.0, 15, 10, None),
            DoorMaterial::WoodGood => ("Wooden, Good", 4.0, 15, 15, None),
            DoorMaterial::WoodHeavy => ("Wooden, Heavy", 6.0, 15, 25, Some(10)),
            DoorMaterial::WoodReinforced => ("Wooden, Reinforced", 6.0, 17, 40, Some(15)),
            DoorMaterial::Stone => ("Stone", 6.0, 17, 60, Some(25)),
            DoorMaterial::Iron => ("Iron", 4.0, 19, 100, Some(30)),
            DoorMaterial::PortcullisWood => ("Portcullis, Wooden", 5.0, 16, 30, Some(20)),
            DoorMaterial::PortcullisIron => ("Portcullis, Iron", 4.0, 19, 100, Some(30)),
        };
        DoorMaterialStats {
            label,
            thickness_ft,
            ac,
            hp,
            damage_threshold,
        }
    }
}

/// Wall-level fields a door mutation may override.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallPatch {
    #[serde(
        rename = "move",
        default,
        deserialize_with = "lenient_obstruction",
        skip_serializing_if = "Option::is_none"
    )]
    pub movement: Option<Obstruction>,
    #[serde(default, deserialize_with = "lenient_obstruction", skip_serializing_if = "Option::is_none")]
    pub sight: Option<Obstruction>,
    #[serde(default, deserialize_with = "lenient_obstruction", skip_serializing_if = "Option::is_none")]
    pub light: Option<Obstruction>,
    #[serde(default, deserialize_with = "lenient_obstruction", skip_serializing_if = "Option::is_none")]
    pub sound: Option<Obstruction>,
    #[serde(default, deserialize_with = "lenient_dir", skip_serializing_if = "Option::is_none")]
    pub dir: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invisible: Option<bool>,
}

impl WallPatch {
    fn apply(&self, wall: &mut Wall) {
        if let Some(v) = self.movement {
            wall.movement = v;
        }
        if let Some(v) = self.sight {
            wall.sight = v;
        }
        if let Some(v) = self.light {
            wall.light = v;
        }
        if let Some(v) = self.sound {
            wall.sound = v;
        }
        if let Some(v) = self.dir {
            wall.dir = Direction::from_code(v);
        }
        if let Some(v) = self.invisible {
            wall.invisible = v;
        }
    }
}

/// Apply a door mutation to `wall`, returning the updated wall for the
/// caller to persist. Movement and sight follow the new door state, then
/// the optional wall patch is laid on top.
pub fn apply_door_patch(wall: &Wall, patch: &DoorPatch, wall_patch: Option<&WallPatch>) -> Wall {
    let existing = wall.door.as_ref().map(DoorPatch::from).unwrap_or_default();
    let door = normalize_door_data(patch, &existing);
    let obstruction = obstruction_for_state(door.state);

    let mut next = wall.clone();
    next.door = Some(door);
    next.movement = obstruction;
    next.sight = obstruction;
    if let Some(extra) = wall_patch {
        extra.apply(&mut next);
    }
    next
}

/// Stamp a material's stats onto a door.
pub fn set_door_material(wall: &Wall, material: DoorMaterial) -> Wall {
    let stats = material.stats();
    let patch = DoorPatch {
        material: Some(material.key().to_string()),
        hp: Some(f64::from(stats.hp)),
        ac: Some(f64::from(stats.ac)),
        thickness_px: Some(stats.thickness_ft * DOOR_THICKNESS_PX_PER_FT),
        damage_threshold: stats.damage_threshold.map(f64::from),
        ..DoorPatch::default()
    };
    apply_door_patch(wall, &patch, None)
}

// -- Tests ---------------------------------------------------------
