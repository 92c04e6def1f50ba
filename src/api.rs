//! JSON-in / JSON-out entry points.
//!
//! Each function parses a typed request, runs the core and serializes a
//! typed response. The Python module wraps these one-to-one.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::collision::{clamp_token_movement, MoveRequest, MoveResult};
use crate::error::{EngineError, EngineResult};
use crate::segments::extract_vision_segments;
use crate::sight::{compute_cover, compute_token_visibility, Cover, Obstacles, SightOptions, TokenVisibility};
use crate::types::{CollisionTuning, MapState, Point, Token};
use crate::visibility::{resolve_max_distance_px, trace_vision, VisionOptions, VisionTrace};
use crate::walls::{apply_door_patch, set_door_material, DoorMaterial, DoorPatch, Wall, WallPatch};

fn parse<T: DeserializeOwned>(json: &str, what: &'static str) -> EngineResult<T> {
    serde_json::from_str(json).map_err(|source| EngineError::InvalidJson { what, source })
}

fn to_json<T: Serialize>(value: &T, what: &'static str) -> EngineResult<String> {
    serde_json::to_string(value).map_err(|source| EngineError::Serialize { what, source })
}

// -- Vision --------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionRequest {
    pub token: Option<Token>,
    pub map: MapState,
    /// Overrides the range resolved from the token and lighting.
    #[serde(default)]
    pub max_distance_px: Option<f64>,
    #[serde(default)]
    pub options: VisionOptions,
    /// Include every cast ray in the response.
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionResponse {
    pub polygon: Option<Vec<Point>>,
    pub max_distance_px: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<VisionTrace>,
}

pub fn vision(request: &VisionRequest) -> VisionResponse {
    let map = &request.map;
    let max_distance_px = request
        .max_distance_px
        .or_else(|| request.token.as_ref().and_then(|t| resolve_max_distance_px(t, map)));
    let map_size = map.valid_size();
    let segments = extract_vision_segments(&map.walls, map_size);

    let trace = trace_vision(
        request.token.as_ref(),
        Some(segments.as_slice()),
        max_distance_px,
        Some(map.grid_size()),
        map_size,
        &request.options,
    );
    VisionResponse {
        polygon: trace.as_ref().map(|t| t.polygon.clone()),
        max_distance_px,
        trace: trace.filter(|_| request.debug),
    }
}

pub fn vision_json(request_json: &str) -> EngineResult<String> {
    let request: VisionRequest = parse(request_json, "vision request")?;
    to_json(&vision(&request), "vision response")
}

// -- Token visibility and cover ------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SightRequest {
    pub observer: Token,
    pub target: Token,
    pub map: MapState,
    #[serde(default)]
    pub origin_point: Option<Point>,
    #[serde(default)]
    pub origin_elevation: Option<f64>,
    #[serde(default)]
    pub target_elevation: Option<f64>,
    #[serde(default)]
    pub padding: f64,
}

impl SightRequest {
    fn options(&self) -> SightOptions<'_> {
        SightOptions {
            map: Some(&self.map),
            origin_point: self.origin_point,
            origin_elevation: self.origin_elevation,
            target_elevation: self.target_elevation,
            padding: self.padding,
        }
    }
}

pub fn visibility(request: &SightRequest) -> TokenVisibility {
    compute_token_visibility(
        &request.observer,
        &request.target,
        Obstacles::Map(&request.map),
        &request.options(),
    )
}

pub fn cover(request: &SightRequest) -> Cover {
    compute_cover(
        &request.observer,
        &request.target,
        Obstacles::Map(&request.map),
        &request.options(),
    )
}

pub fn visibility_json(request_json: &str) -> EngineResult<String> {
    let request: SightRequest = parse(request_json, "visibility request")?;
    to_json(&visibility(&request), "visibility response")
}

pub fn cover_json(request_json: &str) -> EngineResult<String> {
    let request: SightRequest = parse(request_json, "cover request")?;
    to_json(&cover(&request), "cover response")
}

// -- Movement ------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementRequest {
    pub start: Point,
    pub end: Point,
    pub radius: f64,
    #[serde(default)]
    pub walls: Vec<Wall>,
    #[serde(default)]
    pub relax_on_drop: bool,
    #[serde(default)]
    pub tuning: CollisionTuning,
}

pub fn clamp_movement(request: &MovementRequest) -> MoveResult {
    clamp_token_movement(&MoveRequest {
        start: request.start,
        end: request.end,
        radius: request.radius,
        walls: &request.walls,
        relax_on_drop: request.relax_on_drop,
        tuning: request.tuning.clone(),
    })
}

pub fn clamp_movement_json(request_json: &str) -> EngineResult<String> {
    let request: MovementRequest = parse(request_json, "movement request")?;
    to_json(&clamp_movement(&request), "movement result")
}

// -- Door mutation -------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoorUpdateRequest {
    pub walls: Vec<Wall>,
    pub wall_id: String,
    #[serde(default)]
    pub door: DoorPatch,
    #[serde(default)]
    pub wall: Option<WallPatch>,
    /// Material key such as `"WOOD_HEAVY"`, stamped after the patch.
    #[serde(default)]
    pub material: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoorUpdateResponse {
    pub wall: Wall,
}

pub fn door_update(request: &DoorUpdateRequest) -> EngineResult<DoorUpdateResponse> {
    let target = request
        .walls
        .iter()
        .find(|w| w.id == request.wall_id)
        .ok_or_else(|| EngineError::UnknownWall(request.wall_id.clone()))?;

    let mut wall = apply_door_patch(target, &request.door, request.wall.as_ref());
    if let Some(key) = request.material.as_deref() {
        let material = DoorMaterial::parse(key).ok_or_else(|| EngineError::UnknownMaterial(key.to_owned()))?;
        wall = set_door_material(&wall, material);
    }
    Ok(DoorUpdateResponse { wall })
}

pub fn door_update_json(request_json: &str) -> EngineResult<String> {
    let request: DoorUpdateRequest = parse(request_json, "door update")?;
    to_json(&door_update(&request)?, "door update response")
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn call(f: fn(&str) -> EngineResult<String>, request: Value) -> Value {
        let out = f(&request.to_string()).expect("bridge call");
        serde_json::from_str(&out).expect("response json")
    }

    #[test]
    fn vision_bridge_returns_polygon() {
        let out = call(
            vision_json,
            json!({
                "token": {"id": "t", "x": 0, "y": 0, "size": 64},
                "map": {"width": 640, "height": 640, "gridSizePx": 64, "lighting": {"global": true}},
            }),
        );
        let polygon = out["polygon"].as_array().expect("polygon");
        assert!(polygon.len() >= 3);
        assert!(out["maxDistancePx"].is_null());
        assert!(out.get("trace").is_none());
    }

    #[test]
    fn vision_bridge_without_token_has_no_polygon() {
        let out = call(vision_json, json!({"map": {"width": 100, "height": 100}, "debug": true}));
        assert!(out["polygon"].is_null());
    }

    #[test]
    fn oversized_tuning_is_capped() {
        let out = call(
            vision_json,
            json!({
                "token": {"id": "t", "x": 100, "y": 100, "size": 64},
                "map": {"width": 640, "height": 640, "gridSizePx": 64},
                "maxDistancePx": 200,
                "options": {"tuning": {"rangeSampleSteps": 1_000_000_000_000u64}},
            }),
        );
        let polygon = out["polygon"].as_array().expect("polygon");
        assert!(polygon.len() >= 3);
        assert!(polygon.len() <= crate::types::MAX_RANGE_SAMPLE_STEPS + 64);

        let out = call(
            clamp_movement_json,
            json!({
                "start": {"x": 0, "y": 0},
                "end": {"x": 50, "y": 0},
                "radius": 20,
                "walls": [{"id": "w", "c": [40, -100, 40, 100]}],
                "tuning": {"maxIterations": 4_000_000_000u64, "bisectSteps": 4_000_000_000u64},
            }),
        );
        assert_eq!(out["collided"], true);
    }

    #[test]
    fn null_wall_coordinate_does_not_sink_the_map() {
        let out = call(
            vision_json,
            json!({
                "token": {"id": "t", "x": 300, "y": 300, "size": 64},
                "map": {
                    "width": 640,
                    "height": 640,
                    "lighting": {"global": true},
                    "walls": [
                        {"id": "a", "c": [100, 100, 500, 100]},
                        {"id": "b", "c": [null, 0, 10, 10]},
                    ],
                },
            }),
        );
        assert!(out["polygon"].as_array().is_some_and(|p| p.len() >= 3));
    }

    #[test]
    fn invalid_json_is_reported() {
        let err = vision_json("{not json").expect_err("should fail");
        assert!(matches!(err, EngineError::InvalidJson { .. }));
        assert!(err.to_string().starts_with("Invalid vision request JSON"));
    }

    #[test]
    fn cover_bridge_classifies_full_cover() {
        let out = call(
            cover_json,
            json!({
                "observer": {"id": "a", "x": 0, "y": 0, "size": 0},
                "target": {"id": "b", "x": 200, "y": 0, "size": 0},
                "map": {"gridSizePx": 64, "walls": [{"id": "w", "c": [100, -200, 100, 200]}]},
            }),
        );
        assert_eq!(out["type"], "full");
        assert!(out["modifier"].is_null());

        let out = call(
            visibility_json,
            json!({
                "observer": {"id": "a", "x": 0, "y": 0, "size": 0},
                "target": {"id": "b", "x": 200, "y": 0, "size": 0},
                "map": {"gridSizePx": 64},
            }),
        );
        assert_eq!(out["state"], "full");
    }

    #[test]
    fn movement_bridge_clamps() {
        let out = call(
            clamp_movement_json,
            json!({
                "start": {"x": 0, "y": 0},
                "end": {"x": 50, "y": 0},
                "radius": 20,
                "walls": [{"id": "w", "c": [40, -100, 40, 100]}],
            }),
        );
        assert_eq!(out["collided"], true);
        assert!(out["x"].as_f64().unwrap_or(f64::MAX) <= 19.5);
        assert_eq!(out["hit"]["wallId"], "w");
    }

    #[test]
    fn door_update_locks_and_stamps_material() {
        let out = call(
            door_update_json,
            json!({
                "walls": [{"id": "d", "c": [0, 0, 0, 64], "type": "DOOR", "door": {"state": "OPEN"}}],
                "wallId": "d",
                "door": {"state": "LOCKED"},
                "material": "IRON",
            }),
        );
        let door = &out["wall"]["door"];
        assert_eq!(door["state"], "LOCKED");
        assert_eq!(door["openPct"], 0.0);
        assert_eq!(door["type"], "IRON");
        assert_eq!(out["wall"]["move"], "NORMAL");
    }

    #[test]
    fn door_update_accepts_lowercase_levels() {
        let out = call(
            door_update_json,
            json!({
                "walls": [{"id": "d", "c": [0, 0, 0, 64], "type": "DOOR"}],
                "wallId": "d",
                "wall": {"move": "none", "sight": "limited"},
            }),
        );
        assert_eq!(out["wall"]["move"], "NONE");
        assert_eq!(out["wall"]["sight"], "LIMITED");
    }

    #[test]
    fn door_update_reports_unknown_ids() {
        let request = json!({"walls": [], "wallId": "nope"}).to_string();
        assert!(matches!(door_update_json(&request), Err(EngineError::UnknownWall(id)) if id == "nope"));

        let request = json!({
            "walls": [{"id": "d", "c": [0, 0, 0, 64], "type": "DOOR"}],
            "wallId": "d",
            "material": "CHEESE",
        })
        .to_string();
        assert!(matches!(door_update_json(&request), Err(EngineError::UnknownMaterial(_))));
    }
}
