//! Frame-coalesced vision recomputation.
//!
//! Any number of [`VisionController::request`] calls between two frames
//! collapse into one recompute at the next [`VisionController::run_frame`].
//! Each recompute reads an immutable [`SceneSnapshot`]; edits build a new
//! snapshot, so a frame never sees a half-applied wall change.

use std::sync::Arc;

use crate::types::{MapState, Point, Token};
use crate::visibility::{compute_vision_for_map, VisionOptions};
use crate::walls::Wall;

/// The scene as one frame sees it.
#[derive(Debug, Clone)]
pub struct SceneSnapshot {
    pub map: Option<Arc<MapState>>,
    pub tokens: Arc<[Token]>,
    /// Token whose vision is shown.
    pub active_token: Option<String>,
}

impl Default for SceneSnapshot {
    fn default() -> Self {
        Self {
            map: None,
            tokens: Arc::from(Vec::new()),
            active_token: None,
        }
    }
}

impl SceneSnapshot {
    pub fn new(map: MapState, tokens: Vec<Token>, active_token: Option<String>) -> Self {
        Self {
            map: Some(Arc::new(map)),
            tokens: tokens.into(),
            active_token,
        }
    }

    /// A new snapshot with the map's walls replaced. Holders of `self`
    /// keep the old wall list.
    pub fn with_walls(&self, walls: Vec<Wall>) -> Self {
        let map = self.map.as_deref().map(|m| {
            Arc::new(MapState {
                walls,
                ..m.clone()
            })
        });
        Self {
            map,
            ..self.clone()
        }
    }

    pub fn with_tokens(&self, tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into(),
            ..self.clone()
        }
    }

    pub fn with_active_token(&self, id: Option<String>) -> Self {
        Self {
            active_token: id,
            ..self.clone()
        }
    }

    pub fn token(&self, id: &str) -> Option<&Token> {
        self.tokens.iter().find(|t| t.id == id)
    }
}

/// Why the vision overlay was cleared instead of drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearReason {
    NoMap,
    NoActiveToken,
    TokenNotFound(String),
    NoPolygon,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VisionUpdate {
    Polygon {
        token_id: String,
        points: Vec<Point>,
        /// Reason passed to the last request before this frame.
        reason: String,
    },
    Cleared(ClearReason),
}

#[derive(Debug, Clone, Default)]
pub struct VisionController {
    options: VisionOptions,
    pending: bool,
    last_reason: String,
    frames: u64,
}

impl VisionController {
    pub fn new(options: VisionOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Ask for a recompute on the next frame. Returns `true` if this call
    /// scheduled the frame, `false` if one was already pending. The latest
    /// reason always wins.
    pub fn request(&mut self, reason: impl Into<String>) -> bool {
        self.last_reason = reason.into();
        if self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn last_reason(&self) -> &str {
        &self.last_reason
    }

    /// Number of recomputes run so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run the pending recompute, if any, against `scene`.
    pub fn run_frame(&mut self, scene: &SceneSnapshot) -> Option<VisionUpdate> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        self.frames += 1;
        Some(self.recompute(scene))
    }

    /// Recompute immediately, ignoring the pending flag.
    pub fn recompute(&self, scene: &SceneSnapshot) -> VisionUpdate {
        log::debug!("vision recompute: {}", self.last_reason);

        let Some(map) = scene.map.as_deref() else {
            log::warn!("vision: no active map");
            return VisionUpdate::Cleared(ClearReason::NoMap);
        };
        let Some(token_id) = scene.active_token.as_deref() else {
            log::warn!("vision: no active vision token selected");
            return VisionUpdate::Cleared(ClearReason::NoActiveToken);
        };
        let Some(token) = scene.token(token_id) else {
            log::warn!("vision: token {token_id} not found");
            return VisionUpdate::Cleared(ClearReason::TokenNotFound(token_id.to_owned()));
        };

        match compute_vision_for_map(token, map, &self.options) {
            Some(points) if !points.is_empty() => {
                log::debug!("vision: {} polygon points for {}", points.len(), token.id);
                VisionUpdate::Polygon {
                    token_id: token.id.clone(),
                    points,
                    reason: self.last_reason.clone(),
                }
            }
            _ => {
                log::warn!("vision: no polygon generated for {}", token.id);
                VisionUpdate::Cleared(ClearReason::NoPolygon)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> MapState {
        MapState {
            id: "m".into(),
            width: 200.0,
            height: 200.0,
            grid_size_px: Some(50.0),
            ..MapState::default()
        }
    }

    fn scene() -> SceneSnapshot {
        SceneSnapshot::new(room(), vec![Token::new("t", 75.0, 75.0, 50.0)], Some("t".into()))
    }

    #[test]
    fn requests_coalesce_into_one_frame() {
        let mut controller = VisionController::default();
        assert!(controller.run_frame(&scene()).is_none());

        assert!(controller.request("token-moved"));
        assert!(!controller.request("wall-added"));
        assert!(controller.is_pending());
        assert_eq!(controller.last_reason(), "wall-added");

        let update = controller.run_frame(&scene()).expect("frame");
        match update {
            VisionUpdate::Polygon { token_id, points, reason } => {
                assert_eq!(token_id, "t");
                assert!(points.len() >= 3);
                assert_eq!(reason, "wall-added");
            }
            other => panic!("expected polygon, got {other:?}"),
        }
        assert!(!controller.is_pending());
        assert!(controller.run_frame(&scene()).is_none());
        assert_eq!(controller.frames(), 1);
    }

    #[test]
    fn missing_inputs_clear_the_overlay() {
        let controller = VisionController::default();
        assert_eq!(
            controller.recompute(&SceneSnapshot::default()),
            VisionUpdate::Cleared(ClearReason::NoMap)
        );
        assert_eq!(
            controller.recompute(&scene().with_active_token(None)),
            VisionUpdate::Cleared(ClearReason::NoActiveToken)
        );
        assert_eq!(
            controller.recompute(&scene().with_active_token(Some("gone".into()))),
            VisionUpdate::Cleared(ClearReason::TokenNotFound("gone".into()))
        );
        let lost = Token::new("t", f64::NAN, 0.0, 50.0);
        assert_eq!(
            controller.recompute(&scene().with_tokens(vec![lost])),
            VisionUpdate::Cleared(ClearReason::NoPolygon)
        );
    }

    #[test]
    fn snapshots_isolate_wall_edits() {
        let before = scene();
        let after = before.with_walls(vec![Wall::new("w", Point::new(100.0, 0.0), Point::new(100.0, 200.0))]);
        assert!(before.map.as_ref().is_some_and(|m| m.walls.is_empty()));
        assert_eq!(after.map.as_ref().map(|m| m.walls.len()), Some(1));
        assert!(Arc::ptr_eq(&before.tokens, &after.tokens));
    }
}
