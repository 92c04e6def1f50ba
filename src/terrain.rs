//! Terrain elevation sampling.
//!
//! A map's ground height comes from, in order: a raster height grid, the
//! highest-priority polygonal region containing the point (optionally
//! sloped), or the terrain's base elevation.

use serde::{Deserialize, Serialize};

use crate::geometry::point_in_polygon;
use crate::types::{MapState, Point, Token, DEFAULT_GRID_SIZE_PX};

/// Slopes flatter than this are treated as level.
const MIN_SLOPE_RATE: f64 = 1e-6;

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Terrain {
    #[serde(default, alias = "base")]
    pub base_elevation: f64,
    #[serde(default)]
    pub regions: Vec<TerrainRegion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raster: Option<TerrainRaster>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainRegion {
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "points", alias = "shape")]
    pub polygon: Vec<Point>,
    /// Height of the region; falls back to the terrain base.
    #[serde(
        default,
        alias = "elevation",
        alias = "z",
        alias = "height",
        alias = "altitude",
        skip_serializing_if = "Option::is_none"
    )]
    pub base: Option<f64>,
    #[serde(default, alias = "gradient", skip_serializing_if = "Option::is_none")]
    pub slope: Option<TerrainSlope>,
    #[serde(default)]
    pub priority: f64,
}

/// Linear incline: height grows by `rate` per pixel along the direction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainSlope {
    #[serde(default, alias = "rise", alias = "perPx")]
    pub rate: f64,
    #[serde(default, alias = "direction", alias = "angle", skip_serializing_if = "Option::is_none")]
    pub direction_deg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radians: Option<f64>,
    #[serde(default, alias = "anchor", skip_serializing_if = "Option::is_none")]
    pub origin: Option<Point>,
}

impl TerrainSlope {
    /// Height offset at `p`. Without a direction the slope rises toward +y.
    pub fn offset_at(&self, p: Point) -> f64 {
        if !self.rate.is_finite() || self.rate.abs() < MIN_SLOPE_RATE {
            return 0.0;
        }
        let radians = self
            .direction_deg
            .filter(|d| d.is_finite())
            .map(f64::to_radians)
            .or(self.radians.filter(|r| r.is_finite()));
        let axis = radians.map_or(Point::new(0.0, 1.0), |r| Point::new(r.cos(), r.sin()));
        let origin = self.origin.unwrap_or_default();
        (p - origin).dot(axis) * self.rate
    }
}

/// Row-major height grid; each cell covers `scale` pixels square.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainRaster {
    pub width: usize,
    pub height: usize,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub data: Vec<Option<f64>>,
}

impl TerrainRaster {
    pub fn sample(&self, x: f64, y: f64) -> Option<f64> {
        let scale = if self.scale.is_finite() && self.scale > 0.0 {
            self.scale
        } else {
            1.0
        };
        let (px, py) = ((x / scale).floor(), (y / scale).floor());
        if !(px >= 0.0 && py >= 0.0 && px < self.width as f64 && py < self.height as f64) {
            return None;
        }
        let idx = py as usize * self.width + px as usize;
        self.data.get(idx).copied().flatten().filter(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerrainSource {
    Raster,
    Region,
    Base,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainSample {
    pub height: f64,
    pub source: TerrainSource,
    /// Id of the winning region, when a region supplied the height.
    pub region: Option<String>,
}

impl Terrain {
    pub fn height_at(&self, p: Point) -> TerrainSample {
        let base = if self.base_elevation.is_finite() {
            self.base_elevation
        } else {
            0.0
        };

        if let Some(height) = self.raster.as_ref().and_then(|r| r.sample(p.x, p.y)) {
            return TerrainSample {
                height,
                source: TerrainSource::Raster,
                region: None,
            };
        }

        // Highest priority wins; on a tie the later region wins.
        let mut best: Option<(f64, &TerrainRegion)> = None;
        for region in &self.regions {
            if region.polygon.len() < 3 || !point_in_polygon(p, &region.polygon) {
                continue;
            }
            if best.map_or(true, |(priority, _)| region.priority >= priority) {
                best = Some((region.priority, region));
            }
        }

        match best {
            Some((_, region)) => {
                let floor = region.base.filter(|b| b.is_finite()).unwrap_or(base);
                let slope = region.slope.as_ref().map_or(0.0, |s| s.offset_at(p));
                TerrainSample {
                    height: floor + slope,
                    source: TerrainSource::Region,
                    region: region.id.clone(),
                }
            }
            None => TerrainSample {
                height: base,
                source: TerrainSource::Base,
                region: None,
            },
        }
    }
}

/// Ground height under `(x, y)`. Maps without terrain are flat at 0.
pub fn terrain_height_at(x: f64, y: f64, map: Option<&MapState>) -> TerrainSample {
    match map.and_then(|m| m.terrain.as_ref()) {
        Some(terrain) => terrain.height_at(Point::new(x, y)),
        None => TerrainSample {
            height: 0.0,
            source: TerrainSource::Base,
            region: None,
        },
    }
}

/// Absolute eye (or body) height of a token: ground under its center plus
/// its own elevation and vision offset, plus eye height when asked.
pub fn token_elevation(token: &Token, map: Option<&MapState>, include_eye_height: bool) -> f64 {
    let grid = map.map_or(DEFAULT_GRID_SIZE_PX, MapState::grid_size);
    let center = token.center(Some(grid));
    let ground = terrain_height_at(center.x, center.y, map).height;

    let finite = |v: Option<f64>| v.filter(|v| v.is_finite()).unwrap_or(0.0);
    let eye = if include_eye_height {
        finite(token.vision.eye_height)
    } else {
        0.0
    };
    ground + finite(token.elevation) + finite(token.vision.elevation) + eye
}
