//! Fog-of-war rasters.
//!
//! The caller owns a [`FogStore`] keyed by map id. Each [`FogLayer`] is a
//! single-channel alpha raster (1 = fully fogged) that is painted with a
//! soft circular brush, cleared inside visibility polygons and moved in and
//! out as black RGBA PNGs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::geometry::point_in_polygon;
use crate::types::Point;

fn default_brush_opacity() -> f64 {
    0.75
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FogMode {
    #[default]
    Add,
    Erase,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FogBrush {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    #[serde(default = "default_brush_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub mode: FogMode,
}

impl FogBrush {
    /// Brush strength at distance `d` from its center: full inside the
    /// inner radius, fading linearly to zero at the outer one.
    fn falloff(&self, d: f64) -> f64 {
        let inner = (self.radius * 0.4).max(1.0);
        let outer = (inner + 1.0).max(self.radius);
        if d <= inner {
            1.0
        } else if d >= outer {
            0.0
        } else {
            1.0 - (d - inner) / (outer - inner)
        }
    }

    fn outer_radius(&self) -> f64 {
        ((self.radius * 0.4).max(1.0) + 1.0).max(self.radius)
    }
}

fn unit_or(value: f64, fallback: f64) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0) as f32
    } else {
        fallback as f32
    }
}

/// Layer dimension from a caller-supplied size: rounded, at least 1.
fn layer_dim(v: f64) -> u32 {
    if v.is_finite() && v >= 1.0 {
        v.round().min(u32::MAX as f64) as u32
    } else {
        1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FogLayer {
    width: u32,
    height: u32,
    alpha: Vec<f32>,
}

impl FogLayer {
    /// A fully revealed layer.
    pub fn new(width: f64, height: f64) -> Self {
        let (width, height) = (layer_dim(width), layer_dim(height));
        Self {
            width,
            height,
            alpha: vec![0.0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Alpha of pixel `(x, y)`, or `None` off the raster.
    pub fn alpha_at(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.alpha.get(y as usize * self.width as usize + x as usize).copied()
    }

    pub fn fill(&mut self, alpha: f32) {
        self.alpha.fill(alpha.clamp(0.0, 1.0));
    }

    /// Pixel index range covering `[lo, hi]` along an axis of length `len`.
    fn span(lo: f64, hi: f64, len: u32) -> std::ops::Range<u32> {
        let start = lo.floor().max(0.0).min(len as f64) as u32;
        let end = hi.ceil().max(0.0).min(len as f64) as u32;
        start..end
    }

    pub fn paint(&mut self, brush: &FogBrush) {
        if !brush.x.is_finite() || !brush.y.is_finite() || !brush.radius.is_finite() || brush.radius <= 0.0 {
            return;
        }
        let strength = match brush.mode {
            FogMode::Add => unit_or(brush.opacity, default_brush_opacity()),
            FogMode::Erase => 1.0,
        };
        let outer = brush.outer_radius();
        let center = Point::new(brush.x, brush.y);
        let width = self.width as usize;

        for py in Self::span(brush.y - outer, brush.y + outer, self.height) {
            for px in Self::span(brush.x - outer, brush.x + outer, self.width) {
                let d = Point::new(px as f64 + 0.5, py as f64 + 0.5).dist(center);
                let s = strength * brush.falloff(d) as f32;
                if s <= 0.0 {
                    continue;
                }
                let a = &mut self.alpha[py as usize * width + px as usize];
                *a = match brush.mode {
                    FogMode::Add => s + *a * (1.0 - s),
                    FogMode::Erase => *a * (1.0 - s),
                };
            }
        }
    }

    /// Clear every pixel whose center lies inside `polygon`.
    pub fn reveal_polygon(&mut self, polygon: &[Point]) {
        if polygon.len() < 3 || polygon.iter().any(|p| !p.is_finite()) {
            return;
        }
        let (mut min, mut max) = (polygon[0], polygon[0]);
        for p in polygon {
            min = Point::new(min.x.min(p.x), min.y.min(p.y));
            max = Point::new(max.x.max(p.x), max.y.max(p.y));
        }
        let width = self.width as usize;
        for py in Self::span(min.y, max.y, self.height) {
            for px in Self::span(min.x, max.x, self.width) {
                if point_in_polygon(Point::new(px as f64 + 0.5, py as f64 + 0.5), polygon) {
                    self.alpha[py as usize * width + px as usize] = 0.0;
                }
            }
        }
    }

    /// Encode as black RGBA with the fog in the alpha channel.
    pub fn to_png(&self) -> EngineResult<Vec<u8>> {
        let rgba: Vec<u8> = self
            .alpha
            .iter()
            .flat_map(|&a| [0, 0, 0, (a.clamp(0.0, 1.0) * 255.0).round() as u8])
            .collect();

        let mut out = Vec::new();
        let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&rgba)?;
        writer.finish()?;
        Ok(out)
    }

    /// Replace the layer with a decoded PNG, nearest-neighbour scaled to
    /// the layer size. Images without alpha count as fully fogged. The
    /// layer is cleared first, so a failed decode leaves it revealed.
    pub fn load_png(&mut self, bytes: &[u8]) -> EngineResult<()> {
        self.fill(0.0);
        if bytes.is_empty() {
            return Ok(());
        }

        let mut decoder = png::Decoder::new(bytes);
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info()?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf)?;

        // (bytes per pixel, alpha channel offset)
        let (bpp, alpha_offset) = match (info.color_type, info.bit_depth) {
            (png::ColorType::Rgba, png::BitDepth::Eight) => (4, Some(3)),
            (png::ColorType::GrayscaleAlpha, png::BitDepth::Eight) => (2, Some(1)),
            (png::ColorType::Rgb, png::BitDepth::Eight) => (3, None),
            (png::ColorType::Grayscale, png::BitDepth::Eight) => (1, None),
            (color, depth) => return Err(EngineError::UnsupportedPng(color, depth)),
        };
        if info.width == 0 || info.height == 0 {
            return Ok(());
        }

        let (sw, sh) = (info.width as u64, info.height as u64);
        let (dw, dh) = (self.width as u64, self.height as u64);
        for ty in 0..dh {
            let sy = ((ty * sh) / dh).min(sh - 1) as usize;
            let row = sy * info.line_size;
            for tx in 0..dw {
                let sx = ((tx * sw) / dw).min(sw - 1) as usize;
                let alpha = match alpha_offset {
                    Some(off) => buf.get(row + sx * bpp + off).copied().unwrap_or(0),
                    None => 255,
                };
                self.alpha[(ty * dw + tx) as usize] = alpha as f32 / 255.0;
            }
        }
        log::debug!(
            "imported {}x{} fog image into {}x{} layer",
            info.width,
            info.height,
            self.width,
            self.height
        );
        Ok(())
    }
}

/// Fog layers keyed by map id.
#[derive(Debug, Clone, Default)]
pub struct FogStore {
    layers: HashMap<String, FogLayer>,
}

impl FogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the layer for `map_id`, creating a revealed one of the given
    /// size if missing. An existing layer keeps its size.
    pub fn layer(&mut self, map_id: &str, width: f64, height: f64) -> &mut FogLayer {
        self.layers
            .entry(map_id.to_owned())
            .or_insert_with(|| FogLayer::new(width, height))
    }

    pub fn get(&self, map_id: &str) -> Option<&FogLayer> {
        self.layers.get(map_id)
    }

    /// Drop the layer; returns whether one existed.
    pub fn clear(&mut self, map_id: &str) -> bool {
        self.layers.remove(map_id).is_some()
    }

    pub fn cover_all(&mut self, map_id: &str, width: f64, height: f64, opacity: f64) -> &FogLayer {
        let layer = self.layer(map_id, width, height);
        layer.fill(unit_or(opacity, 1.0));
        layer
    }

    pub fn reveal_all(&mut self, map_id: &str, width: f64, height: f64) -> &FogLayer {
        let layer = self.layer(map_id, width, height);
        layer.fill(0.0);
        layer
    }

    pub fn paint(&mut self, map_id: &str, width: f64, height: f64, brush: &FogBrush) -> &FogLayer {
        let layer = self.layer(map_id, width, height);
        layer.paint(brush);
        layer
    }

    /// Clear fog inside a visibility polygon. Returns `false` when the map
    /// has no layer yet.
    pub fn reveal_polygon(&mut self, map_id: &str, polygon: &[Point]) -> bool {
        match self.layers.get_mut(map_id) {
            Some(layer) => {
                layer.reveal_polygon(polygon);
                true
            }
            None => false,
        }
    }

    /// PNG bytes of the layer, or `None` when the map has no layer.
    pub fn export_png(&self, map_id: &str) -> EngineResult<Option<Vec<u8>>> {
        self.layers.get(map_id).map(FogLayer::to_png).transpose()
    }

    pub fn import_png(&mut self, map_id: &str, bytes: &[u8], width: f64, height: f64) -> EngineResult<&FogLayer> {
        let layer = self.layer(map_id, width, height);
        if let Err(err) = layer.load_png(bytes) {
            log::warn!("failed to import fog image for map {map_id}: {err}");
            return Err(err);
        }
        Ok(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brush(x: f64, y: f64, radius: f64, mode: FogMode) -> FogBrush {
        FogBrush {
            x,
            y,
            radius,
            opacity: 0.75,
            mode,
        }
    }

    #[test]
    fn layer_size_is_rounded_and_sticky() {
        let mut store = FogStore::new();
        let layer = store.layer("m", 10.4, 0.0);
        assert_eq!((layer.width(), layer.height()), (10, 1));
        let layer = store.layer("m", 50.0, 50.0);
        assert_eq!(layer.width(), 10);
        assert!(store.clear("m"));
        assert!(!store.clear("m"));
    }

    #[test]
    fn cover_and_reveal_all() {
        let mut store = FogStore::new();
        let layer = store.cover_all("m", 4.0, 4.0, 0.5);
        assert_eq!(layer.alpha_at(3, 3), Some(0.5));
        let layer = store.cover_all("m", 4.0, 4.0, f64::NAN);
        assert_eq!(layer.alpha_at(0, 0), Some(1.0));
        let layer = store.reveal_all("m", 4.0, 4.0);
        assert_eq!(layer.alpha_at(0, 0), Some(0.0));
        assert_eq!(layer.alpha_at(4, 0), None);
    }

    #[test]
    fn add_brush_has_soft_edge() {
        let mut layer = FogLayer::new(100.0, 100.0);
        layer.paint(&brush(50.0, 50.0, 20.0, FogMode::Add));

        // Inside the inner radius (8px) the brush is at full opacity.
        assert_eq!(layer.alpha_at(50, 50), Some(0.75));
        // Halfway through the falloff band.
        let mid = layer.alpha_at(64, 50).unwrap_or(0.0);
        assert!(mid > 0.0 && mid < 0.75);
        // Beyond the outer radius nothing changes.
        assert_eq!(layer.alpha_at(75, 50), Some(0.0));
    }

    #[test]
    fn erase_brush_clears_center() {
        let mut layer = FogLayer::new(40.0, 40.0);
        layer.fill(1.0);
        layer.paint(&brush(20.0, 20.0, 10.0, FogMode::Erase));
        assert_eq!(layer.alpha_at(20, 20), Some(0.0));
        assert_eq!(layer.alpha_at(0, 0), Some(1.0));
    }

    #[test]
    fn bad_brush_is_a_no_op() {
        let mut layer = FogLayer::new(10.0, 10.0);
        let before = layer.clone();
        layer.paint(&brush(f64::NAN, 5.0, 3.0, FogMode::Add));
        layer.paint(&brush(5.0, 5.0, 0.0, FogMode::Add));
        layer.paint(&brush(5.0, 5.0, -1.0, FogMode::Add));
        assert_eq!(layer, before);
    }

    #[test]
    fn brush_deserializes_with_defaults() {
        let b: FogBrush = serde_json::from_str(r#"{"x": 1, "y": 2, "radius": 3}"#).expect("brush");
        assert_eq!(b.opacity, 0.75);
        assert_eq!(b.mode, FogMode::Add);
        let b: FogBrush =
            serde_json::from_str(r#"{"x": 1, "y": 2, "radius": 3, "mode": "erase"}"#).expect("brush");
        assert_eq!(b.mode, FogMode::Erase);
    }

    #[test]
    fn polygon_reveal_clears_inside_only() {
        let mut store = FogStore::new();
        assert!(!store.reveal_polygon("m", &[]));
        store.cover_all("m", 20.0, 20.0, 1.0);
        let square = [
            Point::new(5.0, 5.0),
            Point::new(15.0, 5.0),
            Point::new(15.0, 15.0),
            Point::new(5.0, 15.0),
        ];
        assert!(store.reveal_polygon("m", &square));
        let layer = store.get("m").expect("layer");
        assert_eq!(layer.alpha_at(10, 10), Some(0.0));
        assert_eq!(layer.alpha_at(2, 2), Some(1.0));
        assert_eq!(layer.alpha_at(16, 10), Some(1.0));
    }

    #[test]
    fn png_export_import_rescales() {
        let mut store = FogStore::new();
        assert!(store.export_png("m").expect("export").is_none());

        store.reveal_all("m", 4.0, 4.0);
        let layer = store.layer("m", 4.0, 4.0);
        // Fog the left half only.
        for y in 0..4 {
            for x in 0..2 {
                layer.alpha[y * 4 + x] = 1.0;
            }
        }
        let bytes = store.export_png("m").expect("export").expect("layer");

        let imported = store.import_png("big", &bytes, 8.0, 8.0).expect("import");
        assert_eq!(imported.alpha_at(0, 0), Some(1.0));
        assert_eq!(imported.alpha_at(3, 7), Some(1.0));
        assert_eq!(imported.alpha_at(4, 0), Some(0.0));
        assert_eq!(imported.alpha_at(7, 7), Some(0.0));
    }

    #[test]
    fn empty_import_clears_and_garbage_errors() {
        let mut store = FogStore::new();
        store.cover_all("m", 4.0, 4.0, 1.0);
        let layer = store.import_png("m", &[], 4.0, 4.0).expect("empty import");
        assert_eq!(layer.alpha_at(1, 1), Some(0.0));

        store.cover_all("m", 4.0, 4.0, 1.0);
        assert!(matches!(
            store.import_png("m", b"not a png", 4.0, 4.0),
            Err(EngineError::PngDecode(_))
        ));
        assert_eq!(store.get("m").and_then(|l| l.alpha_at(1, 1)), Some(0.0));
    }
}
