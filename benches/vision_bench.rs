//! Criterion benchmarks for the vision engine.
//!
//! Run with: `cargo bench`

use criterion::{criterion_group, criterion_main, Criterion};
use vision_rs::collision::{clamp_token_movement, MoveRequest};
use vision_rs::segments::extract_vision_segments;
use vision_rs::sight::{compute_cover, Obstacles, SightOptions};
use vision_rs::types::{MapState, Point, Token};
use vision_rs::visibility::{compute_vision_batch, compute_vision_for_map, VisionOptions};
use vision_rs::walls::Wall;

// -- Fixtures --

/// Two rooms joined by a closed door, with a one-sided wall and a window.
const TWO_ROOMS_JSON: &str = r#"{
  "id": "two-rooms",
  "width": 1280,
  "height": 640,
  "gridSizePx": 64,
  "lighting": {"global": false},
  "walls": [
    {"id": "n1", "c": [64, 64, 1216, 64]},
    {"id": "s1", "c": [64, 576, 1216, 576]},
    {"id": "w1", "c": [64, 64, 64, 576]},
    {"id": "e1", "c": [1216, 64, 1216, 576]},
    {"id": "mid-a", "c": [640, 64, 640, 288]},
    {"id": "mid-b", "c": [640, 352, 640, 576]},
    {"id": "door", "c": [640, 288, 640, 352], "type": "DOOR", "door": {"state": "CLOSED"}},
    {"id": "window", "c": [320, 576, 448, 576], "type": "WINDOW"},
    {"id": "ledge", "c": [800, 200, 1000, 200], "dir": 1}
  ]
}"#;

/// A grid of pillars: many short segments and lots of silhouette corners.
fn pillar_hall(cols: usize, rows: usize) -> MapState {
    let mut walls = Vec::new();
    for i in 0..cols {
        for j in 0..rows {
            let x = 96.0 + i as f64 * 96.0;
            let y = 96.0 + j as f64 * 96.0;
            let corners = [
                Point::new(x, y),
                Point::new(x + 24.0, y),
                Point::new(x + 24.0, y + 24.0),
                Point::new(x, y + 24.0),
            ];
            for k in 0..4 {
                walls.push(Wall::new(format!("p{i}-{j}-{k}"), corners[k], corners[(k + 1) % 4]));
            }
        }
    }
    MapState {
        id: "pillars".into(),
        width: 96.0 * (cols as f64 + 2.0),
        height: 96.0 * (rows as f64 + 2.0),
        grid_size_px: Some(64.0),
        walls,
        ..MapState::default()
    }
}

fn bench_two_rooms(c: &mut Criterion) {
    let map: MapState = serde_json::from_str(TWO_ROOMS_JSON).unwrap();
    let token = Token::new("hero", 300.0, 300.0, 64.0);
    let options = VisionOptions::default();
    c.bench_function("vision_two_rooms", |b| {
        b.iter(|| compute_vision_for_map(&token, &map, &options));
    });
}

fn bench_pillar_hall(c: &mut Criterion) {
    let mut map = pillar_hall(12, 8);
    map.lighting.global = true;
    let token = Token::new("hero", 40.0, 40.0, 64.0);
    let options = VisionOptions::default();
    c.bench_function("vision_pillar_hall_unlimited", |b| {
        b.iter(|| compute_vision_for_map(&token, &map, &options));
    });
}

fn bench_batch(c: &mut Criterion) {
    let map = pillar_hall(12, 8);
    let tokens: Vec<Token> = (0..16)
        .map(|i| Token::new(format!("t{i}"), 40.0 + i as f64 * 70.0, 40.0, 64.0))
        .collect();
    let options = VisionOptions::default();
    c.bench_function("vision_batch_16_tokens", |b| {
        b.iter(|| compute_vision_batch(&tokens, &map, &options));
    });
}

fn bench_cover(c: &mut Criterion) {
    let map = pillar_hall(12, 8);
    let segments = extract_vision_segments(&map.walls, map.valid_size());
    let attacker = Token::new("a", 40.0, 40.0, 64.0);
    let target = Token::new("b", 900.0, 700.0, 64.0);
    let options = SightOptions {
        map: Some(&map),
        ..SightOptions::default()
    };
    c.bench_function("cover_across_pillars", |b| {
        b.iter(|| compute_cover(&attacker, &target, Obstacles::Segments(&segments), &options));
    });
}

fn bench_movement(c: &mut Criterion) {
    let map = pillar_hall(12, 8);
    let request = MoveRequest::new(Point::new(40.0, 40.0), Point::new(1100.0, 800.0), 24.0, &map.walls);
    c.bench_function("clamp_long_drag", |b| {
        b.iter(|| clamp_token_movement(&request));
    });
}

criterion_group!(
    benches,
    bench_two_rooms,
    bench_pillar_hall,
    bench_batch,
    bench_cover,
    bench_movement
);
criterion_main!(benches);
