//! Segment primitives shared by the sweep, sight tests and collision.
//!
//! All functions are pure and work in map-pixel space. Degenerate input
//! (zero-length segments, parallel lines) is resolved with epsilons rather
//! than reported.

use std::f64::consts::TAU;

use crate::types::Point;

/// Parallel-line and parametric tolerance for intersection tests.
pub const EPS: f64 = 1e-6;

/// Hits within this distance of a segment endpoint snap onto it.
pub const ENDPOINT_SNAP_PX: f64 = 0.5;

/// Squared distance from `p` to the segment `a`–`b`.
pub fn point_segment_distance_squared(p: Point, a: Point, b: Point) -> f64 {
    p.dist2(closest_point_on_segment(p, a, b))
}

pub fn closest_point_on_segment(p: Point, a: Point, b: Point) -> Point {
    let d = b - a;
    let len2 = d.dot(d);
    if len2 == 0.0 {
        return a;
    }
    let t = ((p - a).dot(d) / len2).clamp(0.0, 1.0);
    a + d * t
}

/// Orientation of `c` relative to the directed line `a`→`b`.
/// Positive on the left, negative on the right, zero when collinear.
pub fn orient(a: Point, b: Point, c: Point) -> f64 {
    (b - a).cross(c - a)
}

/// True if `c` lies inside the bounding box of `a`–`b`.
fn within_box(a: Point, b: Point, c: Point) -> bool {
    a.x.min(b.x) <= c.x && c.x <= a.x.max(b.x) && a.y.min(b.y) <= c.y && c.y <= a.y.max(b.y)
}

/// Exact segment–segment intersection test, touching included.
pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let o1 = orient(a, b, c);
    let o2 = orient(a, b, d);
    let o3 = orient(c, d, a);
    let o4 = orient(c, d, b);

    if o1 == 0.0 && within_box(a, b, c) {
        return true;
    }
    if o2 == 0.0 && within_box(a, b, d) {
        return true;
    }
    if o3 == 0.0 && within_box(c, d, a) {
        return true;
    }
    if o4 == 0.0 && within_box(c, d, b) {
        return true;
    }

    (o1 > 0.0) != (o2 > 0.0) && (o3 > 0.0) != (o4 > 0.0)
}

/// Minimum squared distance between segments `a`–`b` and `c`–`d`.
/// Zero when they intersect.
pub fn segment_segment_distance_squared(a: Point, b: Point, c: Point, d: Point) -> f64 {
    if segments_intersect(a, b, c, d) {
        return 0.0;
    }
    point_segment_distance_squared(a, c, d)
        .min(point_segment_distance_squared(b, c, d))
        .min(point_segment_distance_squared(c, a, b))
        .min(point_segment_distance_squared(d, a, b))
}

/// A ray of finite reach: unit direction plus maximum distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub dx: f64,
    pub dy: f64,
    pub max_distance: f64,
}

impl Ray {
    pub fn from_angle(angle: f64, max_distance: f64) -> Self {
        Self {
            dx: angle.cos(),
            dy: angle.sin(),
            max_distance,
        }
    }

    /// Ray from `origin` reaching exactly `target`.
    /// `None` when the two points (nearly) coincide.
    pub fn toward(origin: Point, target: Point) -> Option<Self> {
        let d = target - origin;
        let len = d.length();
        if len < EPS || !len.is_finite() {
            return None;
        }
        Some(Self {
            dx: d.x / len,
            dy: d.y / len,
            max_distance: len,
        })
    }

    pub fn end(&self, origin: Point) -> Point {
        Point::new(
            origin.x + self.dx * self.max_distance,
            origin.y + self.dy * self.max_distance,
        )
    }
}

/// Where a ray met a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Point,
    /// Distance along the ray from its origin.
    pub dist: f64,
    /// The hit was moved onto a segment endpoint.
    pub endpoint_snap: bool,
}

/// Intersect the ray starting at `origin` with segment `a`–`b`.
///
/// Hits within [`ENDPOINT_SNAP_PX`] of an endpoint snap onto it so rays
/// through shared wall corners land on the exact vertex. With a positive
/// `padding`, a ray that misses but passes within `padding` of the segment
/// still counts, hitting at the projection of the segment midpoint.
pub fn intersect_ray_segment(
    origin: Point,
    ray: &Ray,
    a: Point,
    b: Point,
    padding: f64,
) -> Option<RayHit> {
    let end = ray.end(origin);
    let (x1, y1, x2, y2) = (origin.x, origin.y, end.x, end.y);
    let (x3, y3, x4, y4) = (a.x, a.y, b.x, b.y);

    let den = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
    if den.abs() >= EPS {
        let t = ((x1 - x3) * (y3 - y4) - (y1 - y3) * (x3 - x4)) / den;
        let u = -((x1 - x2) * (y1 - y3) - (y1 - y2) * (x1 - x3)) / den;

        if (-EPS..=1.0 + EPS).contains(&t) && (-EPS..=1.0 + EPS).contains(&u) {
            let t = t.clamp(0.0, 1.0);
            let mut point = Point::new(x1 + t * (x2 - x1), y1 + t * (y2 - y1));
            let mut endpoint_snap = false;

            let snap_sq = ENDPOINT_SNAP_PX * ENDPOINT_SNAP_PX;
            let da = point.dist2(a);
            let db = point.dist2(b);
            if da <= snap_sq && da <= db {
                point = a;
                endpoint_snap = true;
            } else if db <= snap_sq {
                point = b;
                endpoint_snap = true;
            }

            return Some(RayHit {
                point,
                dist: t * ray.max_distance,
                endpoint_snap,
            });
        }
    }

    if padding > 0.0 {
        let dist_sq = segment_segment_distance_squared(origin, end, a, b);
        if dist_sq <= padding * padding {
            let mid = Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
            let proj = ((mid.x - x1) * ray.dx + (mid.y - y1) * ray.dy).clamp(0.0, ray.max_distance);
            return Some(RayHit {
                point: Point::new(x1 + ray.dx * proj, y1 + ray.dy * proj),
                dist: proj,
                endpoint_snap: false,
            });
        }
    }

    None
}

/// Unit normal of `a`→`b`; the left-hand one when `prefer_left`.
/// Falls back to an arbitrary axis for zero-length input.
pub fn unit_normal(a: Point, b: Point, prefer_left: bool) -> Point {
    let d = b - a;
    let len = match d.length() {
        l if l > 0.0 => l,
        _ => 1.0,
    };
    if prefer_left {
        Point::new(-d.y / len, d.x / len)
    } else {
        Point::new(d.y / len, -d.x / len)
    }
}

/// Wrap an angle into [0, 2π).
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle % TAU;
    if a < 0.0 {
        a + TAU
    } else {
        a
    }
}

/// Polygon area via the shoelace formula.
/// Returns positive area regardless of winding order.
pub fn polygon_area(vertices: &[Point]) -> f64 {
    let n = vertices.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += vertices[i].x * vertices[j].y;
        area -= vertices[j].x * vertices[i].y;
    }
    area.abs() / 2.0
}

/// Ray-casting point-in-polygon test.
pub fn point_in_polygon(p: Point, vertices: &[Point]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (vi, vj) = (vertices[i], vertices[j]);
        if (vi.y > p.y) != (vj.y > p.y) {
            let intersect_x = (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y) + vi.x;
            if p.x < intersect_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Side of `p` relative to the directed line `a`→`b`: -1, 0 or 1.
/// Points within [`EPS`] pixels of the line count as on it.
fn side_of_line(a: Point, b: Point, p: Point) -> i8 {
    let len = (b - a).length();
    if len < EPS {
        return 0;
    }
    let dist = orient(a, b, p) / len;
    if dist > EPS {
        1
    } else if dist < -EPS {
        -1
    } else {
        0
    }
}

/// True if segments `a`–`b` and `c`–`d` cross properly, or lie on one line
/// and overlap by more than [`EPS`]. Touching at a single point does not count.
fn edges_cross(a: Point, b: Point, c: Point, d: Point) -> bool {
    let (s1, s2) = (side_of_line(a, b, c), side_of_line(a, b, d));
    let (s3, s4) = (side_of_line(c, d, a), side_of_line(c, d, b));
    if s1 * s2 < 0 && s3 * s4 < 0 {
        return true;
    }
    if s1 != 0 || s2 != 0 {
        return false;
    }

    let Some(dir) = (b - a).normalized() else {
        return false;
    };
    let len = (b - a).length();
    let (tc, td) = ((c - a).dot(dir), (d - a).dot(dir));
    let overlap = len.min(tc.max(td)) - 0.0f64.max(tc.min(td));
    overlap > EPS
}

/// True if any two non-adjacent edges of the closed polygon cross.
///
/// Uses a [`EPS`]-pixel tolerance, so nearly collinear edges that only
/// line up do not register.
pub fn polygon_self_intersects(vertices: &[Point]) -> bool {
    let n = vertices.len();
    if n < 4 {
        return false;
    }
    for i in 0..n {
        let (a, b) = (vertices[i], vertices[(i + 1) % n]);
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let (c, d) = (vertices[j], vertices[(j + 1) % n]);
            if edges_cross(a, b, c, d) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn polygon_area_unit_square() {
        let verts = vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0), p(0.0, 1.0)];
        assert!((polygon_area(&verts) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn point_inside_polygon() {
        let sq = vec![p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)];
        assert!(point_in_polygon(p(5.0, 5.0), &sq));
        assert!(!point_in_polygon(p(15.0, 5.0), &sq));
    }

    #[test]
    fn ray_hits_segment() {
        let ray = Ray::from_angle(0.0, 100.0);
        let hit = intersect_ray_segment(p(0.0, 0.0), &ray, p(5.0, -5.0), p(5.0, 5.0), 0.0)
            .expect("hit");
        assert!((hit.dist - 5.0).abs() < 1e-9);
        assert!(!hit.endpoint_snap);
    }

    #[test]
    fn ray_misses_segment() {
        let ray = Ray::from_angle(0.0, 100.0);
        assert!(intersect_ray_segment(p(0.0, 0.0), &ray, p(-5.0, -5.0), p(-5.0, 5.0), 0.0).is_none());
    }

    #[test]
    fn ray_stops_short_of_distant_segment() {
        let ray = Ray::from_angle(0.0, 4.0);
        assert!(intersect_ray_segment(p(0.0, 0.0), &ray, p(5.0, -5.0), p(5.0, 5.0), 0.0).is_none());
    }

    #[test]
    fn hit_near_endpoint_snaps() {
        let ray = Ray::from_angle(0.0, 100.0);
        let hit = intersect_ray_segment(p(0.0, 0.0), &ray, p(5.0, -0.3), p(5.0, 5.0), 0.0)
            .expect("hit");
        assert!(hit.endpoint_snap);
        assert_eq!(hit.point, p(5.0, -0.3));
    }

    #[test]
    fn parallel_segment_is_ignored() {
        let ray = Ray::from_angle(0.0, 100.0);
        assert!(intersect_ray_segment(p(0.0, 0.0), &ray, p(1.0, 1.0), p(9.0, 1.0), 0.0).is_none());
    }

    #[test]
    fn padding_catches_near_miss() {
        let ray = Ray::from_angle(0.0, 100.0);
        let a = p(5.0, 1.0);
        let b = p(5.0, 5.0);
        assert!(intersect_ray_segment(p(0.0, 0.0), &ray, a, b, 0.0).is_none());
        let hit = intersect_ray_segment(p(0.0, 0.0), &ray, a, b, 1.5).expect("padded hit");
        assert!((hit.dist - 5.0).abs() < 1e-9);
    }

    #[test]
    fn crossing_segments_have_zero_distance() {
        let d = segment_segment_distance_squared(p(0.0, 0.0), p(10.0, 10.0), p(0.0, 10.0), p(10.0, 0.0));
        assert_eq!(d, 0.0);
        let d = segment_segment_distance_squared(p(0.0, 0.0), p(10.0, 0.0), p(0.0, 3.0), p(10.0, 3.0));
        assert!((d - 9.0).abs() < 1e-9);
    }

    #[test]
    fn touching_segments_intersect() {
        assert!(segments_intersect(p(0.0, 0.0), p(5.0, 0.0), p(5.0, 0.0), p(5.0, 5.0)));
        assert!(!segments_intersect(p(0.0, 0.0), p(4.0, 0.0), p(5.0, 0.0), p(5.0, 5.0)));
    }

    #[test]
    fn closest_point_clamps_to_endpoints() {
        assert_eq!(closest_point_on_segment(p(-3.0, 1.0), p(0.0, 0.0), p(10.0, 0.0)), p(0.0, 0.0));
        assert_eq!(closest_point_on_segment(p(4.0, 7.0), p(0.0, 0.0), p(10.0, 0.0)), p(4.0, 0.0));
    }

    #[test]
    fn angles_wrap_into_positive_range() {
        assert!((normalize_angle(-std::f64::consts::FRAC_PI_2) - 1.5 * std::f64::consts::PI).abs() < 1e-12);
        assert_eq!(normalize_angle(0.0), 0.0);
    }

    #[test]
    fn bowtie_self_intersects() {
        let bowtie = vec![p(0.0, 0.0), p(10.0, 10.0), p(10.0, 0.0), p(0.0, 10.0)];
        assert!(polygon_self_intersects(&bowtie));
        let square = vec![p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)];
        assert!(!polygon_self_intersects(&square));
    }

    #[test]
    fn nearly_collinear_edges_do_not_intersect() {
        // Arc-like run along y = 0 with sub-nanometre wobble, then a far loop back.
        let run = vec![
            p(0.0, 0.0),
            p(100.0, 1e-9),
            p(200.0, -1e-9),
            p(300.0, 0.0),
            p(300.0, 50.0),
            p(0.0, 50.0),
        ];
        assert!(!polygon_self_intersects(&run));

        // Collinear edges that overlap do count.
        let folded = vec![p(0.0, 0.0), p(100.0, 0.0), p(100.0, 10.0), p(50.0, 0.0), p(150.0, 0.0), p(150.0, 20.0)];
        assert!(polygon_self_intersects(&folded));
    }
}
