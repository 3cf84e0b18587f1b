//! Hurricane tube: the band joining the start and end circles of a storm path.
//!
//! The tube boundary is built from the direction `ang` between the two centers:
//! each circle contributes one point at `ang + 90°` and one at `ang - 90°`,
//! and the matching points are joined. The shadow adds a clip region (both
//! circles plus the quadrilateral between the boundary lines) and a linear
//! gradient between the two severity colors.

use std::f64::consts::FRAC_PI_2;

use serde::Serialize;

use crate::color::severity_color;
use crate::model::{CircleParams, GeoPoint, HurricaneParameters};

use super::projection::{GeographicProjection, Point, Projection};

pub const SHADOW_OPACITY: f64 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
}

impl Segment {
    pub fn length(&self) -> f64 {
        self.from.distance(self.to)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PlaneCircle {
    pub center: Point,
    pub radius: f64,
}

impl PlaneCircle {
    pub fn project(circle: &CircleParams, projection: &impl Projection) -> Self {
        Self {
            center: projection.project(circle.center),
            radius: projection.meters_to_plane(circle.radius, circle.center),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        let dx = p.x - self.center.x;
        let dy = p.y - self.center.y;
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

/// Union of two circles and the quadrilateral
/// `offset_1+, offset_2+, offset_2-, offset_1-`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ShadowClip {
    pub circles: [PlaneCircle; 2],
    pub quad: [Point; 4],
}

impl ShadowClip {
    pub fn contains(&self, p: Point) -> bool {
        self.circles.iter().any(|c| c.contains(p)) || convex_contains(&self.quad, p)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinearGradient {
    pub from: Point,
    pub to: Point,
    pub start_color: String,
    pub end_color: String,
    pub opacity: f64,
}

impl LinearGradient {
    /// Position of `p` along the gradient axis, clamped to [0, 1].
    pub fn t_at(&self, p: Point) -> f64 {
        let ax = self.to.x - self.from.x;
        let ay = self.to.y - self.from.y;
        let len2 = ax * ax + ay * ay;
        if len2 == 0.0 {
            return 0.0;
        }
        (((p.x - self.from.x) * ax + (p.y - self.from.y) * ay) / len2).clamp(0.0, 1.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HurricaneShadow {
    pub boundary: [Segment; 2],
    pub clip: ShadowClip,
    pub gradient: LinearGradient,
}

/// Direction from `p1` to `p2`; 0 when the centers coincide or the input is not finite.
#[inline]
pub fn heading(p1: Point, p2: Point) -> f64 {
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    if dx == 0.0 && dy == 0.0 {
        return 0.0;
    }
    let ang = dy.atan2(dx);
    if ang.is_finite() { ang } else { 0.0 }
}

/// Offset points `[offset_1+, offset_2+, offset_2-, offset_1-]`.
///
/// With coincident centers both circles offset by the larger radius, so both
/// boundary segments collapse to points on the enclosing circle.
pub fn offset_points(start: PlaneCircle, end: PlaneCircle) -> [Point; 4] {
    let ang = heading(start.center, end.center);
    let (r1, r2) = if start.center == end.center {
        let r = start.radius.max(end.radius);
        (r, r)
    } else {
        (start.radius, end.radius)
    };
    [
        start.center.polar_offset(r1, ang + FRAC_PI_2),
        end.center.polar_offset(r2, ang + FRAC_PI_2),
        end.center.polar_offset(r2, ang - FRAC_PI_2),
        start.center.polar_offset(r1, ang - FRAC_PI_2),
    ]
}

/// The two tube boundary segments, `+90°` side first.
pub fn tube_boundary(start: PlaneCircle, end: PlaneCircle) -> [Segment; 2] {
    let [s_plus, e_plus, e_minus, s_minus] = offset_points(start, end);
    [
        Segment {
            from: s_plus,
            to: e_plus,
        },
        Segment {
            from: s_minus,
            to: e_minus,
        },
    ]
}

/// Full shadow description in `projection`'s plane. Pure: recompute whenever a
/// circle or the projection changes.
pub fn hurricane_shadow(params: &HurricaneParameters, projection: &impl Projection) -> HurricaneShadow {
    let start = PlaneCircle::project(&params.start, projection);
    let end = PlaneCircle::project(&params.end, projection);
    let quad = offset_points(start, end);
    HurricaneShadow {
        boundary: tube_boundary(start, end),
        clip: ShadowClip {
            circles: [start, end],
            quad,
        },
        gradient: LinearGradient {
            from: start.center,
            to: end.center,
            start_color: severity_color(params.start.intensity),
            end_color: severity_color(params.end.intensity),
            opacity: SHADOW_OPACITY,
        },
    }
}

/// Tube boundary lines in geographic coordinates, for path overlays.
pub fn tube_path(params: &HurricaneParameters) -> [[GeoPoint; 2]; 2] {
    let proj = GeographicProjection;
    let start = PlaneCircle::project(&params.start, &proj);
    let end = PlaneCircle::project(&params.end, &proj);
    tube_boundary(start, end).map(|s| [proj.unproject(s.from), proj.unproject(s.to)])
}

/// Point-in-convex-polygon by consistent cross-product sign. Degenerate
/// (zero-area) polygons contain nothing.
fn convex_contains(poly: &[Point], p: Point) -> bool {
    let mut sign = 0.0f64;
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
        if cross == 0.0 {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    sign != 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn circle(x: f64, y: f64, r: f64) -> PlaneCircle {
        PlaneCircle {
            center: Point::new(x, y),
            radius: r,
        }
    }

    fn close(a: Point, b: Point) -> bool {
        a.distance(b) < EPS
    }

    #[test]
    fn horizontal_tube_is_offset_by_radius() {
        let r = 50.0;
        let [upper, lower] = tube_boundary(circle(0.0, 0.0, r), circle(1000.0, 0.0, r));
        assert!(close(upper.from, Point::new(0.0, r)));
        assert!(close(upper.to, Point::new(1000.0, r)));
        assert!(close(lower.from, Point::new(0.0, -r)));
        assert!(close(lower.to, Point::new(1000.0, -r)));
        assert!((upper.from.y - upper.to.y).abs() < EPS);
        assert!((lower.from.y - lower.to.y).abs() < EPS);
    }

    #[test]
    fn coincident_centers_give_finite_zero_length_segments() {
        for (r1, r2) in [(10.0, 10.0), (10.0, 4.0), (1.0, 30.0)] {
            let boundary = tube_boundary(circle(5.0, 5.0, r1), circle(5.0, 5.0, r2));
            for seg in boundary {
                assert!(seg.from.is_finite() && seg.to.is_finite());
                assert!(seg.length() < EPS);
            }
        }
    }

    #[test]
    fn offsets_are_perpendicular_to_the_path() {
        let start = circle(-3.0, 2.0, 4.0);
        let end = circle(7.0, 9.0, 1.5);
        let dir = (end.center.x - start.center.x, end.center.y - start.center.y);
        let [s_plus, e_plus, e_minus, s_minus] = offset_points(start, end);
        for (p, c) in [(s_plus, start), (s_minus, start), (e_plus, end), (e_minus, end)] {
            let v = (p.x - c.center.x, p.y - c.center.y);
            assert!((v.0 * dir.0 + v.1 * dir.1).abs() < EPS);
            assert!((v.0.hypot(v.1) - c.radius).abs() < EPS);
        }
    }

    #[test]
    fn shadow_clip_covers_circles_and_band() {
        let shadow = ShadowClip {
            circles: [circle(0.0, 0.0, 10.0), circle(100.0, 0.0, 5.0)],
            quad: offset_points(circle(0.0, 0.0, 10.0), circle(100.0, 0.0, 5.0)),
        };
        assert!(shadow.contains(Point::new(-9.0, 0.0)));
        assert!(shadow.contains(Point::new(50.0, 6.0)));
        assert!(shadow.contains(Point::new(104.0, 0.0)));
        assert!(!shadow.contains(Point::new(50.0, 9.0)));
        assert!(!shadow.contains(Point::new(200.0, 0.0)));
    }

    #[test]
    fn shadow_gradient_uses_severity_colors() {
        let params = HurricaneParameters {
            start: CircleParams::new(GeoPoint::new(30.0, -96.0), 10_000.0, 100.0),
            end: CircleParams::new(GeoPoint::new(30.4, -95.6), 5_000.0, 0.0),
        };
        let shadow = hurricane_shadow(&params, &GeographicProjection);
        assert_eq!(shadow.gradient.start_color, "hsl(0, 100%, 50%)");
        assert_eq!(shadow.gradient.end_color, "hsl(120, 100%, 50%)");
        assert_eq!(shadow.gradient.opacity, SHADOW_OPACITY);
        assert_eq!(shadow.gradient.from, Point::new(-96.0, 30.0));
        assert_eq!(shadow.gradient.t_at(shadow.gradient.to), 1.0);
        assert_eq!(shadow.clip.circles[0].center, shadow.gradient.from);
    }

    #[test]
    fn geographic_path_offsets_in_degrees() {
        let params = HurricaneParameters {
            start: CircleParams::new(GeoPoint::new(0.0, 0.0), 10_000.0, 90.0),
            end: CircleParams::new(GeoPoint::new(0.0, 1.0), 10_000.0, 50.0),
        };
        let [upper, lower] = tube_path(&params);
        let deg = GeographicProjection.meters_to_plane(10_000.0, GeoPoint::default());
        assert!((upper[0].lat - deg).abs() < EPS);
        assert!((upper[1].lat - deg).abs() < EPS);
        assert!((lower[0].lat + deg).abs() < EPS);
        assert!((upper[1].lng - 1.0).abs() < EPS);
    }
}
