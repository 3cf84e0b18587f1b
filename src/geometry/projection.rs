use std::f64::consts::PI;

use serde::Serialize;

use crate::model::GeoPoint;

/// Equatorial radius used for metre/degree conversions (WGS84).
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;
pub const TILE_SIZE: f64 = 256.0;

// Web Mercator is undefined at the poles; clamp sin(lat) just short of ±1.
const MAX_SIN_LAT: f64 = 0.9999;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    #[inline]
    pub fn polar_offset(self, radius: f64, angle: f64) -> Point {
        Point::new(self.x + radius * angle.cos(), self.y + radius * angle.sin())
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Maps geographic coordinates onto a plane where the tube geometry is built.
pub trait Projection {
    fn project(&self, p: GeoPoint) -> Point;
    fn unproject(&self, p: Point) -> GeoPoint;
    /// Plane length of `meters` measured at `at`.
    fn meters_to_plane(&self, meters: f64, at: GeoPoint) -> f64;
}

/// Raw lng/lat treated as planar x/y. Metres become degrees isotropically,
/// with no latitude correction, so path overlays are independent of zoom.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GeographicProjection;

impl Projection for GeographicProjection {
    fn project(&self, p: GeoPoint) -> Point {
        Point::new(p.lng, p.lat)
    }

    fn unproject(&self, p: Point) -> GeoPoint {
        GeoPoint::new(p.y, p.x)
    }

    fn meters_to_plane(&self, meters: f64, _at: GeoPoint) -> f64 {
        (180.0 / PI) * (meters / EARTH_RADIUS_M)
    }
}

/// Web Mercator pixels at a zoom level, relative to a viewport origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelProjection {
    pub zoom: f64,
    /// World pixel shown at viewport (0, 0).
    pub origin: Point,
}

impl PixelProjection {
    pub fn new(zoom: f64) -> Self {
        Self {
            zoom,
            origin: Point::default(),
        }
    }

    /// Viewport of `width` x `height` pixels centered on `center`.
    pub fn centered(center: GeoPoint, zoom: f64, width: u32, height: u32) -> Self {
        let world = Self::new(zoom).project(center);
        Self {
            zoom,
            origin: Point::new(world.x - width as f64 / 2.0, world.y - height as f64 / 2.0),
        }
    }

    #[inline]
    fn world_size(&self) -> f64 {
        TILE_SIZE * 2f64.powf(self.zoom)
    }

    /// Ground resolution at `lat`.
    pub fn meters_per_pixel(&self, lat: f64) -> f64 {
        2.0 * PI * EARTH_RADIUS_M * lat.to_radians().cos() / self.world_size()
    }
}

impl Projection for PixelProjection {
    fn project(&self, p: GeoPoint) -> Point {
        let scale = self.world_size();
        let x = scale * (p.lng + 180.0) / 360.0;
        let sin_lat = p.lat.to_radians().sin().clamp(-MAX_SIN_LAT, MAX_SIN_LAT);
        let y = scale * (0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * PI));
        Point::new(x - self.origin.x, y - self.origin.y)
    }

    fn unproject(&self, p: Point) -> GeoPoint {
        let scale = self.world_size();
        let x = p.x + self.origin.x;
        let y = p.y + self.origin.y;
        let lng = x / scale * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * y / scale)).sinh().atan().to_degrees();
        GeoPoint::new(lat, lng)
    }

    fn meters_to_plane(&self, meters: f64, at: GeoPoint) -> f64 {
        meters / self.meters_per_pixel(at.lat)
    }
}
