pub mod projection;
pub mod tube;

pub use projection::{GeographicProjection, PixelProjection, Point, Projection};
pub use tube::{HurricaneShadow, LinearGradient, PlaneCircle, Segment, ShadowClip};
