use std::path::Path;

use base64::Engine;
use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use rayon::prelude::*;

use crate::color::{parse_css_color, severity_rgb};
use crate::error::Result;
use crate::geometry::tube::{HurricaneShadow, hurricane_shadow};
use crate::geometry::{PixelProjection, PlaneCircle, Point, Projection};
use crate::overlay::{Layer, Renderer, Style};

// Light basemap stand-in; real tiles are drawn by the map client.
const BACKGROUND: [u8; 4] = [236, 236, 230, 255];
const FALLBACK: [u8; 3] = [85, 85, 85];
const MARKER_RADIUS: f64 = 6.0;

#[inline]
fn lerp_color(a: [u8; 4], b: [u8; 3], t: f64) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    [
        (a[0] as f64 + (b[0] as f64 - a[0] as f64) * t).round() as u8,
        (a[1] as f64 + (b[1] as f64 - a[1] as f64) * t).round() as u8,
        (a[2] as f64 + (b[2] as f64 - a[2] as f64) * t).round() as u8,
        255,
    ]
}

#[inline]
fn lerp_rgb(a: [u8; 3], b: [u8; 3], t: f64) -> [u8; 3] {
    let [r, g, bl, _] = lerp_color([a[0], a[1], a[2], 255], b, t);
    [r, g, bl]
}

fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
    };
    p.distance(Point::new(a.x + t * dx, a.y + t * dy))
}

/// Pixel-space shapes, painted back to front.
enum Primitive {
    Disc {
        circle: PlaneCircle,
        color: [u8; 3],
        alpha: f64,
    },
    Ring {
        circle: PlaneCircle,
        half_width: f64,
        color: [u8; 3],
        alpha: f64,
    },
    Stroke {
        a: Point,
        b: Point,
        half_width: f64,
        color: [u8; 3],
        alpha: f64,
    },
    Shadow {
        shadow: HurricaneShadow,
        start: [u8; 3],
        end: [u8; 3],
    },
}

impl Primitive {
    #[inline]
    fn paint(&self, p: Point, base: [u8; 4]) -> [u8; 4] {
        match self {
            Self::Disc { circle, color, alpha } if circle.contains(p) => lerp_color(base, *color, *alpha),
            Self::Ring {
                circle,
                half_width,
                color,
                alpha,
            } if (p.distance(circle.center) - circle.radius).abs() <= *half_width => {
                lerp_color(base, *color, *alpha)
            }
            Self::Stroke {
                a,
                b,
                half_width,
                color,
                alpha,
            } if segment_distance(p, *a, *b) <= *half_width => lerp_color(base, *color, *alpha),
            Self::Shadow { shadow, start, end } if shadow.clip.contains(p) => {
                let t = shadow.gradient.t_at(p);
                lerp_color(base, lerp_rgb(*start, *end, t), shadow.gradient.opacity)
            }
            _ => base,
        }
    }
}

/// Rasterizes layers into an RGBA buffer of the viewport.
pub struct RasterRenderer {
    projection: PixelProjection,
    width: usize,
    height: usize,
    primitives: Vec<Primitive>,
}

impl RasterRenderer {
    pub fn new(projection: PixelProjection, width: usize, height: usize) -> Self {
        Self {
            projection,
            width,
            height,
            primitives: Vec::new(),
        }
    }

    fn push_styled(&mut self, circle: PlaneCircle, style: &Style) {
        if let Some(fill) = &style.fill {
            self.primitives.push(Primitive::Disc {
                circle,
                color: parse_css_color(fill).unwrap_or(FALLBACK),
                alpha: style.fill_opacity,
            });
        }
        self.primitives.push(Primitive::Ring {
            circle,
            half_width: style.weight / 2.0,
            color: parse_css_color(&style.stroke).unwrap_or(FALLBACK),
            alpha: style.opacity,
        });
    }
}

impl Renderer for RasterRenderer {
    type Output = Vec<u8>;

    fn draw(&mut self, layer: &Layer) {
        match layer {
            Layer::Circle { circle, style, .. } => {
                let c = PlaneCircle::project(circle, &self.projection);
                self.push_styled(c, style);
            }
            Layer::Marker { position, style, .. } => {
                let c = PlaneCircle {
                    center: self.projection.project(*position),
                    radius: MARKER_RADIUS,
                };
                self.push_styled(c, style);
            }
            Layer::Polyline { points, style } => {
                let color = parse_css_color(&style.stroke).unwrap_or(FALLBACK);
                for pair in points.windows(2) {
                    self.primitives.push(Primitive::Stroke {
                        a: self.projection.project(pair[0]),
                        b: self.projection.project(pair[1]),
                        half_width: style.weight / 2.0,
                        color,
                        alpha: style.opacity,
                    });
                }
            }
            Layer::Shadow { hurricane } => {
                self.primitives.push(Primitive::Shadow {
                    shadow: hurricane_shadow(hurricane, &self.projection),
                    start: severity_rgb(hurricane.start.intensity),
                    end: severity_rgb(hurricane.end.intensity),
                });
            }
        }
    }

    fn finish(self) -> Vec<u8> {
        let w = self.width;
        let mut rgba = vec![0u8; w * self.height * 4];
        if w == 0 {
            return rgba;
        }

        rgba.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
            for x in 0..w {
                let p = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                let color = self
                    .primitives
                    .iter()
                    .fold(BACKGROUND, |base, prim| prim.paint(p, base));
                row[x * 4..x * 4 + 4].copy_from_slice(&color);
            }
        });

        rgba
    }
}

pub fn encode_png(rgba: &[u8], w: usize, h: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(rgba, w as u32, h as u32, image::ExtendedColorType::Rgba8)?;
    Ok(buf)
}

pub fn png_data_url(rgba: &[u8], w: usize, h: usize) -> Result<String> {
    let png = encode_png(rgba, w, h)?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(&png);
    Ok(format!("data:image/png;base64,{}", b64))
}

pub fn save_png(path: &Path, rgba: &[u8], w: usize, h: usize) -> Result<()> {
    image::save_buffer(path, rgba, w as u32, h as u32, image::ColorType::Rgba8)?;
    Ok(())
}
