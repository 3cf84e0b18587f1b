use crate::geometry::tube::{HurricaneShadow, hurricane_shadow};
use crate::geometry::{PixelProjection, PlaneCircle, Projection};
use crate::overlay::{Layer, Renderer, Style};

const MARKER_RADIUS: f64 = 6.0;

/// Renders layers into a standalone SVG document in viewport pixels.
pub struct SvgRenderer {
    projection: PixelProjection,
    width: u32,
    height: u32,
    defs: String,
    body: String,
    shadows: usize,
}

impl SvgRenderer {
    pub fn new(projection: PixelProjection, width: u32, height: u32) -> Self {
        Self {
            projection,
            width,
            height,
            defs: String::new(),
            body: String::new(),
            shadows: 0,
        }
    }
}

fn style_attrs(style: &Style) -> String {
    let fill = match &style.fill {
        Some(fill) => format!(r#"fill="{fill}" fill-opacity="{}""#, style.fill_opacity),
        None => r#"fill="none""#.to_string(),
    };
    format!(
        r#"stroke="{}" stroke-opacity="{}" stroke-width="{}" {fill}"#,
        style.stroke, style.opacity, style.weight
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Gradient and clip path referenced by shadow `id`.
fn shadow_defs(id: usize, shadow: &HurricaneShadow) -> String {
    let g = &shadow.gradient;
    let [c1, c2] = shadow.clip.circles;
    let quad: Vec<String> = shadow
        .clip
        .quad
        .iter()
        .map(|p| format!("{:.2},{:.2}", p.x, p.y))
        .collect();
    let gradient = format!(
        r#"<linearGradient id="shadow-gradient-{id}" gradientUnits="userSpaceOnUse" x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}"><stop offset="0" stop-color="{}"/><stop offset="1" stop-color="{}"/></linearGradient>"#,
        g.from.x, g.from.y, g.to.x, g.to.y, g.start_color, g.end_color
    );
    let clip = format!(
        r#"<clipPath id="shadow-clip-{id}"><circle cx="{:.2}" cy="{:.2}" r="{:.2}"/><circle cx="{:.2}" cy="{:.2}" r="{:.2}"/><polygon points="{}"/></clipPath>"#,
        c1.center.x,
        c1.center.y,
        c1.radius,
        c2.center.x,
        c2.center.y,
        c2.radius,
        quad.join(" ")
    );
    gradient + &clip
}

impl Renderer for SvgRenderer {
    type Output = String;

    fn draw(&mut self, layer: &Layer) {
        let proj = &self.projection;
        let element = match layer {
            Layer::Circle { circle, style, .. } => {
                let c = PlaneCircle::project(circle, proj);
                format!(
                    r#"<circle cx="{:.2}" cy="{:.2}" r="{:.2}" {}/>"#,
                    c.center.x,
                    c.center.y,
                    c.radius,
                    style_attrs(style)
                )
            }
            Layer::Polyline { points, style } => {
                let pts: Vec<String> = points
                    .iter()
                    .map(|p| {
                        let q = proj.project(*p);
                        format!("{:.2},{:.2}", q.x, q.y)
                    })
                    .collect();
                format!(
                    r#"<polyline points="{}" stroke-linecap="round" {}/>"#,
                    pts.join(" "),
                    style_attrs(style)
                )
            }
            Layer::Marker {
                position,
                label,
                style,
            } => {
                let p = proj.project(*position);
                format!(
                    r#"<circle cx="{:.2}" cy="{:.2}" r="{MARKER_RADIUS}" {}><title>{}</title></circle>"#,
                    p.x,
                    p.y,
                    style_attrs(style),
                    escape(label)
                )
            }
            Layer::Shadow { hurricane } => {
                let shadow = hurricane_shadow(hurricane, proj);
                let id = self.shadows;
                self.shadows += 1;
                self.defs.push_str(&shadow_defs(id, &shadow));
                self.defs.push('\n');
                format!(
                    r#"<rect x="0" y="0" width="{}" height="{}" fill="url(#shadow-gradient-{id})" fill-opacity="{}" clip-path="url(#shadow-clip-{id})"/>"#,
                    self.width, self.height, shadow.gradient.opacity
                )
            }
        };
        self.body.push_str(&element);
        self.body.push('\n');
    }

    fn finish(self) -> String {
        let mut out = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        );
        out.push('\n');
        if !self.defs.is_empty() {
            out.push_str("<defs>\n");
            out.push_str(&self.defs);
            out.push_str("</defs>\n");
        }
        out.push_str(&self.body);
        out.push_str("</svg>\n");
        out
    }
}
