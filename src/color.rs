//! Severity color scales.
//!
//! Two scales coexist and are not interchangeable:
//! - the HSL hue scale styles the editable disaster circles (0 = green, 100 = red);
//! - the piecewise RGB scale styles simulation results (0 = red, 100 = green).

pub const DEFAULT_LIGHTNESS: f64 = 50.0;
pub const DEFAULT_MAX_HUE: f64 = 0.0;
pub const DEFAULT_MIN_HUE: f64 = 120.0;

/// Hue in degrees for `pct`, linear between `min_hue` (pct 0) and `max_hue` (pct 100).
#[inline]
pub fn percentage_to_hue(pct: f64, max_hue: f64, min_hue: f64) -> f64 {
    let t = pct / 100.0;
    t * (max_hue - min_hue) + min_hue
}

/// CSS `hsl(...)` string. Hue is printed with the shortest exact float form,
/// so integral hues come out without a fraction (`hsl(120, 100%, 50%)`).
pub fn percentage_to_hue_color(pct: f64, lightness: f64, max_hue: f64, min_hue: f64) -> String {
    let hue = percentage_to_hue(pct, max_hue, min_hue);
    format!("hsl({hue}, 100%, {lightness}%)")
}

/// Circle severity color with the default green-to-red scale.
pub fn severity_color(pct: f64) -> String {
    percentage_to_hue_color(pct, DEFAULT_LIGHTNESS, DEFAULT_MAX_HUE, DEFAULT_MIN_HUE)
}

/// RGB triple of [`severity_color`], for raster consumers.
pub fn severity_rgb(pct: f64) -> [u8; 3] {
    let hue = percentage_to_hue(pct, DEFAULT_MAX_HUE, DEFAULT_MIN_HUE);
    hsl_to_rgb(hue, 1.0, DEFAULT_LIGHTNESS / 100.0)
}

/// Piecewise red-yellow-green scale. Input is clamped to [0, 100] so every
/// channel stays within a byte.
pub fn intensity_to_rgb(pct: f64) -> [u8; 3] {
    let pct = if pct.is_nan() { 0.0 } else { pct.clamp(0.0, 100.0) };
    let (r, g) = if pct < 50.0 {
        (255.0, (5.1 * pct).round())
    } else {
        ((510.0 - 5.10 * pct).round(), 255.0)
    };
    [r as u8, g as u8, 0]
}

/// `#rrggbb` string of [`intensity_to_rgb`].
pub fn intensity_to_rgb_color(pct: f64) -> String {
    let [r, g, b] = intensity_to_rgb(pct);
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// HSL to RGB. `h` in degrees (any range), `s` and `l` in [0, 1].
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> [u8; 3] {
    let h = h.rem_euclid(360.0);
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let to_byte = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_byte(r1), to_byte(g1), to_byte(b1)]
}

/// Parse the two color forms this crate emits: `#rrggbb` and `hsl(h, s%, l%)`.
pub fn parse_css_color(s: &str) -> Option<[u8; 3]> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        if hex.len() != 6 {
            return None;
        }
        let v = u32::from_str_radix(hex, 16).ok()?;
        return Some([(v >> 16) as u8, (v >> 8) as u8, v as u8]);
    }
    let inner = s.strip_prefix("hsl(")?.strip_suffix(')')?;
    let mut parts = inner.split(',').map(|p| p.trim().trim_end_matches('%'));
    let h: f64 = parts.next()?.parse().ok()?;
    let sat: f64 = parts.next()?.parse().ok()?;
    let l: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hsl_to_rgb(h, sat / 100.0, l / 100.0))
}
