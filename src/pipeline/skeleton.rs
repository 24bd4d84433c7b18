use image::RgbaImage;

use crate::types::joint::*;

/// Bones of the 21-point hand, drawn as connector segments.
pub const CONNECTIONS: &[(usize, usize)] = &[
    (WRIST, THUMB_CMC),
    (THUMB_CMC, THUMB_MCP),
    (THUMB_MCP, THUMB_IP),
    (THUMB_IP, THUMB_TIP),
    (WRIST, INDEX_MCP),
    (INDEX_MCP, INDEX_PIP),
    (INDEX_PIP, INDEX_DIP),
    (INDEX_DIP, INDEX_TIP),
    (INDEX_MCP, MIDDLE_MCP),
    (MIDDLE_MCP, MIDDLE_PIP),
    (MIDDLE_PIP, MIDDLE_DIP),
    (MIDDLE_DIP, MIDDLE_TIP),
    (MIDDLE_MCP, RING_MCP),
    (RING_MCP, RING_PIP),
    (RING_PIP, RING_DIP),
    (RING_DIP, RING_TIP),
    (RING_MCP, PINKY_MCP),
    (PINKY_MCP, PINKY_PIP),
    (PINKY_PIP, PINKY_DIP),
    (PINKY_DIP, PINKY_TIP),
    (WRIST, PINKY_MCP),
];

pub const CONNECTOR_THICKNESS: i32 = 3;
pub const MARKER_RADIUS: i32 = 5;

pub const CONNECTOR_COLOR: [u8; 4] = [0, 200, 120, 217];
pub const MARKER_FILL: [u8; 4] = [0, 150, 255, 230];
pub const MARKER_OUTLINE: [u8; 4] = [255, 255, 255, 255];

/// Draws a segment, clipped to the canvas first so far-off endpoints cost
/// nothing and never overflow the stepping arithmetic.
pub fn draw_line(
    canvas: &mut RgbaImage,
    p0: (f32, f32),
    p1: (f32, f32),
    color: [u8; 4],
    thickness: i32,
) {
    let radius = i64::from((thickness.max(1) - 1) / 2);
    let bounds = (f64::from(canvas.width()), f64::from(canvas.height()));
    let Some((a, b)) = clip_segment(p0, p1, bounds, radius as f64 + 1.0) else {
        return;
    };

    let (mut x0, mut y0) = (a.0.round() as i64, a.1.round() as i64);
    let (x1, y1) = (b.0.round() as i64, b.1.round() as i64);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        for ox in -radius..=radius {
            for oy in -radius..=radius {
                if ox.abs() + oy.abs() <= radius {
                    blend_pixel(canvas, x0 + ox, y0 + oy, color);
                }
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Liang-Barsky clip of `p0 -> p1` against the canvas grown by `margin` on
/// every side. `None` when nothing of the segment is left.
fn clip_segment(
    p0: (f32, f32),
    p1: (f32, f32),
    (width, height): (f64, f64),
    margin: f64,
) -> Option<((f64, f64), (f64, f64))> {
    let (x0, y0) = (f64::from(p0.0), f64::from(p0.1));
    let (x1, y1) = (f64::from(p1.0), f64::from(p1.1));
    if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
        return None;
    }

    let (dx, dy) = (x1 - x0, y1 - y0);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    let edges = [
        (-dx, x0 + margin),
        (dx, width + margin - x0),
        (-dy, y0 + margin),
        (dy, height + margin - y0),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    Some(((x0 + t0 * dx, y0 + t0 * dy), (x0 + t1 * dx, y0 + t1 * dy)))
}

/// Filled disc with a one-pixel ring in `outline`. Markers entirely off the
/// canvas are skipped.
pub fn draw_marker(
    canvas: &mut RgbaImage,
    center: (f32, f32),
    radius: i32,
    fill: [u8; 4],
    outline: [u8; 4],
) {
    let r = radius.max(0) as f32;
    let (w, h) = (canvas.width() as f32, canvas.height() as f32);
    let visible = |v: f32, extent: f32| v.is_finite() && v >= -r && v <= extent + r;
    if !visible(center.0, w) || !visible(center.1, h) {
        return;
    }

    let (cx, cy) = (center.0.round() as i64, center.1.round() as i64);
    let radius = i64::from(radius.max(0));
    let outer = radius * radius;
    let inner = (radius - 1).max(0).pow(2);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d2 = dx * dx + dy * dy;
            if d2 > outer {
                continue;
            }
            let color = if d2 > inner { outline } else { fill };
            blend_pixel(canvas, cx + dx, cy + dy, color);
        }
    }
}

/// Alpha-blends `color` over the pixel at (x, y); out-of-bounds writes are dropped.
pub fn blend_pixel(canvas: &mut RgbaImage, x: i64, y: i64, color: [u8; 4]) {
    let (Ok(ux), Ok(uy)) = (u32::try_from(x), u32::try_from(y)) else {
        return;
    };
    if ux >= canvas.width() || uy >= canvas.height() {
        return;
    }
    let px = canvas.get_pixel_mut(ux, uy);
    let alpha = color[3] as u32;
    for c in 0..3 {
        let src = color[c] as u32;
        let dst = px.0[c] as u32;
        px.0[c] = ((src * alpha + dst * (255 - alpha) + 127) / 255) as u8;
    }
    px.0[3] = 255;
}
