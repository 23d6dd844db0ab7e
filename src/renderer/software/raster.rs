//! Convex polygon scan conversion with attribute interpolation.
//!
//! Polygons are split into a fan and each triangle is walked over its
//! bounding box with edge functions. Shared fan edges follow a top-left
//! rule so no pixel is visited twice.

use crate::renderer::ScreenVertex;

/// Interpolated per-pixel attributes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Fragment {
    pub shade: f32,
    pub u: f32,
    pub v: f32,
    pub rhw: f32,
}

impl Fragment {
    fn from_vertex(v: &ScreenVertex) -> Self {
        Self {
            shade: v.shade,
            u: v.u,
            v: v.v,
            rhw: v.rhw,
        }
    }

    #[inline]
    fn blend3(a: &Self, b: &Self, c: &Self, wa: f32, wb: f32, wc: f32) -> Self {
        Self {
            shade: a.shade * wa + b.shade * wb + c.shade * wc,
            u: a.u * wa + b.u * wb + c.u * wc,
            v: a.v * wa + b.v * wb + c.v * wc,
            rhw: a.rhw * wa + b.rhw * wb + c.rhw * wc,
        }
    }
}

#[inline]
fn edge(ax: f32, ay: f32, bx: f32, by: f32, px: f32, py: f32) -> f32 {
    (bx - ax) * (py - ay) - (by - ay) * (px - ax)
}

/// Top or left edge of a positively wound triangle (screen `y` down).
#[inline]
fn is_top_left(ax: f32, ay: f32, bx: f32, by: f32) -> bool {
    (ay == by && bx > ax) || by < ay
}

/// Visit every pixel centre covered by the convex polygon `verts`,
/// clipped to `width × height`.
pub fn fill_polygon<F>(verts: &[ScreenVertex], width: usize, height: usize, mut plot: F)
where
    F: FnMut(usize, usize, Fragment),
{
    if verts.len() < 3 {
        return;
    }
    for i in 1..verts.len() - 1 {
        fill_triangle(&verts[0], &verts[i], &verts[i + 1], width, height, &mut plot);
    }
}

fn fill_triangle<F>(
    a: &ScreenVertex,
    b: &ScreenVertex,
    c: &ScreenVertex,
    width: usize,
    height: usize,
    plot: &mut F,
) where
    F: FnMut(usize, usize, Fragment),
{
    // bring every triangle to positive winding
    let (b, c) = if edge(a.x, a.y, b.x, b.y, c.x, c.y) < 0.0 {
        (c, b)
    } else {
        (b, c)
    };
    let area = edge(a.x, a.y, b.x, b.y, c.x, c.y);
    if area <= f32::EPSILON {
        return;
    }

    let x0 = a.x.min(b.x).min(c.x).floor().max(0.0) as usize;
    let y0 = a.y.min(b.y).min(c.y).floor().max(0.0) as usize;
    let x1 = (a.x.max(b.x).max(c.x).ceil() as isize).min(width as isize);
    let y1 = (a.y.max(b.y).max(c.y).ceil() as isize).min(height as isize);
    if x1 <= 0 || y1 <= 0 {
        return;
    }
    let (x1, y1) = (x1 as usize, y1 as usize);

    let tl_bc = is_top_left(b.x, b.y, c.x, c.y);
    let tl_ca = is_top_left(c.x, c.y, a.x, a.y);
    let tl_ab = is_top_left(a.x, a.y, b.x, b.y);
    let inside = |w: f32, top_left: bool| w > 0.0 || (w == 0.0 && top_left);

    let (fa, fb, fc) = (
        Fragment::from_vertex(a),
        Fragment::from_vertex(b),
        Fragment::from_vertex(c),
    );
    let inv = 1.0 / area;

    for y in y0..y1 {
        let py = y as f32 + 0.5;
        for x in x0..x1 {
            let px = x as f32 + 0.5;
            let wa = edge(b.x, b.y, c.x, c.y, px, py);
            let wb = edge(c.x, c.y, a.x, a.y, px, py);
            let wc = edge(a.x, a.y, b.x, b.y, px, py);
            if inside(wa, tl_bc) && inside(wb, tl_ca) && inside(wc, tl_ab) {
                plot(x, y, Fragment::blend3(&fa, &fb, &fc, wa * inv, wb * inv, wc * inv));
            }
        }
    }
}

/// Bresenham between two pixel positions, clipped to the frame.
pub fn line<F>(mut x0: i32, mut y0: i32, x1: i32, y1: i32, width: usize, height: usize, mut plot: F)
where
    F: FnMut(usize, usize),
{
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        if (0..width as i32).contains(&x0) && (0..height as i32).contains(&y0) {
            plot(x0 as usize, y0 as usize);
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
