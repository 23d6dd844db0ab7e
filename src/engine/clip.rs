//! Polygon clipping: near plane in view space, window edges on screen.

use super::vertex::{ClipFlags, PhdVbuf, Projection};
use crate::world::ScreenRect;

/// Smallest depth accepted as a projection divisor.
pub const DIVISOR_EPSILON: f32 = 1.0 / 64.0;

/// Polygon corner carrying every interpolated attribute.
///
/// For perspective-correct polygons `u`/`v` hold `u·rhw`/`v·rhw` once the
/// polygon has been projected.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClipVertex {
    pub xv: f32,
    pub yv: f32,
    pub zv: f32,
    pub xs: f32,
    pub ys: f32,
    pub rhw: f32,
    pub shade: f32,
    pub u: f32,
    pub v: f32,
}

impl ClipVertex {
    pub fn from_vbuf(p: &PhdVbuf, u: f32, v: f32) -> Self {
        Self {
            xv: p.xv,
            yv: p.yv,
            zv: p.zv,
            xs: p.xs,
            ys: p.ys,
            rhw: p.rhw,
            shade: p.shade as f32,
            u,
            v,
        }
    }

    #[inline]
    fn lerp(&self, o: &ClipVertex, t: f32) -> ClipVertex {
        let l = |a: f32, b: f32| a + (b - a) * t;
        ClipVertex {
            xv: l(self.xv, o.xv),
            yv: l(self.yv, o.yv),
            zv: l(self.zv, o.zv),
            xs: l(self.xs, o.xs),
            ys: l(self.ys, o.ys),
            rhw: l(self.rhw, o.rhw),
            shade: l(self.shade, o.shade),
            u: l(self.u, o.u),
            v: l(self.v, o.v),
        }
    }
}

/// Double buffer for the clip passes, reused across polygons.
#[derive(Default)]
pub struct ClipScratch {
    pub poly: Vec<ClipVertex>,
    pub tmp: Vec<ClipVertex>,
}

/// Back-face test on the first three corners.
///
/// Front faces wind clockwise on screen (`y` down). When a corner lies
/// behind the near plane its projection is meaningless, so the view-space
/// triple product decides instead; both agree for visible geometry.
pub fn check_visible(a: &PhdVbuf, b: &PhdVbuf, c: &PhdVbuf) -> bool {
    if (a.clip | b.clip | c.clip).contains(ClipFlags::NEAR) {
        let (a, b, c) = (a.view(), b.view(), c.view());
        a.dot(b.cross(c)) > 0.0
    } else {
        (b.xs - a.xs) * (c.ys - a.ys) - (b.ys - a.ys) * (c.xs - a.xs) > 0.0
    }
}

/// Sutherland-Hodgman against `z = near`, keeping `z >= near`.
/// New corners sit exactly on the plane.
pub fn clip_near(input: &[ClipVertex], near: f32, out: &mut Vec<ClipVertex>) {
    out.clear();
    let n = input.len();
    for i in 0..n {
        let cur = &input[i];
        let next = &input[(i + 1) % n];
        let cur_in = cur.zv >= near;
        if cur_in {
            out.push(*cur);
        }
        if cur_in != (next.zv >= near) {
            let t = (near - cur.zv) / (next.zv - cur.zv);
            let mut p = cur.lerp(next, t);
            p.zv = near;
            out.push(p);
        }
    }
}

/// Project near-clipped corners. `false` when a divisor is too small to
/// trust; the polygon must then be dropped.
pub fn reproject(verts: &mut [ClipVertex], proj: &Projection) -> bool {
    for v in verts.iter_mut() {
        if v.zv <= DIVISOR_EPSILON {
            return false;
        }
        let persp = proj.focal / v.zv;
        v.xs = proj.cx + v.xv * persp;
        v.ys = proj.cy + v.yv * persp;
        v.rhw = 1.0 / v.zv;
    }
    true
}

/// AND and OR of the screen outcodes of `verts`.
pub fn screen_outcodes(verts: &[ClipVertex], window: &ScreenRect) -> (ClipFlags, ClipFlags) {
    verts.iter().fold(
        (ClipFlags::SCREEN, ClipFlags::empty()),
        |(and, or), v| {
            let c = Projection::outcode(v.xs, v.ys, window);
            (and & c, or | c)
        },
    )
}

#[derive(Clone, Copy)]
enum Edge {
    Left(f32),
    Right(f32),
    Top(f32),
    Bottom(f32),
}

impl Edge {
    #[inline]
    fn inside(self, v: &ClipVertex) -> bool {
        match self {
            Edge::Left(e) => v.xs >= e,
            Edge::Right(e) => v.xs <= e,
            Edge::Top(e) => v.ys >= e,
            Edge::Bottom(e) => v.ys <= e,
        }
    }

    #[inline]
    fn intersect(self, a: &ClipVertex, b: &ClipVertex) -> ClipVertex {
        match self {
            Edge::Left(e) | Edge::Right(e) => {
                let mut p = a.lerp(b, (e - a.xs) / (b.xs - a.xs));
                p.xs = e;
                p
            }
            Edge::Top(e) | Edge::Bottom(e) => {
                let mut p = a.lerp(b, (e - a.ys) / (b.ys - a.ys));
                p.ys = e;
                p
            }
        }
    }
}

fn clip_edge(input: &[ClipVertex], edge: Edge, out: &mut Vec<ClipVertex>) {
    out.clear();
    let n = input.len();
    for i in 0..n {
        let cur = &input[i];
        let next = &input[(i + 1) % n];
        let cur_in = edge.inside(cur);
        if cur_in {
            out.push(*cur);
        }
        if cur_in != edge.inside(next) {
            out.push(edge.intersect(cur, next));
        }
    }
}

/// Clip `poly` in place against the four window edges, linearly
/// interpolating every attribute in screen space.
pub fn clip_screen(poly: &mut Vec<ClipVertex>, tmp: &mut Vec<ClipVertex>, window: &ScreenRect) {
    let edges = [
        Edge::Left(window.left as f32),
        Edge::Right(window.right as f32),
        Edge::Top(window.top as f32),
        Edge::Bottom(window.bottom as f32),
    ];
    for edge in edges {
        if poly.len() < 3 {
            poly.clear();
            return;
        }
        clip_edge(poly, edge, tmp);
        std::mem::swap(poly, tmp);
    }
    if poly.len() < 3 {
        poly.clear();
    }
}
