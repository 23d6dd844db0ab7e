//! Polygon inserter: cull, clip, encode and submit.
//!
//! Every face goes through the same steps:
//!
//! 1. **reject** when all corners share an outcode;
//! 2. back-face test unless the face is double-sided;
//! 3. **near clip** in view space when a corner is behind the near plane,
//!    then re-projection;
//! 4. **screen clip** against the current window when any corner is
//!    outside it (skipped entirely for trivially accepted faces);
//! 5. **encode** as affine or perspective-correct, flat or Gouraud, and
//!    hand it to the sort buffer.

use glam::{I16Vec3, IVec3, Vec2, Vec3};

use super::{
    clip::{self, ClipVertex},
    context::{RenderContext, RenderError},
    light::{SHADE_MAX, SHADE_MID},
    vertex::{ClipFlags, PhdVbuf, Projection},
};
use crate::{
    config::Shading,
    renderer::{Blend, PrimKind, Primitive, ScreenVertex},
    world::{BoundingBox, DrawType, Face, ObjectTexture, ScreenRect, SpriteTexture, TextureId},
};

/// Which depth a primitive is keyed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortType {
    /// Average corner depth.
    #[default]
    Mid,
    /// Deepest corner.
    Far,
    /// Behind everything in every bucket (skybox).
    Back,
}

#[derive(Clone, Copy, Debug)]
enum Surface {
    Textured(ObjectTexture),
    Colored(u8),
    Shadow,
}

impl Surface {
    fn corner_uv(&self, i: usize) -> Vec2 {
        match self {
            Surface::Textured(t) => t.uv[i.min(3)],
            _ => Vec2::ZERO,
        }
    }

    fn translucent(&self) -> bool {
        match self {
            Surface::Textured(t) => t.draw == DrawType::Translucent,
            Surface::Colored(_) => false,
            Surface::Shadow => true,
        }
    }
}

fn blend_of(draw: DrawType) -> Blend {
    match draw {
        DrawType::Opaque => Blend::Opaque,
        DrawType::ColorKey => Blend::ColorKey,
        DrawType::Translucent => Blend::Translucent,
    }
}

/// Shade written into shadow corners; only its blend matters.
const SHADOW_SHADE: f32 = SHADE_MID as f32;

impl RenderContext {
    /*──────────────────────── mesh faces ───────────────────────────*/

    /// Textured quad.
    pub fn insert_gt4(&mut self, idx: [u16; 4], tex: &ObjectTexture, double_sided: bool) {
        self.insert_face(idx, Surface::Textured(*tex), double_sided);
    }

    /// Textured triangle.
    pub fn insert_gt3(&mut self, idx: [u16; 3], tex: &ObjectTexture, double_sided: bool) {
        self.insert_face(idx, Surface::Textured(*tex), double_sided);
    }

    /// Gouraud coloured quad.
    pub fn insert_g4(&mut self, idx: [u16; 4], color: u8) {
        self.insert_face(idx, Surface::Colored(color), false);
    }

    /// Gouraud coloured triangle.
    pub fn insert_g3(&mut self, idx: [u16; 3], color: u8) {
        self.insert_face(idx, Surface::Colored(color), false);
    }

    /// Insert a textured face list; faces with an unknown texture are skipped.
    pub(crate) fn insert_textured_faces<const N: usize>(
        &mut self,
        faces: &[Face<N>],
        textures: &[ObjectTexture],
    ) {
        for f in faces {
            match textures.get(f.texture() as usize) {
                Some(tex) => self.insert_face(f.vertices, Surface::Textured(*tex), f.double_sided()),
                None => self.stats.culled += 1,
            }
        }
    }

    pub(crate) fn insert_colored_faces<const N: usize>(&mut self, faces: &[Face<N>]) {
        for f in faces {
            self.insert_face(f.vertices, Surface::Colored(f.texture() as u8), f.double_sided());
        }
    }

    fn insert_face<const N: usize>(&mut self, idx: [u16; N], surface: Surface, double_sided: bool) {
        let mut corners = [PhdVbuf::default(); N];
        for (c, &i) in corners.iter_mut().zip(&idx) {
            match self.vbuf.get(i as usize) {
                Some(v) => *c = *v,
                None => return,
            }
        }

        let (and, or) = corners.iter().fold(
            (ClipFlags::OUTCODES, ClipFlags::empty()),
            |(and, or), v| (and & v.clip, or | v.clip),
        );
        if !(and & ClipFlags::OUTCODES).is_empty() {
            self.stats.culled += 1;
            return;
        }
        if !double_sided
            && N >= 3
            && !clip::check_visible(&corners[0], &corners[1], &corners[2])
        {
            self.stats.culled += 1;
            return;
        }

        let mid = corners.iter().map(|v| v.z).sum::<f32>() / N as f32;
        let far = corners.iter().map(|v| v.z).fold(0.0, f32::max);
        let perspective = matches!(surface, Surface::Textured(_))
            && self.sort_type != SortType::Back
            && mid >= self.config.perspective_distance;

        let mut poly = std::mem::take(&mut self.clip.poly);
        let mut tmp = std::mem::take(&mut self.clip.tmp);
        poly.clear();
        poly.extend(
            corners
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let uv = surface.corner_uv(i);
                    ClipVertex::from_vbuf(v, uv.x, uv.y)
                }),
        );

        let visible = self.clip_poly(&mut poly, &mut tmp, or, perspective);
        if visible {
            self.encode(&poly, surface, perspective, mid, far);
        } else {
            self.stats.culled += 1;
        }

        self.clip.poly = poly;
        self.clip.tmp = tmp;
    }

    /// Near and screen clipping. `false` when nothing is left.
    fn clip_poly(
        &self,
        poly: &mut Vec<ClipVertex>,
        tmp: &mut Vec<ClipVertex>,
        or: ClipFlags,
        perspective: bool,
    ) -> bool {
        let mut screen = or & ClipFlags::SCREEN;
        if or.contains(ClipFlags::NEAR) {
            clip::clip_near(poly, self.proj.near, tmp);
            std::mem::swap(poly, tmp);
            if poly.len() < 3 || !clip::reproject(poly, &self.proj) {
                return false;
            }
            let (and, any) = clip::screen_outcodes(poly, &self.window);
            if !and.is_empty() {
                return false;
            }
            screen = any;
        }
        if perspective {
            for v in poly.iter_mut() {
                v.u *= v.rhw;
                v.v *= v.rhw;
            }
        }
        if !screen.is_empty() {
            clip::clip_screen(poly, tmp, &self.window);
        }
        poly.len() >= 3
    }

    fn encode(&mut self, poly: &[ClipVertex], surface: Surface, perspective: bool, mid: f32, far: f32) {
        let back = self.sort_type == SortType::Back;
        let flat = self.config.shading == Shading::Flat;
        let flat_shade = poly.iter().map(|v| v.shade).sum::<f32>() / poly.len() as f32;

        let verts: smallvec::SmallVec<[ScreenVertex; 12]> = poly
            .iter()
            .map(|v| ScreenVertex {
                x: v.xs,
                y: v.ys,
                z: if back { self.proj.far } else { v.zv.min(self.proj.far) },
                rhw: if back { 0.0 } else { v.rhw },
                shade: match surface {
                    Surface::Shadow => SHADOW_SHADE,
                    _ if flat => flat_shade,
                    _ => v.shade,
                },
                u: v.u,
                v: v.v,
            })
            .collect();

        let prim = match surface {
            Surface::Textured(t) => {
                let kind = if perspective {
                    PrimKind::TexturedPersp
                } else {
                    PrimKind::Textured
                };
                Primitive::new(kind, blend_of(t.draw), t.tpage, 0)
            }
            Surface::Colored(color) => {
                let kind = if flat { PrimKind::Flat } else { PrimKind::Gouraud };
                Primitive::new(kind, Blend::Opaque, 0, color)
            }
            Surface::Shadow => Primitive::new(PrimKind::Shadow, Blend::Translucent, 0, 0),
        };
        let key = self.key_for(mid, far);
        self.submit(surface.translucent(), key, prim, &verts);
    }

    /*──────────────────────── sprites ──────────────────────────────*/

    /// Screen-aligned sprite anchored at view-space `view`.
    ///
    /// In Z-buffered mode opaque sprites go to the immediate queue like any
    /// other opaque primitive; translucent ones are still depth sorted so
    /// they blend over what lies behind them.
    pub fn insert_sprite(&mut self, view: Vec3, sprite: &SpriteTexture, shade: i16, translucent: bool) {
        let z = view.z;
        if z < self.proj.near || z >= self.proj.far {
            return;
        }
        let persp = self.proj.focal / z;
        let [l, t, r, b] = sprite.extents.map(|e| e as f32);
        let mut x0 = self.proj.cx + (view.x + l) * persp;
        let mut y0 = self.proj.cy + (view.y + t) * persp;
        let mut x1 = self.proj.cx + (view.x + r) * persp;
        let mut y1 = self.proj.cy + (view.y + b) * persp;
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        let w = &self.window;
        if x1 < w.left as f32 || x0 > w.right as f32 || y1 < w.top as f32 || y0 > w.bottom as f32 {
            self.stats.culled += 1;
            return;
        }

        // texel coordinates follow the clipped edges
        let (mut uv0, mut uv1) = (sprite.uv0, sprite.uv1);
        let du = (uv1.x - uv0.x) / (x1 - x0);
        let dv = (uv1.y - uv0.y) / (y1 - y0);
        if x0 < w.left as f32 {
            uv0.x += (w.left as f32 - x0) * du;
            x0 = w.left as f32;
        }
        if x1 > w.right as f32 {
            uv1.x -= (x1 - w.right as f32) * du;
            x1 = w.right as f32;
        }
        if y0 < w.top as f32 {
            uv0.y += (w.top as f32 - y0) * dv;
            y0 = w.top as f32;
        }
        if y1 > w.bottom as f32 {
            uv1.y -= (y1 - w.bottom as f32) * dv;
            y1 = w.bottom as f32;
        }

        let shade = (shade as i32 + self.light.fog(z)).clamp(0, SHADE_MAX) as f32;
        let corner = |x: f32, y: f32, uv: Vec2| ScreenVertex {
            x,
            y,
            z,
            rhw: 1.0 / z,
            shade,
            u: uv.x,
            v: uv.y,
        };
        let verts = [corner(x0, y0, uv0), corner(x1, y1, uv1)];
        let blend = if translucent {
            Blend::Translucent
        } else {
            Blend::ColorKey
        };
        let prim = Primitive::new(PrimKind::Sprite, blend, sprite.tpage as TextureId, 0);
        let key = self.key_for(z, z);
        self.submit(translucent, key, prim, &verts);
    }

    /// Sprite at a world position, through the camera matrix.
    pub fn draw_sprite(
        &mut self,
        pos: IVec3,
        sprite: &SpriteTexture,
        shade: i16,
        translucent: bool,
    ) {
        let view = self
            .stack
            .base()
            .transform_f32(pos - self.stack.eye());
        self.insert_sprite(view, sprite, shade, translucent);
    }

    /*──────────────────────── lines and quads ──────────────────────*/

    /// Screen-space line at depth `z`, clipped to the window.
    pub fn insert_line(&mut self, a: Vec2, b: Vec2, z: f32, color: u8, shade: i16) {
        let Some((a, b)) = clip_line(a, b, &self.window) else {
            self.stats.culled += 1;
            return;
        };
        let point = |p: Vec2| ScreenVertex {
            x: p.x,
            y: p.y,
            z,
            rhw: if z > 0.0 { 1.0 / z } else { 0.0 },
            shade: shade as f32,
            u: 0.0,
            v: 0.0,
        };
        let prim = Primitive::new(PrimKind::Line, Blend::Opaque, 0, color);
        let key = self.key_for(z, z);
        self.submit(false, key, prim, &[point(a), point(b)]);
    }

    /// Darkening rectangle, e.g. behind overlay text.
    pub fn insert_trans_quad(&mut self, x: i32, y: i32, w: i32, h: i32, z: f32) {
        let rect = ScreenRect::new(x, y, x + w, y + h).intersect(&self.window);
        if rect.is_empty() {
            return;
        }
        let corner = |x: i32, y: i32| ScreenVertex {
            x: x as f32,
            y: y as f32,
            z,
            rhw: if z > 0.0 { 1.0 / z } else { 0.0 },
            ..ScreenVertex::default()
        };
        let prim = Primitive::new(PrimKind::TransQuad, Blend::Translucent, 0, 0);
        let key = self.key_for(z, z);
        self.submit(
            true,
            key,
            prim,
            &[corner(rect.left, rect.top), corner(rect.right, rect.bottom)],
        );
    }

    /// Blob shadow: a flat octagon on the floor plane of the current item
    /// frame, sized by `size / 1024` of the bounds footprint.
    pub fn insert_shadow(&mut self, size: i32, bounds: &BoundingBox) -> Result<(), RenderError> {
        let pts = shadow_ring(size, bounds);
        if !self.calc_object_vertices(&pts)? {
            return Ok(());
        }
        self.insert_face([0, 1, 2, 3, 4, 5, 6, 7], Surface::Shadow, true);
        Ok(())
    }
}

/// Octagon corners around the bounds centre, saturated to the mesh range.
fn shadow_ring(size: i32, bounds: &BoundingBox) -> [I16Vec3; 8] {
    let (x0, x1) = (bounds.min.x as i32, bounds.max.x as i32);
    let (z0, z1) = (bounds.min.z as i32, bounds.max.z as i32);
    let (mx, mz) = ((x0 + x1) / 2, (z0 + z1) / 2);
    let xa = (x1 - x0).saturating_mul(size) / 1024;
    let za = (z1 - z0).saturating_mul(size) / 1024;

    let ring = [
        (mx - xa, mz + 2 * za),
        (mx + xa, mz + 2 * za),
        (mx + 2 * xa, mz + za),
        (mx + 2 * xa, mz - za),
        (mx + xa, mz - 2 * za),
        (mx - xa, mz - 2 * za),
        (mx - 2 * xa, mz - za),
        (mx - 2 * xa, mz + za),
    ];
    let sat = |v: i32| v.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    ring.map(|(x, z)| I16Vec3::new(sat(x), 0, sat(z)))
}

/*──────────────────────── Cohen-Sutherland ─────────────────────────*/

/// Clip segment `a`-`b` to `window`; `None` when it lies outside.
pub fn clip_line(mut a: Vec2, mut b: Vec2, window: &ScreenRect) -> Option<(Vec2, Vec2)> {
    let (l, t) = (window.left as f32, window.top as f32);
    let (r, bo) = (window.right as f32, window.bottom as f32);
    let mut ca = Projection::outcode(a.x, a.y, window);
    let mut cb = Projection::outcode(b.x, b.y, window);
    loop {
        if (ca | cb).is_empty() {
            return Some((a, b));
        }
        if !(ca & cb).is_empty() {
            return None;
        }
        let out = if ca.is_empty() { cb } else { ca };
        let d = b - a;
        let p = if out.contains(ClipFlags::TOP) {
            Vec2::new(a.x + d.x * (t - a.y) / d.y, t)
        } else if out.contains(ClipFlags::BOTTOM) {
            Vec2::new(a.x + d.x * (bo - a.y) / d.y, bo)
        } else if out.contains(ClipFlags::RIGHT) {
            Vec2::new(r, a.y + d.y * (r - a.x) / d.x)
        } else {
            Vec2::new(l, a.y + d.y * (l - a.x) / d.x)
        };
        if out == ca {
            a = p;
            ca = Projection::outcode(a.x, a.y, window);
        } else {
            b = p;
            cb = Projection::outcode(b.x, b.y, window);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{DrawMode, RenderConfig},
        engine::camera::Camera,
        renderer::Recorder,
        world::texture::TextureBank,
    };

    fn ctx(cfg: RenderConfig) -> RenderContext {
        let mut ctx = RenderContext::new(cfg);
        ctx.begin_frame(&Camera::new(IVec3::ZERO, 0, 0, 0));
        ctx
    }

    /// Clockwise on screen when seen from the origin.
    fn front_quad(z: i16, half: i16) -> Vec<I16Vec3> {
        vec![
            I16Vec3::new(-half, -half, z),
            I16Vec3::new(half, -half, z),
            I16Vec3::new(half, half, z),
            I16Vec3::new(-half, half, z),
        ]
    }

    fn texture(draw: DrawType) -> ObjectTexture {
        ObjectTexture {
            tpage: 1,
            draw,
            uv: [
                Vec2::new(0.0, 0.0),
                Vec2::new(63.0, 0.0),
                Vec2::new(63.0, 63.0),
                Vec2::new(0.0, 63.0),
            ],
        }
    }

    fn only_primitive(ctx: &RenderContext) -> (Primitive, Vec<ScreenVertex>) {
        let buf = ctx.sort_buffer();
        let index = buf.entries()[0].prim;
        let (p, v) = buf.primitive(index);
        (*p, v.to_vec())
    }

    #[test]
    fn inside_quad_is_encoded_unclipped() {
        let mut ctx = ctx(RenderConfig::default());
        ctx.calc_object_vertices(&front_quad(1000, 100)).unwrap();
        ctx.insert_g4([0, 1, 2, 3], 5);
        let (prim, verts) = only_primitive(&ctx);
        assert_eq!(prim.kind, PrimKind::Gouraud);
        assert_eq!(prim.color, 5);
        assert_eq!(verts.len(), 4);
        for (s, v) in verts.iter().zip(ctx.vertices()) {
            assert_eq!((s.x, s.y), (v.xs, v.ys));
        }
    }

    #[test]
    fn back_faces_are_culled_unless_double_sided() {
        let mut ctx = ctx(RenderConfig::default());
        ctx.calc_object_vertices(&front_quad(1000, 100)).unwrap();
        ctx.insert_g4([3, 2, 1, 0], 5);
        assert!(ctx.sort_buffer().is_empty());
        assert_eq!(ctx.stats().culled, 1);

        ctx.insert_gt4([3, 2, 1, 0], &texture(DrawType::Opaque), true);
        assert_eq!(ctx.sort_buffer().len(), 1);
    }

    #[test]
    fn triangles_cull_reject_and_encode() {
        let mut ctx = ctx(RenderConfig::default());
        ctx.calc_object_vertices(&front_quad(1000, 100)).unwrap();
        ctx.insert_gt3([0, 1, 2], &texture(DrawType::Opaque), false);
        ctx.insert_gt3([2, 1, 0], &texture(DrawType::Opaque), false);
        ctx.insert_g3([0, 2, 3], 7);
        ctx.insert_g3([3, 2, 0], 7);
        assert_eq!(ctx.stats().culled, 2);

        let buf = ctx.sort_buffer();
        assert_eq!(buf.len(), 2);
        let (tex, tex_v) = buf.primitive(0);
        assert_eq!(tex.kind, PrimKind::Textured);
        assert_eq!(tex.tpage, 1);
        assert_eq!(tex_v.len(), 3);
        assert_eq!((tex_v[1].u, tex_v[1].v), (63.0, 0.0));
        let (col, col_v) = buf.primitive(1);
        assert_eq!((col.kind, col.color), (PrimKind::Gouraud, 7));
        assert_eq!(col_v.len(), 3);
        assert_eq!((col_v[1].x, col_v[1].y), (ctx.vertices()[2].xs, ctx.vertices()[2].ys));

        // every corner left of the window
        let left: Vec<I16Vec3> = front_quad(1000, 100)
            .iter()
            .map(|v| I16Vec3::new(v.x - 5000, v.y, v.z))
            .collect();
        assert!(!ctx.calc_object_vertices(&left).unwrap());
        ctx.insert_g3([0, 1, 2], 7);
        ctx.insert_gt3([0, 1, 2], &texture(DrawType::Opaque), true);
        assert_eq!(ctx.sort_buffer().len(), 2);
        assert_eq!(ctx.stats().culled, 4);
    }

    #[test]
    fn perspective_encoding_switches_on_distance() {
        let mut ctx = ctx(RenderConfig::default());
        let tex = texture(DrawType::ColorKey);

        ctx.calc_object_vertices(&front_quad(1000, 100)).unwrap();
        ctx.insert_gt4([0, 1, 2, 3], &tex, false);
        ctx.calc_object_vertices(&front_quad(8000, 800)).unwrap();
        ctx.insert_gt4([0, 1, 2, 3], &tex, false);

        let buf = ctx.sort_buffer();
        let (near, near_v) = buf.primitive(0);
        let (far, far_v) = buf.primitive(1);
        assert_eq!(near.kind, PrimKind::Textured);
        assert_eq!(near.blend, Blend::ColorKey);
        assert_eq!(near_v[2].u, 63.0);
        assert_eq!(far.kind, PrimKind::TexturedPersp);
        // u is carried premultiplied by rhw
        assert!((far_v[2].u / far_v[2].rhw - 63.0).abs() < 1e-2);
    }

    #[test]
    fn straddling_polygon_is_clipped_to_the_window() {
        let mut ctx = ctx(RenderConfig::default());
        ctx.calc_object_vertices(&front_quad(500, 2000)).unwrap();
        ctx.insert_g4([0, 1, 2, 3], 1);
        let (_, verts) = only_primitive(&ctx);
        let vp = ctx.viewport();
        for v in &verts {
            assert!(v.x >= vp.left as f32 - 1e-3 && v.x <= vp.right as f32 + 1e-3);
            assert!(v.y >= vp.top as f32 - 1e-3 && v.y <= vp.bottom as f32 + 1e-3);
        }
    }

    #[test]
    fn polygon_through_the_near_plane_is_clipped() {
        let mut ctx = ctx(RenderConfig::default());
        let floor = vec![
            I16Vec3::new(-200, 100, -300),
            I16Vec3::new(200, 100, -300),
            I16Vec3::new(200, 100, 1500),
            I16Vec3::new(-200, 100, 1500),
        ];
        ctx.calc_object_vertices(&floor).unwrap();
        assert!(ctx.vertices()[0].clip.contains(ClipFlags::NEAR));
        // floor below the eye faces up: visible from above
        ctx.insert_g4([3, 2, 1, 0], 1);
        ctx.insert_g4([0, 1, 2, 3], 1);
        assert_eq!(ctx.sort_buffer().len(), 1);
        let (_, verts) = only_primitive(&ctx);
        assert!(verts.iter().all(|v| v.z >= ctx.config().near as f32 - 1e-3));
    }

    #[test]
    fn translucent_faces_are_sorted_in_zbuffer_mode() {
        let mut ctx = ctx(RenderConfig {
            draw_mode: DrawMode::ZBuffered,
            ..RenderConfig::default()
        });
        ctx.calc_object_vertices(&front_quad(1000, 100)).unwrap();
        ctx.insert_gt4([0, 1, 2, 3], &texture(DrawType::Opaque), false);
        ctx.insert_gt4([0, 1, 2, 3], &texture(DrawType::Translucent), false);
        assert_eq!(ctx.sort_buffer().immediate_count(), 1);
        assert_eq!(ctx.sort_buffer().entries().len(), 1);
    }

    #[test]
    fn flat_shading_uses_one_shade() {
        let mut ctx = ctx(RenderConfig {
            shading: Shading::Flat,
            ..RenderConfig::default()
        });
        ctx.calc_object_vertices(&front_quad(1000, 100)).unwrap();
        for (i, v) in ctx.vbuf.iter_mut().enumerate() {
            v.shade = i as i16 * 0x100;
        }
        ctx.insert_g4([0, 1, 2, 3], 1);
        let (prim, verts) = only_primitive(&ctx);
        assert_eq!(prim.kind, PrimKind::Flat);
        assert!(verts.iter().all(|v| v.shade == verts[0].shade));
        assert_eq!(verts[0].shade, 0x180 as f32);
    }

    #[test]
    fn sprite_is_clipped_with_its_texels() {
        let mut ctx = ctx(RenderConfig::default());
        let sprite = SpriteTexture {
            tpage: 2,
            uv0: Vec2::new(0.0, 0.0),
            uv1: Vec2::new(64.0, 64.0),
            extents: [-100, -100, 100, 100],
        };
        // centred on the left edge of a 90 degree view
        let focal = ctx.proj.focal;
        let x = -ctx.proj.cx * 1000.0 / focal;
        ctx.insert_sprite(Vec3::new(x, 0.0, 1000.0), &sprite, 0x1000, false);
        let (prim, verts) = only_primitive(&ctx);
        assert_eq!(prim.kind, PrimKind::Sprite);
        assert_eq!(verts[0].x, 0.0);
        assert!((verts[0].u - 32.0).abs() < 0.5, "{}", verts[0].u);
        assert_eq!(verts[1].u, 64.0);

        ctx.insert_sprite(Vec3::new(0.0, 0.0, 5.0), &sprite, 0, false);
        assert_eq!(ctx.sort_buffer().len(), 1);
    }

    #[test]
    fn lines_clip_and_reject() {
        let w = ScreenRect::new(0, 0, 640, 480);
        let (a, b) = clip_line(Vec2::new(-100.0, 240.0), Vec2::new(320.0, 240.0), &w).unwrap();
        assert_eq!(a, Vec2::new(0.0, 240.0));
        assert_eq!(b, Vec2::new(320.0, 240.0));
        assert!(clip_line(Vec2::new(-10.0, -10.0), Vec2::new(-5.0, 500.0), &w).is_none());

        let mut ctx = ctx(RenderConfig::default());
        ctx.insert_line(Vec2::new(10.0, 10.0), Vec2::new(900.0, 10.0), 100.0, 3, 0);
        let (prim, verts) = only_primitive(&ctx);
        assert_eq!(prim.kind, PrimKind::Line);
        assert_eq!(verts[1].x, 640.0);
    }

    #[test]
    fn shadow_and_trans_quad_are_translucent() {
        let mut ctx = ctx(RenderConfig::default());
        ctx.stack.push().unwrap();
        // floor 600 below the eye, 1500 ahead
        ctx.stack.translate_abs(IVec3::new(0, 600, 1500));
        let bounds = BoundingBox {
            min: I16Vec3::new(-100, -700, -100),
            max: I16Vec3::new(100, 0, 100),
        };
        ctx.insert_shadow(1024, &bounds).unwrap();
        ctx.insert_trans_quad(10, 10, 100, 20, 50.0);

        let mut rec = Recorder::default();
        ctx.sort.sort_poly_list();
        ctx.sort.print_poly_list(&mut rec, &TextureBank::default());
        let kinds: Vec<PrimKind> = rec.calls().iter().map(|c| c.prim.kind).collect();
        assert!(kinds.contains(&PrimKind::Shadow));
        assert!(kinds.contains(&PrimKind::TransQuad));
        assert!(rec.calls().iter().all(|c| c.prim.blend == Blend::Translucent));
        let shadow = rec.calls().iter().find(|c| c.prim.kind == PrimKind::Shadow).unwrap();
        assert_eq!(shadow.vertices.len(), 8);
    }

    #[test]
    fn oversized_shadow_saturates_instead_of_wrapping() {
        let bounds = BoundingBox {
            min: I16Vec3::new(-100, -700, -100),
            max: I16Vec3::new(100, 0, 100),
        };
        let ring = shadow_ring(1024 * 200, &bounds);
        // corners 2 and 3 are the far right, 6 and 7 the far left
        assert_eq!((ring[2].x, ring[3].x), (i16::MAX, i16::MAX));
        assert_eq!((ring[6].x, ring[7].x), (i16::MIN, i16::MIN));
        assert_eq!(ring[0].z, i16::MAX);
        assert_eq!(ring[4].z, i16::MIN);
        assert!(ring.iter().all(|p| p.y == 0));

        let small = shadow_ring(1024, &bounds);
        assert_eq!(small[2], I16Vec3::new(400, 0, 200));
    }
}
