//! Object / room vertex transform, projection and outcodes.

use bitflags::bitflags;
use glam::{I16Vec3, Vec3};

use super::{
    context::{RenderContext, RenderError},
    light::SHADE_MAX,
};
use crate::{
    config::RenderConfig,
    math::{W2V_SCALE, trig},
    world::{Room, RoomVertexFlags, ScreenRect},
};

bitflags! {
    /// Per-vertex clip state. Everything except `MID_SORT` is an outcode.
    #[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ClipFlags: u16 {
        const LEFT     = 0x0001;
        const RIGHT    = 0x0002;
        const TOP      = 0x0004;
        const BOTTOM   = 0x0008;
        const FAR      = 0x0010;
        /// Room vertex nearer than the mid-sort distance.
        const MID_SORT = 0x0100;
        const NEAR     = 0x8000;
    }
}

impl ClipFlags {
    pub const SCREEN: ClipFlags = ClipFlags::LEFT
        .union(ClipFlags::RIGHT)
        .union(ClipFlags::TOP)
        .union(ClipFlags::BOTTOM);

    pub const OUTCODES: ClipFlags = ClipFlags::SCREEN
        .union(ClipFlags::FAR)
        .union(ClipFlags::NEAR);
}

/// Transformed vertex.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhdVbuf {
    /// View space; `zv` is kept raw even behind the near plane.
    pub xv: f32,
    pub yv: f32,
    pub zv: f32,
    /// Screen position, valid unless `NEAR` is set.
    pub xs: f32,
    pub ys: f32,
    /// Depth clamped to the far plane, used for sorting and fog.
    pub z: f32,
    pub rhw: f32,
    pub shade: i16,
    pub clip: ClipFlags,
}

impl PhdVbuf {
    #[inline]
    pub fn view(&self) -> Vec3 {
        Vec3::new(self.xv, self.yv, self.zv)
    }
}

/// Viewport constants shared by every projection of the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub cx: f32,
    pub cy: f32,
    pub focal: f32,
    pub near: f32,
    pub far: f32,
    pub mid_sort: f32,
}

impl Projection {
    pub fn new(cfg: &RenderConfig) -> Self {
        Self {
            cx: cfg.width as f32 * 0.5,
            cy: cfg.height as f32 * 0.5,
            focal: cfg.focal_length(),
            near: cfg.near as f32,
            far: cfg.far as f32,
            mid_sort: cfg.mid_sort_distance,
        }
    }

    #[inline]
    pub fn outcode(x: f32, y: f32, window: &ScreenRect) -> ClipFlags {
        let mut c = ClipFlags::empty();
        if x < window.left as f32 {
            c |= ClipFlags::LEFT;
        } else if x > window.right as f32 {
            c |= ClipFlags::RIGHT;
        }
        if y < window.top as f32 {
            c |= ClipFlags::TOP;
        } else if y > window.bottom as f32 {
            c |= ClipFlags::BOTTOM;
        }
        c
    }

    /// Project one view-space point and classify it against `window`.
    pub fn project(&self, view: Vec3, window: &ScreenRect) -> PhdVbuf {
        let mut v = PhdVbuf {
            xv: view.x,
            yv: view.y,
            zv: view.z,
            z: view.z,
            ..PhdVbuf::default()
        };
        if view.z < self.near {
            v.clip = ClipFlags::NEAR;
            return v;
        }
        if view.z >= self.far {
            v.clip = ClipFlags::FAR;
            v.z = self.far;
        }
        let persp = self.focal / view.z;
        v.xs = self.cx + view.x * persp;
        v.ys = self.cy + view.y * persp;
        v.rhw = 1.0 / view.z;
        v.clip |= Self::outcode(v.xs, v.ys, window);
        v
    }
}

/// Entries in the water wibble table.
const WIBBLE_SIZE: usize = 32;
/// Peak wibble displacement in pixels.
const WIBBLE_AMPLITUDE: f32 = 1.5;

#[inline]
fn wibble(index: usize) -> f32 {
    let a = ((index % WIBBLE_SIZE) * (0x10000 / WIBBLE_SIZE)) as u16;
    trig::sin(a) as f32 / W2V_SCALE as f32 * WIBBLE_AMPLITUDE
}

impl RenderContext {
    fn check_vbuf(&self, needed: usize) -> Result<(), RenderError> {
        if needed > self.config.vbuf_capacity {
            return Err(RenderError::VertexOverflow {
                needed,
                capacity: self.config.vbuf_capacity,
            });
        }
        Ok(())
    }

    /// Transform `vertices` through the top matrix into the vertex buffer.
    ///
    /// Returns `false` when every vertex violates the same bound, in which
    /// case nothing of the mesh can be visible.
    pub fn calc_object_vertices(&mut self, vertices: &[I16Vec3]) -> Result<bool, RenderError> {
        self.check_vbuf(vertices.len())?;
        self.vbuf.clear();
        let m = *self.stack.top();
        let mut all = ClipFlags::all();
        for v in vertices {
            let p = self.proj.project(m.transform_f32(v.as_ivec3()), &self.window);
            all &= p.clip;
            self.vbuf.push(p);
        }
        Ok((all & ClipFlags::OUTCODES).is_empty())
    }

    /// Room variant: adds shading, water wibble and mid-sort flags.
    /// Returns whether any vertex is inside the mid-sort distance.
    pub fn calc_room_vertices(&mut self, room: &Room) -> Result<bool, RenderError> {
        self.check_vbuf(room.vertices.len())?;
        self.light.light_room(room, self.wibble, &mut self.shades);
        self.vbuf.clear();

        let m = *self.stack.top();
        let wobble = room.is_underwater();
        let mut mid = false;
        for (v, &base) in room.vertices.iter().zip(&self.shades) {
            let view = m.transform_f32(v.pos.as_ivec3());
            let mut p = self.proj.project(view, &self.window);

            if wobble
                && !p.clip.contains(ClipFlags::NEAR)
                && !v.flags.contains(RoomVertexFlags::NO_WIBBLE)
            {
                p.xs += wibble(self.wibble + p.ys as usize);
                p.ys += wibble(self.wibble + p.xs as usize);
                p.clip = (p.clip - ClipFlags::SCREEN) | Projection::outcode(p.xs, p.ys, &self.window);
            }
            if view.z < self.proj.mid_sort {
                p.clip |= ClipFlags::MID_SORT;
                mid = true;
            }
            p.shade = (base as i32 + self.light.fog(p.z)).clamp(0, SHADE_MAX) as i16;
            self.vbuf.push(p);
        }
        Ok(mid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::RenderConfig,
        engine::camera::Camera,
        world::{RoomFlags, RoomVertex},
    };
    use glam::IVec3;

    fn ctx(near: i32, far: i32) -> RenderContext {
        let cfg = RenderConfig {
            near,
            far,
            ..RenderConfig::default()
        };
        let mut ctx = RenderContext::new(cfg);
        ctx.set_camera(&Camera::new(IVec3::ZERO, 0, 0, 0));
        ctx
    }

    fn cube(half: i16) -> Vec<I16Vec3> {
        let mut v = Vec::new();
        for i in 0..8 {
            v.push(I16Vec3::new(
                if i & 1 == 0 { -half } else { half },
                if i & 2 == 0 { -half } else { half },
                if i & 4 == 0 { -half } else { half },
            ));
        }
        v
    }

    #[test]
    fn straight_ahead_cube_is_fully_visible() {
        let mut ctx = ctx(100, 10_000);
        ctx.stack.push().unwrap();
        ctx.stack.translate_abs(IVec3::new(0, 0, 1000));
        assert!(ctx.calc_object_vertices(&cube(64)).unwrap());
        assert_eq!(ctx.vbuf.len(), 8);
        for v in &ctx.vbuf {
            assert!(v.zv > 0.0);
            assert!(v.clip.is_empty(), "{:?}", v.clip);
        }
        // symmetric about the centre of the viewport
        let (cx, cy) = (ctx.proj.cx, ctx.proj.cy);
        assert!((ctx.vbuf[0].xs + ctx.vbuf[1].xs - 2.0 * cx).abs() < 1e-3);
        assert!((ctx.vbuf[0].ys + ctx.vbuf[2].ys - 2.0 * cy).abs() < 1e-3);
    }

    #[test]
    fn cube_behind_camera_is_rejected() {
        let mut ctx = ctx(100, 10_000);
        ctx.stack.push().unwrap();
        ctx.stack.translate_abs(IVec3::new(0, 0, -1000));
        assert!(!ctx.calc_object_vertices(&cube(64)).unwrap());
        assert!(ctx.vbuf.iter().all(|v| v.clip == ClipFlags::NEAR));
    }

    #[test]
    fn far_vertices_are_clamped_but_keep_raw_depth() {
        let mut ctx = ctx(100, 2000);
        ctx.stack.push().unwrap();
        ctx.stack.translate_abs(IVec3::new(0, 0, 1990));
        ctx.calc_object_vertices(&cube(64)).unwrap();
        let far = ctx.vbuf.iter().find(|v| v.clip.contains(ClipFlags::FAR)).unwrap();
        assert_eq!(far.z, 2000.0);
        assert!(far.zv > 2000.0);
    }

    #[test]
    fn off_screen_side_sets_outcode() {
        let mut ctx = ctx(100, 10_000);
        ctx.stack.push().unwrap();
        ctx.stack.translate_abs(IVec3::new(-5000, 0, 1000));
        assert!(!ctx.calc_object_vertices(&cube(64)).unwrap());
        assert!(ctx.vbuf.iter().all(|v| v.clip.contains(ClipFlags::LEFT)));
    }

    #[test]
    fn oversized_mesh_is_an_error() {
        let mut ctx = ctx(100, 10_000);
        let big = vec![I16Vec3::ZERO; ctx.config.vbuf_capacity + 1];
        assert!(matches!(
            ctx.calc_object_vertices(&big),
            Err(RenderError::VertexOverflow { .. })
        ));
    }

    #[test]
    fn room_vertices_flag_mid_sort_and_skip_wibble() {
        let mut ctx = ctx(20, 10_000);
        let room = Room {
            flags: RoomFlags::UNDERWATER,
            vertices: vec![
                RoomVertex {
                    pos: I16Vec3::new(0, 0, 100),
                    light: 0,
                    table: 0,
                    flags: RoomVertexFlags::NO_WIBBLE,
                },
                RoomVertex {
                    pos: I16Vec3::new(0, 0, 4000),
                    light: 0x0400,
                    table: 0,
                    flags: RoomVertexFlags::empty(),
                },
            ],
            ..Room::default()
        };
        ctx.stack.push().unwrap();
        assert!(ctx.calc_room_vertices(&room).unwrap());
        assert!(ctx.vbuf[0].clip.contains(ClipFlags::MID_SORT));
        assert!(!ctx.vbuf[1].clip.contains(ClipFlags::MID_SORT));
        assert_eq!(ctx.vbuf[0].xs, ctx.proj.cx);
        assert_eq!(ctx.vbuf[1].shade, 0x0400);
    }
}
