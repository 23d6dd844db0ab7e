//! Rendering abstraction layer.
//!
//! *The engine never touches a pixel buffer directly.*
//! It clips, shades and sorts [`Primitive`]s, then dispatches each one to
//! the matching [`Renderer`] method, farthest first.
//!
//! * [`Software`] rasterises into an ARGB frame-buffer.
//! * [`Hardware`] turns primitives into device vertex batches.
//! * [`Recorder`] keeps every call for inspection.

use crate::world::texture::{TextureBank, TextureId};

/// Pixel format of the software frame-buffer (0xAARRGGBB).
pub type Rgba = u32;

/// Draw routine selected by the inserter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimKind {
    /// Palette colour, one shade.
    Flat,
    /// Palette colour, per-vertex shade.
    Gouraud,
    /// Textured, `u`/`v` interpolated linearly on screen.
    Textured,
    /// Textured, vertices carry `u·rhw`, `v·rhw` and `rhw`.
    TexturedPersp,
    /// Screen-aligned rectangle: vertex 0 top-left, vertex 1 bottom-right.
    Sprite,
    Line,
    /// Darkening rectangle, same corner layout as sprites.
    TransQuad,
    /// Translucent black polygon under an object.
    Shadow,
}

/// How a primitive's colour combines with the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Blend {
    #[default]
    Opaque,
    /// Texel 0 is not drawn.
    ColorKey,
    /// 50 % mix with the frame.
    Translucent,
}

/// Clipped, projected corner.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScreenVertex {
    pub x: f32,
    pub y: f32,
    /// View depth.
    pub z: f32,
    pub rhw: f32,
    /// `0..=0x1FFF`, larger is darker.
    pub shade: f32,
    pub u: f32,
    pub v: f32,
}

/// Encoded primitive; its corners live in the frame's vertex arena.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Primitive {
    pub kind: PrimKind,
    pub blend: Blend,
    pub tpage: TextureId,
    /// Palette index for untextured kinds.
    pub color: u8,
    pub(crate) first: u32,
    pub(crate) count: u16,
}

impl Primitive {
    pub fn new(kind: PrimKind, blend: Blend, tpage: TextureId, color: u8) -> Self {
        Self {
            kind,
            blend,
            tpage,
            color,
            first: 0,
            count: 0,
        }
    }

    #[inline]
    pub fn vertex_range(&self) -> std::ops::Range<usize> {
        let first = self.first as usize;
        first..first + self.count as usize
    }
}

/// Linear light factor of a shade: 2.0 at 0, 1.0 at `0x1000`, 0.0 at
/// `0x2000`.
#[inline]
pub fn shade_intensity(shade: f32) -> f32 {
    ((0x2000 as f32 - shade) / 0x1000 as f32).clamp(0.0, 2.0)
}

/// Scale the RGB channels of `color` by `k`, saturating.
#[inline]
pub fn shade_rgb(color: u32, k: f32) -> Rgba {
    let ch = |shift: u32| (((color >> shift) & 0xFF) as f32 * k).min(255.0) as u32;
    0xFF00_0000 | (ch(16) << 16) | (ch(8) << 8) | ch(0)
}

/// A renderer that owns an internal scratch buffer for the whole frame.
///
/// `end_frame` hands the finished buffer to a user-supplied closure.
/// Software callers typically forward it to their window-manager;
/// device back-ends call it with an empty slice.
pub trait Renderer {
    /// (Re)allocate internal scratch for the requested resolution and clear it.
    fn begin_frame(&mut self, width: usize, height: usize);

    fn draw_flat(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank);

    fn draw_gouraud(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank);

    /// Affine textured polygon.
    fn draw_textured(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank);

    /// Perspective-correct textured polygon.
    fn draw_textured_persp(
        &mut self,
        prim: &Primitive,
        verts: &[ScreenVertex],
        bank: &TextureBank,
    );

    fn draw_sprite(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank);

    fn draw_line(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank);

    fn draw_trans_quad(&mut self, prim: &Primitive, verts: &[ScreenVertex]);

    fn draw_shadow(&mut self, prim: &Primitive, verts: &[ScreenVertex]);

    /// Finish the frame and **loan** the finished buffer to `submit`.
    ///
    /// * `submit(&[Rgba], w, h)` is run exactly once per frame.
    /// * Device back-ends pass an empty slice: `submit(&[], width, height)`.
    fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&[Rgba], usize, usize);
}

/// Dispatch one primitive by kind.
pub trait RendererExt: Renderer {
    fn draw_primitive(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank) {
        match prim.kind {
            PrimKind::Flat => self.draw_flat(prim, verts, bank),
            PrimKind::Gouraud => self.draw_gouraud(prim, verts, bank),
            PrimKind::Textured => self.draw_textured(prim, verts, bank),
            PrimKind::TexturedPersp => self.draw_textured_persp(prim, verts, bank),
            PrimKind::Sprite => self.draw_sprite(prim, verts, bank),
            PrimKind::Line => self.draw_line(prim, verts, bank),
            PrimKind::TransQuad => self.draw_trans_quad(prim, verts),
            PrimKind::Shadow => self.draw_shadow(prim, verts),
        }
    }
}
impl<T: Renderer + ?Sized> RendererExt for T {}

pub mod hardware;
pub mod record;
pub mod software;

pub use hardware::{BlendState, Hardware, HwBatch, HwVertex, Topology};
pub use record::{RecordedCall, Recorder};
pub use software::Software;
