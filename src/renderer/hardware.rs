//! Device back-end: converts primitives into vertex batches.
//!
//! Nothing is rasterised here. Each primitive becomes pre-transformed
//! vertices (screen position, depth, `rhw`, modulated colour and
//! normalised texture coordinates) appended to one array, and adjacent
//! primitives with the same state share a batch. A device layer uploads
//! [`Hardware::vertices`] and issues one draw per [`HwBatch`].

use smallvec::SmallVec;

use crate::{
    renderer::{Blend, Primitive, Renderer, Rgba, ScreenVertex, shade_intensity, shade_rgb},
    world::texture::{TextureBank, TextureId},
};

/// Vertex colour for textured geometry at shade `0x1000`; the device
/// modulates by 2, so full brightness doubles it.
const MODULATE_GREY: Rgba = 0x00_80_80_80;

/// Corners of one clipped polygon; clipping adds at most one per edge.
type Fan = SmallVec<[HwVertex; 12]>;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HwVertex {
    pub sx: f32,
    pub sy: f32,
    /// Depth mapped to `0..=1`.
    pub sz: f32,
    pub rhw: f32,
    pub color: Rgba,
    pub u: f32,
    pub v: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
    LineList,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendState {
    Opaque,
    /// Alpha test against the colour key.
    AlphaTest,
    /// 50 % source over destination.
    Half,
}

impl From<Blend> for BlendState {
    fn from(b: Blend) -> Self {
        match b {
            Blend::Opaque => BlendState::Opaque,
            Blend::ColorKey => BlendState::AlphaTest,
            Blend::Translucent => BlendState::Half,
        }
    }
}

/// One draw call's worth of consecutive vertices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HwBatch {
    pub topology: Topology,
    pub blend: BlendState,
    /// `None` for untextured geometry.
    pub tpage: Option<TextureId>,
    pub first: usize,
    pub count: usize,
}

pub struct Hardware {
    vertices: Vec<HwVertex>,
    batches: Vec<HwBatch>,
    width: usize,
    height: usize,
    far: f32,
}

impl Hardware {
    /// `far` maps view depth onto the `0..=1` device range.
    pub fn new(far: f32) -> Self {
        Self {
            vertices: Vec::new(),
            batches: Vec::new(),
            width: 0,
            height: 0,
            far: far.max(1.0),
        }
    }

    pub fn vertices(&self) -> &[HwVertex] {
        &self.vertices
    }

    pub fn batches(&self) -> &[HwBatch] {
        &self.batches
    }

    fn vertex(&self, v: &ScreenVertex, color: Rgba, uv: (f32, f32)) -> HwVertex {
        HwVertex {
            sx: v.x,
            sy: v.y,
            sz: if v.rhw > 0.0 {
                (v.z / self.far).clamp(0.0, 1.0)
            } else {
                1.0
            },
            rhw: v.rhw,
            color: 0xFF00_0000 | color,
            u: uv.0,
            v: uv.1,
        }
    }

    /// Open a batch for `n` more vertices, extending the last one when the
    /// state matches.
    fn reserve(&mut self, topology: Topology, blend: BlendState, tpage: Option<TextureId>, n: usize) {
        let first = self.vertices.len();
        if let Some(last) = self.batches.last_mut() {
            if last.topology == topology
                && last.blend == blend
                && last.tpage == tpage
                && last.first + last.count == first
            {
                last.count += n;
                return;
            }
        }
        self.batches.push(HwBatch {
            topology,
            blend,
            tpage,
            first,
            count: n,
        });
    }

    /// Emit a convex fan as a triangle list.
    fn push_fan(&mut self, blend: BlendState, tpage: Option<TextureId>, fan: &[HwVertex]) {
        if fan.len() < 3 {
            return;
        }
        self.reserve(Topology::TriangleList, blend, tpage, (fan.len() - 2) * 3);
        for i in 1..fan.len() - 1 {
            self.vertices.extend_from_slice(&[fan[0], fan[i], fan[i + 1]]);
        }
    }

    fn push_colored(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank) {
        let base = bank.color(prim.color);
        let fan: Fan = verts
            .iter()
            .map(|v| self.vertex(v, shade_rgb(base, shade_intensity(v.shade)), (0.0, 0.0)))
            .collect();
        self.push_fan(prim.blend.into(), None, &fan);
    }

    fn push_textured(
        &mut self,
        prim: &Primitive,
        verts: &[ScreenVertex],
        bank: &TextureBank,
        persp: bool,
    ) {
        let page = bank.page_or_missing(prim.tpage);
        let (pw, ph) = (page.w as f32, page.h as f32);
        let fan: Fan = verts
            .iter()
            .map(|v| {
                let (u, t) = if persp && v.rhw > 0.0 {
                    (v.u / v.rhw, v.v / v.rhw)
                } else {
                    (v.u, v.v)
                };
                let c = shade_rgb(MODULATE_GREY, shade_intensity(v.shade));
                self.vertex(v, c, (u / pw, t / ph))
            })
            .collect();
        self.push_fan(prim.blend.into(), Some(prim.tpage), &fan);
    }

    /// Screen rectangle from two corners as a four-vertex fan.
    fn rect(&self, a: &ScreenVertex, b: &ScreenVertex, color: Rgba, uv: [(f32, f32); 2]) -> [HwVertex; 4] {
        let corner = |x: f32, y: f32, uv: (f32, f32)| {
            self.vertex(&ScreenVertex { x, y, ..*a }, color, uv)
        };
        [
            corner(a.x, a.y, uv[0]),
            corner(b.x, a.y, (uv[1].0, uv[0].1)),
            corner(b.x, b.y, uv[1]),
            corner(a.x, b.y, (uv[0].0, uv[1].1)),
        ]
    }
}

impl Renderer for Hardware {
    fn begin_frame(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.vertices.clear();
        self.batches.clear();
    }

    fn draw_flat(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank) {
        self.push_colored(prim, verts, bank);
    }

    fn draw_gouraud(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank) {
        self.push_colored(prim, verts, bank);
    }

    fn draw_textured(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank) {
        self.push_textured(prim, verts, bank, false);
    }

    fn draw_textured_persp(
        &mut self,
        prim: &Primitive,
        verts: &[ScreenVertex],
        bank: &TextureBank,
    ) {
        self.push_textured(prim, verts, bank, true);
    }

    fn draw_sprite(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank) {
        let [a, b] = match verts {
            [a, b, ..] => [a, b],
            _ => return,
        };
        let page = bank.page_or_missing(prim.tpage);
        let (pw, ph) = (page.w as f32, page.h as f32);
        let color = shade_rgb(MODULATE_GREY, shade_intensity(a.shade));
        let quad = self.rect(a, b, color, [(a.u / pw, a.v / ph), (b.u / pw, b.v / ph)]);
        self.push_fan(prim.blend.into(), Some(prim.tpage), &quad);
    }

    fn draw_line(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank) {
        let [a, b] = match verts {
            [a, b, ..] => [a, b],
            _ => return,
        };
        let color = shade_rgb(bank.color(prim.color), shade_intensity(a.shade));
        let pair = [self.vertex(a, color, (0.0, 0.0)), self.vertex(b, color, (0.0, 0.0))];
        self.reserve(Topology::LineList, prim.blend.into(), None, 2);
        self.vertices.extend_from_slice(&pair);
    }

    fn draw_trans_quad(&mut self, _prim: &Primitive, verts: &[ScreenVertex]) {
        let [a, b] = match verts {
            [a, b, ..] => [a, b],
            _ => return,
        };
        let quad = self.rect(a, b, 0, [(0.0, 0.0); 2]);
        self.push_fan(BlendState::Half, None, &quad);
    }

    fn draw_shadow(&mut self, _prim: &Primitive, verts: &[ScreenVertex]) {
        let fan: Fan = verts.iter().map(|v| self.vertex(v, 0, (0.0, 0.0))).collect();
        self.push_fan(BlendState::Half, None, &fan);
    }

    fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&[Rgba], usize, usize),
    {
        submit(&[], self.width, self.height);
    }
}
