//! Recording back-end: keeps every dispatched primitive in call order.

use crate::{
    renderer::{Primitive, Renderer, Rgba, ScreenVertex},
    world::texture::TextureBank,
};

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub prim: Primitive,
    pub vertices: Vec<ScreenVertex>,
}

#[derive(Default)]
pub struct Recorder {
    calls: Vec<RecordedCall>,
    frames: usize,
    width: usize,
    height: usize,
}

impl Recorder {
    /// Calls since the last `begin_frame`.
    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    /// Completed frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    fn record(&mut self, prim: &Primitive, verts: &[ScreenVertex]) {
        self.calls.push(RecordedCall {
            prim: *prim,
            vertices: verts.to_vec(),
        });
    }
}

impl Renderer for Recorder {
    fn begin_frame(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.calls.clear();
    }

    fn draw_flat(&mut self, prim: &Primitive, verts: &[ScreenVertex], _bank: &TextureBank) {
        self.record(prim, verts);
    }

    fn draw_gouraud(&mut self, prim: &Primitive, verts: &[ScreenVertex], _bank: &TextureBank) {
        self.record(prim, verts);
    }

    fn draw_textured(&mut self, prim: &Primitive, verts: &[ScreenVertex], _bank: &TextureBank) {
        self.record(prim, verts);
    }

    fn draw_textured_persp(
        &mut self,
        prim: &Primitive,
        verts: &[ScreenVertex],
        _bank: &TextureBank,
    ) {
        self.record(prim, verts);
    }

    fn draw_sprite(&mut self, prim: &Primitive, verts: &[ScreenVertex], _bank: &TextureBank) {
        self.record(prim, verts);
    }

    fn draw_line(&mut self, prim: &Primitive, verts: &[ScreenVertex], _bank: &TextureBank) {
        self.record(prim, verts);
    }

    fn draw_trans_quad(&mut self, prim: &Primitive, verts: &[ScreenVertex]) {
        self.record(prim, verts);
    }

    fn draw_shadow(&mut self, prim: &Primitive, verts: &[ScreenVertex]) {
        self.record(prim, verts);
    }

    fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&[Rgba], usize, usize),
    {
        self.frames += 1;
        submit(&[], self.width, self.height);
    }
}
