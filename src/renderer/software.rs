//! ---------------------------------------------------------------------------
//! Software (CPU) polygon renderer
//!
//! * Fills an internal frame-buffer in **0xAARRGGBB** format.
//! * In sorted mode primitives arrive back to front and are simply painted.
//! * With a depth buffer, each pixel keeps the largest `rhw` seen so far;
//!   a fragment passes when its `rhw` is not smaller. The buffer is
//!   cleared to 0, so the skybox (`rhw == 0`) only lands on empty pixels.
//! ---------------------------------------------------------------------------

mod raster;

use self::raster::{Fragment, fill_polygon, line};
use crate::{
    renderer::{Blend, Primitive, Renderer, Rgba, ScreenVertex, shade_intensity, shade_rgb},
    world::texture::{COLOR_KEY, TextureBank, TexturePage},
};

/// Frame clear colour (dark grey).
const CLEAR: Rgba = 0xFF_20_20_20;

/*───────────────────────────────────────────────────────────────────────*/
/*                              Backend                                 */
/*───────────────────────────────────────────────────────────────────────*/

#[derive(Default)]
pub struct Software {
    scratch: Vec<Rgba>,
    /// Present only when depth testing is on.
    depth: Option<Vec<f32>>,
    width: usize,
    height: usize,
}

impl Software {
    /// Painter's-order renderer; pair with `DrawMode::Sorted`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer with a per-pixel depth test; pair with `DrawMode::ZBuffered`.
    pub fn with_depth_buffer() -> Self {
        Self {
            depth: Some(Vec::new()),
            ..Self::default()
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Frame-buffer as of the last draw call.
    pub fn pixels(&self) -> &[Rgba] {
        &self.scratch
    }

    /*──────────────────────── pixel ops ──────────────────────────*/

    #[inline]
    fn depth_test(&mut self, idx: usize, rhw: f32, write: bool) -> bool {
        match &mut self.depth {
            Some(z) if rhw < z[idx] => false,
            Some(z) => {
                if write {
                    z[idx] = rhw;
                }
                true
            }
            None => true,
        }
    }

    #[inline]
    fn put(&mut self, x: usize, y: usize, rhw: f32, color: Rgba, blend: Blend) {
        let idx = y * self.width + x;
        let translucent = blend == Blend::Translucent;
        if !self.depth_test(idx, rhw, !translucent) {
            return;
        }
        self.scratch[idx] = if translucent {
            half_mix(self.scratch[idx], color)
        } else {
            color
        };
    }

    #[inline]
    fn darken(&mut self, x: usize, y: usize, rhw: f32) {
        let idx = y * self.width + x;
        if self.depth_test(idx, rhw, false) {
            self.scratch[idx] = shade_rgb(self.scratch[idx], 0.5);
        }
    }

    /*──────────────────────── polygon fills ──────────────────────*/

    fn fill_colored(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank) {
        let base = bank.color(prim.color);
        let (w, h) = (self.width, self.height);
        fill_polygon(verts, w, h, |x, y, f| {
            let c = shade_rgb(base, shade_intensity(f.shade));
            self.put(x, y, f.rhw, c, prim.blend);
        });
    }

    fn fill_textured(
        &mut self,
        prim: &Primitive,
        verts: &[ScreenVertex],
        bank: &TextureBank,
        persp: bool,
    ) {
        let page = bank.page_or_missing(prim.tpage);
        let (w, h) = (self.width, self.height);
        fill_polygon(verts, w, h, |x, y, f| {
            let (u, v) = if persp && f.rhw > 0.0 {
                (f.u / f.rhw, f.v / f.rhw)
            } else {
                (f.u, f.v)
            };
            if let Some(c) = sample(page, u, v, prim.blend, bank) {
                let c = shade_rgb(c, shade_intensity(f.shade));
                self.put(x, y, f.rhw, c, prim.blend);
            }
        });
    }
}

/// Texel colour, or `None` for a colour-keyed hole.
#[inline]
fn sample(page: &TexturePage, u: f32, v: f32, blend: Blend, bank: &TextureBank) -> Option<Rgba> {
    let t = page.texel(u.floor() as i32, v.floor() as i32);
    if t == COLOR_KEY && blend != Blend::Opaque {
        return None;
    }
    Some(bank.color(t))
}

/// 50 % mix per channel.
#[inline]
fn half_mix(dst: Rgba, src: Rgba) -> Rgba {
    0xFF00_0000 | (((dst & 0x00FE_FEFE) >> 1) + ((src & 0x00FE_FEFE) >> 1))
}

/// Pixel span `[lo, hi)` of a screen edge pair, clamped to `0..max`.
#[inline]
fn span(a: f32, b: f32, max: usize) -> (usize, usize) {
    let lo = a.round().max(0.0) as usize;
    let hi = (b.round().max(0.0) as usize).min(max);
    (lo, hi)
}

/*──────────────────────── Renderer trait impl ────────────────────────*/
impl Renderer for Software {
    fn begin_frame(&mut self, w: usize, h: usize) {
        // (re)allocate if resolution changed
        if w != self.width || h != self.height {
            self.width = w;
            self.height = h;
            self.scratch.resize(w * h, 0);
        }
        self.scratch.fill(CLEAR);
        if let Some(z) = &mut self.depth {
            z.resize(w * h, 0.0);
            z.fill(0.0);
        }
    }

    fn draw_flat(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank) {
        self.fill_colored(prim, verts, bank);
    }

    fn draw_gouraud(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank) {
        self.fill_colored(prim, verts, bank);
    }

    fn draw_textured(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank) {
        self.fill_textured(prim, verts, bank, false);
    }

    fn draw_textured_persp(
        &mut self,
        prim: &Primitive,
        verts: &[ScreenVertex],
        bank: &TextureBank,
    ) {
        self.fill_textured(prim, verts, bank, true);
    }

    fn draw_sprite(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank) {
        let [a, b] = match verts {
            [a, b, ..] => [a, b],
            _ => return,
        };
        let page = bank.page_or_missing(prim.tpage);
        let (x0, x1) = span(a.x, b.x, self.width);
        let (y0, y1) = span(a.y, b.y, self.height);
        let du = (b.u - a.u) / (b.x - a.x).max(1.0);
        let dv = (b.v - a.v) / (b.y - a.y).max(1.0);
        let k = shade_intensity(a.shade);
        for y in y0..y1 {
            let v = a.v + (y as f32 + 0.5 - a.y) * dv;
            for x in x0..x1 {
                let u = a.u + (x as f32 + 0.5 - a.x) * du;
                if let Some(c) = sample(page, u, v, prim.blend, bank) {
                    self.put(x, y, a.rhw, shade_rgb(c, k), prim.blend);
                }
            }
        }
    }

    fn draw_line(&mut self, prim: &Primitive, verts: &[ScreenVertex], bank: &TextureBank) {
        let [a, b] = match verts {
            [a, b, ..] => [a, b],
            _ => return,
        };
        let c = shade_rgb(bank.color(prim.color), shade_intensity(a.shade));
        let (w, h) = (self.width, self.height);
        line(
            a.x as i32,
            a.y as i32,
            b.x as i32,
            b.y as i32,
            w,
            h,
            |x, y| self.put(x, y, a.rhw, c, prim.blend),
        );
    }

    fn draw_trans_quad(&mut self, _prim: &Primitive, verts: &[ScreenVertex]) {
        let [a, b] = match verts {
            [a, b, ..] => [a, b],
            _ => return,
        };
        let (x0, x1) = span(a.x, b.x, self.width);
        let (y0, y1) = span(a.y, b.y, self.height);
        for y in y0..y1 {
            for x in x0..x1 {
                self.darken(x, y, a.rhw);
            }
        }
    }

    fn draw_shadow(&mut self, _prim: &Primitive, verts: &[ScreenVertex]) {
        let (w, h) = (self.width, self.height);
        fill_polygon(verts, w, h, |x, y, f: Fragment| self.darken(x, y, f.rhw));
    }

    fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&[Rgba], usize, usize),
    {
        submit(&self.scratch, self.width, self.height);
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        renderer::{PrimKind, RendererExt},
        world::texture::{Palette, TexturePage},
    };

    /* tiny helpers ---------------------------------------------------*/
    fn bank() -> TextureBank {
        let mut bank = TextureBank::default_with_checker();
        let mut pal = Palette::default();
        pal[1] = 0x00_0000FF;
        pal[2] = 0x00_FF0000;
        bank.set_palette(pal);
        // left half is a colour-key hole, right half palette 1
        let pixels = (0..16).map(|i| if i % 4 < 2 { 0 } else { 1 }).collect();
        bank.insert(
            "HOLE",
            TexturePage {
                name: "HOLE".into(),
                w: 4,
                h: 4,
                pixels,
            },
        )
        .unwrap();
        bank
    }

    fn corner(x: f32, y: f32, rhw: f32, u: f32, v: f32) -> ScreenVertex {
        ScreenVertex {
            x,
            y,
            z: 1.0 / rhw,
            rhw,
            shade: 0x1000 as f32,
            u,
            v,
        }
    }

    fn square(rhw: f32) -> [ScreenVertex; 4] {
        [
            corner(0.0, 0.0, rhw, 0.0, 0.0),
            corner(4.0, 0.0, rhw, 4.0, 0.0),
            corner(4.0, 4.0, rhw, 4.0, 4.0),
            corner(0.0, 4.0, rhw, 0.0, 4.0),
        ]
    }

    fn frame(sw: &mut Software) -> Vec<Rgba> {
        let mut out = Vec::new();
        sw.end_frame(|fb, _, _| out.extend_from_slice(fb));
        out
    }

    #[test]
    fn flat_polygon_fills_with_palette_colour() {
        let bank = bank();
        let mut sw = Software::new();
        sw.begin_frame(4, 4);
        let prim = Primitive::new(PrimKind::Flat, Blend::Opaque, 0, 1);
        sw.draw_primitive(&prim, &square(1.0), &bank);
        assert!(frame(&mut sw).iter().all(|&px| px == 0xFF_0000FF));
    }

    #[test]
    fn colour_key_leaves_holes() {
        let bank = bank();
        let page = bank.id("HOLE").unwrap();
        let mut sw = Software::new();
        sw.begin_frame(4, 4);
        let prim = Primitive::new(PrimKind::Textured, Blend::ColorKey, page, 0);
        sw.draw_primitive(&prim, &square(1.0), &bank);
        let fb = frame(&mut sw);
        assert_eq!(fb[0], CLEAR);
        assert_eq!(fb[3], 0xFF_0000FF);
    }

    #[test]
    fn translucent_mixes_half_and_half() {
        let bank = bank();
        let mut sw = Software::new();
        sw.begin_frame(4, 4);
        sw.draw_primitive(
            &Primitive::new(PrimKind::Flat, Blend::Opaque, 0, 2),
            &square(1.0),
            &bank,
        );
        sw.draw_primitive(
            &Primitive::new(PrimKind::Flat, Blend::Translucent, 0, 1),
            &square(1.0),
            &bank,
        );
        assert_eq!(frame(&mut sw)[5], 0xFF_7F007F);
    }

    #[test]
    fn depth_buffer_keeps_the_nearest() {
        let bank = bank();
        let mut sw = Software::with_depth_buffer();
        sw.begin_frame(4, 4);
        let near = Primitive::new(PrimKind::Flat, Blend::Opaque, 0, 1);
        let far = Primitive::new(PrimKind::Flat, Blend::Opaque, 0, 2);
        sw.draw_primitive(&near, &square(0.5), &bank);
        sw.draw_primitive(&far, &square(0.1), &bank);
        // zero rhw (sky) never overwrites
        sw.draw_primitive(&far, &square(0.0), &bank);
        assert!(frame(&mut sw).iter().all(|&px| px == 0xFF_0000FF));
    }

    #[test]
    fn sprite_and_shadow_touch_their_rectangle() {
        let bank = bank();
        let mut sw = Software::new();
        sw.begin_frame(8, 8);
        let sprite = Primitive::new(PrimKind::Sprite, Blend::Opaque, 0, 0);
        sw.draw_primitive(
            &sprite,
            &[corner(2.0, 2.0, 1.0, 0.0, 0.0), corner(4.0, 4.0, 1.0, 2.0, 2.0)],
            &bank,
        );
        let fb = frame(&mut sw);
        assert_ne!(fb[2 * 8 + 2], CLEAR);
        assert_eq!(fb[5 * 8 + 5], CLEAR);

        let shadow = Primitive::new(PrimKind::Shadow, Blend::Translucent, 0, 0);
        sw.begin_frame(8, 8);
        sw.draw_primitive(&shadow, &square(1.0), &bank);
        let fb = frame(&mut sw);
        assert_eq!(fb[0], shade_rgb(CLEAR, 0.5));
        assert_eq!(fb[7], CLEAR);
    }

    #[test]
    fn line_uses_bresenham() {
        let bank = bank();
        let mut sw = Software::new();
        sw.begin_frame(4, 4);
        let prim = Primitive::new(PrimKind::Line, Blend::Opaque, 0, 1);
        sw.draw_primitive(
            &prim,
            &[corner(0.0, 0.0, 1.0, 0.0, 0.0), corner(3.0, 3.0, 1.0, 0.0, 0.0)],
            &bank,
        );
        let fb = frame(&mut sw);
        for i in 0..4 {
            assert_eq!(fb[i * 4 + i], 0xFF_0000FF);
        }
        assert_eq!(fb[1], CLEAR);
    }
}
