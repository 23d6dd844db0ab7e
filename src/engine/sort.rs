//! Per-frame primitive store and painter's ordering.
//!
//! Sort keys pack three fields, most significant first:
//!
//! ```text
//! 63        48 47                        16 15          0
//! [  bucket  ][          depth            ][  sequence  ]
//! ```
//!
//! Sorting is descending, so higher buckets and greater depths draw first.
//! The sequence field is filled by [`SortBuffer::sort_poly_list`] and only
//! makes keys unique.

use crate::{
    renderer::{Primitive, RendererExt, ScreenVertex},
    world::texture::TextureBank,
};

/// Sequence numbers are 16 bits wide.
pub const MAX_SORT_ENTRIES: usize = 1 << 16;

/// Where an encoded primitive goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Deferred, drawn back to front.
    Sorted,
    /// Drawn in submission order before anything sorted.
    Immediate,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SortError {
    #[error("sort buffer full ({0} primitives)")]
    Full(usize),

    #[error("vertex arena full ({0} vertices)")]
    VerticesFull(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortEntry {
    pub key: u64,
    pub prim: u32,
}

/// Compose the bucket and depth fields of a key.
#[inline]
pub fn sort_key(bucket: u16, depth: f32) -> u64 {
    let d = (depth.max(0.0) * 16.0).min(u32::MAX as f32) as u32;
    ((bucket as u64) << 48) | ((d as u64) << 16)
}

pub struct SortBuffer {
    entries: Vec<SortEntry>,
    immediate: Vec<u32>,
    prims: Vec<Primitive>,
    verts: Vec<ScreenVertex>,
    capacity: usize,
    vertex_capacity: usize,
}

impl SortBuffer {
    pub fn new(capacity: usize, vertex_capacity: usize) -> Self {
        let capacity = capacity.min(MAX_SORT_ENTRIES);
        Self {
            entries: Vec::with_capacity(capacity),
            immediate: Vec::with_capacity(capacity),
            prims: Vec::with_capacity(capacity),
            verts: Vec::with_capacity(vertex_capacity),
            capacity,
            vertex_capacity,
        }
    }

    /// Reset all cursors; storage is kept.
    pub fn init_poly_list(&mut self) {
        self.entries.clear();
        self.immediate.clear();
        self.prims.clear();
        self.verts.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.prims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }

    /// Store `prim` with its corners. `key` is ignored on the immediate
    /// route.
    pub fn push(
        &mut self,
        route: Route,
        key: u64,
        mut prim: Primitive,
        verts: &[ScreenVertex],
    ) -> Result<(), SortError> {
        if self.prims.len() >= self.capacity {
            return Err(SortError::Full(self.capacity));
        }
        if self.verts.len() + verts.len() > self.vertex_capacity {
            return Err(SortError::VerticesFull(self.vertex_capacity));
        }
        prim.first = self.verts.len() as u32;
        prim.count = verts.len() as u16;
        self.verts.extend_from_slice(verts);

        let index = self.prims.len() as u32;
        self.prims.push(prim);
        match route {
            Route::Sorted => self.entries.push(SortEntry { key, prim: index }),
            Route::Immediate => self.immediate.push(index),
        }
        Ok(())
    }

    /// Stamp sequence numbers and order entries back to front.
    pub fn sort_poly_list(&mut self) {
        for (i, e) in self.entries.iter_mut().enumerate() {
            e.key = (e.key & !0xFFFF) | (i as u64 & 0xFFFF);
        }
        self.entries.sort_unstable_by(|a, b| b.key.cmp(&a.key));
    }

    pub fn entries(&self) -> &[SortEntry] {
        &self.entries
    }

    pub fn immediate_count(&self) -> usize {
        self.immediate.len()
    }

    /// Primitive and corners behind a sort entry or immediate slot.
    pub fn primitive(&self, index: u32) -> (&Primitive, &[ScreenVertex]) {
        let p = &self.prims[index as usize];
        (p, &self.verts[p.vertex_range()])
    }

    /// Immediate primitives in submission order, then the sorted list.
    pub fn print_poly_list<R: RendererExt + ?Sized>(&self, renderer: &mut R, bank: &TextureBank) {
        let order = self
            .immediate
            .iter()
            .copied()
            .chain(self.entries.iter().map(|e| e.prim));
        for index in order {
            let (prim, verts) = self.primitive(index);
            renderer.draw_primitive(prim, verts, bank);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{Blend, PrimKind, Recorder};

    fn prim(color: u8) -> Primitive {
        Primitive::new(PrimKind::Flat, Blend::Opaque, 0, color)
    }

    fn tri() -> [ScreenVertex; 3] {
        [ScreenVertex::default(); 3]
    }

    fn assert_descending(buf: &SortBuffer) {
        for w in buf.entries().windows(2) {
            assert!(w[0].key >= w[1].key);
            assert!(w[0].key >> 16 >= w[1].key >> 16);
        }
    }

    #[test]
    fn empty_and_single() {
        let mut buf = SortBuffer::new(16, 64);
        buf.sort_poly_list();
        assert!(buf.entries().is_empty());

        buf.push(Route::Sorted, sort_key(0, 10.0), prim(1), &tri())
            .unwrap();
        buf.sort_poly_list();
        assert_eq!(buf.entries().len(), 1);
        assert_eq!(buf.entries()[0].key >> 16, sort_key(0, 10.0) >> 16);
    }

    #[test]
    fn equal_keys_stay_unique_and_ordered() {
        let mut buf = SortBuffer::new(100, 300);
        for _ in 0..100 {
            buf.push(Route::Sorted, sort_key(3, 500.0), prim(0), &tri())
                .unwrap();
        }
        buf.sort_poly_list();
        assert_descending(&buf);
        let mut seq: Vec<u64> = buf.entries().iter().map(|e| e.key & 0xFFFF).collect();
        seq.dedup();
        assert_eq!(seq.len(), 100);
    }

    #[test]
    fn random_keys_at_capacity_sort_back_to_front() {
        let cap = 16_000;
        let mut buf = SortBuffer::new(cap, cap * 3);
        let mut x = 0x9E37_79B9u32;
        for _ in 0..cap {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            let bucket = (x % 7) as u16;
            let depth = (x >> 8) as f32 / 64.0;
            buf.push(Route::Sorted, sort_key(bucket, depth), prim(0), &tri())
                .unwrap();
        }
        assert_eq!(
            buf.push(Route::Sorted, 0, prim(0), &tri()),
            Err(SortError::Full(cap))
        );
        buf.sort_poly_list();
        assert_eq!(buf.entries().len(), cap);
        assert_descending(&buf);
    }

    #[test]
    fn bucket_outranks_depth() {
        assert!(sort_key(1, 0.0) > sort_key(0, 19_000.0));
        assert!(sort_key(0, 200.0) > sort_key(0, 100.0));
    }

    #[test]
    fn vertex_arena_overflow_is_reported() {
        let mut buf = SortBuffer::new(10, 4);
        buf.push(Route::Sorted, 0, prim(0), &tri()).unwrap();
        assert_eq!(
            buf.push(Route::Sorted, 0, prim(0), &tri()),
            Err(SortError::VerticesFull(4))
        );
    }

    #[test]
    fn immediate_draws_first_in_submission_order() {
        let mut buf = SortBuffer::new(10, 30);
        buf.push(Route::Sorted, sort_key(0, 10.0), prim(1), &tri())
            .unwrap();
        buf.push(Route::Immediate, 0, prim(2), &tri()).unwrap();
        buf.push(Route::Sorted, sort_key(0, 90.0), prim(3), &tri())
            .unwrap();
        buf.push(Route::Immediate, 0, prim(4), &tri()).unwrap();
        buf.sort_poly_list();

        let mut rec = Recorder::default();
        buf.print_poly_list(&mut rec, &TextureBank::default());
        let colors: Vec<u8> = rec.calls().iter().map(|c| c.prim.color).collect();
        assert_eq!(colors, vec![2, 4, 3, 1]);

        buf.init_poly_list();
        assert!(buf.is_empty());
        assert_eq!(buf.immediate_count(), 0);
    }
}
