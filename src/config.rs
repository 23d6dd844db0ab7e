//! Per-renderer tuning knobs.
//!
//! Everything here is fixed for the lifetime of a [`RenderContext`]
//! (changing the viewport means building a new context).
//!
//! [`RenderContext`]: crate::engine::RenderContext

/// How deferred primitives are keyed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Room bucket in the high bits, depth below it.
    #[default]
    RoomThenDepth,
    /// Depth only; rooms interleave freely.
    DepthOnly,
}

/// Where opaque primitives go.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DrawMode {
    /// Painter's algorithm: everything is sorted back to front.
    #[default]
    Sorted,
    /// Backend owns a depth buffer: opaque primitives are drawn in
    /// submission order, translucent ones are still sorted.
    ZBuffered,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Shading {
    #[default]
    Gouraud,
    /// One shade per polygon (vertex average).
    Flat,
}

/// Linear depth cue range in view-space units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FogRange {
    pub begin: i32,
    pub end: i32,
}

#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub width: usize,
    pub height: usize,
    /// Horizontal field of view in 16-bit angle units.
    pub fov: u16,
    pub near: i32,
    pub far: i32,
    pub fog: FogRange,
    pub water_fog: FogRange,
    /// Textured polygons whose average depth is below this use the affine
    /// encoding; farther ones carry perspective-correct coordinates.
    pub perspective_distance: f32,
    /// Rooms with geometry nearer than this share the camera room's bucket.
    pub mid_sort_distance: f32,
    pub sort_mode: SortMode,
    pub draw_mode: DrawMode,
    pub shading: Shading,
    /// Folded into the Y row of the world-to-view matrix.
    pub aspect_correction: f32,
    /// Sort entries per frame.
    pub sort_capacity: usize,
    /// Screen vertices per frame across all primitives.
    pub vertex_capacity: usize,
    /// Vertices of the largest single mesh or room.
    pub vbuf_capacity: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fov: 80 * 182,
            near: 20,
            far: 20 * 1024,
            fog: FogRange {
                begin: 12 * 1024,
                end: 20 * 1024,
            },
            water_fog: FogRange {
                begin: 4 * 1024,
                end: 12 * 1024,
            },
            perspective_distance: 4096.0,
            mid_sort_distance: 512.0,
            sort_mode: SortMode::RoomThenDepth,
            draw_mode: DrawMode::Sorted,
            shading: Shading::Gouraud,
            aspect_correction: 1.0,
            sort_capacity: 16_000,
            vertex_capacity: 16_000 * 6,
            vbuf_capacity: 1500,
        }
    }
}

impl RenderConfig {
    /// Pixels per view-space unit at depth 1 (`half_width / tan(fov/2)`).
    pub fn focal_length(&self) -> f32 {
        let half_fov = self.fov as f32 * std::f32::consts::PI / 65536.0;
        (self.width as f32 * 0.5) / half_fov.tan()
    }
}
