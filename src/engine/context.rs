//! The frame render context.
//!
//! One [`RenderContext`] owns every piece of scratch state the pipeline
//! touches: matrix stacks, vertex buffer, clip buffers, light state and the
//! sort buffer. All of it is sized once in [`RenderContext::new`] and reset,
//! never reallocated, at the start of each frame.

use log::{debug, warn};

use super::{
    camera::{Camera, generate_w2v},
    clip::ClipScratch,
    insert::SortType,
    light::LightEngine,
    rooms::Traversal,
    skeleton::PoseStacks,
    sort::{Route, SortBuffer, SortError, sort_key},
    vertex::{PhdVbuf, Projection},
};
use crate::{
    config::{DrawMode, RenderConfig, SortMode},
    math::{Matrix, MatrixError, MatrixStack},
    renderer::{Primitive, Renderer, Rgba, ScreenVertex},
    world::{
        AnimError, ItemId, MeshError, MeshId, ObjectId, RoomId, Scene, ScreenRect, TextureError,
        texture::TextureBank,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error(transparent)]
    Sort(#[from] SortError),

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Anim(#[from] AnimError),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error("{needed} vertices exceed the vertex buffer ({capacity})")]
    VertexOverflow { needed: usize, capacity: usize },

    #[error("room {0} does not exist")]
    MissingRoom(RoomId),

    #[error("object {0} is not defined")]
    MissingObject(ObjectId),

    #[error("item {0} does not exist")]
    MissingItem(ItemId),

    #[error("mesh {0} is not defined")]
    MissingMesh(MeshId),

    #[error("object {object} has no keyframe {frame}")]
    MissingFrame { object: ObjectId, frame: usize },
}

/// Counters for one frame, returned by [`RenderContext::end_frame`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Rooms in the draw list.
    pub rooms: usize,
    /// Items and effects that reached mesh submission.
    pub objects: usize,
    pub meshes: usize,
    /// Primitives stored in the sort buffer.
    pub primitives: usize,
    /// Polygons rejected by outcodes, facing or the divisor guard.
    pub culled: usize,
    /// Primitives lost after the buffers filled up.
    pub dropped: usize,
    pub sorted: usize,
    pub immediate: usize,
}

pub struct RenderContext {
    pub(crate) config: RenderConfig,
    pub(crate) proj: Projection,
    pub(crate) stack: MatrixStack,
    pub(crate) pose: PoseStacks,
    pub(crate) vbuf: Vec<PhdVbuf>,
    /// Room vertex shades before fog.
    pub(crate) shades: Vec<i16>,
    pub(crate) clip: ClipScratch,
    pub(crate) sort: SortBuffer,
    pub(crate) light: LightEngine,
    /// Clip rectangle of whatever is being drawn.
    pub(crate) window: ScreenRect,
    pub(crate) viewport: ScreenRect,
    /// World-to-view rotation of this frame.
    pub(crate) w2v: Matrix,
    /// Sort bucket for everything submitted next.
    pub(crate) bucket: u16,
    pub(crate) sort_type: SortType,
    pub(crate) traversal: Traversal,
    /// Water wibble and ripple phase, advanced per frame.
    pub(crate) wibble: usize,
    pub(crate) stats: FrameStats,
    /// Set on the first buffer overflow of the frame.
    overflowed: bool,
    warned: bool,
}

impl RenderContext {
    pub fn new(config: RenderConfig) -> Self {
        let viewport = ScreenRect::new(0, 0, config.width as i32, config.height as i32);
        Self {
            proj: Projection::new(&config),
            stack: MatrixStack::new(config.far),
            pose: PoseStacks::new(config.far),
            vbuf: Vec::with_capacity(config.vbuf_capacity),
            shades: Vec::with_capacity(config.vbuf_capacity),
            clip: ClipScratch::default(),
            sort: SortBuffer::new(config.sort_capacity, config.vertex_capacity),
            light: LightEngine::new(config.fog, config.water_fog),
            window: viewport,
            viewport,
            w2v: Matrix::IDENTITY,
            bucket: 0,
            sort_type: SortType::Mid,
            traversal: Traversal::default(),
            wibble: 0,
            stats: FrameStats::default(),
            overflowed: false,
            warned: false,
            config,
        }
    }

    /*──────────────────────── accessors ────────────────────────────*/

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn stack(&self) -> &MatrixStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut MatrixStack {
        &mut self.stack
    }

    pub fn light(&self) -> &LightEngine {
        &self.light
    }

    /// Dynamic lights are added here between `begin_frame` and `draw_rooms`.
    pub fn light_mut(&mut self) -> &mut LightEngine {
        &mut self.light
    }

    pub fn w2v(&self) -> &Matrix {
        &self.w2v
    }

    pub fn viewport(&self) -> ScreenRect {
        self.viewport
    }

    pub fn window(&self) -> ScreenRect {
        self.window
    }

    /// Restrict subsequent inserts to `rect` (clamped to the viewport).
    pub fn set_window(&mut self, rect: ScreenRect) {
        self.window = rect.intersect(&self.viewport);
    }

    pub fn sort_buffer(&self) -> &SortBuffer {
        &self.sort
    }

    /// Vertices produced by the last `calc_*_vertices` call.
    pub fn vertices(&self) -> &[PhdVbuf] {
        &self.vbuf
    }

    /*──────────────────────── frame lifecycle ──────────────────────*/

    /// Build the world-to-view matrix for `camera` and reset the stack to it.
    pub fn set_camera(&mut self, camera: &Camera) {
        self.w2v = generate_w2v(
            camera.pitch,
            camera.yaw,
            camera.roll,
            self.config.aspect_correction,
        );
        self.stack.reset(self.w2v, camera.pos);
    }

    pub fn begin_frame(&mut self, camera: &Camera) {
        self.sort.init_poly_list();
        self.stats = FrameStats::default();
        self.overflowed = false;
        self.set_camera(camera);
        self.window = self.viewport;
        self.bucket = 0;
        self.sort_type = SortType::Mid;
        self.wibble = self.wibble.wrapping_add(1);
        self.light.advance();
        self.light.set_underwater(false);
        self.light.set_fog_enabled(true);
    }

    /// Sort, dispatch everything to `renderer` and hand its buffer to
    /// `submit`. Dynamic lights are cleared afterwards.
    pub fn end_frame<R, F>(&mut self, renderer: &mut R, bank: &TextureBank, submit: F) -> FrameStats
    where
        R: Renderer,
        F: FnOnce(&[Rgba], usize, usize),
    {
        self.sort.sort_poly_list();
        self.stats.sorted = self.sort.entries().len();
        self.stats.immediate = self.sort.immediate_count();

        renderer.begin_frame(self.config.width, self.config.height);
        self.sort.print_poly_list(renderer, bank);
        renderer.end_frame(submit);

        self.light.clear_dynamic_lights();
        debug!(
            "frame: {} rooms, {} primitives ({} sorted, {} immediate), {} culled, {} dropped",
            self.stats.rooms,
            self.stats.primitives,
            self.stats.sorted,
            self.stats.immediate,
            self.stats.culled,
            self.stats.dropped,
        );
        self.stats
    }

    /// `begin_frame`, `draw_rooms` and `end_frame` in one call.
    pub fn render_frame<R, F>(
        &mut self,
        scene: &mut Scene,
        camera: &Camera,
        renderer: &mut R,
        submit: F,
    ) -> Result<FrameStats, RenderError>
    where
        R: Renderer,
        F: FnOnce(&[Rgba], usize, usize),
    {
        self.begin_frame(camera);
        self.draw_rooms(scene, camera.room)?;
        Ok(self.end_frame(renderer, &scene.textures, submit))
    }

    /*──────────────────────── submission ───────────────────────────*/

    /// Sort key for a primitive with average depth `mid` and deepest
    /// corner `far`, according to the current sort type and mode.
    pub(crate) fn key_for(&self, mid: f32, far: f32) -> u64 {
        let bucket = match self.config.sort_mode {
            SortMode::RoomThenDepth => self.bucket,
            SortMode::DepthOnly => 0,
        };
        match self.sort_type {
            SortType::Mid => sort_key(bucket, mid),
            SortType::Far => sort_key(bucket, far),
            SortType::Back => sort_key(u16::MAX, f32::MAX),
        }
    }

    /// Store one encoded primitive. Translucent primitives are always
    /// sorted; in Z-buffered mode everything else goes straight through.
    pub(crate) fn submit(
        &mut self,
        translucent: bool,
        key: u64,
        prim: Primitive,
        verts: &[ScreenVertex],
    ) {
        if self.overflowed {
            self.stats.dropped += 1;
            return;
        }
        let route = match self.config.draw_mode {
            DrawMode::ZBuffered if !translucent => Route::Immediate,
            _ => Route::Sorted,
        };
        match self.sort.push(route, key, prim, verts) {
            Ok(()) => self.stats.primitives += 1,
            Err(e) => {
                self.overflowed = true;
                self.stats.dropped += 1;
                if self.warned {
                    debug!("{e}; dropping the rest of the frame");
                } else {
                    warn!("{e}; dropping the rest of the frame");
                    self.warned = true;
                }
            }
        }
    }

    /// Run `f`, and on failure unwind both matrix stacks to where they were
    /// and log; the frame carries on without whatever `f` was drawing.
    pub(crate) fn guarded<F>(&mut self, what: &str, id: usize, f: F)
    where
        F: FnOnce(&mut Self) -> Result<(), RenderError>,
    {
        let depth = self.stack.depth();
        if let Err(e) = f(self) {
            self.stack.truncate(depth);
            self.pose.reset();
            self.window = self.viewport;
            debug!("{what} {id} skipped: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{Blend, PrimKind, Recorder};
    use glam::IVec3;

    fn tri() -> [ScreenVertex; 3] {
        [ScreenVertex::default(); 3]
    }

    fn flat() -> Primitive {
        Primitive::new(PrimKind::Flat, Blend::Opaque, 0, 1)
    }

    #[test]
    fn overflow_drops_the_rest_of_the_frame_only() {
        let cfg = RenderConfig {
            sort_capacity: 2,
            ..RenderConfig::default()
        };
        let mut ctx = RenderContext::new(cfg);
        let cam = Camera::new(IVec3::ZERO, 0, 0, 0);
        ctx.begin_frame(&cam);
        for _ in 0..5 {
            ctx.submit(false, 0, flat(), &tri());
        }
        let mut rec = Recorder::default();
        let stats = ctx.end_frame(&mut rec, &TextureBank::default(), |_, _, _| {});
        assert_eq!(stats.primitives, 2);
        assert_eq!(stats.dropped, 3);
        assert_eq!(rec.calls().len(), 2);

        ctx.begin_frame(&cam);
        ctx.submit(false, 0, flat(), &tri());
        assert_eq!(ctx.stats().primitives, 1);
        assert_eq!(ctx.stats().dropped, 0);
    }

    #[test]
    fn zbuffered_mode_keeps_translucent_sorted() {
        let cfg = RenderConfig {
            draw_mode: DrawMode::ZBuffered,
            ..RenderConfig::default()
        };
        let mut ctx = RenderContext::new(cfg);
        ctx.begin_frame(&Camera::new(IVec3::ZERO, 0, 0, 0));
        ctx.submit(false, 0, flat(), &tri());
        ctx.submit(true, 0, flat(), &tri());
        assert_eq!(ctx.sort_buffer().immediate_count(), 1);
        assert_eq!(ctx.sort_buffer().entries().len(), 1);
    }

    #[test]
    fn depth_only_mode_ignores_the_bucket() {
        let mut ctx = RenderContext::new(RenderConfig::default());
        ctx.bucket = 7;
        assert_eq!(ctx.key_for(100.0, 200.0) >> 48, 7);
        ctx.sort_type = SortType::Far;
        assert_eq!(ctx.key_for(100.0, 200.0), sort_key(7, 200.0));

        let mut ctx = RenderContext::new(RenderConfig {
            sort_mode: SortMode::DepthOnly,
            ..RenderConfig::default()
        });
        ctx.bucket = 7;
        assert_eq!(ctx.key_for(100.0, 200.0) >> 48, 0);
    }

    #[test]
    fn end_frame_hands_over_the_viewport_size_once() {
        let mut ctx = RenderContext::new(RenderConfig::default());
        ctx.begin_frame(&Camera::new(IVec3::ZERO, 0, 0, 0));
        let mut calls = 0;
        let mut rec = Recorder::default();
        ctx.end_frame(&mut rec, &TextureBank::default(), |_, w, h| {
            calls += 1;
            assert_eq!((w, h), (640, 480));
        });
        assert_eq!(calls, 1);
    }
}
