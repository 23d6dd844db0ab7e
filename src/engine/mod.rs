//! The frame pipeline: room traversal, transform, clip, light and sort.
//!
//! Everything hangs off [`RenderContext`]; a frame is
//! `begin_frame` → `draw_rooms` → `end_frame`, or [`RenderContext::render_frame`].

pub mod camera;
pub mod clip;
mod context;
pub mod insert;
pub mod light;
mod objects;
pub mod rooms;
mod skeleton;
pub mod sort;
pub mod vertex;

pub use camera::Camera;
pub use context::{FrameStats, RenderContext, RenderError};
pub use insert::{SortType, clip_line};
pub use light::{DynamicLight, LightEngine, SHADE_MAX, SHADE_MID};
pub use rooms::MAX_BOUND_ROOMS;
pub use sort::{Route, SortBuffer, SortError};
pub use vertex::{ClipFlags, PhdVbuf, Projection};
