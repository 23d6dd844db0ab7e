//! Fixed-point transform, clip, light and depth-sort pipeline for a
//! room/portal renderer, with software, device-batch and recording
//! back-ends.

pub mod config;
pub mod engine;
pub mod math;
pub mod renderer;
pub mod world;
