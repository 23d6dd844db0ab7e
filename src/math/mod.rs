//! Fixed-point maths shared by every pipeline stage.
//!
//! * Angles are 16-bit: `0x10000` units make one full turn.
//! * Rotation entries are scaled by [`W2V_SCALE`]; translations carry an
//!   extra `<< W2V_SHIFT` so sub-unit offsets survive composition.

mod matrix;
mod stack;
pub mod trig;

pub use matrix::Matrix;
pub use stack::{MAX_MATRICES, MatrixError, MatrixStack};
pub use trig::{ANGLE_90, ANGLE_180, ANGLE_270, Angle, W2V_SCALE, W2V_SHIFT};
