use glam::IVec3;

use super::{
    matrix::Matrix,
    trig::{Angle, W2V_SHIFT},
};

/// Deepest bone chain plus room / item nesting fits comfortably.
pub const MAX_MATRICES: usize = 40;

/// Misuse of the stack. Both variants are caller bugs; they are reported
/// instead of corrupting neighbouring state.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MatrixError {
    #[error("matrix stack overflow (capacity {0})")]
    Overflow(usize),

    #[error("matrix stack underflow: pop past the world-to-view base")]
    Underflow,
}

/// Array-backed stack of [`Matrix`]. Entry 0 is the world-to-view base.
#[derive(Clone, Debug)]
pub struct MatrixStack {
    entries: Vec<Matrix>,
    /// Camera position in world space; `translate_abs` works relative to it.
    eye: IVec3,
    /// Far distance pre-shifted into translation units.
    far_shifted: i64,
}

impl Default for MatrixStack {
    fn default() -> Self {
        Self::new(i32::MAX >> W2V_SHIFT)
    }
}

impl MatrixStack {
    pub fn new(far: i32) -> Self {
        let mut entries = Vec::with_capacity(MAX_MATRICES);
        entries.push(Matrix::IDENTITY);
        Self {
            entries,
            eye: IVec3::ZERO,
            far_shifted: (far as i64) << W2V_SHIFT,
        }
    }

    /// Drop everything and install a new base.
    pub fn reset(&mut self, base: Matrix, eye: IVec3) {
        self.entries.clear();
        self.entries.push(base);
        self.eye = eye;
    }

    /// Copy depth, contents and eye from `other` without reallocating.
    pub fn mirror(&mut self, other: &MatrixStack) {
        self.entries.clear();
        self.entries.extend_from_slice(&other.entries);
        self.eye = other.eye;
        self.far_shifted = other.far_shifted;
    }

    #[inline]
    pub fn eye(&self) -> IVec3 {
        self.eye
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn base(&self) -> &Matrix {
        &self.entries[0]
    }

    #[inline]
    pub fn top(&self) -> &Matrix {
        // never empty: the base is only replaced, not popped
        &self.entries[self.entries.len() - 1]
    }

    #[inline]
    pub fn top_mut(&mut self) -> &mut Matrix {
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }

    /*──────────────────────── push / pop ───────────────────────────*/

    pub fn push(&mut self) -> Result<(), MatrixError> {
        self.push_matrix(*self.top())
    }

    /// Push a `W2V_SCALE` identity with zero translation.
    pub fn push_unit(&mut self) -> Result<(), MatrixError> {
        self.push_matrix(Matrix::IDENTITY)
    }

    pub fn push_matrix(&mut self, m: Matrix) -> Result<(), MatrixError> {
        if self.entries.len() >= MAX_MATRICES {
            return Err(MatrixError::Overflow(MAX_MATRICES));
        }
        self.entries.push(m);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<(), MatrixError> {
        if self.entries.len() <= 1 {
            return Err(MatrixError::Underflow);
        }
        self.entries.pop();
        Ok(())
    }

    /// Unwind to `depth` after an aborted traversal branch.
    pub fn truncate(&mut self, depth: usize) {
        self.entries.truncate(depth.max(1));
    }

    /*─────────────────────── transforms ────────────────────────────*/

    /// Offset along the current orientation. Returns `true` when the
    /// resulting position lies beyond the far distance on any axis.
    pub fn translate_rel(&mut self, d: IVec3) -> bool {
        let far = self.far_shifted;
        let top = self.top_mut();
        top.translate_rel(d);
        top.m.iter().any(|row| (row[3] as i64).abs() > far)
    }

    /// Place the top matrix at world point `p`, keeping its orientation.
    pub fn translate_abs(&mut self, p: IVec3) {
        let d = (p - self.eye).as_i64vec3();
        let top = self.top_mut();
        for row in &mut top.m {
            row[3] = (row[0] as i64 * d.x + row[1] as i64 * d.y + row[2] as i64 * d.z) as i32;
        }
    }

    #[inline]
    pub fn rotate_x(&mut self, a: Angle) {
        self.top_mut().rotate_x(a);
    }

    #[inline]
    pub fn rotate_y(&mut self, a: Angle) {
        self.top_mut().rotate_y(a);
    }

    #[inline]
    pub fn rotate_z(&mut self, a: Angle) {
        self.top_mut().rotate_z(a);
    }

    #[inline]
    pub fn rotate_yxz(&mut self, y: Angle, x: Angle, z: Angle) {
        self.top_mut().rotate_yxz(y, x, z);
    }

    #[inline]
    pub fn rotate_yxz_packed(&mut self, packed: u32) {
        self.top_mut().rotate_yxz_packed(packed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::W2V_SCALE;

    #[test]
    fn push_pop_restores_top_bitwise() {
        let mut st = MatrixStack::new(20_000);
        st.rotate_yxz(0x1234, 0x0F00, 0x00AA);
        st.translate_rel(IVec3::new(10, -20, 300));
        let before = *st.top();

        st.push().unwrap();
        st.rotate_x(0x4000);
        st.translate_rel(IVec3::new(5000, 0, 0));
        st.pop().unwrap();

        assert_eq!(*st.top(), before);
    }

    #[test]
    fn push_unit_is_scaled_identity() {
        let mut st = MatrixStack::new(20_000);
        st.rotate_y(0x2000);
        st.push_unit().unwrap();
        assert_eq!(*st.top(), Matrix::IDENTITY);
        assert_eq!(st.top().m[1][1], W2V_SCALE);
    }

    #[test]
    fn overflow_and_underflow_are_errors() {
        let mut st = MatrixStack::new(20_000);
        assert_eq!(st.pop(), Err(MatrixError::Underflow));
        for _ in 1..MAX_MATRICES {
            st.push().unwrap();
        }
        assert_eq!(st.push(), Err(MatrixError::Overflow(MAX_MATRICES)));
        assert_eq!(st.depth(), MAX_MATRICES);
    }

    #[test]
    fn translate_rel_reports_far() {
        let mut st = MatrixStack::new(1000);
        assert!(!st.translate_rel(IVec3::new(0, 0, 999)));
        assert!(st.translate_rel(IVec3::new(0, 0, 2)));
    }

    #[test]
    fn translate_abs_is_relative_to_eye() {
        let mut st = MatrixStack::new(20_000);
        st.reset(Matrix::IDENTITY, IVec3::new(1000, 0, 1000));
        st.translate_abs(IVec3::new(1500, -100, 3000));
        assert_eq!(st.top().translation(), IVec3::new(500, -100, 2000));
    }
}
