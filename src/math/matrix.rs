use glam::{IVec3, Vec3};

use super::trig::{Angle, W2V_SCALE, W2V_SHIFT, cos, sin};

/// 4x3 affine transform in fixed point.
///
/// Row `r` is `[m[r][0], m[r][1], m[r][2], m[r][3]]`: three rotation/scale
/// entries (unit = [`W2V_SCALE`]) followed by the translation, which is
/// kept pre-multiplied by `W2V_SCALE` so it composes without shifting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Matrix {
    pub m: [[i32; 4]; 3],
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    /// `W2V_SCALE` on the diagonal, zero translation.
    pub const IDENTITY: Matrix = Matrix {
        m: [
            [W2V_SCALE, 0, 0, 0],
            [0, W2V_SCALE, 0, 0],
            [0, 0, W2V_SCALE, 0],
        ],
    };

    /*──────────────────────── rotation ─────────────────────────────*/

    pub fn rotate_x(&mut self, a: Angle) {
        if a == 0 {
            return;
        }
        let (s, c) = (sin(a) as i64, cos(a) as i64);
        for row in &mut self.m {
            let (m1, m2) = (row[1] as i64, row[2] as i64);
            row[1] = ((m1 * c + m2 * s) >> W2V_SHIFT) as i32;
            row[2] = ((m2 * c - m1 * s) >> W2V_SHIFT) as i32;
        }
    }

    pub fn rotate_y(&mut self, a: Angle) {
        if a == 0 {
            return;
        }
        let (s, c) = (sin(a) as i64, cos(a) as i64);
        for row in &mut self.m {
            let (m0, m2) = (row[0] as i64, row[2] as i64);
            row[0] = ((m0 * c - m2 * s) >> W2V_SHIFT) as i32;
            row[2] = ((m2 * c + m0 * s) >> W2V_SHIFT) as i32;
        }
    }

    pub fn rotate_z(&mut self, a: Angle) {
        if a == 0 {
            return;
        }
        let (s, c) = (sin(a) as i64, cos(a) as i64);
        for row in &mut self.m {
            let (m0, m1) = (row[0] as i64, row[1] as i64);
            row[0] = ((m0 * c + m1 * s) >> W2V_SHIFT) as i32;
            row[1] = ((m1 * c - m0 * s) >> W2V_SHIFT) as i32;
        }
    }

    /// Yaw, then pitch, then roll: the order every stored orientation uses.
    pub fn rotate_yxz(&mut self, y: Angle, x: Angle, z: Angle) {
        self.rotate_y(y);
        self.rotate_x(x);
        self.rotate_z(z);
    }

    /// Keyframe rotation: three 10-bit fields, X in bits 20..30, Y in
    /// bits 10..20, Z in bits 0..10, each widened to a full angle.
    pub fn rotate_yxz_packed(&mut self, packed: u32) {
        let (y, x, z) = unpack_yxz(packed);
        self.rotate_yxz(y, x, z);
    }

    /*────────────────────── translation ────────────────────────────*/

    /// Move by `d` along the current orientation.
    pub fn translate_rel(&mut self, d: IVec3) {
        let d = d.as_i64vec3();
        for row in &mut self.m {
            let off = row[0] as i64 * d.x + row[1] as i64 * d.y + row[2] as i64 * d.z;
            row[3] = (row[3] as i64 + off) as i32;
        }
    }

    /// Translation in whole view-space units.
    #[inline]
    pub fn translation(&self) -> IVec3 {
        IVec3::new(
            self.m[0][3] >> W2V_SHIFT,
            self.m[1][3] >> W2V_SHIFT,
            self.m[2][3] >> W2V_SHIFT,
        )
    }

    /*───────────────────── vector products ─────────────────────────*/

    /// Full transform of an integer point, result in whole units.
    #[inline]
    pub fn transform(&self, v: IVec3) -> IVec3 {
        let raw = self.transform_raw(v);
        IVec3::new(
            (raw[0] >> W2V_SHIFT) as i32,
            (raw[1] >> W2V_SHIFT) as i32,
            (raw[2] >> W2V_SHIFT) as i32,
        )
    }

    /// Full transform keeping the fractional bits as a float.
    #[inline]
    pub fn transform_f32(&self, v: IVec3) -> Vec3 {
        let raw = self.transform_raw(v);
        let scale = 1.0 / W2V_SCALE as f32;
        Vec3::new(
            raw[0] as f32 * scale,
            raw[1] as f32 * scale,
            raw[2] as f32 * scale,
        )
    }

    fn transform_raw(&self, v: IVec3) -> [i64; 3] {
        let v = v.as_i64vec3();
        let mut out = [0i64; 3];
        for (o, row) in out.iter_mut().zip(&self.m) {
            *o = row[0] as i64 * v.x + row[1] as i64 * v.y + row[2] as i64 * v.z + row[3] as i64;
        }
        out
    }

    /// Rotation only, `>> W2V_SHIFT`.
    pub fn rotate_vector(&self, v: IVec3) -> IVec3 {
        let v = v.as_i64vec3();
        let mut out = [0i32; 3];
        for (o, row) in out.iter_mut().zip(&self.m) {
            *o = ((row[0] as i64 * v.x + row[1] as i64 * v.y + row[2] as i64 * v.z) >> W2V_SHIFT)
                as i32;
        }
        IVec3::from_array(out)
    }

    /// Inverse rotation (transpose), `>> W2V_SHIFT`. Brings a view-aligned
    /// direction back into the object frame.
    pub fn rotate_vector_transposed(&self, v: IVec3) -> IVec3 {
        let v = v.as_i64vec3();
        let m = &self.m;
        let col = |c: usize| {
            ((m[0][c] as i64 * v.x + m[1][c] as i64 * v.y + m[2][c] as i64 * v.z) >> W2V_SHIFT)
                as i32
        };
        IVec3::new(col(0), col(1), col(2))
    }

    /*──────────────────────── helpers ──────────────────────────────*/

    /// `self · other`: applies `other` first. Translations compose as well.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        let (a, b) = (&self.m, &other.m);
        let mut out = Matrix::IDENTITY;
        for r in 0..3 {
            for c in 0..4 {
                let mut acc: i64 = (0..3).map(|k| a[r][k] as i64 * b[k][c] as i64).sum();
                acc >>= W2V_SHIFT;
                if c == 3 {
                    acc += a[r][3] as i64;
                }
                out.m[r][c] = acc as i32;
            }
        }
        out
    }

    /// Blend toward `target` by `frac / rate`, entry by entry.
    pub fn lerp(&self, target: &Matrix, frac: i32, rate: i32) -> Matrix {
        if rate <= 0 || frac <= 0 {
            return *self;
        }
        if frac >= rate {
            return *target;
        }
        let mut out = *self;
        for (row, trow) in out.m.iter_mut().zip(&target.m) {
            for (e, t) in row.iter_mut().zip(trow) {
                let d = (*t as i64 - *e as i64) * frac as i64 / rate as i64;
                *e = (*e as i64 + d) as i32;
            }
        }
        out
    }

    /// Scale the rotation part of one row (aspect-ratio fold).
    pub fn scale_row(&mut self, row: usize, factor: f32) {
        for e in &mut self.m[row][..3] {
            *e = (*e as f32 * factor).round() as i32;
        }
    }

    /// Squared length of one rotation row.
    pub fn row_length_sq(&self, row: usize) -> i64 {
        self.m[row][..3].iter().map(|&e| e as i64 * e as i64).sum()
    }
}

/// Split a packed YXZ keyframe word into `(y, x, z)` angles.
#[inline]
pub fn unpack_yxz(packed: u32) -> (Angle, Angle, Angle) {
    let y = (((packed >> 10) & 0x3FF) << 6) as Angle;
    let x = (((packed >> 20) & 0x3FF) << 6) as Angle;
    let z = ((packed & 0x3FF) << 6) as Angle;
    (y, x, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{ANGLE_90, ANGLE_180};

    fn assert_orthonormal(m: &Matrix) {
        let want = W2V_SCALE as i64 * W2V_SCALE as i64;
        for row in 0..3 {
            let got = m.row_length_sq(row);
            let err = (got - want).abs();
            // a few truncating multiplies per entry
            assert!(err * 100 < want, "row {row}: {got} vs {want}");
        }
    }

    #[test]
    fn rotations_stay_orthonormal_over_angle_domain() {
        for step in 0..256u32 {
            let a = (step * 0x100) as Angle;
            let mut m = Matrix::IDENTITY;
            m.rotate_x(a);
            m.rotate_y(a.wrapping_mul(3));
            m.rotate_z(a.wrapping_add(0x1234));
            assert_orthonormal(&m);
        }
    }

    #[test]
    fn quarter_turn_y_maps_z_to_x() {
        let mut m = Matrix::IDENTITY;
        m.rotate_y(ANGLE_90);
        let v = m.transform(IVec3::new(0, 0, 1000));
        assert_eq!(v, IVec3::new(1000, 0, 0));
    }

    #[test]
    fn translate_rel_follows_orientation() {
        let mut m = Matrix::IDENTITY;
        m.rotate_y(ANGLE_180);
        m.translate_rel(IVec3::new(0, 0, 512));
        assert_eq!(m.translation(), IVec3::new(0, 0, -512));
    }

    #[test]
    fn packed_fields_unpack_in_yxz_order() {
        let packed = (1 << 20) | (2 << 10) | 3;
        assert_eq!(unpack_yxz(packed), (2 << 6, 1 << 6, 3 << 6));
    }

    #[test]
    fn lerp_endpoints_and_midpoint() {
        let a = Matrix::IDENTITY;
        let mut b = Matrix::IDENTITY;
        b.translate_rel(IVec3::new(100, 0, 0));
        assert_eq!(a.lerp(&b, 0, 2), a);
        assert_eq!(a.lerp(&b, 2, 2), b);
        assert_eq!(a.lerp(&b, 1, 2).translation(), IVec3::new(50, 0, 0));
    }

    #[test]
    fn multiply_matches_sequential_transform() {
        let mut a = Matrix::IDENTITY;
        a.rotate_yxz(0x2000, 0x0400, 0);
        a.translate_rel(IVec3::new(100, 200, 300));
        let mut b = Matrix::IDENTITY;
        b.rotate_x(0x1800);
        b.translate_rel(IVec3::new(-50, 0, 700));

        let p = IVec3::new(123, -456, 789);
        let two_step = a.transform(b.transform(p));
        let fused = a.multiply(&b).transform(p);
        assert!((two_step - fused).abs().max_element() <= 2, "{two_step} {fused}");
        assert_eq!(Matrix::IDENTITY.multiply(&b), b);
    }

    #[test]
    fn transposed_rotation_undoes_rotation() {
        let mut m = Matrix::IDENTITY;
        m.rotate_yxz(0x1000, 0x0800, 0x0200);
        let v = IVec3::new(3000, -2000, 1000);
        let back = m.rotate_vector_transposed(m.rotate_vector(v));
        assert!((back - v).abs().max_element() <= 4);
    }
}
