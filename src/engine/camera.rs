use glam::IVec3;

use crate::{
    math::{Angle, Matrix, trig},
    world::RoomId,
};

/// Eye position and orientation in world space.
///
/// * `+Y` points down, `+Z` is yaw 0, `+X` is yaw `0x4000`.
/// * Positive pitch looks up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Camera {
    pub pos: IVec3,
    /// Room containing `pos`; traversal starts there.
    pub room: RoomId,
    pub pitch: Angle,
    pub yaw: Angle,
    pub roll: Angle,
}

impl Camera {
    pub fn new(pos: IVec3, room: RoomId, yaw: Angle, pitch: Angle) -> Self {
        Self {
            pos,
            room,
            pitch,
            yaw,
            roll: 0,
        }
    }

    /// Camera at `eye` aimed at `target`.
    pub fn looking_at(eye: IVec3, room: RoomId, target: IVec3, roll: Angle) -> Self {
        let d = target - eye;
        let (yaw, pitch) = vector_angles(d.x, d.y, d.z);
        Self {
            pos: eye,
            room,
            pitch,
            yaw,
            roll,
        }
    }

    /*──────────────────────── derived vectors ───────────────────────*/

    /// View direction, `W2V_SCALE` long.
    pub fn forward(&self) -> IVec3 {
        let cp = trig::cos(self.pitch);
        IVec3::new(
            trig::trig_mul2(cp, trig::sin(self.yaw)),
            -trig::sin(self.pitch),
            trig::trig_mul2(cp, trig::cos(self.yaw)),
        )
    }

    /*──────────────────────── movement helpers ──────────────────────*/

    /// Move `forward` units along the heading and `side` units to the right,
    /// keeping the height.
    pub fn step(&mut self, forward: i32, side: i32) {
        let (s, c) = (trig::sin(self.yaw), trig::cos(self.yaw));
        self.pos.x += trig::trig_mul2(s, forward) + trig::trig_mul2(c, side);
        self.pos.z += trig::trig_mul2(c, forward) - trig::trig_mul2(s, side);
    }

    /// Positive turns right.
    pub fn turn(&mut self, delta: i16) {
        self.yaw = self.yaw.wrapping_add_signed(delta);
    }
}

/// Heading and elevation of the direction `(dx, dy, dz)`.
///
/// Components are shifted down in pairs of bits until all fit in `i16`, so
/// arbitrarily distant targets keep their direction.
pub fn vector_angles(mut dx: i32, mut dy: i32, mut dz: i32) -> (Angle, Angle) {
    let yaw = trig::atan(dz, dx);
    let fits = |v: i32| v >= i16::MIN as i32 && v <= i16::MAX as i32;
    while !(fits(dx) && fits(dy) && fits(dz)) {
        dx >>= 2;
        dy >>= 2;
        dz >>= 2;
    }
    let h = trig::sqrt(dx as i64 * dx as i64 + dz as i64 * dz as i64);
    let mut pitch = trig::atan(h, dy);
    if dy != 0 && i32::from((pitch as i16).signum()) == dy.signum() {
        pitch = pitch.wrapping_neg();
    }
    (yaw, pitch)
}

/// Build the world-to-view rotation for `pos` and Euler angles
/// (`rx` pitch, `ry` yaw, `rz` roll). Row 1 carries `aspect`.
///
/// Translation stays zero: the stack positions everything relative to the
/// eye through [`MatrixStack::translate_abs`].
///
/// [`MatrixStack::translate_abs`]: crate::math::MatrixStack::translate_abs
pub fn generate_w2v(rx: Angle, ry: Angle, rz: Angle, aspect: f32) -> Matrix {
    let (sx, cx) = (trig::sin(rx), trig::cos(rx));
    let (sy, cy) = (trig::sin(ry), trig::cos(ry));
    let (sz, cz) = (trig::sin(rz), trig::cos(rz));
    let mul2 = trig::trig_mul2;
    let mul3 = trig::trig_mul3;

    let mut m = Matrix::IDENTITY;
    m.m[0][0] = mul3(sx, sy, sz) + mul2(cy, cz);
    m.m[0][1] = mul2(cx, sz);
    m.m[0][2] = mul3(sx, cy, sz) - mul2(sy, cz);
    m.m[1][0] = mul3(sx, sy, cz) - mul2(cy, sz);
    m.m[1][1] = mul2(cx, cz);
    m.m[1][2] = mul3(sx, cy, cz) + mul2(sy, sz);
    m.m[2][0] = mul2(cx, sy);
    m.m[2][1] = -sx;
    m.m[2][2] = mul2(cx, cy);
    for row in &mut m.m {
        row[3] = 0;
    }
    if aspect != 1.0 {
        m.scale_row(1, aspect);
    }
    m
}
