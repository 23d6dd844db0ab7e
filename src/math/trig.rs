//! Table-driven sine / cosine / arctangent over the 16-bit angle domain.
//!
//! The tables are built once on first use; after that every lookup is a
//! single indexed load, the same cost as the ROM tables of the era.

use once_cell::sync::Lazy;

/// Fixed-point shift of rotation entries and trig results.
pub const W2V_SHIFT: u32 = 14;
/// `1.0` in rotation / trig units.
pub const W2V_SCALE: i32 = 1 << W2V_SHIFT;

/// 16-bit angle, `0x10000` = 360°.
pub type Angle = u16;

pub const ANGLE_90: Angle = 0x4000;
pub const ANGLE_180: Angle = 0x8000;
pub const ANGLE_270: Angle = 0xC000;

/// Sine entries per full turn; the low four angle bits are dropped.
const SIN_TABLE_SIZE: usize = 4096;
/// Entries covering `atan(0..=1)`.
const ATAN_TABLE_SIZE: usize = 2048;

/// Start angle of every octant; negative entries are folded back with `abs`.
const OCTANT_BASE: [i32; 8] = [0, -0x4000, -0xFFFF, 0xC000, -0x8000, 0x4000, 0x8000, -0xC000];

static SIN_TABLE: Lazy<[i32; SIN_TABLE_SIZE]> = Lazy::new(|| {
    let mut table = [0; SIN_TABLE_SIZE];
    for (i, entry) in table.iter_mut().enumerate() {
        let rad = i as f64 * std::f64::consts::TAU / SIN_TABLE_SIZE as f64;
        *entry = (rad.sin() * W2V_SCALE as f64).round() as i32;
    }
    table
});

static ATAN_TABLE: Lazy<[i32; ATAN_TABLE_SIZE + 1]> = Lazy::new(|| {
    let mut table = [0; ATAN_TABLE_SIZE + 1];
    for (i, entry) in table.iter_mut().enumerate() {
        let rad = (i as f64 / ATAN_TABLE_SIZE as f64).atan();
        *entry = (rad * ANGLE_180 as f64 / std::f64::consts::PI).round() as i32;
    }
    table
});

/// Sine of `a`, scaled by [`W2V_SCALE`].
#[inline]
pub fn sin(a: Angle) -> i32 {
    SIN_TABLE[(a >> 4) as usize]
}

/// Cosine of `a`, scaled by [`W2V_SCALE`].
#[inline]
pub fn cos(a: Angle) -> i32 {
    sin(a.wrapping_add(ANGLE_90))
}

/// Angle of the vector whose *forward* component is `x` and *side*
/// component is `y`.
///
/// `atan(dz, dx)` is therefore the heading of a world-space direction:
/// `+Z` → `0`, `+X` → `0x4000`.
pub fn atan(x: i32, y: i32) -> Angle {
    if x == 0 && y == 0 {
        return 0;
    }

    let (mut x, mut y) = (x as i64, y as i64);
    let mut octant = 0;
    if x < 0 {
        octant += 4;
        x = -x;
    }
    if y < 0 {
        octant += 2;
        y = -y;
    }
    if y > x {
        octant += 1;
        std::mem::swap(&mut x, &mut y);
    }
    while y > i16::MAX as i64 {
        y >>= 1;
        x >>= 1;
    }

    let idx = ((y << 11) / x) as usize;
    (OCTANT_BASE[octant] + ATAN_TABLE[idx]).unsigned_abs() as Angle
}

/// Integer square root, negative input clamps to zero.
#[inline]
pub fn sqrt(n: i64) -> i32 {
    (n.max(0) as u64).isqrt() as i32
}

/// `(a * b) >> W2V_SHIFT` without intermediate overflow.
#[inline]
pub fn trig_mul2(a: i32, b: i32) -> i32 {
    ((a as i64 * b as i64) >> W2V_SHIFT) as i32
}

/// `trig_mul2(trig_mul2(a, b), c)`.
#[inline]
pub fn trig_mul3(a: i32, b: i32, c: i32) -> i32 {
    trig_mul2(trig_mul2(a, b), c)
}
