//! Skeleton hierarchy and keyframe decoding.

use bitflags::bitflags;
use glam::{I16Vec3, IVec3};

use crate::math::{Angle, Matrix};

bitflags! {
    /// Per-bone stack instructions, applied before the bone's offset.
    #[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BoneFlags: u32 {
        /// Return to the parent joint.
        const POP   = 0x01;
        /// Start a new limb; the parent joint is kept underneath.
        const PUSH  = 0x02;
        /// Consume an extra X / Y / Z rotation from the item.
        const ROT_X = 0x04;
        const ROT_Y = 0x08;
        const ROT_Z = 0x10;
    }
}

/// Link from the previous mesh to the next one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bone {
    pub flags: BoneFlags,
    pub offset: IVec3,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AnimError {
    #[error("bone array length {0} is not a multiple of 4")]
    RaggedBones(usize),

    #[error("keyframe truncated at word {0}")]
    Truncated(usize),
}

impl Bone {
    /// Decode `(flags, dx, dy, dz)` groups.
    pub fn decode_tree(words: &[i32]) -> Result<Vec<Bone>, AnimError> {
        if words.len() % 4 != 0 {
            return Err(AnimError::RaggedBones(words.len()));
        }
        Ok(words
            .chunks_exact(4)
            .map(|c| Bone {
                flags: BoneFlags::from_bits_truncate(c[0] as u32),
                offset: IVec3::new(c[1], c[2], c[3]),
            })
            .collect())
    }
}

/// Axis-aligned box in object space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub min: I16Vec3,
    pub max: I16Vec3,
}

impl BoundingBox {
    /// From the stored `[min_x, max_x, min_y, max_y, min_z, max_z]` order.
    pub fn from_words(w: [i16; 6]) -> Self {
        Self {
            min: I16Vec3::new(w[0], w[2], w[4]),
            max: I16Vec3::new(w[1], w[3], w[5]),
        }
    }

    pub fn corners(&self) -> [IVec3; 8] {
        let (lo, hi) = (self.min.as_ivec3(), self.max.as_ivec3());
        std::array::from_fn(|i| {
            IVec3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            )
        })
    }
}

/// One joint rotation from the keyframe stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoneRotation {
    /// Two-word form: 10-bit X / Y / Z fields.
    Yxz(u32),
    X(Angle),
    Y(Angle),
    Z(Angle),
}

impl BoneRotation {
    pub fn apply(self, m: &mut Matrix) {
        match self {
            BoneRotation::Yxz(packed) => m.rotate_yxz_packed(packed),
            BoneRotation::X(a) => m.rotate_x(a),
            BoneRotation::Y(a) => m.rotate_y(a),
            BoneRotation::Z(a) => m.rotate_z(a),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimFrame {
    pub bounds: BoundingBox,
    /// Root translation.
    pub offset: IVec3,
    /// One entry per mesh.
    pub rotations: Vec<BoneRotation>,
}

impl AnimFrame {
    /// Decode a keyframe with `n_meshes` rotations. Returns the frame and the
    /// number of words consumed so frames can be read back to back.
    pub fn decode(words: &[i16], n_meshes: usize) -> Result<(Self, usize), AnimError> {
        let mut pos = 0;
        let mut next = || -> Result<u16, AnimError> {
            let w = *words.get(pos).ok_or(AnimError::Truncated(pos))?;
            pos += 1;
            Ok(w as u16)
        };

        let mut b = [0i16; 6];
        for v in &mut b {
            *v = next()? as i16;
        }
        let offset = IVec3::new(
            next()? as i16 as i32,
            next()? as i16 as i32,
            next()? as i16 as i32,
        );

        let mut rotations = Vec::with_capacity(n_meshes);
        for _ in 0..n_meshes {
            let w0 = next()?;
            let angle = ((w0 & 0x3FF) << 6) as Angle;
            rotations.push(match w0 >> 14 {
                0 => BoneRotation::Yxz(((w0 as u32) << 16) | next()? as u32),
                1 => BoneRotation::X(angle),
                2 => BoneRotation::Y(angle),
                _ => BoneRotation::Z(angle),
            });
        }

        let frame = AnimFrame {
            bounds: BoundingBox::from_words(b),
            offset,
            rotations,
        };
        Ok((frame, pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bone_groups_decode() {
        let bones = Bone::decode_tree(&[2, 0, -100, 0, 1 | 8, 50, 0, 0]).unwrap();
        assert_eq!(bones.len(), 2);
        assert_eq!(bones[0].flags, BoneFlags::PUSH);
        assert_eq!(bones[1].flags, BoneFlags::POP | BoneFlags::ROT_Y);
        assert_eq!(bones[1].offset, IVec3::new(50, 0, 0));
        assert_eq!(
            Bone::decode_tree(&[0, 1, 2]).unwrap_err(),
            AnimError::RaggedBones(3)
        );
    }

    #[test]
    fn rotation_stream_mixes_full_and_single_axis() {
        let packed: u32 = (1 << 20) | (2 << 10) | 3;
        let words: Vec<i16> = vec![
            -10, 10, -20, 20, -30, 30, // bounds
            5, 6, 7, // offset
            (packed >> 16) as i16,
            packed as u16 as i16,
            (0x4000 | 0x100) as i16, // X
            (0x8000u16 | 0x001) as i16, // Y
            (0xC000u16 | 0x3FF) as i16, // Z
        ];
        let (frame, used) = AnimFrame::decode(&words, 4).unwrap();
        assert_eq!(used, words.len());
        assert_eq!(frame.offset, IVec3::new(5, 6, 7));
        assert_eq!(frame.bounds.min, I16Vec3::new(-10, -20, -30));
        assert_eq!(
            frame.rotations,
            vec![
                BoneRotation::Yxz(packed),
                BoneRotation::X(0x100 << 6),
                BoneRotation::Y(1 << 6),
                BoneRotation::Z(0x3FF << 6),
            ]
        );
    }

    #[test]
    fn short_keyframe_is_an_error() {
        let words = [0i16; 8];
        assert_eq!(
            AnimFrame::decode(&words, 1).unwrap_err(),
            AnimError::Truncated(8)
        );
    }
}
