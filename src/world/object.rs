use glam::{IVec3, Vec2};

use super::{
    RoomId,
    anim::{AnimFrame, Bone, BoundingBox},
    mesh::MeshId,
};
use crate::math::Angle;

pub type ObjectId = u16;
pub type ItemId = u16;
pub type EffectId = u16;

/// Which traversal routine draws an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DrawRoutine {
    #[default]
    Animating,
    /// Player skeleton: pose pass then mesh pass, full-screen window.
    Lara,
    /// Never drawn (triggers, cameras).
    Hidden,
}

/// Shared model data for every item of one type.
#[derive(Clone, Debug, Default)]
pub struct Object {
    pub meshes: Vec<MeshId>,
    /// `meshes.len() - 1` links; bone `i` leads to mesh `i + 1`.
    pub bones: Vec<Bone>,
    pub frames: Vec<AnimFrame>,
    pub draw: DrawRoutine,
    /// Half-width of the blob shadow; 0 disables it.
    pub shadow_size: i32,
}

/// Playback position between two keyframes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnimPose {
    pub frame: usize,
    pub next: usize,
    /// `0..rate`; 0 means the current frame exactly.
    pub frac: i32,
    pub rate: i32,
}

impl AnimPose {
    #[inline]
    pub fn is_interpolated(&self) -> bool {
        self.frac > 0 && self.rate > 0 && self.frame != self.next
    }
}

#[derive(Clone, Debug)]
pub struct Item {
    pub object: ObjectId,
    pub room: RoomId,
    pub pos: IVec3,
    /// `(x, y, z)` orientation, applied Y then X then Z.
    pub rot: [Angle; 3],
    pub anim: AnimPose,
    /// Fixed shade overriding room lighting.
    pub shade: Option<i16>,
    /// Bit `i` set: mesh `i` is drawn.
    pub mesh_bits: u32,
    /// Extra joint rotations consumed by bones flagged `ROT_*`, in Y, X, Z
    /// order per bone.
    pub extra_rotation: Vec<Angle>,
    pub visible: bool,
}

impl Item {
    pub fn new(object: ObjectId, room: RoomId, pos: IVec3) -> Self {
        Self {
            object,
            room,
            pos,
            rot: [0; 3],
            anim: AnimPose::default(),
            shade: None,
            mesh_bits: u32::MAX,
            extra_rotation: Vec::new(),
            visible: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectDraw {
    Sprite {
        sprite: u16,
        shade: i16,
        translucent: bool,
    },
    Mesh(MeshId),
}

/// Short-lived particle or flying debris.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Effect {
    pub pos: IVec3,
    pub room: RoomId,
    pub rot: [Angle; 3],
    pub draw: EffectDraw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaticObject {
    pub mesh: MeshId,
    pub visibility: BoundingBox,
}

/// How a texture's texels combine with the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DrawType {
    #[default]
    Opaque,
    /// Texel value 0 is a hole.
    ColorKey,
    /// Blended; always drawn through the sorted list.
    Translucent,
}

/// Texture mapping for one face: page plus per-corner texel coords.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjectTexture {
    pub tpage: u16,
    pub draw: DrawType,
    /// Corner 3 is unused by triangles.
    pub uv: [Vec2; 4],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpriteTexture {
    pub tpage: u16,
    /// Texel rectangle on the page.
    pub uv0: Vec2,
    pub uv1: Vec2,
    /// World-space extents around the anchor: left, top, right, bottom.
    pub extents: [i16; 4],
}
