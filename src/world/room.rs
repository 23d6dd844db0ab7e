use bitflags::bitflags;
use glam::{I16Vec3, IVec3};

use super::{
    ItemId, RoomId,
    mesh::{Quad, Tri},
    object::EffectId,
};
use crate::math::Angle;

bitflags! {
    #[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
    pub struct RoomFlags: u16 {
        const UNDERWATER = 0x0001;
        /// Sky is visible from inside the room.
        const OUTSIDE    = 0x0008;
    }
}

bitflags! {
    #[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
    pub struct RoomVertexFlags: u8 {
        /// Never displaced by the water wibble (surface seams).
        const NO_WIBBLE = 0x01;
        /// Shade follows the water ripple table.
        const RIPPLE    = 0x02;
    }
}

bitflags! {
    /// Per-frame traversal state of a room.
    #[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BoundState: u8 {
        /// In the frame's draw list.
        const LISTED  = 0x01;
        /// Queued for portal expansion.
        const PENDING = 0x02;
        /// Geometry submitted.
        const DRAWN   = 0x04;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoomVertex {
    /// Relative to the room origin.
    pub pos: I16Vec3,
    /// Base shade (`0..=0x1FFF`, larger is darker).
    pub light: i16,
    /// Row of the flicker tables; 0 never flickers.
    pub table: u8,
    pub flags: RoomVertexFlags,
}

/// Portal into a neighbouring room.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Door {
    pub room: RoomId,
    /// Points into the room that owns the door.
    pub normal: I16Vec3,
    /// Relative to the owning room's origin.
    pub corners: [I16Vec3; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoomSprite {
    pub vertex: u16,
    pub texture: u16,
}

/// Scenery placed in a room (furniture, rocks, plants).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaticMesh {
    pub pos: IVec3,
    pub rot_y: Angle,
    /// Pre-baked shade for the whole mesh.
    pub shade: i16,
    pub static_id: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightKind {
    Point,
    /// Directional; `dir` points from the light toward the scene.
    Sun { dir: IVec3 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoomLight {
    pub pos: IVec3,
    pub intensity: i16,
    pub falloff: i32,
    pub kind: LightKind,
    /// Scaled by the global flicker wobble.
    pub flicker: bool,
}

/// Screen rectangle in pixel edges; the full viewport is `(0, 0, width, height)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScreenRect {
    /// Inverted rectangle; any union with it yields the other operand.
    pub const EMPTY: ScreenRect = ScreenRect {
        left: i32::MAX,
        top: i32::MAX,
        right: i32::MIN,
        bottom: i32::MIN,
    };

    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    pub fn intersect(&self, o: &ScreenRect) -> ScreenRect {
        ScreenRect {
            left: self.left.max(o.left),
            top: self.top.max(o.top),
            right: self.right.min(o.right),
            bottom: self.bottom.min(o.bottom),
        }
    }

    pub fn union(&self, o: &ScreenRect) -> ScreenRect {
        ScreenRect {
            left: self.left.min(o.left),
            top: self.top.min(o.top),
            right: self.right.max(o.right),
            bottom: self.bottom.max(o.bottom),
        }
    }

    pub fn contains(&self, o: &ScreenRect) -> bool {
        self.left <= o.left && self.top <= o.top && self.right >= o.right && self.bottom >= o.bottom
    }
}

#[derive(Clone, Debug, Default)]
pub struct Room {
    /// World position of the room origin.
    pub pos: IVec3,
    pub vertices: Vec<RoomVertex>,
    pub quads: Vec<Quad>,
    pub tris: Vec<Tri>,
    pub sprites: Vec<RoomSprite>,
    pub doors: Vec<Door>,
    pub statics: Vec<StaticMesh>,
    pub lights: Vec<RoomLight>,
    /// Base darkness for movable objects.
    pub ambient: i16,
    pub flags: RoomFlags,
    pub items: Vec<ItemId>,
    pub effects: Vec<EffectId>,

    /* per-frame scratch, reset by traversal */
    pub bound: ScreenRect,
    pub bound_state: BoundState,
    /// Painter's bucket: 0 is the camera room, larger is drawn earlier.
    pub sort_bucket: u16,
}

impl Default for ScreenRect {
    fn default() -> Self {
        ScreenRect::EMPTY
    }
}

impl Room {
    pub fn reset_bounds(&mut self) {
        self.bound = ScreenRect::EMPTY;
        self.bound_state = BoundState::empty();
        self.sort_bucket = 0;
    }

    #[inline]
    pub fn is_underwater(&self) -> bool {
        self.flags.contains(RoomFlags::UNDERWATER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_rect_is_union_identity() {
        let r = ScreenRect::new(10, 20, 30, 40);
        assert_eq!(ScreenRect::EMPTY.union(&r), r);
        assert!(ScreenRect::EMPTY.is_empty());
    }

    #[test]
    fn intersection_only_shrinks() {
        let a = ScreenRect::new(0, 0, 100, 100);
        let b = ScreenRect::new(50, -10, 150, 60);
        let c = a.intersect(&b);
        assert_eq!(c, ScreenRect::new(50, 0, 100, 60));
        assert!(a.contains(&c) && b.contains(&c));
    }
}
