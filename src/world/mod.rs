pub mod anim;
pub mod demo;
pub mod mesh;
pub mod object;
pub mod room;
pub mod scene;
pub mod texture;

pub type RoomId = u16;

pub use anim::{AnimError, AnimFrame, Bone, BoneFlags, BoneRotation, BoundingBox};
pub use mesh::{DOUBLE_SIDED, Face, Mesh, MeshError, MeshId, MeshShading, Quad, Tri};
pub use object::{
    AnimPose, DrawRoutine, DrawType, Effect, EffectDraw, EffectId, Item, ItemId, Object,
    ObjectId, ObjectTexture, SpriteTexture, StaticObject,
};
pub use room::{
    BoundState, Door, LightKind, Room, RoomFlags, RoomLight, RoomSprite, RoomVertex,
    RoomVertexFlags, ScreenRect, StaticMesh,
};
pub use scene::Scene;
pub use texture::{
    COLOR_KEY, NO_TEXTURE, PAGE_SIZE, Palette, TextureBank, TextureError, TextureId, TexturePage,
};
