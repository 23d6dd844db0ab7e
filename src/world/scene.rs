use super::{
    ItemId, ObjectId, RoomId,
    mesh::{Mesh, MeshId},
    object::{Effect, Item, Object, ObjectTexture, SpriteTexture, StaticObject},
    room::Room,
    texture::TextureBank,
};

/// Everything the renderer reads for one level.
///
/// The engine mutates only the per-frame bound fields of [`Room`].
#[derive(Default)]
pub struct Scene {
    pub rooms: Vec<Room>,
    pub meshes: Vec<Mesh>,
    /// Indexed by [`ObjectId`].
    pub objects: Vec<Object>,
    /// Indexed by `StaticMesh::static_id`.
    pub statics: Vec<StaticObject>,
    pub items: Vec<Item>,
    pub effects: Vec<Effect>,
    pub object_textures: Vec<ObjectTexture>,
    pub sprite_textures: Vec<SpriteTexture>,
    pub textures: TextureBank,
    /// Drawn behind everything when the camera room is outside.
    pub skybox: Option<ObjectId>,
    pub lara: Option<ItemId>,
}

impl Scene {
    #[inline]
    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id as usize)
    }

    #[inline]
    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id as usize)
    }

    #[inline]
    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(id as usize)
    }

    /// Put `item` in the room's item list and the scene; returns its id.
    pub fn add_item(&mut self, item: Item) -> ItemId {
        let id = self.items.len() as ItemId;
        if let Some(room) = self.rooms.get_mut(item.room as usize) {
            room.items.push(id);
        }
        self.items.push(item);
        id
    }

    pub fn add_effect(&mut self, effect: Effect) -> u16 {
        let id = self.effects.len() as u16;
        if let Some(room) = self.rooms.get_mut(effect.room as usize) {
            room.effects.push(id);
        }
        self.effects.push(effect);
        id
    }

    pub fn reset_room_bounds(&mut self) {
        for room in &mut self.rooms {
            room.reset_bounds();
        }
    }
}
