//! Portal traversal and the per-frame draw order.
//!
//! ```text
//! camera room ──door──▶ room A ──door──▶ room C
//!      │                  ▲
//!      └──────door──▶ room B
//! ```
//!
//! Rooms are discovered breadth first. Each door that faces the eye is
//! projected to a screen rectangle and clipped to the bound of the room it
//! was seen from; the neighbour's bound is the union over every path that
//! reaches it. Drawing then follows a fixed order: skybox, player, every
//! listed room's geometry, then every listed room's items and effects.

use glam::Vec3;
use log::debug;

use super::{
    context::{RenderContext, RenderError},
    insert::SortType,
    light::SHADE_MID,
    vertex::ClipFlags,
};
use crate::world::{BoundState, Door, DrawRoutine, RoomFlags, RoomId, Scene, ScreenRect};

/// Capacity of the traversal queue.
pub const MAX_BOUND_ROOMS: usize = 128;

/// Fixed-size ring of rooms waiting for portal expansion.
#[derive(Clone, Debug)]
pub(crate) struct BoundQueue {
    slots: [RoomId; MAX_BOUND_ROOMS],
    start: usize,
    len: usize,
}

impl Default for BoundQueue {
    fn default() -> Self {
        Self {
            slots: [0; MAX_BOUND_ROOMS],
            start: 0,
            len: 0,
        }
    }
}

impl BoundQueue {
    /// `false` when full.
    pub fn push(&mut self, room: RoomId) -> bool {
        if self.len == MAX_BOUND_ROOMS {
            return false;
        }
        self.slots[(self.start + self.len) % MAX_BOUND_ROOMS] = room;
        self.len += 1;
        true
    }

    pub fn pop(&mut self) -> Option<RoomId> {
        if self.len == 0 {
            return None;
        }
        let room = self.slots[self.start];
        self.start = (self.start + 1) % MAX_BOUND_ROOMS;
        self.len -= 1;
        Some(room)
    }

    pub fn clear(&mut self) {
        self.start = 0;
        self.len = 0;
    }
}

#[derive(Default)]
pub(crate) struct Traversal {
    pub queue: BoundQueue,
    /// Rooms in discovery order; the index is the room's sort bucket.
    pub draw_list: Vec<RoomId>,
}

impl RenderContext {
    /// Rooms reached this frame, camera room first.
    pub fn draw_list(&self) -> &[RoomId] {
        &self.traversal.draw_list
    }

    /// Walk the portals from `camera_room`, then submit everything visible.
    pub fn draw_rooms(&mut self, scene: &mut Scene, camera_room: RoomId) -> Result<(), RenderError> {
        scene.reset_room_bounds();
        self.traversal.queue.clear();
        self.traversal.draw_list.clear();

        let viewport = self.viewport;
        let start = scene
            .rooms
            .get_mut(camera_room as usize)
            .ok_or(RenderError::MissingRoom(camera_room))?;
        start.bound = viewport;
        start.bound_state = BoundState::LISTED | BoundState::PENDING;
        start.sort_bucket = 0;
        let outside = start.flags.contains(RoomFlags::OUTSIDE);
        self.traversal.draw_list.push(camera_room);
        self.traversal.queue.push(camera_room);

        while let Some(id) = self.traversal.queue.pop() {
            scene.rooms[id as usize].bound_state.remove(BoundState::PENDING);
            self.get_room_bounds(scene, id)?;
        }
        self.stats.rooms = self.traversal.draw_list.len();

        {
            let shared: &Scene = scene;
            if outside {
                self.guarded("skybox", 0, |ctx| ctx.draw_skybox(shared));
            }
            if let Some(lara) = shared.lara {
                self.guarded("lara", lara as usize, |ctx| ctx.draw_lara(shared, lara));
            }
        }

        let list = std::mem::take(&mut self.traversal.draw_list);
        for &id in &list {
            self.print_rooms(scene, id);
            scene.rooms[id as usize].bound_state.insert(BoundState::DRAWN);
        }
        for &id in &list {
            self.print_objects(scene, id);
        }
        self.traversal.draw_list = list;
        Ok(())
    }

    /// Test every door of `id` against the eye and expand the neighbours
    /// it can see through.
    pub fn get_room_bounds(&mut self, scene: &mut Scene, id: RoomId) -> Result<(), RenderError> {
        let Some(room) = scene.rooms.get(id as usize) else {
            return Err(RenderError::MissingRoom(id));
        };
        let (pos, parent) = (room.pos, room.bound);
        let eye = self.stack.eye();

        self.stack.push()?;
        self.stack.translate_abs(pos);
        for d in 0..scene.rooms[id as usize].doors.len() {
            let door = scene.rooms[id as usize].doors[d];
            let to_door = pos + door.corners[0].as_ivec3() - eye;
            if door.normal.as_ivec3().as_i64vec3().dot(to_door.as_i64vec3()) >= 0 {
                continue;
            }
            self.set_room_bounds(scene, &door, parent);
        }
        self.stack.pop()?;
        Ok(())
    }

    /// Project `door` with the current top matrix and grow the bound of the
    /// room behind it, clipped to `parent`.
    pub fn set_room_bounds(&mut self, scene: &mut Scene, door: &Door, parent: ScreenRect) {
        let Some(rect) = self.door_rect(door) else {
            return;
        };
        let bound = rect.intersect(&parent);
        if bound.is_empty() {
            return;
        }

        let bucket = self.traversal.draw_list.len() as u16;
        let Some(room) = scene.rooms.get_mut(door.room as usize) else {
            return;
        };
        let enqueue = if !room.bound_state.contains(BoundState::LISTED) {
            room.bound = bound;
            room.bound_state.insert(BoundState::LISTED);
            room.sort_bucket = bucket;
            self.traversal.draw_list.push(door.room);
            true
        } else {
            let grown = room.bound.union(&bound);
            if grown == room.bound {
                return;
            }
            room.bound = grown;
            !room.bound_state.contains(BoundState::PENDING)
        };
        if enqueue {
            if self.traversal.queue.push(door.room) {
                room.bound_state.insert(BoundState::PENDING);
            } else {
                debug!("bound queue full, room {} not expanded", door.room);
            }
        }
    }

    /// Screen rectangle of a door, `None` when it is entirely behind the
    /// eye or beyond the far distance.
    fn door_rect(&self, door: &Door) -> Option<ScreenRect> {
        let m = self.stack.top();
        let p = &self.proj;
        let vp = self.viewport;

        let views: [Vec3; 4] = door.corners.map(|c| m.transform_f32(c.as_ivec3()));
        let (mut left, mut top) = (f32::MAX, f32::MAX);
        let (mut right, mut bottom) = (f32::MIN, f32::MIN);
        let (mut behind, mut too_far) = (0, 0);
        for v in &views {
            if v.z <= 0.0 {
                behind += 1;
                continue;
            }
            if v.z > p.far {
                too_far += 1;
            }
            let persp = p.focal / v.z;
            let (xs, ys) = (p.cx + v.x * persp, p.cy + v.y * persp);
            left = left.min(xs);
            right = right.max(xs);
            top = top.min(ys);
            bottom = bottom.max(ys);
        }
        if behind == 4 || too_far == 4 {
            return None;
        }

        // an edge crossing the eye plane can reach any screen edge on its side
        if behind > 0 {
            for i in 0..4 {
                let (a, b) = (views[i], views[(i + 1) % 4]);
                if (a.z <= 0.0) == (b.z <= 0.0) {
                    continue;
                }
                if a.x < 0.0 && b.x < 0.0 {
                    left = vp.left as f32;
                } else if a.x > 0.0 && b.x > 0.0 {
                    right = vp.right as f32;
                } else {
                    left = vp.left as f32;
                    right = vp.right as f32;
                }
                if a.y < 0.0 && b.y < 0.0 {
                    top = vp.top as f32;
                } else if a.y > 0.0 && b.y > 0.0 {
                    bottom = vp.bottom as f32;
                } else {
                    top = vp.top as f32;
                    bottom = vp.bottom as f32;
                }
            }
        }

        let clamp = |v: f32, lo: i32, hi: i32| v.clamp(lo as f32, hi as f32) as i32;
        Some(ScreenRect::new(
            clamp(left.floor(), vp.left, vp.right),
            clamp(top.floor(), vp.top, vp.bottom),
            clamp(right.ceil(), vp.left, vp.right),
            clamp(bottom.ceil(), vp.top, vp.bottom),
        ))
    }

    /*──────────────────────── room drawing ─────────────────────────*/

    /// Room polygons, room sprites and static meshes of one listed room.
    pub fn print_rooms(&mut self, scene: &Scene, id: RoomId) {
        self.guarded("room", id as usize, |ctx| ctx.print_room_geometry(scene, id));
        self.window = self.viewport;
    }

    fn print_room_geometry(&mut self, scene: &Scene, id: RoomId) -> Result<(), RenderError> {
        let room = scene.room(id).ok_or(RenderError::MissingRoom(id))?;
        self.window = room.bound;
        self.light.set_underwater(room.is_underwater());
        self.sort_type = SortType::Far;

        self.stack.push()?;
        self.stack.translate_abs(room.pos);
        let mid = self.calc_room_vertices(room)?;
        // near geometry shares the camera room's bucket
        self.bucket = if mid { 0 } else { room.sort_bucket };

        self.insert_textured_faces(&room.quads, &scene.object_textures);
        self.insert_textured_faces(&room.tris, &scene.object_textures);
        for s in &room.sprites {
            let (Some(v), Some(tex)) = (
                self.vbuf.get(s.vertex as usize).copied(),
                scene.sprite_textures.get(s.texture as usize),
            ) else {
                continue;
            };
            if v.clip.contains(ClipFlags::NEAR) {
                continue;
            }
            // vertex shade already includes fog
            let shade = v.shade as i32 - self.light.fog(v.z);
            self.insert_sprite(v.view(), tex, shade as i16, false);
        }
        self.stack.pop()?;

        self.bucket = room.sort_bucket;
        self.sort_type = SortType::Mid;
        for st in &room.statics {
            self.draw_static(scene, st)?;
        }
        Ok(())
    }

    /// Items and effects standing in one listed room.
    pub fn print_objects(&mut self, scene: &Scene, id: RoomId) {
        let Some(room) = scene.room(id) else {
            return;
        };
        self.window = room.bound;
        self.bucket = room.sort_bucket;
        self.sort_type = SortType::Mid;
        self.light.set_underwater(room.is_underwater());

        for &item_id in &room.items {
            if Some(item_id) == scene.lara {
                continue;
            }
            let Some(item) = scene.items.get(item_id as usize) else {
                continue;
            };
            if !item.visible {
                continue;
            }
            let routine = scene.object(item.object).map(|o| o.draw);
            match routine {
                Some(DrawRoutine::Animating) => {
                    self.guarded("item", item_id as usize, |ctx| {
                        ctx.draw_animating_item(scene, item)
                    });
                }
                Some(DrawRoutine::Lara) | Some(DrawRoutine::Hidden) => {}
                None => debug!("item {item_id} has unknown object {}", item.object),
            }
        }
        for &fx_id in &room.effects {
            if let Some(fx) = scene.effects.get(fx_id as usize) {
                self.guarded("effect", fx_id as usize, |ctx| ctx.draw_effect(scene, fx));
            }
        }
        self.window = self.viewport;
    }

    /// Sky mesh around the eye, behind everything and unfogged.
    fn draw_skybox(&mut self, scene: &Scene) -> Result<(), RenderError> {
        let Some(id) = scene.skybox else {
            return Ok(());
        };
        let obj = scene.object(id).ok_or(RenderError::MissingObject(id))?;
        let Some(&mesh) = obj.meshes.first() else {
            return Ok(());
        };

        self.sort_type = SortType::Back;
        self.light.set_fog_enabled(false);
        self.light.set_fixed_shade(SHADE_MID as i16);
        let base = *self.stack.base();
        let result = self
            .stack
            .push_matrix(base)
            .map_err(RenderError::from)
            .and_then(|_| self.draw_mesh(scene, mesh));
        if result.is_ok() {
            self.stack.pop()?;
        }
        self.light.set_fog_enabled(true);
        self.sort_type = SortType::Mid;
        result
    }
}
