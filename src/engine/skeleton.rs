//! Skeletal items.
//!
//! A pose is built by walking the bone list with the matrix stack. When an
//! item sits between two keyframes every stack operation is mirrored onto a
//! second stack that follows the next keyframe, and each mesh is drawn
//! with the blend of both tops. A pose on an exact keyframe runs the same
//! walk with the mirror switched off.

use glam::IVec3;

use super::context::{RenderContext, RenderError};
use crate::{
    math::{Angle, Matrix, MatrixStack},
    world::{AnimFrame, AnimPose, BoneFlags, BoneRotation, Item, ItemId, Object, Scene},
};

/// Mirror stack plus the stored bones of the last player pose.
pub(crate) struct PoseStacks {
    pub next: MatrixStack,
    interpolated: bool,
    frac: i32,
    rate: i32,
    /// Item-relative bone matrices from the last [`RenderContext::draw_lara`].
    bones: Vec<Matrix>,
    origin: IVec3,
}

impl PoseStacks {
    pub fn new(far: i32) -> Self {
        Self {
            next: MatrixStack::new(far),
            interpolated: false,
            frac: 0,
            rate: 0,
            bones: Vec::new(),
            origin: IVec3::ZERO,
        }
    }

    /// Drop the mirror; stored bones stay readable.
    pub fn reset(&mut self) {
        self.interpolated = false;
    }
}

/// Keyframes the walk reads: current and, when blending, the next one.
struct FramePair<'a> {
    cur: &'a AnimFrame,
    next: &'a AnimFrame,
}

impl RenderContext {
    /*──────────────────────── mirrored stack ops ───────────────────*/

    fn begin_pose(&mut self, anim: &AnimPose) {
        self.pose.interpolated = anim.is_interpolated();
        self.pose.frac = anim.frac;
        self.pose.rate = anim.rate;
        if self.pose.interpolated {
            self.pose.next.mirror(&self.stack);
        }
    }

    fn pose_push(&mut self) -> Result<(), RenderError> {
        self.stack.push()?;
        if self.pose.interpolated {
            self.pose.next.push()?;
        }
        Ok(())
    }

    fn pose_push_unit(&mut self) -> Result<(), RenderError> {
        self.stack.push_unit()?;
        if self.pose.interpolated {
            self.pose.next.push_unit()?;
        }
        Ok(())
    }

    fn pose_pop(&mut self) -> Result<(), RenderError> {
        self.stack.pop()?;
        if self.pose.interpolated {
            self.pose.next.pop()?;
        }
        Ok(())
    }

    fn pose_truncate(&mut self, depth: usize) {
        self.stack.truncate(depth);
        if self.pose.interpolated {
            self.pose.next.truncate(depth);
        }
    }

    fn pose_translate_abs(&mut self, p: IVec3) {
        self.stack.translate_abs(p);
        if self.pose.interpolated {
            self.pose.next.translate_abs(p);
        }
    }

    /// `true` when the joint is beyond the far distance in both keyframes.
    fn pose_translate_rel(&mut self, cur: IVec3, next: IVec3) -> bool {
        let beyond = self.stack.translate_rel(cur);
        if self.pose.interpolated {
            let next_beyond = self.pose.next.translate_rel(next);
            return beyond && next_beyond;
        }
        beyond
    }

    fn pose_rotate_yxz(&mut self, y: Angle, x: Angle, z: Angle) {
        self.stack.rotate_yxz(y, x, z);
        if self.pose.interpolated {
            self.pose.next.rotate_yxz(y, x, z);
        }
    }

    fn pose_rotate_with(&mut self, f: impl Fn(&mut Matrix)) {
        f(self.stack.top_mut());
        if self.pose.interpolated {
            f(self.pose.next.top_mut());
        }
    }

    fn pose_keyframe_rotation(&mut self, cur: Option<BoneRotation>, next: Option<BoneRotation>) {
        if let Some(r) = cur {
            r.apply(self.stack.top_mut());
        }
        if self.pose.interpolated {
            if let Some(r) = next {
                r.apply(self.pose.next.top_mut());
            }
        }
    }

    /// Current joint matrix, blended toward the next keyframe.
    fn pose_top(&self) -> Matrix {
        if self.pose.interpolated {
            self.stack
                .top()
                .lerp(self.pose.next.top(), self.pose.frac, self.pose.rate)
        } else {
            *self.stack.top()
        }
    }

    /*──────────────────────── bone walk ────────────────────────────*/

    /// Apply the root and every bone of `obj`, calling
    /// `visit(ctx, mesh, beyond_far)` once per mesh index with the joint on
    /// top of the stack(s). `beyond_far` is the hint from that joint's
    /// translation; the stacks stay balanced whatever `visit` does.
    fn walk_skeleton<F>(
        &mut self,
        obj: &Object,
        frames: &FramePair<'_>,
        item: &Item,
        mut visit: F,
    ) -> Result<(), RenderError>
    where
        F: FnMut(&mut Self, usize, bool) -> Result<(), RenderError>,
    {
        let rotation = |f: &AnimFrame, i: usize| f.rotations.get(i).copied();

        let beyond = self.pose_translate_rel(frames.cur.offset, frames.next.offset);
        self.pose_keyframe_rotation(rotation(frames.cur, 0), rotation(frames.next, 0));
        visit(self, 0, beyond)?;

        let mut extra = item.extra_rotation.iter().copied();
        for (i, bone) in obj.bones.iter().enumerate().take(obj.meshes.len().saturating_sub(1)) {
            let mesh = i + 1;
            if bone.flags.contains(BoneFlags::POP) {
                self.pose_pop()?;
            }
            if bone.flags.contains(BoneFlags::PUSH) {
                self.pose_push()?;
            }
            let beyond = self.pose_translate_rel(bone.offset, bone.offset);
            self.pose_keyframe_rotation(rotation(frames.cur, mesh), rotation(frames.next, mesh));

            if bone.flags.contains(BoneFlags::ROT_Y) {
                let a = extra.next().unwrap_or(0);
                self.pose_rotate_with(|m| m.rotate_y(a));
            }
            if bone.flags.contains(BoneFlags::ROT_X) {
                let a = extra.next().unwrap_or(0);
                self.pose_rotate_with(|m| m.rotate_x(a));
            }
            if bone.flags.contains(BoneFlags::ROT_Z) {
                let a = extra.next().unwrap_or(0);
                self.pose_rotate_with(|m| m.rotate_z(a));
            }
            visit(self, mesh, beyond)?;
        }
        Ok(())
    }

    fn frames<'a>(&self, obj: &'a Object, item: &Item) -> Result<FramePair<'a>, RenderError> {
        let missing = |frame| RenderError::MissingFrame {
            object: item.object,
            frame,
        };
        let cur = obj
            .frames
            .get(item.anim.frame)
            .ok_or_else(|| missing(item.anim.frame))?;
        let next = if item.anim.is_interpolated() {
            obj.frames
                .get(item.anim.next)
                .ok_or_else(|| missing(item.anim.next))?
        } else {
            cur
        };
        Ok(FramePair { cur, next })
    }

    fn light_item(&mut self, scene: &Scene, item: &Item) {
        match (item.shade, scene.room(item.room)) {
            (Some(shade), _) => self.light.set_fixed_shade(shade),
            (None, Some(room)) => self.light.calculate_light(item.pos, room),
            (None, None) => self.light.set_fixed_shade(super::light::SHADE_MID as i16),
        }
    }

    /*──────────────────────── items ────────────────────────────────*/

    /// Draw a regular skeletal item with its blob shadow.
    pub fn draw_animating_item(&mut self, scene: &Scene, item: &Item) -> Result<(), RenderError> {
        let obj = scene
            .object(item.object)
            .ok_or(RenderError::MissingObject(item.object))?;
        let frames = self.frames(obj, item)?;

        if obj.shadow_size > 0 {
            self.stack.push()?;
            self.stack.translate_abs(item.pos);
            self.stack.rotate_y(item.rot[1]);
            self.insert_shadow(obj.shadow_size, &frames.cur.bounds)?;
            self.stack.pop()?;
        }

        let depth = self.stack.depth();
        self.stack.push()?;
        self.stack.translate_abs(item.pos);
        self.stack.rotate_yxz(item.rot[1], item.rot[0], item.rot[2]);
        if !self.object_on_screen(&frames.cur.bounds) {
            self.stack.truncate(depth);
            return Ok(());
        }
        self.stack.pop()?;

        self.stats.objects += 1;
        self.light_item(scene, item);
        self.begin_pose(&item.anim);
        self.pose_push()?;
        self.pose_translate_abs(item.pos);
        self.pose_rotate_yxz(item.rot[1], item.rot[0], item.rot[2]);

        let result = self.walk_skeleton(obj, &frames, item, |ctx, mesh, beyond_far| {
            if beyond_far || item.mesh_bits & (1 << (mesh & 31)) == 0 {
                return Ok(());
            }
            let Some(&id) = obj.meshes.get(mesh) else {
                return Ok(());
            };
            ctx.draw_pose_mesh(scene, id)
        });
        self.pose_truncate(depth);
        self.pose.reset();
        result
    }

    fn draw_pose_mesh(&mut self, scene: &Scene, id: u16) -> Result<(), RenderError> {
        if !self.pose.interpolated {
            return self.draw_mesh(scene, id);
        }
        let blended = self.pose_top();
        self.stack.push_matrix(blended)?;
        let result = self.draw_mesh(scene, id);
        self.stack.pop()?;
        result
    }

    /// Two passes: store every bone's blended matrix relative to the item,
    /// then draw each mesh from its stored bone. Uses the full viewport.
    pub fn draw_lara(&mut self, scene: &Scene, id: ItemId) -> Result<(), RenderError> {
        let item = scene
            .items
            .get(id as usize)
            .ok_or(RenderError::MissingItem(id))?;
        if !item.visible {
            return Ok(());
        }
        let obj = scene
            .object(item.object)
            .ok_or(RenderError::MissingObject(item.object))?;
        let frames = self.frames(obj, item)?;

        self.window = self.viewport;
        self.bucket = 0;
        self.sort_type = super::insert::SortType::Mid;
        if let Some(room) = scene.room(item.room) {
            self.light.set_underwater(room.is_underwater());
        }

        // pose pass
        let depth = self.stack.depth();
        let mut bones = std::mem::take(&mut self.pose.bones);
        bones.clear();
        self.begin_pose(&item.anim);
        self.pose_push_unit()?;
        self.pose_rotate_yxz(item.rot[1], item.rot[0], item.rot[2]);
        // joints here are item-relative, so the far hint means nothing
        let walked = self.walk_skeleton(obj, &frames, item, |ctx, _, _| {
            bones.push(ctx.pose_top());
            Ok(())
        });
        self.pose_truncate(depth);
        self.pose.reset();
        self.pose.bones = bones;
        self.pose.origin = item.pos;
        walked?;

        if obj.shadow_size > 0 {
            self.stack.push()?;
            self.stack.translate_abs(item.pos);
            self.stack.rotate_y(item.rot[1]);
            self.insert_shadow(obj.shadow_size, &frames.cur.bounds)?;
            self.stack.pop()?;
        }

        // mesh pass
        self.stats.objects += 1;
        self.light_item(scene, item);
        self.stack.push()?;
        self.stack.translate_abs(item.pos);
        let base = *self.stack.top();
        for i in 0..self.pose.bones.len() {
            if item.mesh_bits & (1 << (i & 31)) == 0 {
                continue;
            }
            let Some(&mesh) = obj.meshes.get(i) else {
                continue;
            };
            let m = base.multiply(&self.pose.bones[i]);
            self.stack.push_matrix(m)?;
            self.draw_mesh(scene, mesh)?;
            self.stack.pop()?;
        }
        self.stack.pop()?;
        Ok(())
    }

    /// Bone `i` of the last player pose, relative to the player position
    /// and in world orientation.
    pub fn bone_matrix(&self, i: usize) -> Option<&Matrix> {
        self.pose.bones.get(i)
    }

    /// World position of joint `i` of the last player pose.
    pub fn joint_position(&self, i: usize) -> Option<IVec3> {
        self.pose
            .bones
            .get(i)
            .map(|m| self.pose.origin + m.translation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::RenderConfig,
        engine::camera::Camera,
        math::ANGLE_90,
        world::{Bone, BoundingBox, Mesh, MeshShading, Quad, Room},
    };
    use glam::I16Vec3;

    fn frame(offset: IVec3, root: BoneRotation) -> AnimFrame {
        AnimFrame {
            bounds: BoundingBox {
                min: I16Vec3::new(-100, -400, -100),
                max: I16Vec3::new(100, 0, 100),
            },
            offset,
            rotations: vec![root, BoneRotation::X(0), BoneRotation::X(0)],
        }
    }

    /// Torso with two limbs: one pushed off the torso, one popped back to it.
    fn figure(scene: &mut Scene, draw: crate::world::DrawRoutine) -> u16 {
        let cube = Mesh {
            vertices: vec![I16Vec3::new(-10, -10, 0), I16Vec3::new(10, 10, 0)],
            shading: MeshShading::Lights(vec![0x1000, 0x1000]),
            tex_quads: vec![],
            tex_tris: vec![],
            col_quads: vec![],
            col_tris: vec![],
        };
        scene.meshes.push(cube);
        scene.objects.push(Object {
            meshes: vec![0, 0, 0],
            bones: vec![
                Bone {
                    flags: BoneFlags::PUSH,
                    offset: IVec3::new(100, 0, 0),
                },
                Bone {
                    flags: BoneFlags::POP | BoneFlags::ROT_Y,
                    offset: IVec3::new(-100, 0, 0),
                },
            ],
            frames: vec![
                frame(IVec3::new(0, -200, 0), BoneRotation::Y(0)),
                frame(IVec3::new(0, -300, 0), BoneRotation::Y(ANGLE_90)),
            ],
            draw,
            shadow_size: 0,
        });
        scene.rooms.push(Room::default());
        (scene.objects.len() - 1) as u16
    }

    fn ctx() -> RenderContext {
        let mut ctx = RenderContext::new(RenderConfig::default());
        ctx.begin_frame(&Camera::new(IVec3::ZERO, 0, 0, 0));
        ctx
    }

    #[test]
    fn lara_bones_follow_the_hierarchy() {
        let mut scene = Scene::default();
        let obj = figure(&mut scene, crate::world::DrawRoutine::Lara);
        let mut item = Item::new(obj, 0, IVec3::new(0, 0, 2000));
        item.extra_rotation = vec![ANGLE_90];
        let id = scene.add_item(item);

        let mut ctx = ctx();
        let depth = ctx.stack().depth();
        ctx.draw_lara(&scene, id).unwrap();
        assert_eq!(ctx.stack().depth(), depth);

        assert_eq!(ctx.joint_position(0), Some(IVec3::new(0, -200, 2000)));
        assert_eq!(ctx.joint_position(1), Some(IVec3::new(100, -200, 2000)));
        // popped back to the torso before moving
        assert_eq!(ctx.joint_position(2), Some(IVec3::new(-100, -200, 2000)));
        assert_eq!(ctx.bone_matrix(3), None);
        // extra Y rotation only turns the last limb
        assert_eq!(ctx.bone_matrix(1).unwrap().m[0][0], crate::math::W2V_SCALE);
        assert_eq!(ctx.bone_matrix(2).unwrap().m[0][0], 0);
    }

    #[test]
    fn interpolated_pose_blends_the_root() {
        let mut scene = Scene::default();
        let obj = figure(&mut scene, crate::world::DrawRoutine::Lara);
        let mut item = Item::new(obj, 0, IVec3::ZERO);
        item.anim = AnimPose {
            frame: 0,
            next: 1,
            frac: 1,
            rate: 2,
        };
        let id = scene.add_item(item);

        let mut ctx = ctx();
        ctx.draw_lara(&scene, id).unwrap();
        assert_eq!(ctx.joint_position(0).unwrap().y, -250);
        let root = ctx.bone_matrix(0).unwrap();
        // entries blend linearly, so a quarter turn halves the diagonal
        assert!((root.m[0][0] - 8192).abs() <= 1, "{root:?}");
        assert!((root.m[2][2] - 8192).abs() <= 1, "{root:?}");
    }

    #[test]
    fn joint_beyond_far_is_skipped() {
        let mut scene = Scene::default();
        let obj = figure(&mut scene, crate::world::DrawRoutine::Animating);
        let panel = Mesh {
            vertices: vec![
                I16Vec3::new(-50, -50, 0),
                I16Vec3::new(50, -50, 0),
                I16Vec3::new(50, 50, 0),
                I16Vec3::new(-50, 50, 0),
            ],
            shading: MeshShading::Lights(vec![0x1000; 4]),
            tex_quads: vec![],
            tex_tris: vec![],
            col_quads: vec![Quad::new([0, 1, 2, 3], 4)],
            col_tris: vec![],
        };
        scene.meshes[0] = panel;
        let far = RenderConfig::default().far;
        scene.objects[obj as usize].bones[1].offset = IVec3::new(0, 0, far + 1000);
        let item = Item::new(obj, 0, IVec3::new(0, 0, 2000));

        let mut ctx = ctx();
        let depth = ctx.stack().depth();
        ctx.draw_animating_item(&scene, &item).unwrap();
        assert_eq!(ctx.stack().depth(), depth);
        // torso and first limb only; the far limb never reaches the vertex pass
        assert_eq!(ctx.stats().meshes, 2);
        assert_eq!(ctx.stats().culled, 0);
        assert_eq!(ctx.sort_buffer().len(), 2);
    }

    #[test]
    fn missing_frame_is_reported_and_stack_is_restored() {
        let mut scene = Scene::default();
        let obj = figure(&mut scene, crate::world::DrawRoutine::Animating);
        let mut item = Item::new(obj, 0, IVec3::new(0, 0, 2000));
        item.anim.frame = 9;
        let mut ctx = ctx();
        let depth = ctx.stack().depth();
        assert!(matches!(
            ctx.draw_animating_item(&scene, &item),
            Err(RenderError::MissingFrame { frame: 9, .. })
        ));
        assert_eq!(ctx.stack().depth(), depth);
    }

    #[test]
    fn animating_item_restores_the_stack() {
        let mut scene = Scene::default();
        let obj = figure(&mut scene, crate::world::DrawRoutine::Animating);
        let mut item = Item::new(obj, 0, IVec3::new(0, 0, 2000));
        item.anim = AnimPose {
            frame: 0,
            next: 1,
            frac: 1,
            rate: 4,
        };
        let mut ctx = ctx();
        let depth = ctx.stack().depth();
        ctx.draw_animating_item(&scene, &item).unwrap();
        assert_eq!(ctx.stack().depth(), depth);
        assert_eq!(ctx.stats().objects, 1);
        assert_eq!(ctx.stats().meshes, 3);
    }
}
