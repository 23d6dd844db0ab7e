//! Mesh submission and the per-object draw routines that share it.

use super::{
    context::{RenderContext, RenderError},
    vertex::ClipFlags,
};
use crate::world::{
    BoundingBox, Effect, EffectDraw, MeshId, MeshShading, Scene, StaticMesh,
};

impl RenderContext {
    /// Transform, light and insert every face of `id` under the top matrix.
    pub fn draw_mesh(&mut self, scene: &Scene, id: MeshId) -> Result<(), RenderError> {
        let mesh = scene.mesh(id).ok_or(RenderError::MissingMesh(id))?;
        if !self.calc_object_vertices(&mesh.vertices)? {
            self.stats.culled += 1;
            return Ok(());
        }

        if matches!(mesh.shading, MeshShading::Normals(_)) && self.light.state.divider != 0 {
            let (pitch, yaw) = (self.light.state.pitch, self.light.state.yaw);
            let top = *self.stack.top();
            self.light.rotate_light(pitch, yaw, &self.w2v, &top);
        }
        self.light.calc_vertex_light(&mesh.shading, &mut self.vbuf);

        self.insert_textured_faces(&mesh.tex_quads, &scene.object_textures);
        self.insert_textured_faces(&mesh.tex_tris, &scene.object_textures);
        self.insert_colored_faces(&mesh.col_quads);
        self.insert_colored_faces(&mesh.col_tris);
        self.stats.meshes += 1;
        Ok(())
    }

    /// Whether `bounds`, placed by the top matrix, can touch the window.
    ///
    /// A box straddling the near plane is always considered visible.
    pub fn object_on_screen(&self, bounds: &BoundingBox) -> bool {
        let m = self.stack.top();
        let mut behind = 0;
        let (mut x0, mut y0) = (f32::MAX, f32::MAX);
        let (mut x1, mut y1) = (f32::MIN, f32::MIN);
        for c in bounds.corners() {
            let p = self.proj.project(m.transform_f32(c), &self.window);
            if p.clip.contains(ClipFlags::NEAR) {
                behind += 1;
                continue;
            }
            x0 = x0.min(p.xs);
            y0 = y0.min(p.ys);
            x1 = x1.max(p.xs);
            y1 = y1.max(p.ys);
        }
        match behind {
            8 => false,
            0 => {
                let w = &self.window;
                x1 >= w.left as f32
                    && x0 <= w.right as f32
                    && y1 >= w.top as f32
                    && y0 <= w.bottom as f32
            }
            _ => true,
        }
    }

    /// Room scenery; unknown static ids are skipped.
    pub fn draw_static(&mut self, scene: &Scene, st: &StaticMesh) -> Result<(), RenderError> {
        let Some(def) = scene.statics.get(st.static_id as usize) else {
            return Ok(());
        };
        self.stack.push()?;
        self.stack.translate_abs(st.pos);
        self.stack.rotate_y(st.rot_y);
        let result = if self.object_on_screen(&def.visibility) {
            self.light.calculate_static_light(st.shade, st.pos);
            self.draw_mesh(scene, def.mesh)
        } else {
            Ok(())
        };
        self.stack.pop()?;
        result
    }

    pub fn draw_effect(&mut self, scene: &Scene, fx: &Effect) -> Result<(), RenderError> {
        match fx.draw {
            EffectDraw::Sprite {
                sprite,
                shade,
                translucent,
            } => {
                if let Some(tex) = scene.sprite_textures.get(sprite as usize) {
                    self.draw_sprite(fx.pos, tex, shade, translucent);
                    self.stats.objects += 1;
                }
                Ok(())
            }
            EffectDraw::Mesh(mesh) => {
                self.stack.push()?;
                self.stack.translate_abs(fx.pos);
                self.stack.rotate_yxz(fx.rot[1], fx.rot[0], fx.rot[2]);
                match scene.room(fx.room) {
                    Some(room) => self.light.calculate_light(fx.pos, room),
                    None => self.light.set_fixed_shade(super::light::SHADE_MID as i16),
                }
                let result = self.draw_mesh(scene, mesh);
                self.stack.pop()?;
                self.stats.objects += 1;
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::RenderConfig,
        engine::camera::Camera,
        renderer::PrimKind,
        world::{DrawType, Face, Mesh, ObjectTexture, Room, SpriteTexture, StaticObject},
    };
    use glam::{I16Vec3, IVec3, Vec2};

    /// Square facing the camera, 200 units wide, one textured and one
    /// colored copy.
    fn panel() -> Mesh {
        Mesh {
            vertices: vec![
                I16Vec3::new(-100, -100, 0),
                I16Vec3::new(100, -100, 0),
                I16Vec3::new(100, 100, 0),
                I16Vec3::new(-100, 100, 0),
            ],
            shading: MeshShading::Lights(vec![0x1000; 4]),
            tex_quads: vec![Face::new([0, 1, 2, 3], 0)],
            tex_tris: vec![],
            col_quads: vec![],
            col_tris: vec![Face::new([0, 1, 2], 7)],
        }
    }

    fn scene() -> Scene {
        let mut scene = Scene::default();
        scene.rooms.push(Room::default());
        scene.meshes.push(panel());
        scene.object_textures.push(ObjectTexture {
            tpage: 0,
            draw: DrawType::Opaque,
            uv: [
                Vec2::new(0.0, 0.0),
                Vec2::new(63.0, 0.0),
                Vec2::new(63.0, 63.0),
                Vec2::new(0.0, 63.0),
            ],
        });
        scene.sprite_textures.push(SpriteTexture {
            tpage: 0,
            uv0: Vec2::ZERO,
            uv1: Vec2::new(31.0, 31.0),
            extents: [-64, -128, 64, 0],
        });
        scene.statics.push(StaticObject {
            mesh: 0,
            visibility: BoundingBox {
                min: I16Vec3::new(-100, -100, -10),
                max: I16Vec3::new(100, 100, 10),
            },
        });
        scene
    }

    fn ctx() -> RenderContext {
        let mut ctx = RenderContext::new(RenderConfig::default());
        ctx.begin_frame(&Camera::new(IVec3::ZERO, 0, 0, 0));
        ctx
    }

    #[test]
    fn mesh_in_front_inserts_every_face() {
        let scene = scene();
        let mut ctx = ctx();
        ctx.stack_mut().push().unwrap();
        ctx.stack_mut().translate_abs(IVec3::new(0, 0, 1000));
        ctx.light_mut().set_fixed_shade(0x1000);
        ctx.draw_mesh(&scene, 0).unwrap();
        ctx.stack_mut().pop().unwrap();

        assert_eq!(ctx.stats().meshes, 1);
        assert_eq!(ctx.stats().primitives, 2);
        let kinds: Vec<PrimKind> = (0..2)
            .map(|i| ctx.sort_buffer().primitive(i).0.kind)
            .collect();
        assert_eq!(kinds, vec![PrimKind::Textured, PrimKind::Gouraud]);
    }

    #[test]
    fn mesh_behind_the_eye_is_rejected_whole() {
        let scene = scene();
        let mut ctx = ctx();
        ctx.stack_mut().push().unwrap();
        ctx.stack_mut().translate_abs(IVec3::new(0, 0, -1000));
        ctx.draw_mesh(&scene, 0).unwrap();
        assert_eq!(ctx.stats().meshes, 0);
        assert_eq!(ctx.stats().primitives, 0);
        assert!(matches!(
            ctx.draw_mesh(&scene, 5),
            Err(RenderError::MissingMesh(5))
        ));
    }

    #[test]
    fn bounding_box_visibility() {
        let mut ctx = ctx();
        let bounds = BoundingBox {
            min: I16Vec3::new(-50, -50, -50),
            max: I16Vec3::new(50, 50, 50),
        };
        let mut at = |p: IVec3| {
            ctx.stack_mut().push().unwrap();
            ctx.stack_mut().translate_abs(p);
            let seen = ctx.object_on_screen(&bounds);
            ctx.stack_mut().pop().unwrap();
            seen
        };
        assert!(at(IVec3::new(0, 0, 1000)));
        assert!(!at(IVec3::new(0, 0, -1000)));
        // straddles the near plane
        assert!(at(IVec3::new(0, 0, 10)));
        // well off to the right
        assert!(!at(IVec3::new(5000, 0, 1000)));
    }

    #[test]
    fn statics_use_their_definition_and_skip_unknown_ids() {
        let scene = scene();
        let mut ctx = ctx();
        let depth = ctx.stack().depth();
        let mut st = StaticMesh {
            pos: IVec3::new(0, 0, 1500),
            rot_y: 0,
            shade: 0x0800,
            static_id: 0,
        };
        ctx.draw_static(&scene, &st).unwrap();
        assert_eq!(ctx.stats().meshes, 1);

        st.static_id = 42;
        ctx.draw_static(&scene, &st).unwrap();
        assert_eq!(ctx.stats().meshes, 1);
        assert_eq!(ctx.stack().depth(), depth);
    }

    #[test]
    fn effects_draw_as_sprite_or_mesh() {
        let scene = scene();
        let mut ctx = ctx();
        let sprite = Effect {
            pos: IVec3::new(0, 0, 1000),
            room: 0,
            rot: [0; 3],
            draw: EffectDraw::Sprite {
                sprite: 0,
                shade: 0x1000,
                translucent: true,
            },
        };
        ctx.draw_effect(&scene, &sprite).unwrap();
        assert_eq!(ctx.stats().primitives, 1);
        assert_eq!(ctx.sort_buffer().primitive(0).0.kind, PrimKind::Sprite);

        let debris = Effect {
            draw: EffectDraw::Mesh(0),
            ..sprite
        };
        ctx.draw_effect(&scene, &debris).unwrap();
        assert_eq!(ctx.stats().objects, 2);
        assert_eq!(ctx.stats().meshes, 1);

        let unknown = Effect {
            draw: EffectDraw::Sprite {
                sprite: 9,
                shade: 0,
                translucent: false,
            },
            ..sprite
        };
        ctx.draw_effect(&scene, &unknown).unwrap();
        assert_eq!(ctx.stats().objects, 2);
    }
}
