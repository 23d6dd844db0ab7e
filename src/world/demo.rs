//! Procedural demo level used by the binaries.
//!
//! Three rooms in a row along +z: an open courtyard under the sky, a
//! narrow corridor, and a flooded chamber. The courtyard holds two
//! pillars, an animated figure and the player figure. Meshes and
//! keyframes go through the same word decoders a level loader would use.

use glam::{I16Vec3, IVec3, Vec2};

use super::{
    AnimFrame, Bone, BoundingBox, Door, DrawRoutine, DrawType, Effect, EffectDraw, Item, LightKind,
    Mesh, Object, ObjectTexture, Palette, Room, RoomFlags, RoomId, RoomLight, RoomSprite,
    RoomVertex, RoomVertexFlags, Scene, SpriteTexture, StaticMesh, StaticObject, TextureBank,
    TextureId, TexturePage,
    mesh::{DOUBLE_SIDED, Quad},
};
use crate::{
    engine::{Camera, RenderError},
    math::{ANGLE_90, Angle},
};

/// Length of each room along z.
pub const ROOM_DEPTH: i32 = 2048;

const TEX_BRICK: u16 = 0;
const TEX_STONE: u16 = 1;
const TEX_WATER: u16 = 2;
const TEX_CRATE: u16 = 3;

const SPR_PLANT: u16 = 0;
const SPR_FLAME: u16 = 1;

/*──────────────────────── palette and pages ─────────────────────*/

/// Ramps of 32 entries each, darkest first.
fn palette() -> Palette {
    let ramps: [(u32, u32, u32); 6] = [
        (200, 80, 60),   // brick
        (150, 150, 140), // stone
        (60, 110, 200),  // water
        (70, 160, 60),   // foliage
        (120, 170, 230), // sky
        (250, 200, 60),  // flame
    ];
    let mut p = Palette::default();
    p[0] = 0;
    for (r, &(cr, cg, cb)) in ramps.iter().enumerate() {
        for i in 0..32u32 {
            let k = |c: u32| c * (i + 8) / 40;
            p[1 + r * 32 + i as usize] = (k(cr) << 16) | (k(cg) << 8) | k(cb);
        }
    }
    p
}

#[inline]
fn ramp(index: usize, level: u32) -> u8 {
    (1 + index * 32 + level.min(31) as usize) as u8
}

#[inline]
fn hash(x: u32, y: u32) -> u32 {
    let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA6B);
    h ^= h >> 15;
    h.wrapping_mul(0x2C1B_3C6D) >> 16
}

fn page(name: &str, size: usize, texel: impl Fn(u32, u32) -> u8) -> TexturePage {
    let mut pixels = Vec::with_capacity(size * size);
    for y in 0..size as u32 {
        for x in 0..size as u32 {
            pixels.push(texel(x, y));
        }
    }
    TexturePage {
        name: name.to_string(),
        w: size,
        h: size,
        pixels,
    }
}

fn pages(bank: &mut TextureBank) -> Result<[TextureId; 5], RenderError> {
    let brick = page("BRICK", 64, |x, y| {
        let row = y / 16;
        let mortar = y % 16 == 0 || (x + row * 16) % 32 == 0;
        if mortar { ramp(1, 8) } else { ramp(0, 18 + hash(x / 4, y / 4) % 10) }
    });
    let stone = page("STONE", 64, |x, y| ramp(1, 14 + hash(x / 8, y / 8) % 12));
    let water = page("WATER", 64, |x, y| ramp(2, 16 + ((x + y) / 4 % 4) * 3));
    let crate_ = page("CRATE", 64, |x, y| {
        let edge = x < 4 || y < 4 || x > 59 || y > 59 || x == y || x + y == 63;
        if edge { ramp(5, 10) } else { ramp(5, 20 + hash(x, y / 2) % 6) }
    });
    // sprites: left half plant, right half flame; texel 0 is the key
    let sprites = page("SPRITES", 64, |x, y| {
        if x < 32 {
            let stem = x.abs_diff(16) < 2;
            let leaf = x.abs_diff(16) < (64 - y) / 6 && y % 8 < 5;
            if stem || leaf { ramp(3, 14 + y / 3) } else { 0 }
        } else {
            let w = (y * 14 / 64).max(1);
            if (x - 32).abs_diff(16) < w { ramp(5, 31 - y / 3) } else { 0 }
        }
    });
    Ok([
        bank.insert("BRICK", brick)?,
        bank.insert("STONE", stone)?,
        bank.insert("WATER", water)?,
        bank.insert("CRATE", crate_)?,
        bank.insert("SPRITES", sprites)?,
    ])
}

fn full_page(tpage: TextureId, draw: DrawType) -> ObjectTexture {
    ObjectTexture {
        tpage,
        draw,
        uv: [
            Vec2::new(0.0, 0.0),
            Vec2::new(63.0, 0.0),
            Vec2::new(63.0, 63.0),
            Vec2::new(0.0, 63.0),
        ],
    }
}

/*──────────────────────── geometry helpers ──────────────────────*/

/// Order a planar quad so its front faces `facing`. Front faces wind
/// clockwise on screen, which puts their corner cross product against
/// the viewing side.
fn orient(c: [IVec3; 4], facing: IVec3) -> [usize; 4] {
    let n = (c[1] - c[0]).cross(c[2] - c[0]);
    if n.dot(facing) > 0 { [0, 3, 2, 1] } else { [0, 1, 2, 3] }
}

struct RoomBuilder {
    room: Room,
}

impl RoomBuilder {
    fn new(pos: IVec3, flags: RoomFlags, ambient: i16) -> Self {
        Self {
            room: Room {
                pos,
                flags,
                ambient,
                ..Room::default()
            },
        }
    }

    fn vertex(&mut self, p: IVec3, flags: RoomVertexFlags) -> u16 {
        let light = 0x0C00 + (hash(p.x as u32, p.z as u32) % 0x200) as i16 - (p.y / 4) as i16;
        self.room.vertices.push(RoomVertex {
            pos: p.as_i16vec3(),
            light,
            table: 0,
            flags,
        });
        (self.room.vertices.len() - 1) as u16
    }

    fn quad(&mut self, c: [IVec3; 4], facing: IVec3, texture: u16) {
        let flags = if self.room.is_underwater() {
            RoomVertexFlags::RIPPLE
        } else {
            RoomVertexFlags::empty()
        };
        let order = orient(c, facing);
        let idx = order.map(|i| self.vertex(c[i], flags));
        self.room.quads.push(Quad::new(idx, texture));
    }

    /// Axis-aligned rectangle at `z` spanning `x0..x1`, `y0..y1`.
    fn wall_z(&mut self, z: i32, x0: i32, x1: i32, y0: i32, y1: i32, facing: i32, tex: u16) {
        self.quad(
            [
                IVec3::new(x0, y0, z),
                IVec3::new(x1, y0, z),
                IVec3::new(x1, y1, z),
                IVec3::new(x0, y1, z),
            ],
            IVec3::new(0, 0, facing),
            tex,
        );
    }

    fn wall_x(&mut self, x: i32, z0: i32, z1: i32, y0: i32, y1: i32, facing: i32, tex: u16) {
        self.quad(
            [
                IVec3::new(x, y0, z0),
                IVec3::new(x, y0, z1),
                IVec3::new(x, y1, z1),
                IVec3::new(x, y1, z0),
            ],
            IVec3::new(facing, 0, 0),
            tex,
        );
    }

    fn plane_y(&mut self, y: i32, x0: i32, x1: i32, z0: i32, z1: i32, facing: i32, tex: u16) {
        self.quad(
            [
                IVec3::new(x0, y, z0),
                IVec3::new(x1, y, z0),
                IVec3::new(x1, y, z1),
                IVec3::new(x0, y, z1),
            ],
            IVec3::new(0, facing, 0),
            tex,
        );
    }

    /// End wall at `z` with a doorway `-dw..dw` by `-dh..0`.
    fn wall_with_door(&mut self, z: i32, half: i32, height: i32, dw: i32, dh: i32, facing: i32) {
        self.wall_z(z, -half, -dw, -height, 0, facing, TEX_BRICK);
        self.wall_z(z, dw, half, -height, 0, facing, TEX_BRICK);
        if height > dh {
            self.wall_z(z, -dw, dw, -height, -dh, facing, TEX_BRICK);
        }
    }

    fn door(&mut self, to: RoomId, z: i32, dw: i32, dh: i32, facing: i16) {
        let z = z as i16;
        let (dw, dh) = (dw as i16, dh as i16);
        self.room.doors.push(Door {
            room: to,
            normal: I16Vec3::new(0, 0, facing),
            corners: [
                I16Vec3::new(-dw, -dh, z),
                I16Vec3::new(dw, -dh, z),
                I16Vec3::new(dw, 0, z),
                I16Vec3::new(-dw, 0, z),
            ],
        });
    }

    fn sprite(&mut self, at: IVec3, texture: u16) {
        let vertex = self.vertex(at, RoomVertexFlags::NO_WIBBLE);
        self.room.sprites.push(RoomSprite { vertex, texture });
    }

    fn build(self) -> Room {
        self.room
    }
}

const DOOR_W: i32 = 512;
const DOOR_H: i32 = 1024;

fn courtyard() -> Room {
    let (half, height) = (1024, 1536);
    let mut b = RoomBuilder::new(IVec3::ZERO, RoomFlags::OUTSIDE, 0x0600);
    b.plane_y(0, -half, half, 0, ROOM_DEPTH, -1, TEX_STONE);
    b.wall_x(-half, 0, ROOM_DEPTH, -height, 0, 1, TEX_BRICK);
    b.wall_x(half, 0, ROOM_DEPTH, -height, 0, -1, TEX_BRICK);
    b.wall_z(0, -half, half, -height, 0, 1, TEX_BRICK);
    b.wall_with_door(ROOM_DEPTH, half, height, DOOR_W, DOOR_H, -1);
    b.door(1, ROOM_DEPTH, DOOR_W, DOOR_H, -1);
    b.sprite(IVec3::new(-700, 0, 1700), SPR_PLANT);
    b.sprite(IVec3::new(700, 0, 1700), SPR_PLANT);
    b.room.lights.push(RoomLight {
        pos: IVec3::ZERO,
        intensity: 0x0C00,
        falloff: 0,
        kind: LightKind::Sun {
            dir: IVec3::new(1, 2, 1),
        },
        flicker: false,
    });
    b.room.statics = vec![
        StaticMesh {
            pos: IVec3::new(-600, 0, 900),
            rot_y: 0,
            shade: 0x0E00,
            static_id: 0,
        },
        StaticMesh {
            pos: IVec3::new(600, 0, 900),
            rot_y: 0x2000,
            shade: 0x0E00,
            static_id: 0,
        },
    ];
    b.build()
}

fn corridor() -> Room {
    let mut b = RoomBuilder::new(IVec3::new(0, 0, ROOM_DEPTH), RoomFlags::empty(), 0x0A00);
    b.plane_y(0, -DOOR_W, DOOR_W, 0, ROOM_DEPTH, -1, TEX_STONE);
    b.plane_y(-DOOR_H, -DOOR_W, DOOR_W, 0, ROOM_DEPTH, 1, TEX_STONE);
    b.wall_x(-DOOR_W, 0, ROOM_DEPTH, -DOOR_H, 0, 1, TEX_BRICK);
    b.wall_x(DOOR_W, 0, ROOM_DEPTH, -DOOR_H, 0, -1, TEX_BRICK);
    b.door(0, 0, DOOR_W, DOOR_H, 1);
    b.door(2, ROOM_DEPTH, DOOR_W, DOOR_H, -1);
    b.room.lights.push(RoomLight {
        pos: IVec3::new(0, -900, 1024),
        intensity: 0x1000,
        falloff: 0x800,
        kind: LightKind::Point,
        flicker: true,
    });
    b.build()
}

fn flooded_chamber() -> Room {
    let (half, height) = (1024, 1536);
    let mut b = RoomBuilder::new(
        IVec3::new(0, 0, 2 * ROOM_DEPTH),
        RoomFlags::UNDERWATER,
        0x0C00,
    );
    b.plane_y(0, -half, half, 0, ROOM_DEPTH, -1, TEX_STONE);
    b.plane_y(-height, -half, half, 0, ROOM_DEPTH, 1, TEX_WATER);
    b.wall_x(-half, 0, ROOM_DEPTH, -height, 0, 1, TEX_BRICK);
    b.wall_x(half, 0, ROOM_DEPTH, -height, 0, -1, TEX_BRICK);
    b.wall_z(ROOM_DEPTH, -half, half, -height, 0, -1, TEX_BRICK);
    b.wall_with_door(0, half, height, DOOR_W, DOOR_H, 1);
    b.door(1, 0, DOOR_W, DOOR_H, 1);
    b.room.lights.push(RoomLight {
        pos: IVec3::new(0, -1200, 1024),
        intensity: 0x1400,
        falloff: 0x1000,
        kind: LightKind::Point,
        flicker: false,
    });
    b.build()
}

/*──────────────────────── meshes ────────────────────────────────*/

/// Mesh record for a box of half-extents `half`, lifted so its base sits
/// at `y = base`, every face textured with `texture`.
fn box_words(half: IVec3, base: i32, texture: u16, lit: bool) -> Vec<i16> {
    let corner = |i: usize| {
        IVec3::new(
            if i & 1 == 0 { -half.x } else { half.x },
            if i & 2 == 0 { base - 2 * half.y } else { base },
            if i & 4 == 0 { -half.z } else { half.z },
        )
    };
    let mut words = vec![8];
    for i in 0..8 {
        let c = corner(i);
        words.extend([c.x as i16, c.y as i16, c.z as i16]);
    }
    if lit {
        words.push(8);
        for i in 0..8 {
            let s = |bit: usize| if i & bit == 0 { -9459 } else { 9459 };
            words.extend([s(1), s(2), s(4)]);
        }
    } else {
        words.push(-8);
        for i in 0..8 {
            words.push(if i & 2 == 0 { 0x0C00 } else { 0x1200 });
        }
    }

    let center = IVec3::new(0, base - half.y, 0);
    words.push(6);
    for axis in [1usize, 2, 4] {
        let (b, c) = match axis {
            1 => (2, 4),
            2 => (1, 4),
            _ => (1, 2),
        };
        for side in [0, axis] {
            let idx = [side, side | b, side | b | c, side | c];
            let pts = idx.map(corner);
            let facing = pts[0] + pts[2] - 2 * center;
            let order = orient(pts, facing);
            for o in order {
                words.push(idx[o] as i16);
            }
            words.push(texture as i16);
        }
    }
    words.extend([0, 0, 0]);
    words
}

/// Inward-facing sky box drawn around the eye.
fn sky_words() -> Vec<i16> {
    let s = 4096;
    let mut words = vec![8];
    for i in 0..8 {
        let c = |bit: usize| if i & bit == 0 { -s } else { s };
        words.extend([c(1), c(2), c(4)]);
    }
    words.push(-8);
    for i in 0..8 {
        words.push(if i & 2 == 0 { 0x0A00 } else { 0x1400 });
    }
    words.extend([0, 0]);
    let sky = ramp(4, 24) as u16 | DOUBLE_SIDED;
    let faces: [[i16; 4]; 6] = [
        [0, 1, 3, 2],
        [4, 5, 7, 6],
        [0, 1, 5, 4],
        [2, 3, 7, 6],
        [0, 2, 6, 4],
        [1, 3, 7, 5],
    ];
    words.push(faces.len() as i16);
    for f in faces {
        words.extend(f);
        words.push(sky as i16);
    }
    words.push(0);
    words
}

/*──────────────────────── animation ─────────────────────────────*/

/// Keyframe words: bounds, root offset, then one Y rotation for the torso
/// and X rotations swinging the arms by `swing`.
fn keyframe_words(bob: i16, swing: Angle) -> Vec<i16> {
    let single = |axis: u16, a: Angle| ((axis << 14) | (a >> 6)) as i16;
    vec![
        -250, 250, -900, 0, -120, 120, // bounds
        0, -600 + bob, 0, // root
        single(2, 0),
        single(1, swing),
        single(1, swing.wrapping_neg()),
    ]
}

fn figure(torso: u16, arm: u16, draw: DrawRoutine) -> Result<Object, RenderError> {
    let bones = Bone::decode_tree(&[2, 160, -120, 0, 1 | 2, -160, -120, 0])?;
    let mut frames = Vec::new();
    for (bob, swing) in [(0, 0x1800), (-20, 0), (0, 0xE800), (-20, 0)] {
        let (frame, _) = AnimFrame::decode(&keyframe_words(bob, swing), 3)?;
        frames.push(frame);
    }
    Ok(Object {
        meshes: vec![torso, arm, arm],
        bones,
        frames,
        draw,
        shadow_size: 160,
    })
}

/*──────────────────────── scene ─────────────────────────────────*/

/// Build the demo level.
pub fn demo_scene() -> Result<Scene, RenderError> {
    let mut scene = Scene {
        rooms: vec![courtyard(), corridor(), flooded_chamber()],
        ..Scene::default()
    };
    scene.textures.set_palette(palette());
    let [brick, stone, water, crate_, sprites] = pages(&mut scene.textures)?;
    scene.object_textures = vec![
        full_page(brick, DrawType::Opaque),
        full_page(stone, DrawType::Opaque),
        full_page(water, DrawType::Translucent),
        full_page(crate_, DrawType::Opaque),
    ];
    scene.sprite_textures = vec![
        SpriteTexture {
            tpage: sprites,
            uv0: Vec2::new(0.0, 0.0),
            uv1: Vec2::new(31.0, 63.0),
            extents: [-128, -512, 128, 0],
        },
        SpriteTexture {
            tpage: sprites,
            uv0: Vec2::new(32.0, 0.0),
            uv1: Vec2::new(63.0, 63.0),
            extents: [-64, -256, 64, 0],
        },
    ];

    let sky = Mesh::decode(&sky_words())?;
    let torso = Mesh::decode(&box_words(IVec3::new(120, 150, 80), 150, TEX_CRATE, true))?;
    let arm = Mesh::decode(&box_words(IVec3::new(40, 200, 40), 400, TEX_CRATE, true))?;
    let pillar = Mesh::decode(&box_words(IVec3::new(128, 768, 128), 0, TEX_STONE, false))?;
    let debris = Mesh::decode(&box_words(IVec3::new(60, 60, 60), 60, TEX_CRATE, true))?;
    scene.meshes = vec![sky, torso, arm, pillar, debris];

    scene.statics.push(StaticObject {
        mesh: 3,
        visibility: BoundingBox {
            min: I16Vec3::new(-128, -1536, -128),
            max: I16Vec3::new(128, 0, 128),
        },
    });

    scene.objects = vec![
        Object {
            meshes: vec![0],
            draw: DrawRoutine::Hidden,
            ..Object::default()
        },
        figure(1, 2, DrawRoutine::Animating)?,
        figure(1, 2, DrawRoutine::Lara)?,
    ];
    scene.skybox = Some(0);

    let mut walker = Item::new(1, 0, IVec3::new(300, 0, 1400));
    walker.rot[1] = ANGLE_90;
    scene.add_item(walker);
    let lara = scene.add_item(Item::new(2, 0, IVec3::new(0, 0, 800)));
    scene.lara = Some(lara);

    scene.add_effect(Effect {
        pos: IVec3::new(-300, -200, ROOM_DEPTH + 1500),
        room: 1,
        rot: [0; 3],
        draw: EffectDraw::Sprite {
            sprite: SPR_FLAME,
            shade: 0x0800,
            translucent: true,
        },
    });
    scene.add_effect(Effect {
        pos: IVec3::new(200, -700, 2 * ROOM_DEPTH + 900),
        room: 2,
        rot: [0x1000, 0x2000, 0],
        draw: EffectDraw::Mesh(4),
    });
    Ok(scene)
}

/// Camera standing in the courtyard, looking down the rooms.
pub fn start_camera() -> Camera {
    Camera::new(IVec3::new(0, -700, 200), 0, 0, 0)
}

/// Room holding `pos`; the rooms are stacked along z.
pub fn room_at(pos: IVec3) -> RoomId {
    pos.z.div_euclid(ROOM_DEPTH).clamp(0, 2) as RoomId
}

/// Advance every item's keyframe blend and turn the walker and the debris.
pub fn animate(scene: &mut Scene, tick: u32) {
    const RATE: u32 = 8;
    for item in &mut scene.items {
        let Some(obj) = scene.objects.get(item.object as usize) else {
            continue;
        };
        let n = obj.frames.len().max(1) as u32;
        let frame = (tick / RATE) % n;
        item.anim.frame = frame as usize;
        item.anim.next = ((frame + 1) % n) as usize;
        item.anim.frac = (tick % RATE) as i32;
        item.anim.rate = RATE as i32;
        if obj.draw == DrawRoutine::Animating {
            item.rot[1] = item.rot[1].wrapping_add(96);
        }
    }
    for fx in &mut scene.effects {
        if let EffectDraw::Mesh(_) = fx.draw {
            fx.rot[0] = fx.rot[0].wrapping_add(200);
            fx.rot[1] = fx.rot[1].wrapping_add(300);
        }
    }
}
