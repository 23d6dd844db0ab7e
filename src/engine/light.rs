//! Shade computation.
//!
//! Shade runs `0..=SHADE_MAX` and grows toward black. Light intensities
//! are brightness, so every combination below converts at the end with
//! `SHADE_MAX - brightness`.

use glam::IVec3;

use super::{camera::vector_angles, vertex::PhdVbuf};
use crate::{
    config::FogRange,
    math::{Angle, Matrix, trig},
    world::{LightKind, MeshShading, Room, RoomVertexFlags},
};

pub const SHADE_MAX: i32 = 0x1FFF;
/// Neutral pre-lit vertex value; baked lights shift the adder by
/// their distance from it.
pub const SHADE_MID: i32 = 0x1000;
pub const MAX_DYNAMICS: usize = 10;

/// Short-lived point light (muzzle flash, explosion, flare).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DynamicLight {
    pub pos: IVec3,
    pub intensity: i16,
    pub falloff: i32,
}

/// Lighting inputs for the mesh being drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LightState {
    /// Base shade for every vertex.
    pub adder: i32,
    /// Divides `dot(direction, normal)`; 0 disables the directional term.
    pub divider: i32,
    /// Light travel direction in the current object frame, `W2V_SCALE` long.
    pub direction: IVec3,
    /// World travel direction as angles, input of [`LightEngine::rotate_light`].
    pub pitch: Angle,
    pub yaw: Angle,
}

/// Saturating inverse-square falloff: `intensity · f² / (f² + d²)`,
/// both squares pre-shifted by 12.
pub fn light_falloff(intensity: i32, falloff: i32, dist_sq: i64) -> i32 {
    let f2 = (falloff as i64 * falloff as i64) >> 12;
    let d2 = dist_sq >> 12;
    if f2 + d2 == 0 {
        return intensity;
    }
    (intensity as i64 * f2 / (f2 + d2)) as i32
}

/// [`light_falloff`] with the radius cut: nothing once `d² >= 2·f²`.
pub fn dynamic_falloff(light: &DynamicLight, pos: IVec3) -> i32 {
    let d = (pos - light.pos).as_i64vec3();
    let dist_sq = d.x * d.x + d.y * d.y + d.z * d.z;
    let f2 = (light.falloff as i64 * light.falloff as i64) >> 12;
    if dist_sq >> 12 >= 2 * f2 {
        return 0;
    }
    light_falloff(light.intensity as i32, light.falloff, dist_sq)
}

/// Depth cue: 0 before `begin`, linear ramp, `SHADE_MAX` from `end` on.
pub fn fog_shade(depth: f32, range: FogRange) -> i32 {
    let z = depth as i32;
    if z < range.begin {
        0
    } else if z >= range.end || range.end <= range.begin {
        SHADE_MAX
    } else {
        ((z - range.begin) as i64 * SHADE_MAX as i64 / (range.end - range.begin) as i64) as i32
    }
}

#[inline]
fn clamp_shade(s: i32) -> i16 {
    s.clamp(0, SHADE_MAX) as i16
}

pub struct LightEngine {
    dynamics: Vec<DynamicLight>,
    /// Slot overwritten by the next light once the pool is full.
    oldest: usize,
    pub state: LightState,
    fog: FogRange,
    water_fog: FogRange,
    underwater: bool,
    fog_enabled: bool,
    /// Global flicker step, advanced once per frame.
    light_mode: usize,
}

impl LightEngine {
    pub fn new(fog: FogRange, water_fog: FogRange) -> Self {
        Self {
            dynamics: Vec::with_capacity(MAX_DYNAMICS),
            oldest: 0,
            state: LightState::default(),
            fog,
            water_fog,
            underwater: false,
            fog_enabled: true,
            light_mode: 0,
        }
    }

    /*──────────────────────── dynamic lights ───────────────────────*/

    /// Add a light for the current frame; evicts the oldest when full.
    pub fn add_dynamic_light(&mut self, light: DynamicLight) {
        if self.dynamics.len() < MAX_DYNAMICS {
            self.dynamics.push(light);
        } else {
            self.dynamics[self.oldest] = light;
            self.oldest = (self.oldest + 1) % MAX_DYNAMICS;
        }
    }

    pub fn clear_dynamic_lights(&mut self) {
        self.dynamics.clear();
        self.oldest = 0;
    }

    pub fn dynamic_lights(&self) -> &[DynamicLight] {
        &self.dynamics
    }

    fn dynamic_brightness(&self, pos: IVec3) -> i32 {
        self.dynamics.iter().map(|l| dynamic_falloff(l, pos)).sum()
    }

    /*──────────────────────── frame state ──────────────────────────*/

    pub(crate) fn advance(&mut self) {
        self.light_mode = self.light_mode.wrapping_add(1);
    }

    /// Pick the water fog range for everything drawn until the next call.
    pub fn set_underwater(&mut self, underwater: bool) {
        self.underwater = underwater;
    }

    pub(crate) fn set_fog_enabled(&mut self, on: bool) {
        self.fog_enabled = on;
    }

    pub fn fog(&self, depth: f32) -> i32 {
        if !self.fog_enabled {
            return 0;
        }
        let range = if self.underwater {
            self.water_fog
        } else {
            self.fog
        };
        fog_shade(depth, range)
    }

    /// Scale of flickering lights for this frame, `0x0C00..=0x1000`.
    fn flicker_scale(&self) -> i32 {
        let phase = (self.light_mode as u16).wrapping_mul(0x2F00);
        0x0C00 + (trig::sin(phase).abs() >> 4)
    }

    /*──────────────────────── object lighting ──────────────────────*/

    /// Light a movable object at world `pos` standing in `room`.
    pub fn calculate_light(&mut self, pos: IVec3, room: &Room) {
        let ambient = SHADE_MAX - room.ambient as i32;
        let dynamic = self.dynamic_brightness(pos);

        if room.lights.is_empty() {
            self.state = LightState {
                adder: SHADE_MAX - (ambient + dynamic),
                ..LightState::default()
            };
            return;
        }

        let flicker = self.flicker_scale();
        let mut brightest = ambient;
        let mut travel = IVec3::ZERO;
        for light in &room.lights {
            let mut intensity = light.intensity as i32;
            if light.flicker {
                intensity = intensity * flicker >> 12;
            }
            let (b, dir) = match light.kind {
                LightKind::Point => {
                    let d = (pos - light.pos).as_i64vec3();
                    let dist_sq = d.x * d.x + d.y * d.y + d.z * d.z;
                    (
                        ambient + light_falloff(intensity, light.falloff, dist_sq),
                        pos - light.pos,
                    )
                }
                LightKind::Sun { dir } => (ambient + intensity, dir),
            };
            if b > brightest {
                brightest = b;
                travel = dir;
            }
        }

        let mid = (ambient + brightest) / 2;
        let contrast = brightest - mid;
        let (yaw, pitch) = vector_angles(travel.x, travel.y, travel.z);
        self.state = LightState {
            adder: SHADE_MAX - (mid + dynamic),
            divider: if contrast > 0 && travel != IVec3::ZERO {
                (1 << 28) / contrast
            } else {
                0
            },
            direction: IVec3::ZERO,
            pitch,
            yaw,
        };
    }

    /// Pre-lit static mesh with baked `shade`; dynamic lights wash it out.
    pub fn calculate_static_light(&mut self, shade: i16, pos: IVec3) {
        self.state = LightState {
            adder: shade as i32 - self.dynamic_brightness(pos),
            ..LightState::default()
        };
    }

    /// Fixed shade, no directional term.
    pub fn set_fixed_shade(&mut self, shade: i16) {
        self.state = LightState {
            adder: shade as i32,
            ..LightState::default()
        };
    }

    /// Bring the world light direction `(pitch, yaw)` into the frame of
    /// `top`, going through the world-to-view rotation first.
    pub fn rotate_light(&mut self, pitch: Angle, yaw: Angle, w2v: &Matrix, top: &Matrix) {
        let cp = trig::cos(pitch);
        let world = IVec3::new(
            trig::trig_mul2(cp, trig::sin(yaw)),
            -trig::sin(pitch),
            trig::trig_mul2(cp, trig::cos(yaw)),
        );
        let view = w2v.rotate_vector(world);
        self.state.direction = top.rotate_vector_transposed(view);
    }

    /// Per-vertex shade for an object mesh, written into `vbuf`. Fog uses
    /// the clamped depth of each vertex.
    pub fn calc_vertex_light(&self, shading: &MeshShading, vbuf: &mut [PhdVbuf]) {
        let st = &self.state;
        match shading {
            MeshShading::Normals(normals) => {
                let dir = st.direction.as_i64vec3();
                for (p, n) in vbuf.iter_mut().zip(normals) {
                    let mut s = st.adder;
                    if st.divider != 0 {
                        let n = n.as_i64vec3();
                        let dot = dir.x * n.x + dir.y * n.y + dir.z * n.z;
                        s += (dot / st.divider as i64) as i32;
                    }
                    p.shade = clamp_shade(s + self.fog(p.z));
                }
            }
            MeshShading::Lights(lights) => {
                for (p, &l) in vbuf.iter_mut().zip(lights) {
                    p.shade = clamp_shade(st.adder + l as i32 - SHADE_MID + self.fog(p.z));
                }
            }
        }
    }

    /*──────────────────────── room lighting ────────────────────────*/

    /// Shade of every room vertex this frame, before fog: base light,
    /// flicker table wobble and water ripple.
    pub fn light_room(&self, room: &Room, wibble: usize, out: &mut Vec<i16>) {
        out.clear();
        let step = wibble as u16;
        for (i, v) in room.vertices.iter().enumerate() {
            let mut s = v.light as i32;
            if v.table != 0 {
                let phase = (v.table as u16)
                    .wrapping_mul(0x1555)
                    .wrapping_add(step.wrapping_mul(0x0800));
                s += trig::sin(phase) >> 6;
            }
            if room.is_underwater() && v.flags.contains(RoomVertexFlags::RIPPLE) {
                let phase = (i as u16)
                    .wrapping_mul(0x2000)
                    .wrapping_add(step.wrapping_mul(0x0800));
                s += trig::sin(phase) >> 5;
            }
            out.push(clamp_shade(s));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{RoomLight, RoomVertex};
    use glam::I16Vec3;

    fn engine() -> LightEngine {
        LightEngine::new(
            FogRange {
                begin: 1000,
                end: 5000,
            },
            FogRange {
                begin: 100,
                end: 500,
            },
        )
    }

    #[test]
    fn fog_is_zero_then_monotonic_then_saturated() {
        let range = FogRange {
            begin: 1000,
            end: 5000,
        };
        assert_eq!(fog_shade(0.0, range), 0);
        assert_eq!(fog_shade(999.0, range), 0);
        assert_eq!(fog_shade(5000.0, range), SHADE_MAX);
        assert_eq!(fog_shade(90_000.0, range), SHADE_MAX);
        let mut last = 0;
        for z in (1000..=5000).step_by(37) {
            let f = fog_shade(z as f32, range);
            assert!(f >= last, "fog fell at {z}");
            last = f;
        }
    }

    #[test]
    fn water_fog_starts_sooner() {
        let mut le = engine();
        assert_eq!(le.fog(300.0), 0);
        le.set_underwater(true);
        assert!(le.fog(300.0) > 0);
    }

    #[test]
    fn dynamic_light_is_half_at_falloff_and_zero_past_cut() {
        let light = DynamicLight {
            pos: IVec3::ZERO,
            intensity: 0x1000,
            falloff: 1024,
        };
        assert_eq!(dynamic_falloff(&light, IVec3::ZERO), 0x1000);
        assert_eq!(dynamic_falloff(&light, IVec3::new(1024, 0, 0)), 0x800);
        // 1449 > 1024 * sqrt(2)
        assert_eq!(dynamic_falloff(&light, IVec3::new(0, 0, 1449)), 0);
        assert_eq!(dynamic_falloff(&light, IVec3::new(2048, 0, 0)), 0);
        assert!(dynamic_falloff(&light, IVec3::new(1400, 0, 0)) > 0);
    }

    #[test]
    fn dynamic_pool_evicts_oldest() {
        let mut le = engine();
        for i in 0..MAX_DYNAMICS as i32 + 2 {
            le.add_dynamic_light(DynamicLight {
                pos: IVec3::new(i, 0, 0),
                intensity: 1,
                falloff: 1,
            });
        }
        let xs: Vec<i32> = le.dynamic_lights().iter().map(|l| l.pos.x).collect();
        assert_eq!(xs.len(), MAX_DYNAMICS);
        assert!(!xs.contains(&0) && !xs.contains(&1));
        assert!(xs.contains(&10) && xs.contains(&11));
        le.clear_dynamic_lights();
        assert!(le.dynamic_lights().is_empty());
    }

    #[test]
    fn dynamic_light_adds_to_items_and_subtracts_from_statics() {
        let mut le = engine();
        let room = Room {
            ambient: SHADE_MAX as i16,
            ..Room::default()
        };
        le.calculate_light(IVec3::new(1024, 0, 0), &room);
        assert_eq!(le.state.adder, SHADE_MAX);

        le.add_dynamic_light(DynamicLight {
            pos: IVec3::ZERO,
            intensity: 0x1000,
            falloff: 1024,
        });
        le.calculate_light(IVec3::new(1024, 0, 0), &room);
        assert_eq!(le.state.adder, SHADE_MAX - 0x800);
        assert_eq!(le.state.divider, 0);

        le.calculate_static_light(0x1800, IVec3::new(1024, 0, 0));
        assert_eq!(le.state.adder, 0x1800 - 0x800);
    }

    #[test]
    fn facing_the_light_is_brighter() {
        let mut le = engine();
        let room = Room {
            ambient: 0x1800,
            lights: vec![RoomLight {
                pos: IVec3::new(0, 0, -2000),
                intensity: 0x1000,
                falloff: 4096,
                kind: LightKind::Point,
                flicker: false,
            }],
            ..Room::default()
        };
        le.calculate_light(IVec3::ZERO, &room);
        assert!(le.state.divider > 0);
        // travelling along +z
        assert_eq!(le.state.yaw, 0);

        le.rotate_light(le.state.pitch, le.state.yaw, &Matrix::IDENTITY, &Matrix::IDENTITY);
        let toward = I16Vec3::new(0, 0, -16384);
        let away = I16Vec3::new(0, 0, 16384);
        let normals = MeshShading::Normals(vec![toward, away]);
        let mut out = [PhdVbuf::default(); 2];
        le.calc_vertex_light(&normals, &mut out);
        assert!(out[0].shade < out[1].shade, "{out:?}");
    }

    #[test]
    fn room_shade_follows_base_light_without_tables() {
        let le = engine();
        let room = Room {
            vertices: vec![RoomVertex {
                pos: I16Vec3::ZERO,
                light: 0x0800,
                table: 0,
                flags: RoomVertexFlags::empty(),
            }],
            ..Room::default()
        };
        let mut out = Vec::new();
        le.light_room(&room, 7, &mut out);
        assert_eq!(out, vec![0x0800]);
    }
}
