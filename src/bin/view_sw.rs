//! Interactive software-rendered walk through the demo level.
//!
//! Arrows / WASD move, PageUp / PageDown look up and down, `Z` toggles the
//! depth buffer, `F` toggles flat shading, `L` drops a dynamic light.

use minifb::{Key, KeyRepeat, Window, WindowOptions};
use std::time::{Duration, Instant};

use log::{LevelFilter, info};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use retro3d::{
    config::{DrawMode, RenderConfig, Shading},
    engine::{DynamicLight, RenderContext},
    renderer::Software,
    world::demo,
};

const W: usize = 960;
const H: usize = 600;
const MOVE_SPEED: i32 = 48;
const TURN_SPEED: i16 = 0x200;

fn build(config: &RenderConfig) -> (RenderContext, Software) {
    let sw = match config.draw_mode {
        DrawMode::ZBuffered => Software::with_depth_buffer(),
        DrawMode::Sorted => Software::new(),
    };
    (RenderContext::new(config.clone()), sw)
}

fn main() -> anyhow::Result<()> {
    TermLogger::init(
        LevelFilter::Info,
        ConfigBuilder::default().build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let mut scene = demo::demo_scene()?;
    let mut camera = demo::start_camera();
    let mut config = RenderConfig {
        width: W,
        height: H,
        ..RenderConfig::default()
    };
    let (mut ctx, mut renderer) = build(&config);

    let mut win = Window::new("retro3d software render", W, H, WindowOptions::default())?;
    win.set_target_fps(30);

    // ────────────────── benchmarking state ──────────────────────────────
    let mut acc_time = Duration::ZERO;
    let mut acc_frames = 0usize;
    let mut last_print = Instant::now();
    let mut tick = 0u32;

    while win.is_open() && !win.is_key_down(Key::Escape) {
        let t0 = Instant::now();

        /* movement --------------------------------------------------------- */
        let mut forward = 0;
        let mut side = 0;
        if win.is_key_down(Key::Up) || win.is_key_down(Key::W) {
            forward += MOVE_SPEED;
        }
        if win.is_key_down(Key::Down) || win.is_key_down(Key::S) {
            forward -= MOVE_SPEED;
        }
        if win.is_key_down(Key::A) {
            side -= MOVE_SPEED;
        }
        if win.is_key_down(Key::D) {
            side += MOVE_SPEED;
        }
        if win.is_key_down(Key::Left) {
            camera.turn(-TURN_SPEED);
        }
        if win.is_key_down(Key::Right) {
            camera.turn(TURN_SPEED);
        }
        if win.is_key_down(Key::PageUp) {
            camera.pitch = camera.pitch.wrapping_add(0x100);
        }
        if win.is_key_down(Key::PageDown) {
            camera.pitch = camera.pitch.wrapping_sub(0x100);
        }
        camera.step(forward, side);
        camera.room = demo::room_at(camera.pos);

        /* toggles ---------------------------------------------------------- */
        let mut rebuild = false;
        if win.is_key_pressed(Key::Z, KeyRepeat::No) {
            config.draw_mode = match config.draw_mode {
                DrawMode::Sorted => DrawMode::ZBuffered,
                DrawMode::ZBuffered => DrawMode::Sorted,
            };
            rebuild = true;
        }
        if win.is_key_pressed(Key::F, KeyRepeat::No) {
            config.shading = match config.shading {
                Shading::Gouraud => Shading::Flat,
                Shading::Flat => Shading::Gouraud,
            };
            rebuild = true;
        }
        if rebuild {
            info!("{:?}, {:?}", config.draw_mode, config.shading);
            (ctx, renderer) = build(&config);
        }

        /* draw ------------------------------------------------------------- */
        demo::animate(&mut scene, tick);
        tick = tick.wrapping_add(1);

        ctx.begin_frame(&camera);
        if win.is_key_down(Key::L) {
            ctx.light_mut().add_dynamic_light(DynamicLight {
                pos: camera.pos,
                intensity: 0x1000,
                falloff: 0x600,
            });
        }
        ctx.draw_rooms(&mut scene, camera.room)?;
        let mut shown = Ok(());
        ctx.end_frame(&mut renderer, &scene.textures, |fb, w, h| {
            acc_time += t0.elapsed();
            acc_frames += 1;
            shown = win.update_with_buffer(fb, w, h);
        });
        shown?;

        if last_print.elapsed() >= Duration::from_secs(3) {
            let avg_ms = acc_time.as_secs_f64() * 1000.0 / acc_frames.max(1) as f64;
            info!(
                "avg render: {:.2} ms  ({:.1} FPS), {:?}",
                avg_ms,
                1000.0 / avg_ms.max(1e-6),
                ctx.stats()
            );
            acc_time = Duration::ZERO;
            acc_frames = 0;
            last_print = Instant::now();
        }
    }
    Ok(())
}
