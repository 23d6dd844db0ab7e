//! Headless benchmark: renders the demo level for a number of frames and
//! reports per-frame statistics.
//!
//! ```bash
//! cargo run --release --bin retro3d -- --frames 600 --backend software --zbuffer
//! ```

use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use log::{LevelFilter, info};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use retro3d::{
    config::{DrawMode, RenderConfig, Shading, SortMode},
    engine::{Camera, FrameStats, RenderContext},
    renderer::{Hardware, Recorder, Renderer, Software},
    world::{
        Scene,
        demo::{self, ROOM_DEPTH},
    },
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Software,
    Hardware,
    Record,
}

/// CLI options handled via `clap` derive.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opts {
    /// Frames to render
    #[arg(long, default_value_t = 300)]
    frames: u32,

    #[arg(long, default_value_t = 640)]
    width: usize,

    #[arg(long, default_value_t = 480)]
    height: usize,

    #[arg(long, value_enum, default_value_t = Backend::Software)]
    backend: Backend,

    /// Depth-buffer opaque geometry instead of sorting it
    #[arg(long)]
    zbuffer: bool,

    /// Ignore room buckets when sorting
    #[arg(long)]
    depth_only: bool,

    /// One shade per polygon
    #[arg(long)]
    flat: bool,

    /// Log every frame
    #[arg(short, long)]
    verbose: bool,
}

impl Opts {
    fn config(&self) -> RenderConfig {
        RenderConfig {
            width: self.width,
            height: self.height,
            draw_mode: if self.zbuffer {
                DrawMode::ZBuffered
            } else {
                DrawMode::Sorted
            },
            sort_mode: if self.depth_only {
                SortMode::DepthOnly
            } else {
                SortMode::RoomThenDepth
            },
            shading: if self.flat {
                Shading::Flat
            } else {
                Shading::Gouraud
            },
            ..RenderConfig::default()
        }
    }
}

/// Fly from the courtyard to the flooded chamber and back.
fn camera_at(frame: u32, frames: u32) -> Camera {
    let span = 2 * ROOM_DEPTH + 1500;
    let t = (frame % frames.max(1)) as i32 * 2 * span / frames.max(1) as i32;
    let z = 200 + if t < span { t } else { 2 * span - t };
    let pos = glam::IVec3::new(0, -600, z);
    let mut cam = Camera::new(pos, demo::room_at(pos), 0, 0);
    cam.turn(((frame * 37) % 0x1000) as i16 - 0x800);
    cam
}

fn run<R: Renderer>(
    opts: &Opts,
    scene: &mut Scene,
    renderer: &mut R,
) -> anyhow::Result<(Duration, FrameStats)> {
    let mut ctx = RenderContext::new(opts.config());
    let mut total = FrameStats::default();
    let mut elapsed = Duration::ZERO;

    for frame in 0..opts.frames {
        demo::animate(scene, frame);
        let camera = camera_at(frame, opts.frames);
        let t0 = Instant::now();
        let stats = ctx.render_frame(scene, &camera, renderer, |_, _, _| {})?;
        elapsed += t0.elapsed();

        if opts.verbose {
            info!("frame {frame}: {stats:?}");
        }
        total.rooms += stats.rooms;
        total.objects += stats.objects;
        total.meshes += stats.meshes;
        total.primitives += stats.primitives;
        total.culled += stats.culled;
        total.dropped += stats.dropped;
    }
    Ok((elapsed, total))
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    TermLogger::init(
        if opts.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        ConfigBuilder::default()
            .set_time_level(LevelFilter::Trace)
            .build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let mut scene = demo::demo_scene()?;
    info!(
        "demo level: {} rooms, {} meshes, {} items",
        scene.rooms.len(),
        scene.meshes.len(),
        scene.items.len()
    );

    let (elapsed, total) = match opts.backend {
        Backend::Software => {
            let mut sw = if opts.zbuffer {
                Software::with_depth_buffer()
            } else {
                Software::new()
            };
            run(&opts, &mut scene, &mut sw)?
        }
        Backend::Hardware => {
            let mut hw = Hardware::new(RenderConfig::default().far as f32);
            run(&opts, &mut scene, &mut hw)?
        }
        Backend::Record => run(&opts, &mut scene, &mut Recorder::default())?,
    };

    let n = opts.frames.max(1) as f64;
    let avg_ms = elapsed.as_secs_f64() * 1000.0 / n;
    info!(
        "{:?}: {} frames, avg {:.2} ms ({:.1} FPS)",
        opts.backend,
        opts.frames,
        avg_ms,
        1000.0 / avg_ms.max(1e-6)
    );
    info!(
        "per frame: {:.1} rooms, {:.1} objects, {:.1} meshes, {:.0} primitives, {:.0} culled, {} dropped",
        total.rooms as f64 / n,
        total.objects as f64 / n,
        total.meshes as f64 / n,
        total.primitives as f64 / n,
        total.culled as f64 / n,
        total.dropped
    );
    Ok(())
}
