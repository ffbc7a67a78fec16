use anyhow::Context;
use clap::{Parser, Subcommand};
use freelook_common::Viewport;
use freelook_input::{InputEvent, Key};
use freelook_render::{
    link, DebugTextBackend, LoopState, MotionMode, RenderLoop, ScenePreset, SessionConfig,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "freelook-cli", about = "Headless tools for the freelook render core")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// Compile and link a shader pair, then print its interface
    CheckShaders {
        /// Check a built-in scene's shaders
        #[arg(long, conflicts_with_all = ["vertex", "fragment"])]
        scene: Option<ScenePreset>,
        /// Vertex stage WGSL file
        #[arg(long, requires = "fragment")]
        vertex: Option<PathBuf>,
        /// Fragment stage WGSL file
        #[arg(long, requires = "vertex")]
        fragment: Option<PathBuf>,
    },
    /// Drive the render loop on the text backend and print what it draws
    Simulate {
        /// Session config file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Scene preset, overrides the config
        #[arg(long)]
        scene: Option<ScenePreset>,
        /// Number of frames to render
        #[arg(short, long, default_value = "3")]
        frames: u32,
        /// Keys tapped one per frame, e.g. `up,up,left`
        #[arg(short, long, value_delimiter = ',')]
        keys: Vec<Key>,
        /// Move by elapsed time instead of per key event
        #[arg(long)]
        timed: bool,
        #[arg(long, default_value = "800")]
        width: u32,
        #[arg(long, default_value = "600")]
        height: u32,
        /// Print only the final camera state
        #[arg(short, long)]
        quiet: bool,
    },
    /// Print the default session config as YAML
    DefaultConfig,
}

fn check_shaders(scene: Option<ScenePreset>, vertex: Option<PathBuf>, fragment: Option<PathBuf>) -> anyhow::Result<()> {
    let (vs, fs) = match (vertex, fragment) {
        (Some(v), Some(f)) => (
            std::fs::read_to_string(&v).with_context(|| format!("reading {}", v.display()))?,
            std::fs::read_to_string(&f).with_context(|| format!("reading {}", f.display()))?,
        ),
        _ => {
            let (vs, fs) = scene.unwrap_or_default().shader_sources();
            (vs.to_string(), fs.to_string())
        }
    };

    let linked = link(&vs, &fs)?;
    let iface = &linked.interface;
    println!("vertex entry:   {}", iface.vertex_entry);
    println!("fragment entry: {}", iface.fragment_entry);
    println!("position:       {} components", iface.position_components);
    println!("uniform block:  {} bytes", iface.uniforms.size);
    for field in &iface.uniforms.fields {
        println!("  {:<12} offset {:>3}  {:?}", field.name, field.offset, field.kind);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn simulate(
    config: Option<PathBuf>,
    scene: Option<ScenePreset>,
    frames: u32,
    keys: Vec<Key>,
    timed: bool,
    width: u32,
    height: u32,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut session = match config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    if let Some(scene) = scene {
        session.scene = scene;
    }
    if timed {
        session.motion = MotionMode::Timed;
    }
    let viewport = Viewport::new(i64::from(width), i64::from(height))
        .with_context(|| format!("viewport {width}x{height} must be non-zero"))?;

    tracing::info!(
        scene = session.scene.name(),
        motion = ?session.motion,
        frames,
        "starting simulation"
    );
    let mut render_loop = RenderLoop::new(DebugTextBackend::new(), &session, viewport)?;
    let frame_time = 1.0 / freelook_render::transform::REFERENCE_FRAME_RATE;
    let mut keys = keys.into_iter();
    let mut held: Option<Key> = None;
    for _ in 0..frames {
        // Each tapped key is held for exactly one frame.
        if let Some(key) = held.take() {
            render_loop.push_event(InputEvent::release(key));
        }
        if let Some(key) = keys.next() {
            render_loop.push_event(InputEvent::press(key));
            held = Some(key);
        }
        if render_loop.render_frame_elapsed(frame_time)? == LoopState::Terminating {
            break;
        }
    }

    if !quiet {
        for line in render_loop.backend().log() {
            println!("{line}");
        }
    }
    tracing::info!(
        frames = render_loop.frames(),
        state = ?render_loop.state(),
        "simulation finished"
    );
    let cam = render_loop.camera();
    let p = cam.position();
    let f = cam.front();
    println!("frames:   {}", render_loop.frames());
    println!("state:    {:?}", render_loop.state());
    println!("position: ({:.3}, {:.3}, {:.3})", p.x, p.y, p.z);
    println!("front:    ({:.3}, {:.3}, {:.3})", f.x, f.y, f.z);
    println!("yaw:      {:.2}  pitch: {:.2}", cam.yaw(), cam.pitch());
    render_loop.shutdown();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("freelook-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", freelook_common::crate_info());
            println!("input: {}", freelook_input::crate_info());
            println!("render: {}", freelook_render::crate_info());
            let names: Vec<&str> = ScenePreset::ALL.iter().map(|s| s.name()).collect();
            println!("scenes: {}", names.join(", "));
        }
        Commands::CheckShaders {
            scene,
            vertex,
            fragment,
        } => check_shaders(scene, vertex, fragment)?,
        Commands::Simulate {
            config,
            scene,
            frames,
            keys,
            timed,
            width,
            height,
            quiet,
        } => simulate(config, scene, frames, keys, timed, width, height, quiet)?,
        Commands::DefaultConfig => print!("{}", SessionConfig::default().to_yaml()?),
    }

    Ok(())
}
