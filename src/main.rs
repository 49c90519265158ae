use std::error::Error;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand, ValueEnum};
use futures::executor::block_on;
use serde::Serialize;

use focus_ring::adapters::JsonManifestAdapter;
use focus_ring::engine::{AdapterRegistry, NavigationBridge, VolumeAdapter, VolumeSnapshot};
use focus_ring::render::{
    ManualFrameScheduler, PyramidLayout, RingFrame, RingRenderer, RotationChoreographer, Viewport,
};
use focus_ring::telemetry::LogSink;
use focus_ring::RingConfig;

#[derive(Parser)]
#[command(name = "focus-ring")]
#[command(about = "Focus-ring navigator: compute ring frames from a volume manifest")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a manifest and print one ring frame as JSON
    Frame {
        /// JSON manifest to load
        #[arg(short, long)]
        manifest: PathBuf,

        /// Volume id (defaults to the manifest file stem)
        #[arg(long)]
        volume: Option<String>,

        /// Ring config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = 400.0)]
        width: f32,

        #[arg(long, default_value_t = 800.0)]
        height: f32,

        /// Item to focus before rendering
        #[arg(long)]
        focus: Option<String>,

        /// Deep-link token to resolve before rendering
        #[arg(long)]
        deep_link: Option<String>,

        /// Descend into the selection's children this many times
        #[arg(long, default_value_t = 0)]
        descend: usize,

        /// Explicit rotation (radians); defaults to the selection on the magnifier
        #[arg(long, allow_hyphen_values = true)]
        rotation: Option<f32>,

        #[arg(long, value_enum, default_value_t = LayoutArg::Arcs)]
        layout: LayoutArg,

        /// Grid columns when --layout grid
        #[arg(long, default_value_t = 4)]
        columns: usize,

        /// Decorative fan lines (0 disables the spiral decoration)
        #[arg(long, default_value_t = 0)]
        fan_lines: usize,

        #[arg(long)]
        pretty: bool,
    },

    /// Validate a manifest without rendering
    Validate {
        #[arg(short, long)]
        manifest: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Arcs,
    Grid,
}

#[derive(Serialize)]
struct FrameReport {
    volume: VolumeSnapshot,
    level: Option<String>,
    frame: RingFrame,
}

fn volume_id_for(manifest: &Path, volume: Option<String>) -> String {
    volume.unwrap_or_else(|| {
        manifest
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "volume".to_string())
    })
}

#[allow(clippy::too_many_arguments)]
fn render_frame(
    manifest: PathBuf,
    volume: Option<String>,
    config: Option<PathBuf>,
    viewport: Viewport,
    focus: Option<String>,
    deep_link: Option<String>,
    descend: usize,
    rotation: Option<f32>,
    layout: PyramidLayout,
    fan_lines: usize,
) -> Result<FrameReport, Box<dyn Error>> {
    let config = match config {
        Some(path) => RingConfig::load(path)?,
        None => RingConfig::default(),
    };
    let volume_id = volume_id_for(&manifest, volume);
    let adapter = Rc::new(JsonManifestAdapter::from_file(volume_id.clone(), manifest));
    let bridge = NavigationBridge::new(AdapterRegistry::new().with(adapter))
        .with_telemetry(Rc::new(LogSink));

    let renderer = RingRenderer::new(viewport, config.clone())
        .with_pyramid_layout(layout)
        .with_decoration(fan_lines)
        .with_telemetry(Rc::new(LogSink));

    // headless: no frame clock, so the ring only ever jumps
    let choreo = RotationChoreographer::from_config(Rc::new(ManualFrameScheduler::new()), &config);
    bridge.attach_ring(choreo.clone(), renderer.spacing());

    block_on(bridge.switch_volume(&volume_id))?;
    if let Some(token) = deep_link {
        block_on(bridge.resolve_deep_link(&token, None))?;
    }
    if let Some(id) = focus {
        bridge.focus(&id)?;
    }
    for _ in 0..descend {
        if !bridge.descend()? {
            log::info!("Selection has no children; stopping descent");
            break;
        }
    }
    if let Some(rotation) = rotation {
        choreo.jump_to(rotation);
    }

    let slots = bridge.slots();
    let selected = bridge.current_item();
    let children = bridge.children_of_selection();
    let frame = renderer.compose(&slots, selected.as_ref(), choreo.rotation(), &children);
    Ok(FrameReport {
        volume: bridge.snapshot(),
        level: bridge.level(),
        frame,
    })
}

fn validate_manifest(manifest: PathBuf) -> Result<bool, Box<dyn Error>> {
    let volume_id = volume_id_for(&manifest, None);
    let adapter = JsonManifestAdapter::from_file(volume_id, manifest);
    let raw = block_on(adapter.load_manifest())?;
    let validation = block_on(adapter.validate(&raw));
    if validation.ok {
        println!("ok");
    } else {
        for error in &validation.errors {
            println!("{error}");
        }
    }
    Ok(validation.ok)
}

fn run(cli: Cli) -> Result<bool, Box<dyn Error>> {
    match cli.command {
        Commands::Frame {
            manifest,
            volume,
            config,
            width,
            height,
            focus,
            deep_link,
            descend,
            rotation,
            layout,
            columns,
            fan_lines,
            pretty,
        } => {
            let viewport = Viewport::try_new(width, height)?;
            let layout = match layout {
                LayoutArg::Arcs => PyramidLayout::Arcs,
                LayoutArg::Grid => PyramidLayout::Grid { columns },
            };
            let report = render_frame(
                manifest, volume, config, viewport, focus, deep_link, descend, rotation, layout,
                fan_lines,
            )?;
            let json = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{json}");
            Ok(true)
        }
        Commands::Validate { manifest } => validate_manifest(manifest),
    }
}

fn main() {
    env_logger::init();

    match run(Cli::parse()) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
