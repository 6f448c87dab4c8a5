use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;

use selfmask_engine::core::{FrameOutcome, SelfFilter};
use selfmask_engine::device::{GpuInit, GraphicsDevice};
use selfmask_engine::logging::init_logging;
use selfmask_engine::model::{DirectoryModelSource, MeshLibrary, load_models};
use selfmask_engine::window::{DebugDisplay, DisplayConfig};

mod config;
mod publisher;
mod replay;

use config::NodeConfig;
use publisher::FilePublisher;
use replay::ReplaySource;

#[derive(Parser)]
#[command(name = "selfmask-node", version, about = "Replays recorded depth frames through the robot self-filter")]
struct Cli {
    /// Node configuration file (TOML)
    config: PathBuf,
    /// Stop after this many frames
    #[arg(long)]
    limit: Option<usize>,
    /// Never open the debug display, whatever `show_gui` says
    #[arg(long)]
    no_gui: bool,
    /// Force the software fallback adapter
    #[arg(long)]
    software: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = NodeConfig::load(&cli.config)?;
    init_logging(config.filter.logging());
    config.filter.log_summary();

    let gpu = GraphicsDevice::new(GpuInit {
        force_fallback_adapter: cli.software,
        ..GpuInit::default()
    })?;

    let source = DirectoryModelSource::new(&config.replay.models_dir);
    let mut library = MeshLibrary::new();
    let models = load_models(&config.filter.models, &source, &mut library);

    let settings = config.filter.settings();
    let camera_frame = settings.camera_frame.clone();
    let show_display = settings.show_debug_display && !cli.no_gui;
    let mut filter = SelfFilter::new(settings, models, library);

    if show_display {
        let display_config = DisplayConfig {
            title: format!("selfmask: {camera_frame}"),
            ..DisplayConfig::default()
        };
        match DebugDisplay::new(&gpu, display_config) {
            Ok(display) => filter.attach_display(display),
            Err(e) => log::error!("debug display unavailable: {e:#}"),
        }
    }

    let replay = &config.replay;
    let frames = ReplaySource::new(
        replay.frames.clone(),
        replay.width,
        replay.height,
        replay.frame_id.clone().unwrap_or_else(|| camera_frame.clone()),
        replay.rate_hz,
    );
    let intrinsics = replay.intrinsics();
    let poses = replay.pose_lookup();
    let mut publisher = FilePublisher::new(&replay.output_dir, replay.write_depth, replay.write_mask)?;

    if frames.is_empty() {
        log::warn!("no frames listed in [replay]; nothing to do");
    }
    log::info!(
        "replaying {} frame(s) at {}x{} into {}",
        frames.len(),
        replay.width,
        replay.height,
        publisher.dir().display()
    );

    let (mut published, mut skipped, mut unreadable) = (0usize, 0usize, 0usize);
    for (path, frame) in frames.take(cli.limit.unwrap_or(usize::MAX)) {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("{e:#}");
                unreadable += 1;
                continue;
            }
        };

        match filter.process(&gpu, &frame, &intrinsics, &poses, &mut publisher) {
            FrameOutcome::Published { .. } => published += 1,
            FrameOutcome::Skipped(reason) => {
                log::warn!("{} skipped: {reason}", path.display());
                skipped += 1;
            }
        }
    }

    log::info!(
        "replay finished: {published} published, {skipped} skipped, {unreadable} unreadable; \
         wrote {} depth and {} mask file(s)",
        publisher.depth_written(),
        publisher.mask_written()
    );
    gpu.wait_idle()?;
    Ok(())
}
