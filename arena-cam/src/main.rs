//! The arena locator service.
//!
//! Drives the vision core in a loop, publishes robot locations once per
//! second, and serves the annotated scene as an MJPEG stream over HTTP.
//! With no hardware backend compiled in, a simulated arena scene stands in
//! for the camera so the whole service can be exercised end to end.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use eyre::WrapErr;
use tracing::{info, warn};

use arena_bus::{publish_locations, LogPublisher};
use arena_camera::ArenaCamera;
use arena_http_video_streaming::{
    encode_scene, frame_channel, serve, FrameSender, JPEG_QUALITY, MAX_STREAM_WIDTH,
};
use arena_params::ParamStore;
use arena_processor::{ArenaLocator, LocatorConfig};

mod sim_scene;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Zero-based camera device index.
    #[arg(long, default_value_t = 0)]
    camera_index: u32,

    /// Parameter settings file.
    #[arg(long, default_value = "Settings.json")]
    settings: PathBuf,

    /// HTTP listen address for the video stream.
    #[arg(long, default_value = "0.0.0.0:8000")]
    http_addr: SocketAddr,

    /// Record annotated scenes at this rate; 0 disables recording.
    #[arg(long, default_value_t = 0.0)]
    recording_fps: f64,

    /// Recording output file.
    #[arg(long, default_value = "output.fmf")]
    recording_path: PathBuf,

    /// Run detection on the full-frame edge map instead of the faster
    /// mask-sized one.
    #[arg(long)]
    full_edges: bool,
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};
    let evt_fmt = fmt::format()
        .with_timer(fmt::time::uptime())
        .compact();
    tracing_subscriber::registry()
        .with(fmt::layer().event_format(evt_fmt))
        .with(EnvFilter::from_default_env())
        .init();
}

#[cfg(feature = "backend_nokhwa")]
fn open_camera(cli: &Cli) -> eyre::Result<Box<dyn ArenaCamera>> {
    let camera = arena_camera::NokhwaCamera::new(cli.camera_index)
        .wrap_err("opening camera device")?;
    Ok(Box::new(camera))
}

#[cfg(not(feature = "backend_nokhwa"))]
fn open_camera(_cli: &Cli) -> eyre::Result<Box<dyn ArenaCamera>> {
    info!("no camera backend compiled in; using the simulated arena");
    Ok(Box::new(sim_scene::demo_camera()))
}

/// The consumer loop: detection ticks as fast as frames allow, location
/// broadcasts once per second.
fn run_driver(mut locator: ArenaLocator, frame_tx: FrameSender, flag: thread_control::Flag) {
    let mut publisher = LogPublisher;
    let mut last_push: Option<std::time::Instant> = None;

    while flag.is_alive() {
        match locator.update() {
            Ok(scene) => {
                match encode_scene(&scene, MAX_STREAM_WIDTH, JPEG_QUALITY) {
                    Ok(jpeg) => {
                        // receivers may all be gone; that only means no
                        // browser is watching
                        let _ = frame_tx.send(Some(jpeg));
                    }
                    Err(e) => warn!("could not encode scene: {e}"),
                }

                let due = last_push.map_or(true, |t| t.elapsed().as_secs_f64() >= 1.0);
                if due {
                    let robots = locator.get_robots();
                    publish_locations(&robots, &mut publisher);
                    last_push = Some(std::time::Instant::now());
                }
                std::thread::sleep(std::time::Duration::from_millis(30));
            }
            Err(arena_processor::Error::NotReady) => {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
            Err(e) => {
                warn!("update failed: {e}");
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
        }
    }
    locator.stop();
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let params = ParamStore::open(&cli.settings);
    let camera = open_camera(&cli)?;
    let locator = ArenaLocator::new(
        camera,
        params,
        LocatorConfig {
            use_small_edges: !cli.full_edges,
            recording_fps: cli.recording_fps,
            recording_path: cli.recording_path.clone(),
        },
    )
    .wrap_err("starting the arena locator")?;

    let (frame_tx, frame_rx) = frame_channel();
    let (flag, control) = thread_control::make_pair();
    let driver = std::thread::Builder::new()
        .name("arena-driver".to_string())
        .spawn(move || run_driver(locator, frame_tx, flag))
        .wrap_err("spawning driver thread")?;

    info!("serving video on http://{}/", cli.http_addr);
    tokio::select! {
        result = serve(cli.http_addr, frame_rx) => {
            result.wrap_err("HTTP server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }

    control.stop();
    if driver.join().is_err() {
        warn!("driver thread panicked");
    }
    Ok(())
}
