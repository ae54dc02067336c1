// This is free and unencumbered software released into the public domain.

#[cfg(not(feature = "std"))]
compile_error!("ar-camera-viewer requires the 'std' feature");

use ar_camera_pipeline::{
    cli::{handle_error, info_user, warn_user},
    shared::{
        ArSession, CameraEvent, EffectRoster, EngineEvent, Facing, NoopEffectEngine,
        PipelineConfig, PipelineError, default_device, open_camera,
    },
};
use asimov_module::SysexitsError::{self, *};
use clap::Parser;
use clientele::StandardOptions;
use std::{
    error::Error as StdError,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::sync_channel,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

#[derive(Debug, Parser)]
struct Options {
    #[clap(flatten)]
    flags: StandardOptions,

    #[arg(long)]
    device: Option<String>,

    #[arg(short, long = "size", value_parser = parse_dimensions, default_value = "1920x1080")]
    size: (u32, u32),

    #[arg(short, long, value_parser = parse_frequency, default_value = "30")]
    frequency: f64,

    #[arg(long, value_enum, default_value = "front")]
    facing: LensFacing,

    /// Directory of effect asset files; defaults to the stock effect set.
    #[arg(long)]
    assets: Option<PathBuf>,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum LensFacing {
    Front,
    Back,
}

pub fn main() -> Result<SysexitsError, Box<dyn StdError>> {
    asimov_module::dotenv().ok();
    let args = asimov_module::args_os()?;
    let options = Options::parse_from(args);

    if options.flags.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(EX_OK);
    }

    if options.flags.license {
        print!("{}", include_str!("../../UNLICENSE"));
        return Ok(EX_OK);
    }

    #[cfg(feature = "tracing")]
    asimov_module::init_tracing_subscriber(&options.flags).expect("failed to initialize logging");

    let exit_code = match run_viewer(&options) {
        Ok(()) => EX_OK,
        Err(err) => handle_error(&err, &options.flags),
    };

    Ok(exit_code)
}

fn run_viewer(opts: &Options) -> Result<(), PipelineError> {
    info_user(&opts.flags, "starting ar camera viewer");

    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit2 = Arc::clone(&quit);
        ctrlc::set_handler(move || {
            quit2.store(true, Ordering::SeqCst);
        })
        .map_err(|e| PipelineError::other(format!("{e}")))?;
    }

    let (width, height) = opts.size;
    let facing = match opts.facing {
        LensFacing::Front => Facing::Front,
        LensFacing::Back => Facing::Back,
    };

    let device = opts
        .device
        .clone()
        .unwrap_or_else(|| default_device().to_string());
    info_user(&opts.flags, &format!("selected device: {device}"));

    let config = PipelineConfig::new(width, height, opts.frequency)
        .with_device(device.clone())
        .with_facing(facing)
        .with_diagnostics(opts.flags.debug || opts.flags.verbose >= 3);

    let roster = match &opts.assets {
        Some(dir) => EffectRoster::discover(dir)?,
        None => EffectRoster::default(),
    };
    info_user(
        &opts.flags,
        &format!("effect roster: {} entries", roster.len()),
    );

    let (engine_events_tx, engine_events_rx) = sync_channel(16);
    let engine = Arc::new(NoopEffectEngine::new(engine_events_tx));
    let session = ArSession::new(Arc::clone(&engine), engine_events_rx, &config, roster);

    let mut camera = open_camera(&device, config)?;
    session.attach(&camera);
    camera.start()?;

    // One line per effect advance; `s` requests a screenshot.
    let (input_tx, input_rx) = sync_channel::<String>(4);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if input_tx.send(line).is_err() {
                break;
            }
        }
    });

    println!("press Enter to cycle effects, `s` for a screenshot, Ctrl-C to quit");

    while !quit.load(Ordering::SeqCst) {
        for event in camera.events().try_iter() {
            match event {
                CameraEvent::FrameDropped { .. } => {
                    info_user(&opts.flags, "frame dropped (keep-only-latest)");
                },
                CameraEvent::Warning { message, .. } => warn_user(&opts.flags, &message),
                CameraEvent::Error { error, .. } => {
                    warn_user(&opts.flags, &format!("camera error: {error}"));
                },
                CameraEvent::Started { .. } | CameraEvent::Stopped { .. } => {},
            }
        }

        while let Ok(line) = input_rx.try_recv() {
            if line.trim() == "s" {
                session.take_screenshot()?;
            } else {
                let effect = session.advance_effect()?;
                println!("effect: {}", effect.name());
            }
        }

        if let Some(event) = session.poll_event(Duration::from_millis(50)) {
            match event {
                EngineEvent::ScreenshotTaken {
                    width,
                    height,
                    rgba,
                } => {
                    let path = screenshot_path();
                    match image::save_buffer(
                        &path,
                        &rgba,
                        width,
                        height,
                        image::ExtendedColorType::Rgba8,
                    ) {
                        Ok(()) => println!("screenshot saved to {}", path.display()),
                        Err(e) => warn_user(&opts.flags, &format!("screenshot save failed: {e}")),
                    }
                },
                EngineEvent::EffectSwitched { slot } => {
                    info_user(&opts.flags, &format!("engine switched effect in {slot}"));
                },
                EngineEvent::Error { kind, message } => {
                    warn_user(&opts.flags, &format!("engine {kind} error: {message}"));
                },
                EngineEvent::Initialized
                | EngineEvent::FaceVisibilityChanged { .. }
                | EngineEvent::ShutdownFinished => {},
            }
        }
    }

    // Teardown: surface away, engine down, camera stopped.
    session.set_render_surface(None, 0, 0)?;
    session.shutdown()?;
    let _ = camera.stop();

    info_user(
        &opts.flags,
        &format!("frames rendered: {}", engine.frames_received()),
    );
    Ok(())
}

fn screenshot_path() -> PathBuf {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    PathBuf::from(format!("screenshot-{secs}.png"))
}

fn parse_dimensions(s: &str) -> Result<(u32, u32), String> {
    let s = s.trim().replace('×', "x");
    let parts: Vec<&str> = s.split('x').map(|t| t.trim()).collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(format!("Invalid format '{s}'. Use WxH (e.g., 1920x1080)"));
    }

    let width: u32 = parts[0]
        .parse()
        .map_err(|_| format!("Invalid width: {}", parts[0]))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| format!("Invalid height: {}", parts[1]))?;

    if !(160..=7680).contains(&width) {
        return Err(format!("Width {width} is out of reasonable range (160-7680)"));
    }
    if !(120..=4320).contains(&height) {
        return Err(format!("Height {height} is out of reasonable range (120-4320)"));
    }

    Ok((width, height))
}

fn parse_frequency(s: &str) -> Result<f64, String> {
    let freq: f64 = s.parse().map_err(|_| format!("Invalid frequency: {s}"))?;

    if freq <= 0.0 {
        return Err("Frequency must be positive".to_string());
    }
    if freq > 240.0 {
        return Err(format!("Frequency {freq} Hz exceeds reasonable maximum (240 Hz)"));
    }
    if freq < 0.1 {
        return Err(format!("Frequency {freq} Hz is below reasonable minimum (0.1 Hz)"));
    }

    Ok(freq)
}
