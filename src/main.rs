use std::{env, path::PathBuf, process::ExitCode, thread, time::Instant};

use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

use capture::{MonitorCapture, ScreenGrabber};
use config::Config;
use counter::DeathCounter;
use detector::Detector;
use error::Result;
use mask::Mask;
use region::{CropRegion, ScreenScale};
use sound::Sound;

mod capture;
mod config;
mod counter;
mod detector;
mod error;
mod mask;
mod overlay;
mod region;
mod sound;

/// What has to be ready before the first grab, all of it fatal on failure.
struct Prepared {
    region: CropRegion,
    reference: Mask,
    counter: DeathCounter,
}

fn main() -> ExitCode {
    init_logging();

    let config = match exe_dir() {
        Some(dir) => Config::default().resolve_paths(&dir),
        None => Config::default(),
    };

    let prepared = match prepare(&config, &MonitorCapture) {
        Ok(prepared) => prepared,
        Err(err) => {
            error!(%err, "cannot prepare the reference mask, stopping");
            return ExitCode::FAILURE;
        }
    };

    if !config.overlay {
        watch(prepared, &config);
    }

    let counter_file = config.counter_file.clone();
    let refresh = config.overlay_refresh;

    let spawned = thread::Builder::new()
        .name("detector".into())
        .spawn(move || {
            watch(prepared, &config);
        });
    if let Err(err) = spawned {
        error!(%err, "failed to start the detector thread");
        return ExitCode::FAILURE;
    }

    // The window owns the main thread, closing it ends the process.
    match overlay::run(counter_file, refresh) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "overlay failed");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn exe_dir() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    exe.parent().map(PathBuf::from)
}

fn prepare(config: &Config, grabber: &impl ScreenGrabber) -> Result<Prepared> {
    let (width, height) = grabber.screen_size()?;
    let scale = ScreenScale::from_screen_size(width, height);
    let region = scale.crop_region();
    info!(width, height, ?scale, ?region, "detected screen");

    let reference = mask::reference_mask(&config.reference_image, scale, region, config.color_range)?;
    info!(pixels = reference.count_on(), "reference mask ready");
    let counter = DeathCounter::load(&config.counter_file);

    Ok(Prepared {
        region,
        reference,
        counter,
    })
}

/// Runs the detector forever on the current thread.
fn watch(prepared: Prepared, config: &Config) -> ! {
    let mut detector = Detector::new(
        MonitorCapture,
        prepared.region,
        prepared.reference,
        prepared.counter,
        config,
        Instant::now(),
    );

    if config.play_sound {
        match Sound::open(&config.sound_file) {
            Ok(sound) => detector.add_notifier(sound),
            Err(err) => warn!(%err, path = %config.sound_file.display(), "death sound disabled"),
        }
    }

    detector.run()
}
