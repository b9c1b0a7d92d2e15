// SPDX-License-Identifier: MPL-2.0
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use vdec_player::backend::ffmpeg::FfmpegBackend;
use vdec_player::config::{self, PlayerConfig};
use vdec_player::error::{Error, Result, VideoError};
use vdec_player::{RgbImage, Status, VideoPlayer};

const HELP: &str = "\
Usage: vdec-play <source> [options]

Options:
  --speed X          playback speed multiplier (0.1 - 3.0)
  --seek S           start position in seconds
  --snapshot FILE    write the frame shown after seeking as a binary PPM
  --config FILE      player.toml to use instead of the user config
  -h, --help         print this help
";

struct Options {
    source: String,
    speed: Option<f64>,
    seek: Option<f64>,
    snapshot: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args() -> std::result::Result<Option<Options>, pico_args::Error> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        return Ok(None);
    }

    let speed = args.opt_value_from_str("--speed")?;
    let seek = args.opt_value_from_str("--seek")?;
    let snapshot = args.opt_value_from_str("--snapshot")?;
    let config = args.opt_value_from_str("--config")?;
    let source = args.free_from_str()?;

    Ok(Some(Options {
        source,
        speed,
        seek,
        snapshot,
        config,
    }))
}

fn load_config(path: Option<&Path>) -> PlayerConfig {
    let loaded = match path {
        Some(path) => config::load_from_path(path),
        None => config::load(),
    };
    loaded.unwrap_or_else(|e| {
        log::warn!("Using default configuration: {e}");
        PlayerConfig::default()
    })
}

fn write_ppm(path: &Path, image: &RgbImage) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    write!(file, "P6\n{} {}\n255\n", image.width(), image.height())?;
    file.write_all(image.data())?;
    Ok(())
}

fn run(options: Options) -> Result<()> {
    let config = load_config(options.config.as_deref());
    let player = VideoPlayer::with_config(FfmpegBackend::new(), config);
    log::debug!("FFmpeg configuration: {}", player.configuration());

    if !player.open(&options.source) {
        return Err(Error::Video(VideoError::SourceUnavailable(options.source)));
    }
    println!(
        "{}: {}x{}, {:.3}s",
        options.source,
        player.width(),
        player.height(),
        player.total_time()
    );

    if !player.set_callback(|_frame| {}, |millis| println!("{millis} ms")) {
        return Err(Error::Playback("callbacks could not be registered".into()));
    }
    if let Some(speed) = options.speed {
        if !player.set_video_speed(speed) {
            return Err(Error::Config(format!("speed {speed} is out of range")));
        }
    }
    if let Some(position) = options.seek {
        player.seek(position);
    }
    if let Some(path) = options.snapshot.as_deref() {
        match player.current_rgb() {
            Some(image) => write_ppm(path, &image)?,
            None => log::warn!("No frame available for a snapshot"),
        }
    }

    if player.status() == Status::Stop && !player.start() {
        return Err(Error::Playback("playback could not be started".into()));
    }
    while player.status() != Status::Stop {
        std::thread::sleep(Duration::from_millis(50));
    }
    player.stop();
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = match parse_args() {
        Ok(Some(options)) => options,
        Ok(None) => {
            print!("{HELP}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{e}\n\n{HELP}");
            return ExitCode::from(2);
        }
    };

    match run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
