//! wr - windreplay CLI
//!
//! Inspect, optimize and convert `.MacroScript` files, and dry-run them
//! against the in-memory backend to check timing and fail-safe behaviour.

mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use windreplay::prelude::*;
use windreplay::windreplay_recorder::codec::{self, Format};
use windreplay::windreplay_recorder::settings::SETTINGS_FILE;
use windreplay::windreplay_recorder::storage;
use windreplay::windreplay_core::tween_path;
use windreplay::{BackendCall, Outcome, Summary};

#[derive(Parser)]
#[command(name = "wr")]
#[command(about = "windreplay - inspect, convert and dry-run recorded macros")]
#[command(version)]
struct Cli {
    /// Macro directory (defaults to the settings file, then ~/.windreplay)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,
    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved macros
    List,
    /// Show macro info
    Show {
        file: String,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
    /// Drop redundant samples and save the result
    Optimize {
        file: String,
        /// Output name (defaults to `<name>_optimized`)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Rewrite a legacy macro in the current format
    Convert {
        file: String,
        /// Output name (defaults to `<name>_v1`)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Dry-run a macro against the in-memory backend (Ctrl+C cancels)
    Play {
        file: String,
        #[arg(short, long)]
        loops: Option<u32>,
        #[arg(long)]
        motion: Option<Motion>,
        #[arg(long)]
        seed: Option<u64>,
        /// Put the fail-safe corner here, e.g. `0,0`
        #[arg(long, value_parser = parse_point)]
        guard: Option<(i32, i32)>,
        #[arg(long)]
        json: bool,
    },
    /// Print a synthesized pointer path as JSON
    Path {
        #[arg(value_parser = parse_point)]
        from: (i32, i32),
        #[arg(value_parser = parse_point)]
        to: (i32, i32),
        #[arg(long, default_value = "wind")]
        motion: Motion,
        #[arg(long)]
        seed: Option<u64>,
        /// Tween step count
        #[arg(long, default_value = "25")]
        steps: usize,
        #[arg(long, default_value = "ease-in-out")]
        easing: EasingArg,
    },
    /// Delete a saved macro
    Delete { file: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Motion {
    Teleport,
    Wind,
    Tween,
}

#[derive(Clone, Copy, ValueEnum)]
enum EasingArg {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl From<EasingArg> for Easing {
    fn from(e: EasingArg) -> Self {
        match e {
            EasingArg::Linear => Easing::Linear,
            EasingArg::EaseIn => Easing::EaseIn,
            EasingArg::EaseOut => Easing::EaseOut,
            EasingArg::EaseInOut => Easing::EaseInOut,
        }
    }
}

impl Motion {
    fn style(self, steps: usize, easing: Easing) -> MotionStyle {
        match self {
            Motion::Teleport => MotionStyle::Teleport,
            Motion::Wind => MotionStyle::Wind(WindMouse::default()),
            Motion::Tween => MotionStyle::Tween { easing, steps },
        }
    }
}

#[derive(Serialize)]
struct Output<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Error>,
}

impl<T: Serialize> Output<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
    fn err(e: Error) -> Output<()> {
        Output { success: false, data: None, error: Some(e) }
    }
}

fn print_json<T: Serialize>(output: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(output)?);
    Ok(())
}

fn parse_point(s: &str) -> Result<(i32, i32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{}`", s))?;
    let x = x.trim().parse().map_err(|e| format!("bad x `{}`: {}", x, e))?;
    let y = y.trim().parse().map_err(|e| format!("bad y `{}`: {}", y, e))?;
    Ok((x, y))
}

fn main() {
    let cli = Cli::parse();
    let settings = load_settings();
    logging::init(cli.verbose || settings.debug_logging);

    let result = match open_storage(&cli, &settings) {
        Ok(storage) => match cli.command {
            Commands::List => list(&storage),
            Commands::Show { file, all, json } => show(&storage, &file, all, json),
            Commands::Optimize { file, output } => optimize(&storage, &file, output.as_deref()),
            Commands::Convert { file, output } => convert(&storage, &file, output.as_deref()),
            Commands::Play { file, loops, motion, seed, guard, json } => {
                let mut config = settings.playback_config();
                if let Some(m) = motion {
                    config.motion = m.style(25, Easing::EaseInOut);
                }
                config.seed = seed;
                play(&storage, &file, loops.unwrap_or(settings.loops), config, guard, json)
            }
            Commands::Path { from, to, motion, seed, steps, easing } => {
                path(from, to, motion.style(steps, easing.into()), seed)
            }
            Commands::Delete { file } => delete(&storage, &file),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_settings() -> Settings {
    let Ok(dir) = storage::default_dir() else {
        return Settings::default();
    };
    Settings::load(dir.join(SETTINGS_FILE)).unwrap_or_else(|e| {
        eprintln!("Ignoring unreadable {}: {:#}", SETTINGS_FILE, e);
        Settings::default()
    })
}

fn open_storage(cli: &Cli, settings: &Settings) -> Result<MacroStorage> {
    let dir = match &cli.dir {
        Some(dir) => dir.clone(),
        None => settings.storage_dir()?,
    };
    tracing::debug!(dir = %dir.display(), "using macro storage");
    MacroStorage::with_dir(dir)
}

fn stem(file: &str) -> String {
    Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("macro")
        .to_string()
}

fn list(storage: &MacroStorage) -> Result<()> {
    let files = storage.list()?;
    if files.is_empty() {
        println!("No macros saved in {}.", storage.path().display());
    } else {
        for f in files {
            println!("{}", f);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ShowInfo<'a> {
    file: &'a str,
    format: &'static str,
    version: u32,
    timestamp: f64,
    summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<&'a [Event]>,
}

fn show(storage: &MacroStorage, file: &str, all: bool, json: bool) -> Result<()> {
    let (format, script) = storage.load_with_format(file)?;
    let summary = Summary::of(&script.events);
    let format = match format {
        Format::Versioned => "v1",
        Format::Legacy => "legacy",
    };

    if json {
        return print_json(&Output::ok(ShowInfo {
            file,
            format,
            version: script.version,
            timestamp: script.timestamp,
            summary,
            events: all.then_some(script.events.as_slice()),
        }));
    }

    println!("File: {}", file);
    println!("Format: {}", format);
    println!("Events: {}", summary.total());
    println!(
        "\nSummary: {} moves, {} clicks, {} keys, {} window changes over {:.2}s",
        summary.moves, summary.clicks, summary.keys, summary.window_changes, summary.duration
    );
    if all {
        for (i, e) in script.events.iter().enumerate() {
            println!("{:>5} {:>9.3}s  {:?}", i, e.t, e.data);
        }
    }
    Ok(())
}

fn optimize(storage: &MacroStorage, file: &str, output: Option<&str>) -> Result<()> {
    let script = storage.load(file)?;
    let before = script.events.len();
    let optimized = MacroScript {
        events: codec::optimize(&script.events),
        ..script
    };
    let name = output.map(str::to_string).unwrap_or_else(|| format!("{}_optimized", stem(file)));
    let path = storage.save(&optimized, Some(&name))?;
    println!("Optimized: {} -> {} events", before, optimized.events.len());
    println!("Saved: {}", path.display());
    Ok(())
}

fn convert(storage: &MacroStorage, file: &str, output: Option<&str>) -> Result<()> {
    let (format, script) = storage.load_with_format(file)?;
    if format == Format::Versioned {
        println!("{} is already in the current format.", file);
        return Ok(());
    }
    let name = output.map(str::to_string).unwrap_or_else(|| format!("{}_v1", stem(file)));
    let path = storage.save(&script, Some(&name))?;
    println!("Converted {} events", script.events.len());
    println!("Saved: {}", path.display());
    Ok(())
}

#[derive(Serialize)]
struct PlayInfo {
    report: PlaybackReport,
    calls: usize,
}

fn play(
    storage: &MacroStorage,
    file: &str,
    loops: u32,
    config: PlaybackConfig,
    guard: Option<(i32, i32)>,
    json: bool,
) -> Result<()> {
    let script = storage.load(file)?;

    let titles: Vec<String> = script
        .events
        .iter()
        .filter_map(|e| match &e.data {
            EventData::WindowFocus { title } => Some(title.clone()),
            _ => None,
        })
        .collect();
    let mut backend = HeadlessBackend::new().with_windows(titles);
    if let Some(corner) = guard {
        backend = backend.with_guard(corner);
    }
    let backend = Arc::new(backend);
    let player = Player::with_config(backend.clone(), config, Notifier::disabled());

    let state = player.state();
    ctrlc::set_handler(move || state.cancel()).context("installing Ctrl+C handler")?;

    if !json {
        println!(
            "Playing {} ({} events, {} loop{}) against the in-memory backend...",
            file,
            script.events.len(),
            loops,
            if loops == 1 { "" } else { "s" }
        );
    }

    let report = match player.play_blocking(script.events, loops) {
        Ok(report) => report,
        Err(e) if json => {
            print_json(&Output::<()>::err(e.clone()))?;
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    let calls = backend.calls();

    if json {
        return print_json(&Output::ok(PlayInfo {
            report,
            calls: calls.len(),
        }));
    }

    let clicks = calls.iter().filter(|c| matches!(c, BackendCall::Click(_))).count();
    let keys = calls.iter().filter(|c| matches!(c, BackendCall::Press(_))).count();
    match &report.outcome {
        Outcome::Completed => println!("Done!"),
        Outcome::Cancelled => println!("Cancelled."),
        Outcome::Faulted(reason) => println!("Stopped: {}", reason),
    }
    println!(
        "{} loops, {} actions dispatched ({} warnings), {} clicks, {} key presses",
        report.loops_completed, report.dispatched, report.warnings, clicks, keys
    );
    Ok(())
}

fn path(from: (i32, i32), to: (i32, i32), style: MotionStyle, seed: Option<u64>) -> Result<()> {
    let points = match style {
        MotionStyle::Tween { easing, steps } => tween_path(from, to, steps, easing),
        _ => {
            let mut rng = match seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            };
            style.waypoints(from, to, &mut rng)
        }
    };
    print_json(&points)
}

fn delete(storage: &MacroStorage, file: &str) -> Result<()> {
    storage.delete(file)?;
    println!("Deleted: {}", file);
    Ok(())
}
