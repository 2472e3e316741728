//! Point-and-click engine command line.
//!
//! Subcommands:
//!
//! - `pipes <FILE>` evaluates a pipes grid, optionally after turning tiles
//!   or scrambling it, and prints the evaluation as JSON.
//! - `gears <FILE>` evaluates a gear train and prints the evaluation.
//! - `demo` runs a small headless game with a recording surface and
//!   scripted clicks, logging what happened.
//!
//! # Running
//!
//! ```sh
//! RUST_LOG=debug cargo run -- demo --frames 240
//! cargo run -- pipes assets/puzzles/pipes.json --scramble 7
//! ```

mod demo;

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{info, warn};
use pointclick::engine::Engine;
use pointclick::events::input::RawInput;
use pointclick::plugins::EnginePlugin;
use pointclick::plugins::inventory::InventoryPlugin;
use pointclick::puzzles::{GearsState, PipesState};
use pointclick::resources::assetsource::MemorySource;
use pointclick::resources::gameconfig::EngineConfig;
use pointclick::resources::rendertarget::RecordingSurface;
use pointclick::resources::storage::MemoryStorage;
use pointclick::resources::worldtime::ManualClock;

use crate::demo::{EndScene, GRID_X, GRID_Y, PipesScene, TILE, TitleScene};

const FRAME_MS: f64 = 1000.0 / 60.0;

/// Point-and-click engine
#[derive(Parser)]
#[command(version, about = "Headless point-and-click engine core and puzzle tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a pipes grid and print the result as JSON.
    Pipes {
        file: PathBuf,
        /// Turn the tile at X,Y a quarter clockwise. Repeatable.
        #[arg(long, value_name = "X,Y")]
        rotate: Vec<String>,
        /// Scramble the grid with this seed before evaluating.
        #[arg(long, value_name = "SEED")]
        scramble: Option<u64>,
        /// Print the resulting grid too.
        #[arg(long)]
        print_grid: bool,
    },
    /// Evaluate a gear train and print the result as JSON.
    Gears { file: PathBuf },
    /// Run the headless demo game.
    Demo {
        /// Frames to run after the scripted clicks.
        #[arg(long, default_value_t = 120)]
        frames: u32,
        /// Engine configuration file.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Seed used to scramble the puzzle.
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Pipes {
            file,
            rotate,
            scramble,
            print_grid,
        } => run_pipes(&file, &rotate, scramble, print_grid),
        Command::Gears { file } => run_gears(&file),
        Command::Demo { frames, config, seed } => run_demo(frames, config, seed),
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn parse_coords(text: &str) -> Result<(usize, usize), String> {
    let (x, y) = text
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{}'", text))?;
    let x = x.trim().parse().map_err(|_| format!("bad column in '{}'", text))?;
    let y = y.trim().parse().map_err(|_| format!("bad row in '{}'", text))?;
    Ok((x, y))
}

fn run_pipes(file: &PathBuf, rotate: &[String], scramble: Option<u64>, print_grid: bool) -> Result<(), String> {
    let text = std::fs::read_to_string(file).map_err(|e| format!("reading {}: {}", file.display(), e))?;
    let mut grid = PipesState::from_json(&text).map_err(|e| e.to_string())?;
    if let Some(seed) = scramble {
        grid = grid.scrambled(seed);
    }
    for spec in rotate {
        let (x, y) = parse_coords(spec)?;
        if !grid.rotate(x, y) {
            warn!("nothing to rotate at {},{}", x, y);
        }
    }
    let out = serde_json::to_string_pretty(grid.evaluation()).map_err(|e| e.to_string())?;
    println!("{out}");
    if print_grid {
        println!("{}", grid.to_json());
    }
    Ok(())
}

fn run_gears(file: &PathBuf) -> Result<(), String> {
    let text = std::fs::read_to_string(file).map_err(|e| format!("reading {}: {}", file.display(), e))?;
    let gears = GearsState::from_json(&text).map_err(|e| e.to_string())?;
    let out = serde_json::to_string_pretty(gears.evaluation()).map_err(|e| e.to_string())?;
    println!("{out}");
    Ok(())
}

/// Queue a left click. Press and release land in the same frame.
fn click(engine: &Engine, x: f32, y: f32) {
    let Some(tx) = engine.input_sender() else {
        warn!("input is detached, click at {},{} dropped", x, y);
        return;
    };
    let down = RawInput::MouseDown {
        client_x: x,
        client_y: y,
        button: 0,
    };
    let up = RawInput::MouseUp {
        client_x: x,
        client_y: y,
        button: 0,
    };
    if tx.send(down).and_then(|_| tx.send(up)).is_err() {
        warn!("input channel closed");
    }
}

fn run_demo(frames: u32, config_path: Option<PathBuf>, seed: u64) -> Result<(), String> {
    let mut config = match config_path {
        Some(path) => {
            let mut config = EngineConfig::with_path(path);
            config.load_from_file().map_err(|e| e.to_string())?;
            config
        }
        None => EngineConfig::new(),
    };
    config.debug_overlay = false;

    let solved = demo::sample_grid().map_err(|e| e.to_string())?;
    let puzzle = solved.scrambled(seed);
    let taps: Vec<(usize, usize, u8)> = solved
        .tiles()
        .iter()
        .zip(puzzle.tiles())
        .enumerate()
        .map(|(i, (want, have))| {
            let turns = (want.rotation + 4 - have.rotation) % 4;
            (i % solved.width(), i / solved.width(), turns)
        })
        .filter(|(_, _, turns)| *turns > 0)
        .collect();

    let clock = ManualClock::new();
    let surface = RecordingSurface::new();
    let mut engine = Engine::new(
        config.clone(),
        Box::new(surface.clone()),
        Rc::new(clock.clone()),
        Arc::new(MemorySource::new()),
        Box::new(MemoryStorage::new()),
    );
    engine.register_scene(Box::new(TitleScene::new(config.width, config.height)));
    engine.register_scene(Box::new(PipesScene::new(puzzle)));
    engine.register_scene(Box::new(EndScene));
    engine.register_plugin(EnginePlugin::Inventory(InventoryPlugin::new()));
    engine.start("title").map_err(|e| e.to_string())?;
    engine.run_frames(2, FRAME_MS, &clock);

    click(&engine, 10.0, 10.0);
    engine.run_frames(30, FRAME_MS, &clock);
    info!("now in scene {:?}", engine.scenes().current_id());

    for (x, y, turns) in taps {
        let cx = GRID_X + (x as f32 + 0.5) * TILE;
        let cy = GRID_Y + (y as f32 + 0.5) * TILE;
        for _ in 0..turns {
            click(&engine, cx, cy);
            // Past the double-tap window so every click counts alone.
            engine.run_frames(24, FRAME_MS, &clock);
        }
    }
    surface.take();
    engine.run_frames(frames, FRAME_MS, &clock);

    info!(
        "demo finished in scene {:?} after {:.2}s, pipes solved: {}, {} draw commands in the final stretch",
        engine.scenes().current_id(),
        engine.time().elapsed,
        engine.state().get::<bool>("pipes_solved").unwrap_or(false),
        surface.len()
    );
    info!("scene history: {:?}", engine.scenes().history());
    engine.destroy();
    Ok(())
}
