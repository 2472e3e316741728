//! A tiny headless game used by the `demo` subcommand.
//!
//! Three scenes: a title card, a pipes puzzle played with taps and an
//! ending. The driver in `main.rs` feeds synthetic mouse clicks that solve
//! the puzzle, so a run exercises input, zones, state, cutscenes and scene
//! requests end to end.

use std::cell::RefCell;
use std::rc::Rc;

use log::{info, warn};
use pointclick::components::cutscene::CutsceneStep;
use pointclick::components::rect::Rect;
use pointclick::components::scene::{Scene, SceneContext};
use pointclick::components::zone::{InteractionZone, InteractionZones};
use pointclick::events::input::GestureKind;
use pointclick::error::PuzzleError;
use pointclick::events::payload::SceneTransition;
use pointclick::events::{Payload, topics};
use pointclick::puzzles::{PipesState, Side, Tile, TileKind};
use pointclick::resources::rendertarget::RenderSurface;
use serde_json::Value;

pub const TILE: f32 = 64.0;
pub const GRID_X: f32 = 96.0;
pub const GRID_Y: f32 = 96.0;

/// Solved three-by-two grid: source, valve and elbow on top, sink below.
pub fn sample_grid() -> Result<PipesState, PuzzleError> {
    let tiles = vec![
        Tile::new(TileKind::Straight, 0).source(),
        Tile::new(TileKind::Valve, 0).opened(true),
        Tile::new(TileKind::Elbow, 1),
        Tile::default(),
        Tile::default(),
        Tile::new(TileKind::Straight, 1).sink(),
    ];
    PipesState::new(3, 2, tiles)
}

pub struct TitleScene {
    zones: InteractionZones,
}

impl TitleScene {
    pub fn new(width: u32, height: u32) -> Self {
        let mut zones = InteractionZones::new();
        zones.add(
            InteractionZone::new("start", Rect::new(0.0, 0.0, width as f32, height as f32)).on(
                GestureKind::Tap,
                |_, events| {
                    events.emit(
                        topics::SCENE_REQUEST,
                        &Payload::Scene(SceneTransition {
                            from: Some("title".into()),
                            to: "pipes".into(),
                            data: None,
                        }),
                    );
                },
            ),
        );
        Self { zones }
    }
}

impl Scene for TitleScene {
    fn id(&self) -> &str {
        "title"
    }

    fn render(&mut self, surface: &mut dyn RenderSurface, _ctx: &mut SceneContext<'_>) {
        surface.fill_text("The Leaky Cellar", 40.0, 60.0, "#ffffff", 24.0);
        surface.fill_text("tap anywhere", 40.0, 100.0, "#aaaaaa", 14.0);
    }

    fn zones_mut(&mut self) -> Option<&mut InteractionZones> {
        Some(&mut self.zones)
    }
}

pub struct PipesScene {
    grid: Rc<RefCell<PipesState>>,
    zones: InteractionZones,
    celebrated: bool,
}

impl PipesScene {
    pub fn new(grid: PipesState) -> Self {
        let grid = Rc::new(RefCell::new(grid));
        let mut zones = InteractionZones::new();
        let (w, h) = {
            let g = grid.borrow();
            (g.width(), g.height())
        };
        for y in 0..h {
            for x in 0..w {
                let rect = Rect::new(GRID_X + x as f32 * TILE, GRID_Y + y as f32 * TILE, TILE, TILE);
                let on_tap = Rc::clone(&grid);
                let on_hold = Rc::clone(&grid);
                zones.add(
                    InteractionZone::new(format!("tile_{}_{}", x, y), rect)
                        .on(GestureKind::Tap, move |_, _| {
                            on_tap.borrow_mut().rotate(x, y);
                        })
                        .on(GestureKind::LongPress, move |_, _| {
                            on_hold.borrow_mut().toggle_valve(x, y);
                        }),
                );
            }
        }
        Self {
            grid,
            zones,
            celebrated: false,
        }
    }
}

impl Scene for PipesScene {
    fn id(&self) -> &str {
        "pipes"
    }

    fn on_enter(&mut self, ctx: &mut SceneContext<'_>, previous: Option<&str>, _data: Option<&Value>) {
        info!("pipes puzzle entered from {}", previous.unwrap_or("nowhere"));
        ctx.services.blackboard.set("moves", 0u32);
    }

    fn update(&mut self, ctx: &mut SceneContext<'_>, _dt: f32) {
        if self.celebrated || !self.grid.borrow().solved() {
            return;
        }
        self.celebrated = true;
        ctx.state.set_value("pipes_solved", Value::Bool(true));
        let steps = vec![
            CutsceneStep::say_as("Plumber", "The water flows!"),
            CutsceneStep::wait_ms(500.0),
            CutsceneStep::effect(|events| {
                events.emit(
                    topics::SCENE_REQUEST,
                    &Payload::Scene(SceneTransition {
                        from: Some("pipes".into()),
                        to: "end".into(),
                        data: None,
                    }),
                );
                Ok(())
            }),
        ];
        if let Err(e) = ctx.services.cutscene.run(steps) {
            warn!("celebration cutscene not started: {}", e);
        }
    }

    fn render(&mut self, surface: &mut dyn RenderSurface, _ctx: &mut SceneContext<'_>) {
        let grid = self.grid.borrow();
        let wet = grid.flow();
        for y in 0..grid.height() {
            for x in 0..grid.width() {
                let Some(tile) = grid.tile(x, y) else {
                    continue;
                };
                let rect = Rect::new(GRID_X + x as f32 * TILE, GRID_Y + y as f32 * TILE, TILE, TILE);
                surface.stroke_rect(rect, "#444444", 1.0);
                let color = if wet.contains(&(x, y)) { "#3399ff" } else { "#888888" };
                let (cx, cy) = rect.center();
                for side in tile.sides() {
                    let (dx, dy) = match side {
                        Side::N => (0.0, -TILE / 2.0),
                        Side::E => (TILE / 2.0, 0.0),
                        Side::S => (0.0, TILE / 2.0),
                        Side::W => (-TILE / 2.0, 0.0),
                    };
                    surface.line((cx, cy), (cx + dx, cy + dy), color, 8.0);
                }
            }
        }
    }

    fn zones_mut(&mut self) -> Option<&mut InteractionZones> {
        Some(&mut self.zones)
    }
}

pub struct EndScene;

impl Scene for EndScene {
    fn id(&self) -> &str {
        "end"
    }

    fn on_enter(&mut self, ctx: &mut SceneContext<'_>, _previous: Option<&str>, _data: Option<&Value>) {
        if !ctx.state.save("autosave") {
            warn!("autosave failed");
        }
    }

    fn render(&mut self, surface: &mut dyn RenderSurface, _ctx: &mut SceneContext<'_>) {
        surface.fill_text("Thanks for playing", 40.0, 60.0, "#ffffff", 24.0);
    }
}
