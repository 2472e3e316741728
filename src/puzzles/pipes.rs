//! Pipe-rotation puzzle.
//!
//! A grid of tiles, each exposing some of its four sides depending on its
//! kind and rotation. Water flows from source tiles through sides that
//! face each other. The grid is solved when every sink is reached and no
//! reached tile leaks, that is, points a side off-grid or at a neighbour
//! that does not point back. Sources and sinks may point off-grid.
//!
//! Every mutation re-runs [`evaluate_pipes`] over the whole grid.

use std::collections::VecDeque;

use arrayvec::ArrayVec;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::PuzzleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    N,
    E,
    S,
    W,
}

pub type Sides = ArrayVec<Side, 4>;

impl Side {
    pub const ALL: [Side; 4] = [Side::N, Side::E, Side::S, Side::W];

    fn index(self) -> u8 {
        match self {
            Side::N => 0,
            Side::E => 1,
            Side::S => 2,
            Side::W => 3,
        }
    }

    /// Rotate clockwise by `quarter_turns`.
    pub fn rotated(self, quarter_turns: u8) -> Side {
        Side::ALL[((self.index() + quarter_turns) % 4) as usize]
    }

    pub fn opposite(self) -> Side {
        self.rotated(2)
    }

    fn delta(self) -> (i64, i64) {
        match self {
            Side::N => (0, -1),
            Side::E => (1, 0),
            Side::S => (0, 1),
            Side::W => (-1, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileKind {
    #[default]
    Empty,
    Straight,
    Elbow,
    Tee,
    Cross,
    #[serde(alias = "end")]
    EndCap,
    Valve,
}

impl TileKind {
    /// Sides exposed at rotation 0.
    fn base_sides(self) -> &'static [Side] {
        match self {
            TileKind::Empty => &[],
            TileKind::Straight | TileKind::Valve => &[Side::E, Side::W],
            TileKind::Elbow => &[Side::E, Side::S],
            TileKind::Tee => &[Side::E, Side::S, Side::W],
            TileKind::Cross => &Side::ALL,
            TileKind::EndCap => &[Side::E],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tile {
    pub kind: TileKind,
    /// Clockwise quarter turns, kept in `0..4`.
    pub rotation: u8,
    /// Valves only: closed valves expose no sides.
    pub open: bool,
    pub source: bool,
    pub sink: bool,
}

impl Tile {
    pub fn new(kind: TileKind, rotation: u8) -> Self {
        Self {
            kind,
            rotation: rotation % 4,
            ..Self::default()
        }
    }

    pub fn source(mut self) -> Self {
        self.source = true;
        self
    }

    pub fn sink(mut self) -> Self {
        self.sink = true;
        self
    }

    pub fn opened(mut self, open: bool) -> Self {
        self.open = open;
        self
    }

    /// Sides this tile currently connects.
    pub fn sides(&self) -> Sides {
        if self.kind == TileKind::Valve && !self.open {
            return Sides::new();
        }
        self.kind
            .base_sides()
            .iter()
            .map(|s| s.rotated(self.rotation))
            .collect()
    }

    pub fn connects(&self, side: Side) -> bool {
        self.sides().contains(&side)
    }

    fn is_terminal(&self) -> bool {
        self.source || self.sink
    }
}

/// A side of a reached tile that does not lead anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Leak {
    pub x: usize,
    pub y: usize,
    pub side: Side,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipesEvaluation {
    pub solved: bool,
    /// Tiles reached from any source, in row-major order.
    pub reached: Vec<(usize, usize)>,
    pub leaks: Vec<Leak>,
}

#[derive(Debug, Deserialize, Serialize)]
struct PipesDef {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PipesDef", into = "PipesDef")]
pub struct PipesState {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
    eval: PipesEvaluation,
}

impl TryFrom<PipesDef> for PipesState {
    type Error = PuzzleError;

    fn try_from(def: PipesDef) -> Result<Self, Self::Error> {
        PipesState::new(def.width, def.height, def.tiles)
    }
}

impl From<PipesState> for PipesDef {
    fn from(state: PipesState) -> Self {
        PipesDef {
            width: state.width,
            height: state.height,
            tiles: state.tiles,
        }
    }
}

impl PipesState {
    /// Build a grid from row-major tiles.
    pub fn new(width: usize, height: usize, tiles: Vec<Tile>) -> Result<Self, PuzzleError> {
        if width == 0 || height == 0 || tiles.len() != width * height {
            return Err(PuzzleError::GridSize {
                width,
                height,
                tiles: tiles.len(),
            });
        }
        let tiles = tiles
            .into_iter()
            .map(|mut t| {
                t.rotation %= 4;
                t
            })
            .collect();
        let mut state = Self {
            width,
            height,
            tiles,
            eval: PipesEvaluation::default(),
        };
        state.reevaluate();
        Ok(state)
    }

    pub fn from_json(text: &str) -> Result<Self, PuzzleError> {
        serde_json::from_str(text).map_err(|e| PuzzleError::Parse(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile(&self, x: usize, y: usize) -> Option<&Tile> {
        self.index(x, y).map(|i| &self.tiles[i])
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then_some(y * self.width + x)
    }

    /// Turn a tile one quarter clockwise. Empty tiles and out-of-range
    /// coordinates are ignored.
    pub fn rotate(&mut self, x: usize, y: usize) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        let tile = &mut self.tiles[i];
        if tile.kind == TileKind::Empty {
            return false;
        }
        tile.rotation = (tile.rotation + 1) % 4;
        self.reevaluate();
        true
    }

    /// Open or close a valve. False for anything that is not a valve.
    pub fn toggle_valve(&mut self, x: usize, y: usize) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        let tile = &mut self.tiles[i];
        if tile.kind != TileKind::Valve {
            return false;
        }
        tile.open = !tile.open;
        self.reevaluate();
        true
    }

    pub fn set_tile(&mut self, x: usize, y: usize, mut tile: Tile) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        tile.rotation %= 4;
        self.tiles[i] = tile;
        self.reevaluate();
        true
    }

    /// Copy with every non-empty tile turned a random number of times.
    /// A few reshuffles are attempted so the result is not already solved.
    pub fn scrambled(&self, seed: u64) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut next = self.clone();
        for attempt in 0..8 {
            for tile in next.tiles.iter_mut().filter(|t| t.kind != TileKind::Empty) {
                tile.rotation = rng.u8(0..4);
            }
            next.reevaluate();
            if !next.eval.solved {
                break;
            }
            debug!("scramble attempt {} left the grid solved, retrying", attempt);
        }
        next
    }

    pub fn solved(&self) -> bool {
        self.eval.solved
    }

    /// Tiles water reaches.
    pub fn flow(&self) -> &[(usize, usize)] {
        &self.eval.reached
    }

    pub fn leaks(&self) -> &[Leak] {
        &self.eval.leaks
    }

    pub fn evaluation(&self) -> &PipesEvaluation {
        &self.eval
    }

    fn reevaluate(&mut self) {
        self.eval = evaluate_pipes(self);
    }

    fn neighbour(&self, x: usize, y: usize, side: Side) -> Option<(usize, usize)> {
        let (dx, dy) = side.delta();
        let nx = x as i64 + dx;
        let ny = y as i64 + dy;
        if nx < 0 || ny < 0 || nx >= self.width as i64 || ny >= self.height as i64 {
            return None;
        }
        Some((nx as usize, ny as usize))
    }
}

/// Breadth-first flow from every source. See the module docs for the rules.
pub fn evaluate_pipes(state: &PipesState) -> PipesEvaluation {
    let mut visited = vec![false; state.tiles.len()];
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    for (i, tile) in state.tiles.iter().enumerate() {
        if tile.source {
            visited[i] = true;
            queue.push_back((i % state.width, i / state.width));
        }
    }
    let has_sink = state.tiles.iter().any(|t| t.sink);
    if queue.is_empty() || !has_sink {
        return PipesEvaluation::default();
    }

    let mut leaks = Vec::new();
    while let Some((x, y)) = queue.pop_front() {
        let tile = state.tiles[y * state.width + x];
        for side in tile.sides() {
            match state.neighbour(x, y, side) {
                None => {
                    if !tile.is_terminal() {
                        leaks.push(Leak { x, y, side });
                    }
                }
                Some((nx, ny)) => {
                    let ni = ny * state.width + nx;
                    if !state.tiles[ni].connects(side.opposite()) {
                        leaks.push(Leak { x, y, side });
                    } else if !visited[ni] {
                        visited[ni] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }
        }
    }

    let all_sinks = state
        .tiles
        .iter()
        .zip(&visited)
        .all(|(t, &seen)| !t.sink || seen);
    leaks.sort_by_key(|l| (l.y, l.x, l.side.index()));
    let reached = visited
        .iter()
        .enumerate()
        .filter(|&(_, &seen)| seen)
        .map(|(i, _)| (i % state.width, i / state.width))
        .collect();
    PipesEvaluation {
        solved: all_sinks && leaks.is_empty(),
        reached,
        leaks,
    }
}
