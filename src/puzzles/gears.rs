//! Gear-train puzzle.
//!
//! Gears mesh along undirected connections. The train is solved when a
//! path joins the input gear to the output gear, every gear on it has a
//! positive finite tooth count, and the product of `teeth(prev) /
//! teeth(next)` along that path matches the target ratio within the
//! tolerance. Only the first path found by a breadth-first search from
//! the input is considered.

use std::collections::VecDeque;

use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::PuzzleError;

pub const DEFAULT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gear {
    pub id: String,
    pub teeth: f64,
}

impl Gear {
    pub fn new(id: impl Into<String>, teeth: f64) -> Self {
        Self {
            id: id.into(),
            teeth,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GearsEvaluation {
    pub solved: bool,
    /// Gear ids from input to output, empty when unconnected.
    pub path: Vec<String>,
    /// Output turns per input turn, absent without a valid path.
    pub ratio: Option<f64>,
    /// Output spin when the input turns clockwise.
    pub output_clockwise: Option<bool>,
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

#[derive(Debug, Deserialize, Serialize)]
struct GearsDef {
    gears: Vec<Gear>,
    #[serde(default)]
    connections: Vec<(String, String)>,
    input: String,
    output: String,
    #[serde(alias = "targetRatio")]
    target_ratio: f64,
    #[serde(default = "default_tolerance")]
    tolerance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GearsDef", into = "GearsDef")]
pub struct GearsState {
    gears: Vec<Gear>,
    links: FxHashMap<String, Vec<String>>,
    /// Connections in the order they were made.
    edges: Vec<(String, String)>,
    input: String,
    output: String,
    target_ratio: f64,
    tolerance: f64,
    eval: GearsEvaluation,
}

impl TryFrom<GearsDef> for GearsState {
    type Error = PuzzleError;

    fn try_from(def: GearsDef) -> Result<Self, Self::Error> {
        let mut state = GearsState::new(def.gears, &def.input, &def.output, def.target_ratio)?;
        state.tolerance = def.tolerance.abs();
        for (a, b) in &def.connections {
            for id in [a, b] {
                if !state.has_gear(id) {
                    return Err(PuzzleError::UnknownGear(id.clone()));
                }
            }
            state.link(a, b);
        }
        state.reevaluate();
        Ok(state)
    }
}

impl From<GearsState> for GearsDef {
    fn from(state: GearsState) -> Self {
        let connections = state.connections();
        GearsDef {
            gears: state.gears,
            connections,
            input: state.input,
            output: state.output,
            target_ratio: state.target_ratio,
            tolerance: state.tolerance,
        }
    }
}

impl GearsState {
    /// New train without connections. Ids must be unique and `input` and
    /// `output` must name defined gears.
    pub fn new(
        gears: Vec<Gear>,
        input: &str,
        output: &str,
        target_ratio: f64,
    ) -> Result<Self, PuzzleError> {
        let mut seen = FxHashSet::default();
        for gear in &gears {
            if !seen.insert(gear.id.as_str()) {
                return Err(PuzzleError::DuplicateGear(gear.id.clone()));
            }
        }
        for id in [input, output] {
            if !seen.contains(id) {
                return Err(PuzzleError::UnknownGear(id.to_string()));
            }
        }
        let mut state = Self {
            gears,
            links: FxHashMap::default(),
            edges: Vec::new(),
            input: input.to_string(),
            output: output.to_string(),
            target_ratio,
            tolerance: DEFAULT_TOLERANCE,
            eval: GearsEvaluation::default(),
        };
        state.reevaluate();
        Ok(state)
    }

    pub fn from_json(text: &str) -> Result<Self, PuzzleError> {
        serde_json::from_str(text).map_err(|e| PuzzleError::Parse(e.to_string()))
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.abs();
        self.reevaluate();
        self
    }

    pub fn gear(&self, id: &str) -> Option<&Gear> {
        self.gears.iter().find(|g| g.id == id)
    }

    pub fn gears(&self) -> &[Gear] {
        &self.gears
    }

    fn has_gear(&self, id: &str) -> bool {
        self.gear(id).is_some()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn target_ratio(&self) -> f64 {
        self.target_ratio
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Mesh two gears. False for unknown ids, a gear with itself, or an
    /// existing connection.
    pub fn connect(&mut self, a: &str, b: &str) -> bool {
        if a == b || !self.has_gear(a) || !self.has_gear(b) {
            warn!("cannot connect gears '{}' and '{}'", a, b);
            return false;
        }
        let added = self.link(a, b);
        self.reevaluate();
        added
    }

    fn link(&mut self, a: &str, b: &str) -> bool {
        if a == b || self.are_connected(a, b) {
            return false;
        }
        self.links.entry(a.to_string()).or_default().push(b.to_string());
        self.links.entry(b.to_string()).or_default().push(a.to_string());
        self.edges.push((a.to_string(), b.to_string()));
        true
    }

    pub fn disconnect(&mut self, a: &str, b: &str) -> bool {
        let mut removed = false;
        for (from, to) in [(a, b), (b, a)] {
            if let Some(list) = self.links.get_mut(from) {
                let before = list.len();
                list.retain(|id| id != to);
                removed |= list.len() != before;
            }
        }
        self.edges
            .retain(|(x, y)| !((x == a && y == b) || (x == b && y == a)));
        self.reevaluate();
        removed
    }

    pub fn disconnect_all(&mut self) {
        self.links.clear();
        self.edges.clear();
        self.reevaluate();
    }

    pub fn are_connected(&self, a: &str, b: &str) -> bool {
        self.links
            .get(a)
            .is_some_and(|list| list.iter().any(|id| id == b))
    }

    /// Every connection once, as `(a, b)` in the order first added.
    pub fn connections(&self) -> Vec<(String, String)> {
        self.edges.clone()
    }

    pub fn set_teeth(&mut self, id: &str, teeth: f64) -> bool {
        let Some(gear) = self.gears.iter_mut().find(|g| g.id == id) else {
            return false;
        };
        gear.teeth = teeth;
        self.reevaluate();
        true
    }

    pub fn set_target_ratio(&mut self, ratio: f64) {
        self.target_ratio = ratio;
        self.reevaluate();
    }

    /// Add a gear. A duplicate id is rejected.
    pub fn add_gear(&mut self, gear: Gear) -> bool {
        if self.has_gear(&gear.id) {
            warn!("gear '{}' already exists", gear.id);
            return false;
        }
        self.gears.push(gear);
        self.reevaluate();
        true
    }

    /// Remove a gear and its connections. Removing the input or output
    /// leaves the train permanently unsolved until it is added back.
    pub fn remove_gear(&mut self, id: &str) -> bool {
        let before = self.gears.len();
        self.gears.retain(|g| g.id != id);
        if self.gears.len() == before {
            return false;
        }
        self.links.remove(id);
        for list in self.links.values_mut() {
            list.retain(|other| other != id);
        }
        self.edges.retain(|(a, b)| a != id && b != id);
        self.reevaluate();
        true
    }

    pub fn solved(&self) -> bool {
        self.eval.solved
    }

    pub fn evaluation(&self) -> &GearsEvaluation {
        &self.eval
    }

    fn reevaluate(&mut self) {
        self.eval = evaluate_gears(self);
    }

    fn bfs_path(&self) -> Option<Vec<String>> {
        if !self.has_gear(&self.input) || !self.has_gear(&self.output) {
            return None;
        }
        let mut parent: FxHashMap<&str, &str> = FxHashMap::default();
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut queue = VecDeque::new();
        visited.insert(self.input.as_str());
        queue.push_back(self.input.as_str());
        while let Some(current) = queue.pop_front() {
            if current == self.output {
                let mut path = vec![current.to_string()];
                let mut at = current;
                while let Some(&prev) = parent.get(at) {
                    path.push(prev.to_string());
                    at = prev;
                }
                path.reverse();
                return Some(path);
            }
            for next in self.links.get(current).into_iter().flatten() {
                if visited.insert(next.as_str()) {
                    parent.insert(next.as_str(), current);
                    queue.push_back(next.as_str());
                }
            }
        }
        None
    }
}

/// Evaluate the train from scratch.
pub fn evaluate_gears(state: &GearsState) -> GearsEvaluation {
    if state.input == state.output {
        return GearsEvaluation::default();
    }
    let Some(path) = state.bfs_path() else {
        return GearsEvaluation::default();
    };
    let teeth: Option<Vec<f64>> = path
        .iter()
        .map(|id| {
            state
                .gear(id)
                .map(|g| g.teeth)
                .filter(|t| t.is_finite() && *t > 0.0)
        })
        .collect();
    let Some(teeth) = teeth else {
        return GearsEvaluation {
            path,
            ..GearsEvaluation::default()
        };
    };
    let ratio: f64 = teeth.windows(2).map(|w| w[0] / w[1]).product();
    let meshes = path.len() - 1;
    let solved = (ratio.abs() - state.target_ratio.abs()).abs() <= state.tolerance;
    GearsEvaluation {
        solved,
        path,
        ratio: Some(ratio),
        output_clockwise: Some(meshes % 2 == 0),
    }
}
