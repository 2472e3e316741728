//! Property tests for the pipes and gears evaluators.

use std::collections::VecDeque;

use pointclick::puzzles::{Gear, GearsState, PipesState, Side, Tile, TileKind};
use proptest::prelude::*;

const BUNDLED_PIPES: &str = include_str!("../assets/puzzles/pipes.json");

fn kind_strategy() -> impl Strategy<Value = TileKind> {
    prop_oneof![
        Just(TileKind::Empty),
        Just(TileKind::Straight),
        Just(TileKind::Elbow),
        Just(TileKind::Tee),
        Just(TileKind::Cross),
        Just(TileKind::EndCap),
        Just(TileKind::Valve),
    ]
}

fn tile_strategy() -> impl Strategy<Value = Tile> {
    (kind_strategy(), 0u8..4, any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(kind, rotation, open, source, sink)| Tile {
            kind,
            rotation,
            open,
            source,
            sink,
        },
    )
}

fn grid_strategy() -> impl Strategy<Value = PipesState> {
    (1usize..5, 1usize..5).prop_flat_map(|(w, h)| {
        prop::collection::vec(tile_strategy(), w * h)
            .prop_map(move |tiles| PipesState::new(w, h, tiles).expect("sized to fit"))
    })
}

/// Straightforward flood fill over the tile sides, used to cross-check the
/// evaluator. Returns `(solved, reached)`.
fn flood(grid: &PipesState) -> (bool, Vec<(usize, usize)>) {
    let (w, h) = (grid.width(), grid.height());
    let step = |x: usize, y: usize, side: Side| -> Option<(usize, usize)> {
        match side {
            Side::N if y > 0 => Some((x, y - 1)),
            Side::S if y + 1 < h => Some((x, y + 1)),
            Side::W if x > 0 => Some((x - 1, y)),
            Side::E if x + 1 < w => Some((x + 1, y)),
            _ => None,
        }
    };

    let mut seen = vec![vec![false; w]; h];
    let mut queue = VecDeque::new();
    for y in 0..h {
        for x in 0..w {
            if grid.tile(x, y).is_some_and(|t| t.source) {
                seen[y][x] = true;
                queue.push_back((x, y));
            }
        }
    }
    let any_sink = grid.tiles().iter().any(|t| t.sink);
    if queue.is_empty() || !any_sink {
        return (false, Vec::new());
    }

    let mut leaking = false;
    while let Some((x, y)) = queue.pop_front() {
        let Some(tile) = grid.tile(x, y) else { continue };
        for side in Side::ALL {
            if !tile.connects(side) {
                continue;
            }
            match step(x, y, side) {
                None => leaking |= !(tile.source || tile.sink),
                Some((nx, ny)) => {
                    let back = grid.tile(nx, ny).is_some_and(|n| n.connects(side.opposite()));
                    if !back {
                        leaking = true;
                    } else if !seen[ny][nx] {
                        seen[ny][nx] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }
        }
    }

    let mut reached = Vec::new();
    let mut every_sink = true;
    for y in 0..h {
        for x in 0..w {
            if seen[y][x] {
                reached.push((x, y));
            }
            if grid.tile(x, y).is_some_and(|t| t.sink) && !seen[y][x] {
                every_sink = false;
            }
        }
    }
    (every_sink && !leaking, reached)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn four_turns_restore_the_grid(grid in grid_strategy(), x in 0usize..5, y in 0usize..5) {
        let mut turned = grid.clone();
        for _ in 0..4 {
            turned.rotate(x, y);
        }
        prop_assert_eq!(turned.tiles(), grid.tiles());
        prop_assert_eq!(turned.evaluation(), grid.evaluation());
    }

    #[test]
    fn scramble_only_changes_rotations(grid in grid_strategy(), seed in any::<u64>()) {
        let scrambled = grid.scrambled(seed);
        prop_assert_eq!(scrambled.width(), grid.width());
        prop_assert_eq!(scrambled.height(), grid.height());
        for (a, b) in grid.tiles().iter().zip(scrambled.tiles()) {
            prop_assert_eq!(a.kind, b.kind);
            prop_assert_eq!(a.source, b.source);
            prop_assert_eq!(a.sink, b.sink);
            prop_assert_eq!(a.open, b.open);
            prop_assert!(b.rotation < 4);
        }
        let rescrambled = grid.scrambled(seed);
        prop_assert_eq!(rescrambled.tiles(), scrambled.tiles());
    }

    #[test]
    fn solved_matches_flood_fill(grid in grid_strategy()) {
        let (solved, reached) = flood(&grid);
        prop_assert_eq!(grid.solved(), solved);
        if solved {
            prop_assert!(grid.leaks().is_empty());
            prop_assert_eq!(grid.flow(), reached.as_slice());
        }
    }

    #[test]
    fn turning_a_solved_grid_agrees_with_flood_fill(
        turns in prop::collection::vec((0usize..3, 0usize..3, 1usize..4), 0..4),
    ) {
        let mut grid = PipesState::from_json(BUNDLED_PIPES).expect("bundled puzzle parses");
        for (x, y, n) in turns {
            for _ in 0..n {
                grid.rotate(x, y);
            }
            prop_assert_eq!(grid.solved(), flood(&grid).0);
        }
    }

    #[test]
    fn json_round_trip_keeps_the_evaluation(grid in grid_strategy()) {
        let back = PipesState::from_json(&grid.to_json()).expect("own output parses");
        prop_assert_eq!(back.evaluation(), grid.evaluation());
    }

    #[test]
    fn gear_chain_ratio_is_first_over_last(teeth in prop::collection::vec(4u32..80, 2..7)) {
        let gears: Vec<Gear> = teeth
            .iter()
            .enumerate()
            .map(|(i, t)| Gear::new(format!("g{}", i), *t as f64))
            .collect();
        let last = format!("g{}", teeth.len() - 1);
        let expected = teeth[0] as f64 / teeth[teeth.len() - 1] as f64;
        let mut state = GearsState::new(gears, "g0", &last, expected).expect("valid gears");
        for i in 1..teeth.len() {
            state.connect(&format!("g{}", i - 1), &format!("g{}", i));
        }
        let eval = state.evaluation().clone();
        prop_assert!(eval.solved);
        prop_assert_eq!(eval.path.len(), teeth.len());
        let ratio = eval.ratio.expect("connected chain has a ratio");
        prop_assert!((ratio - expected).abs() < 1e-9);
        prop_assert_eq!(eval.output_clockwise, Some(teeth.len() % 2 == 1));

        state.disconnect_all();
        prop_assert!(!state.solved());
        prop_assert_eq!(state.evaluation().ratio, None);
    }

    #[test]
    fn solved_iff_within_tolerance(a in 5u32..60, b in 5u32..60, offset in -0.05f64..0.05) {
        let ratio = a as f64 / b as f64;
        let target = ratio + offset;
        let mut state = GearsState::new(
            vec![Gear::new("in", a as f64), Gear::new("out", b as f64)],
            "in",
            "out",
            target,
        )
        .expect("valid gears")
        .with_tolerance(0.01);
        state.connect("in", "out");
        let within = (ratio.abs() - target.abs()).abs() <= 0.01;
        prop_assert_eq!(state.solved(), within);
    }
}

#[test]
fn bundled_pipes_puzzle_is_solved() {
    let grid = PipesState::from_json(BUNDLED_PIPES).unwrap();
    assert!(grid.solved());
    assert!(grid.leaks().is_empty());
    assert_eq!(grid.flow().len(), 7);
}

#[test]
fn bundled_gears_puzzle_is_solved() {
    let gears = GearsState::from_json(include_str!("../assets/puzzles/gears.json")).unwrap();
    let eval = gears.evaluation();
    assert!(eval.solved);
    assert_eq!(eval.path, vec!["crank", "idler", "drum"]);
    assert_eq!(eval.output_clockwise, Some(true));
}
