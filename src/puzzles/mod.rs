//! Self-contained puzzle evaluators.
//!
//! Both evaluators are pure: state in, evaluation out. The state types
//! re-evaluate after every mutation, so `solved()` is never stale.
//!
//! - [`pipes`] – rotate tiles until water flows from every source to every sink
//! - [`gears`] – mesh gears until the input drives the output at a target ratio

pub mod gears;
pub mod pipes;

pub use gears::{Gear, GearsEvaluation, GearsState, evaluate_gears};
pub use pipes::{Leak, PipesEvaluation, PipesState, Side, Tile, TileKind, evaluate_pipes};
