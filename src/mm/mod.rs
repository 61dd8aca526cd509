pub mod cache;
pub mod cost;
pub mod model;
pub mod prob;
pub mod snap;
pub mod state;
pub mod stmatch;
pub mod traj;
pub mod viterbi;

pub use model::*;
pub use traj::*;
