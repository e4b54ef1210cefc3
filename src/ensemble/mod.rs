//! Model averaging over the scored models of a search run.
//!
//! Responsibilities:
//!
//! - select members (top-k or score threshold) among converged fits
//! - weight them by `exp(-½ Δscore)`
//! - predict on new data as a weighted mixture
//! - expose model-averaged coefficients over the full registry

pub mod predict;
pub mod select;

pub use predict::*;
pub use select::*;
