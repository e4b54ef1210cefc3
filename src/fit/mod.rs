//! Fitting and scoring a single specification.
//!
//! Responsibilities:
//!
//! - define the collaborator capability and ship a Gaussian implementation
//! - adapt specifications + data into collaborator requests (and failures into data)
//! - memoize fits per canonical key for one search run
//! - score fits with an information criterion

pub mod adapter;
pub mod cache;
pub mod collaborator;
pub mod gaussian;
pub mod score;

pub use adapter::*;
pub use cache::*;
pub use collaborator::*;
pub use gaussian::*;
pub use score::*;
