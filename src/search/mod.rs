//! Model-space traversal.
//!
//! - `space`: the power set over explorable groups and its lazy enumeration
//! - `run`: the search-run context (state, worker pool, cache) and exhaustive search
//! - `greedy`: stepwise forward/backward search

pub mod greedy;
pub mod run;
pub mod space;

pub use run::*;
pub use space::*;

#[cfg(test)]
pub(crate) mod test_support;
