//! Data access for fitting and prediction.
//!
//! The search only needs named numeric columns with a consistent row count, so the
//! seam is a small trait. `DataFrame` is the in-memory implementation used by the
//! binary and the tests; `sample` generates seeded synthetic frames.

pub mod frame;
pub mod sample;

pub use frame::*;
pub use sample::*;

use crate::error::{RoverError, RoverResult};

/// Column lookup by name plus a row count.
///
/// Implementations must be shareable across fitting workers.
pub trait DataProvider: Send + Sync {
    fn n_rows(&self) -> usize;

    fn column(&self, name: &str) -> Option<&[f64]>;
}

/// Look up a column and check it against the provider's row count.
pub fn require_column<'a, D>(data: &'a D, name: &str) -> RoverResult<&'a [f64]>
where
    D: DataProvider + ?Sized,
{
    let col = data
        .column(name)
        .ok_or_else(|| RoverError::missing_column(name))?;
    if col.len() != data.n_rows() {
        return Err(RoverError::DataShape {
            column: name.to_string(),
            expected: data.n_rows(),
            found: col.len(),
        });
    }
    Ok(col)
}
