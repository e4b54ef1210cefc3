//! Mathematical utilities: least squares and L1-penalized least squares.

pub mod lasso;
pub mod ols;

pub use lasso::*;
pub use ols::*;
