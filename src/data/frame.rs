//! In-memory column store.

use std::collections::BTreeMap;

use crate::data::DataProvider;
use crate::error::{RoverError, RoverResult};

/// Named `f64` columns of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    n_rows: Option<usize>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl DataFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a column. The first column fixes the row count.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) -> RoverResult<()> {
        let name = name.into();
        if let Some(n) = self.n_rows {
            if values.len() != n {
                return Err(RoverError::DataShape {
                    column: name,
                    expected: n,
                    found: values.len(),
                });
            }
        } else {
            self.n_rows = Some(values.len());
        }
        self.columns.insert(name, values);
        Ok(())
    }

    /// Builder form of [`DataFrame::insert`].
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> RoverResult<Self> {
        self.insert(name, values)?;
        Ok(self)
    }

    /// Add a column filled with `value`, one entry per existing row.
    ///
    /// Fails on a frame with no columns yet, since there is no row count to match.
    pub fn with_constant(self, name: impl Into<String>, value: f64) -> RoverResult<Self> {
        let name = name.into();
        let Some(n) = self.n_rows else {
            return Err(RoverError::UnknownRowCount { column: name });
        };
        self.with_column(name, vec![value; n])
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Keep only the given rows (used to build holdout frames).
    pub fn select_rows(&self, rows: &[usize]) -> RoverResult<Self> {
        let n = self.n_rows();
        if let Some(&bad) = rows.iter().find(|&&r| r >= n) {
            return Err(RoverError::invalid_config(format!(
                "row index {bad} out of range for {n} rows"
            )));
        }
        let mut out = DataFrame::new();
        for (name, values) in &self.columns {
            out.insert(name.clone(), rows.iter().map(|&r| values[r]).collect())?;
        }
        if out.n_rows.is_none() {
            out.n_rows = Some(rows.len());
        }
        Ok(out)
    }
}

impl DataProvider for DataFrame {
    fn n_rows(&self) -> usize {
        self.n_rows.unwrap_or(0)
    }

    fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }
}
