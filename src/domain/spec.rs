//! Points in model space.
//!
//! A `ModelSpecification` is the fixed covariates plus a chosen subset of the
//! explorable ones. Identity is the canonical `SpecKey`: the sorted, de-duplicated
//! union of all covariate names. Two specifications built from the same names in
//! any order are equal and hash identically.

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Canonical, order-independent identifier of a specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpecKey(Vec<String>);

impl SpecKey {
    /// Build a key from any collection of names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        Self(set.into_iter().collect())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Total number of covariates in the specification.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for SpecKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(empty)");
        }
        f.write_str(&self.0.join(" + "))
    }
}

/// One immutable point in model space.
#[derive(Debug, Clone)]
pub struct ModelSpecification {
    fixed: Vec<String>,
    selected: Vec<String>,
    key: SpecKey,
}

impl ModelSpecification {
    /// Create a specification; both blocks are sorted so design order is stable.
    pub fn new<F, S, T, U>(fixed: F, selected: S) -> Self
    where
        F: IntoIterator<Item = T>,
        S: IntoIterator<Item = U>,
        T: Into<String>,
        U: Into<String>,
    {
        let fixed: BTreeSet<String> = fixed.into_iter().map(Into::into).collect();
        let selected: BTreeSet<String> = selected
            .into_iter()
            .map(Into::into)
            .filter(|name| !fixed.contains(name))
            .collect();

        let key = SpecKey::from_names(fixed.iter().chain(selected.iter()).cloned());

        Self {
            fixed: fixed.into_iter().collect(),
            selected: selected.into_iter().collect(),
            key,
        }
    }

    pub fn fixed_covariates(&self) -> &[String] {
        &self.fixed
    }

    pub fn selected_covariates(&self) -> &[String] {
        &self.selected
    }

    pub fn key(&self) -> &SpecKey {
        &self.key
    }

    /// Number of covariates in the design (`|fixed| + |selected|`).
    pub fn covariate_count(&self) -> usize {
        self.fixed.len() + self.selected.len()
    }

    /// Covariate names in design order: fixed block, then selected block.
    pub fn design_columns(&self) -> impl Iterator<Item = &str> {
        self.fixed
            .iter()
            .chain(self.selected.iter())
            .map(String::as_str)
    }
}

impl PartialEq for ModelSpecification {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ModelSpecification {}

impl Hash for ModelSpecification {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}
