//! Covariate registry.
//!
//! The registry has two phases. While open, covariates are registered and
//! validated (unique names, role-consistent groups). Once `close()` is called the
//! registry is read-only and can seed a search.

use std::collections::HashMap;

use crate::domain::{Covariate, CovariateRole, ModelSpecification};
use crate::error::{RoverError, RoverResult};

/// Explorable covariates that enter and leave a specification together.
///
/// An ungrouped explorable covariate forms a group of size one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CovariateGroup {
    pub label: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CovariateRegistry {
    covariates: Vec<Covariate>,
    by_name: HashMap<String, usize>,
    group_roles: HashMap<String, CovariateRole>,
    closed: bool,
}

impl CovariateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one covariate.
    pub fn register(&mut self, covariate: Covariate) -> RoverResult<()> {
        if self.closed {
            return Err(RoverError::RegistryClosed {
                name: covariate.name,
            });
        }
        if covariate.name.trim().is_empty() {
            return Err(RoverError::invalid_config("covariate name must be non-empty"));
        }
        if self.by_name.contains_key(&covariate.name) {
            return Err(RoverError::DuplicateCovariate {
                name: covariate.name,
            });
        }
        if let Some(group) = &covariate.group_id {
            if let Some(&expected) = self.group_roles.get(group) {
                if expected != covariate.role {
                    return Err(RoverError::InconsistentGroup {
                        group: group.clone(),
                        name: covariate.name,
                        expected: expected.as_str(),
                        found: covariate.role.as_str(),
                    });
                }
            } else {
                self.group_roles.insert(group.clone(), covariate.role);
            }
        }

        self.by_name
            .insert(covariate.name.clone(), self.covariates.len());
        self.covariates.push(covariate);
        Ok(())
    }

    /// Register several covariates, stopping at the first error.
    pub fn register_all<I>(&mut self, covariates: I) -> RoverResult<()>
    where
        I: IntoIterator<Item = Covariate>,
    {
        for c in covariates {
            self.register(c)?;
        }
        Ok(())
    }

    /// End the registration phase.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.covariates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.covariates.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Covariate> {
        self.by_name.get(name).map(|&i| &self.covariates[i])
    }

    pub fn fixed_covariates(&self) -> impl Iterator<Item = &Covariate> {
        self.covariates
            .iter()
            .filter(|c| c.role == CovariateRole::Fixed)
    }

    pub fn explorable_covariates(&self) -> impl Iterator<Item = &Covariate> {
        self.covariates
            .iter()
            .filter(|c| c.role == CovariateRole::Explorable)
    }

    pub fn fixed_names(&self) -> Vec<String> {
        self.fixed_covariates().map(|c| c.name.clone()).collect()
    }

    /// All covariate names: fixed block first, then explorable, each in
    /// registration order.
    pub fn all_names(&self) -> Vec<String> {
        self.fixed_covariates()
            .chain(self.explorable_covariates())
            .map(|c| c.name.clone())
            .collect()
    }

    /// Partition explorable covariates into groups, ordered by the first
    /// registration of any member.
    pub fn explorable_groups(&self) -> Vec<CovariateGroup> {
        let mut groups: Vec<CovariateGroup> = Vec::new();
        let mut slot: HashMap<&str, usize> = HashMap::new();

        for c in self.explorable_covariates() {
            match &c.group_id {
                Some(g) => {
                    if let Some(&i) = slot.get(g.as_str()) {
                        groups[i].members.push(c.name.clone());
                    } else {
                        slot.insert(g.as_str(), groups.len());
                        groups.push(CovariateGroup {
                            label: g.clone(),
                            members: vec![c.name.clone()],
                        });
                    }
                }
                None => groups.push(CovariateGroup {
                    label: c.name.clone(),
                    members: vec![c.name.clone()],
                }),
            }
        }
        groups
    }

    /// Specification holding the fixed covariates plus the chosen groups.
    pub fn specification_for(
        &self,
        groups: &[CovariateGroup],
        chosen: impl IntoIterator<Item = usize>,
    ) -> ModelSpecification {
        let selected = chosen
            .into_iter()
            .flat_map(|i| groups[i].members.iter().cloned());
        ModelSpecification::new(self.fixed_names(), selected)
    }
}
