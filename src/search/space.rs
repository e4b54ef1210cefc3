//! The model space over a closed registry.
//!
//! A point in the space is a selection of explorable groups. The fixed block is
//! always present. With `G` groups there are `2^G` points.

use crate::domain::ModelSpecification;
use crate::error::{RoverError, RoverResult};
use crate::registry::{CovariateGroup, CovariateRegistry};

/// Exhaustive enumeration stores a selection as a `u64` bitmask.
pub const MAX_EXHAUSTIVE_GROUPS: usize = 63;

#[derive(Debug, Clone)]
pub struct ModelSpace<'r> {
    registry: &'r CovariateRegistry,
    groups: Vec<CovariateGroup>,
}

impl<'r> ModelSpace<'r> {
    pub fn new(registry: &'r CovariateRegistry) -> RoverResult<Self> {
        if !registry.is_closed() {
            return Err(RoverError::RegistryOpen);
        }
        Ok(Self {
            registry,
            groups: registry.explorable_groups(),
        })
    }

    pub fn groups(&self) -> &[CovariateGroup] {
        &self.groups
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// `2^G`, or `None` when it does not fit in a `u128`.
    pub fn size(&self) -> Option<u128> {
        1u128.checked_shl(self.groups.len() as u32)
    }

    /// Specification for a selection flag per group.
    pub fn specification(&self, selection: &[bool]) -> ModelSpecification {
        let chosen = selection
            .iter()
            .enumerate()
            .filter_map(|(i, &on)| on.then_some(i));
        self.registry.specification_for(&self.groups, chosen)
    }

    /// Specification for a bitmask where bit `i` selects group `i`.
    pub fn specification_for_mask(&self, mask: u64) -> ModelSpecification {
        let chosen = (0..self.groups.len()).filter(|&i| mask & (1u64 << i) != 0);
        self.registry.specification_for(&self.groups, chosen)
    }

    /// Lazy iterator over all `2^G` specifications in bitmask order.
    ///
    /// Calling this again restarts the enumeration from the beginning.
    pub fn exhaustive(&self) -> RoverResult<ExhaustiveIter<'_>> {
        self.exhaustive_within(None)
    }

    /// Like [`ModelSpace::exhaustive`], but only yields specifications with at
    /// most `max_covariates` covariates (fixed block included).
    ///
    /// Over-cap selections are jumped over, never built, so the work is bounded
    /// by the number of admissible specifications times `G`.
    pub fn exhaustive_within(&self, max_covariates: Option<usize>) -> RoverResult<ExhaustiveIter<'_>> {
        let g = self.groups.len();
        if g > MAX_EXHAUSTIVE_GROUPS {
            return Err(RoverError::invalid_config(format!(
                "exhaustive search over {g} groups is not enumerable \
                 (at most {MAX_EXHAUSTIVE_GROUPS}); use a greedy strategy"
            )));
        }
        let end = 1u64 << g;
        let fixed = self.registry.fixed_covariates().count();
        let budget = max_covariates.map(|max| max.checked_sub(fixed));
        Ok(ExhaustiveIter {
            space: self,
            // A fixed block over the cap leaves nothing admissible.
            next: if matches!(budget, Some(None)) { end } else { 0 },
            end,
            budget: budget.flatten(),
        })
    }

    fn selected_count(&self, mask: u64) -> usize {
        self.groups
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1u64 << i) != 0)
            .map(|(_, group)| group.members.len())
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct ExhaustiveIter<'a> {
    space: &'a ModelSpace<'a>,
    next: u64,
    end: u64,
    /// Room left for selected covariates, if capped.
    budget: Option<usize>,
}

impl Iterator for ExhaustiveIter<'_> {
    type Item = ModelSpecification;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.end {
            let mask = self.next;
            let over = self
                .budget
                .is_some_and(|room| self.space.selected_count(mask) > room);
            if !over {
                self.next = mask + 1;
                return Some(self.space.specification_for_mask(mask));
            }
            // Every mask in [mask, mask + lowest bit) contains all of mask's
            // groups, so none of them fits either.
            self.next = mask + (mask & mask.wrapping_neg());
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.end.saturating_sub(self.next)).ok();
        match self.budget {
            Some(_) => (0, remaining),
            None => (remaining.unwrap_or(usize::MAX), remaining),
        }
    }
}
