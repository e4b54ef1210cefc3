//! Memoization of fits by canonical specification key.
//!
//! Guarantees:
//!
//! - at most one successful fit per `SpecKey` for the lifetime of the cache
//! - concurrent callers for the same key wait for the first caller and then reuse
//!   its result; distinct keys fit fully in parallel
//! - a setup error from the fit function leaves the key empty (nothing partial is
//!   ever stored)
//!
//! One cache belongs to one search run. There is no eviction.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::{FitResult, ModelSpecification, SpecKey};
use crate::error::RoverResult;

type Slot = Arc<Mutex<Option<Arc<FitResult>>>>;

#[derive(Debug, Default)]
pub struct FitCache {
    slots: Mutex<HashMap<SpecKey, Slot>>,
    computed: AtomicUsize,
}

impl FitCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the stored fit for `spec`, or run `fit_fn` once and store it.
    pub fn get_or_fit<D, F>(
        &self,
        spec: &ModelSpecification,
        data: &D,
        fit_fn: F,
    ) -> RoverResult<Arc<FitResult>>
    where
        D: ?Sized,
        F: FnOnce(&ModelSpecification, &D) -> RoverResult<FitResult>,
    {
        let slot = self.slot(spec.key());

        // Holding the per-key lock while fitting is what serializes same-key
        // callers; the map lock above is already released.
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(fit) = guard.as_ref() {
            return Ok(Arc::clone(fit));
        }

        let fit = Arc::new(fit_fn(spec, data)?);
        self.computed.fetch_add(1, Ordering::SeqCst);
        *guard = Some(Arc::clone(&fit));
        Ok(fit)
    }

    pub fn get(&self, key: &SpecKey) -> Option<Arc<FitResult>> {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.get(key).cloned()
        }?;
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    pub fn contains(&self, key: &SpecKey) -> bool {
        self.get(key).is_some()
    }

    /// Number of stored fits.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of times a fit function actually ran to completion.
    pub fn fits_computed(&self) -> usize {
        self.computed.load(Ordering::SeqCst)
    }

    /// Stored fits ordered by key (deterministic regardless of fit order).
    pub fn snapshot(&self) -> BTreeMap<SpecKey, Arc<FitResult>> {
        let slots: Vec<(SpecKey, Slot)> = {
            let map = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            map.iter().map(|(k, s)| (k.clone(), Arc::clone(s))).collect()
        };
        slots
            .into_iter()
            .filter_map(|(k, slot)| {
                let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
                guard.as_ref().map(|fit| (k, Arc::clone(fit)))
            })
            .collect()
    }

    fn slot(&self, key: &SpecKey) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.clone()).or_default())
    }
}
