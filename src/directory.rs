// The directory knows every worker cache of a run and is the only path by
// which one worker may touch another worker's cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, PoisonError};

use log::{debug, trace};

use crate::cache::WorkerCache;
use crate::common::{Addr, Value, WorkerId};
use crate::error::SimError;

pub struct CoherenceDirectory {
    caches: RwLock<BTreeMap<WorkerId, Arc<WorkerCache>>>,
    sealed: AtomicBool,
}

impl CoherenceDirectory {
    pub fn new() -> Self {
        CoherenceDirectory {
            caches: RwLock::new(BTreeMap::new()),
            sealed: AtomicBool::new(false),
        }
    }

    fn caches(&self) -> RwLockReadGuard<'_, BTreeMap<WorkerId, Arc<WorkerCache>>> {
        self.caches.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, id: WorkerId, cache: Arc<WorkerCache>) -> Result<(), SimError> {
        if self.sealed.load(Ordering::Acquire) {
            return Err(SimError::RegistrationClosed(id));
        }
        let mut caches = self.caches.write().unwrap_or_else(PoisonError::into_inner);
        if caches.contains_key(&id) {
            return Err(SimError::DuplicateRegistration(id));
        }
        caches.insert(id, cache);
        debug!("registered cache of {}", id);
        Ok(())
    }

    /// closes registration, the map is read-only from here on
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    pub fn is_registered(&self, id: WorkerId) -> bool {
        self.caches().contains_key(&id)
    }

    /// whether `cache` is the cache registered under `id`
    pub fn holds(&self, id: WorkerId, cache: &Arc<WorkerCache>) -> bool {
        self.caches().get(&id).map_or(false, |c| Arc::ptr_eq(c, cache))
    }

    pub fn len(&self) -> usize {
        self.caches().len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches().is_empty()
    }

    /// Invalidates `addr` in every registered cache except the requester's.
    /// Returns the number of caches reached.
    pub fn invalidate_others(&self, requester: WorkerId, addr: &Addr) -> usize {
        let caches = self.caches();
        let mut n = 0;
        for (_, cache) in caches.iter().filter(|(&id, _)| id != requester) {
            cache.invalidate(addr);
            n += 1;
        }
        trace!("{} invalidated {} in {} caches", requester, addr, n);
        n
    }

    /// valid lines of every registered cache
    pub fn valid_lines(&self) -> BTreeMap<WorkerId, HashMap<Addr, Value>> {
        self.caches().iter().map(|(id, c)| (*id, c.valid_lines())).collect()
    }
}

impl Default for CoherenceDirectory {
    fn default() -> Self {
        Self::new()
    }
}
