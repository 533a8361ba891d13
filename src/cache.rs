use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::common::{Addr, Value};

// data cache

#[derive(Clone, Copy, PartialEq, Debug)]
enum LineState {
    Valid,
    Invalid,
}

#[derive(Clone, Copy, Debug)]
struct Line {
    value: Value,
    state: LineState,
}

/// result of looking up an address in a worker cache
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Lookup {
    Hit(Value),
    /// present but invalidated, the stale value is kept for inspection
    Stale(Value),
    Absent,
}

impl Lookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }
    pub fn value(&self) -> Option<Value> {
        match self {
            Lookup::Hit(v) | Lookup::Stale(v) => Some(*v),
            Lookup::Absent => None,
        }
    }
}

/// A worker's private cache.
///
/// Only the owning worker reads and writes it; other workers reach it solely
/// through `CoherenceDirectory::invalidate_others`, which is why the lines sit
/// behind a lock of their own.
pub struct WorkerCache {
    lines: Mutex<HashMap<Addr, Line>>,
}

impl WorkerCache {
    pub fn new() -> Self {
        WorkerCache { lines: Mutex::new(HashMap::new()) }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Addr, Line>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read(&self, addr: &Addr) -> Lookup {
        match self.lock().get(addr) {
            Some(Line { value, state: LineState::Valid }) => Lookup::Hit(*value),
            Some(Line { value, state: LineState::Invalid }) => Lookup::Stale(*value),
            None => Lookup::Absent,
        }
    }

    /// stores `value` and marks the line valid, used for own writes and miss fills
    pub fn write(&self, addr: &Addr, value: Value) {
        self.lock().insert(addr.clone(), Line { value, state: LineState::Valid });
    }

    /// Marks `addr` invalid, keeping the stale value. An absent address is
    /// already equivalent to an invalid one and stays absent.
    pub fn invalidate(&self, addr: &Addr) {
        if let Some(line) = self.lock().get_mut(addr) {
            line.state = LineState::Invalid;
        }
    }

    /// all lines currently marked valid
    pub fn valid_lines(&self) -> HashMap<Addr, Value> {
        self.lock()
            .iter()
            .filter(|(_, l)| l.state == LineState::Valid)
            .map(|(a, l)| (a.clone(), l.value))
            .collect()
    }
}

impl Default for WorkerCache {
    fn default() -> Self {
        Self::new()
    }
}
