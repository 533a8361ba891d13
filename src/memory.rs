// shared main memory, the single source of truth for every address

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::common::{Addr, Value};
use crate::error::SimError;

/// Write sequence numbers start at 1 and follow the order in which writes
/// released the store lock.
pub type WriteSeq = u64;

#[derive(Default)]
struct Cells {
    values: HashMap<Addr, Value>,
    last_seq: WriteSeq,
}

pub struct SharedStore {
    cells: Mutex<Cells>,
}

impl SharedStore {
    pub fn new() -> Self {
        SharedStore { cells: Mutex::new(Cells::default()) }
    }

    /// a store with every address in `addrs` initialized to `base`
    pub fn with_values<'a>(addrs: impl IntoIterator<Item = &'a Addr>, base: Value) -> Self {
        let values = addrs.into_iter().map(|a| (a.clone(), base)).collect();
        SharedStore { cells: Mutex::new(Cells { values, last_seq: 0 }) }
    }

    fn lock(&self) -> MutexGuard<'_, Cells> {
        // a worker that panicked mid-access cannot leave a partial value behind,
        // so a poisoned map is still consistent
        self.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read(&self, addr: &Addr) -> Result<Value, SimError> {
        self.read_and(addr, |_| ())
    }

    pub fn write(&self, addr: &Addr, value: Value) -> WriteSeq {
        self.write_and(addr, value, || ())
    }

    /// Reads `addr` and hands the value to `then` before the lock is released.
    ///
    /// Workers use this to fill their cache in the same critical section as
    /// the fetch, so a concurrent writer's invalidation cannot slip in between
    /// the fetch and the fill.
    pub fn read_and<F>(&self, addr: &Addr, then: F) -> Result<Value, SimError>
    where F: FnOnce(Value) {
        let cells = self.lock();
        let value = *cells.values.get(addr).ok_or_else(|| SimError::UnknownAddress(addr.clone()))?;
        then(value);
        Ok(value)
    }

    /// Writes `value` to `addr` and runs `then` before the lock is released.
    /// Returns the write's sequence number.
    // `then` runs under the lock so that no valid cache line outlives a newer write
    pub fn write_and<F>(&self, addr: &Addr, value: Value, then: F) -> WriteSeq
    where F: FnOnce() {
        let mut cells = self.lock();
        cells.values.insert(addr.clone(), value);
        cells.last_seq += 1;
        then();
        cells.last_seq
    }

    /// sequence number of the latest write, 0 if nothing was written yet
    pub fn last_seq(&self) -> WriteSeq {
        self.lock().last_seq
    }

    /// copy of the whole memory image
    pub fn snapshot(&self) -> HashMap<Addr, Value> {
        self.lock().values.clone()
    }
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn read_unknown_address_fails() {
        let mem = SharedStore::new();
        assert_eq!(mem.read(&Addr::from("y")), Err(SimError::UnknownAddress(Addr::from("y"))));
    }

    #[test]
    fn write_then_read() {
        let x = Addr::from("x");
        let mem = SharedStore::with_values([&x], 0);
        assert_eq!(mem.read(&x), Ok(0));
        mem.write(&x, 42);
        assert_eq!(mem.read(&x), Ok(42));
    }

    #[test]
    fn writes_are_numbered_in_lock_order() {
        let x = Addr::from("x");
        let mem = SharedStore::with_values([&x], 0);
        assert_eq!(mem.last_seq(), 0);
        assert_eq!(mem.write(&x, 1), 1);
        assert_eq!(mem.write_and(&x, 2, || ()), 2);
        assert_eq!(mem.last_seq(), 2);
    }

    #[test]
    fn write_creates_new_address() {
        let mem = SharedStore::new();
        let y = Addr::from("y");
        mem.write(&y, 3);
        assert_eq!(mem.read(&y), Ok(3));
    }

    #[test]
    fn continuation_runs_with_fetched_value() {
        let x = Addr::from("x");
        let mem = SharedStore::with_values([&x], 9);
        let mut seen = None;
        mem.read_and(&x, |v| seen = Some(v)).unwrap();
        assert_eq!(seen, Some(9));
    }

    #[test]
    fn concurrent_writers_leave_one_of_their_values() {
        let x = Addr::from("x");
        let mem = Arc::new(SharedStore::with_values([&x], 0));
        let handles = (1..=8).map(|v| {
            let mem = mem.clone();
            let x = x.clone();
            thread::spawn(move || for _ in 0..100 { mem.write(&x, v); })
        }).collect::<Vec<_>>();
        for h in handles { h.join().unwrap(); }
        let last = mem.read(&x).unwrap();
        assert!((1..=8).contains(&last));
    }
}
