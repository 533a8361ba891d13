use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use log::{debug, trace};

use crate::cache::{Lookup, WorkerCache};
use crate::common::{Addr, Op, Value, WorkerId};
use crate::directory::CoherenceDirectory;
use crate::error::SimError;
use crate::memory::SharedStore;
use crate::source::OpSource;
use crate::stats::Counters;
use crate::trace::{Access, TraceEvent, TraceSink};

/// Everything a worker shares with the other workers of the same run.
#[derive(Clone)]
pub struct Machine {
    pub memory: Arc<SharedStore>,
    pub directory: Arc<CoherenceDirectory>,
    pub counters: Arc<Counters>,
    pub trace: Arc<dyn TraceSink>,
    aborted: Arc<AtomicBool>,
}

impl Machine {
    pub fn new(memory: SharedStore, trace: Arc<dyn TraceSink>) -> Self {
        Machine {
            memory: Arc::new(memory),
            directory: Arc::new(CoherenceDirectory::new()),
            counters: Arc::new(Counters::new()),
            trace,
            aborted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// tells every worker of the run to stop before its next operation
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }
}

// aborts the run if the worker thread unwinds
struct AbortOnPanic<'a>(&'a Machine);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort();
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WorkerState {
    Idle,
    Running,
    Finished,
}

impl Default for WorkerState {
    fn default() -> Self { WorkerState::Idle }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct WorkerReport {
    pub id: WorkerId,
    pub reads: u64,
    pub writes: u64,
}

pub struct Worker {
    pub id: WorkerId,
    state: WorkerState,
    cache: Arc<WorkerCache>,
    machine: Machine,
    coherence: bool,
    source: Box<dyn OpSource>,
    ops: usize,
    reads: u64,
    writes: u64,
}

impl Worker {
    /// Creates the worker with an empty cache. It has to `register` before it
    /// may start.
    pub fn new(
        id: WorkerId,
        machine: Machine,
        coherence: bool,
        source: Box<dyn OpSource>,
        ops: usize,
    ) -> Self {
        Worker {
            id,
            state: WorkerState::default(),
            cache: Arc::new(WorkerCache::new()),
            machine,
            coherence,
            source,
            ops,
            reads: 0,
            writes: 0,
        }
    }

    /// hands this worker's cache to the machine's directory
    pub fn register(&self) -> Result<(), SimError> {
        self.machine.directory.register(self.id, self.cache.clone())
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn cache(&self) -> &WorkerCache {
        &self.cache
    }

    pub fn report(&self) -> WorkerReport {
        WorkerReport { id: self.id, reads: self.reads, writes: self.writes }
    }

    pub fn start(&mut self) -> Result<(), SimError> {
        if !self.machine.directory.holds(self.id, &self.cache) {
            return Err(SimError::UseBeforeRegistration(self.id));
        }
        debug!("{} running", self.id);
        self.state = WorkerState::Running;
        Ok(())
    }

    pub fn finish(&mut self) {
        debug!("{} finished after {} reads, {} writes", self.id, self.reads, self.writes);
        self.state = WorkerState::Finished;
    }

    /// Runs the worker to completion: up to `ops` operations, each followed
    /// by the source's pacing delay. The first error aborts the whole run;
    /// a worker that sees the run aborted stops early and reports what it did.
    pub fn run(mut self) -> Result<WorkerReport, SimError> {
        let machine = self.machine.clone();
        let _guard = AbortOnPanic(&machine);
        match self.start().and_then(|()| self.run_ops()) {
            Ok(()) => {
                self.finish();
                Ok(self.report())
            }
            Err(e) => {
                machine.abort();
                Err(e)
            }
        }
    }

    fn run_ops(&mut self) -> Result<(), SimError> {
        for _ in 0..self.ops {
            if self.machine.is_aborted() {
                debug!("{} stopping, run aborted", self.id);
                break;
            }
            let op = match self.source.next_op() {
                Some(op) => op,
                None => break,
            };
            self.exec(op)?;
            let pause = self.source.pause();
            if !pause.is_zero() {
                thread::sleep(pause);
            }
        }
        Ok(())
    }

    pub fn exec(&mut self, op: Op) -> Result<TraceEvent, SimError> {
        if self.state != WorkerState::Running {
            return Err(SimError::NotRunning(self.id));
        }
        let event = match op {
            Op::Read(addr) => self.read(addr)?,
            Op::Write(addr, value) => self.write(addr, value),
        };
        self.machine.trace.record(event.clone());
        Ok(event)
    }

    fn read(&mut self, addr: Addr) -> Result<TraceEvent, SimError> {
        self.reads += 1;
        let counters = &self.machine.counters;
        let (access, value) = match self.cache.read(&addr) {
            Lookup::Hit(value) => {
                counters.record_hit();
                (Access::ReadHit, value)
            }
            Lookup::Stale(_) | Lookup::Absent => {
                counters.record_miss();
                // fill inside the store's critical section, otherwise a writer
                // could invalidate us between fetch and fill and leave a valid
                // stale line behind
                let cache = &self.cache;
                let value = self.machine.memory.read_and(&addr, |v| cache.write(&addr, v))?;
                (Access::ReadMiss, value)
            }
        };
        Ok(TraceEvent { worker: self.id, access, addr, value, seq: None })
    }

    fn write(&mut self, addr: Addr, value: Value) -> TraceEvent {
        self.writes += 1;
        let (id, cache, directory) = (self.id, &self.cache, &self.machine.directory);
        let coherence = self.coherence;
        let seq = self.machine.memory.write_and(&addr, value, || {
            // own line is always fresh after our own write
            cache.write(&addr, value);
            if coherence {
                directory.invalidate_others(id, &addr);
            }
        });
        if coherence {
            self.machine.counters.record_invalidation();
        } else {
            trace!("{} wrote {} without invalidating", id, addr);
        }
        TraceEvent { worker: id, access: Access::Write, addr, value, seq: Some(seq) }
    }
}
