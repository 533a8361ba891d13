use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::thread;

use log::{debug, error, info};

use crate::common::{Addr, SimSpec, Value, WorkerId};
use crate::error::SimError;
use crate::memory::SharedStore;
use crate::source::{OpSource, RandomSource};
use crate::stats::Stats;
use crate::trace::{LogSink, TraceSink};
use crate::worker::{Machine, Worker, WorkerReport};

/// builds the operation source of one worker
pub type SourceFactory = Box<dyn Fn(WorkerId, &SimSpec) -> Box<dyn OpSource>>;

/// Outcome of one run, collected after every worker has been joined.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub stats: Stats,
    pub workers: Vec<WorkerReport>,
    /// final memory image
    pub memory: HashMap<Addr, Value>,
    /// lines still marked valid in each worker's cache
    pub valid_lines: BTreeMap<WorkerId, HashMap<Addr, Value>>,
}

impl RunReport {
    pub fn reads(&self) -> u64 {
        self.workers.iter().map(|w| w.reads).sum()
    }
    pub fn writes(&self) -> u64 {
        self.workers.iter().map(|w| w.writes).sum()
    }
    /// valid cache lines whose value differs from memory, as (worker, addr, cached, memory)
    pub fn stale_lines(&self) -> Vec<(WorkerId, Addr, Value, Option<Value>)> {
        let mut stale = Vec::new();
        for (id, lines) in &self.valid_lines {
            for (addr, value) in lines {
                let mem = self.memory.get(addr).copied();
                if mem != Some(*value) {
                    stale.push((*id, addr.clone(), *value, mem));
                }
            }
        }
        stale
    }
}

fn random_source(id: WorkerId, spec: &SimSpec) -> Box<dyn OpSource> {
    Box::new(RandomSource::new(spec, spec.worker_seed(id)))
}

/// One simulation run. Every call to `run` builds a fresh memory, directory
/// and counter set, so runs never share state.
pub struct Simulation {
    spec: SimSpec,
    trace: Arc<dyn TraceSink>,
    sources: SourceFactory,
}

impl Simulation {
    pub fn new(spec: SimSpec) -> Self {
        Simulation {
            spec,
            trace: Arc::new(LogSink),
            sources: Box::new(random_source),
        }
    }

    pub fn with_trace(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_sources<F>(mut self, sources: F) -> Self
    where F: Fn(WorkerId, &SimSpec) -> Box<dyn OpSource> + 'static {
        self.sources = Box::new(sources);
        self
    }

    pub fn run(&self) -> Result<RunReport, SimError> {
        let spec = &self.spec;
        spec.validate()?;
        info!(
            "starting run: {} workers, {} ops each, coherence {}",
            spec.num_workers, spec.ops_per_worker, if spec.coherence { "on" } else { "off" }
        );

        let memory = SharedStore::with_values(&spec.addrs, spec.base_value);
        let machine = Machine::new(memory, self.trace.clone());

        let count = u32::try_from(spec.num_workers).map_err(|_| {
            SimError::InvalidSpec(format!("{} workers do not fit worker ids", spec.num_workers))
        })?;

        // every worker registers before any of them starts
        let workers = (0..count)
            .map(|i| {
                let id = WorkerId(i);
                let w = Worker::new(id, machine.clone(), spec.coherence, (self.sources)(id, spec), spec.ops_per_worker);
                w.register()?;
                Ok(w)
            })
            .collect::<Result<Vec<_>, SimError>>()?;
        machine.directory.seal();
        debug!("directory sealed with {} caches", machine.directory.len());

        // workers block on the gate until all of them are spawned
        let gate = Arc::new(RwLock::new(()));
        let closed = gate.write();
        let handles = workers
            .into_iter()
            .map(|w| {
                let id = w.id;
                let gate = gate.clone();
                let handle = thread::Builder::new()
                    .name(id.to_string())
                    .spawn(move || {
                        drop(gate.read());
                        w.run()
                    });
                if handle.is_err() {
                    machine.abort();
                }
                (id, handle)
            })
            .collect::<Vec<_>>();
        drop(closed);

        // the first failing worker aborts the others, join everyone before
        // reporting and keep the first error
        let mut reports = Vec::with_capacity(handles.len());
        let mut first_err = None;
        for (id, handle) in handles {
            let result = match handle {
                Ok(h) => h.join().unwrap_or(Err(SimError::WorkerPanicked(id))),
                Err(e) => {
                    error!("could not spawn {}: {}", id, e);
                    Err(SimError::WorkerPanicked(id))
                }
            };
            match result {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!("{} aborted: {}", id, e);
                    first_err.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }

        let stats = machine.counters.snapshot();
        info!("run finished: {}", stats);
        Ok(RunReport {
            stats,
            workers: reports,
            memory: machine.memory.snapshot(),
            valid_lines: machine.directory.valid_lines(),
        })
    }
}

/// Runs `worker_count` randomly driven workers on the default `SimSpec`, with or
/// without write-invalidate coherence.
pub fn simulate(worker_count: usize, coherence: bool) -> Result<Stats, SimError> {
    let spec = SimSpec { num_workers: worker_count, coherence, ..Default::default() };
    Ok(Simulation::new(spec).run()?.stats)
}
