//! A write-invalidate cache coherence simulator.
//!
//! Several worker threads share one memory through private caches. With
//! coherence enabled every write invalidates the other caches' copies of the
//! written address; without it, caches keep serving whatever they last saw.

pub mod cache;
pub mod common;
pub mod directory;
pub mod error;
pub mod memory;
pub mod simulator;
pub mod source;
pub mod stats;
pub mod trace;
pub mod worker;

pub use cache::{Lookup, WorkerCache};
pub use common::{Addr, Op, SimSpec, Value, WorkerId};
pub use directory::CoherenceDirectory;
pub use error::SimError;
pub use memory::{SharedStore, WriteSeq};
pub use simulator::{simulate, RunReport, Simulation};
pub use source::{OpSource, RandomSource, ScriptedSource};
pub use stats::{Counters, Stats};
pub use trace::{Access, LogSink, TraceEvent, TraceLog, TraceSink};
pub use worker::{Machine, Worker, WorkerReport, WorkerState};
