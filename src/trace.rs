// per-operation trace events and where they go

use std::fmt;
use std::sync::{Mutex, PoisonError};

use log::info;

use crate::common::{Addr, Value, WorkerId};
use crate::memory::WriteSeq;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Access {
    ReadHit,
    ReadMiss,
    Write,
}

#[derive(Clone, PartialEq, Debug)]
pub struct TraceEvent {
    pub worker: WorkerId,
    pub access: Access,
    pub addr: Addr,
    pub value: Value,
    /// store sequence number, writes only
    pub seq: Option<WriteSeq>,
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.access {
            Access::ReadHit => write!(f, "[{}] READ {} = {} (hit)", self.worker, self.addr, self.value),
            Access::ReadMiss => write!(f, "[{}] READ {} = {} (miss)", self.worker, self.addr, self.value),
            Access::Write => write!(f, "[{}] WRITE {} = {}", self.worker, self.addr, self.value),
        }
    }
}

pub trait TraceSink: Send + Sync {
    fn record(&self, event: TraceEvent);
}

/// writes every event to the log at info level
pub struct LogSink;

impl TraceSink for LogSink {
    fn record(&self, event: TraceEvent) {
        info!("{}", event);
    }
}

/// keeps every event in memory, in the order they were recorded
#[derive(Default)]
pub struct TraceLog {
    events: Mutex<Vec<TraceEvent>>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TraceSink for TraceLog {
    fn record(&self, event: TraceEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}
