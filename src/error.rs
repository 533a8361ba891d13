//! Error types for the coherence simulator.
//!
//! Every variant is a construction-order or contract bug, none of them is
//! recoverable inside a run.

use thiserror::Error;

use crate::common::{Addr, WorkerId};

#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    /// read of an address that was never written to shared memory
    #[error("unknown address `{0}`")]
    UnknownAddress(Addr),

    #[error("worker {0} is already registered")]
    DuplicateRegistration(WorkerId),

    /// a worker started operating without being present in the directory
    #[error("worker {0} started before registering with the directory")]
    UseBeforeRegistration(WorkerId),

    /// an operation was issued to a worker that is not running
    #[error("worker {0} is not running")]
    NotRunning(WorkerId),

    /// registration attempted after the directory was sealed for the run
    #[error("worker {0} tried to register after the run started")]
    RegistrationClosed(WorkerId),

    #[error("worker {0} panicked")]
    WorkerPanicked(WorkerId),

    #[error("invalid simulation spec: {0}")]
    InvalidSpec(String),
}
