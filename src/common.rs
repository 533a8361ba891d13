use std::fmt;

use crate::error::SimError;

// system specs

#[derive(Clone, Debug)]
pub struct SimSpec {
    pub num_workers: usize,
    pub ops_per_worker: usize,
    pub addrs: Vec<Addr>,
    pub base_value: Value,
    pub value_min: Value,
    pub value_max: Value,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub coherence: bool,
    pub seed: Option<u64>,
}

impl Default for SimSpec {
    fn default() -> Self {
        SimSpec {
            num_workers: 4,                 // threads
            ops_per_worker: 10,             // operations
            addrs: vec![Addr::from("x")],   // single shared location
            base_value: 0,                  // initial value of every address
            value_min: 1,                   // inclusive
            value_max: 100,                 // inclusive
            delay_min_ms: 10,               // pacing between operations
            delay_max_ms: 50,
            coherence: false,
            seed: None,                     // None draws from entropy
        }
    }
}

impl SimSpec {
    pub fn validate(&self) -> Result<(), SimError> {
        if self.num_workers == 0 {
            return Err(SimError::InvalidSpec("at least one worker is required".into()));
        }
        if self.addrs.is_empty() {
            return Err(SimError::InvalidSpec("at least one address is required".into()));
        }
        if self.value_min > self.value_max {
            return Err(SimError::InvalidSpec(format!(
                "value range {}..={} is empty", self.value_min, self.value_max)));
        }
        if self.delay_min_ms > self.delay_max_ms {
            return Err(SimError::InvalidSpec(format!(
                "delay range {}..={}ms is empty", self.delay_min_ms, self.delay_max_ms)));
        }
        Ok(())
    }

    /// seed for the operation stream of worker `id`, if the run is seeded
    pub fn worker_seed(&self, id: WorkerId) -> Option<u64> {
        self.seed.map(|s| s.wrapping_mul(0x9e3779b97f4a7c15) ^ id.0 as u64)
    }
}

// addresses and values

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Addr(pub String);

impl From<&str> for Addr {
    fn from(name: &str) -> Self {
        Addr(name.to_owned())
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type Value = i64;

// workers

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct WorkerId(pub u32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// operations

#[derive(Clone, PartialEq, Debug)]
pub enum Op {
    Read(Addr),
    Write(Addr, Value),
}
