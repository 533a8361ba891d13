//! Where workers get their next operation and pacing delay from.
//!
//! Randomness is injected through [`OpSource`] so tests can replace it with a
//! fixed script.

use std::collections::VecDeque;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::common::{Addr, Op, SimSpec, Value};

pub trait OpSource: Send {
    /// the next operation, `None` once the source is exhausted
    fn next_op(&mut self) -> Option<Op>;
    /// how long to wait after the operation just executed
    fn pause(&mut self) -> Duration;
}

/// Coin-flip between read and write on a random address, written values and
/// delays drawn uniformly from the `SimSpec` ranges.
pub struct RandomSource {
    rng: ChaCha8Rng,
    addrs: Vec<Addr>,
    values: (Value, Value),
    delay_ms: (u64, u64),
}

impl RandomSource {
    pub fn new(spec: &SimSpec, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        RandomSource {
            rng,
            addrs: spec.addrs.clone(),
            values: (spec.value_min, spec.value_max),
            delay_ms: (spec.delay_min_ms, spec.delay_max_ms),
        }
    }
}

impl OpSource for RandomSource {
    fn next_op(&mut self) -> Option<Op> {
        let addr = self.addrs.choose(&mut self.rng)?.clone();
        if self.rng.gen_bool(0.5) {
            Some(Op::Read(addr))
        } else {
            let (lo, hi) = self.values;
            Some(Op::Write(addr, self.rng.gen_range(lo..=hi)))
        }
    }
    fn pause(&mut self) -> Duration {
        let (lo, hi) = self.delay_ms;
        Duration::from_millis(self.rng.gen_range(lo..=hi))
    }
}

/// Replays a fixed list of operations.
pub struct ScriptedSource {
    ops: VecDeque<Op>,
    pause: Duration,
}

impl ScriptedSource {
    pub fn new(ops: impl IntoIterator<Item = Op>) -> Self {
        ScriptedSource { ops: ops.into_iter().collect(), pause: Duration::ZERO }
    }
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
    pub fn remaining(&self) -> usize {
        self.ops.len()
    }
}

impl OpSource for ScriptedSource {
    fn next_op(&mut self) -> Option<Op> {
        self.ops.pop_front()
    }
    fn pause(&mut self) -> Duration {
        self.pause
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(src: &mut impl OpSource, n: usize) -> Vec<Op> {
        (0..n).filter_map(|_| src.next_op()).collect()
    }

    #[test]
    fn same_seed_same_stream() {
        let spec = SimSpec::default();
        let a = drain(&mut RandomSource::new(&spec, Some(3)), 50);
        let b = drain(&mut RandomSource::new(&spec, Some(3)), 50);
        assert_eq!(a, b);
    }

    #[test]
    fn random_ops_stay_in_range() {
        let spec = SimSpec {
            addrs: vec![Addr::from("x"), Addr::from("y")],
            ..Default::default()
        };
        let mut src = RandomSource::new(&spec, Some(11));
        for op in drain(&mut src, 200) {
            match op {
                Op::Read(a) => assert!(spec.addrs.contains(&a)),
                Op::Write(a, v) => {
                    assert!(spec.addrs.contains(&a));
                    assert!((1..=100).contains(&v));
                }
            }
        }
        let d = src.pause();
        assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(50));
    }

    #[test]
    fn random_source_mixes_reads_and_writes() {
        let ops = drain(&mut RandomSource::new(&SimSpec::default(), Some(1)), 100);
        assert!(ops.iter().any(|o| matches!(o, Op::Read(_))));
        assert!(ops.iter().any(|o| matches!(o, Op::Write(..))));
    }

    #[test]
    fn script_replays_in_order_then_ends() {
        let x = Addr::from("x");
        let mut src = ScriptedSource::new([Op::Write(x.clone(), 1), Op::Read(x.clone())]);
        assert_eq!(src.next_op(), Some(Op::Write(x.clone(), 1)));
        assert_eq!(src.remaining(), 1);
        assert_eq!(src.next_op(), Some(Op::Read(x)));
        assert_eq!(src.next_op(), None);
        assert_eq!(src.pause(), Duration::ZERO);
    }

    #[test]
    fn script_pause_is_configurable() {
        let mut src = ScriptedSource::new(Vec::<Op>::new()).with_pause(Duration::from_millis(3));
        assert_eq!(src.pause(), Duration::from_millis(3));
        assert_eq!(src.next_op(), None);
    }
}
