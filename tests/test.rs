use std::sync::Arc;
use std::time::{Duration, Instant};

use proptest::prelude::*;

use coherence_sim::*;

fn x() -> Addr {
    Addr::from("x")
}

fn machine(trace: Arc<dyn TraceSink>) -> Machine {
    Machine::new(SharedStore::with_values([&x()], 0), trace)
}

fn started(id: u32, m: &Machine, coherence: bool) -> Worker {
    let mut w = Worker::new(WorkerId(id), m.clone(), coherence, Box::new(ScriptedSource::new(Vec::<Op>::new())), 0);
    w.register().unwrap();
    w.start().unwrap();
    w
}

fn quick_spec(workers: usize, ops: usize, coherence: bool, seed: u64) -> SimSpec {
    SimSpec {
        num_workers: workers,
        ops_per_worker: ops,
        delay_min_ms: 0,
        delay_max_ms: 0,
        coherence,
        seed: Some(seed),
        ..Default::default()
    }
}

#[test]
fn scripted_exchange_with_coherence() {
    let m = machine(Arc::new(TraceLog::new()));
    let mut w1 = started(1, &m, true);
    let mut w2 = started(2, &m, true);

    w1.exec(Op::Write(x(), 42)).unwrap();

    let ev = w2.exec(Op::Read(x())).unwrap();
    assert_eq!((ev.access, ev.value), (Access::ReadMiss, 42));
    assert_eq!(w1.cache().read(&x()), Lookup::Hit(42));

    w2.exec(Op::Write(x(), 7)).unwrap();
    assert_eq!(w1.cache().read(&x()), Lookup::Stale(42));

    let ev = w1.exec(Op::Read(x())).unwrap();
    assert_eq!((ev.access, ev.value), (Access::ReadMiss, 7));

    assert_eq!(m.counters.snapshot(), Stats { cache_hit: 0, cache_miss: 2, invalidation: 2 });
}

#[test]
fn scripted_exchange_without_coherence_reads_stale() {
    let m = machine(Arc::new(TraceLog::new()));
    let mut w1 = started(1, &m, false);
    let mut w2 = started(2, &m, false);

    w1.exec(Op::Write(x(), 42)).unwrap();
    assert_eq!(w1.cache().read(&x()), Lookup::Hit(42));

    let ev = w2.exec(Op::Read(x())).unwrap();
    assert_eq!((ev.access, ev.value), (Access::ReadMiss, 42));

    w2.exec(Op::Write(x(), 7)).unwrap();
    assert_eq!(m.memory.read(&x()), Ok(7));

    // a hit on a value memory no longer holds
    let ev = w1.exec(Op::Read(x())).unwrap();
    assert_eq!((ev.access, ev.value), (Access::ReadHit, 42));

    assert_eq!(m.counters.snapshot(), Stats { cache_hit: 1, cache_miss: 1, invalidation: 0 });
}

#[test]
fn trace_records_every_operation() {
    let log = Arc::new(TraceLog::new());
    let m = machine(log.clone());
    let mut w = started(0, &m, true);
    w.exec(Op::Read(x())).unwrap();
    w.exec(Op::Write(x(), 3)).unwrap();
    w.exec(Op::Read(x())).unwrap();
    let lines = log.events().iter().map(|e| e.to_string()).collect::<Vec<_>>();
    assert_eq!(lines, vec![
        "[T0] READ x = 0 (miss)",
        "[T0] WRITE x = 3",
        "[T0] READ x = 3 (hit)",
    ]);
}

#[test]
fn coherent_run_leaves_no_stale_valid_lines() {
    for seed in 0..20 {
        let mut spec = quick_spec(4, 40, true, seed);
        spec.addrs = vec![Addr::from("x"), Addr::from("y")];
        let report = Simulation::new(spec)
            .with_trace(Arc::new(TraceLog::new()))
            .run()
            .unwrap();
        assert!(report.stale_lines().is_empty(), "seed {}: {:?}", seed, report.stale_lines());
    }
}

#[test]
fn last_write_in_lock_order_wins() {
    for seed in 0..10 {
        let log = Arc::new(TraceLog::new());
        let report = Simulation::new(quick_spec(4, 30, true, seed))
            .with_trace(log.clone())
            .run()
            .unwrap();
        let events = log.events();
        let seqs = events.iter().filter_map(|e| e.seq).collect::<Vec<_>>();
        assert_eq!(seqs.len() as u64, report.writes());
        let last = events.iter()
            .filter(|e| e.access == Access::Write)
            .max_by_key(|e| e.seq);
        let expected = last.map_or(0, |e| e.value);
        assert_eq!(report.memory[&x()], expected, "seed {}", seed);
    }
}

#[test]
fn runs_do_not_share_state() {
    let writer = Simulation::new(quick_spec(2, 1, true, 0))
        .with_trace(Arc::new(TraceLog::new()))
        .with_sources(|_, _| Box::new(ScriptedSource::new([Op::Write(x(), 99)])) as Box<dyn OpSource>);
    assert_eq!(writer.run().unwrap().memory[&x()], 99);

    let log = Arc::new(TraceLog::new());
    let reader = Simulation::new(quick_spec(2, 1, true, 0))
        .with_trace(log.clone())
        .with_sources(|_, _| Box::new(ScriptedSource::new([Op::Read(x())])) as Box<dyn OpSource>);
    let report = reader.run().unwrap();
    assert_eq!(report.stats, Stats { cache_hit: 0, cache_miss: 2, invalidation: 0 });
    assert!(log.events().iter().all(|e| e.value == 0));
}

#[test]
fn unknown_address_aborts_the_run() {
    let sim = Simulation::new(quick_spec(2, 1, true, 0))
        .with_trace(Arc::new(TraceLog::new()))
        .with_sources(|_, _| Box::new(ScriptedSource::new([Op::Read(Addr::from("z"))])) as Box<dyn OpSource>);
    assert_eq!(sim.run().unwrap_err(), SimError::UnknownAddress(Addr::from("z")));
}

#[test]
fn failing_worker_stops_the_others_early() {
    let sim = Simulation::new(quick_spec(2, 20, true, 0))
        .with_trace(Arc::new(TraceLog::new()))
        .with_sources(|id, _| {
            let script = if id == WorkerId(0) {
                ScriptedSource::new([Op::Read(Addr::from("z"))])
            } else {
                ScriptedSource::new((1..=20).map(|v| Op::Write(x(), v)))
                    .with_pause(Duration::from_millis(100))
            };
            Box::new(script) as Box<dyn OpSource>
        });
    let t0 = Instant::now();
    assert_eq!(sim.run().unwrap_err(), SimError::UnknownAddress(Addr::from("z")));
    // running T1's whole script would take two seconds
    assert!(t0.elapsed() < Duration::from_millis(1000), "took {:?}", t0.elapsed());
}

#[cfg(target_pointer_width = "64")]
#[test]
fn worker_count_beyond_id_range_is_rejected() {
    let spec = SimSpec { num_workers: u32::MAX as usize + 1, ..Default::default() };
    assert!(matches!(Simulation::new(spec).run(), Err(SimError::InvalidSpec(_))));
}

#[test]
fn invalid_spec_is_rejected_before_running() {
    let spec = SimSpec { addrs: vec![], ..Default::default() };
    assert!(matches!(Simulation::new(spec).run(), Err(SimError::InvalidSpec(_))));
}

#[test]
fn simulate_counts_every_operation() {
    let without = simulate(4, false).unwrap();
    assert_eq!(without.invalidation, 0);
    assert!(without.reads() <= 40);

    // with coherence every operation is either a read or an invalidating write
    let with = simulate(4, true).unwrap();
    assert_eq!(with.reads() + with.invalidation, 40);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn counters_are_conserved(
        seed in any::<u64>(),
        workers in 1usize..5,
        ops in 0usize..25,
        coherence in any::<bool>(),
    ) {
        let report = Simulation::new(quick_spec(workers, ops, coherence, seed))
            .with_trace(Arc::new(TraceLog::new()))
            .run()
            .unwrap();
        prop_assert_eq!(report.stats.reads(), report.reads());
        prop_assert_eq!(report.reads() + report.writes(), (workers * ops) as u64);
        let expected = if coherence { report.writes() } else { 0 };
        prop_assert_eq!(report.stats.invalidation, expected);
    }

    #[test]
    fn invalidation_is_idempotent(value in any::<i64>(), written in any::<bool>()) {
        let once = WorkerCache::new();
        let twice = WorkerCache::new();
        if written {
            once.write(&x(), value);
            twice.write(&x(), value);
        }
        once.invalidate(&x());
        twice.invalidate(&x());
        twice.invalidate(&x());
        prop_assert_eq!(once.read(&x()), twice.read(&x()));
        prop_assert!(!twice.read(&x()).is_hit());
    }
}
