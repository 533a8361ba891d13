use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::error;

use coherence_sim::{Addr, SimError, SimSpec, Simulation, Stats};

#[derive(Clone, Copy, PartialEq, Debug, ValueEnum)]
enum Mode {
    Off,
    On,
}

/// Compare cache hits, misses and invalidations with and without
/// write-invalidate coherence.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// number of worker threads
    #[arg(short, long, default_value_t = 4)]
    workers: usize,

    /// operations per worker
    #[arg(short, long, default_value_t = 10)]
    ops: usize,

    /// seed for reproducible operation streams
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = 10)]
    min_delay_ms: u64,

    #[arg(long, default_value_t = 50)]
    max_delay_ms: u64,

    /// shared addresses (repeatable)
    #[arg(long = "addr", default_value = "x")]
    addrs: Vec<String>,

    /// run a single mode instead of comparing both
    #[arg(long, value_enum)]
    only: Option<Mode>,
}

impl Args {
    fn spec(&self, coherence: bool) -> SimSpec {
        SimSpec {
            num_workers: self.workers,
            ops_per_worker: self.ops,
            addrs: self.addrs.iter().map(|a| Addr::from(a.as_str())).collect(),
            delay_min_ms: self.min_delay_ms,
            delay_max_ms: self.max_delay_ms,
            coherence,
            seed: self.seed,
            ..Default::default()
        }
    }
}

fn print_comparison(without: &Stats, with: &Stats) {
    let widest = without.entries().iter().chain(with.entries().iter())
        .map(|(_, n)| *n)
        .max()
        .unwrap_or(0)
        .max(1);
    let bar = |n: u64| "#".repeat((n * 40 / widest) as usize);
    println!("\n{:<14}{:>8}{:>8}", "", "off", "on");
    for ((label, a), (_, b)) in without.entries().into_iter().zip(with.entries()) {
        println!("{:<14}{:>8}{:>8}", label, a, b);
        println!("{:<14}  off |{}", "", bar(a));
        println!("{:<14}  on  |{}", "", bar(b));
    }
    println!("{:<14}{:>7.0}%{:>7.0}%", "hit rate", without.hit_rate() * 100.0, with.hit_rate() * 100.0);
}

fn run(args: &Args) -> Result<(), SimError> {
    let run_mode = |coherence: bool| -> Result<Stats, SimError> {
        println!("{}:", if coherence { "With coherence" } else { "Without coherence" });
        let stats = Simulation::new(args.spec(coherence)).run()?.stats;
        println!("{}", stats);
        Ok(stats)
    };
    match args.only {
        Some(mode) => {
            run_mode(mode == Mode::On)?;
        }
        None => {
            let without = run_mode(false)?;
            println!();
            let with = run_mode(true)?;
            print_comparison(&without, &with);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    // logging
    let env = Env::default()
        .filter_or("COHERENCE_LOG_LEVEL", "info")
        .write_style_or("COHERENCE_LOG_STYLE", "auto");
    env_logger::init_from_env(env);

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("simulation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
