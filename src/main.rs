//! Stress harness for the `TicketLock` from the `axiom-ticketlock` crate.
//!
//! Spawns `threads` workers, each running `iterations` rounds of: take the
//! lock, read a shared counter, pause a random while, write the counter back
//! incremented, release the lock, pause again. The counter's read and write
//! are separate operations, so any round that overlaps another holder loses
//! an update. At the end the counter must equal `iterations × threads`.
//!
//! ```text
//! ticketlock-stress [ITERATIONS] [THREADS] [--capacity N] ...
//! LOG=debug ticketlock-stress 20 4
//! ticketlock-stress 10 3 --capacity 2   # undersized: tickets alias, order is lost
//! ```

mod logging;

use std::io;
use std::ops::RangeInclusive;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU32, Ordering::Relaxed};
use std::thread;
use std::time::Duration;

use axiom_ticketlock::{CapacityError, TicketLock};
use clap::{error::ErrorKind, CommandFactory, Parser};
use log::{debug, error, info, warn};
use rand::Rng;

#[derive(Parser, Debug)]
#[command(name = "ticketlock-stress")]
#[command(about = "Hammer a ticket lock with worker threads and check the shared counter")]
struct Args {
    /// Number of iterations per thread
    #[arg(default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    iterations: u32,

    /// Number of threads to start
    #[arg(default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    threads: u32,

    /// Ticket lock capacity (defaults to the thread count)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    capacity: Option<u32>,

    /// Minimum pause inside the critical section, in microseconds
    #[arg(long, default_value_t = 10_000)]
    hold_min_us: u64,

    /// Maximum pause inside the critical section, in microseconds
    #[arg(long, default_value_t = 15_000)]
    hold_max_us: u64,

    /// Minimum pause after releasing the lock, in microseconds
    #[arg(long, default_value_t = 100_000)]
    pause_min_us: u64,

    /// Maximum pause after releasing the lock, in microseconds
    #[arg(long, default_value_t = 150_000)]
    pause_max_us: u64,

    /// Extra sleep for worker 0 after each release, in milliseconds (0 disables)
    #[arg(long, default_value_t = 1_000)]
    straggler_ms: u64,

    /// Slow every ticket/turn increment (1 step, 25 ms unless overridden)
    #[cfg(feature = "fault-injection")]
    #[arg(long)]
    fault: bool,

    /// Delay of each slowed increment, in milliseconds (implies --fault)
    #[cfg(feature = "fault-injection")]
    #[arg(long)]
    fault_hold_ms: Option<u64>,

    /// Amount added by each slowed increment (implies --fault)
    #[cfg(feature = "fault-injection")]
    #[arg(long)]
    fault_amount: Option<u32>,
}

/// Per-worker loop parameters.
struct Workload {
    iterations: u32,
    hold: RangeInclusive<u64>,
    pause: RangeInclusive<u64>,
    straggler: Duration,
}

fn main() -> ExitCode {
    if let Err(err) = logging::init() {
        eprintln!("ticketlock-stress: logger unavailable: {err}");
    }

    let args = Args::parse();
    let Some(expected) = args.iterations.checked_mul(args.threads) else {
        Args::command()
            .error(
                ErrorKind::ValueValidation,
                "iterations × threads does not fit in a 32-bit counter",
            )
            .exit()
    };
    if args.hold_min_us > args.hold_max_us || args.pause_min_us > args.pause_max_us {
        Args::command()
            .error(
                ErrorKind::ArgumentConflict,
                "each minimum pause must not exceed its maximum",
            )
            .exit()
    }

    let capacity = args.capacity.unwrap_or(args.threads);
    if let Err(err) = CapacityError::check(capacity, args.threads) {
        warn!("{err}; tickets may alias and admission order may not follow arrival order");
    }
    let lock = build_lock(&args, capacity);

    let workload = Workload {
        iterations: args.iterations,
        hold: args.hold_min_us..=args.hold_max_us,
        pause: args.pause_min_us..=args.pause_max_us,
        straggler: Duration::from_millis(args.straggler_ms),
    };

    info!(
        "ticketlock-stress starts with ({}, {}), capacity {}",
        args.iterations, args.threads, capacity
    );

    let counter = AtomicU32::new(0);
    if let Err(err) = run(&lock, &counter, args.threads, &workload) {
        error!("failed to start workers: {err}");
        return ExitCode::FAILURE;
    }

    let total = counter.load(Relaxed);
    info!(
        "ticketlock-stress ends with ({}, {})",
        args.iterations, args.threads
    );
    println!(
        "Final value: {} {} {}",
        total,
        if total == expected { "=" } else { "<" },
        expected
    );

    if total == expected {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn build_lock(args: &Args, capacity: u32) -> TicketLock {
    #[cfg(feature = "fault-injection")]
    if args.fault || args.fault_hold_ms.is_some() || args.fault_amount.is_some() {
        let mut fault = axiom_ticketlock::SlowIncrement::default();
        if let Some(ms) = args.fault_hold_ms {
            fault.hold = Duration::from_millis(ms);
        }
        if let Some(amount) = args.fault_amount {
            fault.amount = amount;
        }
        return TicketLock::with_fault_injection(capacity, fault);
    }

    debug!("harness: plain ticket lock for {} threads", args.threads);
    TicketLock::new(capacity)
}

/// Runs all workers to completion, joining them in start order.
fn run(
    lock: &TicketLock,
    counter: &AtomicU32,
    threads: u32,
    workload: &Workload,
) -> io::Result<()> {
    thread::scope(|s| {
        let mut handles = Vec::with_capacity(threads as usize);
        for index in 0..threads {
            let name = format!("worker_thread {index}");
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn_scoped(s, move || worker(&name, index, lock, counter, workload))?;
            handles.push(handle);
        }

        for (index, handle) in handles.into_iter().enumerate() {
            debug!("main: joining worker_thread {index}");
            if handle.join().is_err() {
                error!("worker_thread {index} panicked");
            }
            debug!("main: joined worker_thread {index}");
        }
        Ok(())
    })
}

fn worker(name: &str, index: u32, lock: &TicketLock, counter: &AtomicU32, workload: &Workload) {
    let mut rng = rand::thread_rng();

    for i in 0..workload.iterations {
        let ticket = lock.lock();
        let seen = counter.load(Relaxed);
        info!("{name}[{i}]: counter (ticket/turn): {seen}({ticket})");
        if ticket.waited() {
            debug!("{name}[{i}]: queued behind turn {}", ticket.initial_turn());
        }
        thread::sleep(Duration::from_micros(rng.gen_range(workload.hold.clone())));
        counter.store(seen + 1, Relaxed);
        lock.unlock();

        if index == 0 && !workload.straggler.is_zero() {
            thread::sleep(workload.straggler);
        }
        thread::sleep(Duration::from_micros(rng.gen_range(workload.pause.clone())));
    }

    info!("{name}: done");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_run() {
        let args = Args::try_parse_from(["ticketlock-stress"]).unwrap();
        assert_eq!((args.iterations, args.threads), (10, 3));
        assert_eq!(args.capacity, None);
        assert_eq!(args.straggler_ms, 1_000);
    }

    #[test]
    fn test_straggler_can_be_disabled() {
        let args =
            Args::try_parse_from(["ticketlock-stress", "20", "4", "--straggler-ms", "0"]).unwrap();
        assert_eq!((args.iterations, args.threads), (20, 4));
        assert_eq!(args.straggler_ms, 0);
    }
}
