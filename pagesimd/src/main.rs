//! # Paging Simulator
//!
//! Main entry point for the simulator.

use clap::Parser;
use pagesimd::{SimConfig, SimRuntime, DEFAULT_ILLEGAL_PROBABILITY};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

/// Demand-paged virtual memory simulator
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of workloads
    #[arg(short = 'k', long)]
    workloads: u32,

    /// Pages in each workload's virtual address space
    #[arg(short = 'm', long)]
    address_space: u32,

    /// Physical frames
    #[arg(short = 'f', long)]
    frames: u32,

    /// Chance that a generated reference is out of range
    #[arg(long, default_value_t = DEFAULT_ILLEGAL_PROBABILITY)]
    illegal_probability: f64,

    /// Seed for reproducible reference strings
    #[arg(long)]
    seed: Option<u64>,

    /// Delay between workload starts, in milliseconds
    #[arg(long, default_value_t = 0)]
    stagger_ms: u64,

    /// Write the diagnostic stream to this file as JSON lines
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> SimConfig {
        let mut config = SimConfig::new(self.workloads, self.address_space, self.frames)
            .with_illegal_probability(self.illegal_probability)
            .with_stagger(Duration::from_millis(self.stagger_ms));
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(path) = &self.trace {
            config = config.with_trace_path(path);
        }
        config
    }
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let runtime = SimRuntime::new(args.config()).unwrap_or_else(|e| {
        eprintln!("Failed to create runtime: {}", e);
        process::exit(1);
    });

    let interrupt = runtime.interrupt_handle();
    if let Err(e) = ctrlc::set_handler(move || interrupt.interrupt()) {
        eprintln!("Failed to install interrupt handler: {}", e);
        process::exit(1);
    }

    let report = runtime.run().unwrap_or_else(|e| {
        eprintln!("Runtime error: {}", e);
        process::exit(1);
    });

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to encode report: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("{}", report);
    }

    if matches!(report.outcome, pagesimd::RunOutcome::Failed(_)) {
        process::exit(2);
    }
}
