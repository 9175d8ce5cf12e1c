//! Runs a three-stage pipeline end to end: stage A doubles each value,
//! stage B increments it (failing on multiples of a configurable divisor
//! to demonstrate aggregated failure reporting), stage C prints the result.

mod config;

use std::fmt;
use std::sync::{Arc, Mutex};

use clap::Parser;
use config::StageConfig;
use stagepipe::{chain, Stage};

#[derive(Debug)]
struct DemoError {
    index: usize,
}

impl fmt::Display for DemoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task {} intentionally failed", self.index)
    }
}

impl std::error::Error for DemoError {}

#[derive(Parser, Debug)]
#[command(about = "Drive a three-stage stagepipe pipeline")]
struct Args {
    /// Worker threads per background stage.
    #[arg(long, default_value_t = 2)]
    workers: usize,

    /// Bounded queue capacity per stage.
    #[arg(long, default_value_t = 8)]
    capacity: usize,

    /// Number of indices to push through the pipeline.
    #[arg(long, default_value_t = 20)]
    tasks: usize,

    /// Stage B fails every `fail_every`-th index (0 disables failures).
    #[arg(long, default_value_t = 7)]
    fail_every: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let data = Arc::new(Mutex::new(vec![0i64; args.tasks]));

    let stage_a_cfg = StageConfig::new("A", args.workers, args.capacity);
    let stage_b_cfg = StageConfig::new("B", args.workers, args.capacity);
    let stage_c_cfg = StageConfig::new("C", args.workers, args.capacity);

    let stage_a = {
        let data = Arc::clone(&data);
        Stage::new(
            stage_a_cfg.name,
            stage_a_cfg.num_workers,
            stage_a_cfg.capacity,
            move |i: usize| -> Result<(), std::convert::Infallible> {
                data.lock().unwrap()[i] *= 2;
                Ok(())
            },
        )?
    };

    let fail_every = args.fail_every;
    let stage_b = {
        let data = Arc::clone(&data);
        Stage::new(
            stage_b_cfg.name,
            stage_b_cfg.num_workers,
            stage_b_cfg.capacity,
            move |i: usize| -> Result<(), DemoError> {
                if fail_every != 0 && i % fail_every == 0 {
                    return Err(DemoError { index: i });
                }
                data.lock().unwrap()[i] += 1;
                Ok(())
            },
        )?
    };

    let stage_c = {
        let data = Arc::clone(&data);
        Stage::new(
            stage_c_cfg.name,
            stage_c_cfg.num_workers,
            stage_c_cfg.capacity,
            move |i: usize| -> Result<(), std::convert::Infallible> {
                println!("task {i}: {}", data.lock().unwrap()[i]);
                Ok(())
            },
        )?
    };

    chain(&stage_a, Arc::clone(&stage_b));
    chain(&stage_b, Arc::clone(&stage_c));

    stage_a.set_task_count(args.tasks);
    stage_b.set_task_count(args.tasks);
    stage_c.set_task_count(args.tasks);

    for i in 0..args.tasks {
        stage_a.push(i);
    }

    match stage_c.wait() {
        Ok(()) => {
            println!("pipeline completed with no failures");
            Ok(())
        }
        Err(failure) => {
            eprintln!("{failure}");
            Err(failure.into())
        }
    }
}
