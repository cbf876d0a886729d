mod workload;

use std::{fs::File, path::PathBuf, process::ExitCode, thread, time::Instant};

use clap::{Parser, ValueEnum};
use log::{error, info};
use nvm_kv::{
  db::Engine,
  errors::Errors,
  option::{EscalationPolicy, Options, ReadMode, LOCAL_ARENA_SIZE},
};
use thiserror::Error;

use crate::workload::{set_get, set_pure, CheckError, Pool};

const SEEDS: [u64; 16] = [
  19, 31, 277, 131, 97, 2333, 19997, 22221, 217, 89, 73, 31, 17, 255, 103, 207,
];

#[derive(Parser, Debug)]
#[command(name = "judge", about = "Load and consistency driver for nvm-kv")]
struct Args {
  /// Records written by each thread in the set phase
  #[arg(short = 's', long, default_value_t = 1_000_000)]
  per_set: usize,

  /// Operations run by each thread in the mixed phase
  #[arg(short = 'g', long, default_value_t = 1_000_000)]
  per_get: usize,

  #[arg(short = 't', long, default_value_t = 16)]
  threads: usize,

  #[arg(short = 'd', long, default_value = "./DB")]
  db: PathBuf,

  /// Use the production preset (72GB arena); ignores --arena-size
  #[arg(long)]
  production: bool,

  #[arg(long, default_value_t = LOCAL_ARENA_SIZE)]
  arena_size: u64,

  #[arg(long, default_value_t = 1024)]
  buckets: usize,

  #[arg(long, value_enum, default_value_t = Policy::Chaining)]
  policy: Policy,

  /// Conflict threshold or chaining probe limit
  #[arg(long, default_value_t = 5)]
  limit: usize,

  #[arg(long)]
  lock_free_reads: bool,

  /// Keep every n-th written record for the consistency check
  #[arg(long, default_value_t = 4096)]
  sample_every: usize,

  /// Log to stderr instead of ./performance.log
  #[arg(long)]
  log_stderr: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
  Capacity,
  Threshold,
  Chaining,
}

#[derive(Error, Debug)]
enum JudgeError {
  #[error("engine error: {0}")]
  Engine(#[from] Errors),

  #[error("failed to create log file: {0}")]
  LogFile(#[from] std::io::Error),

  #[error(transparent)]
  Check(#[from] CheckError),

  #[error("worker thread panicked")]
  WorkerPanicked,
}

fn main() -> ExitCode {
  let args = Args::parse();
  if let Err(e) = init_logger(&args) {
    eprintln!("{}", e);
    return ExitCode::FAILURE;
  }

  println!("start judge...");
  match run(&args) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      error!("{}", e);
      eprintln!("{}", e);
      ExitCode::FAILURE
    }
  }
}

fn init_logger(args: &Args) -> Result<(), JudgeError> {
  let env = env_logger::Env::default().default_filter_or("info");
  let mut builder = env_logger::Builder::from_env(env);
  if !args.log_stderr {
    let file = File::create("./performance.log")?;
    builder.target(env_logger::Target::Pipe(Box::new(file)));
  }
  builder.init();
  Ok(())
}

fn engine_options(args: &Args) -> Options {
  let mut opts = if args.production {
    Options::production(&args.db)
  } else {
    Options {
      path: args.db.clone(),
      arena_size: args.arena_size,
      ..Default::default()
    }
  };
  opts.bucket_count = args.buckets;
  opts.policy = match args.policy {
    Policy::Capacity => EscalationPolicy::CapacityOnly,
    Policy::Threshold => EscalationPolicy::Threshold { limit: args.limit },
    Policy::Chaining => EscalationPolicy::Chaining {
      probe_limit: args.limit,
    },
  };
  opts.read_mode = if args.lock_free_reads {
    ReadMode::LockFree
  } else {
    ReadMode::Locked
  };
  opts
}

fn run(args: &Args) -> Result<(), JudgeError> {
  let start = Instant::now();
  let engine = Engine::open(engine_options(args))?;
  info!(
    "judge: {} threads, {} sets, {} mixed ops each",
    args.threads, args.per_set, args.per_get
  );

  let mut pools: Vec<Pool> = thread::scope(|s| {
    let handles: Vec<_> = (0..args.threads)
      .map(|_| {
        let engine = &engine;
        s.spawn(move || set_pure(engine, args.per_set, args.sample_every))
      })
      .collect();
    handles
      .into_iter()
      .map(|handle| handle.join().map_err(|_| JudgeError::WorkerPanicked))
      .collect::<Result<Vec<_>, _>>()
  })?;
  let set_elapsed = start.elapsed();

  thread::scope(|s| {
    let handles: Vec<_> = pools
      .iter_mut()
      .enumerate()
      .map(|(id, pool)| {
        let engine = &engine;
        let seed = SEEDS[id % SEEDS.len()];
        s.spawn(move || set_get(engine, id, pool, args.per_get, seed))
      })
      .collect();
    for handle in handles {
      handle.join().map_err(|_| JudgeError::WorkerPanicked)??;
    }
    Ok::<(), JudgeError>(())
  })?;
  let total_elapsed = start.elapsed();

  let stat = engine.stat();
  info!("{:?}", stat);
  engine.close()?;

  println!(
    "Set: {:.2}ms\nGet & Set: {:.2}ms",
    set_elapsed.as_secs_f64() * 1000.0,
    (total_elapsed - set_elapsed).as_secs_f64() * 1000.0
  );
  Ok(())
}
