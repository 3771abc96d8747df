//! memo CLI driver
//!
//! A small driver around `memo-cache`: `memo warm` fills a cache with an
//! integer addition grid from a parallel worker pool (repeat runs hit the
//! cache), and `memo ls` walks a cache root and reports every entry with
//! its observed state.

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::{Parser, Subcommand};
use memo_cache::{
    CacheConfig, CallArgs, EntryState, KeyEncoding, KeyPolicy, Memoized, Parameter,
    ParameterBinding, ResultStore, Signature,
};
use rayon::prelude::*;
use serde_json::Value;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "memo", version, about = "Disk-backed memoization for expensive computations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Warm a cache with an integer addition grid
    Warm {
        /// Cache root directory (defaults to the discovered platform dir)
        #[arg(long, env = "MEMO_CACHE_DIR")]
        cache_dir: Option<PathBuf>,
        /// Encode keys as a single digest instead of literal path segments
        #[arg(long)]
        digest: bool,
        /// Warm every (x, y) in 1..=N x 1..=N
        #[arg(long, default_value_t = 10)]
        grid: u32,
    },
    /// List cache entries and their states
    Ls {
        /// Cache root directory (defaults to the discovered platform dir)
        #[arg(long, env = "MEMO_CACHE_DIR")]
        cache_dir: Option<PathBuf>,
    },
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Warm {
            cache_dir,
            digest,
            grid,
        } => warm(cache_dir, digest, grid),
        Command::Ls { cache_dir } => ls(cache_dir),
    }
}

fn config_for(cache_dir: Option<PathBuf>) -> miette::Result<CacheConfig> {
    match cache_dir {
        Some(dir) => Ok(CacheConfig::new(dir)),
        None => Ok(CacheConfig::discover()?),
    }
}

/// The demo computation: `add(x, y, verbose=false, z=0)`.
fn add(binding: &ParameterBinding) -> memo_cache::Result<i64> {
    let term = |name: &str| binding.get(name).and_then(Value::as_i64).unwrap_or(0);
    let (x, y, z) = (term("x"), term("y"), term("z"));
    if binding
        .get("verbose")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        tracing::info!(target: "memo::demo", x, y, z, "adding");
    }
    Ok(x + y + z)
}

fn add_signature() -> memo_cache::Result<Signature> {
    Signature::new(vec![
        Parameter::required("x"),
        Parameter::required("y"),
        Parameter::with_default("verbose", false),
        Parameter::with_default("z", 0),
    ])
}

fn warm(cache_dir: Option<PathBuf>, digest: bool, grid: u32) -> miette::Result<()> {
    let mut config = config_for(cache_dir)?;
    if digest {
        config = config.with_encoding(KeyEncoding::Digest);
    }
    let root = config.root().to_path_buf();

    let adder = Memoized::new(
        "add",
        add_signature()?,
        add as fn(&ParameterBinding) -> memo_cache::Result<i64>,
    )
    .with_policy(KeyPolicy::new().exclude("verbose").exclude_if_default("z"))
    .with_store(ResultStore::new(config));

    let grid = i64::from(grid);
    let pairs: Vec<(i64, i64)> = (1..=grid)
        .flat_map(|x| (1..=grid).map(move |y| (x, y)))
        .collect();
    let sums = pairs
        .par_iter()
        .map(|&(x, y)| adder.call(&CallArgs::new().arg(x).arg(y)))
        .collect::<memo_cache::Result<Vec<i64>>>()?;

    let checksum: i64 = sums.iter().sum();
    println!(
        "warmed {} entries under {} (checksum {checksum})",
        pairs.len(),
        root.display()
    );
    Ok(())
}

fn ls(cache_dir: Option<PathBuf>) -> miette::Result<()> {
    let config = config_for(cache_dir)?;
    let root = config.root();
    if !root.is_dir() {
        println!("no cache directory at {}", root.display());
        return Ok(());
    }

    let mut shown = 0usize;
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        if !entry.file_type().is_dir() {
            continue;
        }
        let state = EntryState::of(entry.path());
        if state == EntryState::Empty {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or_else(|_| entry.path());
        println!("{state:>12}  {}", rel.display());
        shown += 1;
    }
    if shown == 0 {
        println!("no entries under {}", root.display());
    }
    Ok(())
}
