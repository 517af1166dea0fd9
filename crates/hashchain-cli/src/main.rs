mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::{Config, MiningArgs};
use hashchain_core::{
    difficulty_note, sweep, verify_blocks, Block, BlockTemplate, CancelToken, Chain, Clock,
    Fingerprint, Miner, MiningConfig, SealPolicy, SystemClock,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "hashchain")]
#[command(about = "Build, mine and verify hash-linked block chains")]
struct Cli {
    /// TOML file with a [mining] table
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a genesis block plus one block per payload and check the chain
    Demo {
        /// Payload of a block to append (repeatable)
        #[arg(long = "payload")]
        payloads: Vec<String>,
        /// Mine every block instead of sealing it plainly; implied by any
        /// mining flag
        #[arg(long)]
        proof_of_work: bool,
        #[command(flatten)]
        mining: MiningArgs,
        /// Write the blocks as JSON to this file
        #[arg(long)]
        export: Option<PathBuf>,
        /// Print the blocks as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Search for a nonce for a single block
    Mine {
        #[arg(long, default_value = "Mining performance test")]
        payload: String,
        #[arg(long, default_value_t = 1)]
        index: u64,
        #[arg(long, default_value = "0")]
        previous: String,
        /// Seconds since the epoch; defaults to now
        #[arg(long)]
        timestamp: Option<u64>,
        #[command(flatten)]
        mining: MiningArgs,
    },
    /// Mine one block at each difficulty in a range and report the timings
    Sweep {
        #[arg(long, default_value_t = 2)]
        from: u32,
        #[arg(long, default_value_t = 6)]
        to: u32,
        #[arg(long, default_value = "Mining performance test")]
        payload: String,
        #[command(flatten)]
        mining: MiningArgs,
        /// Write the records as JSON to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check an exported chain
    Verify {
        file: PathBuf,
        /// Also require this many leading zeros after genesis
        #[arg(long)]
        difficulty: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.cmd {
        Command::Demo {
            payloads,
            proof_of_work,
            mining,
            export,
            json,
        } => {
            let policy = if proof_of_work || mining.is_set() {
                SealPolicy::proof_of_work(mining.apply(config.mining))
            } else {
                SealPolicy::Plain
            };
            let payloads = if payloads.is_empty() {
                vec![
                    "Second block data".to_string(),
                    "Third block data".to_string(),
                    "Fourth block data".to_string(),
                ]
            } else {
                payloads
            };
            let blocks = run_blocking(move |cancel| build_demo(policy, payloads, &cancel)).await??;

            if json {
                println!("{}", serde_json::to_string_pretty(&blocks)?);
            } else {
                println!("Valid chain: {}", verify_blocks(&blocks).is_ok());
                for block in &blocks {
                    print_block(block);
                }
            }
            if let Some(path) = export {
                write_json(&path, &blocks)?;
                info!("exported {} blocks to {}", blocks.len(), path.display());
            }
        }
        Command::Mine {
            payload,
            index,
            previous,
            timestamp,
            mining,
        } => {
            let miner = Miner::new(mining.apply(config.mining));
            let timestamp = timestamp.unwrap_or_else(|| SystemClock.now_secs());
            let template =
                BlockTemplate::new(index, Fingerprint::from(previous), timestamp, payload);
            let outcome = run_blocking(move |cancel| miner.mine(&template, &cancel))
                .await?
                .context("mining failed")?;
            println!("Nonce: {}", outcome.nonce);
            println!("Hash: {}", outcome.fingerprint);
            println!("Attempts: {}", outcome.attempts);
            println!("Mining time: {:.2} seconds", outcome.elapsed.as_secs_f64());
        }
        Command::Sweep {
            from,
            to,
            payload,
            mining,
            output,
        } => {
            if from > to {
                bail!("--from {from} is greater than --to {to}");
            }
            let mining = mining.apply(config.mining);
            let template =
                BlockTemplate::new(1, Fingerprint::sentinel(), SystemClock.now_secs(), payload);
            let records = run_blocking(move |cancel| sweep(&template, from..=to, &mining, &cancel))
                .await?
                .context("difficulty sweep failed")?;

            for record in &records {
                println!(
                    "Mining time at difficulty {}: {:.2} seconds (nonce {}, {:.0} hashes/s)",
                    record.difficulty,
                    record.elapsed.as_secs_f64(),
                    record.nonce,
                    record.hash_rate()
                );
            }
            println!();
            println!("Real-world comparison:");
            for difficulty in from..=to {
                if let Some(note) = difficulty_note(difficulty) {
                    println!("Difficulty {difficulty}: {note}");
                }
            }
            if let Some(path) = output {
                write_json(&path, &records)?;
                info!("wrote {} records to {}", records.len(), path.display());
            }
        }
        Command::Verify { file, difficulty } => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let blocks: Vec<Block> = serde_json::from_str(&text)
                .with_context(|| format!("parsing blocks from {}", file.display()))?;
            let policy = difficulty
                .map(|d| SealPolicy::proof_of_work(MiningConfig::with_difficulty(d)))
                .unwrap_or_default();
            match Chain::from_blocks(blocks, SystemClock, policy) {
                Ok(chain) => println!("Valid chain of {} blocks", chain.len()),
                Err(err) => bail!("invalid chain: {err}"),
            }
        }
    }
    Ok(())
}

fn build_demo(
    policy: SealPolicy,
    payloads: Vec<String>,
    cancel: &CancelToken,
) -> hashchain_core::Result<Vec<Block>> {
    let mut chain = Chain::with_policy_cancellable(SystemClock, policy, cancel)?;
    for payload in payloads {
        chain.append_with_cancel(payload, cancel)?;
    }
    Ok(chain.into_blocks())
}

/// Runs `job` on the blocking pool; Ctrl-C cancels it through its token.
async fn run_blocking<T, F>(job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(CancelToken) -> T + Send + 'static,
{
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let mut handle = tokio::task::spawn_blocking(move || job(worker_cancel));
    tokio::select! {
        joined = &mut handle => Ok(joined?),
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupt received, cancelling");
            cancel.cancel();
            Ok(handle.await?)
        }
    }
}

fn print_block(block: &Block) {
    println!("Index: {}", block.index());
    println!("Previous hash: {}", block.previous_fingerprint());
    println!("Hash: {}", block.fingerprint());
    println!("Data: {}", block.payload());
    println!("Timestamp: {}", block.timestamp());
    if let Some(nonce) = block.nonce() {
        println!("Nonce: {nonce}");
    }
    println!("----------");
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}
