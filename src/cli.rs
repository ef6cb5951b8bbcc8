//! cli - `postinit` command line.
//!
//! Команды:
//! - init      - write (or resume) the label files of a data directory
//! - status    - derived status, label counts and metrics (`--json` for one JSON object)
//! - reset     - delete label files and metadata
//! - providers - list compute providers

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use crate::cancel::CancelToken;
use crate::config::{InitOpts, PostConfig};
use crate::init::Initializer;
use crate::metrics;
use crate::oracle::ProviderRegistry;
use crate::persistence::DiskState;

#[derive(Parser, Debug)]
#[command(
    name = "postinit",
    version,
    about = "Resumable initialization of proof-of-space-time label data",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

/// Shared by every command that builds an Initializer.
/// Label parameters default to POST_* env vars, then to built-in defaults.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long)]
    pub path: PathBuf,
    /// 32-byte commitment as 64 hex chars
    #[arg(long)]
    pub commitment: String,
    #[arg(long, default_value_t = 1)]
    pub num_units: u32,
    #[arg(long, default_value_t = 1)]
    pub num_files: u32,
    /// Compute provider id (default: CPU)
    #[arg(long)]
    pub provider: Option<u32>,
    #[arg(long)]
    pub bits_per_label: Option<u32>,
    #[arg(long)]
    pub labels_per_unit: Option<u64>,
    #[arg(long)]
    pub batch_size: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Write or resume label files
    Init {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Print status of a data directory
    Status {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Delete label files and metadata
    Reset {
        #[command(flatten)]
        run: RunArgs,
    },
    /// List compute providers
    Providers {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

impl RunArgs {
    fn config(&self) -> PostConfig {
        let mut cfg = PostConfig::from_env();
        if let Some(b) = self.bits_per_label {
            cfg = cfg.with_bits_per_label(b);
        }
        if let Some(n) = self.labels_per_unit {
            cfg = cfg.with_labels_per_unit(n);
        }
        if let Some(n) = self.batch_size {
            cfg = cfg.with_compute_batch_size(n);
        }
        cfg
    }

    fn initializer(&self) -> Result<Initializer> {
        let commitment = decode_commitment(&self.commitment)?;
        let opts = InitOpts::builder(&self.path)
            .num_units(self.num_units)
            .num_files(self.num_files)
            .provider_id(self.provider)
            .build();
        Initializer::new(&commitment, self.config(), opts).context("build initializer")
    }
}

/// Hex with an optional `0x` prefix.
fn decode_commitment(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(s).map_err(|e| anyhow!("bad --commitment: {}", e))
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Init { run } => cmd_init(&run),
        Cmd::Status { run, json } => cmd_status(&run, json),
        Cmd::Reset { run } => cmd_reset(&run),
        Cmd::Providers { json } => cmd_providers(json),
    }
}

fn cmd_init(run: &RunArgs) -> Result<()> {
    let init = run.initializer()?;
    info!("{} / {}", init.config(), init.opts());
    init.initialize(&CancelToken::new())
        .with_context(|| format!("initialize {}", run.path.display()))?;

    println!(
        "Initialized {} label(s) in {} file(s) at {}",
        init.num_labels(),
        init.opts().num_files,
        run.path.display()
    );
    if let Some(nonce) = init.session_nonce() {
        println!("  pow nonce      = {}", nonce);
    }
    Ok(())
}

fn cmd_status(run: &RunArgs, json: bool) -> Result<()> {
    let init = run.initializer()?;
    let status = init.status();
    let counts = DiskState::new(&run.path, init.config().bits_per_label, init.opts().num_files)
        .num_labels_written()
        .ok();
    let ms = metrics::snapshot();

    if json {
        let v = serde_json::json!({
            "status": status,
            "data_dir": run.path.display().to_string(),
            "target_labels": init.num_labels(),
            "labels_on_disk": counts.as_ref().map(|c| c.total),
            "labels_per_file": counts.as_ref().map(|c| c.per_file.clone()),
            "provider": {
                "id": init.provider().id,
                "model": init.provider().model,
                "kind": init.provider().kind.to_string(),
            },
            "metrics": {
                "batches_computed": ms.batches_computed,
                "labels_written": ms.labels_written,
                "bytes_written": ms.bytes_written,
                "writer_flushes": ms.writer_flushes,
                "files_completed": ms.files_completed,
                "files_truncated": ms.files_truncated,
                "cancellations": ms.cancellations,
                "nonces_found": ms.nonces_found,
                "avg_batch_labels": ms.avg_batch_labels(),
            },
        });
        println!("{}", v);
        return Ok(());
    }

    println!("Data dir {}", run.path.display());
    println!("  status         = {}", status);
    println!("  target_labels  = {}", init.num_labels());
    match counts {
        Some(c) => {
            println!("  labels_on_disk = {}", c.total);
            for (i, n) in c.per_file.iter().enumerate() {
                println!("    file #{:<6} = {}", i, n);
            }
        }
        None => println!("  labels_on_disk = (unreadable)"),
    }
    let p = init.provider();
    println!("  provider       = {} ({}, {})", p.id, p.model, p.kind);
    Ok(())
}

fn cmd_reset(run: &RunArgs) -> Result<()> {
    let init = run.initializer()?;
    init.reset()
        .with_context(|| format!("reset {}", run.path.display()))?;
    println!("Reset {}", run.path.display());
    Ok(())
}

fn cmd_providers(json: bool) -> Result<()> {
    let registry = ProviderRegistry::default();
    let list = registry.providers();
    if json {
        let arr: Vec<_> = list
            .iter()
            .map(|p| serde_json::json!({"id": p.id, "model": p.model, "kind": p.kind.to_string()}))
            .collect();
        println!("{}", serde_json::Value::Array(arr));
        return Ok(());
    }
    for p in &list {
        let cpu = if Some(p.id) == registry.cpu_provider_id() { " (cpu default)" } else { "" };
        println!("{:>4}  {:<4} {}{}", p.id, p.kind, p.model, cpu);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_init_args() {
        let c = "ab".repeat(32);
        let cli = Cli::try_parse_from([
            "postinit",
            "init",
            "--path",
            "/tmp/p",
            "--commitment",
            c.as_str(),
            "--num-units",
            "4",
            "--num-files",
            "2",
            "--bits-per-label",
            "16",
        ])
        .unwrap();
        match cli.cmd {
            Cmd::Init { run } => {
                assert_eq!(run.num_units, 4);
                assert_eq!(run.num_files, 2);
                assert_eq!(run.config().bits_per_label, 16);
                let init = run.initializer().unwrap();
                assert_eq!(init.commitment(), &[0xab; 32]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_commitment_is_reported() {
        let cli = Cli::try_parse_from([
            "postinit", "reset", "--path", "/tmp/p", "--commitment", "abcd",
        ])
        .unwrap();
        match cli.cmd {
            Cmd::Reset { run } => assert!(run.initializer().is_err()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn commitment_hex_is_strict() {
        assert_eq!(decode_commitment(&format!("0x{}", "AB".repeat(32))).unwrap(), vec![0xab; 32]);
        assert!(decode_commitment(&"+f".repeat(32)).is_err());
        assert!(decode_commitment(&"-1".repeat(32)).is_err());
        assert!(decode_commitment("abc").is_err());
        assert!(decode_commitment("zz").is_err());
    }
}
