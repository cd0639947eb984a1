//! The `bnd pack` and `bnd unpack` subcommands.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use bnd_bundle::flatten_json;
use clap::Args;
use color_eyre::eyre::{bail, Result, WrapErr};
use tracing::info;

/// Pack bundles into a JSON Lines file.
#[derive(Args)]
pub struct PackArgs {
    /// Bundle files to pack.
    #[arg(value_name = "BUNDLE")]
    pub bundles: Vec<PathBuf>,

    /// Additional bundle file.
    #[arg(short = 'b', long = "bundle", value_name = "PATH")]
    pub bundle_flags: Vec<PathBuf>,

    /// Output file. Must not exist. Defaults to stdout.
    #[arg(short, long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

/// Split a JSON Lines file into one file per bundle.
#[derive(Args)]
pub struct UnpackArgs {
    /// JSON Lines file to unpack.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Prefix of the written files. Defaults to the file stem and `-`.
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Existing directory to write to.
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    pub out: PathBuf,
}

pub fn execute_pack(args: &PackArgs) -> Result<ExitCode> {
    let bundles: Vec<PathBuf> = args
        .bundle_flags
        .iter()
        .chain(&args.bundles)
        .cloned()
        .collect();

    match &args.out {
        Some(out) if out.as_os_str() != "-" => {
            bnd_bundle::pack(&bundles, out)?;
            info!(count = bundles.len(), out = %out.display(), "packed bundles");
        }
        _ => {
            if bundles.is_empty() {
                bail!("no bundles specified");
            }
            let mut stdout = io::stdout().lock();
            for path in &bundles {
                let data = fs::read_to_string(path)
                    .wrap_err_with(|| format!("reading {}", path.display()))?;
                let line = flatten_json(&data);
                serde_json::from_str::<serde_json::Value>(&line)
                    .wrap_err_with(|| format!("{} is not valid JSON", path.display()))?;
                writeln!(stdout, "{line}")?;
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub fn execute_unpack(args: &UnpackArgs) -> Result<ExitCode> {
    if !args.file.is_file() {
        bail!("specified jsonl file not found: {}", args.file.display());
    }
    let written = bnd_bundle::unpack(&args.file, args.prefix.as_deref(), Some(&args.out))?;
    for path in &written {
        println!("{}", path.display());
    }
    info!(count = written.len(), "unpacked bundles");
    Ok(ExitCode::SUCCESS)
}
