//! The `bnd extract` subcommands.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bnd_bundle::{extract_predicate, extract_predicate_json, extract_statement_json};
use bnd_types::Statement;
use clap::{Args, Subcommand};
use color_eyre::eyre::{bail, Result, WrapErr};

use super::{read_input, write_output};

#[derive(Subcommand)]
pub enum ExtractCommand {
    /// Write the statement signed in a bundle.
    Statement(ExtractArgs),
    /// Write the predicate of the statement signed in a bundle.
    Predicate(ExtractPredicateArgs),
}

#[derive(Args)]
pub struct ExtractArgs {
    /// Bundle to read, `-` for stdin.
    #[arg(value_name = "BUNDLE", default_value = "-")]
    pub bundle: PathBuf,

    /// The input is a bare statement, not a bundle.
    #[arg(long)]
    pub from_statement: bool,

    /// Where to write the output, `-` for stdout.
    #[arg(short, long, default_value = "-", value_name = "PATH")]
    pub out: PathBuf,
}

#[derive(Args)]
pub struct ExtractPredicateArgs {
    #[command(flatten)]
    pub input: ExtractArgs,

    /// Fail unless the predicate has this type.
    #[arg(short = 't', long = "type", value_name = "URI")]
    pub predicate_type: Option<String>,
}

pub fn execute(command: ExtractCommand) -> Result<ExitCode> {
    match command {
        ExtractCommand::Statement(args) => {
            let statement = read_statement_json(&args.bundle, args.from_statement)?;
            write_output(&args.out, &statement)?;
        }
        ExtractCommand::Predicate(args) => {
            let data = read_statement_json(&args.input.bundle, args.input.from_statement)?;
            let statement = Statement::from_slice(&data).wrap_err("parsing statement")?;

            let (predicate_type, _) = extract_predicate(&statement);
            if let Some(expected) = &args.predicate_type {
                if predicate_type != expected.as_str() {
                    bail!("predicate type is {predicate_type:?}, not {expected:?}");
                }
            }
            let predicate = extract_predicate_json(&statement)?;
            write_output(&args.input.out, &predicate)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// The statement bytes of a bundle, or the input itself with `from_statement`.
fn read_statement_json(path: &Path, from_statement: bool) -> Result<Vec<u8>> {
    let data = read_input(path)?;
    if from_statement {
        Statement::from_slice(&data)
            .wrap_err_with(|| format!("{} is not an in-toto statement", path.display()))?;
        return Ok(data);
    }
    let bundle = bnd_bundle::decode(&data)
        .wrap_err_with(|| format!("decoding bundle {}", path.display()))?;
    Ok(extract_statement_json(&bundle)?.to_vec())
}
