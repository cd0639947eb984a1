//! The `bnd statement` subcommand.

use std::path::PathBuf;
use std::process::ExitCode;

use bnd_types::Statement;
use clap::Args;
use color_eyre::eyre::{Result, WrapErr};
use tracing::info;

use super::{read_input, SignArgs};

/// Sign an in-toto statement into a bundle.
#[derive(Args)]
pub struct StatementArgs {
    /// Statement file, `-` for stdin.
    #[arg(value_name = "FILE")]
    pub statement: PathBuf,

    #[command(flatten)]
    pub sign: SignArgs,
}

pub async fn execute(args: StatementArgs) -> Result<ExitCode> {
    let data = read_input(&args.statement)?;
    let statement = Statement::parse_checked(&data)
        .wrap_err_with(|| format!("reading statement from {}", args.statement.display()))?;

    info!(
        predicate_type = %statement.predicate_type,
        subjects = statement.subject.len(),
        "signing statement"
    );
    args.sign.sign_and_write(&data).await
}
