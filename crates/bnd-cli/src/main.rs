//! bnd: sign, verify and manage attestation bundles.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Sign in-toto attestations into bundles, verify them and move them around.
#[derive(Parser)]
#[command(name = "bnd", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info", value_name = "LEVEL")]
    log_level: String,

    /// Output logs as JSON (for machine consumption).
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Sign an in-toto statement into a bundle.
    Statement(commands::statement::StatementArgs),
    /// Wrap a predicate in a statement with the given subjects and sign it.
    Predicate(commands::predicate::PredicateArgs),
    /// Verify a bundle's signature, evidence and signer identity.
    Verify(commands::verify::VerifyArgs),
    /// Extract the statement or predicate from a bundle.
    #[command(subcommand)]
    Extract(commands::extract::ExtractCommand),
    /// Print a summary of a bundle or a JSON Lines file of bundles.
    Inspect(commands::inspect::InspectArgs),
    /// Pack bundles into a JSON Lines file.
    Pack(commands::pack::PackArgs),
    /// Split a JSON Lines file into one file per bundle.
    Unpack(commands::pack::UnpackArgs),
    /// Upload bundles to a GitHub repository's attestation store.
    Push(commands::push::PushArgs),
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn run(command: Commands) -> color_eyre::Result<ExitCode> {
    match command {
        Commands::Statement(args) => commands::statement::execute(args).await,
        Commands::Predicate(args) => commands::predicate::execute(args).await,
        Commands::Verify(args) => commands::verify::execute(args).await,
        Commands::Extract(cmd) => commands::extract::execute(cmd),
        Commands::Inspect(args) => commands::inspect::execute(&args),
        Commands::Pack(args) => commands::pack::execute_pack(&args),
        Commands::Unpack(args) => commands::pack::execute_unpack(&args),
        Commands::Push(args) => commands::push::execute(args).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = color_eyre::install() {
        eprintln!("Error: {err}");
        return commands::exit_error();
    }
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs);

    match run(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            commands::exit_error()
        }
    }
}
