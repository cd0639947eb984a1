//! The `bnd verify` subcommand.

use std::path::PathBuf;
use std::process::ExitCode;

use bnd_verify::{VerificationOptions, VerificationPolicy, VerificationResult, Verifier};
use clap::{ArgAction, Args};
use color_eyre::eyre::{bail, Result, WrapErr};

use super::TrustArgs;

/// Verify a bundle.
#[derive(Args)]
pub struct VerifyArgs {
    /// Bundle to verify, `-` for stdin.
    #[arg(value_name = "BUNDLE")]
    pub bundle: Option<PathBuf>,

    /// Bundle to verify, as an alternative to the positional argument.
    #[arg(short = 'b', long = "bundle", value_name = "PATH", conflicts_with = "bundle")]
    pub bundle_path: Option<PathBuf>,

    /// Require a verified SCT in the signing certificate.
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub ctlog: bool,

    /// Require a verified transparency log entry.
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub tlog: bool,

    /// Require a verified timestamp, from a TSA or the log.
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub timestamps: bool,

    #[command(flatten)]
    pub trust: TrustArgs,

    /// Expected OIDC issuer of the signer.
    #[arg(long, value_name = "URL")]
    pub issuer: Option<String>,

    /// Pattern the OIDC issuer must match in full.
    #[arg(long, value_name = "REGEX")]
    pub issuer_regex: Option<String>,

    /// Expected subject alternative name of the signer.
    #[arg(long, value_name = "IDENTITY")]
    pub san: Option<String>,

    /// Pattern the subject alternative name must match in full.
    #[arg(long, value_name = "REGEX")]
    pub san_regex: Option<String>,

    /// Accept any signer identity. Unsafe.
    #[arg(long)]
    pub skip_identity: bool,

    /// Hex digest one of the statement subjects must carry.
    #[arg(long, value_name = "HEX")]
    pub digest: Option<String>,

    /// Algorithm of --digest.
    #[arg(long, default_value = "sha256", value_name = "ALGORITHM")]
    pub digest_algo: String,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,
}

impl VerifyArgs {
    fn options(&self) -> VerificationOptions {
        VerificationOptions {
            artifact_digest: self.digest.clone().unwrap_or_default(),
            artifact_digest_algo: self.digest_algo.clone(),
            expected_issuer: self.issuer.clone().unwrap_or_default(),
            expected_issuer_regex: self.issuer_regex.clone().unwrap_or_default(),
            expected_san: self.san.clone().unwrap_or_default(),
            expected_san_regex: self.san_regex.clone().unwrap_or_default(),
            skip_identity_check: self.skip_identity,
            require_ctlog: self.ctlog,
            require_tlog: self.tlog,
            require_timestamp: self.timestamps,
            trust_root: self.trust.config(),
        }
    }
}

pub async fn execute(args: VerifyArgs) -> Result<ExitCode> {
    let Some(path) = args.bundle.clone().or_else(|| args.bundle_path.clone()) else {
        bail!("no bundle specified");
    };

    let options = args.options();
    let policy =
        VerificationPolicy::try_from(&options).wrap_err("invalid verification options")?;
    let verifier = Verifier::from_config(options.trust_root);
    let result = verifier
        .verify_path(&path, &policy)
        .await
        .wrap_err_with(|| format!("verifying {}", path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(&path.display().to_string(), &result);
    }

    Ok(if result.is_accepted() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn print_report(name: &str, result: &VerificationResult) {
    let status = if result.is_accepted() { "PASS" } else { "FAIL" };
    println!("[{status}] {name}");
    for evidence in &result.evidence {
        println!("  [ok] {evidence}");
    }
    if let Some(reason) = &result.failure {
        println!("  [failed] {reason}");
    }
    if let Some(identity) = &result.identity {
        println!("  signer: {} (issuer {})", identity.san, identity.issuer);
    }
    if result.identity_skipped {
        println!("  warning: signer identity was not checked");
    }
    if result.artifact_skipped {
        println!("  warning: artifact digest was not checked");
    }
}
