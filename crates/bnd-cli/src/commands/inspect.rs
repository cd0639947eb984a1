//! The `bnd inspect` subcommand.
//!
//! Prints what a bundle claims without verifying any of it.

use std::fmt::Write as _;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bnd_bundle::{extract_statement, iterate_jsonl, Bundle};
use bnd_crypto::parse_certificate_info;
use clap::Args;
use color_eyre::eyre::{Result, WrapErr};

use super::read_input;

/// Arguments for `bnd inspect`.
#[derive(Args)]
pub struct InspectArgs {
    /// Bundle, or a `.jsonl` file of bundles. `-` reads a bundle from stdin.
    #[arg(value_name = "PATH", default_value = "-")]
    pub path: PathBuf,
}

/// What a bundle says about itself.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BundleSummary {
    pub media_type: String,
    pub signer_san: Option<String>,
    pub signer_issuer: Option<String>,
    pub predicate_type: Option<String>,
    /// Subject names with their digests as `algorithm:hex`
    pub subjects: Vec<(String, Vec<String>)>,
}

pub fn summarize(bundle: &Bundle) -> BundleSummary {
    let mut summary = BundleSummary {
        media_type: bundle.media_type.clone(),
        ..BundleSummary::default()
    };

    if let Some(info) = bundle
        .signing_certificate()
        .and_then(|cert| parse_certificate_info(cert.as_bytes()).ok())
    {
        summary.signer_san = info.san;
        summary.signer_issuer = info.oidc_issuer;
    }

    if let Ok(statement) = extract_statement(bundle) {
        if !statement.predicate_type.is_empty() {
            summary.predicate_type = Some(statement.predicate_type.clone());
        }
        summary.subjects = statement
            .subject
            .iter()
            .map(|s| {
                let digests = s.digest.iter().map(|(alg, hex)| format!("{alg}:{hex}")).collect();
                (s.name.clone(), digests)
            })
            .collect();
    }
    summary
}

pub fn format_summary(summary: &BundleSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Bundle Details:");
    let _ = writeln!(out, "  Envelope Media Type: {}", summary.media_type);

    match (&summary.signer_san, &summary.signer_issuer) {
        (Some(san), Some(issuer)) => {
            let _ = writeln!(out, "  Signer identity: {san} (issuer {issuer})");
        }
        (Some(san), None) => {
            let _ = writeln!(out, "  Signer identity: {san}");
        }
        _ => {
            let _ = writeln!(out, "  Signer identity: [unknown]");
        }
    }

    let predicate_type = summary.predicate_type.as_deref().unwrap_or("[not defined]");
    let _ = writeln!(out, "  Predicate Type: {predicate_type}");

    let _ = writeln!(out, "  Attestation Subjects:");
    if summary.subjects.is_empty() {
        let _ = writeln!(out, "    [none]");
    }
    for (name, digests) in &summary.subjects {
        let name = if name.is_empty() { "[unnamed]" } else { name };
        let _ = writeln!(out, "    - {name}");
        for digest in digests {
            let _ = writeln!(out, "      {digest}");
        }
    }
    out
}

pub fn execute(args: &InspectArgs) -> Result<ExitCode> {
    if args.path.extension().is_some_and(|ext| ext == "jsonl") {
        return inspect_jsonl(&args.path);
    }

    let data = read_input(&args.path)?;
    let bundle = bnd_bundle::decode(&data)
        .wrap_err_with(|| format!("reading bundle {}", args.path.display()))?;
    print!("{}", format_summary(&summarize(&bundle)));
    Ok(ExitCode::SUCCESS)
}

fn inspect_jsonl(path: &Path) -> Result<ExitCode> {
    let file = File::open(path).wrap_err_with(|| format!("opening {}", path.display()))?;
    for (i, line) in iterate_jsonl(file).enumerate() {
        let line = line?;
        println!("Attestation #{i}");
        match bnd_bundle::decode(line.as_bytes()) {
            Ok(bundle) => print!("{}", format_summary(&summarize(&bundle))),
            Err(e) => println!("  Unable to parse line #{i}: {e}"),
        }
        println!();
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_summary() {
        let summary = BundleSummary {
            media_type: "application/vnd.dev.sigstore.bundle.v0.3+json".to_string(),
            signer_san: Some("alice@example.com".to_string()),
            signer_issuer: Some("https://issuer.example.com".to_string()),
            predicate_type: None,
            subjects: vec![("hello.txt".to_string(), vec!["sha256:abcd".to_string()])],
        };
        let text = format_summary(&summary);
        assert!(text.contains("Envelope Media Type: application/vnd.dev.sigstore.bundle.v0.3+json"));
        assert!(text.contains("alice@example.com (issuer https://issuer.example.com)"));
        assert!(text.contains("Predicate Type: [not defined]"));
        assert!(text.contains("- hello.txt"));
        assert!(text.contains("sha256:abcd"));
    }

    #[test]
    fn test_summary_without_signer() {
        let text = format_summary(&BundleSummary::default());
        assert!(text.contains("Signer identity: [unknown]"));
        assert!(text.contains("[none]"));
    }
}
