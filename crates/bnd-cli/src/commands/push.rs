//! The `bnd push` subcommand.
//!
//! Uploads bundles to the attestations API of a GitHub repository.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Args;
use color_eyre::eyre::{bail, eyre, Result, WrapErr};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::read_input;

const GITHUB_API_URL: &str = "https://api.github.com";
const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Push bundles to a repository's attestation store.
#[derive(Args)]
pub struct PushArgs {
    /// Target repository as `org/repo`.
    #[arg(value_name = "ORG/REPO")]
    pub repository: String,

    /// Bundle files to upload.
    #[arg(value_name = "BUNDLE")]
    pub bundles: Vec<PathBuf>,

    /// Additional bundle file.
    #[arg(short = 'b', long = "bundle", value_name = "PATH")]
    pub bundle_flags: Vec<PathBuf>,

    /// Token with write access to the repository's attestations.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    pub github_token: Option<String>,

    /// GitHub API base URL.
    #[arg(long, default_value = GITHUB_API_URL, value_name = "URL", hide = true)]
    pub api_url: String,
}

/// Split `org/repo` into its two non-empty halves.
pub fn parse_repository(raw: &str) -> Result<(&str, &str)> {
    let (org, repo) = raw
        .split_once('/')
        .ok_or_else(|| eyre!("repository must be given as org/repo, got {raw:?}"))?;
    if org.is_empty() {
        bail!("repository organization not set");
    }
    if repo.is_empty() || repo.contains('/') {
        bail!("repository name not set");
    }
    Ok((org, repo))
}

pub async fn execute(args: PushArgs) -> Result<ExitCode> {
    let (org, repo) = parse_repository(&args.repository)?;
    let bundles: Vec<&PathBuf> = args.bundle_flags.iter().chain(&args.bundles).collect();
    if bundles.is_empty() {
        bail!("no bundles specified");
    }
    let Some(token) = args.github_token.as_deref().filter(|t| !t.is_empty()) else {
        bail!("GITHUB_TOKEN env var not set");
    };

    // read everything up front so a bad file uploads nothing
    let mut bodies = Vec::with_capacity(bundles.len());
    for path in &bundles {
        let data = read_input(path)?;
        bnd_bundle::decode(&data).wrap_err_with(|| format!("reading bundle {}", path.display()))?;
        let raw: Value = serde_json::from_slice(&data)?;
        bodies.push(json!({ "bundle": raw }));
    }

    let url = format!(
        "{}/repos/{org}/{repo}/attestations",
        args.api_url.trim_end_matches('/')
    );
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    for (path, body) in bundles.iter().zip(&bodies) {
        debug!(%url, bundle = %path.display(), "uploading attestation");
        let response = client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(USER_AGENT, bnd_types::USER_AGENT)
            .json(body)
            .send()
            .await
            .wrap_err_with(|| format!("posting {}", path.display()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("pushing {} failed with HTTP {status}: {text}", path.display());
        }
        info!(bundle = %path.display(), repository = %args.repository, "pushed attestation");
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repository() {
        assert_eq!(parse_repository("octo/hello").unwrap(), ("octo", "hello"));
        assert!(parse_repository("octo")
            .unwrap_err()
            .to_string()
            .contains("org/repo"));
        assert!(parse_repository("/hello")
            .unwrap_err()
            .to_string()
            .contains("organization"));
        assert!(parse_repository("octo/")
            .unwrap_err()
            .to_string()
            .contains("name"));
        assert!(parse_repository("octo/hello/extra").is_err());
    }
}
