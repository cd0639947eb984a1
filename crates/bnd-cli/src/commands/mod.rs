//! CLI subcommands.

pub mod extract;
pub mod inspect;
pub mod pack;
pub mod predicate;
pub mod push;
pub mod statement;
pub mod verify;

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bnd_sign::{Signer, SigningRequest};
use bnd_trust_root::{TrustRootConfig, DEFAULT_TUF_URL};
use clap::Args;
use color_eyre::eyre::{Result, WrapErr};
use tracing::info;

/// Exit status for operational, I/O and configuration errors.
pub fn exit_error() -> ExitCode {
    ExitCode::from(2)
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Read a file, or stdin when the path is `-`.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    if is_stdio(path) {
        let mut data = Vec::new();
        io::stdin()
            .read_to_end(&mut data)
            .wrap_err("reading standard input")?;
        return Ok(data);
    }
    fs::read(path).wrap_err_with(|| format!("reading {}", path.display()))
}

/// Write to a file, or stdout when the path is `-`.
pub fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    if is_stdio(path) {
        let mut stdout = io::stdout().lock();
        stdout.write_all(data)?;
        if !data.ends_with(b"\n") {
            stdout.write_all(b"\n")?;
        }
        stdout.flush()?;
        return Ok(());
    }
    fs::write(path, data).wrap_err_with(|| format!("writing {}", path.display()))
}

/// Where the trusted root comes from.
#[derive(Args, Debug, Clone)]
pub struct TrustArgs {
    /// TUF repository holding the trusted root.
    #[arg(long, value_name = "URL", default_value = DEFAULT_TUF_URL)]
    pub trust_root: String,

    /// Local trusted root file, used instead of the TUF repository.
    #[arg(long, value_name = "PATH")]
    pub trust_root_path: Option<PathBuf>,

    /// Local signing configuration, read together with --trust-root-path.
    #[arg(long, value_name = "PATH", requires = "trust_root_path")]
    pub signing_config: Option<PathBuf>,

    /// Pinned TUF root.json for the repository given with --trust-root.
    #[arg(long, value_name = "PATH")]
    pub tuf_root: Option<PathBuf>,

    /// Trust the repository's initial TUF root when none is pinned or cached.
    #[arg(long)]
    pub tuf_trust_on_first_use: bool,
}

impl TrustArgs {
    pub fn config(&self) -> TrustRootConfig {
        TrustRootConfig {
            url: self.trust_root.clone(),
            path: self.trust_root_path.clone(),
            signing_config_path: self.signing_config.clone(),
            tuf_root_path: self.tuf_root.clone(),
            trust_on_first_use: self.tuf_trust_on_first_use,
            ..TrustRootConfig::default()
        }
    }
}

/// Options shared by the commands that produce a signed bundle.
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Where to write the bundle, `-` for stdout.
    #[arg(short, long, default_value = "-", value_name = "PATH")]
    pub out: PathBuf,

    /// OIDC identity token to sign with instead of acquiring one.
    #[arg(long, env = "BND_IDENTITY_TOKEN", hide_env_values = true, value_name = "JWT")]
    pub identity_token: Option<String>,

    #[command(flatten)]
    pub trust: TrustArgs,

    /// Do not request RFC 3161 timestamps.
    #[arg(long)]
    pub no_timestamp: bool,

    /// Do not publish the envelope to the transparency log.
    #[arg(long)]
    pub no_tlog: bool,

    /// Ignore ambient credentials such as GitHub Actions tokens.
    #[arg(long)]
    pub disable_ambient: bool,

    /// OIDC issuer for interactive login.
    #[arg(long, value_name = "URL")]
    pub oidc_issuer: Option<String>,

    /// OIDC client id for interactive login.
    #[arg(long, value_name = "ID")]
    pub oidc_client_id: Option<String>,
}

impl SignArgs {
    pub fn request(&self) -> SigningRequest {
        let mut request = SigningRequest {
            trust_root: self.trust.config(),
            timestamp: !self.no_timestamp,
            append_to_log: !self.no_tlog,
            disable_ambient: self.disable_ambient,
            identity_token: self.identity_token.clone(),
            ..SigningRequest::default()
        };
        if let Some(issuer) = &self.oidc_issuer {
            request.oidc.issuer.clone_from(issuer);
        }
        if let Some(client_id) = &self.oidc_client_id {
            request.oidc.client_id.clone_from(client_id);
        }
        request
    }

    /// Sign a serialized statement and write the bundle to `--out`.
    pub async fn sign_and_write(&self, statement: &[u8]) -> Result<ExitCode> {
        let signer = Signer::new(self.request()).wrap_err("invalid signing options")?;
        let bundle = signer
            .sign_to_json(statement)
            .await
            .wrap_err("signing statement")?;
        write_output(&self.out, &bundle)?;
        if !is_stdio(&self.out) {
            info!(out = %self.out.display(), "wrote bundle");
        }
        Ok(ExitCode::SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_flags_map_onto_request() {
        let args = SignArgs {
            out: PathBuf::from("-"),
            identity_token: Some("token".to_string()),
            trust: TrustArgs {
                trust_root: "https://tuf.example.com".to_string(),
                trust_root_path: None,
                signing_config: None,
                tuf_root: Some(PathBuf::from("root.json")),
                tuf_trust_on_first_use: false,
            },
            no_timestamp: true,
            no_tlog: false,
            disable_ambient: true,
            oidc_issuer: Some("https://issuer.example.com".to_string()),
            oidc_client_id: None,
        };
        let request = args.request();
        assert!(!request.timestamp);
        assert!(request.append_to_log);
        assert!(request.disable_ambient);
        assert_eq!(request.identity_token.as_deref(), Some("token"));
        assert_eq!(request.trust_root.url, "https://tuf.example.com");
        assert_eq!(request.trust_root.tuf_root_path, Some(PathBuf::from("root.json")));
        assert!(!request.trust_root.trust_on_first_use);
        assert_eq!(request.oidc.issuer, "https://issuer.example.com");
        assert_eq!(request.oidc.client_id, SigningRequest::default().oidc.client_id);
    }
}
