//! The `bnd predicate` subcommand.
//!
//! Builds a statement around a predicate file and the subjects given on the
//! command line, then signs it like `bnd statement`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::LazyLock;

use bnd_types::{HashAlgorithm, Statement, Subject};
use clap::Args;
use color_eyre::eyre::{bail, eyre, Result, WrapErr};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use super::{read_input, SignArgs};

static SUBJECT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(sha1|sha256|sha512|sha3|gitCommit):([a-f0-9]+)$").expect("valid regex")
});

const SLSA_PROVENANCE_V1: &str = "https://slsa.dev/provenance/v1";
const SLSA_PROVENANCE_V02: &str = "https://slsa.dev/provenance/v0.2";
const SPDX_DOCUMENT: &str = "https://spdx.dev/Document";
const CYCLONEDX_BOM: &str = "https://cyclonedx.org/bom";

/// Sign a predicate about one or more subjects.
#[derive(Args)]
pub struct PredicateArgs {
    /// Predicate file, `-` for stdin.
    #[arg(value_name = "PREDICATE")]
    pub predicate_arg: Option<PathBuf>,

    /// Predicate file, as an alternative to the positional argument.
    #[arg(short = 'p', long = "predicate", value_name = "PATH")]
    pub predicate: Option<PathBuf>,

    /// Predicate type URI. Detected from the predicate when omitted.
    #[arg(short = 't', long = "type", value_name = "URI")]
    pub predicate_type: Option<String>,

    /// Read the predicate as YAML.
    #[arg(long)]
    pub yaml: bool,

    /// Subject as `algorithm:hex`, or the path of a file to hash.
    #[arg(short = 's', long = "subject", value_name = "SUBJECT")]
    pub subjects: Vec<String>,

    /// Subject digest, hashed with --hash-algo.
    #[arg(long = "hash-value", value_name = "HEX")]
    pub hash_values: Vec<String>,

    /// Algorithm of the --hash-value digests.
    #[arg(long, default_value = "sha256", value_name = "ALGORITHM")]
    pub hash_algo: String,

    /// File to hash with SHA-256 and add as a subject.
    #[arg(short = 'f', long = "subject-file", value_name = "PATH")]
    pub subject_files: Vec<PathBuf>,

    #[command(flatten)]
    pub sign: SignArgs,
}

pub async fn execute(args: PredicateArgs) -> Result<ExitCode> {
    let subjects = collect_subjects(&args)?;
    let path = predicate_path(&args)?;
    let predicate = load_predicate(path, args.yaml)?;

    let predicate_type = match &args.predicate_type {
        Some(t) => t.clone(),
        None => detect_predicate_type(&predicate)
            .ok_or_else(|| eyre!("unable to detect the predicate type, set it with --type"))?
            .to_string(),
    };

    info!(%predicate_type, subjects = subjects.len(), "signing predicate");
    let statement = Statement::new(subjects, predicate_type, predicate);
    let data = statement.to_json().wrap_err("serializing statement")?;
    args.sign.sign_and_write(&data).await
}

fn predicate_path(args: &PredicateArgs) -> Result<&Path> {
    match (&args.predicate_arg, &args.predicate) {
        (Some(_), Some(_)) => bail!("predicate specified twice (-p and argument)"),
        (Some(path), None) | (None, Some(path)) => Ok(path),
        (None, None) => bail!("no predicate file specified"),
    }
}

fn load_predicate(path: &Path, yaml: bool) -> Result<Value> {
    let data = read_input(path)?;
    let value = if yaml {
        serde_yaml::from_slice::<Value>(&data)
            .wrap_err_with(|| format!("parsing YAML predicate {}", path.display()))?
    } else {
        serde_json::from_slice::<Value>(&data)
            .wrap_err_with(|| format!("parsing JSON predicate {}", path.display()))?
    };
    Ok(value)
}

/// Gather subjects from every subject flag.
fn collect_subjects(args: &PredicateArgs) -> Result<Vec<Subject>> {
    let mut subjects = Vec::new();
    for raw in &args.subjects {
        subjects.push(parse_subject(raw)?);
    }

    if !args.hash_values.is_empty() {
        let algorithm: HashAlgorithm = args
            .hash_algo
            .parse()
            .map_err(|_| eyre!("unsupported hash algorithm {:?}", args.hash_algo))?;
        for value in &args.hash_values {
            if value.is_empty() || !value.chars().all(|c| c.is_ascii_hexdigit()) {
                bail!("invalid hash value: {value:?}");
            }
            subjects.push(Subject::new("", algorithm.as_str(), value));
        }
    }

    for path in &args.subject_files {
        subjects.push(subject_from_file(path)?);
    }

    if subjects.is_empty() {
        bail!("no subjects specified");
    }
    Ok(subjects)
}

/// Parse `algorithm:hex`, or hash the file when `raw` names one.
pub fn parse_subject(raw: &str) -> Result<Subject> {
    let path = Path::new(raw);
    if path.is_file() {
        return subject_from_file(path);
    }
    let captures = SUBJECT_PATTERN
        .captures(raw)
        .ok_or_else(|| eyre!("invalid subject: {raw:?}"))?;
    Ok(Subject::new("", &captures[1], &captures[2]))
}

fn subject_from_file(path: &Path) -> Result<Subject> {
    let data = fs::read(path).wrap_err_with(|| format!("hashing subject {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let digest = hex::encode(bnd_crypto::sha256(&data));
    debug!(%name, %digest, "hashed subject file");
    Ok(Subject::new(name, "sha256", &digest))
}

/// Recognize a few well known predicate shapes.
fn detect_predicate_type(predicate: &Value) -> Option<&'static str> {
    let object = predicate.as_object()?;
    if object.contains_key("buildDefinition") && object.contains_key("runDetails") {
        return Some(SLSA_PROVENANCE_V1);
    }
    if object.contains_key("builder") && object.contains_key("buildType") {
        return Some(SLSA_PROVENANCE_V02);
    }
    if object.get("spdxVersion").is_some_and(Value::is_string) {
        return Some(SPDX_DOCUMENT);
    }
    if object.get("bomFormat").and_then(Value::as_str) == Some("CycloneDX") {
        return Some(CYCLONEDX_BOM);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_digest_subject() {
        let subject = parse_subject("sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
            .unwrap();
        assert!(subject.name.is_empty());
        assert!(subject.matches(
            "sha256",
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        ));

        let commit = parse_subject("gitCommit:0123abcd").unwrap();
        assert!(commit.matches("gitCommit", "0123abcd"));
    }

    #[test]
    fn test_parse_invalid_subject() {
        for raw in ["md5:abcd", "sha256:XYZ", "sha256", "no-such-file.bin"] {
            let err = parse_subject(raw).unwrap_err();
            assert!(err.to_string().contains("invalid subject"), "{raw}: {err}");
        }
    }

    #[test]
    fn test_file_subject_is_hashed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        fs::write(&path, "hello world").unwrap();

        let subject = parse_subject(path.to_str().unwrap()).unwrap();
        assert_eq!(subject.name, "hello.txt");
        assert!(subject.matches(
            "sha256",
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        ));
    }

    #[test]
    fn test_detect_predicate_type() {
        assert_eq!(
            detect_predicate_type(&json!({"buildDefinition": {}, "runDetails": {}})),
            Some(SLSA_PROVENANCE_V1)
        );
        assert_eq!(
            detect_predicate_type(&json!({"bomFormat": "CycloneDX", "specVersion": "1.5"})),
            Some(CYCLONEDX_BOM)
        );
        assert_eq!(detect_predicate_type(&json!({"anything": true})), None);
        assert_eq!(detect_predicate_type(&json!([1, 2])), None);
    }

    #[test]
    fn test_yaml_predicate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predicate.yaml");
        fs::write(&path, "builder:\n  id: https://example.com\nbuildType: test\n").unwrap();

        let value = load_predicate(&path, true).unwrap();
        assert_eq!(value["builder"]["id"], "https://example.com");
        assert_eq!(detect_predicate_type(&value), Some(SLSA_PROVENANCE_V02));
    }
}
