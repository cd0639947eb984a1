//! Integration tests for the bnd CLI.
//!
//! Bundles are signed in-process with a throwaway CA and written to a
//! temporary directory; nothing here talks to the network.

#![allow(deprecated)] // cargo_bin deprecation, macro replacement not yet stable

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use bnd_bundle::BundleV03;
use bnd_crypto::testing::TestCa;
use bnd_crypto::KeyPair;
use bnd_trust_root::{CertificateAuthority, TrustedRoot};
use bnd_types::DsseEnvelope;
use predicates::prelude::*;

const DIGEST: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
const ISSUER: &str = "https://issuer.example.com";
const PREDICATE_TYPE: &str = "https://slsa.dev/provenance/v1";

fn bnd() -> Command {
    let mut cmd = Command::cargo_bin("bnd").expect("bnd binary not found");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn statement() -> String {
    serde_json::json!({
        "_type": "https://in-toto.io/Statement/v1",
        "subject": [{"name": "hello.txt", "digest": {"sha256": DIGEST}}],
        "predicateType": PREDICATE_TYPE,
        "predicate": {"buildDefinition": {"buildType": "https://example.com/build"}},
    })
    .to_string()
}

/// Sign the test statement as `san` and write the bundle to `dir/name`.
fn write_bundle(dir: &Path, name: &str, ca: &TestCa, san: &str) -> PathBuf {
    let key = KeyPair::generate_ecdsa_p256().unwrap();
    let leaf = ca
        .issue_leaf(key.public_key_der().unwrap().as_bytes(), san, ISSUER)
        .unwrap();
    let envelope = DsseEnvelope::for_statement(statement().as_bytes());
    let signature = key.sign(&envelope.pae()).unwrap();
    let bundle =
        BundleV03::with_certificate_and_dsse(leaf, envelope.with_signature(signature)).into_bundle();

    let path = dir.join(name);
    std::fs::write(&path, bnd_bundle::encode_pretty(&bundle).unwrap()).unwrap();
    path
}

fn write_trusted_root(dir: &Path, ca: &TestCa) -> PathBuf {
    let root = TrustedRoot {
        certificate_authorities: vec![CertificateAuthority::new(vec![ca.root_der().clone()])],
        ..Default::default()
    };
    let path = dir.join("trusted_root.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&root).unwrap()).unwrap();
    path
}

#[test]
fn test_help_lists_subcommands() {
    bnd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("statement"))
        .stdout(predicate::str::contains("predicate"))
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("unpack"))
        .stdout(predicate::str::contains("push"));
}

#[test]
fn test_verify_accepts_signed_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let ca = TestCa::new("Test CA").unwrap();
    let bundle = write_bundle(dir.path(), "bundle.json", &ca, "alice@example.com");
    let root = write_trusted_root(dir.path(), &ca);

    bnd()
        .args(["verify", "--ctlog=false", "--tlog=false", "--timestamps=false"])
        .args(["--issuer", ISSUER, "--san", "alice@example.com"])
        .args(["--digest", DIGEST])
        .arg("--trust-root-path")
        .arg(&root)
        .arg(&bundle)
        .assert()
        .success()
        .stdout(predicate::str::contains("[PASS]"))
        .stdout(predicate::str::contains("[ok] certificate chain"))
        .stdout(predicate::str::contains("[ok] artifact digest"))
        .stdout(predicate::str::contains("signer: alice@example.com"));
}

#[test]
fn test_verify_rejection_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let ca = TestCa::new("Test CA").unwrap();
    let bundle = write_bundle(dir.path(), "bundle.json", &ca, "bob@example.com");
    let root = write_trusted_root(dir.path(), &ca);

    bnd()
        .args(["verify", "--ctlog=false", "--tlog=false", "--timestamps=false"])
        .args(["--san", "alice@example.com"])
        .arg("--trust-root-path")
        .arg(&root)
        .arg("--bundle")
        .arg(&bundle)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[FAIL]"))
        .stdout(predicate::str::contains("identity mismatch"));
}

#[test]
fn test_verify_requires_evidence_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let ca = TestCa::new("Test CA").unwrap();
    let bundle = write_bundle(dir.path(), "bundle.json", &ca, "alice@example.com");
    let root = write_trusted_root(dir.path(), &ca);

    bnd()
        .args(["verify", "--skip-identity", "--trust-root-path"])
        .arg(&root)
        .arg(&bundle)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("evidence is missing"));
}

#[test]
fn test_verify_missing_file_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    bnd()
        .args(["verify", "--skip-identity"])
        .arg(dir.path().join("missing.json"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("missing.json"));
}

#[test]
fn test_verify_contradictory_identity_flags_exit_two() {
    let dir = tempfile::tempdir().unwrap();
    let ca = TestCa::new("Test CA").unwrap();
    let bundle = write_bundle(dir.path(), "bundle.json", &ca, "alice@example.com");

    bnd()
        .args(["verify", "--san", "alice@example.com", "--san-regex", ".*"])
        .arg(&bundle)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid verification options"));
}

#[test]
fn test_extract_statement_and_predicate() {
    let dir = tempfile::tempdir().unwrap();
    let ca = TestCa::new("Test CA").unwrap();
    let bundle = write_bundle(dir.path(), "bundle.json", &ca, "alice@example.com");

    bnd()
        .args(["extract", "statement"])
        .arg(&bundle)
        .assert()
        .success()
        .stdout(predicate::str::contains("https://in-toto.io/Statement/v1"))
        .stdout(predicate::str::contains(DIGEST));

    let out = dir.path().join("predicate.json");
    bnd()
        .args(["extract", "predicate", "--type", PREDICATE_TYPE, "-o"])
        .arg(&out)
        .arg(&bundle)
        .assert()
        .success();
    let predicate: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
    assert_eq!(
        predicate["buildDefinition"]["buildType"],
        "https://example.com/build"
    );

    bnd()
        .args(["extract", "predicate", "--type", "https://example.com/other"])
        .arg(&bundle)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("predicate type"));
}

#[test]
fn test_extract_predicate_from_statement() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("statement.json");
    std::fs::write(&path, statement()).unwrap();

    bnd()
        .args(["extract", "predicate", "--from-statement"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("buildDefinition"));
}

#[test]
fn test_extract_rejects_non_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("statement.json");
    std::fs::write(&path, statement()).unwrap();

    bnd()
        .args(["extract", "statement"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not a known envelope format"));
}

#[test]
fn test_inspect_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let ca = TestCa::new("Test CA").unwrap();
    let bundle = write_bundle(dir.path(), "bundle.json", &ca, "alice@example.com");

    bnd()
        .arg("inspect")
        .arg(&bundle)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "application/vnd.dev.sigstore.bundle.v0.3+json",
        ))
        .stdout(predicate::str::contains("alice@example.com"))
        .stdout(predicate::str::contains(ISSUER))
        .stdout(predicate::str::contains(PREDICATE_TYPE))
        .stdout(predicate::str::contains("hello.txt"));
}

#[test]
fn test_pack_inspect_unpack() {
    let dir = tempfile::tempdir().unwrap();
    let ca = TestCa::new("Test CA").unwrap();
    let first = write_bundle(dir.path(), "first.json", &ca, "alice@example.com");
    let second = write_bundle(dir.path(), "second.json", &ca, "bob@example.com");
    let packed = dir.path().join("attestations.jsonl");

    bnd()
        .args(["pack", "-o"])
        .arg(&packed)
        .arg(&first)
        .arg(&second)
        .assert()
        .success();
    let content = std::fs::read_to_string(&packed).unwrap();
    assert_eq!(content.lines().count(), 2);

    // never overwrites
    bnd()
        .args(["pack", "-o"])
        .arg(&packed)
        .arg(&first)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));

    bnd()
        .arg("inspect")
        .arg(&packed)
        .assert()
        .success()
        .stdout(predicate::str::contains("Attestation #0"))
        .stdout(predicate::str::contains("Attestation #1"))
        .stdout(predicate::str::contains("bob@example.com"));

    let out = dir.path().join("unpacked");
    std::fs::create_dir(&out).unwrap();
    bnd()
        .arg("unpack")
        .arg(&packed)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();
    assert!(out.join("attestations-00.json").is_file());
    assert!(out.join("attestations-01.json").is_file());

    bnd()
        .args(["unpack", "--prefix", "att"])
        .arg(&packed)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();
    assert!(out.join("att00.json").is_file());
}

#[test]
fn test_pack_without_bundles() {
    bnd()
        .arg("pack")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no bundles specified"));
}

#[test]
fn test_predicate_requires_subjects() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("predicate.json");
    std::fs::write(&path, r#"{"buildDefinition": {}, "runDetails": {}}"#).unwrap();

    bnd()
        .arg("predicate")
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no subjects specified"));
}

#[test]
fn test_predicate_requires_predicate_file() {
    bnd()
        .args(["predicate", "--subject", &format!("sha256:{DIGEST}")])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no predicate file specified"));
}

#[test]
fn test_predicate_rejects_invalid_subject() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("predicate.json");
    std::fs::write(&path, "{}").unwrap();

    bnd()
        .args(["predicate", "-t", PREDICATE_TYPE, "-s", "md5:abcd"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid subject"));
}

#[test]
fn test_statement_rejects_non_statement() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("statement.json");
    std::fs::write(&path, r#"{"hello": "world"}"#).unwrap();

    bnd()
        .arg("statement")
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("statement"));
}

#[test]
fn test_push_requires_token() {
    let dir = tempfile::tempdir().unwrap();
    let ca = TestCa::new("Test CA").unwrap();
    let bundle = write_bundle(dir.path(), "bundle.json", &ca, "alice@example.com");

    bnd()
        .env_remove("GITHUB_TOKEN")
        .args(["push", "octo/hello"])
        .arg(&bundle)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("GITHUB_TOKEN env var not set"));
}

#[test]
fn test_push_rejects_bad_repository() {
    bnd()
        .args(["push", "hello", "bundle.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("org/repo"));
}
