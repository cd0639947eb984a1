//! JSON Lines bundle collections
//!
//! A pack is one flattened bundle per line. Packing never overwrites an
//! existing file and unpacking never creates the output directory. Unpacking
//! reads and checks every line before the first file is written.

use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Collapse pretty-printed JSON onto a single line.
///
/// Lines are trimmed and joined with one space, so the content of string
/// values is preserved.
pub fn flatten_json(data: &str) -> String {
    data.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Write the given bundle files as a JSON Lines file.
pub fn pack(bundles: &[PathBuf], out: &Path) -> Result<()> {
    if bundles.is_empty() {
        return Err(Error::Validation("no bundles specified".to_string()));
    }
    if out.exists() {
        return Err(Error::Validation(format!(
            "specified output file already exists: {}",
            out.display()
        )));
    }

    let mut lines = Vec::with_capacity(bundles.len());
    for path in bundles {
        let data = fs::read_to_string(path)?;
        let line = flatten_json(&data);
        serde_json::from_str::<Value>(&line).map_err(|e| {
            Error::Format(format!("{} is not valid JSON: {e}", path.display()))
        })?;
        lines.push(line);
    }

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(out)?;
    for line in &lines {
        writeln!(file, "{line}")?;
    }
    debug!(count = lines.len(), out = %out.display(), "packed bundles");
    Ok(())
}

/// Read each non-blank line of a JSON Lines stream.
pub fn iterate_jsonl<R: Read>(reader: R) -> impl Iterator<Item = Result<String>> {
    BufReader::new(reader).lines().filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(Ok(line)),
        Err(e) => Some(Err(Error::Io(e))),
    })
}

/// Split a JSON Lines file into `<prefix>NN.json` files.
///
/// The prefix defaults to the file stem followed by `-`, the output
/// directory to the current directory. Returns the written paths.
pub fn unpack(jsonl: &Path, prefix: Option<&str>, out_dir: Option<&Path>) -> Result<Vec<PathBuf>> {
    let out_dir = out_dir.unwrap_or_else(|| Path::new("."));
    if !out_dir.is_dir() {
        return Err(Error::Validation(format!(
            "output directory does not exist: {}",
            out_dir.display()
        )));
    }

    let prefix = match prefix {
        Some(p) => p.to_string(),
        None => {
            let stem = jsonl
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("{stem}-")
        }
    };

    let file = fs::File::open(jsonl)?;
    let mut lines = Vec::new();
    for (i, line) in iterate_jsonl(file).enumerate() {
        let line = line?;
        serde_json::from_str::<Value>(&line)
            .map_err(|e| Error::Format(format!("line {} is not valid JSON: {e}", i + 1)))?;
        lines.push(line);
    }

    let mut written = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        let path = out_dir.join(format!("{prefix}{i:02}.json"));
        fs::write(&path, format!("{line}\n"))?;
        written.push(path);
    }
    debug!(count = written.len(), "unpacked bundles");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_json() {
        let pretty = "{\n  \"a\": \"x  y\",\n  \"b\": [\n    1\n  ]\n}\n";
        assert_eq!(flatten_json(pretty), r#"{ "a": "x  y", "b": [ 1 ] }"#);
    }

    #[test]
    fn test_pack_and_unpack() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        fs::write(&a, "{\n  \"n\": 1\n}\n").unwrap();
        fs::write(&b, "{\"n\": 2}").unwrap();

        let out = dir.path().join("pack.jsonl");
        pack(&[a.clone(), b], &out).unwrap();
        let packed = fs::read_to_string(&out).unwrap();
        assert_eq!(packed.lines().count(), 2);

        let err = pack(&[a], &out).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        let unpack_dir = dir.path().join("out");
        fs::create_dir(&unpack_dir).unwrap();
        let files = unpack(&out, None, Some(&unpack_dir)).unwrap();
        assert_eq!(files.len(), 2);
        assert!(unpack_dir.join("pack-00.json").exists());
        assert!(unpack_dir.join("pack-01.json").exists());
        let second: Value =
            serde_json::from_str(&fs::read_to_string(&files[1]).unwrap()).unwrap();
        assert_eq!(second["n"], 2);
    }

    #[test]
    fn test_pack_requires_bundles() {
        let dir = tempfile::tempdir().unwrap();
        let err = pack(&[], &dir.path().join("x.jsonl")).unwrap_err();
        assert!(err.to_string().contains("no bundles specified"));
    }

    #[test]
    fn test_unpack_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let jsonl = dir.path().join("p.jsonl");
        fs::write(&jsonl, "{}\n").unwrap();
        assert!(unpack(&jsonl, Some("x"), Some(&dir.path().join("nope"))).is_err());
    }

    #[test]
    fn test_unpack_malformed_line_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let jsonl = dir.path().join("p.jsonl");
        fs::write(&jsonl, "{\"n\": 1}\n{\"n\": 2}\nnot json\n").unwrap();
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();

        let err = unpack(&jsonl, Some("att"), Some(&out)).unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }
}
