//! JSON document I/O shared by the stores.
//!
//! Writes go to a temporary file in the destination directory which is
//! fsynced and then renamed over the old document, so a crash mid-write
//! leaves either the previous file or the new one, never a torn mix.

use std::io::{BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};

/// Read and parse `path`. A missing file is `Ok(None)`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("persist: {:?} missing, starting empty", path);
            return Ok(None);
        }
        Err(source) => {
            return Err(Error::PersistenceReadFailed {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| Error::DocumentParseFailed {
            path: path.to_path_buf(),
            source,
        })
}

/// Serialise `doc` and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    write_inner(path, doc).map_err(|source| Error::PersistenceWriteFailed {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("persist: wrote {:?}", path);
    Ok(())
}

fn write_inner<T: Serialize>(path: &Path, doc: &T) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, doc)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        items: Vec<String>,
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let got: Option<Doc> = read_json(&dir.path().join("nope.json")).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"items\": [").unwrap();
        let err = read_json::<Doc>(&path).unwrap_err();
        assert!(matches!(err, Error::DocumentParseFailed { .. }));
    }

    #[test]
    fn test_write_replaces_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");

        write_json_atomic(&path, &Doc { items: vec!["a".into()] }).unwrap();
        write_json_atomic(&path, &Doc { items: vec!["b".into()] }).unwrap();

        let got: Doc = read_json(&path).unwrap().unwrap();
        assert_eq!(got.items, vec!["b".to_string()]);

        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_write_into_unusable_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let err = write_json_atomic(&blocker.join("doc.json"), &Doc { items: vec![] }).unwrap_err();
        assert!(matches!(err, Error::PersistenceWriteFailed { .. }));
    }
}
