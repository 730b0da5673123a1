//! On-disk snapshot helpers
//!
//! Files are written to a sibling temp file and renamed into place so a
//! crash never leaves a half-written snapshot behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use convorag_common::errors::{AppError, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Vector snapshot file name
pub const INDEX_FILE: &str = "index.json";

/// Document registry file name
pub const REGISTRY_FILE: &str = "document_registry.json";

/// Serialize `value` as JSON and atomically replace `path`
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| persistence(path, e))?;
    }

    let bytes = serde_json::to_vec(value)?;
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, bytes).await.map_err(|e| persistence(&tmp, e))?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| persistence(path, e))?;
    Ok(())
}

/// Read and parse a JSON file. A missing file is `Ok(None)`.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(persistence(path, e)),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Remove a file, treating "already gone" as success
pub async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(persistence(path, e)),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn persistence(path: &Path, err: std::io::Error) -> AppError {
    AppError::Persistence {
        message: format!("{}: {}", path.display(), err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");

        let mut value = BTreeMap::new();
        value.insert("k".to_string(), 1u32);
        write_json_atomic(&path, &value).await.unwrap();

        let back: Option<BTreeMap<String, u32>> = read_json(&path).await.unwrap();
        assert_eq!(back, Some(value));
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let back: Option<Vec<u32>> = read_json(&dir.path().join("absent.json")).await.unwrap();
        assert!(back.is_none());
        remove_if_exists(&dir.path().join("absent.json")).await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let result: Result<Option<Vec<u32>>> = read_json(&path).await;
        assert!(matches!(result, Err(AppError::Serialization(_))));
    }
}
