//! JSON document persistence shared by the local stores.
//!
//! Loading never fails: a missing or corrupt file yields the default value.
//! Saving creates parent directories; callers that must not fail use
//! [`save_or_warn`].

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::domain::Result;

/// Read `path` as JSON, falling back to `T::default()`.
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(_) => return T::default(),
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable store file");
            T::default()
        }
    }
}

/// Write `value` to `path` as pretty JSON.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// [`save_json`], logging instead of returning the error.
pub fn save_or_warn<T: Serialize + ?Sized>(path: &Path, value: &T) {
    if let Err(e) = save_json(path, value) {
        warn!(path = %path.display(), error = %e, "failed to persist store");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_and_corrupt_files_give_default() {
        let dir = tempfile::tempdir().unwrap();
        let missing: Vec<String> = load_or_default(&dir.path().join("nope.json"));
        assert!(missing.is_empty());

        let corrupt = dir.path().join("bad.json");
        std::fs::write(&corrupt, b"{not json").unwrap();
        let value: Vec<String> = load_or_default(&corrupt);
        assert!(value.is_empty());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.json");
        save_json(&path, &vec!["x".to_string()]).unwrap();
        let back: Vec<String> = load_or_default(&path);
        assert_eq!(back, vec!["x"]);
    }
}
