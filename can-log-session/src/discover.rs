//! Input file discovery

use crate::types::Result;
use std::path::{Path, PathBuf};

/// List files in `dir` whose extension matches `extension`
///
/// The comparison is case-insensitive and a leading dot in `extension` is
/// ignored. Results are sorted by file name. A missing directory or no match
/// yields an empty list; later steps decide whether that is an error.
pub fn discover_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let wanted = extension.trim_start_matches('.').to_lowercase();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot read input directory {:?}: {}", dir, e);
            return Ok(Vec::new());
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.to_lowercase() == wanted);
        if matches {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        log::warn!("No *.{} files found in {:?}", wanted, dir);
    } else {
        log::debug!("Found {} *.{} files in {:?}", files.len(), wanted, dir);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_matches_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.blf", "a.BLF", "c.dbc", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.blf")).unwrap();

        let logs = discover_files(dir.path(), ".blf").unwrap();
        assert_eq!(logs, vec![dir.path().join("a.BLF"), dir.path().join("b.blf")]);

        let dbcs = discover_files(dir.path(), "dbc").unwrap();
        assert_eq!(dbcs, vec![dir.path().join("c.dbc")]);
    }

    #[test]
    fn test_discover_empty_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_files(dir.path(), "blf").unwrap().is_empty());
        assert!(discover_files(&dir.path().join("missing"), "blf")
            .unwrap()
            .is_empty());
    }
}
