/*
 * Copyright © 2026, the erfp contributors.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// check if dir pathname exists and is writable, try to create dir otherwise
pub fn ensure_writable_dir(path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    if path.is_dir() {
        let md = fs::metadata(path)?;
        if md.permissions().readonly() {
            Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("output dir {:?} not writable", path),
            ))
        } else {
            Ok(())
        }
    } else {
        fs::create_dir_all(path)
    }
}

/// remove regular files under `dir` whose mtime is older than `max_age`. Returns number removed.
pub fn remove_old_files(dir: impl AsRef<Path>, max_age: Duration) -> io::Result<usize> {
    let dir = dir.as_ref();
    let mut n_removed = 0;

    if dir.is_dir() {
        let now = SystemTime::now();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let meta = fs::metadata(&path)?;
            if let Ok(age) = now.duration_since(meta.modified()?) {
                if age > max_age {
                    let removed = if meta.is_dir() {
                        fs::remove_dir_all(&path).is_ok()
                    } else {
                        fs::remove_file(&path).is_ok()
                    };
                    if removed {
                        n_removed += 1;
                    }
                }
            }
        }
    }
    Ok(n_removed)
}

/// write `contents` to a temp file in the same directory as `path` and rename it into place,
/// so a reader of `path` never observes a partially written file.
pub fn write_atomic(path: impl AsRef<Path>, contents: &[u8]) -> io::Result<()> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.persist(path)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    Ok(())
}

/// case-insensitive search for the first filename in `dir` whose name matches `pattern`
/// (a regex). This is the fallback path noted in spec.md §9 "dynamic name discovery" — prefer
/// an explicit manifest where one is available, and only fall back to this for compatibility
/// with watershed input directories that predate the manifest.
pub fn case_insensitive_file_search(dir: impl AsRef<Path>, pattern: &str) -> io::Result<PathBuf> {
    let dir = dir.as_ref();
    let re = regex::RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if re.is_match(name) {
                return Ok(entry.path());
            }
        }
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no file matching /{pattern}/i in {dir:?}"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn finds_case_insensitive_match() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("Rapid_Connect.csv")).unwrap();
        let found = case_insensitive_file_search(dir.path(), r"rapid_connect\.csv").unwrap();
        assert_eq!(found.file_name().unwrap().to_str().unwrap(), "Rapid_Connect.csv");
    }

    #[test]
    fn write_atomic_is_visible_only_after_rename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        write_atomic(&path, b"hello").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }
}
