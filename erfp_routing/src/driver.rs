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

//! invokes the external RAPID router binary for a single watershed-subbasin-ensemble
//! unit. Grounded on `compute_ecmwf_rapid.py`'s `run_RAPID_single_watershed`: symlink
//! the executable and the chosen namelist into the run directory RAPID expects them
//! in, run it, and remove both links no matter how the run ends.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use crate::errors::{RoutingError, Result};

/// removes a symlink on drop, best-effort — mirrors the `try/except OSError: pass`
/// cleanup blocks in the original driver, which never let a missing link fail the run.
struct SymlinkGuard {
    path: PathBuf,
}

impl SymlinkGuard {
    fn create(target: impl AsRef<Path>, link: impl Into<PathBuf>) -> Result<SymlinkGuard> {
        let link = link.into();
        std::os::unix::fs::symlink(target.as_ref(), &link)?;
        Ok(SymlinkGuard { path: link })
    }
}

impl Drop for SymlinkGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[derive(Clone)]
pub struct RouterDriver {
    pub rapid_executable: PathBuf,
}

impl RouterDriver {
    pub fn new(rapid_executable: impl Into<PathBuf>) -> RouterDriver {
        RouterDriver { rapid_executable: rapid_executable.into() }
    }

    /// runs RAPID in `node_path` against the already-rewritten `namelist_file`. The
    /// executable and namelist symlinks are removed on every return path, success or
    /// failure, via [`SymlinkGuard`].
    pub fn run_single_watershed(&self, node_path: impl AsRef<Path>, namelist_file: impl AsRef<Path>) -> Result<()> {
        let node_path = node_path.as_ref();
        let local_rapid_executable = node_path.join("rapid");
        let rapid_namelist_link = node_path.join("rapid_namelist");

        let _exe_guard = SymlinkGuard::create(&self.rapid_executable, local_rapid_executable.clone())?;
        let _namelist_guard = SymlinkGuard::create(namelist_file.as_ref(), rapid_namelist_link)?;

        let started = Instant::now();
        tracing::info!(?local_rapid_executable, "running RAPID");
        let status = Command::new(&local_rapid_executable).current_dir(node_path).status()?;
        tracing::info!(elapsed = ?started.elapsed(), success = status.success(), "RAPID run finished");

        if !status.success() {
            return Err(RoutingError::RoutingFailure(status));
        }
        Ok(())
    }
}
