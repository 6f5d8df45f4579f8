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

//! the per-work-unit pipeline: C1+C2 read, C3 build inflow, C4 rewrite the namelist.
//! Routing (C5) and CF normalization (C6) happen around this in
//! [`crate::orchestrator`] because C5 is mediated by the [`crate::scheduler`]
//! abstraction and C6 needs to run after the scheduler reports completion. Grounded on
//! `compute_ecmwf_rapid.py`'s per-(watershed, ensemble) body.

use std::path::{Path, PathBuf};

use erfp_common::fs::ensure_writable_dir;
use erfp_inflow::{InflowBuilder, RunoffFile, WeightTable};
use erfp_routing::namelist::NamelistParams;

use crate::cycle::WorkUnit;
use crate::errors::Result;
use crate::watershed::WatershedManifest;

/// everything prepared for one unit before it is handed to the scheduler: the node's
/// scratch directory and the namelist file [`erfp_routing::driver::RouterDriver`] will
/// point RAPID at.
pub struct PreparedUnit {
    pub node_path: PathBuf,
    pub namelist_file: PathBuf,
    /// where RAPID will write `Qout_<w>_<s>_<n>.nc` (spec.md §4.4); C6 runs on this
    /// path in place before it is moved to the unit's public output location.
    pub qout_file: PathBuf,
}

/// runs C1 (weight table), C2 (runoff validation), C3 (inflow build), and C4
/// (namelist rewrite) for one unit, leaving it ready for C5.
///
/// `node_path` is the per-job sandbox (spec.md §9 "Process-global path state": never
/// conflated with `io_root`); `watershed_input_dir` is the shared, read-only static
/// directory for this (watershed, subbasin).
pub fn prepare_unit(
    unit: &WorkUnit,
    manifest: &WatershedManifest,
    watershed_input_dir: &Path,
    node_path: &Path,
    warmstart_file: Option<PathBuf>,
) -> Result<PreparedUnit> {
    ensure_writable_dir(node_path)?;

    let weights = WeightTable::read(manifest.weight_table_for(unit))?;
    let runoff = RunoffFile::open(&unit.forecast_path)?;

    let inflow_path = node_path.join(format!("m3_riv_bas_{}.nc", unit.forecast.ensemble_number));
    InflowBuilder::new(&weights, &runoff).build(&inflow_path)?;
    tracing::info!(job_id = %unit.job_id(), ?inflow_path, "wrote inflow file");

    let params = NamelistParams::resolve(
        watershed_input_dir,
        node_path,
        &unit.watershed,
        &unit.subbasin,
        unit.forecast.ensemble_number,
        warmstart_file,
    )?;

    let namelist_file = node_path.join(format!("rapid_namelist_{}.dat", unit.forecast.ensemble_number));
    std::fs::copy(&manifest.namelist_template, &namelist_file)?;
    erfp_routing::update_namelist_file(&namelist_file, &params)?;

    Ok(PreparedUnit { node_path: node_path.to_path_buf(), namelist_file, qout_file: params.qout_file })
}

/// the expected warm-start file path for `(watershed, subbasin)` at `issue - 12h`
/// (spec.md §4.4 `BS_opt_Qinit`/`Qinit_file` rule); returns `None` (not an error) when
/// the file doesn't exist, which callers interpret as `WarmStartMissing` (spec.md §7:
/// downgraded to a warning, namelist proceeds with `BS_opt_Qinit = .false.`).
pub fn expected_warmstart_file(
    watershed_input_dir: &Path,
    watershed: &str,
    subbasin: &str,
    issue: chrono::DateTime<chrono::Utc>,
) -> Option<PathBuf> {
    let stamp = erfp_common::datetime::warmstart_stamp(&(issue - chrono::Duration::hours(12)));
    let path = watershed_input_dir.join(format!("Qinit_file_{watershed}_{subbasin}_{stamp}.csv"));
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn expected_warmstart_file_is_none_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let issue = erfp_common::datetime::issue_instant(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(), 12).unwrap();
        assert!(expected_warmstart_file(dir.path(), "nfie", "gulf", issue).is_none());
    }

    #[test]
    fn expected_warmstart_file_is_some_when_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Qinit_file_nfie_gulf_20260115t00.csv"), "0.0\n").unwrap();
        let issue = erfp_common::datetime::issue_instant(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(), 12).unwrap();
        assert!(expected_warmstart_file(dir.path(), "nfie", "gulf", issue).is_some());
    }
}
