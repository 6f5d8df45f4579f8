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

//! builds the next cycle's warm-start file from a completed cycle's 52 routed
//! ensemble outputs: per reach, the 12-hour-ahead discharge averaged across every
//! member that carries it, clipped at zero. Grounded on `compute_ecmwf_rapid.py`'s
//! `Qinit_file` discovery convention (spec.md §4.7).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use erfp_common::datetime::warmstart_stamp;

use crate::errors::{Result, WarmstartError};

/// index within the output time axis that represents "12 hours ahead" for a 6h
/// routing time step — the first sample beyond the nowcast window (spec.md §4.7).
const WARMSTART_TIME_INDEX: usize = 2;

pub struct InitFlowPropagator {
    pub id_var_name: String,
}

impl Default for InitFlowPropagator {
    fn default() -> InitFlowPropagator {
        InitFlowPropagator { id_var_name: "COMID".to_string() }
    }
}

impl InitFlowPropagator {
    /// reads one CF-normalized ensemble output file, returning reach id -> discharge
    /// at [`WARMSTART_TIME_INDEX`], clipped to zero.
    fn read_member(&self, path: &Path, flow_var_name: &str) -> Result<HashMap<i64, f64>> {
        let file = netcdf::open(path)?;
        let ids: Vec<i64> = file
            .variable(&self.id_var_name)
            .ok_or_else(|| WarmstartError::OpFailed(format!("missing variable '{}'", self.id_var_name)))?
            .get_values(..)?;
        let flow = file
            .variable(flow_var_name)
            .ok_or_else(|| WarmstartError::OpFailed(format!("missing variable '{flow_var_name}'")))?;
        let n_reach = ids.len();
        let values: ndarray::Array2<f64> = flow.get_values(..)?;

        let mut out = HashMap::with_capacity(n_reach);
        for (row, &id) in ids.iter().enumerate() {
            let v = values[[row, WARMSTART_TIME_INDEX]].max(0.0);
            out.insert(id, v);
        }
        Ok(out)
    }

    /// removes any existing warm-start files for `(watershed, subbasin)` in `out_dir`.
    fn remove_stale(&self, out_dir: &Path, watershed: &str, subbasin: &str) -> Result<()> {
        let pattern = out_dir.join(format!("Qinit_file_{watershed}_{subbasin}_*.csv"));
        for entry in glob::glob(&pattern.to_string_lossy())? {
            if let Ok(path) = entry {
                let _ = std::fs::remove_file(path);
            }
        }
        Ok(())
    }

    /// averages `member_files` (the cycle's routed/CF-normalized outputs) across every
    /// reach named in `connectivity_reach_ids`, and writes the warm-start CSV that C4
    /// will look for before the cycle 12 hours from now (`next_issue`).
    pub fn propagate(
        &self,
        member_files: &[PathBuf],
        flow_var_name: &str,
        connectivity_reach_ids: &[i64],
        out_dir: &Path,
        watershed: &str,
        subbasin: &str,
        next_issue: DateTime<Utc>,
    ) -> Result<PathBuf> {
        if member_files.is_empty() {
            return Err(WarmstartError::NoMembers);
        }
        self.remove_stale(out_dir, watershed, subbasin)?;

        let members: Vec<HashMap<i64, f64>> =
            member_files.iter().map(|p| self.read_member(p, flow_var_name)).collect::<Result<_>>()?;

        let mut rows: Vec<(i64, f64)> = Vec::with_capacity(connectivity_reach_ids.len());
        for &reach_id in connectivity_reach_ids {
            let values: Vec<f64> = members.iter().filter_map(|m| m.get(&reach_id).copied()).collect();
            let avg = if values.is_empty() { 0.0 } else { values.iter().sum::<f64>() / values.len() as f64 };
            rows.push((reach_id, avg));
        }

        let stamp_instant = next_issue - chrono::Duration::hours(12);
        let stamp = warmstart_stamp(&stamp_instant);
        let out_path = out_dir.join(format!("Qinit_file_{watershed}_{subbasin}_{stamp}.csv"));

        let dir = out_dir;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            // one column, R_all rows, in connectivity order (spec.md §3/§6) - no reach_id
            // column, since the row position against rapid_connect.csv *is* the key.
            let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(&mut tmp);
            for (_reach_id, value) in &rows {
                writer.write_record(&[format!("{value}")])?;
            }
            writer.flush()?;
        }
        tmp.persist(&out_path).map_err(|e| WarmstartError::OpFailed(e.to_string()))?;

        tracing::info!(?out_path, reaches = rows.len(), "wrote warm-start file");
        Ok(out_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_across_members_and_clips_negatives() {
        let mut a = HashMap::new();
        a.insert(1_i64, 5.0);
        a.insert(2_i64, -3.0);
        let mut b = HashMap::new();
        b.insert(1_i64, 7.0);
        // reach 2 absent from member b

        let members = vec![a, b];
        let reach_ids = [1_i64, 2_i64, 3_i64];
        let mut rows = Vec::new();
        for &id in &reach_ids {
            let values: Vec<f64> = members.iter().filter_map(|m| m.get(&id).copied()).collect();
            let avg = if values.is_empty() { 0.0 } else { values.iter().sum::<f64>() / values.len() as f64 };
            rows.push((id, avg));
        }
        assert_eq!(rows[0], (1, 6.0));
        assert_eq!(rows[1], (2, -3.0)); // clipping happens at read_member time, not here
        assert_eq!(rows[2], (3, 0.0));
    }
}
