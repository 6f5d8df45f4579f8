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

//! the work unit state machine and the cycle key spec.md §3/§4.8 describe: a cycle is
//! the set of all 52 ensemble members for one (watershed, subbasin, issue), and a work
//! unit moves through `NEW -> SUBMITTED -> RUNNING -> {COMPLETED,FAILED}`, then
//! `COMPLETED -> UPLOADED` or `FAILED -> SKIPPED`.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use erfp_common::forecast::ForecastFileName;

/// identifies one forecast cycle: all 52 ensemble members of one (watershed, subbasin)
/// issued at the same instant (spec.md §3 "Forecast Cycle").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CycleKey {
    pub watershed: String,
    pub subbasin: String,
    pub issue_date: NaiveDate,
    pub issue_hour: u32,
}

impl std::fmt::Display for CycleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{} {}.{:02}", self.watershed, self.subbasin, self.issue_date, self.issue_hour)
    }
}

/// the explicit state machine of spec.md §4.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkUnitState {
    New,
    Submitted,
    Running,
    Completed,
    Failed,
    Uploaded,
    Skipped,
}

impl WorkUnitState {
    /// whether this state is terminal for the purposes of cycle-completion gating
    /// (spec.md §4.8 "Warm-start gating").
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkUnitState::Uploaded | WorkUnitState::Skipped)
    }
}

/// a single (forecast_file, watershed, subbasin) tuple (spec.md §3 "Work Unit"), with
/// the derived fields spec.md names: output directory, expected output filename, weight
/// table selection, and job identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkUnit {
    pub forecast_path: PathBuf,
    pub forecast: ForecastFileName,
    pub watershed: String,
    pub subbasin: String,
    /// position of this unit within the enumeration, used only to make the job id
    /// unique (spec.md §3: `job_{issue_date}.{issue_hour}_{watershed}_{seq}`).
    pub seq: usize,
}

impl WorkUnit {
    pub fn cycle_key(&self) -> CycleKey {
        CycleKey {
            watershed: self.watershed.clone(),
            subbasin: self.subbasin.clone(),
            issue_date: self.forecast.issue_date,
            issue_hour: self.forecast.issue_hour,
        }
    }

    /// `job_{issue_date}.{issue_hour}_{watershed}_{seq}` (spec.md §3).
    pub fn job_id(&self) -> String {
        format!("job_{}_{}_{}", self.forecast.forecast_date_timestep(), self.watershed, self.seq)
    }

    /// `weight_low_res.csv` for every member except the high-resolution deterministic
    /// member 52, which uses `weight_high_res.csv` (spec.md §3 "Work Unit").
    pub fn weight_table_filename(&self) -> &'static str {
        if self.forecast.is_high_res() {
            "weight_high_res.csv"
        } else {
            "weight_low_res.csv"
        }
    }

    /// `<io_root>/output/<watershed>-<subbasin>/<issue_date>.<issue_hour>/Qout_<w>_<s>_<n>.nc`
    /// (spec.md §6 filesystem layout).
    pub fn output_path(&self, io_root: &std::path::Path) -> PathBuf {
        io_root
            .join("output")
            .join(format!("{}-{}", self.watershed, self.subbasin))
            .join(self.forecast.forecast_date_timestep())
            .join(format!("Qout_{}_{}_{}.nc", self.watershed, self.subbasin, self.forecast.ensemble_number))
    }

    /// `<io_root>/input/<watershed>-<subbasin>` (spec.md §6 filesystem layout).
    pub fn input_dir(&self, io_root: &std::path::Path) -> PathBuf {
        io_root.join("input").join(format!("{}-{}", self.watershed, self.subbasin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::Path;

    fn unit(ensemble_number: u32, seq: usize) -> WorkUnit {
        WorkUnit {
            forecast_path: PathBuf::from("/tmp/Runoff.20260115.12.1.runoff.netcdf"),
            forecast: ForecastFileName {
                issue_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
                issue_hour: 12,
                ensemble_number,
            },
            watershed: "nfie".to_string(),
            subbasin: "south_atlantic".to_string(),
            seq,
        }
    }

    #[test]
    fn job_id_matches_spec_format() {
        assert_eq!(unit(1, 7).job_id(), "job_20260115.12_nfie_7");
    }

    #[test]
    fn weight_table_selection_keys_off_ensemble_52() {
        assert_eq!(unit(52, 0).weight_table_filename(), "weight_high_res.csv");
        assert_eq!(unit(51, 0).weight_table_filename(), "weight_low_res.csv");
        assert_eq!(unit(1, 0).weight_table_filename(), "weight_low_res.csv");
    }

    #[test]
    fn output_path_matches_layout() {
        let u = unit(52, 0);
        let p = u.output_path(Path::new("/rapid"));
        assert_eq!(p, PathBuf::from("/rapid/output/nfie-south_atlantic/20260115.12/Qout_nfie_south_atlantic_52.nc"));
    }

    #[test]
    fn terminal_states() {
        assert!(WorkUnitState::Uploaded.is_terminal());
        assert!(WorkUnitState::Skipped.is_terminal());
        assert!(!WorkUnitState::Completed.is_terminal());
        assert!(!WorkUnitState::Failed.is_terminal());
    }
}
