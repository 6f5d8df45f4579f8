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

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::{ErfpCommonError, Result};

/// identity of a single ensemble forecast file, parsed from its filename:
/// `<basename>.<issue_date>.<issue_hour>.<ensemble>.*` (spec.md §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastFileName {
    pub issue_date: NaiveDate,
    pub issue_hour: u32,
    pub ensemble_number: u32,
}

impl ForecastFileName {
    /// ensemble_number 52 is the high-resolution deterministic member (spec.md §3)
    pub fn is_high_res(&self) -> bool {
        self.ensemble_number == 52
    }

    /// the `<issue_date>.<issue_hour>` stamp used to name companion files (e.g. namelists)
    pub fn forecast_date_timestep(&self) -> String {
        format!("{}.{:02}", self.issue_date.format("%Y%m%d"), self.issue_hour)
    }
}

impl TryFrom<&Path> for ForecastFileName {
    type Error = ErfpCommonError;

    fn try_from(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ErfpCommonError::BadForecastFilename(format!("{path:?}")))?;
        Self::parse(name)
    }
}

impl ForecastFileName {
    /// parses `<basename>.<issue_date>.<issue_hour>.<ensemble>.*` (spec.md §6)
    pub fn parse(name: &str) -> Result<Self> {
        let mut parts = name.split('.');
        let _basename = parts
            .next()
            .ok_or_else(|| ErfpCommonError::BadForecastFilename(name.to_string()))?;
        let date_part = parts
            .next()
            .ok_or_else(|| ErfpCommonError::BadForecastFilename(name.to_string()))?;
        let hour_part = parts
            .next()
            .ok_or_else(|| ErfpCommonError::BadForecastFilename(name.to_string()))?;
        let ensemble_part = parts
            .next()
            .ok_or_else(|| ErfpCommonError::BadForecastFilename(name.to_string()))?;

        let timestamp = format!("{date_part}.{hour_part}");
        let (issue_date, issue_hour) = crate::datetime::parse_issue_timestamp(&timestamp)
            .ok_or_else(|| ErfpCommonError::BadForecastFilename(name.to_string()))?;
        let ensemble_number: u32 = ensemble_part
            .parse()
            .map_err(|_| ErfpCommonError::BadForecastFilename(name.to_string()))?;

        if !(1..=52).contains(&ensemble_number) {
            return Err(ErfpCommonError::BadForecastFilename(format!(
                "ensemble {ensemble_number} out of range in {name}"
            )));
        }

        Ok(ForecastFileName { issue_date, issue_hour, ensemble_number })
    }
}

/// forecast hour cadence for the high-resolution member's output (spec.md §4.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cadence {
    H1,
    H3,
    H6,
}

/// the three temporal resolution regimes of spec.md §3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnsembleRegime {
    LowRes,
    HighRes(Cadence),
}

impl EnsembleRegime {
    pub fn for_ensemble(ensemble_number: u32) -> EnsembleRegime {
        // the chosen output cadence for the high-res member is a pipeline configuration
        // choice (namelist ZS_TauR), not something the ensemble number alone determines;
        // callers that already know the cadence should construct EnsembleRegime::HighRes directly.
        if ensemble_number == 52 {
            EnsembleRegime::HighRes(Cadence::H6)
        } else {
            EnsembleRegime::LowRes
        }
    }

    /// expected length of the native runoff time axis (spec.md §3)
    pub fn t_in(&self) -> usize {
        match self {
            EnsembleRegime::LowRes => 61,
            EnsembleRegime::HighRes(_) => 125,
        }
    }

    /// expected length of the output inflow time axis (spec.md §4.3)
    pub fn t_out(&self) -> usize {
        match self {
            EnsembleRegime::LowRes => 61,
            EnsembleRegime::HighRes(Cadence::H1) => 91,
            EnsembleRegime::HighRes(Cadence::H3) => 49,
            EnsembleRegime::HighRes(Cadence::H6) => 41,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ensemble_filename() {
        let f = ForecastFileName::parse("Runoff.20260115.12.52.runoff.netcdf").unwrap();
        assert_eq!(f.issue_hour, 12);
        assert_eq!(f.ensemble_number, 52);
        assert!(f.is_high_res());
        assert_eq!(f.forecast_date_timestep(), "20260115.12");
    }

    #[test]
    fn rejects_out_of_range_ensemble() {
        assert!(ForecastFileName::parse("Runoff.20260115.12.53.runoff.netcdf").is_err());
    }

    #[test]
    fn regime_t_out_matches_spec() {
        assert_eq!(EnsembleRegime::LowRes.t_out(), 61);
        assert_eq!(EnsembleRegime::HighRes(Cadence::H1).t_out(), 91);
        assert_eq!(EnsembleRegime::HighRes(Cadence::H3).t_out(), 49);
        assert_eq!(EnsembleRegime::HighRes(Cadence::H6).t_out(), 41);
    }
}
