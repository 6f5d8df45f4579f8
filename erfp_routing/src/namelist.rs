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

//! rewrites a RAPID namelist file in place, point by point. Grounded on
//! `compute_ecmwf_rapid.py`'s `update_namelist_file`: every line whose key matches one
//! of the keys we care about is replaced wholesale, everything else passes through
//! unchanged. The rewrite is atomic (write-temp, then rename over the original), using
//! the same mechanism as [`erfp_common::fs::write_atomic`].

use std::path::{Path, PathBuf};

use erfp_common::fs::{case_insensitive_file_search, write_atomic};

use crate::errors::{RoutingError, Result};

/// one watershed-subbasin's worth of per-run namelist substitutions (spec.md §4.4).
pub struct NamelistParams {
    pub duration_secs: u64,
    pub interval_secs: u64,
    pub vlat_file: PathBuf,
    pub qinit_file: Option<PathBuf>,
    pub rapid_connect_file: PathBuf,
    pub riv_bas_id_file: PathBuf,
    pub k_file: PathBuf,
    pub x_file: PathBuf,
    pub qout_file: PathBuf,
}

impl NamelistParams {
    /// resolves the per-watershed input files by case-insensitive pattern match and
    /// fills in the duration/interval convention: 15 days / 6h for the ensemble
    /// members, 10 days / 6h for the high-resolution deterministic member (the 3h
    /// interval RAPID supports for it is deliberately not used, matching upstream).
    pub fn resolve(
        rapid_input_directory: impl AsRef<Path>,
        rapid_io_files_location: impl AsRef<Path>,
        watershed: &str,
        subbasin: &str,
        ensemble_number: u32,
        qinit_file: Option<PathBuf>,
    ) -> Result<NamelistParams> {
        let rapid_input_directory = rapid_input_directory.as_ref();
        let rapid_io_files_location = rapid_io_files_location.as_ref();

        let (duration_secs, interval_secs) = if ensemble_number == 52 {
            (10 * 24 * 60 * 60, 6 * 60 * 60)
        } else {
            (15 * 24 * 60 * 60, 6 * 60 * 60)
        };

        let find = |pattern: &str| -> Result<PathBuf> {
            case_insensitive_file_search(rapid_input_directory, pattern)
                .map_err(|_| RoutingError::InputFileNotFound {
                    dir: rapid_input_directory.to_path_buf(),
                    pattern: pattern.to_string(),
                })
        };

        Ok(NamelistParams {
            duration_secs,
            interval_secs,
            vlat_file: rapid_io_files_location.join(format!("m3_riv_bas_{ensemble_number}.nc")),
            qinit_file,
            rapid_connect_file: find(r"rapid_connect\.csv")?,
            riv_bas_id_file: find(r"riv_bas_id.*?\.csv")?,
            k_file: find(r"^k\.csv$")?,
            x_file: find(r"^x\.csv$")?,
            // the name is deterministic (spec.md §4.4), so it is constructed rather than
            // searched for - RAPID creates this file itself on first write, it need not
            // pre-exist.
            qout_file: rapid_io_files_location.join(format!("Qout_{watershed}_{subbasin}_{ensemble_number}.nc")),
        })
    }
}

pub fn update_namelist_file(namelist_path: impl AsRef<Path>, params: &NamelistParams) -> Result<()> {
    let namelist_path = namelist_path.as_ref();
    let original = std::fs::read_to_string(namelist_path)?;

    let mut rewritten = String::with_capacity(original.len());
    for line in original.lines() {
        let trimmed = line.trim_start();
        let replacement = if trimmed.starts_with("BS_opt_Qinit") {
            Some(format!("BS_opt_Qinit       =.{}.\n", params.qinit_file.is_some()))
        } else if trimmed.starts_with("Vlat_file") {
            Some(format!("Vlat_file          ='{}'\n", params.vlat_file.display()))
        } else if trimmed.starts_with("ZS_TauM") {
            Some(format!("ZS_TauM            ={}\n", params.duration_secs))
        } else if trimmed.starts_with("ZS_dtM") {
            Some("ZS_dtM             =86400\n".to_string())
        } else if trimmed.starts_with("ZS_TauR") {
            Some(format!("ZS_TauR            ={}\n", params.interval_secs))
        } else if trimmed.starts_with("Qinit_file") {
            Some(match &params.qinit_file {
                Some(p) => format!("Qinit_file         ='{}'\n", p.display()),
                None => "Qinit_file         =''\n".to_string(),
            })
        } else if trimmed.starts_with("rapid_connect_file") {
            Some(format!("rapid_connect_file ='{}'\n", params.rapid_connect_file.display()))
        } else if trimmed.starts_with("riv_bas_id_file") {
            Some(format!("riv_bas_id_file    ='{}'\n", params.riv_bas_id_file.display()))
        } else if trimmed.starts_with("k_file") {
            Some(format!("k_file             ='{}'\n", params.k_file.display()))
        } else if trimmed.starts_with("x_file") {
            Some(format!("x_file             ='{}'\n", params.x_file.display()))
        } else if trimmed.starts_with("Qout_file") {
            Some(format!("Qout_file          ='{}'\n", params.qout_file.display()))
        } else {
            None
        };

        match replacement {
            Some(r) => rewritten.push_str(&r),
            None => {
                rewritten.push_str(line);
                rewritten.push('\n');
            }
        }
    }

    write_atomic(namelist_path, rewritten.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn rewrites_keyed_lines_and_passes_through_others() {
        let dir = tempfile::tempdir().unwrap();
        let namelist_path = dir.path().join("rapid_namelist.dat");
        let mut f = std::fs::File::create(&namelist_path).unwrap();
        writeln!(f, "&NL_namelist").unwrap();
        writeln!(f, "BS_opt_Qinit       =.false.").unwrap();
        writeln!(f, "ZS_TauM            =999").unwrap();
        writeln!(f, "/").unwrap();

        let params = NamelistParams {
            duration_secs: 1296000,
            interval_secs: 21600,
            vlat_file: PathBuf::from("/tmp/m3_riv_bas_1.nc"),
            qinit_file: None,
            rapid_connect_file: PathBuf::from("/tmp/rapid_connect.csv"),
            riv_bas_id_file: PathBuf::from("/tmp/riv_bas_id.csv"),
            k_file: PathBuf::from("/tmp/k.csv"),
            x_file: PathBuf::from("/tmp/x.csv"),
            qout_file: PathBuf::from("/tmp/Qout_ws_sb_1.nc"),
        };

        update_namelist_file(&namelist_path, &params).unwrap();
        let result = std::fs::read_to_string(&namelist_path).unwrap();
        assert!(result.contains("&NL_namelist"));
        assert!(result.contains("ZS_TauM            =1296000"));
        assert!(result.contains("BS_opt_Qinit       =.false."));
        assert!(result.contains("Vlat_file          ='/tmp/m3_riv_bas_1.nc'"));
    }
}
