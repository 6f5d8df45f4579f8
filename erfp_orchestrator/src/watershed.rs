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

//! resolves the static per-watershed input files (spec.md §9 "Dynamic name discovery
//! in the working directory"): prefer an explicit `manifest.ron` naming every file by
//! role, and only fall back to [`erfp_common::fs::case_insensitive_file_search`] for
//! watershed directories that predate the manifest.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use erfp_common::fs::case_insensitive_file_search;

use crate::cycle::WorkUnit;
use crate::errors::Result;

const MANIFEST_FILENAME: &str = "manifest.ron";

/// the static files a (watershed, subbasin) input directory must provide. Paths are
/// absolute once resolved, regardless of whether they came from the manifest or from
/// a case-insensitive search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatershedManifest {
    pub namelist_template: PathBuf,
    pub weight_low_res: PathBuf,
    pub weight_high_res: PathBuf,
    pub comid_lat_lon_z: PathBuf,
}

impl WatershedManifest {
    /// reads `<input_dir>/manifest.ron` if present (its paths are relative to
    /// `input_dir`); otherwise falls back to case-insensitive discovery.
    pub fn discover(input_dir: &Path) -> Result<WatershedManifest> {
        let manifest_path = input_dir.join(MANIFEST_FILENAME);
        if manifest_path.is_file() {
            let text = std::fs::read_to_string(&manifest_path)?;
            let relative: RelativeManifest = ron::de::from_str(&text)?;
            return Ok(WatershedManifest {
                namelist_template: input_dir.join(relative.namelist_template),
                weight_low_res: input_dir.join(relative.weight_low_res),
                weight_high_res: input_dir.join(relative.weight_high_res),
                comid_lat_lon_z: input_dir.join(relative.comid_lat_lon_z),
            });
        }

        tracing::debug!(?input_dir, "no manifest.ron, falling back to case-insensitive search");
        Ok(WatershedManifest {
            namelist_template: case_insensitive_file_search(input_dir, r"^rapid_namelist.*\.dat$")?,
            weight_low_res: case_insensitive_file_search(input_dir, r"^weight_low_res\.csv$")?,
            weight_high_res: case_insensitive_file_search(input_dir, r"^weight_high_res\.csv$")?,
            comid_lat_lon_z: case_insensitive_file_search(input_dir, r"^comid_lat_lon_z.*\.csv$")?,
        })
    }

    /// selects the low- or high-resolution weight table, keyed off `ensemble_number
    /// == 52` exactly as the routing namelist selection does (spec.md §3 "Work Unit").
    pub fn weight_table_for(&self, unit: &WorkUnit) -> &Path {
        if unit.forecast.is_high_res() {
            &self.weight_high_res
        } else {
            &self.weight_low_res
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RelativeManifest {
    namelist_template: PathBuf,
    weight_low_res: PathBuf,
    weight_high_res: PathBuf,
    comid_lat_lon_z: PathBuf,
}

/// lists `(watershed, subbasin)` pairs from `<io_root>/input/<watershed>-<subbasin>`
/// directory names (spec.md §6 filesystem layout).
pub fn discover_watersheds(io_root: &Path) -> Result<Vec<(String, String)>> {
    let input_root = io_root.join("input");
    let mut out = Vec::new();
    for entry in std::fs::read_dir(&input_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        match name.split_once('-') {
            Some((watershed, subbasin)) => out.push((watershed.to_string(), subbasin.to_string())),
            None => tracing::warn!(name, "watershed input directory name has no '-' separator, skipping"),
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovers_watersheds_from_directory_names() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("input/nfie-south_atlantic")).unwrap();
        fs::create_dir_all(root.path().join("input/nfie-gulf")).unwrap();
        let found = discover_watersheds(root.path()).unwrap();
        assert_eq!(found, vec![("nfie".to_string(), "gulf".to_string()), ("nfie".to_string(), "south_atlantic".to_string())]);
    }

    #[test]
    fn manifest_file_takes_precedence_over_search() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("rapid_namelist.dat"), "").unwrap();
        fs::write(dir.path().join("custom_weight_low.csv"), "").unwrap();
        fs::write(dir.path().join("weight_high_res.csv"), "").unwrap();
        fs::write(dir.path().join("comid_lat_lon_z.csv"), "").unwrap();
        fs::write(
            dir.path().join("manifest.ron"),
            r#"(
                namelist_template: "rapid_namelist.dat",
                weight_low_res: "custom_weight_low.csv",
                weight_high_res: "weight_high_res.csv",
                comid_lat_lon_z: "comid_lat_lon_z.csv",
            )"#,
        )
        .unwrap();

        let manifest = WatershedManifest::discover(dir.path()).unwrap();
        assert_eq!(manifest.weight_low_res, dir.path().join("custom_weight_low.csv"));
    }
}
