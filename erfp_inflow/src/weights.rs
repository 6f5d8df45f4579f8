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

//! reads a RAPID weight table and groups its rows by reach, the way
//! `CreateInflowFileFromECMWFRunoff.py` does it: column 0 is the reach id (its header
//! text becomes the output reach dimension name), columns 1-7 are a fixed schema, and
//! rows for the same reach are expected to be contiguous, `npoints` of them at a time.

use std::path::Path;

use crate::errors::{InflowError, Result};

/// the seven fixed weight-table columns after the reach id column (spec.md §4.1).
const CANONICAL_TAIL: [&str; 7] = ["area_sqm", "lon_index", "lat_index", "npoints", "weight", "lon", "lat"];

/// all rows belonging to one reach, in the order they appeared in the weight table.
#[derive(Debug, Clone)]
pub struct ReachGroup {
    pub reach_id: String,
    pub contributing_area_m2: Vec<f64>,
    pub lon_index: Vec<i64>,
    pub lat_index: Vec<i64>,
    pub weight: Vec<f64>,
}

impl ReachGroup {
    pub fn npoints(&self) -> usize {
        self.contributing_area_m2.len()
    }
}

#[derive(Debug, Clone)]
pub struct WeightTable {
    pub reach_dim_name: String,
    pub groups: Vec<ReachGroup>,
}

impl WeightTable {
    pub fn reach_count(&self) -> usize {
        self.groups.len()
    }

    /// global min/max lon_index and lat_index across every row, used to bound the
    /// runoff slab read (spec.md §4.3 Step A).
    pub fn index_bounds(&self) -> (i64, i64, i64, i64) {
        let mut min_lon = i64::MAX;
        let mut max_lon = i64::MIN;
        let mut min_lat = i64::MAX;
        let mut max_lat = i64::MIN;
        for g in &self.groups {
            for &lon in &g.lon_index {
                min_lon = min_lon.min(lon);
                max_lon = max_lon.max(lon);
            }
            for &lat in &g.lat_index {
                min_lat = min_lat.min(lat);
                max_lat = max_lat.max(lat);
            }
        }
        (min_lon, max_lon, min_lat, max_lat)
    }

    pub fn read(path: impl AsRef<Path>) -> Result<WeightTable> {
        let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path)?;
        let mut records = reader.records();

        let header = records
            .next()
            .ok_or_else(|| InflowError::BadHeader("weight table is empty".into()))??;
        if header.len() != 8 {
            return Err(InflowError::BadRowWidth(header.len()));
        }
        let reach_dim_name = header.get(0).unwrap().to_string();
        let tail: Vec<&str> = (1..8).map(|i| header.get(i).unwrap()).collect();
        if tail != CANONICAL_TAIL {
            return Err(InflowError::BadHeader(format!("{tail:?}")));
        }

        // flatten every row first, then walk it in npoints-sized chunks, mirroring the
        // pointer/npoints walk in CreateInflowFileFromECMWFRunoff.py.
        let mut reach_id: Vec<String> = Vec::new();
        let mut area: Vec<f64> = Vec::new();
        let mut lon_index: Vec<i64> = Vec::new();
        let mut lat_index: Vec<i64> = Vec::new();
        let mut npoints: Vec<usize> = Vec::new();
        let mut weight: Vec<f64> = Vec::new();

        for record in records {
            let record = record?;
            if record.len() != 8 {
                return Err(InflowError::BadRowWidth(record.len()));
            }
            let field = |i: usize| record.get(i).unwrap();
            reach_id.push(field(0).to_string());
            area.push(field(1).parse().map_err(|_| InflowError::InputSchemaError("bad area_sqm".into()))?);
            lon_index.push(field(2).parse().map_err(|_| InflowError::InputSchemaError("bad lon_index".into()))?);
            lat_index.push(field(3).parse().map_err(|_| InflowError::InputSchemaError("bad lat_index".into()))?);
            npoints.push(field(4).parse().map_err(|_| InflowError::InputSchemaError("bad npoints".into()))?);
            weight.push(field(5).parse().map_err(|_| InflowError::InputSchemaError("bad weight".into()))?);
        }

        let mut groups = Vec::new();
        let mut pointer = 0usize;
        while pointer < reach_id.len() {
            let n = npoints[pointer];
            if n == 0 || pointer + n > reach_id.len() {
                return Err(InflowError::GroupingInconsistent {
                    row: pointer,
                    expected: reach_id[pointer].clone(),
                    found: format!("npoints={n} overruns the table"),
                });
            }
            let slice = pointer..pointer + n;
            let distinct: std::collections::HashSet<&str> =
                reach_id[slice.clone()].iter().map(String::as_str).collect();
            if distinct.len() != 1 {
                return Err(InflowError::GroupingInconsistent {
                    row: pointer,
                    expected: reach_id[pointer].clone(),
                    found: format!("{distinct:?}"),
                });
            }
            groups.push(ReachGroup {
                reach_id: reach_id[pointer].clone(),
                contributing_area_m2: area[slice.clone()].to_vec(),
                lon_index: lon_index[slice.clone()].to_vec(),
                lat_index: lat_index[slice.clone()].to_vec(),
                weight: weight[slice].to_vec(),
            });
            pointer += n;
        }

        Ok(WeightTable { reach_dim_name, groups })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_table(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn groups_contiguous_rows_by_reach() {
        let f = write_table(
            "COMID,area_sqm,lon_index,lat_index,npoints,weight,lon,lat\n\
             101,1000.0,10,20,2,0.5,1.0,2.0\n\
             101,2000.0,11,20,2,0.5,1.1,2.0\n\
             202,500.0,12,21,1,1.0,1.2,2.1\n",
        );
        let wt = WeightTable::read(f.path()).unwrap();
        assert_eq!(wt.reach_dim_name, "COMID");
        assert_eq!(wt.reach_count(), 2);
        assert_eq!(wt.groups[0].npoints(), 2);
        assert_eq!(wt.groups[1].npoints(), 1);
        assert_eq!(wt.groups[1].reach_id, "202");
    }

    #[test]
    fn rejects_bad_header() {
        let f = write_table("COMID,wrong,lon_index,lat_index,npoints,weight,lon,lat\n101,1.0,1,1,1,1.0,1.0,1.0\n");
        assert!(WeightTable::read(f.path()).is_err());
    }

    #[test]
    fn rejects_noncontiguous_group() {
        let f = write_table(
            "COMID,area_sqm,lon_index,lat_index,npoints,weight,lon,lat\n\
             101,1000.0,10,20,2,0.5,1.0,2.0\n\
             202,2000.0,11,20,2,0.5,1.1,2.0\n",
        );
        assert!(WeightTable::read(f.path()).is_err());
    }
}
