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

//! turns a validated runoff file plus a weight table into a RAPID inflow file:
//! bound the slab read to the indices the weight table actually references,
//! reindex each reach's contributing cells out of that slab, decumulate the
//! (cumulative) runoff variable into per-step increments, area-weight and sum per
//! reach. Grounded on `CreateInflowFileFromECMWFRunoff.py`'s `execute()`.

use std::path::Path;

use ndarray::{s, Array1, Array2};

use erfp_common::forecast::{Cadence, EnsembleRegime};

use crate::errors::{InflowError, Result};
use crate::runoff::RunoffFile;
use crate::weights::WeightTable;

pub struct InflowBuilder<'a> {
    pub weights: &'a WeightTable,
    pub runoff: &'a RunoffFile,
}

impl<'a> InflowBuilder<'a> {
    pub fn new(weights: &'a WeightTable, runoff: &'a RunoffFile) -> Self {
        InflowBuilder { weights, runoff }
    }

    /// builds the inflow time series for every reach and writes the NetCDF classic
    /// inflow file at `out_path` (spec.md §4.3).
    pub fn build(&self, out_path: impl AsRef<Path>) -> Result<()> {
        let (min_lon, max_lon, min_lat, max_lat) = self.weights.index_bounds();
        let (n_time, n_lat, n_lon, flat) = self.runoff.read_subset(
            min_lat as usize,
            max_lat as usize,
            min_lon as usize,
            max_lon as usize,
        )?;
        if n_time != self.runoff.regime.t_in() {
            return Err(InflowError::InputSchemaError(format!(
                "read {n_time} time steps, expected {}",
                self.runoff.regime.t_in()
            )));
        }
        let subset = ndarray::Array3::from_shape_vec((n_time, n_lat, n_lon), flat)
            .map_err(|e| InflowError::OpFailed(e.to_string()))?;

        let t_out = self.runoff.regime.t_out();
        let n_reach = self.weights.reach_count();
        let mut data_temp = Array2::<f32>::zeros((t_out, n_reach));

        for (s_idx, group) in self.weights.groups.iter().enumerate() {
            let npoints = group.npoints();
            let mut data_goal = Array2::<f64>::zeros((n_time, npoints));
            for (k, (&lon_idx, &lat_idx)) in group.lon_index.iter().zip(group.lat_index.iter()).enumerate() {
                let lon_off = (lon_idx - min_lon) as usize;
                let lat_off = (lat_idx - min_lat) as usize;
                for t in 0..n_time {
                    data_goal[[t, k]] = subset[[t, lat_off, lon_off]];
                }
            }

            let ro_stream = decumulate(&data_goal, self.runoff.regime)?;
            debug_assert_eq!(ro_stream.shape()[0], t_out);

            let area = Array1::from_vec(group.contributing_area_m2.clone());
            let weighted = &ro_stream * &area.insert_axis(ndarray::Axis(0));
            let summed = weighted.sum_axis(ndarray::Axis(1));

            for t in 0..t_out {
                data_temp[[t, s_idx]] = summed[t] as f32;
            }
        }

        write_inflow_file(out_path, &self.weights.reach_dim_name, &data_temp)
    }
}

/// cumulative-to-incremental conversion of a `(time, npoints)` slab, per regime and
/// (for the high-res regime) output cadence. Mirrors the exact slice arithmetic of
/// `CreateInflowFileFromECMWFRunoff.py`'s `execute()`.
fn decumulate(data_goal: &Array2<f64>, regime: EnsembleRegime) -> Result<Array2<f64>> {
    let rows: Vec<Array2<f64>> = match regime {
        EnsembleRegime::LowRes => vec![
            data_goal.slice(s![0..1, ..]).to_owned(),
            &data_goal.slice(s![1.., ..]) - &data_goal.slice(s![..-1, ..]),
        ],
        EnsembleRegime::HighRes(Cadence::H1) => vec![
            data_goal.slice(s![0..1, ..]).to_owned(),
            &data_goal.slice(s![1..91, ..]) - &data_goal.slice(s![0..90, ..]),
        ],
        EnsembleRegime::HighRes(Cadence::H3) => vec![
            data_goal.slice(s![0..1, ..]).to_owned(),
            &data_goal.slice(s![3..91;3, ..]) - &data_goal.slice(s![0..88;3, ..]),
            &data_goal.slice(s![91..109, ..]) - &data_goal.slice(s![90..108, ..]),
        ],
        EnsembleRegime::HighRes(Cadence::H6) => vec![
            data_goal.slice(s![0..1, ..]).to_owned(),
            &data_goal.slice(s![6..91;6, ..]) - &data_goal.slice(s![0..85;6, ..]),
            &data_goal.slice(s![92..109;2, ..]) - &data_goal.slice(s![90..107;2, ..]),
            &data_goal.slice(s![109.., ..]) - &data_goal.slice(s![108..124, ..]),
        ],
    };

    let views: Vec<_> = rows.iter().map(|r| r.view()).collect();
    ndarray::concatenate(ndarray::Axis(0), &views).map_err(|e| InflowError::OpFailed(e.to_string()))
}

fn write_inflow_file(out_path: impl AsRef<Path>, reach_dim_name: &str, data: &Array2<f32>) -> Result<()> {
    let out_path = out_path.as_ref();
    let dir = out_path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::NamedTempFile::new_in(dir)?;

    {
        // no group hierarchy, no chunking/compression: a flat classic-style layout,
        // same as the RAPID inflow files this produces historically.
        let mut file = netcdf::create(tmp.path())?;
        let (t_out, n_reach) = (data.shape()[0], data.shape()[1]);
        file.add_dimension("Time", t_out)?;
        file.add_dimension(reach_dim_name, n_reach)?;
        let mut var = file.add_variable::<f32>("m3_riv", &["Time", reach_dim_name])?;
        let flat: Vec<f32> = data.iter().copied().collect();
        var.put_values(&flat, ..)?;
    }

    tmp.persist(out_path).map_err(|e| InflowError::OpFailed(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowres_decumulation_matches_reference_slices() {
        // 3 timesteps, 1 point: cumulative [10, 25, 33] -> incremental [10, 15, 8]
        let data = Array2::from_shape_vec((3, 1), vec![10.0, 25.0, 33.0]).unwrap();
        let out = decumulate(&data, EnsembleRegime::LowRes).unwrap();
        assert_eq!(out.shape(), &[3, 1]);
        assert_eq!(out.column(0).to_vec(), vec![10.0, 15.0, 8.0]);
    }

    #[test]
    fn highres_h6_decumulation_has_expected_length() {
        let data = Array2::<f64>::zeros((125, 1));
        let out = decumulate(&data, EnsembleRegime::HighRes(Cadence::H6)).unwrap();
        assert_eq!(out.shape()[0], 41);
    }

    #[test]
    fn highres_h3_decumulation_has_expected_length() {
        let data = Array2::<f64>::zeros((125, 1));
        let out = decumulate(&data, EnsembleRegime::HighRes(Cadence::H3)).unwrap();
        assert_eq!(out.shape()[0], 49);
    }

    #[test]
    fn highres_h1_decumulation_has_expected_length() {
        let data = Array2::<f64>::zeros((125, 1));
        let out = decumulate(&data, EnsembleRegime::HighRes(Cadence::H1)).unwrap();
        assert_eq!(out.shape()[0], 91);
    }
}
