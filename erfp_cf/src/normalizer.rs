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

//! rewrites a raw RAPID `Qout` file into a CF-1.6 / NODC timeSeries-Orthogonal
//! compliant file: `(reach, time)` instead of `(time, reach)`, an epoch time axis,
//! and per-reach lat/lon/z plus a dummy `crs` variable. Grounded on
//! `make_CF_RAPID_output.py`'s `initialize_output` / `write_comid_lat_lon_z` /
//! `convert_ecmwf_rapid_output_to_cf_compliant`.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::errors::{CfError, Result};

#[derive(Debug, Clone)]
pub struct CfConfig {
    pub time_step_seconds: i64,
    pub input_flow_var: String,
    pub output_id_dim: String,
    pub output_flow_var: String,
}

impl Default for CfConfig {
    fn default() -> CfConfig {
        CfConfig {
            time_step_seconds: 6 * 60 * 60,
            input_flow_var: "Qout".to_string(),
            output_id_dim: "COMID".to_string(),
            output_flow_var: "Qout".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BBox {
    lat_min: Option<f64>,
    lat_max: Option<f64>,
    lon_min: Option<f64>,
    lon_max: Option<f64>,
    z_min: Option<f64>,
    z_max: Option<f64>,
}

impl BBox {
    fn observe_lat(&mut self, v: f64) {
        self.lat_min = Some(self.lat_min.map_or(v, |m| m.min(v)));
        self.lat_max = Some(self.lat_max.map_or(v, |m| m.max(v)));
    }
    fn observe_lon(&mut self, v: f64) {
        self.lon_min = Some(self.lon_min.map_or(v, |m| m.min(v)));
        self.lon_max = Some(self.lon_max.map_or(v, |m| m.max(v)));
    }
    fn observe_z(&mut self, v: f64) {
        self.z_min = Some(self.z_min.map_or(v, |m| m.min(v)));
        self.z_max = Some(self.z_max.map_or(v, |m| m.max(v)));
    }
}

/// creates the CF skeleton (dimensions, variables, and every global/variable
/// attribute) with no data written yet, at `path`.
fn initialize_output(
    path: impl AsRef<Path>,
    reach_dim_name: &str,
    cfg: &CfConfig,
    time_len: usize,
    id_len: usize,
) -> Result<netcdf::FileMut> {
    let mut file = netcdf::create(path.as_ref())?;

    file.add_dimension("time", time_len)?;
    file.add_dimension(reach_dim_name, id_len)?;

    let mut id_var = file.add_variable::<i32>(&cfg.output_id_dim, &[reach_dim_name])?;
    id_var.put_attribute("long_name", "Unique identifier for each river reach feature")?;
    id_var.put_attribute("cf_role", "timeseries_id")?;

    let mut time_var = file.add_variable::<i32>("time", &["time"])?;
    time_var.put_attribute("long_name", "time")?;
    time_var.put_attribute("standard_name", "time")?;
    time_var.put_attribute("units", "seconds since 1970-01-01 00:00:00 0:00")?;
    time_var.put_attribute("axis", "T")?;

    let mut lat_var = file.add_variable::<f64>("lat", &[reach_dim_name])?;
    lat_var.put_attribute("long_name", "latitude")?;
    lat_var.put_attribute("standard_name", "latitude")?;
    lat_var.put_attribute("units", "degrees_north")?;
    lat_var.put_attribute("axis", "Y")?;
    lat_var.put_attribute("_FillValue", -9999.0_f64)?;

    let mut lon_var = file.add_variable::<f64>("lon", &[reach_dim_name])?;
    lon_var.put_attribute("long_name", "longitude")?;
    lon_var.put_attribute("standard_name", "longitude")?;
    lon_var.put_attribute("units", "degrees_east")?;
    lon_var.put_attribute("axis", "X")?;
    lon_var.put_attribute("_FillValue", -9999.0_f64)?;

    let mut z_var = file.add_variable::<f64>("z", &[reach_dim_name])?;
    z_var.put_attribute("long_name", "Elevation referenced to the North American Vertical Datum of 1988 (NAVD88)")?;
    z_var.put_attribute("standard_name", "surface_altitude")?;
    z_var.put_attribute("units", "m")?;
    z_var.put_attribute("axis", "Z")?;
    z_var.put_attribute("positive", "up")?;
    z_var.put_attribute("_FillValue", -9999.0_f64)?;

    let mut q_var = file.add_variable::<f32>(&cfg.output_flow_var, &[reach_dim_name, "time"])?;
    q_var.put_attribute("long_name", "Discharge")?;
    q_var.put_attribute("units", "m^3/s")?;
    q_var.put_attribute("coordinates", "time lat lon z")?;
    q_var.put_attribute("grid_mapping", "crs")?;
    q_var.put_attribute(
        "source",
        "Generated by the Routing Application for Parallel computatIon of Discharge (RAPID) river routing model.",
    )?;
    q_var.put_attribute("references", "http://rapid-hub.org/")?;
    q_var.put_attribute("comment", "lat, lon, and z values taken at midpoint of river reach feature")?;

    let mut crs_var = file.add_variable::<i32>("crs", &[] as &[&str])?;
    crs_var.put_attribute("grid_mapping_name", "latitude_longitude")?;
    crs_var.put_attribute("epsg_code", "EPSG:4269")?;
    crs_var.put_attribute("semi_major_axis", 6378137.0_f64)?;
    crs_var.put_attribute("inverse_flattening", 298.257222101_f64)?;

    file.add_attribute("featureType", "timeSeries")?;
    file.add_attribute("Metadata_Conventions", "Unidata Dataset Discovery v1.0")?;
    file.add_attribute("Conventions", "CF-1.6")?;
    file.add_attribute("cdm_data_type", "Station")?;
    file.add_attribute("nodc_template_version", "NODC_NetCDF_TimeSeries_Orthogonal_Template_v1.1")?;
    file.add_attribute(
        "standard_name_vocabulary",
        "NetCDF Climate and Forecast (CF) Metadata Convention Standard Name Table v28",
    )?;
    file.add_attribute("title", "RAPID Result")?;
    file.add_attribute(
        "summary",
        "Results of RAPID river routing simulation. Each river reach (i.e., feature) is \
         represented by a point feature at its midpoint, identified by its unique reach identifier.",
    )?;
    file.add_attribute("time_coverage_resolution", "point")?;
    file.add_attribute("comment", format!("Result time step (seconds): {}", cfg.time_step_seconds))?;
    file.add_attribute("date_created", Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string())?;
    file.add_attribute(
        "history",
        format!("{}: converted to CF-1.6 timeSeries format", Utc::now().format("%Y-%m-%dT%H:%M:%SZ")),
    )?;

    Ok(file)
}

/// populates `id_var_name`/lat/lon/z from a `reach_id,lat,lon,elev_m` lookup CSV, and
/// returns the geospatial bounding box observed.
fn write_reach_lat_lon_z(file: &mut netcdf::FileMut, lookup_path: impl AsRef<Path>, id_var_name: &str, id_len: usize) -> Result<BBox> {
    let lookup_path = lookup_path.as_ref();
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(lookup_path)?;

    let mut ids: Vec<i32> = Vec::with_capacity(id_len);
    let mut lats: Vec<f64> = Vec::with_capacity(id_len);
    let mut lons: Vec<f64> = Vec::with_capacity(id_len);
    let mut zs: Vec<f64> = Vec::with_capacity(id_len);
    let mut bbox = BBox::default();

    for record in reader.records() {
        let record = record?;
        let id: i32 = record.get(0).unwrap_or_default().parse().unwrap_or_default();
        let lat: f64 = record.get(1).unwrap_or_default().parse().unwrap_or_default();
        let lon: f64 = record.get(2).unwrap_or_default().parse().unwrap_or_default();
        let z: f64 = record.get(3).unwrap_or_default().parse().unwrap_or_default();
        bbox.observe_lat(lat);
        bbox.observe_lon(lon);
        bbox.observe_z(z);
        ids.push(id);
        lats.push(lat);
        lons.push(lon);
        zs.push(z);
    }

    if ids.len() != id_len {
        return Err(CfError::LookupMismatch { path: lookup_path.to_path_buf(), found: ids.len(), expected: id_len });
    }

    file.variable_mut(id_var_name).unwrap().put_values(&ids, ..)?;
    file.variable_mut("lat").unwrap().put_values(&lats, ..)?;
    file.variable_mut("lon").unwrap().put_values(&lons, ..)?;
    file.variable_mut("z").unwrap().put_values(&zs, ..)?;

    Ok(bbox)
}

/// rewrites `rapid_nc_path` in place: reads `(time, reach)` flow data, writes a
/// CF-compliant `(reach, time)` file, then atomically replaces the original.
pub fn convert_to_cf_compliant(
    rapid_nc_path: impl AsRef<Path>,
    lookup_csv_path: impl AsRef<Path>,
    reach_dim_name: &str,
    start_date: DateTime<Utc>,
    cfg: &CfConfig,
) -> Result<()> {
    let rapid_nc_path = rapid_nc_path.as_ref();

    let (time_len, id_len, flow_time_major) = {
        let rapid_nc = netcdf::open(rapid_nc_path)?;
        let time_len = rapid_nc
            .dimension("Time")
            .ok_or_else(|| CfError::OpFailed("missing dimension 'Time'".into()))?
            .len();
        let id_len = rapid_nc
            .dimension(reach_dim_name)
            .ok_or_else(|| CfError::OpFailed(format!("missing dimension '{reach_dim_name}'")))?
            .len();
        let flow_var = rapid_nc
            .variable(&cfg.input_flow_var)
            .ok_or_else(|| CfError::OpFailed(format!("missing variable '{}'", cfg.input_flow_var)))?;
        let flow: ndarray::Array2<f32> = flow_var.get_values(..)?;
        (time_len, id_len, flow)
    };

    let dir = rapid_nc_path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::NamedTempFile::new_in(dir)?;

    {
        let mut out = initialize_output(tmp.path(), reach_dim_name, cfg, time_len, id_len)?;

        // transpose (Time, reach) -> (reach, Time), matching NODC's dimension order
        let transposed = flow_time_major.t().to_owned();
        let flat: Vec<f32> = transposed.iter().copied().collect();
        out.variable_mut(&cfg.output_flow_var).unwrap().put_values(&flat, ..)?;

        let total_seconds = cfg.time_step_seconds * time_len as i64;
        let secs_start = start_date.timestamp();
        let time_values: Vec<i32> = (0..time_len as i64)
            .map(|i| (secs_start + i * cfg.time_step_seconds) as i32)
            .collect();
        out.variable_mut("time").unwrap().put_values(&time_values, ..)?;

        let bbox = write_reach_lat_lon_z(&mut out, lookup_csv_path, &cfg.output_id_dim, id_len)?;

        let end_date = start_date + chrono::Duration::seconds(total_seconds - cfg.time_step_seconds);
        out.add_attribute("time_coverage_start", start_date.format("%Y-%m-%dT%H:%M:%SZ").to_string())?;
        out.add_attribute("time_coverage_end", end_date.format("%Y-%m-%dT%H:%M:%SZ").to_string())?;
        out.add_attribute("geospatial_lat_min", bbox.lat_min.unwrap_or(0.0))?;
        out.add_attribute("geospatial_lat_max", bbox.lat_max.unwrap_or(0.0))?;
        out.add_attribute("geospatial_lon_min", bbox.lon_min.unwrap_or(0.0))?;
        out.add_attribute("geospatial_lon_max", bbox.lon_max.unwrap_or(0.0))?;
        out.add_attribute("geospatial_vertical_min", bbox.z_min.unwrap_or(0.0))?;
        out.add_attribute("geospatial_vertical_max", bbox.z_max.unwrap_or(0.0))?;
    }

    tmp.persist(rapid_nc_path).map_err(|e| CfError::OpFailed(e.to_string()))?;
    tracing::info!(?rapid_nc_path, "wrote CF-compliant output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_tracks_min_max_across_observations() {
        let mut bbox = BBox::default();
        bbox.observe_lat(10.0);
        bbox.observe_lat(-5.0);
        bbox.observe_lat(3.0);
        assert_eq!(bbox.lat_min, Some(-5.0));
        assert_eq!(bbox.lat_max, Some(10.0));
    }
}
