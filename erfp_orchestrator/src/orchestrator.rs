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

//! the top-level driver: enumerate work units, submit-all-then-wait-all (spec.md §5),
//! postprocess each as it completes, and trigger warm-start once every unit of a
//! cycle reaches a terminal state (spec.md §4.8, §9 "Cyclic or back-referential
//! file-dependency graph"). Grounded on `rapid_process_async_ubuntu.py`'s
//! `generate_rapid_submission_command_list` / wait-all loop / `ftp_directory_deletion`
//! upload-and-clean pattern.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use erfp_common::datetime::issue_instant;
use erfp_common::fs::{case_insensitive_file_search, ensure_writable_dir, remove_old_files};
use erfp_common::forecast::ForecastFileName;
use erfp_cf::CfConfig;
use erfp_ingest::{FtpGatewayConfig, IngestionGateway};
use erfp_routing::RouterDriver;
use erfp_store::{ArtifactStoreClient, ResourceKey};
use erfp_warmstart::InitFlowPropagator;

use crate::config::OrchestratorConfig;
use crate::cycle::{CycleKey, WorkUnit, WorkUnitState};
use crate::errors::{OrchestratorError, Result};
use crate::pipeline::{self, expected_warmstart_file};
use crate::scheduler::{BatchScheduler, JobSpec, LocalProcessScheduler};
use crate::watershed::{discover_watersheds, WatershedManifest};

/// per-cycle bookkeeping: how many units this cycle has, how many have reached a
/// terminal state, and the output paths of the ones that finished cleanly (these feed
/// C7 once the cycle is done).
struct CycleProgress {
    total: usize,
    terminal: usize,
    uploaded_member_paths: Vec<PathBuf>,
}

impl CycleProgress {
    fn new(total: usize) -> CycleProgress {
        CycleProgress { total, terminal: 0, uploaded_member_paths: Vec::new() }
    }

    fn record_terminal(&mut self, path: Option<PathBuf>) {
        self.terminal += 1;
        if let Some(p) = path {
            self.uploaded_member_paths.push(p);
        }
    }

    fn is_complete(&self) -> bool {
        self.terminal >= self.total
    }
}

/// scans every entry under `mirror_staging_dir` (whatever [`IngestionGateway::sync`]
/// extracted, or pre-existing directories) for files whose name parses as a forecast
/// member, returning them sorted largest-first (spec.md §4.8 "Enumeration order").
pub fn discover_forecast_files(mirror_staging_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut sized: Vec<(u64, PathBuf)> = Vec::new();
    if !mirror_staging_dir.is_dir() {
        return Ok(Vec::new());
    }
    for entry in walk_files(mirror_staging_dir)? {
        if ForecastFileName::try_from(entry.as_path()).is_ok() {
            let size = std::fs::metadata(&entry).map(|m| m.len()).unwrap_or(0);
            sized.push((size, entry));
        }
    }
    sized.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(sized.into_iter().map(|(_, p)| p).collect())
}

fn walk_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            out.extend(walk_files(&path)?);
        } else {
            out.push(path);
        }
    }
    Ok(out)
}

/// the Cartesian product of (forecasts, sorted descending by size) x watersheds
/// (spec.md §4.8 "Enumeration order").
pub fn enumerate_work_units(forecast_files: &[PathBuf], watersheds: &[(String, String)]) -> Vec<WorkUnit> {
    let mut units = Vec::new();
    let mut seq = 0usize;
    for path in forecast_files {
        let forecast = match ForecastFileName::try_from(path.as_path()) {
            Ok(f) => f,
            Err(_) => continue,
        };
        for (watershed, subbasin) in watersheds {
            units.push(WorkUnit {
                forecast_path: path.clone(),
                forecast: forecast.clone(),
                watershed: watershed.clone(),
                subbasin: subbasin.clone(),
                seq,
            });
            seq += 1;
        }
    }
    units
}

fn read_connectivity_reach_ids(rapid_connect_path: &Path) -> Result<Vec<i64>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(rapid_connect_path)?;
    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(first) = record.get(0) {
            if let Ok(id) = first.parse::<i64>() {
                ids.push(id);
            }
        }
    }
    Ok(ids)
}

pub struct Orchestrator {
    cfg: OrchestratorConfig,
    scheduler: LocalProcessScheduler,
    store: Option<ArtifactStoreClient>,
}

impl Orchestrator {
    pub fn new(cfg: OrchestratorConfig) -> Orchestrator {
        let driver = RouterDriver::new(cfg.rapid_executable.clone());
        let scheduler = LocalProcessScheduler::new(driver);
        let store = cfg.upload_output.then(|| ArtifactStoreClient::new(cfg.artifact_store_url.clone(), cfg.artifact_store_api_key.clone()));
        Orchestrator { cfg, scheduler, store }
    }

    /// runs one full cycle of the pipeline. Returns `true` iff every work unit reached
    /// a terminal state without an engine-level error (spec.md §6 "Exit code zero
    /// iff...").
    pub async fn run(&self) -> Result<bool> {
        remove_old_files(&self.cfg.scheduler_log_dir, self.cfg.log_retention())?;
        remove_old_files(&self.cfg.main_log_dir, self.cfg.log_retention())?;

        if self.cfg.download_ecmwf {
            let gateway = IngestionGateway::new(FtpGatewayConfig::default());
            gateway.sync(&self.cfg.mirror_staging_dir, "Runoff.*.netcdf.tar.gz").await?;
        }

        let forecast_files = discover_forecast_files(&self.cfg.mirror_staging_dir)?;
        let watersheds = discover_watersheds(&self.cfg.io_root)?;
        let units = enumerate_work_units(&forecast_files, &watersheds);
        tracing::info!(n_units = units.len(), n_forecasts = forecast_files.len(), n_watersheds = watersheds.len(), "enumerated work units");

        let mut progress: HashMap<CycleKey, CycleProgress> = HashMap::new();
        for unit in &units {
            progress.entry(unit.cycle_key()).or_insert_with(|| CycleProgress::new(0)).total += 1;
        }

        // register each cycle with the artifact store before any unit of it uploads
        // (spec.md §1 "initialize a run"); best-effort, since a registration failure
        // here should not stop routing from proceeding.
        if let Some(store) = &self.store {
            for key in progress.keys() {
                let timestep = format!("{}.{:02}", key.issue_date.format("%Y%m%d"), key.issue_hour);
                if let Err(e) = store.initialize_run(&key.watershed, &timestep).await {
                    tracing::warn!(cycle = %key, error = %e, "failed to initialize run with artifact store");
                }
            }
        }

        let mut manifests: HashMap<(String, String), WatershedManifest> = HashMap::new();

        // phase 1: prepare (C1-C4) and submit (C5 enqueue) every unit, sequentially.
        let mut in_flight: Vec<(WorkUnit, Option<pipeline::PreparedUnit>, Option<crate::scheduler::JobHandle>, String)> = Vec::new();
        for unit in units {
            let watershed_key = (unit.watershed.clone(), unit.subbasin.clone());
            let watershed_input_dir = unit.input_dir(&self.cfg.io_root);

            let manifest = if let Some(m) = manifests.get(&watershed_key) {
                m.clone()
            } else {
                match WatershedManifest::discover(&watershed_input_dir) {
                    Ok(m) => {
                        manifests.insert(watershed_key.clone(), m.clone());
                        m
                    }
                    Err(e) => {
                        tracing::error!(job_id = %unit.job_id(), error = %e, "watershed manifest unavailable, unit failed");
                        progress.get_mut(&unit.cycle_key()).unwrap().record_terminal(None);
                        continue;
                    }
                }
            };

            let issue = issue_instant(unit.forecast.issue_date, unit.forecast.issue_hour)
                .ok_or_else(|| OrchestratorError::OpFailed("invalid issue instant".into()))?;
            let warmstart_file = self
                .cfg
                .initialize_flows
                .then(|| expected_warmstart_file(&watershed_input_dir, &unit.watershed, &unit.subbasin, issue))
                .flatten();

            let node_path = self.cfg.io_root.join("work").join(unit.job_id());
            let reach_dim_name = match erfp_inflow::WeightTable::read(manifest.weight_table_for(&unit)) {
                Ok(wt) => wt.reach_dim_name.clone(),
                Err(e) => {
                    tracing::error!(job_id = %unit.job_id(), error = %e, "weight table unreadable, unit failed");
                    progress.get_mut(&unit.cycle_key()).unwrap().record_terminal(None);
                    continue;
                }
            };

            match pipeline::prepare_unit(&unit, &manifest, &watershed_input_dir, &node_path, warmstart_file) {
                Ok(prepared) => {
                    let spec = JobSpec {
                        job_id: unit.job_id(),
                        node_path: prepared.node_path.clone(),
                        namelist_file: prepared.namelist_file.clone(),
                    };
                    match self.scheduler.submit(spec).await {
                        Ok(handle) => in_flight.push((unit, Some(prepared), Some(handle), reach_dim_name)),
                        Err(e) => {
                            tracing::error!(job_id = %unit.job_id(), error = %e, "submission failed, unit failed");
                            progress.get_mut(&unit.cycle_key()).unwrap().record_terminal(None);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(job_id = %unit.job_id(), error = %e, "prepare (C1-C4) failed, unit failed");
                    progress.get_mut(&unit.cycle_key()).unwrap().record_terminal(None);
                }
            }
        }

        // phase 2: wait (C5 completion) then C6 + C10, sequentially in submission order.
        // a per-unit routing/upload failure is recorded as that unit's terminal state
        // (FAILED -> SKIPPED, spec.md §4.8) and does not by itself fail the run - the
        // exit code only reflects engine-level errors (spec.md §6, §8 scenario 5).
        for (unit, prepared, handle, reach_dim_name) in in_flight {
            let prepared = prepared.expect("prepared is Some whenever a handle was submitted");
            let handle = handle.expect("handle is Some whenever prepare succeeded");

            let state = match self.scheduler.wait(handle).await {
                Ok(()) => self.postprocess_unit(&unit, &prepared, &reach_dim_name).await,
                Err(e) => {
                    tracing::warn!(job_id = %unit.job_id(), error = %e, "routing failed");
                    Err(e)
                }
            };

            let final_path = match state {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!(job_id = %unit.job_id(), error = %e, "unit failed, skipping");
                    None
                }
            };
            progress.get_mut(&unit.cycle_key()).unwrap().record_terminal(final_path);
        }

        // warm-start: only for cycles where every unit is now terminal (spec.md §4.8
        // "Warm-start gating"). A warm-start failure is an engine-level error, unlike a
        // per-unit routing/upload failure, so it does affect the exit code.
        let mut warmstart_clean = true;
        if self.cfg.initialize_flows {
            for (key, prog) in &progress {
                if !prog.is_complete() || prog.uploaded_member_paths.is_empty() {
                    continue;
                }
                if let Err(e) = self.propagate_warmstart(key, &prog.uploaded_member_paths).await {
                    tracing::error!(cycle = %key, error = %e, "warm-start propagation failed");
                    warmstart_clean = false;
                }
            }
        }

        // exit code zero iff every work unit reached a terminal (uploaded or skipped)
        // state, regardless of per-unit failures (spec.md §6, §8 scenario 5).
        let all_terminal = progress.values().all(|p| p.is_complete());
        Ok(all_terminal && warmstart_clean)
    }

    /// C6 (CF-normalize in place) then moves the file to its public output location,
    /// then C10 (upload, one retry). Returns the final output path iff the unit
    /// reached `UPLOADED` (or, with uploads disabled, `COMPLETED`).
    async fn postprocess_unit(&self, unit: &WorkUnit, prepared: &pipeline::PreparedUnit, reach_dim_name: &str) -> Result<PathBuf> {
        let watershed_input_dir = unit.input_dir(&self.cfg.io_root);
        let manifest = WatershedManifest::discover(&watershed_input_dir)?;

        let issue = issue_instant(unit.forecast.issue_date, unit.forecast.issue_hour)
            .ok_or_else(|| OrchestratorError::OpFailed("invalid issue instant".into()))?;

        erfp_cf::convert_to_cf_compliant(&prepared.qout_file, &manifest.comid_lat_lon_z, reach_dim_name, issue, &CfConfig::default())?;

        let final_path = unit.output_path(&self.cfg.io_root);
        ensure_writable_dir(final_path.parent().unwrap())?;
        std::fs::rename(&prepared.qout_file, &final_path)?;

        if let Some(store) = &self.store {
            let key = ResourceKey {
                watershed: unit.watershed.clone(),
                subbasin: unit.subbasin.clone(),
                issue_date_timestep: unit.forecast.forecast_date_timestep(),
                ensemble_number: unit.forecast.ensemble_number,
            };
            match store.upload_resource(&key, &final_path).await {
                Ok(true) => {}
                _ => return Err(OrchestratorError::OpFailed(format!("upload failed for {}", key.logical_name()))),
            }
        }

        Ok(final_path)
    }

    async fn propagate_warmstart(&self, key: &CycleKey, member_paths: &[PathBuf]) -> Result<()> {
        let watershed_input_dir = self.cfg.io_root.join("input").join(format!("{}-{}", key.watershed, key.subbasin));
        let rapid_connect = case_insensitive_file_search(&watershed_input_dir, r"rapid_connect\.csv")?;
        let reach_ids = read_connectivity_reach_ids(&rapid_connect)?;

        let issue = issue_instant(key.issue_date, key.issue_hour)
            .ok_or_else(|| OrchestratorError::OpFailed("invalid issue instant".into()))?;
        let next_issue = issue + chrono::Duration::hours(12);

        let propagator = InitFlowPropagator::default();
        propagator.propagate(
            member_paths,
            &CfConfig::default().output_flow_var,
            &reach_ids,
            &watershed_input_dir,
            &key.watershed,
            &key.subbasin,
            next_issue,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn forecast(ensemble: u32) -> ForecastFileName {
        ForecastFileName {
            issue_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            issue_hour: 12,
            ensemble_number: ensemble,
        }
    }

    #[test]
    fn enumerate_produces_cartesian_product_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let f1 = dir.path().join("Runoff.20260115.12.1.runoff.netcdf");
        let f2 = dir.path().join("Runoff.20260115.12.2.runoff.netcdf");
        std::fs::write(&f1, "x").unwrap();
        std::fs::write(&f2, "x").unwrap();

        let watersheds = vec![("nfie".to_string(), "gulf".to_string()), ("nfie".to_string(), "south_atlantic".to_string())];
        let units = enumerate_work_units(&[f1.clone(), f2.clone()], &watersheds);
        assert_eq!(units.len(), 4);
        assert_eq!(units[0].forecast.ensemble_number, 1);
        assert_eq!(units[0].watershed, "nfie");
        assert_eq!(units[2].forecast.ensemble_number, 2);
    }

    #[test]
    fn discover_forecast_files_sorts_by_size_descending() {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("Runoff.20260115.12.1.runoff.netcdf");
        let big = dir.path().join("Runoff.20260115.12.2.runoff.netcdf");
        std::fs::write(&small, vec![0u8; 10]).unwrap();
        std::fs::write(&big, vec![0u8; 1000]).unwrap();

        let found = discover_forecast_files(dir.path()).unwrap();
        assert_eq!(found[0], big);
        assert_eq!(found[1], small);
    }

    #[test]
    fn cycle_progress_completes_only_once_every_unit_is_terminal() {
        let _ = forecast(1);
        let mut prog = CycleProgress::new(3);
        assert!(!prog.is_complete());
        prog.record_terminal(Some(PathBuf::from("/a")));
        prog.record_terminal(None);
        assert!(!prog.is_complete());
        prog.record_terminal(Some(PathBuf::from("/b")));
        assert!(prog.is_complete());
        assert_eq!(prog.uploaded_member_paths.len(), 2);
    }
}
