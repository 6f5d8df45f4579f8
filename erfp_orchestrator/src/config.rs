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

//! the orchestrator's resolved configuration: one field per spec.md §6 "CLI surface"
//! parameter. The CLI binary (`src/bin/erfp_forecast.rs`) builds this from
//! `clap::Parser` args; tests and alternate front-ends can also load it from RON via
//! [`erfp_common::config::load_config`].

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub rapid_executable: PathBuf,
    pub io_root: PathBuf,
    pub mirror_staging_dir: PathBuf,
    pub era_interim_dir: PathBuf,
    pub scheduler_log_dir: PathBuf,
    pub main_log_dir: PathBuf,
    pub artifact_store_url: String,
    pub artifact_store_api_key: String,
    pub app_instance_id: String,

    pub sync_rapid_input: bool,
    pub download_ecmwf: bool,
    pub upload_output: bool,
    pub initialize_flows: bool,
    pub create_warning_points: bool,
}

impl OrchestratorConfig {
    /// age threshold past which scheduler/main log entries are purged before
    /// enumeration (spec.md §4.8 "Log hygiene").
    pub fn log_retention(&self) -> Duration {
        erfp_common::datetime::days(7)
    }
}
