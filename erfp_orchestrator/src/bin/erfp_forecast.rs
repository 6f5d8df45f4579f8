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

//! CLI entrypoint for one forecast cycle (spec.md §6 "CLI surface"). The orchestrator
//! itself is single-threaded at the top level (spec.md §5); parallelism lives in the
//! subprocess fanout C5 dispatches, so this binary runs on a single-threaded tokio
//! runtime rather than the default multi-threaded one.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use erfp_orchestrator::{Orchestrator, OrchestratorConfig};

#[derive(Parser, Debug)]
#[command(name = "erfp_forecast", about = "Runs one ensemble runoff forecast and routing cycle")]
struct Args {
    /// path to the external RAPID routing executable
    #[arg(long)]
    rapid_executable: PathBuf,

    /// root of the per-watershed input/output filesystem layout (spec.md §6)
    #[arg(long)]
    io_root: PathBuf,

    /// local directory ensemble runoff archives are staged/extracted into
    #[arg(long)]
    mirror_staging_dir: PathBuf,

    /// ERA-Interim directory consulted by the (out-of-scope) warning-point generator
    #[arg(long)]
    era_interim_dir: PathBuf,

    /// directory holding per-job scheduler logs, purged of entries older than 7 days
    #[arg(long)]
    scheduler_log_dir: PathBuf,

    /// directory holding the orchestrator's own logs, purged the same way
    #[arg(long)]
    main_log_dir: PathBuf,

    /// base URL of the artifact store
    #[arg(long)]
    artifact_store_url: String,

    /// bearer-style API key for the artifact store
    #[arg(long)]
    artifact_store_api_key: String,

    /// identifies this deployment instance in logs and uploads
    #[arg(long)]
    app_instance_id: String,

    /// re-derive rapid_connect/weight-table/namelist files before running
    #[arg(long)]
    sync_rapid_input: bool,

    /// pull new ensemble archives from the upstream FTP mirror before enumerating
    #[arg(long)]
    download_ecmwf: bool,

    /// upload each unit's CF-compliant output to the artifact store
    #[arg(long)]
    upload_output: bool,

    /// compute warm-start files once a cycle finishes
    #[arg(long)]
    initialize_flows: bool,

    /// generate warning points from routed output (out of scope, accepted for CLI parity)
    #[arg(long)]
    create_warning_points: bool,
}

impl From<Args> for OrchestratorConfig {
    fn from(args: Args) -> OrchestratorConfig {
        OrchestratorConfig {
            rapid_executable: args.rapid_executable,
            io_root: args.io_root,
            mirror_staging_dir: args.mirror_staging_dir,
            era_interim_dir: args.era_interim_dir,
            scheduler_log_dir: args.scheduler_log_dir,
            main_log_dir: args.main_log_dir,
            artifact_store_url: args.artifact_store_url,
            artifact_store_api_key: args.artifact_store_api_key,
            app_instance_id: args.app_instance_id,
            sync_rapid_input: args.sync_rapid_input,
            download_ecmwf: args.download_ecmwf,
            upload_output: args.upload_output,
            initialize_flows: args.initialize_flows,
            create_warning_points: args.create_warning_points,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    erfp_common::config::init_tracing();
    let args = Args::parse();
    let cfg: OrchestratorConfig = args.into();

    let orchestrator = Orchestrator::new(cfg);
    // zero iff every work unit reached a terminal state without an engine-level
    // error (spec.md §6) - per-unit routing/upload failures are not engine-level.
    let all_terminal = orchestrator.run().await?;

    Ok(if all_terminal { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
