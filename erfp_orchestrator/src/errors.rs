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

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// unit-level errors this crate aggregates from every component crate (spec.md §7),
/// plus the orchestrator's own IO/config/discovery failures.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("IO error {0}")]
    IOError(#[from] std::io::Error),

    #[error("config error {0}")]
    ConfigError(#[from] ron::error::SpannedError),

    #[error("glob error {0}")]
    GlobError(#[from] glob::PatternError),

    #[error("csv error {0}")]
    CsvError(#[from] csv::Error),

    #[error(transparent)]
    Common(#[from] erfp_common::ErfpCommonError),

    #[error(transparent)]
    Inflow(#[from] erfp_inflow::InflowError),

    #[error(transparent)]
    Routing(#[from] erfp_routing::RoutingError),

    #[error(transparent)]
    Cf(#[from] erfp_cf::CfError),

    #[error(transparent)]
    Warmstart(#[from] erfp_warmstart::WarmstartError),

    #[error(transparent)]
    Ingest(#[from] erfp_ingest::IngestError),

    #[error(transparent)]
    Store(#[from] erfp_store::StoreError),

    #[error("task join error {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("operation failed {0}")]
    OpFailed(String),
}

pub fn op_failed(msg: impl ToString) -> OrchestratorError {
    OrchestratorError::OpFailed(msg.to_string())
}
