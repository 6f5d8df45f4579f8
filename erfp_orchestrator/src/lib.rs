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

//! the job orchestrator (spec.md §4.8, C8): enumerates (forecast, watershed) work
//! units, drives each through the other `erfp_*` crates, and gates warm-start
//! computation on full-cycle completion.

pub mod config;
pub mod cycle;
pub mod errors;
pub mod orchestrator;
pub mod pipeline;
pub mod scheduler;
pub mod watershed;

pub use config::OrchestratorConfig;
pub use cycle::{CycleKey, WorkUnit, WorkUnitState};
pub use errors::{OrchestratorError, Result};
pub use orchestrator::Orchestrator;
