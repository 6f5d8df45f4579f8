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

//! weight-table reading, runoff validation, and the cumulative-to-incremental
//! inflow builder (spec.md §4.1-§4.3).

pub mod builder;
pub mod errors;
pub mod runoff;
pub mod weights;

pub use builder::InflowBuilder;
pub use errors::{InflowError, Result};
pub use runoff::RunoffFile;
pub use weights::{ReachGroup, WeightTable};
