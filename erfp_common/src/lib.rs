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
#![allow(unused)]

//! shared utilities for the erfp workspace: filesystem helpers, datetime helpers,
//! config loading and the forecast file/cycle identifiers that every other crate
//! in the workspace keys its state on.

pub mod fs;
pub mod datetime;
pub mod config;
pub mod forecast;
pub mod errors;

pub use errors::*;
