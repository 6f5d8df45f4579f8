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

//! small RON-based config loader. This is a deliberately lighter-weight re-expression of
//! `odin_build::define_load_config!` (see DESIGN.md): no build-time asset embedding, just
//! "read this RON file, or fall back to `T::default()` if it isn't there".

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::errors::Result;

pub fn load_config<C: DeserializeOwned>(path: impl AsRef<Path>) -> Result<C> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    Ok(ron::de::from_str(&text)?)
}

pub fn load_config_or_default<C: DeserializeOwned + Default>(path: Option<impl AsRef<Path>>) -> C {
    match path {
        Some(p) => load_config(p).unwrap_or_else(|e| {
            tracing::warn!("failed to load config ({e}), using defaults");
            C::default()
        }),
        None => C::default(),
    }
}

/// initialize the `tracing` subscriber from `RUST_LOG` (or `info` if unset). Every binary in
/// the workspace calls this once at the top of `main`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
