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

//! a deliberately opaque client for the external artifact/dataset store (spec.md
//! §4.10): two calls in, a boolean success out. The endpoint's actual API shape is
//! outside this spec's scope, so this models only the contract C8 depends on.

use std::path::Path;

use reqwest::Client;

use crate::errors::Result;

/// identifies one uploaded artifact in terms C8 already tracks (spec.md §3).
#[derive(Debug, Clone)]
pub struct ResourceKey {
    pub watershed: String,
    pub subbasin: String,
    pub issue_date_timestep: String,
    pub ensemble_number: u32,
}

impl ResourceKey {
    pub fn logical_name(&self) -> String {
        format!("{}-{}-{}-{}", self.watershed, self.subbasin, self.issue_date_timestep, self.ensemble_number)
    }
}

pub struct ArtifactStoreClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ArtifactStoreClient {
    /// `api_key` is passed through as a bearer token on every request (spec.md §6
    /// CLI surface: "artifact store API key" - no further authentication scheme is
    /// in scope per spec.md §1 Non-goals).
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> ArtifactStoreClient {
        ArtifactStoreClient { client: Client::new(), base_url: base_url.into(), api_key: api_key.into() }
    }

    /// registers a new forecast run with the store; idempotent on the remote side.
    pub async fn initialize_run(&self, watershed: &str, issue_date_timestep: &str) -> Result<bool> {
        let resp = self
            .client
            .post(format!("{}/runs", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("watershed", watershed), ("issue", issue_date_timestep)])
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// uploads `local_path` under `key`, retrying exactly once on failure (spec.md
    /// §7 `UploadFailure`).
    pub async fn upload_resource(&self, key: &ResourceKey, local_path: impl AsRef<Path>) -> Result<bool> {
        let local_path = local_path.as_ref();
        match self.try_upload(key, local_path).await {
            Ok(true) => Ok(true),
            _ => {
                tracing::warn!(resource = %key.logical_name(), "upload failed, retrying once");
                self.try_upload(key, local_path).await
            }
        }
    }

    async fn try_upload(&self, key: &ResourceKey, local_path: &Path) -> Result<bool> {
        let bytes = tokio::fs::read(local_path).await?;
        let resp = self
            .client
            .post(format!("{}/resources", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("name", key.logical_name())])
            .body(bytes)
            .send()
            .await?;
        Ok(resp.status().is_success())
    }
}
