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

//! abstracts "submit a routing job, block until it finishes" (spec.md §5: "the
//! orchestrator interacts with each unit only through file-system artifacts and a
//! blocking completion primitive") behind a trait, so the vocabulary matches a real
//! batch scheduler (`odin_job`'s job-queue terms) even though the only implementation
//! here runs jobs as local child processes via [`erfp_routing::RouterDriver`].

use std::path::PathBuf;

use async_trait::async_trait;

use erfp_routing::RouterDriver;

use crate::errors::{OrchestratorError, Result};

/// everything [`RouterDriver::run_single_watershed`] needs for one work unit.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub job_id: String,
    pub node_path: PathBuf,
    pub namelist_file: PathBuf,
}

/// a submitted, not-yet-waited-on job.
pub struct JobHandle {
    pub job_id: String,
    inner: tokio::task::JoinHandle<std::result::Result<(), erfp_routing::RoutingError>>,
}

#[async_trait]
pub trait BatchScheduler: Send + Sync {
    /// enqueues `spec`, returning immediately (`NEW -> SUBMITTED`, spec.md §4.8).
    async fn submit(&self, spec: JobSpec) -> Result<JobHandle>;

    /// blocks until `handle`'s job reaches a terminal run state
    /// (`SUBMITTED -> RUNNING -> {COMPLETED, FAILED}`, spec.md §4.8).
    async fn wait(&self, handle: JobHandle) -> Result<()>;
}

/// runs each job as a child process on the local machine, one OS thread per in-flight
/// job standing in for a real batch scheduler's remote worker slot (spec.md §5's
/// "external parallel processes"). `submit` returns as soon as the thread is spawned;
/// `wait` joins it.
pub struct LocalProcessScheduler {
    driver: RouterDriver,
}

impl LocalProcessScheduler {
    pub fn new(driver: RouterDriver) -> LocalProcessScheduler {
        LocalProcessScheduler { driver }
    }
}

#[async_trait]
impl BatchScheduler for LocalProcessScheduler {
    async fn submit(&self, spec: JobSpec) -> Result<JobHandle> {
        let driver = self.driver.clone();
        let job_id = spec.job_id.clone();
        tracing::info!(job_id = %spec.job_id, ?spec.node_path, "submitting job");
        let inner = tokio::task::spawn_blocking(move || driver.run_single_watershed(&spec.node_path, &spec.namelist_file));
        // spawn_blocking itself returns a JoinHandle<io-thread-result>; unwrap that
        // outer layer into a JoinHandle<RoutingResult> by re-wrapping with spawn.
        let rewrapped = tokio::spawn(async move {
            match inner.await {
                Ok(result) => result,
                Err(e) => Err(erfp_routing::RoutingError::OpFailed(format!("job thread panicked: {e}"))),
            }
        });
        Ok(JobHandle { job_id, inner: rewrapped })
    }

    async fn wait(&self, handle: JobHandle) -> Result<()> {
        let job_id = handle.job_id;
        match handle.inner.await {
            Ok(Ok(())) => {
                tracing::info!(job_id, "job completed");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::warn!(job_id, error = %e, "job failed");
                Err(OrchestratorError::from(e))
            }
            Err(join_err) => Err(OrchestratorError::from(join_err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_and_wait_on_missing_executable_surfaces_failure() {
        let dir = tempfile::tempdir().unwrap();
        let driver = RouterDriver::new(dir.path().join("does-not-exist"));
        let scheduler = LocalProcessScheduler::new(driver);

        let namelist = dir.path().join("rapid_namelist.dat");
        std::fs::write(&namelist, "&NL_namelist\n/\n").unwrap();

        let handle = scheduler
            .submit(JobSpec { job_id: "job_test".to_string(), node_path: dir.path().to_path_buf(), namelist_file: namelist })
            .await
            .unwrap();
        assert!(scheduler.wait(handle).await.is_err());
    }
}
