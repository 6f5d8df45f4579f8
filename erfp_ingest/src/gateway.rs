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

//! downloads and extracts the day's ensemble runoff archives from an upstream FTP
//! site. Grounded on `ftp_ecmwf_download.py`: resumable range-restart downloads,
//! skip-if-already-extracted, and age-based garbage collection before each run.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use suppaftp::AsyncFtpStream;
use tokio::io::AsyncReadExt;

use erfp_common::datetime::days;
use erfp_common::fs::remove_old_files;

use crate::errors::{IngestError, Result};

#[derive(Debug, Clone)]
pub struct FtpGatewayConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub remote_dir: String,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub gc_max_age: Duration,
}

impl Default for FtpGatewayConfig {
    fn default() -> FtpGatewayConfig {
        FtpGatewayConfig {
            host: "ftp.ecmwf.int:21".to_string(),
            username: "anonymous".to_string(),
            password: "anonymous".to_string(),
            remote_dir: "tcyc".to_string(),
            max_attempts: 15,
            retry_delay: Duration::from_secs(30),
            gc_max_age: days(1),
        }
    }
}

pub struct IngestionGateway {
    cfg: FtpGatewayConfig,
}

impl IngestionGateway {
    pub fn new(cfg: FtpGatewayConfig) -> IngestionGateway {
        IngestionGateway { cfg }
    }

    async fn connect(&self) -> Result<AsyncFtpStream> {
        let mut ftp = AsyncFtpStream::connect(&self.cfg.host).await?;
        ftp.login(&self.cfg.username, &self.cfg.password).await?;
        ftp.cwd(&self.cfg.remote_dir).await?;
        ftp.transfer_type(suppaftp::types::FileType::Binary).await?;
        Ok(ftp)
    }

    /// lists remote files whose name matches `glob_pattern` (e.g.
    /// `Runoff.20260115*.netcdf.tar.gz`).
    pub async fn list_available(&self, glob_pattern: &str) -> Result<Vec<String>> {
        let pattern = glob::Pattern::new(glob_pattern).map_err(|e| IngestError::OpFailed(e.to_string()))?;
        let mut ftp = self.connect().await?;
        let names = ftp.nlst(None).await?;
        let _ = ftp.quit().await;
        Ok(names.into_iter().filter(|n| pattern.matches(n)).collect())
    }

    /// downloads `remote_name` into `local_path`, resuming from the current local
    /// file size on every reconnect, up to `max_attempts` times with `retry_delay`
    /// between attempts.
    pub async fn download_resumable(&self, remote_name: &str, local_path: &Path) -> Result<()> {
        let mut attempts_left = self.cfg.max_attempts;

        loop {
            let local_size = std::fs::metadata(local_path).map(|m| m.len()).unwrap_or(0);

            let attempt = async {
                let mut ftp = self.connect().await?;
                let remote_size = ftp.size(remote_name).await? as u64;
                if local_size >= remote_size {
                    let _ = ftp.quit().await;
                    return Ok::<bool, IngestError>(true);
                }

                if local_size > 0 {
                    ftp.resume_transfer(local_size as usize).await?;
                }
                let mut stream = ftp.retr_as_stream(remote_name).await?;
                let mut file = std::fs::OpenOptions::new().create(true).append(true).open(local_path)?;
                let mut buf = [0u8; 64 * 1024];
                loop {
                    let n = stream.read(&mut buf).await?;
                    if n == 0 {
                        break;
                    }
                    file.write_all(&buf[..n])?;
                }
                ftp.finalize_retr_stream(stream).await?;
                let _ = ftp.quit().await;
                Ok(std::fs::metadata(local_path)?.len() >= remote_size)
            }
            .await;

            match attempt {
                Ok(true) => return Ok(()),
                Ok(false) | Err(_) => {
                    if attempts_left == 0 {
                        return Err(IngestError::RetryBudgetExhausted(remote_name.to_string()));
                    }
                    attempts_left -= 1;
                    tracing::warn!(remote_name, attempts_left, "download interrupted, retrying");
                    tokio::time::sleep(self.cfg.retry_delay).await;
                }
            }
        }
    }

    /// removes any downloads/extractions older than the configured GC age.
    pub fn garbage_collect(&self, local_dir: impl AsRef<Path>) -> Result<usize> {
        Ok(remove_old_files(local_dir, self.cfg.gc_max_age)?)
    }

    /// downloads and extracts every remote file matching `glob_pattern` into
    /// `local_dir`, skipping files whose extracted directory already exists, and
    /// returns the extracted directories (spec.md §4.9).
    pub async fn sync(&self, local_dir: impl AsRef<Path>, glob_pattern: &str) -> Result<Vec<PathBuf>> {
        let local_dir = local_dir.as_ref();
        self.garbage_collect(local_dir)?;

        let mut extracted = Vec::new();
        for remote_name in self.list_available(glob_pattern).await? {
            let archive_path = local_dir.join(&remote_name);
            let extract_dir = match remote_name.strip_suffix(".tar.gz") {
                Some(stem) => local_dir.join(stem),
                None => local_dir.join(&remote_name),
            };

            if extract_dir.is_dir() {
                tracing::info!(remote_name, "already extracted, skipping");
                continue;
            }

            tracing::info!(remote_name, "downloading");
            self.download_resumable(&remote_name, &archive_path).await?;

            std::fs::create_dir_all(&extract_dir)?;
            extract_tar_gz(&archive_path, &extract_dir)?;
            let _ = std::fs::remove_file(&archive_path);

            extracted.push(extract_dir);
        }
        Ok(extracted)
    }
}

fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = std::fs::File::open(archive_path)?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);
    archive.unpack(dest_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tar_gz_suffix_for_extract_dir() {
        let stem = "Runoff.20260115.00.netcdf.tar.gz".strip_suffix(".tar.gz").unwrap();
        assert_eq!(stem, "Runoff.20260115.00.netcdf");
    }
}
