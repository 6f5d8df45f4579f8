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

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error {0}")]
    IOError(#[from] std::io::Error),

    #[error("FTP error {0}")]
    FtpError(#[from] suppaftp::FtpError),

    #[error("glob error {0}")]
    GlobError(#[from] glob::PatternError),

    #[error("download of {0} exhausted its retry budget")]
    RetryBudgetExhausted(String),

    #[error("operation failed {0}")]
    OpFailed(String),
}

pub fn op_failed(msg: impl ToString) -> IngestError {
    IngestError::OpFailed(msg.to_string())
}
