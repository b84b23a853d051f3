// One run of the tool: resolve the local computer, then upload the file.

use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{error, info};

use crate::api::{ApiClient, ObjectId};
use crate::error::ApiError;
use crate::machine::MachineIdentity;
use crate::resolver::ComputerResolver;
use crate::transport::{Clock, Transport};

/// Process exit status. The numbers are what calling scripts check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    NoResponseData = 1,
    ApiFailure = 2,
    SearchInterrupted = 3,
    UploadFailure = 4,
    UploadInterrupted = 5,
    Configuration = 6,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

#[derive(Debug, Clone)]
pub struct UploadJob {
    pub file: PathBuf,
    pub description: String,
    /// Stop after resolution without uploading.
    pub resolve_only: bool,
}

#[derive(Debug)]
pub enum Outcome {
    Uploaded(ObjectId),
    Resolved(ObjectId),
    NotFound,
    SearchRejected(ApiError),
    SearchInterrupted(ApiError),
    UploadRejected(ObjectId, ApiError),
    UploadInterrupted(ObjectId, ApiError),
}

impl Outcome {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Outcome::Uploaded(_) | Outcome::Resolved(_) => ExitStatus::Success,
            Outcome::NotFound => ExitStatus::NoResponseData,
            Outcome::SearchRejected(_) => ExitStatus::ApiFailure,
            Outcome::SearchInterrupted(_) => ExitStatus::SearchInterrupted,
            Outcome::UploadRejected(..) => ExitStatus::UploadFailure,
            Outcome::UploadInterrupted(..) => ExitStatus::UploadInterrupted,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Uploaded(id) => write!(f, "Attachment uploaded to computer {}", id),
            Outcome::Resolved(id) => write!(f, "Computer record: {}", id),
            Outcome::NotFound => f.write_str("No computer record matches this machine"),
            Outcome::SearchRejected(e) | Outcome::SearchInterrupted(e) => {
                write!(f, "Computer search failed: {}", e)
            }
            Outcome::UploadRejected(id, e) | Outcome::UploadInterrupted(id, e) => {
                write!(f, "Upload to computer {} failed: {}", id, e)
            }
        }
    }
}

/// Resolve the computer record for `machine` and attach `job.file` to it.
pub fn run<T: Transport, C: Clock>(
    client: &mut ApiClient<T, C>,
    resolver: &ComputerResolver,
    machine: &MachineIdentity,
    job: &UploadJob,
) -> Outcome {
    let object_id = match resolver.resolve(client, machine) {
        Ok(Some(id)) => id,
        Ok(None) => return Outcome::NotFound,
        Err(e) => {
            error!(serial = %machine.serial, error = %e, "computer search failed");
            return if e.is_interruption() {
                Outcome::SearchInterrupted(e)
            } else {
                Outcome::SearchRejected(e)
            };
        }
    };

    if job.resolve_only {
        return Outcome::Resolved(object_id);
    }

    match client
        .upload_attachment(&object_id, &job.file, &job.description)
        .and_then(|result| result.ensure_success())
    {
        Ok(_) => {
            info!(object_id = %object_id, "attachment uploaded");
            Outcome::Uploaded(object_id)
        }
        Err(e) => {
            error!(
                object_id = %object_id,
                file = %job.file.display(),
                error = %e,
                "upload failed"
            );
            if e.is_interruption() {
                Outcome::UploadInterrupted(object_id, e)
            } else {
                Outcome::UploadRejected(object_id, e)
            }
        }
    }
}
