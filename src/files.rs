//! File relay: re-uploads client files to the upstream service

use crate::upstream::{FileHandle, UploadFile, UpstreamApi, UpstreamError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileRelayError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Upload of {filename} failed: {source}")]
    Upload {
        filename: String,
        #[source]
        source: UpstreamError,
    },
}

/// Upload files one after another, in order.
///
/// The first failure aborts the batch and no handles are returned. Files
/// already stored upstream are left there.
pub async fn upload_all(
    upstream: &dyn UpstreamApi,
    user: &str,
    files: Vec<UploadFile>,
) -> Result<Vec<FileHandle>, FileRelayError> {
    if user.trim().is_empty() {
        return Err(FileRelayError::InvalidInput(
            "username must not be empty".to_string(),
        ));
    }

    let mut handles = Vec::with_capacity(files.len());
    for file in files {
        match upstream.upload_file(&file, user).await {
            Ok(handle) => {
                tracing::debug!(filename = %file.filename, size = file.bytes.len(), handle = handle.as_str(), "File relayed");
                handles.push(handle);
            }
            Err(source) => {
                tracing::warn!(
                    filename = %file.filename,
                    uploaded = handles.len(),
                    error = %source,
                    "File upload failed, aborting batch"
                );
                return Err(FileRelayError::Upload {
                    filename: file.filename,
                    source,
                });
            }
        }
    }

    Ok(handles)
}
