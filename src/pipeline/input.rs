//! Input loading: turn a user-supplied path or URL into document bytes.
//!
//! Both text backends parse from memory, so a URL is downloaded straight into
//! a buffer and never touches the file system. The `%PDF` magic check happens
//! later in [`crate::pipeline::extract`], where it also covers bytes handed in
//! by library callers.

use crate::error::GuardError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the document behind `input`, downloading it when it is a URL.
pub async fn load_document(input: &str, timeout_secs: u64) -> Result<Vec<u8>, GuardError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, GuardError> {
    let path = PathBuf::from(path_str);

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read {} bytes from {}", bytes.len(), path.display());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(GuardError::PermissionDenied { path })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(GuardError::FileNotFound { path }),
        Err(e) => Err(GuardError::Internal(format!(
            "Failed to read '{}': {}",
            path.display(),
            e
        ))),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, GuardError> {
    info!("Downloading contract from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| GuardError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let failed = |e: reqwest::Error| {
        if e.is_timeout() {
            GuardError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            GuardError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(failed)?;

    if !response.status().is_success() {
        return Err(GuardError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(failed)?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}
