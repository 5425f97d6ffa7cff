//! HTTP download of tool binaries

use crate::error::{RiggerError, RiggerResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Downloads a URL to a local file
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> RiggerResult<()>;
}

/// Fetcher backed by `ureq`
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetcher;

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> RiggerResult<()> {
        debug!("Downloading {} to {}", url, dest.display());

        let url = url.to_string();
        let dest: PathBuf = dest.to_path_buf();

        // ureq is blocking
        tokio::task::spawn_blocking(move || -> RiggerResult<()> {
            let response = ureq::get(&url)
                .call()
                .map_err(|e| RiggerError::command_exec(format!("GET {}", url), e.to_string()))?;

            let mut reader = response.into_body().into_reader();
            let mut file = std::fs::File::create(&dest)
                .map_err(|e| RiggerError::io(format!("creating {}", dest.display()), e))?;
            std::io::copy(&mut reader, &mut file)
                .map_err(|e| RiggerError::io(format!("writing {}", dest.display()), e))?;
            Ok(())
        })
        .await
        .map_err(|e| RiggerError::Internal(format!("download task failed: {}", e)))?
    }
}
