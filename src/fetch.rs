//! Optional download of the source files before a pipeline run.
//!
//! The upstream data is republished in full on every refresh, so each run
//! fetches every file again. Downloads land in `<file>.part` staging files
//! next to their targets and replace the local copies only once all of
//! them have arrived, so a failed fetch leaves the previous set intact.

use std::path::{Path, PathBuf};

use crate::config::SourceFiles;
use crate::error::{PipelineError, Result};

// ---

/// Download every source file from `base_url/<file name>` to its
/// configured local path.
pub async fn fetch_sources(base_url: &str, sources: &SourceFiles) -> Result<()> {
    // ---
    let client = reqwest::Client::new();
    let mut staged: Vec<(PathBuf, &Path)> = Vec::new();

    if let Err(err) = download_all(&client, base_url, sources, &mut staged).await {
        for (staging, _) in &staged {
            if let Err(e) = tokio::fs::remove_file(staging).await {
                tracing::warn!("Failed to remove {}: {}", staging.display(), e);
            }
        }
        return Err(err);
    }

    for (staging, path) in &staged {
        tokio::fs::rename(staging, path).await?;
    }
    tracing::info!("Replaced {} source files", staged.len());

    Ok(())
}

async fn download_all<'a>(
    client: &reqwest::Client,
    base_url: &str,
    sources: &'a SourceFiles,
    staged: &mut Vec<(PathBuf, &'a Path)>,
) -> Result<()> {
    // ---
    for path in sources.iter() {
        let url = source_url(base_url, path)?;
        tracing::info!("Fetching {} -> {}", url, path.display());

        let body = client
            .get(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| PipelineError::Fetch {
                url: url.clone(),
                source,
            })?
            .bytes()
            .await
            .map_err(|source| PipelineError::Fetch {
                url: url.clone(),
                source,
            })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = staging_path(path);
        staged.push((staging.clone(), path.as_path()));
        tokio::fs::write(&staging, &body).await?;
        tracing::debug!("Wrote {} bytes to {}", body.len(), staging.display());
    }

    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".part");
    PathBuf::from(staging)
}

fn source_url(base_url: &str, path: &Path) -> Result<String> {
    // ---
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PipelineError::source_format(path, "source path has no file name"))?;
    Ok(format!("{}/{}", base_url.trim_end_matches('/'), name))
}
