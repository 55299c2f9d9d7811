use std::path::Path;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::{ModelError, Result};

/// Stream `url` into `dest`, reporting each chunk's size.
///
/// Bytes land in a `.part` sibling first so an interrupted download never
/// leaves a truncated model at `dest`.
pub async fn download_file<F>(url: &str, dest: &Path, mut on_chunk: F) -> Result<u64>
where
    F: FnMut(u64),
{
    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ModelError::DownloadFailed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ModelError::DownloadFailed(format!(
            "HTTP {}: {}",
            response.status(),
            url
        )));
    }

    let partial = dest.with_extension("part");
    let mut file = tokio::fs::File::create(&partial).await?;

    let mut stream = response.bytes_stream();
    let mut total = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ModelError::DownloadFailed(e.to_string()))?;
        file.write_all(&chunk).await?;
        total += chunk.len() as u64;
        on_chunk(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);
    tokio::fs::rename(&partial, dest).await?;

    tracing::debug!(url, bytes = total, dest = %dest.display(), "Download finished");
    Ok(total)
}
