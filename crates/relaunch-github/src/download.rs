use std::path::{Path, PathBuf};

use futures_util::{Stream, StreamExt};
use log::{info, warn};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use relaunch_core::{DownloadProgress, FeedError};

use crate::release::GitHubAsset;

/// Local file name for a downloaded asset. Path separators and parent
/// references in the published name are never honored.
pub(crate) fn download_path(download_dir: &Path, asset: &GitHubAsset) -> PathBuf {
    let file_name = Path::new(&asset.name)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty() && !name.contains(".."))
        .unwrap_or("update-download");
    download_dir.join(file_name)
}

pub(crate) async fn download_asset(
    client: &reqwest::Client,
    asset: &GitHubAsset,
    dest: &Path,
    progress: &mpsc::Sender<DownloadProgress>,
) -> Result<(), FeedError> {
    info!("Downloading update from {}", asset.browser_download_url);

    let response = client
        .get(&asset.browser_download_url)
        .header("User-Agent", "relaunch")
        .send()
        .await
        .map_err(|error| FeedError::network_request_from("download update", error))?;

    if !response.status().is_success() {
        return Err(FeedError::HttpStatus {
            status: response.status().as_u16(),
            body_snippet: String::new(),
        });
    }

    let total = response.content_length().unwrap_or(asset.size);
    let transferred = write_stream(response.bytes_stream(), dest, total, progress).await?;

    info!("Download complete: {transferred} bytes");
    Ok(())
}

/// Stream `chunks` into `dest`, reporting progress against `total`. A
/// partially written file is removed when the stream or a write fails.
async fn write_stream<S, B, E>(
    chunks: S,
    dest: &Path,
    total: u64,
    progress: &mpsc::Sender<DownloadProgress>,
) -> Result<u64, FeedError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(dest).await?;

    let written = copy_chunks(chunks, &mut file, total, progress).await;
    drop(file);

    if written.is_err()
        && let Err(error) = tokio::fs::remove_file(dest).await
    {
        warn!("Failed to remove partial download {}: {error}", dest.display());
    }
    written
}

async fn copy_chunks<S, B, E>(
    chunks: S,
    file: &mut tokio::fs::File,
    total: u64,
    progress: &mpsc::Sender<DownloadProgress>,
) -> Result<u64, FeedError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut chunks = std::pin::pin!(chunks);
    let mut transferred: u64 = 0;

    while let Some(chunk) = chunks.next().await {
        let chunk =
            chunk.map_err(|error| FeedError::network_request_from("download stream", error))?;
        let bytes = chunk.as_ref();
        file.write_all(bytes).await?;
        transferred += bytes.len() as u64;
        let _ = progress
            .send(DownloadProgress { transferred, total })
            .await;
    }

    file.flush().await?;
    Ok(transferred)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use futures_util::stream;
    use relaunch_core::{DownloadProgress, FeedError};
    use tokio::sync::mpsc;

    use super::{download_path, write_stream};
    use crate::release::GitHubAsset;

    type Chunk = Result<Vec<u8>, std::io::Error>;

    fn asset(name: &str) -> GitHubAsset {
        GitHubAsset {
            name: name.to_string(),
            browser_download_url: "https://example.invalid/asset".to_string(),
            size: 0,
        }
    }

    #[test]
    fn download_path_keeps_plain_file_names() {
        let path = download_path(
            Path::new("/cache/pending-update"),
            &asset("relaunch-2.0.0-linux-x64.AppImage"),
        );
        assert_eq!(
            path,
            Path::new("/cache/pending-update/relaunch-2.0.0-linux-x64.AppImage")
        );
    }

    #[test]
    fn download_path_strips_directories_and_parent_references() {
        let dir = Path::new("/cache/pending-update");

        assert_eq!(
            download_path(dir, &asset("nested/dir/setup.exe")),
            dir.join("setup.exe")
        );
        assert_eq!(download_path(dir, &asset("..")), dir.join("update-download"));
        assert_eq!(download_path(dir, &asset("")), dir.join("update-download"));
    }

    #[tokio::test]
    async fn completed_stream_is_written_with_progress() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let dest = temp.path().join("pending-update").join("setup.exe");
        let (tx, mut rx) = mpsc::channel(8);
        let chunks: Vec<Chunk> = vec![Ok(b"abc".to_vec()), Ok(b"def".to_vec())];

        let written = write_stream(stream::iter(chunks), &dest, 6, &tx)
            .await
            .expect("complete stream should be written");

        assert_eq!(written, 6);
        assert_eq!(
            std::fs::read(&dest).expect("download should be readable"),
            b"abcdef"
        );
        assert_eq!(
            rx.recv().await,
            Some(DownloadProgress {
                transferred: 3,
                total: 6
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(DownloadProgress {
                transferred: 6,
                total: 6
            })
        );
    }

    #[tokio::test]
    async fn interrupted_stream_leaves_no_partial_file() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let dest = temp.path().join("setup.exe");
        let (tx, _rx) = mpsc::channel(8);
        let chunks: Vec<Chunk> = vec![
            Ok(b"abc".to_vec()),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
        ];

        let result = write_stream(stream::iter(chunks), &dest, 6, &tx).await;

        assert!(matches!(result, Err(FeedError::Network { .. })));
        assert!(!dest.exists());
    }
}
