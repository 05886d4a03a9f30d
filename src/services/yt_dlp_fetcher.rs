use crate::services::guild_player::{FetcherError, MediaFetcher};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Streams the best available audio of a video to stdout with `yt-dlp` and collects it.
pub(crate) struct YtDlpFetcher {
    executable: String,
}

impl YtDlpFetcher {
    pub(crate) fn new(executable: &str) -> Self {
        Self {
            executable: executable.to_string(),
        }
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(&self, source_url: &str) -> Result<Vec<u8>, FetcherError> {
        debug!(source_url, "Running yt-dlp");

        // The child is killed if the attempt times out and this future is dropped.
        let output = Command::new(&self.executable)
            .args([
                "--quiet",
                "--no-warnings",
                "--no-playlist",
                "-f",
                "bestaudio/best",
                "-o",
                "-",
                source_url,
            ])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);

            return Err(FetcherError::Process(format!(
                "{}: {}",
                output.status,
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            return Err(FetcherError::Empty);
        }

        Ok(output.stdout)
    }
}
