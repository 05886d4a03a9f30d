use crate::types::{EntryId, SongId};
use crate::utils::format_duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata of a media item as returned by a resolver. Also the value type of the download cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct ResolvedMedia {
    pub(crate) id: SongId,
    pub(crate) title: String,
    pub(crate) duration_seconds: u64,
    pub(crate) thumbnail_url: String,
    pub(crate) source_url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum DownloadState {
    NotRequested,
    Downloading,
    Downloaded,
    Failed,
}

#[derive(Clone, Debug)]
pub(crate) struct Song {
    pub(crate) entry_id: EntryId,
    pub(crate) id: SongId,
    pub(crate) title: String,
    pub(crate) duration_seconds: u64,
    pub(crate) thumbnail_url: String,
    pub(crate) source_url: String,
    download_state: DownloadState,
    local_path: Option<PathBuf>,
    pub(crate) retry_count: u32,
}

impl Song {
    pub(crate) fn new(media: ResolvedMedia) -> Self {
        Self {
            entry_id: EntryId::new(),
            id: media.id,
            title: media.title,
            duration_seconds: media.duration_seconds,
            thumbnail_url: media.thumbnail_url,
            source_url: media.source_url,
            download_state: DownloadState::NotRequested,
            local_path: None,
            retry_count: 0,
        }
    }

    pub(crate) fn download_state(&self) -> DownloadState {
        self.download_state
    }

    pub(crate) fn local_path(&self) -> Option<&PathBuf> {
        self.local_path.as_ref()
    }

    pub(crate) fn is_downloaded(&self) -> bool {
        matches!(self.download_state, DownloadState::Downloaded) && self.local_path.is_some()
    }

    pub(crate) fn set_downloading(&mut self) {
        self.download_state = DownloadState::Downloading;
        self.local_path = None;
    }

    pub(crate) fn set_downloaded(&mut self, path: PathBuf) {
        self.download_state = DownloadState::Downloaded;
        self.local_path = Some(path);
    }

    pub(crate) fn set_failed(&mut self) {
        self.download_state = DownloadState::Failed;
        self.local_path = None;
    }

    pub(crate) fn info(&self) -> SongInfo {
        SongInfo {
            entry_id: self.entry_id,
            id: self.id.clone(),
            title: self.title.clone(),
            duration_seconds: self.duration_seconds,
            duration: format_duration(self.duration_seconds),
            thumbnail_url: self.thumbnail_url.clone(),
            source_url: self.source_url.clone(),
            download_state: self.download_state,
            retry_count: self.retry_count,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct SongInfo {
    pub(crate) entry_id: EntryId,
    pub(crate) id: SongId,
    pub(crate) title: String,
    pub(crate) duration_seconds: u64,
    pub(crate) duration: String,
    pub(crate) thumbnail_url: String,
    pub(crate) source_url: String,
    pub(crate) download_state: DownloadState,
    pub(crate) retry_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        };

        write!(f, "{}", name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct Progress {
    pub(crate) elapsed_seconds: u64,
    pub(crate) total_seconds: u64,
    pub(crate) state: PlaybackState,
}

impl Progress {
    pub(crate) fn idle() -> Self {
        Self {
            elapsed_seconds: 0,
            total_seconds: 0,
            state: PlaybackState::Idle,
        }
    }

    /// Renders as `m:ss/m:ss`.
    pub(crate) fn display(&self) -> String {
        format!(
            "{}/{}",
            format_duration(self.elapsed_seconds),
            format_duration(self.total_seconds)
        )
    }
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct NowPlaying {
    pub(crate) song: SongInfo,
    pub(crate) progress: Progress,
    pub(crate) display: String,
}
