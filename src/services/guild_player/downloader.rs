use crate::services::guild_player::queue::GuildQueue;
use crate::services::guild_player::retry::{Attempted, Exhausted, RetryPolicy};
use crate::services::guild_player::traits::{
    ContentStore, ContentStoreError, FetcherError, MediaFetcher,
};
use crate::services::guild_player::types::{DownloadState, Song};
use crate::types::{GuildId, SongId};
use async_lock::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub(crate) enum DownloadError {
    #[error("Song {0} has already failed to download")]
    PreviouslyFailed(SongId),
    #[error("Song {song_id} failed to download after {attempts} attempts: {reason}")]
    RetriesExhausted {
        song_id: SongId,
        attempts: u32,
        reason: String,
    },
    #[error("Download of song {0} was abandoned")]
    Abandoned(SongId),
}

#[derive(Debug, thiserror::Error)]
enum FetchAttemptError {
    #[error(transparent)]
    Fetcher(#[from] FetcherError),
    #[error(transparent)]
    ContentStore(#[from] ContentStoreError),
}

#[derive(Clone, Debug)]
enum FetchOutcome {
    Fetched { path: PathBuf, failed_attempts: u32 },
    Failed { attempts: u32, reason: String },
}

type OutcomeReceiver = watch::Receiver<Option<FetchOutcome>>;

#[derive(Clone, Debug, Serialize)]
pub(crate) struct DownloadStatus {
    pub(crate) is_downloading: bool,
    pub(crate) current_downloads: Vec<SongId>,
    pub(crate) max_concurrent: usize,
}

/// Prefetches the head of a guild queue in the background and performs on-demand downloads.
///
/// Fetches of the same song id are deduplicated: whoever asks while a fetch is in flight waits
/// for the same outcome. All fetches of a guild share one pool of `max_concurrent` permits.
pub(crate) struct DownloadOrchestrator {
    guild_id: GuildId,
    queue: Arc<GuildQueue>,
    fetcher: Arc<dyn MediaFetcher>,
    content_store: Arc<dyn ContentStore>,
    retry_policy: RetryPolicy,
    max_concurrent: usize,
    permits: Semaphore,
    in_flight: Mutex<HashMap<SongId, OutcomeReceiver>>,
    poll_interval: Duration,
}

impl DownloadOrchestrator {
    pub(crate) fn new(
        guild_id: GuildId,
        queue: Arc<GuildQueue>,
        fetcher: Arc<dyn MediaFetcher>,
        content_store: Arc<dyn ContentStore>,
        retry_policy: RetryPolicy,
        max_concurrent: usize,
        poll_interval: Duration,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);

        Self {
            guild_id,
            queue,
            fetcher,
            content_store,
            retry_policy,
            max_concurrent,
            permits: Semaphore::new(max_concurrent),
            in_flight: Mutex::new(HashMap::new()),
            poll_interval,
        }
    }

    pub(crate) async fn monitor_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(guild_id = %self.guild_id, "Download monitor started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let scheduled = self.process_downloads().await;

                    if scheduled > 0 {
                        debug!(guild_id = %self.guild_id, scheduled, "Prefetches scheduled");
                    }
                }
            }
        }

        debug!(guild_id = %self.guild_id, "Download monitor stopped");
    }

    /// Schedules prefetches for the first `max_concurrent` queued songs that were not requested
    /// yet. Returns the number of scheduled prefetches.
    pub(crate) async fn process_downloads(self: &Arc<Self>) -> usize {
        let candidates = self.queue.peek(self.max_concurrent).await;
        let mut scheduled = HashSet::new();

        for song in candidates {
            if song.download_state() != DownloadState::NotRequested
                || scheduled.contains(&song.id)
                || self.is_in_flight(&song.id).await
            {
                continue;
            }

            if !self.queue.update(&song.entry_id, Song::set_downloading).await {
                continue;
            }

            scheduled.insert(song.id.clone());

            actix_rt::spawn({
                let orchestrator = Arc::clone(self);

                async move { orchestrator.prefetch(song).await }
            });
        }

        scheduled.len()
    }

    async fn prefetch(self: Arc<Self>, mut song: Song) {
        let result = self.download_song(&mut song).await;

        match &result {
            Ok(path) => {
                info!(guild_id = %self.guild_id, song_id = %song.id, ?path, "Song prefetched")
            }
            Err(error) => warn!(guild_id = %self.guild_id, %error, "Prefetch failed"),
        }

        let retry_count = song.retry_count;
        let applied = self
            .queue
            .update(&song.entry_id, |entry| {
                entry.retry_count = retry_count;

                match &result {
                    Ok(path) => entry.set_downloaded(path.clone()),
                    Err(_) => entry.set_failed(),
                }
            })
            .await;

        if !applied {
            debug!(
                guild_id = %self.guild_id,
                entry_id = %song.entry_id,
                "Entry left the queue, prefetch result discarded"
            );
        }
    }

    /// Makes sure the song is in the content store and returns its local path.
    ///
    /// Updates `download_state`, `local_path` and `retry_count` of the given song.
    pub(crate) async fn download_song(
        self: &Arc<Self>,
        song: &mut Song,
    ) -> Result<PathBuf, DownloadError> {
        match (song.download_state(), song.local_path()) {
            (DownloadState::Failed, _) => {
                return Err(DownloadError::PreviouslyFailed(song.id.clone()))
            }
            (DownloadState::Downloaded, Some(path)) => return Ok(path.clone()),
            _ => (),
        }

        song.set_downloading();

        let max_retries = self.retry_policy.max_attempts.max(1);

        match self.fetch_deduplicated(&song.id, &song.source_url).await {
            Some(FetchOutcome::Fetched {
                path,
                failed_attempts,
            }) => {
                song.retry_count = (song.retry_count + failed_attempts).min(max_retries);
                song.set_downloaded(path.clone());

                Ok(path)
            }
            Some(FetchOutcome::Failed { attempts, reason }) => {
                song.retry_count = (song.retry_count + attempts).min(max_retries);
                song.set_failed();

                Err(DownloadError::RetriesExhausted {
                    song_id: song.id.clone(),
                    attempts,
                    reason,
                })
            }
            None => {
                song.set_failed();

                Err(DownloadError::Abandoned(song.id.clone()))
            }
        }
    }

    pub(crate) async fn status(&self) -> DownloadStatus {
        let in_flight = self.in_flight.lock().await;

        DownloadStatus {
            is_downloading: !in_flight.is_empty(),
            current_downloads: in_flight.keys().cloned().collect(),
            max_concurrent: self.max_concurrent,
        }
    }

    async fn is_in_flight(&self, song_id: &SongId) -> bool {
        self.in_flight.lock().await.contains_key(song_id)
    }

    /// Joins the in-flight fetch of the song or starts a new one. The fetch itself runs as a
    /// separate task, so it finishes even if every waiter goes away.
    async fn fetch_deduplicated(
        self: &Arc<Self>,
        song_id: &SongId,
        source_url: &str,
    ) -> Option<FetchOutcome> {
        let receiver = {
            let mut in_flight = self.in_flight.lock().await;

            let existing = in_flight
                .get(song_id)
                .filter(|receiver| receiver.has_changed().is_ok())
                .cloned();

            match existing {
                Some(receiver) => {
                    debug!(guild_id = %self.guild_id, %song_id, "Joining in-flight download");
                    receiver
                }
                None => {
                    let (sender, receiver) = watch::channel(None);
                    in_flight.insert(song_id.clone(), receiver.clone());

                    actix_rt::spawn({
                        let orchestrator = Arc::clone(self);
                        let song_id = song_id.clone();
                        let source_url = source_url.to_string();

                        async move {
                            let outcome = orchestrator.fetch(&song_id, &source_url).await;

                            if let FetchOutcome::Fetched { path, .. } = &outcome {
                                orchestrator.apply_to_waiting_entries(&song_id, path).await;
                            }

                            sender.send_replace(Some(outcome));
                            orchestrator.in_flight.lock().await.remove(&song_id);
                        }
                    });

                    receiver
                }
            }
        };

        wait_for_outcome(receiver).await
    }

    /// Entries of the same song that were never requested share the fetched file.
    async fn apply_to_waiting_entries(&self, song_id: &SongId, path: &Path) {
        let updated = self
            .queue
            .update_by_song_id(
                song_id,
                |song| song.download_state() == DownloadState::NotRequested,
                |song| song.set_downloaded(path.to_path_buf()),
            )
            .await;

        if updated > 0 {
            debug!(
                guild_id = %self.guild_id,
                %song_id,
                updated,
                "Duplicate entries marked as downloaded"
            );
        }
    }

    async fn fetch(&self, song_id: &SongId, source_url: &str) -> FetchOutcome {
        if self.content_store.exists(song_id).await {
            debug!(guild_id = %self.guild_id, %song_id, "Song found in content store");

            return FetchOutcome::Fetched {
                path: self.content_store.path_for(song_id),
                failed_attempts: 0,
            };
        }

        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return FetchOutcome::Failed {
                    attempts: 0,
                    reason: "download pool is closed".to_string(),
                }
            }
        };

        info!(guild_id = %self.guild_id, %song_id, "Downloading song");

        match self
            .retry_policy
            .run(|attempt| self.fetch_once(song_id, source_url, attempt))
            .await
        {
            Ok(Attempted {
                value: path,
                failed_attempts,
            }) => FetchOutcome::Fetched {
                path,
                failed_attempts,
            },
            Err(Exhausted {
                attempts,
                last_error,
            }) => FetchOutcome::Failed {
                attempts,
                reason: last_error.to_string(),
            },
        }
    }

    async fn fetch_once(
        &self,
        song_id: &SongId,
        source_url: &str,
        attempt: u32,
    ) -> Result<PathBuf, FetchAttemptError> {
        debug!(guild_id = %self.guild_id, %song_id, attempt, "Fetching song");

        let bytes = self.fetcher.fetch(source_url).await?;

        if bytes.is_empty() {
            return Err(FetcherError::Empty.into());
        }

        Ok(self.content_store.write(song_id, bytes).await?)
    }
}

async fn wait_for_outcome(mut receiver: OutcomeReceiver) -> Option<FetchOutcome> {
    loop {
        let outcome = receiver.borrow_and_update().clone();

        if outcome.is_some() {
            return outcome;
        }

        if receiver.changed().await.is_err() {
            return receiver.borrow().clone();
        }
    }
}
