use crate::services::guild_player::downloader::DownloadOrchestrator;
use crate::services::guild_player::playback::{PlaybackEngine, PlaybackError};
use crate::services::guild_player::queue::GuildQueue;
use crate::services::guild_player::traits::{Transport, TransportError};
use crate::services::guild_player::types::{PlaybackState, Song, SongInfo};
use crate::types::{EntryId, GuildId};
use async_lock::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub(crate) enum QueueStateError {
    #[error("Nothing is playing")]
    NothingPlaying,
    #[error("The song has already been skipped")]
    AlreadySkipped,
    #[error("No queued song at position {0}")]
    NoSuchEntry(usize),
    #[error("Unable to {action} while {state}")]
    InvalidPlaybackState {
        action: &'static str,
        state: PlaybackState,
    },
}

#[derive(Debug)]
pub(crate) enum ConductorMessage {
    Wake,
    PlaybackFinished {
        generation: u64,
        error: Option<TransportError>,
    },
    Skip {
        expected_entry: EntryId,
        reply: oneshot::Sender<Result<SongInfo, QueueStateError>>,
    },
    Stop {
        reply: oneshot::Sender<usize>,
    },
    Clear {
        reply: oneshot::Sender<usize>,
    },
}

pub(crate) type Mailbox = mpsc::UnboundedSender<ConductorMessage>;

/// Instant of the last command or playback transition of a guild.
pub(crate) type LastActive = Arc<Mutex<Instant>>;

/// Serialized control loop of one guild. Decides when the next song starts and reacts to
/// completions and commands posted into its mailbox.
pub(crate) struct Conductor {
    guild_id: GuildId,
    queue: Arc<GuildQueue>,
    downloader: Arc<DownloadOrchestrator>,
    engine: Arc<PlaybackEngine>,
    transport: Arc<dyn Transport>,
    mailbox: Mailbox,
    last_active: LastActive,
    tick_interval: Duration,
    cancel: CancellationToken,
}

impl Conductor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        guild_id: GuildId,
        queue: Arc<GuildQueue>,
        downloader: Arc<DownloadOrchestrator>,
        engine: Arc<PlaybackEngine>,
        transport: Arc<dyn Transport>,
        mailbox: Mailbox,
        last_active: LastActive,
        tick_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            guild_id,
            queue,
            downloader,
            engine,
            transport,
            mailbox,
            last_active,
            tick_interval,
            cancel,
        }
    }

    pub(crate) async fn run(self, mut receiver: mpsc::UnboundedReceiver<ConductorMessage>) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(guild_id = %self.guild_id, "Conductor started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                message = receiver.recv() => match message {
                    Some(message) => self.handle(message).await,
                    None => break,
                },
                _ = interval.tick() => self.tick().await,
            }
        }

        self.engine.stop().await;

        info!(guild_id = %self.guild_id, "Conductor stopped");
    }

    async fn handle(&self, message: ConductorMessage) {
        match message {
            ConductorMessage::Wake => self.tick().await,
            ConductorMessage::PlaybackFinished { generation, error } => {
                self.playback_finished(generation, error).await
            }
            ConductorMessage::Skip {
                expected_entry,
                reply,
            } => {
                let result = self.skip(&expected_entry).await;
                let skipped = result.is_ok();

                let _ = reply.send(result);

                if skipped {
                    self.tick().await;
                }
            }
            ConductorMessage::Stop { reply } => {
                self.engine.stop().await;
                let removed = self.queue.clear().await;
                self.queue.clear_current().await;

                info!(guild_id = %self.guild_id, removed, "Playback stopped and queue cleared");

                let _ = reply.send(removed);
            }
            ConductorMessage::Clear { reply } => {
                let removed = self.queue.clear().await;

                info!(guild_id = %self.guild_id, removed, "Queue cleared");

                let _ = reply.send(removed);
            }
        }
    }

    async fn tick(&self) {
        if self.queue.is_playing().await {
            return;
        }

        if !self.transport.is_connected(&self.guild_id).await {
            return;
        }

        let mut song = match self.queue.get_next().await {
            Some(song) => song,
            None => return,
        };

        if !song.is_downloaded() {
            debug!(guild_id = %self.guild_id, song_id = %song.id, "Downloading next song");

            let result = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.downloader.download_song(&mut song) => result,
            };

            if let Err(error) = result {
                warn!(guild_id = %self.guild_id, %error, "Skipping song that failed to download");
                self.post(ConductorMessage::Wake);
                return;
            }
        }

        if self.cancel.is_cancelled() {
            return;
        }

        self.start_playback(song).await;
    }

    async fn start_playback(&self, song: Song) {
        self.queue.set_current(song.clone()).await;

        let mailbox = self.mailbox.clone();
        let result = self
            .engine
            .play(&song, move |generation, error| {
                let _ = mailbox.send(ConductorMessage::PlaybackFinished { generation, error });
            })
            .await;

        match result {
            Ok(generation) => {
                self.touch().await;

                info!(
                    guild_id = %self.guild_id,
                    song_id = %song.id,
                    title = %song.title,
                    generation,
                    "Now playing"
                );
            }
            Err(PlaybackError::TransportUnavailable) => {
                self.queue.clear_current().await;
                self.queue.requeue_front(song).await;
            }
            Err(error) => {
                warn!(guild_id = %self.guild_id, song_id = %song.id, %error, "Unable to start playback");
                self.queue.clear_current().await;
                self.post(ConductorMessage::Wake);
            }
        }
    }

    async fn playback_finished(&self, generation: u64, error: Option<TransportError>) {
        if let Some(error) = &error {
            warn!(guild_id = %self.guild_id, generation, %error, "Playback finished with error");
        }

        if !self.engine.finish(generation).await {
            debug!(guild_id = %self.guild_id, generation, "Ignoring stale playback completion");
            return;
        }

        self.touch().await;
        self.queue.clear_current().await;
        self.tick().await;
    }

    async fn skip(&self, expected_entry: &EntryId) -> Result<SongInfo, QueueStateError> {
        let current = self
            .queue
            .current()
            .await
            .ok_or(QueueStateError::NothingPlaying)?;

        if &current.entry_id != expected_entry {
            return Err(QueueStateError::AlreadySkipped);
        }

        self.engine.stop().await;
        self.queue.clear_current().await;

        info!(guild_id = %self.guild_id, song_id = %current.id, "Song skipped");

        Ok(current.info())
    }

    async fn touch(&self) {
        *self.last_active.lock().await = Instant::now();
    }

    fn post(&self, message: ConductorMessage) {
        if self.mailbox.send(message).is_err() {
            debug!(guild_id = %self.guild_id, "Conductor mailbox is closed");
        }
    }
}
