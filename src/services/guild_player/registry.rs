use crate::services::guild_player::conductor::{
    Conductor, ConductorMessage, LastActive, Mailbox, QueueStateError,
};
use crate::services::guild_player::downloader::{DownloadOrchestrator, DownloadStatus};
use crate::services::guild_player::playback::{PlaybackEngine, PlaybackError};
use crate::services::guild_player::queue::GuildQueue;
use crate::services::guild_player::resolver::{CachingResolver, ResolutionError};
use crate::services::guild_player::retry::RetryPolicy;
use crate::services::guild_player::traits::{
    ContentStore, MediaFetcher, Transport, TransportError,
};
use crate::services::guild_player::types::{NowPlaying, Progress, Song, SongInfo};
use crate::types::GuildId;
use async_lock::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub(crate) enum CommandError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    QueueState(#[from] QueueStateError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Guild {0} is not available")]
    GuildUnavailable(GuildId),
}

impl CommandError {
    fn from_playback(error: PlaybackError) -> Self {
        match error {
            PlaybackError::InvalidState { action, state } => {
                QueueStateError::InvalidPlaybackState { action, state }.into()
            }
            error => error.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct PlayerSettings {
    pub(crate) max_concurrent_downloads: usize,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) monitor_interval: Duration,
    pub(crate) conductor_interval: Duration,
    pub(crate) progress_interval: Duration,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 2,
            retry_policy: RetryPolicy::default(),
            monitor_interval: Duration::from_millis(500),
            conductor_interval: Duration::from_secs(1),
            progress_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct EnqueuedSong {
    pub(crate) song: SongInfo,
    pub(crate) position: usize,
}

/// Components of one guild. Dropped from the registry on teardown.
struct GuildPlayer {
    guild_id: GuildId,
    queue: Arc<GuildQueue>,
    engine: Arc<PlaybackEngine>,
    downloader: Arc<DownloadOrchestrator>,
    mailbox: Mailbox,
    cancel: CancellationToken,
    last_active: LastActive,
}

impl GuildPlayer {
    fn spawn(
        guild_id: GuildId,
        settings: &PlayerSettings,
        transport: Arc<dyn Transport>,
        fetcher: Arc<dyn MediaFetcher>,
        content_store: Arc<dyn ContentStore>,
    ) -> Self {
        let queue = Arc::new(GuildQueue::new(guild_id));
        let downloader = Arc::new(DownloadOrchestrator::new(
            guild_id,
            Arc::clone(&queue),
            fetcher,
            content_store,
            settings.retry_policy.clone(),
            settings.max_concurrent_downloads,
            settings.monitor_interval,
        ));
        let engine = Arc::new(PlaybackEngine::new(
            guild_id,
            Arc::clone(&transport),
            settings.progress_interval,
        ));
        let cancel = CancellationToken::new();
        let (mailbox, receiver) = mpsc::unbounded_channel();
        let last_active: LastActive = Arc::new(Mutex::new(Instant::now()));

        let conductor = Conductor::new(
            guild_id,
            Arc::clone(&queue),
            Arc::clone(&downloader),
            Arc::clone(&engine),
            transport,
            mailbox.clone(),
            Arc::clone(&last_active),
            settings.conductor_interval,
            cancel.child_token(),
        );

        actix_rt::spawn(conductor.run(receiver));
        actix_rt::spawn(Arc::clone(&downloader).monitor_loop(cancel.child_token()));

        info!(%guild_id, "Guild player created");

        Self {
            guild_id,
            queue,
            engine,
            downloader,
            mailbox,
            cancel,
            last_active,
        }
    }

    fn post(&self, message: ConductorMessage) -> Result<(), CommandError> {
        self.mailbox
            .send(message)
            .map_err(|_| CommandError::GuildUnavailable(self.guild_id))
    }

    async fn touch(&self) {
        *self.last_active.lock().await = Instant::now();
    }

    async fn is_idle_for(&self, idle_for: Duration) -> bool {
        !self.queue.is_playing().await
            && self.queue.len().await == 0
            && self.last_active.lock().await.elapsed() >= idle_for
    }

    fn teardown(&self) {
        self.cancel.cancel();

        info!(guild_id = %self.guild_id, "Guild player torn down");
    }
}

/// Entry point for all guild commands. Guild components are created on first use and torn
/// down on disconnect.
pub(crate) struct GuildRegistry {
    players: RwLock<HashMap<GuildId, Arc<GuildPlayer>>>,
    resolver: Arc<CachingResolver>,
    transport: Arc<dyn Transport>,
    fetcher: Arc<dyn MediaFetcher>,
    content_store: Arc<dyn ContentStore>,
    settings: PlayerSettings,
}

impl GuildRegistry {
    pub(crate) fn new(
        resolver: Arc<CachingResolver>,
        transport: Arc<dyn Transport>,
        fetcher: Arc<dyn MediaFetcher>,
        content_store: Arc<dyn ContentStore>,
        settings: PlayerSettings,
    ) -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            resolver,
            transport,
            fetcher,
            content_store,
            settings,
        }
    }

    async fn get(&self, guild_id: &GuildId) -> Option<Arc<GuildPlayer>> {
        self.players.read().await.get(guild_id).cloned()
    }

    async fn get_or_create(&self, guild_id: &GuildId) -> Arc<GuildPlayer> {
        if let Some(player) = self.get(guild_id).await {
            return player;
        }

        let mut players = self.players.write().await;

        let player = players.entry(*guild_id).or_insert_with(|| {
            Arc::new(GuildPlayer::spawn(
                *guild_id,
                &self.settings,
                Arc::clone(&self.transport),
                Arc::clone(&self.fetcher),
                Arc::clone(&self.content_store),
            ))
        });

        Arc::clone(player)
    }

    pub(crate) async fn connect(&self, guild_id: &GuildId) -> Result<(), CommandError> {
        self.transport.connect(guild_id).await?;

        let player = self.get_or_create(guild_id).await;
        player.touch().await;
        player.post(ConductorMessage::Wake)?;

        info!(%guild_id, "Guild connected");

        Ok(())
    }

    /// Tears the guild down and leaves the transport. Returns `false` for unknown guilds.
    pub(crate) async fn disconnect(&self, guild_id: &GuildId) -> Result<bool, CommandError> {
        let player = self.players.write().await.remove(guild_id);

        if let Some(player) = &player {
            player.teardown();
            player.engine.stop().await;
        }

        if self.transport.is_connected(guild_id).await {
            self.transport.disconnect(guild_id).await?;
        }

        info!(%guild_id, "Guild disconnected");

        Ok(player.is_some())
    }

    pub(crate) async fn enqueue(
        &self,
        guild_id: &GuildId,
        query: &str,
    ) -> Result<EnqueuedSong, CommandError> {
        let media = self.resolver.resolve_query(query).await?;
        let song = Song::new(media);
        let info = song.info();

        let player = self.get_or_create(guild_id).await;
        let position = player.queue.add(song).await;

        player.touch().await;
        player.post(ConductorMessage::Wake)?;

        info!(%guild_id, song_id = %info.id, position, "Song enqueued");

        Ok(EnqueuedSong {
            song: info,
            position,
        })
    }

    /// Removes the queued song at the 1-based `position`.
    pub(crate) async fn remove(
        &self,
        guild_id: &GuildId,
        position: usize,
    ) -> Result<SongInfo, CommandError> {
        let player = self
            .get(guild_id)
            .await
            .ok_or(QueueStateError::NoSuchEntry(position))?;

        let song = match position.checked_sub(1) {
            Some(index) => player.queue.remove(index).await,
            None => None,
        }
        .ok_or(QueueStateError::NoSuchEntry(position))?;

        player.touch().await;

        info!(%guild_id, song_id = %song.id, position, "Song removed from the queue");

        Ok(song.info())
    }

    pub(crate) async fn skip(&self, guild_id: &GuildId) -> Result<SongInfo, CommandError> {
        let player = self
            .get(guild_id)
            .await
            .ok_or(QueueStateError::NothingPlaying)?;
        let current = player
            .queue
            .current()
            .await
            .ok_or(QueueStateError::NothingPlaying)?;

        let (reply, response) = oneshot::channel();

        player.post(ConductorMessage::Skip {
            expected_entry: current.entry_id,
            reply,
        })?;
        player.touch().await;

        let skipped = response
            .await
            .map_err(|_| CommandError::GuildUnavailable(*guild_id))??;

        Ok(skipped)
    }

    pub(crate) async fn pause(&self, guild_id: &GuildId) -> Result<Progress, CommandError> {
        let player = self
            .get(guild_id)
            .await
            .ok_or(QueueStateError::NothingPlaying)?;

        player.touch().await;
        player
            .engine
            .pause()
            .await
            .map_err(CommandError::from_playback)
    }

    pub(crate) async fn resume(&self, guild_id: &GuildId) -> Result<Progress, CommandError> {
        let player = self
            .get(guild_id)
            .await
            .ok_or(QueueStateError::NothingPlaying)?;

        player.touch().await;
        player
            .engine
            .resume()
            .await
            .map_err(CommandError::from_playback)
    }

    /// Stops playback and clears the queue. Returns the number of dropped queue entries.
    pub(crate) async fn stop(&self, guild_id: &GuildId) -> Result<usize, CommandError> {
        let player = match self.get(guild_id).await {
            Some(player) => player,
            None => return Ok(0),
        };

        let (reply, response) = oneshot::channel();

        player.post(ConductorMessage::Stop { reply })?;
        player.touch().await;

        response
            .await
            .map_err(|_| CommandError::GuildUnavailable(*guild_id))
    }

    /// Drops every queued song and keeps the current one playing. Returns the number of dropped
    /// queue entries.
    pub(crate) async fn clear(&self, guild_id: &GuildId) -> Result<usize, CommandError> {
        let player = match self.get(guild_id).await {
            Some(player) => player,
            None => return Ok(0),
        };

        let (reply, response) = oneshot::channel();

        player.post(ConductorMessage::Clear { reply })?;
        player.touch().await;

        response
            .await
            .map_err(|_| CommandError::GuildUnavailable(*guild_id))
    }

    pub(crate) async fn queue_snapshot(&self, guild_id: &GuildId) -> Vec<SongInfo> {
        match self.get(guild_id).await {
            Some(player) => player.queue.snapshot().await,
            None => vec![],
        }
    }

    pub(crate) async fn currently_playing(&self, guild_id: &GuildId) -> Option<NowPlaying> {
        let player = self.get(guild_id).await?;
        let song = player.queue.current().await?;
        let progress = player.engine.progress().await;

        Some(NowPlaying {
            song: song.info(),
            display: progress.display(),
            progress,
        })
    }

    pub(crate) async fn progress(&self, guild_id: &GuildId) -> Progress {
        match self.get(guild_id).await {
            Some(player) => player.engine.progress().await,
            None => Progress::idle(),
        }
    }

    pub(crate) async fn download_status(&self, guild_id: &GuildId) -> Option<DownloadStatus> {
        Some(self.get(guild_id).await?.downloader.status().await)
    }

    pub(crate) async fn guild_ids(&self) -> Vec<GuildId> {
        self.players.read().await.keys().copied().collect()
    }

    /// Disconnects guilds that have nothing queued or playing and saw neither a command nor a
    /// playback transition for `idle_for`.
    pub(crate) async fn remove_idle(&self, idle_for: Duration) -> Vec<GuildId> {
        let players: Vec<_> = self.players.read().await.values().cloned().collect();
        let mut removed = vec![];

        for player in players {
            if !player.is_idle_for(idle_for).await {
                continue;
            }

            match self.disconnect(&player.guild_id).await {
                Ok(_) => removed.push(player.guild_id),
                Err(error) => {
                    warn!(guild_id = %player.guild_id, ?error, "Unable to disconnect idle guild")
                }
            }
        }

        if !removed.is_empty() {
            debug!(count = removed.len(), "Idle guilds removed");
        }

        removed
    }

    pub(crate) async fn shutdown(&self) {
        let players: Vec<_> = self.players.write().await.drain().collect();

        for (guild_id, player) in players {
            player.teardown();
            player.engine.stop().await;

            if let Err(error) = self.transport.disconnect(&guild_id).await {
                debug!(%guild_id, ?error, "Transport disconnect failed during shutdown");
            }
        }

        info!("All guild players stopped");
    }
}
