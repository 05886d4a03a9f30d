use crate::services::guild_player::traits::{Transport, TransportError};
use crate::services::guild_player::types::{PlaybackState, Progress, Song};
use crate::types::{GuildId, SongId};
use actix_rt::task::JoinHandle;
use async_lock::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub(crate) enum PlaybackError {
    #[error("Transport is not connected")]
    TransportUnavailable,
    #[error("Unable to {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: PlaybackState,
    },
    #[error("Song {0} is not downloaded")]
    NotDownloaded(SongId),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

struct EngineState {
    state: PlaybackState,
    generation: u64,
    started_at: Instant,
    position: Duration,
    total_seconds: u64,
    tracker: Option<JoinHandle<()>>,
}

impl EngineState {
    fn reset(&mut self) {
        if let Some(tracker) = self.tracker.take() {
            tracker.abort();
        }

        self.state = PlaybackState::Idle;
        self.position = Duration::ZERO;
        self.total_seconds = 0;
    }

    fn elapsed(&self) -> Duration {
        match self.state {
            PlaybackState::Playing => self.started_at.elapsed(),
            PlaybackState::Paused => self.position,
            PlaybackState::Idle => Duration::ZERO,
        }
    }

    /// Position last recorded by the tracker, or by pause while Paused.
    fn sampled(&self) -> Duration {
        match self.state {
            PlaybackState::Idle => Duration::ZERO,
            _ => self.position,
        }
    }
}

/// Idle/Playing/Paused state machine of one guild on top of the transport.
///
/// Every successful `play` starts a new stream generation. Completions carry their generation,
/// so a completion of a stream that was already stopped or replaced is ignored by `finish`.
pub(crate) struct PlaybackEngine {
    guild_id: GuildId,
    transport: Arc<dyn Transport>,
    tracking_interval: Duration,
    state: Arc<Mutex<EngineState>>,
}

impl PlaybackEngine {
    pub(crate) fn new(
        guild_id: GuildId,
        transport: Arc<dyn Transport>,
        tracking_interval: Duration,
    ) -> Self {
        Self {
            guild_id,
            transport,
            tracking_interval,
            state: Arc::new(Mutex::new(EngineState {
                state: PlaybackState::Idle,
                generation: 0,
                started_at: Instant::now(),
                position: Duration::ZERO,
                total_seconds: 0,
                tracker: None,
            })),
        }
    }

    /// Starts streaming the downloaded song and returns the generation of the new stream.
    /// `on_complete` receives that generation once the transport reports the end of the stream.
    pub(crate) async fn play<F>(&self, song: &Song, on_complete: F) -> Result<u64, PlaybackError>
    where
        F: FnOnce(u64, Option<TransportError>) + Send + 'static,
    {
        let path = match song.local_path() {
            Some(path) if song.is_downloaded() => path.clone(),
            _ => return Err(PlaybackError::NotDownloaded(song.id.clone())),
        };

        let mut engine = self.state.lock().await;

        if engine.state != PlaybackState::Idle {
            return Err(PlaybackError::InvalidState {
                action: "play",
                state: engine.state,
            });
        }

        if !self.transport.is_connected(&self.guild_id).await {
            warn!(guild_id = %self.guild_id, song_id = %song.id, "Transport is not connected");
            return Err(PlaybackError::TransportUnavailable);
        }

        // Bumped before streaming so an immediate completion already carries the new generation.
        engine.generation += 1;
        let generation = engine.generation;

        self.transport
            .start_stream(
                &self.guild_id,
                &path,
                Box::new(move |error| on_complete(generation, error)),
            )
            .await?;

        engine.state = PlaybackState::Playing;
        engine.started_at = Instant::now();
        engine.position = Duration::ZERO;
        engine.total_seconds = song.duration_seconds;
        engine.tracker = Some(self.spawn_tracker(generation));

        info!(guild_id = %self.guild_id, song_id = %song.id, generation, "Playback started");

        Ok(generation)
    }

    pub(crate) async fn pause(&self) -> Result<Progress, PlaybackError> {
        let mut engine = self.state.lock().await;

        if engine.state != PlaybackState::Playing {
            return Err(PlaybackError::InvalidState {
                action: "pause",
                state: engine.state,
            });
        }

        self.transport.pause(&self.guild_id).await?;

        engine.position = engine.started_at.elapsed();
        engine.state = PlaybackState::Paused;

        debug!(guild_id = %self.guild_id, position = ?engine.position, "Playback paused");

        Ok(progress_of(&engine))
    }

    pub(crate) async fn resume(&self) -> Result<Progress, PlaybackError> {
        let mut engine = self.state.lock().await;

        if engine.state != PlaybackState::Paused {
            return Err(PlaybackError::InvalidState {
                action: "resume",
                state: engine.state,
            });
        }

        self.transport.resume(&self.guild_id).await?;

        let now = Instant::now();
        engine.started_at = now.checked_sub(engine.position).unwrap_or(now);
        engine.state = PlaybackState::Playing;

        debug!(guild_id = %self.guild_id, position = ?engine.position, "Playback resumed");

        Ok(progress_of(&engine))
    }

    /// Stops the active stream. Returns `false` if nothing was playing.
    pub(crate) async fn stop(&self) -> bool {
        let mut engine = self.state.lock().await;

        if engine.state == PlaybackState::Idle {
            return false;
        }

        engine.reset();

        if let Err(error) = self.transport.stop(&self.guild_id).await {
            warn!(guild_id = %self.guild_id, ?error, "Unable to stop transport stream");
        }

        info!(guild_id = %self.guild_id, generation = engine.generation, "Playback stopped");

        true
    }

    /// Moves to Idle if `generation` is the active stream. Stale completions return `false`.
    pub(crate) async fn finish(&self, generation: u64) -> bool {
        let mut engine = self.state.lock().await;

        if engine.generation != generation || engine.state == PlaybackState::Idle {
            return false;
        }

        engine.reset();

        true
    }

    /// Reported position advances with the tracker, once per tracking interval.
    pub(crate) async fn progress(&self) -> Progress {
        progress_of(&*self.state.lock().await)
    }

    pub(crate) async fn elapsed(&self) -> Duration {
        self.state.lock().await.elapsed()
    }

    pub(crate) async fn state(&self) -> PlaybackState {
        self.state.lock().await.state
    }

    fn spawn_tracker(&self, generation: u64) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let interval = self.tracking_interval;

        actix_rt::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let mut engine = state.lock().await;

                if engine.generation != generation || engine.state == PlaybackState::Idle {
                    break;
                }

                if engine.state == PlaybackState::Playing {
                    engine.position = engine.started_at.elapsed();
                }
            }
        })
    }
}

fn progress_of(engine: &EngineState) -> Progress {
    if engine.state == PlaybackState::Idle {
        return Progress::idle();
    }

    let elapsed_seconds = engine.sampled().as_secs();

    Progress {
        elapsed_seconds: match engine.total_seconds {
            0 => elapsed_seconds,
            total => elapsed_seconds.min(total),
        },
        total_seconds: engine.total_seconds,
        state: engine.state,
    }
}
