use crate::services::guild_player::traits::{
    CompletionCallback, FetcherError, MediaFetcher, Resolver, ResolverError, Transport,
    TransportError,
};
use crate::services::guild_player::types::{ResolvedMedia, Song};
use crate::types::GuildId;
use crate::utils::normalize_query;
use async_trait::async_trait;
use search_providers::parse_video_id;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Polls the condition every 10ms and panics if it does not hold within 5 seconds.
macro_rules! wait_until {
    ($condition:expr) => {{
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);

        loop {
            if $condition {
                break;
            }

            if tokio::time::Instant::now() > deadline {
                panic!("Timed out waiting for: {}", stringify!($condition));
            }

            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }};
}

pub(crate) fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

pub(crate) fn media(id: &str) -> ResolvedMedia {
    ResolvedMedia {
        id: id.into(),
        title: format!("Song {}", id),
        duration_seconds: 180,
        thumbnail_url: String::new(),
        source_url: watch_url(id),
    }
}

pub(crate) fn song(id: &str) -> Song {
    Song::new(media(id))
}

pub(crate) struct MockResolver {
    calls: AtomicUsize,
    delay: Duration,
}

impl MockResolver {
    pub(crate) fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for MockResolver {
    async fn resolve(&self, query: &str) -> Result<Option<ResolvedMedia>, ResolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        if query.trim() == "nothing" {
            return Ok(None);
        }

        let id = match parse_video_id(query) {
            Some(video_id) => video_id.to_string(),
            None => normalize_query(query).replace(' ', "-"),
        };

        Ok(Some(media(&id)))
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum FetchBehavior {
    Succeed,
    Fail,
    FailTimes(u32),
    Hang,
}

pub(crate) struct MockFetcher {
    behaviors: Mutex<HashMap<String, FetchBehavior>>,
    calls: Mutex<HashMap<String, u32>>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self {
            behaviors: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            delay: Duration::from_millis(20),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }

    pub(crate) fn with_behavior(self, id: &str, behavior: FetchBehavior) -> Self {
        self.behaviors
            .lock()
            .unwrap()
            .insert(watch_url(id), behavior);
        self
    }

    pub(crate) fn calls(&self, id: &str) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(&watch_url(id))
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn fetch(&self, source_url: &str) -> Result<Vec<u8>, FetcherError> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let counter = calls.entry(source_url.to_string()).or_default();
            *counter += 1;
            *counter
        };
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(source_url)
            .copied()
            .unwrap_or(FetchBehavior::Succeed);

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        match behavior {
            FetchBehavior::Hang => tokio::time::sleep(Duration::from_secs(3_600)).await,
            _ => tokio::time::sleep(self.delay).await,
        }

        match behavior {
            FetchBehavior::Fail => Err(FetcherError::Process("boom".into())),
            FetchBehavior::FailTimes(times) if attempt <= times => {
                Err(FetcherError::Process("boom".into()))
            }
            _ => Ok(source_url.as_bytes().to_vec()),
        }
    }
}

pub(crate) struct MockTransport {
    connected: Mutex<HashSet<GuildId>>,
    streams: Mutex<HashMap<GuildId, CompletionCallback>>,
    started: Mutex<Vec<PathBuf>>,
    rejected: Mutex<HashSet<PathBuf>>,
    events: Mutex<Vec<String>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            connected: Mutex::new(HashSet::new()),
            streams: Mutex::new(HashMap::new()),
            started: Mutex::new(vec![]),
            rejected: Mutex::new(HashSet::new()),
            events: Mutex::new(vec![]),
        }
    }

    pub(crate) fn with_connected(self, guild_id: GuildId) -> Self {
        self.connected.lock().unwrap().insert(guild_id);
        self
    }

    pub(crate) fn set_connected(&self, guild_id: GuildId, connected: bool) {
        let mut guard = self.connected.lock().unwrap();

        if connected {
            guard.insert(guild_id);
        } else {
            guard.remove(&guild_id);
        }
    }

    /// Makes `start_stream` fail for the given file.
    pub(crate) fn reject(&self, path: PathBuf) {
        self.rejected.lock().unwrap().insert(path);
    }

    /// Ends the active stream as if the song played to the end.
    pub(crate) fn finish(&self, guild_id: GuildId, error: Option<TransportError>) -> bool {
        let callback = self.streams.lock().unwrap().remove(&guild_id);

        match callback {
            Some(callback) => {
                callback(error);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_streaming(&self, guild_id: GuildId) -> bool {
        self.streams.lock().unwrap().contains_key(&guild_id)
    }

    pub(crate) fn started(&self) -> Vec<PathBuf> {
        self.started.lock().unwrap().clone()
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: &str) {
        self.events.lock().unwrap().push(event.to_string());
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, guild_id: &GuildId) -> Result<(), TransportError> {
        self.record("connect");
        self.connected.lock().unwrap().insert(*guild_id);
        Ok(())
    }

    async fn disconnect(&self, guild_id: &GuildId) -> Result<(), TransportError> {
        self.record("disconnect");
        self.connected.lock().unwrap().remove(guild_id);
        self.streams.lock().unwrap().remove(guild_id);
        Ok(())
    }

    async fn is_connected(&self, guild_id: &GuildId) -> bool {
        self.connected.lock().unwrap().contains(guild_id)
    }

    async fn start_stream(
        &self,
        guild_id: &GuildId,
        path: &Path,
        on_finished: CompletionCallback,
    ) -> Result<(), TransportError> {
        if !self.connected.lock().unwrap().contains(guild_id) {
            return Err(TransportError::NotConnected);
        }

        if self.rejected.lock().unwrap().contains(path) {
            self.record("reject");
            return Err(TransportError::StreamFailed("unsupported format".into()));
        }

        let mut streams = self.streams.lock().unwrap();

        if streams.contains_key(guild_id) {
            return Err(TransportError::StreamFailed("already streaming".into()));
        }

        streams.insert(*guild_id, on_finished);
        self.started.lock().unwrap().push(path.to_path_buf());
        self.record("start");

        Ok(())
    }

    async fn pause(&self, guild_id: &GuildId) -> Result<(), TransportError> {
        if !self.is_streaming(*guild_id) {
            return Err(TransportError::NoActiveStream);
        }

        self.record("pause");
        Ok(())
    }

    async fn resume(&self, guild_id: &GuildId) -> Result<(), TransportError> {
        if !self.is_streaming(*guild_id) {
            return Err(TransportError::NoActiveStream);
        }

        self.record("resume");
        Ok(())
    }

    /// Like real voice transports, a stopped stream still reports its completion.
    async fn stop(&self, guild_id: &GuildId) -> Result<(), TransportError> {
        self.record("stop");
        self.finish(*guild_id, None);
        Ok(())
    }
}
