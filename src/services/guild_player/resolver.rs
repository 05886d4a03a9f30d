use crate::services::guild_player::download_cache::DownloadCache;
use crate::services::guild_player::traits::{Resolver, ResolverError};
use crate::services::guild_player::types::ResolvedMedia;
use crate::utils::normalize_query;
use async_lock::Mutex;
use async_trait::async_trait;
use search_providers::parse_video_id;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub(crate) enum ResolutionError {
    #[error("Nothing found for \"{0}\"")]
    NotFound(String),
    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

type InFlight = HashMap<String, Arc<Mutex<()>>>;

/// Holds the per-key lock of one resolution. Dropping it forgets the key once no other caller
/// waits for it, also when the resolving future is cancelled.
struct KeyLock {
    in_flight: Arc<SyncMutex<InFlight>>,
    key: String,
    lock: Arc<Mutex<()>>,
}

impl KeyLock {
    async fn acquire(&self) -> async_lock::MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        let mut in_flight = match self.in_flight.lock() {
            Ok(in_flight) => in_flight,
            Err(poisoned) => poisoned.into_inner(),
        };

        // One reference is held by the map and one by this lock.
        if let Some(entry) = in_flight.get(&self.key) {
            if Arc::strong_count(entry) == 2 {
                in_flight.remove(&self.key);
            }
        }
    }
}

enum CacheKey {
    Video(String),
    Query(String),
}

impl CacheKey {
    fn from_query(query: &str) -> Self {
        match parse_video_id(query) {
            Some(video_id) => CacheKey::Video(video_id.to_string()),
            None => CacheKey::Query(normalize_query(query)),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            CacheKey::Video(id) | CacheKey::Query(id) => id,
        }
    }
}

/// Consults the download cache before the wrapped resolver and records what it resolves.
pub(crate) struct CachingResolver {
    inner: Arc<dyn Resolver>,
    cache: Arc<DownloadCache>,
    in_flight: Arc<SyncMutex<InFlight>>,
}

impl CachingResolver {
    pub(crate) fn new(inner: Arc<dyn Resolver>, cache: Arc<DownloadCache>) -> Self {
        Self {
            inner,
            cache,
            in_flight: Arc::default(),
        }
    }

    pub(crate) async fn resolve_query(&self, query: &str) -> Result<ResolvedMedia, ResolutionError> {
        self.resolve(query)
            .await?
            .ok_or_else(|| ResolutionError::NotFound(query.trim().to_string()))
    }

    async fn lookup(&self, key: &CacheKey) -> Option<ResolvedMedia> {
        match key {
            CacheKey::Video(id) => self.cache.lookup_video(id).await,
            CacheKey::Query(query) => self.cache.lookup_query(query).await,
        }
    }

    fn key_lock(&self, key: &CacheKey) -> KeyLock {
        let mut in_flight = match self.in_flight.lock() {
            Ok(in_flight) => in_flight,
            Err(poisoned) => poisoned.into_inner(),
        };
        let lock = Arc::clone(in_flight.entry(key.as_str().to_string()).or_default());

        KeyLock {
            in_flight: Arc::clone(&self.in_flight),
            key: key.as_str().to_string(),
            lock,
        }
    }

    #[cfg(test)]
    fn in_flight_keys(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }
}

#[async_trait]
impl Resolver for CachingResolver {
    async fn resolve(&self, query: &str) -> Result<Option<ResolvedMedia>, ResolverError> {
        let key = CacheKey::from_query(query);

        if let Some(media) = self.lookup(&key).await {
            debug!(query, song_id = %media.id, "Download cache hit");
            return Ok(Some(media));
        }

        // Identical queries wait for each other so they end up with one cached result.
        let key_lock = self.key_lock(&key);
        let _guard = key_lock.acquire().await;

        if let Some(media) = self.lookup(&key).await {
            return Ok(Some(media));
        }

        let resolved = self.inner.resolve(query).await;

        if let Ok(Some(media)) = &resolved {
            let cached_query = match &key {
                CacheKey::Query(query) => Some(query.as_str()),
                CacheKey::Video(_) => None,
            };

            if let Err(error) = self.cache.insert(cached_query, media).await {
                warn!(?error, "Unable to persist download cache");
            }
        }

        resolved
    }
}
