use crate::services::guild_player::types::ResolvedMedia;
use crate::types::{GuildId, SongId};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub(crate) struct ResolverError(Box<dyn std::error::Error + Send + Sync>);

impl ResolverError {
    pub(crate) fn new(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(error.into())
    }
}

#[async_trait]
pub(crate) trait Resolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Option<ResolvedMedia>, ResolverError>;
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum TransportError {
    #[error("Transport is not connected")]
    NotConnected,
    #[error("No active stream")]
    NoActiveStream,
    #[error("Stream failed: {0}")]
    StreamFailed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Invoked exactly once when a stream ends, from whatever task or thread the transport uses.
pub(crate) type CompletionCallback = Box<dyn FnOnce(Option<TransportError>) + Send + 'static>;

#[async_trait]
pub(crate) trait Transport: Send + Sync {
    async fn connect(&self, guild_id: &GuildId) -> Result<(), TransportError>;

    async fn disconnect(&self, guild_id: &GuildId) -> Result<(), TransportError>;

    async fn is_connected(&self, guild_id: &GuildId) -> bool;

    async fn start_stream(
        &self,
        guild_id: &GuildId,
        path: &Path,
        on_finished: CompletionCallback,
    ) -> Result<(), TransportError>;

    async fn pause(&self, guild_id: &GuildId) -> Result<(), TransportError>;

    async fn resume(&self, guild_id: &GuildId) -> Result<(), TransportError>;

    async fn stop(&self, guild_id: &GuildId) -> Result<(), TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ContentStoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Audio files keyed by song id, shared by all guilds.
#[async_trait]
pub(crate) trait ContentStore: Send + Sync {
    async fn exists(&self, id: &SongId) -> bool;

    async fn write(&self, id: &SongId, bytes: Vec<u8>) -> Result<PathBuf, ContentStoreError>;

    fn path_for(&self, id: &SongId) -> PathBuf;
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum FetcherError {
    #[error("Fetch process failed: {0}")]
    Process(String),
    #[error("Fetched content is empty")]
    Empty,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub(crate) trait MediaFetcher: Send + Sync {
    async fn fetch(&self, source_url: &str) -> Result<Vec<u8>, FetcherError>;
}
