use crate::services::guild_player::types::ResolvedMedia;
use crate::utils::normalize_query;
use async_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SIMILARITY_THRESHOLD: f64 = 0.9;

#[derive(Debug, thiserror::Error)]
pub(crate) enum DownloadCacheError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Default, Serialize, Deserialize)]
struct CacheDocument {
    #[serde(default)]
    queries: HashMap<String, ResolvedMedia>,
    #[serde(default)]
    videos: HashMap<String, ResolvedMedia>,
}

/// Remembers what queries and video ids resolved to. Entries are never replaced or evicted.
pub(crate) struct DownloadCache {
    document: RwLock<CacheDocument>,
    path: Option<PathBuf>,
}

impl DownloadCache {
    pub(crate) fn in_memory() -> Self {
        Self {
            document: RwLock::new(CacheDocument::default()),
            path: None,
        }
    }

    /// Loads the cache file if it exists. A corrupt file is logged and replaced on the next insert.
    pub(crate) async fn load(path: impl Into<PathBuf>) -> Result<Self, DownloadCacheError> {
        let path = path.into();

        let document = match tokio::fs::read_to_string(&path).await {
            Ok(raw_json) => match serde_json::from_str::<CacheDocument>(&raw_json) {
                Ok(document) => document,
                Err(error) => {
                    warn!(?error, ?path, "Unable to parse download cache, starting empty");
                    CacheDocument::default()
                }
            },
            Err(error) if matches!(error.kind(), std::io::ErrorKind::NotFound) => {
                CacheDocument::default()
            }
            Err(error) => return Err(error.into()),
        };

        debug!(
            queries = document.queries.len(),
            videos = document.videos.len(),
            "Download cache loaded"
        );

        Ok(Self {
            document: RwLock::new(document),
            path: Some(path),
        })
    }

    /// Exact match on the normalized query first, then the most similar cached query above 0.9.
    pub(crate) async fn lookup_query(&self, query: &str) -> Option<ResolvedMedia> {
        let normalized = normalize_query(query);
        let document = self.document.read().await;

        if let Some(media) = document.queries.get(&normalized) {
            return Some(media.clone());
        }

        document
            .queries
            .iter()
            .map(|(cached, media)| (strsim::normalized_levenshtein(&normalized, cached), media))
            .filter(|(score, _)| *score > SIMILARITY_THRESHOLD)
            .max_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(score, media)| {
                debug!(query, score, song_id = %media.id, "Fuzzy download cache hit");
                media.clone()
            })
    }

    pub(crate) async fn lookup_video(&self, video_id: &str) -> Option<ResolvedMedia> {
        self.document.read().await.videos.get(video_id).cloned()
    }

    /// Records the media under its id and, if given, under the normalized query.
    pub(crate) async fn insert(
        &self,
        query: Option<&str>,
        media: &ResolvedMedia,
    ) -> Result<(), DownloadCacheError> {
        let mut document = self.document.write().await;
        let mut changed = false;

        if let Some(query) = query.map(normalize_query).filter(|q| !q.is_empty()) {
            if !document.queries.contains_key(&query) {
                document.queries.insert(query, media.clone());
                changed = true;
            }
        }

        if !document.videos.contains_key(&media.id.0) {
            document.videos.insert(media.id.0.clone(), media.clone());
            changed = true;
        }

        match &self.path {
            Some(path) if changed => Self::persist(path, &document).await,
            _ => Ok(()),
        }
    }

    async fn persist(path: &Path, document: &CacheDocument) -> Result<(), DownloadCacheError> {
        let raw_json = serde_json::to_string_pretty(document)?;
        let temp_path = path.with_extension("json.tmp");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&temp_path, raw_json).await?;
        tokio::fs::rename(&temp_path, path).await?;

        Ok(())
    }
}
