mod youtube;

use serde::{Deserialize, Serialize};
use std::ops::Deref;

pub use youtube::*;

#[derive(Debug, PartialEq)]
pub struct SearchResult {
    pub video_id: VideoId,
    pub title: String,
    pub channel_title: String,
}

pub type SearchResults = Vec<SearchResult>;

#[derive(Debug, PartialEq, Clone)]
pub struct Video {
    pub video_id: VideoId,
    pub title: String,
    pub duration_seconds: u64,
    pub thumbnail_url: String,
}

impl Video {
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

#[derive(Eq, PartialEq, Clone, Hash, Debug, Serialize, Deserialize)]
pub struct VideoId(pub(crate) String);

impl From<&str> for VideoId {
    fn from(value: &str) -> Self {
        VideoId(value.to_string())
    }
}

impl Deref for VideoId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
