use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub(crate) struct SearchListResponse {
    #[serde(default)]
    pub(crate) items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchItem {
    pub(crate) id: SearchItemId,
    pub(crate) snippet: Snippet,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchItemId {
    #[serde(rename = "videoId")]
    pub(crate) video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VideoListResponse {
    #[serde(default)]
    pub(crate) items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VideoItem {
    pub(crate) id: String,
    pub(crate) snippet: Snippet,
    #[serde(rename = "contentDetails")]
    pub(crate) content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Snippet {
    pub(crate) title: String,
    #[serde(rename = "channelTitle", default)]
    pub(crate) channel_title: String,
    #[serde(default)]
    pub(crate) thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Thumbnail {
    pub(crate) url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentDetails {
    pub(crate) duration: String,
}
