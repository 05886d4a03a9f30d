mod parser;
mod types;

#[cfg(test)]
mod tests;

use crate::{SearchResult, Video, VideoId};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

pub use parser::{parse_iso8601_duration, parse_video_id, ParseError};

const YOUTUBE_API_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, thiserror::Error)]
pub enum YouTubeClientError {
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),
    #[error(transparent)]
    ParseError(#[from] ParseError),
}

pub struct YouTubeClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl YouTubeClient {
    pub fn create(api_key: &str) -> Result<Self, YouTubeClientError> {
        Self::with_endpoint(api_key, YOUTUBE_API_ENDPOINT)
    }

    pub fn with_endpoint(api_key: &str, endpoint: &str) -> Result<Self, YouTubeClientError> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the best matching video for a free-text query.
    pub async fn search_video(
        &self,
        query_str: &str,
    ) -> Result<Option<SearchResult>, YouTubeClientError> {
        #[derive(Serialize)]
        struct Query<'a> {
            part: &'a str,
            #[serde(rename = "type")]
            kind: &'a str,
            #[serde(rename = "maxResults")]
            max_results: u32,
            q: &'a str,
            key: &'a str,
        }

        let query = Query {
            part: "snippet",
            kind: "video",
            max_results: 1,
            q: query_str,
            key: &self.api_key,
        };

        debug!(query = query_str, "Searching YouTube...");

        let raw_json = self
            .client
            .get(format!("{}/search", self.endpoint))
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(parser::parse_search_results(&raw_json)?.into_iter().next())
    }

    pub async fn get_video(&self, video_id: &VideoId) -> Result<Option<Video>, YouTubeClientError> {
        #[derive(Serialize)]
        struct Query<'a> {
            part: &'a str,
            id: &'a str,
            key: &'a str,
        }

        let query = Query {
            part: "snippet,contentDetails",
            id: video_id,
            key: &self.api_key,
        };

        let raw_json = self
            .client
            .get(format!("{}/videos", self.endpoint))
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(parser::parse_video(&raw_json)?)
    }
}
