use crate::services::guild_player::{ResolvedMedia, Resolver, ResolverError};
use crate::types::SongId;
use async_trait::async_trait;
use search_providers::{parse_video_id, Video, YouTubeClient};
use tracing::debug;

fn to_resolved_media(video: Video) -> ResolvedMedia {
    ResolvedMedia {
        id: SongId(video.video_id.to_string()),
        source_url: video.watch_url(),
        title: video.title,
        duration_seconds: video.duration_seconds,
        thumbnail_url: video.thumbnail_url,
    }
}

/// Links are looked up directly, anything else goes through search first.
#[async_trait]
impl Resolver for YouTubeClient {
    async fn resolve(&self, query: &str) -> Result<Option<ResolvedMedia>, ResolverError> {
        let video_id = match parse_video_id(query) {
            Some(video_id) => video_id,
            None => match self.search_video(query.trim()).await.map_err(ResolverError::new)? {
                Some(result) => {
                    debug!(query, video_id = %result.video_id, title = %result.title, "Search matched");
                    result.video_id
                }
                None => return Ok(None),
            },
        };

        let video = self
            .get_video(&video_id)
            .await
            .map_err(ResolverError::new)?;

        Ok(video.map(to_resolved_media))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_video_to_resolved_media() {
        let video = Video {
            video_id: "2oaFCU1pFN0".into(),
            title: "Robert Miles - Children".into(),
            duration_seconds: 451,
            thumbnail_url: "https://i.ytimg.com/vi/2oaFCU1pFN0/default.jpg".into(),
        };

        let media = to_resolved_media(video);

        assert_eq!(SongId::from("2oaFCU1pFN0"), media.id);
        assert_eq!("https://www.youtube.com/watch?v=2oaFCU1pFN0", media.source_url);
        assert_eq!(451, media.duration_seconds);
    }
}
