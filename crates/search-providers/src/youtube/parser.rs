use crate::youtube::types::{SearchListResponse, Snippet, VideoListResponse};
use crate::{SearchResult, SearchResults, Video, VideoId};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
    #[error("Unsupported duration format: {0}")]
    DurationFormat(String),
}

const THUMBNAIL_PRIORITY: [&str; 3] = ["default", "medium", "high"];
const YOUTUBE_HOSTS: [&str; 4] = [
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];

fn pick_thumbnail(snippet: &Snippet) -> String {
    THUMBNAIL_PRIORITY
        .iter()
        .find_map(|size| snippet.thumbnails.get(*size))
        .or_else(|| snippet.thumbnails.values().next())
        .map(|thumbnail| thumbnail.url.clone())
        .unwrap_or_default()
}

pub(crate) fn parse_search_results(raw_json: &str) -> Result<SearchResults, ParseError> {
    let response: SearchListResponse = serde_json::from_str(raw_json)?;

    let results = response
        .items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id?;

            Some(SearchResult {
                video_id: VideoId(video_id),
                title: item.snippet.title,
                channel_title: item.snippet.channel_title,
            })
        })
        .collect();

    Ok(results)
}

pub(crate) fn parse_video(raw_json: &str) -> Result<Option<Video>, ParseError> {
    let response: VideoListResponse = serde_json::from_str(raw_json)?;

    let item = match response.items.into_iter().next() {
        Some(item) => item,
        None => return Ok(None),
    };

    let duration_seconds = parse_iso8601_duration(&item.content_details.duration)
        .ok_or_else(|| ParseError::DurationFormat(item.content_details.duration.clone()))?;
    let thumbnail_url = pick_thumbnail(&item.snippet);

    Ok(Some(Video {
        video_id: VideoId(item.id),
        title: item.snippet.title,
        duration_seconds,
        thumbnail_url,
    }))
}

/// Converts durations like `PT1H2M3S` into seconds. Live streams report `P0D`.
pub fn parse_iso8601_duration(duration: &str) -> Option<u64> {
    let rest = duration.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => (date, time),
        None => (rest, ""),
    };

    let mut seconds = 0u64;
    let mut number = String::new();

    let sections: [(&str, &[(char, u64)]); 2] = [
        (date_part, &[('W', 604_800), ('D', 86_400)]),
        (time_part, &[('H', 3_600), ('M', 60), ('S', 1)]),
    ];

    for (part, units) in sections {
        for ch in part.chars() {
            if ch.is_ascii_digit() {
                number.push(ch);
                continue;
            }

            let multiplier = units
                .iter()
                .find(|(unit, _)| *unit == ch)
                .map(|(_, multiplier)| *multiplier)?;
            let value = number.parse::<u64>().ok()?;

            seconds = value
                .checked_mul(multiplier)
                .and_then(|section| seconds.checked_add(section))?;
            number.clear();
        }

        if !number.is_empty() {
            return None;
        }
    }

    Some(seconds)
}

/// Extracts the video id from watch, short-link and shorts URLs.
pub fn parse_video_id(input: &str) -> Option<VideoId> {
    let url = Url::parse(input.trim()).ok()?;
    let host = url.host_str()?;

    let candidate = if host == "youtu.be" {
        url.path_segments()?.next().map(str::to_string)
    } else if YOUTUBE_HOSTS.contains(&host) {
        let mut segments = url.path_segments()?;
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some("shorts") | Some("embed") | Some("live") => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };

    candidate
        .filter(|id| {
            !id.is_empty()
                && id
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        })
        .map(VideoId)
}
