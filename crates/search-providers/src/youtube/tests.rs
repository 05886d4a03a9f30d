use crate::youtube::parser::{
    parse_iso8601_duration, parse_search_results, parse_video, parse_video_id,
};
use crate::{SearchResult, Video, VideoId};

#[test]
fn test_parsing_of_search_results() {
    let results = parse_search_results(include_str!("fixtures/search_results.json"))
        .expect("Expected successful parse results");

    let expected_results = vec![SearchResult {
        video_id: VideoId("2oaFCU1pFN0".into()),
        title: "Robert Miles - Children [Dream Version]".into(),
        channel_title: "Robert Miles".into(),
    }];

    assert_eq!(expected_results, results);
}

#[test]
fn test_parsing_of_video() {
    let video = parse_video(include_str!("fixtures/video.json"))
        .expect("Expected successful parse results");

    assert_eq!(
        Some(Video {
            video_id: VideoId("2oaFCU1pFN0".into()),
            title: "Robert Miles - Children [Dream Version]".into(),
            duration_seconds: 451,
            thumbnail_url: "https://i.ytimg.com/vi/2oaFCU1pFN0/default.jpg".into(),
        }),
        video
    );
}

#[test]
fn test_parsing_of_empty_video_list() {
    let video = parse_video(r#"{"items": []}"#).expect("Expected successful parse results");

    assert_eq!(None, video);
}

#[test]
fn test_parsing_of_durations() {
    assert_eq!(Some(451), parse_iso8601_duration("PT7M31S"));
    assert_eq!(Some(3_723), parse_iso8601_duration("PT1H2M3S"));
    assert_eq!(Some(90_000), parse_iso8601_duration("P1DT1H"));
    assert_eq!(Some(0), parse_iso8601_duration("P0D"));
    assert_eq!(None, parse_iso8601_duration("7M31S"));
    assert_eq!(None, parse_iso8601_duration("PT7X"));
    assert_eq!(None, parse_iso8601_duration("PT9999999999999999H"));
    assert_eq!(None, parse_iso8601_duration("P18446744073709551615DT1S"));
}

#[test]
fn test_parsing_of_video_urls() {
    let expected = Some(VideoId("2oaFCU1pFN0".into()));

    assert_eq!(
        expected,
        parse_video_id("https://www.youtube.com/watch?v=2oaFCU1pFN0&t=42")
    );
    assert_eq!(expected, parse_video_id("https://youtu.be/2oaFCU1pFN0"));
    assert_eq!(
        expected,
        parse_video_id("https://m.youtube.com/shorts/2oaFCU1pFN0")
    );
    assert_eq!(None, parse_video_id("robert miles children"));
    assert_eq!(None, parse_video_id("https://example.com/watch?v=2oaFCU1pFN0"));
}
