use super::mocks::{song, MockTransport};
use super::playback::{PlaybackEngine, PlaybackError};
use super::traits::TransportError;
use super::types::{PlaybackState, Song};
use crate::types::GuildId;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const GUILD: GuildId = GuildId(1);

fn engine(transport: &Arc<MockTransport>) -> PlaybackEngine {
    PlaybackEngine::new(GUILD, transport.clone(), Duration::from_millis(10))
}

fn downloaded(id: &str) -> Song {
    let mut song = song(id);
    song.set_downloaded(PathBuf::from(format!("music/{}.audio", id)));
    song
}

type Completions = Arc<Mutex<Vec<(u64, bool)>>>;

fn recorder() -> (Completions, impl FnOnce(u64, Option<TransportError>) + Send + 'static) {
    let completions = Completions::default();
    let callback = {
        let completions = completions.clone();
        move |generation: u64, error: Option<TransportError>| {
            completions.lock().unwrap().push((generation, error.is_some()))
        }
    };

    (completions, callback)
}

#[actix_rt::test]
async fn should_start_stream_of_downloaded_song() {
    let transport = Arc::new(MockTransport::new().with_connected(GUILD));
    let engine = engine(&transport);

    let generation = engine
        .play(&downloaded("a"), |_, _| {})
        .await
        .expect("Play should succeed");

    assert_eq!(1, generation);
    assert_eq!(PlaybackState::Playing, engine.state().await);
    assert_eq!(vec![PathBuf::from("music/a.audio")], transport.started());

    let progress = engine.progress().await;
    assert_eq!(180, progress.total_seconds);
    assert_eq!(PlaybackState::Playing, progress.state);
}

#[actix_rt::test]
async fn should_refuse_song_that_is_not_downloaded() {
    let transport = Arc::new(MockTransport::new().with_connected(GUILD));
    let engine = engine(&transport);

    let result = engine.play(&song("a"), |_, _| {}).await;

    assert!(matches!(result, Err(PlaybackError::NotDownloaded(_))));
    assert!(transport.started().is_empty());
}

#[actix_rt::test]
async fn should_refuse_to_play_without_connection() {
    let transport = Arc::new(MockTransport::new());
    let engine = engine(&transport);

    let result = engine.play(&downloaded("a"), |_, _| {}).await;

    assert!(matches!(result, Err(PlaybackError::TransportUnavailable)));
    assert_eq!(PlaybackState::Idle, engine.state().await);
}

#[actix_rt::test]
async fn should_only_play_from_idle() {
    let transport = Arc::new(MockTransport::new().with_connected(GUILD));
    let engine = engine(&transport);

    engine.play(&downloaded("a"), |_, _| {}).await.unwrap();
    let result = engine.play(&downloaded("b"), |_, _| {}).await;

    assert!(matches!(
        result,
        Err(PlaybackError::InvalidState {
            action: "play",
            state: PlaybackState::Playing
        })
    ));
    assert_eq!(1, transport.started().len());
}

#[actix_rt::test]
async fn should_reject_pause_and_resume_in_wrong_state() {
    let transport = Arc::new(MockTransport::new().with_connected(GUILD));
    let engine = engine(&transport);

    assert!(matches!(
        engine.pause().await,
        Err(PlaybackError::InvalidState { action: "pause", .. })
    ));

    engine.play(&downloaded("a"), |_, _| {}).await.unwrap();

    assert!(matches!(
        engine.resume().await,
        Err(PlaybackError::InvalidState { action: "resume", .. })
    ));
}

#[actix_rt::test]
async fn should_freeze_elapsed_time_while_paused() {
    let transport = Arc::new(MockTransport::new().with_connected(GUILD));
    let engine = engine(&transport);

    engine.play(&downloaded("a"), |_, _| {}).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let paused = engine.pause().await.expect("Pause should succeed");
    assert_eq!(PlaybackState::Paused, paused.state);
    let at_pause = engine.elapsed().await;

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(at_pause, engine.elapsed().await);

    engine.resume().await.expect("Resume should succeed");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let resumed = engine.elapsed().await - at_pause;
    assert!(resumed >= Duration::from_millis(100), "{:?}", resumed);
    assert!(resumed < Duration::from_millis(240), "{:?}", resumed);
    assert_eq!(
        vec!["start", "pause", "resume"],
        transport.events()
    );
}

#[actix_rt::test]
async fn should_report_position_sampled_by_tracker() {
    let transport = Arc::new(MockTransport::new().with_connected(GUILD));
    let engine = engine(&transport);

    engine.play(&downloaded("a"), |_, _| {}).await.unwrap();
    assert_eq!(0, engine.progress().await.elapsed_seconds);

    tokio::time::sleep(Duration::from_millis(1_100)).await;

    let playing = engine.progress().await;
    assert_eq!(PlaybackState::Playing, playing.state);
    assert_eq!(1, playing.elapsed_seconds);
    assert_eq!("0:01/3:00", playing.display());

    let paused = engine.pause().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_000)).await;

    assert_eq!(1, paused.elapsed_seconds);
    assert_eq!(paused, engine.progress().await);
}

#[actix_rt::test]
async fn should_deliver_completion_with_generation() {
    let transport = Arc::new(MockTransport::new().with_connected(GUILD));
    let engine = engine(&transport);
    let (completions, callback) = recorder();

    let generation = engine.play(&downloaded("a"), callback).await.unwrap();
    transport.finish(GUILD, Some(TransportError::StreamFailed("eof".into())));

    assert_eq!(vec![(generation, true)], *completions.lock().unwrap());
    assert!(engine.finish(generation).await);
    assert_eq!(PlaybackState::Idle, engine.state().await);
    assert_eq!(0, engine.progress().await.total_seconds);
}

#[actix_rt::test]
async fn should_ignore_stale_completion_after_stop() {
    let transport = Arc::new(MockTransport::new().with_connected(GUILD));
    let engine = engine(&transport);
    let (completions, callback) = recorder();

    let first = engine.play(&downloaded("a"), callback).await.unwrap();

    assert!(engine.stop().await);
    assert_eq!(vec![(first, false)], *completions.lock().unwrap());

    let second = engine.play(&downloaded("b"), |_, _| {}).await.unwrap();

    assert!(second > first);
    assert!(!engine.finish(first).await);
    assert_eq!(PlaybackState::Playing, engine.state().await);
}

#[actix_rt::test]
async fn should_treat_stop_while_idle_as_noop() {
    let transport = Arc::new(MockTransport::new().with_connected(GUILD));
    let engine = engine(&transport);

    assert!(!engine.stop().await);
    assert!(transport.events().is_empty());
}

#[actix_rt::test]
async fn should_report_idle_progress_after_stop() {
    let transport = Arc::new(MockTransport::new().with_connected(GUILD));
    let engine = engine(&transport);

    engine.play(&downloaded("a"), |_, _| {}).await.unwrap();
    engine.pause().await.unwrap();
    engine.stop().await;

    let progress = engine.progress().await;
    assert_eq!(PlaybackState::Idle, progress.state);
    assert_eq!("0:00/0:00", progress.display());
}
