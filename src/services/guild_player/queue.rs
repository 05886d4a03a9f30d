use crate::services::guild_player::types::{Song, SongInfo};
use crate::types::{EntryId, GuildId, SongId};
use async_lock::Mutex;
use std::collections::VecDeque;
use tracing::debug;

#[derive(Default)]
struct QueueState {
    songs: VecDeque<Song>,
    current_song: Option<Song>,
    is_playing: bool,
}

/// Ordered requests of one guild plus the song that is currently playing.
///
/// Every read and write goes through the queue's own lock, so mutations of a single guild are
/// serialized while different guilds never contend.
pub(crate) struct GuildQueue {
    guild_id: GuildId,
    state: Mutex<QueueState>,
}

impl GuildQueue {
    pub(crate) fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Appends the song to the tail and returns its 1-based position.
    pub(crate) async fn add(&self, song: Song) -> usize {
        let mut state = self.state.lock().await;

        debug!(guild_id = %self.guild_id, song_id = %song.id, "Song added to the queue");

        state.songs.push_back(song);
        state.songs.len()
    }

    pub(crate) async fn get_next(&self) -> Option<Song> {
        self.state.lock().await.songs.pop_front()
    }

    pub(crate) async fn requeue_front(&self, song: Song) {
        self.state.lock().await.songs.push_front(song);
    }

    pub(crate) async fn set_current(&self, song: Song) {
        let mut state = self.state.lock().await;

        state.current_song = Some(song);
        state.is_playing = true;
    }

    pub(crate) async fn clear_current(&self) {
        let mut state = self.state.lock().await;

        state.current_song = None;
        state.is_playing = false;
    }

    /// Empties the queue and returns how many entries were dropped.
    pub(crate) async fn clear(&self) -> usize {
        let mut state = self.state.lock().await;
        let removed = state.songs.len();

        state.songs.clear();

        removed
    }

    pub(crate) async fn remove(&self, index: usize) -> Option<Song> {
        self.state.lock().await.songs.remove(index)
    }

    pub(crate) async fn snapshot(&self) -> Vec<SongInfo> {
        let state = self.state.lock().await;

        state.songs.iter().map(Song::info).collect()
    }

    pub(crate) async fn peek(&self, count: usize) -> Vec<Song> {
        let state = self.state.lock().await;

        state.songs.iter().take(count).cloned().collect()
    }

    pub(crate) async fn len(&self) -> usize {
        self.state.lock().await.songs.len()
    }

    pub(crate) async fn current(&self) -> Option<Song> {
        self.state.lock().await.current_song.clone()
    }

    pub(crate) async fn is_playing(&self) -> bool {
        self.state.lock().await.is_playing
    }

    /// Applies `f` to the queued entry. Returns `false` when the entry has left the queue.
    pub(crate) async fn update<F>(&self, entry_id: &EntryId, f: F) -> bool
    where
        F: FnOnce(&mut Song),
    {
        let mut state = self.state.lock().await;

        match state.songs.iter_mut().find(|song| &song.entry_id == entry_id) {
            Some(song) => {
                f(song);
                true
            }
            None => false,
        }
    }

    /// Applies `f` to every queued entry of the song that passes `filter`.
    pub(crate) async fn update_by_song_id<P, F>(&self, id: &SongId, filter: P, mut f: F) -> usize
    where
        P: Fn(&Song) -> bool,
        F: FnMut(&mut Song),
    {
        let mut state = self.state.lock().await;
        let mut updated = 0;

        for song in state
            .songs
            .iter_mut()
            .filter(|song| &song.id == id && filter(song))
        {
            f(song);
            updated += 1;
        }

        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::guild_player::types::{DownloadState, ResolvedMedia};
    use std::path::PathBuf;

    fn song(id: &str) -> Song {
        Song::new(ResolvedMedia {
            id: id.into(),
            title: format!("Song {}", id),
            duration_seconds: 180,
            thumbnail_url: String::new(),
            source_url: format!("https://www.youtube.com/watch?v={}", id),
        })
    }

    fn ids(songs: &[SongInfo]) -> Vec<String> {
        songs.iter().map(|song| song.id.to_string()).collect()
    }

    #[actix_rt::test]
    async fn should_pop_songs_in_fifo_order() {
        let queue = GuildQueue::new(GuildId(1));

        assert_eq!(1, queue.add(song("a")).await);
        assert_eq!(2, queue.add(song("b")).await);
        assert_eq!(3, queue.add(song("c")).await);

        assert_eq!(Some("a".into()), queue.get_next().await.map(|s| s.id));
        assert_eq!(Some("b".into()), queue.get_next().await.map(|s| s.id));
        assert_eq!(Some("c".into()), queue.get_next().await.map(|s| s.id));
        assert!(queue.get_next().await.is_none());
    }

    #[actix_rt::test]
    async fn should_track_current_song() {
        let queue = GuildQueue::new(GuildId(1));

        queue.set_current(song("a")).await;
        assert!(queue.is_playing().await);
        assert_eq!(Some("a".into()), queue.current().await.map(|s| s.id));

        queue.clear_current().await;
        queue.clear_current().await;
        assert!(!queue.is_playing().await);
        assert!(queue.current().await.is_none());
    }

    #[actix_rt::test]
    async fn should_clear_queue_without_touching_current_song() {
        let queue = GuildQueue::new(GuildId(1));

        queue.add(song("a")).await;
        queue.add(song("b")).await;
        queue.set_current(song("c")).await;

        assert_eq!(2, queue.clear().await);
        assert_eq!(0, queue.len().await);
        assert!(queue.is_playing().await);
    }

    #[actix_rt::test]
    async fn should_return_owned_snapshot() {
        let queue = GuildQueue::new(GuildId(1));

        queue.add(song("a")).await;
        queue.add(song("b")).await;

        let snapshot = queue.snapshot().await;
        queue.clear().await;

        assert_eq!(vec!["a", "b"], ids(&snapshot));
    }

    #[actix_rt::test]
    async fn should_remove_and_requeue_entries() {
        let queue = GuildQueue::new(GuildId(1));

        queue.add(song("a")).await;
        queue.add(song("b")).await;
        queue.add(song("c")).await;

        assert_eq!(Some("b".into()), queue.remove(1).await.map(|s| s.id));
        assert!(queue.remove(5).await.is_none());

        let head = queue.get_next().await.expect("Queue should not be empty");
        queue.requeue_front(head).await;

        assert_eq!(vec!["a", "c"], ids(&queue.snapshot().await));
    }

    #[actix_rt::test]
    async fn should_update_entries_by_entry_id() {
        let queue = GuildQueue::new(GuildId(1));
        let first = song("a");
        let second = song("a");
        let first_entry = first.entry_id;

        queue.add(first).await;
        queue.add(second).await;

        let updated = queue
            .update(&first_entry, |song| {
                song.set_downloaded(PathBuf::from("music/a.audio"))
            })
            .await;

        assert!(updated);

        let states: Vec<_> = queue
            .snapshot()
            .await
            .into_iter()
            .map(|song| song.download_state)
            .collect();
        assert_eq!(
            vec![DownloadState::Downloaded, DownloadState::NotRequested],
            states
        );

        assert!(!queue.update(&EntryId::new(), |song| song.set_failed()).await);
    }

    #[actix_rt::test]
    async fn should_update_entries_by_song_id() {
        let queue = GuildQueue::new(GuildId(1));

        queue.add(song("a")).await;
        queue.add(song("b")).await;
        queue.add(song("a")).await;

        let updated = queue
            .update_by_song_id(
                &"a".into(),
                |song| song.download_state() == DownloadState::NotRequested,
                |song| song.set_downloaded(PathBuf::from("music/a.audio")),
            )
            .await;

        assert_eq!(2, updated);
        assert_eq!(
            1,
            queue
                .peek(3)
                .await
                .iter()
                .filter(|song| !song.is_downloaded())
                .count()
        );
    }
}
