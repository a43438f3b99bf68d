//! Playback engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 PlaybackEngine (commands)                     │
//! │  playlist / shuffle / history state, persisted on change      │
//! └──────────────┬───────────────────────────────▲───────────────┘
//!                │ MusicApi (url + lyric)        │ MediaEvent
//!                ▼                               │
//! ┌──────────────────────────────┐   ┌───────────┴──────────────┐
//! │      Music service API       │   │  MediaPort (set_source,  │
//! │                              │   │  play, pause, seek, ...) │
//! └──────────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! The engine owns no audio. Status only changes to `Playing`/`Paused`
//! when the media port reports it.

mod history;
mod media;
mod playlist;
mod snapshot;
mod state;

pub use history::{DEFAULT_RECENT, History, HistoryEntry, MAX_HISTORY};
pub use media::{HeadlessMedia, MediaEvent, MediaPort};
pub use playlist::{PlayMode, Playlist, Removed};
pub use snapshot::PlayerSnapshot;
pub use state::{DEFAULT_VOLUME, PlaybackState, PlaybackStatus, clamp_volume, format_time};

#[cfg(test)]
pub use media::mocks;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::api::{AudioQuality, MusicApi};
use crate::model::Track;
use crate::storage::{KeyValueStore, StorageError};

/// Mutable engine state, guarded as one unit.
#[derive(Debug, Default)]
struct EngineState {
    playlist: Playlist,
    current: Option<Track>,
    playback: PlaybackState,
    history: History,
    /// Bumped on every load or teardown; stale resolutions compare against it
    load_generation: u64,
}

/// The playback engine.
///
/// Drives a [`MediaPort`] from playlist state and resolves streams through
/// [`MusicApi`]. All methods take `&self`; share it behind an `Arc`.
pub struct PlaybackEngine {
    state: RwLock<EngineState>,
    api: Arc<dyn MusicApi>,
    media: Arc<dyn MediaPort>,
    store: Arc<dyn KeyValueStore>,
    quality: AudioQuality,
}

impl PlaybackEngine {
    pub fn new(
        api: Arc<dyn MusicApi>,
        media: Arc<dyn MediaPort>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            state: RwLock::new(EngineState::default()),
            api,
            media,
            store,
            quality: AudioQuality::default(),
        }
    }

    /// Stream quality requested for new tracks.
    pub fn with_quality(mut self, quality: AudioQuality) -> Self {
        self.quality = quality;
        self
    }

    // ---- loading ----

    /// Play `track`, optionally replacing the playlist first.
    ///
    /// Without a new playlist, `track` becomes the current entry, appended
    /// first if the playlist does not hold it yet. Unplayable tracks are
    /// skipped; when no track in the playlist resolves, playback stops with
    /// [`PlayerError::NothingPlayable`].
    pub async fn load_and_play(
        &self,
        track: Track,
        context: Option<(Vec<Track>, usize)>,
    ) -> Result<(), PlayerError> {
        {
            let mut state = self.state.write();
            match context {
                Some((tracks, index)) => state.playlist.replace(tracks, index),
                None => {
                    if state.playlist.position_of(track.id).is_none() {
                        state.playlist.add(track.clone());
                    }
                    if let Some(index) = state.playlist.position_of(track.id) {
                        state.playlist.select(index);
                    }
                }
            }
        }
        self.load(track).await
    }

    /// Replace the playlist and play `tracks[index]` if it exists.
    pub async fn set_playlist(&self, tracks: Vec<Track>, index: usize) -> Result<(), PlayerError> {
        let Some(track) = tracks.get(index).cloned() else {
            self.state.write().playlist.replace(tracks, index);
            self.save();
            return Ok(());
        };
        self.load_and_play(track, Some((tracks, index))).await
    }

    /// Resolve and start `track`, advancing past unplayable ones.
    async fn load(&self, mut track: Track) -> Result<(), PlayerError> {
        let max_attempts = self.state.read().playlist.len().max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let generation = self.begin_load(&track);

            let (url, lyric) = futures::join!(
                self.api.song_url(track.id, self.quality),
                self.api.lyric(track.id)
            );

            let mut state = self.state.write();
            let still_current = state.load_generation == generation
                && state.current.as_ref().is_some_and(|t| t.id == track.id);
            if !still_current {
                tracing::debug!("Discarding stale resolution for track {}", track.id);
                return Ok(());
            }

            match lyric {
                Ok(lyric) => {
                    if let Some(current) = state.current.as_mut() {
                        current.lyric = Some(lyric);
                    }
                }
                Err(e) => tracing::warn!("Lyric unavailable for track {}: {}", track.id, e),
            }

            let failure = match url {
                Ok(Some(url)) => {
                    if let Some(current) = state.current.as_mut() {
                        current.url = Some(url.clone());
                    }
                    drop(state);

                    tracing::info!("Playing track {} ({})", track.id, track.display_title());
                    self.media.set_source(Some(&url));
                    self.media.play();
                    self.save();
                    return Ok(());
                }
                Ok(None) => "no stream URL".to_string(),
                Err(e) => e.to_string(),
            };
            tracing::warn!("Track {} is unplayable: {}", track.id, failure);

            let next = if attempts < max_attempts {
                state
                    .playlist
                    .step_forward()
                    .and_then(|index| state.playlist.get(index).cloned())
            } else {
                None
            };

            match next {
                Some(next) => {
                    drop(state);
                    track = next;
                }
                None => {
                    state.playback.status = PlaybackStatus::Stopped;
                    drop(state);
                    self.media.pause();
                    self.save();
                    tracing::warn!("No playable track after {} attempt(s)", attempts);
                    return Err(PlayerError::NothingPlayable);
                }
            }
        }
    }

    /// Make `track` current and record it. Returns the new load generation.
    fn begin_load(&self, track: &Track) -> u64 {
        let mut state = self.state.write();
        state.load_generation += 1;
        state.current = Some(Track {
            url: None,
            lyric: None,
            ..track.clone()
        });
        state.history.record(track);
        state.playback.status = PlaybackStatus::Loading;
        state.playback.current_time = 0.0;
        state.playback.duration = 0.0;
        state.load_generation
    }

    // ---- transport ----

    /// Resume playback. No-op until a stream URL is resolved.
    pub fn play(&self) {
        let has_source = self
            .state
            .read()
            .current
            .as_ref()
            .is_some_and(|t| t.url.is_some());
        if has_source {
            self.media.play();
        }
    }

    pub fn pause(&self) {
        self.media.pause();
    }

    pub fn toggle_play(&self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Seek to `seconds`, clamped to the track length. Ignored while the
    /// length is unknown.
    pub fn seek(&self, seconds: f64) {
        let target = {
            let mut state = self.state.write();
            let duration = state.playback.duration;
            if duration <= 0.0 || !duration.is_finite() {
                return;
            }
            let target = if seconds.is_nan() {
                0.0
            } else {
                seconds.clamp(0.0, duration)
            };
            state.playback.current_time = target;
            target
        };
        self.media.set_current_time(target);
    }

    pub fn set_volume(&self, volume: f32) {
        let volume = clamp_volume(volume);
        self.state.write().playback.volume = volume;
        self.media.set_volume(volume);
        self.save();
    }

    /// Flip mute and return the new state.
    pub fn toggle_mute(&self) -> bool {
        let muted = {
            let mut state = self.state.write();
            state.playback.muted = !state.playback.muted;
            state.playback.muted
        };
        self.media.set_muted(muted);
        self.save();
        muted
    }

    // ---- navigation ----

    /// Advance according to the play mode.
    ///
    /// Repeat-one rewinds and replays the current track instead.
    pub async fn skip_next(&self) -> Result<(), PlayerError> {
        let next = {
            let mut state = self.state.write();
            if state.playlist.is_empty() {
                return Ok(());
            }
            if state.playlist.mode() == PlayMode::RepeatOne {
                state.playback.current_time = 0.0;
                None
            } else {
                state
                    .playlist
                    .step_forward()
                    .and_then(|index| state.playlist.get(index).cloned())
            }
        };

        match next {
            Some(track) => self.load(track).await,
            None => {
                self.media.set_current_time(0.0);
                self.play();
                Ok(())
            }
        }
    }

    /// Go back according to the play mode. At the first shuffle slot the
    /// current track is replayed.
    pub async fn skip_previous(&self) -> Result<(), PlayerError> {
        let previous = {
            let mut state = self.state.write();
            state
                .playlist
                .step_back()
                .and_then(|index| state.playlist.get(index).cloned())
        };

        match previous {
            Some(track) => self.load(track).await,
            None => Ok(()),
        }
    }

    pub fn set_play_mode(&self, mode: PlayMode) {
        self.state.write().playlist.set_mode(mode);
        tracing::info!("Play mode: {}", mode.label());
        self.save();
    }

    /// Switch to the next mode and return it.
    pub fn cycle_play_mode(&self) -> PlayMode {
        let mode = self.play_mode().next();
        self.set_play_mode(mode);
        mode
    }

    // ---- playlist editing ----

    /// Append `track` unless its ID is already present.
    pub fn add_track(&self, track: Track) -> bool {
        let added = self.state.write().playlist.add(track);
        if added {
            self.save();
        }
        added
    }

    /// Remove the track at `index`, returning it.
    ///
    /// Removing the current track loads the one that takes its place, or
    /// stops playback when the list becomes empty.
    pub async fn remove_track(&self, index: usize) -> Result<Option<Track>, PlayerError> {
        let (removed, next) = {
            let mut state = self.state.write();
            let Some(Removed { track, was_current }) = state.playlist.remove(index) else {
                return Ok(None);
            };

            let next = if !was_current {
                None
            } else if state.playlist.is_empty() {
                state.current = None;
                state.load_generation += 1;
                state.playback.status = PlaybackStatus::Stopped;
                state.playback.current_time = 0.0;
                state.playback.duration = 0.0;
                None
            } else {
                state.playlist.current().cloned()
            };
            (track, next)
        };

        self.save();

        match next {
            Some(track) => self.load(track).await?,
            None => {
                if self.state.read().current.is_none() {
                    self.media.pause();
                }
            }
        }
        Ok(Some(removed))
    }

    /// Empty the playlist and stop.
    pub fn clear_playlist(&self) {
        {
            let mut state = self.state.write();
            state.playlist.clear();
            state.current = None;
            state.load_generation += 1;
            state.playback.status = PlaybackStatus::Stopped;
        }
        self.media.pause();
        self.save();
    }

    // ---- media events ----

    /// Apply a notification from the media port.
    pub async fn handle_media_event(&self, event: MediaEvent) -> Result<(), PlayerError> {
        match event {
            MediaEvent::Play => self.state.write().playback.status = PlaybackStatus::Playing,
            MediaEvent::Pause => {
                let mut state = self.state.write();
                if state.playback.status != PlaybackStatus::Stopped {
                    state.playback.status = PlaybackStatus::Paused;
                }
            }
            MediaEvent::TimeUpdate(t) => {
                self.state.write().playback.current_time = if t.is_finite() { t } else { 0.0 };
            }
            MediaEvent::DurationChange(d) => {
                self.state.write().playback.duration =
                    if d.is_finite() && d > 0.0 { d } else { 0.0 };
            }
            MediaEvent::Ended => return self.skip_next().await,
            MediaEvent::Error(message) => {
                tracing::warn!("Media error: {}", message);
                return self.skip_next().await;
            }
        }
        Ok(())
    }

    // ---- queries ----

    pub fn playback(&self) -> PlaybackState {
        self.state.read().playback.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state.read().playback.is_playing()
    }

    pub fn current_track(&self) -> Option<Track> {
        self.state.read().current.clone()
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.state.read().playlist.tracks().to_vec()
    }

    pub fn current_index(&self) -> usize {
        self.state.read().playlist.current_index()
    }

    pub fn play_mode(&self) -> PlayMode {
        self.state.read().playlist.mode()
    }

    /// Current shuffle permutation (empty outside shuffle mode).
    pub fn shuffle_order(&self) -> Vec<usize> {
        self.state.read().playlist.shuffle_order().to_vec()
    }

    pub fn has_previous(&self) -> bool {
        self.state.read().playlist.has_previous()
    }

    pub fn has_next(&self) -> bool {
        self.state.read().playlist.has_next()
    }

    /// Position as a percentage of the track length.
    pub fn progress(&self) -> f64 {
        self.state.read().playback.progress()
    }

    pub fn formatted_current_time(&self) -> String {
        self.state.read().playback.current_time_str()
    }

    pub fn formatted_duration(&self) -> String {
        self.state.read().playback.duration_str()
    }

    // ---- history ----

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state.read().history.entries().to_vec()
    }

    pub fn recent_history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.state.read().history.recent(limit).to_vec()
    }

    pub fn clear_history(&self) {
        self.state.write().history.clear();
        self.save();
    }

    // ---- persistence ----

    pub fn snapshot(&self) -> PlayerSnapshot {
        let state = self.state.read();
        PlayerSnapshot {
            current_track: state.current.clone(),
            playlist: state.playlist.tracks().to_vec(),
            current_index: state.playlist.current_index(),
            mode: state.playlist.mode(),
            volume: state.playback.volume,
            muted: state.playback.muted,
            history: state.history.entries().to_vec(),
        }
    }

    /// Write the snapshot to the store.
    pub fn persist(&self) -> Result<(), PlayerError> {
        self.snapshot().save(self.store.as_ref())?;
        Ok(())
    }

    fn save(&self) {
        if let Err(e) = self.persist() {
            tracing::warn!("Failed to save player state: {}", e);
        }
    }

    /// Load the persisted snapshot. Never fails; bad data yields defaults.
    ///
    /// The restored track has no stream URL, so `play()` stays a no-op
    /// until it is loaded again.
    pub fn restore(&self) {
        let snapshot = PlayerSnapshot::load(self.store.as_ref());
        let (volume, muted) = (snapshot.volume, snapshot.muted);
        {
            let mut state = self.state.write();
            state.playlist =
                Playlist::with_tracks(snapshot.playlist, snapshot.current_index, snapshot.mode);
            state.current = snapshot
                .current_track
                .map(|track| Track { url: None, ..track });
            state.history = History::from_entries(snapshot.history);
            state.playback = PlaybackState {
                volume,
                muted,
                ..PlaybackState::default()
            };
        }
        self.media.set_volume(volume);
        self.media.set_muted(muted);
        tracing::debug!("Player state restored");
    }

    /// Stop and detach the media source.
    pub fn shutdown(&self) {
        {
            let mut state = self.state.write();
            state.load_generation += 1;
            state.playback.status = PlaybackStatus::Stopped;
        }
        self.media.pause();
        self.media.set_source(None);
    }
}

/// Player errors.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("No playable track in the playlist")]
    NothingPlayable,

    #[error("Failed to persist player state: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::mocks::{MediaCall, RecordingMedia};
    use super::*;
    use crate::api::ApiError;
    use crate::api::traits::mocks::MockApi;
    use crate::storage::MemoryStore;
    use crate::test_utils::mock_tracks as tracks;
    use std::time::Duration;

    struct Fixture {
        api: Arc<MockApi>,
        media: Arc<RecordingMedia>,
        store: Arc<MemoryStore>,
        engine: Arc<PlaybackEngine>,
    }

    fn fixture() -> Fixture {
        let api = Arc::new(MockApi::new());
        let media = Arc::new(RecordingMedia::new());
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(PlaybackEngine::new(
            api.clone(),
            media.clone(),
            store.clone(),
        ));
        Fixture {
            api,
            media,
            store,
            engine,
        }
    }

    #[tokio::test]
    async fn test_load_and_play_resolves_and_plays() {
        let f = fixture();
        f.engine.set_playlist(tracks(3), 1).await.unwrap();

        let current = f.engine.current_track().unwrap();
        assert_eq!(current.id, 2);
        assert_eq!(current.url.as_deref(), Some("http://mock/2.mp3"));
        assert!(current.lyric.is_some());
        assert_eq!(f.media.source().as_deref(), Some("http://mock/2.mp3"));
        assert_eq!(f.media.count(&MediaCall::Play), 1);
        assert_eq!(f.engine.history()[0].track.id, 2);

        // Status waits for the media port
        assert_eq!(f.engine.playback().status, PlaybackStatus::Loading);
        f.engine.handle_media_event(MediaEvent::Play).await.unwrap();
        assert!(f.engine.is_playing());

        // Persisted
        let snapshot = PlayerSnapshot::load(f.store.as_ref());
        assert_eq!(snapshot.playlist.len(), 3);
        assert_eq!(snapshot.current_index, 1);
    }

    #[tokio::test]
    async fn test_lyric_failure_still_plays() {
        let f = fixture();
        *f.api.lyric_error.lock() = Some(ApiError::Network("down".into()));

        f.engine.set_playlist(tracks(1), 0).await.unwrap();
        let current = f.engine.current_track().unwrap();
        assert!(current.lyric.is_none());
        assert!(current.url.is_some());
    }

    #[tokio::test]
    async fn test_unplayable_track_is_skipped() {
        let f = fixture();
        f.api.set_unplayable(2);
        f.api.set_url_error(3, ApiError::Http { status: 404 });

        f.engine.set_playlist(tracks(4), 1).await.unwrap();
        assert_eq!(f.engine.current_track().unwrap().id, 4);
        assert_eq!(f.engine.current_index(), 3);
        assert_eq!(f.media.source().as_deref(), Some("http://mock/4.mp3"));
    }

    #[tokio::test]
    async fn test_nothing_playable_stops() {
        let f = fixture();
        for id in 1..=3 {
            f.api.set_unplayable(id);
        }

        let result = f.engine.set_playlist(tracks(3), 0).await;
        assert!(matches!(result, Err(PlayerError::NothingPlayable)));
        assert_eq!(f.engine.playback().status, PlaybackStatus::Stopped);
        assert_eq!(f.api.calls("song_url"), 3);
        assert_eq!(f.media.count(&MediaCall::Play), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_resolution_is_discarded() {
        let f = fixture();
        f.api.set_url_delay(1, Duration::from_secs(5));
        let list = tracks(2);

        let engine = f.engine.clone();
        let first = list[0].clone();
        let context = list.clone();
        let slow = tokio::spawn(async move { engine.load_and_play(first, Some((context, 0))).await });

        // Let the slow load start, then switch tracks
        tokio::task::yield_now().await;
        f.engine.load_and_play(list[1].clone(), None).await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        slow.await.unwrap().unwrap();

        assert_eq!(f.engine.current_track().unwrap().id, 2);
        let sources: Vec<_> = f
            .media
            .calls()
            .into_iter()
            .filter(|c| matches!(c, MediaCall::SetSource(_)))
            .collect();
        assert_eq!(
            sources,
            vec![MediaCall::SetSource(Some("http://mock/2.mp3".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_sequential_skip_wraps() {
        let f = fixture();
        f.engine.set_playlist(tracks(3), 2).await.unwrap();

        f.engine.skip_next().await.unwrap();
        assert_eq!(f.engine.current_track().unwrap().id, 1);

        f.engine.skip_previous().await.unwrap();
        assert_eq!(f.engine.current_track().unwrap().id, 3);
    }

    #[tokio::test]
    async fn test_repeat_one_rewinds() {
        let f = fixture();
        f.engine.set_playlist(tracks(3), 1).await.unwrap();
        f.engine.set_play_mode(PlayMode::RepeatOne);
        f.media.clear();

        f.engine.skip_next().await.unwrap();
        assert_eq!(f.engine.current_index(), 1);
        assert_eq!(
            f.media.calls(),
            vec![MediaCall::SetCurrentTime(0.0), MediaCall::Play]
        );
    }

    #[tokio::test]
    async fn test_empty_playlist_skip_is_noop() {
        let f = fixture();
        f.engine.skip_next().await.unwrap();
        f.engine.skip_previous().await.unwrap();
        assert!(f.media.calls().is_empty());
        assert!(f.engine.current_track().is_none());
    }

    #[tokio::test]
    async fn test_shuffle_skip_visits_every_track() {
        let f = fixture();
        f.engine.set_playlist(tracks(6), 0).await.unwrap();
        f.engine.set_play_mode(PlayMode::Shuffle);
        assert_eq!(f.engine.shuffle_order()[0], 0);

        let mut seen = vec![f.engine.current_track().unwrap().id];
        for _ in 0..5 {
            f.engine.skip_next().await.unwrap();
            seen.push(f.engine.current_track().unwrap().id);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_play_without_url_is_noop() {
        let f = fixture();
        f.engine.play();
        f.engine.toggle_play();
        assert!(f.media.calls().is_empty());
    }

    #[tokio::test]
    async fn test_seek_requires_duration_and_clamps() {
        let f = fixture();
        f.engine.seek(30.0);
        assert!(f.media.calls().is_empty());

        f.engine
            .handle_media_event(MediaEvent::DurationChange(120.0))
            .await
            .unwrap();
        f.engine.seek(500.0);
        f.engine.seek(-3.0);
        assert_eq!(
            f.media.calls(),
            vec![
                MediaCall::SetCurrentTime(120.0),
                MediaCall::SetCurrentTime(0.0)
            ]
        );
        assert_eq!(f.engine.playback().current_time, 0.0);
    }

    #[tokio::test]
    async fn test_media_events_update_state() {
        let f = fixture();
        f.engine
            .handle_media_event(MediaEvent::DurationChange(f64::INFINITY))
            .await
            .unwrap();
        assert_eq!(f.engine.playback().duration, 0.0);
        assert_eq!(f.engine.formatted_duration(), "00:00");

        f.engine
            .handle_media_event(MediaEvent::DurationChange(200.0))
            .await
            .unwrap();
        f.engine
            .handle_media_event(MediaEvent::TimeUpdate(50.0))
            .await
            .unwrap();
        assert_eq!(f.engine.progress(), 25.0);
        assert_eq!(f.engine.formatted_current_time(), "00:50");
        assert_eq!(f.engine.formatted_duration(), "03:20");
    }

    #[tokio::test]
    async fn test_ended_and_error_advance() {
        let f = fixture();
        f.engine.set_playlist(tracks(3), 0).await.unwrap();

        f.engine.handle_media_event(MediaEvent::Ended).await.unwrap();
        assert_eq!(f.engine.current_track().unwrap().id, 2);

        f.engine
            .handle_media_event(MediaEvent::Error("decode failed".into()))
            .await
            .unwrap();
        assert_eq!(f.engine.current_track().unwrap().id, 3);
    }

    #[tokio::test]
    async fn test_volume_clamped_and_persisted() {
        let f = fixture();
        f.engine.set_volume(1.7);
        assert_eq!(f.engine.playback().volume, 1.0);
        assert_eq!(f.media.calls(), vec![MediaCall::SetVolume(1.0)]);
        assert_eq!(PlayerSnapshot::load(f.store.as_ref()).volume, 1.0);

        assert!(f.engine.toggle_mute());
        assert!(PlayerSnapshot::load(f.store.as_ref()).muted);
        assert!(!f.engine.toggle_mute());
        assert!(!PlayerSnapshot::load(f.store.as_ref()).muted);
    }

    #[tokio::test]
    async fn test_load_track_outside_playlist_appends_it() {
        let f = fixture();
        f.engine.set_playlist(tracks(3), 0).await.unwrap();

        let outsider = Track::new(42, "Outsider");
        f.engine.load_and_play(outsider, None).await.unwrap();

        assert_eq!(f.engine.tracks().len(), 4);
        assert_eq!(f.engine.current_index(), 3);
        assert_eq!(f.engine.current_track().unwrap().id, 42);

        let snapshot = f.engine.snapshot();
        assert_eq!(
            snapshot.playlist[snapshot.current_index].id,
            snapshot.current_track.unwrap().id
        );
    }

    #[tokio::test]
    async fn test_unplayable_outsider_steps_from_its_own_slot() {
        let f = fixture();
        f.engine.set_playlist(tracks(3), 1).await.unwrap();
        f.api.set_unplayable(42);

        f.engine
            .load_and_play(Track::new(42, "Outsider"), None)
            .await
            .unwrap();

        // Appended after track 3, so the next one wraps to the start
        assert_eq!(f.engine.current_track().unwrap().id, 1);
        assert_eq!(f.engine.current_index(), 0);
    }

    #[tokio::test]
    async fn test_add_track_dedups() {
        let f = fixture();
        f.engine.set_playlist(tracks(2), 0).await.unwrap();
        assert!(!f.engine.add_track(Track::new(1, "dup")));
        assert!(f.engine.add_track(Track::new(9, "new")));
        assert_eq!(f.engine.tracks().len(), 3);
    }

    #[tokio::test]
    async fn test_remove_before_current() {
        let f = fixture();
        f.engine.set_playlist(tracks(3), 2).await.unwrap();

        let removed = f.engine.remove_track(0).await.unwrap().unwrap();
        assert_eq!(removed.id, 1);
        assert_eq!(f.engine.current_index(), 1);
        assert_eq!(f.engine.current_track().unwrap().id, 3);
    }

    #[tokio::test]
    async fn test_remove_current_loads_successor() {
        let f = fixture();
        f.engine.set_playlist(tracks(3), 1).await.unwrap();

        f.engine.remove_track(1).await.unwrap();
        assert_eq!(f.engine.current_track().unwrap().id, 3);
        assert_eq!(f.media.source().as_deref(), Some("http://mock/3.mp3"));
    }

    #[tokio::test]
    async fn test_remove_last_remaining_stops() {
        let f = fixture();
        f.engine.set_playlist(tracks(1), 0).await.unwrap();

        f.engine.remove_track(0).await.unwrap();
        assert!(f.engine.current_track().is_none());
        assert_eq!(f.engine.playback().status, PlaybackStatus::Stopped);
        assert_eq!(f.media.calls().last(), Some(&MediaCall::Pause));
    }

    #[tokio::test]
    async fn test_remove_out_of_range() {
        let f = fixture();
        f.engine.set_playlist(tracks(2), 0).await.unwrap();
        assert!(f.engine.remove_track(5).await.unwrap().is_none());
        assert_eq!(f.engine.tracks().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_playlist() {
        let f = fixture();
        f.engine.set_playlist(tracks(3), 0).await.unwrap();
        f.engine.set_play_mode(PlayMode::Shuffle);

        f.engine.clear_playlist();
        assert!(f.engine.tracks().is_empty());
        assert!(f.engine.current_track().is_none());
        assert!(f.engine.shuffle_order().is_empty());
        assert_eq!(f.media.calls().last(), Some(&MediaCall::Pause));
    }

    #[tokio::test]
    async fn test_restore_round_trip() {
        let f = fixture();
        f.engine.set_playlist(tracks(4), 2).await.unwrap();
        f.engine.set_volume(0.3);
        f.engine.set_play_mode(PlayMode::Shuffle);

        let media = Arc::new(RecordingMedia::new());
        let restored = PlaybackEngine::new(f.api.clone(), media.clone(), f.store.clone());
        restored.restore();

        assert_eq!(restored.tracks().len(), 4);
        assert_eq!(restored.current_index(), 2);
        assert_eq!(restored.play_mode(), PlayMode::Shuffle);
        assert_eq!(restored.shuffle_order()[0], 2);
        assert_eq!(restored.playback().volume, 0.3);
        assert_eq!(restored.history().len(), 1);
        assert_eq!(restored.current_track().unwrap().id, 3);
        assert_eq!(
            media.calls(),
            vec![MediaCall::SetVolume(0.3), MediaCall::SetMuted(false)]
        );
    }

    #[tokio::test]
    async fn test_restored_track_needs_reload_before_play() {
        let f = fixture();
        f.engine.set_playlist(tracks(2), 0).await.unwrap();
        f.engine.toggle_mute();

        let media = Arc::new(RecordingMedia::new());
        let restored = PlaybackEngine::new(f.api.clone(), media.clone(), f.store.clone());
        restored.restore();

        assert!(restored.current_track().unwrap().url.is_none());
        assert!(restored.playback().muted);
        restored.play();
        assert_eq!(media.count(&MediaCall::Play), 0);

        restored.skip_next().await.unwrap();
        assert_eq!(media.source().as_deref(), Some("http://mock/2.mp3"));
        assert_eq!(media.count(&MediaCall::Play), 1);
    }

    #[tokio::test]
    async fn test_recent_and_clear_history() {
        let f = fixture();
        f.engine.set_playlist(tracks(3), 0).await.unwrap();
        f.engine.skip_next().await.unwrap();
        f.engine.skip_next().await.unwrap();

        let recent = f.engine.recent_history(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].track.id, 3);

        f.engine.clear_history();
        assert!(f.engine.history().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_detaches_source() {
        let f = fixture();
        f.engine.set_playlist(tracks(1), 0).await.unwrap();
        f.engine.shutdown();
        assert_eq!(f.media.source(), None);
    }
}
