//! Media primitive seam.
//!
//! The engine never decodes audio. It drives a [`MediaPort`] and learns
//! about playback through [`MediaEvent`]s fed back into
//! [`super::PlaybackEngine::handle_media_event`].

use parking_lot::RwLock;
use tokio::sync::mpsc;

/// Commands accepted by a media primitive.
pub trait MediaPort: Send + Sync {
    /// Load a stream URL. `None` detaches the current source.
    fn set_source(&self, url: Option<&str>);

    fn play(&self);

    fn pause(&self);

    /// Seek to `seconds`.
    fn set_current_time(&self, seconds: f64);

    fn set_volume(&self, volume: f32);

    fn set_muted(&self, muted: bool);
}

/// Notifications emitted by a media primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Play,
    Pause,
    /// Playback reached the end of the source
    Ended,
    /// Position changed (seconds)
    TimeUpdate(f64),
    /// Length became known (seconds)
    DurationChange(f64),
    /// The source failed to load or play
    Error(String),
}

#[derive(Debug, Default)]
struct HeadlessState {
    source: Option<String>,
    playing: bool,
    position: f64,
    volume: f32,
    muted: bool,
}

/// A media primitive without audio output.
///
/// Tracks what a real element would report and emits the matching
/// [`MediaEvent`]s on its channel.
pub struct HeadlessMedia {
    state: RwLock<HeadlessState>,
    events: mpsc::UnboundedSender<MediaEvent>,
}

impl HeadlessMedia {
    /// Create the port and the receiver for its events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MediaEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let media = Self {
            state: RwLock::new(HeadlessState {
                volume: 1.0,
                ..Default::default()
            }),
            events,
        };
        (media, rx)
    }

    fn emit(&self, event: MediaEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    pub fn source(&self) -> Option<String> {
        self.state.read().source.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state.read().playing
    }

    pub fn volume(&self) -> f32 {
        self.state.read().volume
    }

    pub fn is_muted(&self) -> bool {
        self.state.read().muted
    }
}

impl MediaPort for HeadlessMedia {
    fn set_source(&self, url: Option<&str>) {
        let was_playing = {
            let mut state = self.state.write();
            let was_playing = state.playing;
            state.source = url.map(str::to_string);
            state.position = 0.0;
            state.playing = false;
            was_playing
        };
        if was_playing {
            self.emit(MediaEvent::Pause);
        }
        self.emit(MediaEvent::TimeUpdate(0.0));
    }

    fn play(&self) {
        let started = {
            let mut state = self.state.write();
            if state.source.is_none() {
                None
            } else {
                let started = !state.playing;
                state.playing = true;
                Some(started)
            }
        };
        match started {
            Some(true) => self.emit(MediaEvent::Play),
            Some(false) => {}
            None => self.emit(MediaEvent::Error("no source".to_string())),
        }
    }

    fn pause(&self) {
        let stopped = {
            let mut state = self.state.write();
            std::mem::replace(&mut state.playing, false)
        };
        if stopped {
            self.emit(MediaEvent::Pause);
        }
    }

    fn set_current_time(&self, seconds: f64) {
        self.state.write().position = seconds;
        self.emit(MediaEvent::TimeUpdate(seconds));
    }

    fn set_volume(&self, volume: f32) {
        self.state.write().volume = volume;
    }

    fn set_muted(&self, muted: bool) {
        self.state.write().muted = muted;
    }
}
