//! Playback state and time formatting.

/// Current playback status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    /// Resolving the stream for the current track
    Loading,
    Playing,
    Paused,
}

impl PlaybackStatus {
    pub fn is_playing(self) -> bool {
        self == PlaybackStatus::Playing
    }
}

/// Observable playback state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    /// Position in seconds
    pub current_time: f64,
    /// Track length in seconds (0 = unknown)
    pub duration: f64,
    /// Volume level (0.0 - 1.0)
    pub volume: f32,
    pub muted: bool,
}

/// Volume used when nothing has been persisted yet.
pub const DEFAULT_VOLUME: f32 = 0.8;

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Stopped,
            current_time: 0.0,
            duration: 0.0,
            volume: DEFAULT_VOLUME,
            muted: false,
        }
    }
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        self.status.is_playing()
    }

    /// Position as a percentage (0.0 - 100.0).
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 && self.duration.is_finite() {
            (self.current_time / self.duration) * 100.0
        } else {
            0.0
        }
    }

    /// Format position as MM:SS.
    pub fn current_time_str(&self) -> String {
        format_time(self.current_time)
    }

    /// Format duration as MM:SS.
    pub fn duration_str(&self) -> String {
        format_time(self.duration)
    }
}

/// Clamp a volume into `[0, 1]`. NaN becomes the default.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        DEFAULT_VOLUME
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Format seconds as zero-padded MM:SS. Non-finite or non-positive input
/// renders as `00:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "00:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
