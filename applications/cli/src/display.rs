//! Status line formatting

use minispot_core::TrackMetadata;
use minispot_playback::PlaybackState;

/// Format milliseconds as `MM:SS`, rounded to the nearest second
pub fn format_duration(ms: u64) -> String {
    let secs = (ms + 500) / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Single-letter play state: `P` playing, `p` paused, `s` stopped
pub fn state_glyph(state: PlaybackState) -> char {
    match state {
        PlaybackState::Playing => 'P',
        PlaybackState::Paused => 'p',
        PlaybackState::Idle => 's',
    }
}

/// `title - first artist`, or just the title when no artist is credited
pub fn track_label(track: &TrackMetadata) -> String {
    match track.first_artist() {
        Some(artist) => format!("{} - {}", track.name, artist),
        None => track.name.clone(),
    }
}

/// `[elapsed/total]`; zeros unless a track is loaded
pub fn progress_label(state: PlaybackState, track: Option<&TrackMetadata>, position_ms: u64) -> String {
    match track {
        Some(track) if state != PlaybackState::Idle => format!(
            "[{}/{}]",
            format_duration(position_ms),
            format_duration(track.duration_ms)
        ),
        _ => "[00:00/00:00]".to_string(),
    }
}

/// Full status line, e.g. `[P] Windowlicker - Aphex Twin [01:02/06:06]`
pub fn status_line(state: PlaybackState, track: Option<&TrackMetadata>, position_ms: u64) -> String {
    let mut line = format!("[{}]", state_glyph(state));
    if let Some(track) = track.filter(|_| state != PlaybackState::Idle) {
        line.push(' ');
        line.push_str(&track_label(track));
    }
    line.push(' ');
    line.push_str(&progress_label(state, track, position_ms));
    line
}
