//! minispot terminal player
//!
//! Configuration loading, status line formatting and the interactive
//! keyboard loop used by the `minispot` binary.

pub mod display;
pub mod player;
pub mod settings;

pub use display::{format_duration, status_line};
pub use player::{parse_playlist_path, parse_track_id, run_interactive, Command};
pub use settings::{Overrides, Settings};
