//! Interactive playback session on the terminal

use crate::display::status_line;
use crossbeam_channel::{bounded, select, tick, Receiver};
use minispot_core::{playlist_path_from_uri, MinispotError, TrackId, TRACK_URI_PREFIX};
use minispot_playback::{NextTrack, PlaybackEngine, PlaybackEvent, PlaybackState};
use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Keyboard command, one per input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TogglePause,
    Next,
    Quit,
}

impl Command {
    /// Parse an input line (`space`/`p`, `n`, `q`)
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.starts_with(' ') && line.trim().is_empty() {
            return Some(Self::TogglePause);
        }

        match line.trim() {
            "p" | "pause" => Some(Self::TogglePause),
            "n" | "next" => Some(Self::Next),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Accept a bare base62 id or a `spotify:track:` URI
pub fn parse_track_id(input: &str) -> TrackId {
    let input = input.trim();
    if input.starts_with(TRACK_URI_PREFIX) {
        if let Some(id) = TrackId::from_uri(input) {
            return id;
        }
    }
    TrackId::new(input)
}

/// Accept a catalog path or a `spotify:user:...:playlist:...` URI
pub fn parse_playlist_path(input: &str) -> String {
    let input = input.trim();
    if input.contains(':') {
        playlist_path_from_uri(input)
    } else {
        input.trim_matches('/').to_string()
    }
}

/// Run until the user quits or playback ends on its own
pub fn run_interactive(engine: &PlaybackEngine) -> anyhow::Result<()> {
    let events = engine.subscribe(64);
    let commands = spawn_stdin_reader();
    let ticker = tick(Duration::from_millis(250));

    println!("space/p: pause  n: next  q: quit");
    let mut view = StatusView::default();
    view.draw(engine, engine.play_progress());
    let mut finished = false;

    loop {
        select! {
            recv(events) -> event => {
                let Ok(event) = event else { break };
                match event {
                    PlaybackEvent::Progress { position_ms } => view.draw(engine, position_ms),
                    PlaybackEvent::TrackStarted { .. } => {
                        finished = false;
                        view.newline();
                        view.draw(engine, 0);
                    }
                    PlaybackEvent::TrackPaused { .. } => view.draw(engine, engine.play_progress()),
                    PlaybackEvent::TrackFinished => finished = true,
                }
            }
            recv(commands) -> command => {
                match command {
                    Ok(Command::TogglePause) => {
                        if let Err(e) = engine.set_pause_state(!engine.pause_state()) {
                            debug!(error = %e, "Pause ignored");
                        }
                    }
                    Ok(Command::Next) => match engine.play_next() {
                        Ok(NextTrack::Started(_)) => {}
                        Ok(NextTrack::EndOfPlaylist) => {
                            view.newline();
                            println!("End of playlist");
                            break;
                        }
                        Err(MinispotError::NoPlaylist) => {
                            view.newline();
                            println!("No playlist loaded");
                        }
                        Err(e) => {
                            view.newline();
                            warn!(error = %e, "Could not skip");
                        }
                    },
                    Ok(Command::Quit) | Err(_) => break,
                }
            }
            recv(ticker) -> _ => {
                if finished && engine.state() == PlaybackState::Idle {
                    view.newline();
                    println!("Playback finished");
                    break;
                }
            }
        }
    }

    view.newline();
    Ok(())
}

/// Forward parsed stdin lines; the channel closes at end of input
fn spawn_stdin_reader() -> Receiver<Command> {
    let (tx, rx) = bounded(8);
    let spawned = thread::Builder::new()
        .name("minispot-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if let Some(command) = Command::parse(&line) {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Keyboard input unavailable");
    }
    rx
}

/// Redraws the status line in place
#[derive(Default)]
struct StatusView {
    last: String,
}

impl StatusView {
    fn draw(&mut self, engine: &PlaybackEngine, position_ms: u64) {
        let line = status_line(engine.state(), engine.track().as_deref(), position_ms);
        if line == self.last {
            return;
        }
        let mut out = io::stdout().lock();
        let _ = write!(out, "\r{line}\x1b[K");
        let _ = out.flush();
        self.last = line;
    }

    fn newline(&mut self) {
        if !self.last.is_empty() {
            println!();
            self.last.clear();
        }
    }
}
