//! Playback Engine Integration Tests
//!
//! End-to-end scenarios for the engine state machine, driven through a fake
//! catalog, a fake decoder and a backend whose callback the test invokes:
//! - Play / play playlist / play next, including every error path
//! - Pause and resume
//! - Real-time callback behaviour at end of stream
//! - Automatic advance and playlist exhaustion
//! - Stream cancellation across track swaps

mod common;

use common::*;
use minispot_core::{AudioFile, AudioFormat, MinispotError, TrackId};
use minispot_playback::{NextTrack, PlaybackEvent, PlaybackState, TrackListPlaylist};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn playlist(entries: &[String]) -> Arc<TrackListPlaylist> {
    Arc::new(TrackListPlaylist::new("Test Mix", entries.iter().cloned()))
}

// ============================================================================
// Play
// ============================================================================

mod play {
    use super::*;

    #[test]
    fn test_play_starts_backend_and_fires_started() {
        let catalog = FakeCatalog::new();
        let id = catalog.add_track(1, "First", 100_000);
        let (engine, backend) = engine(&catalog);
        let events = engine.subscribe(64);

        engine.play(&id).unwrap();

        assert_eq!(engine.state(), PlaybackState::Playing);
        assert!(engine.is_playing());
        assert!(!engine.pause_state());
        assert!(backend.is_started());
        assert_eq!(engine.track().unwrap().name, "First");

        match next_event(&events) {
            Some(PlaybackEvent::TrackStarted { track }) => assert_eq!(track.name, "First"),
            other => panic!("Expected TrackStarted, got {other:?}"),
        }
    }

    #[test]
    fn test_play_unknown_track_is_not_found() {
        let catalog = FakeCatalog::new();
        let (engine, backend) = engine(&catalog);

        let err = engine.play(&track_id(99)).unwrap_err();
        assert!(matches!(err, MinispotError::NotFound(_)));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(!backend.is_started());
        assert!(engine.track().is_none());
    }

    #[test]
    fn test_play_malformed_id_is_not_found() {
        let catalog = FakeCatalog::new();
        let (engine, _backend) = engine(&catalog);

        let err = engine.play(&TrackId::new("not a base62 id")).unwrap_err();
        assert!(matches!(err, MinispotError::NotFound(_)));
        assert_eq!(catalog.loads(), 0);
    }

    #[test]
    fn test_play_metadata_without_gid_is_not_found() {
        let catalog = FakeCatalog::new();
        let mut meta = metadata(5, "Ghost", vec![ogg_320(5)]);
        meta.gid = String::new();
        catalog.insert_at(5, meta);
        let (engine, _backend) = engine(&catalog);

        let err = engine.play(&track_id(5)).unwrap_err();
        assert!(matches!(err, MinispotError::NotFound(_)));
    }

    #[test]
    fn test_play_without_decodable_variant() {
        let catalog = FakeCatalog::new();
        catalog.insert(metadata(
            3,
            "MP3 only",
            vec![AudioFile {
                file_id: file_id(3),
                format: AudioFormat::Mp3_320,
            }],
        ));
        let (engine, backend) = engine(&catalog);

        let err = engine.play(&track_id(3)).unwrap_err();
        assert!(matches!(err, MinispotError::NoPlayableVariant(_)));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(!backend.is_started());
    }

    #[test]
    fn test_play_falls_back_to_alternative() {
        let catalog = FakeCatalog::new();
        let mut primary = metadata(10, "Region locked", vec![]);
        primary.alternatives = vec![
            metadata(11, "Also locked", vec![]),
            metadata(12, "Playable", vec![ogg_320(12)]),
        ];
        catalog.insert(primary);
        catalog.set_stream(&file_id(12), samples_header(1000));
        let (engine, _backend) = engine(&catalog);

        engine.play(&track_id(10)).unwrap();

        assert_eq!(catalog.loaded_files(), vec![file_id(12)]);
        // The requested track's metadata is what gets displayed
        assert_eq!(engine.track().unwrap().name, "Region locked");
    }

    #[test]
    fn test_transport_error_leaves_current_track_playing() {
        let catalog = FakeCatalog::new();
        let first = catalog.add_track(1, "First", 100_000);
        let second = catalog.add_track(2, "Second", 100_000);
        catalog.remove_stream(&file_id(2));
        let (engine, backend) = engine(&catalog);

        engine.play(&first).unwrap();
        let err = engine.play(&second).unwrap_err();

        assert!(matches!(err, MinispotError::Transport(_)));
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(engine.track().unwrap().name, "First");
        assert_eq!(catalog.live_streams(), vec![file_id(1)]);

        let (frames, _) = backend.render(64);
        assert_eq!(frames, 64);
    }

    #[test]
    fn test_unsupported_format_cancels_stream() {
        let catalog = FakeCatalog::new();
        let id = catalog.add_track(4, "Broken", 0);
        catalog.set_stream(&file_id(4), BAD_HEADER.to_vec());
        let (engine, backend) = engine(&catalog);

        let err = engine.play(&id).unwrap_err();

        assert!(matches!(err, MinispotError::UnsupportedFormat(_)));
        assert!(catalog.live_streams().is_empty());
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(!backend.is_started());
    }

    #[test]
    fn test_backend_start_failure_keeps_state() {
        let catalog = FakeCatalog::new();
        let id = catalog.add_track(1, "First", 1000);
        let (engine, backend) = engine(&catalog);
        backend.fail_next_start();

        let err = engine.play(&id).unwrap_err();

        assert!(matches!(err, MinispotError::Backend(_)));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(engine.track().is_none());
        assert!(catalog.live_streams().is_empty());
    }

    #[test]
    fn test_play_while_paused_resumes_backend() {
        let catalog = FakeCatalog::new();
        let first = catalog.add_track(1, "First", 100_000);
        let second = catalog.add_track(2, "Second", 100_000);
        let (engine, backend) = engine(&catalog);

        engine.play(&first).unwrap();
        engine.set_pause_state(true).unwrap();
        assert!(!backend.is_started());

        engine.play(&second).unwrap();
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert!(backend.is_started());
        assert_eq!(engine.play_progress(), 0);
    }

    #[test]
    fn test_swaps_cancel_every_superseded_stream() {
        let catalog = FakeCatalog::new();
        let ids: Vec<_> = (1..=10)
            .map(|n| catalog.add_track(n, &format!("Track {n}"), 100_000))
            .collect();
        let (engine, backend) = engine(&catalog);

        for id in &ids {
            engine.play(id).unwrap();
            backend.render(32);
        }

        assert_eq!(catalog.loads(), 10);
        assert_eq!(catalog.live_streams(), vec![file_id(10)]);
        assert_eq!(engine.track().unwrap().name, "Track 10");
    }

    #[test]
    fn test_play_replaces_stalled_stream_while_rendering() {
        let catalog = FakeCatalog::new();
        let stalled = catalog.add_stalling_track(1, "Stalled", 1000);
        let next = catalog.add_track(2, "Next", 100_000);
        let (engine, backend) = engine(&catalog);
        let engine = Arc::new(engine);

        engine.play(&stalled).unwrap();
        assert_eq!(backend.render(4096).0, 500);

        // The device keeps calling back while the download hangs
        let rendering = Arc::new(AtomicBool::new(true));
        let device = {
            let backend = Arc::clone(&backend);
            let rendering = Arc::clone(&rendering);
            std::thread::spawn(move || {
                while rendering.load(Ordering::SeqCst) {
                    let started = Instant::now();
                    backend.render(4096);
                    assert!(started.elapsed() < Duration::from_millis(500));
                }
            })
        };

        let (tx, rx) = crossbeam_channel::bounded(1);
        {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let _ = tx.send(engine.play(&next).map_err(|e| e.to_string()));
            });
        }
        let result = rx.recv_timeout(Duration::from_secs(3));

        rendering.store(false, Ordering::SeqCst);
        device.join().unwrap();

        assert_eq!(result, Ok(Ok(())));
        assert_eq!(engine.track().unwrap().name, "Next");
        assert_eq!(catalog.live_streams(), vec![file_id(2)]);
        assert!(backend.render_until(64) > 0);
    }

    #[test]
    fn test_drop_releases_stalled_stream() {
        let catalog = FakeCatalog::new();
        let stalled = catalog.add_stalling_track(1, "Stalled", 100);
        let (engine, backend) = engine(&catalog);

        engine.play(&stalled).unwrap();
        assert_eq!(backend.render(256).0, 50);
        assert_eq!(backend.render(256).0, 0);

        let (tx, rx) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            drop(engine);
            let _ = tx.send(());
        });

        assert!(rx.recv_timeout(Duration::from_secs(3)).is_ok());
        assert!(catalog.live_streams().is_empty());
    }
}

// ============================================================================
// Playlists
// ============================================================================

mod playlists {
    use super::*;

    #[test]
    fn test_play_playlist_out_of_range() {
        let catalog = FakeCatalog::new();
        let uris: Vec<_> = (1..=3)
            .map(|n| {
                catalog.add_track(n, "T", 1000);
                track_uri(n)
            })
            .collect();
        let (engine, backend) = engine(&catalog);

        let err = engine.play_playlist(playlist(&uris), 3).unwrap_err();

        assert!(matches!(err, MinispotError::OutOfRange { index: 3, len: 3 }));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(engine.playlist_cursor().is_none());
        assert!(!backend.is_started());
        assert_eq!(catalog.loads(), 0);
    }

    #[test]
    fn test_out_of_range_keeps_bound_playlist() {
        let catalog = FakeCatalog::new();
        let uris: Vec<_> = (1..=3)
            .map(|n| {
                catalog.add_track(n, &format!("T{n}"), 100_000);
                track_uri(n)
            })
            .collect();
        let other: Vec<_> = (4..=5)
            .map(|n| {
                catalog.add_track(n, &format!("T{n}"), 100_000);
                track_uri(n)
            })
            .collect();
        let (engine, _backend) = engine(&catalog);

        engine.play_playlist(playlist(&uris), 1).unwrap();
        let loads = catalog.loads();
        let other: Arc<dyn minispot_core::Playlist> = Arc::new(TrackListPlaylist::new("Other", other.iter().cloned()));

        for index in [2, 2, 7] {
            let err = engine.play_playlist(Arc::clone(&other), index).unwrap_err();
            assert!(matches!(err, MinispotError::OutOfRange { len: 2, .. }));

            assert_eq!(engine.playlist_cursor(), Some(1));
            assert_eq!(engine.playlist_info(), Some(("Test Mix".to_string(), 3)));
            assert_eq!(engine.track().unwrap().name, "T2");
            assert_eq!(engine.state(), PlaybackState::Playing);
            assert_eq!(catalog.loads(), loads);
        }
    }

    #[test]
    fn test_play_playlist_binds_cursor() {
        let catalog = FakeCatalog::new();
        let uris: Vec<_> = (1..=3)
            .map(|n| {
                catalog.add_track(n, &format!("T{n}"), 1000);
                track_uri(n)
            })
            .collect();
        let (engine, _backend) = engine(&catalog);

        engine.play_playlist(playlist(&uris), 1).unwrap();

        assert_eq!(engine.playlist_cursor(), Some(1));
        assert_eq!(engine.playlist_info(), Some(("Test Mix".to_string(), 3)));
        assert_eq!(engine.track().unwrap().name, "T2");
    }

    #[test]
    fn test_play_playlist_local_entry() {
        let catalog = FakeCatalog::new();
        let uris = vec!["spotify:local:Artist:Album:Song:215".to_string()];
        let (engine, _backend) = engine(&catalog);

        let err = engine.play_playlist(playlist(&uris), 0).unwrap_err();

        assert!(matches!(err, MinispotError::LocalTrackUnsupported(_)));
        assert!(engine.playlist_cursor().is_none());
        assert_eq!(engine.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_play_next_without_playlist() {
        let catalog = FakeCatalog::new();
        let id = catalog.add_track(1, "Solo", 1000);
        let (engine, _backend) = engine(&catalog);
        engine.play(&id).unwrap();

        assert!(matches!(
            engine.play_next().unwrap_err(),
            MinispotError::NoPlaylist
        ));
    }

    #[test]
    fn test_play_next_advances_cursor() {
        let catalog = FakeCatalog::new();
        let uris: Vec<_> = (1..=3)
            .map(|n| {
                catalog.add_track(n, &format!("T{n}"), 100_000);
                track_uri(n)
            })
            .collect();
        let (engine, _backend) = engine(&catalog);
        let events = engine.subscribe(64);

        engine.play_playlist(playlist(&uris), 0).unwrap();
        assert_eq!(engine.play_next().unwrap(), NextTrack::Started(1));
        assert_eq!(engine.playlist_cursor(), Some(1));
        assert_eq!(engine.track().unwrap().name, "T2");

        let names: Vec<_> = std::iter::from_fn(|| next_event(&events))
            .take(2)
            .filter_map(|e| match e {
                PlaybackEvent::TrackStarted { track } => Some(track.name),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["T1", "T2"]);
    }

    #[test]
    fn test_play_next_at_end_is_not_an_error() {
        let catalog = FakeCatalog::new();
        let uris: Vec<_> = (1..=2)
            .map(|n| {
                catalog.add_track(n, &format!("T{n}"), 100_000);
                track_uri(n)
            })
            .collect();
        let (engine, _backend) = engine(&catalog);

        engine.play_playlist(playlist(&uris), 1).unwrap();
        assert_eq!(engine.play_next().unwrap(), NextTrack::EndOfPlaylist);

        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(engine.playlist_cursor(), Some(1));
        assert_eq!(engine.track().unwrap().name, "T2");
    }

    #[test]
    fn test_play_next_onto_local_entry_keeps_cursor() {
        let catalog = FakeCatalog::new();
        catalog.add_track(1, "T1", 100_000);
        catalog.add_track(3, "T3", 100_000);
        let uris = vec![
            track_uri(1),
            "spotify:local:Artist:Album:Song:215".to_string(),
            track_uri(3),
        ];
        let (engine, _backend) = engine(&catalog);

        engine.play_playlist(playlist(&uris), 0).unwrap();
        let err = engine.play_next().unwrap_err();

        assert!(matches!(err, MinispotError::LocalTrackUnsupported(_)));
        assert_eq!(engine.playlist_cursor(), Some(0));
        assert_eq!(engine.track().unwrap().name, "T1");
        assert_eq!(engine.state(), PlaybackState::Playing);
    }
}

// ============================================================================
// Pause / Resume
// ============================================================================

mod pause {
    use super::*;

    #[test]
    fn test_pause_and_resume() {
        let catalog = FakeCatalog::new();
        let id = catalog.add_track(1, "First", 1_000_000);
        let (engine, backend) = engine(&catalog);
        let events = engine.subscribe(64);

        engine.play(&id).unwrap();
        assert_eq!(backend.render_until(22_050), 22_050);
        let position = engine.play_progress();
        assert_eq!(position, 500);

        engine.set_pause_state(true).unwrap();
        assert_eq!(engine.state(), PlaybackState::Paused);
        assert!(engine.pause_state());
        assert!(engine.is_playing());
        assert!(!backend.is_started());
        assert_eq!(engine.play_progress(), position);

        engine.set_pause_state(false).unwrap();
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert!(backend.is_started());
        assert_eq!(engine.play_progress(), position);

        let _ = next_event(&events); // started
        assert!(matches!(
            next_event(&events),
            Some(PlaybackEvent::TrackPaused { paused: true, .. })
        ));
        assert!(matches!(
            next_event(&events),
            Some(PlaybackEvent::TrackPaused { paused: false, .. })
        ));
    }

    #[test]
    fn test_repeated_pause_is_noop() {
        let catalog = FakeCatalog::new();
        let id = catalog.add_track(1, "First", 1_000_000);
        let (engine, backend) = engine(&catalog);
        let events = engine.subscribe(64);

        engine.play(&id).unwrap();
        engine.set_pause_state(true).unwrap();
        engine.set_pause_state(true).unwrap();
        engine.set_pause_state(false).unwrap();
        engine.set_pause_state(false).unwrap();

        assert_eq!(backend.stops(), 1);
        assert_eq!(backend.starts(), 2);

        let pauses = std::iter::from_fn(|| next_event(&events))
            .filter(|e| matches!(e, PlaybackEvent::TrackPaused { .. }))
            .count();
        assert_eq!(pauses, 2);
    }

    #[test]
    fn test_pause_while_idle_is_noop() {
        let catalog = FakeCatalog::new();
        let (engine, backend) = engine(&catalog);

        engine.set_pause_state(true).unwrap();
        engine.set_pause_state(false).unwrap();

        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(backend.starts(), 0);
        assert_eq!(backend.stops(), 0);
    }
}

// ============================================================================
// Real-time Callback
// ============================================================================

mod render {
    use super::*;

    #[test]
    fn test_render_before_play_writes_nothing() {
        let catalog = FakeCatalog::new();
        let (engine, backend) = engine(&catalog);
        let (frames, _) = backend.render(128);
        assert_eq!(frames, 0);
        assert_eq!(engine.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_short_read_at_end_of_stream() {
        let catalog = FakeCatalog::new();
        let id = catalog.add_track(1, "Short", 500);
        let (engine, backend) = engine(&catalog);
        let events = engine.subscribe(64);
        engine.play(&id).unwrap();
        let _ = next_event(&events);

        let (frames, buf) = backend.render(2048);

        assert_eq!(frames, 250);
        assert!(buf[..500].iter().all(|&s| s == SAMPLE_VALUE));
        assert!(buf[500..].iter().all(|&s| s == -1.0));
        assert!(!engine.is_playing());

        assert_eq!(next_event(&events), Some(PlaybackEvent::TrackFinished));
    }

    #[test]
    fn test_render_after_exhaustion_returns_zero() {
        let catalog = FakeCatalog::new();
        let id = catalog.add_track(1, "Short", 100);
        let (engine, backend) = engine(&catalog);
        engine.play(&id).unwrap();

        assert_eq!(backend.render(2048).0, 50);
        // The dispatcher may already have stopped the backend; either way
        // no more audio is produced.
        assert_eq!(backend.render(2048).0, 0);
        assert!(eventually(|| !backend.is_started()));
    }

    #[test]
    fn test_stalled_stream_underruns_without_blocking() {
        let catalog = FakeCatalog::new();
        let id = catalog.add_stalling_track(1, "Stalled", 100);
        let (engine, backend) = engine(&catalog);
        engine.play(&id).unwrap();

        assert_eq!(backend.render(256).0, 50);

        let started = Instant::now();
        let (frames, buf) = backend.render(256);

        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(frames, 0);
        assert!(buf.iter().all(|&s| s == -1.0));
        assert_eq!(engine.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_progress_listener_reports_elapsed_time() {
        let catalog = FakeCatalog::new();
        let id = catalog.add_track(1, "Long", 10_000_000);
        let (engine, backend) = engine(&catalog);
        let events = engine.subscribe(64);
        engine.play(&id).unwrap();

        assert_eq!(backend.render_until(44_100), 44_100);

        let saw_second = eventually(|| {
            events
                .try_iter()
                .any(|e| e == PlaybackEvent::Progress { position_ms: 1000 })
        });
        assert!(saw_second);
        assert_eq!(engine.play_progress(), 1000);
    }
}

// ============================================================================
// Automatic Advance
// ============================================================================

mod advance {
    use super::*;

    #[test]
    fn test_exhaustion_advances_to_next_entry() {
        let catalog = FakeCatalog::new();
        catalog.add_track(1, "T1", 500);
        catalog.add_track(2, "T2", 100_000);
        let uris = vec![track_uri(1), track_uri(2)];
        let (engine, backend) = engine(&catalog);
        let events = engine.subscribe(64);

        engine.play_playlist(playlist(&uris), 0).unwrap();
        let _ = next_event(&events);

        assert_eq!(backend.render(2048).0, 250);

        assert_eq!(next_event(&events), Some(PlaybackEvent::TrackFinished));
        match next_event(&events) {
            Some(PlaybackEvent::TrackStarted { track }) => assert_eq!(track.name, "T2"),
            other => panic!("Expected TrackStarted, got {other:?}"),
        }
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(engine.playlist_cursor(), Some(1));
        assert!(backend.is_started());
        assert_eq!(backend.render(64).0, 64);
    }

    #[test]
    fn test_end_of_playlist_goes_idle() {
        let catalog = FakeCatalog::new();
        catalog.add_track(1, "Only", 500);
        let (engine, backend) = engine(&catalog);
        let events = engine.subscribe(64);

        engine.play_playlist(playlist(&[track_uri(1)]), 0).unwrap();
        let _ = next_event(&events);
        backend.render(2048);

        assert_eq!(next_event(&events), Some(PlaybackEvent::TrackFinished));
        assert!(eventually(|| !backend.is_started()));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(engine.playlist_cursor().is_none());
        assert!(matches!(
            engine.play_next().unwrap_err(),
            MinispotError::NoPlaylist
        ));
    }

    #[test]
    fn test_single_track_finishes_idle() {
        let catalog = FakeCatalog::new();
        let id = catalog.add_track(1, "Solo", 200);
        let (engine, backend) = engine(&catalog);

        engine.play(&id).unwrap();
        backend.render(2048);

        assert!(eventually(|| !backend.is_started()));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.track().unwrap().name, "Solo");
    }

    #[test]
    fn test_local_entry_stops_automatic_advance() {
        let catalog = FakeCatalog::new();
        catalog.add_track(1, "T1", 500);
        catalog.add_track(3, "T3", 100_000);
        let uris = vec![
            track_uri(1),
            "spotify:local:Artist:Album:Song:215".to_string(),
            track_uri(3),
        ];
        let (engine, backend) = engine(&catalog);

        engine.play_playlist(playlist(&uris), 0).unwrap();
        backend.render(2048);

        assert!(eventually(|| !backend.is_started()));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.track().unwrap().name, "T1");
        assert_eq!(catalog.loads(), 1);
    }

    #[test]
    fn test_started_listener_may_query_engine() {
        let catalog = FakeCatalog::new();
        catalog.add_track(1, "T1", 500);
        catalog.add_track(2, "T2", 100_000);
        let (engine, backend) = engine(&catalog);
        let engine = Arc::new(engine);

        let (tx, rx) = crossbeam_channel::unbounded();
        let weak = Arc::downgrade(&engine);
        engine.set_on_track_started(move |_| {
            if let Some(engine) = weak.upgrade() {
                let _ = tx.send((engine.is_playing(), engine.playlist_cursor()));
            }
        });

        engine
            .play_playlist(playlist(&[track_uri(1), track_uri(2)]), 0)
            .unwrap();
        backend.render(2048);

        let seen: Vec<_> = rx.iter().take(2).collect();
        assert_eq!(seen, vec![(true, Some(0)), (true, Some(1))]);
    }
}

// ============================================================================
// Teardown
// ============================================================================

mod teardown {
    use super::*;

    #[test]
    fn test_drop_stops_backend_and_releases_stream() {
        let catalog = FakeCatalog::new();
        let id = catalog.add_track(1, "First", 1_000_000);
        let (engine, backend) = engine(&catalog);

        engine.play(&id).unwrap();
        assert_eq!(catalog.live_streams().len(), 1);

        drop(engine);

        assert!(!backend.is_started());
        assert!(catalog.live_streams().is_empty());
    }
}
