//! Property-based tests for the playback session
//!
//! Random command sequences against the simulated engine; every sequence
//! must keep the state machine and the single-track invariant intact.

mod common;

use animusic_playback::{PlaybackStatus, SleepTimerState};
use common::{harness, settle, track, uri};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TRACKS: [&str; 3] = ["a", "b", "broken"];

#[derive(Debug, Clone)]
enum Command {
    Play(usize),
    Pause,
    Resume,
    TogglePause,
    Stop,
    Seek(u64),
    Advance(u64),
    Finish,
    ArmTimer(u32, bool),
    CancelTimer,
}

fn command() -> impl Strategy<Value = Command> {
    prop_oneof![
        4 => (0..TRACKS.len()).prop_map(Command::Play),
        2 => Just(Command::Pause),
        2 => Just(Command::Resume),
        1 => Just(Command::TogglePause),
        1 => Just(Command::Stop),
        1 => (0u64..400).prop_map(Command::Seek),
        3 => (1u64..90).prop_map(Command::Advance),
        1 => Just(Command::Finish),
        1 => (1u32..3, any::<bool>()).prop_map(|(m, f)| Command::ArmTimer(m, f)),
        1 => Just(Command::CancelTimer),
    ]
}

fn allowed(from: PlaybackStatus, to: PlaybackStatus) -> bool {
    use PlaybackStatus::{Idle, Loading, Paused, Playing, Stopped};
    matches!(
        (from, to),
        (Idle, Loading)
            | (Loading, Playing | Idle | Stopped)
            | (Playing, Paused | Stopped | Loading)
            | (Paused, Playing | Stopped | Loading)
            | (Stopped, Idle)
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: status only follows the state machine, and at most one
    /// handle is ever loaded
    #[test]
    fn commands_keep_invariants(commands in prop::collection::vec(command(), 1..40)) {
        runtime().block_on(async move {
            let h = harness();
            h.engine.fail_uri(&uri("broken"));

            let statuses = Arc::new(Mutex::new(vec![PlaybackStatus::Idle]));
            let _sub = {
                let statuses = Arc::clone(&statuses);
                h.session.subscribe(move |snapshot| {
                    let mut log = statuses.lock().unwrap();
                    if log.last() != Some(&snapshot.playback.status) {
                        log.push(snapshot.playback.status);
                    }
                })
            };

            for command in commands {
                match command {
                    Command::Play(i) => {
                        let _ = h.session.play(track(TRACKS[i], 300)).await;
                    }
                    Command::Pause => {
                        let _ = h.session.pause().await;
                    }
                    Command::Resume => {
                        let _ = h.session.resume().await;
                    }
                    Command::TogglePause => {
                        let _ = h.session.toggle_pause().await;
                    }
                    Command::Stop => {
                        h.session.stop().await.unwrap();
                    }
                    Command::Seek(secs) => {
                        let _ = h.session.seek(Duration::from_secs(secs)).await;
                    }
                    Command::Advance(secs) => {
                        tokio::time::sleep(Duration::from_secs(secs)).await;
                    }
                    Command::Finish => {
                        if let Some(handle) = h.engine.playing().first().copied() {
                            h.engine.finish(handle);
                        }
                    }
                    Command::ArmTimer(minutes, fade) => {
                        h.session.attach_sleep_timer(minutes, fade).await.unwrap();
                    }
                    Command::CancelTimer => {
                        h.session.cancel_sleep_timer().await;
                        prop_assert_eq!(
                            h.session.snapshot().sleep_timer.state,
                            SleepTimerState::Inactive
                        );
                    }
                }
                settle().await;

                prop_assert!(h.engine.live().len() <= 1, "more than one handle loaded");
                prop_assert!(h.engine.playing().len() <= 1, "more than one track audible");

                let snapshot = h.session.snapshot();
                let audible = h.engine.playing().len();
                if snapshot.playback.status != PlaybackStatus::Playing {
                    prop_assert_eq!(audible, 0);
                }
                let duration = snapshot.playback.duration;
                if !duration.is_zero() {
                    prop_assert!(snapshot.playback.position <= duration);
                }
            }

            let statuses = statuses.lock().unwrap().clone();
            for pair in statuses.windows(2) {
                prop_assert!(
                    allowed(pair[0], pair[1]),
                    "undefined transition {:?} -> {:?} in {:?}",
                    pair[0],
                    pair[1],
                    statuses
                );
            }
            Ok(())
        })?;
    }

    /// Property: replaying the playing track never reloads or rewinds it
    #[test]
    fn replaying_the_current_track_is_idempotent(
        warmup in 0u64..120,
        repeats in 1usize..6,
    ) {
        runtime().block_on(async move {
            let h = harness();
            h.session.play(track("a", 300)).await.unwrap();
            tokio::time::sleep(Duration::from_secs(warmup)).await;
            settle().await;
            let before = h.session.snapshot().playback.position;

            for _ in 0..repeats {
                h.session.play(track("a", 300)).await.unwrap();
            }

            prop_assert_eq!(h.engine.load_count(&uri("a")), 1);
            prop_assert!(h.session.snapshot().playback.position >= before);
            prop_assert!(h.engine.seeks().is_empty());
            Ok(())
        })?;
    }
}
