#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use pmogpio::SimulatedEdgeSource;
use pmompd::{MpdError, PlaybackControl, PlayerInfo, PlayerStatus};
use pmoradio::{RadioController, RadioSettings, RadioState, Station};

pub const WAIT: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Stop,
    Play(String),
    Pause(bool),
    Info,
    Teardown,
}

/// Player double: records every call and reports it on a channel.
pub struct RecordingPlayer {
    calls: Mutex<Vec<Call>>,
    notify: Sender<Call>,
    unreachable: AtomicBool,
    play_delay: Mutex<Duration>,
    info_delay: Mutex<Duration>,
}

impl RecordingPlayer {
    pub fn new() -> (Arc<Self>, Receiver<Call>) {
        let (notify, rx) = unbounded();
        let player = Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            notify,
            unreachable: AtomicBool::new(false),
            play_delay: Mutex::new(Duration::ZERO),
            info_delay: Mutex::new(Duration::ZERO),
        });
        (player, rx)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Every command fails as if the daemon were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn set_play_delay(&self, delay: Duration) {
        *self.play_delay.lock().unwrap() = delay;
    }

    /// Status queries hang this long, like a daemon that stopped answering.
    pub fn set_info_delay(&self, delay: Duration) {
        *self.info_delay.lock().unwrap() = delay;
    }

    fn record(&self, call: Call) -> Result<(), MpdError> {
        self.calls.lock().unwrap().push(call.clone());
        let _ = self.notify.send(call);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(MpdError::unreachable("fake:6600", "connection refused"));
        }
        Ok(())
    }
}

impl PlaybackControl for RecordingPlayer {
    fn stop(&self) -> Result<(), MpdError> {
        self.record(Call::Stop)
    }

    fn play(&self, uri: &str) -> Result<(), MpdError> {
        let delay = *self.play_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.record(Call::Play(uri.to_string()))
    }

    fn pause(&self, paused: bool) -> Result<(), MpdError> {
        self.record(Call::Pause(paused))
    }

    fn info(&self) -> Result<PlayerInfo, MpdError> {
        self.record(Call::Info)?;
        let delay = *self.info_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        Ok(PlayerInfo {
            status: PlayerStatus::from_pairs(vec![("state".into(), "stop".into())]),
            ..PlayerInfo::default()
        })
    }

    fn teardown(&self) -> Result<(), MpdError> {
        self.record(Call::Teardown)
    }

    fn version(&self) -> &str {
        "0.23.5"
    }
}

pub fn stations(names: &[&str]) -> Vec<Station> {
    names
        .iter()
        .map(|name| Station::new(*name, format!("{}.mp3", name.to_lowercase())))
        .collect()
}

pub struct Radio {
    pub controller: RadioController,
    pub edges: Arc<SimulatedEdgeSource>,
    pub player: Arc<RecordingPlayer>,
    pub calls: Receiver<Call>,
}

pub fn radio(names: &[&str], settings: RadioSettings) -> Radio {
    let edges = Arc::new(SimulatedEdgeSource::new());
    let (player, calls) = RecordingPlayer::new();
    let controller = RadioController::new(
        edges.clone(),
        player.clone(),
        stations(names),
        settings,
    )
    .unwrap();
    Radio {
        controller,
        edges,
        player,
        calls,
    }
}

/// Waits for the next recorded call.
pub fn next_call(calls: &Receiver<Call>) -> Call {
    calls.recv_timeout(WAIT).expect("no playback call received")
}

/// Asserts that nothing else reaches the player for a short while.
pub fn assert_quiet(calls: &Receiver<Call>) {
    assert!(
        calls.recv_timeout(Duration::from_millis(100)).is_err(),
        "unexpected playback call"
    );
}

/// The state changes right after the player call returns: poll for it.
pub fn wait_for_state(controller: &RadioController, expected: &RadioState) {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if controller.state() == *expected {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(controller.state(), *expected);
}
