mod common;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use common::{Call, RecordingPlayer, assert_quiet, next_call, radio, stations, wait_for_state};
use crossbeam_channel::Sender;
use pmogpio::{
    Edge, EdgeEvent, EdgeSource, GpioError, Pull, SimulatedEdgeSource, SubscriptionHandle,
};
use pmoradio::{
    OFF_CHANNEL, OffSwitchMode, RadioController, RadioError, RadioSettings, RadioState,
    STATION_CHANNELS, Station,
};

fn no_debounce() -> RadioSettings {
    RadioSettings {
        debounce: Duration::ZERO,
        ..RadioSettings::default()
    }
}

#[test]
fn test_each_station_button_plays_its_station() {
    let radio = radio(&["Jazz", "News", "Rock", "Folk"], RadioSettings::default());

    for channel in STATION_CHANNELS {
        assert!(radio.edges.trigger(channel, Edge::Rising));
        let expected = radio.controller.stations().get(channel).unwrap().uri.clone();
        assert_eq!(next_call(&radio.calls), Call::Play(expected));
    }
    assert_quiet(&radio.calls);

    assert_eq!(
        radio.player.calls(),
        vec![
            Call::Play("jazz.mp3".into()),
            Call::Play("news.mp3".into()),
            Call::Play("rock.mp3".into()),
            Call::Play("folk.mp3".into()),
        ]
    );
}

#[test]
fn test_station_buttons_ignore_falling_edges() {
    let radio = radio(&["Jazz"], RadioSettings::default());

    assert!(!radio.edges.trigger(5, Edge::Falling));
    assert_quiet(&radio.calls);
}

#[test]
fn test_off_switch_stops_in_any_state() {
    let radio = radio(&["Jazz", "News"], no_debounce());

    // Idle
    assert!(radio.edges.trigger(OFF_CHANNEL, Edge::Falling));
    assert_eq!(next_call(&radio.calls), Call::Stop);

    // Playing
    radio.edges.trigger(5, Edge::Rising);
    assert_eq!(next_call(&radio.calls), Call::Play("jazz.mp3".into()));
    wait_for_state(
        &radio.controller,
        &RadioState::Playing(Station::new("Jazz", "jazz.mp3")),
    );

    radio.edges.trigger(OFF_CHANNEL, Edge::Falling);
    assert_eq!(next_call(&radio.calls), Call::Stop);
    wait_for_state(&radio.controller, &RadioState::Idle);

    assert_eq!(radio.player.count(&Call::Stop), 2);
}

#[test]
fn test_off_switch_ignores_rising_edge_in_stop_mode() {
    let radio = radio(&["Jazz"], RadioSettings::default());

    assert!(!radio.edges.trigger(OFF_CHANNEL, Edge::Rising));
    assert_quiet(&radio.calls);
}

#[test]
fn test_five_stations_bind_four_buttons() {
    let radio = radio(&["A", "B", "C", "D", "E"], RadioSettings::default());

    assert_eq!(radio.controller.stations().len(), 4);
    for channel in STATION_CHANNELS {
        assert!(radio.edges.is_subscribed(channel));
    }
    assert!(radio.edges.is_subscribed(OFF_CHANNEL));
    // Quatre stations plus l'interrupteur
    assert_eq!(radio.edges.subscription_count(), 5);
    assert_eq!(radio.controller.subscriptions().len(), 5);
    assert!(
        radio
            .controller
            .stations()
            .iter()
            .all(|(_, station)| station.name != "E")
    );
}

/// Collects what the fmt layer writes.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_fifth_station_is_reported_as_dropped() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let built = tracing::subscriber::with_default(subscriber, || {
        radio(&["A", "B", "C", "D", "E"], RadioSettings::default())
    });

    let output = logs.contents();
    let dropped: Vec<_> = output
        .lines()
        .filter(|line| line.contains("Station dropped"))
        .collect();
    assert_eq!(dropped.len(), 1, "logs were:\n{}", output);
    assert!(dropped[0].contains("WARN"));
    assert!(dropped[0].contains("station=E"));
    assert_eq!(built.controller.stations().len(), 4);
}

#[test]
fn test_two_stations_bind_the_first_two_buttons() {
    let radio = radio(&["Jazz", "News"], RadioSettings::default());

    assert!(radio.edges.is_subscribed(5));
    assert!(radio.edges.is_subscribed(6));
    assert!(!radio.edges.is_subscribed(13));
    assert!(!radio.edges.is_subscribed(19));
    assert!(!radio.edges.is_configured(13));
    assert_eq!(radio.edges.pull(5), Some(Pull::Down));
    assert_eq!(radio.edges.pull(OFF_CHANNEL), Some(Pull::Down));

    assert!(!radio.edges.trigger(13, Edge::Rising));
    assert_quiet(&radio.calls);
}

#[test]
fn test_bounce_gives_one_play() {
    let radio = radio(&["Jazz"], RadioSettings::default());

    let t0 = Instant::now();
    assert!(radio.edges.inject(5, Edge::Rising, t0));
    assert!(!radio.edges.inject(5, Edge::Rising, t0 + Duration::from_millis(2)));
    assert!(!radio.edges.inject(5, Edge::Rising, t0 + Duration::from_millis(120)));

    assert_eq!(next_call(&radio.calls), Call::Play("jazz.mp3".into()));
    assert_quiet(&radio.calls);
    assert_eq!(radio.player.count(&Call::Play("jazz.mp3".into())), 1);
}

#[test]
fn test_off_switch_bounce_gives_one_stop() {
    let radio = radio(&["Jazz"], RadioSettings::default());

    let t0 = Instant::now();
    assert!(radio.edges.inject(OFF_CHANNEL, Edge::Falling, t0));
    assert!(!radio.edges.inject(OFF_CHANNEL, Edge::Falling, t0 + Duration::from_millis(3)));
    assert!(!radio.edges.inject(OFF_CHANNEL, Edge::Falling, t0 + Duration::from_millis(150)));

    assert_eq!(next_call(&radio.calls), Call::Stop);
    assert_quiet(&radio.calls);
    assert_eq!(radio.player.count(&Call::Stop), 1);
}

#[test]
fn test_jazz_then_off() {
    let radio = radio(&["Jazz", "News"], RadioSettings::default());

    radio.edges.trigger(5, Edge::Rising);
    assert_eq!(next_call(&radio.calls), Call::Play("jazz.mp3".into()));

    radio.edges.trigger(OFF_CHANNEL, Edge::Falling);
    assert_eq!(next_call(&radio.calls), Call::Stop);
    assert_quiet(&radio.calls);

    wait_for_state(&radio.controller, &RadioState::Idle);
    assert_eq!(
        radio.player.calls(),
        vec![Call::Play("jazz.mp3".into()), Call::Stop]
    );
}

#[test]
fn test_switching_station_replaces_the_previous_one() {
    let radio = radio(&["Jazz", "News"], RadioSettings::default());

    radio.edges.trigger(5, Edge::Rising);
    assert_eq!(next_call(&radio.calls), Call::Play("jazz.mp3".into()));
    radio.edges.trigger(6, Edge::Rising);
    assert_eq!(next_call(&radio.calls), Call::Play("news.mp3".into()));

    wait_for_state(
        &radio.controller,
        &RadioState::Playing(Station::new("News", "news.mp3")),
    );
}

#[test]
fn test_pause_toggle_mode() {
    let settings = RadioSettings {
        off_switch_mode: OffSwitchMode::PauseToggle,
        ..no_debounce()
    };
    let radio = radio(&["Jazz"], settings);
    let jazz = Station::new("Jazz", "jazz.mp3");

    // Rien de sélectionné : le drapeau bascule quand même
    radio.edges.trigger(OFF_CHANNEL, Edge::Rising);
    assert_eq!(next_call(&radio.calls), Call::Pause(true));
    wait_for_state(&radio.controller, &RadioState::Idle);

    radio.edges.trigger(5, Edge::Rising);
    assert_eq!(next_call(&radio.calls), Call::Play("jazz.mp3".into()));
    wait_for_state(&radio.controller, &RadioState::Playing(jazz.clone()));

    radio.edges.trigger(OFF_CHANNEL, Edge::Rising);
    assert_eq!(next_call(&radio.calls), Call::Pause(true));
    wait_for_state(&radio.controller, &RadioState::Paused(jazz.clone()));

    radio.edges.trigger(OFF_CHANNEL, Edge::Falling);
    assert_eq!(next_call(&radio.calls), Call::Pause(false));
    wait_for_state(&radio.controller, &RadioState::Playing(jazz));

    assert_eq!(radio.player.count(&Call::Stop), 0);
}

#[test]
fn test_hardware_unavailable_is_fatal() {
    let edges = Arc::new(SimulatedEdgeSource::unavailable());
    let (player, _calls) = RecordingPlayer::new();

    let result = RadioController::new(
        edges.clone(),
        player.clone(),
        stations(&["Jazz"]),
        RadioSettings::default(),
    );

    assert!(matches!(result, Err(RadioError::HardwareUnavailable(_))));
    assert!(player.calls().is_empty());
    assert_eq!(edges.subscription_count(), 0);
}

#[test]
fn test_unreachable_player_drops_the_press() {
    let radio = radio(&["Jazz"], no_debounce());
    radio.player.set_unreachable(true);

    radio.edges.trigger(5, Edge::Rising);
    assert_eq!(next_call(&radio.calls), Call::Play("jazz.mp3".into()));
    assert_quiet(&radio.calls);
    assert_eq!(radio.controller.state(), RadioState::Idle);

    // Pas de nouvelle tentative automatique : le prochain appui réessaie
    radio.player.set_unreachable(false);
    radio.edges.trigger(5, Edge::Rising);
    assert_eq!(next_call(&radio.calls), Call::Play("jazz.mp3".into()));
    wait_for_state(
        &radio.controller,
        &RadioState::Playing(Station::new("Jazz", "jazz.mp3")),
    );
}

#[test]
fn test_teardown_twice() {
    let radio = radio(&["Jazz", "News"], RadioSettings::default());

    assert!(radio.controller.teardown().is_empty());
    assert!(radio.controller.teardown().is_empty());

    assert!(radio.controller.is_torn_down());
    assert_eq!(radio.edges.cleanup_count(), 1);
    assert_eq!(radio.edges.subscription_count(), 0);
    assert_eq!(radio.player.count(&Call::Teardown), 1);
    assert_eq!(radio.controller.state(), RadioState::Idle);

    // Plus aucun événement n'est livré
    assert!(!radio.edges.trigger(5, Edge::Rising));
}

#[test]
fn test_teardown_waits_for_the_command_in_flight() {
    let settings = RadioSettings {
        grace_period: Duration::from_secs(2),
        ..RadioSettings::default()
    };
    let radio = radio(&["Jazz"], settings);
    radio.player.set_play_delay(Duration::from_millis(200));

    radio.edges.trigger(5, Edge::Rising);
    // Laisse le dispatcher prendre l'événement
    thread::sleep(Duration::from_millis(50));

    assert!(radio.controller.teardown().is_empty());
    assert_eq!(
        radio.player.calls(),
        vec![Call::Play("jazz.mp3".into()), Call::Teardown]
    );
}

#[test]
fn test_teardown_collects_failures_and_keeps_going() {
    let radio = radio(&["Jazz"], RadioSettings::default());
    radio.player.set_unreachable(true);

    let failures = radio.controller.teardown();

    assert_eq!(failures.len(), 1);
    assert!(matches!(
        &failures[0],
        RadioError::TeardownError {
            step: "playback teardown",
            ..
        }
    ));
    // Le GPIO est libéré malgré l'échec précédent
    assert_eq!(radio.edges.cleanup_count(), 1);
}

#[test]
fn test_drop_tears_down() {
    let common::Radio {
        controller,
        edges,
        player,
        ..
    } = radio(&["Jazz"], RadioSettings::default());

    drop(controller);

    assert_eq!(edges.cleanup_count(), 1);
    assert_eq!(player.count(&Call::Teardown), 1);
}

/// Edge source handing its sink back to the test, to emit arbitrary events.
#[derive(Default)]
struct CapturingSource {
    sink: Mutex<Option<Sender<EdgeEvent>>>,
}

impl CapturingSource {
    fn emit(&self, channel: u8, edge: Edge) {
        if let Some(sink) = self.sink.lock().unwrap().as_ref() {
            sink.send(EdgeEvent {
                channel,
                edge,
                at: Instant::now(),
            })
            .unwrap();
        }
    }
}

impl EdgeSource for CapturingSource {
    fn configure(&self, _channel: u8, _pull: Pull) -> Result<(), GpioError> {
        Ok(())
    }

    fn subscribe(
        &self,
        channel: u8,
        edge: Edge,
        _debounce: Duration,
        sink: Sender<EdgeEvent>,
    ) -> Result<SubscriptionHandle, GpioError> {
        let probe = SimulatedEdgeSource::new();
        probe.configure(channel, Pull::Down)?;
        let handle = probe.subscribe(channel, edge, Duration::ZERO, sink.clone())?;
        *self.sink.lock().unwrap() = Some(sink);
        Ok(handle)
    }

    fn unsubscribe_all(&self) -> Result<(), GpioError> {
        self.sink.lock().unwrap().take();
        Ok(())
    }

    fn cleanup(&self) -> Result<(), GpioError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "capturing"
    }
}

#[test]
fn test_unknown_channel_is_ignored() {
    let edges = Arc::new(CapturingSource::default());
    let (player, calls) = RecordingPlayer::new();
    let controller = RadioController::new(
        edges.clone(),
        player.clone(),
        stations(&["Jazz"]),
        RadioSettings::default(),
    )
    .unwrap();

    edges.emit(22, Edge::Rising);
    assert_quiet(&calls);

    // Le dispatcher tourne toujours
    edges.emit(5, Edge::Rising);
    assert_eq!(next_call(&calls), Call::Play("jazz.mp3".into()));

    assert!(controller.teardown().is_empty());
}
