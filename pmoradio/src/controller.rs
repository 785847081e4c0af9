//! Button events → playback commands.
//!
//! Edge events arrive on a `crossbeam_channel` fed by the [`EdgeSource`] and
//! are drained by a single dispatch thread: it is the only place where
//! playback commands are issued and where the radio state changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{
    Receiver, RecvTimeoutError, Sender, TryRecvError, bounded, select, unbounded,
};
use pmoconfig::Config;
use pmogpio::{Edge, EdgeEvent, EdgeSource, Pull, SubscriptionHandle};
use pmompd::PlaybackControl;
use tracing::{debug, error, info, warn};

use crate::errors::RadioError;
use crate::state::{OffSwitchMode, RadioState};
use crate::station::{OFF_CHANNEL, Station, StationTable};

const DISPATCH_THREAD_NAME: &str = "radio-dispatch";

/// Tuning of the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RadioSettings {
    /// At most one event per channel within this window.
    pub debounce: Duration,
    /// How long teardown waits for a command in flight.
    pub grace_period: Duration,
    pub off_switch_mode: OffSwitchMode,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            grace_period: Duration::from_millis(500),
            off_switch_mode: OffSwitchMode::Stop,
        }
    }
}

impl RadioSettings {
    pub fn from_config(config: &Config) -> Self {
        let off_switch_mode = config
            .get_off_switch_mode()
            .parse()
            .unwrap_or_else(|err: RadioError| {
                warn!("{}, using 'stop'", err);
                OffSwitchMode::Stop
            });

        Self {
            debounce: Duration::from_millis(config.get_debounce_ms()),
            grace_period: Duration::from_millis(config.get_grace_period_ms()),
            off_switch_mode,
        }
    }
}

/// The radio: station buttons, off switch and the player they drive.
pub struct RadioController {
    edges: Arc<dyn EdgeSource>,
    player: Arc<dyn PlaybackControl>,
    table: Arc<StationTable>,
    state: Arc<Mutex<RadioState>>,
    settings: RadioSettings,
    subscriptions: Vec<SubscriptionHandle>,
    stop_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    torn_down: AtomicBool,
}

impl RadioController {
    /// Binds the stations, subscribes the buttons and starts dispatching.
    ///
    /// Fails with [`RadioError::HardwareUnavailable`] when the lines cannot
    /// be configured. Whatever was set up before a failure is released.
    pub fn new(
        edges: Arc<dyn EdgeSource>,
        player: Arc<dyn PlaybackControl>,
        stations: Vec<Station>,
        settings: RadioSettings,
    ) -> Result<Self, RadioError> {
        let (table, _dropped) = StationTable::build(stations);
        let table = Arc::new(table);

        let (event_tx, event_rx) = unbounded::<EdgeEvent>();
        let subscriptions = match bind_buttons(edges.as_ref(), &table, &settings, &event_tx) {
            Ok(subscriptions) => subscriptions,
            Err(err) => {
                release_quietly(edges.as_ref());
                return Err(err);
            }
        };
        // Seule la source garde des émetteurs : le canal se ferme avec elle
        drop(event_tx);

        let state = Arc::new(Mutex::new(RadioState::Idle));
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = bounded::<()>(1);

        let dispatcher = Dispatcher {
            player: Arc::clone(&player),
            table: Arc::clone(&table),
            state: Arc::clone(&state),
            mode: settings.off_switch_mode,
            paused: false,
        };
        let handle = thread::Builder::new()
            .name(DISPATCH_THREAD_NAME.into())
            .spawn(move || dispatcher.run(event_rx, stop_rx, done_tx));
        let handle = match handle {
            Ok(handle) => handle,
            Err(err) => {
                release_quietly(edges.as_ref());
                return Err(RadioError::DispatcherStart(err));
            }
        };

        info!(
            backend = edges.backend_name(),
            stations = table.len(),
            off_switch = %settings.off_switch_mode,
            "Radio ready"
        );

        Ok(Self {
            edges,
            player,
            table,
            state,
            settings,
            subscriptions,
            stop_tx: Mutex::new(Some(stop_tx)),
            done_rx,
            dispatcher: Mutex::new(Some(handle)),
            torn_down: AtomicBool::new(false),
        })
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> RadioState {
        lock(&self.state).clone()
    }

    pub fn stations(&self) -> &StationTable {
        &self.table
    }

    pub fn settings(&self) -> &RadioSettings {
        &self.settings
    }

    pub fn subscriptions(&self) -> &[SubscriptionHandle] {
        &self.subscriptions
    }

    pub fn player(&self) -> Arc<dyn PlaybackControl> {
        Arc::clone(&self.player)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Shuts the radio down. Only the first call does anything.
    ///
    /// Order: unsubscribe every button, let the dispatcher finish (at most
    /// the grace period), tear the player down, release the lines. A
    /// failing step does not prevent the next ones; the failures are
    /// returned.
    pub fn teardown(&self) -> Vec<RadioError> {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            debug!("Radio already torn down");
            return Vec::new();
        }

        info!("teardown");
        let mut failures = Vec::new();

        if let Err(err) = self.edges.unsubscribe_all() {
            failures.push(RadioError::teardown_error("unsubscribe", err));
        }

        self.stop_dispatcher();

        if let Err(err) = self.player.teardown() {
            failures.push(RadioError::teardown_error("playback teardown", err));
        }

        if let Err(err) = self.edges.cleanup() {
            failures.push(RadioError::teardown_error("gpio cleanup", err));
        }

        *lock(&self.state) = RadioState::Idle;

        for failure in &failures {
            error!("{}", failure);
        }
        failures
    }

    fn stop_dispatcher(&self) {
        // Fermer le canal d'arrêt suffit à réveiller le dispatcher
        drop(lock(&self.stop_tx).take());

        match self.done_rx.recv_timeout(self.settings.grace_period) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = lock(&self.dispatcher).take() {
                    if handle.join().is_err() {
                        warn!("Radio dispatcher panicked");
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    grace_ms = self.settings.grace_period.as_millis() as u64,
                    "Dispatcher still busy after the grace period, abandoning it"
                );
            }
        }
    }
}

impl Drop for RadioController {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Configures and subscribes every bound station channel, then the off switch.
fn bind_buttons(
    edges: &dyn EdgeSource,
    table: &StationTable,
    settings: &RadioSettings,
    sink: &Sender<EdgeEvent>,
) -> Result<Vec<SubscriptionHandle>, RadioError> {
    let mut subscriptions = Vec::with_capacity(table.len() + 1);

    for (channel, station) in table.iter() {
        edges.configure(channel, Pull::Down)?;
        subscriptions.push(edges.subscribe(channel, Edge::Rising, settings.debounce, sink.clone())?);
        info!(channel, station = %station.name, "Callback registered");
    }

    let off_edge = settings.off_switch_mode.edge();
    edges.configure(OFF_CHANNEL, Pull::Down)?;
    subscriptions.push(edges.subscribe(OFF_CHANNEL, off_edge, settings.debounce, sink.clone())?);
    info!(
        channel = OFF_CHANNEL,
        edge = %off_edge,
        mode = %settings.off_switch_mode,
        "Callback registered for the off button"
    );

    Ok(subscriptions)
}

fn release_quietly(edges: &dyn EdgeSource) {
    if let Err(err) = edges.unsubscribe_all() {
        warn!("Cannot unsubscribe after a failed setup: {}", err);
    }
    if let Err(err) = edges.cleanup() {
        warn!("Cannot release GPIO after a failed setup: {}", err);
    }
}

/// Owned by the dispatch thread: the single writer of the radio state.
struct Dispatcher {
    player: Arc<dyn PlaybackControl>,
    table: Arc<StationTable>,
    state: Arc<Mutex<RadioState>>,
    mode: OffSwitchMode,
    paused: bool,
}

impl Dispatcher {
    fn run(mut self, events: Receiver<EdgeEvent>, stop: Receiver<()>, done: Sender<()>) {
        debug!("Radio dispatcher started");
        loop {
            select! {
                recv(stop) -> _ => break,
                recv(events) -> msg => match msg {
                    Ok(event) => {
                        if stopping(&stop) {
                            debug!(channel = event.channel, "Shutting down, event abandoned");
                            break;
                        }
                        self.handle(event);
                    }
                    Err(_) => break,
                },
            }
        }
        let _ = done.send(());
        debug!("Radio dispatcher stopped");
    }

    fn handle(&mut self, event: EdgeEvent) {
        debug!(channel = event.channel, edge = %event.edge, "Edge event");
        if event.channel == OFF_CHANNEL {
            self.switch_off(event.edge);
            return;
        }

        match self.table.get(event.channel) {
            Some(station) => {
                let station = station.clone();
                self.switch_to(event.channel, station);
            }
            None => {
                let err = RadioError::UnknownChannelEvent(event.channel);
                warn!("{}, ignored", err);
            }
        }
    }

    fn switch_to(&mut self, channel: u8, station: Station) {
        info!(channel, "switch to station: {}", station.name);
        match self.player.play(&station.uri) {
            Ok(()) => {
                self.paused = false;
                self.set_state(RadioState::Playing(station));
            }
            Err(err) => {
                warn!(station = %station.name, "Cannot play station: {}", RadioError::from(err));
            }
        }
    }

    fn switch_off(&mut self, edge: Edge) {
        match self.mode {
            OffSwitchMode::Stop => {
                info!("switch off the radio");
                match self.player.stop() {
                    Ok(()) => self.set_state(RadioState::Idle),
                    Err(err) => warn!("Cannot stop playback: {}", RadioError::from(err)),
                }
            }
            OffSwitchMode::PauseToggle => {
                // Le drapeau bascule même si la commande échoue
                self.paused = !self.paused;
                let paused = self.paused;
                info!(paused, edge = %edge, "toggle pause");

                match self.player.pause(paused) {
                    Ok(()) => {
                        let next = match lock(&self.state).clone() {
                            RadioState::Playing(station) if paused => RadioState::Paused(station),
                            RadioState::Paused(station) if !paused => RadioState::Playing(station),
                            other => other,
                        };
                        self.set_state(next);
                    }
                    Err(err) => warn!(paused, "Cannot set pause: {}", RadioError::from(err)),
                }
            }
        }
    }

    fn set_state(&self, next: RadioState) {
        let mut state = lock(&self.state);
        let previous: &RadioState = &state;
        if *previous != next {
            debug!(from = %previous, to = %next, "Radio state changed");
        }
        *state = next;
    }
}

/// The stop channel is never written to, only closed.
fn stopping(stop: &Receiver<()>) -> bool {
    matches!(stop.try_recv(), Err(TryRecvError::Disconnected))
}
