//! Raspberry Pi backend (BCM numbering) built on `rppal`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use rppal::gpio::{Event, Gpio, InputPin, Trigger};
use rppal::system::DeviceInfo;
use tracing::{debug, info, warn};

use crate::errors::GpioError;
use crate::model::{Edge, EdgeEvent, Pull, SubscriptionHandle};
use crate::source::{EdgeSource, SubscriptionTable};

pub struct RppalEdgeSource {
    gpio: Gpio,
    pins: Mutex<HashMap<u8, InputPin>>,
    table: Arc<SubscriptionTable>,
    released: AtomicBool,
}

impl RppalEdgeSource {
    /// Opens the GPIO peripheral.
    ///
    /// Fails with [`GpioError::HardwareUnavailable`] when `/dev/gpiomem` (or
    /// the gpiochip device) cannot be opened, usually a permission problem.
    pub fn new() -> Result<Self, GpioError> {
        let gpio = Gpio::new().map_err(|err| {
            GpioError::HardwareUnavailable(format!(
                "{err} (is the user allowed to access the GPIO device?)"
            ))
        })?;

        match DeviceInfo::new() {
            Ok(device) => info!("GPIO ready on {}", device.model()),
            Err(err) => debug!("Unknown board model: {}", err),
        }

        Ok(Self {
            gpio,
            pins: Mutex::new(HashMap::new()),
            table: Arc::new(SubscriptionTable::new()),
            released: AtomicBool::new(false),
        })
    }

    fn pins(&self) -> MutexGuard<'_, HashMap<u8, InputPin>> {
        self.pins.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn trigger_for(edge: Edge) -> Trigger {
    match edge {
        Edge::Rising => Trigger::RisingEdge,
        Edge::Falling => Trigger::FallingEdge,
        Edge::Both => Trigger::Both,
    }
}

impl EdgeSource for RppalEdgeSource {
    fn configure(&self, channel: u8, pull: Pull) -> Result<(), GpioError> {
        let mut pins = self.pins();
        // Libère l'ancienne configuration avant de reprendre la broche
        pins.remove(&channel);

        let pin = self.gpio.get(channel).map_err(|err| {
            GpioError::HardwareUnavailable(format!("GPIO {channel}: {err}"))
        })?;
        let input = match pull {
            Pull::Up => pin.into_input_pullup(),
            Pull::Down => pin.into_input_pulldown(),
            Pull::Off => pin.into_input(),
        };
        pins.insert(channel, input);
        self.released.store(false, Ordering::SeqCst);

        debug!(channel, pull = ?pull, "GPIO channel configured as input");
        Ok(())
    }

    fn subscribe(
        &self,
        channel: u8,
        edge: Edge,
        debounce: Duration,
        sink: Sender<EdgeEvent>,
    ) -> Result<SubscriptionHandle, GpioError> {
        let mut pins = self.pins();
        let pin = pins
            .get_mut(&channel)
            .ok_or(GpioError::ChannelNotConfigured(channel))?;

        let handle = self.table.insert(channel, edge, debounce, sink)?;

        // Debounce is done by the subscription table, not by the kernel, so
        // that every backend suppresses bounces the same way.
        let table = Arc::clone(&self.table);
        let armed = pin.set_async_interrupt(trigger_for(edge), None, move |event: Event| {
            let observed = match event.trigger {
                Trigger::RisingEdge => Edge::Rising,
                Trigger::FallingEdge => Edge::Falling,
                _ => return,
            };
            table.dispatch(channel, observed, Instant::now());
        });

        if let Err(err) = armed {
            self.table.remove(channel);
            return Err(GpioError::Interrupt {
                channel,
                reason: err.to_string(),
            });
        }

        info!(channel, edge = %edge, debounce_ms = debounce.as_millis() as u64, "Edge detection armed");
        Ok(handle)
    }

    fn unsubscribe_all(&self) -> Result<(), GpioError> {
        let mut failures = Vec::new();
        for (channel, pin) in self.pins().iter_mut() {
            if let Err(err) = pin.clear_async_interrupt() {
                warn!(channel, "Cannot disarm edge detection: {}", err);
                failures.push(format!("GPIO {channel}: {err}"));
            }
        }
        let removed = self.table.clear();
        debug!(removed, "Edge subscriptions removed");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(GpioError::Release(failures.join(", ")))
        }
    }

    fn cleanup(&self) -> Result<(), GpioError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.unsubscribe_all();
        // Dropping an InputPin restores its previous mode and pull state
        let released = {
            let mut pins = self.pins();
            let count = pins.len();
            pins.clear();
            count
        };
        info!(released, "GPIO released");
        result
    }

    fn backend_name(&self) -> &'static str {
        "rppal"
    }
}
