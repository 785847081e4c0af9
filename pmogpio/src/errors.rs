use thiserror::Error;

#[derive(Error, Debug)]
pub enum GpioError {
    /// The GPIO facility could not be initialised (missing device, missing
    /// privileges...). Fatal at startup.
    #[error("GPIO hardware unavailable: {0}")]
    HardwareUnavailable(String),
    #[error("GPIO channel {0} is not configured as an input")]
    ChannelNotConfigured(u8),
    #[error("GPIO channel {0} already has an edge subscription")]
    AlreadySubscribed(u8),
    #[error("Cannot arm edge detection on GPIO channel {channel}: {reason}")]
    Interrupt { channel: u8, reason: String },
    #[error("GPIO release failed: {0}")]
    Release(String),
}

impl GpioError {
    pub fn hardware_unavailable(message: &str) -> Self {
        GpioError::HardwareUnavailable(message.to_string())
    }
}
