use pmogpio::GpioError;
use pmompd::MpdError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RadioError {
    /// Le GPIO n'a pas pu être initialisé (droits, carte absente)
    #[error("GPIO facility unavailable: {0}")]
    HardwareUnavailable(String),
    #[error("Playback service unreachable: {0}")]
    ServiceUnreachable(String),
    #[error("Edge event on channel {0} bound to no station")]
    UnknownChannelEvent(u8),
    #[error("Teardown step '{step}' failed: {reason}")]
    TeardownError { step: &'static str, reason: String },
    #[error("Playback error: {0}")]
    Playback(MpdError),
    #[error("GPIO error: {0}")]
    Gpio(GpioError),
    #[error("Invalid off switch mode '{0}' (expected 'stop' or 'pause_toggle')")]
    InvalidOffSwitchMode(String),
    #[error("Cannot start the dispatch thread: {0}")]
    DispatcherStart(std::io::Error),
}

impl RadioError {
    pub fn teardown_error(step: &'static str, reason: impl ToString) -> Self {
        RadioError::TeardownError {
            step,
            reason: reason.to_string(),
        }
    }
}

impl From<GpioError> for RadioError {
    fn from(err: GpioError) -> Self {
        match err {
            GpioError::HardwareUnavailable(reason) => RadioError::HardwareUnavailable(reason),
            other => RadioError::Gpio(other),
        }
    }
}

impl From<MpdError> for RadioError {
    fn from(err: MpdError) -> Self {
        if err.is_unreachable() {
            RadioError::ServiceUnreachable(err.to_string())
        } else {
            RadioError::Playback(err)
        }
    }
}
