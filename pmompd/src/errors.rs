use thiserror::Error;

#[derive(Error, Debug)]
pub enum MpdError {
    /// The daemon could not be reached (resolution, connection or greeting).
    #[error("MPD at {address} is unreachable: {reason}")]
    ServiceUnreachable { address: String, reason: String },
    #[error("MPD I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MPD protocol error: {0}")]
    Protocol(String),
    /// `ACK [code@index] {command} message`
    #[error("MPD refused '{command}': {message} (error {code})")]
    Ack {
        code: u32,
        command: String,
        message: String,
    },
    #[error("MPD client already torn down")]
    SessionClosed,
}

impl MpdError {
    pub fn protocol(message: &str) -> Self {
        MpdError::Protocol(message.to_string())
    }

    pub fn unreachable(address: &str, reason: impl ToString) -> Self {
        MpdError::ServiceUnreachable {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, MpdError::ServiceUnreachable { .. })
    }
}
