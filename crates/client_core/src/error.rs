use shared::error::ServiceFault;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReceivingError {
    #[error("service rejected request (status {status}): {}", .message.as_deref().unwrap_or("unknown error"))]
    Service { status: u16, message: Option<String> },
    #[error("shipment detail response has no items")]
    MissingItems,
    #[error("unexpected service payload: {0}")]
    Decode(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("no current shipment selected")]
    NoCurrentShipment,
}

impl ReceivingError {
    /// Server supplied message, when the failure carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ReceivingError::Service { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

impl From<ServiceFault> for ReceivingError {
    fn from(value: ServiceFault) -> Self {
        ReceivingError::Service {
            status: value.status,
            message: value.message,
        }
    }
}

impl From<anyhow::Error> for ReceivingError {
    fn from(value: anyhow::Error) -> Self {
        ReceivingError::Transport(format!("{value:#}"))
    }
}
