//! Error types for Player operations

/// Result type alias for Player operations
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Errors raised while talking to the Player or interpreting host requests.
///
/// None of these are fatal to a running accessory: a failed operation is
/// reported to its caller and the next command or poll tick proceeds normally.
/// `Configuration` is the exception and only occurs at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    /// The device could not be reached (timeout, refused, DNS, unreachable)
    #[error("{operation} failed: could not reach {target}: {reason}")]
    Connectivity {
        operation: &'static str,
        target: String,
        reason: String,
    },

    /// The device answered with a non-success HTTP status
    #[error("{operation} failed: Player answered {status} for key '{key}'")]
    Protocol {
        operation: &'static str,
        key: String,
        status: u16,
    },

    /// The active remote-key mapping has no device key for this remote key
    #[error("No Player key mapped for remote key {key}")]
    UnmappedKey { key: String },

    /// The host delivered an identifier outside the known closed set
    #[error("Unknown {kind} identifier: {id}")]
    UnknownIdentifier { kind: &'static str, id: String },

    /// Required settings missing or invalid
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PlayerError {
    /// Whether this error means the device was unreachable
    pub fn is_connectivity(&self) -> bool {
        matches!(self, PlayerError::Connectivity { .. })
    }

    /// Whether this error is a non-success status from the device
    pub fn is_protocol(&self) -> bool {
        matches!(self, PlayerError::Protocol { .. })
    }
}
