/// Error taxonomy for the Stratum server
///
/// Every client-caused failure collapses into `Malformed`; the connection
/// task treats it exactly like a transport error and tears the session down.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StratumError {
    /// Decode failure, schema violation, invalid address or unknown method
    #[error("client {client_id} sent a malformed {} message: {reason}", .method.as_deref().unwrap_or("stratum"))]
    Malformed {
        client_id: u64,
        method: Option<String>,
        reason: String,
    },

    /// Socket read/write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No bytes arrived within the configured idle window
    #[error("client {client_id} idle for too long")]
    IdleTimeout { client_id: u64 },

    /// A contract the server itself must uphold was broken
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl StratumError {
    pub fn malformed(client_id: u64, method: Option<&str>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            client_id,
            method: method.map(str::to_string),
            reason: reason.into(),
        }
    }

    /// Connection-fatal errors only cost the offending session.
    pub fn is_connection_fatal(&self) -> bool {
        !matches!(self, Self::Invariant(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraffitiError {
    #[error("graffiti '{label}' is {len} bytes, maximum is {max}")]
    TooLong { label: String, len: usize, max: usize },
}

pub type StratumResult<T> = Result<T, StratumError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display_includes_method() {
        let err = StratumError::malformed(7, Some("mining.submit"), "missing randomness");
        assert_eq!(
            err.to_string(),
            "client 7 sent a malformed mining.submit message: missing randomness"
        );

        let err = StratumError::malformed(7, None, "invalid JSON");
        assert_eq!(err.to_string(), "client 7 sent a malformed stratum message: invalid JSON");
    }

    #[test]
    fn test_only_invariant_is_process_fatal() {
        assert!(StratumError::malformed(1, None, "x").is_connection_fatal());
        assert!(StratumError::IdleTimeout { client_id: 1 }.is_connection_fatal());
        assert!(!StratumError::Invariant("job missing".into()).is_connection_fatal());
    }
}
