//! dirguard error types

use thiserror::Error;

/// dirguard error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP-level failure talking to the model endpoint
    #[error("Transport error: {0}")]
    Transport(String),

    /// Policy oracle could not be reached (transport failure or timeout)
    #[error("Policy oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// Policy oracle replied, but the reply does not parse into a verdict
    #[error("Malformed oracle verdict: {0}")]
    OracleMalformedResponse(String),

    /// Completion oracle failed to produce a reply
    #[error("Generation error: {0}")]
    Generation(String),

    /// Turn protocol violation
    #[error("Session error: {0}")]
    Session(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error must be treated as a negative verdict at a guard
    /// boundary. Guards fail closed: an oracle that cannot answer is an
    /// oracle that said "unsafe".
    pub fn is_oracle_failure(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::OracleUnavailable(_) | Error::OracleMalformedResponse(_)
        )
    }
}

/// Result type alias for dirguard operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_failures_are_flagged() {
        assert!(Error::OracleUnavailable("timeout".into()).is_oracle_failure());
        assert!(Error::OracleMalformedResponse("not json".into()).is_oracle_failure());
        assert!(Error::Transport("connection refused".into()).is_oracle_failure());
    }

    #[test]
    fn non_oracle_failures_are_not_flagged() {
        assert!(!Error::Config("bad field".into()).is_oracle_failure());
        assert!(!Error::Generation("rate limited".into()).is_oracle_failure());
        assert!(!Error::Session("illegal transition".into()).is_oracle_failure());
    }
}
