// ================================================================
// File: sinuscheck-common/src/error.rs
// ================================================================

use thiserror::Error;
use sinuscheck_ts3::Ts3Error;

#[derive(Debug, Error)]
pub enum Error {
    /// One layer of the operation chain, e.g.
    /// `could not change instance settings: could not do request: ...`
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },

    // Transport
    #[error("could not do request: {0}")]
    Http(#[from] reqwest::Error),

    #[error("voice server query failed: {0}")]
    Query(#[from] Ts3Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Decode
    #[error("could not decode json: {0}")]
    Decode(#[from] serde_path_to_error::Error<serde_json::Error>),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    // Protocol status
    #[error("status is not expected: {expected}; got: {got}")]
    UnexpectedStatus { expected: u16, got: u16 },

    #[error("login rejected, status {0}")]
    LoginRejected(u16),

    #[error("settings update rejected, status {0}")]
    SettingsRejected(u16),

    #[error("spawn rejected, status {0}")]
    SpawnRejected(u16),

    // Logical
    #[error("control plane not running or not queryable: {0}")]
    NotRunning(Box<Error>),

    #[error("cannot reach voice server: {0}")]
    VoiceServerUnreachable(Box<Error>),

    #[error("no instance available")]
    NoInstance,

    #[error("bot not found: no connected client nickname contains {needle:?}")]
    BotNotFound { needle: String },

    // Run control
    #[error("verification cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Innermost error of the chain.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root_cause(),
            Error::NotRunning(inner) | Error::VoiceServerUnreachable(inner) => inner.root_cause(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Error::Cancelled)
    }
}

/// Attach the name of the failing operation to an error as it propagates.
pub trait Context<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T, Error>;
}

impl<T, E: Into<Error>> Context<T> for Result<T, E> {
    fn context<C: Into<String>>(self, context: C) -> Result<T, Error> {
        self.map_err(|e| Error::Context {
            context: context.into(),
            source: Box::new(e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_renders_operation_chain() {
        let inner: Result<(), Error> = Err(Error::SettingsRejected(403));
        let err = inner
            .context("could not change instance settings")
            .context("cannot connect bot to voice server")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot connect bot to voice server: could not change instance settings: settings update rejected, status 403"
        );
        assert!(matches!(err.root_cause(), Error::SettingsRejected(403)));
    }

    #[test]
    fn context_converts_foreign_errors() {
        let io: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"));
        let err = io.context("could not read password file").unwrap_err();
        assert_eq!(err.to_string(), "could not read password file: I/O error: no such file");
    }

    #[test]
    fn cancellation_is_detected_through_the_chain() {
        let err: Result<(), Error> = Err(Error::Cancelled);
        let err = err.context("presence check").unwrap_err();
        assert!(err.is_cancelled());
        assert!(!Error::NoInstance.is_cancelled());
    }
}
