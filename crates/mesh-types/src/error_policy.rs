//! Process-level error policy.
//!
//! Errors that have no caller to return to (notification handlers, transport
//! subscriptions) and errors caught at the protocol boundary are reported to
//! an [`ErrorHandler`]. Errors leaving a service can be rewritten by an
//! [`ErrorMapper`].

use std::fmt;
use std::sync::Arc;
use tracing::{error, warn};

use crate::errors::BrokerError;

/// Where an error was caught.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorOrigin {
    /// Request handler; the caller also receives the error.
    Request,
    /// Notification handler; nobody else will see the error.
    Notification,
    /// Transport subscription or delivery failure.
    Transport,
    /// Inbound message that could not be decoded; only that message is lost.
    Envelope,
}

impl ErrorOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Notification => "notification",
            Self::Transport => "transport",
            Self::Envelope => "envelope",
        }
    }
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type HandleFn = dyn Fn(&BrokerError, ErrorOrigin) + Send + Sync;

/// Injected at construction of every broker and protocol layer.
#[derive(Clone)]
pub struct ErrorHandler {
    inner: Arc<HandleFn>,
}

impl ErrorHandler {
    /// Default policy: request-origin errors are logged (the caller already
    /// gets them) and undecodable messages are dropped with a warning;
    /// anything else is unhandled and aborts the process.
    pub fn crash_on_unhandled() -> Self {
        Self::from_fn(|err, origin| match origin {
            ErrorOrigin::Request => {
                warn!(origin = %origin, error = %err, name = err.name(), "Request handler failed");
            }
            ErrorOrigin::Envelope => {
                warn!(origin = %origin, error = %err, name = err.name(), "Dropped undecodable message");
            }
            _ => {
                error!(origin = %origin, error = %err, name = err.name(), "Unhandled broker error, aborting");
                std::process::abort();
            }
        })
    }

    /// Log every error and keep running.
    pub fn log() -> Self {
        Self::from_fn(|err, origin| match origin {
            ErrorOrigin::Request => {
                warn!(origin = %origin, error = %err, name = err.name(), "Request handler failed");
            }
            ErrorOrigin::Envelope => {
                warn!(origin = %origin, error = %err, name = err.name(), "Dropped undecodable message");
            }
            _ => {
                error!(origin = %origin, error = %err, name = err.name(), "Unhandled broker error");
            }
        })
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&BrokerError, ErrorOrigin) + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    pub fn handle(&self, err: &BrokerError, origin: ErrorOrigin) {
        (self.inner)(err, origin)
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::crash_on_unhandled()
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler").finish_non_exhaustive()
    }
}

type MapFn = dyn Fn(BrokerError) -> Option<BrokerError> + Send + Sync;

/// Rewrites request handler errors before they are sent back to the caller.
///
/// Returning `None` replaces the error with a generic `RemoteMethodError`.
#[derive(Clone)]
pub struct ErrorMapper {
    inner: Arc<MapFn>,
}

impl ErrorMapper {
    pub fn identity() -> Self {
        Self::from_fn(Some)
    }

    /// Hide every error behind the generic `RemoteMethodError`.
    pub fn opaque() -> Self {
        Self::from_fn(|_| None)
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(BrokerError) -> Option<BrokerError> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    pub fn map(&self, err: BrokerError) -> BrokerError {
        (self.inner)(err).unwrap_or_else(BrokerError::remote_method)
    }
}

impl Default for ErrorMapper {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for ErrorMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorMapper").finish_non_exhaustive()
    }
}
