//! Error types for the AMI client

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type AmiResult<T> = Result<T, AmiError>;

/// Errors surfaced by the AMI client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AmiError {
    /// Invalid argument supplied by the caller (bad header key, CR/LF in a
    /// value, message without an `ActionID`).
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with the argument.
        message: String,
    },

    /// The client has not been started, or has already stopped.
    #[error("client is not running")]
    NotStarted,

    /// `start` was called a second time on the same client.
    #[error("client was already started")]
    AlreadyStarted,

    /// The server greeting was missing or did not identify an AMI server.
    #[error("handshake failed, unexpected greeting: {banner:?}")]
    Handshake {
        /// The offending first line, terminator stripped.
        banner: String,
    },

    /// A request with the same `ActionID` is already in flight.
    #[error("a request with ActionID {action_id:?} is already in flight")]
    DuplicateActionId {
        /// The rejected correlation id.
        action_id: String,
    },

    /// The inbound byte stream violated the AMI wire grammar.
    #[error("malformed message: {message}")]
    Malformed {
        /// Description of the framing violation.
        message: String,
    },

    /// Read or write fault on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request was abandoned by a voluntary stop (or clean server EOF)
    /// before a response arrived.
    #[error("request cancelled by client shutdown")]
    Cancelled,

    /// The client stopped on a fault while this request was pending.
    /// Carries the first fatal error as the cause.
    #[error("client stopped: {cause}")]
    Stopped {
        /// The stop cause, rendered as text (`std::io::Error` is not `Clone`).
        cause: String,
    },

    /// One or more events were dropped because the subscriber queue was full.
    /// Delivered through the event stream, never returned from client calls.
    #[error("event queue overflowed, one or more events were dropped")]
    QueueFull,

    /// A connection attempt exceeded its deadline.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout {
        /// The deadline that was exceeded.
        timeout_ms: u64,
    },

    /// The server rejected a `Login`/`Logoff` exchange.
    #[error("authentication failed: {reply}")]
    AuthFailed {
        /// The server's `Message` text, when present.
        reply: String,
    },
}

impl AmiError {
    /// Construct an [`AmiError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        AmiError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Construct an [`AmiError::Malformed`].
    pub fn malformed(message: impl Into<String>) -> Self {
        AmiError::Malformed {
            message: message.into(),
        }
    }

    /// Construct an [`AmiError::AuthFailed`].
    pub fn auth_failed(reply: impl Into<String>) -> Self {
        AmiError::AuthFailed {
            reply: reply.into(),
        }
    }
}

/// Why a client transitioned to `Stopped`.
///
/// Carried by the lifecycle status and replayed to pending callers and
/// subscribers. `std::io::Error` is not `Clone`, so I/O causes store the
/// rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StopCause {
    /// Clean EOF at a frame boundary. Treated as voluntary completion:
    /// pending callers are cancelled, subscribers complete normally.
    Eof,
    /// Read or write fault on the stream.
    Io(String),
    /// The inbound stream violated the wire grammar (including EOF
    /// mid-frame).
    Malformed(String),
    /// The server greeting was missing or invalid.
    Handshake(String),
}

impl StopCause {
    /// Whether this cause is delivered as a fault (`Failed`/`OnError`)
    /// rather than a voluntary completion.
    pub fn is_fault(&self) -> bool {
        !matches!(self, StopCause::Eof)
    }

    /// The error replayed to a pending caller or subscriber hit by this stop.
    pub(crate) fn to_error(&self) -> AmiError {
        match self {
            StopCause::Eof => AmiError::Cancelled,
            StopCause::Io(message) => AmiError::Stopped {
                cause: format!("I/O error: {message}"),
            },
            StopCause::Malformed(message) => AmiError::Malformed {
                message: message.clone(),
            },
            StopCause::Handshake(banner) => AmiError::Handshake {
                banner: banner.clone(),
            },
        }
    }
}

impl std::fmt::Display for StopCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopCause::Eof => write!(f, "connection closed"),
            StopCause::Io(message) => write!(f, "I/O error: {message}"),
            StopCause::Malformed(message) => write!(f, "malformed message: {message}"),
            StopCause::Handshake(banner) => write!(f, "invalid greeting: {banner:?}"),
        }
    }
}
