use std::fmt;
use thiserror::Error;
use tokio::time::Duration;

#[derive(Error, Debug)]
pub enum StdError {
    /// The desired state violates an invariant. Never retried.
    #[error("ValidationError: {0}")]
    Validation(String),

    /// The remote resource does not exist.
    #[error("NotFoundError: {0}")]
    NotFound(String),

    /// The request cannot proceed in the current remote state (downgrade,
    /// outstanding gates, version not upgradable).
    #[error("ConflictError: {0}")]
    Conflict(String),

    #[error("TransportError: {message}")]
    Transport { status: Option<u16>, message: String },

    #[error("SerializationError: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("Finalizer Error: {0}")]
    // NB: awkward type because finalizer::Error embeds the reconciler error (which is this)
    // so boxing this error to break cycles
    FinalizerError(#[source] Box<kube::runtime::finalizer::Error<Error>>),

    #[error("MetadataMissing: {0}")]
    MetadataMissing(String),

    #[error("MetricsError: {0}")]
    Metrics(#[source] prometheus::Error),
}

impl StdError {
    pub fn metric_label(&self) -> String {
        match self {
            StdError::Validation(_) => "validation",
            StdError::NotFound(_) => "not_found",
            StdError::Conflict(_) => "conflict",
            StdError::Transport { .. } => "transport",
            StdError::Serialization(_) => "serialization",
            StdError::KubeError(_) => "kube",
            StdError::FinalizerError(_) => "finalizer",
            StdError::MetadataMissing(_) => "metadata_missing",
            StdError::Metrics(_) => "metrics",
        }
        .to_string()
    }
}

#[derive(Error, Debug)]
pub struct ErrorWithRequeue {
    pub duration: Duration,
    pub error: StdError,
}

impl ErrorWithRequeue {
    pub fn new(error: StdError, duration: Duration) -> ErrorWithRequeue {
        ErrorWithRequeue { error, duration }
    }

    pub fn metric_label(&self) -> String {
        self.error.metric_label()
    }
}

impl fmt::Display for ErrorWithRequeue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    StdError(#[source] StdError),

    #[error("Error With Requeue: {0}")]
    ErrorWithRequeue(#[source] ErrorWithRequeue),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::StdError(StdError::Validation(msg.into()))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::StdError(StdError::NotFound(msg.into()))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::StdError(StdError::Conflict(msg.into()))
    }

    pub fn transport(status: Option<u16>, msg: impl Into<String>) -> Self {
        Error::StdError(StdError::Transport {
            status,
            message: msg.into(),
        })
    }

    pub fn kube(e: kube::Error) -> Self {
        Error::StdError(StdError::KubeError(e))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.inner(), StdError::NotFound(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self.inner(), StdError::Transport { .. })
    }

    /// Validation and conflict errors need a spec change before another attempt makes sense.
    pub fn is_terminal(&self) -> bool {
        matches!(self.inner(), StdError::Validation(_) | StdError::Conflict(_))
    }

    /// Prefixes the message of message-carrying variants, keeping the kind.
    pub fn context(self, prefix: impl fmt::Display) -> Self {
        let wrap = |m: String| format!("{prefix}: {m}");
        match self {
            Error::StdError(StdError::Validation(m)) => Error::validation(wrap(m)),
            Error::StdError(StdError::NotFound(m)) => Error::not_found(wrap(m)),
            Error::StdError(StdError::Conflict(m)) => Error::conflict(wrap(m)),
            Error::StdError(StdError::Transport { status, message }) => {
                Error::transport(status, wrap(message))
            }
            other => other,
        }
    }

    pub fn inner(&self) -> &StdError {
        match self {
            Error::StdError(e) => e,
            Error::ErrorWithRequeue(e) => &e.error,
        }
    }

    pub fn metric_label(&self) -> String {
        self.inner().metric_label()
    }
}

impl From<StdError> for Error {
    fn from(e: StdError) -> Self {
        Error::StdError(e)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
