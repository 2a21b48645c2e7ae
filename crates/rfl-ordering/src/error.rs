use std::fmt;

use crate::Category;

/// Errors an [`crate::Appliance`] implementation may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Network failure, including timeouts and cancelled requests.
    Transport(String),
    /// The appliance answered with an error status.
    Api { code: Option<u16>, message: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// The transport itself is misconfigured (bad URL, unreadable CA, ...).
    Config(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Transport(msg) => write!(f, "transport error: {msg}"),
            TransportError::Api {
                code: Some(c),
                message,
            } => write!(f, "appliance api error code={c}: {message}"),
            TransportError::Api {
                code: None,
                message,
            } => write!(f, "appliance api error: {message}"),
            TransportError::Decode(msg) => write!(f, "decode error: {msg}"),
            TransportError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Remote operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Move,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::List => f.write_str("list"),
            Operation::Move => f.write_str("move"),
        }
    }
}

/// Errors returned by the ordering engine.
///
/// Drift is not represented here: an unsatisfied order is `Ok(false)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderingError {
    /// Transport prerequisites are missing or invalid.
    Configuration(String),
    /// List or Move could not be completed.
    Communication {
        operation: Operation,
        category: Category,
        source: TransportError,
    },
    /// A requested id is absent from the snapshot.
    NotFound { category: Category, id: String },
    /// Input outside the accepted domain (unknown category, duplicate ids, ...).
    Validation(String),
}

impl OrderingError {
    /// Classify a transport failure. Misconfiguration passes through as
    /// [`OrderingError::Configuration`]; everything else is a communication failure.
    pub fn from_transport(operation: Operation, category: Category, err: TransportError) -> Self {
        match err {
            TransportError::Config(msg) => OrderingError::Configuration(msg),
            other => OrderingError::Communication {
                operation,
                category,
                source: other,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OrderingError::NotFound { .. })
    }

    pub fn is_communication(&self) -> bool {
        matches!(self, OrderingError::Communication { .. })
    }
}

impl fmt::Display for OrderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            OrderingError::Communication {
                operation,
                category,
                source,
            } => write!(
                f,
                "communication error during {operation} of category '{category}': {source}"
            ),
            OrderingError::NotFound { category, id } => {
                write!(f, "unable to find rule of type '{category}' with id: '{id}'")
            }
            OrderingError::Validation(msg) => write!(f, "validation error: {msg}"),
        }
    }
}

impl std::error::Error for OrderingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OrderingError::Communication { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrderingError>;
