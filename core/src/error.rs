//! Error types for the Insight object-mapping client.
//!
//! # Design
//! Failures are split by where they originate. `RemoteError` carries a
//! classified non-2xx response, `MappingError` a mismatch between a declared
//! entity and the data or schema it is bound to, and `ConfigurationError` a
//! setup problem such as an unregistered entity type. `InsightError` is the
//! umbrella every public operation returns.

use thiserror::Error;

pub type InsightResult<T> = Result<T, InsightError>;

/// Errors returned by `InsightClient` operations.
#[derive(Debug, Error)]
pub enum InsightError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// A response with a non-2xx status.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// 4xx. `message` is assembled from the service's error body when it
    /// parses, otherwise it is the raw body.
    #[error("client error (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    /// 5xx and any other status outside 2xx/4xx.
    #[error("server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },
}

impl RemoteError {
    pub fn status(&self) -> u16 {
        match self {
            RemoteError::Client { status, .. } | RemoteError::Server { status, .. } => *status,
        }
    }
}

/// The request never produced a status line (connection refused, DNS, I/O).
#[derive(Debug, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// Translation failures between remote objects and declared entities.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("{entity}: object [{object}] has no value for required field {field}")]
    MissingField {
        entity: String,
        object: String,
        field: String,
    },

    #[error("{entity}.{field}: cannot coerce {raw} to {expected}")]
    Coercion {
        entity: String,
        field: String,
        expected: String,
        raw: String,
    },

    /// The declared field shape has no mapping rule for the data found.
    #[error(
        "{entity}.{field}: unhandled mapping case (kind: {kind}, value: {raw}, reference expected: {reference_expected})"
    )]
    Unhandled {
        entity: String,
        field: String,
        kind: String,
        raw: String,
        reference_expected: bool,
    },

    #[error("{entity}: cyclic entity graph at field {field}")]
    CyclicGraph { entity: String, field: String },

    #[error("{entity}.{field}: referenced entity is not persisted (no object key)")]
    UnpersistedReference { entity: String, field: String },

    #[error("{entity}.{field}: {reason}")]
    Record {
        entity: String,
        field: String,
        reason: String,
    },
}

/// Setup problems, detected before any data is exchanged where possible.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("entity type {0} is not registered")]
    UnregisteredType(String),

    #[error("object type {0} is not part of the loaded schema")]
    UnknownObjectType(String),

    #[error("{entity}: field {field} is declared more than once")]
    DuplicateField { entity: String, field: String },

    #[error("{entity}: cyclic entity graph at field {field}")]
    CyclicGraph { entity: String, field: String },

    #[error("missing setting {0}")]
    MissingSetting(&'static str),

    #[error("invalid value for setting {name}: {value}")]
    InvalidSetting { name: &'static str, value: String },
}
