//! Typed object mapping for the Insight asset-management REST service.
//!
//! # Overview
//! Callers declare entity types (`Entity`), bind each to a remote object
//! type on an `InsightClient`, and then list, fetch, create, update and
//! delete objects as typed values. References between objects are resolved
//! in batches and mapped recursively into nested entities.
//!
//! # Design
//! - Plain-data `HttpRequest`/`HttpResponse` values cross the `Transport`
//!   seam; `UreqTransport` is the blocking default. Tests script responses
//!   through their own transport.
//! - The schema (object types and attribute definitions) is loaded once per
//!   client and swapped atomically on reload.
//! - The mapping engine works on untyped `EntityRecord`s; typed structs
//!   convert through `Entity::from_record` / `Entity::to_record`.
//! - The library emits `tracing` events and never installs a subscriber.

pub mod client;
pub mod config;
pub mod edit;
pub mod endpoint;
pub mod entity;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod mapper;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::InsightClient;
pub use config::InsightConfig;
pub use entity::{
    Entity, EntityDescriptor, EntityRecord, EntityTarget, FieldDescriptor, FieldKind, FieldValue, Identity,
    ScalarType, SimpleEntity, UNSAVED_ID,
};
pub use error::{ConfigurationError, InsightError, InsightResult, MappingError, RemoteError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use lifecycle::EntityLifecycle;
pub use transport::UreqTransport;
pub use types::{Attachment, HistoryItem, InsightObject, ObjectTypeSchema};
