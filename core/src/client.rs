//! The environment handle every operation runs through.
//!
//! # Design
//! `InsightClient` owns the configuration, the transport, the schema cache
//! and the type registry. No global state: two clients pointed at different
//! schemas coexist. Registration needs `&mut self` and happens during
//! setup; everything afterwards works on `&self`, and the schema cache
//! swaps whole snapshots on reload.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::InsightConfig;
use crate::endpoint::{id_clause, name_clause, type_query, Endpoint};
use crate::entity::Entity;
use crate::error::{InsightError, InsightResult, RemoteError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::mapper::ObjectMapper;
use crate::registry::TypeRegistry;
use crate::schema::{self, SchemaCache};
use crate::types::{
    Attachment, CommentBody, ErrorResponse, HistoryItem, InsightObject, ObjectEntries, ObjectTypeSchema,
};

pub struct InsightClient {
    config: InsightConfig,
    transport: Arc<dyn Transport>,
    schema: SchemaCache,
    registry: TypeRegistry,
    authorization: String,
}

impl InsightClient {
    /// Client with an empty schema cache; call `reload_schema` before
    /// writing.
    pub fn new<T: Transport + 'static>(config: InsightConfig, transport: T) -> Self {
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: InsightConfig, transport: Arc<dyn Transport>) -> Self {
        let config = config.normalized();
        let credentials = format!("{}:{}", config.username, config.password);
        Self {
            authorization: format!("Basic {}", STANDARD.encode(credentials)),
            config,
            transport,
            schema: SchemaCache::new(),
            registry: TypeRegistry::new(),
        }
    }

    /// `new` followed by the initial schema load.
    pub fn connect<T: Transport + 'static>(config: InsightConfig, transport: T) -> InsightResult<Self> {
        let client = Self::new(config, transport);
        client.reload_schema()?;
        Ok(client)
    }

    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    pub fn register<T: Entity>(&mut self, object_type: &str) -> InsightResult<()> {
        self.registry.register::<T>(object_type)?;
        Ok(())
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn schema(&self) -> &SchemaCache {
        &self.schema
    }

    pub fn schemas(&self) -> Arc<Vec<ObjectTypeSchema>> {
        self.schema.snapshot()
    }

    /// Fetches the object types of the configured schema with their
    /// attributes. The cache is replaced only when every call succeeded.
    pub fn reload_schema(&self) -> InsightResult<()> {
        let schemas = schema::load(self, self.config.schema_id)?;
        info!(schema_id = self.config.schema_id, object_types = schemas.len(), "schema loaded");
        self.schema.replace(schemas);
        Ok(())
    }

    pub fn get_objects<T: Entity>(&self) -> InsightResult<Vec<T>> {
        self.list(None, None)
    }

    pub fn get_object<T: Entity>(&self, id: i64) -> InsightResult<Option<T>> {
        Ok(self.list(Some(&id_clause(id)), Some(1))?.into_iter().next())
    }

    pub fn get_object_by_name<T: Entity>(&self, name: &str) -> InsightResult<Option<T>> {
        Ok(self.list(Some(&name_clause(name)), Some(1))?.into_iter().next())
    }

    /// Objects of `T`'s type that also match `iql`.
    pub fn get_objects_by_iql<T: Entity>(&self, iql: &str) -> InsightResult<Vec<T>> {
        self.list(Some(iql), None)
    }

    /// Maps already fetched objects, resolving their references.
    pub fn map_objects<T: Entity>(&self, objects: &[InsightObject]) -> InsightResult<Vec<T>> {
        ObjectMapper::new(self).map(objects)
    }

    fn list<T: Entity>(&self, filter: Option<&str>, limit: Option<usize>) -> InsightResult<Vec<T>> {
        let Some(object_type) = self.registry.resolve::<T>() else {
            warn!(entity = std::any::type_name::<T>(), "entity type is not registered, returning no objects");
            return Ok(Vec::new());
        };
        let mut objects = self.fetch_objects(object_type, filter)?;
        if let Some(limit) = limit {
            objects.truncate(limit);
        }
        self.map_objects(&objects)
    }

    /// All pages of an IQL listing, concatenated in page order.
    pub fn fetch_objects(&self, object_type: &str, filter: Option<&str>) -> InsightResult<Vec<InsightObject>> {
        let iql = type_query(object_type, self.config.ignore_subtypes, filter);
        debug!(object_type, iql = %iql, "listing objects");
        let page =
            |number: u32| Endpoint::objects_by_iql(&iql, self.config.schema_id, self.config.page_size, Some(number));

        let first: ObjectEntries = self.fetch_json(&page(1))?;
        let mut objects = first.object_entries;
        for number in 2..=first.page_size {
            let next: ObjectEntries = self.fetch_json(&page(number))?;
            objects.extend(next.object_entries);
        }
        debug!(object_type, count = objects.len(), "listed objects");
        Ok(objects)
    }

    pub fn delete_object(&self, id: i64) -> InsightResult<()> {
        self.call(HttpMethod::Delete, &Endpoint::object(id), None)?;
        info!(id, "deleted object");
        Ok(())
    }

    pub fn create_comment(&self, object_id: i64, message: &str) -> InsightResult<()> {
        let body = CommentBody {
            object_id,
            comment: message.to_string(),
        };
        self.call(HttpMethod::Post, &Endpoint::create_comment(), Some(json_body(&body)?))?;
        Ok(())
    }

    pub fn get_history(&self, object_id: i64) -> InsightResult<Vec<HistoryItem>> {
        self.fetch_json(&Endpoint::object_history(object_id))
    }

    pub fn get_attachments(&self, object_id: i64) -> InsightResult<Vec<Attachment>> {
        self.fetch_json(&Endpoint::object_attachments(object_id))
    }

    /// Uploads one file as multipart/form-data and returns the object's
    /// attachments afterwards.
    pub fn upload_attachment(
        &self,
        object_id: i64,
        filename: &str,
        bytes: &[u8],
        comment: &str,
    ) -> InsightResult<Vec<Attachment>> {
        let boundary = format!("insight-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_body(&boundary, filename, &guess_mime_type(filename), bytes, comment);
        self.call(
            HttpMethod::Post,
            &Endpoint::object_attachments(object_id),
            Some((format!("multipart/form-data; boundary={boundary}"), body)),
        )?;
        info!(object_id, filename, size = bytes.len(), "uploaded attachment");
        self.get_attachments(object_id)
    }

    /// Raw bytes behind the attachment's absolute download URL.
    pub fn download_attachment(&self, attachment: &Attachment) -> InsightResult<Vec<u8>> {
        Ok(self.execute(HttpMethod::Get, attachment.url.clone(), Vec::new(), None)?.body)
    }

    /// Returns `false` without a request for attachments that were never
    /// stored.
    pub fn delete_attachment(&self, attachment: &Attachment) -> InsightResult<bool> {
        if attachment.id <= 0 {
            return Ok(false);
        }
        self.call(HttpMethod::Delete, &Endpoint::attachment(attachment.id), None)?;
        Ok(true)
    }

    pub(crate) fn fetch_json<R: DeserializeOwned>(&self, endpoint: &Endpoint) -> InsightResult<R> {
        let response = self.call(HttpMethod::Get, endpoint, None)?;
        parse_json(&response)
    }

    pub(crate) fn send_json<B: Serialize, R: DeserializeOwned>(
        &self,
        method: HttpMethod,
        endpoint: &Endpoint,
        body: &B,
    ) -> InsightResult<R> {
        let response = self.call(method, endpoint, Some(json_body(body)?))?;
        parse_json(&response)
    }

    fn call(
        &self,
        method: HttpMethod,
        endpoint: &Endpoint,
        body: Option<(String, Vec<u8>)>,
    ) -> InsightResult<HttpResponse> {
        self.execute(method, endpoint.url(&self.config.base_url), endpoint.query().to_vec(), body)
    }

    fn execute(
        &self,
        method: HttpMethod,
        url: String,
        query: Vec<(String, String)>,
        body: Option<(String, Vec<u8>)>,
    ) -> InsightResult<HttpResponse> {
        let mut headers = vec![("authorization".to_string(), self.authorization.clone())];
        let body = body.map(|(content_type, bytes)| {
            headers.push(("content-type".to_string(), content_type));
            bytes
        });
        let request = HttpRequest {
            method,
            url,
            query,
            headers,
            body,
        };
        debug!(method = method.as_str(), url = %request.url, "sending request");
        let response = self.transport.execute(&request)?;
        Ok(check_status(response)?)
    }
}

impl fmt::Debug for InsightClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsightClient")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Map non-success status codes to the appropriate `RemoteError` variant.
fn check_status(response: HttpResponse) -> Result<HttpResponse, RemoteError> {
    match response.status {
        200..=299 => Ok(response),
        status @ 400..=499 => Err(RemoteError::Client {
            status,
            message: client_error_message(&response),
        }),
        status => Err(RemoteError::Server {
            status,
            body: response.text(),
        }),
    }
}

fn client_error_message(response: &HttpResponse) -> String {
    match serde_json::from_slice::<ErrorResponse>(&response.body) {
        Ok(error) if !error.summary().is_empty() => error.summary(),
        _ => response.text(),
    }
}

fn parse_json<R: DeserializeOwned>(response: &HttpResponse) -> InsightResult<R> {
    serde_json::from_slice(&response.body).map_err(|e| InsightError::Deserialization(e.to_string()))
}

fn json_body<B: Serialize>(body: &B) -> InsightResult<(String, Vec<u8>)> {
    let bytes = serde_json::to_vec(body).map_err(|e| InsightError::Serialization(e.to_string()))?;
    Ok(("application/json".to_string(), bytes))
}

fn multipart_body(boundary: &str, filename: &str, mime_type: &str, bytes: &[u8], comment: &str) -> Vec<u8> {
    let filename = filename.replace('"', "%22");
    let mut body = Vec::with_capacity(bytes.len() + comment.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {mime_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(
        format!("\r\n--{boundary}\r\nContent-Disposition: form-data; name=\"encodedComment\"\r\n\r\n{comment}\r\n--{boundary}--\r\n")
            .as_bytes(),
    );
    body
}

/// Content type for an upload, from the file extension.
fn guess_mime_type(filename: &str) -> String {
    mime_guess::from_path(filename).first_or_octet_stream().essence_str().to_string()
}
