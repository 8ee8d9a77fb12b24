//! A small stand-in for the Insight REST API, for tests and local runs.
//!
//! Serves one object schema (`SCHEMA_ID`) under `/rest/insight/1.0`,
//! requires basic auth on every route, and records each request it sees so
//! tests can assert on call patterns.

pub mod dto;
pub mod iql;
pub mod store;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use thiserror::Error;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

use crate::dto::{
    AttachmentDto, AttributeDto, CommentDto, CommentInput, EditItem, ErrorBody, HistoryDto, ObjectDto,
    ObjectEntriesDto, ObjectTypeDto,
};
pub use crate::store::{RecordedRequest, Store, StoreError, DEFAULT_PASSWORD, DEFAULT_USERNAME, SCHEMA_ID};

pub type Db = Arc<RwLock<Store>>;

pub const API_PREFIX: &str = "/rest/insight/1.0";

const DEFAULT_RESULTS_PER_PAGE: usize = 25;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Store(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        let mut body = ErrorBody::default();
        match &self {
            ApiError::Store(err) => match err.field_error() {
                Some((attribute, message)) => {
                    body.errors.insert(attribute.to_string(), message);
                }
                None => body.error_messages.push(err.to_string()),
            },
            other => body.error_messages.push(other.to_string()),
        }
        (status, Json(body)).into_response()
    }
}

/// Router over the seeded fixture store.
pub fn app() -> Router {
    app_with(Arc::new(RwLock::new(Store::seeded())))
}

/// Router over a caller-provided store, which stays inspectable.
pub fn app_with(db: Db) -> Router {
    let api = Router::new()
        .route("/objectschema/{id}/objecttypes/flat", get(object_types))
        .route("/objecttype/{id}/attributes", get(object_type_attributes))
        .route("/iql/objects", get(query_objects))
        .route("/object/create", post(create_object))
        .route("/object/{id}", get(get_object).put(update_object).delete(delete_object))
        .route("/object/history/{id}", get(object_history))
        .route("/comment/create", post(create_comment))
        .route(
            "/attachments/object/{id}",
            get(list_attachments)
                .post(upload_attachment)
                .layer(DefaultBodyLimit::disable()),
        )
        .route("/attachments/{id}", delete(delete_attachment))
        .route("/attachments/{id}/download", get(download_attachment));

    Router::new()
        .nest(API_PREFIX, api)
        .layer(middleware::from_fn_with_state(db.clone(), guard))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, Arc::new(RwLock::new(Store::seeded()))).await
}

pub async fn run_with(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(db)).await
}

/// Records the request, then rejects it unless it carries valid basic
/// credentials.
async fn guard(State(db): State<Db>, request: Request, next: Next) -> Response {
    let query = Query::<Vec<(String, String)>>::try_from_uri(request.uri())
        .map(|Query(query)| query)
        .unwrap_or_default();
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let authorized = {
        let mut store = db.write().await;
        store.record(RecordedRequest {
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            query,
        });
        store.authorizes(authorization.as_deref())
    };
    debug!(method = %request.method(), path = request.uri().path(), authorized, "request");
    if !authorized {
        return ApiError::Unauthorized.into_response();
    }
    next.run(request).await
}

async fn object_types(State(db): State<Db>, Path(schema_id): Path<i64>) -> Result<Json<Vec<ObjectTypeDto>>, ApiError> {
    Ok(Json(db.read().await.object_types(schema_id)?))
}

async fn object_type_attributes(
    State(db): State<Db>,
    Path(object_type_id): Path<i64>,
) -> Result<Json<Vec<AttributeDto>>, ApiError> {
    Ok(Json(db.read().await.attributes_of(object_type_id)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingParams {
    iql: String,
    object_schema_id: Option<i64>,
    result_per_page: Option<usize>,
    page: Option<usize>,
}

async fn query_objects(
    State(db): State<Db>,
    Query(params): Query<ListingParams>,
) -> Result<Json<ObjectEntriesDto>, ApiError> {
    if let Some(schema_id) = params.object_schema_id.filter(|id| *id != SCHEMA_ID) {
        return Err(StoreError::UnknownSchema(schema_id).into());
    }
    let entries = db.read().await.query(
        &params.iql,
        params.result_per_page.unwrap_or(DEFAULT_RESULTS_PER_PAGE),
        params.page.unwrap_or(1),
    )?;
    debug!(iql = %params.iql, total = entries.total_filter_count, pages = entries.page_size, "query");
    Ok(Json(entries))
}

async fn get_object(State(db): State<Db>, Path(id): Path<i64>) -> Result<Json<ObjectDto>, ApiError> {
    Ok(Json(db.read().await.object(id)?))
}

async fn create_object(
    State(db): State<Db>,
    Json(item): Json<EditItem>,
) -> Result<(StatusCode, Json<ObjectDto>), ApiError> {
    let created = db.write().await.create_object(&item)?;
    info!(id = created.id, key = %created.object_key, label = %created.label, "object created");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_object(
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(item): Json<EditItem>,
) -> Result<Json<ObjectDto>, ApiError> {
    let updated = db.write().await.update_object(id, &item)?;
    info!(id, label = %updated.label, "object updated");
    Ok(Json(updated))
}

async fn delete_object(State(db): State<Db>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    db.write().await.delete_object(id)?;
    info!(id, "object deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn object_history(State(db): State<Db>, Path(id): Path<i64>) -> Result<Json<Vec<HistoryDto>>, ApiError> {
    Ok(Json(db.read().await.history(id)?))
}

async fn create_comment(
    State(db): State<Db>,
    Json(input): Json<CommentInput>,
) -> Result<(StatusCode, Json<CommentDto>), ApiError> {
    let comment = db.write().await.add_comment(&input)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn list_attachments(
    State(db): State<Db>,
    Path(object_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Vec<AttachmentDto>>, ApiError> {
    Ok(Json(db.read().await.attachments(object_id, &base_url(&headers))?))
}

async fn upload_attachment(
    State(db): State<Db>,
    Path(object_id): Path<i64>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<AttachmentDto>, ApiError> {
    let mut file = None;
    let mut comment = String::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("attachment").to_string();
                let mime_type = field.content_type().unwrap_or("application/octet-stream").to_string();
                let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                file = Some((filename, mime_type, bytes.to_vec()));
            }
            Some("encodedComment") => {
                comment = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
            }
            _ => {}
        }
    }
    let (filename, mime_type, bytes) = file.ok_or_else(|| ApiError::BadRequest("missing file part".to_string()))?;

    let attachment =
        db.write()
            .await
            .add_attachment(object_id, &filename, &mime_type, bytes, &comment, &base_url(&headers))?;
    info!(object_id, id = attachment.id, filename = %attachment.filename, "attachment stored");
    Ok(Json(attachment))
}

async fn download_attachment(State(db): State<Db>, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let (mime_type, bytes) = db.read().await.attachment_content(id)?;
    Ok(([(header::CONTENT_TYPE, mime_type)], bytes).into_response())
}

async fn delete_attachment(State(db): State<Db>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    db.write().await.delete_attachment(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Absolute base for download links, taken from the request's `Host`.
fn base_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}
