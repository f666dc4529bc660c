//! HTTP surface: CRUD per collection plus the cabling endpoints.

use crate::core::links::CableLinkManager;
use crate::core::path::PathResolver;
use crate::core::records::RecordService;
use crate::core::schema::SchemaRegistry;
use crate::domain::model::{CableLink, Collection, Document, PeerKind, Port, Side, StopReason};
use crate::domain::ports::{EntityStore, Filter};
use crate::utils::error::{ErrorCategory, InventoryError};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct AppState<S: EntityStore> {
    pub records: RecordService<S>,
    pub links: CableLinkManager<S>,
    pub paths: PathResolver<S>,
}

impl<S: EntityStore> AppState<S> {
    pub fn new(store: Arc<S>, schemas: SchemaRegistry, link_attempts: u32) -> Self {
        Self {
            records: RecordService::new(Arc::clone(&store), schemas)
                .with_max_attempts(link_attempts),
            links: CableLinkManager::new(Arc::clone(&store)).with_max_attempts(link_attempts),
            paths: PathResolver::new(store),
        }
    }
}

type Shared<S> = State<Arc<AppState<S>>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRequest {
    pub starting_point_name: String,
    pub starting_side: Side,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_port: Option<Port>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_point_type: Option<PeerKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotResponse {
    #[serde(rename = "cablingPath")]
    pub cabling_path: Vec<String>,
    pub incomplete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<StopReason>,
}

/// Error body `{"message": ...}` with a status derived from the error category.
#[derive(Debug)]
pub struct ApiError(pub InventoryError);

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.category() {
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::Traversal => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::Remote => StatusCode::BAD_GATEWAY,
            ErrorCategory::Configuration | ErrorCategory::Storage => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!("❌ {}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }
        message(status, self.0.user_friendly_message())
    }
}

type ApiResult = Result<Response, ApiError>;

fn message(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(json!({ "message": text.into() }))).into_response()
}

pub fn router<S: EntityStore + 'static>(state: Arc<AppState<S>>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/connectCables", post(connect_cables::<S>))
        .route("/disconnectCables", post(disconnect_cables::<S>))
        .route("/cablingSnapshot", post(cabling_snapshot::<S>))
        .route("/addTest", post(add_test::<S>));

    for collection in Collection::ALL {
        app = app.merge(collection_routes::<S>(collection));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

fn collection_routes<S: EntityStore + 'static>(collection: Collection) -> Router<Arc<AppState<S>>> {
    let base = format!("/{}", collection.as_str());
    let item = format!("/{}/:key", collection.as_str());

    Router::new()
        .route(
            &base,
            get(
                move |State(state): Shared<S>, Query(params): Query<HashMap<String, String>>| async move {
                    list_records(state, collection, params).await
                },
            )
            .post(
                move |State(state): Shared<S>, Json(document): Json<Document>| async move {
                    create_record(state, collection, document).await
                },
            ),
        )
        .route(
            &item,
            get(move |State(state): Shared<S>, Path(key): Path<String>| async move {
                get_record(state, collection, key).await
            })
            .put(
                move |State(state): Shared<S>, Path(key): Path<String>, Json(patch): Json<Document>| async move {
                    update_record(state, collection, key, patch).await
                },
            )
            .delete(move |State(state): Shared<S>, Path(key): Path<String>| async move {
                delete_record(state, collection, key).await
            }),
        )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /{collection}?field=value
async fn list_records<S: EntityStore>(
    state: Arc<AppState<S>>,
    collection: Collection,
    params: HashMap<String, String>,
) -> ApiResult {
    let filter: Filter = params
        .into_iter()
        .map(|(field, value)| (field, Value::String(value)))
        .collect();
    let documents = state.records.list(collection, &filter).await?;
    Ok(Json(documents).into_response())
}

/// GET /{collection}/{key}
async fn get_record<S: EntityStore>(
    state: Arc<AppState<S>>,
    collection: Collection,
    key: String,
) -> ApiResult {
    let document = state.records.get(collection, &key).await?;
    Ok(Json(document).into_response())
}

/// POST /{collection}
async fn create_record<S: EntityStore>(
    state: Arc<AppState<S>>,
    collection: Collection,
    document: Document,
) -> ApiResult {
    state.records.create(collection, document).await?;
    Ok(message(
        StatusCode::CREATED,
        format!("{} inserted", collection.noun()),
    ))
}

/// PUT /{collection}/{key}
async fn update_record<S: EntityStore>(
    state: Arc<AppState<S>>,
    collection: Collection,
    key: String,
    patch: Document,
) -> ApiResult {
    state.records.update(collection, &key, patch).await?;
    Ok(message(StatusCode::OK, format!("{} updated", collection.noun())))
}

/// DELETE /{collection}/{key}
async fn delete_record<S: EntityStore>(
    state: Arc<AppState<S>>,
    collection: Collection,
    key: String,
) -> ApiResult {
    state.records.delete(collection, &key).await?;
    Ok(message(StatusCode::OK, format!("{} deleted", collection.noun())))
}

/// POST /addTest
async fn add_test<S: EntityStore>(
    State(state): Shared<S>,
    Json(document): Json<Document>,
) -> ApiResult {
    state.records.add_test(document).await?;
    Ok(message(StatusCode::CREATED, "Entry inserted"))
}

/// POST /connectCables
async fn connect_cables<S: EntityStore>(
    State(state): Shared<S>,
    Json(link): Json<CableLink>,
) -> ApiResult {
    state.links.connect(&link).await?;
    Ok(message(StatusCode::OK, "Cables connected"))
}

/// POST /disconnectCables
async fn disconnect_cables<S: EntityStore>(
    State(state): Shared<S>,
    Json(link): Json<CableLink>,
) -> ApiResult {
    state.links.disconnect(&link).await?;
    Ok(message(StatusCode::OK, "Cable disconnected"))
}

/// POST /cablingSnapshot
async fn cabling_snapshot<S: EntityStore>(
    State(state): Shared<S>,
    Json(request): Json<SnapshotRequest>,
) -> ApiResult {
    let result = state
        .paths
        .resolve(
            &request.starting_point_name,
            request.starting_side,
            request.starting_port,
            request.starting_point_type,
        )
        .await?;

    let response = SnapshotResponse {
        incomplete: !result.is_complete(),
        cabling_path: result.path,
        reason: result.stop,
    };
    Ok(Json(response).into_response())
}
