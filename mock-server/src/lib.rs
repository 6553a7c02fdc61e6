//! HTTP fixture for exercising the request pipeline over real sockets.
//!
//! Routes:
//! - `/echo` (any method): reflects method, query, headers and raw body.
//! - `/search`: returns the decoded query parameters as a JSON object.
//! - `/items`, `/items/{id}`: small CRUD store that answers failures with
//!   `{"errorMessage", "description", "code"}` envelopes.
//! - `/status/{code}`: answers `code` with an envelope that has no message.
//! - `/garbage`: 200 with a non-JSON body.
//! - `/slow`: answers after `SLOW_DELAY`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::{HeaderMap, Method, StatusCode},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const SLOW_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub done: bool,
}

#[derive(Deserialize)]
pub struct CreateItem {
    pub name: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Deserialize)]
pub struct UpdateItem {
    pub name: Option<String>,
    pub done: Option<bool>,
}

/// Error body sent on every failure status.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub code: u16,
}

/// What `/echo` saw.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Echo {
    pub request_id: Uuid,
    pub method: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Item>>>;

type Failure = (StatusCode, Json<ErrorBody>);

fn failure(status: StatusCode, message: &str) -> Failure {
    (
        status,
        Json(ErrorBody {
            error_message: Some(message.to_string()),
            description: None,
            code: status.as_u16(),
        }),
    )
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/echo", any(echo))
        .route("/search", get(search))
        .route("/items", get(list_items).post(create_item))
        .route("/items/{id}", get(get_item).put(update_item).delete(delete_item))
        .route("/status/{code}", any(status))
        .route("/garbage", any(garbage))
        .route("/slow", any(slow))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, RawQuery(query): RawQuery, headers: HeaderMap, body: String) -> Json<Echo> {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect();
    Json(Echo {
        request_id: Uuid::new_v4(),
        method: method.to_string(),
        query,
        headers,
        body,
    })
}

async fn search(Query(params): Query<BTreeMap<String, String>>) -> Json<BTreeMap<String, String>> {
    Json(params)
}

async fn list_items(State(db): State<Db>) -> Json<Vec<Item>> {
    let items = db.read().await;
    Json(items.values().cloned().collect())
}

async fn create_item(State(db): State<Db>, body: String) -> Result<(StatusCode, Json<Item>), Failure> {
    let input: CreateItem = serde_json::from_str(&body)
        .map_err(|e| failure(StatusCode::UNPROCESSABLE_ENTITY, &format!("invalid item: {e}")))?;
    let item = Item {
        id: Uuid::new_v4(),
        name: input.name,
        done: input.done,
    };
    db.write().await.insert(item.id, item.clone());
    tracing::debug!(id = %item.id, "created item");
    Ok((StatusCode::CREATED, Json(item)))
}

async fn get_item(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<Item>, Failure> {
    let items = db.read().await;
    items
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "item not found"))
}

async fn update_item(State(db): State<Db>, Path(id): Path<Uuid>, body: String) -> Result<Json<Item>, Failure> {
    let input: UpdateItem = serde_json::from_str(&body)
        .map_err(|e| failure(StatusCode::UNPROCESSABLE_ENTITY, &format!("invalid update: {e}")))?;
    let mut items = db.write().await;
    let item = items
        .get_mut(&id)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "item not found"))?;
    if let Some(name) = input.name {
        item.name = name;
    }
    if let Some(done) = input.done {
        item.done = done;
    }
    Ok(Json(item.clone()))
}

async fn delete_item(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<StatusCode, Failure> {
    let mut items = db.write().await;
    items
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "item not found"))
}

async fn status(Path(code): Path<u16>) -> (StatusCode, Json<ErrorBody>) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorBody {
            error_message: None,
            description: Some(format!("forced status {code}")),
            code: status.as_u16(),
        }),
    )
}

async fn garbage() -> &'static str {
    "this is not json"
}

async fn slow() -> Json<serde_json::Value> {
    tokio::time::sleep(SLOW_DELAY).await;
    Json(serde_json::json!({}))
}
