//! Test server for the appkit core's integration tests.
//!
//! Routes:
//! - `GET|POST /users`: in-memory user list
//! - `GET /profile`: a user nested under `data.user`
//! - `ANY /echo`: reflects method, query, headers and JSON body
//! - `GET /status/{code}`: responds with the given status
//! - `GET /files/{name}`: file body with a Content-Disposition name
//! - `POST /upload`: summarizes a multipart form
//! - `GET /slow/{ms}`: answers after a delay

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateUser {
    pub name: String,
}

/// What `/echo` saw.
#[derive(Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub query: BTreeMap<String, String>,
    /// Lower-cased header names.
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

/// One file part received by `/upload`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

/// Response of `/upload`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadSummary {
    pub fields: BTreeMap<String, String>,
    pub files: Vec<UploadedFile>,
    pub width: Option<String>,
    pub height: Option<String>,
}

pub type Db = Arc<RwLock<Vec<User>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Vec::new()));
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/profile", get(profile))
        .route("/echo", any(echo))
        .route("/status/{code}", get(status))
        .route("/files/{name}", get(file))
        .route("/upload", post(upload))
        .route("/slow/{ms}", get(slow))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_users(State(db): State<Db>) -> Json<Vec<User>> {
    Json(db.read().await.clone())
}

async fn create_user(State(db): State<Db>, Json(input): Json<CreateUser>) -> (StatusCode, Json<User>) {
    let user = User {
        id: Uuid::new_v4(),
        name: input.name,
    };
    db.write().await.push(user.clone());
    debug!(id = %user.id, "user created");
    (StatusCode::CREATED, Json(user))
}

async fn profile() -> Json<Value> {
    Json(json!({
        "code": 0,
        "data": {
            "user": {"id": 7, "name": "Ann"},
            "tags": ["admin", "beta"]
        }
    }))
}

async fn echo(
    method: Method,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_ascii_lowercase(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    let body = serde_json::from_str(&body).unwrap_or(Value::Null);
    Json(Echo {
        method: method.to_string(),
        query,
        headers,
        body,
    })
}

async fn status(Path(code): Path<u16>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, Json(json!({"status": status.as_u16()}))).into_response()
}

async fn file(Path(name): Path<String>) -> Response {
    let body = format!("contents of {name}");
    (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\"")),
        ],
        body,
    )
        .into_response()
}

async fn upload(headers: HeaderMap, mut multipart: Multipart) -> Result<Json<UploadSummary>, StatusCode> {
    let mut fields = BTreeMap::new();
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        if file_name.is_some() {
            let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            files.push(UploadedFile {
                field: name,
                file_name,
                content_type,
                size: data.len(),
            });
        } else {
            let text = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            fields.insert(name, text);
        }
    }
    let header_text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    Ok(Json(UploadSummary {
        fields,
        files,
        width: header_text("width"),
        height: header_text("height"),
    }))
}

async fn slow(Path(ms): Path<u64>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(json!({"waited_ms": ms}))
}
