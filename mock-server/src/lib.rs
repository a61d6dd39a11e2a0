use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEMO_USER: &str = "a";
pub const DEMO_PASS: &str = "b";

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub expires_unit: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: AuthTokens,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceError {
    pub http_status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub success: bool,
    pub bytes: usize,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

#[derive(Clone)]
pub struct AppState {
    users: Arc<HashMap<String, String>>,
    files: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl Default for AppState {
    fn default() -> Self {
        let users = HashMap::from([(DEMO_USER.to_string(), DEMO_PASS.to_string())]);
        Self {
            users: Arc::new(users),
            files: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl AppState {
    /// Default users, with `files` already stored.
    pub fn with_files<I, N, B>(files: I) -> Self
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: Into<Bytes>,
    {
        let files = files.into_iter().map(|(n, b)| (n.into(), b.into())).collect();
        Self {
            files: Arc::new(RwLock::new(files)),
            ..Self::default()
        }
    }
}

pub fn app() -> Router {
    app_with_state(AppState::default())
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/access-token", get(access_token))
        .route("/files/{name}", get(download_file).post(upload_file))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_state(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

fn service_error(status: StatusCode, message: &str, description: &str) -> Response {
    let body = ServiceError {
        http_status: status.as_u16(),
        message: message.to_string(),
        description: Some(description.to_string()),
    };
    (status, Json(body)).into_response()
}

async fn login(State(state): State<AppState>, Json(input): Json<Credentials>) -> Response {
    match state.users.get(&input.user) {
        Some(pass) if *pass == input.pass => {
            tracing::info!(user = %input.user, "login accepted");
            let body = AuthResponse {
                success: true,
                message: AuthTokens {
                    access_token: Uuid::new_v4().to_string(),
                    refresh_token: Uuid::new_v4().to_string(),
                    expires_in: 3600,
                    expires_unit: "seconds".to_string(),
                },
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        _ => {
            tracing::info!(user = %input.user, "login rejected");
            service_error(StatusCode::UNAUTHORIZED, "bad creds", "Invalid credentials")
        }
    }
}

async fn access_token() -> Json<AccessTokenResponse> {
    Json(AccessTokenResponse {
        success: true,
        message: Uuid::new_v4().to_string(),
    })
}

async fn download_file(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let stored = state.files.read().await.get(&name).cloned();
    match stored {
        Some(contents) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            contents,
        )
            .into_response(),
        None => service_error(StatusCode::NOT_FOUND, "not found", "File not found"),
    }
}

async fn upload_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> (StatusCode, Json<UploadReceipt>) {
    let bytes = body.len();
    state.files.write().await.insert(name, body);
    (StatusCode::CREATED, Json(UploadReceipt { success: true, bytes }))
}
