use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::Field, Multipart, State},
    http::{header::CONTENT_TYPE, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeFile;
use tracing::{error, info};

use sheetgrep_engine::search;
use sheetgrep_io::{is_allowed_file, FsStore, StoreError, TableStore, ALLOWED_EXTENSION};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_logging();
    let config = Config::from_env();
    let store = FsStore::open(&config.data_dir)?;

    let state = AppState {
        store: Arc::new(store),
        index_page: config.static_dir.join("index.html"),
    };

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .map_err(|err| AppError::Config(format!("Invalid bind addr: {err}")))?;
    info!("sheetgrep listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route_service("/", ServeFile::new(&state.index_page))
        .route("/upload", post(upload))
        .route("/search", post(search_values))
        .route("/api/dropdowns", get(dropdowns))
        .with_state(state)
        .layer(cors)
}

#[derive(Clone)]
struct AppState {
    store: Arc<dyn TableStore>,
    index_page: PathBuf,
}

#[derive(Debug, Clone)]
struct Config {
    bind_addr: String,
    data_dir: PathBuf,
    static_dir: PathBuf,
}

impl Config {
    fn from_env() -> Self {
        Self {
            bind_addr: env_or("SHEETGREP_BIND", "0.0.0.0:5500"),
            data_dir: PathBuf::from(env_or("SHEETGREP_DATA_DIR", "data/uploads")),
            static_dir: PathBuf::from(env_or("SHEETGREP_STATIC_DIR", "server/static")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    search_value: Option<String>,
    #[serde(default)]
    bank_name: String,
    #[serde(default)]
    product_type: String,
}

#[derive(Debug, Serialize)]
struct DropdownsResponse {
    bank_names: Vec<String>,
    product_types: Vec<String>,
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut bank_name = String::new();
    let mut product_type = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(format!("Malformed multipart body: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::BadRequest(format!("Failed to read file part: {err}")))?;
                file = Some((filename, bytes));
            }
            "bank_name" => bank_name = text_field(field).await?,
            "product_type" => product_type = text_field(field).await?,
            _ => {}
        }
    }

    let Some((filename, bytes)) = file else {
        return Err(AppError::BadRequest("No file part".to_string()));
    };

    // Browsers may send a client-side path; only the final component names the file.
    let filename = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_string();
    if filename.is_empty() {
        return Err(AppError::BadRequest("No selected file".to_string()));
    }
    if !is_allowed_file(&filename) {
        return Err(AppError::BadRequest(format!(
            "Invalid file type, only .{ALLOWED_EXTENSION} files are allowed"
        )));
    }

    let dest = state
        .store
        .put(bank_name.trim(), product_type.trim(), &filename, &bytes)?;
    info!("stored upload at {}", dest.display());

    Ok(Json(serde_json::json!({
        "message": "File uploaded successfully",
        "filename": filename,
    })))
}

async fn text_field(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|err| AppError::BadRequest(format!("Malformed form field: {err}")))
}

async fn search_values(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request: SearchRequest = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("Invalid JSON payload".to_string()))?;

    let term = request.search_value.as_deref().unwrap_or("").trim().to_string();
    if term.is_empty() {
        return Err(AppError::BadRequest("search_value is a required field".to_string()));
    }
    let bank_name = request.bank_name.trim();
    let product_type = request.product_type.trim();

    let tables = state.store.scan(bank_name, product_type);
    let output = search(&tables, &term);
    info!(
        "search {term:?} (bank={bank_name:?}, product={product_type:?}): {} distinct rows from {} tables",
        output.total_distinct_count,
        tables.len()
    );

    Ok(Json(output))
}

async fn dropdowns(State(state): State<AppState>) -> Json<DropdownsResponse> {
    Json(DropdownsResponse {
        bank_names: state.store.bank_names(),
        product_types: state.store.product_types(),
    })
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

#[derive(Debug, Error)]
enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidName(name) => {
                AppError::BadRequest(format!("Invalid name segment: {name}"))
            }
            StoreError::Io(msg) => AppError::Storage(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Storage(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Io(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };
        error!("request error: {message}");
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}
