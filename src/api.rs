use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::chain::ChainCoordinator;
use crate::error::AppError;
use crate::events::PageParams;
use crate::search::SearchKey;

pub struct AppState {
    pub chain: Arc<ChainCoordinator>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/page", post(open_page))
        .route("/search/input", post(search_input))
        .route("/search/key", post(search_key))
        .route("/search/select", post(search_select))
        .route("/search/next", post(search_next))
        .route("/search/prev", post(search_prev))
        .route("/search/close", post(search_close))
        .route("/quote", get(get_quote))
        .route("/diagnosis", post(start_diagnosis).get(get_diagnosis))
        .route("/diagnosis/dismiss", post(dismiss_diagnosis))
        .route("/conversion", post(convert))
        .with_state(state)
}

pub async fn run_server(state: Arc<AppState>, bind: &str) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("🌐 API server listening on {}", bind);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Deserialize)]
struct InputBody {
    text: String,
}

#[derive(Deserialize)]
struct KeyBody {
    key: SearchKey,
}

#[derive(Deserialize)]
struct SelectBody {
    index: usize,
}

/// `{}` diagnoses the current target; `{"code": ..}` a specific code
#[derive(Deserialize)]
struct DiagnoseBody {
    #[serde(default)]
    code: Option<String>,
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn open_page(State(state): State<Arc<AppState>>, Json(params): Json<PageParams>) -> impl IntoResponse {
    Json(state.chain.open_page(params).await)
}

async fn search_input(State(state): State<Arc<AppState>>, Json(body): Json<InputBody>) -> impl IntoResponse {
    Json(state.chain.search_input(&body.text))
}

async fn search_key(State(state): State<Arc<AppState>>, Json(body): Json<KeyBody>) -> impl IntoResponse {
    Json(state.chain.search_key(body.key).await)
}

async fn search_select(State(state): State<Arc<AppState>>, Json(body): Json<SelectBody>) -> impl IntoResponse {
    Json(state.chain.search_pick(body.index).await)
}

async fn search_next(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.chain.search_next())
}

async fn search_prev(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.chain.search_prev())
}

async fn search_close(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.chain.search_close())
}

async fn get_quote(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.chain.quote())
}

/// Starts in the background; poll `GET /diagnosis` for progress.
async fn start_diagnosis(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DiagnoseBody>,
) -> impl IntoResponse {
    let run = match body.code {
        Some(code) => state.chain.select_and_diagnose(&code).await,
        None => state.chain.run_diagnosis().await,
    };

    let status = if run.is_some() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    (
        status,
        Json(json!({
            "started": run.is_some(),
            "diagnosis": state.chain.diagnosis(),
        })),
    )
}

async fn get_diagnosis(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.chain.diagnosis())
}

async fn dismiss_diagnosis(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let dismissed = state.chain.dismiss();
    Json(json!({
        "dismissed": dismissed,
        "diagnosis": state.chain.diagnosis(),
    }))
}

async fn convert(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.chain.convert().await {
        Ok(url) => (StatusCode::OK, Json(json!({"redirect_url": url}))).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"message": e.user_message()})),
        )
            .into_response(),
    }
}
