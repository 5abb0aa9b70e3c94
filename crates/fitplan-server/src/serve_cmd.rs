use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use fitplan_core::media::{self, ImageGenerator, ImageSearch};
use fitplan_core::plan::{self, PlanInput, Violation, parse_plan};
use fitplan_core::quotes;
use fitplan_core::store::{
    AnonymousIdentity, IdentityProvider, PlanLibrary, PlanMetadata, PlanStore, SavedPlan,
    StaticIdentity, StoreError,
};
use fitplan_core::{GenerationError, PlanOrchestrator};

/// Request header naming the user whose saved plans are addressed.
pub const USER_HEADER: &str = "x-user-id";

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// `None` when no API key is configured.
    pub orchestrator: Option<Arc<PlanOrchestrator>>,
    pub images: Arc<ImageGenerator>,
    pub search: Arc<ImageSearch>,
    pub store: Arc<dyn PlanStore>,
    pub app_id: String,
}

impl AppState {
    fn library(&self, headers: &HeaderMap) -> Result<PlanLibrary, AppError> {
        let identity: Arc<dyn IdentityProvider> = match headers.get(USER_HEADER) {
            Some(value) => {
                let user = value
                    .to_str()
                    .map_err(|_| AppError::bad_request("x-user-id header is not valid text"))?;
                Arc::new(
                    StaticIdentity::new(user).map_err(|e| AppError::bad_request(e.to_string()))?,
                )
            }
            None => Arc::new(AnonymousIdentity),
        };
        Ok(PlanLibrary::new(
            Arc::clone(&self.store),
            identity,
            self.app_id.clone(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    body: Value,
}

impl AppError {
    fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, json!({ "error": msg.into() }))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, json!({ "error": msg.into() }))
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg.into() }))
    }

    /// The request body failed validation.
    pub fn invalid_body(details: &[Violation]) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "error": "Invalid request body", "details": details }),
        )
    }

    fn bad_gateway(msg: &str, details: Option<&[Violation]>) -> Self {
        let mut body = json!({ "success": false, "error": msg });
        if let Some(details) = details {
            body["details"] = json!(details);
        }
        Self::new(StatusCode::BAD_GATEWAY, body)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match &err {
            GenerationError::NotConfigured => {
                error!(error = %err, "plan generation unavailable");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "message": "Failed to generate plan." }),
                )
            }
            GenerationError::EmptyResponse => {
                Self::bad_gateway("Empty response from AI service", None)
            }
            GenerationError::MalformedJson { .. } => {
                Self::bad_gateway("AI returned invalid JSON", None)
            }
            GenerationError::SchemaViolation(violations) => Self::bad_gateway(
                "AI returned JSON that does not match the expected schema",
                Some(violations.as_slice()),
            ),
            GenerationError::Upstream(e) => {
                warn!(error = %e, "AI service call failed");
                Self::bad_gateway("No response from AI service", None)
            }
            GenerationError::Timeout(_) => Self::bad_gateway("AI service timed out", None),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::not_found(format!("saved plan {id} not found")),
            StoreError::Invalid(violations) => Self::new(
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": "Invalid plan", "details": violations }),
            ),
            StoreError::Identity(e) => {
                Self::new(StatusCode::UNAUTHORIZED, json!({ "error": e.to_string() }))
            }
            StoreError::Unavailable(msg) => {
                error!(error = %msg, "plan store unavailable");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({ "error": "Saved plans are temporarily unavailable." }),
                )
            }
            e @ (StoreError::Corrupt { .. } | StoreError::Encode(_)) => {
                error!(error = %e, "saved plan could not be read");
                Self::internal(e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/generate-plan", post(generate_plan))
        .route("/daily-quote", get(daily_quote))
        .route("/generate-image", post(generate_image))
        .route("/image", get(image_search))
        .route("/plans", get(list_plans).post(save_plan))
        .route("/plans/events", get(plan_events))
        .route("/plans/{id}", get(get_plan).delete(delete_plan))
        .route("/plans/{id}/export", get(export_plan))
        .route("/plans/{id}/narration", get(plan_narration))
        .route("/plans/{id}/markdown", get(plan_markdown))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("fitplan serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("fitplan serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl+C; shutting down");
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn parse_body(body: &Bytes) -> Result<Value, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::invalid_body(&[Violation::new("/", e.to_string())]))
}

async fn generate_plan(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let input = PlanInput::from_json(&parse_body(&body)?)
        .map_err(|e| AppError::invalid_body(&e.violations))?;

    let orchestrator = state
        .orchestrator
        .as_ref()
        .ok_or(GenerationError::NotConfigured)?;
    let plan = orchestrator.generate(&input).await?;

    Ok(Json(json!({ "success": true, "plan": plan })))
}

async fn daily_quote() -> Json<Value> {
    Json(json!({ "quote": quotes::daily_quote() }))
}

/// Text of a JSON value used as a prompt or model name. `None` for the
/// falsy values: absent, `null`, `false`, `0` and `""`.
fn truthy_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Only a falsy `prompt` is a client error; every other failure, an
/// unreadable body included, still answers 200 with a placeholder.
async fn generate_image(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let body = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Null) | Err(_) => {
            warn!("unreadable generate-image body, returning error placeholder");
            return Ok(Json(json!({ "imageUrl": media::error_placeholder() })));
        }
        Ok(body) => body,
    };
    let prompt = truthy_text(body.get("prompt"))
        .ok_or_else(|| AppError::bad_request("Prompt is required."))?;
    let model = body
        .get("model")
        .map(|m| m.as_str().map_or_else(|| m.to_string(), str::to_string));

    let url = state.images.generate(&prompt, model.as_deref()).await;
    Ok(Json(json!({ "imageUrl": url })))
}

#[derive(Debug, Deserialize)]
struct ImageQuery {
    q: Option<String>,
}

async fn image_search(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> Result<Json<Value>, AppError> {
    let q = query
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Query parameter \"q\" is required"))?;

    let url = state.search.lookup(&q).await.map_err(|e| {
        error!(error = %e, query = %q, "image lookup failed");
        AppError::internal("Failed to fetch image")
    })?;
    Ok(Json(json!({ "imageUrl": url })))
}

async fn list_plans(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SavedPlan>>, AppError> {
    Ok(Json(state.library(&headers)?.list().await?))
}

#[derive(Debug, Deserialize)]
struct SavePlanRequest {
    plan: Value,
    metadata: PlanMetadata,
}

async fn save_plan(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let request: SavePlanRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::invalid_body(&[Violation::new("/", e.to_string())]))?;
    let plan = parse_plan(&request.plan).map_err(StoreError::Invalid)?;

    let id = state.library(&headers)?.save(&plan, &request.metadata).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn get_plan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<SavedPlan>, AppError> {
    Ok(Json(state.library(&headers)?.get(id).await?))
}

async fn delete_plan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.library(&headers)?.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export_plan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let saved = state.library(&headers)?.get(id).await?;
    let text = plan::export_json(&saved.plan).map_err(|e| AppError::internal(e.to_string()))?;
    let disposition = format!("attachment; filename=\"{}\"", plan::EXPORT_FILE_NAME);
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        text,
    )
        .into_response())
}

async fn plan_narration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<plan::Narration>, AppError> {
    let saved = state.library(&headers)?.get(id).await?;
    Ok(Json(plan::narration(&saved.plan)))
}

async fn plan_markdown(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let saved = state.library(&headers)?.get(id).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        plan::render_markdown(&saved.plan),
    )
        .into_response())
}

/// Live list of saved plans as server-sent events, one `plans` event per
/// snapshot. The subscription lives as long as the response stream.
async fn plan_events(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let library = state.library(&headers)?;
    // A slow client only ever sees the newest snapshot.
    let (tx, mut rx) = watch::channel(Vec::<SavedPlan>::new());
    let subscription = library
        .subscribe(move |plans| {
            tx.send_replace(plans);
        })
        .await?;

    let stream = async_stream::stream! {
        let _subscription = subscription;
        while rx.changed().await.is_ok() {
            let plans = rx.borrow_and_update().clone();
            match Event::default().event("plans").json_data(&plans) {
                Ok(event) => yield Ok(event),
                Err(e) => warn!(error = %e, "failed to encode plans event"),
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
