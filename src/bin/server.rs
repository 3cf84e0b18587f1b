use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

use hazardmap::config::Settings;
use hazardmap::model::{CircleRole, DisasterTaxonomy};
use hazardmap::overlay::render;
use hazardmap::params::CircleUpdate;
use hazardmap::render::{RasterRenderer, png_data_url};
use hazardmap::session::SessionSnapshot;
use hazardmap::simulation::{HttpBackend, SimulationCoordinator};
use hazardmap::svg::SvgRenderer;
use hazardmap::{Error, MapView, SimulationOutcome, ValidationError, WizardSession};

#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<WizardSession>>,
    coordinator: Arc<SimulationCoordinator<HttpBackend>>,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl<E: Into<Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        let err = e.into();
        let status = match &err {
            Error::Validation(ValidationError::WrongStep { .. } | ValidationError::SimulationInFlight) => {
                StatusCode::CONFLICT
            }
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Network(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(error = %self.message, "request failed");
        }
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Deserialize)]
struct ChooseRequest {
    disaster: DisasterTaxonomy,
}

#[derive(Deserialize)]
struct BackRequest {
    steps: Option<usize>,
}

#[derive(Deserialize)]
struct ViewportQuery {
    width: Option<u32>,
    height: Option<u32>,
}

impl ViewportQuery {
    fn size(&self) -> (u32, u32) {
        (
            self.width.unwrap_or(1024).clamp(1, 4096),
            self.height.unwrap_or(768).clamp(1, 4096),
        )
    }
}

#[derive(Serialize)]
struct SimulateResponse {
    #[serde(flatten)]
    outcome: SimulationOutcome,
    session: SessionSnapshot,
}

#[derive(Serialize)]
struct LayersResponse {
    layers: Vec<LayerImage>,
    width: u32,
    height: u32,
}

#[derive(Serialize)]
struct LayerImage {
    name: String,
    data_url: String,
}

async fn get_wizard(State(app): State<AppState>) -> Json<SessionSnapshot> {
    Json(app.session.lock().await.snapshot())
}

async fn choose_handler(State(app): State<AppState>, Json(req): Json<ChooseRequest>) -> ApiResult<SessionSnapshot> {
    let mut session = app.session.lock().await;
    session.choose_disaster(req.disaster)?;
    Ok(Json(session.snapshot()))
}

async fn back_handler(State(app): State<AppState>, Json(req): Json<BackRequest>) -> Json<SessionSnapshot> {
    let mut session = app.session.lock().await;
    session.go_back(req.steps.unwrap_or(1));
    Json(session.snapshot())
}

async fn restart_handler(State(app): State<AppState>) -> Json<SessionSnapshot> {
    let mut session = app.session.lock().await;
    session.restart();
    Json(session.snapshot())
}

async fn update_circle(app: AppState, role: CircleRole, update: CircleUpdate) -> ApiResult<SessionSnapshot> {
    let mut session = app.session.lock().await;
    session.update_circle(role, update)?;
    Ok(Json(session.snapshot()))
}

async fn earthquake_handler(State(app): State<AppState>, Json(update): Json<CircleUpdate>) -> ApiResult<SessionSnapshot> {
    update_circle(app, CircleRole::Earthquake, update).await
}

async fn hurricane_start_handler(
    State(app): State<AppState>,
    Json(update): Json<CircleUpdate>,
) -> ApiResult<SessionSnapshot> {
    update_circle(app, CircleRole::HurricaneStart, update).await
}

async fn hurricane_end_handler(
    State(app): State<AppState>,
    Json(update): Json<CircleUpdate>,
) -> ApiResult<SessionSnapshot> {
    update_circle(app, CircleRole::HurricaneEnd, update).await
}

async fn map_view_handler(State(app): State<AppState>, Json(view): Json<MapView>) -> ApiResult<SessionSnapshot> {
    let mut session = app.session.lock().await;
    session.set_map_view(view)?;
    Ok(Json(session.snapshot()))
}

/// The session lock is released for the backend round-trip so the user can
/// still navigate; the token decides whether the result is applied. A client
/// that disconnects does not leave the session stuck in `Simulation`.
async fn simulate_handler(State(app): State<AppState>) -> ApiResult<SimulateResponse> {
    let outcome = app
        .coordinator
        .clone()
        .simulate_shared(app.session.clone())
        .await?;
    Ok(Json(SimulateResponse {
        outcome,
        session: app.session.lock().await.snapshot(),
    }))
}

async fn overlay_svg_handler(State(app): State<AppState>, Query(q): Query<ViewportQuery>) -> impl IntoResponse {
    let (w, h) = q.size();
    let session = app.session.lock().await;
    let svg = render(
        &session.overlay(),
        SvgRenderer::new(session.view().projection(w, h), w, h),
    );
    ([(header::CONTENT_TYPE, "image/svg+xml")], svg)
}

async fn layers_handler(State(app): State<AppState>, Query(q): Query<ViewportQuery>) -> ApiResult<LayersResponse> {
    let (w, h) = q.size();
    let (layers, projection) = {
        let session = app.session.lock().await;
        (session.overlay(), session.view().projection(w, h))
    };

    let data_url = tokio::task::spawn_blocking(move || {
        let rgba = render(
            &layers,
            RasterRenderer::new(projection, w as usize, h as usize),
        );
        png_data_url(&rgba, w as usize, h as usize)
    })
    .await
    .map_err(|e| ApiError::internal(format!("render task failed: {e}")))??;

    Ok(Json(LayersResponse {
        layers: vec![LayerImage {
            name: "overlay".into(),
            data_url,
        }],
        width: w,
        height: h,
    }))
}

#[tokio::main]
async fn main() {
    hazardmap::init_tracing();

    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    let backend = match HttpBackend::from_settings(&settings) {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "cannot build backend client");
            std::process::exit(1);
        }
    };

    let app_state = AppState {
        session: Arc::new(Mutex::new(WizardSession::new(settings.defaults.clone()))),
        coordinator: Arc::new(SimulationCoordinator::new(backend, &settings.api)),
    };

    let frontend = ServeDir::new(&settings.server.frontend_dir);

    let app = Router::new()
        .route("/api/wizard", get(get_wizard))
        .route("/api/wizard/choose", post(choose_handler))
        .route("/api/wizard/back", post(back_handler))
        .route("/api/wizard/restart", post(restart_handler))
        .route("/api/wizard/earthquake", post(earthquake_handler))
        .route("/api/wizard/hurricane/start", post(hurricane_start_handler))
        .route("/api/wizard/hurricane/end", post(hurricane_end_handler))
        .route("/api/wizard/map-view", post(map_view_handler))
        .route("/api/wizard/simulate", post(simulate_handler))
        .route("/api/wizard/overlay.svg", get(overlay_svg_handler))
        .route("/api/wizard/layers", get(layers_handler))
        .with_state(app_state)
        .fallback_service(frontend)
        .layer(CorsLayer::permissive());

    let addr = settings.server.addr;
    info!("hazardmap server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind server address");
    axum::serve(listener, app).await.expect("server error");
}
