//! Thin HTTP surface over the session API, plus static file serving.

use crate::adapters::fs::LocalStorage;
use crate::application::session::{Session, SessionRegistry};
use crate::domain::jobs::SessionState;
use crate::domain::media::VideoMetadata;
use crate::domain::plan::SegmentRange;
use crate::domain::timecode::format_hms;
use crate::error::JobError;
use crate::ports::probe::MediaProbe;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

type HandlerError = (StatusCode, String);

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub storage: Arc<LocalStorage>,
    pub probe: Arc<dyn MediaProbe>,
}

#[derive(Debug, Deserialize)]
struct SplitRequest {
    #[serde(default = "default_segment_count")]
    segment_count: usize,
}

fn default_segment_count() -> usize {
    5
}

#[derive(Debug, Serialize)]
struct CreatedSession {
    id: Uuid,
}

#[derive(Debug, Serialize)]
struct SplitPreview {
    segment_duration: String,
    ranges: Vec<SegmentRange>,
}

pub fn router(state: AppState) -> Router {
    let files = ServeDir::new(state.storage.root());

    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/video", post(upload_video).delete(clear_video))
        .route("/api/sessions/:id/plan", get(preview_split))
        .route("/api/sessions/:id/split", post(start_split))
        .route("/api/sessions/:id/archive", post(start_archive))
        .nest_service("/files", files)
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn reject(err: JobError) -> HandlerError {
    let status = match &err {
        JobError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        JobError::NoVideo | JobError::Busy | JobError::NothingToArchive => StatusCode::CONFLICT,
        JobError::Transcode(_) | JobError::Archive(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

async fn find(state: &AppState, id: Uuid) -> Result<Arc<Session>, HandlerError> {
    state
        .registry
        .get(id)
        .await
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("no session {}", id)))
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<CreatedSession>) {
    let session = state.registry.create().await;
    (StatusCode::CREATED, Json(CreatedSession { id: session.id() }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionState>, HandlerError> {
    Ok(Json(find(&state, id).await?.snapshot()))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    let session = find(&state, id).await?;
    if session.snapshot().is_busy() {
        return Err(reject(JobError::Busy));
    }
    state.registry.remove(id).await;
    Ok(StatusCode::NO_CONTENT)
}

// Stores the first file field, probes it and makes it the session's source.
async fn upload_video(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<VideoMetadata>, HandlerError> {
    let session = find(&state, id).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?
    {
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };

        let path = state
            .storage
            .store_upload(&file_name, field)
            .await
            .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

        let video = match state.probe.probe(&path, &file_name).await {
            Ok(video) => video,
            Err(err) => {
                tracing::error!("error processing video metadata for {:?}: {}", path, err);
                remove_upload(&path).await;
                return Err((
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Failed to process video metadata".to_string(),
                ));
            }
        };

        return match session.set_video(video.clone()).await {
            Ok(_) => Ok(Json(video)),
            Err(err) => {
                remove_upload(&path).await;
                Err(reject(err))
            }
        };
    }

    Err((StatusCode::BAD_REQUEST, "no file in upload".to_string()))
}

async fn remove_upload(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!("could not remove rejected upload {:?}: {}", path, e);
    }
}

async fn clear_video(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    find(&state, id).await?.clear_video().await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn preview_split(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(request): Query<SplitRequest>,
) -> Result<Json<SplitPreview>, HandlerError> {
    let ranges = find(&state, id)
        .await?
        .preview_split(request.segment_count)
        .map_err(reject)?;
    let segment_duration = format_hms(ranges.first().map(|r| r.duration()).unwrap_or(0.0));
    Ok(Json(SplitPreview {
        segment_duration,
        ranges,
    }))
}

async fn start_split(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SplitRequest>,
) -> Result<(StatusCode, Json<SessionState>), HandlerError> {
    let session = find(&state, id).await?;
    session
        .spawn_split(request.segment_count)
        .await
        .map_err(reject)?;
    Ok((StatusCode::ACCEPTED, Json(session.snapshot())))
}

async fn start_archive(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<SessionState>), HandlerError> {
    let session = find(&state, id).await?;
    session.spawn_archive().await.map_err(reject)?;
    Ok((StatusCode::ACCEPTED, Json(session.snapshot())))
}
