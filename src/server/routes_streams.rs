//! Stream management API.
//!
//! A stream is an ingest process on the control plane; the `{id}` in every
//! path is the stream's UUID, never a raw process id.

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use streamgate_common::{Error, StreamId};
use streamgate_restreamer::{
    build_ingest_config, build_ui_metadata, validate_display_name, validate_source_url, Command,
    IngestSpec, Process, ProcessState, UI_METADATA_KEY,
};

use super::error::AppError;
use super::request_id::RequestId;
use super::AppContext;

/// Pause between stop and start on restart.
const RESTART_PAUSE: Duration = Duration::from_secs(1);

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStreamRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rtsp_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamResponse {
    pub stream_id: String,
    pub name: String,
    pub hls_url: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDetail {
    pub stream_id: String,
    pub name: String,
    pub hls_url: String,
    pub status: String,
    pub runtime_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate_kbit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
}

impl StreamDetail {
    fn new(ctx: &AppContext, id: StreamId, process: &Process, state: Option<ProcessState>) -> Self {
        let mut detail = Self {
            stream_id: id.to_string(),
            name: process.display_name().to_string(),
            hls_url: ctx.restreamer.hls_url(&id),
            status: "unknown".to_string(),
            runtime_seconds: 0,
            fps: None,
            bitrate_kbit: None,
            memory_mb: None,
            cpu_usage: None,
        };
        if let Some(state) = state {
            detail.status = state.exec;
            detail.runtime_seconds = state.runtime_seconds;
            detail.fps = non_zero(state.progress.fps);
            detail.bitrate_kbit = non_zero(state.progress.bitrate_kbit);
            detail.memory_mb = non_zero(state.memory_bytes as f64 / BYTES_PER_MB);
            detail.cpu_usage = non_zero(state.cpu_usage);
        }
        detail
    }
}

fn non_zero(value: f64) -> Option<f64> {
    (value != 0.0).then_some(value)
}

/// `POST /api/streams`
pub async fn create_stream(
    State(ctx): State<AppContext>,
    request_id: RequestId,
    payload: Result<Json<CreateStreamRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StreamResponse>), AppError> {
    let Json(req) = payload.map_err(|e| {
        request_id.error(Error::validation(format!("invalid JSON: {}", e.body_text())))
    })?;
    create(&ctx, req)
        .await
        .map(|created| (StatusCode::CREATED, Json(created)))
        .map_err(|e| request_id.error(e))
}

async fn create(ctx: &AppContext, req: CreateStreamRequest) -> streamgate_common::Result<StreamResponse> {
    let name = validate_display_name(&req.name)?;
    validate_source_url(&req.rtsp_url)?;

    let spec = IngestSpec::new(req.rtsp_url, name.as_str(), ctx.restreamer.base_url());
    let process_id = spec.stream_id.ingest_process_id();

    if let Err(e) = ctx.restreamer.create_process(&build_ingest_config(&spec)).await {
        tracing::error!(process_id = %process_id, error = %e, "Create stream failed");
        return Err(e);
    }

    if let Err(e) = ctx
        .restreamer
        .set_metadata(&process_id, UI_METADATA_KEY, &build_ui_metadata(&spec))
        .await
    {
        tracing::error!(
            process_id = %process_id,
            error = %e,
            "Setting dashboard metadata failed, stream still functional"
        );
    }

    tracing::info!(stream_id = %spec.stream_id, name = %name, "Stream created");
    Ok(StreamResponse {
        stream_id: spec.stream_id.to_string(),
        name,
        hls_url: ctx.restreamer.hls_url(&spec.stream_id),
        status: "created".to_string(),
    })
}

/// `GET /api/streams`
pub async fn list_streams(
    State(ctx): State<AppContext>,
    request_id: RequestId,
) -> Result<Json<Vec<StreamDetail>>, AppError> {
    list(&ctx).await.map(Json).map_err(|e| request_id.error(e))
}

async fn list(ctx: &AppContext) -> streamgate_common::Result<Vec<StreamDetail>> {
    let ingests: Vec<(StreamId, Process)> = ctx
        .restreamer
        .list_processes()
        .await?
        .into_iter()
        .filter_map(|p| StreamId::from_process_id(&p.id).map(|id| (id, p)))
        .collect();

    // State is fetched for all streams at once; a failure only affects its row.
    let states = join_all(
        ingests
            .iter()
            .map(|(_, p)| ctx.restreamer.get_process_state(&p.id)),
    )
    .await;

    let streams = ingests
        .iter()
        .zip(states)
        .map(|((id, process), state)| {
            let state = match state {
                Ok(state) => Some(state),
                Err(e) => {
                    tracing::debug!(process_id = %process.id, error = %e, "State fetch failed");
                    None
                }
            };
            StreamDetail::new(ctx, *id, process, state)
        })
        .collect();
    Ok(streams)
}

/// `GET /api/streams/:id`
pub async fn get_stream(
    State(ctx): State<AppContext>,
    request_id: RequestId,
    Path(raw_id): Path<String>,
) -> Result<Json<StreamDetail>, AppError> {
    detail(&ctx, &raw_id)
        .await
        .map(Json)
        .map_err(|e| request_id.error(e))
}

async fn detail(ctx: &AppContext, raw_id: &str) -> streamgate_common::Result<StreamDetail> {
    let id: StreamId = raw_id.parse()?;
    let process_id = id.ingest_process_id();

    let (process, state) = tokio::try_join!(
        ctx.restreamer.get_process(&process_id),
        ctx.restreamer.get_process_state(&process_id),
    )?;
    Ok(StreamDetail::new(ctx, id, &process, Some(state)))
}

/// `DELETE /api/streams/:id`
pub async fn delete_stream(
    State(ctx): State<AppContext>,
    request_id: RequestId,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, AppError> {
    delete(&ctx, &raw_id)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|e| request_id.error(e))
}

async fn delete(ctx: &AppContext, raw_id: &str) -> streamgate_common::Result<()> {
    let id: StreamId = raw_id.parse()?;
    ctx.restreamer.delete_process(&id.ingest_process_id()).await?;

    if let Err(e) = ctx.restreamer.delete_process(&id.snapshot_process_id()).await {
        tracing::debug!(stream_id = %id, error = %e, "Snapshot process not deleted");
    }

    tracing::info!(stream_id = %id, "Stream deleted");
    Ok(())
}

/// `POST /api/streams/:id/restart`
pub async fn restart_stream(
    State(ctx): State<AppContext>,
    request_id: RequestId,
    Path(raw_id): Path<String>,
) -> Result<Json<StreamResponse>, AppError> {
    restart(&ctx, &raw_id)
        .await
        .map(Json)
        .map_err(|e| request_id.error(e))
}

async fn restart(ctx: &AppContext, raw_id: &str) -> streamgate_common::Result<StreamResponse> {
    let id: StreamId = raw_id.parse()?;
    let process_id = id.ingest_process_id();

    ctx.restreamer.command_process(&process_id, Command::Stop).await?;
    tokio::time::sleep(RESTART_PAUSE).await;
    if let Err(e) = ctx.restreamer.command_process(&process_id, Command::Start).await {
        tracing::error!(process_id = %process_id, error = %e, "Restart failed to start stream");
        return Err(e);
    }

    tracing::info!(stream_id = %id, "Stream restarting");
    Ok(StreamResponse {
        stream_id: id.to_string(),
        name: String::new(),
        hls_url: ctx.restreamer.hls_url(&id),
        status: "restarting".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_omits_zero_metrics() {
        let detail = StreamDetail {
            stream_id: "id".into(),
            name: "n".into(),
            hls_url: "u".into(),
            status: "unknown".into(),
            runtime_seconds: 0,
            fps: non_zero(0.0),
            bitrate_kbit: non_zero(1500.0),
            memory_mb: None,
            cpu_usage: None,
        };
        let value = serde_json::to_value(&detail).unwrap();
        assert!(value.get("fps").is_none());
        assert_eq!(value["bitrateKbit"], 1500.0);
        assert_eq!(value["runtimeSeconds"], 0);
        assert_eq!(value["streamId"], "id");
    }

    #[test]
    fn test_create_request_field_names() {
        let req: CreateStreamRequest =
            serde_json::from_str(r#"{"name":"Cam","rtspUrl":"rtsp://cam/live"}"#).unwrap();
        assert_eq!(req.rtsp_url, "rtsp://cam/live");
        let req: CreateStreamRequest = serde_json::from_str("{}").unwrap();
        assert!(req.name.is_empty());
    }
}
