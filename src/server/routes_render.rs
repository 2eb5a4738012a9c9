use crate::server::error::AppError;
use crate::server::AppContext;
use crate::state::RenderJob;
use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use renderforged_common::{Error, RenderId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use utoipa::ToSchema;

pub fn render_routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/render", post(submit_render))
        .route("/render/{id}", get(get_render).delete(delete_render))
        .route("/renders", get(list_renders))
        .route("/renders/{file}", get(download_artifact))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Render request body.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    /// Render parameters (text, captions, music, durations)
    #[serde(default)]
    #[schema(value_type = Object)]
    pub video_params: Option<Value>,
    /// Template id, path, URL, or `{id, url}` object
    #[serde(default)]
    #[schema(value_type = Object)]
    pub template: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderAccepted {
    pub success: bool,
    pub render_id: String,
    pub download_url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RenderResponse {
    pub success: bool,
    #[serde(flatten)]
    pub render: RenderJob,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RenderListResponse {
    pub success: bool,
    pub renders: Vec<RenderJob>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/render",
    tag = "renders",
    request_body = RenderRequest,
    responses(
        (status = 202, description = "Render accepted; poll for status", body = RenderAccepted),
        (status = 400, description = "Missing or malformed videoParams/template")
    )
)]
pub async fn submit_render(
    State(ctx): State<AppContext>,
    payload: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;

    let video_params = request
        .video_params
        .ok_or_else(|| Error::Validation("videoParams is required".into()))?;
    let template = request
        .template
        .ok_or_else(|| Error::Validation("template is required".into()))?;

    let job = ctx.renders.submit(video_params, template)?;
    let download_url = ctx.renders.download_url(&job.id);

    Ok((
        StatusCode::ACCEPTED,
        Json(RenderAccepted {
            success: true,
            render_id: job.id.to_string(),
            download_url,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/render/{id}",
    tag = "renders",
    params(("id" = String, Path, description = "Render ID")),
    responses(
        (status = 200, description = "Render job", body = RenderResponse),
        (status = 404, description = "Render not found")
    )
)]
pub async fn get_render(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<RenderResponse>, AppError> {
    let render = ctx.registry.get(&RenderId::from(id))?;
    Ok(Json(RenderResponse {
        success: true,
        render,
    }))
}

#[utoipa::path(
    get,
    path = "/renders",
    tag = "renders",
    responses(
        (status = 200, description = "All render jobs, newest first", body = RenderListResponse)
    )
)]
pub async fn list_renders(State(ctx): State<AppContext>) -> Json<RenderListResponse> {
    Json(RenderListResponse {
        success: true,
        renders: ctx.registry.list(),
    })
}

#[utoipa::path(
    delete,
    path = "/render/{id}",
    tag = "renders",
    params(("id" = String, Path, description = "Render ID")),
    responses(
        (status = 200, description = "Render and its artifact removed", body = DeleteResponse),
        (status = 404, description = "Render not found")
    )
)]
pub async fn delete_render(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let id = RenderId::from(id);
    ctx.registry.delete(&id).await?;
    tracing::info!(render_id = %id, "Render deleted");
    Ok(Json(DeleteResponse { success: true }))
}

/// Serve a finished artifact from the output directory.
#[utoipa::path(
    get,
    path = "/renders/{file}",
    tag = "renders",
    params(("file" = String, Path, description = "Artifact file name, `<renderId>.<ext>`")),
    responses(
        (status = 200, description = "Rendered video"),
        (status = 404, description = "Artifact not available")
    )
)]
pub async fn download_artifact(
    State(ctx): State<AppContext>,
    Path(file): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    if file.is_empty() || file.starts_with('.') || file.contains(['/', '\\']) {
        return Err(Error::not_found("artifact", file).into());
    }

    let path = ctx.config.render.output_dir.join(&file);
    let response = ServeFile::new(path)
        .oneshot(request)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

    Ok(response.into_response())
}
