//! HTTP surface exposing task resources.
//!
//! Mutations are thin wrappers over [`TaskServer`]; reads emit the wire
//! model that subscribers and the wait client consume.

use std::sync::Arc;

use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::TaskServer;

#[derive(Clone)]
pub struct AppState {
    pub server: Arc<TaskServer>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedDto {
    /// Resource path of the new task: `<owner>.tasks.<id>`.
    pub resource: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressDto {
    pub progress: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteDto {
    pub result: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailDto {
    pub error: String,
}

/// Create a new task and return its resource path.
pub async fn create_task(state: web::Data<AppState>) -> actix_web::Result<HttpResponse> {
    let resource = state
        .server
        .create_task()
        .await
        .map_err(ApiError::from)?;
    Ok(HttpResponse::Created().json(CreatedDto { resource }))
}

/// Resolve a resource path to its current wire model.
pub async fn get_task(
    state: web::Data<AppState>,
    resource: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let model = state
        .server
        .get_model(&resource)
        .await
        .map_err(ApiError::from)?;
    Ok(HttpResponse::Ok().json(model))
}

/// Update progress on a running task.
pub async fn set_progress(
    state: web::Data<AppState>,
    resource: web::Path<String>,
    body: web::Json<ProgressDto>,
) -> actix_web::Result<HttpResponse> {
    state
        .server
        .set_task_progress(&resource, body.progress)
        .await
        .map_err(ApiError::from)?;
    Ok(HttpResponse::NoContent().finish())
}

/// Mark a task completed with a result payload.
pub async fn complete_task(
    state: web::Data<AppState>,
    resource: web::Path<String>,
    body: web::Json<CompleteDto>,
) -> actix_web::Result<HttpResponse> {
    state
        .server
        .complete_task(&resource, body.into_inner().result)
        .await
        .map_err(ApiError::from)?;
    Ok(HttpResponse::NoContent().finish())
}

/// Mark a task failed with an error message.
pub async fn fail_task(
    state: web::Data<AppState>,
    resource: web::Path<String>,
    body: web::Json<FailDto>,
) -> actix_web::Result<HttpResponse> {
    state
        .server
        .fail_task(&resource, &body.error)
        .await
        .map_err(ApiError::from)?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

/// Route table, shared between the binary and the test harness.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/tasks", web::post().to(create_task))
        .route("/r/{resource}", web::get().to(get_task))
        .route("/r/{resource}/progress", web::patch().to(set_progress))
        .route("/r/{resource}/complete", web::post().to(complete_task))
        .route("/r/{resource}/fail", web::post().to(fail_task));
}
