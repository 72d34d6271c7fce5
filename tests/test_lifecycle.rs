#[macro_use]
mod common;
use common::*;

use actix_web::http::StatusCode;
use actix_web::test::{TestRequest, call_service, read_body_json};
use serde_json::{Value, json};
use task_tracker::handlers::CreatedDto;

async fn create_task<S>(app: &S) -> String
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let resp = call_service(app, TestRequest::post().uri("/tasks").to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: CreatedDto = read_body_json(resp).await;
    created.resource
}

async fn read_model<S>(app: &S, resource: &str) -> Value
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let resp = call_service(
        app,
        TestRequest::get().uri(&format!("/r/{resource}")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    read_body_json(resp).await
}

#[actix_web::test]
async fn test_created_task_reads_as_started() {
    let server = memory_server();
    let app = test_app!(server);

    let resource = create_task(&app).await;
    assert!(resource.starts_with(&format!("{OWNER}.tasks.")));

    let model = read_model(&app, &resource).await;
    assert_eq!(model, json!({"status": "started", "progress": 0}));
}

#[actix_web::test]
async fn test_progress_update_visible_and_notified() {
    let server = memory_server();
    let app = test_app!(server);

    let resource = create_task(&app).await;
    let mut events = server.subscribe();

    let resp = call_service(
        &app,
        TestRequest::patch()
            .uri(&format!("/r/{resource}/progress"))
            .set_json(json!({"progress": 50}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let model = read_model(&app, &resource).await;
    assert_eq!(model, json!({"status": "started", "progress": 50}));

    // The change notification carries only the field that moved.
    let change = events.try_recv().unwrap();
    assert_eq!(change.resource, resource);
    assert_eq!(serde_json::to_value(&change.fields).unwrap(), json!({"progress": 50}));
}

#[actix_web::test]
async fn test_completed_task_carries_result_envelope() {
    let server = memory_server();
    let app = test_app!(server);

    let resource = create_task(&app).await;
    let resp = call_service(
        &app,
        TestRequest::post()
            .uri(&format!("/r/{resource}/complete"))
            .set_json(json!({"result": true}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let model = read_model(&app, &resource).await;
    assert_eq!(
        model,
        json!({"status": "completed", "progress": 100, "result": {"data": true}})
    );
}

#[actix_web::test]
async fn test_failed_task_keeps_progress_and_carries_error() {
    let server = memory_server();
    let app = test_app!(server);

    let resource = create_task(&app).await;
    let resp = call_service(
        &app,
        TestRequest::post()
            .uri(&format!("/r/{resource}/fail"))
            .set_json(json!({"error": "Unknown error"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let model = read_model(&app, &resource).await;
    assert_eq!(
        model,
        json!({"status": "failed", "progress": 0, "error": "Unknown error"})
    );
}

#[actix_web::test]
async fn test_negative_progress_rejected_without_mutation() {
    let server = memory_server();
    let app = test_app!(server);

    let resource = create_task(&app).await;
    let resp = call_service(
        &app,
        TestRequest::patch()
            .uri(&format!("/r/{resource}/progress"))
            .set_json(json!({"progress": -1}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let model = read_model(&app, &resource).await;
    assert_eq!(model["progress"], json!(0));
}

#[actix_web::test]
async fn test_terminal_task_conflicts_on_further_updates() {
    let server = memory_server();
    let app = test_app!(server);

    let resource = create_task(&app).await;
    let resp = call_service(
        &app,
        TestRequest::post()
            .uri(&format!("/r/{resource}/complete"))
            .set_json(json!({"result": 1}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = call_service(
        &app,
        TestRequest::patch()
            .uri(&format!("/r/{resource}/progress"))
            .set_json(json!({"progress": 99}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn test_unknown_resource_is_404_json() {
    let server = memory_server();
    let app = test_app!(server);

    let resource = format!("{OWNER}.tasks.{}", uuid::Uuid::new_v4());
    let resp = call_service(
        &app,
        TestRequest::get().uri(&format!("/r/{resource}")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = read_body_json(resp).await;
    assert_eq!(body["status"], json!(404));
}
