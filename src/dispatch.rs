//! Dispatch endpoint: thin HTTP adapter in front of the processor.
//!
//! Decodes an inbound request into `(type, value)`, invokes the processor
//! and maps the result to a response payload or an error code. No business
//! logic lives here.

use std::sync::Arc;

use actix_web::{HttpResponse, Responder, get, post, web};
use serde::{Deserialize, Serialize};

use crate::processor::TaskProcessor;

/// Shared application state for the consumer endpoints.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<TaskProcessor>,
}

/// Inbound task descriptor.
///
/// Both fields are accepted as-is: any `i32` is a valid type, and a negative
/// value is treated as zero-cost work by the processor.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskRequest {
    #[serde(rename = "type")]
    pub kind: i32,
    pub value: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResponse {
    pub status: String,
}

/// Receives one task from the producer and blocks until it is processed and
/// persisted, or fails. The caller waits out the full limiter delay; there
/// is no "throttled, retry later" response.
#[post("/task")]
pub async fn send_task(
    state: web::Data<AppState>,
    form: web::Json<TaskRequest>,
) -> actix_web::Result<impl Responder> {
    log::debug!("dispatch call: type={} value={}", form.kind, form.value);
    state.processor.process(form.kind, form.value, None).await?;
    Ok(HttpResponse::Ok().json(TaskResponse {
        status: "Task saved successfully".to_string(),
    }))
}

/// Liveness probe.
#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}
