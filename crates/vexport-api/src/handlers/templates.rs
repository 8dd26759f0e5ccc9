//! Parameter template handlers.

use axum::Json;
use serde::Serialize;

use vexport_models::{templates, Template};

#[derive(Serialize)]
pub struct TemplatesResponse {
    pub templates: Vec<Template>,
}

/// Built-in parameter presets, ready to send as `submit_job` parameters.
pub async fn list_templates() -> Json<TemplatesResponse> {
    Json(TemplatesResponse {
        templates: templates(),
    })
}
