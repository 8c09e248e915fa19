use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::JSend;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub service: String,
    pub status: String,
    pub store: String,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        service: state.config.server.service.clone(),
        status: "healthy".to_string(),
        store: format!("{:?}", state.config.store.backend).to_lowercase(),
    })
}
