//! API handlers for the sigplace server
//!
//! Provides REST endpoints for:
//! - Coordinate conversion and clamping
//! - Signature embedding

use std::time::Duration;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use shared_types::{CanvasPosition, PdfPosition, SignatureSize};
use sigplace_core::{canvas_to_pdf, clamp_position, pdf_to_canvas};
use tracing::{debug, info};

use crate::error::ServerError;
use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "sigplace-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Converted or clamped position
#[derive(Serialize)]
pub struct PositionResponse<T> {
    pub success: bool,
    pub position: T,
}

impl<T> PositionResponse<T> {
    fn ok(position: T) -> Json<Self> {
        Json(Self {
            success: true,
            position,
        })
    }
}

/// Canvas -> PDF request body
#[derive(Deserialize)]
pub struct ToPdfRequest {
    /// Top-left corner of the signature on the canvas
    pub position: CanvasPosition,
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub scale: f64,
    #[serde(default)]
    pub signature_size: SignatureSize,
    /// 1-based page to attach to the result
    pub page: Option<u32>,
}

/// Handler: POST /api/coords/to-pdf
pub async fn handle_to_pdf(
    Json(req): Json<ToPdfRequest>,
) -> Result<Json<PositionResponse<PdfPosition>>, ServerError> {
    debug!(
        "to-pdf: ({}, {}) on {}x{} @{}",
        req.position.x, req.position.y, req.canvas_width, req.canvas_height, req.scale
    );

    let mut position = canvas_to_pdf(
        req.position,
        req.canvas_width,
        req.canvas_height,
        req.scale,
        req.signature_size,
    )?;
    position.page = req.page;

    Ok(PositionResponse::ok(position))
}

/// PDF -> canvas request body
#[derive(Deserialize)]
pub struct ToCanvasRequest {
    pub position: PdfPosition,
    pub canvas_height: f64,
    pub scale: f64,
}

/// Handler: POST /api/coords/to-canvas
pub async fn handle_to_canvas(
    Json(req): Json<ToCanvasRequest>,
) -> Result<Json<PositionResponse<CanvasPosition>>, ServerError> {
    let position = pdf_to_canvas(&req.position, req.canvas_height, req.scale)?;
    Ok(PositionResponse::ok(position))
}

/// Clamp request body
#[derive(Deserialize)]
pub struct ClampRequest {
    pub position: CanvasPosition,
    pub container_width: f64,
    pub container_height: f64,
    pub item_width: f64,
    pub item_height: f64,
}

/// Handler: POST /api/coords/clamp
pub async fn handle_clamp(Json(req): Json<ClampRequest>) -> Json<PositionResponse<CanvasPosition>> {
    PositionResponse::ok(clamp_position(
        req.position,
        req.container_width,
        req.container_height,
        req.item_width,
        req.item_height,
    ))
}

/// Sign request body
#[derive(Deserialize)]
pub struct SignRequest {
    /// Base64-encoded source PDF
    pub pdf_base64: String,
    /// `data:image/png;base64,...`
    pub signature_data_url: String,
    pub position: PdfPosition,
}

/// Handler: POST /api/sign
///
/// Responds with the signed PDF bytes.
pub async fn handle_sign(
    State(state): State<AppState>,
    Json(req): Json<SignRequest>,
) -> Result<Response, ServerError> {
    let pdf = BASE64
        .decode(req.pdf_base64.trim())
        .map_err(|e| ServerError::InvalidRequest(format!("pdf_base64: {}", e)))?;

    info!(
        "Sign request: {} bytes, page {}",
        pdf.len(),
        req.position.page_number()
    );

    let signed = embed_with_timeout(&state, pdf, req.signature_data_url, req.position).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"signed.pdf\"",
            ),
        ],
        signed,
    )
        .into_response())
}

/// Run the embedder on the blocking pool, bounded by the configured timeout
pub async fn embed_with_timeout(
    state: &AppState,
    pdf: Vec<u8>,
    data_url: String,
    position: PdfPosition,
) -> Result<Vec<u8>, ServerError> {
    let embedder = state.embedder.clone();
    let task = tokio::task::spawn_blocking(move || embedder.embed(&pdf, &data_url, &position));

    let joined = tokio::time::timeout(Duration::from_millis(state.timeout_ms), task)
        .await
        .map_err(|_| ServerError::Timeout(state.timeout_ms))?;
    let result =
        joined.map_err(|e| ServerError::Internal(format!("embedding task failed: {}", e)))?;

    Ok(result?)
}
