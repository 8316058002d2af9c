//! HTTP handlers for the relay API.

use super::types::*;
use super::AppState;
use crate::analysis::{AllergenReport, RecipeInput};
use crate::document::{extract, DocumentType};
use crate::error::RelayError;
use crate::labels::{render_labels, LabelFormat};
use crate::logger::{format_analysis, AnalysisRecord};
use axum::{
    extract::{rejection::JsonRejection, Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

const ROUTE_ANALYZE: &str = "/analyze";
const ROUTE_UPLOAD: &str = "/analyze/upload";

// ============================================================================
// Health
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        api_key_configured: state.analyzer.is_configured(),
    })
}

// ============================================================================
// Analysis
// ============================================================================

pub async fn analyze(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let input = payload
        .map_err(|rejection| body_error(rejection.status(), rejection.body_text()))
        .and_then(|Json(request)| {
            RecipeInput::from_request(request.content, request.is_image.unwrap_or(false))
        });

    run_analysis(&state, ROUTE_ANALYZE, input, started).await
}

pub async fn analyze_upload(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let started = Instant::now();
    let input = read_upload(multipart).await;

    run_analysis(&state, ROUTE_UPLOAD, input, started).await
}

/// Map an extractor rejection, keeping the body-limit status.
fn body_error(status: StatusCode, body_text: String) -> RelayError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        RelayError::BodyTooLarge
    } else {
        RelayError::InvalidBody(body_text)
    }
}

/// Pull the `file` part out of a multipart form and turn it into recipe input.
async fn read_upload(mut multipart: Multipart) -> Result<RecipeInput, RelayError> {
    let mut upload: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| body_error(e.status(), e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("unknown").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| body_error(e.status(), format!("Failed to read file: {}", e.body_text())))?;
        upload = Some((filename, content_type, data.to_vec()));
        break;
    }

    let (filename, content_type, data) =
        upload.ok_or(RelayError::MissingFile)?;

    let extension = filename.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    let doc_type = DocumentType::from_extension(extension)
        .or_else(|| content_type.as_deref().and_then(DocumentType::from_mime))
        .ok_or_else(|| RelayError::UnsupportedFile(extension.to_string()))?;

    let extracted = extract(&data, doc_type, &filename).map_err(RelayError::Extraction)?;
    tracing::debug!(
        filename = %filename,
        doc_type = extracted.doc_type.as_str(),
        words = extracted.word_count,
        "Extracted upload"
    );

    match extracted.input {
        RecipeInput::Text(text) if text.trim().is_empty() => Err(RelayError::MissingContent),
        input => Ok(input),
    }
}

/// Analyze, log a summary at the configured verbosity, and render the outcome.
async fn run_analysis(
    state: &AppState,
    route: &'static str,
    input: Result<RecipeInput, RelayError>,
    started: Instant,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("analysis", id = %request_id, route);
    let input_kind = input.as_ref().map(RecipeInput::kind).unwrap_or("invalid");

    let result = match input {
        Ok(input) => state.analyzer.analyze(&input).instrument(span.clone()).await,
        Err(e) => Err(e),
    };

    let record = AnalysisRecord {
        request_id,
        route,
        input_kind,
        model: state.analyzer.model().to_string(),
        status: match &result {
            Ok(_) => 200,
            Err(e) => e.status_code().as_u16(),
        },
        duration_ms: started.elapsed().as_millis() as u64,
        products: result.as_ref().ok().map(|a| a.report.products.len()),
        usage: result.as_ref().ok().and_then(|a| a.usage),
        error: result.as_ref().err().map(|e| e.to_string()),
    };
    let summary = format_analysis(&record, state.verbosity);

    match result {
        Ok(analysis) => {
            tracing::info!(parent: &span, "{}", summary);
            Json(analysis.report).into_response()
        }
        Err(e) => {
            let error_type = e.error_type();
            if e.status_code().is_server_error() {
                tracing::error!(parent: &span, error_type, "{}", summary);
            } else {
                tracing::warn!(parent: &span, error_type, "{}", summary);
            }
            e.into_response()
        }
    }
}

// ============================================================================
// Labels
// ============================================================================

pub async fn render_labels_handler(
    Query(query): Query<LabelsQuery>,
    payload: Result<Json<AllergenReport>, JsonRejection>,
) -> Result<Response, RelayError> {
    let Json(report) =
        payload.map_err(|rejection| body_error(rejection.status(), rejection.body_text()))?;

    let format_str = query.format.as_deref().unwrap_or("md");
    let format = LabelFormat::from_extension(format_str).ok_or_else(|| {
        RelayError::InvalidBody(format!(
            "Unsupported format: {}. Use pdf, docx, or md",
            format_str
        ))
    })?;

    let data = render_labels(&report, format).map_err(RelayError::Render)?;
    let disposition = format!("attachment; filename=\"allergenes.{}\"", format.extension());

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}
