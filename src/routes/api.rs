use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::card::{read_card, read_snapshot, CardRecord, EmbeddedImage};
use crate::codes::select_symbology;
use crate::pdf::{self, PdfError};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("malformed form data: {0}")]
    Form(#[from] MultipartError),
    #[error("PDF export unavailable: no fonts installed")]
    FontsUnavailable,
    #[error(transparent)]
    Pdf(#[from] PdfError),
    #[error("export task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for ExportError {
    fn into_response(self) -> Response {
        let status = match &self {
            ExportError::Form(e) => e.status(),
            ExportError::FontsUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ExportError::Pdf(_) | ExportError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "export failed");
        } else {
            tracing::warn!(error = %self, "rejected export request");
        }
        (status, self.to_string()).into_response()
    }
}

fn pdf_attachment(file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// Vector export of the posted card.
pub async fn download_pdf(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ExportError> {
    let record = read_card(multipart).await?;
    let fonts = state.fonts.clone().ok_or(ExportError::FontsUnavailable)?;
    let codes = state.codes.derive(&record.id_number, &record.barcode);
    let logo = state.logo.clone();
    let file_name = record.export_file_name();

    let bytes = tokio::task::spawn_blocking(move || {
        pdf::export_card(&record, &codes, logo.as_ref(), fonts)
    })
    .await??;

    tracing::info!(file = %file_name, bytes = bytes.len(), "exported card");
    Ok(pdf_attachment(&file_name, bytes))
}

/// Wraps a browser-rasterized preview in a PDF. Without a snapshot there is
/// nothing to do.
pub async fn download_snapshot(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ExportError> {
    let upload = read_snapshot(multipart).await?;
    if upload.snapshot.is_none() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let fonts = state.fonts.clone().ok_or(ExportError::FontsUnavailable)?;
    let file_name = CardRecord {
        id_number: upload.id_number.clone(),
        ..CardRecord::default()
    }
    .export_file_name();

    let title = file_name.clone();
    let rendered = tokio::task::spawn_blocking(move || {
        pdf::snapshot::export_snapshot(
            upload.snapshot.as_ref(),
            upload.width_px,
            upload.height_px,
            fonts,
            &title,
        )
    })
    .await??;

    match rendered {
        Some(bytes) => {
            tracing::info!(file = %file_name, bytes = bytes.len(), "exported snapshot");
            Ok(pdf_attachment(&file_name, bytes))
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodesRequest {
    id_number: String,
    barcode: String,
}

/// QR and barcode for a pair of field values, for clients that render
/// their own preview.
pub async fn codes(
    State(state): State<Arc<AppState>>,
    Form(request): Form<CodesRequest>,
) -> impl IntoResponse {
    let derived = state.codes.derive(&request.id_number, &request.barcode);
    let qr = derived
        .qr_png
        .as_deref()
        .map(|png| EmbeddedImage::from_png(png.clone()).to_data_url());
    let barcode = derived.barcode.as_deref().map(|code| code.to_svg(48));
    let symbology = (!request.barcode.is_empty()).then(|| select_symbology(&request.barcode));

    Json(serde_json::json!({
        "qr": qr,
        "barcode": barcode,
        "symbology": symbology,
    }))
}
