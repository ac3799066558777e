use axum::extract::multipart::{Multipart, MultipartError};

use super::image::{EmbeddedImage, ImageSlot};
use super::record::CardRecord;

/// A preview bitmap posted by the browser for snapshot export.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SnapshotUpload {
    pub id_number: String,
    pub snapshot: Option<EmbeddedImage>,
    pub width_px: Option<f64>,
    pub height_px: Option<f64>,
}

/// Reads a posted card form. Unknown fields are ignored, empty file inputs
/// leave the slot unset and non-image files are skipped with a warning.
pub async fn read_card(mut multipart: Multipart) -> Result<CardRecord, MultipartError> {
    let mut record = CardRecord::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();

        if let Some(slot) = ImageSlot::from_field_name(&name) {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await?;
            if data.is_empty() {
                continue;
            }
            match EmbeddedImage::from_upload(
                data.to_vec(),
                content_type.as_deref(),
                file_name.as_deref(),
            ) {
                Ok(image) => record.set_image(slot, image),
                Err(e) => tracing::warn!(field = %name, error = %e, "ignoring upload"),
            }
        } else {
            let text = field.text().await?;
            if !record.set_text(&name, text) {
                tracing::debug!(field = %name, "ignoring unknown form field");
            }
        }
    }

    Ok(record)
}

/// Reads a snapshot export form: the rasterized preview and its on-screen size.
pub async fn read_snapshot(mut multipart: Multipart) -> Result<SnapshotUpload, MultipartError> {
    let mut upload = SnapshotUpload::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "snapshot" => {
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                if data.is_empty() {
                    continue;
                }
                match EmbeddedImage::from_upload(data.to_vec(), content_type.as_deref(), None) {
                    Ok(image) => upload.snapshot = Some(image),
                    Err(e) => tracing::warn!(error = %e, "ignoring snapshot upload"),
                }
            }
            "idNumber" => upload.id_number = field.text().await?,
            "width" => upload.width_px = field.text().await?.trim().parse().ok(),
            "height" => upload.height_px = field.text().await?.trim().parse().ok(),
            _ => {}
        }
    }

    Ok(upload)
}
