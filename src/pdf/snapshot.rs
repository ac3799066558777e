// Export of a preview that the browser has already rasterized. The page is
// sized to the preview's on-screen pixel size and the bitmap fills it.

use genpdf::fonts::{FontData, FontFamily};

use super::{decode, render, CardImages, PdfError};
use crate::card::EmbeddedImage;
use crate::layout::{px_to_mm, CardLayout, DrawOp, Fit, Picture, Rect, DPI};

/// On-screen size assumed when the client does not report one.
pub const DEFAULT_WIDTH_PX: f64 = 680.0;
pub const DEFAULT_HEIGHT_PX: f64 = 940.0;
/// Inner margin that keeps rounding from cropping the bitmap edges.
pub const MARGIN_MM: f64 = 0.5;

fn or_default(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(default)
}

/// Page and image placement for a snapshot of `width_px` x `height_px`.
pub fn snapshot_layout(width_px: Option<f64>, height_px: Option<f64>) -> CardLayout {
    let width = or_default(width_px, DEFAULT_WIDTH_PX);
    let height = or_default(height_px, DEFAULT_HEIGHT_PX);
    let margin = MARGIN_MM * DPI / 25.4;
    let rect = Rect::new(
        margin,
        margin,
        (width - 2.0 * margin).max(0.0),
        (height - 2.0 * margin).max(0.0),
    );
    CardLayout {
        width,
        height,
        ops: vec![DrawOp::Image {
            picture: Picture::Snapshot,
            rect,
            fit: Fit::Stretch,
        }],
    }
}

pub fn is_landscape(layout: &CardLayout) -> bool {
    layout.width > layout.height
}

/// Wraps the snapshot in a one-page PDF. `None` when there is nothing to
/// export: no snapshot was sent or it could not be decoded.
pub fn export_snapshot(
    snapshot: Option<&EmbeddedImage>,
    width_px: Option<f64>,
    height_px: Option<f64>,
    fonts: FontFamily<FontData>,
    title: &str,
) -> Result<Option<Vec<u8>>, PdfError> {
    let Some(image) = decode(snapshot.and_then(EmbeddedImage::prepare_for_pdf)) else {
        return Ok(None);
    };

    let layout = snapshot_layout(width_px, height_px);
    tracing::info!(
        width_mm = px_to_mm(layout.width),
        height_mm = px_to_mm(layout.height),
        landscape = is_landscape(&layout),
        "exporting preview snapshot"
    );

    let mut images = CardImages::default();
    images.insert(Picture::Snapshot, image);
    render(&layout, images, fonts, title).map(Some)
}
