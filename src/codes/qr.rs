use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb};
use qrcode::{EcLevel, QrCode};

use crate::card::image::encode_png;
use crate::layout::palette;

pub const QR_SIZE_PX: u32 = 200;

/// Renders `value` as a square PNG QR code. Empty or unencodable input
/// yields `None`.
pub fn render_png(value: &str) -> Option<Vec<u8>> {
    if value.is_empty() {
        return None;
    }

    let code = match QrCode::with_error_correction_level(value.as_bytes(), EcLevel::M) {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, "QR encoding failed");
            return None;
        }
    };

    let mut rendered = code
        .render::<Rgb<u8>>()
        .quiet_zone(false)
        .min_dimensions(QR_SIZE_PX, QR_SIZE_PX)
        .dark_color(Rgb(palette::BLACK))
        .light_color(Rgb(palette::INFO_BAND))
        .build();

    if rendered.width() != QR_SIZE_PX || rendered.height() != QR_SIZE_PX {
        rendered = imageops::resize(&rendered, QR_SIZE_PX, QR_SIZE_PX, FilterType::Nearest);
    }

    encode_png(&DynamicImage::ImageRgb8(rendered)).ok()
}
