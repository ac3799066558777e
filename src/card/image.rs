use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, ImageOutputFormat, Rgb, RgbImage};
use std::fmt;
use std::io::Cursor;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("empty upload")]
    Empty,
    #[error("not an image: {0}")]
    NotAnImage(String),
    #[error("malformed data url")]
    MalformedDataUrl,
    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),
    #[error("image conversion failed: {0}")]
    Transcode(#[from] image25::ImageError),
}

/// The image inputs of the card form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSlot {
    Photo,
    SignatureAn,
    SignatureAg,
    Logo,
}

impl ImageSlot {
    pub const ALL: [ImageSlot; 4] = [
        ImageSlot::Photo,
        ImageSlot::SignatureAn,
        ImageSlot::SignatureAg,
        ImageSlot::Logo,
    ];

    pub fn field_name(self) -> &'static str {
        match self {
            ImageSlot::Photo => "photo",
            ImageSlot::SignatureAn => "signatureAn",
            ImageSlot::SignatureAg => "signatureAg",
            ImageSlot::Logo => "logo",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.field_name() == name)
    }
}

/// Uploaded image bytes with their MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    mime: String,
    bytes: Vec<u8>,
}

impl fmt::Debug for EmbeddedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedImage")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn mime_for(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        ImageFormat::Ico => Some("image/x-icon"),
        _ => None,
    }
}

impl EmbeddedImage {
    /// Accepts an upload when the bytes sniff as an image, or when the
    /// declared content type or file extension says `image/*`.
    pub fn from_upload(
        bytes: Vec<u8>,
        content_type: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }

        let sniffed = image::guess_format(&bytes).ok().and_then(mime_for);
        let declared = content_type
            .filter(|ct| ct.starts_with("image/"))
            .map(str::to_string);
        let guessed = file_name
            .and_then(|name| mime_guess::from_path(name).first())
            .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
            .map(|mime| mime.essence_str().to_string());

        let mime = sniffed
            .map(str::to_string)
            .or(declared)
            .or(guessed)
            .ok_or_else(|| {
                ImageError::NotAnImage(
                    content_type
                        .or(file_name)
                        .unwrap_or("unknown upload")
                        .to_string(),
                )
            })?;

        Ok(Self { mime, bytes })
    }

    pub fn from_png(bytes: Vec<u8>) -> Self {
        Self {
            mime: "image/png".to_string(),
            bytes,
        }
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    pub fn from_data_url(url: &str) -> Result<Self, ImageError> {
        let rest = url.strip_prefix("data:").ok_or(ImageError::MalformedDataUrl)?;
        let (meta, payload) = rest.split_once(',').ok_or(ImageError::MalformedDataUrl)?;
        let mime = meta
            .strip_suffix(";base64")
            .ok_or(ImageError::MalformedDataUrl)?;
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|_| ImageError::MalformedDataUrl)?;
        Self::from_upload(bytes, Some(mime), None)
    }

    /// PNG and JPEG pass through; anything else is re-encoded as PNG.
    /// Returns `None` when the bytes cannot be decoded at all.
    /// Conversion uses the newer `image` release, which reads lossless
    /// and alpha WEBP; the PNG it writes is readable by the PDF side.
    pub fn prepare_for_pdf(&self) -> Option<PreparedImage> {
        match image::guess_format(&self.bytes) {
            Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg)) => Some(PreparedImage {
                format,
                bytes: self.bytes.clone(),
            }),
            _ => match convert_to_png(&self.bytes) {
                Ok(bytes) => {
                    tracing::info!(mime = %self.mime, "converted image to PNG for PDF embedding");
                    Some(PreparedImage {
                        format: ImageFormat::Png,
                        bytes,
                    })
                }
                Err(e) => {
                    tracing::warn!(mime = %self.mime, error = %e, "dropping undecodable image");
                    None
                }
            },
        }
    }
}

fn convert_to_png(bytes: &[u8]) -> Result<Vec<u8>, ImageError> {
    let decoded = image25::load_from_memory(bytes)?;
    let mut out = Cursor::new(Vec::new());
    decoded.write_to(&mut out, image25::ImageFormat::Png)?;
    Ok(out.into_inner())
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ImageError> {
    let mut out = Vec::new();
    image.write_to(&mut out, ImageOutputFormat::Png)?;
    Ok(out)
}

/// An image in a format the PDF writer accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl PreparedImage {
    /// Decodes to RGB with any alpha channel composited over white.
    pub fn decode(&self) -> Result<DynamicImage, ImageError> {
        let decoded = image::load_from_memory_with_format(&self.bytes, self.format)?;
        Ok(flatten_alpha(decoded))
    }
}

pub fn flatten_alpha(image: DynamicImage) -> DynamicImage {
    if !image.color().has_alpha() {
        return DynamicImage::ImageRgb8(image.to_rgb8());
    }
    let rgba = image.to_rgba8();
    let flat = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8| -> u8 {
            let alpha = u16::from(a);
            ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8
        };
        Rgb([blend(r), blend(g), blend(b)])
    });
    DynamicImage::ImageRgb8(flat)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    /// 1x1 WEBP files in the three encodings browsers produce.
    pub(crate) const WEBP_LOSSY: &str = "UklGRiIAAABXRUJQVlA4IBYAAAAwAQCdASoBAAEADsD+JaQAA3AAAAAA";
    pub(crate) const WEBP_LOSSLESS: &str = "UklGRhoAAABXRUJQVlA4TA0AAAAvAAAAEAcQERGIiP4HAA==";
    pub(crate) const WEBP_ALPHA: &str = "UklGRkoAAABXRUJQVlA4WAoAAAAQAAAAAAAAAAAAQUxQSAwAAAARBxAR/Q9ERP8DAABWUDggGAAAABQBAJ0BKgEAAQAAAP4AAA3AAP7mtQAAAA==";

    pub(crate) fn webp(fixture: &str) -> Vec<u8> {
        STANDARD.decode(fixture).unwrap()
    }

    pub(crate) fn encoded(format: ImageOutputFormat, w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb([30, 64, 175]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img).write_to(&mut out, format).unwrap();
        out
    }

    #[test]
    fn slot_field_names_round_trip() {
        for slot in ImageSlot::ALL {
            assert_eq!(ImageSlot::from_field_name(slot.field_name()), Some(slot));
        }
        assert_eq!(ImageSlot::from_field_name("firstName"), None);
    }

    #[test]
    fn upload_sniffs_mime_from_bytes() {
        let png = encoded(ImageOutputFormat::Png, 2, 2);
        let image = EmbeddedImage::from_upload(png, Some("application/octet-stream"), None).unwrap();
        assert_eq!(image.mime(), "image/png");
    }

    #[test]
    fn upload_falls_back_to_declared_type_and_extension() {
        let declared = EmbeddedImage::from_upload(vec![1, 2, 3], Some("image/heic"), None).unwrap();
        assert_eq!(declared.mime(), "image/heic");

        let guessed = EmbeddedImage::from_upload(vec![1, 2, 3], None, Some("scan.webp")).unwrap();
        assert_eq!(guessed.mime(), "image/webp");
    }

    #[test]
    fn upload_rejects_non_images() {
        assert!(matches!(
            EmbeddedImage::from_upload(b"%PDF-1.4".to_vec(), Some("application/pdf"), Some("a.pdf")),
            Err(ImageError::NotAnImage(_))
        ));
        assert!(matches!(
            EmbeddedImage::from_upload(Vec::new(), Some("image/png"), None),
            Err(ImageError::Empty)
        ));
    }

    #[test]
    fn data_url_round_trip() {
        let image = EmbeddedImage::from_png(encoded(ImageOutputFormat::Png, 3, 1));
        let url = image.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(EmbeddedImage::from_data_url(&url).unwrap(), image);
        assert!(matches!(
            EmbeddedImage::from_data_url("image/png;base64,AAAA"),
            Err(ImageError::MalformedDataUrl)
        ));
    }

    #[test]
    fn png_and_jpeg_pass_through_unchanged() {
        let png = encoded(ImageOutputFormat::Png, 4, 4);
        let prepared = EmbeddedImage::from_png(png.clone()).prepare_for_pdf().unwrap();
        assert_eq!(prepared.format, ImageFormat::Png);
        assert_eq!(prepared.bytes, png);

        let jpeg = encoded(ImageOutputFormat::Jpeg(90), 4, 4);
        let upload = EmbeddedImage::from_upload(jpeg.clone(), None, None).unwrap();
        let prepared = upload.prepare_for_pdf().unwrap();
        assert_eq!(prepared.format, ImageFormat::Jpeg);
        assert_eq!(prepared.bytes, jpeg);
    }

    #[test]
    fn other_formats_are_converted_to_png() {
        let bmp = encoded(ImageOutputFormat::Bmp, 5, 3);
        let upload = EmbeddedImage::from_upload(bmp, Some("image/bmp"), None).unwrap();
        let prepared = upload.prepare_for_pdf().unwrap();
        assert_eq!(prepared.format, ImageFormat::Png);
        assert_eq!(image::guess_format(&prepared.bytes).unwrap(), ImageFormat::Png);
        assert_eq!(prepared.decode().unwrap().dimensions(), (5, 3));
    }

    #[test]
    fn every_webp_encoding_is_converted_to_png() {
        for (kind, fixture) in [
            ("lossy", WEBP_LOSSY),
            ("lossless", WEBP_LOSSLESS),
            ("alpha", WEBP_ALPHA),
        ] {
            let upload = EmbeddedImage::from_upload(webp(fixture), None, None).unwrap();
            assert_eq!(upload.mime(), "image/webp", "{kind}");
            let prepared = upload
                .prepare_for_pdf()
                .unwrap_or_else(|| panic!("{kind} WEBP was dropped"));
            assert_eq!(prepared.format, ImageFormat::Png, "{kind}");
            assert_eq!(prepared.decode().unwrap().dimensions(), (1, 1), "{kind}");
        }
    }

    #[test]
    fn undecodable_images_are_dropped() {
        // RIFF/WEBP header with a truncated body.
        let broken = b"RIFF\x10\x00\x00\x00WEBPVP8 \x00\x00".to_vec();
        let upload = EmbeddedImage::from_upload(broken, Some("image/webp"), None).unwrap();
        assert!(upload.prepare_for_pdf().is_none());
    }

    #[test]
    fn alpha_is_composited_over_white() {
        let mut rgba = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        let flat = flatten_alpha(DynamicImage::ImageRgba8(rgba)).to_rgb8();
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(flat.get_pixel(1, 0).0, [0, 0, 0]);
    }
}
