// Card PDF export.
// Replays the layout display list through genpdf on a page sized to the card.
mod fonts;
pub mod snapshot;

pub use fonts::{discover as discover_fonts, FontError};

use genpdf::fonts::{FontData, FontFamily};
use genpdf::style::{Color, Style};
use genpdf::{elements, Element, Mm, Position, RenderResult, Scale, Size};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use std::collections::HashMap;

use crate::card::{CardRecord, EmbeddedImage, ImageError, ImageSlot, PreparedImage};
use crate::codes::DerivedCodes;
use crate::layout::{self, px_to_mm, px_to_pt, Align, CardLayout, DrawOp, Fit, Picture, Present, Rect};

/// Native resolution handed to genpdf; scale factors are relative to it.
const IMAGE_DPI: f64 = 300.0;

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error(transparent)]
    Font(#[from] FontError),
    #[error("pdf rendering failed: {0}")]
    Render(#[from] genpdf::error::Error),
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Decoded, alpha-free images keyed by where the layout draws them.
#[derive(Default)]
pub struct CardImages {
    images: HashMap<Picture, DynamicImage>,
}

impl CardImages {
    pub fn insert(&mut self, picture: Picture, image: DynamicImage) {
        self.images.insert(picture, image);
    }

    pub fn get(&self, picture: Picture) -> Option<&DynamicImage> {
        self.images.get(&picture)
    }

    pub fn present(&self) -> Present {
        let mut present = Present {
            qr: self.images.contains_key(&Picture::Qr),
            ..Present::default()
        };
        for slot in ImageSlot::ALL {
            present.set(slot, self.images.contains_key(&Picture::Upload(slot)));
        }
        present
    }
}

fn decode(prepared: Option<PreparedImage>) -> Option<DynamicImage> {
    let prepared = prepared?;
    match prepared.decode() {
        Ok(image) => Some(image),
        Err(e) => {
            tracing::warn!(error = %e, "omitting image from PDF");
            None
        }
    }
}

/// Collects every image the card can show. Images that cannot be decoded
/// are left out and the card is drawn without them.
pub fn prepare_images(
    record: &CardRecord,
    codes: &DerivedCodes,
    logo_fallback: Option<&EmbeddedImage>,
) -> CardImages {
    let mut images = CardImages::default();
    for slot in ImageSlot::ALL {
        let upload = match slot {
            ImageSlot::Logo => record.image(slot).or(logo_fallback),
            _ => record.image(slot),
        };
        if let Some(image) = decode(upload.and_then(EmbeddedImage::prepare_for_pdf)) {
            images.insert(Picture::Upload(slot), image);
        }
    }
    if let Some(qr) = codes.qr_png.as_deref() {
        if let Some(image) = decode(EmbeddedImage::from_png(qr.clone()).prepare_for_pdf()) {
            images.insert(Picture::Qr, image);
        }
    }
    images
}

/// Lays out and renders one card as a single-page PDF.
pub fn export_card(
    record: &CardRecord,
    codes: &DerivedCodes,
    logo_fallback: Option<&EmbeddedImage>,
    fonts: FontFamily<FontData>,
) -> Result<Vec<u8>, PdfError> {
    let images = prepare_images(record, codes, logo_fallback);
    let layout = layout::card_layout(record, &images.present(), codes.barcode.as_deref());
    render(&layout, images, fonts, &record.full_name())
}

/// Renders any display list onto a page of exactly its size.
pub fn render(
    layout: &CardLayout,
    images: CardImages,
    fonts: FontFamily<FontData>,
    title: &str,
) -> Result<Vec<u8>, PdfError> {
    let mut doc = genpdf::Document::new(fonts);
    doc.set_title(title);
    doc.set_paper_size(Size::new(layout.width_mm(), layout.height_mm()));

    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(0);
    doc.set_page_decorator(decorator);

    doc.push(DisplayList {
        ops: layout.ops.clone(),
        images,
    });

    let mut out = Vec::new();
    doc.render(&mut out)?;
    Ok(out)
}

fn color(rgb: [u8; 3]) -> Color {
    Color::Rgb(rgb[0], rgb[1], rgb[2])
}

fn position(x_px: f64, y_px: f64) -> Position {
    Position::new(px_to_mm(x_px), px_to_mm(y_px))
}

/// Placement of an image of `w` x `h` pixels inside `rect`, centered.
pub fn contain(w: u32, h: u32, rect: Rect) -> Rect {
    if w == 0 || h == 0 {
        return rect;
    }
    let scale = (rect.w / f64::from(w)).min(rect.h / f64::from(h));
    let (fw, fh) = (f64::from(w) * scale, f64::from(h) * scale);
    Rect::new(rect.x + (rect.w - fw) / 2.0, rect.y + (rect.h - fh) / 2.0, fw, fh)
}

/// Centered crop of `image` to the aspect ratio of `rect`.
pub fn cover(image: &DynamicImage, rect: Rect) -> DynamicImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || rect.w <= 0.0 || rect.h <= 0.0 {
        return image.clone();
    }
    let target = rect.w / rect.h;
    let current = f64::from(w) / f64::from(h);
    if current > target {
        let cw = ((f64::from(h) * target).round() as u32).clamp(1, w);
        image.crop_imm((w - cw) / 2, 0, cw, h)
    } else {
        let ch = ((f64::from(w) / target).round() as u32).clamp(1, h);
        image.crop_imm(0, (h - ch) / 2, w, ch)
    }
}

struct DisplayList {
    ops: Vec<DrawOp>,
    images: CardImages,
}

/// One pixel of `rgb`. genpdf has no filled shapes, so solid areas are
/// drawn as this pixel stretched over the rectangle.
pub fn solid(rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb(rgb)))
}

/// Scale that stretches a `w` x `h` pixel image, embedded at `IMAGE_DPI`,
/// over `target`.
fn stretch_scale(w: u32, h: u32, target: Rect) -> Scale {
    let native_w = f64::from(w) * 25.4 / IMAGE_DPI;
    let native_h = f64::from(h) * 25.4 / IMAGE_DPI;
    Scale::new(px_to_mm(target.w) / native_w, px_to_mm(target.h) / native_h)
}

fn place(
    context: &genpdf::Context,
    area: &genpdf::render::Area<'_>,
    style: Style,
    image: DynamicImage,
    target: Rect,
) -> Result<(), genpdf::error::Error> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || target.w <= 0.0 || target.h <= 0.0 {
        return Ok(());
    }
    let mut element = elements::Image::from_dynamic_image(image)?
        .with_dpi(IMAGE_DPI)
        .with_position(position(target.x, target.y))
        .with_scale(stretch_scale(w, h, target));
    element.render(context, area.clone(), style)?;
    Ok(())
}

impl DisplayList {
    fn image(
        &self,
        context: &genpdf::Context,
        area: &genpdf::render::Area<'_>,
        style: Style,
        picture: Picture,
        rect: Rect,
        fit: Fit,
    ) -> Result<(), genpdf::error::Error> {
        let source = match self.images.get(picture) {
            Some(image) => image,
            None => return Ok(()),
        };
        let (image, target) = match fit {
            Fit::Cover => (cover(source, rect), rect),
            Fit::Contain => {
                let (w, h) = source.dimensions();
                (source.clone(), contain(w, h, rect))
            }
            Fit::Stretch => (source.clone(), rect),
        };
        place(context, area, style, image, target)
    }
}

impl Element for DisplayList {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: genpdf::render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, genpdf::error::Error> {
        for op in &self.ops {
            match op {
                DrawOp::Fill { rect, color: rgb } => {
                    place(context, &area, style, solid(*rgb), *rect)?
                }
                DrawOp::Rule { x, y, w, color: rgb } => {
                    place(context, &area, style, solid(*rgb), Rect::new(*x, *y, *w, 1.0))?
                }
                DrawOp::Text {
                    x,
                    y,
                    size,
                    bold,
                    color: rgb,
                    align,
                    text,
                } => {
                    let mut text_style = style
                        .with_font_size(px_to_pt(*size).round() as u8)
                        .with_color(color(*rgb));
                    if *bold {
                        text_style = text_style.bold();
                    }
                    let width = text_style.str_width(&context.font_cache, text);
                    let left = Mm::from(px_to_mm(*x));
                    let left = match align {
                        Align::Left => left,
                        Align::Center => left - width / 2.0,
                        Align::Right => left - width,
                    };
                    let top = Position::new(left, Mm::from(px_to_mm(*y)));
                    if !area.print_str(&context.font_cache, top, text_style, text)? {
                        tracing::warn!(text = %text, "text did not fit on the page");
                    }
                }
                DrawOp::Image { picture, rect, fit } => {
                    self.image(context, &area, style, *picture, *rect, *fit)?
                }
                DrawOp::Bars {
                    rect,
                    modules,
                    runs,
                } => {
                    if *modules == 0 {
                        continue;
                    }
                    let module_w = rect.w / *modules as f64;
                    for (first, width) in runs {
                        let bar = Rect::new(
                            rect.x + *first as f64 * module_w,
                            rect.y,
                            *width as f64 * module_w,
                            rect.h,
                        );
                        place(context, &area, style, solid(layout::palette::BLACK), bar)?;
                    }
                }
            }
        }

        Ok(RenderResult {
            size: area.size(),
            has_more: false,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::card::image::tests::{encoded, webp, WEBP_ALPHA, WEBP_LOSSLESS, WEBP_LOSSY};
    use crate::codes::CodeCache;
    use chrono::NaiveDate;
    use image::ImageOutputFormat;

    /// System fonts, when the machine has any. Rendering tests skip without them.
    pub(crate) fn system_fonts() -> Option<FontFamily<FontData>> {
        discover_fonts(None, None).ok()
    }

    fn sample() -> CardRecord {
        CardRecord::sample(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap())
    }

    #[test]
    fn contain_centers_and_keeps_aspect() {
        let placed = contain(200, 100, Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(placed, Rect::new(0.0, 25.0, 100.0, 50.0));
        let tall = contain(50, 100, Rect::new(10.0, 10.0, 100.0, 40.0));
        assert_eq!(tall, Rect::new(50.0, 10.0, 20.0, 40.0));
    }

    #[test]
    fn cover_crops_to_box_ratio() {
        let wide = DynamicImage::ImageRgb8(image::RgbImage::new(300, 140));
        let cropped = cover(&wide, Rect::new(0.0, 0.0, 120.0, 140.0));
        assert_eq!(cropped.dimensions(), (120, 140));

        let tall = DynamicImage::ImageRgb8(image::RgbImage::new(120, 400));
        let cropped = cover(&tall, Rect::new(0.0, 0.0, 120.0, 140.0));
        assert_eq!(cropped.dimensions(), (120, 140));
    }

    #[test]
    fn converted_upload_is_laid_out() {
        let mut record = sample();
        let bmp = encoded(ImageOutputFormat::Bmp, 60, 70);
        record.set_image(
            ImageSlot::Photo,
            EmbeddedImage::from_upload(bmp, Some("image/bmp"), None).unwrap(),
        );
        let codes = CodeCache::default().derive(&record.id_number, &record.barcode);
        let images = prepare_images(&record, &codes, None);
        let present = images.present();
        assert!(present.photo);
        assert!(present.qr);
        assert!(!present.logo);

        let layout = layout::card_layout(&record, &present, codes.barcode.as_deref());
        assert!(layout.ops.iter().any(|op| matches!(
            op,
            DrawOp::Image { picture: Picture::Upload(ImageSlot::Photo), fit: Fit::Cover, .. }
        )));
    }

    #[test]
    fn broken_upload_is_omitted() {
        let mut record = sample();
        record.set_image(
            ImageSlot::SignatureAn,
            EmbeddedImage::from_upload(vec![0, 1, 2, 3], Some("image/webp"), None).unwrap(),
        );
        let images = prepare_images(&record, &DerivedCodes::default(), None);
        assert!(!images.present().signature_an);
    }

    #[test]
    fn logo_falls_back_to_configured_file() {
        let record = sample();
        let logo = EmbeddedImage::from_png(encoded(ImageOutputFormat::Png, 30, 10));
        let images = prepare_images(&record, &DerivedCodes::default(), Some(&logo));
        assert!(images.present().logo);
    }

    #[test]
    fn renders_single_page_pdf() {
        let Some(fonts) = system_fonts() else {
            eprintln!("skipping: no system fonts");
            return;
        };
        let mut record = sample();
        record.set_image(
            ImageSlot::SignatureAg,
            EmbeddedImage::from_upload(encoded(ImageOutputFormat::Bmp, 40, 20), None, None).unwrap(),
        );
        let codes = CodeCache::default().derive(&record.id_number, &record.barcode);
        let pdf = export_card(&record, &codes, None, fonts).unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
        assert!(media_box(&pdf).is_some());
    }

    #[test]
    fn repeated_exports_share_page_geometry() {
        let Some(fonts) = system_fonts() else {
            eprintln!("skipping: no system fonts");
            return;
        };
        let record = sample();
        let codes = CodeCache::default().derive(&record.id_number, &record.barcode);
        let first = export_card(&record, &codes, None, fonts.clone()).unwrap();
        let second = export_card(&record, &codes, None, fonts).unwrap();
        assert_eq!(media_box(&first), media_box(&second));
    }

    #[test]
    fn solid_is_one_pixel_of_the_fill_color() {
        let pixel = solid(layout::palette::NAME_BAR);
        assert_eq!(pixel.dimensions(), (1, 1));
        assert_eq!(pixel.to_rgb8().get_pixel(0, 0).0, layout::palette::NAME_BAR);
    }

    #[test]
    fn stretch_scale_maps_pixels_onto_the_box() {
        let native = 25.4 / IMAGE_DPI;
        let scale = stretch_scale(1, 1, Rect::new(10.0, 10.0, 96.0, 48.0));
        assert!((scale.x * native - 25.4).abs() < 1e-9);
        assert!((scale.y * native - 12.7).abs() < 1e-9);

        let scale = stretch_scale(4, 2, Rect::new(0.0, 0.0, 96.0, 96.0));
        assert!((scale.x * 4.0 * native - 25.4).abs() < 1e-9);
        assert!((scale.y * 2.0 * native - 25.4).abs() < 1e-9);
    }

    #[test]
    fn fills_rules_and_bars_are_drawn() {
        let Some(fonts) = system_fonts() else {
            eprintln!("skipping: no system fonts");
            return;
        };
        let blank = CardLayout {
            width: 200.0,
            height: 100.0,
            ops: Vec::new(),
        };
        let shapes = CardLayout {
            ops: vec![
                DrawOp::Fill {
                    rect: Rect::new(0.0, 0.0, 200.0, 100.0),
                    color: layout::palette::INFO_BAND,
                },
                DrawOp::Rule {
                    x: 10.0,
                    y: 50.0,
                    w: 180.0,
                    color: layout::palette::BORDER,
                },
                DrawOp::Bars {
                    rect: Rect::new(20.0, 60.0, 100.0, 30.0),
                    modules: 5,
                    runs: vec![(0, 1), (2, 2)],
                },
            ],
            ..blank.clone()
        };
        let empty = render(&blank, CardImages::default(), fonts.clone(), "blank").unwrap();
        let drawn = render(&shapes, CardImages::default(), fonts, "shapes").unwrap();
        assert!(drawn.starts_with(b"%PDF-"));
        assert_eq!(media_box(&empty), media_box(&drawn));
        // One embedded image per fill, rule and bar.
        assert!(count(&drawn, b"/Image") >= count(&empty, b"/Image") + 4);
    }

    #[test]
    fn webp_uploads_reach_the_pdf() {
        let mut record = sample();
        let slots = [
            (ImageSlot::Photo, WEBP_LOSSY),
            (ImageSlot::SignatureAn, WEBP_LOSSLESS),
            (ImageSlot::SignatureAg, WEBP_ALPHA),
        ];
        for (slot, fixture) in slots {
            record.set_image(
                slot,
                EmbeddedImage::from_upload(webp(fixture), Some("image/webp"), None).unwrap(),
            );
        }
        let images = prepare_images(&record, &DerivedCodes::default(), None);
        let present = images.present();
        assert!(present.photo);
        assert!(present.signature_an);
        assert!(present.signature_ag);

        let Some(fonts) = system_fonts() else {
            eprintln!("skipping: no system fonts");
            return;
        };
        let pdf = export_card(&record, &DerivedCodes::default(), None, fonts).unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    fn media_box(pdf: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(pdf);
        let start = text.find("/MediaBox")?;
        let end = text[start..].find(']')?;
        Some(text[start..start + end].to_string())
    }
}
