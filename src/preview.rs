// HTML preview built from the same display list as the PDF, so the two
// cannot drift apart in geometry.

use serde::Serialize;

use crate::card::{CardRecord, EmbeddedImage, ImageSlot};
use crate::codes::{barcode::runs_to_svg, DerivedCodes};
use crate::layout::{self, palette, Align, CardLayout, DrawOp, Fit, Picture, Present};

#[derive(Debug, Serialize)]
pub struct PreviewElement {
    pub kind: &'static str,
    pub style: String,
    pub text: Option<String>,
    pub src: Option<String>,
    pub svg: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PreviewModel {
    pub width: f64,
    pub height: f64,
    pub full_name: String,
    pub file_name: String,
    pub missing: Vec<&'static str>,
    pub elements: Vec<PreviewElement>,
}

fn px(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded}px")
}

fn boxed(x: f64, y: f64, w: f64, h: f64) -> String {
    format!(
        "left:{};top:{};width:{};height:{};",
        px(x),
        px(y),
        px(w),
        px(h)
    )
}

struct Sources<'a> {
    record: &'a CardRecord,
    logo_fallback: Option<&'a EmbeddedImage>,
    qr: Option<String>,
}

impl Sources<'_> {
    fn upload(&self, slot: ImageSlot) -> Option<&EmbeddedImage> {
        match slot {
            ImageSlot::Logo => self.record.image(slot).or(self.logo_fallback),
            _ => self.record.image(slot),
        }
    }

    fn present(&self) -> Present {
        let mut present = Present {
            qr: self.qr.is_some(),
            ..Present::default()
        };
        for slot in ImageSlot::ALL {
            present.set(slot, self.upload(slot).is_some());
        }
        present
    }

    fn data_url(&self, picture: Picture) -> Option<String> {
        match picture {
            Picture::Upload(slot) => self.upload(slot).map(EmbeddedImage::to_data_url),
            Picture::Qr => self.qr.clone(),
            Picture::Snapshot => None,
        }
    }
}

impl PreviewModel {
    pub fn build(
        record: &CardRecord,
        codes: &DerivedCodes,
        logo_fallback: Option<&EmbeddedImage>,
    ) -> Self {
        let sources = Sources {
            record,
            logo_fallback,
            qr: codes
                .qr_png
                .as_deref()
                .map(|png| EmbeddedImage::from_png(png.clone()).to_data_url()),
        };
        let layout = layout::card_layout(record, &sources.present(), codes.barcode.as_deref());
        Self::from_layout(record, &layout, &sources)
    }

    fn from_layout(record: &CardRecord, layout: &CardLayout, sources: &Sources<'_>) -> Self {
        let elements = layout
            .ops
            .iter()
            .filter_map(|op| element(op, sources))
            .collect();

        Self {
            width: layout.width,
            height: layout.height,
            full_name: record.full_name(),
            file_name: record.export_file_name(),
            missing: record.missing_fields(),
            elements,
        }
    }
}

fn element(op: &DrawOp, sources: &Sources<'_>) -> Option<PreviewElement> {
    let plain = |kind, style| PreviewElement {
        kind,
        style,
        text: None,
        src: None,
        svg: None,
    };

    let el = match op {
        DrawOp::Fill { rect, color } => plain(
            "fill",
            format!("{}background:{};", boxed(rect.x, rect.y, rect.w, rect.h), palette::hex(*color)),
        ),
        DrawOp::Rule { x, y, w, color } => plain(
            "fill",
            format!("{}background:{};", boxed(*x, *y, *w, 1.0), palette::hex(*color)),
        ),
        DrawOp::Text {
            x,
            y,
            size,
            bold,
            color,
            align,
            text,
        } => {
            let shift = match align {
                Align::Left => "",
                Align::Center => "transform:translateX(-50%);",
                Align::Right => "transform:translateX(-100%);",
            };
            PreviewElement {
                text: Some(text.clone()),
                ..plain(
                    "text",
                    format!(
                        "left:{};top:{};font-size:{};font-weight:{};color:{};{}",
                        px(*x),
                        px(*y),
                        px(*size),
                        if *bold { 600 } else { 400 },
                        palette::hex(*color),
                        shift
                    ),
                )
            }
        }
        DrawOp::Image { picture, rect, fit } => {
            let object_fit = match fit {
                Fit::Cover => "cover",
                Fit::Contain => "contain",
                Fit::Stretch => "fill",
            };
            PreviewElement {
                src: Some(sources.data_url(*picture)?),
                ..plain(
                    "image",
                    format!("{}object-fit:{};", boxed(rect.x, rect.y, rect.w, rect.h), object_fit),
                )
            }
        }
        DrawOp::Bars {
            rect,
            modules,
            runs,
        } => PreviewElement {
            svg: Some(runs_to_svg(*modules, runs, rect.h.round() as u32)),
            ..plain("bars", boxed(rect.x, rect.y, rect.w, rect.h))
        },
    };
    Some(el)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::image::tests::encoded;
    use crate::codes::CodeCache;
    use chrono::NaiveDate;
    use image::ImageOutputFormat;

    fn texts(model: &PreviewModel) -> Vec<&str> {
        model
            .elements
            .iter()
            .filter_map(|el| el.text.as_deref())
            .collect()
    }

    #[test]
    fn preview_shows_current_field_values() {
        let mut record = CardRecord::sample(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
        let codes = CodeCache::default();
        let model = PreviewModel::build(&record, &codes.derive(&record.id_number, &record.barcode), None);
        assert!(texts(&model).contains(&"Zadran, Jawid"));
        assert_eq!(model.file_name, "id-card-000150.pdf");
        assert!(model.missing.is_empty());

        record.first_name = "Amina".into();
        record.id_number = "000151".into();
        let model = PreviewModel::build(&record, &codes.derive(&record.id_number, &record.barcode), None);
        let texts = texts(&model);
        assert!(texts.contains(&"Zadran, Amina"));
        assert!(texts.contains(&"000151"));
        assert!(!texts.contains(&"000150"));
    }

    #[test]
    fn images_become_data_urls() {
        let mut record = CardRecord::default();
        record.set_image(
            ImageSlot::Photo,
            EmbeddedImage::from_png(encoded(ImageOutputFormat::Png, 2, 2)),
        );
        let codes = CodeCache::default().derive("000150", "");
        let model = PreviewModel::build(&record, &codes, None);
        let sources: Vec<&str> = model
            .elements
            .iter()
            .filter_map(|el| el.src.as_deref())
            .collect();
        assert_eq!(sources.len(), 2);
        assert!(sources.iter().all(|src| src.starts_with("data:image/png;base64,")));
        assert!(!model.elements.iter().any(|el| el.kind == "bars"));
    }

    #[test]
    fn barcode_is_inline_svg() {
        let record = CardRecord {
            barcode: "MA-4711".into(),
            ..CardRecord::default()
        };
        let codes = CodeCache::default().derive("", &record.barcode);
        let model = PreviewModel::build(&record, &codes, None);
        let bars = model.elements.iter().find(|el| el.kind == "bars").unwrap();
        assert!(bars.svg.as_deref().unwrap().starts_with("<svg"));
    }

    #[test]
    fn empty_record_lists_missing_fields() {
        let model = PreviewModel::build(&CardRecord::default(), &DerivedCodes::default(), None);
        assert!(model.missing.contains(&"Vorname"));
        assert_eq!(model.file_name, "id-card-preview.pdf");
        assert_eq!(px(12.346), "12.35px");
        assert_eq!(px(12.0), "12px");
    }
}
