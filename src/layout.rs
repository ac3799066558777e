// Card geometry shared by the HTML preview and the vector PDF export.
//
// Everything is laid out in CSS pixels on a fixed-width card and turned
// into an ordered display list. The preview positions elements with these
// same pixel values and the PDF writer converts them to millimetres at
// 96 DPI, so a visual change made here shows up in both outputs. Any
// styling done outside this module (template CSS, PDF fonts) has to be
// kept in step with these constants by hand.

use crate::card::{CardRecord, ImageSlot};
use crate::codes::Barcode;

pub const DPI: f64 = 96.0;

pub fn px_to_mm(px: f64) -> f64 {
    px * 25.4 / DPI
}

/// CSS px font size to PDF points.
pub fn px_to_pt(px: f64) -> f64 {
    px * 72.0 / DPI
}

pub mod palette {
    pub const BLACK: [u8; 3] = [0x00, 0x00, 0x00];
    pub const WHITE: [u8; 3] = [0xff, 0xff, 0xff];
    pub const PAGE: [u8; 3] = [0xf3, 0xf4, 0xf6];
    pub const BORDER: [u8; 3] = [0xe5, 0xe7, 0xeb];
    pub const NAME_BAR: [u8; 3] = [0x1e, 0x40, 0xaf];
    pub const INFO_BAND: [u8; 3] = [0xb6, 0xe6, 0xf2];
    pub const LABEL: [u8; 3] = [0x37, 0x41, 0x51];

    pub fn hex(color: [u8; 3]) -> String {
        format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
    }
}

pub const CARD_WIDTH: f64 = 680.0;
const PAD: f64 = 12.0;
const INNER_X: f64 = PAD;
const INNER_W: f64 = CARD_WIDTH - 2.0 * PAD;

const HEADER_PAD: f64 = 2.0;
const PHOTO_X: f64 = INNER_X + HEADER_PAD + 20.0;
const PHOTO_W: f64 = 120.0;
const PHOTO_H: f64 = 140.0;
const LOGO_W: f64 = 300.0;
const LOGO_H: f64 = 124.0;

const NAME_BAR_H: f64 = 48.0;
const NAME_SIZE: f64 = 24.0;

const BAND_H: f64 = 96.0;
const BAND_TEXT: f64 = 15.0;
const BAND_ROW_H: f64 = 22.0;
const BAND_LABEL_W: f64 = 132.0;
const QR_BOX: f64 = 80.0;

const SEPARATOR_H: f64 = 8.0;

const DETAIL_X: f64 = INNER_X + 16.0;
const DETAIL_W: f64 = INNER_W - 32.0;
const DETAIL_TEXT: f64 = 14.0;
const DETAIL_LINE: f64 = 20.0;
const CONTACT_COL_W: f64 = 180.0;
const REGISTRY_LABEL_W: f64 = 200.0;
const REGISTRY_ROW: f64 = 24.0;
const COL_GAP: f64 = 24.0;
const HALF_W: f64 = (DETAIL_W - COL_GAP) / 2.0;
const BARCODE_W: f64 = 220.0;
const BARCODE_H: f64 = 48.0;
const BARCODE_GAP: f64 = 12.0;

/// Widest average glyph advance of the bold sans faces, in ems. Text widths
/// are estimated from it so layout needs no font metrics.
const GLYPH_ADVANCE: f64 = 0.7;
const ELLIPSIS: char = '\u{2026}';

const SIGNATURE_BOX_H: f64 = 40.0;
const SIGNATURE_PAD: f64 = 4.0;
const SMALL_TEXT: f64 = 13.0;
const SMALL_LINE: f64 = 18.0;

const INTRO: &str = "Der/Die Inhaber/in ist Mitarbeiter/in der Firma:";
const FOUND_NOTICE: [&str; 2] = [
    "Sollten Sie diesen Ausweis finden, so bitten wir Sie,",
    "ihn uns unfrei an obige Adresse zu senden.",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    /// Fill the box, cropping the overflow.
    Cover,
    /// Fit inside the box, keeping the aspect ratio.
    Contain,
    /// Scale each axis to the box.
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Picture {
    Upload(ImageSlot),
    Qr,
    /// A client-side rasterization of the whole preview.
    Snapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Fill {
        rect: Rect,
        color: [u8; 3],
    },
    /// One-pixel horizontal rule.
    Rule {
        x: f64,
        y: f64,
        w: f64,
        color: [u8; 3],
    },
    /// `x` is the anchor for `align`; `y` is the top of the glyph box.
    Text {
        x: f64,
        y: f64,
        size: f64,
        bold: bool,
        color: [u8; 3],
        align: Align,
        text: String,
    },
    Image {
        picture: Picture,
        rect: Rect,
        fit: Fit,
    },
    /// Barcode modules stretched over `rect`; runs are `(first, width)` in modules.
    Bars {
        rect: Rect,
        modules: usize,
        runs: Vec<(usize, usize)>,
    },
}

/// Which images are available to draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Present {
    pub photo: bool,
    pub signature_an: bool,
    pub signature_ag: bool,
    pub logo: bool,
    pub qr: bool,
}

impl Present {
    pub fn has(&self, slot: ImageSlot) -> bool {
        match slot {
            ImageSlot::Photo => self.photo,
            ImageSlot::SignatureAn => self.signature_an,
            ImageSlot::SignatureAg => self.signature_ag,
            ImageSlot::Logo => self.logo,
        }
    }

    pub fn set(&mut self, slot: ImageSlot, present: bool) {
        match slot {
            ImageSlot::Photo => self.photo = present,
            ImageSlot::SignatureAn => self.signature_an = present,
            ImageSlot::SignatureAg => self.signature_ag = present,
            ImageSlot::Logo => self.logo = present,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardLayout {
    pub width: f64,
    pub height: f64,
    pub ops: Vec<DrawOp>,
}

impl CardLayout {
    pub fn width_mm(&self) -> f64 {
        px_to_mm(self.width)
    }

    pub fn height_mm(&self) -> f64 {
        px_to_mm(self.height)
    }
}

struct Builder {
    ops: Vec<DrawOp>,
}

impl Builder {
    fn fill(&mut self, rect: Rect, color: [u8; 3]) {
        self.ops.push(DrawOp::Fill { rect, color });
    }

    fn rule(&mut self, x: f64, y: f64, w: f64, color: [u8; 3]) {
        self.ops.push(DrawOp::Rule { x, y, w, color });
    }

    /// Text vertically centered in a line box starting at `line_top`.
    #[allow(clippy::too_many_arguments)]
    fn text(
        &mut self,
        x: f64,
        line_top: f64,
        line_h: f64,
        size: f64,
        bold: bool,
        color: [u8; 3],
        align: Align,
        text: impl Into<String>,
    ) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.ops.push(DrawOp::Text {
            x,
            y: line_top + (line_h - size) / 2.0,
            size,
            bold,
            color,
            align,
            text,
        });
    }

    fn image(&mut self, picture: Picture, rect: Rect, fit: Fit) {
        self.ops.push(DrawOp::Image { picture, rect, fit });
    }
}

/// Upper bound for the rendered width of `text` at `size` px.
pub fn estimated_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * size * GLYPH_ADVANCE
}

/// Shortens `text` with an ellipsis until its estimated width fits `max_w`.
pub fn fit_text(text: &str, size: f64, max_w: f64) -> String {
    let max_chars = (max_w / (size * GLYPH_ADVANCE)).floor().max(0.0) as usize;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut cut: String = text.chars().take(max_chars - 1).collect();
    cut.push(ELLIPSIS);
    cut
}

/// Lays out one card. The result depends only on the arguments.
pub fn card_layout(record: &CardRecord, present: &Present, barcode: Option<&Barcode>) -> CardLayout {
    let mut b = Builder { ops: Vec::new() };

    // Header: photo box on the left, logo centered in the remaining width.
    let header_y = PAD;
    let photo = Rect::new(PHOTO_X, header_y + HEADER_PAD, PHOTO_W, PHOTO_H);
    b.fill(photo, palette::BORDER);
    if present.photo {
        b.image(Picture::Upload(ImageSlot::Photo), photo, Fit::Cover);
    }
    if present.logo {
        let right_x = PHOTO_X + PHOTO_W + 16.0;
        let right_w = INNER_X + INNER_W - HEADER_PAD - right_x;
        let logo = Rect::new(
            right_x + (right_w - LOGO_W) / 2.0,
            photo.y + (PHOTO_H - LOGO_H) / 2.0,
            LOGO_W,
            LOGO_H,
        );
        b.image(Picture::Upload(ImageSlot::Logo), logo, Fit::Contain);
    }
    let header_h = PHOTO_H + 2.0 * HEADER_PAD;

    // Name bar.
    let name_y = header_y + header_h;
    b.fill(Rect::new(INNER_X, name_y, INNER_W, NAME_BAR_H), palette::NAME_BAR);
    b.text(
        INNER_X + 16.0,
        name_y,
        NAME_BAR_H,
        NAME_SIZE,
        true,
        palette::WHITE,
        Align::Left,
        record.full_name(),
    );

    // Info band with personal number, ID number and the QR code.
    let band_y = name_y + NAME_BAR_H;
    b.fill(Rect::new(INNER_X, band_y, INNER_W, BAND_H), palette::INFO_BAND);
    let rows_top = band_y + (BAND_H - (2.0 * BAND_ROW_H + 4.0)) / 2.0;
    let band_rows = [
        ("Personalnummer:", record.personal_number.as_str()),
        ("Ausweisnummer:", record.id_number.as_str()),
    ];
    for (i, (label, value)) in band_rows.into_iter().enumerate() {
        let row_y = rows_top + i as f64 * (BAND_ROW_H + 4.0);
        let x = INNER_X + 16.0;
        b.text(x, row_y, BAND_ROW_H, BAND_TEXT, false, palette::LABEL, Align::Left, label);
        b.text(x + BAND_LABEL_W, row_y, BAND_ROW_H, BAND_TEXT, true, palette::BLACK, Align::Left, value);
    }
    if present.qr {
        let qr = Rect::new(
            INNER_X + INNER_W - 16.0 - 8.0 - QR_BOX,
            band_y + (BAND_H - QR_BOX) / 2.0,
            QR_BOX,
            QR_BOX,
        );
        b.image(Picture::Qr, qr, Fit::Contain);
    }

    let sep_y = band_y + BAND_H;
    b.fill(Rect::new(INNER_X, sep_y, INNER_W, SEPARATOR_H), palette::PAGE);
    b.rule(INNER_X, sep_y + SEPARATOR_H, INNER_W, palette::BORDER);

    // Details block.
    let mut y = sep_y + SEPARATOR_H + 8.0;
    b.text(DETAIL_X, y, DETAIL_LINE, DETAIL_TEXT, false, palette::BLACK, Align::Left, INTRO);
    y += DETAIL_LINE + 4.0;

    let address_lines: Vec<&str> = record.address.lines().collect();
    for (i, line) in address_lines.iter().enumerate() {
        b.text(
            DETAIL_X,
            y + i as f64 * DETAIL_LINE,
            DETAIL_LINE,
            DETAIL_TEXT,
            true,
            palette::BLACK,
            Align::Left,
            *line,
        );
    }
    let contact_x = DETAIL_X + DETAIL_W - CONTACT_COL_W;
    let mut contact = vec![format!("Tel: {}", record.phone)];
    if !record.fax.trim().is_empty() {
        contact.push(format!("Fax: {}", record.fax));
    }
    for (i, line) in contact.iter().enumerate() {
        b.text(
            contact_x,
            y + i as f64 * DETAIL_LINE,
            DETAIL_LINE,
            DETAIL_TEXT,
            false,
            palette::BLACK,
            Align::Left,
            line.as_str(),
        );
    }
    y += address_lines.len().max(contact.len()) as f64 * DETAIL_LINE + 4.0;

    let registry = [
        ("Bewacherregisternummer AG:", record.ag_number.as_str()),
        ("Bewacherregisternummer Ma:", record.ma_number.as_str()),
        ("Barcode:", record.barcode.as_str()),
    ];
    let registry_h = registry.len() as f64 * REGISTRY_ROW;
    let bars_rect = barcode.map(|_| {
        let right_col = DETAIL_X + HALF_W + COL_GAP;
        Rect::new(
            right_col + HALF_W - BARCODE_W,
            y + registry_h - BARCODE_H,
            BARCODE_W,
            BARCODE_H,
        )
    });
    // Values stop short of the barcode, or of the detail block's edge.
    let value_x = DETAIL_X + REGISTRY_LABEL_W;
    let value_end = bars_rect.map_or(DETAIL_X + DETAIL_W, |rect| rect.x - BARCODE_GAP);
    for (i, (label, value)) in registry.into_iter().enumerate() {
        let row_y = y + i as f64 * REGISTRY_ROW;
        b.text(DETAIL_X, row_y, REGISTRY_ROW, DETAIL_TEXT, false, palette::BLACK, Align::Left, label);
        b.text(
            value_x,
            row_y,
            REGISTRY_ROW,
            DETAIL_TEXT,
            true,
            palette::BLACK,
            Align::Left,
            fit_text(value, DETAIL_TEXT, value_end - value_x),
        );
    }
    if let (Some(code), Some(rect)) = (barcode, bars_rect) {
        b.ops.push(DrawOp::Bars {
            rect,
            modules: code.modules.len(),
            runs: code.bar_runs(),
        });
    }
    y += registry_h + 4.0;

    // Signature row.
    let signatures = [
        (ImageSlot::SignatureAn, "Unterschrift AN"),
        (ImageSlot::SignatureAg, "Unterschrift AG"),
    ];
    for (i, (slot, caption)) in signatures.into_iter().enumerate() {
        let col_x = DETAIL_X + i as f64 * (HALF_W + COL_GAP);
        if present.has(slot) {
            let rect = Rect::new(
                col_x,
                y + SIGNATURE_PAD,
                HALF_W,
                SIGNATURE_BOX_H - 2.0 * SIGNATURE_PAD,
            );
            b.image(Picture::Upload(slot), rect, Fit::Contain);
        }
        b.rule(col_x, y + SIGNATURE_BOX_H, HALF_W, palette::BORDER);
        b.text(
            col_x + HALF_W / 2.0,
            y + SIGNATURE_BOX_H + 1.0,
            DETAIL_LINE,
            DETAIL_TEXT,
            false,
            palette::LABEL,
            Align::Center,
            caption,
        );
    }
    y += SIGNATURE_BOX_H + 1.0 + DETAIL_LINE + 8.0;

    for line in FOUND_NOTICE {
        b.text(DETAIL_X, y, SMALL_LINE, SMALL_TEXT, false, palette::LABEL, Align::Left, line);
        y += SMALL_LINE;
    }

    let note = record.note.trim();
    if !note.is_empty() {
        y += 4.0;
        for (i, line) in note.lines().enumerate() {
            let text = if i == 0 {
                format!("Bemerkung: {}", line)
            } else {
                line.to_string()
            };
            b.text(DETAIL_X, y, SMALL_LINE, SMALL_TEXT, false, palette::BLACK, Align::Left, text);
            y += SMALL_LINE;
        }
    }

    y += 8.0;
    let center = DETAIL_X + DETAIL_W / 2.0;
    b.text(
        center - 8.0,
        y,
        SMALL_LINE,
        SMALL_TEXT,
        false,
        palette::BLACK,
        Align::Right,
        format!("Erstelldatum: {}", record.created_at),
    );
    b.text(
        center + 8.0,
        y,
        SMALL_LINE,
        SMALL_TEXT,
        false,
        palette::BLACK,
        Align::Left,
        format!("Gültig bis: {}", record.valid_till),
    );
    y += SMALL_LINE + 16.0;

    // White card behind everything, then the page padding.
    let card = Rect::new(INNER_X, PAD, INNER_W, y - PAD);
    b.ops.insert(0, DrawOp::Fill { rect: card, color: palette::WHITE });
    let height = y + PAD;
    b.ops.insert(
        0,
        DrawOp::Fill {
            rect: Rect::new(0.0, 0.0, CARD_WIDTH, height),
            color: palette::PAGE,
        },
    );

    CardLayout {
        width: CARD_WIDTH,
        height,
        ops: b.ops,
    }
}
