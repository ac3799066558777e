use chrono::{Months, NaiveDate};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use super::image::{EmbeddedImage, ImageSlot};

/// One identity card as posted by the form. Lives for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CardRecord {
    pub first_name: String,
    pub last_name: String,
    pub personal_number: String,
    pub id_number: String,
    pub address: String,
    pub phone: String,
    pub fax: String,
    pub ag_number: String,
    pub ma_number: String,
    pub barcode: String,
    pub created_at: String,
    pub valid_till: String,
    pub note: String,
    #[serde(skip)]
    pub photo: Option<EmbeddedImage>,
    #[serde(skip)]
    pub signature_an: Option<EmbeddedImage>,
    #[serde(skip)]
    pub signature_ag: Option<EmbeddedImage>,
    #[serde(skip)]
    pub logo: Option<EmbeddedImage>,
}

/// Form field name and display label of every required text field.
const REQUIRED: &[(&str, &str)] = &[
    ("firstName", "Vorname"),
    ("lastName", "Nachname"),
    ("personalNumber", "Personalnummer"),
    ("idNumber", "Ausweisnummer"),
    ("address", "Adresse"),
    ("phone", "Telefon"),
    ("agNumber", "Bewacherregisternummer AG"),
    ("maNumber", "Bewacherregisternummer Ma"),
    ("barcode", "Barcode"),
    ("createdAt", "Erstelldatum"),
    ("validTill", "Gültig bis"),
];

const PLACEHOLDER_ID: &str = "preview";

fn unsafe_file_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").expect("static regex"))
}

impl CardRecord {
    /// Demo values for a fresh form. Dates run from `today` for one year.
    pub fn sample(today: NaiveDate) -> Self {
        let valid_till = today
            .checked_add_months(Months::new(12))
            .unwrap_or(today);
        Self {
            first_name: "Jawid".to_string(),
            last_name: "Zadran".to_string(),
            personal_number: "4711".to_string(),
            id_number: "000150".to_string(),
            address: "Sicherheitsdienst Muster GmbH\nHauptstraße 1\n10115 Berlin".to_string(),
            phone: "030 1234567".to_string(),
            fax: "030 1234568".to_string(),
            ag_number: "0815-AG".to_string(),
            ma_number: "4711-MA".to_string(),
            barcode: "4006381333931".to_string(),
            created_at: today.format("%d.%m.%Y").to_string(),
            valid_till: valid_till.format("%d.%m.%Y").to_string(),
            ..Self::default()
        }
    }

    /// "Last, First" with both parts trimmed.
    pub fn full_name(&self) -> String {
        format!("{}, {}", self.last_name.trim(), self.first_name.trim())
    }

    pub fn export_file_name(&self) -> String {
        let id = self.id_number.trim();
        let id = if id.is_empty() {
            PLACEHOLDER_ID.to_string()
        } else {
            unsafe_file_chars().replace_all(id, "_").into_owned()
        };
        format!("id-card-{}.pdf", id)
    }

    /// Labels of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        REQUIRED
            .iter()
            .filter(|(field, _)| {
                self.text(field)
                    .map_or(true, |value| value.trim().is_empty())
            })
            .map(|(_, label)| *label)
            .collect()
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        let value = match field {
            "firstName" => &self.first_name,
            "lastName" => &self.last_name,
            "personalNumber" => &self.personal_number,
            "idNumber" => &self.id_number,
            "address" => &self.address,
            "phone" => &self.phone,
            "fax" => &self.fax,
            "agNumber" => &self.ag_number,
            "maNumber" => &self.ma_number,
            "barcode" => &self.barcode,
            "createdAt" => &self.created_at,
            "validTill" => &self.valid_till,
            "note" => &self.note,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Sets a text field by its form name. Returns false for unknown names.
    pub fn set_text(&mut self, field: &str, value: String) -> bool {
        let slot = match field {
            "firstName" => &mut self.first_name,
            "lastName" => &mut self.last_name,
            "personalNumber" => &mut self.personal_number,
            "idNumber" => &mut self.id_number,
            "address" => &mut self.address,
            "phone" => &mut self.phone,
            "fax" => &mut self.fax,
            "agNumber" => &mut self.ag_number,
            "maNumber" => &mut self.ma_number,
            "barcode" => &mut self.barcode,
            "createdAt" => &mut self.created_at,
            "validTill" => &mut self.valid_till,
            "note" => &mut self.note,
            _ => return false,
        };
        // Browsers post textarea line breaks as CRLF.
        *slot = value.replace("\r\n", "\n");
        true
    }

    pub fn image(&self, slot: ImageSlot) -> Option<&EmbeddedImage> {
        match slot {
            ImageSlot::Photo => self.photo.as_ref(),
            ImageSlot::SignatureAn => self.signature_an.as_ref(),
            ImageSlot::SignatureAg => self.signature_ag.as_ref(),
            ImageSlot::Logo => self.logo.as_ref(),
        }
    }

    pub fn set_image(&mut self, slot: ImageSlot, image: EmbeddedImage) {
        let target = match slot {
            ImageSlot::Photo => &mut self.photo,
            ImageSlot::SignatureAn => &mut self.signature_an,
            ImageSlot::SignatureAg => &mut self.signature_ag,
            ImageSlot::Logo => &mut self.logo,
        };
        *target = Some(image);
    }
}
