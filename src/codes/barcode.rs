use barcoders::sym::code128::Code128;
use barcoders::sym::ean13::EAN13;
use serde::Serialize;
use std::fmt::Write;

/// Code 128 character set B covers printable ASCII.
const CODE128_SET_B: char = '\u{0181}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbology {
    Ean13,
    Code128,
}

/// Thirteen characters means EAN-13, anything else is Code 128.
pub fn select_symbology(value: &str) -> Symbology {
    if value.chars().count() == 13 {
        Symbology::Ean13
    } else {
        Symbology::Code128
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Barcode {
    pub symbology: Symbology,
    /// One entry per module, 1 for a bar and 0 for a space.
    pub modules: Vec<u8>,
}

impl Barcode {
    pub fn encode(value: &str) -> Option<Self> {
        if value.is_empty() {
            return None;
        }
        let symbology = select_symbology(value);
        let modules = match symbology {
            Symbology::Ean13 => {
                if !ean13_check_digit_matches(value) {
                    tracing::debug!(value, "EAN-13 check digit mismatch");
                    return None;
                }
                EAN13::new(&value[..12]).map(|code| code.encode())
            }
            Symbology::Code128 => {
                Code128::new(&format!("{CODE128_SET_B}{value}")).map(|code| code.encode())
            }
        };
        match modules {
            Ok(modules) if !modules.is_empty() => Some(Self { symbology, modules }),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(?symbology, error = ?e, "barcode encoding failed");
                None
            }
        }
    }

    /// Consecutive bar modules as `(first_module, width)` pairs.
    pub fn bar_runs(&self) -> Vec<(usize, usize)> {
        let mut runs = Vec::new();
        let mut start = None;
        for (i, &module) in self.modules.iter().enumerate() {
            match (module, start) {
                (1, None) => start = Some(i),
                (0, Some(s)) => {
                    runs.push((s, i - s));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            runs.push((s, self.modules.len() - s));
        }
        runs
    }

    /// Inline SVG for the preview, one user unit per module.
    pub fn to_svg(&self, height: u32) -> String {
        runs_to_svg(self.modules.len(), &self.bar_runs(), height)
    }
}

/// True when `value` is 13 ASCII digits whose last digit is the EAN check digit.
fn ean13_check_digit_matches(value: &str) -> bool {
    let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 13 || !value.is_ascii() {
        return false;
    }
    let sum: u32 = digits[..12]
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    (10 - sum % 10) % 10 == digits[12]
}

pub fn runs_to_svg(modules: usize, runs: &[(usize, usize)], height: u32) -> String {
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {modules} {height}" preserveAspectRatio="none" class="barcode">"#
    );
    for (x, w) in runs {
        let _ = write!(svg, r#"<rect x="{x}" y="0" width="{w}" height="{height}"/>"#);
    }
    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirteen_characters_select_ean13() {
        assert_eq!(select_symbology("4006381333931"), Symbology::Ean13);
        assert_eq!(select_symbology("ABCDEFGHIJKLM"), Symbology::Ean13);
    }

    #[test]
    fn other_lengths_select_code128() {
        assert_eq!(select_symbology("400638133393"), Symbology::Code128);
        assert_eq!(select_symbology("40063813339310"), Symbology::Code128);
        assert_eq!(select_symbology("A1"), Symbology::Code128);
    }

    #[test]
    fn encodes_valid_ean13() {
        let code = Barcode::encode("4006381333931").unwrap();
        assert_eq!(code.symbology, Symbology::Ean13);
        assert_eq!(code.modules.len(), 95);
    }

    #[test]
    fn non_numeric_ean13_is_cleared() {
        assert!(Barcode::encode("ABCDEFGHIJKLM").is_none());
    }

    #[test]
    fn wrong_check_digit_is_cleared() {
        assert!(ean13_check_digit_matches("4006381333931"));
        assert!(!ean13_check_digit_matches("4006381333932"));
        assert!(Barcode::encode("4006381333932").is_none());
    }

    #[test]
    fn encodes_code128() {
        let code = Barcode::encode("MA-4711").unwrap();
        assert_eq!(code.symbology, Symbology::Code128);
        assert_eq!(code.modules.first(), Some(&1));
    }

    #[test]
    fn unencodable_or_empty_is_cleared() {
        assert!(Barcode::encode("").is_none());
        assert!(Barcode::encode("Größe").is_none());
    }

    #[test]
    fn bar_runs_group_modules() {
        let code = Barcode {
            symbology: Symbology::Code128,
            modules: vec![1, 1, 0, 1, 0, 0, 1, 1, 1],
        };
        assert_eq!(code.bar_runs(), vec![(0, 2), (3, 1), (6, 3)]);
    }

    #[test]
    fn svg_has_one_rect_per_run() {
        let code = Barcode {
            symbology: Symbology::Code128,
            modules: vec![1, 0, 1, 1, 0],
        };
        let svg = code.to_svg(40);
        assert!(svg.contains(r#"viewBox="0 0 5 40""#));
        assert_eq!(svg.matches("<rect").count(), 2);
    }
}
