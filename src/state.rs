use crate::auth::AccessGate;
use crate::card::EmbeddedImage;
use crate::codes::CodeCache;
use crate::config::Config;
use genpdf::fonts::{FontData, FontFamily};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gate: Arc<AccessGate>,
    pub codes: Arc<CodeCache>,
    /// `None` when no system font was found; vector export is then unavailable.
    pub fonts: Option<FontFamily<FontData>>,
    /// Logo shown when the form does not upload one.
    pub logo: Option<EmbeddedImage>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let fonts = match crate::pdf::discover_fonts(
            config.font_dir.as_deref(),
            config.font_family.as_deref(),
        ) {
            Ok(fonts) => Some(fonts),
            Err(e) => {
                tracing::warn!(error = %e, "PDF export disabled");
                None
            }
        };
        let logo = load_logo(&config);
        let gate = AccessGate::new(config.access_password.clone(), config.auth_delay);
        if !gate.enabled() {
            tracing::info!("ACCESS_PASSWORD not set; access gate disabled");
        }

        Self {
            config: Arc::new(config),
            gate: Arc::new(gate),
            codes: Arc::new(CodeCache::default()),
            fonts,
            logo,
        }
    }
}

fn load_logo(config: &Config) -> Option<EmbeddedImage> {
    let path = &config.logo_path;
    if !path.is_file() {
        return None;
    }
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read logo");
            return None;
        }
    };
    let name = path.file_name().and_then(|n| n.to_str());
    match EmbeddedImage::from_upload(bytes, None, name) {
        Ok(logo) => Some(logo),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "logo is not an image");
            None
        }
    }
}
