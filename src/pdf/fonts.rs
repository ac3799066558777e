// genpdf needs real font files for glyph metrics, so look in the usual
// system locations. Install e.g. `apt install fonts-liberation`.
use genpdf::fonts::{FontData, FontFamily};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("no suitable fonts found (searched {searched}); install fonts-liberation or set FONT_DIR")]
    NotFound { searched: String },
    #[error("failed to load font {path}: {source}")]
    Load {
        path: PathBuf,
        source: genpdf::error::Error,
    },
}

const FONT_DIRS: &[&str] = &[
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/truetype/liberation2",
    "/usr/share/fonts/liberation-sans",
    "/usr/share/fonts/TTF",
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/dejavu",
    "/System/Library/Fonts/Supplemental",
    "/Library/Fonts",
];

/// File names of the regular, bold, italic and bold-italic faces.
struct Faces {
    family: &'static str,
    files: [&'static str; 4],
}

const KNOWN_FAMILIES: &[Faces] = &[
    Faces {
        family: "LiberationSans",
        files: [
            "LiberationSans-Regular.ttf",
            "LiberationSans-Bold.ttf",
            "LiberationSans-Italic.ttf",
            "LiberationSans-BoldItalic.ttf",
        ],
    },
    Faces {
        family: "DejaVuSans",
        files: [
            "DejaVuSans.ttf",
            "DejaVuSans-Bold.ttf",
            "DejaVuSans-Oblique.ttf",
            "DejaVuSans-BoldOblique.ttf",
        ],
    },
    Faces {
        family: "Arial",
        files: ["Arial.ttf", "Arial Bold.ttf", "Arial Italic.ttf", "Arial Bold Italic.ttf"],
    },
];

fn family_files(family: &str) -> [String; 4] {
    KNOWN_FAMILIES
        .iter()
        .find(|faces| faces.family == family)
        .map(|faces| faces.files.map(str::to_string))
        .unwrap_or_else(|| {
            ["Regular", "Bold", "Italic", "BoldItalic"].map(|style| format!("{family}-{style}.ttf"))
        })
}

fn load_face(path: PathBuf) -> Result<FontData, FontError> {
    FontData::load(&path, None).map_err(|source| FontError::Load { path, source })
}

fn load_from(dir: &Path, files: &[String; 4]) -> Option<Result<FontFamily<FontData>, FontError>> {
    if !files.iter().all(|file| dir.join(file).is_file()) {
        return None;
    }
    Some(load_family(dir, files))
}

fn load_family(dir: &Path, files: &[String; 4]) -> Result<FontFamily<FontData>, FontError> {
    let [regular, bold, italic, bold_italic] = files.clone().map(|file| dir.join(file));
    Ok(FontFamily {
        regular: load_face(regular)?,
        bold: load_face(bold)?,
        italic: load_face(italic)?,
        bold_italic: load_face(bold_italic)?,
    })
}

/// Finds a sans-serif family. An explicit directory and family name win
/// over the built-in search list.
pub fn discover(
    font_dir: Option<&Path>,
    family: Option<&str>,
) -> Result<FontFamily<FontData>, FontError> {
    let families: Vec<[String; 4]> = match family {
        Some(name) => vec![family_files(name)],
        None => KNOWN_FAMILIES
            .iter()
            .map(|faces| faces.files.map(str::to_string))
            .collect(),
    };
    let dirs: Vec<PathBuf> = match font_dir {
        Some(dir) => vec![dir.to_path_buf()],
        None => FONT_DIRS.iter().map(PathBuf::from).collect(),
    };

    for dir in &dirs {
        for files in &families {
            if let Some(loaded) = load_from(dir, files) {
                let fonts = loaded?;
                tracing::info!(dir = %dir.display(), regular = %files[0], "loaded PDF fonts");
                return Ok(fonts);
            }
        }
    }

    Err(FontError::NotFound {
        searched: dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })
}
