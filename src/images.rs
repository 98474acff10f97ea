//! Image loading for `<img>` elements.
//!
//! A `src` is either a base64 `data:` URI or a local path, resolved against
//! the document's base directory when relative. Remote URLs are never
//! fetched. Every source is loaded at most once; failures are logged and
//! remembered so layout can fall back to the alt text.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("remote images are not fetched: {0}")]
    Remote(String),
    #[error("invalid data URI: {0}")]
    DataUri(String),
    #[error("cannot read image '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode image: {0}")]
    Decode(#[from] ::image::ImageError),
    #[error("image has zero size")]
    Empty,
}

/// Encoded image bytes plus their pixel size.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub bytes: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

/// Cache of loaded images keyed by their `src` attribute.
#[derive(Debug, Default)]
pub struct ImageStore {
    base_dir: Option<PathBuf>,
    images: HashMap<String, LoadedImage>,
    failed: HashSet<String>,
}

impl ImageStore {
    pub fn new(base_dir: Option<&Path>) -> Self {
        Self {
            base_dir: base_dir.map(Path::to_path_buf),
            ..Self::default()
        }
    }

    /// Load `src` if it has not been tried yet. Returns `None` (after a
    /// warning on first failure) when it cannot be used.
    pub fn load(&mut self, src: &str) -> Option<&LoadedImage> {
        if !self.images.contains_key(src) && !self.failed.contains(src) {
            match load_image(src, self.base_dir.as_deref()) {
                Ok(img) => {
                    log::debug!("loaded image {}x{} from {}", img.width_px, img.height_px, preview(src));
                    self.images.insert(src.to_string(), img);
                }
                Err(e) => {
                    log::warn!("Skipping image {}: {e}", preview(src));
                    self.failed.insert(src.to_string());
                }
            }
        }
        self.images.get(src)
    }

    pub fn get(&self, src: &str) -> Option<&LoadedImage> {
        self.images.get(src)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

fn load_image(src: &str, base_dir: Option<&Path>) -> Result<LoadedImage, ImageError> {
    let bytes = if src.starts_with("data:") {
        parse_data_uri(src)?
    } else {
        let path = resolve_local_path(src, base_dir)?;
        fs::read(&path).map_err(|source| ImageError::Read { path, source })?
    };
    let decoded = ::image::load_from_memory(&bytes)?;
    let (width_px, height_px) = (decoded.width(), decoded.height());
    if width_px == 0 || height_px == 0 {
        return Err(ImageError::Empty);
    }
    Ok(LoadedImage {
        bytes,
        width_px,
        height_px,
    })
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
pub fn parse_data_uri(src: &str) -> Result<Vec<u8>, ImageError> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| ImageError::DataUri("missing `data:` prefix".into()))?;
    let comma_pos = rest
        .find(',')
        .ok_or_else(|| ImageError::DataUri("missing `,` between header and data".into()))?;
    let header = &rest[..comma_pos];
    if !header.contains(";base64") {
        return Err(ImageError::DataUri(
            "only base64-encoded data URIs are supported".into(),
        ));
    }
    let b64_data: String = rest[comma_pos + 1..]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    BASE64_STD
        .decode(b64_data)
        .map_err(|e| ImageError::DataUri(format!("base64 decode error: {e}")))
}

/// Map an `src` attribute to a filesystem path.
fn resolve_local_path(src: &str, base_dir: Option<&Path>) -> Result<PathBuf, ImageError> {
    let lower = src.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//") {
        return Err(ImageError::Remote(src.to_string()));
    }
    let raw = src.strip_prefix("file://").unwrap_or(src);
    // Drop any query or fragment and undo the common `%20` escape.
    let raw = raw.split(['?', '#']).next().unwrap_or(raw);
    let path = PathBuf::from(raw.replace("%20", " "));
    Ok(match base_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path,
    })
}

fn preview(src: &str) -> String {
    if src.len() > 60 {
        let cut = (0..=60).rev().find(|&i| src.is_char_boundary(i)).unwrap_or(0);
        format!("{}...", &src[..cut])
    } else {
        src.to_string()
    }
}
