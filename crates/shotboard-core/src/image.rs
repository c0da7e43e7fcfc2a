//! Image references for captured screenshots.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

/// Image format of captured image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    /// PNG format.
    Png,
    /// JPEG format.
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Get MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
        }
    }

    /// Detect format from a MIME type.
    #[cfg(test)]
    pub(crate) fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.to_lowercase().as_str() {
            "image/png" => Some(ImageFormat::Png),
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Detect format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }

        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Some(ImageFormat::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(ImageFormat::WebP);
        }

        None
    }
}

/// Opaque reference to the pixel data of a screenshot.
///
/// Captured images are held as `data:` URLs. The same string is the identity a
/// rendering surface reports for a mounted image, so two references are the
/// same image exactly when their strings are equal. An empty reference marks a
/// record whose pixels have not been hydrated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    /// An unhydrated reference.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Encode raw image bytes as a `data:` URL.
    ///
    /// Bytes with unrecognised magic are labelled as PNG, the format the
    /// capture primitive produces.
    pub fn from_bytes(data: &[u8]) -> Self {
        let format = ImageFormat::from_magic_bytes(data).unwrap_or(ImageFormat::Png);
        Self(format!(
            "data:{};base64,{}",
            format.mime_type(),
            STANDARD.encode(data)
        ))
    }

    /// Wrap an identity string reported by a surface.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// MIME type declared by a `data:` URL.
    pub fn mime_type(&self) -> Option<&str> {
        let rest = self.0.strip_prefix("data:")?;
        let end = rest.find([';', ','])?;
        (end > 0).then(|| &rest[..end])
    }

    #[cfg(test)]
    pub(crate) fn format(&self) -> Option<ImageFormat> {
        self.mime_type().and_then(ImageFormat::from_mime_type)
    }

    /// Decode the pixel bytes of a base64 `data:` URL.
    #[cfg(test)]
    pub(crate) fn decode(&self) -> Option<Vec<u8>> {
        let (header, payload) = self.0.strip_prefix("data:")?.split_once(',')?;
        if !header.ends_with(";base64") {
            return None;
        }
        STANDARD.decode(payload).ok()
    }

    /// Short form for log lines.
    pub fn abbreviated(&self) -> String {
        match self.mime_type() {
            Some(mime) => format!("<{} {} chars>", mime, self.0.len()),
            None if self.0.chars().count() > 32 => {
                format!("{}…", self.0.chars().take(32).collect::<String>())
            }
            None => self.0.clone(),
        }
    }
}
