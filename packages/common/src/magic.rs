//! Magic-byte image format detection.
//!
//! Classifies a byte buffer by its leading bytes so a forged extension or
//! Content-Type header cannot smuggle a non-image past upload validation.

// JPEG: FF D8 FF
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
// PNG: 89 50 4E 47 0D 0A 1A 0A
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
// GIF: "GIF8"
const GIF_MAGIC: &[u8] = b"GIF8";
// BMP: "BM"
const BMP_MAGIC: &[u8] = b"BM";
// WebP: "RIFF" xx xx xx xx "WEBP"
const RIFF_MAGIC: &[u8] = b"RIFF";
const WEBP_MAGIC: &[u8] = b"WEBP";

/// A supported image format with its canonical tag, MIME type and extensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
    Bmp,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 5] = [Self::Jpeg, Self::Png, Self::Gif, Self::Webp, Self::Bmp];

    /// Canonical lowercase format tag stored in image records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
        }
    }

    /// Accepted filename extensions, leading dot included.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Jpeg => &[".jpg", ".jpeg"],
            Self::Png => &[".png"],
            Self::Gif => &[".gif"],
            Self::Webp => &[".webp"],
            Self::Bmp => &[".bmp"],
        }
    }

    /// Extension used when generating object keys, without the dot.
    pub fn primary_extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.mime() == mime)
    }

    /// Resolve a format from a filename extension, with or without the dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        let dotted = if ext.starts_with('.') {
            ext
        } else {
            format!(".{ext}")
        };
        Self::ALL
            .into_iter()
            .find(|f| f.extensions().contains(&dotted.as_str()))
    }

    pub fn is_allowed_mime(mime: &str) -> bool {
        Self::from_mime(mime).is_some()
    }
}

/// Detect the real MIME type from the file header.
///
/// Headers shorter than 4 bytes never match. Returns `None` for anything
/// outside the five supported formats.
pub fn detect_mime(header: &[u8]) -> Option<&'static str> {
    detect_format(header).map(|f| f.mime())
}

/// Detect the image format from the file header.
pub fn detect_format(header: &[u8]) -> Option<ImageFormat> {
    if header.len() < 4 {
        return None;
    }

    if header.starts_with(JPEG_MAGIC) {
        return Some(ImageFormat::Jpeg);
    }

    if header.len() >= 8 && header.starts_with(PNG_MAGIC) {
        return Some(ImageFormat::Png);
    }

    if header.starts_with(GIF_MAGIC) {
        return Some(ImageFormat::Gif);
    }

    // WebP is a RIFF container with "WEBP" at offset 8.
    if header.len() >= 12 && header.starts_with(RIFF_MAGIC) && &header[8..12] == WEBP_MAGIC {
        return Some(ImageFormat::Webp);
    }

    if header.starts_with(BMP_MAGIC) {
        return Some(ImageFormat::Bmp);
    }

    None
}

/// Check whether the header's detected MIME matches the claimed one.
pub fn validate(header: &[u8], claimed_mime: &str) -> bool {
    matches!(detect_mime(header), Some(detected) if detected == claimed_mime)
}

/// Check whether the header belongs to any supported image format.
pub fn is_valid_image(header: &[u8]) -> bool {
    detect_format(header).is_some()
}
