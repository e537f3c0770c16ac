use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

static DATA_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:(image/[A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/]*={0,2})$").unwrap()
});

static IMAGE_MIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^image/[a-z0-9.+-]+$").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum PhotoError {
    #[error("not an image (content type {0:?})")]
    InvalidFileType(String),

    #[error("malformed image data URI")]
    InvalidDataUri,

    #[error("failed to decode image payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),

    #[error("background removal failed: {0}")]
    Enhancement(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw image bytes plus their MIME type
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A captured or uploaded photo, stored as a self-contained base64 data URI.
///
/// Photos have no identity beyond their content: two records are the same
/// photo exactly when their URIs are equal.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoRecord(String);

impl PhotoRecord {
    pub fn from_payload(payload: &ImagePayload) -> Self {
        Self(format!(
            "data:{};base64,{}",
            payload.mime,
            STANDARD.encode(&payload.bytes)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn mime(&self) -> &str {
        DATA_URI
            .captures(&self.0)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or("application/octet-stream")
    }

    pub fn to_payload(&self) -> Result<ImagePayload, PhotoError> {
        let caps = DATA_URI
            .captures(&self.0)
            .ok_or(PhotoError::InvalidDataUri)?;
        let bytes = STANDARD.decode(&caps[2])?;
        Ok(ImagePayload::new(&caps[1], bytes))
    }

    /// File extension matching the record's MIME type
    pub fn extension(&self) -> &'static str {
        match self.mime() {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "img",
        }
    }
}

impl fmt::Debug for PhotoRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhotoRecord({}, {} chars)", self.mime(), self.0.len())
    }
}

/// A file handed to the controller by the upload source
#[derive(Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, deriving its content type from the extension
    /// and falling back to sniffing the leading bytes.
    pub async fn from_path(path: &Path) -> Result<Self, PhotoError> {
        let bytes = tokio::fs::read(path).await?;

        let content_type = image::ImageFormat::from_path(path)
            .or_else(|_| image::guess_format(&bytes))
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self::new(name, content_type, bytes))
    }

    /// Content type without parameters, lowercased (`image/jpeg; q=1` -> `image/jpeg`)
    fn essence(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }

    pub fn is_image(&self) -> bool {
        self.essence().starts_with("image/")
    }

    /// Convert to a payload whose MIME type can be carried in a data URI.
    ///
    /// A declared image type that is not a plain `image/<subtype>` is replaced
    /// by the sniffed format of the bytes.
    pub fn into_payload(self) -> Result<ImagePayload, PhotoError> {
        let essence = self.essence();
        if !essence.starts_with("image/") {
            return Err(PhotoError::InvalidFileType(self.content_type));
        }

        let mime = if IMAGE_MIME.is_match(&essence) {
            essence
        } else {
            match image::guess_format(&self.bytes) {
                Ok(format) => format.to_mime_type().to_string(),
                Err(_) => return Err(PhotoError::InvalidFileType(self.content_type)),
            }
        };

        Ok(ImagePayload::new(mime, self.bytes))
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
