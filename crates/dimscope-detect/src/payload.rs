//! Encoded image bytes as sent to the detection service

use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use dimscope_types::{Error, Result};
use image::ImageReader;

/// Encoded image (JPEG, PNG, ...) together with its MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    mime: String,
}

impl ImagePayload {
    /// Wrap encoded bytes, sniffing the format from the header
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidImage("image data is empty".to_string()));
        }

        let format = image::guess_format(&bytes)
            .map_err(|e| Error::InvalidImage(format!("unrecognized image format: {}", e)))?;

        Ok(Self {
            bytes,
            mime: format.to_mime_type().to_string(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::InvalidImage(format!("{} is not a file", path.display())));
        }
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Decode a `data:<mime>;base64,<payload>` URL
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| Error::InvalidImage("not a data URL".to_string()))?;
        let (header, encoded) = rest
            .split_once(',')
            .ok_or_else(|| Error::InvalidImage("data URL has no payload".to_string()))?;

        if !header.ends_with(";base64") {
            return Err(Error::InvalidImage("data URL is not base64 encoded".to_string()));
        }

        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::InvalidImage(format!("invalid base64: {}", e)))?;
        Self::from_bytes(bytes)
    }

    /// Encode as `data:<mime>;base64,...`, the form the service accepts
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    /// Natural pixel size, read from the header only
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        let reader = ImageReader::new(Cursor::new(&self.bytes)).with_guessed_format()?;
        Ok(reader.into_dimensions()?)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
