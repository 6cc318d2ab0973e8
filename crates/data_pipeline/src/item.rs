use anyhow::{bail, Result};

/// A single in-memory payload flowing through the pipeline.
///
/// Items are produced by a loader, optionally rewritten by a processor, and
/// handed to the consumer inside a [`Batch`](crate::Batch). Each variant owns
/// its data outright, so an item has exactly one holder at any point in the
/// pipeline; `Clone` performs a deep copy at the variant level.
///
/// New payload kinds are added by extending this enum; stages that only move
/// items around do not match on the variant at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataItem {
    /// Decoded raster image, row-major, channels interleaved.
    Image {
        width: u32,
        height: u32,
        channels: u32,
        pixels: Vec<u8>,
    },
    /// UTF-8 text payload.
    Text(String),
    /// Raw bytes the pipeline does not interpret.
    Opaque(Vec<u8>),
}

impl DataItem {
    /// Creates an image item, checking that the buffer matches the claimed
    /// geometry (`pixels.len() == width * height * channels`).
    pub fn image(width: u32, height: u32, channels: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * channels as usize;
        if pixels.len() != expected {
            bail!(
                "image buffer is {} bytes, expected {} for {}x{}x{}",
                pixels.len(),
                expected,
                width,
                height,
                channels
            );
        }
        Ok(Self::Image {
            width,
            height,
            channels,
            pixels,
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn opaque(bytes: Vec<u8>) -> Self {
        Self::Opaque(bytes)
    }

    /// Size of the payload in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Image { pixels, .. } => pixels.len(),
            Self::Text(text) => text.len(),
            Self::Opaque(bytes) => bytes.len(),
        }
    }

    /// Variant name, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image { .. } => "image",
            Self::Text(_) => "text",
            Self::Opaque(_) => "opaque",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Opaque(bytes) => Some(bytes),
            _ => None,
        }
    }
}
