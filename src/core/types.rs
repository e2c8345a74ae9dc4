//! Core types for decode requests and results.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::{ValidationError, PixelResult};

/// Policy governing how a source image maps into a differently-shaped target area.
///
/// Matches the reference resizing library's five fit modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Preserve aspect ratio, crop the source so the target is exactly filled
    #[default]
    Cover,
    /// Preserve aspect ratio, letterbox/pillarbox inside the target
    Contain,
    /// Stretch to the target dimensions, aspect ratio not preserved
    Fill,
    /// Like contain, but never enlarges a source that already fits
    Inside,
    /// Like cover, but skips the resize when the source already covers the target
    Outside,
}

impl FromStr for FitMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cover" => Ok(Self::Cover),
            "contain" => Ok(Self::Contain),
            "fill" => Ok(Self::Fill),
            "inside" => Ok(Self::Inside),
            "outside" => Ok(Self::Outside),
            other => Err(ValidationError::Fit(other.to_string())),
        }
    }
}

/// Target dimensions and fit policy for a decode.
///
/// Dimensions must be positive; construct through [`ResizeOptions::new`]
/// or call [`ResizeOptions::validate`] on deserialized values before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeOptions {
    /// Target width in pixels
    pub width: u32,
    /// Target height in pixels
    pub height: u32,
    /// Fit policy, defaults to cover
    #[serde(default)]
    pub fit: FitMode,
}

impl ResizeOptions {
    pub fn new(width: u32, height: u32, fit: FitMode) -> PixelResult<Self> {
        let options = Self { width, height, fit };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.width == 0 {
            return Err(ValidationError::dimensions("Width cannot be 0"));
        }
        if self.height == 0 {
            return Err(ValidationError::dimensions("Height cannot be 0"));
        }
        Ok(())
    }
}

/// Options controlling a single decode call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Prefer the worker path when a worker pool is configured
    pub prefer_worker: bool,
    /// Optional target geometry; full-size decode when absent
    pub resize: Option<ResizeOptions>,
}

/// A decoded RGBA frame: `pixels.len() == width * height * 4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Expected buffer length for the frame's dimensions.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Whether the pixel buffer matches the declared dimensions.
    pub fn is_consistent(&self) -> bool {
        self.pixels.len() == self.expected_len()
    }
}
