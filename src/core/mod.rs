//! Core types and geometry.
//!
//! This module contains the fundamental types used throughout the crate:
//! - [`ResizeOptions`] / [`FitMode`]: caller-facing resize configuration
//! - [`DecodedFrame`]: an RGBA pixel buffer with dimensions
//! - [`ResizeRect`] / [`calc_resize_rect`]: fit/crop/letterbox geometry
//! - [`BitmapDecoder`] / [`RasterSurface`]: host collaborator interfaces

mod geometry;
mod traits;
mod types;

pub use geometry::{calc_resize_rect, ResizeRect};
pub use traits::{BitmapDecoder, RasterSurface};
pub use types::{DecodeOptions, DecodedFrame, FitMode, ResizeOptions};
