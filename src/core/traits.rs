//! Narrow interfaces to the host-provided decode/draw collaborators.
//!
//! The crate never touches codec internals or drawing primitives; it
//! composes them through these traits.

use crate::core::geometry::ResizeRect;
use crate::core::types::DecodedFrame;
use crate::utils::PixelResult;

/// Decodes encoded image bytes into a full-size RGBA frame.
pub trait BitmapDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> PixelResult<DecodedFrame>;
}

/// An off-screen raster surface used as a scratch buffer for resize draws.
///
/// Implementations own the pixel storage; the pipeline only ever resizes
/// the surface to the target dimensions, draws one frame through a
/// [`ResizeRect`], and reads the result back.
pub trait RasterSurface: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Resize the backing store, clearing any previous contents.
    fn resize(&mut self, width: u32, height: u32) -> PixelResult<()>;

    /// Draw the `rect.s*` region of `frame` into the `rect.d*` region of
    /// this surface, scaling as needed.
    fn draw(&mut self, frame: &DecodedFrame, rect: &ResizeRect) -> PixelResult<()>;

    /// Read the surface contents back as an RGBA frame.
    fn read_pixels(&self) -> PixelResult<DecodedFrame>;
}
