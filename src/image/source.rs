//! Decoder seam
//!
//! Decoding is not this crate's business: a [`FrameSource`] is whatever
//! produces decoded pixel data and frame timing: a GIF decoder, a test
//! fixture, a network stream. [`crate::image::CanvasImage`] consumes one to
//! materialize frames onto its canvas.

use std::time::Duration;

use crate::graphics::pixmap::Pixmap;

/// A supplier of decoded image frames.
///
/// Implementations hold the decoder state. `frame` exposes the pixels of the
/// current frame as a [`Pixmap`] the size of the image; `advance` moves to
/// the next frame, wrapping at the end. For still images `frame_count` is 1
/// and `advance` is a no-op.
pub trait FrameSource: Send {
    /// Image width in pixels
    fn width(&self) -> u32;

    /// Image height in pixels
    fn height(&self) -> u32;

    /// Number of frames; 1 for a still image
    fn frame_count(&self) -> usize;

    /// Whether every pixel of every frame is fully opaque
    fn is_opaque(&self) -> bool {
        false
    }

    /// Size of the decoded data in bytes
    fn byte_count(&self) -> usize {
        self.width() as usize * self.height() as usize * 4
    }

    /// Display duration of the current frame
    fn delay(&self) -> Duration;

    /// Move to the next frame, wrapping after the last
    fn advance(&mut self);

    /// Pixel data of the current frame
    fn frame(&self) -> &Pixmap;
}
