//! Pixel buffer, color, and blit primitives.

pub mod blit;
pub mod color;
pub mod pixmap;

pub use blit::{BlitRequest, Blitter, ClampedRegion};
pub use color::{ByteOrder, Rgba};
pub use pixmap::{Pixmap, PixmapError};
