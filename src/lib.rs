//! tileblit: push decoded pixel tiles onto fixed-size canvases.
//!
//! The core is a total blit routine (clamp, copy, integer box downsample,
//! backfill) built for progressive image rendering: a decoder may hand over
//! partially-decoded, arbitrarily-offset, oversized tiles, and the canvas
//! always ends every call in a fully-defined state. On top of it sit a
//! shared, reference-counted [`image::CanvasImage`] and a cancellable
//! [`image::AnimationDriver`] for multi-frame sources.

pub mod graphics;
pub mod image;

pub use graphics::{BlitRequest, Blitter, ByteOrder, ClampedRegion, Pixmap, Rgba};
pub use image::{AnimationDriver, CanvasImage, FrameSource};
