//! Image presentation: canvas-backed images, decoder seam, animation.

pub mod animation;
pub mod bitmap;
pub mod source;

pub use animation::{AnimationDriver, AnimationError};
pub use bitmap::{CallbackId, CanvasImage, InvalidateFn};
pub use source::FrameSource;
