//! Rendered image with shared lifetime management
//!
//! A [`CanvasImage`] materializes a [`FrameSource`] onto an owned canvas
//! [`Pixmap`]: the first frame is rendered at construction, and for animated
//! sources later frames are re-rendered in place by [`advance_frame`]. The
//! image is meant to be shared (wrapped in `Arc`) between whoever draws it
//! and whoever drives its animation, so its pixel storage is reference
//! counted explicitly: `acquire`/`release` pairs guard use, and the release
//! that drops the count to zero frees the canvas and the decoder
//! (recycle-on-zero). A single mutex serializes count mutation, the
//! recycled state, and canvas access, so an acquire can never race a
//! zero-crossing release.
//!
//! Redraw interest is registered through an id-keyed callback registry with
//! explicit unregistration; notification snapshots the registry and invokes
//! the callbacks outside the state lock, so a callback may draw the image or
//! unregister itself without deadlocking.
//!
//! [`advance_frame`]: CanvasImage::advance_frame

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::graphics::blit::{BlitRequest, Blitter};
use crate::graphics::color::Rgba;
use crate::graphics::pixmap::Pixmap;
use crate::image::source::FrameSource;

/// Callback invoked after the canvas content changes.
pub type InvalidateFn = Arc<dyn Fn() + Send + Sync>;

/// Handle identifying one registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u32);

/// Pixel storage and decoder, guarded together with the reference count.
struct ImageState {
    /// `None` once recycled
    canvas: Option<Pixmap>,
    /// Kept only while animated; still sources are dropped after the
    /// initial render
    source: Option<Box<dyn FrameSource>>,
    references: i32,
}

#[derive(Default)]
struct CallbackRegistry {
    next_id: u32,
    entries: HashMap<u32, InvalidateFn>,
}

/// An image rendered onto an owned canvas, shareable across threads.
pub struct CanvasImage {
    width: u32,
    height: u32,
    opaque: bool,
    frame_count: usize,
    byte_count: usize,
    blitter: Blitter,
    state: Mutex<ImageState>,
    callbacks: Mutex<CallbackRegistry>,
    animating: AtomicBool,
}

impl CanvasImage {
    /// Render the source's current frame onto a fresh canvas.
    ///
    /// Animated sources (more than one frame) are retained for later
    /// [`advance_frame`] calls; still sources are dropped here, their pixels
    /// living on in the canvas.
    ///
    /// [`advance_frame`]: CanvasImage::advance_frame
    pub fn new(source: Box<dyn FrameSource>) -> Result<Self> {
        let width = source.width();
        let height = source.height();
        let mut canvas =
            Pixmap::new(width, height).context("Failed to allocate image canvas")?;

        let blitter = Blitter::new();
        blitter.blit(
            &mut canvas,
            source.frame(),
            &BlitRequest::full_frame(width, height),
            None,
        );

        let opaque = source.is_opaque();
        let frame_count = source.frame_count();
        let byte_count = source.byte_count();

        Ok(Self {
            width,
            height,
            opaque,
            frame_count,
            byte_count,
            blitter,
            state: Mutex::new(ImageState {
                canvas: Some(canvas),
                source: if frame_count > 1 { Some(source) } else { None },
                references: 0,
            }),
            callbacks: Mutex::new(CallbackRegistry::default()),
            animating: AtomicBool::new(false),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Size of the decoded source data in bytes
    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    pub fn is_animated(&self) -> bool {
        self.frame_count > 1
    }

    /// Whether an animation driver currently runs this image
    pub fn is_running(&self) -> bool {
        self.animating.load(Ordering::Acquire)
    }

    // ==========================================================================
    // Lifetime
    // ==========================================================================

    /// Take a reference on the pixel storage.
    ///
    /// Returns false when the image has already been recycled; the caller
    /// must not use the image in that case.
    pub fn acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.canvas.is_none() {
            return false;
        }
        state.references += 1;
        true
    }

    /// Drop a reference. When the count reaches zero the canvas and any
    /// retained decoder are freed; the image stays recycled forever after.
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.references -= 1;
        if state.references <= 0 && state.canvas.is_some() {
            log::debug!("recycling {}x{} image", self.width, self.height);
            state.canvas = None;
            state.source = None;
        }
    }

    pub fn is_recycled(&self) -> bool {
        self.state.lock().canvas.is_none()
    }

    // ==========================================================================
    // Drawing
    // ==========================================================================

    /// Blit the whole canvas into `dst` at (x, y).
    ///
    /// Returns false (drawing nothing) once the image is recycled.
    pub fn draw(&self, dst: &mut Pixmap, x: i32, y: i32) -> bool {
        let req = BlitRequest::new(0, 0, x, y, self.width as i32, self.height as i32);
        self.draw_region(dst, &req, None)
    }

    /// Blit a region of the canvas into `dst` under full [`BlitRequest`]
    /// control (offsets, downsampling ratio, backfill).
    pub fn draw_region(&self, dst: &mut Pixmap, req: &BlitRequest, fill: Option<Rgba>) -> bool {
        let state = self.state.lock();
        let Some(canvas) = state.canvas.as_ref() else {
            return false;
        };
        self.blitter.blit(dst, canvas, req, fill);
        true
    }

    // ==========================================================================
    // Invalidation callbacks
    // ==========================================================================

    /// Register a redraw callback. The returned id unregisters it.
    pub fn add_callback(&self, callback: impl Fn() + Send + Sync + 'static) -> CallbackId {
        let mut registry = self.callbacks.lock();
        let id = registry.next_id;
        registry.next_id = registry.next_id.wrapping_add(1);
        registry.entries.insert(id, Arc::new(callback));
        CallbackId(id)
    }

    /// Unregister a callback. Returns false when the id is unknown (already
    /// removed).
    pub fn remove_callback(&self, id: CallbackId) -> bool {
        self.callbacks.lock().entries.remove(&id.0).is_some()
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.lock().entries.len()
    }

    // ==========================================================================
    // Animation
    // ==========================================================================

    /// Display duration of the current frame, or `None` when the image is
    /// recycled or not animated.
    pub fn frame_delay(&self) -> Option<Duration> {
        let state = self.state.lock();
        if state.canvas.is_none() {
            return None;
        }
        state.source.as_ref().map(|source| source.delay())
    }

    /// Advance to the next frame, re-render the canvas, and notify
    /// callbacks.
    ///
    /// Returns false (and skips the re-render) when the image is recycled,
    /// not animated, or nobody is registered to observe the update; an
    /// animation driver treats that as its stop signal.
    pub fn advance_frame(&self) -> bool {
        let snapshot: Vec<InvalidateFn> = {
            let mut state = self.state.lock();
            let state = &mut *state;
            let (Some(canvas), Some(source)) = (state.canvas.as_mut(), state.source.as_mut())
            else {
                return false;
            };

            source.advance();

            let snapshot: Vec<InvalidateFn> =
                self.callbacks.lock().entries.values().cloned().collect();
            if snapshot.is_empty() {
                return false;
            }

            self.blitter.blit(
                canvas,
                source.frame(),
                &BlitRequest::full_frame(self.width, self.height),
                None,
            );
            snapshot
        };

        for callback in &snapshot {
            callback();
        }
        true
    }

    /// Mark this image as animation-driven. Fails when a driver already
    /// claimed it.
    pub(crate) fn begin_animation(&self) -> bool {
        self.animating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_animation(&self) {
        self.animating.store(false, Ordering::Release);
    }
}
