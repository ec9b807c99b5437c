//! Frame-advance driver for animated images
//!
//! An [`AnimationDriver`] owns a timer thread that waits out each frame's
//! delay, advances the image, and lets [`CanvasImage::advance_frame`] handle
//! re-render and notification. The wait is condvar-interruptible, so
//! [`stop`] (and drop) cancels promptly instead of sleeping out the current
//! delay. The loop also ends on its own when the image is recycled or the
//! last callback is unregistered; a driver with no observers has nothing
//! to do.
//!
//! One driver per image: operations for one animated image (advance, copy,
//! notify) all run on its single driver thread, so they are serialized
//! relative to each other.
//!
//! [`stop`]: AnimationDriver::stop

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::image::bitmap::CanvasImage;

/// Errors from starting an animation driver
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnimationError {
    #[error("Image has only one frame")]
    NotAnimated,

    #[error("Image has been recycled")]
    Recycled,

    #[error("Image is already animation-driven")]
    AlreadyRunning,

    #[error("Failed to spawn animation thread: {0}")]
    SpawnFailed(String),
}

/// Cancellation latch shared between the driver handle and its thread.
#[derive(Debug)]
struct Cancel {
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl Cancel {
    fn new() -> Self {
        Self {
            stopped: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Wait out `delay` unless cancelled first. Returns true when cancelled.
    fn wait(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.cond.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }

    fn cancel(&self) {
        *self.stopped.lock() = true;
        self.cond.notify_all();
    }
}

/// Cancellable timer task advancing one animated [`CanvasImage`].
///
/// Created running via [`AnimationDriver::start`]; stopped explicitly with
/// [`AnimationDriver::stop`] or implicitly on drop.
#[derive(Debug)]
pub struct AnimationDriver {
    cancel: Arc<Cancel>,
    handle: Option<JoinHandle<()>>,
}

impl AnimationDriver {
    /// Claim `image` and start its frame-advance thread.
    pub fn start(image: Arc<CanvasImage>) -> Result<Self, AnimationError> {
        if !image.is_animated() {
            return Err(AnimationError::NotAnimated);
        }
        if image.is_recycled() {
            return Err(AnimationError::Recycled);
        }
        if !image.begin_animation() {
            return Err(AnimationError::AlreadyRunning);
        }

        let cancel = Arc::new(Cancel::new());
        let thread_cancel = Arc::clone(&cancel);
        let thread_image = Arc::clone(&image);
        let spawn_result = thread::Builder::new()
            .name("tileblit-anim".to_string())
            .spawn(move || {
                run_loop(&thread_image, &thread_cancel);
                thread_image.end_animation();
            });

        match spawn_result {
            Ok(handle) => Ok(Self {
                cancel,
                handle: Some(handle),
            }),
            Err(err) => {
                image.end_animation();
                Err(AnimationError::SpawnFailed(err.to_string()))
            }
        }
    }

    /// Cancel the timer and wait for the thread to exit. Idempotent.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("animation thread panicked");
            }
        }
    }

    /// Whether the driver thread is still alive. The thread exits on its
    /// own when the image is recycled or loses its last callback.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }
}

impl Drop for AnimationDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(image: &CanvasImage, cancel: &Cancel) {
    log::debug!("animation driver started");
    loop {
        let Some(delay) = image.frame_delay() else {
            break;
        };
        if cancel.wait(delay) {
            break;
        }
        if !image.advance_frame() {
            break;
        }
    }
    log::debug!("animation driver exiting");
}
