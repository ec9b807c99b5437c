//! Blit engine: clamped rectangular copy with integer box downsampling
//!
//! Copies a region of a source [`Pixmap`] into a destination [`Pixmap`],
//! optionally shrinking it by an integer ratio (one output pixel per
//! `ratio x ratio` source block, box-averaged per channel) and optionally
//! painting every destination cell the copy does not touch with a fill
//! color. The entry point is total: any combination of offsets, extents and
//! ratio, however negative, oversized, or degenerate, terminates and leaves the
//! destination fully defined. Out-of-range geometry is clipped, and a
//! request that clips down to nothing falls back to filling the whole
//! destination when a fill color is given.
//!
//! Key concepts:
//! - [`BlitRequest`]: caller-supplied geometry, all fields signed
//! - [`ClampedRegion`]: validated geometry; only the clamper can build one
//! - [`Blitter`]: carries the byte order used to encode fill colors

use crate::graphics::color::{ByteOrder, Rgba};
use crate::graphics::pixmap::Pixmap;

// ==============================================================================
// Blit Request
// ==============================================================================

/// Geometry of one blit: which source rectangle lands where on the canvas.
///
/// All fields are signed; negative offsets and extents larger than either
/// buffer are legal and get clipped. `ratio` is the number of source pixels
/// per destination pixel on each axis, so a `width x height` source region
/// covers `width/ratio x height/ratio` destination pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlitRequest {
    /// Top-left of the region in the source buffer, in source pixels
    pub src_x: i32,
    pub src_y: i32,
    /// Top-left of the landing position, in destination pixels
    pub dst_x: i32,
    pub dst_y: i32,
    /// Extent of the region, in source pixels
    pub width: i32,
    pub height: i32,
    /// Source pixels per destination pixel, per axis
    pub ratio: i32,
}

impl BlitRequest {
    /// Describe a region transfer at the given offsets.
    pub fn new(src_x: i32, src_y: i32, dst_x: i32, dst_y: i32, width: i32, height: i32) -> Self {
        Self {
            src_x,
            src_y,
            dst_x,
            dst_y,
            width,
            height,
            ratio: 1,
        }
    }

    /// A whole-frame transfer at origin, no downsampling.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self::new(0, 0, 0, 0, width as i32, height as i32)
    }

    /// Set the downsampling ratio.
    pub fn with_ratio(mut self, ratio: i32) -> Self {
        self.ratio = ratio;
        self
    }
}

// ==============================================================================
// Geometry Clamper
// ==============================================================================

/// Round `num` down to a multiple of `multiple`.
#[inline]
fn floor_multiple(num: i64, multiple: i64) -> i64 {
    num - num % multiple
}

/// Round `num` up to a multiple of `multiple`. Callers pass `num > 0`.
#[inline]
fn ceil_multiple(num: i64, multiple: i64) -> i64 {
    let rem = num % multiple;
    if rem == 0 {
        num
    } else {
        num - rem + multiple
    }
}

/// A blit rectangle that has been validated against both buffers.
///
/// Only [`ClampedRegion::compute`] constructs one, so holding a value is
/// proof of the clamping invariants: `width` and `height` are positive exact
/// multiples of `ratio`, every offset is non-negative, the source rectangle
/// fits inside the source buffer, and the `width/ratio x height/ratio`
/// output rectangle fits inside the destination buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClampedRegion {
    src_x: u32,
    src_y: u32,
    dst_x: u32,
    dst_y: u32,
    width: u32,
    height: u32,
    ratio: u32,
}

impl ClampedRegion {
    /// Clip a request against the source and destination extents.
    ///
    /// Returns `None` when nothing of the request survives clipping: a
    /// non-positive ratio, an extent too small to hold one `ratio`-sized
    /// block, or a rectangle entirely off either buffer. Invalid geometry is
    /// an expected input (a decoder tile may fall fully off-canvas), so this
    /// never panics and never errors.
    ///
    /// Every clipping step moves offsets by whole multiples of `ratio`, so
    /// averaging block boundaries always line up with whole output pixels;
    /// clipping can never leave a fractional block. Arithmetic is done in
    /// i64 so no i32 input combination can overflow.
    pub fn compute(
        req: &BlitRequest,
        src_w: u32,
        src_h: u32,
        dst_w: u32,
        dst_h: u32,
    ) -> Option<Self> {
        let ratio = i64::from(req.ratio);
        if ratio <= 0 {
            return None;
        }

        // Whole blocks only
        let mut width = floor_multiple(i64::from(req.width), ratio);
        let mut height = floor_multiple(i64::from(req.height), ratio);
        if ratio > width || ratio > height {
            return None;
        }

        let mut src_x = i64::from(req.src_x);
        let mut src_y = i64::from(req.src_y);
        let mut dst_x = i64::from(req.dst_x);
        let mut dst_y = i64::from(req.dst_y);
        let src_w = i64::from(src_w);
        let src_h = i64::from(src_h);
        let dst_w = i64::from(dst_w);
        let dst_h = i64::from(dst_h);

        // Bring the horizontal origin on-buffer
        if src_x < 0 {
            let shift = ceil_multiple(-src_x, ratio);
            src_x += shift;
            dst_x += shift / ratio;
            width -= shift;
        }
        if dst_x < 0 {
            let shift = -dst_x * ratio;
            src_x += shift;
            dst_x = 0;
            width -= shift;
        }
        if width <= 0 {
            return None;
        }

        // Bring the vertical origin on-buffer
        if src_y < 0 {
            let shift = ceil_multiple(-src_y, ratio);
            src_y += shift;
            dst_y += shift / ratio;
            height -= shift;
        }
        if dst_y < 0 {
            let shift = -dst_y * ratio;
            src_y += shift;
            dst_y = 0;
            height -= shift;
        }
        if height <= 0 {
            return None;
        }

        // Clip the trailing horizontal edge
        let overflow = src_x + width - src_w;
        if overflow > 0 {
            width -= ceil_multiple(overflow, ratio);
        }
        let overflow = dst_x + width / ratio - dst_w;
        if overflow > 0 {
            width -= overflow * ratio;
        }
        if width <= 0 {
            return None;
        }

        // Clip the trailing vertical edge
        let overflow = src_y + height - src_h;
        if overflow > 0 {
            height -= ceil_multiple(overflow, ratio);
        }
        let overflow = dst_y + height / ratio - dst_h;
        if overflow > 0 {
            height -= overflow * ratio;
        }
        if height <= 0 {
            return None;
        }

        // Everything is now bounded by a buffer extent, so u32 is exact.
        Some(Self {
            src_x: src_x as u32,
            src_y: src_y as u32,
            dst_x: dst_x as u32,
            dst_y: dst_y as u32,
            width: width as u32,
            height: height as u32,
            ratio: ratio as u32,
        })
    }

    pub fn src_x(&self) -> u32 {
        self.src_x
    }

    pub fn src_y(&self) -> u32 {
        self.src_y
    }

    pub fn dst_x(&self) -> u32 {
        self.dst_x
    }

    pub fn dst_y(&self) -> u32 {
        self.dst_y
    }

    /// Clamped extent, in source pixels. Always a multiple of `ratio`.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Clamped extent, in source pixels. Always a multiple of `ratio`.
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn ratio(&self) -> u32 {
        self.ratio
    }

    /// Width of the written destination rectangle, in destination pixels.
    pub fn out_width(&self) -> u32 {
        self.width / self.ratio
    }

    /// Height of the written destination rectangle, in destination pixels.
    pub fn out_height(&self) -> u32 {
        self.height / self.ratio
    }
}

// ==============================================================================
// Box Averager
// ==============================================================================

/// Fold one sample into a running per-channel mean.
///
/// The pair (`quot`, `rem`) tracks the division incrementally: after every
/// sample, `quot` holds floor(partial_sum / count) and `rem` the carry, kept
/// below `count`. Summing this way needs no wide accumulator and the final
/// quotient equals floor(sum / count) exactly: truncation, not rounding,
/// which is part of the pixel contract.
#[inline]
fn average_step(sample: u8, count: u64, quot: &mut u8, rem: &mut u64) {
    *quot += (u64::from(sample) / count) as u8;
    *rem += u64::from(sample) % count;
    if *rem >= count {
        *quot += 1;
        *rem -= count;
    }
}

/// Average a `ratio x ratio` block of source cells into one output cell.
///
/// `block` starts at the top-left cell of the block; `stride` is the source
/// row width in cells. The four channel lanes are processed independently
/// and identically, so this works on the in-memory byte order without caring
/// which channel sits in which lane.
#[inline]
fn box_average(block: &[u32], stride: usize, ratio: usize) -> u32 {
    let count = (ratio as u64) * (ratio as u64);
    let mut quot = [0u8; 4];
    let mut rem = [0u64; 4];

    for row in 0..ratio {
        for col in 0..ratio {
            let bytes = block[row * stride + col].to_ne_bytes();
            for lane in 0..4 {
                average_step(bytes[lane], count, &mut quot[lane], &mut rem[lane]);
            }
        }
    }

    u32::from_ne_bytes(quot)
}

// ==============================================================================
// Pixel Copier
// ==============================================================================

/// Produce one destination row from one band of `ratio` source rows.
///
/// `src` starts at the first cell of the band; `dst` starts at the first
/// destination cell of the row. Ratio 1 collapses to a bulk copy.
#[inline]
fn copy_row(dst: &mut [u32], src: &[u32], stride: usize, width: usize, ratio: usize) {
    if ratio == 1 {
        dst[..width].copy_from_slice(&src[..width]);
    } else {
        for px in 0..width / ratio {
            dst[px] = box_average(&src[px * ratio..], stride, ratio);
        }
    }
}

/// Copy a clamped region row by row, filling the gaps as it goes.
///
/// With a fill cell, one pass leaves every destination cell defined: the run
/// before the region start, the `dst_w - width/ratio` trailing cells after
/// each row, and the whole tail after the last row all get the fill value.
fn copy_clamped(
    dst: &mut [u32],
    dst_w: usize,
    src: &[u32],
    src_w: usize,
    region: &ClampedRegion,
    fill: Option<u32>,
) {
    let ratio = region.ratio() as usize;
    let width = region.width() as usize;
    let out_w = region.out_width() as usize;
    let rows = region.out_height() as usize;

    let mut src_pos = region.src_y() as usize * src_w + region.src_x() as usize;
    let src_stride = src_w * ratio;
    let mut dst_pos = region.dst_y() as usize * dst_w + region.dst_x() as usize;

    // Leading gap, then the first row
    if let Some(cell) = fill {
        dst[..dst_pos].fill(cell);
    }
    copy_row(&mut dst[dst_pos..], &src[src_pos..], src_w, width, ratio);
    dst_pos += out_w;
    src_pos += src_stride;

    // Remaining rows, each preceded by the previous row's trailing gap
    let gap = dst_w - out_w;
    for _ in 1..rows {
        if gap != 0 {
            if let Some(cell) = fill {
                dst[dst_pos..dst_pos + gap].fill(cell);
            }
        }
        dst_pos += gap;
        copy_row(&mut dst[dst_pos..], &src[src_pos..], src_w, width, ratio);
        dst_pos += out_w;
        src_pos += src_stride;
    }

    // Everything after the last row
    if let Some(cell) = fill {
        dst[dst_pos..].fill(cell);
    }
}

// ==============================================================================
// Blitter
// ==============================================================================

/// Blit entry point.
///
/// Carries the byte order used to encode fill colors into raw cells; it is
/// fixed at construction and passed along explicitly, never read from global
/// state. The blitter itself is stateless and reentrant; calls are plain
/// bounded computations over the two buffers.
#[derive(Debug, Clone, Copy)]
pub struct Blitter {
    order: ByteOrder,
}

impl Blitter {
    /// A blitter targeting the running platform's byte order.
    pub fn new() -> Self {
        Self {
            order: ByteOrder::native(),
        }
    }

    /// A blitter targeting an explicit byte order (tests, cross builds).
    pub fn with_order(order: ByteOrder) -> Self {
        Self { order }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Copy `req`'s region from `src` into `dst`.
    ///
    /// With `fill`, every destination cell outside the copied region is
    /// painted with that color (converted to a native cell once, up front).
    /// If clipping leaves nothing to copy, the whole destination is filled
    /// instead so the canvas is never left stale; without `fill` a clipped-
    /// away request leaves `dst` untouched.
    pub fn blit(&self, dst: &mut Pixmap, src: &Pixmap, req: &BlitRequest, fill: Option<Rgba>) {
        let fill_cell = fill.map(|color| color.to_cell(self.order));

        match ClampedRegion::compute(req, src.width(), src.height(), dst.width(), dst.height()) {
            Some(region) => {
                let dst_w = dst.width() as usize;
                let src_w = src.width() as usize;
                copy_clamped(dst.cells_mut(), dst_w, src.cells(), src_w, &region, fill_cell);
            }
            None => {
                if let Some(cell) = fill_cell {
                    log::debug!(
                        "blit request {:?} clipped to nothing; filling {}x{} destination",
                        req,
                        dst.width(),
                        dst.height()
                    );
                    dst.fill(cell);
                }
            }
        }
    }
}

impl Default for Blitter {
    fn default() -> Self {
        Self::new()
    }
}
