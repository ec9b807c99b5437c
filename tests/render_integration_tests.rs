//! End-to-end tests for the blit pipeline: progressive tile pushes, clamp
//! behavior over arbitrary geometry, downsampling against a naive
//! reference, and canvas-image presentation flows.

use proptest::prelude::*;
use rstest::rstest;

use tileblit::{BlitRequest, Blitter, ByteOrder, ClampedRegion, Pixmap, Rgba};

fn cell(r: u8, g: u8, b: u8, a: u8) -> u32 {
    u32::from_ne_bytes([r, g, b, a])
}

// ==============================================================================
// Progressive rendering scenarios
// ==============================================================================

#[test]
fn progressive_tile_push_backfills_canvas() {
    let blitter = Blitter::new();
    let fill = Rgba::new(0, 0, 0, 255);
    let fill_cell = fill.to_cell(blitter.byte_order());
    let mut canvas = Pixmap::new(8, 6).unwrap();

    // First pass: only the top two rows are decoded so far. The rest of the
    // canvas must come out as background, not stale zeroes.
    let band = Pixmap::from_cells(8, 2, vec![7; 16]).unwrap();
    blitter.blit(
        &mut canvas,
        &band,
        &BlitRequest::new(0, 0, 0, 0, 8, 2),
        Some(fill),
    );
    for y in 0..6 {
        for x in 0..8 {
            let expected = if y < 2 { 7 } else { fill_cell };
            assert_eq!(canvas.cell_at(x, y), Some(expected), "cell ({x},{y})");
        }
    }

    // Second pass: the remaining rows arrive and land at their offset. No
    // backfill needed; the earlier rows stay.
    let rest = Pixmap::from_cells(8, 4, vec![9; 32]).unwrap();
    blitter.blit(&mut canvas, &rest, &BlitRequest::new(0, 0, 0, 2, 8, 4), None);
    for y in 0..6 {
        for x in 0..8 {
            let expected = if y < 2 { 7 } else { 9 };
            assert_eq!(canvas.cell_at(x, y), Some(expected), "cell ({x},{y})");
        }
    }
}

#[test]
fn oversized_tile_downsamples_onto_small_canvas() {
    // A 12x12 tile at ratio 3 covers a 4x4 output; pushed at (-1,-1) in
    // destination pixels only a 3x3 window survives, shifted one block into
    // the source.
    let cells: Vec<u32> = (0..144).map(|i| cell((i % 251) as u8, 0, 0, 255)).collect();
    let src = Pixmap::from_cells(12, 12, cells).unwrap();
    let mut dst = Pixmap::new(3, 3).unwrap();

    let req = BlitRequest::new(0, 0, -1, -1, 12, 12).with_ratio(3);
    let region = ClampedRegion::compute(&req, 12, 12, 3, 3).unwrap();
    assert_eq!((region.src_x(), region.src_y()), (3, 3));
    assert_eq!((region.dst_x(), region.dst_y()), (0, 0));
    assert_eq!((region.out_width(), region.out_height()), (3, 3));

    Blitter::new().blit(&mut dst, &src, &req, None);
    // Spot-check one output pixel against a hand-computed block mean.
    let mut sum = 0u32;
    for y in 3..6 {
        for x in 3..6 {
            sum += u32::from(src.cell_at(x, y).unwrap().to_ne_bytes()[0]);
        }
    }
    let expected = (sum / 9) as u8;
    assert_eq!(dst.cell_at(0, 0).unwrap().to_ne_bytes()[0], expected);
}

#[test]
fn fill_color_respects_simulated_byte_order() {
    let fill = Rgba::new(0x11, 0x22, 0x33, 0x44);
    let src = Pixmap::from_cells(2, 2, vec![0; 4]).unwrap();

    for order in [ByteOrder::Little, ByteOrder::Big] {
        let blitter = Blitter::with_order(order);
        let mut dst = Pixmap::new(2, 2).unwrap();
        // Off-buffer request: whole destination becomes fill color.
        let req = BlitRequest::new(10, 10, 0, 0, 2, 2);
        blitter.blit(&mut dst, &src, &req, Some(fill));
        assert!(dst.cells().iter().all(|&c| c == fill.to_cell(order)));
        assert_eq!(Rgba::from_cell(dst.cell_at(0, 0).unwrap(), order), fill);
    }
}

// ==============================================================================
// Clamp cases
// ==============================================================================

#[rstest]
// identity: request matches both buffers exactly
#[case(BlitRequest::new(0, 0, 0, 0, 8, 8), (8, 8), (8, 8), Some((0, 0, 0, 0, 8, 8)))]
// extents truncate down to ratio multiples
#[case(BlitRequest::new(0, 0, 0, 0, 7, 5).with_ratio(2), (8, 8), (8, 8), Some((0, 0, 0, 0, 6, 4)))]
// negative source offset rounds up to a block boundary
#[case(BlitRequest::new(-3, 0, 0, 0, 8, 2).with_ratio(2), (8, 8), (8, 8), Some((1, 0, 2, 0, 4, 2)))]
// the worked negative-destination example
#[case(BlitRequest::new(0, 0, -1, 0, 4, 2).with_ratio(2), (10, 10), (10, 10), Some((2, 0, 0, 0, 2, 2)))]
// trailing edges clip against both buffers
#[case(BlitRequest::new(4, 0, 0, 3, 6, 8).with_ratio(2), (8, 8), (4, 4), Some((4, 0, 0, 3, 4, 2)))]
// degenerate: off-buffer, zero ratio, too-small extent
#[case(BlitRequest::new(100, 0, 0, 0, 8, 8), (8, 8), (8, 8), None)]
#[case(BlitRequest::new(0, 0, 0, 0, 8, 8).with_ratio(0), (8, 8), (8, 8), None)]
#[case(BlitRequest::new(0, 0, 0, 0, 3, 8).with_ratio(4), (8, 8), (8, 8), None)]
fn clamp_cases(
    #[case] req: BlitRequest,
    #[case] src: (u32, u32),
    #[case] dst: (u32, u32),
    #[case] expected: Option<(u32, u32, u32, u32, u32, u32)>,
) {
    let region = ClampedRegion::compute(&req, src.0, src.1, dst.0, dst.1);
    match expected {
        None => assert!(region.is_none()),
        Some((src_x, src_y, dst_x, dst_y, width, height)) => {
            let region = region.unwrap();
            assert_eq!(region.src_x(), src_x);
            assert_eq!(region.src_y(), src_y);
            assert_eq!(region.dst_x(), dst_x);
            assert_eq!(region.dst_y(), dst_y);
            assert_eq!(region.width(), width);
            assert_eq!(region.height(), height);
        }
    }
}

// ==============================================================================
// Properties
// ==============================================================================

proptest! {
    /// The clamper accepts the entire i32 input domain without panicking,
    /// and anything it accepts satisfies the region invariants.
    #[test]
    fn clamp_invariants_hold_for_any_input(
        src_x in any::<i32>(), src_y in any::<i32>(),
        dst_x in any::<i32>(), dst_y in any::<i32>(),
        width in any::<i32>(), height in any::<i32>(),
        ratio in any::<i32>(),
        src_w in any::<u32>(), src_h in any::<u32>(),
        dst_w in any::<u32>(), dst_h in any::<u32>(),
    ) {
        let req = BlitRequest { src_x, src_y, dst_x, dst_y, width, height, ratio };
        if let Some(region) = ClampedRegion::compute(&req, src_w, src_h, dst_w, dst_h) {
            prop_assert!(region.width() > 0);
            prop_assert!(region.height() > 0);
            prop_assert_eq!(region.width() % region.ratio(), 0);
            prop_assert_eq!(region.height() % region.ratio(), 0);
            prop_assert!(u64::from(region.src_x()) + u64::from(region.width()) <= u64::from(src_w));
            prop_assert!(u64::from(region.src_y()) + u64::from(region.height()) <= u64::from(src_h));
            prop_assert!(u64::from(region.dst_x()) + u64::from(region.out_width()) <= u64::from(dst_w));
            prop_assert!(u64::from(region.dst_y()) + u64::from(region.out_height()) <= u64::from(dst_h));
        }
    }

    /// With a fill color, every destination cell ends defined: inside the
    /// copied rectangle it comes from the source, outside it is the fill
    /// color. With no surviving region the whole destination is the fill
    /// color.
    #[test]
    fn blit_with_fill_leaves_no_cell_undefined(
        src_w in 1u32..10, src_h in 1u32..10,
        dst_w in 1u32..10, dst_h in 1u32..10,
        src_x in -16i32..16, src_y in -16i32..16,
        dst_x in -16i32..16, dst_y in -16i32..16,
        width in -4i32..24, height in -4i32..24,
        ratio in -1i32..5,
    ) {
        const SENTINEL: u32 = 0xDEAD_BEEF;
        let src_cells: Vec<u32> = (0..src_w * src_h).collect();
        let src = Pixmap::from_cells(src_w, src_h, src_cells).unwrap();
        let mut dst = Pixmap::new(dst_w, dst_h).unwrap();
        dst.fill(SENTINEL);

        let blitter = Blitter::new();
        let fill = Rgba::new(9, 8, 7, 6);
        let fill_cell = fill.to_cell(blitter.byte_order());
        let req = BlitRequest { src_x, src_y, dst_x, dst_y, width, height, ratio };

        blitter.blit(&mut dst, &src, &req, Some(fill));

        match ClampedRegion::compute(&req, src_w, src_h, dst_w, dst_h) {
            None => {
                prop_assert!(dst.cells().iter().all(|&c| c == fill_cell));
            }
            Some(region) => {
                for y in 0..dst_h {
                    for x in 0..dst_w {
                        let got = dst.cell_at(x, y).unwrap();
                        prop_assert_ne!(got, SENTINEL, "undefined cell at ({}, {})", x, y);
                        let inside = x >= region.dst_x()
                            && x < region.dst_x() + region.out_width()
                            && y >= region.dst_y()
                            && y < region.dst_y() + region.out_height();
                        if !inside {
                            prop_assert_eq!(got, fill_cell, "gap cell at ({}, {})", x, y);
                        } else if region.ratio() == 1 {
                            let expected = src
                                .cell_at(
                                    region.src_x() + (x - region.dst_x()),
                                    region.src_y() + (y - region.dst_y()),
                                )
                                .unwrap();
                            prop_assert_eq!(got, expected, "copied cell at ({}, {})", x, y);
                        }
                    }
                }
            }
        }
    }

    /// The incremental per-channel mean matches a naive wide-sum reference.
    #[test]
    fn downsample_matches_naive_reference(
        (width, height, ratio, cells) in downsample_input(),
    ) {
        let src = Pixmap::from_cells(width, height, cells).unwrap();
        let out_w = width / ratio;
        let out_h = height / ratio;
        let mut dst = Pixmap::new(out_w, out_h).unwrap();

        let req = BlitRequest::new(0, 0, 0, 0, width as i32, height as i32)
            .with_ratio(ratio as i32);
        Blitter::new().blit(&mut dst, &src, &req, None);

        for by in 0..out_h {
            for bx in 0..out_w {
                let expected = naive_block_average(&src, ratio, bx, by);
                prop_assert_eq!(dst.cell_at(bx, by).unwrap(), expected);
            }
        }
    }
}

fn downsample_input() -> impl Strategy<Value = (u32, u32, u32, Vec<u32>)> {
    (1u32..4, 1u32..4, 1u32..5).prop_flat_map(|(blocks_w, blocks_h, ratio)| {
        let width = blocks_w * ratio;
        let height = blocks_h * ratio;
        prop::collection::vec(any::<u32>(), (width * height) as usize)
            .prop_map(move |cells| (width, height, ratio, cells))
    })
}

/// floor(sum / ratio^2) per channel, computed the obvious wide way.
fn naive_block_average(src: &Pixmap, ratio: u32, bx: u32, by: u32) -> u32 {
    let mut sums = [0u64; 4];
    for y in 0..ratio {
        for x in 0..ratio {
            let bytes = src.cell_at(bx * ratio + x, by * ratio + y).unwrap().to_ne_bytes();
            for (lane, byte) in bytes.iter().enumerate() {
                sums[lane] += u64::from(*byte);
            }
        }
    }
    let count = u64::from(ratio * ratio);
    let mut out = [0u8; 4];
    for lane in 0..4 {
        out[lane] = (sums[lane] / count) as u8;
    }
    u32::from_ne_bytes(out)
}
