//! Coordinate transformation between canvas and PDF coordinate systems
//!
//! Canvas space is the backing store of a page rasterized at `scale`
//! (pixels, top-left origin). PDF space is the page's native space
//! (points, bottom-left origin). `canvas pixels = PDF points × scale`.

use shared_types::{
    CanvasPosition, ContainerOrigin, GrabOffset, PdfPosition, RenderedPage, SignatureSize,
};

use crate::error::{Result, SignPlaceError};

pub(crate) fn check_scale(scale: f64) -> Result<()> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(SignPlaceError::InvalidArgument(format!(
            "render scale must be a positive finite number, got {}",
            scale
        )));
    }
    Ok(())
}

/// Convert a signature's top-left canvas position into a PDF rectangle
///
/// `canvas_width`/`canvas_height` are the canvas backing-store dimensions,
/// not its CSS size. The returned rectangle is anchored at its bottom-left
/// corner and has no page attached.
pub fn canvas_to_pdf(
    position: CanvasPosition,
    _canvas_width: f64,
    canvas_height: f64,
    scale: f64,
    size: SignatureSize,
) -> Result<PdfPosition> {
    check_scale(scale)?;

    let x = position.x / scale;
    // Flip Y and move the anchor from the top-left to the bottom-left corner
    let y = (canvas_height / scale) - (position.y / scale) - (size.height / scale);

    Ok(PdfPosition::new(
        x,
        y,
        size.width / scale,
        size.height / scale,
    ))
}

/// Convert a stored PDF rectangle back to its top-left canvas position
pub fn pdf_to_canvas(
    position: &PdfPosition,
    canvas_height: f64,
    scale: f64,
) -> Result<CanvasPosition> {
    check_scale(scale)?;

    Ok(CanvasPosition::new(
        position.x * scale,
        canvas_height - (position.y * scale) - (position.height * scale),
    ))
}

/// Keep a dragged item inside its container
///
/// When the item is larger than the container the bound collapses to 0,
/// leaving the item overflowing to the right/bottom.
pub fn clamp_position(
    position: CanvasPosition,
    container_width: f64,
    container_height: f64,
    item_width: f64,
    item_height: f64,
) -> CanvasPosition {
    let max_x = container_width - item_width;
    let max_y = container_height - item_height;

    CanvasPosition::new(
        clamp(position.x, 0.0, max_x),
        clamp(position.y, 0.0, max_y),
    )
}

// Not f64::clamp: that panics when hi < lo
fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    lo.max(v.min(hi))
}

/// Translate a pointer event into container-local coordinates, preserving
/// the point where the item was grabbed
pub fn relative_position(
    client_x: f64,
    client_y: f64,
    origin: ContainerOrigin,
    grab: GrabOffset,
) -> CanvasPosition {
    CanvasPosition::new(
        client_x - origin.left - grab.x,
        client_y - origin.top - grab.y,
    )
}

/// Backing-store size of a page of `page_width` × `page_height` points
/// rasterized at `scale`
pub fn rendered_page_size(page_width: f64, page_height: f64, scale: f64) -> Result<RenderedPage> {
    check_scale(scale)?;
    Ok(RenderedPage {
        width_px: page_width * scale,
        height_px: page_height * scale,
        scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sig() -> SignatureSize {
        SignatureSize::new(400.0, 150.0)
    }

    #[test]
    fn test_worked_example() {
        let pos = canvas_to_pdf(CanvasPosition::new(100.0, 100.0), 800.0, 600.0, 1.5, sig())
            .unwrap();
        assert!((pos.x - 66.67).abs() < 0.01);
        assert!((pos.y - 233.33).abs() < 0.01);
        assert!((pos.width - 266.67).abs() < 0.01);
        assert!((pos.height - 100.0).abs() < 0.01);
        assert_eq!(pos.page, None);
    }

    #[test]
    fn test_scale_sensitivity() {
        let at_1x =
            canvas_to_pdf(CanvasPosition::new(100.0, 100.0), 800.0, 600.0, 1.0, sig()).unwrap();
        let at_2x =
            canvas_to_pdf(CanvasPosition::new(100.0, 100.0), 800.0, 600.0, 2.0, sig()).unwrap();
        assert_eq!(at_1x.x, 100.0);
        assert_eq!(at_2x.x, 50.0);
    }

    #[test]
    fn test_top_left_maps_below_page_top() {
        // A signature dragged to the very top sits flush against the page top
        let pos = canvas_to_pdf(CanvasPosition::new(0.0, 0.0), 612.0, 792.0, 1.0, sig()).unwrap();
        assert_eq!(pos.x, 0.0);
        assert_eq!(pos.y, 792.0 - 150.0);
        assert_eq!(pos.y + pos.height, 792.0);
    }

    #[test]
    fn test_bottom_edge_maps_to_zero() {
        let pos =
            canvas_to_pdf(CanvasPosition::new(0.0, 450.0), 800.0, 600.0, 1.0, sig()).unwrap();
        assert_eq!(pos.y, 0.0);
    }

    #[test]
    fn test_negative_position_propagates() {
        let pos =
            canvas_to_pdf(CanvasPosition::new(-30.0, -15.0), 800.0, 600.0, 1.5, sig()).unwrap();
        assert!((pos.x + 20.0).abs() < 1e-9);
        assert!(pos.y + pos.height > 400.0);
    }

    #[test]
    fn test_zero_scale_rejected() {
        let err =
            canvas_to_pdf(CanvasPosition::new(0.0, 0.0), 800.0, 600.0, 0.0, sig()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_negative_and_nan_scale_rejected() {
        let pos = PdfPosition::new(0.0, 0.0, 10.0, 10.0);
        assert!(pdf_to_canvas(&pos, 600.0, -1.0).is_err());
        assert!(pdf_to_canvas(&pos, 600.0, f64::NAN).is_err());
        assert!(pdf_to_canvas(&pos, 600.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_pdf_to_canvas_inverts_worked_example() {
        let pdf = PdfPosition::new(200.0 / 3.0, 700.0 / 3.0, 800.0 / 3.0, 100.0);
        let canvas = pdf_to_canvas(&pdf, 600.0, 1.5).unwrap();
        assert!((canvas.x - 100.0).abs() < 1e-9);
        assert!((canvas.y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_boundaries() {
        let low = clamp_position(CanvasPosition::new(-5.0, -5.0), 800.0, 600.0, 400.0, 150.0);
        assert_eq!(low, CanvasPosition::new(0.0, 0.0));

        let high = clamp_position(
            CanvasPosition::new(1000.0, 1000.0),
            800.0,
            600.0,
            400.0,
            150.0,
        );
        assert_eq!(high, CanvasPosition::new(400.0, 450.0));
    }

    #[test]
    fn test_clamp_inside_is_unchanged() {
        let pos = CanvasPosition::new(123.5, 77.25);
        assert_eq!(clamp_position(pos, 800.0, 600.0, 400.0, 150.0), pos);
    }

    #[test]
    fn test_clamp_oversized_item_collapses_to_zero() {
        let pos = clamp_position(CanvasPosition::new(50.0, 50.0), 300.0, 100.0, 400.0, 150.0);
        assert_eq!(pos, CanvasPosition::new(0.0, 0.0));
    }

    #[test]
    fn test_relative_position_keeps_grab_point() {
        let origin = ContainerOrigin {
            left: 20.0,
            top: 120.0,
        };
        let grab = GrabOffset { x: 35.0, y: 10.0 };
        let pos = relative_position(255.0, 330.0, origin, grab);
        assert_eq!(pos, CanvasPosition::new(200.0, 200.0));
    }

    #[test]
    fn test_rendered_page_size() {
        let page = rendered_page_size(612.0, 792.0, 1.5).unwrap();
        assert_eq!(page.width_px, 918.0);
        assert_eq!(page.height_px, 1188.0);
        assert!(rendered_page_size(612.0, 792.0, 0.0).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    // Strategy for positive canvas/container dimensions
    fn dimension() -> impl Strategy<Value = f64> {
        1.0f64..4000.0
    }

    fn render_scale() -> impl Strategy<Value = f64> {
        0.1f64..5.0
    }

    fn coordinate() -> impl Strategy<Value = f64> {
        -500.0f64..5000.0
    }

    fn signature_size() -> impl Strategy<Value = SignatureSize> {
        (1.0f64..800.0, 1.0f64..400.0).prop_map(|(w, h)| SignatureSize::new(w, h))
    }

    proptest! {
        /// Property: canvas -> PDF -> canvas returns the original position
        #[test]
        fn roundtrip_canvas_pdf_canvas(
            x in coordinate(),
            y in coordinate(),
            canvas_w in dimension(),
            canvas_h in dimension(),
            scale in render_scale(),
            size in signature_size(),
        ) {
            let original = CanvasPosition::new(x, y);
            let pdf = canvas_to_pdf(original, canvas_w, canvas_h, scale, size).unwrap();
            let back = pdf_to_canvas(&pdf, canvas_h, scale).unwrap();

            let tolerance = 1e-9;
            prop_assert!(
                (back.x - x).abs() < tolerance,
                "X roundtrip failed: {} -> {} -> {}", x, pdf.x, back.x
            );
            prop_assert!(
                (back.y - y).abs() < tolerance,
                "Y roundtrip failed: {} -> {} -> {}", y, pdf.y, back.y
            );
        }

        /// Property: PDF -> canvas -> PDF returns the original rectangle origin
        #[test]
        fn roundtrip_pdf_canvas_pdf(
            x in 0.0f64..1000.0,
            y in 0.0f64..1000.0,
            canvas_h in dimension(),
            scale in render_scale(),
            size in signature_size(),
        ) {
            let pdf = PdfPosition::new(x, y, size.width / scale, size.height / scale);
            let canvas = pdf_to_canvas(&pdf, canvas_h, scale).unwrap();
            let back = canvas_to_pdf(canvas, 0.0, canvas_h, scale, size).unwrap();

            prop_assert!((back.x - x).abs() < 1e-9);
            prop_assert!((back.y - y).abs() < 1e-9);
        }

        /// Property: PDF rectangle size scales inversely with render scale
        #[test]
        fn size_scales_inversely(
            size in signature_size(),
            scale in render_scale(),
        ) {
            let pdf = canvas_to_pdf(CanvasPosition::default(), 800.0, 600.0, scale, size).unwrap();
            prop_assert!((pdf.width * scale - size.width).abs() < 1e-9);
            prop_assert!((pdf.height * scale - size.height).abs() < 1e-9);
        }

        /// Property: moving down on the canvas moves down on the page
        #[test]
        fn y_axis_is_inverted(
            y in 0.0f64..1000.0,
            delta in 1.0f64..500.0,
            canvas_h in dimension(),
            scale in render_scale(),
        ) {
            let size = SignatureSize::DEFAULT;
            let upper = canvas_to_pdf(CanvasPosition::new(0.0, y), 0.0, canvas_h, scale, size).unwrap();
            let lower = canvas_to_pdf(CanvasPosition::new(0.0, y + delta), 0.0, canvas_h, scale, size).unwrap();
            prop_assert!(lower.y < upper.y);
        }

        /// Property: clamping twice is the same as clamping once
        #[test]
        fn clamp_is_idempotent(
            x in coordinate(),
            y in coordinate(),
            cw in dimension(),
            ch in dimension(),
            iw in 0.0f64..5000.0,
            ih in 0.0f64..5000.0,
        ) {
            let once = clamp_position(CanvasPosition::new(x, y), cw, ch, iw, ih);
            let twice = clamp_position(once, cw, ch, iw, ih);
            prop_assert_eq!(once, twice);
        }

        /// Property: clamped positions respect the container bounds
        #[test]
        fn clamp_stays_in_bounds(
            x in coordinate(),
            y in coordinate(),
            cw in dimension(),
            ch in dimension(),
            iw in 0.0f64..5000.0,
            ih in 0.0f64..5000.0,
        ) {
            let pos = clamp_position(CanvasPosition::new(x, y), cw, ch, iw, ih);
            prop_assert!(pos.x >= 0.0 && pos.x <= (cw - iw).max(0.0));
            prop_assert!(pos.y >= 0.0 && pos.y <= (ch - ih).max(0.0));
        }
    }
}
