//! CPU compositing of decoded layers onto the output canvas.
//!
//! Layers arrive back-to-front. Each one is cropped, scaled
//! (nearest-neighbor), positioned by its normalized offsets, and
//! alpha-blended over what is already on the canvas. An empty layer
//! list yields opaque black.

use clipforge_plan_compiler::Transform;

use crate::backend::FrameBuffer;

/// Composite `layers` (back-to-front) into a canvas frame.
pub fn composite_frame(
    canvas_width: u32,
    canvas_height: u32,
    layers: &[(FrameBuffer, Transform)],
) -> FrameBuffer {
    let mut canvas = FrameBuffer::black(canvas_width, canvas_height);
    for (frame, transform) in layers {
        if transform.is_invisible() {
            continue;
        }
        blend_layer(&mut canvas, frame, transform);
    }
    canvas
}

fn blend_layer(canvas: &mut FrameBuffer, source: &FrameBuffer, transform: &Transform) {
    // Crop region in source pixels; defaults to the full frame.
    let (crop_x, crop_y, crop_w, crop_h) = match &transform.crop {
        Some(crop) => (
            (crop.x * source.width as f64).round() as i64,
            (crop.y * source.height as f64).round() as i64,
            (crop.w * source.width as f64).round().max(1.0) as i64,
            (crop.h * source.height as f64).round().max(1.0) as i64,
        ),
        None => (0, 0, source.width as i64, source.height as i64),
    };

    let dest_w = (crop_w as f64 * transform.scale).round().max(1.0) as i64;
    let dest_h = (crop_h as f64 * transform.scale).round().max(1.0) as i64;

    // Element center on the canvas: canvas center plus normalized
    // offsets.
    let center_x = canvas.width as f64 / 2.0 + transform.x * canvas.width as f64;
    let center_y = canvas.height as f64 / 2.0 + transform.y * canvas.height as f64;
    let dest_x0 = (center_x - dest_w as f64 / 2.0).round() as i64;
    let dest_y0 = (center_y - dest_h as f64 / 2.0).round() as i64;

    let opacity = transform.opacity.clamp(0.0, 1.0);

    for dy in 0..dest_h {
        let cy = dest_y0 + dy;
        if cy < 0 || cy >= canvas.height as i64 {
            continue;
        }
        let sy = crop_y + dy * crop_h / dest_h;
        if sy < 0 || sy >= source.height as i64 {
            continue;
        }
        for dx in 0..dest_w {
            let cx = dest_x0 + dx;
            if cx < 0 || cx >= canvas.width as i64 {
                continue;
            }
            let sx = crop_x + dx * crop_w / dest_w;
            if sx < 0 || sx >= source.width as i64 {
                continue;
            }

            let src = source.pixel(sx as u32, sy as u32);
            let alpha = opacity * src[3] as f64 / 255.0;
            if alpha <= 0.0 {
                continue;
            }

            let idx = (cy as usize * canvas.width as usize + cx as usize) * 4;
            for channel in 0..3 {
                let over = src[channel] as f64;
                let under = canvas.data[idx + channel] as f64;
                canvas.data[idx + channel] =
                    (over * alpha + under * (1.0 - alpha)).round() as u8;
            }
            let under_a = canvas.data[idx + 3] as f64 / 255.0;
            let out_a = alpha + under_a * (1.0 - alpha);
            canvas.data[idx + 3] = (out_a * 255.0).round() as u8;
        }
    }
}
