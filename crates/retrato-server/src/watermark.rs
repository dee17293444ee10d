use std::fmt::{Display, Formatter};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};

#[derive(Debug)]
pub struct WatermarkError(pub String);

impl Display for WatermarkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for WatermarkError {}

const JPEG_QUALITY: u8 = 90;
const OVERLAY_ALPHA: f32 = 0.15;
const TILT_DEGREES: f32 = -30.0;
/// Glyph grid is 5x7 cells; one extra cell of tracking between letters.
const GLYPH_COLS: u32 = 5;
const GLYPH_ROWS: u32 = 7;
const GLYPH_ADVANCE: f32 = 7.0;

/// Composites the repeated translucent wordmark diagonally across the image
/// and re-encodes as JPEG. Accepts anything the decoder recognizes
/// (the upload path already restricts inputs to JPEG/PNG/WebP).
pub fn apply_watermark(bytes: &[u8], text: &str) -> Result<Vec<u8>, WatermarkError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| WatermarkError(format!("decode failed: {e}")))?;
    let mut canvas = decoded.to_rgba8();
    overlay_wordmark(&mut canvas, text);

    let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder
        .encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| WatermarkError(format!("encode failed: {e}")))?;
    Ok(out)
}

fn overlay_wordmark(canvas: &mut RgbaImage, text: &str) {
    let width = canvas.width() as f32;
    let height = canvas.height() as f32;
    // Wordmark height tracks the image width, floor keeps it legible on
    // thumbnails.
    let font_px = (width * 0.06).max(12.0);
    let cell = font_px / GLYPH_ROWS as f32;
    let word_advance = text.chars().count() as f32 * GLYPH_ADVANCE * cell;

    let (cx, cy) = (width / 2.0, height / 2.0);
    let angle = TILT_DEGREES.to_radians();
    let (sin, cos) = angle.sin_cos();

    let step_x = (word_advance * 1.4).max(width * 0.45);
    let step_y = (height * 0.18).max(font_px * 2.0);

    for row in -4i32..=8 {
        for col in -3i32..=4 {
            let origin_x = col as f32 * step_x - width * 0.2;
            let origin_y = row as f32 * step_y - height * 0.1;
            for (index, ch) in text.chars().enumerate() {
                let Some(rows) = glyph_rows(ch) else {
                    continue;
                };
                let letter_x = origin_x + index as f32 * GLYPH_ADVANCE * cell;
                for (gy, bits) in rows.iter().enumerate() {
                    for gx in 0..GLYPH_COLS {
                        if bits & (1 << (GLYPH_COLS - 1 - gx)) == 0 {
                            continue;
                        }
                        let px = letter_x + gx as f32 * cell;
                        let py = origin_y + gy as f32 * cell;
                        // Rotate the cell position around the image center.
                        let dx = px - cx;
                        let dy = py - cy;
                        let rx = cx + dx * cos - dy * sin;
                        let ry = cy + dx * sin + dy * cos;
                        blend_block(canvas, rx, ry, cell);
                    }
                }
            }
        }
    }
}

fn blend_block(canvas: &mut RgbaImage, x: f32, y: f32, size: f32) {
    let side = size.ceil().max(1.0) as i64;
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let (width, height) = (i64::from(canvas.width()), i64::from(canvas.height()));
    for yy in y0..y0 + side {
        if yy < 0 || yy >= height {
            continue;
        }
        for xx in x0..x0 + side {
            if xx < 0 || xx >= width {
                continue;
            }
            let pixel = canvas.get_pixel_mut(xx as u32, yy as u32);
            for channel in pixel.0.iter_mut().take(3) {
                let value = f32::from(*channel);
                *channel = (value + (255.0 - value) * OVERLAY_ALPHA).round() as u8;
            }
        }
    }
}

/// 5x7 block face, uppercase letters only; anything else renders as a gap.
fn glyph_rows(c: char) -> Option<[u8; 7]> {
    let rows = match c.to_ascii_uppercase() {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x1B, 0x11],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([40, 60, 80]));
        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, 90);
        encoder
            .encode(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .expect("encode fixture");
        out
    }

    #[test]
    fn output_is_jpeg_with_preserved_dimensions() {
        let input = sample_jpeg(320, 400);
        let output = apply_watermark(&input, "RETRATO").expect("watermark");
        let decoded = image::load_from_memory(&output).expect("decode output");
        assert_eq!(decoded.width(), 320);
        assert_eq!(decoded.height(), 400);
        assert_eq!(
            image::guess_format(&output).expect("guess format"),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn overlay_changes_pixels() {
        let input = sample_jpeg(200, 250);
        let output = apply_watermark(&input, "RETRATO").expect("watermark");
        let before = image::load_from_memory(&input).expect("decode input").to_rgb8();
        let after = image::load_from_memory(&output).expect("decode output").to_rgb8();
        let changed = before
            .pixels()
            .zip(after.pixels())
            .filter(|(a, b)| a != b)
            .count();
        assert!(changed > 0, "watermark must alter the image");
    }

    #[test]
    fn png_input_is_accepted() {
        let img = RgbImage::from_pixel(64, 64, Rgb([200, 200, 200]));
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .expect("encode png");
        let output = apply_watermark(&png, "RETRATO").expect("watermark");
        assert_eq!(
            image::guess_format(&output).expect("guess format"),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn garbage_input_is_rejected() {
        assert!(apply_watermark(b"not an image", "RETRATO").is_err());
    }
}
