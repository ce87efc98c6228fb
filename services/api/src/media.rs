//! services/api/src/media.rs
//!
//! Image processing for the upload pipeline: the bounded in-session preview,
//! the stored project thumbnail, and the size-budget compression applied to
//! processed images before they are uploaded to the object store.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use storyincolor_core::ports::{PortError, PortResult};
use tracing::warn;

/// Longest edge of the in-session preview.
pub const PREVIEW_MAX_EDGE: u32 = 1024;
/// JPEG quality of the in-session preview (out of 100).
pub const PREVIEW_QUALITY: u8 = 85;
/// Stored project-card thumbnail bounds and quality.
pub const THUMBNAIL_MAX_WIDTH: u32 = 300;
pub const THUMBNAIL_MAX_HEIGHT: u32 = 300;
pub const THUMBNAIL_QUALITY: u8 = 70;
/// Compression never drops below this quality; past it the caller gets a
/// best-effort result flagged `AtQualityFloor` instead.
pub const QUALITY_FLOOR: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionOutcome {
    WithinBudget,
    /// The quality floor was hit before the byte budget was met; the returned
    /// bytes are the smallest rendition produced.
    AtQualityFloor,
}

fn decode(bytes: &[u8]) -> PortResult<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| PortError::Validation(format!("Not a decodable image: {e}")))
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> PortResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut cursor = Cursor::new(&mut out);
    let encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
    // JPEG has no alpha channel; flatten before encoding.
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| PortError::Unexpected(format!("JPEG encode failed: {e}")))?;
    Ok(out)
}

/// Produce the bounded-resolution preview shown during the wizard session.
/// This preview is also what gets uploaded at submission time.
pub fn preview_thumbnail(bytes: &[u8]) -> PortResult<Vec<u8>> {
    let img = decode(bytes)?;
    let longest = img.width().max(img.height());
    let resized = if longest > PREVIEW_MAX_EDGE {
        img.resize(PREVIEW_MAX_EDGE, PREVIEW_MAX_EDGE, FilterType::Triangle)
    } else {
        img
    };
    encode_jpeg(&resized, PREVIEW_QUALITY)
}

/// Aspect-preserving thumbnail for project cards.
pub fn generate_thumbnail(
    bytes: &[u8],
    max_width: u32,
    max_height: u32,
    quality: u8,
) -> PortResult<Vec<u8>> {
    let img = decode(bytes)?;
    let thumb = img.thumbnail(max_width, max_height);
    encode_jpeg(&thumb, quality)
}

/// Iteratively lowers encode quality, then caps dimensions, until the output
/// fits `max_bytes` or the quality floor is hit. Always terminates, and never
/// returns more bytes than it was given.
pub fn compress_to_size_limit(
    bytes: &[u8],
    max_bytes: usize,
    initial_quality: u8,
) -> PortResult<(Vec<u8>, CompressionOutcome)> {
    if bytes.len() <= max_bytes {
        return Ok((bytes.to_vec(), CompressionOutcome::WithinBudget));
    }

    let img = decode(bytes)?;
    let mut best: Option<Vec<u8>> = None;

    let mut consider = |candidate: Vec<u8>| -> Option<Vec<u8>> {
        let done = candidate.len() <= max_bytes;
        let improved = best.as_ref().map(|b| candidate.len() < b.len()).unwrap_or(true);
        if improved {
            best = Some(candidate.clone());
        }
        done.then_some(candidate)
    };

    // Pass 1: walk the quality ladder down to the floor.
    let mut quality = initial_quality.clamp(QUALITY_FLOOR, 100);
    loop {
        if let Some(fit) = consider(encode_jpeg(&img, quality)?) {
            return Ok((fit, CompressionOutcome::WithinBudget));
        }
        if quality == QUALITY_FLOOR {
            break;
        }
        quality = quality.saturating_sub(10).max(QUALITY_FLOOR);
    }

    // Pass 2: at the floor, progressively cap dimensions.
    let mut scaled = img;
    for _ in 0..4 {
        let (w, h) = (scaled.width(), scaled.height());
        if w <= 64 || h <= 64 {
            break;
        }
        scaled = scaled.resize(
            (w as f64 * 0.7) as u32,
            (h as f64 * 0.7) as u32,
            FilterType::Triangle,
        );
        if let Some(fit) = consider(encode_jpeg(&scaled, QUALITY_FLOOR)?) {
            return Ok((fit, CompressionOutcome::WithinBudget));
        }
    }

    warn!(
        max_bytes,
        "Image could not be compressed under the size budget at the quality floor"
    );
    let best = best.unwrap_or_else(|| bytes.to_vec());
    // An already-optimized input can beat our re-encode; keep the smaller.
    if best.len() >= bytes.len() {
        Ok((bytes.to_vec(), CompressionOutcome::AtQualityFloor))
    } else {
        Ok((best, CompressionOutcome::AtQualityFloor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn solid_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            width,
            height,
            Rgb([200u8, 120, 40]),
        ));
        encode_jpeg(&img, 90).unwrap()
    }

    fn noise_jpeg(width: u32, height: u32) -> Vec<u8> {
        let mut seed: u64 = 0x9e3779b97f4a7c15;
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            seed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add((x as u64) << 32 | y as u64);
            let v = (seed >> 24) as u32;
            Rgb([(v & 0xff) as u8, ((v >> 8) & 0xff) as u8, ((v >> 16) & 0xff) as u8])
        }));
        encode_jpeg(&img, 95).unwrap()
    }

    #[test]
    fn preview_caps_the_longest_edge() {
        let original = solid_jpeg(2048, 512);
        let preview = preview_thumbnail(&original).unwrap();
        let decoded = image::load_from_memory(&preview).unwrap();
        assert!(decoded.width() <= PREVIEW_MAX_EDGE);
        assert!(decoded.height() <= PREVIEW_MAX_EDGE);
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let original = solid_jpeg(100, 80);
        let preview = preview_thumbnail(&original).unwrap();
        let decoded = image::load_from_memory(&preview).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 80));
    }

    #[test]
    fn thumbnail_fits_the_requested_box() {
        let original = solid_jpeg(900, 600);
        let thumb = generate_thumbnail(
            &original,
            THUMBNAIL_MAX_WIDTH,
            THUMBNAIL_MAX_HEIGHT,
            THUMBNAIL_QUALITY,
        )
        .unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert!(decoded.width() <= THUMBNAIL_MAX_WIDTH);
        assert!(decoded.height() <= THUMBNAIL_MAX_HEIGHT);
    }

    #[test]
    fn compression_under_budget_short_circuits() {
        let original = solid_jpeg(64, 64);
        let (out, outcome) =
            compress_to_size_limit(&original, original.len() + 1, PREVIEW_QUALITY).unwrap();
        assert_eq!(outcome, CompressionOutcome::WithinBudget);
        assert_eq!(out, original);
    }

    #[test]
    fn compression_meets_a_reachable_budget() {
        let original = noise_jpeg(256, 256);
        let budget = original.len() / 2;
        let (out, outcome) = compress_to_size_limit(&original, budget, 85).unwrap();
        if outcome == CompressionOutcome::WithinBudget {
            assert!(out.len() <= budget);
        }
        assert!(out.len() <= original.len());
    }

    #[test]
    fn unreachable_budget_returns_best_effort_at_the_floor() {
        let original = noise_jpeg(256, 256);
        // A budget no JPEG of this content can meet.
        let (out, outcome) = compress_to_size_limit(&original, 16, 85).unwrap();
        assert_eq!(outcome, CompressionOutcome::AtQualityFloor);
        assert!(!out.is_empty());
        // Never returns a larger file than it started with.
        assert!(out.len() <= original.len());
    }

    #[test]
    fn non_image_input_is_rejected() {
        let err = preview_thumbnail(b"definitely not an image").unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
    }
}
