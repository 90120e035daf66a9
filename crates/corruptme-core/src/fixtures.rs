//! Synthetic JPEG fixtures for unit tests.

use jpeg_encoder::{ColorType, Encoder, SamplingFactor};

fn gray_pixels(width: u16, height: u16) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mut pixels = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            pixels.push(((x * 7 + y * 13) ^ (x * y)) as u8);
        }
    }
    pixels
}

fn rgb_pixels(width: u16, height: u16) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mut pixels = Vec::with_capacity(w * h * 3);
    for y in 0..h {
        for x in 0..w {
            pixels.push((x * 255 / w.max(1)) as u8);
            pixels.push((y * 255 / h.max(1)) as u8);
            pixels.push(((x ^ y) * 11) as u8);
        }
    }
    pixels
}

fn encode(
    width: u16,
    height: u16,
    color: Option<SamplingFactor>,
    configure: impl FnOnce(&mut Encoder<&mut Vec<u8>>),
) -> Vec<u8> {
    let mut out = Vec::new();
    let mut encoder = Encoder::new(&mut out, 90);
    configure(&mut encoder);
    match color {
        Some(sampling) => {
            encoder.set_sampling_factor(sampling);
            encoder
                .encode(&rgb_pixels(width, height), width, height, ColorType::Rgb)
                .expect("Failed to encode color fixture");
        }
        None => encoder
            .encode(&gray_pixels(width, height), width, height, ColorType::Luma)
            .expect("Failed to encode gray fixture"),
    }
    out
}

/// Baseline grayscale JPEG with standard Huffman tables.
pub fn gray_jpeg(width: u16, height: u16) -> Vec<u8> {
    encode(width, height, None, |_| {})
}

pub fn gray_jpeg_with_restarts(width: u16, height: u16, interval: u16) -> Vec<u8> {
    encode(width, height, None, |encoder| encoder.set_restart_interval(interval))
}

/// Baseline YCbCr JPEG coded in one interleaved scan.
pub fn color_jpeg(width: u16, height: u16, sampling: SamplingFactor) -> Vec<u8> {
    encode(width, height, Some(sampling), |_| {})
}

/// YCbCr JPEG with optimized Huffman tables, one scan per component.
pub fn multi_scan_jpeg(width: u16, height: u16, sampling: SamplingFactor) -> Vec<u8> {
    encode(width, height, Some(sampling), |encoder| {
        encoder.set_optimized_huffman_tables(true)
    })
}

pub fn progressive_jpeg(width: u16, height: u16) -> Vec<u8> {
    encode(width, height, None, |encoder| encoder.set_progressive(true))
}
