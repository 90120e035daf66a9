#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use jpeg_encoder::{ColorType, Encoder, SamplingFactor};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Write `data` into `dir` and return the file's path.
pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).expect("Cannot write fixture");
    path
}

fn gray_pixels(width: u16, height: u16) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height as usize {
        for x in 0..width as usize {
            pixels.push(((x * 5 + y * 3) ^ (x * y / 4)) as u8);
        }
    }
    pixels
}

fn rgb_pixels(width: u16, height: u16) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height as usize {
        for x in 0..width as usize {
            pixels.extend_from_slice(&[(x * 8) as u8, (y * 8) as u8, ((x + y) * 4) as u8]);
        }
    }
    pixels
}

pub struct Fixture {
    width: u16,
    height: u16,
    sampling: Option<SamplingFactor>,
    restart_interval: Option<u16>,
    optimized: bool,
    progressive: bool,
}

impl Fixture {
    pub fn gray(width: u16, height: u16) -> Self {
        Fixture {
            width,
            height,
            sampling: None,
            restart_interval: None,
            optimized: false,
            progressive: false,
        }
    }

    pub fn color(width: u16, height: u16, sampling: SamplingFactor) -> Self {
        Fixture {
            sampling: Some(sampling),
            ..Self::gray(width, height)
        }
    }

    pub fn with_restart_interval(mut self, interval: u16) -> Self {
        self.restart_interval = Some(interval);
        self
    }

    /// Optimized tables make the encoder code one scan per component.
    pub fn with_optimized_tables(mut self) -> Self {
        self.optimized = true;
        self
    }

    pub fn progressive(mut self) -> Self {
        self.progressive = true;
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut encoder = Encoder::new(&mut out, 85);
        if let Some(interval) = self.restart_interval {
            encoder.set_restart_interval(interval);
        }
        encoder.set_optimized_huffman_tables(self.optimized);
        encoder.set_progressive(self.progressive);

        match self.sampling {
            Some(sampling) => {
                encoder.set_sampling_factor(sampling);
                encoder
                    .encode(&rgb_pixels(self.width, self.height), self.width, self.height, ColorType::Rgb)
                    .expect("Cannot encode color fixture");
            }
            None => encoder
                .encode(&gray_pixels(self.width, self.height), self.width, self.height, ColorType::Luma)
                .expect("Cannot encode gray fixture"),
        }
        out
    }

    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        write_file(dir, name, &self.encode())
    }
}

fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, marker];
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// SOI followed by a one-component frame header of the given SOF type and precision.
pub fn frame_only_jpeg(sof_marker: u8, precision: u8) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    out.extend(segment(sof_marker, &[precision, 0, 8, 0, 8, 1, 1, 0x11, 0]));
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

/// A one-block-per-byte grayscale baseline file claiming `width` x `height`.
///
/// Both Huffman tables hold a single 1-bit code for symbol 0 and the scan
/// carries one byte of entropy data.
pub fn declared_size_jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut sof = vec![8];
    sof.extend_from_slice(&height.to_be_bytes());
    sof.extend_from_slice(&width.to_be_bytes());
    sof.extend_from_slice(&[1, 1, 0x11, 0]);

    let mut dht = Vec::new();
    for class in [0x00, 0x10] {
        dht.push(class);
        dht.push(1);
        dht.extend_from_slice(&[0; 15]);
        dht.push(0);
    }

    let mut out = vec![0xFF, 0xD8];
    out.extend(segment(0xC0, &sof));
    out.extend(segment(0xC4, &dht));
    out.extend(segment(0xDA, &[1, 1, 0x00, 0, 63, 0]));
    out.extend_from_slice(&[0x3F, 0xFF, 0xD9]);
    out
}

/// Decode pixels with an independent decoder.
pub fn decode_pixels(data: &[u8]) -> (u16, u16, Vec<u8>) {
    let mut decoder = jpeg_decoder::Decoder::new(data);
    let pixels = decoder.decode().expect("Independent decoder rejected the file");
    let info = decoder.info().expect("Decoder has no image info");
    (info.width, info.height, pixels)
}
