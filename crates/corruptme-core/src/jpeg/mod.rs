//! Compressed-domain JPEG codec.
//!
//! This module provides coefficient-level access to sequential Huffman JPEG
//! files without a pixel decode. It extracts quantized DCT coefficients via
//! Huffman decoding and re-encodes them with the file's own tables.
//!
//! # Architecture
//!
//! ```text
//! JPEG → parse → huffman decode → [i16; 64] blocks → edit → huffman encode → JPEG
//! ```

pub mod huffman;
pub mod marker;
pub mod parser;
pub mod scan;
pub mod writer;

pub use huffman::{encode_coefficient, BitReader, BitWriter, HuffmanEncoder, HuffmanLookup};
pub use marker::Marker;
pub use parser::{
    parse_jpeg, FrameComponent, FrameHeader, HuffmanTable, JpegStream, QuantizationTable, Scan,
    ScanComponent, ScanHeader, Segment, NATURAL_TO_ZIGZAG, ZIGZAG_TO_NATURAL,
};
pub use scan::{decode_scans, encode_scan};
pub use writer::write_jpeg;

use crate::error::Result;
use crate::store::CoefficientStore;

/// Parse a JPEG and decode all of its coefficient blocks.
///
/// The returned stream no longer carries the original entropy-coded data;
/// everything needed to write the file again lives in the stream headers and
/// the store.
///
/// # Example
/// ```ignore
/// let jpeg = std::fs::read("photo.jpg")?;
/// let (stream, mut store) = decode_jpeg(&jpeg, true)?;
/// store.set_block(0, 0, 0, &[0; 64])?;
/// std::fs::write("glitched.jpg", write_jpeg(&stream, &store)?)?;
/// ```
pub fn decode_jpeg(jpeg_data: &[u8], keep_trailing: bool) -> Result<(JpegStream, CoefficientStore)> {
    let mut stream = parse_jpeg(jpeg_data, keep_trailing)?;
    let store = decode_scans(&stream)?;
    stream.discard_entropy_data();

    log::debug!(
        "decoded {}x{} JPEG (SOF{}): {} component(s), {} scan(s)",
        stream.frame.width,
        stream.frame.height,
        stream.frame.sof_type,
        stream.frame.components.len(),
        stream.scans.len()
    );
    Ok((stream, store))
}

#[cfg(test)]
mod api_tests {
    use super::*;
    use crate::fixtures;
    use jpeg_encoder::SamplingFactor;

    #[test]
    fn test_decode_jpeg_drops_entropy_data() {
        let jpeg = fixtures::color_jpeg(32, 16, SamplingFactor::F_2_1);
        let (stream, store) = decode_jpeg(&jpeg, true).expect("Failed to decode JPEG");

        assert!(stream.scans.iter().all(|scan| scan.entropy_data.is_empty()));
        assert_eq!(store.num_components(), 3);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_edit_survives_write_and_decode() {
        let jpeg = fixtures::gray_jpeg(64, 64);
        let (stream, mut store) = decode_jpeg(&jpeg, true).unwrap();

        let mut block = [0i16; 64];
        block[0] = 100;
        block[1] = -3;
        block[63] = 7;
        store.set_block(0, 4, 4, &block).unwrap();

        let output = write_jpeg(&stream, &store).unwrap();
        let (_, reread) = decode_jpeg(&output, true).unwrap();
        assert_eq!(reread.get_block(0, 4, 4).unwrap(), block);
        assert_eq!(reread.get_block(0, 0, 0).unwrap(), store.get_block(0, 0, 0).unwrap());
    }

    #[test]
    fn test_progressive_is_rejected() {
        let jpeg = fixtures::progressive_jpeg(32, 32);
        let err = decode_jpeg(&jpeg, true).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Format);
        assert!(err.to_string().contains("progressive"));
    }
}
