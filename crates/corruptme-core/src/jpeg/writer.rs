//! JPEG file writer for reassembling edited scan data.
//!
//! Emits the parsed segments in their original order and re-encodes every
//! scan from the coefficient store.

use super::marker::Marker;
use super::parser::{JpegStream, Segment};
use super::scan::encode_scan;
use crate::error::{CorruptMeError, Result};
use crate::store::CoefficientStore;

/// Write a complete JPEG file from parsed segments and the current coefficients.
///
/// Preserves all non-scan segments (APP markers, comments, quantization tables,
/// Huffman tables, restart intervals) byte for byte and replaces only the
/// entropy-coded data of each scan.
pub fn write_jpeg(stream: &JpegStream, store: &CoefficientStore) -> Result<Vec<u8>> {
    let mut encoded = Vec::with_capacity(stream.scans.len());
    for scan in &stream.scans {
        encoded.push(encode_scan(stream, scan, store)?);
    }

    let estimated_size = stream
        .segments
        .iter()
        .map(|segment| match segment {
            Segment::Raw { data, .. } => data.len() + 4,
            Segment::Scan { index } => stream
                .scans
                .get(*index)
                .map_or(0, |scan| scan.raw_header.len() + 4),
        })
        .sum::<usize>()
        + encoded.iter().map(Vec::len).sum::<usize>()
        + stream.trailing.len()
        + 4;
    let mut output = Vec::with_capacity(estimated_size);

    write_marker(&mut output, Marker::SOI);

    for segment in &stream.segments {
        match segment {
            Segment::Raw { marker, data } => write_segment(&mut output, *marker, data)?,
            Segment::Scan { index } => {
                let data = encoded.get(*index).ok_or_else(|| {
                    CorruptMeError::format(format!("segment list refers to missing scan {}", index))
                })?;
                write_segment(&mut output, Marker::SOS, &stream.scans[*index].raw_header)?;
                output.extend_from_slice(data);
            }
        }
    }

    write_marker(&mut output, Marker::EOI);
    output.extend_from_slice(&stream.trailing);

    log::debug!(
        "wrote JPEG: {} segments, {} scans, {} bytes",
        stream.segments.len(),
        stream.scans.len(),
        output.len()
    );
    Ok(output)
}

/// Write a marker to the output.
fn write_marker(output: &mut Vec<u8>, marker: Marker) {
    output.push(0xFF);
    output.push(marker.to_u8());
}

/// Write a marker, its length (which includes the 2 length bytes) and payload.
fn write_segment(output: &mut Vec<u8>, marker: Marker, data: &[u8]) -> Result<()> {
    let length = u16::try_from(data.len() + 2).map_err(|_| {
        CorruptMeError::unencodable(format!("{:?} segment of {} bytes is too long", marker, data.len()))
    })?;
    write_marker(output, marker);
    output.extend_from_slice(&length.to_be_bytes());
    output.extend_from_slice(data);
    Ok(())
}
