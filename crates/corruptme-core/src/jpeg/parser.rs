//! JPEG segment parsing.
//!
//! Walks the marker segments of a sequential JPEG in file order and keeps:
//! - every non-scan segment verbatim, for pass-through on write
//! - quantization tables (DQT) and Huffman tables (DHT) as they are defined
//! - frame info (SOF)
//! - per scan (SOS) its header, the tables in force and its entropy-coded data
//!
//! Nothing is decoded here; see [`crate::jpeg::scan`] for the entropy decoding.

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};

use super::huffman::derive_huffman_codes;
use super::marker::Marker;
use crate::error::{CorruptMeError, Result};

/// Zigzag order to natural (row-major) order mapping.
/// JPEG stores quantization/coefficient values in zigzag order.
pub const ZIGZAG_TO_NATURAL: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27, 20,
    13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58, 59,
    52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// Natural (row-major) order to zigzag order mapping.
pub const NATURAL_TO_ZIGZAG: [usize; 64] = [
    0, 1, 5, 6, 14, 15, 27, 28, 2, 4, 7, 13, 16, 26, 29, 42, 3, 8, 12, 17, 25, 30, 41, 43, 9, 11,
    18, 24, 31, 40, 44, 53, 10, 19, 23, 32, 39, 45, 52, 54, 20, 22, 33, 38, 46, 51, 55, 60, 21, 34,
    37, 47, 50, 56, 59, 61, 35, 36, 48, 49, 57, 58, 62, 63,
];

/// Most blocks a single MCU of an interleaved scan may hold (B.2.3).
const MAX_BLOCKS_PER_MCU: usize = 10;

/// A JPEG quantization table (8x8 = 64 values).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizationTable {
    /// Table ID (0-3).
    pub id: u8,
    /// Precision: 0 = 8-bit, 1 = 16-bit.
    pub precision: u8,
    /// Table values in zigzag order (as stored in JPEG).
    pub values: [u16; 64],
}

impl QuantizationTable {
    /// Get value at natural (row, col) position.
    #[inline]
    pub fn get_natural(&self, row: usize, col: usize) -> u16 {
        self.values[NATURAL_TO_ZIGZAG[row * 8 + col]]
    }
}

/// Huffman table definition as stored in a DHT segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    /// Table class: 0 = DC, 1 = AC.
    pub class: u8,
    /// Table ID (0-3).
    pub id: u8,
    /// Number of codes of each length (1-16 bits).
    pub code_lengths: [u8; 16],
    /// Symbol values (up to 256).
    pub values: Vec<u8>,
}

/// A component as declared in the SOF segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameComponent {
    /// Component ID.
    pub id: u8,
    /// Horizontal sampling factor.
    pub h_sampling: u8,
    /// Vertical sampling factor.
    pub v_sampling: u8,
    /// Quantization table ID to use.
    pub quant_table_id: u8,
}

/// Frame information from the SOF marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// SOF type (0 = baseline, 1 = extended sequential).
    pub sof_type: u8,
    /// Sample precision, always 8 for accepted frames.
    pub precision: u8,
    /// Image height in pixels.
    pub height: u16,
    /// Image width in pixels.
    pub width: u16,
    pub components: Vec<FrameComponent>,
}

impl FrameHeader {
    pub fn h_max(&self) -> usize {
        self.components
            .iter()
            .map(|c| c.h_sampling as usize)
            .max()
            .unwrap_or(1)
    }

    pub fn v_max(&self) -> usize {
        self.components
            .iter()
            .map(|c| c.v_sampling as usize)
            .max()
            .unwrap_or(1)
    }

    /// Number of MCU columns of an interleaved scan.
    pub fn mcus_x(&self) -> usize {
        (self.width as usize).div_ceil(self.h_max() * 8)
    }

    /// Number of MCU rows of an interleaved scan.
    pub fn mcus_y(&self) -> usize {
        (self.height as usize).div_ceil(self.v_max() * 8)
    }

    /// Block grid of a component when it is coded in an interleaved scan.
    pub fn interleaved_blocks(&self, index: usize) -> (usize, usize) {
        let component = &self.components[index];
        (
            self.mcus_x() * component.h_sampling as usize,
            self.mcus_y() * component.v_sampling as usize,
        )
    }

    /// Block grid of a component when it is coded alone in its scan.
    pub fn non_interleaved_blocks(&self, index: usize) -> (usize, usize) {
        let component = &self.components[index];
        let samples_x =
            (self.width as usize * component.h_sampling as usize).div_ceil(self.h_max());
        let samples_y =
            (self.height as usize * component.v_sampling as usize).div_ceil(self.v_max());
        (samples_x.div_ceil(8), samples_y.div_ceil(8))
    }
}

/// A component selector inside an SOS header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanComponent {
    /// Index into [`FrameHeader::components`].
    pub component_index: usize,
    pub dc_table_id: u8,
    pub ac_table_id: u8,
}

/// Parsed SOS header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHeader {
    pub components: Vec<ScanComponent>,
    pub spectral_start: u8,
    pub spectral_end: u8,
    pub approx_high: u8,
    pub approx_low: u8,
}

impl ScanHeader {
    /// True if the scan interleaves more than one component.
    pub fn is_interleaved(&self) -> bool {
        self.components.len() > 1
    }
}

/// One scan with everything needed to decode and re-encode it.
#[derive(Debug, Clone)]
pub struct Scan {
    pub header: ScanHeader,
    /// SOS payload exactly as read (without marker and length).
    pub raw_header: Vec<u8>,
    /// DC Huffman tables in force at this SOS (indexed by ID).
    pub dc_tables: [Option<HuffmanTable>; 4],
    /// AC Huffman tables in force at this SOS (indexed by ID).
    pub ac_tables: [Option<HuffmanTable>; 4],
    /// Quantization tables in force at this SOS (indexed by ID).
    pub quant_tables: [Option<QuantizationTable>; 4],
    /// Restart interval in MCUs (0 if not set).
    pub restart_interval: u16,
    /// Entropy-coded data, byte stuffing and RST markers included.
    pub entropy_data: Vec<u8>,
}

/// A piece of the file in its original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A length-bearing segment kept verbatim (excluding marker and length bytes).
    Raw { marker: Marker, data: Vec<u8> },
    /// Placeholder for the scan with this index in [`JpegStream::scans`].
    Scan { index: usize },
}

/// Parsed JPEG structure containing all segments needed for transcoding.
#[derive(Debug, Clone)]
pub struct JpegStream {
    /// All segments in order (for reconstruction).
    pub segments: Vec<Segment>,
    pub frame: FrameHeader,
    pub scans: Vec<Scan>,
    /// Bytes found after EOI.
    pub trailing: Vec<u8>,
}

impl JpegStream {
    /// Drop the entropy-coded data once the scans have been decoded.
    pub fn discard_entropy_data(&mut self) {
        for scan in &mut self.scans {
            scan.entropy_data = Vec::new();
        }
    }
}

#[derive(Default)]
struct ParseState {
    segments: Vec<Segment>,
    quant_tables: [Option<QuantizationTable>; 4],
    dc_tables: [Option<HuffmanTable>; 4],
    ac_tables: [Option<HuffmanTable>; 4],
    frame: Option<FrameHeader>,
    restart_interval: u16,
    scans: Vec<Scan>,
}

/// Parse a complete JPEG file into its segments and scans.
///
/// With `keep_trailing` set, bytes after EOI are kept in [`JpegStream::trailing`].
pub fn parse_jpeg(data: &[u8], keep_trailing: bool) -> Result<JpegStream> {
    let mut cursor = Cursor::new(data);
    let mut state = ParseState::default();

    let soi = cursor.read_u16::<BigEndian>().map_err(truncated)?;
    if soi != 0xFFD8 {
        return Err(CorruptMeError::format(
            "not a JPEG file (missing SOI marker)",
        ));
    }

    let mut pending: Option<Marker> = None;
    let mut reached_eoi = false;

    loop {
        let marker = match pending.take() {
            Some(marker) => marker,
            None => match read_marker(&mut cursor)? {
                Some(marker) => marker,
                None => break,
            },
        };

        match marker {
            Marker::EOI => {
                reached_eoi = true;
                break;
            }
            Marker::SOI => return Err(CorruptMeError::format("unexpected SOI marker")),
            Marker::SOF(n) => {
                let data = read_segment(&mut cursor)?;
                if state.frame.is_some() {
                    return Err(CorruptMeError::format("more than one SOF segment"));
                }
                state.frame = Some(parse_sof(n, &data)?);
                state.segments.push(Segment::Raw { marker, data });
            }
            Marker::DAC => {
                return Err(CorruptMeError::format("arithmetic coding is not supported"));
            }
            Marker::DNL => {
                return Err(CorruptMeError::format("DNL segments are not supported"));
            }
            Marker::DQT => {
                let data = read_segment(&mut cursor)?;
                parse_dqt(&data, &mut state)?;
                state.segments.push(Segment::Raw { marker, data });
            }
            Marker::DHT => {
                let data = read_segment(&mut cursor)?;
                parse_dht(&data, &mut state)?;
                state.segments.push(Segment::Raw { marker, data });
            }
            Marker::DRI => {
                let data = read_segment(&mut cursor)?;
                if data.len() != 2 {
                    return Err(CorruptMeError::format(format!(
                        "DRI segment has {} bytes, expected 2",
                        data.len()
                    )));
                }
                state.restart_interval = u16::from_be_bytes([data[0], data[1]]);
                state.segments.push(Segment::Raw { marker, data });
            }
            Marker::SOS => {
                let raw_header = read_segment(&mut cursor)?;
                let header = parse_sos(&raw_header, &state)?;
                let (entropy_data, next) = read_entropy_data(&mut cursor);
                pending = next;

                let index = state.scans.len();
                log::debug!(
                    "scan {}: {} component(s), {} entropy bytes, restart interval {}",
                    index,
                    header.components.len(),
                    entropy_data.len(),
                    state.restart_interval
                );
                state.scans.push(Scan {
                    header,
                    raw_header,
                    dc_tables: state.dc_tables.clone(),
                    ac_tables: state.ac_tables.clone(),
                    quant_tables: state.quant_tables.clone(),
                    restart_interval: state.restart_interval,
                    entropy_data,
                });
                state.segments.push(Segment::Scan { index });
            }
            _ if marker.has_length() => {
                // APPn, COM and anything else we pass through untouched
                let data = read_segment(&mut cursor)?;
                state.segments.push(Segment::Raw { marker, data });
            }
            _ => {
                return Err(CorruptMeError::format(format!(
                    "unexpected {:?} marker outside of a scan",
                    marker
                )));
            }
        }
    }

    if !reached_eoi {
        return Err(CorruptMeError::format("missing EOI marker"));
    }

    let frame = state
        .frame
        .ok_or_else(|| CorruptMeError::format("missing frame header (SOF)"))?;
    if state.scans.is_empty() {
        return Err(CorruptMeError::format("missing scan (SOS)"));
    }
    for (index, component) in frame.components.iter().enumerate() {
        let coded = state
            .scans
            .iter()
            .any(|scan| scan.header.components.iter().any(|c| c.component_index == index));
        if !coded {
            return Err(CorruptMeError::format(format!(
                "component {} is never coded in a scan",
                component.id
            )));
        }
    }

    let trailing = if keep_trailing {
        data[cursor.position() as usize..].to_vec()
    } else {
        Vec::new()
    };

    Ok(JpegStream {
        segments: state.segments,
        frame,
        scans: state.scans,
        trailing,
    })
}

fn truncated(_: std::io::Error) -> CorruptMeError {
    CorruptMeError::format("unexpected end of file")
}

/// Read the next marker, or None at the end of the data.
fn read_marker(cursor: &mut Cursor<&[u8]>) -> Result<Option<Marker>> {
    let byte = match cursor.read_u8() {
        Ok(byte) => byte,
        Err(_) => return Ok(None),
    };
    if byte != 0xFF {
        return Err(CorruptMeError::format(format!(
            "expected marker at offset {}, found 0x{:02X}",
            cursor.position() - 1,
            byte
        )));
    }

    // Skip fill bytes (0xFF), read marker byte
    loop {
        let code = cursor.read_u8().map_err(truncated)?;
        if code != 0xFF {
            return Marker::from_u8(code).map(Some).ok_or_else(|| {
                CorruptMeError::format(format!("invalid marker byte: 0x{:02X}", code))
            });
        }
    }
}

/// Read a length-prefixed segment payload (the length includes its own 2 bytes).
fn read_segment(cursor: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let length = cursor.read_u16::<BigEndian>().map_err(truncated)? as usize;
    if length < 2 {
        return Err(CorruptMeError::format("segment length too small"));
    }
    let mut data = vec![0u8; length - 2];
    cursor.read_exact(&mut data).map_err(|_| {
        CorruptMeError::format(format!("segment of {} bytes is truncated", length))
    })?;
    Ok(data)
}

/// Read entropy-coded data up to the next marker that is not RSTn.
///
/// Byte stuffing (0xFF 0x00), fill bytes and restart markers stay in the
/// returned data; the scan decoder deals with them. The terminating marker is
/// consumed and returned.
fn read_entropy_data(cursor: &mut Cursor<&[u8]>) -> (Vec<u8>, Option<Marker>) {
    let data = *cursor.get_ref();
    let start = cursor.position() as usize;
    let mut pos = start;

    while pos < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }

        let mut next = pos + 1;
        while next < data.len() && data[next] == 0xFF {
            next += 1;
        }
        match data.get(next) {
            None => break,
            Some(0x00) | Some(0xD0..=0xD7) => pos = next + 1,
            Some(&code) => {
                cursor.set_position(next as u64 + 1);
                return (data[start..pos].to_vec(), Marker::from_u8(code));
            }
        }
    }

    cursor.set_position(data.len() as u64);
    (data[start..].to_vec(), None)
}

/// Parse DQT (Define Quantization Table) segment.
fn parse_dqt(data: &[u8], state: &mut ParseState) -> Result<()> {
    let mut pos = 0;

    while pos < data.len() {
        let pq_tq = data[pos];
        let precision = pq_tq >> 4;
        let id = pq_tq & 0x0F;
        pos += 1;

        if precision > 1 || id > 3 {
            return Err(CorruptMeError::format(format!(
                "invalid quantization table: precision={}, id={}",
                precision, id
            )));
        }

        let entry_size = if precision == 0 { 1 } else { 2 };
        if pos + 64 * entry_size > data.len() {
            return Err(CorruptMeError::format("DQT segment too short"));
        }

        let mut values = [0u16; 64];
        for (i, value) in values.iter_mut().enumerate() {
            *value = if precision == 0 {
                data[pos + i] as u16
            } else {
                u16::from_be_bytes([data[pos + 2 * i], data[pos + 2 * i + 1]])
            };
        }
        pos += 64 * entry_size;

        state.quant_tables[id as usize] = Some(QuantizationTable {
            id,
            precision,
            values,
        });
    }

    Ok(())
}

/// Parse DHT (Define Huffman Table) segment.
fn parse_dht(data: &[u8], state: &mut ParseState) -> Result<()> {
    let mut pos = 0;

    while pos < data.len() {
        let tc_th = data[pos];
        let class = tc_th >> 4; // 0 = DC, 1 = AC
        let id = tc_th & 0x0F;
        pos += 1;

        if class > 1 || id > 3 {
            return Err(CorruptMeError::format(format!(
                "invalid Huffman table: class={}, id={}",
                class, id
            )));
        }

        if pos + 16 > data.len() {
            return Err(CorruptMeError::format(
                "DHT segment too short for code lengths",
            ));
        }
        let mut code_lengths = [0u8; 16];
        code_lengths.copy_from_slice(&data[pos..pos + 16]);
        pos += 16;

        let total_codes: usize = code_lengths.iter().map(|&n| n as usize).sum();
        if pos + total_codes > data.len() {
            return Err(CorruptMeError::format(
                "DHT segment too short for symbol values",
            ));
        }
        let values = data[pos..pos + total_codes].to_vec();
        pos += total_codes;

        // reject tables that do not form a prefix code right away
        derive_huffman_codes(&code_lengths)?;

        let table = HuffmanTable {
            class,
            id,
            code_lengths,
            values,
        };
        if class == 0 {
            state.dc_tables[id as usize] = Some(table);
        } else {
            state.ac_tables[id as usize] = Some(table);
        }
    }

    Ok(())
}

/// Parse SOF (Start of Frame) segment.
fn parse_sof(sof_type: u8, data: &[u8]) -> Result<FrameHeader> {
    match sof_type {
        0 | 1 => {}
        2 => return Err(CorruptMeError::format("progressive JPEGs are not supported")),
        3 | 7 | 11 | 15 => {
            return Err(CorruptMeError::format("lossless JPEGs are not supported"))
        }
        5 | 6 => {
            return Err(CorruptMeError::format(
                "hierarchical JPEGs are not supported",
            ))
        }
        _ => return Err(CorruptMeError::format("arithmetic coding is not supported")),
    }

    if data.len() < 6 {
        return Err(CorruptMeError::format("SOF segment too short"));
    }

    let precision = data[0];
    let height = u16::from_be_bytes([data[1], data[2]]);
    let width = u16::from_be_bytes([data[3], data[4]]);
    let num_components = data[5] as usize;

    if precision != 8 {
        return Err(CorruptMeError::format(format!(
            "{}-bit sample precision is not supported",
            precision
        )));
    }
    if height == 0 {
        return Err(CorruptMeError::format(
            "frames with height defined by DNL are not supported",
        ));
    }
    if width == 0 {
        return Err(CorruptMeError::format("frame width is zero"));
    }
    if !(1..=4).contains(&num_components) {
        return Err(CorruptMeError::format(format!(
            "unsupported number of components: {}",
            num_components
        )));
    }
    if data.len() != 6 + num_components * 3 {
        return Err(CorruptMeError::format(format!(
            "SOF segment has {} bytes, expected {}",
            data.len(),
            6 + num_components * 3
        )));
    }

    let mut components: Vec<FrameComponent> = Vec::with_capacity(num_components);
    for i in 0..num_components {
        let offset = 6 + i * 3;
        let id = data[offset];
        let h_sampling = data[offset + 1] >> 4;
        let v_sampling = data[offset + 1] & 0x0F;
        let quant_table_id = data[offset + 2];

        if !(1..=4).contains(&h_sampling) || !(1..=4).contains(&v_sampling) {
            return Err(CorruptMeError::format(format!(
                "invalid sampling factors {}x{} for component {}",
                h_sampling, v_sampling, id
            )));
        }
        if quant_table_id > 3 {
            return Err(CorruptMeError::format(format!(
                "invalid quantization table ID {} for component {}",
                quant_table_id, id
            )));
        }
        if components.iter().any(|c| c.id == id) {
            return Err(CorruptMeError::format(format!(
                "duplicate component ID {}",
                id
            )));
        }

        components.push(FrameComponent {
            id,
            h_sampling,
            v_sampling,
            quant_table_id,
        });
    }

    Ok(FrameHeader {
        sof_type,
        precision,
        height,
        width,
        components,
    })
}

/// Parse SOS (Start of Scan) header and check it against the frame and tables.
fn parse_sos(data: &[u8], state: &ParseState) -> Result<ScanHeader> {
    let frame = state
        .frame
        .as_ref()
        .ok_or_else(|| CorruptMeError::format("SOS before SOF"))?;

    if data.is_empty() {
        return Err(CorruptMeError::format("SOS header empty"));
    }
    let num_components = data[0] as usize;
    if !(1..=4).contains(&num_components) {
        return Err(CorruptMeError::format(format!(
            "invalid number of scan components: {}",
            num_components
        )));
    }
    if data.len() != 1 + num_components * 2 + 3 {
        return Err(CorruptMeError::format(format!(
            "SOS header has {} bytes, expected {}",
            data.len(),
            1 + num_components * 2 + 3
        )));
    }

    let mut components: Vec<ScanComponent> = Vec::with_capacity(num_components);
    for i in 0..num_components {
        let offset = 1 + i * 2;
        let component_id = data[offset];
        let dc_table_id = data[offset + 1] >> 4;
        let ac_table_id = data[offset + 1] & 0x0F;

        let component_index = frame
            .components
            .iter()
            .position(|c| c.id == component_id)
            .ok_or_else(|| {
                CorruptMeError::format(format!(
                    "scan references unknown component {}",
                    component_id
                ))
            })?;
        if components.iter().any(|c| c.component_index == component_index) {
            return Err(CorruptMeError::format(format!(
                "component {} appears twice in one scan",
                component_id
            )));
        }
        if state.scans.iter().any(|scan| {
            scan.header
                .components
                .iter()
                .any(|c| c.component_index == component_index)
        }) {
            return Err(CorruptMeError::format(format!(
                "component {} is coded by more than one scan",
                component_id
            )));
        }
        if dc_table_id > 3 || state.dc_tables[dc_table_id as usize].is_none() {
            return Err(CorruptMeError::format(format!(
                "missing DC Huffman table {}",
                dc_table_id
            )));
        }
        if ac_table_id > 3 || state.ac_tables[ac_table_id as usize].is_none() {
            return Err(CorruptMeError::format(format!(
                "missing AC Huffman table {}",
                ac_table_id
            )));
        }

        components.push(ScanComponent {
            component_index,
            dc_table_id,
            ac_table_id,
        });
    }

    let tail = &data[1 + num_components * 2..];
    let header = ScanHeader {
        components,
        spectral_start: tail[0],
        spectral_end: tail[1],
        approx_high: tail[2] >> 4,
        approx_low: tail[2] & 0x0F,
    };

    if header.spectral_start != 0
        || header.spectral_end != 63
        || header.approx_high != 0
        || header.approx_low != 0
    {
        return Err(CorruptMeError::format(format!(
            "scan parameters Ss={} Se={} Ah={} Al={} are not sequential",
            header.spectral_start, header.spectral_end, header.approx_high, header.approx_low
        )));
    }

    if header.is_interleaved() {
        let blocks_per_mcu: usize = header
            .components
            .iter()
            .map(|c| {
                let component = &frame.components[c.component_index];
                component.h_sampling as usize * component.v_sampling as usize
            })
            .sum();
        if blocks_per_mcu > MAX_BLOCKS_PER_MCU {
            return Err(CorruptMeError::format(format!(
                "interleaved scan with {} blocks per MCU",
                blocks_per_mcu
            )));
        }
    }

    Ok(header)
}
