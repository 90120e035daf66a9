//! Sequential (baseline and extended) Huffman scan encoding and decoding.
//!
//! A scan codes its components in a single pass over the full spectral range.
//! MCUs of an interleaved scan hold `H x V` blocks of every scan component;
//! in a single-component scan every MCU is one block.

use crate::error::{CorruptMeError, Result};
use crate::jpeg::huffman::{encode_coefficient, BitReader, BitWriter, HuffmanEncoder, HuffmanLookup};
use crate::jpeg::parser::{FrameHeader, HuffmanTable, Scan, ZIGZAG_TO_NATURAL};
use crate::store::BlockGrid;

/// Block placement of one scan component inside an MCU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LayoutEntry {
    pub component_index: usize,
    /// Blocks per MCU horizontally.
    pub h: usize,
    /// Blocks per MCU vertically.
    pub v: usize,
}

/// MCU geometry of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScanLayout {
    pub mcus_x: usize,
    pub mcus_y: usize,
    /// One entry per scan component, in header order.
    pub entries: Vec<LayoutEntry>,
}

impl ScanLayout {
    pub fn new(frame: &FrameHeader, scan: &Scan) -> Self {
        if scan.header.is_interleaved() {
            let entries = scan
                .header
                .components
                .iter()
                .map(|c| {
                    let component = &frame.components[c.component_index];
                    LayoutEntry {
                        component_index: c.component_index,
                        h: component.h_sampling as usize,
                        v: component.v_sampling as usize,
                    }
                })
                .collect();
            ScanLayout {
                mcus_x: frame.mcus_x(),
                mcus_y: frame.mcus_y(),
                entries,
            }
        } else {
            let component_index = scan.header.components[0].component_index;
            let (mcus_x, mcus_y) = frame.non_interleaved_blocks(component_index);
            ScanLayout {
                mcus_x,
                mcus_y,
                entries: vec![LayoutEntry {
                    component_index,
                    h: 1,
                    v: 1,
                }],
            }
        }
    }

    /// Block grid size of the scan component at `position`.
    pub fn grid_size(&self, position: usize) -> (usize, usize) {
        let entry = &self.entries[position];
        (self.mcus_x * entry.h, self.mcus_y * entry.v)
    }

    pub fn total_mcus(&self) -> usize {
        self.mcus_x * self.mcus_y
    }
}

fn table<'a>(tables: &'a [Option<HuffmanTable>; 4], id: u8, kind: &str) -> Result<&'a HuffmanTable> {
    tables
        .get(id as usize)
        .and_then(Option::as_ref)
        .ok_or_else(|| CorruptMeError::format(format!("missing {} Huffman table {}", kind, id)))
}

/// Decode a scan into `grids`, one grid per scan component in header order.
///
/// Returns the number of blocks decoded.
pub(crate) fn decode_scan(scan: &Scan, layout: &ScanLayout, grids: &mut [BlockGrid]) -> Result<usize> {
    let mut dc_tables = Vec::with_capacity(layout.entries.len());
    let mut ac_tables = Vec::with_capacity(layout.entries.len());
    for component in &scan.header.components {
        dc_tables.push(HuffmanLookup::from_table(table(&scan.dc_tables, component.dc_table_id, "DC")?)?);
        ac_tables.push(HuffmanLookup::from_table(table(&scan.ac_tables, component.ac_table_id, "AC")?)?);
    }

    let mut reader = BitReader::new(&scan.entropy_data);
    let mut dc_predictors = vec![0i32; layout.entries.len()];
    let restart_interval = scan.restart_interval as usize;
    let mut expected_restart = 0u8;
    let mut blocks = 0;

    for mcu in 0..layout.total_mcus() {
        if restart_interval > 0 && mcu > 0 && mcu % restart_interval == 0 {
            let n = reader.read_restart_marker()?;
            if n != expected_restart {
                log::warn!("restart marker RST{} found where RST{} was expected", n, expected_restart);
            }
            expected_restart = (n + 1) & 0x07;
            dc_predictors.fill(0);
        }

        let mcu_x = mcu % layout.mcus_x;
        let mcu_y = mcu / layout.mcus_x;

        for (position, entry) in layout.entries.iter().enumerate() {
            for v in 0..entry.v {
                for h in 0..entry.h {
                    let block = grids[position].block_mut(mcu_x * entry.h + h, mcu_y * entry.v + v);
                    decode_block(
                        &mut reader,
                        block,
                        &dc_tables[position],
                        &ac_tables[position],
                        &mut dc_predictors[position],
                    )?;
                    blocks += 1;
                }
            }
        }
    }

    log::trace!(
        "scan decoded: {} blocks, stopped at byte {} of {}",
        blocks,
        reader.position(),
        scan.entropy_data.len()
    );
    Ok(blocks)
}

/// Encode `grids` (one per scan component, header order) with the scan's
/// original Huffman tables and restart interval.
pub(crate) fn encode_scan(scan: &Scan, layout: &ScanLayout, grids: &[&BlockGrid]) -> Result<Vec<u8>> {
    let mut dc_encoders = Vec::with_capacity(layout.entries.len());
    let mut ac_encoders = Vec::with_capacity(layout.entries.len());
    for component in &scan.header.components {
        dc_encoders.push(HuffmanEncoder::from_table(table(&scan.dc_tables, component.dc_table_id, "DC")?)?);
        ac_encoders.push(HuffmanEncoder::from_table(table(&scan.ac_tables, component.ac_table_id, "AC")?)?);
    }

    let total_blocks: usize = grids.iter().map(|grid| grid.len()).sum();
    let mut writer = BitWriter::with_capacity(total_blocks * 16);
    let mut dc_predictors = vec![0i32; layout.entries.len()];
    let restart_interval = scan.restart_interval as usize;
    let mut next_restart = 0u8;

    for mcu in 0..layout.total_mcus() {
        if restart_interval > 0 && mcu > 0 && mcu % restart_interval == 0 {
            writer.write_restart_marker(next_restart);
            next_restart = (next_restart + 1) & 0x07;
            dc_predictors.fill(0);
        }

        let mcu_x = mcu % layout.mcus_x;
        let mcu_y = mcu / layout.mcus_x;

        for (position, entry) in layout.entries.iter().enumerate() {
            for v in 0..entry.v {
                for h in 0..entry.h {
                    let bx = mcu_x * entry.h + h;
                    let by = mcu_y * entry.v + v;
                    encode_block(
                        &mut writer,
                        grids[position].block(bx, by),
                        &dc_encoders[position],
                        &ac_encoders[position],
                        &mut dc_predictors[position],
                    )
                    .map_err(|err| match err {
                        CorruptMeError::Unencodable { reason } => CorruptMeError::unencodable(format!(
                            "component {} block ({}, {}): {}",
                            entry.component_index, bx, by, reason
                        )),
                        other => other,
                    })?;
                }
            }
        }
    }

    let data = writer.into_bytes();
    log::debug!("scan encoded: {} blocks, {} bytes", total_blocks, data.len());
    Ok(data)
}

/// Encode a single 8x8 block stored in natural order.
fn encode_block(
    writer: &mut BitWriter,
    block: &[i16],
    dc_encoder: &HuffmanEncoder,
    ac_encoder: &HuffmanEncoder,
    dc_predictor: &mut i32,
) -> Result<()> {
    let dc_value = block[0] as i32;
    let dc_diff = dc_value - *dc_predictor;
    *dc_predictor = dc_value;

    let (dc_size, dc_bits) = encode_coefficient(dc_diff);
    if dc_encoder.encode(dc_size).is_none() {
        return Err(CorruptMeError::unencodable(format!(
            "DC difference {} needs category {} which the DC table lacks",
            dc_diff, dc_size
        )));
    }
    writer.write_huffman(dc_size, dc_encoder)?;
    writer.write_bits(dc_bits, dc_size);
    log::trace!(
        "DC: value={}, diff={}, size={}, bits={:0width$b}",
        dc_value,
        dc_diff,
        dc_size,
        dc_bits,
        width = dc_size as usize
    );

    let mut zero_run = 0u8;
    for &natural in &ZIGZAG_TO_NATURAL[1..] {
        let coeff = block[natural];

        if coeff == 0 {
            zero_run += 1;
            continue;
        }

        while zero_run >= 16 {
            writer.write_huffman(0xF0, ac_encoder)?; // ZRL = (15, 0)
            zero_run -= 16;
        }

        let (size, bits) = encode_coefficient(coeff as i32);
        if size > 15 {
            return Err(CorruptMeError::unencodable(format!(
                "AC coefficient {} exceeds the largest AC category",
                coeff
            )));
        }
        let symbol = (zero_run << 4) | size;
        if ac_encoder.encode(symbol).is_none() {
            return Err(CorruptMeError::unencodable(format!(
                "AC coefficient {} after {} zeros needs symbol 0x{:02X} which the AC table lacks",
                coeff, zero_run, symbol
            )));
        }
        writer.write_huffman(symbol, ac_encoder)?;
        writer.write_bits(bits, size);
        zero_run = 0;
    }

    if zero_run > 0 {
        writer.write_huffman(0x00, ac_encoder)?; // EOB = (0, 0)
    }

    Ok(())
}

/// Decode a single 8x8 block into natural order.
fn decode_block(
    reader: &mut BitReader,
    block: &mut [i16],
    dc_table: &HuffmanLookup,
    ac_table: &HuffmanLookup,
    dc_predictor: &mut i32,
) -> Result<()> {
    block.fill(0);

    let dc_size = reader.decode_huffman(dc_table)?;
    if dc_size > 16 {
        return Err(CorruptMeError::format(format!(
            "invalid DC coefficient size: {}",
            dc_size
        )));
    }
    *dc_predictor += reader.receive_extend(dc_size)?;
    block[0] = i16::try_from(*dc_predictor).map_err(|_| {
        CorruptMeError::format(format!("DC coefficient {} out of range", dc_predictor))
    })?;

    let mut k = 1;
    while k < 64 {
        let symbol = reader.decode_huffman(ac_table)?;
        let run = (symbol >> 4) as usize;
        let size = symbol & 0x0F;

        if size == 0 {
            match run {
                0 => break, // EOB
                15 => {
                    k += 16; // ZRL
                    if k > 64 {
                        return Err(CorruptMeError::format("zero run past the end of a block"));
                    }
                    continue;
                }
                _ => {
                    return Err(CorruptMeError::format(format!(
                        "invalid AC run/size: {:02X}",
                        symbol
                    )))
                }
            }
        }

        k += run;
        if k >= 64 {
            return Err(CorruptMeError::format("AC coefficient index out of bounds"));
        }
        block[ZIGZAG_TO_NATURAL[k]] = reader.receive_extend(size)? as i16;
        k += 1;
    }

    Ok(())
}
