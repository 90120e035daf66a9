//! JPEG scan data encoding and decoding.
//!
//! Decodes entropy-coded scan data to quantized DCT coefficients and encodes
//! them back, without dequantization or IDCT.

mod sequential;

pub(crate) use sequential::ScanLayout;

use super::parser::{JpegStream, Scan};
use crate::error::{CorruptMeError, Result};
use crate::store::{BlockGrid, CoefficientStore};

/// Decode every scan of a parsed JPEG into a coefficient store.
///
/// Each component gets the block grid of the scan that codes it.
pub fn decode_scans(stream: &JpegStream) -> Result<CoefficientStore> {
    let mut grids: Vec<Option<BlockGrid>> = vec![None; stream.frame.components.len()];

    for (index, scan) in stream.scans.iter().enumerate() {
        let layout = ScanLayout::new(&stream.frame, scan);
        check_block_budget(index, scan, &layout)?;
        let mut scan_grids: Vec<BlockGrid> = (0..layout.entries.len())
            .map(|position| {
                let (blocks_x, blocks_y) = layout.grid_size(position);
                BlockGrid::new(blocks_x, blocks_y)
            })
            .collect();

        let blocks = sequential::decode_scan(scan, &layout, &mut scan_grids)?;
        log::debug!(
            "scan {}: decoded {} blocks in {}x{} MCUs",
            index,
            blocks,
            layout.mcus_x,
            layout.mcus_y
        );

        for (entry, grid) in layout.entries.iter().zip(scan_grids) {
            grids[entry.component_index] = Some(grid);
        }
    }

    let grids = grids
        .into_iter()
        .enumerate()
        .map(|(index, grid)| {
            grid.ok_or_else(|| {
                CorruptMeError::format(format!("component {} is never coded in a scan", index))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CoefficientStore::new(grids))
}

/// Reject scans that declare more blocks than their entropy data can hold.
///
/// Every block costs at least two bits (a DC code and an EOB code), so the
/// grid is never allocated for a header that cannot match its data.
fn check_block_budget(index: usize, scan: &Scan, layout: &ScanLayout) -> Result<()> {
    let total_blocks = (0..layout.entries.len())
        .map(|position| {
            let (blocks_x, blocks_y) = layout.grid_size(position);
            blocks_x.saturating_mul(blocks_y)
        })
        .fold(0usize, usize::saturating_add);
    let capacity = scan.entropy_data.len().saturating_mul(4);
    if total_blocks > capacity {
        return Err(CorruptMeError::format(format!(
            "scan {} codes {} blocks but carries only {} entropy bytes",
            index,
            total_blocks,
            scan.entropy_data.len()
        )));
    }
    Ok(())
}

/// Encode the coefficients of one scan's components from the store.
///
/// Uses the scan's original Huffman tables and restart interval; the result
/// is byte-stuffed entropy data including RST markers.
pub fn encode_scan(stream: &JpegStream, scan: &Scan, store: &CoefficientStore) -> Result<Vec<u8>> {
    let layout = ScanLayout::new(&stream.frame, scan);
    let mut grids = Vec::with_capacity(layout.entries.len());
    for (position, entry) in layout.entries.iter().enumerate() {
        let grid = store.grid(entry.component_index)?;
        if (grid.blocks_x(), grid.blocks_y()) != layout.grid_size(position) {
            return Err(CorruptMeError::unencodable(format!(
                "component {} grid is {}x{} blocks but the scan codes {:?}",
                entry.component_index,
                grid.blocks_x(),
                grid.blocks_y(),
                layout.grid_size(position)
            )));
        }
        grids.push(grid);
    }

    sequential::encode_scan(scan, &layout, &grids)
}
