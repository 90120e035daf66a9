//! In-memory coefficient storage.
//!
//! One [`BlockGrid`] per frame component, each block holding 64 quantized
//! coefficients in natural (row-major, DC first) order. The store tracks
//! whether any block was replaced since the file was decoded.

use crate::error::{CorruptMeError, Result};

/// Number of coefficients in an 8x8 block.
pub const BLOCK_SIZE: usize = 64;

/// The coefficient blocks of one component, in raster order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockGrid {
    blocks_x: usize,
    blocks_y: usize,
    coefficients: Vec<i16>,
}

impl BlockGrid {
    /// Create a grid of zeroed blocks.
    pub fn new(blocks_x: usize, blocks_y: usize) -> Self {
        BlockGrid {
            blocks_x,
            blocks_y,
            coefficients: vec![0; blocks_x * blocks_y * BLOCK_SIZE],
        }
    }

    #[inline]
    pub fn blocks_x(&self) -> usize {
        self.blocks_x
    }

    #[inline]
    pub fn blocks_y(&self) -> usize {
        self.blocks_y
    }

    /// Total number of blocks.
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks_x * self.blocks_y
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block at (bx, by). Panics if out of range.
    #[inline]
    pub fn block(&self, bx: usize, by: usize) -> &[i16] {
        let start = (by * self.blocks_x + bx) * BLOCK_SIZE;
        &self.coefficients[start..start + BLOCK_SIZE]
    }

    /// Mutable block at (bx, by). Panics if out of range.
    #[inline]
    pub fn block_mut(&mut self, bx: usize, by: usize) -> &mut [i16] {
        let start = (by * self.blocks_x + bx) * BLOCK_SIZE;
        &mut self.coefficients[start..start + BLOCK_SIZE]
    }

    fn contains(&self, bx: usize, by: usize) -> bool {
        bx < self.blocks_x && by < self.blocks_y
    }
}

/// Coefficient blocks of all components plus dirty tracking.
#[derive(Debug, Clone)]
pub struct CoefficientStore {
    grids: Vec<BlockGrid>,
    dirty: bool,
}

impl CoefficientStore {
    /// Wrap freshly decoded grids; the store starts clean.
    pub fn new(grids: Vec<BlockGrid>) -> Self {
        CoefficientStore {
            grids,
            dirty: false,
        }
    }

    pub fn num_components(&self) -> usize {
        self.grids.len()
    }

    pub fn grid(&self, component: usize) -> Result<&BlockGrid> {
        self.grids
            .get(component)
            .ok_or(CorruptMeError::ComponentOutOfRange {
                component,
                count: self.grids.len(),
            })
    }

    pub fn num_blocks_x(&self, component: usize) -> Result<usize> {
        Ok(self.grid(component)?.blocks_x)
    }

    pub fn num_blocks_y(&self, component: usize) -> Result<usize> {
        Ok(self.grid(component)?.blocks_y)
    }

    /// Fails with a range error unless (bx, by) is a block of `component`.
    pub fn check_block(&self, component: usize, bx: usize, by: usize) -> Result<()> {
        self.checked_grid(component, bx, by).map(|_| ())
    }

    fn checked_grid(&self, component: usize, bx: usize, by: usize) -> Result<&BlockGrid> {
        let grid = self.grid(component)?;
        if !grid.contains(bx, by) {
            return Err(CorruptMeError::BlockOutOfRange {
                component,
                bx,
                by,
                blocks_x: grid.blocks_x,
                blocks_y: grid.blocks_y,
            });
        }
        Ok(grid)
    }

    /// Copy of the block at (bx, by) of `component`, natural order.
    pub fn get_block(&self, component: usize, bx: usize, by: usize) -> Result<[i16; BLOCK_SIZE]> {
        let grid = self.checked_grid(component, bx, by)?;
        let mut block = [0i16; BLOCK_SIZE];
        block.copy_from_slice(grid.block(bx, by));
        Ok(block)
    }

    /// Replace the block at (bx, by) of `component` with `values` as given.
    ///
    /// Nothing changes unless `values` holds exactly 64 coefficients and the
    /// coordinate is in range.
    pub fn set_block(&mut self, component: usize, bx: usize, by: usize, values: &[i16]) -> Result<()> {
        self.checked_grid(component, bx, by)?;
        if values.len() != BLOCK_SIZE {
            return Err(CorruptMeError::Shape { len: values.len() });
        }

        self.grids[component].block_mut(bx, by).copy_from_slice(values);
        self.dirty = true;
        Ok(())
    }

    /// True if any block was replaced since the store was created.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
