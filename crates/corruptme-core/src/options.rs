use crate::jpeg::{NATURAL_TO_ZIGZAG, ZIGZAG_TO_NATURAL};
use crate::store::BLOCK_SIZE;

/// Session configuration for opening and editing a JPEG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Order of the 64 coefficients in blocks passed to and returned from
    /// `get_block` / `set_block`.
    pub coefficient_order: CoefficientOrder,

    /// If true, bytes following the EOI marker are written back after EOI,
    /// otherwise they are dropped on close.
    pub keep_trailing_data: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            coefficient_order: CoefficientOrder::Natural,
            keep_trailing_data: true,
        }
    }
}

impl SessionOptions {
    pub fn with_coefficient_order(mut self, order: CoefficientOrder) -> Self {
        self.coefficient_order = order;
        self
    }

    pub fn with_keep_trailing_data(mut self, keep: bool) -> Self {
        self.keep_trailing_data = keep;
        self
    }
}

/// Layout of the coefficients inside a block payload
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoefficientOrder {
    /// Row-major 8x8, index `row * 8 + col`, DC first.
    #[default]
    Natural,
    /// The order coefficients are entropy coded in, DC first.
    Zigzag,
}

impl CoefficientOrder {
    /// Convert a natural-order block to this order.
    pub(crate) fn reorder_natural(self, block: [i16; BLOCK_SIZE]) -> [i16; BLOCK_SIZE] {
        match self {
            CoefficientOrder::Natural => block,
            CoefficientOrder::Zigzag => {
                let mut out = [0i16; BLOCK_SIZE];
                for (zigzag, value) in out.iter_mut().enumerate() {
                    *value = block[ZIGZAG_TO_NATURAL[zigzag]];
                }
                out
            }
        }
    }

    /// Convert a block in this order to natural order.
    ///
    /// `values` must hold exactly 64 coefficients.
    pub(crate) fn to_natural(self, values: &[i16]) -> [i16; BLOCK_SIZE] {
        let mut out = [0i16; BLOCK_SIZE];
        match self {
            CoefficientOrder::Natural => out.copy_from_slice(values),
            CoefficientOrder::Zigzag => {
                for (natural, value) in out.iter_mut().enumerate() {
                    *value = values[NATURAL_TO_ZIGZAG[natural]];
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> [i16; BLOCK_SIZE] {
        let mut block = [0i16; BLOCK_SIZE];
        for (i, value) in block.iter_mut().enumerate() {
            *value = i as i16 * 10 - 300;
        }
        block
    }

    #[test]
    fn test_defaults() {
        let options = SessionOptions::default();
        assert_eq!(options.coefficient_order, CoefficientOrder::Natural);
        assert!(options.keep_trailing_data);
    }

    #[test]
    fn test_builder() {
        let options = SessionOptions::default()
            .with_coefficient_order(CoefficientOrder::Zigzag)
            .with_keep_trailing_data(false);
        assert_eq!(options.coefficient_order, CoefficientOrder::Zigzag);
        assert!(!options.keep_trailing_data);
    }

    #[test]
    fn test_natural_order_is_identity() {
        let block = ramp();
        assert_eq!(CoefficientOrder::Natural.reorder_natural(block), block);
        assert_eq!(CoefficientOrder::Natural.to_natural(&block), block);
    }

    #[test]
    fn test_zigzag_positions() {
        let zigzag = CoefficientOrder::Zigzag.reorder_natural(ramp());
        let natural = ramp();
        // second zigzag entry is (row 0, col 1), third is (row 1, col 0)
        assert_eq!(zigzag[0], natural[0]);
        assert_eq!(zigzag[1], natural[1]);
        assert_eq!(zigzag[2], natural[8]);
        assert_eq!(zigzag[63], natural[63]);
        assert_eq!(CoefficientOrder::Zigzag.to_natural(&zigzag), natural);
    }
}
