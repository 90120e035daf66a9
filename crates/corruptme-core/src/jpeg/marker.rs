//! JPEG marker codes (ITU T.81 Table B.1).

/// A marker, i.e. the byte following a `0xFF` prefix.
///
/// Every marker byte maps to exactly one variant and back, so segments the
/// parser does not interpret can be re-emitted with their original code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum Marker {
    /// Start of Frame, parameter is the SOF type (0-15, without 4, 8 and 12).
    SOF(u8),
    /// Reserved for JPEG extensions.
    JPG,
    /// Define Huffman Table.
    DHT,
    /// Define Arithmetic Coding conditioning.
    DAC,
    /// Restart marker (0-7).
    RST(u8),
    /// Start of Image.
    SOI,
    /// End of Image.
    EOI,
    /// Start of Scan.
    SOS,
    /// Define Quantization Table.
    DQT,
    /// Define Number of Lines.
    DNL,
    /// Define Restart Interval.
    DRI,
    /// Define Hierarchical Progression.
    DHP,
    /// Expand Reference Component.
    EXP,
    /// Application segment (0-15).
    APP(u8),
    /// JPEG extension (0-13).
    JPGn(u8),
    /// Comment.
    COM,
    /// Temporary marker for arithmetic coding.
    TEM,
    /// Reserved, keeps the raw code (0x02-0xBF).
    RES(u8),
}

impl Marker {
    /// Returns true if a 2-byte length field follows this marker.
    pub fn has_length(self) -> bool {
        !matches!(
            self,
            Marker::RST(..) | Marker::SOI | Marker::EOI | Marker::TEM
        )
    }

    /// Convert a byte to a Marker.
    ///
    /// Returns None for 0x00 (stuffed byte) and 0xFF (fill byte).
    pub fn from_u8(n: u8) -> Option<Marker> {
        use Marker::*;
        match n {
            0x00 | 0xFF => None,
            0x01 => Some(TEM),
            0x02..=0xBF => Some(RES(n)),
            0xC4 => Some(DHT),
            0xC8 => Some(JPG),
            0xCC => Some(DAC),
            0xC0..=0xCF => Some(SOF(n - 0xC0)),
            0xD0..=0xD7 => Some(RST(n - 0xD0)),
            0xD8 => Some(SOI),
            0xD9 => Some(EOI),
            0xDA => Some(SOS),
            0xDB => Some(DQT),
            0xDC => Some(DNL),
            0xDD => Some(DRI),
            0xDE => Some(DHP),
            0xDF => Some(EXP),
            0xE0..=0xEF => Some(APP(n - 0xE0)),
            0xF0..=0xFD => Some(JPGn(n - 0xF0)),
            0xFE => Some(COM),
        }
    }

    /// Convert marker back to its byte representation.
    pub fn to_u8(self) -> u8 {
        use Marker::*;
        match self {
            TEM => 0x01,
            RES(n) => n,
            SOF(n) => 0xC0 + n,
            JPG => 0xC8,
            DHT => 0xC4,
            DAC => 0xCC,
            RST(n) => 0xD0 + n,
            SOI => 0xD8,
            EOI => 0xD9,
            SOS => 0xDA,
            DQT => 0xDB,
            DNL => 0xDC,
            DRI => 0xDD,
            DHP => 0xDE,
            EXP => 0xDF,
            APP(n) => 0xE0 + n,
            JPGn(n) => 0xF0 + n,
            COM => 0xFE,
        }
    }
}
