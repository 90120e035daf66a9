//! Compressed-domain JPEG editing
//!
//! This crate opens baseline and extended-sequential Huffman JPEG files and
//! exposes their quantized DCT coefficients as 8x8 blocks per component.
//! Blocks can be read and overwritten in place; on close the scans are
//! re-encoded with the file's own Huffman tables and written back, leaving
//! every other segment untouched. No pixels are ever decoded.
//!
//! # Layer Responsibilities
//!
//! - [`jpeg`]: marker parsing, Huffman entropy decode and encode, file assembly
//! - [`store`]: the coefficient blocks of all components and dirty tracking
//! - [`session`]: the open / edit / close lifecycle and atomic file replacement
//!
//! # Example
//!
//! ```no_run
//! use corruptme_core::JpegSession;
//!
//! let mut session = JpegSession::open("photo.jpg")?;
//! let (bx, by) = (session.num_blocks_x(0)? / 2, session.num_blocks_y(0)? / 2);
//!
//! let mut block = session.get_block(0, bx, by)?;
//! block[1] = block[1].saturating_add(40);
//! session.set_block(0, bx, by, &block)?;
//!
//! session.close(Some(std::path::Path::new("glitched.jpg")))?;
//! # Ok::<(), corruptme_core::CorruptMeError>(())
//! ```

mod error;
#[cfg(test)]
mod fixtures;
pub mod jpeg;
mod options;
pub mod session;
pub mod store;

pub use error::{CorruptMeError, ErrorKind, Result};
pub use options::{CoefficientOrder, SessionOptions};
pub use session::{ComponentInfo, JpegSession, SessionState};
pub use store::BLOCK_SIZE;
