//! Open, edit and close a JPEG in the coefficient domain.
//!
//! A [`JpegSession`] owns everything decoded from one file. Edits stay in
//! memory until [`JpegSession::close`] re-encodes the scans and replaces the
//! target file in one step.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{CorruptMeError, Result};
use crate::jpeg::{decode_jpeg, write_jpeg, JpegStream, QuantizationTable};
use crate::options::{CoefficientOrder, SessionOptions};
use crate::store::{CoefficientStore, BLOCK_SIZE};

/// A component of the opened frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Component ID as declared in the frame header.
    pub id: u8,
    pub h_sampling: u8,
    pub v_sampling: u8,
    pub quant_table_id: u8,
    /// The quantization table in force when the component's scan was coded.
    pub quant_table: Option<QuantizationTable>,
    pub blocks_x: usize,
    pub blocks_y: usize,
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Open, no block replaced yet.
    Clean,
    /// Open with unsaved edits.
    Dirty,
    Closed,
}

struct OpenImage {
    stream: JpegStream,
    store: CoefficientStore,
    components: Vec<ComponentInfo>,
}

enum State {
    Open(Box<OpenImage>),
    Closed,
}

/// An opened JPEG whose quantized DCT coefficients can be read and replaced.
///
/// Dropping a session with unsaved edits discards them; only
/// [`close`](JpegSession::close) writes to disk.
pub struct JpegSession {
    source: PathBuf,
    options: SessionOptions,
    state: State,
}

impl JpegSession {
    /// Open `path` with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, SessionOptions::default())
    }

    /// Read, parse and decode `path`.
    ///
    /// Either the whole file decodes or no session is created.
    pub fn open_with<P: AsRef<Path>>(path: P, options: SessionOptions) -> Result<Self> {
        let source = path.as_ref().to_path_buf();
        let data = fs::read(&source).map_err(|source_err| CorruptMeError::Open {
            path: source.clone(),
            source: source_err,
        })?;

        let (stream, store) = decode_jpeg(&data, options.keep_trailing_data)?;
        let components = component_infos(&stream, &store)?;

        log::debug!(
            "opened {}: {}x{}, {} component(s), {} bytes",
            source.display(),
            stream.frame.width,
            stream.frame.height,
            components.len(),
            data.len()
        );

        Ok(JpegSession {
            source,
            options,
            state: State::Open(Box::new(OpenImage {
                stream,
                store,
                components,
            })),
        })
    }

    /// Open `path`, run `edit` on the session and close it.
    ///
    /// On success the result is written to `output`, or to `path` if there
    /// were edits and no output is given. If `edit` fails nothing is written
    /// and its error is returned.
    pub fn edit<P, T, F>(path: P, output: Option<&Path>, edit: F) -> Result<T>
    where
        P: AsRef<Path>,
        F: FnOnce(&mut JpegSession) -> Result<T>,
    {
        Self::edit_with(path, SessionOptions::default(), output, edit)
    }

    /// Like [`JpegSession::edit`], opening `path` with `options`.
    pub fn edit_with<P, T, F>(
        path: P,
        options: SessionOptions,
        output: Option<&Path>,
        edit: F,
    ) -> Result<T>
    where
        P: AsRef<Path>,
        F: FnOnce(&mut JpegSession) -> Result<T>,
    {
        let mut session = Self::open_with(path, options)?;
        match edit(&mut session) {
            Ok(value) => {
                session.close(output)?;
                Ok(value)
            }
            Err(err) => {
                log::debug!("edit of {} failed, discarding session", session.source.display());
                session.state = State::Closed;
                Err(err)
            }
        }
    }

    /// Persist edits and release the session.
    ///
    /// With `output` set the image is always written there. Without it, the
    /// source file is rewritten only if blocks were replaced. The session is
    /// closed afterwards even if writing fails; closing again is a no-op.
    pub fn close(&mut self, output: Option<&Path>) -> Result<()> {
        let image = match std::mem::replace(&mut self.state, State::Closed) {
            State::Open(image) => image,
            State::Closed => return Ok(()),
        };

        let target = match output {
            Some(path) => path.to_path_buf(),
            None if image.store.is_dirty() => self.source.clone(),
            None => {
                log::debug!("closed {} without changes", self.source.display());
                return Ok(());
            }
        };

        let bytes = write_jpeg(&image.stream, &image.store)?;
        drop(image);

        persist(&target, &bytes)?;
        log::debug!("wrote {} bytes to {}", bytes.len(), target.display());
        Ok(())
    }

    /// Encode the current coefficients to a complete JPEG without closing.
    pub fn to_jpeg_bytes(&self) -> Result<Vec<u8>> {
        let image = self.image()?;
        write_jpeg(&image.stream, &image.store)
    }

    fn image(&self) -> Result<&OpenImage> {
        match &self.state {
            State::Open(image) => Ok(&**image),
            State::Closed => Err(CorruptMeError::UseAfterClose),
        }
    }

    fn image_mut(&mut self) -> Result<&mut OpenImage> {
        match &mut self.state {
            State::Open(image) => Ok(&mut **image),
            State::Closed => Err(CorruptMeError::UseAfterClose),
        }
    }

    pub fn width(&self) -> Result<u16> {
        Ok(self.image()?.stream.frame.width)
    }

    pub fn height(&self) -> Result<u16> {
        Ok(self.image()?.stream.frame.height)
    }

    /// Width and height in pixels.
    pub fn dimensions(&self) -> Result<(u16, u16)> {
        let frame = &self.image()?.stream.frame;
        Ok((frame.width, frame.height))
    }

    pub fn num_components(&self) -> Result<usize> {
        Ok(self.image()?.components.len())
    }

    /// Component details, including its quantization table.
    pub fn component(&self, component: usize) -> Result<&ComponentInfo> {
        let components = &self.image()?.components;
        components
            .get(component)
            .ok_or(CorruptMeError::ComponentOutOfRange {
                component,
                count: components.len(),
            })
    }

    pub fn quantization_table(&self, component: usize) -> Result<Option<&QuantizationTable>> {
        Ok(self.component(component)?.quant_table.as_ref())
    }

    pub fn num_blocks_x(&self, component: usize) -> Result<usize> {
        self.image()?.store.num_blocks_x(component)
    }

    pub fn num_blocks_y(&self, component: usize) -> Result<usize> {
        self.image()?.store.num_blocks_y(component)
    }

    /// Copy of the 64 quantized coefficients of block (bx, by), in the
    /// configured coefficient order.
    pub fn get_block(&self, component: usize, bx: usize, by: usize) -> Result<[i16; BLOCK_SIZE]> {
        let block = self.image()?.store.get_block(component, bx, by)?;
        Ok(self.options.coefficient_order.reorder_natural(block))
    }

    /// Replace block (bx, by) with `values`, given in the configured
    /// coefficient order. Values are stored verbatim; whether they can be
    /// encoded is only checked on close.
    pub fn set_block(&mut self, component: usize, bx: usize, by: usize, values: &[i16]) -> Result<()> {
        let order = self.options.coefficient_order;
        let store = &mut self.image_mut()?.store;

        match order {
            CoefficientOrder::Natural => store.set_block(component, bx, by, values),
            CoefficientOrder::Zigzag => {
                store.check_block(component, bx, by)?;
                if values.len() != BLOCK_SIZE {
                    return Err(CorruptMeError::Shape { len: values.len() });
                }
                store.set_block(component, bx, by, &order.to_natural(values))
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.state() == SessionState::Dirty
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    pub fn state(&self) -> SessionState {
        match &self.state {
            State::Open(image) if image.store.is_dirty() => SessionState::Dirty,
            State::Open(_) => SessionState::Clean,
            State::Closed => SessionState::Closed,
        }
    }

    /// The file the session was opened from.
    pub fn source_path(&self) -> &Path {
        &self.source
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }
}

impl Drop for JpegSession {
    fn drop(&mut self) {
        if self.is_dirty() {
            log::warn!(
                "discarding unsaved edits to {}: session dropped without close",
                self.source.display()
            );
        }
    }
}

impl std::fmt::Debug for JpegSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JpegSession")
            .field("source", &self.source)
            .field("options", &self.options)
            .field("state", &self.state())
            .finish()
    }
}

fn component_infos(stream: &JpegStream, store: &CoefficientStore) -> Result<Vec<ComponentInfo>> {
    stream
        .frame
        .components
        .iter()
        .enumerate()
        .map(|(index, component)| {
            let quant_table = stream
                .scans
                .iter()
                .find(|scan| scan.header.components.iter().any(|c| c.component_index == index))
                .and_then(|scan| scan.quant_tables[component.quant_table_id as usize].clone());
            if quant_table.is_none() {
                log::warn!(
                    "component {} refers to undefined quantization table {}",
                    component.id,
                    component.quant_table_id
                );
            }

            Ok(ComponentInfo {
                id: component.id,
                h_sampling: component.h_sampling,
                v_sampling: component.v_sampling,
                quant_table_id: component.quant_table_id,
                quant_table,
                blocks_x: store.num_blocks_x(index)?,
                blocks_y: store.num_blocks_y(index)?,
            })
        })
        .collect()
}

/// Write `bytes` to a temporary file next to `target` and rename it over
/// `target`, so readers never see a partial file.
fn persist(target: &Path, bytes: &[u8]) -> Result<()> {
    let write_error = |source: std::io::Error| CorruptMeError::Write {
        path: target.to_path_buf(),
        source,
    };

    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(write_error)?;
    if let Ok(metadata) = fs::metadata(target) {
        // keep the mode of the file we replace
        file.as_file()
            .set_permissions(metadata.permissions())
            .map_err(write_error)?;
    }
    file.write_all(bytes).map_err(write_error)?;
    file.as_file().sync_all().map_err(write_error)?;
    file.persist(target).map_err(|err| write_error(err.error))?;
    Ok(())
}
