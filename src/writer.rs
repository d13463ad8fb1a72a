//! Writer state machine.
//!
//! Writers emit the legacy V1 layout only.  The unpacked writer frames one
//! record per block; the packed writer buffers items into a metadata table
//! plus items region and flushes a block when either the item-count or the
//! byte limit would be exceeded.  An optional transformer applies to the
//! outgoing payload (the items region only, for packed blocks) and an
//! optional indexer receives the byte offset of every block written.
//!
//! I/O failures latch the first error: later writes return `false` and the
//! error stays observable through [`Writer::error`].

use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::debug;

use crate::binary::ErrorReporter;
use crate::block::BaseWriter;
use crate::error::{Error, Result};
use crate::magic::{MAGIC_PACKED, MAGIC_UNPACKED};
use crate::packed::PackedHeaderBuilder;
use crate::transformer::{self, Transformer};

pub const DEFAULT_MAX_PACKED_ITEMS: usize = 16 * 1024;
pub const DEFAULT_MAX_PACKED_BYTES: usize = 16 << 20;

/// Receives the starting byte offset of each block as it is written, in
/// file order.  Returning an error latches it on the writer.
pub trait Indexer {
    fn index_block(&mut self, offset: u64) -> std::result::Result<(), String>;
}

/// Record sink: write items, close, observe the first error.
pub trait Writer {
    /// Append one record.  Returns `false` once an error is latched.
    fn write(&mut self, rec: &[u8]) -> bool;
    /// Flush any buffered block and the underlying sink.  Writes after a
    /// close fail.
    fn close(&mut self) -> bool;
    fn error(&self) -> Option<&Error>;
}

pub struct WriterOpts {
    /// Pack multiple items per block instead of one record per block.
    pub packed: bool,
    pub max_packed_items: usize,
    pub max_packed_bytes: usize,
    pub transformer: Option<Box<dyn Transformer>>,
    pub indexer: Option<Box<dyn Indexer>>,
}

impl Default for WriterOpts {
    fn default() -> Self {
        Self {
            packed: false,
            max_packed_items: DEFAULT_MAX_PACKED_ITEMS,
            max_packed_bytes: DEFAULT_MAX_PACKED_BYTES,
            transformer: None,
            indexer: None,
        }
    }
}

struct UnpackedWriter<W: Write> {
    base: BaseWriter<W>,
    err: ErrorReporter,
    transformer: Option<Box<dyn Transformer>>,
    closed: bool,
}

impl<W: Write> UnpackedWriter<W> {
    fn new(sink: W, opts: WriterOpts) -> Self {
        Self {
            base: BaseWriter::new(sink, MAGIC_UNPACKED, opts.indexer),
            err: ErrorReporter::new(),
            transformer: opts.transformer,
            closed: false,
        }
    }

    fn write_impl(&mut self, rec: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        match self.transformer.as_deref_mut() {
            Some(t) => {
                let out = t.transform(&[rec])?;
                self.base.write_block(&out, &[])
            }
            None => self.base.write_block(rec, &[]),
        }
    }

    fn close_impl(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.base.flush()?;
        self.closed = true;
        Ok(())
    }
}

impl<W: Write> Writer for UnpackedWriter<W> {
    fn write(&mut self, rec: &[u8]) -> bool {
        if !self.err.ok() {
            return false;
        }
        let res = self.write_impl(rec);
        self.err.latch(res).is_some()
    }

    fn close(&mut self) -> bool {
        if !self.err.ok() {
            return false;
        }
        let res = self.close_impl();
        self.err.latch(res).is_some()
    }

    fn error(&self) -> Option<&Error> {
        self.err.get()
    }
}

struct PackedWriter<W: Write> {
    base: BaseWriter<W>,
    err: ErrorReporter,
    transformer: Option<Box<dyn Transformer>>,
    closed: bool,
    builder: PackedHeaderBuilder,
    items: Vec<u8>,
    max_items: usize,
    max_bytes: usize,
}

impl<W: Write> PackedWriter<W> {
    fn new(sink: W, opts: WriterOpts) -> Self {
        Self {
            base: BaseWriter::new(sink, MAGIC_PACKED, opts.indexer),
            err: ErrorReporter::new(),
            transformer: opts.transformer,
            closed: false,
            builder: PackedHeaderBuilder::new(),
            items: Vec::new(),
            max_items: opts.max_packed_items,
            max_bytes: opts.max_packed_bytes,
        }
    }

    fn write_impl(&mut self, item: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        if item.len() > self.max_bytes {
            return Err(Error::ItemTooLarge {
                size: item.len(),
                max: self.max_bytes,
            });
        }
        if self.builder.count() as usize + 1 > self.max_items
            || self.items.len() + item.len() > self.max_bytes
        {
            self.flush_block()?;
        }
        self.builder.add_item_size(item.len());
        self.items.extend_from_slice(item);
        Ok(())
    }

    /// Emit the buffered items as one packed block.  No-op when empty.
    fn flush_block(&mut self) -> Result<()> {
        if self.builder.count() == 0 {
            return Ok(());
        }
        let header = self.builder.build();
        match self.transformer.as_deref_mut() {
            Some(t) => {
                let out = t.transform(&[&self.items])?;
                self.base.write_block(&header, &out)?;
            }
            None => self.base.write_block(&header, &self.items)?,
        }
        self.builder.clear();
        self.items.clear();
        Ok(())
    }

    fn close_impl(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush_block()?;
        self.base.flush()?;
        self.closed = true;
        Ok(())
    }
}

impl<W: Write> Writer for PackedWriter<W> {
    fn write(&mut self, rec: &[u8]) -> bool {
        if !self.err.ok() {
            return false;
        }
        let res = self.write_impl(rec);
        self.err.latch(res).is_some()
    }

    fn close(&mut self) -> bool {
        if !self.err.ok() {
            return false;
        }
        let res = self.close_impl();
        self.err.latch(res).is_some()
    }

    fn error(&self) -> Option<&Error> {
        self.err.get()
    }
}

/// A writer that failed to open; every operation reports the open error.
struct ErrorWriter {
    err: ErrorReporter,
}

impl ErrorWriter {
    fn new(err: Error) -> Self {
        let mut rep = ErrorReporter::new();
        rep.set(err);
        Self { err: rep }
    }
}

impl Writer for ErrorWriter {
    fn write(&mut self, _rec: &[u8]) -> bool {
        false
    }

    fn close(&mut self) -> bool {
        false
    }

    fn error(&self) -> Option<&Error> {
        self.err.get()
    }
}

/// Create a writer over an arbitrary byte sink.
pub fn new_writer<W: Write + 'static>(sink: W, opts: WriterOpts) -> Box<dyn Writer> {
    if opts.packed {
        Box::new(PackedWriter::new(sink, opts))
    } else {
        Box::new(UnpackedWriter::new(sink, opts))
    }
}

/// Pick writer options from a filename hint: `.rpkz` selects packed with
/// the flate transformer, `.rpk` packed, anything else unpacked.
pub fn default_writer_opts(path: &Path) -> WriterOpts {
    let name = path.to_string_lossy();
    let mut opts = WriterOpts::default();
    if name.ends_with(".rpkz") {
        opts.packed = true;
        opts.transformer = transformer::get_transformer(&["flate".to_string()]).ok();
    } else if name.ends_with(".rpk") {
        opts.packed = true;
    }
    opts
}

/// Create the file at `path` with suffix-derived options.  Open failures
/// surface as an immediately-failing writer.
pub fn create_writer<P: AsRef<Path>>(path: P) -> Box<dyn Writer> {
    let path = path.as_ref();
    let opts = default_writer_opts(path);
    debug!(
        "creating {} writer at {}",
        if opts.packed { "packed" } else { "unpacked" },
        path.display()
    );
    match File::create(path) {
        Ok(f) => new_writer(f, opts),
        Err(e) => Box::new(ErrorWriter::new(Error::Io(e))),
    }
}
