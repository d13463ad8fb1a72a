//! Reader state machine.
//!
//! [`new_reader`] probes the first eight bytes of the source: the unpacked
//! or packed magic selects a legacy V1 reader, anything else the chunked
//! V2 reader.  The V2 reader decodes the header block up front, resolves
//! the untransformer named there, locates the trailer when announced, and
//! then yields items block by block.  Random access uses an
//! [`ItemLocation`]: the byte offset of a block plus an item index within
//! it, as reported by the writer's indexer.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;

use crate::binary::{iovec_flatten, ErrorReporter};
use crate::chunk::{ChunkReader, CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::header::{self, HeaderEntry};
use crate::legacy::{PackedReader, UnpackedReader};
use crate::magic::{
    magic_hex, Magic, MAGIC_HEADER, MAGIC_PACKED, MAGIC_TRAILER, MAGIC_UNPACKED,
};
use crate::packed::PackedBlock;
use crate::transformer::{self, Transformer};

/// Position of one item for random access: the byte offset of its block
/// and the item's index within that block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemLocation {
    pub block: u64,
    pub item: u32,
}

/// Record source: iterate items, observe metadata, seek.
///
/// `get` borrows the current item; the slice is invalidated by the next
/// `scan`.  `take` returns an owned copy the caller may keep.
pub trait Reader {
    /// Advance to the next item.  Returns `false` on end of stream or
    /// error; the two are distinguished by [`Reader::error`].
    fn scan(&mut self) -> bool;
    fn get(&self) -> &[u8];
    fn take(&mut self) -> Vec<u8>;
    /// Position so the next `scan` yields the item at `loc`.  Legacy
    /// readers latch `SeekUnsupported`.
    fn seek(&mut self, loc: ItemLocation);
    /// Header entries; empty for streams without a header.
    fn header(&self) -> &[HeaderEntry];
    /// Trailer bytes; empty when absent.
    fn trailer(&self) -> &[u8];
    fn error(&self) -> Option<&Error>;
}

#[derive(Default)]
pub struct ReaderOpts {
    /// Reverse transformer for legacy streams, which carry no header to
    /// name one.  V2 streams resolve theirs from the header instead.
    pub untransformer: Option<Box<dyn Transformer>>,
}

/// A reader that failed to open; every operation reports the open error.
struct ErrorReader {
    err: ErrorReporter,
}

impl ErrorReader {
    fn new(err: Error) -> Self {
        let mut rep = ErrorReporter::new();
        rep.set(err);
        Self { err: rep }
    }
}

impl Reader for ErrorReader {
    fn scan(&mut self) -> bool {
        false
    }

    fn get(&self) -> &[u8] {
        &[]
    }

    fn take(&mut self) -> Vec<u8> {
        Vec::new()
    }

    fn seek(&mut self, _loc: ItemLocation) {}

    fn header(&self) -> &[HeaderEntry] {
        &[]
    }

    fn trailer(&self) -> &[u8] {
        &[]
    }

    fn error(&self) -> Option<&Error> {
        self.err.get()
    }
}

struct V2Reader<R> {
    cr: ChunkReader<R>,
    err: ErrorReporter,
    header: Vec<HeaderEntry>,
    trailer: Vec<u8>,
    untransformer: Option<Box<dyn Transformer>>,
    block: Option<PackedBlock>,
    cur: usize,
    next: usize,
    pending_seek_item: Option<u32>,
}

impl<R: Read + Seek> V2Reader<R> {
    fn new(src: R) -> Self {
        let mut r = Self {
            cr: ChunkReader::new(src),
            err: ErrorReporter::new(),
            header: Vec::new(),
            trailer: Vec::new(),
            untransformer: None,
            block: None,
            cur: 0,
            next: 0,
            pending_seek_item: None,
        };
        if let Err(e) = r.init() {
            r.err.set(e);
        }
        r
    }

    /// Decode the header block, resolve the untransformer it names, and
    /// fetch the trailer when announced.  Leaves the source positioned at
    /// the first data block.
    fn init(&mut self) -> Result<()> {
        let payload = self.read_meta_block(MAGIC_HEADER)?;
        self.header = header::decode_header(&payload)?;
        let specs = header::transformer_specs(&self.header)?;
        if !specs.is_empty() {
            self.untransformer = Some(transformer::get_untransformer(&specs)?);
        }
        let first_data = self.cr.position()?;
        if header::has_trailer(&self.header)? {
            self.cr.seek_last_block()?;
            self.trailer = self.read_meta_block(MAGIC_TRAILER)?;
            self.cr.seek(first_data)?;
        }
        Ok(())
    }

    /// Read one block with the expected magic and return its single item.
    fn read_meta_block(&mut self, want: Magic) -> Result<Vec<u8>> {
        if !self.cr.scan()? {
            return Err(Error::ShortRead {
                want: CHUNK_SIZE,
                got: 0,
            });
        }
        let got = self.cr.magic();
        if got != want {
            return Err(Error::WrongMagic {
                got: magic_hex(&got),
                want: magic_hex(&want),
            });
        }
        let payload = iovec_flatten(&self.cr.chunks());
        let block = PackedBlock::decode(payload, None)?;
        Ok(block.single_item()?.to_vec())
    }

    fn read_block(&mut self) -> Result<bool> {
        self.block = None;
        self.cur = 0;
        self.next = 0;
        if !self.cr.scan()? {
            return Ok(false);
        }
        let m = self.cr.magic();
        if m == MAGIC_TRAILER {
            // end of data; the trailer was consumed during init
            return Ok(false);
        }
        if m != MAGIC_PACKED {
            return Err(Error::BadMagic { got: magic_hex(&m) });
        }
        let payload = iovec_flatten(&self.cr.chunks());
        let block = PackedBlock::decode(
            payload,
            self.untransformer.as_mut().map(|t| t.as_mut() as &mut dyn Transformer),
        )?;
        if let Some(item) = self.pending_seek_item.take() {
            if item as usize >= block.len() {
                return Err(Error::SeekOutOfRange {
                    item,
                    count: block.len(),
                });
            }
            self.next = item as usize;
        }
        self.block = Some(block);
        Ok(true)
    }

    fn scan_impl(&mut self) -> Result<bool> {
        loop {
            if let Some(b) = &self.block {
                if self.next < b.len() {
                    self.cur = self.next;
                    self.next += 1;
                    return Ok(true);
                }
            }
            if !self.read_block()? {
                return Ok(false);
            }
        }
    }
}

impl<R: Read + Seek> Reader for V2Reader<R> {
    fn scan(&mut self) -> bool {
        if !self.err.ok() {
            return false;
        }
        let res = self.scan_impl();
        self.err.latch(res).unwrap_or(false)
    }

    fn get(&self) -> &[u8] {
        match &self.block {
            Some(b) if self.cur < b.len() => b.item(self.cur),
            _ => &[],
        }
    }

    fn take(&mut self) -> Vec<u8> {
        self.get().to_vec()
    }

    fn seek(&mut self, loc: ItemLocation) {
        if !self.err.ok() {
            return;
        }
        self.block = None;
        self.pending_seek_item = Some(loc.item);
        if let Err(e) = self.cr.seek(loc.block) {
            self.err.set(e);
        }
    }

    fn header(&self) -> &[HeaderEntry] {
        &self.header
    }

    fn trailer(&self) -> &[u8] {
        &self.trailer
    }

    fn error(&self) -> Option<&Error> {
        self.err.get()
    }
}

fn probe_magic<R: Read + Seek>(src: &mut R) -> Result<Magic> {
    let start = src.stream_position()?;
    let mut m: Magic = [0; 8];
    src.read_exact(&mut m)?;
    src.seek(SeekFrom::Start(start))?;
    Ok(m)
}

/// Create a reader over an arbitrary seekable source, dispatching on the
/// leading magic.
pub fn new_reader<R: Read + Seek + 'static>(mut src: R, opts: ReaderOpts) -> Box<dyn Reader> {
    match probe_magic(&mut src) {
        Err(e) => Box::new(ErrorReader::new(e)),
        Ok(m) if m == MAGIC_PACKED => {
            debug!("detected legacy packed stream");
            Box::new(PackedReader::new(src, opts.untransformer))
        }
        Ok(m) if m == MAGIC_UNPACKED => {
            debug!("detected legacy unpacked stream");
            Box::new(UnpackedReader::new(src, opts.untransformer))
        }
        Ok(_) => Box::new(V2Reader::new(src)),
    }
}

/// Pick reader options from a filename hint: `.rpkz` attaches the flate
/// untransformer for legacy packed-compressed files.
pub fn default_reader_opts(path: &Path) -> ReaderOpts {
    let mut opts = ReaderOpts::default();
    if path.to_string_lossy().ends_with(".rpkz") {
        opts.untransformer = transformer::get_untransformer(&["flate".to_string()]).ok();
    }
    opts
}

/// Open the file at `path` with suffix-derived options.  Open failures
/// surface as an immediately-failing reader.
pub fn open_reader<P: AsRef<Path>>(path: P) -> Box<dyn Reader> {
    let path = path.as_ref();
    let opts = default_reader_opts(path);
    match File::open(path) {
        Ok(f) => new_reader(f, opts),
        Err(e) => Box::new(ErrorReader::new(Error::Io(e))),
    }
}
