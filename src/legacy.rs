//! Legacy V1 readers.
//!
//! These handle files that begin with the unpacked or packed magic.  The
//! unpacked reader yields one block per scan; the packed reader walks the
//! items inside each block.  Neither layout carries a header or trailer,
//! so those accessors return empty, and random access is unsupported.

use std::io::Read;

use crate::binary::ErrorReporter;
use crate::block::BaseReader;
use crate::error::{Error, Result};
use crate::header::HeaderEntry;
use crate::magic::{MAGIC_PACKED, MAGIC_UNPACKED};
use crate::packed::PackedBlock;
use crate::reader::{ItemLocation, Reader};
use crate::transformer::Transformer;

pub(crate) struct UnpackedReader<R> {
    base: BaseReader<R>,
    err: ErrorReporter,
    untransformer: Option<Box<dyn Transformer>>,
    rec: Vec<u8>,
}

impl<R: Read> UnpackedReader<R> {
    pub(crate) fn new(src: R, untransformer: Option<Box<dyn Transformer>>) -> Self {
        Self {
            base: BaseReader::new(src, MAGIC_UNPACKED),
            err: ErrorReporter::new(),
            untransformer,
            rec: Vec::new(),
        }
    }

    fn scan_impl(&mut self) -> Result<bool> {
        if !self.base.scan()? {
            return Ok(false);
        }
        self.rec = match self.untransformer.as_deref_mut() {
            Some(t) => t.transform(&[self.base.block()])?,
            None => self.base.take(),
        };
        Ok(true)
    }
}

impl<R: Read> Reader for UnpackedReader<R> {
    fn scan(&mut self) -> bool {
        if !self.err.ok() {
            return false;
        }
        let res = self.scan_impl();
        self.err.latch(res).unwrap_or(false)
    }

    fn get(&self) -> &[u8] {
        &self.rec
    }

    fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.rec)
    }

    fn seek(&mut self, _loc: ItemLocation) {
        self.err.set(Error::SeekUnsupported);
    }

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

pub(crate) struct PackedReader<R> {
    base: BaseReader<R>,
    err: ErrorReporter,
    untransformer: Option<Box<dyn Transformer>>,
    block: Option<PackedBlock>,
    cur: usize,
    next: usize,
}

impl<R: Read> PackedReader<R> {
    pub(crate) fn new(src: R, untransformer: Option<Box<dyn Transformer>>) -> Self {
        Self {
            base: BaseReader::new(src, MAGIC_PACKED),
            err: ErrorReporter::new(),
            untransformer,
            block: None,
            cur: 0,
            next: 0,
        }
    }

    fn read_block(&mut self) -> Result<bool> {
        self.block = None;
        self.cur = 0;
        self.next = 0;
        if !self.base.scan()? {
            return Ok(false);
        }
        let payload = self.base.take();
        self.block = Some(PackedBlock::decode(
            payload,
            self.untransformer.as_mut().map(|t| t.as_mut() as &mut dyn Transformer),
        )?);
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

impl<R: Read> Reader for PackedReader<R> {
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

    fn seek(&mut self, _loc: ItemLocation) {
        self.err.set(Error::SeekUnsupported);
    }

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
