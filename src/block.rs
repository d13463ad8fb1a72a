//! V1 block layer.
//!
//! A V1 file is a plain concatenation of variable-length blocks:
//! `magic(8) || size_le_u64(8) || crc32_of_size_le_u32(4) || payload`.
//! The CRC covers only the eight size bytes, so it detects corruption of
//! the length prefix but not of the payload.

use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian};

use crate::binary::{crc32, read_fully};
use crate::error::{Error, Result};
use crate::magic::{magic_hex, Magic};
use crate::writer::Indexer;

pub const BLOCK_HEADER_SIZE: usize = 20;

/// Upper bound on a declared record size, enforced before allocation.
pub const MAX_READ_RECORD_SIZE: u64 = 1 << 29;

/// Reads raw V1 blocks with a fixed expected magic, no transformation.
pub struct BaseReader<R> {
    src: R,
    magic: Magic,
    buf: Vec<u8>,
}

impl<R: Read> BaseReader<R> {
    pub fn new(src: R, magic: Magic) -> Self {
        Self {
            src,
            magic,
            buf: Vec::new(),
        }
    }

    /// Read the next block into the internal buffer.  `Ok(false)` means
    /// clean EOF before any header byte.
    pub fn scan(&mut self) -> Result<bool> {
        let Some(size) = self.read_header()? else {
            return Ok(false);
        };
        self.buf.resize(size as usize, 0);
        let n = read_fully(&mut self.src, &mut self.buf)?;
        if n as u64 != size {
            return Err(Error::TruncatedPayload {
                want: size,
                got: n as u64,
            });
        }
        Ok(true)
    }

    /// Payload of the current block.
    pub fn block(&self) -> &[u8] {
        &self.buf
    }

    /// Steal the current block's payload.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    /// Parse the 20-byte block header.  `Ok(None)` on EOF at the header
    /// start; a partial header is an error.
    fn read_header(&mut self) -> Result<Option<u64>> {
        let mut header = [0u8; BLOCK_HEADER_SIZE];
        let n = read_fully(&mut self.src, &mut header)?;
        if n == 0 {
            return Ok(None);
        }
        if n != BLOCK_HEADER_SIZE {
            return Err(Error::CorruptHeader {
                want: BLOCK_HEADER_SIZE,
                got: n,
            });
        }
        if header[..8] != self.magic {
            let mut got: Magic = [0; 8];
            got.copy_from_slice(&header[..8]);
            return Err(Error::WrongMagic {
                got: magic_hex(&got),
                want: magic_hex(&self.magic),
            });
        }
        let size = LittleEndian::read_u64(&header[8..16]);
        let stored_crc = LittleEndian::read_u32(&header[16..20]);
        let computed = crc32(&header[8..16]);
        if stored_crc != computed {
            return Err(Error::HeaderCrcMismatch {
                want: stored_crc,
                got: computed,
            });
        }
        if size > MAX_READ_RECORD_SIZE {
            return Err(Error::RecordTooLarge {
                size,
                max: MAX_READ_RECORD_SIZE,
            });
        }
        Ok(Some(size))
    }
}

/// Writes raw V1 blocks and fires the indexer after each one.
pub struct BaseWriter<W> {
    sink: W,
    magic: Magic,
    written: u64,
    indexer: Option<Box<dyn Indexer>>,
}

impl<W: Write> BaseWriter<W> {
    pub fn new(sink: W, magic: Magic, indexer: Option<Box<dyn Indexer>>) -> Self {
        Self {
            sink,
            magic,
            written: 0,
            indexer,
        }
    }

    /// Frame `head || tail` as one block.  Two spans are accepted so the
    /// packed writer can emit its size table and items region without an
    /// extra copy.
    pub fn write_block(&mut self, head: &[u8], tail: &[u8]) -> Result<()> {
        let block_start = self.written;
        let size = (head.len() + tail.len()) as u64;

        let mut hdr = [0u8; BLOCK_HEADER_SIZE];
        hdr[..8].copy_from_slice(&self.magic);
        LittleEndian::write_u64(&mut hdr[8..16], size);
        let crc = crc32(&hdr[8..16]);
        LittleEndian::write_u32(&mut hdr[16..20], crc);

        self.sink.write_all(&hdr)?;
        self.sink.write_all(head)?;
        if !tail.is_empty() {
            self.sink.write_all(tail)?;
        }
        self.written += BLOCK_HEADER_SIZE as u64 + size;

        if let Some(ix) = self.indexer.as_mut() {
            ix.index_block(block_start).map_err(Error::Indexer)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }
}
