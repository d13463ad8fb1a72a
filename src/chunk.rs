//! V2 chunk layer.
//!
//! A V2 file is a sequence of fixed 32 KiB chunks.  Each chunk carries a
//! 28-byte header (magic, crc, flag, payload size, chunk total, chunk
//! index) followed by up to 32740 payload bytes and zero padding.  One or
//! more consecutive chunks sharing a magic form a block; the CRC of a
//! chunk covers everything after the CRC field itself, including payload.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{ByteOrder, LittleEndian};

use crate::binary::{crc32, read_fully};
use crate::error::{Error, Result};
use crate::magic::{magic_hex, Magic, MAGIC_INVALID, MAGIC_TRAILER};

pub const CHUNK_SIZE: usize = 32 << 10;
pub const CHUNK_HEADER_SIZE: usize = 28;
pub const MAX_CHUNK_PAYLOAD: usize = CHUNK_SIZE - CHUNK_HEADER_SIZE;

type ChunkBuf = [u8; CHUNK_SIZE];

struct ChunkHeader {
    magic: Magic,
    payload_len: usize,
    total: u32,
    index: u32,
}

/// Reads raw chunks from a seekable source and assembles them into blocks
/// without any transformation.
///
/// Chunk buffers are recycled across [`scan`](ChunkReader::scan) calls via
/// a freelist; the slices returned by [`chunks`](ChunkReader::chunks) stay
/// valid until the next scan.
pub struct ChunkReader<R> {
    src: R,
    magic: Magic,
    // (freelist slot, payload length) for each chunk of the current block
    spans: Vec<(usize, usize)>,
    bufs: Vec<Box<ChunkBuf>>,
    next_free: usize,
}

impl<R: Read + Seek> ChunkReader<R> {
    pub fn new(src: R) -> Self {
        Self {
            src,
            magic: MAGIC_INVALID,
            spans: Vec::new(),
            bufs: Vec::new(),
            next_free: 0,
        }
    }

    /// Read the next block.  `Ok(false)` means clean EOF at a block
    /// boundary; EOF in the middle of a chunk sequence is an error.
    pub fn scan(&mut self) -> Result<bool> {
        self.magic = MAGIC_INVALID;
        self.spans.clear();
        self.next_free = 0;
        let mut total_chunks = 0u32;
        loop {
            let Some((hdr, slot)) = self.read_chunk()? else {
                if self.spans.is_empty() {
                    return Ok(false);
                }
                return Err(Error::ShortRead {
                    want: CHUNK_SIZE,
                    got: 0,
                });
            };
            if self.spans.is_empty() {
                self.magic = hdr.magic;
                total_chunks = hdr.total;
            }
            if hdr.magic != self.magic {
                return Err(Error::MagicChanged {
                    got: magic_hex(&hdr.magic),
                    want: magic_hex(&self.magic),
                });
            }
            if hdr.index as usize != self.spans.len() {
                return Err(Error::IndexMismatch {
                    got: hdr.index,
                    want: self.spans.len() as u32,
                });
            }
            if hdr.total != total_chunks {
                return Err(Error::TotalMismatch {
                    got: hdr.total,
                    want: total_chunks,
                });
            }
            self.spans.push((slot, hdr.payload_len));
            if hdr.index + 1 == hdr.total {
                return Ok(true);
            }
        }
    }

    /// Payload spans of the current block, in chunk order.
    ///
    /// Valid only after a successful [`scan`](ChunkReader::scan); the
    /// slices borrow the reader's chunk buffers.
    pub fn chunks(&self) -> Vec<&[u8]> {
        self.spans
            .iter()
            .map(|&(slot, len)| &self.bufs[slot][CHUNK_HEADER_SIZE..CHUNK_HEADER_SIZE + len])
            .collect()
    }

    /// Magic of the current block.
    pub fn magic(&self) -> Magic {
        self.magic
    }

    /// Position the source at an absolute byte offset; the next scan reads
    /// the block starting there.
    pub fn seek(&mut self, off: u64) -> Result<()> {
        self.src.seek(SeekFrom::Start(off))?;
        self.spans.clear();
        Ok(())
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.src.stream_position()?)
    }

    /// Seek to the first chunk of the last block, which must be a trailer.
    ///
    /// Reads the file's final chunk, checks its magic, then steps back over
    /// `chunk_index + 1` chunks so the next scan reads the whole trailer.
    pub fn seek_last_block(&mut self) -> Result<()> {
        self.src.seek(SeekFrom::End(-(CHUNK_SIZE as i64)))?;
        self.spans.clear();
        self.next_free = 0;
        let Some((hdr, _)) = self.read_chunk()? else {
            return Err(Error::ShortRead {
                want: CHUNK_SIZE,
                got: 0,
            });
        };
        if hdr.magic != MAGIC_TRAILER {
            return Err(Error::NotTrailer {
                got: magic_hex(&hdr.magic),
            });
        }
        let back = CHUNK_SIZE as i64 * (i64::from(hdr.index) + 1);
        self.src.seek(SeekFrom::End(-back))?;
        Ok(())
    }

    /// Read one chunk into a freelist buffer.  `Ok(None)` on EOF at a
    /// chunk boundary.
    fn read_chunk(&mut self) -> Result<Option<(ChunkHeader, usize)>> {
        if self.next_free >= self.bufs.len() {
            self.bufs.push(Box::new([0u8; CHUNK_SIZE]));
        }
        let slot = self.next_free;
        self.next_free += 1;

        let buf = &mut self.bufs[slot];
        let n = read_fully(&mut self.src, &mut buf[..])?;
        if n == 0 {
            return Ok(None);
        }
        if n != CHUNK_SIZE {
            return Err(Error::ShortRead {
                want: CHUNK_SIZE,
                got: n,
            });
        }

        let mut magic: Magic = [0; 8];
        magic.copy_from_slice(&buf[..8]);
        let stored_crc = LittleEndian::read_u32(&buf[8..12]);
        let payload_len = LittleEndian::read_u32(&buf[16..20]) as usize;
        let total = LittleEndian::read_u32(&buf[20..24]);
        let index = LittleEndian::read_u32(&buf[24..28]);

        if payload_len > MAX_CHUNK_PAYLOAD {
            return Err(Error::InvalidChunkSize {
                size: payload_len as u32,
                max: MAX_CHUNK_PAYLOAD as u32,
            });
        }
        let computed = crc32(&buf[12..CHUNK_HEADER_SIZE + payload_len]);
        if stored_crc != computed {
            return Err(Error::ChunkCrcMismatch {
                want: stored_crc,
                got: computed,
            });
        }
        Ok(Some((
            ChunkHeader {
                magic,
                payload_len,
                total,
                index,
            },
            slot,
        )))
    }
}
