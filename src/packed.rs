//! Packed block codec.
//!
//! A packed payload carries multiple logical items behind a metadata table:
//! `table_crc32_le(4) || uvarint n || uvarint size_1 .. size_n || items`.
//! The CRC covers the count and size varints only; item bytes are not
//! checksummed here.  An optional transformer applies to the items region
//! alone, leaving the table in the clear so a reader can locate items
//! without transforming first.

use byteorder::{ByteOrder, LittleEndian};

use crate::binary::{append_uvarint, crc32, BinaryParser, ErrorReporter};
use crate::error::{Error, Result};
use crate::transformer::Transformer;

/// One decoded packed block: an items region plus item bounds into it.
/// Item accessors are zero-copy slices into the region.
pub struct PackedBlock {
    buf: Vec<u8>,
    items_off: usize,
    // (offset within the items region, length) per item
    bounds: Vec<(usize, usize)>,
}

impl PackedBlock {
    /// Decode a packed payload, applying `untransformer` to the items
    /// region when present.
    pub fn decode(payload: Vec<u8>, untransformer: Option<&mut dyn Transformer>) -> Result<Self> {
        let mut rep = ErrorReporter::new();
        let mut sizes: Vec<u64> = Vec::new();
        let stored_crc;
        let table_end;
        {
            let mut p = BinaryParser::new(&payload, &mut rep);
            stored_crc = p.read_le_u32();
            let n = p.read_uvarint();
            if let Some(e) = p.take_err() {
                return Err(e);
            }
            if n == 0 || n >= payload.len() as u64 {
                return Err(Error::InvalidItemCount { n });
            }
            sizes.reserve(n as usize);
            for _ in 0..n {
                sizes.push(p.read_uvarint());
            }
            if let Some(e) = p.take_err() {
                return Err(e);
            }
            table_end = payload.len() - p.remaining_len();
        }

        let computed = crc32(&payload[4..table_end]);
        if stored_crc != computed {
            return Err(Error::TableCrcMismatch {
                want: stored_crc,
                got: computed,
            });
        }

        let (buf, items_off) = match untransformer {
            Some(t) => (t.transform(&[&payload[table_end..]])?, 0),
            None => (payload, table_end),
        };

        let total: u64 = sizes
            .iter()
            .try_fold(0u64, |acc, &s| acc.checked_add(s))
            .ok_or(Error::JunkAtEnd)?;
        if total != (buf.len() - items_off) as u64 {
            return Err(Error::JunkAtEnd);
        }

        let mut bounds = Vec::with_capacity(sizes.len());
        let mut off = 0usize;
        for &s in &sizes {
            bounds.push((off, s as usize));
            off += s as usize;
        }
        Ok(Self {
            buf,
            items_off,
            bounds,
        })
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn item(&self, i: usize) -> &[u8] {
        let (off, len) = self.bounds[i];
        &self.buf[self.items_off + off..self.items_off + off + len]
    }

    /// The block's only item; header and trailer blocks carry exactly one.
    pub fn single_item(&self) -> Result<&[u8]> {
        if self.len() != 1 {
            return Err(Error::InvalidItemCount {
                n: self.len() as u64,
            });
        }
        Ok(self.item(0))
    }
}

/// Accumulates item sizes for one packed block and renders the metadata
/// table on flush.
#[derive(Default)]
pub struct PackedHeaderBuilder {
    count: u64,
    sizes: Vec<u8>,
}

impl PackedHeaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item_size(&mut self, size: usize) {
        self.count += 1;
        append_uvarint(&mut self.sizes, size as u64);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Render `crc32 || uvarint n || sizes`.  The CRC slot is written
    /// last, computed over the varints behind it.
    pub fn build(&self) -> Vec<u8> {
        let mut buf = vec![0u8; 4];
        append_uvarint(&mut buf, self.count);
        buf.extend_from_slice(&self.sizes);
        let crc = crc32(&buf[4..]);
        LittleEndian::write_u32(&mut buf[..4], crc);
        buf
    }

    pub fn clear(&mut self) {
        self.count = 0;
        self.sizes.clear();
    }
}
