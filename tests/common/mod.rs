//! Shared fixtures: sample records, hand-rolled V1/V2 wire builders, and a
//! collecting indexer.  Block and chunk framing is encoded here by hand so
//! decoder tests do not depend on the writer's code paths; there is no V2
//! writer in the library, so these builders are the only V2 source.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use byteorder::{ByteOrder, LittleEndian};
use recordio::header::HeaderEntry;
use recordio::magic::{Magic, MAGIC_HEADER, MAGIC_PACKED, MAGIC_TRAILER};
use recordio::Transformer;

pub const CHUNK_SIZE: usize = 32 << 10;
pub const CHUNK_HEADER_SIZE: usize = 28;
pub const MAX_CHUNK_PAYLOAD: usize = CHUNK_SIZE - CHUNK_HEADER_SIZE;

pub const SAMPLE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Record `i` is an 8-byte window into the sample alphabet.
pub fn sample_record(i: usize) -> Vec<u8> {
    let start = i % (SAMPLE.len() - 8 + 1);
    SAMPLE.as_bytes()[start..start + 8].to_vec()
}

pub fn sample_records(n: usize) -> Vec<Vec<u8>> {
    (0..n).map(sample_record).collect()
}

pub fn read_all(r: &mut dyn recordio::Reader) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    while r.scan() {
        out.push(r.get().to_vec());
    }
    out
}

pub fn put_uvarint(buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.push(v as u8 | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

/// Packed payload: size-table crc, item count, item sizes, items region.
pub fn packed_payload(items: &[&[u8]]) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    put_uvarint(&mut buf, items.len() as u64);
    for it in items {
        put_uvarint(&mut buf, it.len() as u64);
    }
    let crc = crc32fast::hash(&buf[4..]);
    LittleEndian::write_u32(&mut buf[..4], crc);
    for it in items {
        buf.extend_from_slice(it);
    }
    buf
}

/// Like [`packed_payload`] but runs the items region through `t`.
pub fn packed_payload_transformed(items: &[&[u8]], t: &mut dyn Transformer) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    put_uvarint(&mut buf, items.len() as u64);
    for it in items {
        put_uvarint(&mut buf, it.len() as u64);
    }
    let crc = crc32fast::hash(&buf[4..]);
    LittleEndian::write_u32(&mut buf[..4], crc);
    let region = t.transform(items).unwrap();
    buf.extend_from_slice(&region);
    buf
}

/// Frame one V1 block: magic, size, crc of the size bytes, payload.
pub fn v1_block(magic: Magic, payload: &[u8]) -> Vec<u8> {
    v1_block_with_size(magic, payload.len() as u64, payload)
}

/// V1 block with a forged size field (payload written as given).
pub fn v1_block_with_size(magic: Magic, declared: u64, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(20 + payload.len());
    out.extend_from_slice(&magic);
    let mut size = [0u8; 8];
    LittleEndian::write_u64(&mut size, declared);
    out.extend_from_slice(&size);
    let mut crc = [0u8; 4];
    LittleEndian::write_u32(&mut crc, crc32fast::hash(&size));
    out.extend_from_slice(&crc);
    out.extend_from_slice(payload);
    out
}

/// Split `payload` into padded 32 KiB chunks under `magic`.
pub fn chunked_block(magic: Magic, payload: &[u8]) -> Vec<u8> {
    let parts: Vec<&[u8]> = if payload.is_empty() {
        vec![&[][..]]
    } else {
        payload.chunks(MAX_CHUNK_PAYLOAD).collect()
    };
    let total = parts.len() as u32;
    let mut out = Vec::with_capacity(parts.len() * CHUNK_SIZE);
    for (index, part) in parts.iter().enumerate() {
        let mut chunk = vec![0u8; CHUNK_SIZE];
        chunk[..8].copy_from_slice(&magic);
        LittleEndian::write_u32(&mut chunk[16..20], part.len() as u32);
        LittleEndian::write_u32(&mut chunk[20..24], total);
        LittleEndian::write_u32(&mut chunk[24..28], index as u32);
        chunk[CHUNK_HEADER_SIZE..CHUNK_HEADER_SIZE + part.len()].copy_from_slice(part);
        let crc = crc32fast::hash(&chunk[12..CHUNK_HEADER_SIZE + part.len()]);
        LittleEndian::write_u32(&mut chunk[8..12], crc);
        out.extend_from_slice(&chunk);
    }
    out
}

/// Recompute a chunk's crc after editing its header or payload.
pub fn rechecksum_chunk(chunk: &mut [u8]) {
    let len = LittleEndian::read_u32(&chunk[16..20]) as usize;
    let crc = crc32fast::hash(&chunk[12..CHUNK_HEADER_SIZE + len]);
    LittleEndian::write_u32(&mut chunk[8..12], crc);
}

/// Assemble a complete V2 file: header block, data blocks, optional
/// trailer block.  `transformer` applies to the data blocks' items
/// regions only.
pub fn v2_file(
    entries: &[HeaderEntry],
    blocks: &[Vec<Vec<u8>>],
    trailer: Option<&[u8]>,
    mut transformer: Option<&mut dyn Transformer>,
) -> Vec<u8> {
    let mut out = Vec::new();
    let header_payload = packed_payload(&[&recordio::header::encode_header(entries)]);
    out.extend_from_slice(&chunked_block(MAGIC_HEADER, &header_payload));
    for block in blocks {
        let items: Vec<&[u8]> = block.iter().map(|v| v.as_slice()).collect();
        let payload = match transformer.as_deref_mut() {
            Some(t) => packed_payload_transformed(&items, t),
            None => packed_payload(&items),
        };
        out.extend_from_slice(&chunked_block(MAGIC_PACKED, &payload));
    }
    if let Some(tb) = trailer {
        let payload = packed_payload(&[tb]);
        out.extend_from_slice(&chunked_block(MAGIC_TRAILER, &payload));
    }
    out
}

/// Indexer that appends every reported offset into a shared vector.
pub struct CollectIndexer(pub Rc<RefCell<Vec<u64>>>);

impl recordio::Indexer for CollectIndexer {
    fn index_block(&mut self, offset: u64) -> Result<(), String> {
        self.0.borrow_mut().push(offset);
        Ok(())
    }
}
