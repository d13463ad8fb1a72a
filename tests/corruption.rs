mod common;

use std::io::Cursor;

use byteorder::{ByteOrder, LittleEndian};
use common::*;
use recordio::header::{HeaderEntry, HeaderValue, KEY_TRAILER};
use recordio::magic::{MAGIC_HEADER, MAGIC_PACKED, MAGIC_TRAILER, MAGIC_UNPACKED};
use recordio::{new_reader, Error, ReaderOpts};

fn scan_fails(bytes: Vec<u8>) -> Box<dyn recordio::Reader> {
    let mut r = new_reader(Cursor::new(bytes), ReaderOpts::default());
    assert!(!r.scan());
    assert!(r.error().is_some());
    r
}

#[test]
fn v1_size_field_bit_flips_are_detected() {
    let block = v1_block(MAGIC_UNPACKED, b"payload");
    for bit in 0..64 {
        let mut bytes = block.clone();
        bytes[8 + bit / 8] ^= 1 << (bit % 8);
        let mut r = new_reader(Cursor::new(bytes), ReaderOpts::default());
        assert!(!r.scan(), "bit {bit}");
        assert!(
            matches!(r.error(), Some(Error::HeaderCrcMismatch { .. })),
            "bit {bit}: {:?}",
            r.error()
        );
    }
}

#[test]
fn v1_crc_field_bit_flips_are_detected() {
    let block = v1_block(MAGIC_UNPACKED, b"payload");
    for bit in 0..32 {
        let mut bytes = block.clone();
        bytes[16 + bit / 8] ^= 1 << (bit % 8);
        let r = scan_fails(bytes);
        assert!(matches!(r.error(), Some(Error::HeaderCrcMismatch { .. })));
    }
}

#[test]
fn v1_wrong_magic_on_second_block() {
    let mut bytes = v1_block(MAGIC_UNPACKED, b"first");
    let mut second = v1_block(MAGIC_UNPACKED, b"second");
    second[0] ^= 0xff;
    bytes.extend_from_slice(&second);
    let mut r = new_reader(Cursor::new(bytes), ReaderOpts::default());
    assert!(r.scan());
    assert!(!r.scan());
    assert!(matches!(r.error(), Some(Error::WrongMagic { .. })));
}

#[test]
fn v1_oversized_declared_record_is_rejected() {
    let bytes = v1_block_with_size(MAGIC_UNPACKED, (1u64 << 29) + 1, b"");
    let r = scan_fails(bytes);
    assert!(matches!(r.error(), Some(Error::RecordTooLarge { .. })));
}

#[test]
fn v1_truncated_payload() {
    let bytes = v1_block_with_size(MAGIC_UNPACKED, 100, b"0123456789");
    let r = scan_fails(bytes);
    assert!(matches!(r.error(), Some(Error::TruncatedPayload { .. })));
}

#[test]
fn v1_partial_header_is_corrupt() {
    let bytes = v1_block(MAGIC_UNPACKED, b"data")[..12].to_vec();
    let r = scan_fails(bytes);
    assert!(matches!(r.error(), Some(Error::CorruptHeader { .. })));
}

#[test]
fn v2_payload_byte_flip_is_detected() {
    let mut bytes = v2_file(&[], &[sample_records(8)], None, None);
    bytes[CHUNK_SIZE + CHUNK_HEADER_SIZE + 3] ^= 0x01;
    let r = scan_fails(bytes);
    assert!(matches!(r.error(), Some(Error::ChunkCrcMismatch { .. })));
}

#[test]
fn v2_chunk_header_byte_flip_is_detected() {
    let mut bytes = v2_file(&[], &[sample_records(8)], None, None);
    // total-chunks field of the first data chunk
    bytes[CHUNK_SIZE + 20] ^= 0x01;
    let r = scan_fails(bytes);
    assert!(matches!(r.error(), Some(Error::ChunkCrcMismatch { .. })));
}

#[test]
fn v2_corrupt_header_block_fails_open() {
    let mut bytes = v2_file(&[], &[sample_records(8)], None, None);
    bytes[CHUNK_HEADER_SIZE] ^= 0x01;
    let mut r = new_reader(Cursor::new(bytes), ReaderOpts::default());
    assert!(matches!(r.error(), Some(Error::ChunkCrcMismatch { .. })));
    assert!(!r.scan());
}

#[test]
fn v2_chunk_order_swap_is_an_index_mismatch() {
    // a >32740-byte payload spans two chunks; swapping them breaks the
    // index sequence while each chunk's own crc stays valid
    let item = vec![0xABu8; 40_000];
    let block = chunked_block(MAGIC_PACKED, &packed_payload(&[&item]));
    assert_eq!(block.len(), 2 * CHUNK_SIZE);
    let mut bytes = chunked_block(
        MAGIC_HEADER,
        &packed_payload(&[&recordio::header::encode_header(&[])]),
    );
    bytes.extend_from_slice(&block[CHUNK_SIZE..]);
    bytes.extend_from_slice(&block[..CHUNK_SIZE]);
    let r = scan_fails(bytes);
    assert!(matches!(r.error(), Some(Error::IndexMismatch { .. })));
}

#[test]
fn v2_magic_change_mid_block() {
    let item = vec![0xCDu8; 40_000];
    let block = chunked_block(MAGIC_PACKED, &packed_payload(&[&item]));
    let mut bytes = chunked_block(
        MAGIC_HEADER,
        &packed_payload(&[&recordio::header::encode_header(&[])]),
    );
    bytes.extend_from_slice(&block);
    // rewrite the second chunk's magic; the crc does not cover it
    let off = 2 * CHUNK_SIZE;
    bytes[off..off + 8].copy_from_slice(&MAGIC_TRAILER);
    let r = scan_fails(bytes);
    assert!(matches!(r.error(), Some(Error::MagicChanged { .. })));
}

#[test]
fn v2_total_mismatch() {
    let item = vec![0xEFu8; 40_000];
    let block = chunked_block(MAGIC_PACKED, &packed_payload(&[&item]));
    let mut bytes = chunked_block(
        MAGIC_HEADER,
        &packed_payload(&[&recordio::header::encode_header(&[])]),
    );
    bytes.extend_from_slice(&block);
    // forge the second chunk's total and make its crc valid again
    let off = 2 * CHUNK_SIZE;
    LittleEndian::write_u32(&mut bytes[off + 20..off + 24], 3);
    rechecksum_chunk(&mut bytes[off..off + CHUNK_SIZE]);
    let r = scan_fails(bytes);
    assert!(matches!(r.error(), Some(Error::TotalMismatch { .. })));
}

#[test]
fn packed_table_byte_flip_is_detected() {
    let records = sample_records(16);
    let items: Vec<&[u8]> = records.iter().map(|r| r.as_slice()).collect();
    let mut bytes = v1_block(MAGIC_PACKED, &packed_payload(&items));
    // first size varint of the table, just after crc and count
    bytes[20 + 5] ^= 0x01;
    let r = scan_fails(bytes);
    assert!(matches!(r.error(), Some(Error::TableCrcMismatch { .. })));
}

#[test]
fn packed_zero_items_rejected() {
    let mut payload = vec![0u8; 4];
    put_uvarint(&mut payload, 0);
    let crc = crc32fast::hash(&payload[4..]);
    LittleEndian::write_u32(&mut payload[..4], crc);
    let bytes = v1_block(MAGIC_PACKED, &payload);
    let r = scan_fails(bytes);
    assert!(matches!(r.error(), Some(Error::InvalidItemCount { .. })));
}

#[test]
fn packed_junk_at_end() {
    // table declares one 3-byte item but four region bytes follow
    let mut payload = vec![0u8; 4];
    put_uvarint(&mut payload, 1);
    put_uvarint(&mut payload, 3);
    let crc = crc32fast::hash(&payload[4..]);
    LittleEndian::write_u32(&mut payload[..4], crc);
    payload.extend_from_slice(b"abcd");
    let bytes = v1_block(MAGIC_PACKED, &payload);
    let r = scan_fails(bytes);
    assert!(matches!(r.error(), Some(Error::JunkAtEnd)));
}

#[test]
fn v2_announced_trailer_with_data_at_end_fails() {
    let entries = vec![HeaderEntry {
        key: KEY_TRAILER.to_string(),
        value: HeaderValue::Bool(true),
    }];
    let bytes = v2_file(&entries, &[sample_records(8)], None, None);
    let r = scan_fails(bytes);
    assert!(matches!(r.error(), Some(Error::NotTrailer { .. })));
}

#[test]
fn v2_trailer_value_type_mismatch() {
    let entries = vec![HeaderEntry {
        key: KEY_TRAILER.to_string(),
        value: HeaderValue::Uint(1),
    }];
    let bytes = v2_file(&entries, &[sample_records(8)], None, None);
    let r = scan_fails(bytes);
    assert!(matches!(r.error(), Some(Error::HeaderValueType { .. })));
}

#[test]
fn error_stays_latched_across_scans() {
    let bytes = v1_block_with_size(MAGIC_UNPACKED, 100, b"0123456789");
    let mut r = new_reader(Cursor::new(bytes), ReaderOpts::default());
    assert!(!r.scan());
    assert!(!r.scan());
    assert!(matches!(r.error(), Some(Error::TruncatedPayload { .. })));
}
