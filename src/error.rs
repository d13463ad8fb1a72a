use std::io;
use thiserror::Error;

/// Everything that can go wrong while reading or writing a container file.
///
/// Readers and writers latch the first error and keep returning
/// end-of-stream afterwards; the latched value stays observable through
/// their `error()` accessor.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("short read: wanted {want} bytes, got {got}")]
    ShortRead { want: usize, got: usize },
    #[error("corrupt block header: read {got} of {want} bytes")]
    CorruptHeader { want: usize, got: usize },
    #[error("wrong block magic {got}, expected {want}")]
    WrongMagic { got: String, want: String },
    #[error("bad data block magic {got}")]
    BadMagic { got: String },
    #[error("block size crc mismatch: stored {want:#010x}, computed {got:#010x}")]
    HeaderCrcMismatch { want: u32, got: u32 },
    #[error("chunk crc mismatch: stored {want:#010x}, computed {got:#010x}")]
    ChunkCrcMismatch { want: u32, got: u32 },
    #[error("item size table crc mismatch: stored {want:#010x}, computed {got:#010x}")]
    TableCrcMismatch { want: u32, got: u32 },
    #[error("record of {size} bytes exceeds the {max} byte read limit")]
    RecordTooLarge { size: u64, max: u64 },
    #[error("invalid packed item count {n}")]
    InvalidItemCount { n: u64 },
    #[error("junk at the end of a packed block")]
    JunkAtEnd,
    #[error("truncated block payload: wanted {want} bytes, got {got}")]
    TruncatedPayload { want: u64, got: u64 },
    #[error("item of {size} bytes exceeds max_packed_bytes ({max})")]
    ItemTooLarge { size: usize, max: usize },
    #[error("magic changed mid-block: got {got}, expected {want}")]
    MagicChanged { got: String, want: String },
    #[error("wrong chunk index {got}, expected {want}")]
    IndexMismatch { got: u32, want: u32 },
    #[error("wrong chunk total {got}, expected {want}")]
    TotalMismatch { got: u32, want: u32 },
    #[error("chunk payload size {size} exceeds {max}")]
    InvalidChunkSize { size: u32, max: u32 },
    #[error("last block is not a trailer: magic {got}")]
    NotTrailer { got: String },
    #[error("transformer {name:?} is not registered")]
    UnknownTransformer { name: String },
    #[error("transformer chains are not supported")]
    TransformerChainUnsupported,
    #[error("seek target item {item} is out of range for a block of {count} items")]
    SeekOutOfRange { item: u32, count: usize },
    #[error("seek is not supported by this reader")]
    SeekUnsupported,
    #[error("header key {key:?} has value type {got}, expected {want}")]
    HeaderValueType {
        key: String,
        want: &'static str,
        got: &'static str,
    },
    #[error("invalid header value type tag {tag}")]
    InvalidValueType { tag: u8 },
    #[error("malformed header block: {0}")]
    MalformedHeader(&'static str),
    #[error("invalid varint encoding")]
    InvalidVarint,
    #[error("writer is closed")]
    Closed,
    #[error("indexer error: {0}")]
    Indexer(String),
    #[error("transform failed: {0}")]
    Transform(String),
}

pub type Result<T> = std::result::Result<T, Error>;
