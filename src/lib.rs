//! Record-oriented binary container format.
//!
//! A file is a stream of opaque byte records.  Two on-disk layouts exist:
//! the legacy V1 layout of CRC-framed variable-length blocks, and the
//! chunked V2 layout built from fixed 32 KiB chunks with a typed header
//! block, optional trailer block, and seekable item locations.  Blocks may
//! pack multiple items behind a size table, and a registered transformer
//! (compression, typically) can apply to each block's items region.
//!
//! ```no_run
//! use recordio::{create_writer, open_reader};
//!
//! let mut w = create_writer("data.rpk");
//! assert!(w.write(b"hello"));
//! assert!(w.close());
//!
//! let mut r = open_reader("data.rpk");
//! while r.scan() {
//!     println!("{} bytes", r.get().len());
//! }
//! assert!(r.error().is_none());
//! ```

pub mod binary;
pub mod block;
pub mod chunk;
pub mod compress;
pub mod error;
pub mod header;
mod legacy;
pub mod magic;
pub mod packed;
pub mod reader;
pub mod transformer;
pub mod writer;

pub use error::{Error, Result};
pub use header::{HeaderEntry, HeaderValue};
pub use reader::{default_reader_opts, new_reader, open_reader, ItemLocation, Reader, ReaderOpts};
pub use transformer::{
    get_transformer, get_untransformer, register_transformer, Transformer, TransformerFactory,
};
pub use writer::{create_writer, default_writer_opts, new_writer, Indexer, Writer, WriterOpts};
