//! Built-in compression transformers.
//!
//! `flate` is RFC 1951 raw deflate (no zlib or gzip wrapper).  `zstd` is a
//! second registered pair with the same contract.  Both accept an optional
//! numeric compression level in the config args, e.g. `"flate 9"`.

use std::io::Write;

use flate2::write::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;

use crate::binary::{iovec_flatten, iovec_len};
use crate::error::{Error, Result};
use crate::transformer::Transformer;

const DEFAULT_ZSTD_LEVEL: i32 = 3;

fn parse_level(args: &str) -> Result<Option<i64>> {
    let t = args.trim();
    if t.is_empty() {
        return Ok(None);
    }
    t.parse::<i64>()
        .map(Some)
        .map_err(|_| Error::Transform(format!("invalid compression level {t:?}")))
}

/// Raw-deflate compressor.
#[derive(Debug)]
pub struct Flate {
    level: Compression,
}

impl Transformer for Flate {
    fn transform(&mut self, input: &[&[u8]]) -> Result<Vec<u8>> {
        let mut enc = DeflateEncoder::new(Vec::with_capacity(iovec_len(input)), self.level);
        for part in input {
            enc.write_all(part)?;
        }
        Ok(enc.finish()?)
    }
}

/// Raw-deflate decompressor.
#[derive(Debug)]
pub struct Unflate;

impl Transformer for Unflate {
    fn transform(&mut self, input: &[&[u8]]) -> Result<Vec<u8>> {
        let mut dec = DeflateDecoder::new(Vec::with_capacity(iovec_len(input) * 2));
        for part in input {
            dec.write_all(part)?;
        }
        Ok(dec.finish()?)
    }
}

#[derive(Debug)]
pub struct Zstd {
    level: i32,
}

impl Transformer for Zstd {
    fn transform(&mut self, input: &[&[u8]]) -> Result<Vec<u8>> {
        let flat = iovec_flatten(input);
        Ok(zstd::encode_all(flat.as_slice(), self.level)?)
    }
}

#[derive(Debug)]
pub struct Unzstd;

impl Transformer for Unzstd {
    fn transform(&mut self, input: &[&[u8]]) -> Result<Vec<u8>> {
        let flat = iovec_flatten(input);
        Ok(zstd::decode_all(flat.as_slice())?)
    }
}

pub fn flate_transformer() -> Box<dyn Transformer> {
    Box::new(Flate {
        level: Compression::default(),
    })
}

pub fn unflate_transformer() -> Box<dyn Transformer> {
    Box::new(Unflate)
}

pub(crate) fn new_flate(args: &str) -> Result<Box<dyn Transformer>> {
    let level = match parse_level(args)? {
        None => Compression::default(),
        Some(l @ 0..=9) => Compression::new(l as u32),
        Some(l) => return Err(Error::Transform(format!("invalid flate level {l}"))),
    };
    Ok(Box::new(Flate { level }))
}

pub(crate) fn new_unflate(_args: &str) -> Result<Box<dyn Transformer>> {
    Ok(unflate_transformer())
}

pub(crate) fn new_zstd(args: &str) -> Result<Box<dyn Transformer>> {
    let level = match parse_level(args)? {
        None => DEFAULT_ZSTD_LEVEL,
        Some(l @ 1..=22) => l as i32,
        Some(l) => return Err(Error::Transform(format!("invalid zstd level {l}"))),
    };
    Ok(Box::new(Zstd { level }))
}

pub(crate) fn new_unzstd(_args: &str) -> Result<Box<dyn Transformer>> {
    Ok(Box::new(Unzstd))
}
