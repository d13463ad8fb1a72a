//! Reversible per-block transformations and their process-wide registry.
//!
//! A transformer maps a scatter/gather byte sequence to a single owned
//! buffer.  Writers apply a forward transformer per block; readers resolve
//! the matching reverse transformer, by name for V2 streams (from the
//! header's `transformer` entry) or from reader options for legacy files.
//!
//! The registry maps a name to a pair of factories.  It is initialized on
//! first use with the built-in `flate` and `zstd` pairs; registration is
//! one-shot per name and a duplicate registration panics.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use log::debug;

use crate::binary::iovec_flatten;
use crate::compress;
use crate::error::{Error, Result};

/// A reversible byte transformation applied to one block at a time.
///
/// Instances are single-owner and used sequentially on one stream.
pub trait Transformer: Send + std::fmt::Debug {
    fn transform(&mut self, input: &[&[u8]]) -> Result<Vec<u8>>;
}

/// Returns its input unchanged.
#[derive(Debug)]
pub struct Identity;

impl Transformer for Identity {
    fn transform(&mut self, input: &[&[u8]]) -> Result<Vec<u8>> {
        Ok(iovec_flatten(input))
    }
}

/// Builds a transformer from the args part of a config string.
pub type TransformerFactory = Box<dyn Fn(&str) -> Result<Box<dyn Transformer>> + Send + Sync>;

struct Entry {
    forward: Arc<TransformerFactory>,
    reverse: Arc<TransformerFactory>,
}

fn registry() -> &'static Mutex<HashMap<String, Entry>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Entry>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert(
            "flate".to_string(),
            Entry {
                forward: Arc::new(Box::new(compress::new_flate)),
                reverse: Arc::new(Box::new(compress::new_unflate)),
            },
        );
        map.insert(
            "zstd".to_string(),
            Entry {
                forward: Arc::new(Box::new(compress::new_zstd)),
                reverse: Arc::new(Box::new(compress::new_unzstd)),
            },
        );
        Mutex::new(map)
    })
}

/// Register a named transformer pair.
///
/// # Panics
/// Panics if `name` is already registered; registration is one-shot.
pub fn register_transformer(name: &str, forward: TransformerFactory, reverse: TransformerFactory) {
    let mut map = registry().lock().unwrap();
    if map.contains_key(name) {
        drop(map);
        panic!("transformer {name:?} registered twice");
    }
    debug!("registering transformer {name:?}");
    map.insert(
        name.to_string(),
        Entry {
            forward: Arc::new(forward),
            reverse: Arc::new(reverse),
        },
    );
}

/// Split a config string of the form `"name"` or `"name args"`.
fn split_config(config: &str) -> (&str, &str) {
    match config.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim_start()),
        None => (config, ""),
    }
}

fn resolve(config: &str, reverse: bool) -> Result<Box<dyn Transformer>> {
    let (name, args) = split_config(config.trim());
    // The factory must run outside the registry lock so it may itself
    // consult the registry.
    let factory = {
        let map = registry().lock().unwrap();
        let entry = map.get(name).ok_or_else(|| Error::UnknownTransformer {
            name: name.to_string(),
        })?;
        if reverse {
            Arc::clone(&entry.reverse)
        } else {
            Arc::clone(&entry.forward)
        }
    };
    factory(args)
}

/// Build the forward transformer for `specs`.  An empty list yields the
/// identity transformer; more than one entry is rejected.
pub fn get_transformer(specs: &[String]) -> Result<Box<dyn Transformer>> {
    match specs {
        [] => Ok(Box::new(Identity)),
        [one] => resolve(one, false),
        _ => Err(Error::TransformerChainUnsupported),
    }
}

/// Build the reverse transformer for `specs`; same contract as
/// [`get_transformer`].
pub fn get_untransformer(specs: &[String]) -> Result<Box<dyn Transformer>> {
    match specs {
        [] => Ok(Box::new(Identity)),
        [one] => resolve(one, true),
        _ => Err(Error::TransformerChainUnsupported),
    }
}
