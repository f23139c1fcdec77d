//! Compiled regular expressions for template options.
//!
//! Templates are validated once and then evaluated on every document, so
//! compiled patterns are cached by source text.

use std::collections::HashMap;
use std::sync::Mutex;

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

use crate::error::OptionError;

/// Upper bound on the compiled program size of a template pattern.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Entries kept before the cache is cleared.
const CACHE_CAPACITY: usize = 256;

lazy_static! {
    static ref PATTERN_CACHE: Mutex<HashMap<String, Regex>> = Mutex::new(HashMap::new());
}

/// Compile the pattern held by option `key`.
pub fn compile(key: &str, pattern: &str) -> Result<Regex, OptionError> {
    if let Some(re) = cached(pattern) {
        return Ok(re);
    }

    let re = RegexBuilder::new(pattern)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .map_err(|e| OptionError::new(key, format!("invalid regular expression: {e}")))?;

    if let Ok(mut cache) = PATTERN_CACHE.lock() {
        if cache.len() >= CACHE_CAPACITY {
            cache.clear();
        }
        cache.insert(pattern.to_string(), re.clone());
    }
    Ok(re)
}

fn cached(pattern: &str) -> Option<Regex> {
    PATTERN_CACHE.lock().ok()?.get(pattern).cloned()
}
