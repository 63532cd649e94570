//! Process-wide cache of compiled reference patterns.
//!
//! Patterns are keyed by their full source text, so context overrides of the
//! username or issue id sub-pattern compile once and are shared by every
//! later run. Entries are never evicted.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use regex::Regex;

use crate::error::{ContextKey, PipelineError};

static CACHE: LazyLock<RwLock<HashMap<String, Arc<Regex>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Get the compiled regex for `source`, compiling it on first use.
///
/// # Errors
///
/// Returns `PipelineError::InvalidPattern` naming `key` if `source` does not
/// compile.
pub(crate) fn compiled(source: &str, key: ContextKey) -> Result<Arc<Regex>, PipelineError> {
    if let Some(regex) = CACHE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(source)
    {
        return Ok(Arc::clone(regex));
    }

    let regex =
        Regex::new(source).map_err(|err| PipelineError::InvalidPattern { key, source: err })?;
    let mut cache = CACHE.write().unwrap_or_else(PoisonError::into_inner);
    let entry = cache
        .entry(source.to_owned())
        .or_insert_with(|| Arc::new(regex));
    Ok(Arc::clone(entry))
}
