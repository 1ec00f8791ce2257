//! Qualified names and namespace declarations
//!
//! Every model element in the dictionary is identified by a `QName` — a
//! (namespace URI, local name) pair. Prefixes are per-document shorthand only
//! and never participate in equality.

use std::fmt;
use std::sync::LazyLock;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DictionaryError, Result};

/// Separator between prefix and local name in prefixed strings ("cm:name")
pub const PREFIX_SEPARATOR: char = ':';

static PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_\-]*$").unwrap());
static LOCAL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-.]*$").unwrap());

/// A fully qualified name: namespace URI + local name.
///
/// Equality is structural on the pair. Ordered so it can key `BTreeMap`s,
/// which keeps compiled-model iteration (and therefore diffs) deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QName {
    uri: String,
    local_name: String,
}

impl QName {
    pub fn new(uri: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            local_name: local_name.into(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Render with a document prefix, e.g. `cm:name`
    pub fn to_prefixed(&self, prefix: &str) -> String {
        format!("{}{}{}", prefix, PREFIX_SEPARATOR, self.local_name)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.uri, self.local_name)
    }
}

/// A namespace declaration: URI plus its default document prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub uri: String,
    pub prefix: String,
}

impl Namespace {
    pub fn new(uri: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            prefix: prefix.into(),
        }
    }
}

/// Split a prefixed name ("test1:type1") into (prefix, local name)
pub fn split_prefixed(name: &str) -> Result<(&str, &str)> {
    match name.split_once(PREFIX_SEPARATOR) {
        Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => Ok((prefix, local)),
        _ => Err(DictionaryError::InvalidName {
            name: name.to_string(),
            reason: "expected 'prefix:localName'".to_string(),
        }),
    }
}

pub fn is_valid_prefix(prefix: &str) -> bool {
    PREFIX_RE.is_match(prefix)
}

pub fn is_valid_local_name(local: &str) -> bool {
    LOCAL_NAME_RE.is_match(local)
}

/// URIs are opaque to the dictionary; only reject the obviously malformed.
pub fn is_valid_uri(uri: &str) -> bool {
    !uri.is_empty() && !uri.contains(char::is_whitespace) && !uri.contains(['{', '}'])
}

/// Closest known prefix to an unresolved one, for diagnostics
pub fn suggest_prefix<'a>(
    unknown: &str,
    known: impl Iterator<Item = &'a str>,
) -> Option<String> {
    let matcher = SkimMatcherV2::default();
    known
        .filter_map(|candidate| {
            matcher
                .fuzzy_match(candidate, unknown)
                .map(|score| (score, candidate))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, candidate)| candidate.to_string())
}
