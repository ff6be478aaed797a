//! Page identities and the request-parameter sets declared against them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Stable, host-assigned key of a page (its fully-qualified title).
///
/// Available both while a page is being expanded for the first time and on
/// later renders, unlike the numeric [`PageId`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PageIdentity(String);

impl PageIdentity {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::validation("page identity must not be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PageIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PageIdentity {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PageIdentity> for String {
    fn from(value: PageIdentity) -> Self {
        value.0
    }
}

/// Durable numeric id the host assigns once a page has been saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId(i64);

impl PageId {
    /// Returns `None` for non-positive values, which hosts use for "not saved yet".
    pub fn new(value: i64) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A page as handed over by the host: identity plus the durable id, if any.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRef {
    pub identity: PageIdentity,
    pub page_id: Option<PageId>,
}

impl PageRef {
    pub fn new(identity: PageIdentity, page_id: Option<PageId>) -> Self {
        Self { identity, page_id }
    }

    /// A page that has not been saved yet.
    pub fn unsaved(identity: PageIdentity) -> Self {
        Self::new(identity, None)
    }

    pub fn saved(identity: PageIdentity, page_id: PageId) -> Self {
        Self::new(identity, Some(page_id))
    }
}

/// Request-parameter names a page declared as cache-relevant.
///
/// Names are unique and iterate in lexicographic order, which keeps derived
/// cache keys stable across processes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>")]
pub struct ParameterSet(BTreeSet<String>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a name, trimming surrounding whitespace. Blank names are ignored.
    ///
    /// Returns `true` when the set changed.
    pub fn insert(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.0.insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name.trim())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<S: AsRef<str>> Extend<S> for ParameterSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for name in iter {
            self.insert(name.as_ref());
        }
    }
}

impl From<Vec<String>> for ParameterSet {
    fn from(names: Vec<String>) -> Self {
        names.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Which registry layer answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Declared during the current save, not yet durable.
    Pending,
    /// Loaded from durable storage earlier in this process.
    Cached,
    /// Read from durable storage by this lookup.
    Durable,
    /// No layer knows the page.
    Unknown,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Pending => "pending",
            Origin::Cached => "cached",
            Origin::Durable => "durable",
            Origin::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub identity: PageIdentity,
    pub params: ParameterSet,
    pub origin: Origin,
}
