//! String interning dictionary.
//!
//! The `Dict` stores each distinct string once and hands out `SymbolId`
//! handles. The name registry keys its `QName` cache on symbol triples, so a
//! cache probe hashes three `u32`s instead of three strings.

use std::collections::HashMap;
use std::sync::Arc;

/// An interned string identifier.
///
/// Two `SymbolId` values are equal if and only if they refer to the same
/// interned string within the same `Dict`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SymbolId(u32);

impl SymbolId {
    /// Returns the raw index value.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// A string interning dictionary.
///
/// Interned strings are kept as `Arc<str>` so that callers holding names
/// (such as `QName`) can share the allocation with the dictionary.
///
/// # Examples
///
/// ```
/// use xmlweave::util::dict::Dict;
///
/// let mut dict = Dict::new();
/// let a = dict.intern("item");
/// let b = dict.intern("item");
///
/// assert_eq!(a, b);
/// assert_eq!(dict.resolve(a), "item");
/// assert_eq!(dict.lookup("missing"), None);
/// ```
#[derive(Debug, Default)]
pub struct Dict {
    map: HashMap<Arc<str>, SymbolId>,
    strings: Vec<Arc<str>>,
}

impl Dict {
    /// Creates a new empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a string and returns its `SymbolId`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn intern(&mut self, s: &str) -> SymbolId {
        if let Some(&id) = self.map.get(s) {
            return id;
        }
        // More than u32::MAX distinct names never occur in practice.
        let id = SymbolId(self.strings.len() as u32);
        let shared: Arc<str> = Arc::from(s);
        self.strings.push(Arc::clone(&shared));
        self.map.insert(shared, id);
        id
    }

    /// Returns the `SymbolId` of an already interned string without inserting.
    #[must_use]
    pub fn lookup(&self, s: &str) -> Option<SymbolId> {
        self.map.get(s).copied()
    }

    /// Resolves a `SymbolId` back to its string.
    ///
    /// Returns the empty string for ids that did not come from this dictionary.
    #[must_use]
    pub fn resolve(&self, id: SymbolId) -> &str {
        self.strings.get(id.0 as usize).map_or("", |s| s)
    }

    /// Returns a shared handle to the interned string.
    #[must_use]
    pub fn shared(&self, id: SymbolId) -> Option<Arc<str>> {
        self.strings.get(id.0 as usize).cloned()
    }

    /// Returns the number of interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns `true` if nothing has been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
