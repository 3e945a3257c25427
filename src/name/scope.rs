//! Lexically scoped namespace bindings.
//!
//! Used by the tree builder while elements are open and by the tree walker
//! to track which declarations have already been emitted.

use super::XML_NAMESPACE;

/// A stack of namespace binding frames, one frame per open element.
///
/// A `None` prefix is the default namespace. Binding the default prefix to
/// the empty URI undeclares it for the rest of the scope.
#[derive(Debug, Clone)]
pub struct NamespaceStack {
    stack: Vec<Vec<(Option<String>, String)>>,
}

impl NamespaceStack {
    /// Creates a stack with the `xml` prefix pre-bound.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stack: vec![vec![(Some("xml".to_string()), XML_NAMESPACE.to_string())]],
        }
    }

    /// Opens a new (empty) scope.
    pub fn push_scope(&mut self) {
        self.stack.push(Vec::new());
    }

    /// Closes the innermost scope. The base scope holding `xml` is never popped.
    pub fn pop_scope(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Returns the number of open scopes above the base scope.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    /// Binds `prefix` to `uri` in the innermost scope.
    pub fn declare(&mut self, prefix: Option<&str>, uri: &str) {
        if let Some(frame) = self.stack.last_mut() {
            frame.push((prefix.map(str::to_owned), uri.to_owned()));
        }
    }

    /// Returns the binding for `prefix`, searching from the innermost scope
    /// outward. `Some("")` is returned for an explicit default undeclaration.
    fn lookup(&self, prefix: Option<&str>) -> Option<&str> {
        self.stack
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Resolves a prefix to its URI.
    ///
    /// Returns `None` when the prefix is unbound, or when the default
    /// namespace was undeclared with `xmlns=""`.
    #[must_use]
    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        self.lookup(prefix).filter(|uri| !uri.is_empty())
    }

    /// Returns `true` if `prefix` currently resolves to exactly `uri`.
    ///
    /// For the default prefix, an empty `uri` is "declared" when no default
    /// namespace is in effect.
    #[must_use]
    pub fn is_declared(&self, prefix: Option<&str>, uri: &str) -> bool {
        match self.lookup(prefix) {
            Some(bound) => bound == uri,
            None => prefix.is_none() && uri.is_empty(),
        }
    }
}

impl Default for NamespaceStack {
    fn default() -> Self {
        Self::new()
    }
}
