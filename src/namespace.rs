//! Namespace Resolution
//!
//! Stack-based prefix resolver used while building fragments and writer output.

/// URI permanently bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// URI permanently bound to the `xmlns` prefix.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    prefix: String,
    uri: String,
    depth: usize,
}

/// Stack of prefix bindings, one frame per open element.
///
/// An empty prefix denotes the default namespace; binding it to the empty
/// string undeclares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceScope {
    bindings: Vec<Binding>,
    depth: usize,
}

impl Default for NamespaceScope {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceScope {
    /// Creates a scope with `xml` and `xmlns` pre-bound.
    pub fn new() -> Self {
        NamespaceScope {
            bindings: vec![
                Binding {
                    prefix: "xml".to_string(),
                    uri: XML_NAMESPACE.to_string(),
                    depth: 0,
                },
                Binding {
                    prefix: "xmlns".to_string(),
                    uri: XMLNS_NAMESPACE.to_string(),
                    depth: 0,
                },
            ],
            depth: 0,
        }
    }

    /// Enter a new element scope
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave an element scope, removing any bindings declared in it
    pub fn pop_scope(&mut self) {
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth || binding.depth == 0 {
                break;
            }
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Declare a binding in the current scope. Attempts to rebind `xml` or
    /// `xmlns` are ignored.
    pub fn declare(&mut self, prefix: &str, uri: &str) {
        if prefix == "xml" || prefix == "xmlns" {
            return;
        }
        self.bindings.push(Binding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            depth: self.depth,
        });
    }

    /// Resolve a prefix to its URI. The default namespace resolves to `""`
    /// when nothing binds it; any other unbound prefix yields `None`.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        let found = self
            .bindings
            .iter()
            .rev()
            .find(|binding| binding.prefix == prefix)
            .map(|binding| binding.uri.as_str());

        match found {
            Some("") if !prefix.is_empty() => None,
            Some(uri) => Some(uri),
            None if prefix.is_empty() => Some(""),
            None => None,
        }
    }

    /// The URI unprefixed element names fall into.
    pub fn default_namespace(&self) -> &str {
        self.resolve("").unwrap_or("")
    }

    /// Current element depth
    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predeclared_prefixes_resolve() {
        let scope = NamespaceScope::new();
        assert_eq!(scope.resolve("xml"), Some(XML_NAMESPACE));
        assert_eq!(scope.resolve("xmlns"), Some(XMLNS_NAMESPACE));
        assert_eq!(scope.default_namespace(), "");
        assert_eq!(scope.resolve("p"), None);
    }

    #[test]
    fn inner_declarations_shadow_and_unwind() {
        let mut scope = NamespaceScope::new();
        scope.push_scope();
        scope.declare("", "urn:outer");
        scope.declare("p", "urn:p");
        scope.push_scope();
        scope.declare("", "urn:inner");
        assert_eq!(scope.default_namespace(), "urn:inner");
        assert_eq!(scope.resolve("p"), Some("urn:p"));

        scope.pop_scope();
        assert_eq!(scope.default_namespace(), "urn:outer");
        scope.pop_scope();
        assert_eq!(scope.default_namespace(), "");
        assert_eq!(scope.resolve("p"), None);
        assert_eq!(scope.depth(), 0);
    }

    #[test]
    fn empty_default_declaration_undeclares() {
        let mut scope = NamespaceScope::new();
        scope.push_scope();
        scope.declare("", "urn:foo");
        scope.push_scope();
        scope.declare("", "");
        assert_eq!(scope.default_namespace(), "");
    }

    #[test]
    fn reserved_prefixes_cannot_be_rebound() {
        let mut scope = NamespaceScope::new();
        scope.push_scope();
        scope.declare("xml", "urn:nope");
        assert_eq!(scope.resolve("xml"), Some(XML_NAMESPACE));
    }
}
