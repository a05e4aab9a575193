use std::sync::Arc;

/// Interned-by-value identifier for variable, operator, and ruleset names.
/// Lean-style kernels typically use a hierarchical cons-list of
/// string/integer segments for names (`nat.rec.cases`); these names are flat
/// symbols instead, so this is an `Arc<str>` wrapper rather than a cons-list,
/// cheap to clone and compared and hashed structurally.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Symbol {
        Symbol(Arc::from(s))
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Symbol {
        Symbol(Arc::from(s.as_str()))
    }
}

impl std::convert::AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod symbol_tests {
    use super::*;

    #[test]
    fn equal_strings_are_equal_symbols() {
        let a = Symbol::from("plus");
        let b = Symbol::from("plus".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = Symbol::from("a");
        let b = Symbol::from("b");
        assert!(a < b);
    }
}
