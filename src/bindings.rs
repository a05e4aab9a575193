use std::sync::Arc;

use hashbrown::HashMap;

use crate::atom::Atom;
use crate::symbol::Symbol;

/// Variable name to atom binding produced by a successful match. Shares
/// structure the same way atoms do (`Arc`-wrapped map, clone-on-write on
/// `insert`), since the matcher builds and discards many of these while
/// backtracking through sequence permutations.
#[derive(Clone, Debug, Default)]
pub struct Bindings(Arc<HashMap<Symbol, Atom>>);

impl Bindings {
    pub fn empty() -> Bindings {
        Bindings(Arc::new(HashMap::new()))
    }

    pub fn get(&self, name: &Symbol) -> Option<&Atom> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Binds `name` to `value`, succeeding only if `name` is unbound or
    /// already bound to an atom equal to `value` (the matcher's consistency
    /// rule: a variable must bind the same way everywhere it appears in a
    /// pattern).
    pub fn bind(&self, name: Symbol, value: Atom) -> Option<Bindings> {
        match self.0.get(&name) {
            Some(existing) if existing != &value => None,
            Some(_) => Some(self.clone()),
            None => {
                let mut map = (*self.0).clone();
                map.insert(name, value);
                Some(Bindings(Arc::new(map)))
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Atom)> {
        self.0.iter()
    }

    /// Merges two binding sets, failing if they disagree on any shared
    /// variable. Used when a sequence match combines bindings contributed
    /// by different elements of the sequence.
    pub fn merge(&self, other: &Bindings) -> Option<Bindings> {
        let mut result = self.clone();
        for (k, v) in other.iter() {
            result = result.bind(k.clone(), v.clone())?;
        }
        Some(result)
    }
}

impl PartialEq for Bindings {
    fn eq(&self, other: &Bindings) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        self.0.iter().all(|(k, v)| other.0.get(k) == Some(v))
    }
}

impl Eq for Bindings {}

impl std::hash::Hash for Bindings {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        let mut acc: u64 = 0;
        for (k, v) in self.0.iter() {
            acc ^= fxhash::hash64(&(k.as_str(), v.digest()));
        }
        acc.hash(state);
    }
}

#[cfg(test)]
mod bindings_tests {
    use super::*;
    use crate::atom::mk_int;

    #[test]
    fn bind_then_get_roundtrips() {
        let b = Bindings::empty().bind(Symbol::from("x"), mk_int(1)).unwrap();
        assert_eq!(b.get(&Symbol::from("x")), Some(&mk_int(1)));
    }

    #[test]
    fn rebinding_same_value_succeeds() {
        let b = Bindings::empty().bind(Symbol::from("x"), mk_int(1)).unwrap();
        assert!(b.bind(Symbol::from("x"), mk_int(1)).is_some());
    }

    #[test]
    fn rebinding_different_value_fails() {
        let b = Bindings::empty().bind(Symbol::from("x"), mk_int(1)).unwrap();
        assert!(b.bind(Symbol::from("x"), mk_int(2)).is_none());
    }

    #[test]
    fn merge_combines_disjoint_bindings() {
        let a = Bindings::empty().bind(Symbol::from("x"), mk_int(1)).unwrap();
        let b = Bindings::empty().bind(Symbol::from("y"), mk_int(2)).unwrap();
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_rejects_conflicting_bindings() {
        let a = Bindings::empty().bind(Symbol::from("x"), mk_int(1)).unwrap();
        let b = Bindings::empty().bind(Symbol::from("x"), mk_int(2)).unwrap();
        assert!(a.merge(&b).is_none());
    }
}
