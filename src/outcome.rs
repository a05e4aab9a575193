//! Outcome of a single match attempt. An `Either`-style short-circuiting
//! enum, generalized from a plain boolean so a caller can thread "no
//! match", "one match", and "several matches, pick one" through the same
//! combinator chain without allocating an error for the non-exceptional,
//! common case of a pattern simply not matching.

use crate::bindings::Bindings;

#[derive(Clone, Debug)]
pub enum Outcome {
    /// No consistent binding exists.
    Fail,
    /// Exactly one consistent binding was found.
    Match(Bindings),
    /// More than one binding is possible (an AC/C match with several valid
    /// groupings); the caller decides how many it actually needs.
    Many(Vec<Bindings>),
}

impl Outcome {
    pub fn is_fail(&self) -> bool {
        matches!(self, Outcome::Fail)
    }

    pub fn into_vec(self) -> Vec<Bindings> {
        match self {
            Outcome::Fail => Vec::new(),
            Outcome::Match(b) => vec![b],
            Outcome::Many(v) => v,
        }
    }

    pub fn first(self) -> Option<Bindings> {
        match self {
            Outcome::Fail => None,
            Outcome::Match(b) => Some(b),
            Outcome::Many(v) => v.into_iter().next(),
        }
    }

    /// Chains two match steps, merging bindings; fails if either step
    /// fails or if the merge finds a conflicting binding.
    pub fn chain_bind(self, other: impl Fn(&Bindings) -> Outcome) -> Outcome {
        match self {
            Outcome::Fail => Outcome::Fail,
            Outcome::Match(b) => match other(&b) {
                Outcome::Fail => Outcome::Fail,
                Outcome::Match(b2) => match b.merge(&b2) {
                    Some(merged) => Outcome::Match(merged),
                    None => Outcome::Fail,
                },
                Outcome::Many(bs) => {
                    let merged: Vec<Bindings> = bs.into_iter().filter_map(|b2| b.merge(&b2)).collect();
                    from_vec(merged)
                }
            },
            Outcome::Many(bindings) => {
                let mut all = Vec::new();
                for b in bindings {
                    match other(&b) {
                        Outcome::Fail => {}
                        Outcome::Match(b2) => {
                            if let Some(merged) = b.merge(&b2) {
                                all.push(merged);
                            }
                        }
                        Outcome::Many(bs) => {
                            for b2 in bs {
                                if let Some(merged) = b.merge(&b2) {
                                    all.push(merged);
                                }
                            }
                        }
                    }
                }
                from_vec(all)
            }
        }
    }

    /// Tries `self`; if it fails, falls back to `other` (the `~>` ordered
    /// alternation combinator).
    pub fn or_else(self, other: impl FnOnce() -> Outcome) -> Outcome {
        match self {
            Outcome::Fail => other(),
            owise => owise,
        }
    }
}

fn from_vec(v: Vec<Bindings>) -> Outcome {
    match v.len() {
        0 => Outcome::Fail,
        1 => Outcome::Match(v.into_iter().next().unwrap()),
        _ => Outcome::Many(v),
    }
}

#[cfg(test)]
mod outcome_tests {
    use super::*;
    use crate::atom::mk_int;
    use crate::symbol::Symbol;

    #[test]
    fn chain_bind_merges_consistent_bindings() {
        let a = Outcome::Match(Bindings::empty().bind(Symbol::from("x"), mk_int(1)).unwrap());
        let result = a.chain_bind(|_| Outcome::Match(Bindings::empty().bind(Symbol::from("y"), mk_int(2)).unwrap()));
        match result {
            Outcome::Match(b) => assert_eq!(b.len(), 2),
            _ => panic!("expected a single merged match"),
        }
    }

    #[test]
    fn chain_bind_fails_on_conflicting_bindings() {
        let a = Outcome::Match(Bindings::empty().bind(Symbol::from("x"), mk_int(1)).unwrap());
        let result = a.chain_bind(|_| Outcome::Match(Bindings::empty().bind(Symbol::from("x"), mk_int(2)).unwrap()));
        assert!(result.is_fail());
    }

    #[test]
    fn or_else_falls_back_on_failure() {
        let result = Outcome::Fail.or_else(|| Outcome::Match(Bindings::empty()));
        assert!(!result.is_fail());
    }
}
