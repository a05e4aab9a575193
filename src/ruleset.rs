//! Named-bit ruleset registry. Each declared ruleset owns one bit of a
//! `u64` bitset; a rule's `rulesets` field is the union of the bits of the
//! rulesets it belongs to, and "is this rule active" is a single `&`
//! against the caller's active-ruleset bitset. Sixty-four rulesets ought to
//! be enough for any one `Context`; a crate that needs more can widen this
//! to a bigger bitset type without changing the registry's interface.

use hashbrown::HashMap;

use crate::atom::{mk_ruleset_ref, Atom};
use crate::errors::{ElisionErr, ElisionResult};
use crate::symbol::Symbol;

pub struct RulesetRegistry {
    bits: HashMap<Symbol, u64>,
    next_bit: u32,
    active: u64,
}

impl RulesetRegistry {
    pub fn new() -> RulesetRegistry {
        RulesetRegistry { bits: HashMap::new(), next_bit: 0, active: 0 }
    }

    pub fn declare(&mut self, name: impl Into<Symbol>) -> ElisionResult<Atom> {
        let name = name.into();
        if let Some(&bit) = self.bits.get(&name) {
            return Ok(mk_ruleset_ref(name, bit));
        }
        if self.next_bit >= 64 {
            return Err(ElisionErr::CacheException { reason: "ruleset registry is full (64 rulesets max)".into(), loc: None });
        }
        let bit = 1u64 << self.next_bit;
        self.next_bit += 1;
        self.bits.insert(name.clone(), bit);
        self.active |= bit;
        Ok(mk_ruleset_ref(name, bit))
    }

    pub fn bit_of(&self, name: &Symbol) -> Option<u64> {
        self.bits.get(name).copied()
    }

    pub fn set_active(&mut self, name: &Symbol, on: bool) -> ElisionResult<()> {
        let bit = self.bit_of(name).ok_or_else(|| ElisionErr::NoSuchRulesetException { name: name.as_str().to_string(), loc: None })?;
        if on {
            self.active |= bit;
        } else {
            self.active &= !bit;
        }
        Ok(())
    }

    pub fn active_bits(&self) -> u64 {
        self.active
    }
}

impl Default for RulesetRegistry {
    fn default() -> Self {
        RulesetRegistry::new()
    }
}

#[cfg(test)]
mod ruleset_tests {
    use super::*;

    #[test]
    fn declaring_twice_returns_the_same_bit() {
        let mut reg = RulesetRegistry::new();
        let a = reg.declare("algebra").unwrap();
        let b = reg.declare("algebra").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_rulesets_get_distinct_bits() {
        let mut reg = RulesetRegistry::new();
        let (_, bit_a) = reg.declare("a").unwrap().as_ruleset_ref().map(|(n, b)| (n.clone(), b)).unwrap();
        let (_, bit_b) = reg.declare("b").unwrap().as_ruleset_ref().map(|(n, b)| (n.clone(), b)).unwrap();
        assert_ne!(bit_a, bit_b);
    }

    #[test]
    fn deactivating_unknown_ruleset_errs() {
        let mut reg = RulesetRegistry::new();
        assert!(reg.set_active(&Symbol::from("nope"), false).is_err());
    }

    #[test]
    fn deactivated_ruleset_clears_its_bit() {
        let mut reg = RulesetRegistry::new();
        reg.declare("a").unwrap();
        let name = Symbol::from("a");
        reg.set_active(&name, false).unwrap();
        assert_eq!(reg.active_bits() & reg.bit_of(&name).unwrap(), 0);
    }
}
