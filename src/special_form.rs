//! Tag-dispatch for the handful of special forms the (out-of-scope) parser
//! hands the core as a `{tag, content}` pair rather than as a concrete
//! `Atom` variant directly: `rule`, `operator`, `binds`, `match`, `map`.
//! Each constructor pulls its required keys out of a `Bindings` map and
//! rejects the form if a required key is missing, a disallowed key is
//! present, or a value has the wrong shape — the same kind of "reject
//! early with a named reason" check `errors::SpecialFormException` exists
//! for.

use crate::atom::{mk_map_pair, mk_rewrite_rule_atom, Atom, RewriteRuleData};
use crate::bindings::Bindings;
use crate::errors::{ElisionErr, ElisionResult};
use crate::guard::GuardRegistry;
use crate::matcher::try_match;
use crate::symbol::Symbol;
use crate::timeout::Deadline;

fn require<'a>(fields: &'a Bindings, tag: &str, key: &str) -> ElisionResult<&'a Atom> {
    fields.get(&Symbol::from(key)).ok_or_else(|| ElisionErr::SpecialFormException {
        tag: tag.to_string(),
        reason: format!("missing required key `{}`", key),
        loc: None,
    })
}

pub fn construct_rule(fields: &Bindings) -> ElisionResult<Atom> {
    let pattern = require(fields, "rule", "pattern")?.clone();
    let rewrite = require(fields, "rule", "rewrite")?.clone();
    let guards = fields
        .get(&Symbol::from("guards"))
        .and_then(|a| a.as_atom_seq())
        .map(|(elems, _)| elems.to_vec())
        .unwrap_or_default();
    let rulesets = fields
        .get(&Symbol::from("rulesets"))
        .and_then(|a| a.as_literal())
        .and_then(|l| if let crate::atom::Literal::Int(n) = l { Some(*n as u64) } else { None })
        .unwrap_or(0);
    if pattern == rewrite {
        return Err(ElisionErr::IdentityRuleException { loc: None });
    }
    Ok(mk_rewrite_rule_atom(RewriteRuleData { pattern, rewrite, guards, rulesets, synthetic: false }))
}

/// `binds` special form: a single-key binding, expressed as `{key: name,
/// value: atom}`, wrapped as a one-entry `BindingsAtom`.
pub fn construct_binds(fields: &Bindings) -> ElisionResult<Atom> {
    let key_atom = require(fields, "binds", "key")?;
    let value = require(fields, "binds", "value")?.clone();
    let name = match key_atom.as_literal() {
        Some(crate::atom::Literal::Sym(s)) => s.clone(),
        _ => {
            return Err(ElisionErr::SpecialFormException {
                tag: "binds".to_string(),
                reason: "`key` must be a symbol literal".to_string(),
                loc: None,
            })
        }
    };
    let b = Bindings::empty().bind(name, value).ok_or_else(|| ElisionErr::CacheException {
        reason: "impossible: binding into an empty map can't conflict".to_string(),
        loc: None,
    })?;
    Ok(crate::atom::mk_bindings_atom(b))
}

/// `map` special form: `{left: atom, right: atom}` becomes a `MapPair`.
pub fn construct_map(fields: &Bindings) -> ElisionResult<Atom> {
    let left = require(fields, "map", "left")?.clone();
    let right = require(fields, "map", "right")?.clone();
    Ok(mk_map_pair(left, right))
}

/// `match` special form: `{pattern: atom, subject: atom}`. Runs the
/// matcher eagerly and returns either a `BindingsAtom` (first match found)
/// or fails with a `SpecialFormException` naming the mismatch — special
/// forms don't have their own "no match" atom, so the caller that actually
/// wants `Outcome::Fail` semantics should call `matcher::try_match`
/// directly instead of going through this form.
pub fn construct_match(fields: &Bindings, registry: &dyn GuardRegistry, deadline: &Deadline) -> ElisionResult<Atom> {
    let pattern = require(fields, "match", "pattern")?;
    let subject = require(fields, "match", "subject")?;
    match try_match(pattern, subject, &Bindings::empty(), registry, deadline).first() {
        Some(binding) => Ok(crate::atom::mk_bindings_atom(binding)),
        None => Err(ElisionErr::SpecialFormException { tag: "match".to_string(), reason: "pattern did not match subject".to_string(), loc: None }),
    }
}

pub fn dispatch(tag: &Symbol, fields: &Bindings, registry: &dyn GuardRegistry, deadline: &Deadline) -> ElisionResult<Atom> {
    match tag.as_str() {
        "rule" => construct_rule(fields),
        "binds" => construct_binds(fields),
        "map" => construct_map(fields),
        "match" => construct_match(fields, registry, deadline),
        other => Err(ElisionErr::SpecialFormException { tag: other.to_string(), reason: "unrecognized special form tag".to_string(), loc: None }),
    }
}

#[cfg(test)]
mod special_form_tests {
    use super::*;
    use crate::atom::mk_int;
    use crate::guard::NoGuards;

    #[test]
    fn rule_form_builds_a_rewrite_rule() {
        let fields = Bindings::empty()
            .bind(Symbol::from("pattern"), mk_int(1))
            .unwrap()
            .bind(Symbol::from("rewrite"), mk_int(2))
            .unwrap();
        let atom = construct_rule(&fields).unwrap();
        assert!(atom.as_rewrite_rule().is_some());
    }

    #[test]
    fn rule_form_rejects_identity() {
        let fields = Bindings::empty()
            .bind(Symbol::from("pattern"), mk_int(1))
            .unwrap()
            .bind(Symbol::from("rewrite"), mk_int(1))
            .unwrap();
        assert!(construct_rule(&fields).is_err());
    }

    #[test]
    fn rule_form_requires_pattern_key() {
        let fields = Bindings::empty().bind(Symbol::from("rewrite"), mk_int(2)).unwrap();
        assert!(construct_rule(&fields).is_err());
    }

    #[test]
    fn match_form_fails_when_pattern_does_not_match() {
        let fields = Bindings::empty()
            .bind(Symbol::from("pattern"), mk_int(1))
            .unwrap()
            .bind(Symbol::from("subject"), mk_int(2))
            .unwrap();
        assert!(construct_match(&fields, &NoGuards, &Deadline::unbounded()).is_err());
    }
}
