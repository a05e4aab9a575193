//! Top-level recursive matcher: dispatches on the pattern/subject atom
//! kinds and delegates sequence-shaped subterms to `seq_match`. Bindable
//! variables are the only thing that ever grows a `Bindings`; every other
//! case either recurses and merges, or falls back to plain structural
//! equality.

use crate::atom::Atom;
use crate::bindings::Bindings;
use crate::guard::{guard_holds, GuardRegistry};
use crate::outcome::Outcome;
use crate::seq_match;
use crate::symbol::Symbol;
use crate::timeout::Deadline;

pub fn try_match(pattern: &Atom, subject: &Atom, bindings: &Bindings, registry: &dyn GuardRegistry, deadline: &Deadline) -> Outcome {
    if deadline.is_expired() {
        return Outcome::Fail;
    }

    if !pattern.type_matches(subject) {
        return Outcome::Fail;
    }

    try_match_without_types(pattern, subject, bindings, registry, deadline)
}

fn try_match_without_types(pattern: &Atom, subject: &Atom, bindings: &Bindings, registry: &dyn GuardRegistry, deadline: &Deadline) -> Outcome {
    if pattern.is_bindable_variable() {
        return match_variable(pattern, subject, bindings, registry);
    }

    if pattern.is_literal() {
        return if pattern == subject { Outcome::Match(bindings.clone()) } else { Outcome::Fail };
    }

    if let (Some((pp, pb)), Some((sp, sb))) = (pattern.as_lambda(), subject.as_lambda()) {
        return try_match(pp, sp, bindings, registry, deadline).chain_bind(|b| try_match(pb, sb, b, registry, deadline));
    }

    if let (Some((pop, pargs)), Some((sop, sargs))) = (pattern.as_op_apply(), subject.as_op_apply()) {
        if pop != sop {
            return Outcome::Fail;
        }
        // args are always an AtomSeq by the OpApply invariant; matched here
        // directly (rather than by recursing through the generic AtomSeq
        // branch below) so the owning operator can be passed down as a
        // grouping hint.
        let (pe, pp) = pargs.as_atom_seq().expect("OpApply args are always an AtomSeq");
        let (se, sp) = sargs.as_atom_seq().expect("OpApply args are always an AtomSeq");
        return seq_match::match_sequences(pe, pp, se, sp, bindings, registry, deadline, Some(pop));
    }

    if let (Some((pl, pr)), Some((sl, sr))) = (pattern.as_simple_apply(), subject.as_simple_apply()) {
        return try_match(pl, sl, bindings, registry, deadline).chain_bind(|b| try_match(pr, sr, b, registry, deadline));
    }

    if let (Some((pe, pp)), Some((se, sp))) = (pattern.as_atom_seq(), subject.as_atom_seq()) {
        return seq_match::match_sequences(pe, pp, se, sp, bindings, registry, deadline, None);
    }

    if let (Some(pf), Some(sf)) = (pattern.as_algprop(), subject.as_algprop()) {
        return match_algprop(pf, sf, bindings);
    }

    if let (Some((pl, pr)), Some((sl, sr))) = (pattern.as_map_pair(), subject.as_map_pair()) {
        return try_match(pl, sl, bindings, registry, deadline).chain_bind(|b| try_match(pr, sr, b, registry, deadline));
    }

    if let (Some((ptag, pcontent)), Some((stag, scontent))) = (pattern.as_special_form(), subject.as_special_form()) {
        if ptag != stag {
            return Outcome::Fail;
        }
        return try_match(pcontent, scontent, bindings, registry, deadline);
    }

    if pattern == subject {
        Outcome::Match(bindings.clone())
    } else {
        Outcome::Fail
    }
}

fn match_variable(pattern: &Atom, subject: &Atom, bindings: &Bindings, registry: &dyn GuardRegistry) -> Outcome {
    let name: Symbol = pattern.variable_name().cloned().expect("is_bindable_variable implies a name");
    if let Some(guard) = pattern.variable_guard() {
        if !guard_holds(guard, &name, subject, registry) {
            return Outcome::Fail;
        }
    }
    match bindings.bind(name, subject.clone()) {
        Some(b) => Outcome::Match(b),
        None => Outcome::Fail,
    }
}

fn match_algprop(pattern: &crate::algprop::AlgPropFields, subject: &crate::algprop::AlgPropFields, bindings: &Bindings) -> Outcome {
    let slots = [
        (&pattern.associative, &subject.associative),
        (&pattern.commutative, &subject.commutative),
        (&pattern.idempotent, &subject.idempotent),
        (&pattern.absorber, &subject.absorber),
        (&pattern.identity, &subject.identity),
    ];
    for (p, s) in slots {
        match (p, s) {
            (None, _) => {}
            (Some(_), None) => {} // specified pattern slot against unspecified subject matches ANY
            (Some(pa), Some(sa)) if pa == sa => {}
            _ => return Outcome::Fail,
        }
    }
    Outcome::Match(bindings.clone())
}

#[cfg(test)]
mod matcher_tests {
    use super::*;
    use crate::atom::{mk_int, mk_simple_apply, mk_var};
    use crate::guard::NoGuards;

    #[test]
    fn variable_binds_to_any_subject() {
        let pattern = mk_var("x", None, Vec::new(), false);
        let result = try_match(&pattern, &mk_int(5), &Bindings::empty(), &NoGuards, &Deadline::unbounded());
        match result {
            Outcome::Match(b) => assert_eq!(b.get(&Symbol::from("x")), Some(&mk_int(5))),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn literal_matches_only_equal_literal() {
        assert!(try_match(&mk_int(1), &mk_int(2), &Bindings::empty(), &NoGuards, &Deadline::unbounded()).is_fail());
        assert!(!try_match(&mk_int(1), &mk_int(1), &Bindings::empty(), &NoGuards, &Deadline::unbounded()).is_fail());
    }

    #[test]
    fn repeated_pattern_variable_requires_consistent_binding() {
        let pattern = mk_simple_apply(mk_var("x", None, Vec::new(), false), mk_var("x", None, Vec::new(), false));
        let subject_ok = mk_simple_apply(mk_int(1), mk_int(1));
        let subject_bad = mk_simple_apply(mk_int(1), mk_int(2));
        assert!(!try_match(&pattern, &subject_ok, &Bindings::empty(), &NoGuards, &Deadline::unbounded()).is_fail());
        assert!(try_match(&pattern, &subject_bad, &Bindings::empty(), &NoGuards, &Deadline::unbounded()).is_fail());
    }

    #[test]
    fn guarded_variable_rejects_wrong_type() {
        let pattern = mk_var("x", Some(crate::roots::string_ty()), Vec::new(), false);
        assert!(try_match(&pattern, &mk_int(1), &Bindings::empty(), &NoGuards, &Deadline::unbounded()).is_fail());
    }
}
