//! Sequence matching, dispatched on the pattern's `AlgProp`: plain
//! positional matching when neither associative nor commutative, a
//! permutation search when only commutative, a grouping search when only
//! associative, and their product when both. Associative grouping is
//! enumerated by choosing `pattern.len() - 1` divider positions among the
//! `subject.len() - 1` gaps between subject elements, the same
//! cursor-based counting `itertools`'s own iterators use, generalized to
//! ordered dividers since `itertools::combinations` enumerates unordered
//! subsets and an associative grouping needs order-preserving splits.

use itertools::Itertools;

use crate::algprop::AlgPropFields;
use crate::atom::{self, mk_atom_seq, Atom};
use crate::bindings::Bindings;
use crate::errors::fatal_empty_grouping;
use crate::guard::GuardRegistry;
use crate::matcher::try_match;
use crate::outcome::Outcome;
use crate::timeout::Deadline;

/// `op_hint` is the operator a pattern/subject `AtomSeq` belongs to, when
/// it's an `OpApply`'s argument list; it's required to build a larger-than-
/// one-element associative group as `op(group…)` rather than a bare
/// sequence, so a pattern position expecting an operator application can
/// still match against it. `None` for a bare `AtomSeq`-vs-`AtomSeq` match
/// with no enclosing operator, in which case a pattern position can only
/// absorb a group of more than one element if it's itself a bindable
/// variable, since there's no operator to wrap the rest with.
pub fn match_sequences(
    pattern: &[Atom],
    pattern_props: &AlgPropFields,
    subject: &[Atom],
    subject_props: &AlgPropFields,
    bindings: &Bindings,
    registry: &dyn GuardRegistry,
    deadline: &Deadline,
    op_hint: Option<&Atom>,
) -> Outcome {
    // A specified pattern AlgProp slot must agree with the subject's,
    // treating an unspecified subject slot as matching anything (mirrors
    // the AlgProp-vs-AlgProp matching rule one level up).
    for (p, s) in [
        (&pattern_props.associative, &subject_props.associative),
        (&pattern_props.commutative, &subject_props.commutative),
    ] {
        if let (Some(pa), Some(sa)) = (p, s) {
            if pa != sa {
                return Outcome::Fail;
            }
        }
    }

    match (pattern_props.is_associative(), pattern_props.is_commutative()) {
        (false, false) => match_positional(pattern, subject, bindings, registry, deadline),
        (false, true) => match_commutative(pattern, subject, bindings, registry, deadline),
        (true, false) => match_associative(pattern, subject, bindings, registry, deadline, false, op_hint),
        (true, true) => match_associative(pattern, subject, bindings, registry, deadline, true, op_hint),
    }
}

fn match_positional(pattern: &[Atom], subject: &[Atom], bindings: &Bindings, registry: &dyn GuardRegistry, deadline: &Deadline) -> Outcome {
    if pattern.len() != subject.len() {
        return Outcome::Fail;
    }
    let mut outcome = Outcome::Match(bindings.clone());
    for (p, s) in pattern.iter().zip(subject.iter()) {
        outcome = outcome.chain_bind(|b| try_match(p, s, b, registry, deadline));
        if outcome.is_fail() {
            return Outcome::Fail;
        }
    }
    outcome
}

fn match_commutative(pattern: &[Atom], subject: &[Atom], bindings: &Bindings, registry: &dyn GuardRegistry, deadline: &Deadline) -> Outcome {
    if pattern.len() != subject.len() {
        return Outcome::Fail;
    }
    if !unbindable_prefilter_passes(pattern, subject, registry, deadline) {
        return Outcome::Fail;
    }
    let mut found = Vec::new();
    for perm in subject.iter().cloned().permutations(subject.len()) {
        if deadline.is_expired() {
            break;
        }
        match match_positional(pattern, &perm, bindings, registry, deadline) {
            Outcome::Fail => {}
            Outcome::Match(b) => found.push(b),
            Outcome::Many(mut bs) => found.append(&mut bs),
        }
    }
    to_outcome(found)
}

/// Before paying for a full permutation search, check that every
/// "unbindable" pattern — one whose structural root isn't a plain variable,
/// so it can only match a subject it structurally agrees with, not bind to
/// whatever's left over — has at least one subject position it could
/// possibly match at all. If one doesn't, every permutation is doomed and
/// the whole commutative search can fail immediately. This only prunes
/// work; it never removes a binding the unpruned search would have found,
/// since a pattern lacking any candidate can't contribute to any
/// permutation's success either.
fn unbindable_prefilter_passes(pattern: &[Atom], subject: &[Atom], registry: &dyn GuardRegistry, deadline: &Deadline) -> bool {
    let mut unbindable: Vec<&Atom> = pattern.iter().filter(|p| !p.is_bindable_variable()).collect();
    unbindable.sort_by_key(|p| p.depth());
    for p in unbindable {
        if deadline.is_expired() {
            return true;
        }
        let has_candidate = subject.iter().any(|s| !try_match(p, s, &Bindings::empty(), registry, deadline).is_fail());
        if !has_candidate {
            return false;
        }
    }
    true
}

/// Divider-index groupings of `n` subject positions into `k` ordered,
/// non-empty, contiguous groups.
fn groupings(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k == 0 || n < k {
        return Vec::new();
    }
    if k == 1 {
        return vec![vec![n]];
    }
    (0..n - 1)
        .combinations(k - 1)
        .map(|dividers| {
            let mut sizes = Vec::with_capacity(k);
            let mut prev = 0usize;
            for d in dividers {
                sizes.push(d + 1 - prev);
                prev = d + 1;
            }
            sizes.push(n - prev);
            sizes
        })
        .collect()
}

fn group_by_sizes(elems: &[Atom], sizes: &[usize], props: &AlgPropFields, op_hint: Option<&Atom>) -> Vec<Atom> {
    let mut groups = Vec::with_capacity(sizes.len());
    let mut idx = 0;
    for &size in sizes {
        if size == 0 {
            fatal_empty_grouping(line!());
        }
        let slice = &elems[idx..idx + size];
        idx += size;
        if size == 1 {
            groups.push(slice[0].clone());
        } else {
            let seq = mk_atom_seq(slice.to_vec(), props.clone()).expect("props already validated by caller");
            match op_hint {
                Some(op) => groups.push(atom::mk_op_apply_raw(op.clone(), seq)),
                None => groups.push(seq),
            }
        }
    }
    groups
}

fn match_associative(
    pattern: &[Atom],
    subject: &[Atom],
    bindings: &Bindings,
    registry: &dyn GuardRegistry,
    deadline: &Deadline,
    also_commutative: bool,
    op_hint: Option<&Atom>,
) -> Outcome {
    if pattern.is_empty() {
        return if subject.is_empty() { Outcome::Match(bindings.clone()) } else { Outcome::Fail };
    }
    let k = pattern.len();
    if subject.len() < k {
        return Outcome::Fail;
    }
    let props = AlgPropFields { associative: Some(crate::atom::mk_bool(true)), ..AlgPropFields::none() };
    let mut found = Vec::new();

    let orderings: Vec<Vec<Atom>> = if also_commutative {
        subject.iter().cloned().permutations(subject.len()).collect()
    } else {
        vec![subject.to_vec()]
    };

    for ordering in orderings {
        if deadline.is_expired() {
            break;
        }
        for sizes in groupings(ordering.len(), k) {
            // with no operator to rebuild a multi-element group as a term, only a
            // bindable variable can plausibly absorb it
            if sizes.iter().enumerate().any(|(i, &sz)| sz > 1 && op_hint.is_none() && !pattern[i].is_bindable_variable()) {
                continue;
            }
            let grouped = group_by_sizes(&ordering, &sizes, &props, op_hint);
            match match_positional(pattern, &grouped, bindings, registry, deadline) {
                Outcome::Fail => {}
                Outcome::Match(b) => found.push(b),
                Outcome::Many(mut bs) => found.append(&mut bs),
            }
        }
    }
    to_outcome(found)
}

fn to_outcome(mut found: Vec<Bindings>) -> Outcome {
    found.dedup_by(|a, b| a == b);
    match found.len() {
        0 => Outcome::Fail,
        1 => Outcome::Match(found.pop().unwrap()),
        _ => Outcome::Many(found),
    }
}

#[cfg(test)]
mod seq_match_tests {
    use super::*;
    use crate::atom::{mk_int, mk_var};
    use crate::guard::NoGuards;

    fn no_props() -> AlgPropFields {
        AlgPropFields::none()
    }

    #[test]
    fn positional_match_requires_equal_length() {
        let pattern = vec![mk_var("x", None, Vec::new(), false)];
        let subject = vec![mk_int(1), mk_int(2)];
        let result = match_sequences(&pattern, &no_props(), &subject, &no_props(), &Bindings::empty(), &NoGuards, &Deadline::unbounded(), None);
        assert!(result.is_fail());
    }

    #[test]
    fn commutative_match_finds_a_permutation() {
        let pattern = vec![mk_int(2), mk_var("x", None, Vec::new(), false)];
        let subject = vec![mk_int(1), mk_int(2)];
        let props = AlgPropFields { commutative: Some(crate::atom::mk_bool(true)), ..AlgPropFields::none() };
        let result = match_sequences(&pattern, &props, &subject, &props, &Bindings::empty(), &NoGuards, &Deadline::unbounded(), None);
        assert!(!result.is_fail());
    }

    #[test]
    fn associative_match_lets_a_variable_absorb_several_elements() {
        let pattern = vec![mk_int(1), mk_var("rest", None, Vec::new(), false)];
        let subject = vec![mk_int(1), mk_int(2), mk_int(3)];
        let props = AlgPropFields { associative: Some(crate::atom::mk_bool(true)), ..AlgPropFields::none() };
        let result = match_sequences(&pattern, &props, &subject, &props, &Bindings::empty(), &NoGuards, &Deadline::unbounded(), None);
        assert!(!result.is_fail());
    }

    #[test]
    fn associative_match_with_op_hint_lets_a_nested_pattern_absorb_a_group() {
        let op = crate::atom::mk_operator_ref("concat");
        let x = mk_var("x", None, Vec::new(), false);
        let y = mk_var("y", None, Vec::new(), false);
        let z = mk_var("z", None, Vec::new(), false);
        let inner = atom::mk_op_apply_raw(op.clone(), mk_atom_seq(vec![y, z], AlgPropFields::none()).unwrap());
        let pattern = vec![x, inner];
        let subject = vec![mk_int(1), mk_int(2), mk_int(3)];
        let props = AlgPropFields { associative: Some(crate::atom::mk_bool(true)), ..AlgPropFields::none() };
        let result = match_sequences(&pattern, &props, &subject, &props, &Bindings::empty(), &NoGuards, &Deadline::unbounded(), Some(&op));
        assert!(!result.is_fail());
    }

    #[test]
    fn commutative_match_fails_fast_when_an_unbindable_pattern_has_no_candidate() {
        let pattern = vec![mk_int(99), mk_var("x", None, Vec::new(), false)];
        let subject = vec![mk_int(1), mk_int(2)];
        let props = AlgPropFields { commutative: Some(crate::atom::mk_bool(true)), ..AlgPropFields::none() };
        let result = match_sequences(&pattern, &props, &subject, &props, &Bindings::empty(), &NoGuards, &Deadline::unbounded(), None);
        assert!(result.is_fail());
    }

    #[test]
    fn groupings_partitions_all_positions() {
        let gs = groupings(4, 2);
        assert!(gs.iter().all(|sizes| sizes.iter().sum::<usize>() == 4));
        assert_eq!(gs.len(), 3);
    }
}
