//! Rewrite rule storage and the rewrite driver. Rules are indexed by the
//! head symbol of their pattern (`HashMap<Symbol, Vec<Atom>>`), so a
//! rewrite step only has to consider rules whose pattern could possibly
//! apply instead of scanning every rule in the library.

use hashbrown::HashMap;

use crate::atom::{mk_rewrite_rule_atom, Atom, RewriteRuleData};
use crate::bindings::Bindings;
use crate::errors::{ElisionErr, ElisionResult};
use crate::guard::GuardRegistry;
use crate::matcher::try_match;
use crate::operator::substitute_bindings;
use crate::symbol::Symbol;
use crate::timeout::Deadline;

const LITERAL_BUCKET: &str = "##literal";
const SIMPLE_BUCKET: &str = "##simple";

fn head_key(pattern: &Atom) -> Symbol {
    if let Some((op, _)) = pattern.as_op_apply() {
        if let Some(name) = op.as_operator_ref() {
            return name.clone();
        }
    }
    if pattern.is_literal() {
        return Symbol::from(LITERAL_BUCKET);
    }
    Symbol::from(SIMPLE_BUCKET)
}

pub struct RuleLibrary {
    by_head: HashMap<Symbol, Vec<Atom>>,
    generation: u64,
    allow_literal_rules: bool,
}

impl RuleLibrary {
    pub fn new(allow_literal_rules: bool) -> RuleLibrary {
        RuleLibrary { by_head: HashMap::new(), generation: 0, allow_literal_rules }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Validates and inserts a rule, rejecting a pattern equal to its own
    /// rewrite, a bare bindable variable as a pattern, or (unless enabled)
    /// a literal pattern, as user errors rather than silently accepting a
    /// rule that could never fire or would fire on everything.
    pub fn add_rule(&mut self, pattern: Atom, rewrite: Atom, guards: Vec<Atom>, rulesets: u64, synthetic: bool) -> ElisionResult<Atom> {
        if pattern == rewrite {
            return Err(ElisionErr::IdentityRuleException { loc: None });
        }
        if pattern.is_bindable_variable() {
            return Err(ElisionErr::BindablePatternException { loc: None });
        }
        if pattern.is_literal() && !self.allow_literal_rules {
            return Err(ElisionErr::LiteralPatternException { loc: None });
        }
        let data = RewriteRuleData { pattern: pattern.clone(), rewrite, guards, rulesets, synthetic };
        let atom = mk_rewrite_rule_atom(data);
        self.by_head.entry(head_key(&pattern)).or_insert_with(Vec::new).push(atom.clone());
        self.generation += 1;
        Ok(atom)
    }

    /// Synthesizes and inserts the associative-completion rule for an
    /// associative operator: `op(x, op(y, z)) = op(op(x, y), z)`, letting
    /// the sequence matcher assume a canonical left-nested shape when it
    /// needs one, rather than special-casing associativity in the matcher
    /// itself.
    pub fn synthesize_associative_completion(&mut self, op_ref: Atom, x: Symbol, y: Symbol, z: Symbol, rulesets: u64) -> ElisionResult<Atom> {
        use crate::algprop::AlgPropFields;
        use crate::atom::{mk_atom_seq, mk_op_apply_raw, mk_var};

        let props = AlgPropFields { associative: Some(crate::atom::mk_bool(true)), ..AlgPropFields::none() };
        let vx = mk_var(x, None, Vec::new(), false);
        let vy = mk_var(y, None, Vec::new(), false);
        let vz = mk_var(z, None, Vec::new(), false);

        let inner_pattern = mk_op_apply_raw(op_ref.clone(), mk_atom_seq(vec![vy.clone(), vz.clone()], props.clone())?);
        let pattern = mk_op_apply_raw(op_ref.clone(), mk_atom_seq(vec![vx.clone(), inner_pattern], props.clone())?);

        let inner_rewrite = mk_op_apply_raw(op_ref.clone(), mk_atom_seq(vec![vx, vy], props.clone())?);
        let rewrite = mk_op_apply_raw(op_ref, mk_atom_seq(vec![inner_rewrite, vz], props)?);

        self.add_rule(pattern, rewrite, Vec::new(), rulesets, true)
    }

    fn candidates(&self, atom: &Atom) -> &[Atom] {
        self.by_head.get(&head_key(atom)).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Tries every active rule whose head matches `atom` against `atom`
    /// itself (no descent into subterms); returns the first rewrite whose
    /// guards all hold.
    pub fn rewrite_top(&self, atom: &Atom, active_rulesets: u64, registry: &dyn GuardRegistry, deadline: &Deadline) -> Option<Atom> {
        for rule_atom in self.candidates(atom) {
            let rule = rule_atom.as_rewrite_rule().expect("by_head only stores RewriteRule atoms");
            if rule.rulesets != 0 && rule.rulesets & active_rulesets == 0 {
                continue;
            }
            if let Some(binding) = try_match(&rule.pattern, atom, &Bindings::empty(), registry, deadline).first() {
                if guards_hold(&rule.guards, &binding, registry, deadline) {
                    return Some(substitute_bindings(&rule.rewrite, &binding));
                }
            }
        }
        None
    }

    /// One top-down pass: try to rewrite the node itself first, then
    /// recursively rewrite whatever children the (possibly now different)
    /// node has.
    pub fn rewrite_once(&self, atom: &Atom, active_rulesets: u64, registry: &dyn GuardRegistry, deadline: &Deadline) -> Atom {
        let top = self.rewrite_top(atom, active_rulesets, registry, deadline).unwrap_or_else(|| atom.clone());
        descend(self, &top, active_rulesets, registry, deadline)
    }

    /// Repeats `rewrite_once` to a fixpoint, bounded by the deadline's
    /// rewrite budget and wall-clock timeout.
    pub fn do_rewrite(&self, atom: &Atom, active_rulesets: u64, registry: &dyn GuardRegistry, deadline: &mut Deadline) -> Atom {
        let mut current = atom.clone();
        loop {
            if !deadline.tick() {
                return current;
            }
            let next = self.rewrite_once(&current, active_rulesets, registry, deadline);
            if next == current {
                return current;
            }
            current = next;
        }
    }
}

/// Each rule-level guard is substituted under the candidate bindings and
/// rewritten to a fixpoint, the same way a `Variable`'s own guard is
/// evaluated, so a guard like `eq($x, 5)` actually reduces to `true` rather
/// than only being recognized when it's *already* the literal `true`.
fn guards_hold(guards: &[Atom], binding: &Bindings, registry: &dyn GuardRegistry, _deadline: &Deadline) -> bool {
    guards.iter().all(|g| {
        let substituted = substitute_bindings(g, binding);
        let resolved = registry.rewrite_for_guard(&substituted);
        matches!(resolved.as_literal(), Some(crate::atom::Literal::Bool(true)))
    })
}

fn descend(lib: &RuleLibrary, atom: &Atom, active_rulesets: u64, registry: &dyn GuardRegistry, deadline: &Deadline) -> Atom {
    if let Some((op, args)) = atom.as_op_apply() {
        let new_args = descend(lib, args, active_rulesets, registry, deadline);
        if let Some((elems, props)) = new_args.as_atom_seq() {
            if props.is_associative() {
                if let Some(spliced) = splice_associative_window(lib, op, elems, props, active_rulesets, registry, deadline) {
                    return spliced;
                }
            }
        }
        return crate::atom::mk_op_apply_raw(op.clone(), new_args);
    }
    if let Some((left, right)) = atom.as_simple_apply() {
        return crate::atom::mk_simple_apply(
            lib.rewrite_once(left, active_rulesets, registry, deadline),
            lib.rewrite_once(right, active_rulesets, registry, deadline),
        );
    }
    if let Some((param, body)) = atom.as_lambda() {
        return crate::atom::mk_lambda_raw(
            lib.rewrite_once(param, active_rulesets, registry, deadline),
            lib.rewrite_once(body, active_rulesets, registry, deadline),
        );
    }
    if let Some((tag, content)) = atom.as_special_form() {
        return crate::atom::mk_special_form(tag.clone(), lib.rewrite_once(content, active_rulesets, registry, deadline));
    }
    if let Some((elems, props)) = atom.as_atom_seq() {
        let new_props = rewrite_props(lib, props, active_rulesets, registry, deadline);
        let new_elems: Vec<Atom> = elems.iter().map(|e| lib.rewrite_once(e, active_rulesets, registry, deadline)).collect();
        return crate::atom::mk_atom_seq(new_elems, new_props).unwrap_or_else(|_| atom.clone());
    }
    atom.clone()
}

/// Rewrites the atoms an `AtomSeq`'s own algebraic properties carry
/// (e.g. a declared identity or absorber), not just its elements.
fn rewrite_props(
    lib: &RuleLibrary,
    props: &crate::algprop::AlgPropFields,
    active_rulesets: u64,
    registry: &dyn GuardRegistry,
    deadline: &Deadline,
) -> crate::algprop::AlgPropFields {
    let rw = |slot: &Option<Atom>| slot.as_ref().map(|a| lib.rewrite_once(a, active_rulesets, registry, deadline));
    crate::algprop::AlgPropFields {
        associative: rw(&props.associative),
        commutative: rw(&props.commutative),
        idempotent: rw(&props.idempotent),
        absorber: rw(&props.absorber),
        identity: rw(&props.identity),
    }
}

/// A flat associative application `op(a, b, c, …)` may hold a rewritable
/// subterm across a contiguous run of its arguments that no single-rule
/// match against the whole sequence would find, since a rule's pattern
/// arity rarely equals the subject's. Tries every contiguous window
/// (smallest first) as its own `op(window…)` application; the first one
/// any rule accepts is spliced back in, shrinking the sequence by one
/// rewrite step. Left for the next `do_rewrite` iteration to notice
/// further reductions rather than looping here.
fn splice_associative_window(
    lib: &RuleLibrary,
    op: &Atom,
    elems: &[Atom],
    props: &crate::algprop::AlgPropFields,
    active_rulesets: u64,
    registry: &dyn GuardRegistry,
    deadline: &Deadline,
) -> Option<Atom> {
    let n = elems.len();
    for len in 2..=n {
        for start in 0..=(n - len) {
            let window_seq = crate::atom::mk_atom_seq(elems[start..start + len].to_vec(), props.clone()).ok()?;
            let window = crate::atom::mk_op_apply_raw(op.clone(), window_seq);
            if let Some(result) = lib.rewrite_top(&window, active_rulesets, registry, deadline) {
                let mut new_elems = elems[..start].to_vec();
                new_elems.push(result);
                new_elems.extend_from_slice(&elems[start + len..]);
                let seq = crate::atom::mk_atom_seq(new_elems, props.clone()).ok()?;
                return Some(crate::atom::mk_op_apply_raw(op.clone(), seq));
            }
        }
    }
    None
}

#[cfg(test)]
mod rule_tests {
    use super::*;
    use crate::algprop::AlgPropFields;
    use crate::atom::{mk_atom_seq, mk_bool, mk_int, mk_op_apply_raw, mk_string, mk_var};
    use crate::guard::NoGuards;

    fn double_rule() -> (RuleLibrary, Atom) {
        let mut lib = RuleLibrary::new(true);
        let op_ref = crate::atom::mk_operator_ref("double");
        let x = mk_var("x", None, Vec::new(), false);
        let pattern = mk_op_apply_raw(op_ref.clone(), mk_atom_seq(vec![x.clone()], Default::default()).unwrap());
        let rewrite = mk_op_apply_raw(crate::atom::mk_operator_ref("plus"), mk_atom_seq(vec![x.clone(), x], Default::default()).unwrap());
        lib.add_rule(pattern, rewrite, Vec::new(), 0, false).unwrap();
        (lib, op_ref)
    }

    #[test]
    fn rewrite_top_applies_a_matching_rule() {
        let (lib, op_ref) = double_rule();
        let call = mk_op_apply_raw(op_ref, mk_atom_seq(vec![mk_int(3)], Default::default()).unwrap());
        let result = lib.rewrite_top(&call, 0, &NoGuards, &Deadline::unbounded()).unwrap();
        let (op, args) = result.as_op_apply().unwrap();
        assert_eq!(op.as_operator_ref().unwrap().as_str(), "plus");
        let (elems, _) = args.as_atom_seq().unwrap();
        assert_eq!(elems, &[mk_int(3), mk_int(3)]);
    }

    #[test]
    fn identity_rule_is_rejected() {
        let mut lib = RuleLibrary::new(true);
        let x = mk_var("x", None, Vec::new(), false);
        assert!(lib.add_rule(x.clone(), x, Vec::new(), 0, false).is_err());
    }

    #[test]
    fn bindable_pattern_is_rejected() {
        let mut lib = RuleLibrary::new(true);
        let x = mk_var("x", None, Vec::new(), false);
        assert!(lib.add_rule(x, mk_int(0), Vec::new(), 0, false).is_err());
    }

    #[test]
    fn literal_pattern_is_rejected_unless_enabled() {
        let mut lib = RuleLibrary::new(false);
        assert!(lib.add_rule(mk_int(1), mk_int(2), Vec::new(), 0, false).is_err());
        let mut lib2 = RuleLibrary::new(true);
        assert!(lib2.add_rule(mk_int(1), mk_int(2), Vec::new(), 0, false).is_ok());
    }

    #[test]
    fn do_rewrite_reaches_a_fixpoint() {
        let (lib, op_ref) = double_rule();
        let call = mk_op_apply_raw(op_ref, mk_atom_seq(vec![mk_int(1)], Default::default()).unwrap());
        let mut deadline = Deadline::unbounded();
        let result = lib.do_rewrite(&call, 0, &NoGuards, &mut deadline);
        // `double(1)` rewrites to `plus(1,1)`, for which no rule exists,
        // so the fixpoint is the one-step rewrite.
        assert_eq!(result.as_op_apply().unwrap().0.as_operator_ref().unwrap().as_str(), "plus");
    }

    #[test]
    fn associative_splice_finds_a_rewritable_window_inside_a_flat_sequence() {
        let mut lib = RuleLibrary::new(true);
        let concat_ref = crate::atom::mk_operator_ref("concat");
        let inv_ref = crate::atom::mk_operator_ref("inv");
        let assoc = AlgPropFields { associative: Some(mk_bool(true)), ..AlgPropFields::none() };
        let x = mk_var("x", None, Vec::new(), false);
        let inv_of_x = mk_op_apply_raw(inv_ref.clone(), mk_atom_seq(vec![x.clone()], Default::default()).unwrap());
        let pattern = mk_op_apply_raw(concat_ref.clone(), mk_atom_seq(vec![x, inv_of_x], assoc.clone()).unwrap());
        lib.add_rule(pattern, mk_string(""), Vec::new(), 0, false).unwrap();

        let b = mk_string("b");
        let inv_b = mk_op_apply_raw(inv_ref, mk_atom_seq(vec![b.clone()], Default::default()).unwrap());
        let subject = mk_op_apply_raw(concat_ref, mk_atom_seq(vec![mk_string("a"), b, inv_b], assoc).unwrap());

        // no rule matches the flat 3-argument subject directly (`concat($x,
        // inv($x))` can't bind `$x` to two different things at once); the
        // `b, inv(b)` window in the middle is what actually reduces.
        let result = lib.rewrite_once(&subject, 0, &NoGuards, &Deadline::unbounded());
        let (op, args) = result.as_op_apply().unwrap();
        assert_eq!(op.as_operator_ref().unwrap().as_str(), "concat");
        let (elems, _) = args.as_atom_seq().unwrap();
        assert_eq!(elems, &[mk_string("a"), mk_string("")]);
    }
}
