//! Extension point for guard evaluation. A `Variable`'s `guard` atom is one
//! of three things: a root type (checked structurally against the
//! candidate's type, the common case and cheap enough to skip rewriting
//! entirely), a `SpecialForm{tag: "named-guard", content: <symbol>}` that
//! defers to a host-registered predicate, or an arbitrary expression
//! referencing the variable's own name, which is bound to the candidate and
//! rewritten to a fixpoint, holding only if the result is the literal
//! `true`. `Context` is the only implementor carrying a real rule engine in
//! this crate; the matcher itself never knows about rulesets, operators, or
//! anything else `Context` owns.

use crate::atom::Atom;
use crate::bindings::Bindings;
use crate::symbol::Symbol;

pub trait GuardRegistry {
    fn check_named_guard(&self, name: &Symbol, candidate: &Atom) -> bool;

    /// Rewrites `atom` to a fixpoint against this registry's full rule set.
    /// Used to evaluate a general guard expression once the candidate
    /// binding has been substituted in. The default does nothing, so a
    /// registry with no rule engine behind it (tests, `NoGuards`) simply
    /// never satisfies a non-type, non-named guard rather than panicking.
    fn rewrite_for_guard(&self, atom: &Atom) -> Atom {
        atom.clone()
    }
}

/// Registry with no named guards registered and no rewrite engine behind
/// it; every named or expression guard fails, root-type guards still work.
/// Used by tests and by callers that only ever use structural guards.
pub struct NoGuards;

impl GuardRegistry for NoGuards {
    fn check_named_guard(&self, _name: &Symbol, _candidate: &Atom) -> bool {
        false
    }
}

/// `name` is the guarded variable's own name, bound to `candidate` before
/// the guard is rewritten, so a guard expression written in terms of the
/// variable it guards (e.g. `gt($x, 0)` guarding `$x`) sees its own
/// tentative value.
pub fn guard_holds(guard: &Atom, name: &Symbol, candidate: &Atom, registry: &dyn GuardRegistry) -> bool {
    if guard.is_any_root() {
        return true;
    }
    if let Some((tag, content)) = guard.as_special_form() {
        if tag.as_str() == "named-guard" {
            if let Some(crate::atom::Literal::Sym(guard_name)) = content.as_literal() {
                return registry.check_named_guard(guard_name, candidate);
            }
            return false;
        }
    }
    if guard == &candidate.get_type() {
        return true;
    }
    let bindings = match Bindings::empty().bind(name.clone(), candidate.clone()) {
        Some(b) => b,
        None => return false,
    };
    let substituted = crate::operator::substitute_bindings(guard, &bindings);
    let rewritten = registry.rewrite_for_guard(&substituted);
    matches!(rewritten.as_literal(), Some(crate::atom::Literal::Bool(true)))
}

#[cfg(test)]
mod guard_tests {
    use super::*;
    use crate::atom::mk_int;
    use crate::symbol::Symbol;

    #[test]
    fn any_guard_always_holds() {
        assert!(guard_holds(&crate::roots::any_ty(), &Symbol::from("x"), &mk_int(1), &NoGuards));
    }

    #[test]
    fn type_guard_checks_structural_type() {
        assert!(guard_holds(&crate::roots::integer(), &Symbol::from("x"), &mk_int(1), &NoGuards));
        assert!(!guard_holds(&crate::roots::string_ty(), &Symbol::from("x"), &mk_int(1), &NoGuards));
    }

    #[test]
    fn expression_guard_without_a_rewrite_engine_never_holds() {
        let guard = crate::atom::mk_simple_apply(crate::atom::mk_var("is_positive", None, Vec::new(), false), crate::atom::mk_var("x", None, Vec::new(), false));
        assert!(!guard_holds(&guard, &Symbol::from("x"), &mk_int(1), &NoGuards));
    }
}
