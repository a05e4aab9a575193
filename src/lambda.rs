//! Lambda construction and application. A `Lambda` atom's bound variable is
//! immediately rewritten into a De Bruijn placeholder at construction time
//! (`mk_lambda`), and substituted back to a concrete argument at
//! application time (`apply`) by walking the body once and replacing every
//! occurrence of that placeholder. This mirrors `Expr::abstract_` /
//! `Expr::instantiate_core`'s single-pass substitution walk, generalized
//! from Lean's fixed `(name, ty)` binder to a binder that also carries an
//! optional guard and a label set.

use crate::atom::{self, mk_dbj_var, mk_lambda_raw, Atom};
use crate::errors::{ElisionErr, ElisionResult};
use crate::guard::{self, GuardRegistry};
use crate::symbol::Symbol;

const STACK_RED_ZONE: usize = 256 * 1024;
const STACK_GROWTH: usize = 4 * 1024 * 1024;

/// Builds `\name.body`, replacing every free occurrence of `name` in `body`
/// with a fresh De Bruijn variable. `guard`/`labels`/`meta` describe the
/// bound parameter and are carried on the placeholder so a later match
/// against the lambda's parameter can still see them.
pub fn mk_lambda(name: impl Into<Symbol>, guard: Option<Atom>, labels: Vec<Symbol>, meta: bool, body: Atom) -> Atom {
    let name = name.into();
    let level = body.de_bruijn_index();
    let replaced = replace_free(&body, &name, level);
    let param = mk_dbj_var(level, name, guard, labels, meta);
    mk_lambda_raw(param, replaced)
}

fn replace_free(atom: &Atom, name: &Symbol, level: u16) -> Atom {
    if let Some(n) = atom.variable_name() {
        if n == name && atom.de_bruijn_level().is_none() {
            return mk_dbj_var(level, name.clone(), atom.variable_guard().cloned(), atom.variable_labels().to_vec(), atom.variable_is_meta());
        }
        return atom.clone();
    }
    if let Some((op, args)) = atom.as_op_apply() {
        return atom::mk_op_apply_raw(op.clone(), replace_free(args, name, level));
    }
    if let Some((left, right)) = atom.as_simple_apply() {
        return atom::mk_simple_apply(replace_free(left, name, level), replace_free(right, name, level));
    }
    if let Some((param, body)) = atom.as_lambda() {
        return mk_lambda_raw(param.clone(), replace_free(body, name, level));
    }
    if let Some((elems, props)) = atom.as_atom_seq() {
        let replaced: Vec<Atom> = elems.iter().map(|e| replace_free(e, name, level)).collect();
        return atom::mk_atom_seq(replaced, props.clone()).unwrap_or_else(|_| atom.clone());
    }
    atom.clone()
}

fn substitute(atom: &Atom, level: u16, replacement: &Atom) -> Atom {
    if atom.de_bruijn_level() == Some(level) {
        return replacement.clone();
    }
    if let Some((op, args)) = atom.as_op_apply() {
        return atom::mk_op_apply_raw(op.clone(), substitute(args, level, replacement));
    }
    if let Some((left, right)) = atom.as_simple_apply() {
        return atom::mk_simple_apply(substitute(left, level, replacement), substitute(right, level, replacement));
    }
    if let Some((param, body)) = atom.as_lambda() {
        return mk_lambda_raw(param.clone(), substitute(body, level, replacement));
    }
    if let Some((elems, props)) = atom.as_atom_seq() {
        let replaced: Vec<Atom> = elems.iter().map(|e| substitute(e, level, replacement)).collect();
        return atom::mk_atom_seq(replaced, props.clone()).unwrap_or_else(|_| atom.clone());
    }
    atom.clone()
}

/// Applies `lambda` to `arg`. Fails with `LambdaVariableMismatchException`
/// if `arg` doesn't satisfy the bound parameter's guard, and with
/// `LambdaUnboundedRecursionException` if the call stack is close to
/// exhausted, rather than risk aborting the process on a runaway
/// self-referential rewrite.
pub fn apply(lambda: &Atom, arg: &Atom, registry: &dyn GuardRegistry) -> ElisionResult<Atom> {
    let remaining = stacker::remaining_stack().unwrap_or(0);
    if remaining < STACK_RED_ZONE {
        return Err(ElisionErr::LambdaUnboundedRecursionException { depth: 0, loc: None });
    }
    let (param, body) = lambda.as_lambda().ok_or_else(|| ElisionErr::SpecialFormException {
        tag: "apply".into(),
        reason: "left-hand side of an application was not a lambda".into(),
        loc: None,
    })?;
    if let Some(g) = param.variable_guard() {
        let name = param.variable_name().cloned().unwrap_or_else(|| Symbol::from("_"));
        if !guard::guard_holds(g, &name, arg, registry) {
            return Err(ElisionErr::LambdaVariableMismatchException { expected: param.clone(), got: arg.clone(), loc: None });
        }
    }
    let level = param.de_bruijn_level().unwrap_or(0);
    Ok(stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || substitute(body, level, arg)))
}

#[cfg(test)]
mod lambda_tests {
    use super::*;
    use crate::atom::{mk_int, mk_simple_apply, mk_var};
    use crate::guard::NoGuards;

    #[test]
    fn lambda_binds_free_occurrences() {
        let body = mk_var("x", None, Vec::new(), false);
        let lam = mk_lambda("x", None, Vec::new(), false, body);
        let (_, inner_body) = lam.as_lambda().unwrap();
        assert_eq!(inner_body.de_bruijn_level(), Some(0));
    }

    #[test]
    fn apply_substitutes_argument() {
        let body = mk_var("x", None, Vec::new(), false);
        let lam = mk_lambda("x", None, Vec::new(), false, body);
        let result = apply(&lam, &mk_int(42), &NoGuards).unwrap();
        assert_eq!(result, mk_int(42));
    }

    #[test]
    fn apply_leaves_unrelated_subterms_untouched() {
        let body = mk_simple_apply(mk_var("x", None, Vec::new(), false), mk_int(7));
        let lam = mk_lambda("x", None, Vec::new(), false, body);
        let result = apply(&lam, &mk_int(1), &NoGuards).unwrap();
        let (left, right) = result.as_simple_apply().unwrap();
        assert_eq!(*left, mk_int(1));
        assert_eq!(*right, mk_int(7));
    }

    #[test]
    fn apply_accepts_guard_matching_argument_type() {
        let body = mk_var("x", None, Vec::new(), false);
        let lam = mk_lambda("x", Some(crate::roots::integer()), Vec::new(), false, body);
        assert!(apply(&lam, &mk_int(1), &NoGuards).is_ok());
    }

    #[test]
    fn apply_rejects_mismatched_guard() {
        let body = mk_var("x", None, Vec::new(), false);
        let lam = mk_lambda("x", Some(crate::roots::string_ty()), Vec::new(), false, body);
        let err = apply(&lam, &mk_int(1), &NoGuards).unwrap_err();
        assert!(matches!(err, ElisionErr::LambdaVariableMismatchException { .. }));
    }
}
