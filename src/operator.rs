//! Operator application pipeline: flatten nested associative applications,
//! eliminate identity arguments, short-circuit on an absorber, canonicalize
//! commutative argument order, check arity, collapse a lone associative
//! argument, match case-operator patterns, and finally either call a
//! native handler or build a plain `OpApply`. Split into two halves (match
//! the declared parameters, then build/substitute the result) so each
//! concern stays independently testable.

use std::sync::Arc;

use crate::algprop::AlgPropFields;
use crate::atom::{mk_atom_seq, mk_bool, mk_op_apply_raw, mk_op_apply_with_bindings, mk_var, Atom, OperatorData, OperatorKind};
use crate::bindings::Bindings;
use crate::comparator::BasicAtomComparator;
use crate::errors::{ElisionErr, ElisionResult};
use crate::guard::GuardRegistry;
use crate::matcher::try_match;
use crate::seq_match;
use crate::timeout::Deadline;

pub type NativeHandler = dyn Fn(&Atom, &[Atom], &Bindings) -> ElisionResult<Atom> + Send + Sync;

/// Applies `op_ref` (an `OperatorRef` atom) to `args`, given the declared
/// `OperatorData` it refers to and, if the operator has one, its native
/// handler.
pub fn apply(
    op_ref: &Atom,
    op: &OperatorData,
    args: Vec<Atom>,
    native: Option<&Arc<NativeHandler>>,
    registry: &dyn GuardRegistry,
    deadline: &Deadline,
) -> ElisionResult<Atom> {
    let props = op.params.as_atom_seq().map(|(_, p)| p.clone()).unwrap_or_default();

    // step 1: a non-term (meta-carrying) argument can't soundly drive the
    // pipeline below; build the bare application and stop.
    if !op_ref.is_term() || args.iter().any(|a| !a.is_term()) {
        let seq = mk_atom_seq(args, props)?;
        return Ok(mk_op_apply_raw(op_ref.clone(), seq));
    }

    // step 2: flatten nested applications of the same associative operator.
    let mut flat = Vec::with_capacity(args.len());
    for a in args {
        if props.is_associative() {
            if let Some((nested_op, nested_args)) = a.as_op_apply() {
                if nested_op == op_ref {
                    if let Some((elems, _)) = nested_args.as_atom_seq() {
                        flat.extend(elems.iter().cloned());
                        continue;
                    }
                }
            }
        }
        flat.push(a);
    }

    // step 3: identity elimination.
    if let Some(identity) = props.get_identity() {
        if flat.len() > 1 {
            flat.retain(|a| a != identity);
            if flat.is_empty() {
                flat.push(identity.clone());
            }
        }
    }

    // step 4: absorber short-circuit.
    if let Some(absorber) = props.get_absorber() {
        if flat.iter().any(|a| a == absorber) {
            return Ok(absorber.clone());
        }
    }

    // step 5: commutative canonical ordering.
    if props.is_commutative() {
        BasicAtomComparator::sort(&mut flat);
    }

    let declared_params: Vec<Atom> = op.params.as_atom_seq().map(|(p, _)| p.to_vec()).unwrap_or_default();

    // step 6: arity check against declared parameters, unless the operator
    // is associative (variable arity). An associative operator applied to
    // no surviving arguments yields its identity if it has one, else falls
    // through to a bare empty application below.
    if !props.is_associative() {
        if flat.len() != declared_params.len() {
            return Err(ElisionErr::ArgumentListException {
                index: flat.len().min(declared_params.len()),
                reason: format!("expected {} argument(s), got {}", declared_params.len(), flat.len()),
                loc: None,
            });
        }
    } else if flat.is_empty() {
        if let Some(identity) = props.get_identity() {
            return Ok(identity.clone());
        }
    }

    // step 7: a lone surviving argument of an associative operator collapses
    // to that argument only when the operator has a declared identity (so
    // `plus(x)` folding to `x` is sound, mirroring `plus(x, 0) => x`) and the
    // argument's type agrees with the parameters' common type.
    if props.is_associative() && flat.len() == 1 && props.get_identity().is_some() {
        let common_ty = common_parameter_type(&declared_params);
        let lone = &flat[0];
        let type_ok = match &common_ty {
            None => true,
            Some(ty) => ty.is_any_root() || ty == &lone.get_type(),
        };
        if type_ok {
            return Ok(flat.into_iter().next().unwrap());
        }
    }

    // step 8: for an associative operator, the declared parameter list
    // doesn't have one slot per argument (arity is variable), so synthesize
    // fresh parameters matching the arguments 1:1 before matching.
    let match_params: Vec<Atom> = if props.is_associative() {
        synthesize_params(flat.len(), common_parameter_type(&declared_params))
    } else {
        declared_params
    };

    // step 9: match the (declared or synthesized) parameters against the
    // arguments through the same sequence matcher patterns use, so arity and
    // guard checking apply uniformly whether or not the operator is
    // associative.
    let param_bindings = match_parameters(&match_params, &flat, registry, deadline)?;

    let seq = mk_atom_seq(flat, props.clone())?;

    // step 9b: case operators try each pattern in order.
    if op.kind == OperatorKind::Case {
        if let Some(cases) = &op.cases {
            if let Some((case_elems, _)) = cases.as_atom_seq() {
                for case in case_elems {
                    if let Some((pattern, result)) = case.as_map_pair() {
                        if let Some(binding) = try_match(pattern, &seq, &Bindings::empty(), registry, deadline).first() {
                            return Ok(substitute_bindings(result, &binding));
                        }
                    }
                }
            }
        }
    }

    // step 10: native handler dispatch, given the real parameter bindings.
    if op.has_native {
        if let Some(handler) = native {
            if let Some((elems, _)) = seq.as_atom_seq() {
                return handler(op_ref, elems, &param_bindings);
            }
        }
    }

    // step 11: fall back to a plain application, caching the parameter
    // bindings on the result so a later rewrite can reuse them instead of
    // re-matching.
    Ok(mk_op_apply_with_bindings(op_ref.clone(), seq, param_bindings))
}

/// The single type every declared parameter agrees on, if any. Used to type
/// the fresh parameters synthesized for an associative operator's variable
/// arity, since there's no one-to-one correspondence between declared
/// parameters and arguments to read a per-position type from.
fn common_parameter_type(params: &[Atom]) -> Option<Atom> {
    let mut types = params.iter().map(|p| p.variable_guard().cloned());
    let first = types.next()??;
    if types.all(|t| t.as_ref() == Some(&first)) {
        Some(first)
    } else {
        None
    }
}

fn synthesize_params(count: usize, common_type: Option<Atom>) -> Vec<Atom> {
    (0..count).map(|i| mk_var(format!("$assoc_arg{i}"), common_type.clone(), Vec::new(), false)).collect()
}

/// Matches declared (or synthesized) parameters against arguments
/// positionally, honoring each parameter's guard, via the same sequence
/// matcher used for rewrite-rule patterns. On failure, re-checks pairwise to
/// report the first offending position.
fn match_parameters(params: &[Atom], args: &[Atom], registry: &dyn GuardRegistry, deadline: &Deadline) -> ElisionResult<Bindings> {
    let outcome = seq_match::match_sequences(params, &AlgPropFields::none(), args, &AlgPropFields::none(), &Bindings::empty(), registry, deadline, None);
    if let Some(bindings) = outcome.first() {
        return Ok(bindings);
    }
    if params.len() != args.len() {
        return Err(ElisionErr::ArgumentListException {
            index: args.len().min(params.len()),
            reason: format!("expected {} argument(s), got {}", params.len(), args.len()),
            loc: None,
        });
    }
    for (i, (param, arg)) in params.iter().zip(args.iter()).enumerate() {
        if try_match(param, arg, &Bindings::empty(), registry, deadline).is_fail() {
            return Err(ElisionErr::ArgumentListException {
                index: i,
                reason: "argument did not satisfy the declared parameter's guard".into(),
                loc: None,
            });
        }
    }
    Err(ElisionErr::ArgumentListException {
        index: 0,
        reason: "arguments did not match the declared parameters".into(),
        loc: None,
    })
}

pub(crate) fn substitute_bindings(template: &Atom, bindings: &Bindings) -> Atom {
    if template.is_bindable_variable() {
        if let Some(name) = template.variable_name() {
            if let Some(value) = bindings.get(name) {
                return value.clone();
            }
        }
        return template.clone();
    }
    if let Some((op, args)) = template.as_op_apply() {
        return mk_op_apply_raw(op.clone(), substitute_bindings(args, bindings));
    }
    if let Some((left, right)) = template.as_simple_apply() {
        return crate::atom::mk_simple_apply(substitute_bindings(left, bindings), substitute_bindings(right, bindings));
    }
    if let Some((elems, props)) = template.as_atom_seq() {
        let substituted: Vec<Atom> = elems.iter().map(|e| substitute_bindings(e, bindings)).collect();
        return mk_atom_seq(substituted, props.clone()).unwrap_or_else(|_| template.clone());
    }
    template.clone()
}

pub fn mk_symbolic_operator(name: impl Into<crate::symbol::Symbol>, params: Atom, result_type: Atom, has_native: bool) -> Atom {
    crate::atom::mk_operator_atom(OperatorData {
        kind: OperatorKind::Symbolic,
        name: name.into(),
        params,
        result_type,
        even_meta: false,
        has_native,
        cases: None,
    })
}

#[cfg(test)]
mod operator_tests {
    use super::*;
    use crate::algprop::AlgPropFields;
    use crate::atom::{mk_int, mk_var};
    use crate::guard::NoGuards;

    fn plus_op() -> (Atom, OperatorData) {
        let params_props = AlgPropFields {
            associative: Some(mk_bool(true)),
            commutative: Some(mk_bool(true)),
            identity: Some(mk_int(0)),
            ..AlgPropFields::none()
        };
        let params = mk_atom_seq(vec![mk_var("x", None, Vec::new(), false), mk_var("y", None, Vec::new(), false)], params_props).unwrap();
        let op_ref = crate::atom::mk_operator_ref("plus");
        let data = OperatorData {
            kind: OperatorKind::Symbolic,
            name: "plus".into(),
            params,
            result_type: crate::roots::integer(),
            even_meta: false,
            has_native: false,
            cases: None,
        };
        (op_ref, data)
    }

    #[test]
    fn identity_arguments_are_eliminated() {
        let (op_ref, data) = plus_op();
        let result = apply(&op_ref, &data, vec![mk_int(0), mk_int(5)], None, &NoGuards, &Deadline::unbounded()).unwrap();
        assert_eq!(result, mk_int(5));
    }

    #[test]
    fn nested_associative_applications_flatten() {
        let (op_ref, data) = plus_op();
        let inner = apply(&op_ref, &data, vec![mk_int(1), mk_int(2)], None, &NoGuards, &Deadline::unbounded()).unwrap();
        let outer = apply(&op_ref, &data, vec![inner, mk_int(3)], None, &NoGuards, &Deadline::unbounded()).unwrap();
        let (_, args) = outer.as_op_apply().expect("flattened into a single OpApply");
        let (elems, _) = args.as_atom_seq().unwrap();
        assert_eq!(elems.len(), 3);
    }

    #[test]
    fn wrong_arity_is_rejected_for_non_associative_operator() {
        let params = mk_atom_seq(vec![mk_var("x", None, Vec::new(), false)], AlgPropFields::none()).unwrap();
        let op_ref = crate::atom::mk_operator_ref("neg");
        let data = OperatorData {
            kind: OperatorKind::Symbolic,
            name: "neg".into(),
            params,
            result_type: crate::roots::integer(),
            even_meta: false,
            has_native: false,
            cases: None,
        };
        let err = apply(&op_ref, &data, vec![mk_int(1), mk_int(2)], None, &NoGuards, &Deadline::unbounded()).unwrap_err();
        assert!(matches!(err, ElisionErr::ArgumentListException { .. }));
    }

    #[test]
    fn associative_operator_checks_parameter_guards_on_each_argument() {
        let params_props = AlgPropFields {
            associative: Some(mk_bool(true)),
            identity: Some(mk_int(0)),
            ..AlgPropFields::none()
        };
        let params = mk_atom_seq(
            vec![mk_var("x", Some(crate::roots::integer()), Vec::new(), false), mk_var("y", Some(crate::roots::integer()), Vec::new(), false)],
            params_props,
        )
        .unwrap();
        let op_ref = crate::atom::mk_operator_ref("plus_typed");
        let data = OperatorData {
            kind: OperatorKind::Symbolic,
            name: "plus_typed".into(),
            params,
            result_type: crate::roots::integer(),
            even_meta: false,
            has_native: false,
            cases: None,
        };
        let err = apply(&op_ref, &data, vec![mk_int(1), crate::atom::mk_string("nope")], None, &NoGuards, &Deadline::unbounded()).unwrap_err();
        assert!(matches!(err, ElisionErr::ArgumentListException { .. }));
    }

    #[test]
    fn lone_associative_argument_does_not_collapse_without_a_declared_identity() {
        let params = mk_atom_seq(vec![mk_var("x", None, Vec::new(), false), mk_var("y", None, Vec::new(), false)], AlgPropFields {
            associative: Some(mk_bool(true)),
            ..AlgPropFields::none()
        })
        .unwrap();
        let op_ref = crate::atom::mk_operator_ref("concat_no_identity");
        let data = OperatorData {
            kind: OperatorKind::Symbolic,
            name: "concat_no_identity".into(),
            params,
            result_type: crate::roots::integer(),
            even_meta: false,
            has_native: false,
            cases: None,
        };
        let result = apply(&op_ref, &data, vec![mk_int(5)], None, &NoGuards, &Deadline::unbounded()).unwrap();
        assert!(result.as_op_apply().is_some(), "a lone argument with no declared identity should stay wrapped, not collapse");
    }
}
