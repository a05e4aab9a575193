//! `Context`: the single entry point an embedder talks to. Owns the
//! operator library, rule library, ruleset registry, and guard registry
//! behind a `parking_lot::RwLock`, mutated only through narrow methods
//! that never hand out the lock guard itself, so no caller can hold a
//! write lock open across a recursive call back into the same `Context`.

use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::atom::{Atom, OperatorData};
use crate::errors::{ElisionErr, ElisionResult};
use crate::guard::GuardRegistry;
use crate::memo::MemoCache;
use crate::operator::{self, NativeHandler};
use crate::rule::RuleLibrary;
use crate::ruleset::RulesetRegistry;
use crate::symbol::Symbol;
use crate::timeout::Deadline;

/// Tunables left implementation-defined by the matching/rewriting
/// semantics: how long a single `do_rewrite` call may run, how many
/// rewrite steps it may take, whether literal patterns are legal rule
/// heads, and whether referencing an undeclared ruleset by name is an
/// error or a silent no-op. A small fixed set of named construction-time
/// toggles rather than a config file, since every embedder can reasonably
/// be expected to set all of these up front.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub timeout: Option<Duration>,
    pub rewrite_limit: Option<u64>,
    pub allow_literal_rules: bool,
    pub strict_rulesets: bool,
    pub memo_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            timeout: Some(Duration::from_secs(10)),
            rewrite_limit: Some(10_000_000),
            allow_literal_rules: false,
            strict_rulesets: true,
            memo_capacity: 4096,
        }
    }
}

struct Declared {
    operators: HashMap<Symbol, OperatorData>,
    natives: HashMap<Symbol, Arc<NativeHandler>>,
    guards: HashMap<Symbol, Arc<dyn Fn(&Atom) -> bool + Send + Sync>>,
    rules: RuleLibrary,
    rulesets: RulesetRegistry,
}

pub struct Context {
    config: EngineConfig,
    state: RwLock<Declared>,
    memo: RwLock<MemoCache>,
}

impl GuardRegistry for Context {
    fn check_named_guard(&self, name: &Symbol, candidate: &Atom) -> bool {
        let state = self.state.read();
        match state.guards.get(name) {
            Some(f) => f(candidate),
            None => false,
        }
    }

    fn rewrite_for_guard(&self, atom: &Atom) -> Atom {
        self.rewrite(atom)
    }
}

impl Context {
    pub fn new(config: EngineConfig) -> Context {
        let rules = RuleLibrary::new(config.allow_literal_rules);
        let memo_capacity = config.memo_capacity;
        Context {
            config,
            state: RwLock::new(Declared {
                operators: HashMap::new(),
                natives: HashMap::new(),
                guards: HashMap::new(),
                rules,
                rulesets: RulesetRegistry::new(),
            }),
            memo: RwLock::new(MemoCache::with_capacity(memo_capacity)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn declare_operator(&self, op: OperatorData, native: Option<Arc<NativeHandler>>) -> Atom {
        let mut state = self.state.write();
        let op_ref = crate::atom::mk_operator_ref(op.name.clone());
        if let Some(handler) = native {
            state.natives.insert(op.name.clone(), handler);
        }
        state.operators.insert(op.name.clone(), op);
        op_ref
    }

    pub fn declare_guard(&self, name: impl Into<Symbol>, predicate: Arc<dyn Fn(&Atom) -> bool + Send + Sync>) {
        self.state.write().guards.insert(name.into(), predicate);
    }

    pub fn declare_ruleset(&self, name: impl Into<Symbol>) -> ElisionResult<Atom> {
        self.state.write().rulesets.declare(name.into())
    }

    pub fn set_ruleset_active(&self, name: &Symbol, on: bool) -> ElisionResult<()> {
        self.state.write().rulesets.set_active(name, on)
    }

    pub fn add_rule(&self, pattern: Atom, rewrite: Atom, guards: Vec<Atom>, ruleset_names: &[Symbol]) -> ElisionResult<Atom> {
        let mut state = self.state.write();
        let mut rulesets = 0u64;
        for name in ruleset_names {
            match state.rulesets.bit_of(name) {
                Some(bit) => rulesets |= bit,
                None if self.config.strict_rulesets => {
                    return Err(ElisionErr::NoSuchRulesetException { name: name.as_str().to_string(), loc: None })
                }
                None => {}
            }
        }
        let result = state.rules.add_rule(pattern, rewrite, guards, rulesets, false);
        if result.is_ok() {
            self.memo.write().clear();
        }
        result
    }

    /// Applies a declared operator by name to `args`, routing through the
    /// full application pipeline in `operator::apply`.
    pub fn apply_operator(&self, name: &Symbol, args: Vec<Atom>, deadline: &Deadline) -> ElisionResult<Atom> {
        let state = self.state.read();
        let op = state
            .operators
            .get(name)
            .ok_or_else(|| ElisionErr::ArgumentListException { index: 0, reason: format!("no operator named `{}` is declared", name), loc: None })?
            .clone();
        let native = state.natives.get(name).cloned();
        let op_ref = crate::atom::mk_operator_ref(name.clone());
        drop(state);
        operator::apply(&op_ref, &op, args, native.as_ref(), self, deadline)
    }

    /// Rewrites `atom` to a fixpoint against every rule whose ruleset bits
    /// intersect the currently-active set, consulting and then populating
    /// the memoization cache.
    pub fn rewrite(&self, atom: &Atom) -> Atom {
        let mut deadline = self.config.timeout.map(|t| Deadline::new(Some(t), self.config.rewrite_limit)).unwrap_or_else(|| Deadline::new(None, self.config.rewrite_limit));
        let state = self.state.read();
        let active = state.rulesets.active_bits();
        let generation = state.rules.generation();
        drop(state);

        if let Some(cached) = self.memo.write().get(atom, active, generation) {
            return cached;
        }

        let state = self.state.read();
        let result = state.rules.do_rewrite(atom, active, self, &mut deadline);
        drop(state);

        // cache under both the input and the result, so looking the result
        // back up finds it already at its fixpoint.
        let mut memo = self.memo.write();
        memo.insert(atom, active, generation, result.clone());
        if &result != atom {
            memo.insert(&result, active, generation, result.clone());
        }
        result
    }
}

#[cfg(test)]
mod context_tests {
    use super::*;
    use crate::algprop::AlgPropFields;
    use crate::atom::{mk_atom_seq, mk_bool, mk_int, mk_op_apply_raw, mk_var, OperatorKind};

    #[test]
    fn declared_operator_is_applied_through_the_pipeline() {
        let ctx = Context::new(EngineConfig::default());
        let props = AlgPropFields { associative: Some(mk_bool(true)), identity: Some(mk_int(0)), ..AlgPropFields::none() };
        let params = mk_atom_seq(vec![mk_var("x", None, Vec::new(), false), mk_var("y", None, Vec::new(), false)], props).unwrap();
        let op = OperatorData { kind: OperatorKind::Symbolic, name: "plus".into(), params, result_type: crate::roots::integer(), even_meta: false, has_native: false, cases: None };
        ctx.declare_operator(op, None);
        let deadline = Deadline::unbounded();
        let result = ctx.apply_operator(&Symbol::from("plus"), vec![mk_int(0), mk_int(5)], &deadline).unwrap();
        assert_eq!(result, mk_int(5));
    }

    #[test]
    fn rewrite_uses_declared_rules() {
        let ctx = Context::new(EngineConfig::default());
        let op_ref = crate::atom::mk_operator_ref("succ_of_zero");
        let pattern = mk_op_apply_raw(op_ref.clone(), mk_atom_seq(vec![], Default::default()).unwrap());
        ctx.add_rule(pattern.clone(), mk_int(1), Vec::new(), &[]).unwrap();
        let result = ctx.rewrite(&pattern);
        assert_eq!(result, mk_int(1));
    }

    #[test]
    fn rewrite_memoizes_under_both_the_input_and_the_result() {
        let ctx = Context::new(EngineConfig::default());
        let op_ref = crate::atom::mk_operator_ref("succ_of_zero");
        let pattern = mk_op_apply_raw(op_ref, mk_atom_seq(vec![], Default::default()).unwrap());
        ctx.add_rule(pattern.clone(), mk_int(1), Vec::new(), &[]).unwrap();
        ctx.rewrite(&pattern);
        // looking the already-computed result up directly should find it at
        // its own fixpoint, without re-running `do_rewrite`.
        assert_eq!(ctx.rewrite(&mk_int(1)), mk_int(1));
    }

    #[test]
    fn undeclared_ruleset_is_rejected_in_strict_mode() {
        let ctx = Context::new(EngineConfig::default());
        let err = ctx.add_rule(mk_int(1), mk_int(2), Vec::new(), &[Symbol::from("nope")]);
        assert!(matches!(err, Err(ElisionErr::NoSuchRulesetException { .. })));
    }
}
