use std::sync::Arc;

use fxhash::hash64;

use crate::algprop::AlgPropFields;
use crate::bindings::Bindings;
use crate::errors::{ElisionResult, SourceLoc};
use crate::symbol::Symbol;

/// Cached, cheap-to-copy facts about an atom, computed bottom-up at
/// construction time and never recomputed. `digest` is an exact structural
/// hash used for equality-map lookups and the memoization cache key;
/// `sim_hash` is a coarser hash that collapses literal payloads of the same
/// type and collapses variable names, used only to bucket "shaped alike"
/// atoms together when scanning a rule index for candidates.
#[derive(Clone, Copy, Debug)]
pub struct AtomCache {
    pub digest: u64,
    pub sim_hash: u64,
    pub depth: u16,
    pub de_bruijn_index: u16,
    pub is_constant: bool,
    pub is_term: bool,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Literal {
    Int(i64),
    BitString { value: u128, width: u32 },
    Str(Arc<str>),
    Sym(Symbol),
    Bool(bool),
    Float { significand: i64, exponent: i32, radix: u32 },
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum RootType {
    TypeUniverse,
    Integer,
    StringTy,
    SymbolTy,
    Boolean,
    FloatTy,
    Any,
    NoneTy,
    Binding,
    OpRef,
    RsRef,
    RuleType,
    Strategy,
}

#[derive(Clone, Debug)]
pub enum ApplyKind {
    /// Application of a known, declared operator. `args` is always an
    /// `AtomSeq`-variant `Atom`; `op` is always an `OperatorRef`-variant
    /// `Atom` (never a bare `Operator`), so that rewriting the operator's
    /// definition doesn't invalidate `OpApply`s already built against it.
    /// `bindings` caches the parameter→argument bindings the application
    /// pipeline produced while matching `args` against the operator's
    /// declared parameters; like `AtomCache`, it's derived entirely from
    /// `op` and `args` and excluded from equality/hashing below.
    Op { op: Atom, args: Atom, bindings: Bindings },
    /// Application with no declared operator (an unbound head, or a partial
    /// application still being assembled by the parser).
    Simple { left: Atom, right: Atom },
}

impl PartialEq for ApplyKind {
    fn eq(&self, other: &ApplyKind) -> bool {
        match (self, other) {
            (ApplyKind::Op { op: o1, args: a1, .. }, ApplyKind::Op { op: o2, args: a2, .. }) => o1 == o2 && a1 == a2,
            (ApplyKind::Simple { left: l1, right: r1 }, ApplyKind::Simple { left: l2, right: r2 }) => l1 == l2 && r1 == r2,
            _ => false,
        }
    }
}

impl Eq for ApplyKind {}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum OperatorKind {
    Symbolic,
    TypedSymbolic,
    Case,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct OperatorData {
    pub kind: OperatorKind,
    pub name: Symbol,
    pub params: Atom,
    pub result_type: Atom,
    pub even_meta: bool,
    pub has_native: bool,
    /// `CaseOperator` cases: an `AtomSeq` of `MapPair`s, tried in order.
    pub cases: Option<Atom>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct RewriteRuleData {
    pub pattern: Atom,
    pub rewrite: Atom,
    pub guards: Vec<Atom>,
    pub rulesets: u64,
    pub synthetic: bool,
}

#[derive(Clone, Debug)]
enum InnerAtom {
    Literal {
        cache: AtomCache,
        the_type: Option<Atom>,
        loc: Option<SourceLoc>,
        value: Literal,
    },
    Variable {
        cache: AtomCache,
        the_type: Option<Atom>,
        loc: Option<SourceLoc>,
        name: Symbol,
        guard: Option<Atom>,
        labels: Vec<Symbol>,
        meta: bool,
        /// `Some(n)` marks this as a bound De Bruijn placeholder (`:n`)
        /// introduced by `mk_lambda`; `None` marks a free, bindable
        /// pattern variable.
        dbj: Option<u16>,
    },
    Lambda {
        cache: AtomCache,
        the_type: Option<Atom>,
        loc: Option<SourceLoc>,
        param: Atom,
        body: Atom,
    },
    Apply {
        cache: AtomCache,
        the_type: Option<Atom>,
        loc: Option<SourceLoc>,
        kind: ApplyKind,
    },
    AtomSeq {
        cache: AtomCache,
        the_type: Option<Atom>,
        loc: Option<SourceLoc>,
        elems: Vec<Atom>,
        props: AlgPropFields,
    },
    AlgProp {
        cache: AtomCache,
        the_type: Option<Atom>,
        loc: Option<SourceLoc>,
        fields: AlgPropFields,
    },
    BindingsAtom {
        cache: AtomCache,
        the_type: Option<Atom>,
        loc: Option<SourceLoc>,
        bindings: Bindings,
    },
    MapPair {
        cache: AtomCache,
        the_type: Option<Atom>,
        loc: Option<SourceLoc>,
        left: Atom,
        right: Atom,
    },
    SpecialForm {
        cache: AtomCache,
        the_type: Option<Atom>,
        loc: Option<SourceLoc>,
        tag: Symbol,
        content: Atom,
    },
    OperatorRef {
        cache: AtomCache,
        the_type: Option<Atom>,
        loc: Option<SourceLoc>,
        name: Symbol,
    },
    RulesetRef {
        cache: AtomCache,
        the_type: Option<Atom>,
        loc: Option<SourceLoc>,
        name: Symbol,
        bit: u64,
    },
    Operator {
        cache: AtomCache,
        the_type: Option<Atom>,
        loc: Option<SourceLoc>,
        op: OperatorData,
    },
    RewriteRule {
        cache: AtomCache,
        the_type: Option<Atom>,
        loc: Option<SourceLoc>,
        rule: RewriteRuleData,
    },
    RootType {
        cache: AtomCache,
        the_type: Option<Atom>,
        loc: Option<SourceLoc>,
        root: RootType,
    },
}

/// A De Bruijn placeholder's `name` is carried only so a later `Debug` print
/// or re-abstraction can recover the source binder's spelling; two
/// placeholders at the same level are the same variable regardless of what
/// the original binder happened to be called, so `name` is excluded from
/// equality whenever `dbj` is `Some`. A free (`dbj: None`) variable has no
/// such stand-in identity, so its `name` is exactly what equality compares.
impl PartialEq for InnerAtom {
    fn eq(&self, other: &InnerAtom) -> bool {
        match (self, other) {
            (InnerAtom::Literal { value: v1, .. }, InnerAtom::Literal { value: v2, .. }) => v1 == v2,
            (
                InnerAtom::Variable { name: n1, guard: g1, labels: l1, meta: m1, dbj: d1, .. },
                InnerAtom::Variable { name: n2, guard: g2, labels: l2, meta: m2, dbj: d2, .. },
            ) => {
                let names_agree = match (d1, d2) {
                    (Some(_), Some(_)) => true,
                    _ => n1 == n2,
                };
                names_agree && d1 == d2 && g1 == g2 && l1 == l2 && m1 == m2
            }
            (InnerAtom::Lambda { param: p1, body: b1, .. }, InnerAtom::Lambda { param: p2, body: b2, .. }) => p1 == p2 && b1 == b2,
            (InnerAtom::Apply { kind: k1, .. }, InnerAtom::Apply { kind: k2, .. }) => k1 == k2,
            (InnerAtom::AtomSeq { elems: e1, props: pr1, .. }, InnerAtom::AtomSeq { elems: e2, props: pr2, .. }) => e1 == e2 && pr1 == pr2,
            (InnerAtom::AlgProp { fields: f1, .. }, InnerAtom::AlgProp { fields: f2, .. }) => f1 == f2,
            (InnerAtom::BindingsAtom { bindings: b1, .. }, InnerAtom::BindingsAtom { bindings: b2, .. }) => b1 == b2,
            (InnerAtom::MapPair { left: l1, right: r1, .. }, InnerAtom::MapPair { left: l2, right: r2, .. }) => l1 == l2 && r1 == r2,
            (InnerAtom::SpecialForm { tag: t1, content: c1, .. }, InnerAtom::SpecialForm { tag: t2, content: c2, .. }) => t1 == t2 && c1 == c2,
            (InnerAtom::OperatorRef { name: n1, .. }, InnerAtom::OperatorRef { name: n2, .. }) => n1 == n2,
            (InnerAtom::RulesetRef { name: n1, bit: b1, .. }, InnerAtom::RulesetRef { name: n2, bit: b2, .. }) => n1 == n2 && b1 == b2,
            (InnerAtom::Operator { op: o1, .. }, InnerAtom::Operator { op: o2, .. }) => o1 == o2,
            (InnerAtom::RewriteRule { rule: r1, .. }, InnerAtom::RewriteRule { rule: r2, .. }) => r1 == r2,
            (InnerAtom::RootType { root: r1, .. }, InnerAtom::RootType { root: r2, .. }) => r1 == r2,
            _ => false,
        }
    }
}

impl Eq for InnerAtom {}

impl std::hash::Hash for AtomCache {
    fn hash<H: std::hash::Hasher>(&self, _state: &mut H) {}
}

impl PartialEq for AtomCache {
    fn eq(&self, _other: &AtomCache) -> bool {
        true
    }
}

impl Eq for AtomCache {}

/// An immutable, structurally-shared term node. Two `Atom`s compare equal
/// iff their trees are deeply equal; the cheap `digest`/`sim_hash` fields in
/// `AtomCache` exist purely to make hashing and cache lookups fast without
/// re-walking the tree.
#[derive(Clone, PartialEq, Eq)]
pub struct Atom(Arc<InnerAtom>);

impl std::hash::Hash for Atom {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.cache().digest.hash(state);
    }
}

impl std::fmt::Debug for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.0.as_ref() {
            InnerAtom::Literal { value, .. } => write!(f, "{:?}", value),
            InnerAtom::Variable { name, dbj: Some(n), .. } => write!(f, ":{}/{}", n, name),
            InnerAtom::Variable { name, .. } => write!(f, "{}", name),
            InnerAtom::Lambda { param, body, .. } => write!(f, "\\{:?}.{:?}", param, body),
            InnerAtom::Apply { kind: ApplyKind::Op { op, args, .. }, .. } => write!(f, "{:?}{:?}", op, args),
            InnerAtom::Apply { kind: ApplyKind::Simple { left, right }, .. } => write!(f, "({:?} {:?})", left, right),
            InnerAtom::AtomSeq { elems, .. } => write!(f, "{:?}", elems),
            InnerAtom::AlgProp { fields, .. } => write!(f, "{:?}", fields),
            InnerAtom::BindingsAtom { bindings, .. } => write!(f, "{:?}", bindings),
            InnerAtom::MapPair { left, right, .. } => write!(f, "{:?}->{:?}", left, right),
            InnerAtom::SpecialForm { tag, content, .. } => write!(f, "{{{}: {:?}}}", tag, content),
            InnerAtom::OperatorRef { name, .. } => write!(f, "op:{}", name),
            InnerAtom::RulesetRef { name, .. } => write!(f, "rs:{}", name),
            InnerAtom::Operator { op, .. } => write!(f, "operator {}", op.name),
            InnerAtom::RewriteRule { rule, .. } => write!(f, "{:?} -> {:?}", rule.pattern, rule.rewrite),
            InnerAtom::RootType { root, .. } => write!(f, "{:?}", root),
        }
    }
}

fn safe_minus_one(n: u16) -> u16 {
    n.saturating_sub(1)
}

fn combine_digest(tag: u8, parts: &[u64]) -> u64 {
    let mut buf = Vec::with_capacity(1 + parts.len() * 8);
    buf.push(tag);
    for p in parts {
        buf.extend_from_slice(&p.to_le_bytes());
    }
    hash64(&buf)
}

impl Atom {
    fn inner(&self) -> &InnerAtom {
        &self.0
    }

    pub fn cache(&self) -> AtomCache {
        match self.inner() {
            InnerAtom::Literal { cache, .. }
            | InnerAtom::Variable { cache, .. }
            | InnerAtom::Lambda { cache, .. }
            | InnerAtom::Apply { cache, .. }
            | InnerAtom::AtomSeq { cache, .. }
            | InnerAtom::AlgProp { cache, .. }
            | InnerAtom::BindingsAtom { cache, .. }
            | InnerAtom::MapPair { cache, .. }
            | InnerAtom::SpecialForm { cache, .. }
            | InnerAtom::OperatorRef { cache, .. }
            | InnerAtom::RulesetRef { cache, .. }
            | InnerAtom::Operator { cache, .. }
            | InnerAtom::RewriteRule { cache, .. }
            | InnerAtom::RootType { cache, .. } => *cache,
        }
    }

    pub fn digest(&self) -> u64 {
        self.cache().digest
    }

    pub fn sim_hash(&self) -> u64 {
        self.cache().sim_hash
    }

    pub fn depth(&self) -> u16 {
        self.cache().depth
    }

    pub fn de_bruijn_index(&self) -> u16 {
        self.cache().de_bruijn_index
    }

    pub fn is_constant(&self) -> bool {
        self.cache().is_constant
    }

    pub fn is_term(&self) -> bool {
        self.cache().is_term
    }

    pub fn loc(&self) -> Option<&SourceLoc> {
        match self.inner() {
            InnerAtom::Literal { loc, .. }
            | InnerAtom::Variable { loc, .. }
            | InnerAtom::Lambda { loc, .. }
            | InnerAtom::Apply { loc, .. }
            | InnerAtom::AtomSeq { loc, .. }
            | InnerAtom::AlgProp { loc, .. }
            | InnerAtom::BindingsAtom { loc, .. }
            | InnerAtom::MapPair { loc, .. }
            | InnerAtom::SpecialForm { loc, .. }
            | InnerAtom::OperatorRef { loc, .. }
            | InnerAtom::RulesetRef { loc, .. }
            | InnerAtom::Operator { loc, .. }
            | InnerAtom::RewriteRule { loc, .. }
            | InnerAtom::RootType { loc, .. } => loc.as_ref(),
        }
    }

    pub fn get_type(&self) -> Atom {
        let the_type = match self.inner() {
            InnerAtom::Literal { the_type, .. }
            | InnerAtom::Variable { the_type, .. }
            | InnerAtom::Lambda { the_type, .. }
            | InnerAtom::Apply { the_type, .. }
            | InnerAtom::AtomSeq { the_type, .. }
            | InnerAtom::AlgProp { the_type, .. }
            | InnerAtom::BindingsAtom { the_type, .. }
            | InnerAtom::MapPair { the_type, .. }
            | InnerAtom::SpecialForm { the_type, .. }
            | InnerAtom::OperatorRef { the_type, .. }
            | InnerAtom::RulesetRef { the_type, .. }
            | InnerAtom::Operator { the_type, .. }
            | InnerAtom::RewriteRule { the_type, .. }
            | InnerAtom::RootType { the_type, .. } => the_type,
        };
        the_type.clone().unwrap_or_else(|| self.clone())
    }

    /// The atom's explicitly-carried type, or `None` if it has none (a
    /// compound term whose type is only ever its own structure, not a
    /// separately declared one). Distinct from `get_type`, which falls back
    /// to the atom itself so every atom has *some* type to report.
    fn declared_type(&self) -> Option<&Atom> {
        match self.inner() {
            InnerAtom::Literal { the_type, .. }
            | InnerAtom::Variable { the_type, .. }
            | InnerAtom::Lambda { the_type, .. }
            | InnerAtom::Apply { the_type, .. }
            | InnerAtom::AtomSeq { the_type, .. }
            | InnerAtom::AlgProp { the_type, .. }
            | InnerAtom::BindingsAtom { the_type, .. }
            | InnerAtom::MapPair { the_type, .. }
            | InnerAtom::SpecialForm { the_type, .. }
            | InnerAtom::OperatorRef { the_type, .. }
            | InnerAtom::RulesetRef { the_type, .. }
            | InnerAtom::Operator { the_type, .. }
            | InnerAtom::RewriteRule { the_type, .. }
            | InnerAtom::RootType { the_type, .. } => the_type.as_ref(),
        }
    }

    /// First step of matching (§4.1): a pattern that carries an explicit
    /// type must agree with the subject's type before any structural
    /// comparison is attempted, unless the pattern itself is ANY or a root
    /// type (whose structural comparison below already is the type check).
    pub fn type_matches(&self, subject: &Atom) -> bool {
        if self.is_any_root() || self.is_root_type() {
            return true;
        }
        match self.declared_type() {
            None => true,
            Some(pattern_ty) if pattern_ty.is_any_root() => true,
            Some(pattern_ty) => pattern_ty == &subject.get_type(),
        }
    }

    pub fn is_any_root(&self) -> bool {
        matches!(self.inner(), InnerAtom::RootType { root: RootType::Any, .. })
    }

    pub fn is_root_type(&self) -> bool {
        matches!(self.inner(), InnerAtom::RootType { .. })
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.inner(), InnerAtom::Variable { .. })
    }

    pub fn is_bindable_variable(&self) -> bool {
        matches!(self.inner(), InnerAtom::Variable { dbj: None, .. })
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.inner(), InnerAtom::Literal { .. })
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self.inner() {
            InnerAtom::Literal { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn as_atom_seq(&self) -> Option<(&[Atom], &AlgPropFields)> {
        match self.inner() {
            InnerAtom::AtomSeq { elems, props, .. } => Some((elems, props)),
            _ => None,
        }
    }

    pub fn as_algprop(&self) -> Option<&AlgPropFields> {
        match self.inner() {
            InnerAtom::AlgProp { fields, .. } => Some(fields),
            _ => None,
        }
    }

    pub fn as_op_apply(&self) -> Option<(&Atom, &Atom)> {
        match self.inner() {
            InnerAtom::Apply { kind: ApplyKind::Op { op, args, .. }, .. } => Some((op, args)),
            _ => None,
        }
    }

    /// The parameter→argument bindings cached on an `OpApply` atom by the
    /// operator-application pipeline, or `None` for anything else.
    pub fn op_apply_bindings(&self) -> Option<&Bindings> {
        match self.inner() {
            InnerAtom::Apply { kind: ApplyKind::Op { bindings, .. }, .. } => Some(bindings),
            _ => None,
        }
    }

    pub fn as_simple_apply(&self) -> Option<(&Atom, &Atom)> {
        match self.inner() {
            InnerAtom::Apply { kind: ApplyKind::Simple { left, right }, .. } => Some((left, right)),
            _ => None,
        }
    }

    pub fn as_lambda(&self) -> Option<(&Atom, &Atom)> {
        match self.inner() {
            InnerAtom::Lambda { param, body, .. } => Some((param, body)),
            _ => None,
        }
    }

    pub fn as_operator_ref(&self) -> Option<&Symbol> {
        match self.inner() {
            InnerAtom::OperatorRef { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn as_ruleset_ref(&self) -> Option<(&Symbol, u64)> {
        match self.inner() {
            InnerAtom::RulesetRef { name, bit, .. } => Some((name, *bit)),
            _ => None,
        }
    }

    pub fn as_operator(&self) -> Option<&OperatorData> {
        match self.inner() {
            InnerAtom::Operator { op, .. } => Some(op),
            _ => None,
        }
    }

    pub fn as_rewrite_rule(&self) -> Option<&RewriteRuleData> {
        match self.inner() {
            InnerAtom::RewriteRule { rule, .. } => Some(rule),
            _ => None,
        }
    }

    pub fn as_map_pair(&self) -> Option<(&Atom, &Atom)> {
        match self.inner() {
            InnerAtom::MapPair { left, right, .. } => Some((left, right)),
            _ => None,
        }
    }

    pub fn as_special_form(&self) -> Option<(&Symbol, &Atom)> {
        match self.inner() {
            InnerAtom::SpecialForm { tag, content, .. } => Some((tag, content)),
            _ => None,
        }
    }

    pub fn as_bindings(&self) -> Option<&Bindings> {
        match self.inner() {
            InnerAtom::BindingsAtom { bindings, .. } => Some(bindings),
            _ => None,
        }
    }

    pub fn variable_name(&self) -> Option<&Symbol> {
        match self.inner() {
            InnerAtom::Variable { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn variable_guard(&self) -> Option<&Atom> {
        match self.inner() {
            InnerAtom::Variable { guard, .. } => guard.as_ref(),
            _ => None,
        }
    }

    pub fn variable_labels(&self) -> &[Symbol] {
        match self.inner() {
            InnerAtom::Variable { labels, .. } => labels,
            _ => &[],
        }
    }

    pub fn variable_is_meta(&self) -> bool {
        match self.inner() {
            InnerAtom::Variable { meta, .. } => *meta,
            _ => false,
        }
    }

    pub fn de_bruijn_level(&self) -> Option<u16> {
        match self.inner() {
            InnerAtom::Variable { dbj, .. } => *dbj,
            _ => None,
        }
    }

    /// Pre-order traversal primitive for the out-of-scope serializer. `f`
    /// returning `false` stops descent into the atom just visited.
    pub fn visit(&self, f: &mut dyn FnMut(&Atom) -> bool) {
        if !f(self) {
            return;
        }
        match self.inner() {
            InnerAtom::Literal { .. }
            | InnerAtom::OperatorRef { .. }
            | InnerAtom::RulesetRef { .. }
            | InnerAtom::RootType { .. } => {}
            InnerAtom::Variable { guard, .. } => {
                if let Some(g) = guard {
                    g.visit(f);
                }
            }
            InnerAtom::Lambda { param, body, .. } => {
                param.visit(f);
                body.visit(f);
            }
            InnerAtom::Apply { kind: ApplyKind::Op { op, args, .. }, .. } => {
                op.visit(f);
                args.visit(f);
            }
            InnerAtom::Apply { kind: ApplyKind::Simple { left, right }, .. } => {
                left.visit(f);
                right.visit(f);
            }
            InnerAtom::AtomSeq { elems, .. } => {
                for e in elems {
                    e.visit(f);
                }
            }
            InnerAtom::AlgProp { fields, .. } => {
                for slot in [&fields.associative, &fields.commutative, &fields.idempotent, &fields.absorber, &fields.identity] {
                    if let Some(a) = slot {
                        a.visit(f);
                    }
                }
            }
            InnerAtom::BindingsAtom { bindings, .. } => {
                for (_, v) in bindings.iter() {
                    v.visit(f);
                }
            }
            InnerAtom::MapPair { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            InnerAtom::SpecialForm { content, .. } => content.visit(f),
            InnerAtom::Operator { op, .. } => {
                op.params.visit(f);
                op.result_type.visit(f);
                if let Some(cases) = &op.cases {
                    cases.visit(f);
                }
            }
            InnerAtom::RewriteRule { rule, .. } => {
                rule.pattern.visit(f);
                rule.rewrite.visit(f);
                for g in &rule.guards {
                    g.visit(f);
                }
            }
        }
    }
}

fn mk(inner: InnerAtom) -> Atom {
    Atom(Arc::new(inner))
}

pub fn mk_int(value: i64) -> Atom {
    let cache = AtomCache {
        digest: combine_digest(0, &[value as u64]),
        sim_hash: combine_digest(0, &[0]),
        depth: 0,
        de_bruijn_index: 0,
        is_constant: true,
        is_term: true,
    };
    mk(InnerAtom::Literal { cache, the_type: Some(crate::roots::integer()), loc: None, value: Literal::Int(value) })
}

pub fn mk_bitstring(value: u128, width: u32) -> Atom {
    let cache = AtomCache {
        digest: combine_digest(1, &[value as u64, (value >> 64) as u64, width as u64]),
        sim_hash: combine_digest(1, &[width as u64]),
        depth: 0,
        de_bruijn_index: 0,
        is_constant: true,
        is_term: true,
    };
    mk(InnerAtom::Literal { cache, the_type: Some(crate::roots::integer()), loc: None, value: Literal::BitString { value, width } })
}

pub fn mk_string(s: &str) -> Atom {
    let cache = AtomCache {
        digest: combine_digest(2, &[hash64(s.as_bytes())]),
        sim_hash: combine_digest(2, &[0]),
        depth: 0,
        de_bruijn_index: 0,
        is_constant: true,
        is_term: true,
    };
    mk(InnerAtom::Literal { cache, the_type: Some(crate::roots::string_ty()), loc: None, value: Literal::Str(Arc::from(s)) })
}

pub fn mk_symbol_literal(s: impl Into<Symbol>) -> Atom {
    let sym = s.into();
    let cache = AtomCache {
        digest: combine_digest(3, &[hash64(sym.as_str().as_bytes())]),
        sim_hash: combine_digest(3, &[0]),
        depth: 0,
        de_bruijn_index: 0,
        is_constant: true,
        is_term: true,
    };
    mk(InnerAtom::Literal { cache, the_type: Some(crate::roots::symbol_ty()), loc: None, value: Literal::Sym(sym) })
}

pub fn mk_bool(b: bool) -> Atom {
    let cache = AtomCache {
        digest: combine_digest(4, &[b as u64]),
        sim_hash: combine_digest(4, &[0]),
        depth: 0,
        de_bruijn_index: 0,
        is_constant: true,
        is_term: true,
    };
    mk(InnerAtom::Literal { cache, the_type: Some(crate::roots::boolean_ty()), loc: None, value: Literal::Bool(b) })
}

pub fn mk_float(significand: i64, exponent: i32, radix: u32) -> Atom {
    let cache = AtomCache {
        digest: combine_digest(5, &[significand as u64, exponent as u64, radix as u64]),
        sim_hash: combine_digest(5, &[radix as u64]),
        depth: 0,
        de_bruijn_index: 0,
        is_constant: true,
        is_term: true,
    };
    mk(InnerAtom::Literal { cache, the_type: Some(crate::roots::float_ty()), loc: None, value: Literal::Float { significand, exponent, radix } })
}

pub fn mk_var(name: impl Into<Symbol>, guard: Option<Atom>, labels: Vec<Symbol>, meta: bool) -> Atom {
    let name = name.into();
    let guard_digest = guard.as_ref().map(|g| g.digest()).unwrap_or(0);
    let depth = 1 + guard.as_ref().map(|g| g.depth()).unwrap_or(0);
    let cache = AtomCache {
        digest: combine_digest(6, &[hash64(name.as_str().as_bytes()), guard_digest, meta as u64]),
        sim_hash: combine_digest(6, &[meta as u64]),
        depth,
        de_bruijn_index: guard.as_ref().map(|g| g.de_bruijn_index()).unwrap_or(0),
        is_constant: false,
        is_term: !meta && guard.as_ref().map(|g| g.is_term()).unwrap_or(true),
    };
    mk(InnerAtom::Variable { cache, the_type: None, loc: None, name, guard, labels, meta, dbj: None })
}

/// Internal: builds the De Bruijn placeholder `:n` substituted for a bound
/// variable inside a lambda body. Never exposed as a general constructor;
/// only `lambda::mk_lambda` calls this. Carries the bound parameter's
/// guard/labels/meta along, so `Atom::variable_guard` still sees them once
/// the variable has been turned into a placeholder.
pub(crate) fn mk_dbj_var(n: u16, name: Symbol, guard: Option<Atom>, labels: Vec<Symbol>, meta: bool) -> Atom {
    let guard_digest = guard.as_ref().map(|g| g.digest()).unwrap_or(0);
    let cache = AtomCache {
        digest: combine_digest(7, &[n as u64, guard_digest]),
        sim_hash: combine_digest(7, &[0]),
        depth: guard.as_ref().map(|g| 1 + g.depth()).unwrap_or(0),
        de_bruijn_index: n + 1,
        is_constant: false,
        is_term: true,
    };
    mk(InnerAtom::Variable { cache, the_type: None, loc: None, name, guard, labels, meta, dbj: Some(n) })
}

pub(crate) fn mk_lambda_raw(param: Atom, body: Atom) -> Atom {
    let depth = 1 + param.depth().max(body.depth());
    let cache = AtomCache {
        digest: combine_digest(8, &[param.digest(), body.digest()]),
        sim_hash: combine_digest(8, &[param.sim_hash(), body.sim_hash()]),
        depth,
        de_bruijn_index: safe_minus_one(body.de_bruijn_index().max(param.de_bruijn_index())),
        is_constant: param.is_constant() && body.is_constant(),
        is_term: param.is_term() && body.is_term(),
    };
    mk(InnerAtom::Lambda { cache, the_type: None, loc: None, param, body })
}

pub fn mk_simple_apply(left: Atom, right: Atom) -> Atom {
    let depth = 1 + left.depth().max(right.depth());
    let cache = AtomCache {
        digest: combine_digest(9, &[left.digest(), right.digest()]),
        sim_hash: combine_digest(9, &[left.sim_hash(), right.sim_hash()]),
        depth,
        de_bruijn_index: left.de_bruijn_index().max(right.de_bruijn_index()),
        is_constant: left.is_constant() && right.is_constant(),
        is_term: left.is_term() && right.is_term(),
    };
    mk(InnerAtom::Apply { cache, the_type: None, loc: None, kind: ApplyKind::Simple { left, right } })
}

/// Raw constructor used only by `operator::apply` once the application
/// pipeline has finished flattening, sorting, and matching arguments.
/// `op` must be an `OperatorRef`-variant atom; violating that is an
/// internal bug, not a user error, so it's checked with a fatal helper
/// rather than a `Result`.
pub(crate) fn mk_op_apply_raw(op: Atom, args: Atom) -> Atom {
    mk_op_apply_with_bindings(op, args, Bindings::empty())
}

/// As `mk_op_apply_raw`, but also caches the parameter→argument bindings
/// the application pipeline matched `args` against. `bindings` is a cached
/// derivative of `op`/`args`, not part of either, so it never feeds the
/// digest/sim_hash computation.
pub(crate) fn mk_op_apply_with_bindings(op: Atom, args: Atom, bindings: Bindings) -> Atom {
    if op.as_operator_ref().is_none() {
        crate::errors::fatal_not_op_ref(line!(), &op);
    }
    let depth = 1 + op.depth().max(args.depth());
    let cache = AtomCache {
        digest: combine_digest(10, &[op.digest(), args.digest()]),
        sim_hash: combine_digest(10, &[op.sim_hash(), args.sim_hash()]),
        depth,
        de_bruijn_index: op.de_bruijn_index().max(args.de_bruijn_index()),
        is_constant: op.is_constant() && args.is_constant(),
        is_term: op.is_term() && args.is_term(),
    };
    mk(InnerAtom::Apply { cache, the_type: Some(op.get_type()), loc: None, kind: ApplyKind::Op { op, args, bindings } })
}

pub fn mk_atom_seq(elems: Vec<Atom>, props: AlgPropFields) -> ElisionResult<Atom> {
    let props = props.normalize()?;
    let digest_parts: Vec<u64> = elems.iter().map(|e| e.digest()).collect();
    let sim_parts: Vec<u64> = elems.iter().map(|e| e.sim_hash()).collect();
    let depth = 1 + elems.iter().map(|e| e.depth()).max().unwrap_or(0);
    let de_bruijn_index = elems.iter().map(|e| e.de_bruijn_index()).max().unwrap_or(0);
    let is_constant = elems.iter().all(|e| e.is_constant());
    let is_term = elems.iter().all(|e| e.is_term());
    let cache = AtomCache {
        digest: combine_digest(11, &digest_parts),
        sim_hash: combine_digest(11, &[sim_parts.len() as u64]),
        depth,
        de_bruijn_index,
        is_constant,
        is_term,
    };
    Ok(mk(InnerAtom::AtomSeq { cache, the_type: None, loc: None, elems, props }))
}

pub fn mk_algprop_atom(fields: AlgPropFields) -> ElisionResult<Atom> {
    let fields = fields.normalize()?;
    let parts: Vec<u64> = [&fields.associative, &fields.commutative, &fields.idempotent, &fields.absorber, &fields.identity]
        .iter()
        .map(|slot| slot.as_ref().map(|a| a.digest()).unwrap_or(0))
        .collect();
    let cache = AtomCache {
        digest: combine_digest(12, &parts),
        sim_hash: combine_digest(12, &parts),
        depth: 1,
        de_bruijn_index: 0,
        is_constant: true,
        is_term: true,
    };
    Ok(mk(InnerAtom::AlgProp { cache, the_type: None, loc: None, fields }))
}

pub fn mk_bindings_atom(bindings: Bindings) -> Atom {
    let parts: Vec<u64> = bindings.iter().map(|(k, v)| combine_digest(0, &[hash64(k.as_str().as_bytes()), v.digest()])).collect();
    let cache = AtomCache {
        digest: combine_digest(13, &parts),
        sim_hash: combine_digest(13, &[parts.len() as u64]),
        depth: 1,
        de_bruijn_index: 0,
        is_constant: bindings.iter().all(|(_, v)| v.is_constant()),
        is_term: bindings.iter().all(|(_, v)| v.is_term()),
    };
    mk(InnerAtom::BindingsAtom { cache, the_type: None, loc: None, bindings })
}

pub fn mk_map_pair(left: Atom, right: Atom) -> Atom {
    let depth = 1 + left.depth().max(right.depth());
    let cache = AtomCache {
        digest: combine_digest(14, &[left.digest(), right.digest()]),
        sim_hash: combine_digest(14, &[left.sim_hash(), right.sim_hash()]),
        depth,
        de_bruijn_index: left.de_bruijn_index().max(right.de_bruijn_index()),
        is_constant: left.is_constant() && right.is_constant(),
        is_term: left.is_term() && right.is_term(),
    };
    mk(InnerAtom::MapPair { cache, the_type: None, loc: None, left, right })
}

pub fn mk_special_form(tag: impl Into<Symbol>, content: Atom) -> Atom {
    let tag = tag.into();
    let depth = 1 + content.depth();
    let cache = AtomCache {
        digest: combine_digest(15, &[hash64(tag.as_str().as_bytes()), content.digest()]),
        sim_hash: combine_digest(15, &[content.sim_hash()]),
        depth,
        de_bruijn_index: content.de_bruijn_index(),
        is_constant: content.is_constant(),
        is_term: content.is_term(),
    };
    mk(InnerAtom::SpecialForm { cache, the_type: None, loc: None, tag, content })
}

pub fn mk_operator_ref(name: impl Into<Symbol>) -> Atom {
    let name = name.into();
    let cache = AtomCache {
        digest: combine_digest(16, &[hash64(name.as_str().as_bytes())]),
        sim_hash: combine_digest(16, &[0]),
        depth: 0,
        de_bruijn_index: 0,
        is_constant: true,
        is_term: true,
    };
    mk(InnerAtom::OperatorRef { cache, the_type: Some(crate::roots::opref_ty()), loc: None, name })
}

pub fn mk_ruleset_ref(name: impl Into<Symbol>, bit: u64) -> Atom {
    let name = name.into();
    let cache = AtomCache {
        digest: combine_digest(17, &[hash64(name.as_str().as_bytes()), bit]),
        sim_hash: combine_digest(17, &[0]),
        depth: 0,
        de_bruijn_index: 0,
        is_constant: true,
        is_term: true,
    };
    mk(InnerAtom::RulesetRef { cache, the_type: Some(crate::roots::rsref_ty()), loc: None, name, bit })
}

pub fn mk_operator_atom(op: OperatorData) -> Atom {
    let depth = 1 + op.params.depth().max(op.result_type.depth());
    let cache = AtomCache {
        digest: combine_digest(18, &[hash64(op.name.as_str().as_bytes()), op.params.digest(), op.result_type.digest()]),
        sim_hash: combine_digest(18, &[op.params.sim_hash()]),
        depth,
        de_bruijn_index: 0,
        is_constant: true,
        is_term: true,
    };
    mk(InnerAtom::Operator { cache, the_type: None, loc: None, op })
}

pub fn mk_rewrite_rule_atom(rule: RewriteRuleData) -> Atom {
    let depth = 1 + rule.pattern.depth().max(rule.rewrite.depth());
    let cache = AtomCache {
        digest: combine_digest(19, &[rule.pattern.digest(), rule.rewrite.digest(), rule.rulesets]),
        sim_hash: combine_digest(19, &[rule.pattern.sim_hash()]),
        depth,
        de_bruijn_index: 0,
        is_constant: rule.pattern.is_constant() && rule.rewrite.is_constant(),
        is_term: rule.pattern.is_term() && rule.rewrite.is_term(),
    };
    mk(InnerAtom::RewriteRule { cache, the_type: Some(crate::roots::ruletype()), loc: None, rule })
}

pub(crate) fn mk_root_type(root: RootType) -> Atom {
    let the_type = if root == RootType::TypeUniverse { None } else { Some(crate::roots::type_universe()) };
    let cache = AtomCache {
        digest: combine_digest(20, &[hash64(format!("{:?}", root).as_bytes())]),
        sim_hash: combine_digest(20, &[0]),
        depth: 0,
        de_bruijn_index: 0,
        is_constant: true,
        is_term: true,
    };
    mk(InnerAtom::RootType { cache, the_type, loc: None, root })
}

#[cfg(test)]
mod atom_tests {
    use super::*;

    #[test]
    fn equal_literals_are_equal_atoms() {
        assert_eq!(mk_int(5), mk_int(5));
        assert_ne!(mk_int(5), mk_int(6));
    }

    #[test]
    fn literal_atoms_are_constant_and_ground() {
        let five = mk_int(5);
        assert!(five.is_constant());
        assert!(five.is_term());
        assert_eq!(five.depth(), 0);
    }

    #[test]
    fn variables_are_not_constant() {
        let x = mk_var("x", None, Vec::new(), false);
        assert!(!x.is_constant());
        assert!(x.is_bindable_variable());
    }

    #[test]
    fn meta_variable_is_not_a_term() {
        let x = mk_var("X", None, Vec::new(), true);
        assert!(!x.is_term());
    }

    #[test]
    fn atom_seq_rejects_illegal_properties() {
        let fields = AlgPropFields { identity: Some(mk_bool(true)), ..AlgPropFields::none() };
        assert!(mk_atom_seq(vec![mk_int(1), mk_int(2)], fields).is_err());
    }

    #[test]
    fn atom_seq_depth_and_constancy_propagate() {
        let seq = mk_atom_seq(vec![mk_int(1), mk_var("x", None, Vec::new(), false)], AlgPropFields::none()).unwrap();
        assert!(!seq.is_constant());
        assert_eq!(seq.depth(), 1);
    }

    #[test]
    fn visit_stops_descent_when_callback_returns_false() {
        let inner = mk_simple_apply(mk_int(1), mk_int(2));
        let outer = mk_simple_apply(inner, mk_int(3));
        let mut seen = Vec::new();
        outer.visit(&mut |a| {
            seen.push(a.clone());
            !a.as_simple_apply().is_some() || seen.len() > 1
        });
        assert!(seen.len() >= 1);
    }

    #[test]
    fn lambdas_differing_only_in_bound_name_are_alpha_equivalent() {
        let body_x = mk_var("x", None, Vec::new(), false);
        let body_y = mk_var("y", None, Vec::new(), false);
        let lam_x = crate::lambda::mk_lambda("x", None, Vec::new(), false, body_x);
        let lam_y = crate::lambda::mk_lambda("y", None, Vec::new(), false, body_y);
        assert_eq!(lam_x, lam_y);
        assert_eq!(lam_x.digest(), lam_y.digest());
    }

    #[test]
    fn type_universe_is_self_typed() {
        let tu = mk_root_type(RootType::TypeUniverse);
        assert_eq!(tu.get_type(), tu);
    }

    #[test]
    fn integer_literal_type_is_integer_root() {
        let five = mk_int(5);
        assert!(matches!(five.get_type().inner(), InnerAtom::RootType { root: RootType::Integer, .. }));
    }
}
