use std::fmt::Debug;

use crate::atom::Atom;

/// Most of these are errors that get raised at the handful of places where an
/// invariant can't be upheld by the type system alone: bad algebraic
/// property combinations, arity mismatches, malformed special forms. The ones
/// that aren't reachable from outside (an `OpApply` whose `op` field isn't
/// actually an `OperatorRef`, for instance) use the fatal helpers below instead
/// of a `Result` variant, since there's no sensible way for a caller to recover
/// from a broken internal invariant.

pub fn fatal_not_op_ref<T: Debug>(loc: u32, got: &T) -> ! {
    eprintln!("errors line {}; OpApply::op invariant violated, expected OperatorRef, got {:?}\n", loc, got);
    std::process::exit(-1);
}

pub fn fatal_cache_inconsistent<T: Debug>(loc: u32, key: &T) -> ! {
    eprintln!("errors line {}; memoization cache returned two different atoms for the same key {:?}; this is a bug.\n", loc, key);
    std::process::exit(-1);
}

pub fn fatal_empty_grouping(loc: u32) -> ! {
    eprintln!("errors line {}; associative grouping iterator produced an empty group, which is disallowed.\n", loc);
    std::process::exit(-1);
}

pub fn fatal_bad_offset_cache(loc: u32, idx: usize, len: usize) -> ! {
    eprintln!("errors line {}; OffsetCache failed to retrieve map at index {}; vec length was {}\n", loc, idx, len);
    std::process::exit(-1);
}

pub type ElisionResult<T> = Result<T, ElisionErr>;

#[derive(Debug, Clone, PartialEq)]
pub enum ElisionErr {
    /// An `AlgProp` was constructed with idempotent/absorber/identity set
    /// while not associative.
    IllegalPropertiesSpecification { loc: Option<SourceLoc> },
    /// An operator was applied with the wrong arity or a parameter's type
    /// didn't check, naming the failing parameter index and a human reason.
    ArgumentListException { index: usize, reason: String, loc: Option<SourceLoc> },
    /// Reference to an undeclared ruleset while strict mode is enabled.
    NoSuchRulesetException { name: String, loc: Option<SourceLoc> },
    /// Rule's pattern equals its rewrite (would never make progress).
    IdentityRuleException { loc: Option<SourceLoc> },
    /// Rule's pattern is a bare variable (would rewrite everything).
    BindablePatternException { loc: Option<SourceLoc> },
    /// Rule's pattern is a literal while literal-rule rewriting is disabled.
    LiteralPatternException { loc: Option<SourceLoc> },
    /// Applying a lambda to an argument that doesn't match its parameter.
    LambdaVariableMismatchException { expected: Atom, got: Atom, loc: Option<SourceLoc> },
    /// Applying a lambda recursed past the available stack.
    LambdaUnboundedRecursionException { depth: usize, loc: Option<SourceLoc> },
    /// A special form's content was malformed: missing a required key,
    /// carried a disallowed key, violated an either-of-two constraint, or
    /// a value had the wrong type.
    SpecialFormException { tag: String, reason: String, loc: Option<SourceLoc> },
    /// A cache entry was present under a key but held the wrong type.
    CacheException { reason: String, loc: Option<SourceLoc> },
}

impl std::fmt::Display for ElisionErr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ElisionErr::IllegalPropertiesSpecification { loc } =>
                write!(f, "illegal algebraic property specification (non-associative with idempotent/absorber/identity set){}", fmt_loc(loc)),
            ElisionErr::ArgumentListException { index, reason, loc } =>
                write!(f, "argument list exception at parameter {}: {}{}", index, reason, fmt_loc(loc)),
            ElisionErr::NoSuchRulesetException { name, loc } =>
                write!(f, "reference to undeclared ruleset `{}`{}", name, fmt_loc(loc)),
            ElisionErr::IdentityRuleException { loc } =>
                write!(f, "rule pattern and rewrite are identical; rule would never make progress{}", fmt_loc(loc)),
            ElisionErr::BindablePatternException { loc } =>
                write!(f, "rule pattern is a bare variable; would match and rewrite everything{}", fmt_loc(loc)),
            ElisionErr::LiteralPatternException { loc } =>
                write!(f, "rule pattern is a literal, but literal-rule rewriting is disabled{}", fmt_loc(loc)),
            ElisionErr::LambdaVariableMismatchException { expected, got, loc } =>
                write!(f, "lambda application argument mismatch: expected something matching {:?}, got {:?}{}", expected, got, fmt_loc(loc)),
            ElisionErr::LambdaUnboundedRecursionException { depth, loc } =>
                write!(f, "lambda application recursed without bound (depth {}){}", depth, fmt_loc(loc)),
            ElisionErr::SpecialFormException { tag, reason, loc } =>
                write!(f, "malformed special form `{}`: {}{}", tag, reason, fmt_loc(loc)),
            ElisionErr::CacheException { reason, loc } =>
                write!(f, "cache inconsistency: {}{}", reason, fmt_loc(loc)),
        }
    }
}

impl std::error::Error for ElisionErr {}

fn fmt_loc(loc: &Option<SourceLoc>) -> String {
    match loc {
        Some(l) => format!(" at {}", l),
        None => String::new(),
    }
}

/// Opaque source location carried by atoms and errors, populated by the
/// (out-of-scope) parser. Ignored by equality/hashing everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLoc {
    pub file: std::sync::Arc<str>,
    pub line: u32,
    pub col: u32,
}

impl std::fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}
