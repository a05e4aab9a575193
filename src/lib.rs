//! A term rewriting core: immutable, structurally-hashed atoms; a matcher
//! that understands associative/commutative/idempotent operator
//! properties; a rule library indexed by head symbol; and a `Context` that
//! ties operator declarations, rulesets, and rewriting together behind a
//! narrow, lock-guarded API.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimallocator::Mimalloc = mimallocator::Mimalloc;

pub mod algprop;
pub mod atom;
pub mod bindings;
pub mod comparator;
pub mod context;
pub mod errors;
pub mod guard;
pub mod lambda;
pub mod matcher;
pub mod memo;
pub mod operator;
pub mod outcome;
pub mod roots;
pub mod rule;
pub mod ruleset;
pub mod seq_match;
pub mod special_form;
pub mod symbol;
pub mod timeout;

pub use atom::Atom;
pub use bindings::Bindings;
pub use context::{Context, EngineConfig};
pub use errors::{ElisionErr, ElisionResult};
pub use outcome::Outcome;
pub use symbol::Symbol;
pub use timeout::Deadline;
