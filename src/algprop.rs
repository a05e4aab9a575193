use crate::atom::Atom;
use crate::errors::{ElisionErr, ElisionResult};

/// The five optional slots making up an `AtomSeq`'s algebraic properties.
/// Kept as a small plain-data struct, rather than folded into the atom
/// variant enum, so it can be embedded directly in `AtomSeq` without an
/// extra indirection, while still being wrappable as a standalone `Atom`
/// (see `Atom::mk_algprop_atom`) for the "AlgProp vs AlgProp" match case.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct AlgPropFields {
    pub associative: Option<Atom>,
    pub commutative: Option<Atom>,
    pub idempotent: Option<Atom>,
    pub absorber: Option<Atom>,
    pub identity: Option<Atom>,
}

impl Default for AlgPropFields {
    fn default() -> Self {
        AlgPropFields::none()
    }
}

impl AlgPropFields {
    pub const fn none() -> Self {
        AlgPropFields {
            associative: None,
            commutative: None,
            idempotent: None,
            absorber: None,
            identity: None,
        }
    }

    /// Normalizes any occurrence of the root type ANY in a slot to
    /// "unspecified" (`None`), then checks the non-associative invariant.
    /// This is the single choke point every `AlgProp`/`AtomSeq` constructor
    /// routes through.
    pub fn normalize(mut self) -> ElisionResult<Self> {
        self.associative = normalize_slot(self.associative);
        self.commutative = normalize_slot(self.commutative);
        self.idempotent = normalize_slot(self.idempotent);
        self.absorber = normalize_slot(self.absorber);
        self.identity = normalize_slot(self.identity);

        if self.associative.is_none()
            && (self.idempotent.is_some() || self.absorber.is_some() || self.identity.is_some())
        {
            return Err(ElisionErr::IllegalPropertiesSpecification { loc: None });
        }

        if let Some(idempotent) = &self.idempotent {
            if idempotent.get_type() != crate::roots::boolean_ty() {
                return Err(ElisionErr::IllegalPropertiesSpecification { loc: None });
            }
        }

        Ok(self)
    }

    pub fn is_associative(&self) -> bool {
        self.associative.is_some()
    }

    pub fn is_commutative(&self) -> bool {
        self.commutative.is_some()
    }

    pub fn is_idempotent(&self) -> bool {
        self.idempotent.is_some()
    }

    /// Returns the absorbing element. A prior accessor for this pair of
    /// slots had the identity/absorber readings swapped; this one returns
    /// the absorber here and the identity in `get_identity`, not the other
    /// way around.
    pub fn get_absorber(&self) -> Option<&Atom> {
        self.absorber.as_ref()
    }

    pub fn get_identity(&self) -> Option<&Atom> {
        self.identity.as_ref()
    }
}

fn normalize_slot(slot: Option<Atom>) -> Option<Atom> {
    match slot {
        Some(a) if a.is_any_root() => None,
        owise => owise,
    }
}

#[cfg(test)]
mod algprop_tests {
    use super::*;
    use crate::atom::mk_bool;

    #[test]
    fn any_normalizes_to_unspecified() {
        let fields = AlgPropFields {
            associative: Some(crate::roots::any_ty()),
            ..AlgPropFields::none()
        };
        let normalized = fields.normalize().unwrap();
        assert!(normalized.associative.is_none());
    }

    #[test]
    fn non_associative_with_identity_is_rejected() {
        let fields = AlgPropFields {
            identity: Some(mk_bool(true)),
            ..AlgPropFields::none()
        };
        assert!(fields.normalize().is_err());
    }

    #[test]
    fn associative_with_identity_is_accepted() {
        let fields = AlgPropFields {
            associative: Some(mk_bool(true)),
            identity: Some(mk_bool(true)),
            ..AlgPropFields::none()
        };
        assert!(fields.normalize().is_ok());
    }

    #[test]
    fn idempotent_slot_must_be_boolean_typed() {
        let fields = AlgPropFields {
            associative: Some(mk_bool(true)),
            idempotent: Some(crate::atom::mk_int(1)),
            ..AlgPropFields::none()
        };
        assert!(fields.normalize().is_err());

        let fields = AlgPropFields {
            associative: Some(mk_bool(true)),
            idempotent: Some(mk_bool(true)),
            ..AlgPropFields::none()
        };
        assert!(fields.normalize().is_ok());
    }
}
