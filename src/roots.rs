//! Singleton root type atoms (`TypeUniverse`, `INTEGER`, `STRING`, ...).
//! Each call builds a fresh `Atom`, but since `Atom` equality is structural
//! (not pointer-based), every call for the same root compares equal to
//! every other — there is no need for a process-wide singleton table.

use crate::atom::{mk_root_type, Atom, RootType};

pub fn type_universe() -> Atom {
    mk_root_type(RootType::TypeUniverse)
}

pub fn integer() -> Atom {
    mk_root_type(RootType::Integer)
}

pub fn string_ty() -> Atom {
    mk_root_type(RootType::StringTy)
}

pub fn symbol_ty() -> Atom {
    mk_root_type(RootType::SymbolTy)
}

pub fn boolean_ty() -> Atom {
    mk_root_type(RootType::Boolean)
}

pub fn float_ty() -> Atom {
    mk_root_type(RootType::FloatTy)
}

pub fn any_ty() -> Atom {
    mk_root_type(RootType::Any)
}

pub fn none_ty() -> Atom {
    mk_root_type(RootType::NoneTy)
}

pub fn binding_ty() -> Atom {
    mk_root_type(RootType::Binding)
}

pub fn opref_ty() -> Atom {
    mk_root_type(RootType::OpRef)
}

pub fn rsref_ty() -> Atom {
    mk_root_type(RootType::RsRef)
}

pub fn ruletype() -> Atom {
    mk_root_type(RootType::RuleType)
}

pub fn strategy_ty() -> Atom {
    mk_root_type(RootType::Strategy)
}

#[cfg(test)]
mod roots_tests {
    use super::*;

    #[test]
    fn same_root_called_twice_is_equal() {
        assert_eq!(integer(), integer());
        assert_ne!(integer(), string_ty());
    }

    #[test]
    fn non_universe_roots_are_typed_by_type_universe() {
        assert_eq!(integer().get_type(), type_universe());
    }
}
