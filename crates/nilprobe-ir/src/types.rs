//! Type system helpers for working with Go types from bridge data.

use crate::ir::{AnalysisInput, Package, TypeKind, TypeRef};
use std::collections::HashMap;

/// Named types can only chain through a handful of declarations; anything
/// longer is a cycle in the input.
const MAX_NAMED_CHAIN: usize = 16;

/// Type lookup table. Type ids are unique across the whole input, so one
/// table covers every package.
#[derive(Debug, Default)]
pub struct TypeMap {
    types: HashMap<u32, TypeRef>,
}

impl TypeMap {
    pub fn from_input(input: &AnalysisInput) -> Self {
        let types = input
            .packages
            .iter()
            .flat_map(|p| p.types.iter())
            .map(|t| (t.id, t.clone()))
            .collect();
        Self { types }
    }

    pub fn from_package(pkg: &Package) -> Self {
        let types = pkg.types.iter().map(|t| (t.id, t.clone())).collect();
        Self { types }
    }

    pub fn get(&self, id: u32) -> Option<&TypeRef> {
        self.types.get(&id)
    }

    /// Follow `Named` types down to their underlying representation.
    pub fn underlying(&self, id: u32) -> Option<&TypeRef> {
        let mut ty = self.types.get(&id)?;
        for _ in 0..MAX_NAMED_CHAIN {
            if ty.kind != TypeKind::Named {
                return Some(ty);
            }
            ty = self.types.get(&ty.underlying)?;
        }
        None
    }

    fn underlying_kind(&self, id: u32) -> Option<TypeKind> {
        self.underlying(id).map(|t| t.kind)
    }

    pub fn is_pointer(&self, id: u32) -> bool {
        self.underlying_kind(id) == Some(TypeKind::Pointer)
    }

    pub fn is_map(&self, id: u32) -> bool {
        self.underlying_kind(id) == Some(TypeKind::Map)
    }

    pub fn is_interface(&self, id: u32) -> bool {
        self.underlying_kind(id) == Some(TypeKind::Interface)
    }

    /// Element type of a pointer type.
    pub fn pointee(&self, id: u32) -> Option<u32> {
        self.underlying(id)
            .filter(|t| t.kind == TypeKind::Pointer)
            .map(|t| t.elem)
    }

    /// `*T` where `T`'s underlying type is a struct.
    pub fn is_pointer_to_struct(&self, id: u32) -> bool {
        self.pointee(id)
            .is_some_and(|elem| self.underlying_kind(elem) == Some(TypeKind::Struct))
    }

    /// Channel, map or slice: types whose zero value is a nil reference.
    pub fn is_reference_composite(&self, id: u32) -> bool {
        matches!(
            self.underlying_kind(id),
            Some(TypeKind::Chan | TypeKind::Map | TypeKind::Slice)
        )
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(id: u32, kind: TypeKind, name: &str, underlying: u32, elem: u32) -> TypeRef {
        TypeRef {
            id,
            kind,
            name: name.into(),
            underlying,
            elem,
            key: 0,
        }
    }

    fn make_type_map() -> TypeMap {
        let pkg = Package {
            import_path: "test".into(),
            name: "test".into(),
            files: vec![],
            types: vec![
                ty(1, TypeKind::Basic, "int", 0, 0),
                ty(2, TypeKind::Pointer, "*test.User", 0, 3),
                ty(3, TypeKind::Named, "test.User", 4, 0),
                ty(4, TypeKind::Struct, "struct{Name string}", 0, 0),
                ty(5, TypeKind::Map, "map[string]int", 0, 1),
                ty(6, TypeKind::Named, "test.Index", 5, 0),
                ty(7, TypeKind::Pointer, "*int", 0, 1),
                ty(8, TypeKind::Slice, "[]int", 0, 1),
                ty(9, TypeKind::Interface, "error", 0, 0),
                // Self-referential named type: malformed input.
                ty(10, TypeKind::Named, "test.Loop", 10, 0),
            ],
            functions: vec![],
            global_vars: vec![],
        };
        TypeMap::from_package(&pkg)
    }

    #[test]
    fn test_underlying_resolves_named() {
        let tm = make_type_map();
        assert_eq!(tm.underlying(3).unwrap().kind, TypeKind::Struct);
        assert_eq!(tm.underlying(6).unwrap().kind, TypeKind::Map);
        assert_eq!(tm.underlying(1).unwrap().kind, TypeKind::Basic);
        assert!(tm.underlying(99).is_none());
        assert!(tm.underlying(10).is_none());
    }

    #[test]
    fn test_pointer_checks() {
        let tm = make_type_map();
        assert!(tm.is_pointer(2));
        assert!(!tm.is_pointer(1));
        assert_eq!(tm.pointee(2), Some(3));
        assert_eq!(tm.pointee(5), None);
        assert!(tm.is_pointer_to_struct(2));
        assert!(!tm.is_pointer_to_struct(7));
        assert!(!tm.is_pointer_to_struct(4));
    }

    #[test]
    fn test_composite_checks() {
        let tm = make_type_map();
        assert!(tm.is_map(5));
        assert!(tm.is_map(6)); // named map
        assert!(!tm.is_map(2));
        assert!(tm.is_reference_composite(6));
        assert!(tm.is_reference_composite(8));
        assert!(!tm.is_reference_composite(2));
        assert!(!tm.is_reference_composite(4));
        assert!(tm.is_interface(9));
    }

    #[test]
    fn test_from_input_merges_packages() {
        let a = Package {
            import_path: "a".into(),
            name: "a".into(),
            files: vec![],
            types: vec![ty(1, TypeKind::Basic, "int", 0, 0)],
            functions: vec![],
            global_vars: vec![],
        };
        let mut b = a.clone();
        b.import_path = "b".into();
        b.types = vec![ty(2, TypeKind::Pointer, "*int", 0, 1)];
        let input = AnalysisInput {
            packages: vec![a, b],
            go_version: "1.22".into(),
            bridge_version: String::new(),
        };
        let tm = TypeMap::from_input(&input);
        assert_eq!(tm.len(), 2);
        assert_eq!(tm.pointee(2), Some(1));
    }
}
