use gobridge_ir::ParsedType;

use super::{classify, CompositeKind, MappingError, StructRegistry, Transfer};

/// How a Go type crosses the cgo boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CType {
    /// cgo spelling (e.g. "C.longlong", "*C.char", "C.uintptr_t")
    pub c_type: String,
    /// Go display name
    pub go_type: String,
    pub needs_alloc: bool,
    /// The caller must release the value through a `Free_*` export
    pub needs_free: bool,
    pub is_handle: bool,
    pub nullable: bool,
    /// Only ever set for `error`
    pub is_out_param: bool,
    pub elem: Option<Box<CType>>,
    /// Fixed array length
    pub len: usize,
}

impl CType {
    fn new(c_type: impl Into<String>, go_type: &str) -> Self {
        Self {
            c_type: c_type.into(),
            go_type: go_type.to_string(),
            needs_alloc: false,
            needs_free: false,
            is_handle: false,
            nullable: false,
            is_out_param: false,
            elem: None,
            len: 0,
        }
    }

    /// Render an already classified type. `transfer` must come from
    /// [`classify`] on the same `ty`.
    pub fn describe(ty: &ParsedType, transfer: &Transfer) -> Self {
        match transfer {
            Transfer::Value(p) => Self::new(p.c, &ty.name),
            Transfer::OwnedString => {
                let mut ct = Self::new("*C.char", &ty.name);
                ct.needs_alloc = true;
                ct.needs_free = true;
                ct
            }
            Transfer::ErrorOut => {
                let mut ct = Self::new("**C.char", &ty.name);
                ct.needs_alloc = true;
                ct.needs_free = true;
                ct.is_out_param = true;
                ct
            }
            Transfer::Handle { nullable, .. } => {
                let mut ct = Self::new("C.uintptr_t", &ty.name);
                ct.is_handle = true;
                ct.nullable = *nullable;
                ct
            }
            Transfer::Composite {
                kind: CompositeKind::Bytes,
                ..
            } => {
                let mut ct = Self::new("unsafe.Pointer", &ty.name);
                ct.needs_alloc = true;
                ct.needs_free = true;
                ct
            }
            Transfer::Composite { kind, elem, len } => {
                let elem = match ty.elem() {
                    Some(elem_ty) => Self::describe(elem_ty, elem),
                    None => Self::new("unsafe.Pointer", ""),
                };
                let mut ct = Self::new(format!("*{}", elem.c_type), &ty.name);
                let owned = *kind != CompositeKind::Pointer;
                ct.needs_alloc = owned;
                ct.needs_free = owned;
                ct.nullable = !owned;
                ct.len = *len;
                ct.elem = Some(Box::new(elem));
                ct
            }
        }
    }
}

/// Maps IR types to cgo descriptors for one package.
#[derive(Debug, Clone)]
pub struct CTypeMapper<'r> {
    structs: &'r StructRegistry,
}

impl<'r> CTypeMapper<'r> {
    pub fn new(structs: &'r StructRegistry) -> Self {
        Self { structs }
    }

    pub fn map_type(&self, ty: &ParsedType) -> Result<CType, MappingError> {
        let transfer = classify(ty, self.structs)?;
        Ok(CType::describe(ty, &transfer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobridge_ir::TypeKind;
    use pretty_assertions::assert_eq;

    fn map(ty: ParsedType) -> CType {
        let reg = StructRegistry::new(["Point"]);
        CTypeMapper::new(&reg).map_type(&ty).unwrap()
    }

    #[test]
    fn test_primitive_tokens() {
        let cases = [
            ("int", "C.longlong"),
            ("int8", "C.int8_t"),
            ("int64", "C.int64_t"),
            ("uint", "C.ulonglong"),
            ("byte", "C.uint8_t"),
            ("uint32", "C.uint32_t"),
            ("float32", "C.float"),
            ("float64", "C.double"),
            ("bool", "C.bool"),
            ("rune", "C.int32_t"),
            ("uintptr", "C.uintptr_t"),
        ];
        for (go, c) in cases {
            let ct = map(ParsedType::primitive(go));
            assert_eq!(ct.c_type, c, "{go}");
            assert!(!ct.needs_free);
        }
    }

    #[test]
    fn test_string_is_owned() {
        let ct = map(ParsedType::string());
        assert_eq!(ct.c_type, "*C.char");
        assert!(ct.needs_alloc && ct.needs_free);
    }

    #[test]
    fn test_error_is_out_param() {
        let ct = map(ParsedType::error());
        assert_eq!(ct.c_type, "**C.char");
        assert!(ct.is_out_param);
    }

    #[test]
    fn test_handles() {
        let value = map(ParsedType::structure("Point"));
        assert_eq!(value.c_type, "C.uintptr_t");
        assert!(value.is_handle && !value.nullable);

        let ptr = map(ParsedType::pointer(ParsedType::structure("Point")));
        assert_eq!(ptr.c_type, "C.uintptr_t");
        assert!(ptr.is_handle && ptr.nullable);

        let map_ty = map(ParsedType::map(ParsedType::string(), ParsedType::primitive("int")));
        assert!(map_ty.is_handle);
        assert_eq!(map_ty.go_type, "map[string]int");
    }

    #[test]
    fn test_composites() {
        let bytes = map(ParsedType::slice(ParsedType::primitive("byte")));
        assert_eq!(bytes.c_type, "unsafe.Pointer");

        let strings = map(ParsedType::slice(ParsedType::string()));
        assert_eq!(strings.c_type, "**C.char");
        assert!(strings.needs_free);
        assert_eq!(strings.elem.as_ref().unwrap().c_type, "*C.char");

        let arr = map(ParsedType::array(ParsedType::primitive("int"), 3));
        assert_eq!(arr.c_type, "*C.longlong");
        assert_eq!(arr.len, 3);

        let ptr = map(ParsedType::pointer(ParsedType::primitive("float64")));
        assert_eq!(ptr.c_type, "*C.double");
        assert!(ptr.nullable && !ptr.needs_free);
    }

    #[test]
    fn test_rejects_channels() {
        let reg = StructRegistry::default();
        let mut chan = ParsedType::primitive("chan int");
        chan.kind = TypeKind::Chan;
        assert!(CTypeMapper::new(&reg).map_type(&chan).is_err());
    }
}
