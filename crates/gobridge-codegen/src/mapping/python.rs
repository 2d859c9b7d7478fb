use gobridge_ir::ParsedType;

use super::{classify, CompositeKind, HandleKind, MappingError, StructRegistry, Transfer};
use crate::naming::py_class_name;

/// How a Go type appears on the ctypes side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyType {
    /// ctypes token used in `argtypes`
    pub ctypes: String,
    /// ctypes token used in `restype` and out-parameters. Differs from
    /// `ctypes` for glue-allocated data so the pointer can be freed.
    pub ctypes_return: String,
    /// Python type hint
    pub py_hint: String,
    pub needs_free: bool,
    pub is_handle: bool,
    pub nullable: bool,
    pub is_error: bool,
    pub is_string: bool,
    pub elem: Option<Box<PyType>>,
    pub len: usize,
}

impl PyType {
    fn new(ctypes: &str, py_hint: impl Into<String>) -> Self {
        Self {
            ctypes: ctypes.to_string(),
            ctypes_return: ctypes.to_string(),
            py_hint: py_hint.into(),
            needs_free: false,
            is_handle: false,
            nullable: false,
            is_error: false,
            is_string: false,
            elem: None,
            len: 0,
        }
    }

    /// Render an already classified type. `transfer` must come from
    /// [`classify`] on the same `ty`.
    pub fn describe(ty: &ParsedType, transfer: &Transfer) -> Self {
        match transfer {
            Transfer::Value(p) => Self::new(p.ctypes, p.py),
            Transfer::OwnedString => {
                let mut pt = Self::new("c_char_p", "str");
                pt.ctypes_return = "c_void_p".to_string();
                pt.needs_free = true;
                pt.is_string = true;
                pt
            }
            Transfer::ErrorOut => {
                let mut pt = Self::new("POINTER(c_void_p)", "str");
                pt.needs_free = true;
                pt.is_error = true;
                pt
            }
            Transfer::Handle { kind, nullable } => {
                let hint = match kind {
                    HandleKind::Struct {
                        name, known: true, ..
                    } if *nullable => format!("Optional[\"{}\"]", py_class_name(name)),
                    HandleKind::Struct {
                        name, known: true, ..
                    } => format!("\"{}\"", py_class_name(name)),
                    _ => "int".to_string(),
                };
                let mut pt = Self::new("c_size_t", hint);
                pt.is_handle = true;
                pt.nullable = *nullable;
                pt
            }
            Transfer::Composite {
                kind: CompositeKind::Bytes,
                ..
            } => {
                let mut pt = Self::new("c_void_p", "bytes");
                pt.needs_free = true;
                pt
            }
            Transfer::Composite { kind, elem, len } => {
                let elem = match ty.elem() {
                    Some(elem_ty) => Self::describe(elem_ty, elem),
                    None => Self::new("c_void_p", "Any"),
                };
                let owned = *kind != CompositeKind::Pointer;
                let hint = if owned {
                    format!("List[{}]", elem.py_hint)
                } else {
                    format!("Optional[{}]", elem.py_hint)
                };
                let mut pt = Self::new(&format!("POINTER({})", elem.ctypes), hint);
                pt.ctypes_return = format!("POINTER({})", elem.ctypes_return);
                pt.needs_free = owned;
                pt.nullable = !owned;
                pt.len = *len;
                pt.elem = Some(Box::new(elem));
                pt
            }
        }
    }
}

/// Maps IR types to ctypes descriptors for one package.
#[derive(Debug, Clone)]
pub struct PyTypeMapper<'r> {
    structs: &'r StructRegistry,
}

impl<'r> PyTypeMapper<'r> {
    pub fn new(structs: &'r StructRegistry) -> Self {
        Self { structs }
    }

    pub fn map_type(&self, ty: &ParsedType) -> Result<PyType, MappingError> {
        let transfer = classify(ty, self.structs)?;
        Ok(PyType::describe(ty, &transfer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map(ty: ParsedType) -> PyType {
        let reg = StructRegistry::new(["Point"]);
        PyTypeMapper::new(&reg).map_type(&ty).unwrap()
    }

    #[test]
    fn test_primitive_tokens() {
        let cases = [
            ("int", "c_longlong", "int"),
            ("int8", "c_int8", "int"),
            ("uint", "c_ulonglong", "int"),
            ("byte", "c_uint8", "int"),
            ("float32", "c_float", "float"),
            ("float64", "c_double", "float"),
            ("bool", "c_bool", "bool"),
            ("rune", "c_int32", "int"),
            ("uintptr", "c_size_t", "int"),
        ];
        for (go, ctypes, hint) in cases {
            let pt = map(ParsedType::primitive(go));
            assert_eq!((pt.ctypes.as_str(), pt.py_hint.as_str()), (ctypes, hint), "{go}");
        }
    }

    #[test]
    fn test_string_returns_void_pointer() {
        let pt = map(ParsedType::string());
        assert_eq!(pt.ctypes, "c_char_p");
        assert_eq!(pt.ctypes_return, "c_void_p");
        assert_eq!(pt.py_hint, "str");
        assert!(pt.needs_free && pt.is_string);
    }

    #[test]
    fn test_struct_hints() {
        assert_eq!(map(ParsedType::structure("Point")).py_hint, "\"Point\"");
        let ptr = map(ParsedType::pointer(ParsedType::structure("Point")));
        assert_eq!(ptr.py_hint, "Optional[\"Point\"]");
        assert_eq!(ptr.ctypes, "c_size_t");
        assert!(ptr.nullable);

        // Classes never shadow the module's own names
        let reg = StructRegistry::new(["List"]);
        let list = PyTypeMapper::new(&reg).map_type(&ParsedType::structure("List")).unwrap();
        assert_eq!(list.py_hint, "\"List_\"");

        // Unregistered types travel as raw handles
        assert_eq!(map(ParsedType::qualified("time", "Time")).py_hint, "int");
        assert_eq!(map(ParsedType::interface()).py_hint, "int");
    }

    #[test]
    fn test_composites() {
        let strings = map(ParsedType::slice(ParsedType::string()));
        assert_eq!(strings.ctypes, "POINTER(c_char_p)");
        assert_eq!(strings.ctypes_return, "POINTER(c_void_p)");
        assert_eq!(strings.py_hint, "List[str]");

        let bytes = map(ParsedType::slice(ParsedType::primitive("uint8")));
        assert_eq!(bytes.ctypes, "c_void_p");
        assert_eq!(bytes.py_hint, "bytes");

        let arr = map(ParsedType::array(ParsedType::primitive("float64"), 2));
        assert_eq!(arr.ctypes, "POINTER(c_double)");
        assert_eq!(arr.len, 2);

        let ptr = map(ParsedType::pointer(ParsedType::primitive("int")));
        assert_eq!(ptr.py_hint, "Optional[int]");
        assert!(!ptr.needs_free);
    }

    #[test]
    fn test_error_descriptor() {
        let pt = map(ParsedType::error());
        assert!(pt.is_error);
        assert_eq!(pt.ctypes, "POINTER(c_void_p)");
    }
}
