//! Type Mapping Engine.
//!
//! Every [`ParsedType`] decomposes into one [`Transfer`] strategy. The C and
//! Python mappers render the same strategy with their own wire tokens, so
//! both artifacts agree on representation and ownership.

pub mod c;
pub mod python;

use gobridge_ir::{ParsedPackage, ParsedType, TypeKind, UnsupportedType};
use indexmap::IndexSet;
use thiserror::Error;

pub use c::{CType, CTypeMapper};
pub use python::{PyType, PyTypeMapper};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedType),

    #[error("malformed type: {0}")]
    Malformed(&'static str),
}

/// A fixed-width primitive and its wire tokens.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Primitive {
    /// Go spelling (also the conversion used on the Go side)
    pub go: &'static str,
    /// cgo spelling
    pub c: &'static str,
    /// ctypes class
    pub ctypes: &'static str,
    /// Python type hint
    pub py: &'static str,
}

const fn prim(go: &'static str, c: &'static str, ctypes: &'static str, py: &'static str) -> Primitive {
    Primitive { go, c, ctypes, py }
}

static PRIMITIVES: &[Primitive] = &[
    prim("int", "C.longlong", "c_longlong", "int"),
    prim("int8", "C.int8_t", "c_int8", "int"),
    prim("int16", "C.int16_t", "c_int16", "int"),
    prim("int32", "C.int32_t", "c_int32", "int"),
    prim("int64", "C.int64_t", "c_int64", "int"),
    prim("uint", "C.ulonglong", "c_ulonglong", "int"),
    prim("uint8", "C.uint8_t", "c_uint8", "int"),
    prim("byte", "C.uint8_t", "c_uint8", "int"),
    prim("uint16", "C.uint16_t", "c_uint16", "int"),
    prim("uint32", "C.uint32_t", "c_uint32", "int"),
    prim("uint64", "C.uint64_t", "c_uint64", "int"),
    prim("uintptr", "C.uintptr_t", "c_size_t", "int"),
    prim("rune", "C.int32_t", "c_int32", "int"),
    prim("float32", "C.float", "c_float", "float"),
    prim("float64", "C.double", "c_double", "float"),
    prim("bool", "C.bool", "c_bool", "bool"),
];

/// Look up a primitive by its Go name. Unknown names (including the complex
/// types) fall back to `int`.
pub fn primitive(name: &str) -> &'static Primitive {
    PRIMITIVES
        .iter()
        .find(|p| p.go == name)
        .unwrap_or(&PRIMITIVES[0])
}

/// Names of the structs declared in the package being generated.
#[derive(Debug, Clone, Default)]
pub struct StructRegistry {
    names: IndexSet<String>,
}

impl StructRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_package(pkg: &ParsedPackage) -> Self {
        Self::new(pkg.structs.iter().map(|s| s.name.clone()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// What a handle refers to on the Go side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleKind {
    /// A named type. `known` when the package declares it as a struct.
    Struct {
        name: String,
        package: Option<String>,
        known: bool,
    },
    Map,
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeKind {
    /// `[]byte`, a raw buffer
    Bytes,
    Slice,
    Array,
    /// Pointer to something other than a known struct
    Pointer,
}

/// The four transfer strategies, plus the out-of-band error channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    Value(&'static Primitive),
    OwnedString,
    Handle {
        kind: HandleKind,
        /// Pointer-to-known-struct: zero is a valid (nil) handle
        nullable: bool,
    },
    Composite {
        kind: CompositeKind,
        elem: Box<Transfer>,
        /// Array length, zero otherwise
        len: usize,
    },
    ErrorOut,
}

impl Transfer {
    pub fn is_handle(&self) -> bool {
        matches!(self, Transfer::Handle { .. })
    }

    /// Name of the package struct this handle wraps, if any.
    pub fn known_struct(&self) -> Option<&str> {
        match self {
            Transfer::Handle {
                kind: HandleKind::Struct { name, known: true, .. },
                ..
            } => Some(name),
            _ => None,
        }
    }

    /// Whether the consumer owns memory produced by the glue.
    pub fn needs_free(&self) -> bool {
        matches!(self, Transfer::OwnedString | Transfer::ErrorOut)
            || matches!(
                self,
                Transfer::Composite {
                    kind: CompositeKind::Bytes | CompositeKind::Slice | CompositeKind::Array,
                    ..
                }
            )
    }
}

/// Classify a type into its transfer strategy.
pub fn classify(ty: &ParsedType, structs: &StructRegistry) -> Result<Transfer, MappingError> {
    match ty.kind {
        TypeKind::Primitive => Ok(Transfer::Value(primitive(&ty.name))),
        TypeKind::String => Ok(Transfer::OwnedString),
        TypeKind::Error => Ok(Transfer::ErrorOut),
        TypeKind::Struct => Ok(Transfer::Handle {
            kind: struct_handle(ty, structs),
            nullable: false,
        }),
        TypeKind::Map => Ok(Transfer::Handle {
            kind: HandleKind::Map,
            nullable: false,
        }),
        TypeKind::Interface => Ok(Transfer::Handle {
            kind: HandleKind::Interface,
            nullable: false,
        }),
        TypeKind::Pointer => {
            let elem = ty.elem().ok_or(MappingError::Malformed("pointer without element"))?;
            if elem.kind == TypeKind::Struct && is_known(elem, structs) {
                return Ok(Transfer::Handle {
                    kind: struct_handle(elem, structs),
                    nullable: true,
                });
            }
            composite(CompositeKind::Pointer, elem, 0, structs)
        }
        TypeKind::Slice => {
            let elem = ty.elem().ok_or(MappingError::Malformed("slice without element"))?;
            let kind = if ty.is_byte_slice() {
                CompositeKind::Bytes
            } else {
                CompositeKind::Slice
            };
            composite(kind, elem, 0, structs)
        }
        TypeKind::Array => {
            let elem = ty.elem().ok_or(MappingError::Malformed("array without element"))?;
            let len = ty
                .size
                .ok_or(MappingError::Malformed("array length is not a literal"))?;
            composite(CompositeKind::Array, elem, len, structs)
        }
        TypeKind::Chan => Err(UnsupportedType::channel().into()),
        TypeKind::Func => Err(UnsupportedType::function().into()),
    }
}

fn composite(
    kind: CompositeKind,
    elem: &ParsedType,
    len: usize,
    structs: &StructRegistry,
) -> Result<Transfer, MappingError> {
    Ok(Transfer::Composite {
        kind,
        elem: Box::new(classify(elem, structs)?),
        len,
    })
}

fn is_known(ty: &ParsedType, structs: &StructRegistry) -> bool {
    ty.package_path.is_none() && structs.contains(&ty.name)
}

fn struct_handle(ty: &ParsedType, structs: &StructRegistry) -> HandleKind {
    HandleKind::Struct {
        name: ty.name.clone(),
        package: ty.package_path.clone(),
        known: is_known(ty, structs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> StructRegistry {
        StructRegistry::new(["Point"])
    }

    #[test]
    fn test_primitive_table() {
        assert_eq!(primitive("int").c, "C.longlong");
        assert_eq!(primitive("byte").c, "C.uint8_t");
        assert_eq!(primitive("rune").ctypes, "c_int32");
        assert_eq!(primitive("uintptr").ctypes, "c_size_t");
        assert_eq!(primitive("float32").py, "float");
        // complex64 has no wire form; it falls back like any unknown name
        assert_eq!(primitive("complex64"), primitive("int"));
    }

    #[test]
    fn test_primitive_mapping_is_pure() {
        let ty = ParsedType::primitive("uint16");
        assert_eq!(
            classify(&ty, &registry()).unwrap(),
            classify(&ty, &registry()).unwrap()
        );
    }

    #[test]
    fn test_struct_is_handle_by_value_and_pointer() {
        let reg = registry();
        let by_value = classify(&ParsedType::structure("Point"), &reg).unwrap();
        let by_ptr = classify(&ParsedType::pointer(ParsedType::structure("Point")), &reg).unwrap();

        assert!(matches!(by_value, Transfer::Handle { nullable: false, .. }));
        assert!(matches!(by_ptr, Transfer::Handle { nullable: true, .. }));
        assert_eq!(by_value.known_struct(), Some("Point"));
        assert_eq!(by_ptr.known_struct(), Some("Point"));
    }

    #[test]
    fn test_unknown_struct_is_still_a_handle() {
        let ty = ParsedType::qualified("time", "Time");
        let transfer = classify(&ty, &registry()).unwrap();
        assert_eq!(
            transfer,
            Transfer::Handle {
                kind: HandleKind::Struct {
                    name: "Time".into(),
                    package: Some("time".into()),
                    known: false,
                },
                nullable: false,
            }
        );
        assert_eq!(transfer.known_struct(), None);
    }

    #[test]
    fn test_pointer_to_unknown_is_composite() {
        let ty = ParsedType::pointer(ParsedType::primitive("int"));
        assert!(matches!(
            classify(&ty, &registry()).unwrap(),
            Transfer::Composite {
                kind: CompositeKind::Pointer,
                ..
            }
        ));
    }

    #[test]
    fn test_composites() {
        let reg = registry();
        let bytes = classify(&ParsedType::slice(ParsedType::primitive("byte")), &reg).unwrap();
        assert!(matches!(bytes, Transfer::Composite { kind: CompositeKind::Bytes, .. }));
        assert!(bytes.needs_free());

        let arr = classify(&ParsedType::array(ParsedType::primitive("int"), 4), &reg).unwrap();
        assert!(matches!(arr, Transfer::Composite { kind: CompositeKind::Array, len: 4, .. }));

        let points = classify(&ParsedType::slice(ParsedType::structure("Point")), &reg).unwrap();
        match points {
            Transfer::Composite { elem, .. } => assert_eq!(elem.known_struct(), Some("Point")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_maps_and_interfaces_are_handles() {
        let reg = registry();
        let map = ParsedType::map(ParsedType::string(), ParsedType::primitive("int"));
        assert!(classify(&map, &reg).unwrap().is_handle());
        assert!(classify(&ParsedType::interface(), &reg).unwrap().is_handle());
    }

    #[test]
    fn test_error_is_out_of_band() {
        assert_eq!(
            classify(&ParsedType::error(), &registry()).unwrap(),
            Transfer::ErrorOut
        );
    }

    #[test]
    fn test_rejects_chan_and_func() {
        let mut chan = ParsedType::primitive("chan int");
        chan.kind = TypeKind::Chan;
        let err = classify(&chan, &registry()).unwrap_err();
        assert_eq!(err, MappingError::Unsupported(UnsupportedType::channel()));

        let mut func = ParsedType::primitive("func()");
        func.kind = TypeKind::Func;
        assert!(matches!(
            classify(&func, &registry()),
            Err(MappingError::Unsupported(_))
        ));
    }

    #[test]
    fn test_malformed_composite() {
        let mut slice = ParsedType::slice(ParsedType::primitive("int"));
        slice.elem = None;
        assert_eq!(
            classify(&slice, &registry()).unwrap_err(),
            MappingError::Malformed("slice without element")
        );
    }
}
