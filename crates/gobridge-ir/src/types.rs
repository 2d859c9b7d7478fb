use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The eleven type shapes the extractor distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Primitive,
    String,
    Struct,
    Slice,
    Array,
    Map,
    Pointer,
    Interface,
    Func,
    Chan,
    Error,
}

/// A resolved Go type.
///
/// Nominal types are referenced by name only, so the tree never recurses
/// through a struct definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedType {
    pub kind: TypeKind,
    /// Display name (e.g. "int", "*Point", "map[string]int")
    pub name: String,
    /// Package qualifier of a selector type (`time.Time` -> "time")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_path: Option<String>,
    /// Element type for pointers, slices, arrays and map values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elem: Option<Box<ParsedType>>,
    /// Key type for maps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Box<ParsedType>>,
    /// Length of a fixed-size array. `None` for an array whose length is a
    /// constant expression the extractor does not evaluate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

impl ParsedType {
    fn leaf(kind: TypeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            package_path: None,
            elem: None,
            key: None,
            size: None,
        }
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        Self::leaf(TypeKind::Primitive, name)
    }

    pub fn string() -> Self {
        Self::leaf(TypeKind::String, "string")
    }

    pub fn error() -> Self {
        Self::leaf(TypeKind::Error, "error")
    }

    pub fn structure(name: impl Into<String>) -> Self {
        Self::leaf(TypeKind::Struct, name)
    }

    /// A type from another package. Still classified as a struct.
    pub fn qualified(package: impl Into<String>, name: impl Into<String>) -> Self {
        let mut ty = Self::leaf(TypeKind::Struct, name);
        ty.package_path = Some(package.into());
        ty
    }

    pub fn interface() -> Self {
        Self::leaf(TypeKind::Interface, "interface{}")
    }

    pub fn pointer(elem: ParsedType) -> Self {
        let mut ty = Self::leaf(TypeKind::Pointer, format!("*{}", elem.name));
        ty.elem = Some(Box::new(elem));
        ty
    }

    pub fn slice(elem: ParsedType) -> Self {
        let mut ty = Self::leaf(TypeKind::Slice, format!("[]{}", elem.name));
        ty.elem = Some(Box::new(elem));
        ty
    }

    /// Element type of a variadic parameter, represented as a slice.
    pub fn variadic(elem: ParsedType) -> Self {
        let mut ty = Self::leaf(TypeKind::Slice, format!("...{}", elem.name));
        ty.elem = Some(Box::new(elem));
        ty
    }

    pub fn array(elem: ParsedType, size: usize) -> Self {
        let mut ty = Self::leaf(TypeKind::Array, format!("[{}]{}", size, elem.name));
        ty.elem = Some(Box::new(elem));
        ty.size = Some(size);
        ty
    }

    /// An array declared with a non-literal length such as `[N]int`.
    pub fn array_of_unknown_len(elem: ParsedType) -> Self {
        let mut ty = Self::leaf(TypeKind::Array, format!("[?]{}", elem.name));
        ty.elem = Some(Box::new(elem));
        ty
    }

    pub fn map(key: ParsedType, value: ParsedType) -> Self {
        let mut ty = Self::leaf(TypeKind::Map, format!("map[{}]{}", key.name, value.name));
        ty.key = Some(Box::new(key));
        ty.elem = Some(Box::new(value));
        ty
    }

    pub fn elem(&self) -> Option<&ParsedType> {
        self.elem.as_deref()
    }

    pub fn key(&self) -> Option<&ParsedType> {
        self.key.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.kind == TypeKind::Error
    }

    /// Whether this type, or any type nested in it, is an array of unknown
    /// length.
    pub fn has_unknown_len(&self) -> bool {
        (self.kind == TypeKind::Array && self.size.is_none())
            || self.elem().is_some_and(ParsedType::has_unknown_len)
            || self.key().is_some_and(ParsedType::has_unknown_len)
    }

    /// `[]byte` / `[]uint8`, which crosses the boundary as a raw buffer.
    pub fn is_byte_slice(&self) -> bool {
        self.kind == TypeKind::Slice
            && self.elem().is_some_and(|e| {
                e.kind == TypeKind::Primitive && matches!(e.name.as_str(), "byte" | "uint8")
            })
    }
}

/// A named (or unnamed) parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedParam {
    /// Empty for unnamed parameters
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParsedType,
}

/// Results share the parameter shape; the name may be empty.
pub type ParsedResult = ParsedParam;

impl ParsedParam {
    pub fn new(name: impl Into<String>, ty: ParsedType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn unnamed(ty: ParsedType) -> Self {
        Self::new("", ty)
    }
}

/// A borrowed view of a callable's parameters and results, shared by
/// functions and methods.
#[derive(Debug, Clone, Copy)]
pub struct Signature<'a> {
    pub params: &'a [ParsedParam],
    pub results: &'a [ParsedResult],
    pub is_variadic: bool,
}

impl Signature<'_> {
    pub fn has_error_result(&self) -> bool {
        self.results.iter().any(|r| r.ty.is_error())
    }
}

/// An exported package-level function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFunc {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc: String,
    #[serde(default)]
    pub params: Vec<ParsedParam>,
    #[serde(default)]
    pub results: Vec<ParsedResult>,
    #[serde(default)]
    pub is_variadic: bool,
}

impl ParsedFunc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: String::new(),
            params: Vec::new(),
            results: Vec::new(),
            is_variadic: false,
        }
    }

    pub fn signature(&self) -> Signature<'_> {
        Signature {
            params: &self.params,
            results: &self.results,
            is_variadic: self.is_variadic,
        }
    }
}

/// An exported method attached to an exported struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMethod {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc: String,
    #[serde(default)]
    pub receiver_name: String,
    pub receiver_type: String,
    #[serde(default)]
    pub receiver_is_ptr: bool,
    #[serde(default)]
    pub params: Vec<ParsedParam>,
    #[serde(default)]
    pub results: Vec<ParsedResult>,
    #[serde(default)]
    pub is_variadic: bool,
}

impl ParsedMethod {
    pub fn new(name: impl Into<String>, receiver_type: impl Into<String>, by_pointer: bool) -> Self {
        Self {
            name: name.into(),
            doc: String::new(),
            receiver_name: String::new(),
            receiver_type: receiver_type.into(),
            receiver_is_ptr: by_pointer,
            params: Vec::new(),
            results: Vec::new(),
            is_variadic: false,
        }
    }

    pub fn signature(&self) -> Signature<'_> {
        Signature {
            params: &self.params,
            results: &self.results,
            is_variadic: self.is_variadic,
        }
    }
}

/// A struct field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParsedType,
    /// Raw tag literal, quotes included
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    pub exported: bool,
}

impl ParsedField {
    pub fn new(name: impl Into<String>, ty: ParsedType) -> Self {
        let name = name.into();
        Self {
            exported: is_exported(&name),
            name,
            ty,
            tag: String::new(),
        }
    }
}

/// An exported struct with its exported fields and methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedStruct {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc: String,
    #[serde(default)]
    pub fields: Vec<ParsedField>,
    #[serde(default)]
    pub methods: Vec<ParsedMethod>,
}

impl ParsedStruct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: String::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn exported_fields(&self) -> impl Iterator<Item = &ParsedField> {
        self.fields.iter().filter(|f| f.exported)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }
}

/// Package-level IR. The root handed to every mapper and emitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedPackage {
    pub name: String,
    #[serde(default)]
    pub import_path: String,
    #[serde(default)]
    pub dir: PathBuf,
    #[serde(default)]
    pub functions: Vec<ParsedFunc>,
    #[serde(default)]
    pub structs: Vec<ParsedStruct>,
}

impl ParsedPackage {
    pub fn new(name: impl Into<String>, import_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            import_path: import_path.into(),
            dir: PathBuf::new(),
            functions: Vec::new(),
            structs: Vec::new(),
        }
    }

    pub fn find_function(&self, name: &str) -> Option<&ParsedFunc> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn find_struct(&self, name: &str) -> Option<&ParsedStruct> {
        self.structs.iter().find(|s| s.name == name)
    }

    /// Import path used by generated glue; falls back to the package name.
    pub fn effective_import_path(&self) -> &str {
        if self.import_path.is_empty() {
            &self.name
        } else {
            &self.import_path
        }
    }
}

/// Go's export rule: the first character is an upper-case letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}
