//! Declaration-level syntax tree for one Go source file.
//!
//! Only what the extractor inspects is modelled: function and type
//! declarations with their type expressions. Imports, constants, variables
//! and function bodies are consumed by the parser and not kept.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub package: String,
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decl {
    Func(FuncDecl),
    Type(TypeDecl),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    pub doc: String,
    pub line: usize,
    pub recv: Option<Field>,
    pub name: String,
    /// Declares its own type parameters (`func Map[T any](...)`)
    pub generic: bool,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
}

/// A `type` declaration, either a single spec or a parenthesized group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub doc: String,
    pub specs: Vec<TypeSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec {
    /// Only set for specs inside a group
    pub doc: String,
    pub name: String,
    pub generic: bool,
    /// `type A = B`
    pub alias: bool,
    pub ty: TypeExpr,
}

/// A parameter, result or struct field. `names` is empty for unnamed
/// parameters and embedded fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub names: Vec<String>,
    pub ty: TypeExpr,
    pub tag: Option<String>,
}

impl Field {
    pub fn unnamed(ty: TypeExpr) -> Self {
        Self {
            names: Vec::new(),
            ty,
            tag: None,
        }
    }

    pub fn named(names: Vec<String>, ty: TypeExpr) -> Self {
        Self {
            names,
            ty,
            tag: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Ident(String),
    Selector {
        package: String,
        name: String,
    },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array {
        /// `None` when the length is not a plain decimal literal
        len: Option<usize>,
        elem: Box<TypeExpr>,
    },
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    Chan {
        dir: ChanDir,
        elem: Box<TypeExpr>,
    },
    Func {
        params: Vec<Field>,
        results: Vec<Field>,
    },
    Interface {
        empty: bool,
    },
    Struct(Vec<Field>),
    /// `...T` in the last parameter position
    Ellipsis(Box<TypeExpr>),
    /// An instantiation such as `List[int]`
    Generic {
        base: Box<TypeExpr>,
        args: Vec<TypeExpr>,
    },
}

impl TypeExpr {
    pub fn ident(name: &str) -> Self {
        TypeExpr::Ident(name.to_string())
    }

    /// Name of the base type: `*pkg.Base` -> `Base`.
    pub fn base_name(&self) -> Option<&str> {
        match self {
            TypeExpr::Ident(name) => Some(name),
            TypeExpr::Selector { name, .. } => Some(name),
            TypeExpr::Pointer(inner) => inner.base_name(),
            TypeExpr::Generic { base, .. } => base.base_name(),
            _ => None,
        }
    }
}
