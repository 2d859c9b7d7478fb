//! Identifier rules shared by the emitters.

use std::collections::HashSet;

/// Words that cannot name a parameter in the cgo-generated C header.
const C_KEYWORDS: &[&str] = &[
    "auto", "char", "double", "enum", "extern", "float", "inline", "int", "long", "register",
    "restrict", "short", "signed", "sizeof", "static", "typedef", "union", "unsigned", "void",
    "volatile", "while", "do", "bool",
];

/// Names the glue itself declares inside every wrapper.
const GLUE_RESERVED: &[&str] = &["handle", "outError", "outLen", "value"];

const PY_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Module-level names of the generated Python module that a generated
/// function or class must not replace.
const PY_MODULE_NAMES: &[&str] = &[
    "os", "load_library", "free_handle", "byref", "string_at", "CDLL", "POINTER", "Any", "List",
    "Optional", "Tuple", "GoError",
];

/// Builtins the Python runtime and the generated bodies call.
const PY_BUILTINS: &[&str] = &[
    "bytes", "len", "list", "range", "getattr", "str", "int", "float", "bool", "property",
    "classmethod", "object", "super", "type", "Exception", "OSError", "ValueError",
];

/// `helloWorld` -> `hello_world`. Every upper-case letter after the first
/// character starts a new word, so `HTTPServer` -> `h_t_t_p_server`.
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() && i > 0 {
            result.push('_');
        }
        result.extend(ch.to_lowercase());
    }
    result
}

/// Upper-case the first character: `head` -> `Head`.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Parameter name safe for the C header. Unnamed and blank parameters get a
/// positional name; keywords and glue-reserved names get a `_` suffix.
pub fn c_param_name(name: &str, index: usize) -> String {
    if name.is_empty() || name == "_" {
        return format!("arg{index}");
    }
    if C_KEYWORDS.contains(&name) || GLUE_RESERVED.contains(&name) {
        format!("{name}_")
    } else {
        name.to_string()
    }
}

/// Python-safe identifier: keywords get a `_` suffix.
pub fn py_ident(name: &str) -> String {
    if PY_KEYWORDS.contains(&name) {
        format!("{name}_")
    } else {
        name.to_string()
    }
}

/// Append `_` to `name` until it is neither reserved nor claimed earlier,
/// then claim it.
pub fn claim(name: &str, reserved: impl Fn(&str) -> bool, taken: &mut HashSet<String>) -> String {
    let mut name = name.to_string();
    while reserved(&name) || taken.contains(&name) {
        name.push('_');
    }
    taken.insert(name.clone());
    name
}

/// Whether a Python identifier would shadow an import, a runtime helper or
/// a builtin the generated module relies on. `c_*` covers every ctypes type.
pub fn is_py_reserved(name: &str) -> bool {
    PY_MODULE_NAMES.contains(&name)
        || PY_BUILTINS.contains(&name)
        || name.starts_with("c_")
        || name.starts_with('_')
}

/// Python class name of a Go struct: `List` -> `List_`, `None` -> `None_`.
pub fn py_class_name(name: &str) -> String {
    let name = py_ident(name);
    if is_py_reserved(&name) {
        format!("{name}_")
    } else {
        name
    }
}

/// A Go package name that can be imported: a non-blank identifier.
pub fn is_go_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_alphabetic() => {
            chars.all(|c| c == '_' || c.is_alphanumeric())
        }
        _ => false,
    }
}
