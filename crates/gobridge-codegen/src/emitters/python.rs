//! Python emitter: a ctypes module binding the cgo entry points.

use std::collections::{BTreeSet, HashSet};

use gobridge_ir::ParsedPackage;

use super::{FuncSurface, StructSurface, Surface};
use crate::abi::{CallPlan, Shape, Slot};
use crate::context::{EmitContext, IndentStyle};
use crate::error::CodegenError;
use crate::generator::validate_package;
use crate::mapping::{PyType, StructRegistry, Transfer};
use crate::naming::{claim, is_py_reserved, py_class_name, py_ident, to_snake_case};
use crate::packaging::{pyproject_toml, BuildSystem};
use crate::traits::{Plugin, PluginOptions};

/// Members every generated class defines for itself.
const CLASS_MEMBERS: &[&str] = &["free", "_handle", "_from_handle", "property", "classmethod"];

const RUNTIME: &str = r#"def load_library() -> CDLL:
    """Load the shared library, trying .so, .dylib and .dll in turn."""
    here = os.path.dirname(os.path.abspath(__file__))
    for ext in (".so", ".dylib", ".dll"):
        path = os.path.join(here, _LIB_NAME + ext)
        if os.path.exists(path):
            return CDLL(path)
    for ext in (".so", ".dylib", ".dll"):
        try:
            return CDLL(_LIB_NAME + ext)
        except OSError:
            continue
    raise OSError(f"cannot load {_LIB_NAME}: no .so, .dylib or .dll found")


_lib = load_library()
_lib.Free_String.argtypes = [c_void_p]
_lib.Free_String.restype = None
_lib.Free_Bytes.argtypes = [c_void_p]
_lib.Free_Bytes.restype = None
_lib.Free_Handle.argtypes = [c_size_t]
_lib.Free_Handle.restype = None


class GoError(Exception):
    """An error returned by the Go side."""


def _encode_string(value: Optional[str]) -> Optional[bytes]:
    if value is None:
        return None
    return value.encode("utf-8")


def _decode_string(ptr: Optional[int]) -> str:
    """Copy a C string allocated by Go and release it."""
    if not ptr:
        return ""
    try:
        return string_at(ptr).decode("utf-8")
    finally:
        _lib.Free_String(ptr)


def _check_error(err: c_void_p) -> None:
    if err.value:
        raise GoError(_decode_string(err.value))


def _make_array(ctype: Any, values: Any) -> Tuple[Any, int]:
    items = list(values or [])
    return (ctype * len(items))(*items), len(items)


def _fixed_array(ctype: Any, size: int, values: Any) -> Any:
    items = list(values or [])
    if len(items) != size:
        raise ValueError(f"expected {size} elements, got {len(items)}")
    return (ctype * size)(*items)


def _take_buffer(ptr: Any, length: int, convert: Any = None) -> List[Any]:
    """Copy an array allocated by Go and release it."""
    if not ptr:
        return []
    try:
        items = [ptr[i] for i in range(length)]
    finally:
        _lib.Free_Bytes(ptr)
    if convert is None:
        return items
    return [convert(item) for item in items]


def _take_bytes(ptr: Optional[int], length: int) -> bytes:
    if not ptr:
        return b""
    try:
        return string_at(ptr, length)
    finally:
        _lib.Free_Bytes(ptr)


def _handle_of(obj: Any) -> int:
    if obj is None:
        return 0
    return obj._handle


def free_handle(handle: int) -> None:
    """Release a raw handle returned for a map, interface or foreign type."""
    if handle:
        _lib.Free_Handle(handle)
"#;

/// The Python ctypes plugin.
#[derive(Debug, Clone, Default)]
pub struct PythonPlugin {
    verbose: bool,
    library_name: Option<String>,
    build_system: BuildSystem,
}

impl PythonPlugin {
    pub fn new(opts: &PluginOptions) -> Self {
        Self {
            verbose: opts.verbose,
            library_name: opts.library_name.clone(),
            build_system: opts.build_system,
        }
    }

    pub fn factory(opts: &PluginOptions) -> Box<dyn Plugin> {
        Box::new(Self::new(opts))
    }

    fn library(&self, pkg: &ParsedPackage) -> String {
        PluginOptions {
            library_name: self.library_name.clone(),
            ..Default::default()
        }
        .library_name_for(&pkg.name)
    }
}

impl Plugin for PythonPlugin {
    fn name(&self) -> &str {
        "python"
    }

    fn generate(&self, pkg: &ParsedPackage) -> Result<Vec<u8>, CodegenError> {
        validate_package(pkg)?;
        let emitter = PyEmitter::new(pkg, self.library(pkg));
        Ok(emitter.emit(self.verbose).into_bytes())
    }

    fn default_output(&self, pkg: &ParsedPackage) -> String {
        format!("{}.py", pkg.name)
    }

    fn packaged_output(&self, pkg: &ParsedPackage) -> String {
        format!("{0}/{0}.py", pkg.name)
    }

    fn companion_files(&self, pkg: &ParsedPackage) -> Vec<(String, String)> {
        vec![
            (
                "pyproject.toml".to_string(),
                pyproject_toml(&pkg.name, &self.library(pkg), self.build_system),
            ),
            (
                format!("{}/__init__.py", pkg.name),
                format!("from .{} import *  # noqa: F401,F403\n", pkg.name),
            ),
        ]
    }
}

struct PyEmitter<'p> {
    pkg: &'p ParsedPackage,
    library: String,
    structs: StructRegistry,
    /// argtypes/restype declarations
    protos: EmitContext,
    /// classes and functions
    body: EmitContext,
    ctypes: BTreeSet<String>,
    /// Module-level function names handed out so far
    functions: HashSet<String>,
}

impl<'p> PyEmitter<'p> {
    fn new(pkg: &'p ParsedPackage, library: String) -> Self {
        let ctypes = ["CDLL", "c_size_t", "c_void_p", "string_at"]
            .into_iter()
            .map(String::from)
            .collect();
        Self {
            pkg,
            library,
            structs: StructRegistry::from_package(pkg),
            protos: EmitContext::new(IndentStyle::Spaces(4)),
            body: EmitContext::new(IndentStyle::Spaces(4)),
            ctypes,
            functions: HashSet::new(),
        }
    }

    fn emit(mut self, verbose: bool) -> String {
        let surface = Surface::build(self.pkg, &self.structs, "python", verbose);
        for s in &surface.structs {
            self.emit_class(s);
        }
        for f in &surface.functions {
            self.emit_function(f);
        }

        let mut out = format!(
            "# Code generated by gobridge from {}. DO NOT EDIT.\n",
            self.pkg.effective_import_path()
        );
        out.push_str(&format!(
            "\"\"\"Python bindings for the {} Go package.\"\"\"\n\n",
            self.pkg.name
        ));
        out.push_str("import os\n");
        out.push_str("from ctypes import (\n");
        for name in &self.ctypes {
            out.push_str(&format!("    {name},\n"));
        }
        out.push_str(")\n");
        out.push_str("from typing import Any, List, Optional, Tuple\n\n");
        out.push_str(&format!("_LIB_NAME = \"{}\"\n\n\n", self.library));
        out.push_str(RUNTIME);
        if !self.protos.output().is_empty() {
            out.push('\n');
            out.push_str(self.protos.output());
        }
        out.push_str(self.body.output());
        out
    }

    /// Record every ctypes name a token such as `POINTER(c_int)` uses.
    fn note(&mut self, token: &str) {
        for word in token.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
            if word == "POINTER" || word == "byref" || word.starts_with("c_") {
                self.ctypes.insert(word.to_string());
            }
        }
    }

    fn declare(&mut self, entry: &str, method: bool, plan: &CallPlan) {
        let mut args = Vec::new();
        if method {
            args.push("c_size_t".to_string());
        }
        for slot in &plan.params {
            args.push(py_type(slot).ctypes);
            if slot.shape == Shape::Buffer {
                args.push("c_int".to_string());
            }
        }
        let restype = match plan.returned() {
            Some(slot) => {
                if slot.shape == Shape::Buffer {
                    args.push("POINTER(c_int)".to_string());
                }
                py_type(slot).ctypes_return
            }
            None => {
                for slot in &plan.results {
                    args.push(format!("POINTER({})", py_type(slot).ctypes_return));
                    if slot.shape == Shape::Buffer {
                        args.push("POINTER(c_int)".to_string());
                    }
                }
                "None".to_string()
            }
        };
        if plan.has_error() {
            args.push("POINTER(c_void_p)".to_string());
        }
        self.prototype(entry, &args, &restype);
    }

    fn prototype(&mut self, entry: &str, args: &[String], restype: &str) {
        let args = args.join(", ");
        self.note(&args);
        self.note(restype);
        self.protos
            .line(format!("_lib.{entry}.argtypes = [{args}]"));
        self.protos.line(format!("_lib.{entry}.restype = {restype}"));
    }

    fn emit_function(&mut self, f: &FuncSurface<'_>) {
        let entry = format!("{}_{}", self.pkg.name, f.func.name);
        self.declare(&entry, false, &f.plan);

        let name = claim(
            &py_ident(&to_snake_case(&f.func.name)),
            is_py_reserved,
            &mut self.functions,
        );
        let names = param_names(&f.plan, &self.structs);
        let params = typed_params(&f.plan, &names);

        self.body.blank();
        self.body.blank();
        self.body.line(format!(
            "def {name}({}) -> {}:",
            params.join(", "),
            return_hint(&f.plan)
        ));
        self.body.push_indent();
        docstring(&mut self.body, &f.func.doc);
        self.emit_call(&entry, false, &f.plan, &names);
        self.body.pop_indent();
    }

    fn emit_class(&mut self, s: &StructSurface<'_>) {
        let name = &s.def.name;
        let class = py_class_name(name);

        // Fields and methods share the class namespace with the generated
        // members, so each gets a name nothing else in the class holds.
        let mut members: HashSet<String> = CLASS_MEMBERS.iter().map(|m| m.to_string()).collect();
        let no_reserved = |_: &str| false;
        let props: Vec<Option<String>> = s
            .fields
            .iter()
            .map(|f| {
                f.getter.as_ref().map(|_| {
                    claim(&py_ident(&to_snake_case(&f.field.name)), no_reserved, &mut members)
                })
            })
            .collect();
        let methods: Vec<String> = s
            .methods
            .iter()
            .map(|m| claim(&py_ident(&to_snake_case(&m.method.name)), no_reserved, &mut members))
            .collect();

        self.prototype(&format!("{name}_New"), &[], "c_size_t");
        self.prototype(&format!("{name}_Free"), &["c_size_t".to_string()], "None");
        for f in &s.fields {
            if let Some(plan) = &f.getter {
                self.declare(&format!("{name}_Get{}", f.field.name), true, plan);
            }
            if let Some(plan) = &f.setter {
                self.declare(&format!("{name}_Set{}", f.field.name), true, plan);
            }
        }
        for m in &s.methods {
            self.declare(&format!("{name}_{}", m.method.name), true, &m.plan);
        }

        let b = &mut self.body;
        b.blank();
        b.blank();
        b.line(format!("class {class}:"));
        b.push_indent();
        if s.def.doc.trim().is_empty() {
            docstring(b, &format!("Handle to a Go {name}."));
        } else {
            docstring(b, &s.def.doc);
        }
        b.blank();
        b.block(
            "def __init__(self, _handle: Optional[int] = None) -> None:",
            "",
            |b| b.line(format!("self._handle = _lib.{name}_New() if _handle is None else _handle")),
        );
        b.blank();
        b.line("@classmethod");
        b.block(
            format!("def _from_handle(cls, handle: Optional[int]) -> Optional[\"{class}\"]:"),
            "",
            |b| {
                b.block("if not handle:", "", |b| b.line("return None"));
                b.line("return cls(_handle=handle)");
            },
        );
        b.blank();
        b.block("def free(self) -> None:", "", |b| {
            docstring(b, "Release the Go object. Safe to call more than once.");
            b.line("handle = getattr(self, \"_handle\", 0)");
            b.block("if handle:", "", |b| {
                b.line("self._handle = 0");
                b.line(format!("_lib.{name}_Free(handle)"));
            });
        });
        b.blank();
        b.block("def __del__(self) -> None:", "", |b| {
            b.block("try:", "", |b| b.line("self.free()"));
            b.block("except Exception:", "", |b| b.line("pass"));
        });
        if !s.methods.is_empty() {
            b.blank();
            b.block(format!("def __enter__(self) -> \"{class}\":"), "", |b| b.line("return self"));
            b.blank();
            b.block("def __exit__(self, *exc: Any) -> None:", "", |b| b.line("self.free()"));
        }

        for (f, prop) in s.fields.iter().zip(&props) {
            let (Some(getter), Some(prop)) = (&f.getter, prop) else { continue };
            let hint = return_hint(getter);
            self.body.blank();
            self.body.line("@property");
            self.body.line(format!("def {prop}(self) -> {hint}:"));
            self.body.push_indent();
            self.emit_call(&format!("{name}_Get{}", f.field.name), true, getter, &[]);
            self.body.pop_indent();

            // Composite fields are read-only: assigning would hand Go a
            // buffer Python still owns.
            let Some(setter) = &f.setter else { continue };
            if setter.params[0].shape != Shape::Scalar {
                continue;
            }
            let value_hint = py_type(&setter.params[0]).py_hint;
            self.body.blank();
            self.body.line(format!("@{prop}.setter"));
            self.body
                .line(format!("def {prop}(self, value: {value_hint}) -> None:"));
            self.body.push_indent();
            self.emit_call(
                &format!("{name}_Set{}", f.field.name),
                true,
                setter,
                &["value".to_string()],
            );
            self.body.pop_indent();
        }

        for (m, method) in s.methods.iter().zip(&methods) {
            let names = param_names(&m.plan, &self.structs);
            let mut params = vec!["self".to_string()];
            params.extend(typed_params(&m.plan, &names));
            self.body.blank();
            self.body.line(format!(
                "def {method}({}) -> {}:",
                params.join(", "),
                return_hint(&m.plan)
            ));
            self.body.push_indent();
            docstring(&mut self.body, &m.method.doc);
            self.emit_call(&format!("{name}_{}", m.method.name), true, &m.plan, &names);
            self.body.pop_indent();
        }
        self.body.pop_indent();
    }

    /// Emit the body that converts arguments, calls `entry` and converts
    /// the results back.
    fn emit_call(&mut self, entry: &str, method: bool, plan: &CallPlan, names: &[String]) {
        let mut args = Vec::new();
        if method {
            args.push("self._handle".to_string());
        }
        for (slot, name) in plan.params.iter().zip(names) {
            let converted = self.param_to_c(slot, name);
            args.extend(converted);
        }

        match plan.returned() {
            Some(slot) if slot.shape == Shape::Buffer => {
                self.note("c_int byref");
                self.body.line("_len = c_int()");
                args.push("byref(_len)".to_string());
            }
            Some(_) => {}
            None => {
                for slot in &plan.results {
                    let local = format!("_{}", slot.name);
                    let pt = py_type(slot);
                    self.note(&pt.ctypes_return);
                    self.note("byref");
                    self.body.line(format!("{local} = {}()", pt.ctypes_return));
                    args.push(format!("byref({local})"));
                    if slot.shape == Shape::Buffer {
                        self.note("c_int");
                        self.body.line(format!("{local}_len = c_int()"));
                        args.push(format!("byref({local}_len)"));
                    }
                }
            }
        }
        if plan.has_error() {
            self.note("byref");
            self.body.line("_err = c_void_p()");
            args.push("byref(_err)".to_string());
        }

        let call = format!("_lib.{entry}({})", args.join(", "));
        if let Some(slot) = plan.returned() {
            let value = self.result_from_c(slot, "_res", "_len.value");
            if value == "_res" {
                self.body.line(format!("return {call}"));
            } else {
                self.body.line(format!("_res = {call}"));
                self.body.line(format!("return {value}"));
            }
            return;
        }

        self.body.line(call);
        if plan.has_error() {
            self.body.line("_check_error(_err)");
        }
        let values: Vec<String> = plan
            .results
            .iter()
            .map(|slot| {
                let local = format!("_{}", slot.name);
                match slot.shape {
                    Shape::Scalar | Shape::Pointer => {
                        self.result_from_c(slot, &format!("{local}.value"), "")
                    }
                    Shape::Buffer if slot.is_bytes() => {
                        self.result_from_c(slot, &format!("{local}.value"), &format!("{local}_len.value"))
                    }
                    _ => self.result_from_c(slot, &local, &format!("{local}_len.value")),
                }
            })
            .collect();
        if !values.is_empty() {
            self.body.line(format!("return {}", values.join(", ")));
        }
    }

    /// Convert one Python argument; returns the C argument expressions.
    fn param_to_c(&mut self, slot: &Slot, name: &str) -> Vec<String> {
        let local = format!("_{name}");
        match slot.shape {
            Shape::Scalar => vec![scalar_to_c(&slot.transfer, name)],
            Shape::Buffer if slot.is_bytes() => {
                self.body.line(format!("{local} = bytes({name} or b\"\")"));
                vec![local.clone(), format!("len({local})")]
            }
            Shape::Buffer | Shape::Fixed(_) => {
                let Some((elem_ty, elem)) = slot.elem() else {
                    return vec!["None".to_string()];
                };
                let ctype = PyType::describe(elem_ty, elem).ctypes;
                self.note(&ctype);
                let conv = scalar_to_c(elem, "v");
                let items = if conv == "v" {
                    name.to_string()
                } else {
                    format!("[{conv} for v in ({name} or [])]")
                };
                match slot.shape {
                    Shape::Fixed(n) => {
                        self.body
                            .line(format!("{local} = _fixed_array({ctype}, {n}, {items})"));
                        vec![local]
                    }
                    _ => {
                        self.body.line(format!(
                            "{local}, {local}_len = _make_array({ctype}, {items})"
                        ));
                        vec![local.clone(), format!("{local}_len")]
                    }
                }
            }
            Shape::Pointer => {
                let ctype = py_type(slot)
                    .elem
                    .map(|elem| elem.ctypes)
                    .unwrap_or_else(|| "c_longlong".to_string());
                self.note(&ctype);
                self.note("byref");
                self.body.line(format!(
                    "{local} = None if {name} is None else byref({ctype}({name}))"
                ));
                vec![local]
            }
        }
    }

    /// Python value of a result. `len` is the element count expression for
    /// buffers.
    fn result_from_c(&mut self, slot: &Slot, expr: &str, len: &str) -> String {
        match slot.shape {
            Shape::Scalar | Shape::Pointer => scalar_from_c(&slot.transfer, expr),
            Shape::Buffer if slot.is_bytes() => format!("_take_bytes({expr}, {len})"),
            Shape::Buffer | Shape::Fixed(_) => {
                let count = match slot.shape {
                    Shape::Fixed(n) => n.to_string(),
                    _ => len.to_string(),
                };
                match slot.elem().and_then(|(_, elem)| elem_converter(elem)) {
                    Some(conv) => format!("_take_buffer({expr}, {count}, {conv})"),
                    None => format!("_take_buffer({expr}, {count})"),
                }
            }
        }
    }
}

fn py_type(slot: &Slot) -> PyType {
    PyType::describe(&slot.ty, &slot.transfer)
}

/// Python parameter names. A name that would shadow something the body
/// calls, or whose `_` local would clash with a result local, gets a `_`
/// suffix.
fn param_names(plan: &CallPlan, structs: &StructRegistry) -> Vec<String> {
    let reserved = |name: &str| {
        is_py_reserved(name) || matches!(name, "self" | "res" | "err") || structs.contains(name)
    };
    let mut taken: HashSet<String> = plan.results.iter().map(|r| r.name.clone()).collect();
    plan.params
        .iter()
        .map(|slot| claim(&py_ident(&slot.name), reserved, &mut taken))
        .collect()
}

fn typed_params(plan: &CallPlan, names: &[String]) -> Vec<String> {
    plan.params
        .iter()
        .zip(names)
        .map(|(slot, name)| format!("{name}: {}", py_type(slot).py_hint))
        .collect()
}

fn return_hint(plan: &CallPlan) -> String {
    let hints: Vec<String> = plan.results.iter().map(|r| py_type(r).py_hint).collect();
    match hints.len() {
        0 => "None".to_string(),
        1 => hints[0].clone(),
        _ => format!("Tuple[{}]", hints.join(", ")),
    }
}

fn scalar_to_c(transfer: &Transfer, expr: &str) -> String {
    match transfer {
        Transfer::OwnedString => format!("_encode_string({expr})"),
        t if t.known_struct().is_some() => format!("_handle_of({expr})"),
        _ => expr.to_string(),
    }
}

fn scalar_from_c(transfer: &Transfer, expr: &str) -> String {
    match elem_converter(transfer) {
        Some(conv) => format!("{conv}({expr})"),
        None => expr.to_string(),
    }
}

/// Function turning a raw C value into its Python value, if not identity.
fn elem_converter(transfer: &Transfer) -> Option<String> {
    match transfer {
        Transfer::OwnedString => Some("_decode_string".to_string()),
        t => t
            .known_struct()
            .map(|name| format!("{}._from_handle", py_class_name(name))),
    }
}

fn docstring(ctx: &mut EmitContext, doc: &str) {
    let doc = doc.trim();
    if doc.is_empty() {
        return;
    }
    let mut doc = doc.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"");
    if doc.ends_with('"') {
        doc.push(' ');
    }
    let mut lines = doc.lines();
    let first = lines.next().unwrap_or_default();
    let rest: Vec<&str> = lines.collect();
    if rest.is_empty() {
        ctx.line(format!("\"\"\"{first}\"\"\""));
    } else {
        ctx.line(format!("\"\"\"{first}"));
        for line in rest {
            ctx.line(line.trim_end());
        }
        ctx.line("\"\"\"");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobridge_ir::{ParsedField, ParsedFunc, ParsedMethod, ParsedParam, ParsedStruct, ParsedType};

    fn generate(pkg: &ParsedPackage) -> String {
        String::from_utf8(PythonPlugin::default().generate(pkg).unwrap()).unwrap()
    }

    fn func(name: &str, params: Vec<ParsedParam>, results: Vec<ParsedParam>) -> ParsedFunc {
        let mut f = ParsedFunc::new(name);
        f.params = params;
        f.results = results;
        f
    }

    fn int() -> ParsedType {
        ParsedType::primitive("int")
    }

    #[test]
    fn test_module_skeleton() {
        let out = generate(&ParsedPackage::new("geo", "example.com/geo"));
        assert!(out.contains("from ctypes import ("));
        assert!(out.contains("_LIB_NAME = \"libgeo\""));
        assert!(out.contains("def load_library() -> CDLL:"));
        assert!(out.contains("(\".so\", \".dylib\", \".dll\")"));
        for helper in [
            "class GoError(Exception):",
            "def _encode_string(",
            "def _decode_string(",
            "def _check_error(",
            "def _take_buffer(",
            "def _take_bytes(",
        ] {
            assert!(out.contains(helper), "missing {helper}");
        }
    }

    #[test]
    fn test_scalar_function() {
        let mut pkg = ParsedPackage::new("geo", "example.com/geo");
        let mut add = func(
            "Add",
            vec![ParsedParam::new("a", int()), ParsedParam::new("b", int())],
            vec![ParsedParam::unnamed(int())],
        );
        add.doc = "Add adds two integers\n".into();
        pkg.functions.push(add);

        let out = generate(&pkg);
        assert!(out.contains("_lib.geo_Add.argtypes = [c_longlong, c_longlong]\n"));
        assert!(out.contains("_lib.geo_Add.restype = c_longlong\n"));
        assert!(out.contains(
            "def add(a: int, b: int) -> int:\n    \"\"\"Add adds two integers\"\"\"\n    return _lib.geo_Add(a, b)\n"
        ));
        assert!(out.contains("    c_longlong,\n"));
    }

    #[test]
    fn test_error_is_checked() {
        let mut pkg = ParsedPackage::new("geo", "example.com/geo");
        pkg.functions.push(func(
            "Divide",
            vec![
                ParsedParam::new("a", ParsedType::primitive("float64")),
                ParsedParam::new("b", ParsedType::primitive("float64")),
            ],
            vec![
                ParsedParam::unnamed(ParsedType::primitive("float64")),
                ParsedParam::unnamed(ParsedType::error()),
            ],
        ));
        let out = generate(&pkg);
        assert!(out.contains(
            "_lib.geo_Divide.argtypes = [c_double, c_double, POINTER(c_double), POINTER(c_void_p)]"
        ));
        assert!(out.contains("def divide(a: float, b: float) -> float:"));
        assert!(out.contains(
            "    _out0 = c_double()\n    _err = c_void_p()\n    _lib.geo_Divide(a, b, byref(_out0), byref(_err))\n    _check_error(_err)\n    return _out0.value\n"
        ));
    }

    #[test]
    fn test_strings_and_lists() {
        let mut pkg = ParsedPackage::new("text", "");
        pkg.functions.push(func(
            "Split",
            vec![ParsedParam::new("s", ParsedType::string())],
            vec![
                ParsedParam::new("head", ParsedType::string()),
                ParsedParam::new("tail", ParsedType::slice(ParsedType::string())),
            ],
        ));
        let out = generate(&pkg);
        assert!(out.contains("def split(s: str) -> Tuple[str, List[str]]:"));
        assert!(out.contains("_outHead = c_void_p()"));
        assert!(out.contains("_outTail = POINTER(c_void_p)()"));
        assert!(out.contains("_lib.text_Split(_encode_string(s), byref(_outHead), byref(_outTail), byref(_outTail_len))"));
        assert!(out.contains(
            "return _decode_string(_outHead.value), _take_buffer(_outTail, _outTail_len.value, _decode_string)"
        ));
    }

    #[test]
    fn test_class_with_properties_and_methods() {
        let mut pkg = ParsedPackage::new("geo", "example.com/geo");
        let mut point = ParsedStruct::new("Point");
        point.doc = "Point represents a 2D point\n".into();
        point.fields = vec![ParsedField::new("X", int()), ParsedField::new("Y", int())];
        let mut scale = ParsedMethod::new("Scale", "Point", true);
        scale.params = vec![ParsedParam::new("factor", int())];
        point.methods = vec![scale];
        pkg.structs.push(point);

        let out = generate(&pkg);
        assert!(out.contains("class Point:\n    \"\"\"Point represents a 2D point\"\"\""));
        assert!(out.contains("def __init__(self, _handle: Optional[int] = None) -> None:"));
        assert!(out.contains("def __del__(self) -> None:"));
        assert!(out.contains("    @property\n    def x(self) -> int:\n        return _lib.Point_GetX(self._handle)\n"));
        assert!(out.contains("    @x.setter\n    def x(self, value: int) -> None:\n        _lib.Point_SetX(self._handle, value)\n"));
        assert!(out.contains("def y(self) -> int:"));
        assert!(out.contains("def scale(self, factor: int) -> None:\n        _lib.Point_Scale(self._handle, factor)\n"));
        assert!(out.contains("def __enter__(self) -> \"Point\":"));
        assert!(out.contains("def __exit__(self, *exc: Any) -> None:"));
        assert!(out.contains("_lib.Point_New.restype = c_size_t"));
        assert!(out.contains("_lib.Point_Scale.argtypes = [c_size_t, c_longlong]"));
    }

    #[test]
    fn test_no_context_manager_without_methods() {
        let mut pkg = ParsedPackage::new("geo", "");
        let mut size = ParsedStruct::new("Size");
        size.fields = vec![ParsedField::new("W", int())];
        pkg.structs.push(size);
        let out = generate(&pkg);
        assert!(out.contains("class Size:"));
        assert!(!out.contains("__enter__"));
    }

    #[test]
    fn test_struct_handles_convert_to_classes() {
        let mut pkg = ParsedPackage::new("geo", "");
        pkg.structs.push(ParsedStruct::new("Point"));
        pkg.functions.push(func(
            "Origin",
            vec![],
            vec![ParsedParam::unnamed(ParsedType::pointer(ParsedType::structure("Point")))],
        ));
        pkg.functions.push(func(
            "Norm",
            vec![ParsedParam::new("p", ParsedType::structure("Point"))],
            vec![ParsedParam::unnamed(ParsedType::primitive("float64"))],
        ));
        let out = generate(&pkg);
        assert!(out.contains("def origin() -> Optional[\"Point\"]:"));
        assert!(out.contains("return Point._from_handle(_res)"));
        assert!(out.contains("def norm(p: \"Point\") -> float:\n    return _lib.geo_Norm(_handle_of(p))\n"));
    }

    #[test]
    fn test_keyword_names() {
        let mut pkg = ParsedPackage::new("geo", "");
        pkg.functions.push(func(
            "Import",
            vec![ParsedParam::new("from", int())],
            vec![],
        ));
        pkg.functions.push(func("LoadLibrary", vec![], vec![]));
        let out = generate(&pkg);
        assert!(out.contains("def import_(from_: int) -> None:"));
        assert!(out.contains("def load_library_() -> None:"));
    }

    #[test]
    fn test_functions_and_classes_keep_runtime_names() {
        let mut pkg = ParsedPackage::new("geo", "");
        pkg.functions.push(func("StringAt", vec![], vec![]));
        pkg.functions.push(func("Len", vec![], vec![ParsedParam::unnamed(int())]));
        pkg.functions.push(func(
            "Greet",
            vec![ParsedParam::new("name", ParsedType::string())],
            vec![ParsedParam::unnamed(ParsedType::string())],
        ));
        pkg.structs.push(ParsedStruct::new("List"));
        pkg.functions.push(func(
            "Head",
            vec![],
            vec![ParsedParam::unnamed(ParsedType::pointer(ParsedType::structure("List")))],
        ));

        let out = generate(&pkg);
        assert!(out.contains("def string_at_() -> None:"));
        assert!(!out.contains("def string_at("));
        assert!(out.contains("def len_() -> int:"));
        assert!(out.contains("return string_at(ptr).decode(\"utf-8\")"));
        assert!(out.contains("def greet(name: str) -> str:"));
        assert!(out.contains("class List_:"));
        assert!(out.contains("def head() -> Optional[\"List_\"]:"));
        assert!(out.contains("return List_._from_handle(_res)"));
        assert!(out.contains("_lib.List_New.restype = c_size_t"));
    }

    #[test]
    fn test_field_named_free_keeps_destructor() {
        let mut pkg = ParsedPackage::new("geo", "");
        let mut flag = ParsedStruct::new("Flag");
        flag.fields = vec![
            ParsedField::new("Free", ParsedType::primitive("bool")),
            ParsedField::new("Property", int()),
            ParsedField::new("N", int()),
        ];
        flag.methods = vec![ParsedMethod::new("Reset", "Flag", true)];
        pkg.structs.push(flag);

        let out = generate(&pkg);
        assert_eq!(out.matches("    def free(self) -> None:").count(), 1);
        assert!(out.contains("    @property\n    def free_(self) -> bool:\n        return _lib.Flag_GetFree(self._handle)\n"));
        assert!(out.contains("    @free_.setter\n    def free_(self, value: bool) -> None:"));
        assert!(out.contains("    def property_(self) -> int:"));
        assert!(out.contains("    def n(self) -> int:"));
        assert!(out.contains("def __exit__(self, *exc: Any) -> None:\n        self.free()\n"));
        assert!(out.contains("_lib.Flag_Free(handle)"));
    }

    #[test]
    fn test_params_never_shadow_body_names() {
        let mut pkg = ParsedPackage::new("geo", "");
        pkg.functions.push(func(
            "Hash",
            vec![ParsedParam::new("bytes", ParsedType::slice(ParsedType::primitive("byte")))],
            vec![ParsedParam::unnamed(ParsedType::primitive("uint32"))],
        ));
        pkg.functions.push(func(
            "Bump",
            vec![
                ParsedParam::new("byref", ParsedType::pointer(int())),
                ParsedParam::new("list", ParsedType::slice(int())),
                ParsedParam::new("len", int()),
            ],
            vec![],
        ));
        pkg.functions.push(func(
            "Pick",
            vec![ParsedParam::new("outIdx", ParsedType::pointer(int()))],
            vec![
                ParsedParam::new("idx", int()),
                ParsedParam::unnamed(ParsedType::error()),
            ],
        ));

        let out = generate(&pkg);
        assert!(out.contains(
            "def hash(bytes_: bytes) -> int:\n    _bytes_ = bytes(bytes_ or b\"\")\n    return _lib.geo_Hash(_bytes_, len(_bytes_))\n"
        ));
        assert!(out.contains("def bump(byref_: Optional[int], list_: List[int], len_: int) -> None:"));
        assert!(out.contains("_byref_ = None if byref_ is None else byref(c_longlong(byref_))"));
        assert!(out.contains("_list_, _list__len = _make_array(c_longlong, list_)"));
        assert!(out.contains("def pick(outIdx_: Optional[int]) -> int:"));
        assert!(out.contains("_outIdx_ = None if outIdx_ is None else byref(c_longlong(outIdx_))"));
        assert!(out.contains("_outIdx = c_longlong()"));
    }

    #[test]
    fn test_companion_files() {
        let plugin = PythonPlugin::new(&PluginOptions {
            build_system: BuildSystem::Poetry,
            ..Default::default()
        });
        let pkg = ParsedPackage::new("geo", "");
        let files = plugin.companion_files(&pkg);
        assert_eq!(files[0].0, "pyproject.toml");
        assert!(files[0].1.contains("poetry"));
        assert!(files[0].1.contains("libgeo.so"));
        assert_eq!(files[1].0, "geo/__init__.py");
        assert_eq!(plugin.packaged_output(&pkg), "geo/geo.py");
        assert_eq!(plugin.default_output(&pkg), "geo.py");
    }
}
