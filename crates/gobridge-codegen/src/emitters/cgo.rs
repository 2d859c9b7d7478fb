//! cgo emitter: a `package main` file exporting C entry points for one Go
//! package, built with `go build -buildmode=c-shared`.

use std::collections::HashSet;

use gobridge_ir::{ParsedPackage, ParsedType, TypeKind};

use super::{StructSurface, Surface};
use crate::abi::{CallPlan, Shape, Slot};
use crate::context::{EmitContext, IndentStyle};
use crate::error::CodegenError;
use crate::generator::validate_package;
use crate::mapping::{CType, HandleKind, StructRegistry, Transfer};
use crate::naming::claim;
use crate::traits::{Plugin, PluginOptions};

/// Handle table, generic conversion helpers and the free routines. Emitted
/// once per file.
const RUNTIME: &str = r#"// Handle table shared by every entry point. Handle 0 is never issued and
// stands for nil.
var (
	handleMu   sync.RWMutex
	handleMap  = make(map[C.uintptr_t]any)
	nextHandle C.uintptr_t = 1
)

func registerHandle(v any) C.uintptr_t {
	handleMu.Lock()
	defer handleMu.Unlock()
	h := nextHandle
	nextHandle++
	handleMap[h] = v
	return h
}

func getHandle(h C.uintptr_t) (any, bool) {
	handleMu.RLock()
	defer handleMu.RUnlock()
	v, ok := handleMap[h]
	return v, ok
}

func freeHandle(h C.uintptr_t) {
	handleMu.Lock()
	defer handleMu.Unlock()
	delete(handleMap, h)
}

// fromHandle returns the registered *T, or nil for 0, stale handles and
// handles of another type.
func fromHandle[T any](h C.uintptr_t) *T {
	v, ok := getHandle(h)
	if !ok {
		return nil
	}
	p, _ := v.(*T)
	return p
}

// valueOf returns a registered map or interface value.
func valueOf[T any](h C.uintptr_t) T {
	var zero T
	v, ok := getHandle(h)
	if !ok {
		return zero
	}
	t, ok := v.(T)
	if !ok {
		return zero
	}
	return t
}

func derefOrZero[T any](p *T) T {
	if p == nil {
		var zero T
		return zero
	}
	return *p
}

func handleOf[T any](p *T) C.uintptr_t {
	if p == nil {
		return 0
	}
	return registerHandle(p)
}

func handleOfValue[T any](v T) C.uintptr_t {
	return registerHandle(&v)
}

func anyHandle(v any) C.uintptr_t {
	if v == nil {
		return 0
	}
	return registerHandle(v)
}

// allocSlice returns n elements of C memory, released with Free_Bytes.
func allocSlice[T any](n int) []T {
	if n == 0 {
		return nil
	}
	var zero T
	p := C.malloc(C.size_t(n) * C.size_t(unsafe.Sizeof(zero)))
	return unsafe.Slice((*T)(p), n)
}

//export Free_String
func Free_String(s *C.char) {
	C.free(unsafe.Pointer(s))
}

//export Free_Bytes
func Free_Bytes(p unsafe.Pointer) {
	C.free(p)
}

//export Free_Handle
func Free_Handle(h C.uintptr_t) {
	freeHandle(h)
}
"#;

/// Identifiers a wrapper body refers to besides its own parameters. A
/// parameter spelled like one of these would shadow it.
const GO_RESERVED: &[&str] = &[
    "C", "unsafe", "sync", "any", "nil", "true", "false", "len", "make", "bool", "byte", "rune",
    "string", "error", "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16",
    "uint32", "uint64", "uintptr", "float32", "float64", "complex64", "complex128",
    "registerHandle", "getHandle", "freeHandle", "fromHandle", "valueOf", "derefOrZero",
    "handleOf", "handleOfValue", "anyHandle", "allocSlice",
    // `_obj`, `_recv`, `_err`, `_i` and `_v` are wrapper locals
    "obj", "recv", "err", "i", "v",
];

/// The C-ABI plugin.
#[derive(Debug, Clone, Default)]
pub struct CgoPlugin {
    verbose: bool,
}

impl CgoPlugin {
    pub fn new(opts: &PluginOptions) -> Self {
        Self {
            verbose: opts.verbose,
        }
    }

    pub fn factory(opts: &PluginOptions) -> Box<dyn Plugin> {
        Box::new(Self::new(opts))
    }
}

impl Plugin for CgoPlugin {
    fn name(&self) -> &str {
        "cgo"
    }

    fn generate(&self, pkg: &ParsedPackage) -> Result<Vec<u8>, CodegenError> {
        validate_package(pkg)?;
        Ok(CgoEmitter::new(pkg).emit(self.verbose).into_bytes())
    }

    fn default_output(&self, _pkg: &ParsedPackage) -> String {
        "main.go".to_string()
    }
}

/// The entry point's receiver, resolved from the `handle` parameter.
#[derive(Debug, Clone)]
struct Receiver<'a> {
    name: &'a str,
    go_type: String,
    by_pointer: bool,
}

/// What the wrapper does with the converted arguments.
#[derive(Debug, Clone, Copy)]
enum Invoke<'a> {
    /// Call a package-level function by its qualified name
    Func(&'a str),
    Method(&'a str),
    /// Read a field as the only result
    Read(&'a str),
    /// Assign the only parameter to a field
    Write(&'a str),
}

struct CgoEmitter<'p> {
    pkg: &'p ParsedPackage,
    structs: StructRegistry,
    ctx: EmitContext,
}

impl<'p> CgoEmitter<'p> {
    fn new(pkg: &'p ParsedPackage) -> Self {
        Self {
            pkg,
            structs: StructRegistry::from_package(pkg),
            ctx: EmitContext::new(IndentStyle::Tabs),
        }
    }

    fn emit(mut self, verbose: bool) -> String {
        let surface = Surface::build(self.pkg, &self.structs, "cgo", verbose);

        self.ctx.raw(RUNTIME);
        self.ctx.blank();
        for s in &surface.structs {
            self.emit_struct(s);
        }
        for f in &surface.functions {
            let entry = format!("{}_{}", self.pkg.name, f.func.name);
            let callee = format!("{}.{}", self.package_alias(), f.func.name);
            self.emit_entry(&entry, None, Invoke::Func(&callee), &f.plan);
        }
        self.ctx.line("func main() {}");

        let header = self.header();
        header + self.ctx.output()
    }

    fn header(&mut self) -> String {
        let mut std_imports = vec!["\"sync\"".to_string(), "\"unsafe\"".to_string()];
        let mut pkg_imports = Vec::new();
        for import in self.ctx.take_imports() {
            if import.names.is_empty() {
                std_imports.push(format!("\"{}\"", import.from));
            } else {
                pkg_imports.push(format!("{} \"{}\"", import.names, import.from));
            }
        }
        std_imports.sort();
        std_imports.dedup();

        let mut out = format!(
            "// Code generated by gobridge from {}. DO NOT EDIT.\n\n",
            self.pkg.effective_import_path()
        );
        out.push_str("package main\n\n");
        out.push_str("/*\n#include <stdbool.h>\n#include <stdint.h>\n#include <stdlib.h>\n*/\n");
        out.push_str("import \"C\"\n\n");
        out.push_str("import (\n");
        for import in &std_imports {
            out.push_str(&format!("\t{import}\n"));
        }
        if !pkg_imports.is_empty() {
            out.push('\n');
            for import in &pkg_imports {
                out.push_str(&format!("\t{import}\n"));
            }
        }
        out.push_str(")\n\n");
        out
    }

    /// Local name of the wrapped package, imported on first use.
    fn package_alias(&mut self) -> String {
        self.ctx
            .add_import(self.pkg.name.clone(), self.pkg.effective_import_path());
        self.pkg.name.clone()
    }

    fn emit_struct(&mut self, s: &StructSurface<'_>) {
        let name = &s.def.name;
        let go_type = format!("{}.{}", self.package_alias(), name);

        self.ctx.line(format!("//export {name}_New"));
        self.ctx.block(format!("func {name}_New() C.uintptr_t {{"), "}", |ctx| {
            ctx.line(format!("return registerHandle(&{go_type}{{}})"));
        });
        self.ctx.blank();

        self.ctx.line(format!("//export {name}_Free"));
        self.ctx.block(format!("func {name}_Free(handle C.uintptr_t) {{"), "}", |ctx| {
            ctx.line("freeHandle(handle)");
        });
        self.ctx.blank();

        let recv = Receiver {
            name,
            go_type,
            by_pointer: true,
        };
        for f in &s.fields {
            let field = &f.field.name;
            if let Some(plan) = &f.getter {
                self.emit_entry(&format!("{name}_Get{field}"), Some(&recv), Invoke::Read(field), plan);
            }
            if let Some(plan) = &f.setter {
                self.emit_entry(&format!("{name}_Set{field}"), Some(&recv), Invoke::Write(field), plan);
            }
        }
        for m in &s.methods {
            let recv = Receiver {
                by_pointer: m.method.receiver_is_ptr,
                ..recv.clone()
            };
            self.emit_entry(
                &format!("{name}_{}", m.method.name),
                Some(&recv),
                Invoke::Method(&m.method.name),
                &m.plan,
            );
        }
    }

    fn emit_entry(&mut self, entry: &str, receiver: Option<&Receiver<'_>>, invoke: Invoke<'_>, plan: &CallPlan) {
        let plan = &self.unshadowed(plan);
        let mut params = Vec::new();
        if receiver.is_some() {
            params.push("handle C.uintptr_t".to_string());
        }
        for slot in &plan.params {
            params.push(format!("{} {}", slot.name, c_type(slot)));
            if slot.shape == Shape::Buffer {
                params.push(format!("{}Len C.int", slot.name));
            }
        }
        let mut ret = String::new();
        if let Some(slot) = plan.returned() {
            ret = format!(" {}", c_type(slot));
            if slot.shape == Shape::Buffer {
                params.push("outLen *C.int".to_string());
            }
        } else {
            for slot in &plan.results {
                params.push(format!("{} *{}", slot.name, c_type(slot)));
                if slot.shape == Shape::Buffer {
                    params.push(format!("{}Len *C.int", slot.name));
                }
            }
        }
        if plan.has_error() {
            params.push("outError **C.char".to_string());
        }

        self.ctx.line(format!("//export {entry}"));
        self.ctx
            .line(format!("func {entry}({}){ret} {{", params.join(", ")));
        self.ctx.push_indent();
        self.emit_body(receiver, invoke, plan);
        self.ctx.pop_indent();
        self.ctx.line("}");
        self.ctx.blank();
    }

    /// Rename parameters that would shadow the wrapped package, a qualifier
    /// the wrapper spells out or a name from [`GO_RESERVED`].
    fn unshadowed(&self, plan: &CallPlan) -> CallPlan {
        let mut qualifiers = HashSet::from([self.pkg.name.clone()]);
        for slot in plan.params.iter().chain(&plan.results) {
            collect_qualifiers(&slot.ty, &mut qualifiers);
        }
        let reserved = |name: &str| {
            GO_RESERVED.contains(&name)
                || qualifiers.contains(name)
                || name.starts_with('_')
                || is_result_temp(name)
        };

        let mut taken: HashSet<String> = HashSet::new();
        for slot in &plan.results {
            taken.insert(slot.name.clone());
            taken.insert(format!("{}Len", slot.name));
        }
        let mut plan = plan.clone();
        for slot in &mut plan.params {
            slot.name = claim(&slot.name, reserved, &mut taken);
            if slot.shape == Shape::Buffer {
                taken.insert(format!("{}Len", slot.name));
            }
        }
        plan
    }

    fn emit_body(&mut self, receiver: Option<&Receiver<'_>>, invoke: Invoke<'_>, plan: &CallPlan) {
        let bail = match plan.returned() {
            Some(slot) => format!("return {}", zero_value(slot)),
            None => "return".to_string(),
        };

        if plan.has_error() {
            self.ctx.block("if outError != nil {", "}", |ctx| ctx.line("*outError = nil"));
        }
        if let Some(recv) = receiver {
            self.ctx
                .line(format!("_obj := fromHandle[{}](handle)", recv.go_type));
            let message = format!("invalid {} handle", recv.name);
            let has_error = plan.has_error();
            self.ctx.block("if _obj == nil {", "}", |ctx| {
                if has_error {
                    ctx.block("if outError != nil {", "}", |ctx| {
                        ctx.line(format!("*outError = C.CString({message:?})"));
                    });
                }
                ctx.line(&bail);
            });
        }

        let args: Vec<String> = plan.params.iter().map(|slot| self.param_to_go(slot)).collect();
        let call = match invoke {
            Invoke::Func(callee) => Some(format!("{callee}({})", args.join(", "))),
            Invoke::Method(method) => {
                let target = match receiver {
                    Some(recv) if !recv.by_pointer => {
                        // Value receivers work on a copy
                        self.ctx.line("_recv := *_obj");
                        "_recv"
                    }
                    _ => "_obj",
                };
                Some(format!("{target}.{method}({})", args.join(", ")))
            }
            Invoke::Read(field) => {
                self.ctx.line(format!("_r0 := _obj.{field}"));
                None
            }
            Invoke::Write(field) => {
                self.ctx.line(format!("_obj.{field} = {}", args.join(", ")));
                None
            }
        };
        if let Some(call) = call {
            if plan.arity() == 0 {
                self.ctx.line(call);
            } else {
                let mut next = 0;
                let lhs: Vec<String> = (0..plan.arity())
                    .map(|i| {
                        if plan.error_position == Some(i) {
                            "_err".to_string()
                        } else {
                            next += 1;
                            format!("_r{}", next - 1)
                        }
                    })
                    .collect();
                self.ctx.line(format!("{} := {call}", lhs.join(", ")));
            }
        }

        for slot in plan.params.iter().filter(|s| s.shape == Shape::Pointer) {
            let elem_c = elem_c_type(slot);
            let name = &slot.name;
            self.ctx
                .block(format!("if {name} != nil && _{name} != nil {{"), "}", |ctx| {
                    ctx.line(format!("*{name} = {elem_c}(*_{name})"));
                });
        }

        if plan.has_error() {
            self.ctx.block("if _err != nil {", "}", |ctx| {
                ctx.block("if outError != nil {", "}", |ctx| {
                    ctx.line("*outError = C.CString(_err.Error())");
                });
                ctx.line("return");
            });
        }

        if let Some(slot) = plan.returned() {
            self.return_result(slot);
        } else {
            for (k, slot) in plan.results.iter().enumerate() {
                self.store_result(slot, k);
            }
        }
    }

    /// Convert one C parameter to its Go argument, emitting any setup lines.
    fn param_to_go(&mut self, slot: &Slot) -> String {
        let name = &slot.name;
        match slot.shape {
            Shape::Scalar => self.scalar_from_c(&slot.ty, &slot.transfer, name),
            Shape::Buffer if slot.is_bytes() => format!("C.GoBytes({name}, {name}Len)"),
            Shape::Buffer | Shape::Fixed(_) => {
                let Some((elem_ty, elem)) = slot.elem() else {
                    return "nil".to_string();
                };
                let go_elem = self.go_type(elem_ty);
                let conv = self.scalar_from_c(elem_ty, elem, "_v");
                let (decl, count) = match slot.shape {
                    Shape::Fixed(n) => (format!("var _{name} [{n}]{go_elem}"), n.to_string()),
                    _ => (
                        format!("_{name} := make([]{go_elem}, int({name}Len))"),
                        format!("int({name}Len)"),
                    ),
                };
                self.ctx.line(decl);
                self.ctx.block(format!("if {name} != nil {{"), "}", |ctx| {
                    ctx.block(
                        format!("for _i, _v := range unsafe.Slice({name}, {count}) {{"),
                        "}",
                        |ctx| ctx.line(format!("_{name}[_i] = {conv}")),
                    );
                });
                format!("_{name}")
            }
            Shape::Pointer => {
                let go_elem = match slot.ty.elem() {
                    Some(elem) => self.go_type(elem),
                    None => "int".to_string(),
                };
                self.ctx.line(format!("var _{name} *{go_elem}"));
                self.ctx.block(format!("if {name} != nil {{"), "}", |ctx| {
                    ctx.line(format!("_{name}v := {go_elem}(*{name})"));
                    ctx.line(format!("_{name} = &_{name}v"));
                });
                format!("_{name}")
            }
        }
    }

    fn return_result(&mut self, slot: &Slot) {
        match slot.shape {
            Shape::Scalar | Shape::Pointer => {
                let value = self.scalar_to_c(&slot.ty, &slot.transfer, "_r0");
                self.ctx.line(format!("return {value}"));
            }
            Shape::Buffer => {
                let ptr = self.buffer_to_c(slot, "_r0", 0);
                self.ctx.block("if outLen != nil {", "}", |ctx| {
                    ctx.line("*outLen = C.int(len(_r0))");
                });
                self.ctx.line(format!("return {ptr}"));
            }
            Shape::Fixed(_) => {
                let ptr = self.buffer_to_c(slot, "_r0", 0);
                self.ctx.line(format!("return {ptr}"));
            }
        }
    }

    fn store_result(&mut self, slot: &Slot, k: usize) {
        let out = &slot.name;
        let var = format!("_r{k}");
        self.ctx.line(format!("if {out} != nil {{"));
        self.ctx.push_indent();
        match slot.shape {
            Shape::Scalar | Shape::Pointer => {
                let value = self.scalar_to_c(&slot.ty, &slot.transfer, &var);
                self.ctx.line(format!("*{out} = {value}"));
            }
            Shape::Buffer | Shape::Fixed(_) => {
                let ptr = self.buffer_to_c(slot, &var, k);
                self.ctx.line(format!("*{out} = {ptr}"));
                if slot.shape == Shape::Buffer {
                    self.ctx.block(format!("if {out}Len != nil {{"), "}", |ctx| {
                        ctx.line(format!("*{out}Len = C.int(len({var}))"));
                    });
                }
            }
        }
        self.ctx.pop_indent();
        self.ctx.line("}");
    }

    /// Copy a Go slice or array into C memory; returns the pointer expression.
    fn buffer_to_c(&mut self, slot: &Slot, var: &str, k: usize) -> String {
        if slot.is_bytes() {
            return format!("C.CBytes({var})");
        }
        let Some((elem_ty, elem)) = slot.elem() else {
            return "nil".to_string();
        };
        let elem_c = CType::describe(elem_ty, elem).c_type;
        let conv = self.scalar_to_c(elem_ty, elem, "_v");
        let buf = format!("_c{k}");
        self.ctx
            .line(format!("{buf} := allocSlice[{elem_c}](len({var}))"));
        self.ctx.block(format!("for _i, _v := range {var} {{"), "}", |ctx| {
            ctx.line(format!("{buf}[_i] = {conv}"));
        });
        format!("unsafe.SliceData({buf})")
    }

    fn scalar_from_c(&mut self, ty: &ParsedType, transfer: &Transfer, expr: &str) -> String {
        match transfer {
            Transfer::Value(_) => format!("{}({expr})", ty.name),
            Transfer::OwnedString => format!("C.GoString({expr})"),
            Transfer::Handle {
                kind: HandleKind::Struct { .. },
                nullable: true,
            } => {
                let target = self.go_type(ty.elem().unwrap_or(ty));
                format!("fromHandle[{target}]({expr})")
            }
            Transfer::Handle {
                kind: HandleKind::Struct { .. },
                ..
            } => format!("derefOrZero(fromHandle[{}]({expr}))", self.go_type(ty)),
            Transfer::Handle { .. } => format!("valueOf[{}]({expr})", self.go_type(ty)),
            Transfer::Composite { .. } | Transfer::ErrorOut => expr.to_string(),
        }
    }

    fn scalar_to_c(&mut self, ty: &ParsedType, transfer: &Transfer, expr: &str) -> String {
        match transfer {
            Transfer::Value(p) => format!("{}({expr})", p.c),
            Transfer::OwnedString => format!("C.CString({expr})"),
            Transfer::Handle {
                kind: HandleKind::Struct { .. },
                nullable: true,
            } => format!("handleOf({expr})"),
            Transfer::Handle {
                kind: HandleKind::Struct { .. },
                ..
            } => format!("handleOfValue({expr})"),
            Transfer::Handle { .. } => format!("anyHandle({expr})"),
            Transfer::Composite { .. } | Transfer::ErrorOut => {
                log::debug!("no scalar conversion for {}", ty.name);
                expr.to_string()
            }
        }
    }

    /// Go spelling of a type as seen from `package main`.
    fn go_type(&mut self, ty: &ParsedType) -> String {
        match ty.kind {
            TypeKind::Interface => "any".to_string(),
            TypeKind::Struct => match &ty.package_path {
                Some(path) => {
                    self.ctx.add_import("", path.clone());
                    format!("{path}.{}", ty.name)
                }
                None => format!("{}.{}", self.package_alias(), ty.name),
            },
            TypeKind::Pointer => format!("*{}", self.go_elem(ty)),
            TypeKind::Slice => format!("[]{}", self.go_elem(ty)),
            TypeKind::Array => format!("[{}]{}", ty.size.unwrap_or_default(), self.go_elem(ty)),
            TypeKind::Map => {
                let key = match ty.key() {
                    Some(key) => self.go_type(key),
                    None => "any".to_string(),
                };
                format!("map[{key}]{}", self.go_elem(ty))
            }
            _ => ty.name.clone(),
        }
    }

    fn go_elem(&mut self, ty: &ParsedType) -> String {
        match ty.elem() {
            Some(elem) => self.go_type(elem),
            None => "any".to_string(),
        }
    }
}

fn collect_qualifiers(ty: &ParsedType, out: &mut HashSet<String>) {
    if let Some(path) = &ty.package_path {
        out.insert(path.clone());
    }
    for inner in ty.elem().into_iter().chain(ty.key()) {
        collect_qualifiers(inner, out);
    }
}

/// `r0`, `c1`: parameters whose `_`-prefixed local would clash with the
/// result temporaries.
fn is_result_temp(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('r' | 'c'))
        && name.len() > 1
        && chars.all(|c| c.is_ascii_digit())
}

fn c_type(slot: &Slot) -> String {
    CType::describe(&slot.ty, &slot.transfer).c_type
}

fn elem_c_type(slot: &Slot) -> String {
    CType::describe(&slot.ty, &slot.transfer)
        .elem
        .map(|elem| elem.c_type)
        .unwrap_or_else(|| "C.longlong".to_string())
}

/// What an entry point returns when the receiver handle is invalid.
fn zero_value(slot: &Slot) -> &'static str {
    match (slot.shape, &slot.transfer) {
        (Shape::Scalar, Transfer::Value(p)) if p.go == "bool" => "false",
        (Shape::Scalar, Transfer::OwnedString) => "nil",
        (Shape::Scalar, _) => "0",
        _ => "nil",
    }
}
