pub mod cgo;
pub mod python;

use std::fmt::Display;

use gobridge_ir::{ParsedField, ParsedFunc, ParsedMethod, ParsedPackage, ParsedStruct};

use crate::abi::{self, CallPlan};
use crate::mapping::StructRegistry;

/// Everything a package exposes across the boundary, with its call layout.
/// Both emitters render the same surface.
#[derive(Debug)]
pub struct Surface<'p> {
    pub functions: Vec<FuncSurface<'p>>,
    pub structs: Vec<StructSurface<'p>>,
}

#[derive(Debug)]
pub struct FuncSurface<'p> {
    pub func: &'p ParsedFunc,
    pub plan: CallPlan,
}

#[derive(Debug)]
pub struct StructSurface<'p> {
    pub def: &'p ParsedStruct,
    pub fields: Vec<FieldSurface<'p>>,
    pub methods: Vec<MethodSurface<'p>>,
}

/// A field with its accessor layouts. An accessor is `None` when a method
/// of the same name takes its place.
#[derive(Debug)]
pub struct FieldSurface<'p> {
    pub field: &'p ParsedField,
    pub getter: Option<CallPlan>,
    pub setter: Option<CallPlan>,
}

#[derive(Debug)]
pub struct MethodSurface<'p> {
    pub method: &'p ParsedMethod,
    pub plan: CallPlan,
}

impl<'p> Surface<'p> {
    /// Lay out every exported symbol, dropping what cannot cross the
    /// boundary. `target` and `verbose` only affect logging.
    pub fn build(pkg: &'p ParsedPackage, structs: &StructRegistry, target: &str, verbose: bool) -> Self {
        let mut functions = Vec::new();
        for func in &pkg.functions {
            match abi::plan(func.signature(), structs) {
                Ok(plan) => functions.push(FuncSurface { func, plan }),
                Err(e) => log_drop(verbose, target, &func.name, e),
            }
        }

        let struct_surfaces = pkg
            .structs
            .iter()
            .map(|def| StructSurface::build(def, structs, target, verbose))
            .collect();

        Self {
            functions,
            structs: struct_surfaces,
        }
    }
}

impl<'p> StructSurface<'p> {
    fn build(def: &'p ParsedStruct, structs: &StructRegistry, target: &str, verbose: bool) -> Self {
        let mut fields = Vec::new();
        for field in def.exported_fields() {
            let symbol = format!("{}.{}", def.name, field.name);
            let plans = abi::plan_getter(&field.ty, structs)
                .and_then(|get| abi::plan_setter(&field.ty, structs).map(|set| (get, set)));
            match plans {
                Ok((getter, setter)) => fields.push(FieldSurface {
                    field,
                    getter: (!def.has_method(&format!("Get{}", field.name))).then_some(getter),
                    setter: (!def.has_method(&format!("Set{}", field.name))).then_some(setter),
                }),
                Err(e) => log_drop(verbose, target, &symbol, e),
            }
        }

        let mut methods = Vec::new();
        for method in &def.methods {
            let symbol = format!("{}.{}", def.name, method.name);
            if matches!(method.name.as_str(), "New" | "Free") {
                log_drop(
                    verbose,
                    target,
                    &symbol,
                    "name collides with the generated constructor or destructor",
                );
                continue;
            }
            match abi::plan(method.signature(), structs) {
                Ok(plan) => methods.push(MethodSurface { method, plan }),
                Err(e) => log_drop(verbose, target, &symbol, e),
            }
        }

        Self {
            def,
            fields,
            methods,
        }
    }
}

/// Report a symbol the emitter leaves out.
fn log_drop(verbose: bool, target: &str, symbol: &str, reason: impl Display) {
    if verbose {
        log::warn!("{target}: skipping {symbol}: {reason}");
    } else {
        log::debug!("{target}: skipping {symbol}: {reason}");
    }
}
