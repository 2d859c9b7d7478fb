use std::path::{Path, PathBuf};

use gobridge_ir::{
    is_exported, ParsedField, ParsedFunc, ParsedMethod, ParsedPackage, ParsedParam, ParsedStruct,
    ParsedType, UnsupportedType,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::ExtractError;
use crate::parser::parse_file;
use crate::syntax::{Decl, Field, FuncDecl, SourceFile, TypeExpr};

/// Extraction knobs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractOptions {
    /// Log every dropped symbol at warn level
    pub verbose: bool,
    /// Fail on the first dropped symbol instead of omitting it
    pub strict: bool,
}

/// A function, method or field left out of the IR, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedSymbol {
    pub symbol: String,
    pub reason: String,
}

/// What extraction read and what it had to leave out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    pub files: Vec<String>,
    pub dropped: Vec<DroppedSymbol>,
}

impl ExtractReport {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// Parse every non-test `.go` file of one package directory into the IR.
///
/// Files are read in name order. The first package whose name does not end
/// in `_test` is selected.
pub fn parse_package(
    dir: &Path,
    opts: &ExtractOptions,
) -> Result<(ParsedPackage, ExtractReport), ExtractError> {
    if !dir.is_dir() {
        return Err(ExtractError::DirectoryNotFound(
            dir.to_string_lossy().into_owned(),
        ));
    }
    let dir = dir
        .canonicalize()
        .map_err(|e| ExtractError::Io(dir.to_string_lossy().into_owned(), e))?;

    let mut sources = Vec::new();
    for entry in WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_package_source(&name) {
            continue;
        }
        let content = std::fs::read_to_string(entry.path())
            .map_err(|e| ExtractError::Io(entry.path().to_string_lossy().into_owned(), e))?;
        sources.push((name, content));
    }

    if sources.is_empty() {
        return Err(ExtractError::NoPackage(dir.to_string_lossy().into_owned()));
    }

    let files: Vec<(&str, &str)> = sources
        .iter()
        .map(|(name, content)| (name.as_str(), content.as_str()))
        .collect();
    build(dir, &files, opts)
}

/// Build the IR from in-memory `(file name, source)` pairs.
pub fn extract_sources(
    files: &[(&str, &str)],
    opts: &ExtractOptions,
) -> Result<(ParsedPackage, ExtractReport), ExtractError> {
    build(PathBuf::new(), files, opts)
}

fn is_package_source(name: &str) -> bool {
    name.ends_with(".go") && !name.ends_with("_test.go")
}

fn build(
    dir: PathBuf,
    files: &[(&str, &str)],
    opts: &ExtractOptions,
) -> Result<(ParsedPackage, ExtractReport), ExtractError> {
    let location = dir.to_string_lossy().into_owned();

    let mut packages: IndexMap<String, Vec<(String, SourceFile)>> = IndexMap::new();
    for (name, src) in files {
        if !is_package_source(name) {
            continue;
        }
        let file = parse_file(src).map_err(|e| ExtractError::syntax(name, e))?;
        packages
            .entry(file.package.clone())
            .or_default()
            .push((name.to_string(), file));
    }

    if packages.is_empty() {
        return Err(ExtractError::NoPackage(location));
    }
    let Some((name, files)) = packages
        .into_iter()
        .find(|(name, _)| !name.ends_with("_test"))
    else {
        return Err(ExtractError::NoNonTestPackage(location));
    };

    let mut builder = Builder {
        opts,
        report: ExtractReport::default(),
    };
    let mut pkg = ParsedPackage::new(name, "");
    pkg.dir = dir;

    // Pass 1: functions, structs, and methods indexed by receiver type.
    let mut methods: IndexMap<String, Vec<ParsedMethod>> = IndexMap::new();
    for (file_name, file) in &files {
        builder.report.files.push(file_name.clone());
        for decl in &file.decls {
            match decl {
                Decl::Func(func) if func.recv.is_some() => {
                    if let Some((receiver, method)) = builder.method(func)? {
                        methods.entry(receiver).or_default().push(method);
                    }
                }
                Decl::Func(func) => {
                    if let Some(parsed) = builder.function(func)? {
                        pkg.functions.push(parsed);
                    }
                }
                Decl::Type(decl) => {
                    for spec in &decl.specs {
                        let TypeExpr::Struct(fields) = &spec.ty else {
                            continue;
                        };
                        if spec.alias || !is_exported(&spec.name) {
                            continue;
                        }
                        if spec.generic {
                            builder.drop_symbol(spec.name.clone(), generic_unsupported())?;
                            continue;
                        }
                        let doc = if decl.doc.is_empty() { &spec.doc } else { &decl.doc };
                        let mut parsed = ParsedStruct::new(spec.name.clone());
                        parsed.doc = doc.clone();
                        parsed.fields = builder.fields(&spec.name, fields)?;
                        pkg.structs.push(parsed);
                    }
                }
            }
        }
    }

    // Pass 2: attach methods to their structs.
    for parsed in &mut pkg.structs {
        if let Some(list) = methods.shift_remove(&parsed.name) {
            parsed.methods = list;
        }
    }
    for (receiver, list) in &methods {
        log::debug!(
            "ignoring {} method(s) on non-struct type {}",
            list.len(),
            receiver
        );
    }

    Ok((pkg, builder.report))
}

struct Builder<'o> {
    opts: &'o ExtractOptions,
    report: ExtractReport,
}

impl Builder<'_> {
    fn drop_symbol(&mut self, symbol: String, err: UnsupportedType) -> Result<(), ExtractError> {
        if self.opts.strict {
            return Err(ExtractError::Unsupported {
                symbol,
                source: err,
            });
        }
        if self.opts.verbose {
            log::warn!("skipping {symbol}: {err}");
        } else {
            log::debug!("skipping {symbol}: {err}");
        }
        self.report.dropped.push(DroppedSymbol {
            symbol,
            reason: err.to_string(),
        });
        Ok(())
    }

    fn function(&mut self, func: &FuncDecl) -> Result<Option<ParsedFunc>, ExtractError> {
        if !is_exported(&func.name) {
            return Ok(None);
        }
        if func.generic {
            self.drop_symbol(func.name.clone(), generic_unsupported())?;
            return Ok(None);
        }
        match signature(func) {
            Ok((params, results, is_variadic)) => Ok(Some(ParsedFunc {
                name: func.name.clone(),
                doc: func.doc.clone(),
                params,
                results,
                is_variadic,
            })),
            Err(err) => {
                self.drop_symbol(func.name.clone(), err)?;
                Ok(None)
            }
        }
    }

    fn method(&mut self, func: &FuncDecl) -> Result<Option<(String, ParsedMethod)>, ExtractError> {
        let Some(recv) = &func.recv else {
            return Ok(None);
        };
        let (receiver_type, by_pointer, generic) = match &recv.ty {
            TypeExpr::Pointer(inner) => match inner.as_ref() {
                TypeExpr::Ident(name) => (name.clone(), true, false),
                TypeExpr::Generic { base, .. } => (base_ident(base), true, true),
                _ => return Ok(None),
            },
            TypeExpr::Ident(name) => (name.clone(), false, false),
            TypeExpr::Generic { base, .. } => (base_ident(base), false, true),
            _ => return Ok(None),
        };
        // Methods of unexported types can never be reached.
        if !is_exported(&func.name) || !is_exported(&receiver_type) {
            return Ok(None);
        }

        let symbol = format!("{}.{}", receiver_type, func.name);
        if generic || func.generic {
            self.drop_symbol(symbol, generic_unsupported())?;
            return Ok(None);
        }

        match signature(func) {
            Ok((params, results, is_variadic)) => {
                let mut method = ParsedMethod::new(func.name.clone(), receiver_type.clone(), by_pointer);
                method.doc = func.doc.clone();
                method.receiver_name = recv.names.first().cloned().unwrap_or_default();
                method.params = params;
                method.results = results;
                method.is_variadic = is_variadic;
                Ok(Some((receiver_type, method)))
            }
            Err(err) => {
                self.drop_symbol(symbol, err)?;
                Ok(None)
            }
        }
    }

    fn fields(
        &mut self,
        struct_name: &str,
        fields: &[Field],
    ) -> Result<Vec<ParsedField>, ExtractError> {
        let mut parsed = Vec::new();
        for field in fields {
            let names: Vec<String> = if field.names.is_empty() {
                // Embedded field: named after its base type
                field.ty.base_name().map(str::to_string).into_iter().collect()
            } else {
                field.names.clone()
            };
            let exported: Vec<&String> = names.iter().filter(|n| is_exported(n)).collect();
            if exported.is_empty() {
                continue;
            }

            let ty = match resolve_type(&field.ty) {
                Ok(ty) => ty,
                Err(err) => {
                    for name in exported {
                        self.drop_symbol(format!("{struct_name}.{name}"), err.clone())?;
                    }
                    continue;
                }
            };
            for name in exported {
                let mut f = ParsedField::new(name.clone(), ty.clone());
                f.tag = field.tag.clone().unwrap_or_default();
                parsed.push(f);
            }
        }
        Ok(parsed)
    }
}

fn base_ident(base: &TypeExpr) -> String {
    base.base_name().unwrap_or_default().to_string()
}

fn generic_unsupported() -> UnsupportedType {
    UnsupportedType::new("generic", "type parameters cannot be exposed via cgo")
}

type Resolved = (Vec<ParsedParam>, Vec<ParsedParam>, bool);

fn signature(func: &FuncDecl) -> Result<Resolved, UnsupportedType> {
    let params = resolve_fields(&func.params)?;
    let results = resolve_fields(&func.results)?;
    let is_variadic = func
        .params
        .last()
        .is_some_and(|p| matches!(p.ty, TypeExpr::Ellipsis(_)));
    Ok((params, results, is_variadic))
}

fn resolve_fields(fields: &[Field]) -> Result<Vec<ParsedParam>, UnsupportedType> {
    let mut out = Vec::new();
    for field in fields {
        let ty = resolve_type(&field.ty)?;
        if field.names.is_empty() {
            out.push(ParsedParam::unnamed(ty));
        } else {
            for name in &field.names {
                out.push(ParsedParam::new(name.clone(), ty.clone()));
            }
        }
    }
    Ok(out)
}

/// Classify a type expression into the IR.
///
/// Bare identifiers outside the builtin table are taken to be local structs,
/// and qualified names keep their package but are classified the same way.
pub fn resolve_type(expr: &TypeExpr) -> Result<ParsedType, UnsupportedType> {
    match expr {
        TypeExpr::Ident(name) => Ok(ident_type(name)),
        TypeExpr::Selector { package, name } => Ok(ParsedType::qualified(package, name)),
        TypeExpr::Pointer(elem) => Ok(ParsedType::pointer(resolve_type(elem)?)),
        TypeExpr::Slice(elem) => Ok(ParsedType::slice(resolve_type(elem)?)),
        TypeExpr::Array { len, elem } => {
            let elem = resolve_type(elem)?;
            Ok(match len {
                Some(len) => ParsedType::array(elem, *len),
                None => ParsedType::array_of_unknown_len(elem),
            })
        }
        TypeExpr::Map { key, value } => Ok(ParsedType::map(
            resolve_type(key)?,
            resolve_type(value)?,
        )),
        TypeExpr::Ellipsis(elem) => Ok(ParsedType::variadic(resolve_type(elem)?)),
        TypeExpr::Interface { empty: true } => Ok(ParsedType::interface()),
        TypeExpr::Interface { empty: false } => Err(UnsupportedType::interface()),
        TypeExpr::Chan { .. } => Err(UnsupportedType::channel()),
        TypeExpr::Func { .. } => Err(UnsupportedType::function()),
        TypeExpr::Struct(_) => Err(UnsupportedType::new(
            "struct",
            "anonymous struct types cannot be exposed via cgo",
        )),
        TypeExpr::Generic { .. } => Err(generic_unsupported()),
    }
}

fn ident_type(name: &str) -> ParsedType {
    match name {
        "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16" | "uint32"
        | "uint64" | "float32" | "float64" | "bool" | "byte" | "rune" | "uintptr" => {
            ParsedType::primitive(name)
        }
        "string" => ParsedType::string(),
        "error" => ParsedType::error(),
        "any" => ParsedType::interface(),
        _ => ParsedType::structure(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobridge_ir::TypeKind;
    use pretty_assertions::assert_eq;

    fn extract(src: &str) -> (ParsedPackage, ExtractReport) {
        extract_sources(&[("pkg.go", src)], &ExtractOptions::default()).unwrap()
    }

    #[test]
    fn test_visibility_filter() {
        let (pkg, report) = extract(
            "package demo\n\
             func Add(a, b int) int { return a + b }\n\
             func helper() {}\n\
             type Point struct { X int; y int }\n\
             type hidden struct { Z int }\n\
             func (p *Point) Scale(f int) {}\n\
             func (p *Point) reset() {}\n\
             func (h *hidden) Visible() {}\n",
        );
        assert_eq!(pkg.name, "demo");
        let funcs: Vec<_> = pkg.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(funcs, vec!["Add"]);
        assert_eq!(pkg.structs.len(), 1);
        let point = &pkg.structs[0];
        let fields: Vec<_> = point.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fields, vec!["X"]);
        let methods: Vec<_> = point.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["Scale"]);
        assert!(report.is_clean());
    }

    #[test]
    fn test_type_classification() {
        let (pkg, _) = extract(
            "package demo\n\
             func F(a int, b string, c error, d Point, e *Point, f []byte, g [3]int, h map[string]int, i interface{}, j any, k time.Time) {}\n",
        );
        let kinds: Vec<TypeKind> = pkg.functions[0].params.iter().map(|p| p.ty.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TypeKind::Primitive,
                TypeKind::String,
                TypeKind::Error,
                TypeKind::Struct,
                TypeKind::Pointer,
                TypeKind::Slice,
                TypeKind::Array,
                TypeKind::Map,
                TypeKind::Interface,
                TypeKind::Interface,
                TypeKind::Struct,
            ]
        );
        let params = &pkg.functions[0].params;
        assert_eq!(params[6].ty.size, Some(3));
        assert_eq!(params[10].ty.name, "Time");
        assert_eq!(params[10].ty.package_path.as_deref(), Some("time"));
    }

    #[test]
    fn test_constant_array_length_stays_unknown() {
        let (pkg, report) = extract("package demo\nconst N = 4\nfunc Sum(xs [N]int, ys [0]int) int { return 0 }\n");
        let params = &pkg.functions[0].params;
        assert_eq!(params[0].ty.kind, TypeKind::Array);
        assert_eq!(params[0].ty.size, None);
        assert_eq!(params[1].ty.size, Some(0));
        assert!(report.is_clean());
    }

    #[test]
    fn test_unsupported_param_drops_function_only() {
        let (pkg, report) = extract(
            "package demo\n\
             func Listen(ch chan int) {}\n\
             func Apply(fn func(int) int) {}\n\
             func Read(r interface{ Read() }) {}\n\
             func Keep() {}\n",
        );
        let funcs: Vec<_> = pkg.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(funcs, vec!["Keep"]);
        let dropped: Vec<_> = report.dropped.iter().map(|d| d.symbol.as_str()).collect();
        assert_eq!(dropped, vec!["Listen", "Apply", "Read"]);
        assert!(report.dropped[0].reason.contains("channels cannot be exposed"));
    }

    #[test]
    fn test_unsupported_field_drops_field_only() {
        let (pkg, report) = extract(
            "package demo\n\
             type Worker struct {\n\
             \tID int\n\
             \tJobs chan string\n\
             \tOnDone func()\n\
             \tName string\n\
             }\n",
        );
        let fields: Vec<_> = pkg.structs[0].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fields, vec!["ID", "Name"]);
        assert_eq!(report.dropped.len(), 2);
        assert_eq!(report.dropped[0].symbol, "Worker.Jobs");
    }

    #[test]
    fn test_strict_mode_fails_on_first_drop() {
        let opts = ExtractOptions {
            strict: true,
            ..Default::default()
        };
        let err = extract_sources(&[("a.go", "package demo\nfunc Listen(ch chan int) {}\n")], &opts)
            .unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported { ref symbol, .. } if symbol == "Listen"));
    }

    #[test]
    fn test_methods_attach_across_files() {
        let files = [
            ("a_methods.go", "package demo\nfunc (p Point) Len() int { return 0 }\n"),
            ("b_types.go", "package demo\ntype Point struct { X int }\n"),
        ];
        let (pkg, report) = extract_sources(&files, &ExtractOptions::default()).unwrap();
        let method = &pkg.structs[0].methods[0];
        assert_eq!(method.name, "Len");
        assert_eq!(method.receiver_name, "p");
        assert!(!method.receiver_is_ptr);
        assert_eq!(report.files, vec!["a_methods.go", "b_types.go"]);
    }

    #[test]
    fn test_variadic_is_flagged() {
        let (pkg, _) = extract("package demo\nfunc Sum(base int, xs ...int) int { return 0 }\n");
        let f = &pkg.functions[0];
        assert!(f.is_variadic);
        assert_eq!(f.params[1].ty.name, "...int");
    }

    #[test]
    fn test_generics_and_anonymous_structs_are_rejected() {
        let (pkg, report) = extract(
            "package demo\n\
             func Map[T any](xs []T) []T { return xs }\n\
             type Box[T any] struct { V T }\n\
             func Pair() struct{ A int } { return struct{ A int }{} }\n\
             func Wrap(l List[int]) {}\n",
        );
        assert!(pkg.functions.is_empty());
        assert!(pkg.structs.is_empty());
        let dropped: Vec<_> = report.dropped.iter().map(|d| d.symbol.as_str()).collect();
        assert_eq!(dropped, vec!["Map", "Box", "Pair", "Wrap"]);
    }

    #[test]
    fn test_embedded_fields_and_tags() {
        let (pkg, _) = extract(
            "package demo\n\
             type Base struct { ID int }\n\
             type Item struct {\n\
             \t*Base\n\
             \tName string `json:\"name\"`\n\
             }\n",
        );
        let item = pkg.find_struct("Item").unwrap();
        assert_eq!(item.fields[0].name, "Base");
        assert_eq!(item.fields[0].ty.name, "*Base");
        assert_eq!(item.fields[1].tag, "`json:\"name\"`");
    }

    #[test]
    fn test_struct_doc_prefers_decl_doc() {
        let (pkg, _) = extract(
            "package demo\n\n// Point is a 2D point.\ntype Point struct{ X int }\n\n// Shapes group.\ntype (\n\t// Circle doc.\n\tCircle struct{ R float64 }\n\tSquare struct{ S float64 }\n)\n",
        );
        assert_eq!(pkg.find_struct("Point").unwrap().doc, "Point is a 2D point.\n");
        assert_eq!(pkg.find_struct("Circle").unwrap().doc, "Shapes group.\n");
        assert_eq!(pkg.find_struct("Square").unwrap().doc, "Shapes group.\n");
    }

    #[test]
    fn test_test_package_is_skipped() {
        let files = [
            ("x.go", "package demo_test\nfunc TestX() {}\n"),
            ("y.go", "package demo\nfunc Y() {}\n"),
        ];
        let (pkg, _) = extract_sources(&files, &ExtractOptions::default()).unwrap();
        assert_eq!(pkg.name, "demo");

        let only_tests = [("x.go", "package demo_test\n")];
        let err = extract_sources(&only_tests, &ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, ExtractError::NoNonTestPackage(_)));
    }

    #[test]
    fn test_syntax_error_aborts() {
        let err = extract_sources(&[("bad.go", "package demo\nfunc (\n")], &ExtractOptions::default())
            .unwrap_err();
        assert!(matches!(err, ExtractError::Syntax { ref file, .. } if file == "bad.go"));
    }

    #[test]
    fn test_empty_input_has_no_package() {
        let err = extract_sources(&[], &ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, ExtractError::NoPackage(_)));
    }
}
