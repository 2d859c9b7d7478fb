use std::path::PathBuf;

use gobridge_extract::{parse_package, ExtractError, ExtractOptions};
use gobridge_ir::{ParsedPackage, TypeKind};
use pretty_assertions::assert_eq;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("fixtures")
}

fn load(fixture: &str) -> (ParsedPackage, gobridge_extract::ExtractReport) {
    let path = fixtures_dir().join(fixture);
    parse_package(&path, &ExtractOptions::default())
        .unwrap_or_else(|e| panic!("Failed to extract fixture '{}': {}", fixture, e))
}

#[test]
fn test_simple_fixture() {
    let (pkg, report) = load("simple");

    assert_eq!(pkg.name, "simple");
    assert!(pkg.dir.is_absolute());

    let funcs: Vec<_> = pkg.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(funcs, vec!["Add", "Greet", "Divide", "Sum", "NewPoint"]);

    let add = pkg.find_function("Add").unwrap();
    assert_eq!(add.doc, "Add adds two integers\n");
    assert_eq!(add.params.len(), 2);
    assert_eq!(add.params[1].name, "b");

    assert!(pkg.find_function("Sum").unwrap().is_variadic);

    // Test files are never read
    assert_eq!(report.files, vec!["point.go", "simple.go"]);
    assert!(report.is_clean());
}

#[test]
fn test_simple_methods_come_from_another_file() {
    let (pkg, _) = load("simple");

    assert_eq!(pkg.structs.len(), 1);
    let point = &pkg.structs[0];
    assert_eq!(point.name, "Point");
    assert_eq!(point.doc, "Point represents a 2D point\n");

    let methods: Vec<_> = point
        .methods
        .iter()
        .map(|m| (m.name.as_str(), m.receiver_is_ptr))
        .collect();
    assert_eq!(
        methods,
        vec![("Distance", true), ("Scale", true), ("Translated", false)]
    );
}

#[test]
fn test_complex_fixture_kinds() {
    let (pkg, _) = load("complex");
    let config = pkg.find_struct("Config").unwrap();

    let fields: Vec<_> = config
        .fields
        .iter()
        .map(|f| (f.name.as_str(), f.ty.kind))
        .collect();
    assert_eq!(
        fields,
        vec![
            ("Name", TypeKind::String),
            ("Values", TypeKind::Slice),
            ("Data", TypeKind::Array),
            ("Options", TypeKind::Map),
            ("Payload", TypeKind::Slice),
            ("Parent", TypeKind::Pointer),
            ("Extra", TypeKind::Interface),
        ]
    );
    assert_eq!(config.fields[0].tag, "`json:\"name\"`");
    assert_eq!(config.fields[2].ty.size, Some(5));

    let split = pkg.find_function("Split").unwrap();
    let results: Vec<_> = split.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(results, vec!["head", "tail", "err"]);
    assert_eq!(split.results[2].ty.kind, TypeKind::Error);
}

#[test]
fn test_unsupported_fixture_drops_symbols() {
    let (pkg, report) = load("unsupported");

    let funcs: Vec<_> = pkg.functions.iter().map(|f| f.name.as_str()).collect();
    // Variadic functions survive extraction; emitters drop them.
    assert_eq!(funcs, vec!["Join", "Ping"]);

    let worker = pkg.find_struct("Worker").unwrap();
    let fields: Vec<_> = worker.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(fields, vec!["ID", "Name"]);
    let methods: Vec<_> = worker.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(methods, vec!["Start"]);

    let dropped: Vec<_> = report.dropped.iter().map(|d| d.symbol.as_str()).collect();
    assert_eq!(
        dropped,
        vec![
            "Worker.Jobs",
            "Worker.OnDone",
            "Subscribe",
            "Stream",
            "Apply",
            "Log",
            "Worker.Results"
        ]
    );
}

#[test]
fn test_strict_mode_rejects_unsupported_fixture() {
    let opts = ExtractOptions {
        strict: true,
        verbose: true,
    };
    let err = parse_package(&fixtures_dir().join("unsupported"), &opts).unwrap_err();
    assert!(matches!(err, ExtractError::Unsupported { .. }));
}

#[test]
fn test_missing_directory() {
    let err = parse_package(
        &fixtures_dir().join("does-not-exist"),
        &ExtractOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ExtractError::DirectoryNotFound(_)));
}

#[test]
fn test_directory_without_go_files() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("README.md"), "# nothing here\n").unwrap();
    std::fs::write(tmp.path().join("x_test.go"), "package x\n").unwrap();

    let err = parse_package(tmp.path(), &ExtractOptions::default()).unwrap_err();
    assert!(matches!(err, ExtractError::NoPackage(_)));
}

#[test]
fn test_syntax_error_names_the_file() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("ok.go"), "package demo\n\nfunc Ok() {}\n").unwrap();
    std::fs::write(tmp.path().join("broken.go"), "package demo\n\nfunc Broken( {\n").unwrap();

    let err = parse_package(tmp.path(), &ExtractOptions::default()).unwrap_err();
    match err {
        ExtractError::Syntax { file, line, .. } => {
            assert_eq!(file, "broken.go");
            assert_eq!(line, 3);
        }
        other => panic!("expected syntax error, got {other}"),
    }
}
