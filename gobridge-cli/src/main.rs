mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use gobridge_codegen::{generate_project, BuildSystem, GeneratedProject, PluginOptions};
use gobridge_extract::{parse_package, ExtractOptions, ExtractReport};
use gobridge_ir::{ParsedPackage, ParsedParam};

use crate::config::{infer_import_path, FileConfig};

#[derive(Parser)]
#[command(name = "gobridge", about = "gobridge: expose Go packages to C and Python")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate glue code for a Go package
    Generate(GenerateArgs),
    /// Show what gobridge extracts from a Go package
    Inspect {
        /// Package directory (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Dump the IR as JSON
        #[arg(long)]
        json: bool,
        /// Log skipped symbols
        #[arg(short, long)]
        verbose: bool,
    },
    /// List registered plugins
    Plugins,
}

#[derive(Args, Debug, Clone, Default)]
struct GenerateArgs {
    /// Package directory (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,
    /// Plugin to run (default: cgo)
    #[arg(short, long)]
    plugin: Option<String>,
    /// Output file, or output directory with --packaging
    /// (default: <path>/<plugin>_plugin)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Import path of the package (default: inferred from go.mod)
    #[arg(short, long)]
    import_path: Option<String>,
    /// Shared library name (default: lib<package>)
    #[arg(long)]
    lib_name: Option<String>,
    /// Python build system: setuptools, hatch, poetry or uv
    #[arg(long)]
    build_system: Option<String>,
    /// Also write packaging metadata next to the generated module
    #[arg(long)]
    packaging: bool,
    /// Fail on the first unsupported symbol instead of skipping it
    #[arg(long)]
    strict: bool,
    /// Log skipped symbols and progress
    #[arg(short, long)]
    verbose: bool,
    /// Config file (default: <path>/gobridge.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Effective generate settings: flags over `gobridge.json` over defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    plugin: String,
    import_path: Option<String>,
    output: Option<PathBuf>,
    packaging: bool,
    extract: ExtractOptions,
    options: PluginOptions,
}

impl Settings {
    fn resolve(args: &GenerateArgs, file: FileConfig) -> Self {
        let verbose = args.verbose || file.verbose.unwrap_or(false);
        let build_system = args
            .build_system
            .as_deref()
            .or(file.build_system.as_deref())
            .map(BuildSystem::from_name)
            .unwrap_or_default();
        Self {
            plugin: args
                .plugin
                .clone()
                .or(file.plugin)
                .unwrap_or_else(|| "cgo".to_string()),
            import_path: args.import_path.clone().or(file.import_path),
            output: args.output.clone().or(file.output),
            packaging: args.packaging || file.packaging.unwrap_or(false),
            extract: ExtractOptions {
                verbose,
                strict: args.strict || file.strict.unwrap_or(false),
            },
            options: PluginOptions {
                verbose,
                library_name: args.lib_name.clone().or(file.library_name),
                build_system,
            },
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbose = match &cli.command {
        Command::Generate(args) => args.verbose,
        Command::Inspect { verbose, .. } => *verbose,
        Command::Plugins => false,
    };
    init_logging(verbose);

    let result = match cli.command {
        Command::Generate(args) => cmd_generate(&args),
        Command::Inspect {
            path,
            json,
            verbose,
        } => cmd_inspect(&path, json, verbose),
        Command::Plugins => cmd_plugins(),
    };

    match result {
        Ok(success) => {
            if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::from(1)
        }
    }
}

/// `RUST_LOG` wins; otherwise info when verbose, warn when not.
fn init_logging(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn cmd_generate(args: &GenerateArgs) -> Result<bool> {
    let path = args.path.as_path();
    let file = FileConfig::discover(path, args.config.as_deref())?;
    let settings = Settings::resolve(args, file);

    println!(
        "{} {}",
        "Extracting".bold(),
        path.canonicalize()
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
    );

    let (mut pkg, report) = load_package(path, &settings.extract)?;
    set_import_path(&mut pkg, settings.import_path.clone());
    if settings.extract.verbose {
        print_dropped(&report);
    }

    let plugin = gobridge_codegen::global().get(&settings.plugin, &settings.options)?;
    let project = generate_project(plugin.as_ref(), &pkg, settings.packaging)
        .with_context(|| format!("Failed to generate {} glue", plugin.name()))?;

    let default_dir = path.join(format!("{}_plugin", plugin.name()));
    let written = write_output(
        &project,
        settings.output.as_deref(),
        &default_dir,
        settings.packaging,
    )?;

    println!(
        "{} Generated {} glue for package {} ({} function(s), {} struct(s))",
        "✓".green().bold(),
        plugin.name(),
        pkg.name.bold(),
        pkg.functions.len(),
        pkg.structs.len(),
    );
    for file_path in &written {
        println!("  {} {}", "→".dimmed(), file_path.display());
    }

    if plugin.name() == "cgo" {
        if let Some(main_go) = written.first() {
            println!();
            println!("To build as shared library:");
            println!(
                "  {} go build -buildmode=c-shared -o {}.so {}",
                "CGO_ENABLED=1".dimmed(),
                settings.options.library_name_for(&pkg.name),
                main_go.display()
            );
        }
    }

    Ok(true)
}

fn load_package(path: &Path, opts: &ExtractOptions) -> Result<(ParsedPackage, ExtractReport)> {
    parse_package(path, opts)
        .with_context(|| format!("Failed to extract package at '{}'", path.display()))
}

/// An explicit import path wins, then go.mod inference, then the package
/// name.
fn set_import_path(pkg: &mut ParsedPackage, explicit: Option<String>) {
    if let Some(import_path) = explicit.filter(|p| !p.is_empty()) {
        pkg.import_path = import_path;
        return;
    }
    match infer_import_path(&pkg.dir) {
        Some(import_path) => {
            log::info!("import path {import_path} (from go.mod)");
            pkg.import_path = import_path;
        }
        None => log::warn!(
            "could not determine the import path of {}; pass --import-path",
            pkg.name
        ),
    }
}

/// Write the project. A single artifact goes to `output` as a file; with
/// packaging, `output` is the root directory.
fn write_output(
    project: &GeneratedProject,
    output: Option<&Path>,
    default_dir: &Path,
    packaging: bool,
) -> Result<Vec<PathBuf>> {
    if packaging {
        let dir = output.unwrap_or(default_dir);
        project
            .write_to_disk(dir)
            .with_context(|| format!("Failed to write to '{}'", dir.display()))?;
        return Ok(project.files().keys().map(|rel| dir.join(rel)).collect());
    }

    let Some((rel, content)) = project.files().iter().next() else {
        anyhow::bail!("plugin produced no output");
    };
    let target = match output {
        Some(file) => file.to_path_buf(),
        None => default_dir.join(rel),
    };
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory '{}'", parent.display()))?;
    }
    std::fs::write(&target, content)
        .with_context(|| format!("Failed to write '{}'", target.display()))?;
    Ok(vec![target])
}

fn print_dropped(report: &ExtractReport) {
    for dropped in &report.dropped {
        println!(
            "  {} skipped {}: {}",
            "!".yellow().bold(),
            dropped.symbol,
            dropped.reason.dimmed()
        );
    }
}

fn cmd_inspect(path: &Path, json: bool, verbose: bool) -> Result<bool> {
    let (mut pkg, report) = load_package(
        path,
        &ExtractOptions {
            verbose,
            strict: false,
        },
    )?;
    set_import_path(&mut pkg, None);

    if json {
        let dump = serde_json::json!({
            "package": pkg,
            "files": report.files,
            "dropped": report.dropped,
        });
        println!("{}", serde_json::to_string_pretty(&dump)?);
        return Ok(true);
    }

    println!("{}", "Package".bold().underline());
    println!("  Name:        {}", pkg.name);
    println!("  Import path: {}", pkg.effective_import_path());
    println!("  Files:       {}", report.files.join(", "));

    if !pkg.functions.is_empty() {
        println!();
        println!("{}", "Functions".bold().underline());
        for func in &pkg.functions {
            let variadic = if func.is_variadic {
                " (variadic)".dimmed().to_string()
            } else {
                String::new()
            };
            println!(
                "  {}({}){}{}",
                func.name,
                param_list(&func.params),
                result_list(&func.results),
                variadic
            );
        }
    }

    if !pkg.structs.is_empty() {
        println!();
        println!("{}", "Structs".bold().underline());
        for def in &pkg.structs {
            println!(
                "  {} ({} field(s), {} method(s))",
                def.name,
                def.exported_fields().count(),
                def.methods.len()
            );
            for field in def.exported_fields() {
                println!("    {} {}", field.name, field.ty.name.dimmed());
            }
            for method in &def.methods {
                let recv = if method.receiver_is_ptr { "*" } else { "" };
                println!(
                    "    ({recv}{}) {}({}){}",
                    method.receiver_type,
                    method.name,
                    param_list(&method.params),
                    result_list(&method.results)
                );
            }
        }
    }

    if !report.dropped.is_empty() {
        println!();
        println!("{}", "Skipped".bold().underline());
        print_dropped(&report);
    }

    Ok(true)
}

fn param_list(params: &[ParsedParam]) -> String {
    params
        .iter()
        .map(|p| {
            if p.name.is_empty() {
                p.ty.name.clone()
            } else {
                format!("{} {}", p.name, p.ty.name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn result_list(results: &[ParsedParam]) -> String {
    match results {
        [] => String::new(),
        [single] if single.name.is_empty() => format!(" {}", single.ty.name),
        _ => format!(" ({})", param_list(results)),
    }
}

fn cmd_plugins() -> Result<bool> {
    println!("{}", "Plugins".bold().underline());
    for name in gobridge_codegen::global().list() {
        println!("  {} {}", "→".dimmed(), name);
    }
    Ok(true)
}
