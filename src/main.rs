//! msgbridge CLI entry point.

mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Command};
use msgbridge::pipeline::{emit_object, transform_with_diagnostics};
use msgbridge::BridgeDatabaseImpl;
use msgbridge_core::TargetInfo;
use msgbridge_model::printer::print_type;
use msgbridge_passes::BridgeConfig;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Transform {
            file,
            target,
            no_generic_dispatch,
            print,
            emit_object,
            framework,
        } => transform(&file, target.as_deref(), !no_generic_dispatch, print, emit_object, framework),
        Command::Selectors { file } => selectors(&file),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn target_info(triple: Option<&str>) -> Result<TargetInfo, ExitCode> {
    let target = match triple {
        Some(triple) => TargetInfo::parse(triple),
        None => TargetInfo::host(),
    };
    target.map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::FAILURE
    })
}

fn transform(
    path: &Path,
    triple: Option<&str>,
    generic_dispatch: bool,
    print: bool,
    object_out: Option<PathBuf>,
    framework: bool,
) -> ExitCode {
    let target = match target_info(triple) {
        Ok(target) => target,
        Err(code) => return code,
    };
    let config = BridgeConfig::for_target(&target).with_generic_dispatch(generic_dispatch);
    let db = BridgeDatabaseImpl::default();
    let source = match db.input(path.to_path_buf(), config) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let report = transform_with_diagnostics(&db, source);
    for diagnostic in &report.diagnostics {
        eprintln!("{diagnostic}");
    }
    let output = report.output;

    if print {
        for name in output.transformed() {
            if let Some(decl) = output.class_path.get(name) {
                println!("{}", print_type(decl));
            }
        }
    }

    if let Some(out) = object_out {
        let bytes = match emit_object(output, &target, framework) {
            Ok(bytes) => bytes,
            Err(diagnostic) => {
                eprintln!("{diagnostic}");
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = std::fs::write(&out, bytes) {
            eprintln!("error: cannot write {}: {e}", out.display());
            return ExitCode::FAILURE;
        }
        println!("wrote {} descriptor(s) to {}", output.exports.len(), out.display());
    }

    println!(
        "transformed {} type(s), {} failed",
        output.selectors.len(),
        output.failed.len()
    );
    if report.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn selectors(path: &Path) -> ExitCode {
    let db = BridgeDatabaseImpl::default();
    let source = match db.input(path.to_path_buf(), BridgeConfig::default()) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let report = transform_with_diagnostics(&db, source);
    for diagnostic in &report.diagnostics {
        eprintln!("{diagnostic}");
    }
    for (name, selectors) in &report.output.selectors {
        if selectors.is_empty() {
            continue;
        }
        println!("{name}:");
        for selector in selectors {
            println!("  {selector}");
        }
    }
    if report.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
