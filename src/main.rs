//! Command-line front-end, mirroring
//! `examples/original_source/src/craeftc.cpp`'s option set and exit-code
//! semantics: 0 on success, 1 for a usage error or unreadable input, 2 for
//! a compilation error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use inkwell::context::Context;
use log::LevelFilter;

use craeft::driver::{compile, emit, EmissionRequest};

/// Craeft compiler.
#[derive(ClapParser, Debug)]
#[command(name = "craeftc", about = "Compile a Craeft source file")]
struct Cli {
    /// Source file to compile.
    input: PathBuf,

    /// Emit an object file at this path.
    #[arg(short = 'c', long = "obj")]
    obj: Option<PathBuf>,

    /// Emit an assembly file at this path.
    #[arg(short = 's', long = "asm")]
    asm: Option<PathBuf>,

    /// Emit textual LLVM IR at this path.
    #[arg(long = "ll")]
    ll: Option<PathBuf>,

    /// Optimization level.
    #[arg(short = 'O', long = "opt", default_value_t = 0)]
    opt: u32,

    /// Increase log verbosity (repeatable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .init()
        .ok();

    if cli.obj.is_none() && cli.asm.is_none() && cli.ll.is_none() {
        eprintln!("craeftc: at least one of --obj, --asm, --ll is required");
        return ExitCode::from(1);
    }

    let source = match std::fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("craeftc: could not read {}: {e}", cli.input.display());
            return ExitCode::from(1);
        }
    };

    let file_name = cli.input.to_string_lossy().to_string();
    let context = Context::create();
    let module_name = cli
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "craeft_module".to_string());

    let (translator, outcome) = match compile(&context, &module_name, &file_name, &source) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("craeftc: {e}");
            return ExitCode::from(2);
        }
    };

    if !outcome.successful {
        return ExitCode::from(2);
    }

    let req = EmissionRequest {
        obj: cli.obj.as_deref(),
        asm: cli.asm.as_deref(),
        ir: cli.ll.as_deref(),
        opt_level: cli.opt,
    };

    if let Err(e) = emit(&translator, &req) {
        eprintln!("craeftc: {e}");
        return ExitCode::from(2);
    }

    ExitCode::from(0)
}
