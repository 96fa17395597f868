//! The compilation driver: reads one source file, drives the parser and
//! translator toplevel-form by toplevel-form, and exposes the three
//! emission kinds. Grounded on
//! `examples/original_source/src/craeftc.cpp`'s `handle_input`/`main` loop.
//! Unlike the original, this driver stops at the first bad toplevel form: a
//! parse error leaves the lexer mid-token with no resync point, so pressing
//! on would risk an unproductive loop rather than genuinely new diagnostics.
//! Either way nothing is emitted once a form has failed.

use std::path::Path;

use inkwell::context::Context;
use log::{debug, error};

use crate::codegen::gen_toplevel;
use crate::diagnostics::CraeftError;
use crate::parser::Parser;
use crate::translator::Translator;

pub struct CompileOutcome {
    pub successful: bool,
}

/// Parses and translates toplevel forms in `source` until one fails or the
/// input is exhausted. Returns whether every form translated successfully;
/// emission must be skipped entirely if not.
pub fn compile<'ctx>(
    context: &'ctx Context,
    module_name: &str,
    file: &str,
    source: &str,
) -> Result<(Translator<'ctx>, CompileOutcome), CraeftError> {
    let mut translator = Translator::new(context, module_name)?;
    let mut parser = Parser::new(file, source)?;
    let mut successful = true;

    while !parser.at_eof() {
        let result = parser
            .parse_toplevel()
            .and_then(|item| gen_toplevel(&mut translator, &item));
        match result {
            Ok(()) => debug!("codegenned toplevel form"),
            Err(e) => {
                error!("{e}");
                eprintln!("{}", e.emit(source_line(source, &e)));
                successful = false;
                break;
            }
        }
    }

    Ok((translator, CompileOutcome { successful }))
}

fn source_line<'a>(source: &'a str, err: &CraeftError) -> Option<&'a str> {
    source.lines().nth(err.pos.line.saturating_sub(1) as usize)
}

/// Runs verification, optimization, and the requested emissions. Mirrors
/// `main`'s post-loop sequence in `craeftc.cpp`.
pub struct EmissionRequest<'a> {
    pub obj: Option<&'a Path>,
    pub asm: Option<&'a Path>,
    pub ir: Option<&'a Path>,
    pub opt_level: u32,
}

pub fn emit(translator: &Translator, req: &EmissionRequest) -> Result<(), CraeftError> {
    translator.validate()?;
    translator.optimize(req.opt_level)?;
    if let Some(path) = req.ir {
        translator.emit_ir(path)?;
    }
    if let Some(path) = req.asm {
        translator.emit_asm(path)?;
    }
    if let Some(path) = req.obj {
        translator.emit_obj(path)?;
    }
    Ok(())
}
