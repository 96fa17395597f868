//! A malformed program produces a tagged, positioned diagnostic rather than
//! a panic, and the driver reports an unsuccessful outcome.

use inkwell::context::Context;

#[test]
fn undeclared_variable_is_a_name_error() {
    let source = r#"
        fn bad() -> I64 {
            return missing;
        }
    "#;
    let context = Context::create();
    let (_translator, outcome) =
        craeft::driver::compile(&context, "names_bad", "names_bad.cr", source).expect("driver error");
    assert!(!outcome.successful);
}

#[test]
fn malformed_syntax_is_a_parser_error_not_a_panic() {
    let source = r#"
        fn bad(I64 x -> I64 {
            return x;
        }
    "#;
    let context = Context::create();
    let (_translator, outcome) =
        craeft::driver::compile(&context, "parse_bad", "parse_bad.cr", source).expect("driver error");
    assert!(!outcome.successful);
}

#[test]
fn emit_formats_caret_under_offending_column() {
    use craeft::diagnostics::CraeftError;

    let context = Context::create();
    let err = CraeftError::name(
        "variable \"missing\" not found",
        craeft::diagnostics::SourcePos {
            file: "names_bad.cr".into(),
            line: 3,
            column: 20,
        },
    );
    let _ = context; // keep the Context alive for parity with the other tests
    let rendered = err.emit(Some("            return missing;"));
    assert!(rendered.contains("name error"));
    assert!(rendered.contains('^'));
}
