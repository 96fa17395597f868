//! Implicit and explicit integer widening: an explicit cast widening `I32`
//! to `I64` before an add, and the binary operators widening a mismatched
//! pair themselves (`U8 + U64` -> `U64`) rather than rejecting the mix.

use inkwell::context::Context;

#[test]
fn widens_and_adds() {
    let source = r#"
        fn add_widened(I32 a, I64 b) -> I64 {
            I64 wide = (I64)a;
            return wide + b;
        }
    "#;
    let context = Context::create();
    let (translator, outcome) =
        craeft::driver::compile(&context, "arith", "arith.cr", source).expect("driver error");
    assert!(outcome.successful);
    translator.validate().expect("module should verify");

    let ir = translator.module().print_to_string().to_string();
    assert!(ir.contains("define"));
    assert!(ir.contains("sext"));
    assert!(ir.contains("add"));
}

#[test]
fn mismatched_widths_widen_instead_of_erroring() {
    let source = r#"
        fn add(U8 a, U64 b) -> U64 {
            return a + b;
        }
    "#;
    let context = Context::create();
    let (translator, outcome) =
        craeft::driver::compile(&context, "arith_widen", "arith_widen.cr", source)
            .expect("driver error");
    assert!(outcome.successful);
    translator.validate().expect("module should verify");

    let ir = translator.module().print_to_string().to_string();
    assert!(ir.contains("zext"));
    assert!(ir.contains("add"));
}
