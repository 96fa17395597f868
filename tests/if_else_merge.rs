//! An `if`/`else` whose branches both return, and one where control falls
//! through to a shared merge block.

use inkwell::context::Context;

#[test]
fn both_branches_return() {
    let source = r#"
        fn abs(I64 x) -> I64 {
            if x < (I64)0 {
                return (I64)0 - x;
            } else {
                return x;
            }
        }
    "#;
    let context = Context::create();
    let (translator, outcome) =
        craeft::driver::compile(&context, "ifelse", "ifelse.cr", source).expect("driver error");
    assert!(outcome.successful);
    translator.validate().expect("module should verify");

    let ir = translator.module().print_to_string().to_string();
    assert!(ir.contains("br i1"));
    assert!(ir.contains("then"));
    assert!(ir.contains("else"));
}

#[test]
fn falls_through_to_merge_block() {
    let source = r#"
        fn clamp(I64 x) -> I64 {
            I64 result = x;
            if x < (I64)0 {
                result = (I64)0;
            }
            return result;
        }
    "#;
    let context = Context::create();
    let (translator, outcome) =
        craeft::driver::compile(&context, "merge", "merge.cr", source).expect("driver error");
    assert!(outcome.successful);
    translator.validate().expect("module should verify");

    let ir = translator.module().print_to_string().to_string();
    assert!(ir.contains("merge"));
}
