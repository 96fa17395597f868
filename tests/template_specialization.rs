//! A generic `fn id<: T :>` is specialized once per concrete argument type
//! encountered at a call site, mangled distinctly per specialization.

use inkwell::context::Context;

#[test]
fn specializes_once_per_instantiation() {
    let source = r#"
        fn id<: T :>(T x) -> T {
            return x;
        }

        fn use_both(I32 a, I64 b) -> I64 {
            I32 ia = id<: I32 :>(a);
            I64 ib = id<: I64 :>(b);
            return ib;
        }
    "#;
    let context = Context::create();
    let (translator, outcome) =
        craeft::driver::compile(&context, "templates", "templates.cr", source).expect("driver error");
    assert!(outcome.successful);
    translator.validate().expect("module should verify");

    let ir = translator.module().print_to_string().to_string();
    // Two distinct mangled specializations should have been emitted, one
    // per concrete instantiation of `id`.
    let id_defs = ir.matches("define").count();
    assert!(id_defs >= 3, "expected use_both plus two specializations, got IR:\n{ir}");
    assert!(ir.contains("id$"));
}

#[test]
fn repeated_instantiation_of_the_same_type_emits_one_body() {
    let source = r#"
        fn id<: T :>(T x) -> T {
            return x;
        }

        fn f(I32 a, I32 b) {
            id<: I32 :>(a);
            id<: I32 :>(b);
        }
    "#;
    let context = Context::create();
    let (translator, outcome) =
        craeft::driver::compile(&context, "templates_dedup", "templates_dedup.cr", source)
            .expect("driver error");
    assert!(outcome.successful);
    // A malformed module (two bodies on one symbol) fails verification.
    translator.validate().expect("module should verify");

    let ir = translator.module().print_to_string().to_string();
    let bodies = ir
        .lines()
        .filter(|l| l.contains("define") && l.contains("id$"))
        .count();
    assert_eq!(
        bodies, 1,
        "expected exactly one specialization body of id<:I32:>, got IR:\n{ir}"
    );
}

#[test]
fn wrong_arity_template_args_is_an_error() {
    let source = r#"
        fn pair<: A, B :>(A a, B b) -> A {
            return a;
        }

        fn bad(I32 a) -> I32 {
            return pair<: I32 :>(a);
        }
    "#;
    let context = Context::create();
    let (_translator, outcome) =
        craeft::driver::compile(&context, "templates_bad", "templates_bad.cr", source)
            .expect("driver error");
    assert!(!outcome.successful);
}
