//! Taking a reference, dereferencing, and storing through a pointer.

use inkwell::context::Context;

#[test]
fn reference_store_and_load_round_trip() {
    let source = r#"
        fn increment(I64 x) -> I64 {
            I64 y = x;
            I64* p = &y;
            *p = *p + (I64)1;
            return *p;
        }
    "#;
    let context = Context::create();
    let (translator, outcome) =
        craeft::driver::compile(&context, "ptrs", "ptrs.cr", source).expect("driver error");
    assert!(outcome.successful);
    translator.validate().expect("module should verify");

    let ir = translator.module().print_to_string().to_string();
    assert!(ir.contains("alloca"));
    assert!(ir.contains("store"));
    assert!(ir.contains("load"));
}

#[test]
fn pointer_plus_int_offsets_via_gep() {
    let source = r#"
        fn at(I8* p, I64 i) -> I8* {
            return p + i;
        }
    "#;
    let context = Context::create();
    let (translator, outcome) =
        craeft::driver::compile(&context, "ptr_off", "ptr_off.cr", source).expect("driver error");
    assert!(outcome.successful);
    translator.validate().expect("module should verify");

    let ir = translator.module().print_to_string().to_string();
    assert!(ir.contains("getelementptr"));
}

#[test]
fn pointer_minus_pointer_is_an_element_count() {
    let source = r#"
        fn distance(I8* a, I8* b) -> I64 {
            return a - b;
        }
    "#;
    let context = Context::create();
    let (translator, outcome) =
        craeft::driver::compile(&context, "ptr_diff", "ptr_diff.cr", source).expect("driver error");
    assert!(outcome.successful);
    translator.validate().expect("module should verify");

    let ir = translator.module().print_to_string().to_string();
    assert!(ir.contains("ptrtoint"));
    assert!(ir.contains("sub"));
}

#[test]
fn subtracting_pointers_of_different_pointees_is_a_type_error() {
    let source = r#"
        fn bad(I8* a, I64* b) -> I64 {
            return a - b;
        }
    "#;
    let context = Context::create();
    let (_translator, outcome) =
        craeft::driver::compile(&context, "ptr_diff_bad", "ptr_diff_bad.cr", source)
            .expect("driver error");
    assert!(!outcome.successful);
}

#[test]
fn dereferencing_a_non_pointer_is_a_type_error() {
    let source = r#"
        fn bad(I64 x) -> I64 {
            return *x;
        }
    "#;
    let context = Context::create();
    let (_translator, outcome) =
        craeft::driver::compile(&context, "ptrs_bad", "ptrs_bad.cr", source).expect("driver error");
    assert!(!outcome.successful);
}
