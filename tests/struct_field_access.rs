//! Declaring a struct, taking the address of a field, and reading one
//! through `.`.

use inkwell::context::Context;

#[test]
fn struct_field_read_and_write() {
    let source = r#"
        struct Point {
            I64 x;
            I64 y;
        }

        fn make_y(Point* p) -> I64 {
            p->y = p->x;
            return p->y;
        }
    "#;
    let context = Context::create();
    let (translator, outcome) =
        craeft::driver::compile(&context, "structs", "structs.cr", source).expect("driver error");
    assert!(outcome.successful);
    translator.validate().expect("module should verify");

    let ir = translator.module().print_to_string().to_string();
    assert!(ir.contains("%Point = type { i64, i64 }"));
    assert!(ir.contains("getelementptr"));
}

#[test]
fn unknown_field_is_a_type_error() {
    let source = r#"
        struct Point {
            I64 x;
        }

        fn bad(Point* p) -> I64 {
            return p->z;
        }
    "#;
    let context = Context::create();
    let (_translator, outcome) =
        craeft::driver::compile(&context, "structs_bad", "structs_bad.cr", source).expect("driver error");
    assert!(!outcome.successful);
}
