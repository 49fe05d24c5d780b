//! Integration tests for `print`/`printid`/`getid` desugaring into explicit
//! `printf` call trees.

use ruc::{compile, Target};

fn compile_ok(src: &str) -> String {
    compile(src, vec![], Target::X86_64).unwrap_or_else(|err| panic!("{:#}", err))
}

#[test]
fn test_print_scalar_batches_into_single_printf() {
    let ir = compile_ok(
        "
        int main() {
            int a = 1;
            int b = 2;
            print(a, b);
            return 0;
        }
        ",
    );
    // Two scalar args in one `print` call batch into one synthesized format
    // string rather than two separate printf calls.
    let printf_calls = ir.matches("call i32 @printf(").count();
    assert_eq!(printf_calls, 1);
}

#[test]
fn test_print_array_emits_loop_and_braces() {
    let ir = compile_ok(
        "
        int main() {
            int a[3] = {1, 2, 3};
            print(a);
            return 0;
        }
        ",
    );
    assert!(ir.contains("{\\00"));
    assert!(ir.contains("}\\00"));
    assert!(ir.contains("llvm.stacksave") || ir.contains("alloca [3 x i32]"));
}

#[test]
fn test_printid_prepends_name_equals() {
    let ir = compile_ok(
        "
        int main() {
            int x = 5;
            printid(x);
            return 0;
        }
        ",
    );
    assert!(ir.contains("x = %i"));
}

#[test]
fn test_printid_rejects_non_identifier_argument() {
    let err = compile(
        "int main() { printid(1 + 2); return 0; }",
        vec![],
        Target::X86_64,
    )
    .unwrap_err();
    assert!(err.to_string().contains("printid requires a plain identifier"));
}

#[test]
fn test_printf_reports_argument_count_mismatch() {
    let err = compile(
        "int main() { printf(\"%i\\n\"); return 0; }",
        vec![],
        Target::X86_64,
    )
    .unwrap_err();
    assert!(err
        .to_string()
        .contains("different number of"));
}

#[test]
fn test_printf_enforces_max_placeholder_count() {
    let placeholders = "%i ".repeat(21);
    let format_str = format!("\"{}\\n\"", placeholders);
    let args: Vec<String> = (0..21).map(|i| i.to_string()).collect();
    let src = format!(
        "int main() {{ printf({}, {}); return 0; }}",
        format_str,
        args.join(", ")
    );
    let err = compile(&src, vec![], Target::X86_64).unwrap_err();
    assert!(err.to_string().contains("Too many arguments to printf"));
}
