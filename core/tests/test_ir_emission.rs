//! Scenario tests checked against the textual IR that `ruc::compile` emits.

use ruc::{compile, Target};

fn compile_ok(src: &str) -> String {
    compile(src, vec![], Target::X86_64).unwrap_or_else(|err| panic!("{:#}", err))
}

#[test]
fn test_constant_folding_emits_folded_literal() {
    // `int x = 2 + 3;` folds to a single literal; the store target is the
    // value 5, not a runtime add.
    let ir = compile_ok("int x = 2 + 3; int main() { return x; }");
    assert!(ir.contains("store i32 5"));
    assert!(!ir.contains("add i32"));
}

#[test]
fn test_int_to_float_promotion_rewrites_literal() {
    // `float f = 1;` inserts an int->float cast and rewrites the literal.
    let ir = compile_ok("int main() { float f = 1; return 0; }");
    assert!(ir.contains("store double 1"));
}

#[test]
fn test_pointer_null_comparison_emits_icmp_without_zext() {
    let ir = compile_ok(
        "
        int main() {
            int *p;
            if (p == NULL) {
                return 1;
            }
            return 0;
        }
        ",
    );
    assert!(ir.contains("icmp eq"));
}

#[test]
fn test_dynamic_array_uses_stacksave_and_stackrestore() {
    let ir = compile_ok(
        "
        void f(int n) {
            int a[n];
            a[0] = 1;
        }
        int main() { f(3); return 0; }
        ",
    );
    assert!(ir.contains("call i8* @llvm.stacksave()"));
    assert!(ir.contains("call void @llvm.stackrestore"));
    assert!(ir.contains("alloca i32, i32"));
}

#[test]
fn test_multidimensional_array_nests_alloca_brackets() {
    // `int a[2][3];` is `Array(Array(Int))`; the alloca must nest one
    // bracket pair per dimension around the scalar base type, not flatten
    // every bound into a single pair.
    let ir = compile_ok(
        "
        int main() {
            int a[2][3];
            a[0][0] = 1;
            return 0;
        }
        ",
    );
    assert!(ir.contains("alloca [2 x [3 x i32]]"));
}

#[test]
fn test_multidimensional_global_array_nests_brackets() {
    let ir = compile_ok("int g[2][3]; int main() { return 0; }");
    assert!(ir.contains("@var.0 = global [2 x [3 x i32]] zeroinitializer"));
}

#[test]
fn test_switch_emits_icmp_dispatch_per_case() {
    let ir = compile_ok(
        "
        int main() {
            int x = 2;
            int y = 0;
            switch (x) {
                case 1:
                    y = 10;
                    break;
                case 2:
                    y = 20;
                    break;
                default:
                    y = -1;
                    break;
            }
            return y;
        }
        ",
    );
    assert!(ir.contains("icmp eq i32"));
    assert!(ir.contains("; case 1"));
    assert!(ir.contains("; case 2"));
    assert!(ir.contains("; default"));
}

#[test]
fn test_array_print_emits_braces_and_separators() {
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
    assert!(ir.contains(", \\00"));
    assert!(ir.contains("}\\00"));
}

#[test]
fn test_ternary_with_mixed_arithmetic_emits_phi_double() {
    let ir = compile_ok(
        "
        int main() {
            int y = 1;
            float z = 2;
            float r = 1 ? y : z;
            return 0;
        }
        ",
    );
    assert!(ir.contains("phi double"));
}

#[test]
fn test_target_triple_defaults_to_x86_64() {
    let ir = compile_ok("int main() { return 0; }");
    assert!(ir.starts_with("target triple = \"x86_64-pc-linux-gnu\""));
}

#[test]
fn test_runtime_stub_declarations_trail_the_module() {
    let ir = compile_ok(
        "
        int main() {
            printf(\"%i\\n\", 1);
            return 0;
        }
        ",
    );
    assert!(ir.contains("declare i32 @printf"));
}
