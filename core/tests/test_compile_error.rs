//! Integration tests covering the diagnostic taxonomy. The programs in
//! these tests should all fail to compile; each test pins down which
//! [CompileError] variant is reported, not just that *some* error occurred.

use ruc::error::CompileError;
use ruc::{compile, Target};

/// Compiles `src`, expecting exactly one error, and returns it.
macro_rules! assert_single_error {
    ($src:expr, $expected:pat) => {{
        let err = compile($src, vec![], Target::X86_64).unwrap_err();
        assert_eq!(err.len(), 1, "expected exactly one error, got {:?}", err);
        let actual = err.errors()[0].error();
        assert!(
            matches!(actual, $expected),
            "expected {}, got {:?}",
            stringify!($expected),
            actual
        );
    }};
}

#[test]
fn test_use_of_undeclared_identifier() {
    assert_single_error!(
        "int main() { return undeclared_name; }",
        CompileError::UseOfUndeclaredIdentifier
    );
}

#[test]
fn test_no_such_member() {
    assert_single_error!(
        "
        struct point { int x; int y; };
        int main() {
            struct point p;
            return p.z;
        }
        ",
        CompileError::NoSuchMember
    );
}

#[test]
fn test_typecheck_binary_expr() {
    assert_single_error!(
        "
        struct point { int x; };
        int main() {
            struct point a;
            struct point b;
            return a + b;
        }
        ",
        CompileError::TypecheckBinaryExpr
    );
}

#[test]
fn test_subscripted_expr_not_array() {
    assert_single_error!(
        "int main() { int x; return x[0]; }",
        CompileError::SubscriptedExprNotArray
    );
}

#[test]
fn test_called_expr_not_function() {
    assert_single_error!(
        "int main() { int x; return x(); }",
        CompileError::CalledExprNotFunction
    );
}

#[test]
fn test_condition_must_be_scalar() {
    assert_single_error!(
        "
        struct point { int x; };
        int main() {
            struct point p;
            if (p) { return 1; }
            return 0;
        }
        ",
        CompileError::ConditionMustBeScalar
    );
}

#[test]
fn test_void_func_valued_return() {
    assert_single_error!(
        "void f() { return 1; } int main() { f(); return 0; }",
        CompileError::VoidFuncValuedReturn
    );
}

#[test]
fn test_nonvoid_func_void_return() {
    assert_single_error!(
        "int f() { return; } int main() { return f(); }",
        CompileError::NonvoidFuncVoidReturn
    );
}

#[test]
fn test_empty_init_rejected() {
    assert_single_error!("int main() { int a[3] = {}; return 0; }", CompileError::EmptyInit);
}

#[test]
fn test_division_by_zero_in_constant_expression() {
    assert_single_error!(
        "int x = 1 / 0; int main() { return x; }",
        CompileError::DivisionByZeroInConstantExpression
    );
}

#[test]
fn test_incompatible_enum_types() {
    assert_single_error!(
        "
        enum color { RED, GREEN };
        enum size { SMALL, LARGE };
        int main() {
            enum color c;
            enum size s;
            return c == s;
        }
        ",
        CompileError::IncompatibleEnumTypes
    );
}

#[test]
fn test_printf_fst_not_string() {
    assert_single_error!(
        "int main() { printf(1); return 0; }",
        CompileError::PrintfFstNotString
    );
}

#[test]
fn test_wrong_printf_argument_amount() {
    assert_single_error!(
        "int main() { printf(\"%i %i\\n\", 1); return 0; }",
        CompileError::WrongPrintfArgumentAmount
    );
}

#[test]
fn test_unknown_format_specifier() {
    assert_single_error!(
        "int main() { printf(\"%q\\n\"); return 0; }",
        CompileError::UnknownFormatSpecifier
    );
}

#[test]
fn test_expected_identifier_in_printid() {
    assert_single_error!(
        "int main() { int a; printid(a + 1); return 0; }",
        CompileError::ExpectedIdentifierInPrintid
    );
}

#[test]
fn test_syntax_error_missing_semicolon() {
    assert_single_error!(
        "int main() { return 0 }",
        CompileError::Syntax { .. }
    );
}

#[test]
fn test_diagnostic_renders_location_and_message() {
    let err = compile(
        "int main() { return undeclared_name; }",
        vec![],
        Target::X86_64,
    )
    .unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("Type error at"));
    assert!(rendered.contains("undeclared_name"));
}
