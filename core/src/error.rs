//! Diagnostic taxonomy and the source-rendering machinery shared by every
//! error the compiler can report. The core never owns message *transport*,
//! only the shape of the message and which source span it attaches to.

use crate::util::{self, Span};
use serde::Serialize;
use std::fmt::{self, Debug, Display, Formatter};
use thiserror::Error;

/// A trait for any error that originates in source code. [SourceError]s rely
/// on having source code present in order to display themselves.
pub trait SourceError: 'static + Send + Sync + Debug + Serialize {
    /// A simple type label for this error, e.g. `"Syntax"` or `"Type"`.
    fn type_label(&self) -> &'static str;

    /// Format this error into a simple message. `spanned_src` is the slice of
    /// the source code that corresponds to this error's [Span]. This needs to
    /// be provided by the caller in order to create a proper error message.
    fn fmt_msg(&self, f: &mut Formatter<'_>, spanned_src: &str) -> fmt::Result;
}

/// An error that occurs while compiling a program, from lexing through IR
/// emission. The error is always due to a flaw in the input program, never
/// a bug in the compiler; internal invariant violations panic instead (see
/// [CompileError::SuchArrayIsNotSupported] and friends for the one class of
/// error that's a user-visible implementation limit rather than a mistake).
#[derive(Copy, Clone, Debug, Serialize)]
pub enum CompileError {
    // --- Syntax (lexer / preprocessor / parser) ---
    /// Failed to parse the program because of a syntax error. `expected` is
    /// the name of the type of element that was expected where the error
    /// occurred.
    Syntax { expected: &'static str },
    /// `#include`/macro-expansion referenced a macro that was never
    /// `#define`d.
    MacroDoesNotExist,

    // --- Lookup ---
    /// An identifier was used that has no declaration visible at this point.
    UseOfUndeclaredIdentifier,
    /// `a.b` or `a->b` referenced a field that isn't a member of `a`'s
    /// struct type.
    NoSuchMember,

    // --- Type-check ---
    /// An initializer's shape/type didn't match the declared type it was
    /// assigned to.
    WrongInit,
    /// Same as [Self::WrongInit], but for a call argument rather than a
    /// declaration initializer.
    WrongInitInActparam,
    /// A binary operator was applied to operands of incompatible types.
    TypecheckBinaryExpr,
    /// The left-hand side of an assignment (or `++`/`--`) is not an lvalue.
    UnassignableExpression,
    /// `a[i]` where `a` is not an array type.
    SubscriptedExprNotArray,
    /// `a[i]` where `i` is not an integer type.
    ArraySubscriptNotInteger,
    /// `f(...)` where `f` is not a function type.
    CalledExprNotFunction,
    /// `a.b` where `a` is not a struct.
    MemberReferenceNotStruct,
    /// `a->b` where `a` is not a pointer-to-struct.
    MemberReferenceNotStructPointer,
    /// `if`/`while`/`do`/`for` condition is not scalar.
    ConditionMustBeScalar,
    /// `case` label is not an integer constant.
    CaseExprNotInteger,
    /// `switch` selector is not an integer.
    SwitchExprNotInteger,
    /// `return <expr>;` inside a `void` function.
    VoidFuncValuedReturn,
    /// `return;` inside a function with a non-`void` return type.
    NonvoidFuncVoidReturn,
    /// `x ? y : z` where `y`/`z` have incompatible types.
    IncompatibleCondOperands,
    /// `&x` where `x` is not an lvalue.
    AddrofOperandNotLvalue,
    /// `*x` where `x` is not a pointer.
    IndirectionOperandNotPointer,
    /// `++x`/`x++`/`--x`/`x--` where `x` is not an lvalue of arithmetic type.
    IncrementOperandNotLvalueArithmetic,
    /// `-x`/`abs(x)` where `x` is not arithmetic.
    UnaryOperandNotArithmetic,
    /// `~x` where `x` is not an integer.
    UnnotOperandNotInteger,
    /// `!x` where `x` is not scalar.
    LognotOperandNotScalar,
    /// `upb(x)` where `x` is not an array.
    UpbOperandNotArray,
    /// `{}` with no elements.
    EmptyInit,
    /// A constant expression was required (e.g. an array bound, a `case`
    /// label) but the expression isn't one.
    ExpectedConstantExpression,
    /// The parser expected an expression and didn't find one.
    ExpectedExpression,
    /// Comparing values of two different named `enum` types.
    IncompatibleEnumTypes,
    /// A `/`/`%` by a literal `0` operand was encountered during constant
    /// folding. Folding refuses rather than picking a poison value.
    DivisionByZeroInConstantExpression,

    // --- printf ---
    /// `printf`'s first argument isn't a string literal.
    PrintfFstNotString,
    /// More printf arguments were given than the format string has
    /// placeholders for.
    TooManyPrintfArgs,
    /// The format string's placeholder count doesn't match the argument
    /// count.
    WrongPrintfArgumentAmount,
    /// A bare `%` wasn't followed by a recognized specifier character.
    ExpectedFormatSpecifier,
    /// A `%`-specifier character isn't one of the recognized ones.
    UnknownFormatSpecifier,

    // --- print / printid / getid ---
    /// `print`/`printid` was given a pointer-typed argument.
    PointerInPrint,
    /// `printid` was given an argument that isn't a plain identifier.
    ExpectedIdentifierInPrintid,
    /// `getid` was given an argument that isn't a plain identifier.
    ExpectedIdentifierInGetid,

    // --- System / IR (implementation-limit violations) ---
    /// An array shape the emitter can't represent (e.g. a zero-length
    /// dimension) was requested.
    SuchArrayIsNotSupported,
    /// A call site exceeded the emitter's fixed argument-count limit.
    TooManyArguments,
    /// An array declaration mixed compile-time-constant and runtime-computed
    /// bounds in a way other than "first dimension dynamic, rest static".
    ArrayBordersCannotBeStaticDynamic,
}

impl SourceError for CompileError {
    fn type_label(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "Syntax",
            Self::MacroDoesNotExist => "Preprocessor",
            Self::SuchArrayIsNotSupported
            | Self::TooManyArguments
            | Self::ArrayBordersCannotBeStaticDynamic => "IR",
            Self::PrintfFstNotString
            | Self::TooManyPrintfArgs
            | Self::WrongPrintfArgumentAmount
            | Self::ExpectedFormatSpecifier
            | Self::UnknownFormatSpecifier => "printf",
            Self::PointerInPrint
            | Self::ExpectedIdentifierInPrintid
            | Self::ExpectedIdentifierInGetid => "print",
            _ => "Type",
        }
    }

    fn fmt_msg(&self, f: &mut Formatter<'_>, spanned_src: &str) -> fmt::Result {
        match self {
            Self::Syntax { expected } => write!(f, "Expected {}", expected),
            Self::MacroDoesNotExist => write!(
                f,
                "Macro `{}` is not defined",
                spanned_src
            ),
            Self::UseOfUndeclaredIdentifier => write!(
                f,
                "Use of undeclared identifier `{}`",
                spanned_src
            ),
            Self::NoSuchMember => {
                write!(f, "No member named `{}`", spanned_src)
            }
            Self::WrongInit => write!(
                f,
                "Initializer `{}` does not match the declared type",
                spanned_src
            ),
            Self::WrongInitInActparam => write!(
                f,
                "Argument `{}` does not match the parameter's type",
                spanned_src
            ),
            Self::TypecheckBinaryExpr => write!(
                f,
                "Operands of `{}` have incompatible types",
                spanned_src
            ),
            Self::UnassignableExpression => {
                write!(f, "Expression `{}` is not assignable", spanned_src)
            }
            Self::SubscriptedExprNotArray => write!(
                f,
                "Subscripted expression `{}` is not an array",
                spanned_src
            ),
            Self::ArraySubscriptNotInteger => {
                write!(f, "Array subscript `{}` is not an integer", spanned_src)
            }
            Self::CalledExprNotFunction => {
                write!(f, "Called expression `{}` is not a function", spanned_src)
            }
            Self::MemberReferenceNotStruct => write!(
                f,
                "Member reference `{}` is not to a struct",
                spanned_src
            ),
            Self::MemberReferenceNotStructPointer => write!(
                f,
                "Member reference `{}` is not to a struct pointer",
                spanned_src
            ),
            Self::ConditionMustBeScalar => {
                write!(f, "Condition `{}` must have scalar type", spanned_src)
            }
            Self::CaseExprNotInteger => {
                write!(f, "Case label `{}` is not an integer constant", spanned_src)
            }
            Self::SwitchExprNotInteger => write!(
                f,
                "Switch expression `{}` is not an integer",
                spanned_src
            ),
            Self::VoidFuncValuedReturn => write!(
                f,
                "Cannot return a value (`{}`) from a void function",
                spanned_src
            ),
            Self::NonvoidFuncVoidReturn => write!(
                f,
                "Non-void function must return a value, not `{}`",
                spanned_src
            ),
            Self::IncompatibleCondOperands => write!(
                f,
                "Ternary arms of `{}` have incompatible types",
                spanned_src
            ),
            Self::AddrofOperandNotLvalue => {
                write!(f, "Cannot take the address of `{}`", spanned_src)
            }
            Self::IndirectionOperandNotPointer => write!(
                f,
                "Cannot dereference `{}`, it is not a pointer",
                spanned_src
            ),
            Self::IncrementOperandNotLvalueArithmetic => write!(
                f,
                "`{}` is not an arithmetic lvalue",
                spanned_src
            ),
            Self::UnaryOperandNotArithmetic => {
                write!(f, "`{}` is not of arithmetic type", spanned_src)
            }
            Self::UnnotOperandNotInteger => {
                write!(f, "`{}` is not an integer", spanned_src)
            }
            Self::LognotOperandNotScalar => {
                write!(f, "`{}` is not a scalar type", spanned_src)
            }
            Self::UpbOperandNotArray => {
                write!(f, "`{}` is not an array", spanned_src)
            }
            Self::EmptyInit => write!(f, "Initializer list cannot be empty"),
            Self::ExpectedConstantExpression => write!(
                f,
                "Expected a constant expression, found `{}`",
                spanned_src
            ),
            Self::ExpectedExpression => {
                write!(f, "Expected an expression near `{}`", spanned_src)
            }
            Self::IncompatibleEnumTypes => write!(
                f,
                "Cannot compare values of different enum types (`{}`)",
                spanned_src
            ),
            Self::DivisionByZeroInConstantExpression => write!(
                f,
                "Division by zero in constant expression `{}`",
                spanned_src
            ),
            Self::PrintfFstNotString => write!(
                f,
                "The first argument to printf (`{}`) must be a string literal",
                spanned_src
            ),
            Self::TooManyPrintfArgs => write!(
                f,
                "Too many arguments to printf, max {} placeholders (`{}`)",
                crate::consts::MAX_PRINTF_ARGS,
                spanned_src
            ),
            Self::WrongPrintfArgumentAmount => write!(
                f,
                "printf format string has a different number of \
                 placeholders than arguments given (`{}`)",
                spanned_src
            ),
            Self::ExpectedFormatSpecifier => write!(
                f,
                "Expected a format specifier after `%` in `{}`",
                spanned_src
            ),
            Self::UnknownFormatSpecifier => {
                write!(f, "Unknown format specifier in `{}`", spanned_src)
            }
            Self::PointerInPrint => write!(
                f,
                "Cannot print pointer-typed expression `{}`",
                spanned_src
            ),
            Self::ExpectedIdentifierInPrintid => write!(
                f,
                "printid requires a plain identifier, found `{}`",
                spanned_src
            ),
            Self::ExpectedIdentifierInGetid => write!(
                f,
                "getid requires a plain identifier, found `{}`",
                spanned_src
            ),
            Self::SuchArrayIsNotSupported => write!(
                f,
                "Array shape `{}` cannot be represented by this emitter",
                spanned_src
            ),
            Self::TooManyArguments => {
                write!(f, "Too many arguments in call to `{}`", spanned_src)
            }
            Self::ArrayBordersCannotBeStaticDynamic => write!(
                f,
                "Array `{}` mixes static and dynamic bounds in an \
                 unsupported way",
                spanned_src
            ),
        }
    }
}

/// A non-fatal diagnostic: the program is still valid, but something about it
/// is probably a mistake.
#[derive(Copy, Clone, Debug, Serialize)]
pub enum CompileWarning {
    /// `==`/`!=` compared a floating-point operand; exact float equality is
    /// rarely what's intended.
    VariableDeviation,
}

impl SourceError for CompileWarning {
    fn type_label(&self) -> &'static str {
        "Warning"
    }

    fn fmt_msg(&self, f: &mut Formatter<'_>, spanned_src: &str) -> fmt::Result {
        match self {
            Self::VariableDeviation => write!(
                f,
                "Comparing floating-point values for exact equality in `{}`",
                spanned_src
            ),
        }
    }
}

/// A wrapper around a [SourceError], that holds some extra data:
/// - The [Span] of the source code that caused the error
/// - The offending chunk of source code itself
///
/// This type on its own can be formatted, without any external data.
#[derive(Clone, Debug, Error, Serialize)]
pub struct SourceErrorWrapper<E: SourceError> {
    error: E,
    span: Span,
    spanned_source: String,
}

impl<E: SourceError> SourceErrorWrapper<E> {
    pub fn new(error: E, span: Span, src: &str) -> Self {
        Self {
            error,
            span,
            spanned_source: span.get_source_slice(src).into(),
        }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn error(&self) -> &E {
        &self.error
    }
}

impl<E: SourceError> Display for SourceErrorWrapper<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error at {}:{}: ",
            self.error.type_label(),
            self.span.start_line,
            self.span.start_col,
        )?;
        self.error.fmt_msg(f, &self.spanned_source)?;
        Ok(())
    }
}

/// A wrapper around a collection of errors. This holds the errors as well as
/// the source code, and can be used to render associated source code with
/// each error.
#[derive(Clone, Debug, Error, Serialize)]
pub struct WithSource<E: SourceError> {
    errors: Vec<SourceErrorWrapper<E>>,
    #[serde(skip)]
    source_code: String,
}

impl<E: SourceError> WithSource<E> {
    /// Wrap a collection of errors with its source code.
    pub(crate) fn new(
        errors: impl IntoIterator<Item = SourceErrorWrapper<E>>,
        source: String,
    ) -> Self {
        Self {
            errors: errors.into_iter().collect(),
            source_code: source,
        }
    }

    /// Get a reference to the errors wrapped by this type.
    pub fn errors(&self) -> &[SourceErrorWrapper<E>] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }
}

impl<E: SourceError> Display for WithSource<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
            if f.alternate() {
                util::fmt_src_highlights(f, &error.span, &self.source_code)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_wraps_message() {
        let span = Span::synthetic();
        let wrapper = SourceErrorWrapper::new(
            CompileError::UseOfUndeclaredIdentifier,
            span,
            "foo",
        );
        let rendered = wrapper.to_string();
        assert!(rendered.contains("Use of undeclared identifier"));
    }

    #[test]
    fn test_with_source_joins_multiple_errors() {
        let span = Span::synthetic();
        let errors = vec![
            SourceErrorWrapper::new(CompileError::EmptyInit, span, ""),
            SourceErrorWrapper::new(
                CompileError::UseOfUndeclaredIdentifier,
                span,
                "",
            ),
        ];
        let with_source = WithSource::new(errors, String::new());
        assert_eq!(with_source.len(), 2);
        assert!(with_source.to_string().contains('\n'));
    }
}
