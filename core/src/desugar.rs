//! Desugars `print`/`printid` over composite arguments into explicit
//! `printf` call trees with synthesized loops. Scalar runs
//! are batched into a single synthesized `printf`; an array or struct
//! argument flushes the current run, then is expanded recursively by
//! [create_array_nodes] / [create_struct_nodes] into a loop or field-by-field
//! sequence.
//!
//! The recursion is over a type shape (array rank / struct fields): match on
//! the composite kind, recurse on what's inside, splice the result into a
//! sequence of synthesized statements.

use crate::ast;
use crate::builder::Builder;
use crate::node::{BinOp, Category, NodeId, UnaryOp};
use crate::symbols::Locality;
use crate::types::{TypeId, TypeKind};
use crate::util::Span;

/// Entry point for both `print(args…)` and `printid(args…)`. `names[i]` is
/// `Some(spelling)` when the corresponding argument came from `printid`
/// (which prepends `name = ` before the value), `None` for plain `print`.
pub fn desugar_print(
    builder: &mut Builder,
    args: Vec<NodeId>,
    names: Vec<Option<String>>,
    span: Span,
) -> NodeId {
    let mut statements: Vec<NodeId> = Vec::new();
    let mut run_format = String::new();
    let mut run_args: Vec<NodeId> = Vec::new();

    for (arg, name) in args.into_iter().zip(names.into_iter()) {
        let ty = builder.nodes.get(arg).ty;
        if builder.types.is_array(ty) || builder.types.is_struct(ty) {
            if !run_args.is_empty() {
                statements.push(flush_printf(builder, &mut run_format, &mut run_args, span));
            }
            let composite = if builder.types.is_array(ty) {
                create_array_nodes(builder, arg, name.as_deref(), ty, span)
            } else {
                create_struct_nodes(builder, arg, name.as_deref(), ty, span)
            };
            statements.push(composite);
        } else {
            if let Some(n) = &name {
                run_format.push_str(n);
                run_format.push_str(" = ");
            }
            run_format.push_str(specifier_for(builder, ty));
            run_format.push(' ');
            run_args.push(arg);
        }
    }
    if !run_args.is_empty() {
        statements.push(flush_printf(builder, &mut run_format, &mut run_args, span));
    }

    match statements.len() {
        0 => ast::inline_compound(&mut builder.nodes, Vec::new(), builder.types.void, span),
        1 => statements.pop().expect("length checked above"),
        _ => ast::inline_compound(&mut builder.nodes, statements, builder.types.void, span),
    }
}

/// Turn the accumulated scalar run into a single synthesized `printf` call,
/// wrapped as a statement, and reset the run for the next batch.
fn flush_printf(
    builder: &mut Builder,
    format: &mut String,
    run_args: &mut Vec<NodeId>,
    span: Span,
) -> NodeId {
    let fmt_node = builder.build_literal_string(format, span);
    format.clear();
    let mut call_args = vec![fmt_node];
    call_args.append(run_args);
    let call = builder.build_printf(call_args, span);
    ast::expr_stmt(&mut builder.nodes, builder.types.void, call, span)
}

fn print_literal_stmt(builder: &mut Builder, text: &str, span: Span) -> NodeId {
    let fmt = builder.build_literal_string(text, span);
    let call = builder.build_printf(vec![fmt], span);
    ast::expr_stmt(&mut builder.nodes, builder.types.void, call, span)
}

fn print_scalar_stmt(builder: &mut Builder, value: NodeId, span: Span) -> NodeId {
    let ty = builder.nodes.get(value).ty;
    let fmt = builder.build_literal_string(specifier_for(builder, ty), span);
    let call = builder.build_printf(vec![fmt, value], span);
    ast::expr_stmt(&mut builder.nodes, builder.types.void, call, span)
}

fn specifier_for(builder: &Builder, ty: TypeId) -> &'static str {
    if builder.types.is_floating(ty) {
        "%f "
    } else if matches!(builder.types.kind(ty), TypeKind::Char) {
        "%c "
    } else {
        "%i "
    }
}

/// Expand an array argument into: save-to-temporary, opening `"{"`, a `for`
/// loop over `0..upb(saved)` printing each element (recursing for nested
/// arrays/structs), and a trailing `"}"`/`", "` delimiter chosen by whether
/// the current index is the last one.
fn create_array_nodes(
    builder: &mut Builder,
    arg: NodeId,
    name: Option<&str>,
    ty: TypeId,
    span: Span,
) -> NodeId {
    let element_ty = builder
        .types
        .element_type(ty)
        .expect("array type always carries an element type");

    let saved_ident = builder.fresh_temporary(ty, Locality::Local);
    let saved_copy = builder.nodes.copy(arg);
    let saved_target = ast::identifier(&mut builder.nodes, saved_ident, ty, span);
    let save_assign = ast::binary(&mut builder.nodes, BinOp::Assign, saved_target, saved_copy, ty, span);
    let save_stmt = ast::expr_stmt(&mut builder.nodes, builder.types.void, save_assign, span);

    let mut statements = Vec::new();
    if let Some(n) = name {
        statements.push(print_literal_stmt(builder, &format!("{} = ", n), span));
    }
    statements.push(save_stmt);
    statements.push(print_literal_stmt(builder, "{", span));

    let i_ident = builder.fresh_temporary(builder.types.int, Locality::Local);
    let zero = builder.build_literal_int(0, span);
    let i_init_target = ast::identifier(&mut builder.nodes, i_ident, builder.types.int, span);
    let init_assign =
        ast::binary(&mut builder.nodes, BinOp::Assign, i_init_target, zero, builder.types.int, span);
    let init_stmt = ast::expr_stmt(&mut builder.nodes, builder.types.void, init_assign, span);

    let i_cond = ast::identifier(&mut builder.nodes, i_ident, builder.types.int, span);
    let saved_for_upb = ast::identifier(&mut builder.nodes, saved_ident, ty, span);
    let upb = ast::unary(
        &mut builder.nodes,
        UnaryOp::Upb(1),
        saved_for_upb,
        builder.types.int,
        Category::Rvalue,
        span,
    );
    let cond = ast::binary(&mut builder.nodes, BinOp::Lt, i_cond, upb, builder.types.bool_, span);

    let i_step = ast::identifier(&mut builder.nodes, i_ident, builder.types.int, span);
    let step_expr = ast::unary(
        &mut builder.nodes,
        UnaryOp::PreInc,
        i_step,
        builder.types.int,
        Category::Rvalue,
        span,
    );
    let step_stmt = ast::expr_stmt(&mut builder.nodes, builder.types.void, step_expr, span);

    let saved_for_elem = ast::identifier(&mut builder.nodes, saved_ident, ty, span);
    let i_for_elem = ast::identifier(&mut builder.nodes, i_ident, builder.types.int, span);
    let element = ast::subscript(&mut builder.nodes, saved_for_elem, i_for_elem, element_ty, span);

    let mut body_statements = Vec::new();
    body_statements.push(if builder.types.is_array(element_ty) {
        create_array_nodes(builder, element, None, element_ty, span)
    } else if builder.types.is_struct(element_ty) {
        create_struct_nodes(builder, element, None, element_ty, span)
    } else {
        print_scalar_stmt(builder, element, span)
    });

    let i_check = ast::identifier(&mut builder.nodes, i_ident, builder.types.int, span);
    let saved_check = ast::identifier(&mut builder.nodes, saved_ident, ty, span);
    let upb_check = ast::unary(
        &mut builder.nodes,
        UnaryOp::Upb(1),
        saved_check,
        builder.types.int,
        Category::Rvalue,
        span,
    );
    let one = builder.build_literal_int(1, span);
    let last_index = ast::binary(&mut builder.nodes, BinOp::Sub, upb_check, one, builder.types.int, span);
    let is_last = ast::binary(&mut builder.nodes, BinOp::Eq, i_check, last_index, builder.types.bool_, span);

    let then_branch = print_literal_stmt(builder, "}", span);
    let else_branch = print_literal_stmt(builder, ", ", span);
    let delimiter_if =
        ast::if_stmt(&mut builder.nodes, builder.types.void, is_last, then_branch, Some(else_branch), span);
    body_statements.push(delimiter_if);

    let body = ast::compound_stmt(&mut builder.nodes, builder.types.void, body_statements, span);
    let for_loop = ast::for_stmt(
        &mut builder.nodes,
        builder.types.void,
        Some(init_stmt),
        Some(cond),
        Some(step_stmt),
        body,
        span,
    );
    statements.push(for_loop);

    ast::compound_stmt(&mut builder.nodes, builder.types.void, statements, span)
}

/// Expand a struct argument into `"\n{ struct"` followed by each field as
/// `"{ .<name> = "`, its value (recursing for composite fields), and a
/// trailing `"}"`/`"},"` depending on whether it's the last field.
fn create_struct_nodes(
    builder: &mut Builder,
    arg: NodeId,
    name: Option<&str>,
    ty: TypeId,
    span: Span,
) -> NodeId {
    let shape = builder
        .types
        .struct_shape(ty)
        .cloned()
        .expect("struct type always carries a shape");

    let mut statements = Vec::new();
    if let Some(n) = name {
        statements.push(print_literal_stmt(builder, &format!("{} = ", n), span));
    }
    statements.push(print_literal_stmt(builder, "\n{ struct", span));

    let field_count = shape.fields.len();
    for (idx, (field_name, field_ty)) in shape.fields.iter().enumerate() {
        let label = builder.symbols.spelling(*field_name).to_owned();
        statements.push(print_literal_stmt(builder, &format!("{{ .{} = ", label), span));

        let base = builder.nodes.copy(arg);
        let member = ast::member(&mut builder.nodes, base, *field_name, false, *field_ty, Category::Lvalue, span);

        statements.push(if builder.types.is_array(*field_ty) {
            create_array_nodes(builder, member, None, *field_ty, span)
        } else if builder.types.is_struct(*field_ty) {
            create_struct_nodes(builder, member, None, *field_ty, span)
        } else {
            print_scalar_stmt(builder, member, span)
        });

        let closer = if idx + 1 == field_count { "}" } else { "}," };
        statements.push(print_literal_stmt(builder, closer, span));
    }

    ast::compound_stmt(&mut builder.nodes, builder.types.void, statements, span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeClass, StmtKind};

    fn span() -> Span {
        Span::synthetic()
    }

    #[test]
    fn test_scalar_only_print_produces_single_printf() {
        let mut builder = Builder::new(String::new());
        let one = builder.build_literal_int(1, span());
        let result = desugar_print(&mut builder, vec![one], vec![None], span());
        match &builder.nodes.get(result).class {
            NodeClass::Stmt(StmtKind::Expr(_)) => {}
            other => panic!("expected a single expr statement, got {:?}", other),
        }
    }

    #[test]
    fn test_array_print_produces_compound_with_for_loop() {
        let mut builder = Builder::new(String::new());
        let int_ty = builder.types.int;
        let array_ty = builder.types.array_of(int_ty);
        let repr = builder.symbols.intern("a");
        let ident = builder
            .symbols
            .declare(repr, array_ty, 0, Locality::Local);
        let arg = ast::identifier(&mut builder.nodes, ident, array_ty, span());

        let result = create_array_nodes(&mut builder, arg, None, array_ty, span());
        match &builder.nodes.get(result).class {
            NodeClass::Stmt(StmtKind::Compound(stmts)) => {
                let has_for_loop = stmts.iter().any(|&s| {
                    matches!(
                        &builder.nodes.get(s).class,
                        NodeClass::Stmt(StmtKind::For { .. })
                    )
                });
                assert!(has_for_loop, "expected a for-loop among the synthesized statements");
            }
            other => panic!("expected a compound statement, got {:?}", other),
        }
    }

    #[test]
    fn test_printid_prepends_name() {
        let mut builder = Builder::new(String::new());
        let int_ty = builder.types.int;
        let repr = builder.symbols.intern("x");
        let ident = builder.symbols.declare(repr, int_ty, 0, Locality::Local);
        let arg = ast::identifier(&mut builder.nodes, ident, int_ty, span());

        let result = desugar_print(&mut builder, vec![arg], vec![Some("x".to_owned())], span());
        assert!(!result.is_broken());
    }
}
