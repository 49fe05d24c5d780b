//! Declaration lowering. Local declarations become `alloca`s (and,
//! for arrays with a runtime-computed bound, a `stacksave`d dynamic
//! `alloca`); top-level declarations become `@`-prefixed globals or
//! function definitions.
//!
//! The declarative input is a [DeclKind] node; the concrete output is the
//! sequence of `alloca`/`global`/`define` lines written to the IR text
//! sink.

use super::expr::{ir_type, lower_expr};
use super::stmt::{lower_stmt as lower_stmt_inner, record_array_descriptor};
use super::{operand_text, zext_logic, Answer, DimBound, Emitter, Location};
use crate::node::{DeclKind, ExprKind, NodeClass, NodeId};
use crate::symbols::{IdentId, StringPool};

/// Emit the `@.strN` private constant globals backing every interned string
/// literal. Must run before
/// any function body is lowered, since a `printf`/`print` call references
/// `@.strN` by name without forward-declaring it.
pub fn emit_string_globals(emitter: &mut Emitter, strings: &StringPool) {
    for (idx, entry) in strings.entries().iter().enumerate() {
        emitter.emit_line(format!(
            "@.str{} = private unnamed_addr constant [{} x i8] c\"{}\\00\"",
            idx,
            entry.bytes.len() + 1,
            escape_for_llvm(entry.bytes.as_bytes()),
        ));
    }
}

/// LLVM string-constant escaping: any byte outside printable ASCII, plus
/// `"` and `\`, is written as `\XX` (uppercase hex).
fn escape_for_llvm(bytes: &[u8]) -> String {
    let mut out = String::new();
    for &b in bytes {
        if b == b'"' || b == b'\\' || !(0x20..=0x7e).contains(&b) {
            out.push_str(&format!("\\{:02X}", b));
        } else {
            out.push(b as char);
        }
    }
    out
}

/// Lower a declaration that appears inside a function body. Function and type-tag declarations can't appear here; only
/// `Var`/`Array` do.
pub fn lower_local_declaration(emitter: &mut Emitter, decl: NodeId) {
    let class = emitter.nodes.get(decl).class.clone();
    match class {
        NodeClass::Decl(DeclKind::Var { ident, init }) => lower_local_var(emitter, ident, init),
        NodeClass::Decl(DeclKind::Array { ident, dims, init }) => {
            lower_local_array(emitter, ident, dims, init)
        }
        NodeClass::Decl(DeclKind::TypeTag { .. }) => {}
        NodeClass::Decl(DeclKind::Function { .. }) => {
            unreachable!("function declarations cannot be local")
        }
        NodeClass::Expr(_) | NodeClass::Stmt(_) => unreachable!("not a declaration node"),
    }
}

fn lower_local_var(emitter: &mut Emitter, ident: IdentId, init: Option<NodeId>) {
    let ty = emitter.symbols.ident(ident).ty;
    emitter.note_type_usage(ty);
    let llty = ir_type(emitter, ty);
    let address = format!("%var.{}", ident.0);
    emitter.emit_line(format!("  {} = alloca {}", address, llty));
    if let Some(init) = init {
        let value = lower_expr(emitter, init, Location::Reg);
        let value = zext_logic(emitter, value);
        emitter.emit_line(format!(
            "  store {} {}, {}* {}",
            llty,
            operand_text(&value),
            llty,
            address
        ));
    }
}

/// Peel `rank` levels of `Array` nesting off `ty`, returning the scalar
/// base type. `rank` must be the declared dimension count (`dims.len()`):
/// `element_type` strips only one level per call, and `int a[2][3]`'s type
/// is `Array(Array(Int))`, two levels deep.
fn scalar_element_type(emitter: &Emitter, ty: crate::types::TypeId, rank: usize) -> crate::types::TypeId {
    let mut current = ty;
    for _ in 0..rank {
        current = emitter.types.element_type(current).unwrap_or(current);
    }
    current
}

fn lower_local_array(
    emitter: &mut Emitter,
    ident: IdentId,
    dims: Vec<Option<NodeId>>,
    init: Option<NodeId>,
) {
    let ty = emitter.symbols.ident(ident).ty;
    let element_ty = scalar_element_type(emitter, ty, dims.len());
    let llty = ir_type(emitter, element_ty);
    let address = format!("%var.{}", ident.0);

    let mut bounds = Vec::with_capacity(dims.len());
    let mut is_static = true;
    for dim in &dims {
        match dim {
            Some(expr) => {
                is_static = false;
                let value = lower_expr(emitter, *expr, Location::Reg);
                let value = zext_logic(emitter, value);
                match value {
                    Answer::ConstInt(n) => bounds.push(DimBound::Const(n as u32)),
                    other => {
                        let reg = match other {
                            Answer::Reg(r) => r,
                            _ => {
                                let dest = emitter.new_register();
                                emitter.emit_line(format!(
                                    "  %t{} = add i32 {}, 0",
                                    dest,
                                    operand_text(&other)
                                ));
                                dest
                            }
                        };
                        bounds.push(DimBound::Reg(reg));
                    }
                }
            }
            // A compile-time constant bound already folded onto the
            // identifier's declared type; this minimal type system doesn't
            // retain array lengths on the type itself, so the builder is
            // expected to have supplied an explicit `Some(literal)` dim for
            // every statically-sized array it declares.
            None => bounds.push(DimBound::Const(0)),
        }
    }

    let dim_text = |b: &DimBound| match b {
        DimBound::Const(n) => n.to_string(),
        DimBound::Reg(r) => format!("%t{}", r),
    };

    if is_static {
        let nested_type = bounds
            .iter()
            .rev()
            .fold(llty.clone(), |inner, b| format!("[{} x {}]", dim_text(b), inner));
        emitter.emit_line(format!("  {} = alloca {}", address, nested_type));
    } else {
        let slot = emitter.new_block_slot();
        emitter.emit_line(format!("  %stack.{} = call i8* @llvm.stacksave()", slot));
        emitter.push_stack_slot(slot);
        let mut size_text = dim_text(&bounds[0]);
        for b in &bounds[1..] {
            let dest = emitter.new_register();
            emitter.emit_line(format!(
                "  %t{} = mul i32 {}, {}",
                dest,
                size_text,
                dim_text(b)
            ));
            size_text = format!("%t{}", dest);
        }
        emitter.emit_line(format!(
            "  {} = alloca {}, i32 {}",
            address, llty, size_text
        ));
    }

    record_array_descriptor(emitter, ident, is_static, bounds);

    if let Some(init) = init {
        lower_array_initializer(emitter, &address, element_ty, init);
    }
}

fn lower_array_initializer(emitter: &mut Emitter, address: &str, element_ty: crate::types::TypeId, init: NodeId) {
    let elements = match &emitter.nodes.get(init).class {
        NodeClass::Expr(ExprKind::Initializer { elements }) => elements.clone(),
        _ => vec![init],
    };
    let llty = ir_type(emitter, element_ty);
    for (index, element) in elements.into_iter().enumerate() {
        let value = lower_expr(emitter, element, Location::Reg);
        let value = zext_logic(emitter, value);
        let slot_reg = emitter.new_register();
        emitter.emit_line(format!(
            "  %t{} = getelementptr {}, {}* {}, i32 {}",
            slot_reg, llty, llty, address, index
        ));
        emitter.emit_line(format!(
            "  store {} {}, {}* %t{}",
            llty,
            operand_text(&value),
            llty,
            slot_reg
        ));
    }
}

/// Lower a top-level (file-scope) declaration: a global variable/array, or a
/// function definition. `type-tag` declarations emit
/// nothing; their shape already lives in the type table.
pub fn lower_top_level(emitter: &mut Emitter, decl: NodeId) {
    let class = emitter.nodes.get(decl).class.clone();
    match class {
        NodeClass::Decl(DeclKind::Var { ident, init }) => lower_global_var(emitter, ident, init),
        NodeClass::Decl(DeclKind::Array { ident, dims, init }) => {
            lower_global_array(emitter, ident, dims, init)
        }
        NodeClass::Decl(DeclKind::Function { ident, params, body }) => {
            lower_function(emitter, ident, &params, body)
        }
        NodeClass::Decl(DeclKind::TypeTag { .. }) => {}
        NodeClass::Expr(_) | NodeClass::Stmt(_) => unreachable!("not a declaration node"),
    }
}

fn lower_global_var(emitter: &mut Emitter, ident: IdentId, init: Option<NodeId>) {
    let ty = emitter.symbols.ident(ident).ty;
    emitter.note_type_usage(ty);
    let llty = ir_type(emitter, ty);
    let initial = match init {
        Some(expr) => literal_text(emitter, expr),
        None => zero_value(&llty),
    };
    emitter.emit_line(format!(
        "@var.{} = global {} {}",
        ident.0, llty, initial
    ));
}

fn lower_global_array(emitter: &mut Emitter, ident: IdentId, dims: Vec<Option<NodeId>>, _init: Option<NodeId>) {
    let ty = emitter.symbols.ident(ident).ty;
    let element_ty = scalar_element_type(emitter, ty, dims.len());
    let llty = ir_type(emitter, element_ty);
    let bound_values: Vec<u32> = dims
        .iter()
        .map(|d| match d {
            Some(expr) => match literal_int_of(emitter, *expr) {
                Some(v) => v as u32,
                None => 1,
            },
            None => 1,
        })
        .collect();
    let nested_type = bound_values
        .iter()
        .rev()
        .fold(llty.clone(), |inner, n| format!("[{} x {}]", n, inner));
    emitter.emit_line(format!(
        "@var.{} = global {} zeroinitializer",
        ident.0, nested_type
    ));
    record_array_descriptor(
        emitter,
        ident,
        true,
        bound_values.into_iter().map(DimBound::Const).collect(),
    );
}

fn literal_int_of(emitter: &Emitter, expr: NodeId) -> Option<i32> {
    match &emitter.nodes.get(expr).class {
        NodeClass::Expr(ExprKind::LiteralInt(v)) => Some(*v),
        _ => None,
    }
}

fn literal_text(emitter: &mut Emitter, expr: NodeId) -> String {
    match lower_expr(emitter, expr, Location::Reg) {
        Answer::ConstInt(v) => v.to_string(),
        Answer::ConstFloat(v) => format!("{:?}", v),
        Answer::Null => "null".to_owned(),
        _ => "0".to_owned(),
    }
}

fn zero_value(llty: &str) -> &'static str {
    match llty {
        "double" => "0.0",
        _ => "0",
    }
}

fn lower_function(emitter: &mut Emitter, ident: IdentId, params: &[IdentId], body: Option<NodeId>) {
    let record = emitter.symbols.ident(ident).clone();
    let name_repr = record.repr;
    let name = emitter.symbols.spelling(name_repr).to_owned();
    let shape = emitter.types.function_shape(record.ty).cloned();
    let return_llty = match &shape {
        Some(shape) => ir_type(emitter, shape.return_type),
        None => "void".to_owned(),
    };
    let return_is_void = return_llty == "void";

    let param_list = params
        .iter()
        .map(|p| {
            let pty = emitter.symbols.ident(*p).ty;
            format!("{} %arg.{}", ir_type(emitter, pty), p.0)
        })
        .collect::<Vec<_>>()
        .join(", ");

    emitter.enter_function(&name, return_is_void);
    match body {
        Some(body) => {
            emitter.emit_line(format!(
                "define {} @{}({}) {{",
                return_llty, name, param_list
            ));
            for param in params {
                let pty = emitter.symbols.ident(*param).ty;
                emitter.note_type_usage(pty);
                let llty = ir_type(emitter, pty);
                emitter.emit_line(format!("  %var.{} = alloca {}", param.0, llty));
                emitter.emit_line(format!(
                    "  store {} %arg.{}, {}* %var.{}",
                    llty, param.0, llty, param.0
                ));
            }
            lower_stmt_inner(emitter, body);
            if return_is_void {
                emitter.emit_line("  ret void");
            } else {
                emitter.emit_line(format!("  ret {} 0", return_llty));
            }
            emitter.emit_line("}");
        }
        None => {
            emitter.emit_line(format!(
                "declare {} @{}({})",
                return_llty, name, param_list
            ));
        }
    }
}

/// Entry point for the whole translation unit: lower every file-scope declaration, in source order, then hand
/// control to [crate::ir::runtime::emit_epilogue] for the trailing stubs.
pub fn emit_translation_unit(emitter: &mut Emitter, decls: &[NodeId]) {
    for &decl in decls {
        lower_top_level(emitter, decl);
    }
    crate::ir::runtime::emit_epilogue(emitter);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast;
    use crate::node::NodeStore;
    use crate::symbols::{Locality, SymbolTable};
    use crate::types::TypeTable;
    use crate::util::Span;

    fn span() -> Span {
        Span::synthetic()
    }

    #[test]
    fn test_local_var_emits_alloca_and_store() {
        let mut nodes = NodeStore::new();
        let types = TypeTable::new();
        let mut symbols = SymbolTable::new();
        let repr = symbols.intern("x");
        let ident = symbols.declare(repr, types.int, 0, Locality::Local);
        let init = ast::literal_int(&mut nodes, types.int, 5, span());
        let decl = ast::var_decl(&mut nodes, types.void, ident, Some(init), span());
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        lower_local_declaration(&mut emitter, decl);
        let out = emitter.into_output();
        assert!(out.contains("alloca i32"));
        assert!(out.contains("store i32 5"));
    }

    #[test]
    fn test_emit_string_globals_escapes_and_null_terminates() {
        let mut strings = StringPool::new();
        strings.intern("hi\n");
        let nodes = NodeStore::new();
        let types = TypeTable::new();
        let symbols = SymbolTable::new();
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        emit_string_globals(&mut emitter, &strings);
        let out = emitter.into_output();
        assert!(out.contains(
            "@.str0 = private unnamed_addr constant [4 x i8] c\"hi\\0A\\00\""
        ));
    }

    #[test]
    fn test_global_var_emits_global_definition() {
        let nodes = NodeStore::new();
        let types = TypeTable::new();
        let mut symbols = SymbolTable::new();
        let repr = symbols.intern("g");
        let ident = symbols.declare(repr, types.int, 0, Locality::Global);
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        lower_global_var(&mut emitter, ident, None);
        assert!(emitter.into_output().contains("@var.0 = global i32 0"));
    }

    #[test]
    fn test_function_without_body_emits_declare() {
        let nodes = NodeStore::new();
        let mut types = TypeTable::new();
        let mut symbols = SymbolTable::new();
        let repr = symbols.intern("puts");
        let fn_ty = types.function_of(types.int, vec![types.string]);
        let ident = symbols.declare(repr, fn_ty, 0, Locality::Global);
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        lower_function(&mut emitter, ident, &[], None);
        assert!(emitter.into_output().contains("declare i32 @puts"));
    }
}
