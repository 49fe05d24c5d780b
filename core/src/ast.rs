//! Expression/statement/declaration constructors. These are thin typed
//! wrappers over [crate::node::NodeStore]: each one stamps a [NodeClass] and
//! argument layout and pushes it into the arena. All *checking* (type rules,
//! lvalue rules, diagnostics) lives in `builder.rs`; by the time one of
//! these is called its arguments are already validated.

use crate::node::{
    BinOp, Category, DeclKind, ExprKind, Node, NodeClass, NodeId, NodeStore,
    StmtKind, UnaryOp,
};
use crate::symbols::{IdentId, StringId};
use crate::types::{NameId, TypeId};
use crate::util::Span;

// ---------------------------------------------------------------------
// Expression constructors
// ---------------------------------------------------------------------

pub fn identifier(
    store: &mut NodeStore,
    ident: IdentId,
    ty: TypeId,
    span: Span,
) -> NodeId {
    store.alloc(
        NodeClass::Expr(ExprKind::Identifier(ident)),
        ty,
        Category::Lvalue,
        span,
        vec![],
    )
}

pub fn literal_null(store: &mut NodeStore, null_pointer_ty: TypeId, span: Span) -> NodeId {
    store.alloc(
        NodeClass::Expr(ExprKind::LiteralNull),
        null_pointer_ty,
        Category::Rvalue,
        span,
        vec![],
    )
}

pub fn literal_bool(store: &mut NodeStore, bool_ty: TypeId, value: bool, span: Span) -> NodeId {
    store.alloc(
        NodeClass::Expr(ExprKind::LiteralBool(value)),
        bool_ty,
        Category::Rvalue,
        span,
        vec![],
    )
}

pub fn literal_char(store: &mut NodeStore, char_ty: TypeId, value: char, span: Span) -> NodeId {
    store.alloc(
        NodeClass::Expr(ExprKind::LiteralChar(value)),
        char_ty,
        Category::Rvalue,
        span,
        vec![],
    )
}

pub fn literal_int(store: &mut NodeStore, int_ty: TypeId, value: i32, span: Span) -> NodeId {
    store.alloc(
        NodeClass::Expr(ExprKind::LiteralInt(value)),
        int_ty,
        Category::Rvalue,
        span,
        vec![],
    )
}

pub fn literal_float(store: &mut NodeStore, float_ty: TypeId, value: f64, span: Span) -> NodeId {
    store.alloc(
        NodeClass::Expr(ExprKind::LiteralFloat(value)),
        float_ty,
        Category::Rvalue,
        span,
        vec![],
    )
}

pub fn literal_string(
    store: &mut NodeStore,
    string_ty: TypeId,
    id: StringId,
    span: Span,
) -> NodeId {
    store.alloc(
        NodeClass::Expr(ExprKind::LiteralString(id)),
        string_ty,
        Category::Rvalue,
        span,
        vec![],
    )
}

pub fn subscript(
    store: &mut NodeStore,
    base: NodeId,
    index: NodeId,
    element_ty: TypeId,
    span: Span,
) -> NodeId {
    store.alloc(
        NodeClass::Expr(ExprKind::Subscript { base, index }),
        element_ty,
        Category::Lvalue,
        span,
        vec![base, index],
    )
}

pub fn call(
    store: &mut NodeStore,
    callee: NodeId,
    args: Vec<NodeId>,
    return_ty: TypeId,
    span: Span,
) -> NodeId {
    let mut children = vec![callee];
    children.extend(args.iter().copied());
    store.alloc(
        NodeClass::Expr(ExprKind::Call { callee, args }),
        return_ty,
        Category::Rvalue,
        span,
        children,
    )
}

pub fn member(
    store: &mut NodeStore,
    base: NodeId,
    field: NameId,
    arrow: bool,
    field_ty: TypeId,
    category: Category,
    span: Span,
) -> NodeId {
    store.alloc(
        NodeClass::Expr(ExprKind::Member { base, field, arrow }),
        field_ty,
        category,
        span,
        vec![base],
    )
}

pub fn cast(store: &mut NodeStore, expr: NodeId, target: TypeId, span: Span) -> NodeId {
    store.alloc(
        NodeClass::Expr(ExprKind::Cast { expr }),
        target,
        Category::Rvalue,
        span,
        vec![expr],
    )
}

pub fn unary(
    store: &mut NodeStore,
    op: UnaryOp,
    expr: NodeId,
    result_ty: TypeId,
    category: Category,
    span: Span,
) -> NodeId {
    store.alloc(
        NodeClass::Expr(ExprKind::Unary { op, expr }),
        result_ty,
        category,
        span,
        vec![expr],
    )
}

pub fn binary(
    store: &mut NodeStore,
    op: BinOp,
    lhs: NodeId,
    rhs: NodeId,
    result_ty: TypeId,
    span: Span,
) -> NodeId {
    store.alloc(
        NodeClass::Expr(ExprKind::Binary { op, lhs, rhs }),
        result_ty,
        Category::Rvalue,
        span,
        vec![lhs, rhs],
    )
}

pub fn ternary(
    store: &mut NodeStore,
    cond: NodeId,
    then_branch: NodeId,
    else_branch: NodeId,
    result_ty: TypeId,
    span: Span,
) -> NodeId {
    store.alloc(
        NodeClass::Expr(ExprKind::Ternary {
            cond,
            then_branch,
            else_branch,
        }),
        result_ty,
        Category::Rvalue,
        span,
        vec![cond, then_branch, else_branch],
    )
}

pub fn initializer_list(
    store: &mut NodeStore,
    elements: Vec<NodeId>,
    placeholder_ty: TypeId,
    span: Span,
) -> NodeId {
    let children = elements.clone();
    store.alloc(
        NodeClass::Expr(ExprKind::Initializer { elements }),
        placeholder_ty,
        Category::Rvalue,
        span,
        children,
    )
}

pub fn inline_compound(
    store: &mut NodeStore,
    statements: Vec<NodeId>,
    void_ty: TypeId,
    span: Span,
) -> NodeId {
    let children = statements.clone();
    store.alloc(
        NodeClass::Expr(ExprKind::InlineCompound { statements }),
        void_ty,
        Category::Rvalue,
        span,
        children,
    )
}

/// Re-stamp an already-allocated node's type in place. Used by
/// `check_assignment_operands` to bind an
/// [crate::node::ExprKind::Initializer] list's type only once it's matched
/// against its target.
pub fn restamp_type(store: &mut NodeStore, id: NodeId, ty: TypeId) {
    store.get_mut(id).ty = ty;
}

// ---------------------------------------------------------------------
// Statement constructors
// ---------------------------------------------------------------------

fn stmt_node(
    store: &mut NodeStore,
    void_ty: TypeId,
    class: NodeClass,
    span: Span,
    children: Vec<NodeId>,
) -> NodeId {
    store.alloc(class, void_ty, Category::Rvalue, span, children)
}

pub fn expr_stmt(store: &mut NodeStore, void_ty: TypeId, expr: NodeId, span: Span) -> NodeId {
    stmt_node(store, void_ty, NodeClass::Stmt(StmtKind::Expr(expr)), span, vec![expr])
}

pub fn empty_stmt(store: &mut NodeStore, void_ty: TypeId, span: Span) -> NodeId {
    stmt_node(store, void_ty, NodeClass::Stmt(StmtKind::Empty), span, vec![])
}

pub fn compound_stmt(
    store: &mut NodeStore,
    void_ty: TypeId,
    statements: Vec<NodeId>,
    span: Span,
) -> NodeId {
    let children = statements.clone();
    stmt_node(store, void_ty, NodeClass::Stmt(StmtKind::Compound(statements)), span, children)
}

pub fn if_stmt(
    store: &mut NodeStore,
    void_ty: TypeId,
    cond: NodeId,
    then_branch: NodeId,
    else_branch: Option<NodeId>,
    span: Span,
) -> NodeId {
    let mut children = vec![cond, then_branch];
    if let Some(e) = else_branch {
        children.push(e);
    }
    stmt_node(
        store,
        void_ty,
        NodeClass::Stmt(StmtKind::If {
            cond,
            then_branch,
            else_branch,
        }),
        span,
        children,
    )
}

pub fn while_stmt(store: &mut NodeStore, void_ty: TypeId, cond: NodeId, body: NodeId, span: Span) -> NodeId {
    stmt_node(
        store,
        void_ty,
        NodeClass::Stmt(StmtKind::While { cond, body }),
        span,
        vec![cond, body],
    )
}

pub fn do_while_stmt(store: &mut NodeStore, void_ty: TypeId, body: NodeId, cond: NodeId, span: Span) -> NodeId {
    stmt_node(
        store,
        void_ty,
        NodeClass::Stmt(StmtKind::DoWhile { body, cond }),
        span,
        vec![body, cond],
    )
}

pub fn for_stmt(
    store: &mut NodeStore,
    void_ty: TypeId,
    init: Option<NodeId>,
    cond: Option<NodeId>,
    step: Option<NodeId>,
    body: NodeId,
    span: Span,
) -> NodeId {
    let mut children = vec![];
    children.extend(init);
    children.extend(cond);
    children.extend(step);
    children.push(body);
    stmt_node(
        store,
        void_ty,
        NodeClass::Stmt(StmtKind::For {
            init,
            cond,
            step,
            body,
        }),
        span,
        children,
    )
}

pub fn switch_stmt(store: &mut NodeStore, void_ty: TypeId, selector: NodeId, body: NodeId, span: Span) -> NodeId {
    stmt_node(
        store,
        void_ty,
        NodeClass::Stmt(StmtKind::Switch { selector, body }),
        span,
        vec![selector, body],
    )
}

pub fn case_stmt(store: &mut NodeStore, void_ty: TypeId, value: i32, body: NodeId, span: Span) -> NodeId {
    stmt_node(
        store,
        void_ty,
        NodeClass::Stmt(StmtKind::Case { value, body }),
        span,
        vec![body],
    )
}

pub fn default_stmt(store: &mut NodeStore, void_ty: TypeId, body: NodeId, span: Span) -> NodeId {
    stmt_node(store, void_ty, NodeClass::Stmt(StmtKind::Default { body }), span, vec![body])
}

pub fn break_stmt(store: &mut NodeStore, void_ty: TypeId, span: Span) -> NodeId {
    stmt_node(store, void_ty, NodeClass::Stmt(StmtKind::Break), span, vec![])
}

pub fn continue_stmt(store: &mut NodeStore, void_ty: TypeId, span: Span) -> NodeId {
    stmt_node(store, void_ty, NodeClass::Stmt(StmtKind::Continue), span, vec![])
}

pub fn return_stmt(store: &mut NodeStore, void_ty: TypeId, value: Option<NodeId>, span: Span) -> NodeId {
    let children = value.into_iter().collect();
    stmt_node(store, void_ty, NodeClass::Stmt(StmtKind::Return(value)), span, children)
}

pub fn labeled_stmt(store: &mut NodeStore, void_ty: TypeId, label: NameId, stmt: NodeId, span: Span) -> NodeId {
    stmt_node(
        store,
        void_ty,
        NodeClass::Stmt(StmtKind::Labeled { label, stmt }),
        span,
        vec![stmt],
    )
}

pub fn goto_stmt(store: &mut NodeStore, void_ty: TypeId, label: NameId, span: Span) -> NodeId {
    stmt_node(store, void_ty, NodeClass::Stmt(StmtKind::Goto(label)), span, vec![])
}

pub fn declaration_stmt(store: &mut NodeStore, void_ty: TypeId, decl: NodeId, span: Span) -> NodeId {
    stmt_node(
        store,
        void_ty,
        NodeClass::Stmt(StmtKind::Declaration(decl)),
        span,
        vec![decl],
    )
}

// ---------------------------------------------------------------------
// Declaration constructors
// ---------------------------------------------------------------------

pub fn var_decl(
    store: &mut NodeStore,
    void_ty: TypeId,
    ident: IdentId,
    init: Option<NodeId>,
    span: Span,
) -> NodeId {
    let children = init.into_iter().collect();
    stmt_node(
        store,
        void_ty,
        NodeClass::Decl(DeclKind::Var { ident, init }),
        span,
        children,
    )
}

pub fn array_decl(
    store: &mut NodeStore,
    void_ty: TypeId,
    ident: IdentId,
    dims: Vec<Option<NodeId>>,
    init: Option<NodeId>,
    span: Span,
) -> NodeId {
    let mut children: Vec<NodeId> = dims.iter().filter_map(|d| *d).collect();
    children.extend(init);
    stmt_node(
        store,
        void_ty,
        NodeClass::Decl(DeclKind::Array { ident, dims, init }),
        span,
        children,
    )
}

pub fn function_decl(
    store: &mut NodeStore,
    void_ty: TypeId,
    ident: IdentId,
    params: Vec<IdentId>,
    body: Option<NodeId>,
    span: Span,
) -> NodeId {
    let children = body.into_iter().collect();
    stmt_node(
        store,
        void_ty,
        NodeClass::Decl(DeclKind::Function { ident, params, body }),
        span,
        children,
    )
}

pub fn type_tag_decl(store: &mut NodeStore, void_ty: TypeId, ty: TypeId, span: Span) -> NodeId {
    stmt_node(store, void_ty, NodeClass::Decl(DeclKind::TypeTag { ty }), span, vec![])
}

// ---------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------

pub fn node(store: &NodeStore, id: NodeId) -> &Node {
    store.get(id)
}

pub fn is_broken(id: NodeId) -> bool {
    id.is_broken()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Category;
    use crate::types::TypeTable;

    #[test]
    fn test_identifier_is_lvalue() {
        let mut types = TypeTable::new();
        let mut store = NodeStore::new();
        let mut symbols = crate::symbols::SymbolTable::new();
        let repr = symbols.intern("x");
        let ident = symbols.declare(
            repr,
            types.int,
            0,
            crate::symbols::Locality::Local,
        );
        let id = identifier(&mut store, ident, types.int, Span::synthetic());
        assert_eq!(node(&store, id).category, Category::Lvalue);
        let _ = types.void; // keep types mutable-borrow use realistic
    }

    #[test]
    fn test_literal_is_rvalue() {
        let types = TypeTable::new();
        let mut store = NodeStore::new();
        let id = literal_int(&mut store, types.int, 5, Span::synthetic());
        assert_eq!(node(&store, id).category, Category::Rvalue);
    }
}
