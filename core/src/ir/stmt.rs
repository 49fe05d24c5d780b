//! Statement lowering and the conditional-branch idiom: every statement
//! that tests a condition (`if`, `while`, `do`, `for`, the ternary's
//! cousin) lowers its condition through the same `check_type_and_branch`
//! shape, gated on the emitter's "current" label context rather than
//! threading labels through every call by hand.

use super::{operand_text, zext_logic, Answer, ArrayDescriptor, DimBound, Emitter, LabelContext, Location};
use crate::node::{DeclKind, NodeClass, NodeId, StmtKind};

fn declares_dynamic_array(emitter: &Emitter, stmt: NodeId) -> bool {
    if let NodeClass::Stmt(StmtKind::Declaration(decl)) = &emitter.nodes.get(stmt).class {
        if let NodeClass::Decl(DeclKind::Array { dims, .. }) = &emitter.nodes.get(*decl).class {
            return dims.iter().any(|d| d.is_some());
        }
    }
    false
}

/// Lower one statement. Returns the computed [Answer] when it was a bare
/// expression statement (used by `print`'s inline-compound expression to
/// report its final value), `None` otherwise.
pub fn lower_stmt(emitter: &mut Emitter, stmt: NodeId) -> Option<Answer> {
    let class = emitter.nodes.get(stmt).class.clone();
    match class {
        NodeClass::Stmt(StmtKind::Expr(expr)) => {
            Some(super::expr::lower_expr(emitter, expr, Location::Free))
        }
        NodeClass::Stmt(StmtKind::Empty) => None,
        NodeClass::Stmt(StmtKind::Compound(stmts)) => lower_compound(emitter, &stmts),
        NodeClass::Stmt(StmtKind::If { cond, then_branch, else_branch }) => {
            lower_if(emitter, cond, then_branch, else_branch);
            None
        }
        NodeClass::Stmt(StmtKind::While { cond, body }) => {
            lower_while(emitter, cond, body);
            None
        }
        NodeClass::Stmt(StmtKind::DoWhile { body, cond }) => {
            lower_do_while(emitter, body, cond);
            None
        }
        NodeClass::Stmt(StmtKind::For { init, cond, step, body }) => {
            lower_for(emitter, init, cond, step, body);
            None
        }
        NodeClass::Stmt(StmtKind::Switch { selector, body }) => {
            lower_switch(emitter, selector, body);
            None
        }
        NodeClass::Stmt(StmtKind::Case { value, body }) => {
            if let Some(&label) = emitter.case_labels.get(&stmt) {
                emitter.emit_line(format!("L{}: ; case {}", label, value));
            }
            lower_stmt(emitter, body)
        }
        NodeClass::Stmt(StmtKind::Default { body }) => {
            if let Some(&label) = emitter.case_labels.get(&stmt) {
                emitter.emit_line(format!("L{}: ; default", label));
            }
            lower_stmt(emitter, body)
        }
        NodeClass::Stmt(StmtKind::Break) => {
            emitter.emit_line(format!("  br label %L{}", emitter.label_break()));
            None
        }
        NodeClass::Stmt(StmtKind::Continue) => {
            emitter.emit_line(format!("  br label %L{}", emitter.label_continue()));
            None
        }
        NodeClass::Stmt(StmtKind::Return(value)) => {
            lower_return(emitter, value);
            None
        }
        NodeClass::Stmt(StmtKind::Labeled { label, stmt }) => {
            emitter.emit_line(format!("user_label_{}:", label.0));
            lower_stmt(emitter, stmt)
        }
        NodeClass::Stmt(StmtKind::Goto(label)) => {
            emitter.emit_line(format!("  br label %user_label_{}", label.0));
            None
        }
        NodeClass::Stmt(StmtKind::Declaration(decl)) => {
            super::decl::lower_local_declaration(emitter, decl);
            None
        }
        NodeClass::Expr(_) | NodeClass::Decl(_) => unreachable!("not a statement node"),
    }
}

fn lower_compound(emitter: &mut Emitter, stmts: &[NodeId]) -> Option<Answer> {
    let needs_stack_frame = stmts.iter().any(|&s| declares_dynamic_array(emitter, s));
    let slot = if needs_stack_frame {
        let slot = emitter.new_block_slot();
        emitter.emit_line(format!("  %stack.{} = call i8* @llvm.stacksave()", slot));
        emitter.push_stack_slot(slot);
        Some(slot)
    } else {
        None
    };
    let mut last = None;
    for &s in stmts {
        last = lower_stmt(emitter, s);
    }
    if let Some(slot) = slot {
        emitter.emit_line(format!(
            "  call void @llvm.stackrestore(i8* %stack.{})",
            slot
        ));
        emitter.pop_stack_slot();
    }
    last
}

/// `check_type_and_branch`: evaluate `cond`, coerce it to `i1`, and branch to
/// the emitter's current `label_true`/`label_false`.
fn check_type_and_branch(emitter: &mut Emitter, cond: NodeId) {
    let value = super::expr::lower_expr(emitter, cond, Location::Reg);
    let bool_reg = match value {
        Answer::Logic(r) => r,
        other => {
            let other = zext_logic(emitter, other);
            let dest = emitter.new_register();
            emitter.emit_line(format!(
                "  %t{} = icmp ne i32 {}, 0",
                dest,
                operand_text(&other)
            ));
            dest
        }
    };
    emitter.emit_line(format!(
        "  br i1 %t{}, label %L{}, label %L{}",
        bool_reg,
        emitter.label_true(),
        emitter.label_false()
    ));
}

fn lower_if(emitter: &mut Emitter, cond: NodeId, then_branch: NodeId, else_branch: Option<NodeId>) {
    let then_label = emitter.new_label();
    let else_label = emitter.new_label();
    let end_label = emitter.new_label();
    let false_target = if else_branch.is_some() { else_label } else { end_label };
    let labels = LabelContext {
        label_true: then_label,
        label_false: false_target,
        label_break: emitter.label_break(),
        label_continue: emitter.label_continue(),
        label_ternary_end: emitter.label_ternary_end(),
    };
    emitter.with_labels(labels, |e| check_type_and_branch(e, cond));
    emitter.emit_line(format!("L{}:", then_label));
    lower_stmt(emitter, then_branch);
    emitter.emit_line(format!("  br label %L{}", end_label));
    if let Some(else_branch) = else_branch {
        emitter.emit_line(format!("L{}:", else_label));
        lower_stmt(emitter, else_branch);
        emitter.emit_line(format!("  br label %L{}", end_label));
    }
    emitter.emit_line(format!("L{}:", end_label));
}

fn lower_while(emitter: &mut Emitter, cond: NodeId, body: NodeId) {
    let head_label = emitter.new_label();
    let body_label = emitter.new_label();
    let end_label = emitter.new_label();
    emitter.emit_line(format!("  br label %L{}", head_label));
    emitter.emit_line(format!("L{}:", head_label));
    let labels = LabelContext {
        label_true: body_label,
        label_false: end_label,
        label_break: end_label,
        label_continue: head_label,
        label_ternary_end: emitter.label_ternary_end(),
    };
    emitter.with_labels(labels.clone(), |e| check_type_and_branch(e, cond));
    emitter.emit_line(format!("L{}:", body_label));
    emitter.with_labels(labels, |e| {
        lower_stmt(e, body);
    });
    emitter.emit_line(format!("  br label %L{}", head_label));
    emitter.emit_line(format!("L{}:", end_label));
}

fn lower_do_while(emitter: &mut Emitter, body: NodeId, cond: NodeId) {
    let body_label = emitter.new_label();
    let cond_label = emitter.new_label();
    let end_label = emitter.new_label();
    emitter.emit_line(format!("  br label %L{}", body_label));
    emitter.emit_line(format!("L{}:", body_label));
    let labels = LabelContext {
        label_true: body_label,
        label_false: end_label,
        label_break: end_label,
        label_continue: cond_label,
        label_ternary_end: emitter.label_ternary_end(),
    };
    emitter.with_labels(labels.clone(), |e| {
        lower_stmt(e, body);
    });
    emitter.emit_line(format!("  br label %L{}", cond_label));
    emitter.emit_line(format!("L{}:", cond_label));
    emitter.with_labels(labels, |e| check_type_and_branch(e, cond));
    emitter.emit_line(format!("L{}:", end_label));
}

fn lower_for(
    emitter: &mut Emitter,
    init: Option<NodeId>,
    cond: Option<NodeId>,
    step: Option<NodeId>,
    body: NodeId,
) {
    if let Some(init) = init {
        super::expr::lower_expr(emitter, init, Location::Free);
    }
    let head_label = emitter.new_label();
    let body_label = emitter.new_label();
    let step_label = emitter.new_label();
    let end_label = emitter.new_label();
    emitter.emit_line(format!("  br label %L{}", head_label));
    emitter.emit_line(format!("L{}:", head_label));
    let labels = LabelContext {
        label_true: body_label,
        label_false: end_label,
        label_break: end_label,
        label_continue: step_label,
        label_ternary_end: emitter.label_ternary_end(),
    };
    match cond {
        Some(cond) => {
            emitter.with_labels(labels.clone(), |e| check_type_and_branch(e, cond));
        }
        None => emitter.emit_line(format!("  br label %L{}", body_label)),
    }
    emitter.emit_line(format!("L{}:", body_label));
    emitter.with_labels(labels, |e| {
        lower_stmt(e, body);
    });
    emitter.emit_line(format!("  br label %L{}", step_label));
    emitter.emit_line(format!("L{}:", step_label));
    if let Some(step) = step {
        super::expr::lower_expr(emitter, step, Location::Free);
    }
    emitter.emit_line(format!("  br label %L{}", head_label));
    emitter.emit_line(format!("L{}:", end_label));
}

/// Walk a switch body collecting every `case`/`default` label it contains,
/// in source order. A `case` wraps only the single statement that follows
/// it, so consecutive case labels (`case 1: case 2: foo();`) chain through
/// each other's `body` rather than sitting in the same `Compound` slot.
fn collect_cases(emitter: &Emitter, stmt: NodeId, cases: &mut Vec<(i32, NodeId)>, default: &mut Option<NodeId>) {
    match &emitter.nodes.get(stmt).class {
        NodeClass::Stmt(StmtKind::Compound(stmts)) => {
            let stmts = stmts.clone();
            for s in stmts {
                collect_cases(emitter, s, cases, default);
            }
        }
        NodeClass::Stmt(StmtKind::Case { value, body }) => {
            cases.push((*value, stmt));
            let body = *body;
            collect_cases(emitter, body, cases, default);
        }
        NodeClass::Stmt(StmtKind::Default { body }) => {
            *default = Some(stmt);
            let body = *body;
            collect_cases(emitter, body, cases, default);
        }
        _ => {}
    }
}

/// `switch` lowers to a chain of `icmp eq`/`br` pairs against the selector,
/// one per case, falling to `default` (or straight past the body) when none
/// match. The body itself still lowers as a flat, fall-through sequence of
/// statements; the dispatch chain only decides *where* execution enters it.
fn lower_switch(emitter: &mut Emitter, selector: NodeId, body: NodeId) {
    let selector_value = super::expr::lower_expr(emitter, selector, Location::Reg);
    let selector_value = zext_logic(emitter, selector_value);
    let selector_text = operand_text(&selector_value);

    let mut cases = Vec::new();
    let mut default = None;
    collect_cases(emitter, body, &mut cases, &mut default);

    let end_label = emitter.new_label();
    let case_labels: Vec<(i32, u32)> = cases
        .iter()
        .map(|&(value, node)| {
            let label = emitter.new_label();
            emitter.case_labels.insert(node, label);
            (value, label)
        })
        .collect();
    let default_label = default.map(|node| {
        let label = emitter.new_label();
        emitter.case_labels.insert(node, label);
        label
    });
    let fallthrough_label = default_label.unwrap_or(end_label);

    for (i, &(value, label)) in case_labels.iter().enumerate() {
        let next_check = if i + 1 < case_labels.len() {
            emitter.new_label()
        } else {
            fallthrough_label
        };
        let reg = emitter.new_register();
        emitter.emit_line(format!(
            "  %t{} = icmp eq i32 {}, {}",
            reg, selector_text, value
        ));
        emitter.emit_line(format!(
            "  br i1 %t{}, label %L{}, label %L{}",
            reg, label, next_check
        ));
        if i + 1 < case_labels.len() {
            emitter.emit_line(format!("L{}:", next_check));
        }
    }
    if case_labels.is_empty() {
        emitter.emit_line(format!("  br label %L{}", fallthrough_label));
    }

    let labels = LabelContext {
        label_true: emitter.label_true(),
        label_false: emitter.label_false(),
        label_break: end_label,
        label_continue: emitter.label_continue(),
        label_ternary_end: emitter.label_ternary_end(),
    };
    emitter.with_labels(labels, |e| {
        lower_stmt(e, body);
    });
    emitter.emit_line(format!("  br label %L{}", end_label));
    emitter.emit_line(format!("L{}:", end_label));
}

fn lower_return(emitter: &mut Emitter, value: Option<NodeId>) {
    match value {
        Some(expr) => {
            let answer = super::expr::lower_expr(emitter, expr, Location::Reg);
            let answer = zext_logic(emitter, answer);
            emitter.restore_full_stack_chain();
            let ty = emitter.nodes.get(expr).ty;
            let llty = super::expr::ir_type(emitter, ty);
            emitter.emit_line(format!("  ret {} {}", llty, operand_text(&answer)));
        }
        None => {
            emitter.restore_full_stack_chain();
            emitter.emit_line("  ret void");
        }
    }
}

/// Register a dynamic array's runtime-computed dimension bounds so `upb`
/// lookups inside the declaring scope resolve.
pub(crate) fn record_array_descriptor(
    emitter: &mut Emitter,
    ident: crate::symbols::IdentId,
    is_static: bool,
    dims: Vec<DimBound>,
) {
    emitter
        .array_descriptors
        .insert(ident, ArrayDescriptor { is_static, dims });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast;
    use crate::node::NodeStore;
    use crate::symbols::SymbolTable;
    use crate::types::TypeTable;
    use crate::util::Span;

    fn span() -> Span {
        Span::synthetic()
    }

    #[test]
    fn test_if_without_else_branches_to_end_on_false() {
        let mut nodes = NodeStore::new();
        let types = TypeTable::new();
        let symbols = SymbolTable::new();
        let cond = ast::literal_bool(&mut nodes, types.bool_, true, span());
        let then_branch = ast::empty_stmt(&mut nodes, types.void, span());
        let if_node = ast::if_stmt(&mut nodes, types.void, cond, then_branch, None, span());
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        lower_stmt(&mut emitter, if_node);
        let out = emitter.into_output();
        assert!(out.contains("br i1"));
    }

    #[test]
    fn test_return_with_value_emits_ret_and_restores_stack() {
        let mut nodes = NodeStore::new();
        let types = TypeTable::new();
        let symbols = SymbolTable::new();
        let lit = ast::literal_int(&mut nodes, types.int, 7, span());
        let ret = ast::return_stmt(&mut nodes, types.void, Some(lit), span());
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        emitter.push_stack_slot(0);
        lower_stmt(&mut emitter, ret);
        let out = emitter.into_output();
        assert!(out.contains("stackrestore"));
        assert!(out.contains("ret i32 7"));
    }

    #[test]
    fn test_break_branches_to_current_label_break() {
        let mut nodes = NodeStore::new();
        let types = TypeTable::new();
        let symbols = SymbolTable::new();
        let brk = ast::break_stmt(&mut nodes, types.void, span());
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        lower_stmt(&mut emitter, brk);
        assert!(emitter.into_output().contains("br label %L0"));
    }

    #[test]
    fn test_switch_dispatches_each_case_with_icmp_eq() {
        let mut nodes = NodeStore::new();
        let types = TypeTable::new();
        let symbols = SymbolTable::new();
        let selector = ast::literal_int(&mut nodes, types.int, 1, span());
        let break1 = ast::break_stmt(&mut nodes, types.void, span());
        let case1 = ast::case_stmt(&mut nodes, types.void, 1, break1, span());
        let break2 = ast::break_stmt(&mut nodes, types.void, span());
        let case2 = ast::case_stmt(&mut nodes, types.void, 2, break2, span());
        let body = ast::compound_stmt(&mut nodes, types.void, vec![case1, case2], span());
        let switch = ast::switch_stmt(&mut nodes, types.void, selector, body, span());
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        lower_stmt(&mut emitter, switch);
        let out = emitter.into_output();
        assert!(out.contains("icmp eq i32"));
        assert!(out.contains(", 1"));
        assert!(out.contains(", 2"));
        assert!(out.contains("; case 1"));
        assert!(out.contains("; case 2"));
    }

    #[test]
    fn test_switch_with_no_matching_case_falls_past_body() {
        let mut nodes = NodeStore::new();
        let types = TypeTable::new();
        let symbols = SymbolTable::new();
        let selector = ast::literal_int(&mut nodes, types.int, 9, span());
        let only_stmt = ast::empty_stmt(&mut nodes, types.void, span());
        let body = ast::compound_stmt(&mut nodes, types.void, vec![only_stmt], span());
        let switch = ast::switch_stmt(&mut nodes, types.void, selector, body, span());
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        lower_stmt(&mut emitter, switch);
        let out = emitter.into_output();
        assert!(out.contains("br label %L0"));
    }
}
