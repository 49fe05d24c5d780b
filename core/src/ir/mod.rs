//! The IR Emitter: walks the type-annotated AST produced by
//! [crate::builder::Builder] and writes a textual SSA-style IR modeled after
//! LLVM. This module owns the shared emission state (register/label/block
//! counters, the "current" label fields, the array-descriptor table, and
//! which runtime intrinsics have been referenced); [expr], [stmt], and
//! [decl] hold the per-node-kind lowering rules, and [runtime] emits the
//! trailing stubs/declarations.
//!
//! One state struct with explicit fields, no globals: the emitter's
//! counters and label context are threaded through every call rather than
//! kept in thread-local or process-wide state.

pub mod decl;
pub mod expr;
pub mod runtime;
pub mod stmt;

use crate::node::NodeStore;
use crate::symbols::{IdentId, StringId, SymbolTable};
use crate::types::TypeTable;
use log::debug;
use std::collections::HashMap;

/// The form of an emitted expression's result. Callers that requested [Location::Mem] get back
/// [Answer::Mem]; everyone else adapts to whichever kind the callee
/// actually produced.
#[derive(Clone, Debug)]
pub enum Answer {
    /// An SSA virtual register holding a value (`%t<n>`).
    Reg(u32),
    /// An integer constant, foldable directly into the next instruction.
    ConstInt(i32),
    /// A double-precision constant.
    ConstFloat(f64),
    /// An `i1` SSA register; must be zero-extended to `i32` before use as an
    /// ordinary value.
    Logic(u32),
    /// The address of a variable or array slice: either a named global/local
    /// (`@var.3`, `%var.7`) or a computed pointer temporary (`%t12`).
    Mem(String),
    /// A string-pool index, to be emitted as a `getelementptr` constant over
    /// the corresponding `@.strN` global.
    Str(StringId),
    /// The `null` pointer constant.
    Null,
}

/// The location an expression is asked to produce its answer in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Location {
    /// Produce a value.
    Reg,
    /// Produce an lvalue address, suitable for `store` (assignment LHS,
    /// `++`/`--` target).
    Mem,
    /// No constraint; the callee may pick either form.
    Free,
}

/// One dimension of an array descriptor: either known at compile time, or a
/// register holding the runtime-computed bound.
#[derive(Clone, Copy, Debug)]
pub enum DimBound {
    Const(u32),
    Reg(u32),
}

/// The emitter's per-identifier array metadata. Lifetime is the enclosing function; `decl::lower_function`
/// clears the table on entry.
#[derive(Clone, Debug)]
pub struct ArrayDescriptor {
    pub is_static: bool,
    pub dims: Vec<DimBound>,
}

/// Which handwritten runtime stubs / library declarations have actually
/// been referenced, so [runtime::emit_epilogue] only emits what's used.
#[derive(Default, Debug)]
pub struct UsedIntrinsics {
    pub stacksave: bool,
    pub abs: bool,
    pub fabs: bool,
    pub file_io: bool,
    pub assert_: bool,
    pub print: bool,
    pub printid: bool,
    pub getid: bool,
}

/// The "current" label context: carried across expression/statement
/// emission as a plain field rather than threaded through every call's
/// parameter list. Saved and restored via [Emitter::with_labels] through a
/// small scoped-swap helper rather than mutated permanently.
#[derive(Copy, Clone, Debug, Default)]
struct LabelContext {
    label_true: u32,
    label_false: u32,
    label_break: u32,
    label_continue: u32,
    label_ternary_end: u32,
}

/// Shared emission state threaded through `expr`/`stmt`/`decl`/`runtime`.
/// Holds read-only borrows of the builder's finished tables plus the emitter's own monotonic counters and output buffer.
pub struct Emitter<'a> {
    pub nodes: &'a NodeStore,
    pub types: &'a TypeTable,
    pub symbols: &'a SymbolTable,
    out: String,
    register_counter: u32,
    label_counter: u32,
    block_counter: isize,
    labels: LabelContext,
    pub array_descriptors: HashMap<IdentId, ArrayDescriptor>,
    /// Label assigned to each `case`/`default` node of the switch currently
    /// being lowered, so the `Case`/`Default` arms in `stmt.rs` know where to
    /// drop their label once `lower_switch` has built the dispatch chain.
    pub case_labels: HashMap<crate::node::NodeId, u32>,
    pub used: UsedIntrinsics,
    /// Chain of currently-outstanding `stacksave` slot ids, innermost last.
    /// `return` restores the *whole* chain, not just the function-wide slot.
    stack_slots: Vec<isize>,
    current_function_is_main: bool,
    current_function_return_void: bool,
}

impl<'a> Emitter<'a> {
    pub fn new(nodes: &'a NodeStore, types: &'a TypeTable, symbols: &'a SymbolTable) -> Self {
        Self {
            nodes,
            types,
            symbols,
            out: String::new(),
            register_counter: 0,
            label_counter: 0,
            block_counter: 0,
            labels: LabelContext::default(),
            array_descriptors: HashMap::new(),
            case_labels: HashMap::new(),
            used: UsedIntrinsics::default(),
            stack_slots: Vec::new(),
            current_function_is_main: false,
            current_function_return_void: true,
        }
    }

    pub fn into_output(self) -> String {
        self.out
    }

    pub fn emit_line(&mut self, line: impl AsRef<str>) {
        self.out.push_str(line.as_ref());
        self.out.push('\n');
    }

    pub fn new_register(&mut self) -> u32 {
        let id = self.register_counter;
        self.register_counter += 1;
        id
    }

    pub fn new_label(&mut self) -> u32 {
        let id = self.label_counter;
        self.label_counter += 1;
        id
    }

    /// A fresh slot id for a stack save/restore pair, keyed by the block
    /// counter.
    pub fn new_block_slot(&mut self) -> isize {
        let id = self.block_counter;
        self.block_counter += 1;
        id
    }

    fn with_labels<R>(&mut self, new: LabelContext, f: impl FnOnce(&mut Self) -> R) -> R {
        let old = self.labels;
        self.labels = new;
        let result = f(self);
        self.labels = old;
        result
    }

    pub fn label_true(&self) -> u32 {
        self.labels.label_true
    }
    pub fn label_false(&self) -> u32 {
        self.labels.label_false
    }
    pub fn label_break(&self) -> u32 {
        self.labels.label_break
    }
    pub fn label_continue(&self) -> u32 {
        self.labels.label_continue
    }
    pub fn label_ternary_end(&self) -> u32 {
        self.labels.label_ternary_end
    }

    /// Push a stack-save slot onto the active chain (a `stacksave` was just
    /// emitted for it) and mark the intrinsic used.
    pub fn push_stack_slot(&mut self, slot: isize) {
        self.used.stacksave = true;
        self.stack_slots.push(slot);
    }

    pub fn pop_stack_slot(&mut self) {
        self.stack_slots.pop();
    }

    /// Emit a `stackrestore` for every outstanding slot, innermost first:
    /// `return` restores the full chain, not just the function-wide slot.
    pub fn restore_full_stack_chain(&mut self) {
        for &slot in self.stack_slots.iter().rev() {
            self.emit_line(format!(
                "  call i8* @llvm.stackrestore(i8* %stack.{})",
                slot
            ));
        }
    }

    pub fn is_main(&self) -> bool {
        self.current_function_is_main
    }

    /// Record that a `file`-typed value was declared, so the epilogue emits
    /// `%struct._IO_FILE` only for modules that actually use it.
    pub fn note_type_usage(&mut self, ty: crate::types::TypeId) {
        if self.types.is_file(ty) {
            self.used.file_io = true;
        }
    }

    pub fn enter_function(&mut self, name: &str, return_void: bool) {
        debug!("emitting function {}", name);
        self.current_function_is_main = name == "main";
        self.current_function_return_void = return_void;
        self.array_descriptors.clear();
        self.case_labels.clear();
        self.stack_slots.clear();
        self.register_counter = 0;
    }

    pub fn current_function_return_void(&self) -> bool {
        self.current_function_return_void
    }
}

/// Zero-extend a [Answer::Logic] register to `i32`, leaving any other
/// answer kind untouched. Binary/call/arithmetic emission routes every
/// operand through this before using it as a value.
pub(crate) fn zext_logic(emitter: &mut Emitter, answer: Answer) -> Answer {
    match answer {
        Answer::Logic(reg) => {
            let dest = emitter.new_register();
            emitter.emit_line(format!("  %t{} = zext i1 %t{} to i32", dest, reg));
            Answer::Reg(dest)
        }
        other => other,
    }
}

/// Render an [Answer] as an LLVM-ready operand string, assuming the operand
/// has already been zero-extended if it was [Answer::Logic].
pub(crate) fn operand_text(answer: &Answer) -> String {
    match answer {
        Answer::Reg(r) | Answer::Logic(r) => format!("%t{}", r),
        Answer::Mem(s) => s.clone(),
        Answer::ConstInt(v) => v.to_string(),
        Answer::ConstFloat(v) => format!("{:?}", v),
        Answer::Str(id) => format!("@.str{}", id.0),
        Answer::Null => "null".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeStore;
    use crate::symbols::SymbolTable;
    use crate::types::TypeTable;

    #[test]
    fn test_register_and_label_counters_are_monotonic() {
        let nodes = NodeStore::new();
        let types = TypeTable::new();
        let symbols = SymbolTable::new();
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        assert_eq!(emitter.new_register(), 0);
        assert_eq!(emitter.new_register(), 1);
        assert_eq!(emitter.new_label(), 0);
        assert_eq!(emitter.new_label(), 1);
    }

    #[test]
    fn test_label_context_restored_after_scope() {
        let nodes = NodeStore::new();
        let types = TypeTable::new();
        let symbols = SymbolTable::new();
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        emitter.labels.label_true = 7;
        emitter.with_labels(
            LabelContext {
                label_true: 99,
                ..Default::default()
            },
            |inner| {
                assert_eq!(inner.label_true(), 99);
            },
        );
        assert_eq!(emitter.label_true(), 7);
    }

    #[test]
    fn test_zext_converts_logic_to_reg() {
        let nodes = NodeStore::new();
        let types = TypeTable::new();
        let symbols = SymbolTable::new();
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        let result = zext_logic(&mut emitter, Answer::Logic(3));
        assert!(matches!(result, Answer::Reg(_)));
        assert!(emitter.out.contains("zext i1 %t3 to i32"));
    }

    #[test]
    fn test_stack_chain_restores_innermost_first() {
        let nodes = NodeStore::new();
        let types = TypeTable::new();
        let symbols = SymbolTable::new();
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        emitter.push_stack_slot(0);
        emitter.push_stack_slot(1);
        emitter.restore_full_stack_chain();
        let first = emitter.out.find("stack.1").unwrap();
        let second = emitter.out.find("stack.0").unwrap();
        assert!(first < second);
    }
}
