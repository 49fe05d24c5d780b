//! The AST Builder: consumes parser callbacks and produces a
//! fully type-checked, constant-folded tree. Every entry point returns a
//! [NodeId] — either a well-formed node, or [NodeId::BROKEN] once an error
//! has already been reported for this construct, so callers never need to
//! re-report a cascading failure.
//!
//! A single `Builder` carries the type/symbol/string tables plus the
//! accumulated error vector, and is driven incrementally by the parser
//! rather than walking an already-finished tree.

use crate::ast;
use crate::consts::MAX_PRINTF_ARGS;
use crate::desugar;
use crate::error::{CompileError, CompileWarning, SourceErrorWrapper};
use crate::node::{BinOp, Category, ExprKind, NodeClass, NodeId, NodeStore, UnaryOp};
use crate::symbols::{IdentId, Locality, ReprId, StringPool, SymbolTable};
use crate::types::{TypeId, TypeTable};
use crate::util::Span;
use log::debug;

/// Builtin statement names dispatched specially by `build_call`. Interned once so calls can be recognized by [ReprId] comparison
/// rather than re-comparing strings at every call site.
struct Builtins {
    printf: ReprId,
    print: ReprId,
    printid: ReprId,
    getid: ReprId,
}

pub struct Builder {
    pub nodes: NodeStore,
    pub types: TypeTable,
    pub symbols: SymbolTable,
    pub strings: StringPool,
    pub errors: Vec<SourceErrorWrapper<CompileError>>,
    pub warnings: Vec<SourceErrorWrapper<CompileWarning>>,
    source: String,
    builtins: Builtins,
    /// Return type of the function currently being built; `None` at file
    /// scope, used by `build_return` (§4.1.7).
    current_function_return: Option<TypeId>,
    /// Next suffix for synthesized `_temporal_identifier_<n>_` names
    /// (§4.1.6), kept in step with `symbols.ident_count()`.
    temp_counter: u32,
}

impl Builder {
    pub fn new(source: String) -> Self {
        let mut types = TypeTable::new();
        let mut symbols = SymbolTable::new();

        // Builtins are declared as ordinary global functions so
        // `build_identifier` can resolve `printf`/`print`/`printid`/`getid`
        // exactly like user-defined calls; `build_call` then recognizes
        // their repr and dispatches to the specialized handling below
        // instead of emitting an ordinary `call`.
        let printf_ty = types.function_of(types.int, vec![types.vararg]);
        let print_ty = types.function_of(types.void, vec![types.vararg]);
        let printid_ty = types.function_of(types.void, vec![types.vararg]);
        let getid_ty = types.function_of(types.void, vec![types.vararg]);

        let printf_repr = symbols.intern("printf");
        let print_repr = symbols.intern("print");
        let printid_repr = symbols.intern("printid");
        let getid_repr = symbols.intern("getid");
        symbols.declare(printf_repr, printf_ty, 0, Locality::Global);
        symbols.declare(print_repr, print_ty, 0, Locality::Global);
        symbols.declare(printid_repr, printid_ty, 0, Locality::Global);
        symbols.declare(getid_repr, getid_ty, 0, Locality::Global);

        let builtins = Builtins {
            printf: printf_repr,
            print: print_repr,
            printid: printid_repr,
            getid: getid_repr,
        };
        Self {
            nodes: NodeStore::new(),
            types,
            symbols,
            strings: StringPool::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            source,
            builtins,
            current_function_return: None,
            temp_counter: 0,
        }
    }

    fn error(&mut self, err: CompileError, span: Span) -> NodeId {
        self.errors
            .push(SourceErrorWrapper::new(err, span, &self.source));
        NodeId::BROKEN
    }

    fn warn(&mut self, warning: CompileWarning, span: Span) {
        self.warnings
            .push(SourceErrorWrapper::new(warning, span, &self.source));
    }

    fn is_broken(&self, id: NodeId) -> bool {
        id.is_broken()
    }

    /// Generate a fresh `_temporal_identifier_<n>_` and declare it in the
    /// identifier table (§4.1.6). Returns the new [IdentId].
    pub fn fresh_temporary(&mut self, ty: TypeId, locality: Locality) -> IdentId {
        let name = format!(
            "{}{}_",
            crate::consts::TEMPORAL_IDENTIFIER_PREFIX,
            self.symbols.ident_count()
        );
        self.temp_counter += 1;
        let repr = self.symbols.intern(&name);
        self.symbols.declare(repr, ty, 0, locality)
    }

    // -----------------------------------------------------------------
    // 4.1.1 Literal and identifier construction
    // -----------------------------------------------------------------

    pub fn build_identifier(&mut self, name: &str, span: Span) -> NodeId {
        let repr = self.symbols.intern(name);
        let ident = match self.symbols.resolve(repr) {
            Some(id) => id,
            None => return self.error(CompileError::UseOfUndeclaredIdentifier, span),
        };
        let record = self.symbols.ident(ident).clone();
        if self.types.is_enum_field(record.ty) {
            let enum_ty = self
                .types
                .enum_identity(record.ty)
                .expect("enum-field type always has an enum identity");
            return ast::literal_int(&mut self.nodes, enum_ty, record.displacement as i32, span);
        }
        ast::identifier(&mut self.nodes, ident, record.ty, span)
    }

    pub fn build_literal_null(&mut self, span: Span) -> NodeId {
        ast::literal_null(&mut self.nodes, self.types.null_pointer, span)
    }

    pub fn build_literal_bool(&mut self, value: bool, span: Span) -> NodeId {
        ast::literal_bool(&mut self.nodes, self.types.bool_, value, span)
    }

    pub fn build_literal_char(&mut self, value: char, span: Span) -> NodeId {
        ast::literal_char(&mut self.nodes, self.types.char_, value, span)
    }

    pub fn build_literal_int(&mut self, value: i32, span: Span) -> NodeId {
        ast::literal_int(&mut self.nodes, self.types.int, value, span)
    }

    pub fn build_literal_float(&mut self, value: f64, span: Span) -> NodeId {
        ast::literal_float(&mut self.nodes, self.types.float, value, span)
    }

    pub fn build_literal_string(&mut self, value: &str, span: Span) -> NodeId {
        let id = self.strings.intern(value);
        ast::literal_string(&mut self.nodes, self.types.string, id, span)
    }

    // -----------------------------------------------------------------
    // 4.1.2 Implicit conversions and build_cast
    // -----------------------------------------------------------------

    pub fn build_cast(&mut self, target: TypeId, expr: NodeId, span: Span) -> NodeId {
        if self.is_broken(expr) {
            return NodeId::BROKEN;
        }
        let src_ty = self.nodes.get(expr).ty;
        if self.types.types_equal(src_ty, target) {
            return expr;
        }
        if self.types.is_integer(src_ty)
            && self.types.is_floating(target)
            && matches!(
                self.nodes.get(expr).class,
                NodeClass::Expr(ExprKind::LiteralInt(_))
            )
        {
            let value = match self.nodes.get(expr).class {
                NodeClass::Expr(ExprKind::LiteralInt(v)) => v as f64,
                _ => unreachable!(),
            };
            let old_span = self.nodes.get(expr).span;
            self.nodes.insert(
                expr,
                NodeClass::Expr(ExprKind::LiteralFloat(value)),
                target,
                Category::Rvalue,
                old_span,
            );
            return expr;
        }
        ast::cast(&mut self.nodes, expr, target, span)
    }

    /// `usual_arithmetic_conversions(L, R)` (§4.1.2): if either side is
    /// floating, both are cast to float; else both stay `int`. Returns the
    /// (possibly cast) operands plus the shared result type.
    pub fn usual_arithmetic_conversions(
        &mut self,
        lhs: NodeId,
        rhs: NodeId,
        span: Span,
    ) -> (NodeId, NodeId, TypeId) {
        let lhs_ty = self.nodes.get(lhs).ty;
        let rhs_ty = self.nodes.get(rhs).ty;
        let result_ty = if self.types.is_floating(lhs_ty) || self.types.is_floating(rhs_ty) {
            self.types.float
        } else {
            self.types.int
        };
        let lhs = self.build_cast(result_ty, lhs, span);
        let rhs = self.build_cast(result_ty, rhs, span);
        (lhs, rhs, result_ty)
    }

    // -----------------------------------------------------------------
    // 4.1.3 Unary operators
    // -----------------------------------------------------------------

    pub fn build_unary(&mut self, op: UnaryOp, operand: NodeId, span: Span) -> NodeId {
        if self.is_broken(operand) {
            return NodeId::BROKEN;
        }
        let operand_ty = self.nodes.get(operand).ty;
        let operand_category = self.nodes.get(operand).category;

        match op {
            UnaryOp::PostInc | UnaryOp::PostDec | UnaryOp::PreInc | UnaryOp::PreDec => {
                if operand_category != Category::Lvalue || !self.types.is_arithmetic(operand_ty) {
                    return self.error(CompileError::IncrementOperandNotLvalueArithmetic, span);
                }
                ast::unary(&mut self.nodes, op, operand, operand_ty, Category::Rvalue, span)
            }
            UnaryOp::AddrOf => {
                if operand_category != Category::Lvalue {
                    return self.error(CompileError::AddrofOperandNotLvalue, span);
                }
                let ty = self.types.pointer_to(operand_ty);
                ast::unary(&mut self.nodes, op, operand, ty, Category::Rvalue, span)
            }
            UnaryOp::Indirection => {
                let element = match self.types.element_type(operand_ty) {
                    Some(el) if self.types.is_pointer(operand_ty) => el,
                    _ => return self.error(CompileError::IndirectionOperandNotPointer, span),
                };
                ast::unary(&mut self.nodes, op, operand, element, Category::Lvalue, span)
            }
            UnaryOp::Abs | UnaryOp::ArithMinus => {
                if !self.types.is_arithmetic(operand_ty) {
                    return self.error(CompileError::UnaryOperandNotArithmetic, span);
                }
                let folded = self.fold_unary_literal(op, operand, operand_ty, span);
                folded.unwrap_or_else(|| {
                    ast::unary(&mut self.nodes, op, operand, operand_ty, Category::Rvalue, span)
                })
            }
            UnaryOp::BitNot => {
                if !self.types.is_integer(operand_ty) {
                    return self.error(CompileError::UnnotOperandNotInteger, span);
                }
                let folded = self.fold_unary_literal(op, operand, self.types.int, span);
                folded.unwrap_or_else(|| {
                    ast::unary(&mut self.nodes, op, operand, self.types.int, Category::Rvalue, span)
                })
            }
            UnaryOp::LogicalNot => {
                if !self.types.is_scalar(operand_ty) {
                    return self.error(CompileError::LognotOperandNotScalar, span);
                }
                let folded = self.fold_unary_literal(op, operand, self.types.bool_, span);
                folded.unwrap_or_else(|| {
                    ast::unary(&mut self.nodes, op, operand, self.types.bool_, Category::Rvalue, span)
                })
            }
            UnaryOp::Upb(_) => {
                if !self.types.is_array(operand_ty) {
                    return self.error(CompileError::UpbOperandNotArray, span);
                }
                ast::unary(&mut self.nodes, op, operand, self.types.int, Category::Rvalue, span)
            }
        }
    }

    /// Fold `abs`/`arith-minus`/`bit-not`/`logical-not` over a literal
    /// operand (§4.1.3). Returns `None` when the operand isn't a literal
    /// (the caller then builds an ordinary unary node).
    fn fold_unary_literal(
        &mut self,
        op: UnaryOp,
        operand: NodeId,
        result_ty: TypeId,
        span: Span,
    ) -> Option<NodeId> {
        let class = match &self.nodes.get(operand).class {
            NodeClass::Expr(ExprKind::LiteralInt(v)) => Some(Literal::Int(*v)),
            NodeClass::Expr(ExprKind::LiteralFloat(v)) => Some(Literal::Float(*v)),
            NodeClass::Expr(ExprKind::LiteralBool(v)) => Some(Literal::Bool(*v)),
            _ => None,
        }?;
        let folded = match (op, class) {
            (UnaryOp::ArithMinus, Literal::Int(v)) => Literal::Int(v.wrapping_neg()),
            (UnaryOp::ArithMinus, Literal::Float(v)) => Literal::Float(-v),
            (UnaryOp::Abs, Literal::Int(v)) => Literal::Int(v.wrapping_abs()),
            (UnaryOp::Abs, Literal::Float(v)) => Literal::Float(v.abs()),
            (UnaryOp::BitNot, Literal::Int(v)) => Literal::Int(!v),
            (UnaryOp::LogicalNot, Literal::Bool(v)) => Literal::Bool(!v),
            (UnaryOp::LogicalNot, Literal::Int(v)) => Literal::Bool(v == 0),
            (UnaryOp::LogicalNot, Literal::Float(v)) => Literal::Bool(v == 0.0),
            _ => return None,
        };
        self.nodes.remove(operand);
        let id = self.nodes.alloc(
            NodeClass::Expr(folded.into_expr_kind()),
            result_ty,
            Category::Rvalue,
            span,
            vec![],
        );
        Some(id)
    }

    // -----------------------------------------------------------------
    // 4.1.2b Subscript, member access, and the ternary operator
    // -----------------------------------------------------------------

    pub fn build_subscript(&mut self, base: NodeId, index: NodeId, span: Span) -> NodeId {
        if self.is_broken(base) || self.is_broken(index) {
            return NodeId::BROKEN;
        }
        let base_ty = self.nodes.get(base).ty;
        let index_ty = self.nodes.get(index).ty;
        let element_ty = match self.types.element_type(base_ty) {
            Some(el) if self.types.is_array(base_ty) => el,
            _ => return self.error(CompileError::SubscriptedExprNotArray, span),
        };
        if !self.types.is_integer(index_ty) {
            return self.error(CompileError::ArraySubscriptNotInteger, span);
        }
        ast::subscript(&mut self.nodes, base, index, element_ty, span)
    }

    pub fn build_member(&mut self, base: NodeId, field_name: &str, arrow: bool, span: Span) -> NodeId {
        if self.is_broken(base) {
            return NodeId::BROKEN;
        }
        let base_ty = self.nodes.get(base).ty;
        let struct_ty = if arrow {
            match self.types.element_type(base_ty) {
                Some(el) if self.types.is_pointer(base_ty) && self.types.is_struct(el) => el,
                _ => return self.error(CompileError::MemberReferenceNotStructPointer, span),
            }
        } else {
            if !self.types.is_struct(base_ty) {
                return self.error(CompileError::MemberReferenceNotStruct, span);
            }
            base_ty
        };
        let repr = self.symbols.intern(field_name);
        let shape = self
            .types
            .struct_shape(struct_ty)
            .cloned()
            .expect("struct type always carries a shape");
        let field_ty = match shape.fields.iter().find(|(name, _)| *name == repr) {
            Some((_, ty)) => *ty,
            None => return self.error(CompileError::NoSuchMember, span),
        };
        let category = if arrow {
            Category::Lvalue
        } else {
            self.nodes.get(base).category
        };
        ast::member(&mut self.nodes, base, repr, arrow, field_ty, category, span)
    }

    /// `cond ? then : else` (§4.1.2). The condition must be scalar; the two
    /// arms follow the same usual-arithmetic-conversion rule as a binary
    /// arithmetic operator when both sides are arithmetic, otherwise they
    /// must match exactly.
    pub fn build_ternary(
        &mut self,
        cond: NodeId,
        then_branch: NodeId,
        else_branch: NodeId,
        span: Span,
    ) -> NodeId {
        if self.is_broken(cond) || self.is_broken(then_branch) || self.is_broken(else_branch) {
            return NodeId::BROKEN;
        }
        let cond_ty = self.nodes.get(cond).ty;
        if !self.types.is_scalar(cond_ty) {
            return self.error(CompileError::ConditionMustBeScalar, span);
        }
        let then_ty = self.nodes.get(then_branch).ty;
        let else_ty = self.nodes.get(else_branch).ty;
        let (then_branch, else_branch, result_ty) = if self.types.is_arithmetic(then_ty)
            && self.types.is_arithmetic(else_ty)
        {
            self.usual_arithmetic_conversions(then_branch, else_branch, span)
        } else if self.types.types_equal(then_ty, else_ty) {
            (then_branch, else_branch, then_ty)
        } else {
            return self.error(CompileError::IncompatibleCondOperands, span);
        };
        ast::ternary(&mut self.nodes, cond, then_branch, else_branch, result_ty, span)
    }

    // -----------------------------------------------------------------
    // 4.1.4 Binary operators
    // -----------------------------------------------------------------

    pub fn build_binary(&mut self, op: BinOp, lhs: NodeId, rhs: NodeId, span: Span) -> NodeId {
        if self.is_broken(lhs) || self.is_broken(rhs) {
            return NodeId::BROKEN;
        }
        if op.is_assignment() {
            return self.build_assignment(op, lhs, rhs, span);
        }
        if matches!(op, BinOp::Comma) {
            let rhs_ty = self.nodes.get(rhs).ty;
            return ast::binary(&mut self.nodes, op, lhs, rhs, rhs_ty, span);
        }

        let lhs_ty = self.nodes.get(lhs).ty;
        let rhs_ty = self.nodes.get(rhs).ty;

        if op.is_pure_integer() {
            if !self.types.is_integer(lhs_ty) || !self.types.is_integer(rhs_ty) {
                return self.error(CompileError::TypecheckBinaryExpr, span);
            }
            return self.build_binary_checked(op, lhs, rhs, self.types.int, span);
        }

        if op.is_arithmetic() {
            if !self.types.is_arithmetic(lhs_ty) || !self.types.is_arithmetic(rhs_ty) {
                return self.error(CompileError::TypecheckBinaryExpr, span);
            }
            let (lhs, rhs, result_ty) = self.usual_arithmetic_conversions(lhs, rhs, span);
            return self.build_binary_checked(op, lhs, rhs, result_ty, span);
        }

        if op.is_relational() {
            if !self.types.is_arithmetic(lhs_ty) || !self.types.is_arithmetic(rhs_ty) {
                return self.error(CompileError::TypecheckBinaryExpr, span);
            }
            let (lhs, rhs, _) = self.usual_arithmetic_conversions(lhs, rhs, span);
            return self.build_binary_checked(op, lhs, rhs, self.types.bool_, span);
        }

        if op.is_equality() {
            return self.build_equality(op, lhs, rhs, span);
        }

        if op.is_logical() {
            if !self.types.is_scalar(lhs_ty) || !self.types.is_scalar(rhs_ty) {
                return self.error(CompileError::TypecheckBinaryExpr, span);
            }
            return self.build_binary_checked(op, lhs, rhs, self.types.bool_, span);
        }

        unreachable!("every BinOp variant is classified above")
    }

    fn build_equality(&mut self, op: BinOp, lhs: NodeId, rhs: NodeId, span: Span) -> NodeId {
        let lhs_ty = self.nodes.get(lhs).ty;
        let rhs_ty = self.nodes.get(rhs).ty;

        if let (Some(l_enum), Some(r_enum)) =
            (self.types.enum_identity(lhs_ty), self.types.enum_identity(rhs_ty))
        {
            if l_enum != r_enum {
                return self.error(CompileError::IncompatibleEnumTypes, span);
            }
            return self.build_binary_checked(op, lhs, rhs, self.types.bool_, span);
        }

        if self.types.is_arithmetic(lhs_ty) && self.types.is_arithmetic(rhs_ty) {
            if self.types.is_floating(lhs_ty) || self.types.is_floating(rhs_ty) {
                self.warn(CompileWarning::VariableDeviation, span);
            }
            let (lhs, rhs, _) = self.usual_arithmetic_conversions(lhs, rhs, span);
            return self.build_binary_checked(op, lhs, rhs, self.types.bool_, span);
        }

        let pointer_vs_null = (self.types.is_pointer(lhs_ty) && self.types.is_null_pointer(rhs_ty))
            || (self.types.is_null_pointer(lhs_ty) && self.types.is_pointer(rhs_ty));
        if pointer_vs_null || self.types.types_equal(lhs_ty, rhs_ty) {
            return self.build_binary_checked(op, lhs, rhs, self.types.bool_, span);
        }

        self.error(CompileError::TypecheckBinaryExpr, span)
    }

    /// Build a binary node, constant-folding literal-vs-literal operands
    /// where the spec permits it (§4.1.4).
    fn build_binary_checked(
        &mut self,
        op: BinOp,
        lhs: NodeId,
        rhs: NodeId,
        result_ty: TypeId,
        span: Span,
    ) -> NodeId {
        if let Some(folded) = self.fold_binary_literal(op, lhs, rhs, result_ty, span) {
            return folded;
        }
        ast::binary(&mut self.nodes, op, lhs, rhs, result_ty, span)
    }

    fn fold_binary_literal(
        &mut self,
        op: BinOp,
        lhs: NodeId,
        rhs: NodeId,
        result_ty: TypeId,
        span: Span,
    ) -> Option<NodeId> {
        let lhs_lit = literal_of(&self.nodes, lhs)?;
        let rhs_lit = literal_of(&self.nodes, rhs)?;

        let folded = match (lhs_lit, rhs_lit) {
            (Literal::Int(l), Literal::Int(r)) => fold_int_binary(op, l, r)?,
            (Literal::Float(l), Literal::Float(r)) => fold_float_binary(op, l, r)?,
            _ => return None,
        };

        if let FoldResult::DivisionByZero = folded {
            self.errors.push(SourceErrorWrapper::new(
                CompileError::DivisionByZeroInConstantExpression,
                span,
                &self.source,
            ));
            return Some(NodeId::BROKEN);
        }
        let literal = match folded {
            FoldResult::Value(v) => v,
            FoldResult::DivisionByZero => unreachable!(),
        };

        self.nodes.remove(lhs);
        self.nodes.remove(rhs);
        let id = self.nodes.alloc(
            NodeClass::Expr(literal.into_expr_kind()),
            result_ty,
            Category::Rvalue,
            span,
            vec![],
        );
        Some(id)
    }

    fn build_assignment(&mut self, op: BinOp, lhs: NodeId, rhs: NodeId, span: Span) -> NodeId {
        if self.nodes.get(lhs).category != Category::Lvalue {
            return self.error(CompileError::UnassignableExpression, span);
        }
        let lhs_ty = self.nodes.get(lhs).ty;
        match op {
            BinOp::Assign => {
                let rhs = self.check_assignment_operands(lhs_ty, rhs, span);
                if self.is_broken(rhs) {
                    return NodeId::BROKEN;
                }
                ast::binary(&mut self.nodes, op, lhs, rhs, lhs_ty, span)
            }
            BinOp::AssignOp(inner) => {
                let rhs_ty = self.nodes.get(rhs).ty;
                let ok = match *inner {
                    ref b if b.is_pure_integer() => {
                        self.types.is_integer(lhs_ty) && self.types.is_integer(rhs_ty)
                    }
                    ref b if b.is_arithmetic() => {
                        self.types.is_arithmetic(lhs_ty) && self.types.is_arithmetic(rhs_ty)
                    }
                    _ => false,
                };
                if !ok {
                    return self.error(CompileError::TypecheckBinaryExpr, span);
                }
                ast::binary(&mut self.nodes, BinOp::AssignOp(inner), lhs, rhs, lhs_ty, span)
            }
            _ => unreachable!("build_assignment only handles assignment operators"),
        }
    }

    /// `check_assignment_operands(expected, init)` (§4.1.4): handles
    /// initializers and single expressions uniformly.
    pub fn check_assignment_operands(
        &mut self,
        expected: TypeId,
        init: NodeId,
        span: Span,
    ) -> NodeId {
        if self.is_broken(init) {
            return NodeId::BROKEN;
        }

        if let NodeClass::Expr(ExprKind::Initializer { elements }) = &self.nodes.get(init).class {
            let elements = elements.clone();
            if let Some(shape) = self.types.struct_shape(expected).cloned() {
                if elements.len() != shape.fields.len() {
                    return self.error(CompileError::WrongInit, span);
                }
                let mut checked = Vec::with_capacity(elements.len());
                for (element, (_, field_ty)) in elements.iter().zip(shape.fields.iter()) {
                    checked.push(self.check_assignment_operands(*field_ty, *element, span));
                }
                if checked.iter().any(|c| self.is_broken(*c)) {
                    return NodeId::BROKEN;
                }
                ast::restamp_type(&mut self.nodes, init, expected);
                return init;
            }
            if let Some(element_ty) = self.types.element_type(expected) {
                if self.types.is_array(expected) {
                    let mut checked = Vec::with_capacity(elements.len());
                    for element in &elements {
                        checked.push(self.check_assignment_operands(element_ty, *element, span));
                    }
                    if checked.iter().any(|c| self.is_broken(*c)) {
                        return NodeId::BROKEN;
                    }
                    ast::restamp_type(&mut self.nodes, init, expected);
                    return init;
                }
            }
            return self.error(CompileError::WrongInit, span);
        }

        let init_ty = self.nodes.get(init).ty;

        if self.types.is_integer(expected) && self.types.is_enum_field(init_ty) {
            return init;
        }
        if self.types.is_enum(expected) {
            if let Some(init_enum) = self.types.enum_identity(init_ty) {
                if init_enum == expected {
                    return init;
                }
            }
            return self.error(CompileError::WrongInit, span);
        }
        if self.types.is_floating(expected) && self.types.is_integer(init_ty) {
            return self.build_cast(expected, init, span);
        }
        if self.types.is_integer(expected) && self.types.is_integer(init_ty) {
            return init;
        }
        if self.types.is_pointer(expected) && self.types.is_null_pointer(init_ty) {
            return init;
        }
        if self.types.types_equal(expected, init_ty) {
            return init;
        }
        self.error(CompileError::WrongInit, span)
    }

    // -----------------------------------------------------------------
    // 4.1.5 Call expressions and builtins
    // -----------------------------------------------------------------

    pub fn build_call(&mut self, callee: NodeId, args: Vec<NodeId>, span: Span) -> NodeId {
        if self.is_broken(callee) || args.iter().any(|a| self.is_broken(*a)) {
            return NodeId::BROKEN;
        }

        if let Some(repr) = self.callee_repr(callee) {
            if repr == self.builtins.printf {
                return self.build_printf(args, span);
            }
            if repr == self.builtins.print {
                return self.build_print_like(args, span, false);
            }
            if repr == self.builtins.printid {
                return self.build_print_like(args, span, true);
            }
            if repr == self.builtins.getid {
                return self.build_getid(args, span);
            }
        }

        let callee_ty = self.nodes.get(callee).ty;
        let shape = match self.types.function_shape(callee_ty) {
            Some(s) => s.clone(),
            None => return self.error(CompileError::CalledExprNotFunction, span),
        };
        if shape.parameters.len() != args.len() {
            return self.error(CompileError::WrongInitInActparam, span);
        }
        let mut checked = Vec::with_capacity(args.len());
        for (arg, param_ty) in args.into_iter().zip(shape.parameters.iter()) {
            checked.push(self.check_assignment_operands(*param_ty, arg, span));
        }
        if checked.iter().any(|c| self.is_broken(*c)) {
            return NodeId::BROKEN;
        }
        ast::call(&mut self.nodes, callee, checked, shape.return_type, span)
    }

    /// The [ReprId] of `callee` if it's a direct identifier reference,
    /// otherwise `None` (an arbitrary call expression can't be a builtin).
    fn callee_repr(&self, callee: NodeId) -> Option<ReprId> {
        match &self.nodes.get(callee).class {
            NodeClass::Expr(ExprKind::Identifier(ident)) => {
                Some(self.symbols.ident(*ident).repr)
            }
            _ => None,
        }
    }

    pub(crate) fn build_printf(&mut self, args: Vec<NodeId>, span: Span) -> NodeId {
        if args.is_empty() {
            return self.error(CompileError::PrintfFstNotString, span);
        }
        let fmt_id = match &self.nodes.get(args[0]).class {
            NodeClass::Expr(ExprKind::LiteralString(id)) => *id,
            _ => return self.error(CompileError::PrintfFstNotString, span),
        };
        let fmt = self.strings.get(fmt_id).bytes.clone();
        let specifiers = match parse_format_specifiers(&fmt) {
            Ok(s) => s,
            Err(FormatError::ExpectedSpecifier) => {
                return self.error(CompileError::ExpectedFormatSpecifier, span)
            }
            Err(FormatError::Unknown) => {
                return self.error(CompileError::UnknownFormatSpecifier, span)
            }
        };
        if specifiers.len() > MAX_PRINTF_ARGS {
            return self.error(CompileError::TooManyPrintfArgs, span);
        }
        if specifiers.len() != args.len() - 1 {
            return self.error(CompileError::WrongPrintfArgumentAmount, span);
        }

        let mut checked = vec![args[0]];
        for (spec, arg) in specifiers.iter().zip(args.into_iter().skip(1)) {
            let expected = match spec {
                FormatSpecifier::Int | FormatSpecifier::Char => self.types.int,
                FormatSpecifier::Float => self.types.float,
                FormatSpecifier::Str => self.types.string,
            };
            checked.push(self.check_assignment_operands(expected, arg, span));
        }
        if checked.iter().any(|c| self.is_broken(*c)) {
            return NodeId::BROKEN;
        }
        let placeholder =
            self.build_identifier_unchecked("printf", self.types.function_of(self.types.int, vec![]));
        ast::call(&mut self.nodes, placeholder, checked, self.types.int, span)
    }

    /// Build a bare reference node to a runtime builtin (`printf`, `getid`,
    /// ...) without going through `build_identifier`'s undeclared-identifier
    /// path, since these are never user-declared.
    fn build_identifier_unchecked(&mut self, name: &str, ty: TypeId) -> NodeId {
        let repr = self.symbols.intern(name);
        let ident = self
            .symbols
            .resolve(repr)
            .unwrap_or_else(|| self.symbols.declare(repr, ty, 0, Locality::Global));
        ast::identifier(&mut self.nodes, ident, ty, Span::synthetic())
    }

    fn build_print_like(&mut self, args: Vec<NodeId>, span: Span, with_names: bool) -> NodeId {
        let mut names = Vec::with_capacity(args.len());
        for &arg in &args {
            let ty = self.nodes.get(arg).ty;
            if self.types.is_pointer(ty) {
                return self.error(CompileError::PointerInPrint, span);
            }
            if with_names {
                let name = match &self.nodes.get(arg).class {
                    NodeClass::Expr(ExprKind::Identifier(ident)) => {
                        let repr = self.symbols.ident(*ident).repr;
                        self.symbols.spelling(repr).to_owned()
                    }
                    _ => return self.error(CompileError::ExpectedIdentifierInPrintid, span),
                };
                names.push(Some(name));
            } else {
                names.push(None);
            }
        }
        desugar::desugar_print(self, args, names, span)
    }

    fn build_getid(&mut self, args: Vec<NodeId>, span: Span) -> NodeId {
        for &arg in &args {
            if !matches!(
                self.nodes.get(arg).class,
                NodeClass::Expr(ExprKind::Identifier(_))
            ) {
                return self.error(CompileError::ExpectedIdentifierInGetid, span);
            }
        }
        let placeholder =
            self.build_identifier_unchecked("getid", self.types.function_of(self.types.void, vec![]));
        ast::call(&mut self.nodes, placeholder, args, self.types.void, span)
    }

    // -----------------------------------------------------------------
    // 4.1.7 Statements
    // -----------------------------------------------------------------

    pub fn build_if(
        &mut self,
        cond: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
        span: Span,
    ) -> NodeId {
        if self.require_scalar_condition(cond, span).is_none()
            || self.is_broken(then_branch)
            || else_branch.map_or(false, |e| self.is_broken(e))
        {
            return NodeId::BROKEN;
        }
        ast::if_stmt(&mut self.nodes, self.types.void, cond, then_branch, else_branch, span)
    }

    pub fn build_while(&mut self, cond: NodeId, body: NodeId, span: Span) -> NodeId {
        if self.require_scalar_condition(cond, span).is_none() || self.is_broken(body) {
            return NodeId::BROKEN;
        }
        ast::while_stmt(&mut self.nodes, self.types.void, cond, body, span)
    }

    pub fn build_do_while(&mut self, body: NodeId, cond: NodeId, span: Span) -> NodeId {
        if self.require_scalar_condition(cond, span).is_none() || self.is_broken(body) {
            return NodeId::BROKEN;
        }
        ast::do_while_stmt(&mut self.nodes, self.types.void, body, cond, span)
    }

    pub fn build_for(
        &mut self,
        init: Option<NodeId>,
        cond: Option<NodeId>,
        step: Option<NodeId>,
        body: NodeId,
        span: Span,
    ) -> NodeId {
        if let Some(cond) = cond {
            if self.require_scalar_condition(cond, span).is_none() {
                return NodeId::BROKEN;
            }
        }
        if self.is_broken(body) {
            return NodeId::BROKEN;
        }
        ast::for_stmt(&mut self.nodes, self.types.void, init, cond, step, body, span)
    }

    fn require_scalar_condition(&mut self, cond: NodeId, span: Span) -> Option<()> {
        if self.is_broken(cond) {
            return None;
        }
        let ty = self.nodes.get(cond).ty;
        if !self.types.is_scalar(ty) {
            self.error(CompileError::ConditionMustBeScalar, span);
            return None;
        }
        Some(())
    }

    pub fn build_switch(&mut self, selector: NodeId, body: NodeId, span: Span) -> NodeId {
        if self.is_broken(selector) || self.is_broken(body) {
            return NodeId::BROKEN;
        }
        let ty = self.nodes.get(selector).ty;
        if !self.types.is_integer(ty) {
            return self.error(CompileError::SwitchExprNotInteger, span);
        }
        ast::switch_stmt(&mut self.nodes, self.types.void, selector, body, span)
    }

    pub fn build_case(&mut self, value: NodeId, body: NodeId, span: Span) -> NodeId {
        if self.is_broken(value) || self.is_broken(body) {
            return NodeId::BROKEN;
        }
        let lit = match literal_of(&self.nodes, value) {
            Some(Literal::Int(v)) => v,
            _ => return self.error(CompileError::CaseExprNotInteger, span),
        };
        ast::case_stmt(&mut self.nodes, self.types.void, lit, body, span)
    }

    pub fn build_return(&mut self, value: Option<NodeId>, span: Span) -> NodeId {
        if value.map_or(false, |v| self.is_broken(v)) {
            return NodeId::BROKEN;
        }
        let return_ty = self.current_function_return.unwrap_or(self.types.void);
        match (self.types.is_void(return_ty), value) {
            (true, Some(_)) => self.error(CompileError::VoidFuncValuedReturn, span),
            (false, None) => self.error(CompileError::NonvoidFuncVoidReturn, span),
            (true, None) => ast::return_stmt(&mut self.nodes, self.types.void, None, span),
            (false, Some(v)) => {
                let v = self.check_assignment_operands(return_ty, v, span);
                if self.is_broken(v) {
                    return NodeId::BROKEN;
                }
                ast::return_stmt(&mut self.nodes, self.types.void, Some(v), span)
            }
        }
    }

    pub fn build_compound(&mut self, statements: Vec<NodeId>, span: Span) -> NodeId {
        if statements.iter().any(|s| self.is_broken(*s)) {
            return NodeId::BROKEN;
        }
        ast::compound_stmt(&mut self.nodes, self.types.void, statements, span)
    }

    /// Enter a function body, recording its return type for `build_return`
    /// (§4.1.7). Must be paired with [Self::leave_function].
    pub fn enter_function(&mut self, return_type: TypeId) {
        debug!("entering function with return type {}", return_type);
        self.current_function_return = Some(return_type);
        self.symbols.push_scope();
    }

    pub fn leave_function(&mut self) {
        self.symbols.pop_scope();
        self.current_function_return = None;
    }

    // -----------------------------------------------------------------
    // 4.1.8 Initializer type inference
    // -----------------------------------------------------------------

    pub fn build_initializer(
        &mut self,
        exprs: Vec<NodeId>,
        l_span: Span,
        r_span: Span,
    ) -> NodeId {
        if exprs.is_empty() {
            return self.error(CompileError::EmptyInit, l_span.merge(&r_span));
        }
        if exprs.iter().any(|e| self.is_broken(*e)) {
            return NodeId::BROKEN;
        }
        let span = l_span.merge(&r_span);
        // Not-yet-bound placeholder type; stamped for real in
        // `check_assignment_operands` against the declaration's target.
        ast::initializer_list(&mut self.nodes, exprs, self.types.void, span)
    }
}

#[derive(Copy, Clone)]
enum Literal {
    Int(i32),
    Float(f64),
    Bool(bool),
}

impl Literal {
    fn into_expr_kind(self) -> ExprKind {
        match self {
            Literal::Int(v) => ExprKind::LiteralInt(v),
            Literal::Float(v) => ExprKind::LiteralFloat(v),
            Literal::Bool(v) => ExprKind::LiteralBool(v),
        }
    }
}

fn literal_of(nodes: &NodeStore, id: NodeId) -> Option<Literal> {
    match &nodes.get(id).class {
        NodeClass::Expr(ExprKind::LiteralInt(v)) => Some(Literal::Int(*v)),
        NodeClass::Expr(ExprKind::LiteralFloat(v)) => Some(Literal::Float(*v)),
        NodeClass::Expr(ExprKind::LiteralBool(v)) => Some(Literal::Bool(*v)),
        _ => None,
    }
}

enum FoldResult {
    Value(Literal),
    DivisionByZero,
}

/// Fold an integer-vs-integer binary op: two's-complement wraparound
/// throughout. Returns `None` for operators this function doesn't handle
/// (relational/equality/logical results are folded by the caller via the
/// same literal match, so those are included here too).
fn fold_int_binary(op: BinOp, l: i32, r: i32) -> Option<FoldResult> {
    use FoldResult::Value;
    let result = match op {
        BinOp::Add => Value(Literal::Int(l.wrapping_add(r))),
        BinOp::Sub => Value(Literal::Int(l.wrapping_sub(r))),
        BinOp::Mul => Value(Literal::Int(l.wrapping_mul(r))),
        BinOp::Div => {
            if r == 0 {
                FoldResult::DivisionByZero
            } else {
                Value(Literal::Int(l.wrapping_div(r)))
            }
        }
        BinOp::Mod => {
            if r == 0 {
                FoldResult::DivisionByZero
            } else {
                Value(Literal::Int(l.wrapping_rem(r)))
            }
        }
        BinOp::Shl => Value(Literal::Int(l.wrapping_shl(r as u32))),
        BinOp::Shr => Value(Literal::Int(l.wrapping_shr(r as u32))),
        BinOp::BitAnd => Value(Literal::Int(l & r)),
        BinOp::BitXor => Value(Literal::Int(l ^ r)),
        BinOp::BitOr => Value(Literal::Int(l | r)),
        BinOp::Lt => Value(Literal::Bool(l < r)),
        BinOp::Gt => Value(Literal::Bool(l > r)),
        BinOp::Le => Value(Literal::Bool(l <= r)),
        BinOp::Ge => Value(Literal::Bool(l >= r)),
        BinOp::Eq => Value(Literal::Bool(l == r)),
        BinOp::Ne => Value(Literal::Bool(l != r)),
        BinOp::LogAnd => Value(Literal::Bool(l != 0 && r != 0)),
        BinOp::LogOr => Value(Literal::Bool(l != 0 || r != 0)),
        _ => return None,
    };
    Some(result)
}

/// Fold a float-vs-float binary op: `*`, `/`, `+`, `-`, relational and
/// equality. No bitwise/shift/logical forms exist for floats in this
/// language.
fn fold_float_binary(op: BinOp, l: f64, r: f64) -> Option<FoldResult> {
    use FoldResult::Value;
    let result = match op {
        BinOp::Add => Value(Literal::Float(l + r)),
        BinOp::Sub => Value(Literal::Float(l - r)),
        BinOp::Mul => Value(Literal::Float(l * r)),
        BinOp::Div => {
            if r == 0.0 {
                FoldResult::DivisionByZero
            } else {
                Value(Literal::Float(l / r))
            }
        }
        BinOp::Lt => Value(Literal::Bool(l < r)),
        BinOp::Gt => Value(Literal::Bool(l > r)),
        BinOp::Le => Value(Literal::Bool(l <= r)),
        BinOp::Ge => Value(Literal::Bool(l >= r)),
        BinOp::Eq => Value(Literal::Bool(l == r)),
        BinOp::Ne => Value(Literal::Bool(l != r)),
        _ => return None,
    };
    Some(result)
}

#[derive(Copy, Clone)]
enum FormatSpecifier {
    Int,
    Char,
    Float,
    Str,
}

enum FormatError {
    ExpectedSpecifier,
    Unknown,
}

/// Scan a `printf` format string for `%`-placeholders. Recognizes the fixed
/// ASCII/Cyrillic specifier pairs `i`/`ц`, `c`/`л`, `f`/`в`, `s`/`с`; `%%` is
/// a literal percent and contributes no placeholder.
fn parse_format_specifiers(fmt: &str) -> Result<Vec<FormatSpecifier>, FormatError> {
    let mut specs = Vec::new();
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        match chars.next() {
            None => return Err(FormatError::ExpectedSpecifier),
            Some('%') => continue,
            Some('i') | Some('ц') => specs.push(FormatSpecifier::Int),
            Some('c') | Some('л') => specs.push(FormatSpecifier::Char),
            Some('f') | Some('в') => specs.push(FormatSpecifier::Float),
            Some('s') | Some('с') => specs.push(FormatSpecifier::Str),
            Some(_) => return Err(FormatError::Unknown),
        }
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::synthetic()
    }

    #[test]
    fn test_undeclared_identifier_is_broken() {
        let mut builder = Builder::new(String::new());
        let id = builder.build_identifier("missing", span());
        assert!(id.is_broken());
        assert_eq!(builder.errors.len(), 1);
    }

    #[test]
    fn test_int_plus_int_folds_to_literal() {
        let mut builder = Builder::new(String::new());
        let a = builder.build_literal_int(2, span());
        let b = builder.build_literal_int(3, span());
        let sum = builder.build_binary(BinOp::Add, a, b, span());
        assert!(!sum.is_broken());
        match &builder.nodes.get(sum).class {
            NodeClass::Expr(ExprKind::LiteralInt(v)) => assert_eq!(*v, 5),
            other => panic!("expected folded literal, got {:?}", other),
        }
    }

    #[test]
    fn test_division_by_zero_reports_diagnostic() {
        let mut builder = Builder::new(String::new());
        let a = builder.build_literal_int(1, span());
        let b = builder.build_literal_int(0, span());
        let result = builder.build_binary(BinOp::Div, a, b, span());
        assert!(result.is_broken());
        assert!(builder
            .errors
            .iter()
            .any(|e| matches!(
                e.error(),
                CompileError::DivisionByZeroInConstantExpression
            )));
    }

    #[test]
    fn test_int_literal_assigned_to_float_inserts_cast() {
        let mut builder = Builder::new(String::new());
        let one = builder.build_literal_int(1, span());
        let float_ty = builder.types.float;
        let result = builder.check_assignment_operands(float_ty, one, span());
        assert!(!result.is_broken());
        assert_eq!(builder.nodes.get(result).ty, float_ty);
        match &builder.nodes.get(result).class {
            NodeClass::Expr(ExprKind::LiteralFloat(v)) => assert_eq!(*v, 1.0),
            other => panic!("expected rewritten float literal, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_initializer_rejected() {
        let mut builder = Builder::new(String::new());
        let result = builder.build_initializer(vec![], span(), span());
        assert!(result.is_broken());
        assert!(builder
            .errors
            .iter()
            .any(|e| matches!(e.error(), CompileError::EmptyInit)));
    }

    #[test]
    fn test_printf_argument_count_mismatch() {
        let mut builder = Builder::new(String::new());
        let fmt = builder.build_literal_string("%i %i", span());
        let one = builder.build_literal_int(1, span());
        let printf_ident = builder.build_identifier_unchecked(
            "printf",
            builder.types.void,
        );
        let result = builder.build_call(printf_ident, vec![fmt, one], span());
        assert!(result.is_broken());
        assert!(builder
            .errors
            .iter()
            .any(|e| matches!(e.error(), CompileError::WrongPrintfArgumentAmount)));
    }

    #[test]
    fn test_subscript_of_non_array_rejected() {
        let mut builder = Builder::new(String::new());
        let x = builder.build_literal_int(1, span());
        let index = builder.build_literal_int(0, span());
        let result = builder.build_subscript(x, index, span());
        assert!(result.is_broken());
        assert!(builder
            .errors
            .iter()
            .any(|e| matches!(e.error(), CompileError::SubscriptedExprNotArray)));
    }

    #[test]
    fn test_member_access_resolves_field_type() {
        let mut builder = Builder::new(String::new());
        let field_repr = builder.symbols.intern("x");
        let struct_ty = builder.types.struct_of(vec![(field_repr, builder.types.int)]);
        let repr = builder.symbols.intern("p");
        let ident = builder
            .symbols
            .declare(repr, struct_ty, 0, Locality::Local);
        let base = ast::identifier(&mut builder.nodes, ident, struct_ty, span());
        let result = builder.build_member(base, "x", false, span());
        assert!(!result.is_broken());
        assert_eq!(builder.nodes.get(result).ty, builder.types.int);
    }

    #[test]
    fn test_ternary_with_mismatched_arms_rejected() {
        let mut builder = Builder::new(String::new());
        let cond = builder.build_literal_bool(true, span());
        let then_branch = builder.build_literal_int(1, span());
        let field_repr = builder.symbols.intern("x");
        let struct_ty = builder.types.struct_of(vec![(field_repr, builder.types.int)]);
        let repr = builder.symbols.intern("s");
        let ident = builder
            .symbols
            .declare(repr, struct_ty, 0, Locality::Local);
        let else_branch = ast::identifier(&mut builder.nodes, ident, struct_ty, span());
        let result = builder.build_ternary(cond, then_branch, else_branch, span());
        assert!(result.is_broken());
        assert!(builder
            .errors
            .iter()
            .any(|e| matches!(e.error(), CompileError::IncompatibleCondOperands)));
    }

    #[test]
    fn test_comparing_different_enum_types_rejected() {
        let mut builder = Builder::new(String::new());
        let e1 = builder.types.new_enum();
        let e2 = builder.types.new_enum();
        let repr_a = builder.symbols.intern("a");
        let repr_b = builder.symbols.intern("b");
        let ident_a = builder.symbols.declare(repr_a, e1, 0, Locality::Global);
        let ident_b = builder.symbols.declare(repr_b, e2, 0, Locality::Global);
        let a = ast::identifier(&mut builder.nodes, ident_a, e1, span());
        let b = ast::identifier(&mut builder.nodes, ident_b, e2, span());
        let result = builder.build_binary(BinOp::Eq, a, b, span());
        assert!(result.is_broken());
        assert!(builder
            .errors
            .iter()
            .any(|e| matches!(e.error(), CompileError::IncompatibleEnumTypes)));
    }
}
