//! The parser: recursive-descent over the token stream,
//! calling straight into [crate::builder::Builder] as each construct
//! completes so type-checking and constant folding happen incrementally
//! rather than as a second pass over a finished tree.
//!
//! Declarations are the one place this module reaches past `Builder`'s
//! public API: there's no `build_var_decl`/`build_array_decl`/
//! `build_function_decl`, because declaring a name is a symbol-table
//! operation, not an expression-typechecking one. This parser declares
//! identifiers directly via `builder.symbols` and assembles the final node
//! with the raw constructors in `ast.rs`, using
//! `Builder::check_assignment_operands` only to validate an initializer
//! against the declared type.
//!
//! One function per grammar rule, threaded through a single mutable
//! cursor: a full expression-precedence climb plus a C-shaped
//! statement/declaration grammar.

use crate::ast;
use crate::builder::Builder;
use crate::error::{CompileError, SourceErrorWrapper};
use crate::lexer::{Spanned, Token};
use crate::node::{BinOp, NodeId, UnaryOp};
use crate::symbols::Locality;
use crate::types::TypeId;
use crate::util::Span;
use std::collections::HashMap;

pub struct Parser<'b> {
    tokens: Vec<Spanned>,
    pos: usize,
    builder: &'b mut Builder,
    source: String,
    /// `struct`/`enum` tag name -> its [TypeId]. Kept separate from
    /// `builder.symbols`, which only tracks value identifiers.
    type_names: HashMap<String, TypeId>,
    in_function: bool,
}

/// Parse a complete, already-preprocessed-and-tokenized translation unit,
/// returning the top-level declarations in source order. Errors accumulate
/// on `builder.errors` rather than aborting; a broken declaration is skipped
/// after a best-effort resynchronization to the next plausible boundary.
pub fn parse_translation_unit(
    builder: &mut Builder,
    tokens: Vec<Spanned>,
    source: &str,
) -> Vec<NodeId> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        builder,
        source: source.to_owned(),
        type_names: HashMap::new(),
        in_function: false,
    };
    let mut decls = Vec::new();
    while !parser.check(&Token::Eof) {
        let before = parser.pos;
        decls.extend(parser.parse_external_declaration());
        if parser.pos == before {
            // Parser made no progress; avoid looping forever on unparseable
            // input by forcing advancement.
            parser.advance();
        }
    }
    decls
}

impl<'b> Parser<'b> {
    // -----------------------------------------------------------------
    // Token cursor primitives
    // -----------------------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos].1
    }

    fn check(&self, tok: &Token) -> bool {
        self.peek() == tok
    }

    fn advance(&mut self) -> Spanned {
        let current = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        current
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.check(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume `tok`, or report a syntax error naming `expected` and leave
    /// the cursor in place so the caller's resync logic can make progress.
    fn expect(&mut self, tok: &Token, expected: &'static str) -> bool {
        if self.eat(tok) {
            true
        } else {
            self.syntax_error(expected);
            false
        }
    }

    fn syntax_error(&mut self, expected: &'static str) -> NodeId {
        let span = self.peek_span();
        self.builder.errors.push(SourceErrorWrapper::new(
            CompileError::Syntax { expected },
            span,
            &self.source,
        ));
        NodeId::BROKEN
    }

    /// Skip tokens until a statement/declaration boundary, so one malformed
    /// construct doesn't cascade into spurious errors for everything after
    /// it.
    fn synchronize(&mut self) {
        loop {
            match self.peek() {
                Token::Semi => {
                    self.advance();
                    return;
                }
                Token::RBrace | Token::Eof => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn starts_type(&self) -> bool {
        matches!(
            self.peek(),
            Token::Int
                | Token::Float
                | Token::Char
                | Token::Bool
                | Token::Void
                | Token::Struct
                | Token::Enum
                | Token::File
        )
    }

    fn ident_name(&mut self, expected: &'static str) -> Option<String> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Some(name)
            }
            _ => {
                self.syntax_error(expected);
                None
            }
        }
    }

    fn current_locality(&self) -> Locality {
        if self.in_function {
            Locality::Local
        } else {
            Locality::Global
        }
    }

    // -----------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------

    fn parse_type_specifier(&mut self) -> TypeId {
        match self.peek().clone() {
            Token::Int => {
                self.advance();
                self.builder.types.int
            }
            Token::Float => {
                self.advance();
                self.builder.types.float
            }
            Token::Char => {
                self.advance();
                self.builder.types.char_
            }
            Token::Bool => {
                self.advance();
                self.builder.types.bool_
            }
            Token::Void => {
                self.advance();
                self.builder.types.void
            }
            Token::File => {
                self.advance();
                self.builder.types.file
            }
            Token::Struct => self.parse_struct_specifier(),
            Token::Enum => self.parse_enum_specifier(),
            _ => {
                self.syntax_error("a type specifier");
                self.builder.types.void
            }
        }
    }

    fn parse_struct_specifier(&mut self) -> TypeId {
        self.advance(); // `struct`
        let tag = self.ident_name("a struct tag").unwrap_or_default();
        if self.check(&Token::LBrace) {
            self.advance();
            let mut fields = Vec::new();
            while !self.check(&Token::RBrace) && !self.check(&Token::Eof) {
                let field_ty = self.parse_type_specifier();
                loop {
                    let name = self.ident_name("a field name");
                    let dims = self.parse_array_dims();
                    if let Some(name) = name {
                        let repr = self.builder.symbols.intern(&name);
                        let full_ty = dims.iter().fold(field_ty, |ty, _| self.builder.types.array_of(ty));
                        fields.push((repr, full_ty));
                    }
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::Semi, "`;` after struct field");
            }
            self.expect(&Token::RBrace, "`}` to close struct body");
            let ty = self.builder.types.struct_of(fields);
            if !tag.is_empty() {
                self.type_names.insert(tag, ty);
            }
            ty
        } else if let Some(&ty) = self.type_names.get(&tag) {
            ty
        } else {
            self.syntax_error("a previously declared struct tag");
            self.builder.types.void
        }
    }

    fn parse_enum_specifier(&mut self) -> TypeId {
        self.advance(); // `enum`
        let tag = self.ident_name("an enum tag").unwrap_or_default();
        if self.check(&Token::LBrace) {
            self.advance();
            let enum_ty = self.builder.types.new_enum();
            let field_ty = self.builder.types.enum_field_of(enum_ty);
            let mut next_value: i64 = 0;
            loop {
                if self.check(&Token::RBrace) {
                    break;
                }
                let name = match self.ident_name("an enum constant name") {
                    Some(n) => n,
                    None => break,
                };
                if self.eat(&Token::Assign) {
                    let value_expr = self.parse_assignment();
                    if let crate::node::NodeClass::Expr(crate::node::ExprKind::LiteralInt(v)) =
                        &self.builder.nodes.get(value_expr).class
                    {
                        next_value = *v as i64;
                    }
                }
                let repr = self.builder.symbols.intern(&name);
                self.builder
                    .symbols
                    .declare(repr, field_ty, next_value, Locality::Global);
                next_value += 1;
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RBrace, "`}` to close enum body");
            if !tag.is_empty() {
                self.type_names.insert(tag, enum_ty);
            }
            enum_ty
        } else if let Some(&ty) = self.type_names.get(&tag) {
            ty
        } else {
            self.syntax_error("a previously declared enum tag");
            self.builder.types.void
        }
    }

    /// Parse zero or more `[expr]` suffixes, returning each dimension's
    /// bound expression. Declaration lowering expects a concrete expression
    /// for every dimension, constant or not, so an empty
    /// `[]` is rejected here rather than silently defaulting.
    fn parse_array_dims(&mut self) -> Vec<NodeId> {
        let mut dims = Vec::new();
        while self.eat(&Token::LBracket) {
            let expr = self.parse_assignment();
            dims.push(expr);
            self.expect(&Token::RBracket, "`]` to close array dimension");
        }
        dims
    }

    fn array_type_from_dims(&mut self, base: TypeId, dims: &[NodeId]) -> TypeId {
        let mut ty = base;
        for _ in dims {
            ty = self.builder.types.array_of(ty);
        }
        ty
    }

    // -----------------------------------------------------------------
    // Top-level declarations
    // -----------------------------------------------------------------

    fn parse_external_declaration(&mut self) -> Vec<NodeId> {
        let span = self.peek_span();
        let base_ty = self.parse_type_specifier();

        if self.eat(&Token::Semi) {
            // Tag-only declaration, e.g. `struct Point;`.
            return vec![ast::type_tag_decl(&mut self.builder.nodes, self.builder.types.void, base_ty, span)];
        }

        let ptr_ty = self.parse_pointer_levels(base_ty);
        let name = match self.ident_name("a declarator name") {
            Some(n) => n,
            None => {
                self.synchronize();
                return vec![];
            }
        };

        if self.check(&Token::LParen) {
            return vec![self.parse_function_declarator(ptr_ty, name, span)];
        }

        let mut decls = Vec::new();
        let mut current_name = name;
        let mut current_ty = ptr_ty;
        loop {
            decls.push(self.parse_trailing_declarator(current_ty, &current_name, span));
            if !self.eat(&Token::Comma) {
                break;
            }
            let next_base = self.parse_pointer_levels(base_ty);
            current_name = match self.ident_name("a declarator name") {
                Some(n) => n,
                None => break,
            };
            current_ty = next_base;
        }
        self.expect(&Token::Semi, "`;` after declaration");
        decls
    }

    fn parse_pointer_levels(&mut self, mut ty: TypeId) -> TypeId {
        while self.eat(&Token::Star) {
            ty = self.builder.types.pointer_to(ty);
        }
        ty
    }

    /// Parse whatever follows a declarator's name once it's known not to be
    /// a function: either a bare variable or an array, with an optional
    /// initializer.
    fn parse_trailing_declarator(&mut self, ty: TypeId, name: &str, span: Span) -> NodeId {
        let dims = self.parse_array_dims();
        let repr = self.builder.symbols.intern(name);

        if dims.is_empty() {
            let ident = self.builder.symbols.declare(repr, ty, 0, self.current_locality());
            let init = self.parse_optional_initializer(ty, span);
            ast::var_decl(&mut self.builder.nodes, self.builder.types.void, ident, init, span)
        } else {
            let array_ty = self.array_type_from_dims(ty, &dims);
            let ident = self
                .builder
                .symbols
                .declare(repr, array_ty, 0, self.current_locality());
            let init = self.parse_optional_initializer(array_ty, span);
            let dim_opts = dims.into_iter().map(Some).collect();
            ast::array_decl(&mut self.builder.nodes, self.builder.types.void, ident, dim_opts, init, span)
        }
    }

    fn parse_optional_initializer(&mut self, target_ty: TypeId, span: Span) -> Option<NodeId> {
        if !self.eat(&Token::Assign) {
            return None;
        }
        let raw = self.parse_initializer_value();
        Some(self.builder.check_assignment_operands(target_ty, raw, span))
    }

    /// An initializer is either a brace-enclosed list or a single
    /// assignment-expression.
    fn parse_initializer_value(&mut self) -> NodeId {
        if self.check(&Token::LBrace) {
            let l_span = self.peek_span();
            self.advance();
            let mut elements = Vec::new();
            while !self.check(&Token::RBrace) && !self.check(&Token::Eof) {
                elements.push(self.parse_initializer_value());
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            let r_span = self.peek_span();
            self.expect(&Token::RBrace, "`}` to close initializer list");
            self.builder.build_initializer(elements, l_span, r_span)
        } else {
            self.parse_assignment()
        }
    }

    fn parse_function_declarator(&mut self, return_ty: TypeId, name: String, span: Span) -> NodeId {
        self.advance(); // `(`
        let params = self.parse_param_list();
        self.expect(&Token::RParen, "`)` to close parameter list");

        let param_types: Vec<TypeId> = params.iter().map(|(_, ty)| *ty).collect();
        let fn_ty = self.builder.types.function_of(return_ty, param_types);
        let repr = self.builder.symbols.intern(&name);
        let fn_ident = self.builder.symbols.declare(repr, fn_ty, 0, Locality::Global);

        if self.check(&Token::LBrace) {
            self.builder.enter_function(return_ty);
            self.in_function = true;
            let mut param_idents = Vec::with_capacity(params.len());
            for (param_name, param_ty) in &params {
                if let Some(param_name) = param_name {
                    let prepr = self.builder.symbols.intern(param_name);
                    param_idents.push(self.builder.symbols.declare(prepr, *param_ty, 0, Locality::Local));
                }
            }
            let body = self.parse_compound();
            self.in_function = false;
            self.builder.leave_function();
            ast::function_decl(
                &mut self.builder.nodes,
                self.builder.types.void,
                fn_ident,
                param_idents,
                Some(body),
                span,
            )
        } else {
            self.expect(&Token::Semi, "`;` after function prototype");
            self.builder.symbols.push_scope();
            let mut param_idents = Vec::with_capacity(params.len());
            for (param_name, param_ty) in &params {
                let label = param_name.clone().unwrap_or_else(|| "_".to_owned());
                let prepr = self.builder.symbols.intern(&label);
                param_idents.push(self.builder.symbols.declare(prepr, *param_ty, 0, Locality::Local));
            }
            self.builder.symbols.pop_scope();
            ast::function_decl(&mut self.builder.nodes, self.builder.types.void, fn_ident, param_idents, None, span)
        }
    }

    /// Parse `(void)`, `()`, or a comma-separated parameter list, with an
    /// optional trailing `...` vararg marker.
    fn parse_param_list(&mut self) -> Vec<(Option<String>, TypeId)> {
        let mut params = Vec::new();
        if self.check(&Token::RParen) {
            return params;
        }
        if self.check(&Token::Void) {
            let saved = self.pos;
            self.advance();
            if self.check(&Token::RParen) {
                return params;
            }
            self.pos = saved;
        }
        loop {
            if self.eat(&Token::Ellipsis) {
                params.push((None, self.builder.types.vararg));
                break;
            }
            let base = self.parse_type_specifier();
            let ty = self.parse_pointer_levels(base);
            let name = match self.peek().clone() {
                Token::Ident(n) => {
                    self.advance();
                    Some(n)
                }
                _ => None,
            };
            let dims = self.parse_array_dims();
            let full_ty = self.array_type_from_dims(ty, &dims);
            params.push((name, full_ty));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        params
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    fn parse_compound(&mut self) -> NodeId {
        let span = self.peek_span();
        self.expect(&Token::LBrace, "`{` to start a block");
        self.builder.symbols.push_scope();
        let mut statements = Vec::new();
        while !self.check(&Token::RBrace) && !self.check(&Token::Eof) {
            statements.extend(self.parse_block_item());
        }
        self.expect(&Token::RBrace, "`}` to close a block");
        self.builder.symbols.pop_scope();
        self.builder.build_compound(statements, span)
    }

    fn parse_block_item(&mut self) -> Vec<NodeId> {
        if self.starts_type() {
            self.parse_local_declarations()
        } else {
            vec![self.parse_statement()]
        }
    }

    fn parse_local_declarations(&mut self) -> Vec<NodeId> {
        let span = self.peek_span();
        let base_ty = self.parse_type_specifier();
        let mut decls = Vec::new();
        loop {
            let ty = self.parse_pointer_levels(base_ty);
            let name = match self.ident_name("a declarator name") {
                Some(n) => n,
                None => break,
            };
            let decl = self.parse_trailing_declarator(ty, &name, span);
            decls.push(ast::declaration_stmt(&mut self.builder.nodes, self.builder.types.void, decl, span));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::Semi, "`;` after declaration");
        decls
    }

    fn parse_statement(&mut self) -> NodeId {
        let span = self.peek_span();
        match self.peek().clone() {
            Token::LBrace => self.parse_compound(),
            Token::If => self.parse_if(),
            Token::While => self.parse_while(),
            Token::Do => self.parse_do_while(),
            Token::For => self.parse_for(),
            Token::Switch => self.parse_switch(),
            Token::Case => self.parse_case(),
            Token::Default => {
                self.advance();
                self.expect(&Token::Colon, "`:` after `default`");
                let body = self.parse_statement();
                ast::default_stmt(&mut self.builder.nodes, self.builder.types.void, body, span)
            }
            Token::Break => {
                self.advance();
                self.expect(&Token::Semi, "`;` after `break`");
                ast::break_stmt(&mut self.builder.nodes, self.builder.types.void, span)
            }
            Token::Continue => {
                self.advance();
                self.expect(&Token::Semi, "`;` after `continue`");
                ast::continue_stmt(&mut self.builder.nodes, self.builder.types.void, span)
            }
            Token::Return => {
                self.advance();
                let value = if self.check(&Token::Semi) {
                    None
                } else {
                    Some(self.parse_expression())
                };
                self.expect(&Token::Semi, "`;` after `return`");
                self.builder.build_return(value, span)
            }
            Token::Goto => {
                self.advance();
                let label = self.ident_name("a label name").unwrap_or_default();
                self.expect(&Token::Semi, "`;` after `goto` label");
                let repr = self.builder.symbols.intern(&label);
                ast::goto_stmt(&mut self.builder.nodes, self.builder.types.void, repr, span)
            }
            Token::Semi => {
                self.advance();
                ast::empty_stmt(&mut self.builder.nodes, self.builder.types.void, span)
            }
            Token::Ident(name) if self.peek_is_label(&name) => {
                self.advance();
                self.advance(); // `:`
                let repr = self.builder.symbols.intern(&name);
                let stmt = self.parse_statement();
                ast::labeled_stmt(&mut self.builder.nodes, self.builder.types.void, repr, stmt, span)
            }
            _ => {
                let expr = self.parse_expression();
                self.expect(&Token::Semi, "`;` after expression statement");
                ast::expr_stmt(&mut self.builder.nodes, self.builder.types.void, expr, span)
            }
        }
    }

    fn peek_is_label(&self, _name: &str) -> bool {
        matches!(self.tokens.get(self.pos + 1).map(|(t, _)| t), Some(Token::Colon))
    }

    fn parse_if(&mut self) -> NodeId {
        let span = self.peek_span();
        self.advance();
        self.expect(&Token::LParen, "`(` after `if`");
        let cond = self.parse_expression();
        self.expect(&Token::RParen, "`)` after `if` condition");
        let then_branch = self.parse_statement();
        let else_branch = if self.eat(&Token::Else) {
            Some(self.parse_statement())
        } else {
            None
        };
        self.builder.build_if(cond, then_branch, else_branch, span)
    }

    fn parse_while(&mut self) -> NodeId {
        let span = self.peek_span();
        self.advance();
        self.expect(&Token::LParen, "`(` after `while`");
        let cond = self.parse_expression();
        self.expect(&Token::RParen, "`)` after `while` condition");
        let body = self.parse_statement();
        self.builder.build_while(cond, body, span)
    }

    fn parse_do_while(&mut self) -> NodeId {
        let span = self.peek_span();
        self.advance();
        let body = self.parse_statement();
        self.expect(&Token::While, "`while` after `do` body");
        self.expect(&Token::LParen, "`(` after `while`");
        let cond = self.parse_expression();
        self.expect(&Token::RParen, "`)` after `do`-`while` condition");
        self.expect(&Token::Semi, "`;` after `do`-`while` statement");
        self.builder.build_do_while(body, cond, span)
    }

    fn parse_for(&mut self) -> NodeId {
        let span = self.peek_span();
        self.advance();
        self.expect(&Token::LParen, "`(` after `for`");
        self.builder.symbols.push_scope();

        let init = if self.check(&Token::Semi) {
            self.advance();
            None
        } else if self.starts_type() {
            let decls = self.parse_local_declarations();
            decls.into_iter().next()
        } else {
            let expr = self.parse_expression();
            self.expect(&Token::Semi, "`;` after `for` initializer");
            Some(expr)
        };

        let cond = if self.check(&Token::Semi) {
            None
        } else {
            Some(self.parse_expression())
        };
        self.expect(&Token::Semi, "`;` after `for` condition");

        let step = if self.check(&Token::RParen) {
            None
        } else {
            Some(self.parse_expression())
        };
        self.expect(&Token::RParen, "`)` after `for` clauses");

        let body = self.parse_statement();
        self.builder.symbols.pop_scope();
        self.builder.build_for(init, cond, step, body, span)
    }

    fn parse_switch(&mut self) -> NodeId {
        let span = self.peek_span();
        self.advance();
        self.expect(&Token::LParen, "`(` after `switch`");
        let selector = self.parse_expression();
        self.expect(&Token::RParen, "`)` after `switch` selector");
        let body = self.parse_statement();
        self.builder.build_switch(selector, body, span)
    }

    fn parse_case(&mut self) -> NodeId {
        let span = self.peek_span();
        self.advance();
        let value = self.parse_expression();
        self.expect(&Token::Colon, "`:` after `case` label");
        let body = self.parse_statement();
        self.builder.build_case(value, body, span)
    }

    // -----------------------------------------------------------------
    // Expressions (lowest to highest precedence)
    // -----------------------------------------------------------------

    fn parse_expression(&mut self) -> NodeId {
        let mut lhs = self.parse_assignment();
        while self.check(&Token::Comma) {
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_assignment();
            lhs = self.builder.build_binary(BinOp::Comma, lhs, rhs, span);
        }
        lhs
    }

    fn parse_assignment(&mut self) -> NodeId {
        let lhs = self.parse_ternary();
        let span = self.peek_span();
        let op = match self.peek() {
            Token::Assign => Some(BinOp::Assign),
            Token::PlusEq => Some(BinOp::AssignOp(Box::new(BinOp::Add))),
            Token::MinusEq => Some(BinOp::AssignOp(Box::new(BinOp::Sub))),
            Token::StarEq => Some(BinOp::AssignOp(Box::new(BinOp::Mul))),
            Token::SlashEq => Some(BinOp::AssignOp(Box::new(BinOp::Div))),
            Token::PercentEq => Some(BinOp::AssignOp(Box::new(BinOp::Mod))),
            Token::AmpEq => Some(BinOp::AssignOp(Box::new(BinOp::BitAnd))),
            Token::PipeEq => Some(BinOp::AssignOp(Box::new(BinOp::BitOr))),
            Token::CaretEq => Some(BinOp::AssignOp(Box::new(BinOp::BitXor))),
            Token::ShlEq => Some(BinOp::AssignOp(Box::new(BinOp::Shl))),
            Token::ShrEq => Some(BinOp::AssignOp(Box::new(BinOp::Shr))),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let rhs = self.parse_assignment();
                self.builder.build_binary(op, lhs, rhs, span)
            }
            None => lhs,
        }
    }

    fn parse_ternary(&mut self) -> NodeId {
        let cond = self.parse_logical_or();
        if self.check(&Token::Question) {
            let span = self.peek_span();
            self.advance();
            let then_branch = self.parse_expression();
            self.expect(&Token::Colon, "`:` in ternary expression");
            let else_branch = self.parse_assignment();
            self.builder.build_ternary(cond, then_branch, else_branch, span)
        } else {
            cond
        }
    }

    fn parse_logical_or(&mut self) -> NodeId {
        let mut lhs = self.parse_logical_and();
        while self.check(&Token::PipePipe) {
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_logical_and();
            lhs = self.builder.build_binary(BinOp::LogOr, lhs, rhs, span);
        }
        lhs
    }

    fn parse_logical_and(&mut self) -> NodeId {
        let mut lhs = self.parse_bit_or();
        while self.check(&Token::AmpAmp) {
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_bit_or();
            lhs = self.builder.build_binary(BinOp::LogAnd, lhs, rhs, span);
        }
        lhs
    }

    fn parse_bit_or(&mut self) -> NodeId {
        let mut lhs = self.parse_bit_xor();
        while self.check(&Token::Pipe) {
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_bit_xor();
            lhs = self.builder.build_binary(BinOp::BitOr, lhs, rhs, span);
        }
        lhs
    }

    fn parse_bit_xor(&mut self) -> NodeId {
        let mut lhs = self.parse_bit_and();
        while self.check(&Token::Caret) {
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_bit_and();
            lhs = self.builder.build_binary(BinOp::BitXor, lhs, rhs, span);
        }
        lhs
    }

    fn parse_bit_and(&mut self) -> NodeId {
        let mut lhs = self.parse_equality();
        while self.check(&Token::Amp) {
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_equality();
            lhs = self.builder.build_binary(BinOp::BitAnd, lhs, rhs, span);
        }
        lhs
    }

    fn parse_equality(&mut self) -> NodeId {
        let mut lhs = self.parse_relational();
        loop {
            let op = match self.peek() {
                Token::Eq => BinOp::Eq,
                Token::Ne => BinOp::Ne,
                _ => break,
            };
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_relational();
            lhs = self.builder.build_binary(op, lhs, rhs, span);
        }
        lhs
    }

    fn parse_relational(&mut self) -> NodeId {
        let mut lhs = self.parse_shift();
        loop {
            let op = match self.peek() {
                Token::Lt => BinOp::Lt,
                Token::Gt => BinOp::Gt,
                Token::Le => BinOp::Le,
                Token::Ge => BinOp::Ge,
                _ => break,
            };
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_shift();
            lhs = self.builder.build_binary(op, lhs, rhs, span);
        }
        lhs
    }

    fn parse_shift(&mut self) -> NodeId {
        let mut lhs = self.parse_additive();
        loop {
            let op = match self.peek() {
                Token::Shl => BinOp::Shl,
                Token::Shr => BinOp::Shr,
                _ => break,
            };
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_additive();
            lhs = self.builder.build_binary(op, lhs, rhs, span);
        }
        lhs
    }

    fn parse_additive(&mut self) -> NodeId {
        let mut lhs = self.parse_multiplicative();
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_multiplicative();
            lhs = self.builder.build_binary(op, lhs, rhs, span);
        }
        lhs
    }

    fn parse_multiplicative(&mut self) -> NodeId {
        let mut lhs = self.parse_unary();
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_unary();
            lhs = self.builder.build_binary(op, lhs, rhs, span);
        }
        lhs
    }

    fn parse_unary(&mut self) -> NodeId {
        let span = self.peek_span();
        match self.peek().clone() {
            Token::PlusPlus => {
                self.advance();
                let operand = self.parse_unary();
                self.builder.build_unary(UnaryOp::PreInc, operand, span)
            }
            Token::MinusMinus => {
                self.advance();
                let operand = self.parse_unary();
                self.builder.build_unary(UnaryOp::PreDec, operand, span)
            }
            Token::Amp => {
                self.advance();
                let operand = self.parse_unary();
                self.builder.build_unary(UnaryOp::AddrOf, operand, span)
            }
            Token::Star => {
                self.advance();
                let operand = self.parse_unary();
                self.builder.build_unary(UnaryOp::Indirection, operand, span)
            }
            Token::Minus => {
                self.advance();
                let operand = self.parse_unary();
                self.builder.build_unary(UnaryOp::ArithMinus, operand, span)
            }
            Token::Tilde => {
                self.advance();
                let operand = self.parse_unary();
                self.builder.build_unary(UnaryOp::BitNot, operand, span)
            }
            Token::Bang => {
                self.advance();
                let operand = self.parse_unary();
                self.builder.build_unary(UnaryOp::LogicalNot, operand, span)
            }
            Token::LParen if self.is_cast_ahead() => {
                self.advance();
                let target = self.parse_type_specifier();
                let target = self.parse_pointer_levels(target);
                self.expect(&Token::RParen, "`)` to close cast");
                let operand = self.parse_unary();
                self.builder.build_cast(target, operand, span)
            }
            Token::Abs => {
                self.advance();
                self.expect(&Token::LParen, "`(` after `abs`");
                let operand = self.parse_assignment();
                self.expect(&Token::RParen, "`)` to close `abs`");
                self.builder.build_unary(UnaryOp::Abs, operand, span)
            }
            Token::Upb => {
                self.advance();
                self.expect(&Token::LParen, "`(` after `upb`");
                let operand = self.parse_assignment();
                let dim = if self.eat(&Token::Comma) {
                    match self.peek().clone() {
                        Token::IntLit(n) => {
                            self.advance();
                            n as u32
                        }
                        _ => {
                            self.syntax_error("an integer dimension literal");
                            1
                        }
                    }
                } else {
                    1
                };
                self.expect(&Token::RParen, "`)` to close `upb`");
                self.builder.build_unary(UnaryOp::Upb(dim), operand, span)
            }
            _ => self.parse_postfix(),
        }
    }

    /// `(` starts a cast only when immediately followed by a type keyword;
    /// otherwise it's a parenthesized expression.
    fn is_cast_ahead(&self) -> bool {
        matches!(
            self.tokens.get(self.pos + 1).map(|(t, _)| t),
            Some(Token::Int)
                | Some(Token::Float)
                | Some(Token::Char)
                | Some(Token::Bool)
                | Some(Token::Void)
                | Some(Token::Struct)
                | Some(Token::Enum)
                | Some(Token::File)
        )
    }

    fn parse_postfix(&mut self) -> NodeId {
        let mut expr = self.parse_primary();
        loop {
            let span = self.peek_span();
            match self.peek().clone() {
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expression();
                    self.expect(&Token::RBracket, "`]` to close subscript");
                    expr = self.builder.build_subscript(expr, index, span);
                }
                Token::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&Token::RParen) {
                        loop {
                            args.push(self.parse_assignment());
                            if !self.eat(&Token::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&Token::RParen, "`)` to close call arguments");
                    expr = self.builder.build_call(expr, args, span);
                }
                Token::Dot => {
                    self.advance();
                    let field = self.ident_name("a field name").unwrap_or_default();
                    expr = self.builder.build_member(expr, &field, false, span);
                }
                Token::Arrow => {
                    self.advance();
                    let field = self.ident_name("a field name").unwrap_or_default();
                    expr = self.builder.build_member(expr, &field, true, span);
                }
                Token::PlusPlus => {
                    self.advance();
                    expr = self.builder.build_unary(UnaryOp::PostInc, expr, span);
                }
                Token::MinusMinus => {
                    self.advance();
                    expr = self.builder.build_unary(UnaryOp::PostDec, expr, span);
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_primary(&mut self) -> NodeId {
        let span = self.peek_span();
        match self.peek().clone() {
            Token::IntLit(v) => {
                self.advance();
                self.builder.build_literal_int(v, span)
            }
            Token::FloatLit(v) => {
                self.advance();
                self.builder.build_literal_float(v, span)
            }
            Token::CharLit(c) => {
                self.advance();
                self.builder.build_literal_char(c, span)
            }
            Token::StringLit(s) => {
                self.advance();
                self.builder.build_literal_string(&s, span)
            }
            Token::True => {
                self.advance();
                self.builder.build_literal_bool(true, span)
            }
            Token::False => {
                self.advance();
                self.builder.build_literal_bool(false, span)
            }
            Token::Null => {
                self.advance();
                self.builder.build_literal_null(span)
            }
            Token::Ident(name) => {
                self.advance();
                self.builder.build_identifier(&name, span)
            }
            Token::Printf => {
                self.advance();
                self.builder.build_identifier("printf", span)
            }
            Token::Print => {
                self.advance();
                self.builder.build_identifier("print", span)
            }
            Token::Printid => {
                self.advance();
                self.builder.build_identifier("printid", span)
            }
            Token::Getid => {
                self.advance();
                self.builder.build_identifier("getid", span)
            }
            Token::LParen => {
                self.advance();
                let expr = self.parse_expression();
                self.expect(&Token::RParen, "`)` to close parenthesized expression");
                expr
            }
            _ => self.syntax_error("an expression"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse(src: &str) -> (Builder, Vec<NodeId>) {
        let mut builder = Builder::new(src.to_owned());
        let tokens = tokenize(src).expect("source should tokenize cleanly");
        let decls = parse_translation_unit(&mut builder, tokens, src);
        (builder, decls)
    }

    #[test]
    fn test_parses_global_variable_with_initializer() {
        let (builder, decls) = parse("int x = 5;");
        assert_eq!(decls.len(), 1);
        assert!(builder.errors.is_empty());
    }

    #[test]
    fn test_parses_function_definition_with_return() {
        let (builder, decls) = parse("int add(int a, int b) { return a + b; }");
        assert_eq!(decls.len(), 1);
        assert!(builder.errors.is_empty());
    }

    #[test]
    fn test_reports_syntax_error_on_missing_semicolon() {
        let (builder, _decls) = parse("int x = 5");
        assert!(!builder.errors.is_empty());
    }

    #[test]
    fn test_parses_array_declaration_with_dimension() {
        let (builder, decls) = parse("int arr[10];");
        assert_eq!(decls.len(), 1);
        assert!(builder.errors.is_empty());
    }

    #[test]
    fn test_parses_if_else_and_while() {
        let (builder, decls) = parse(
            "int f() { if (1) { return 1; } else { return 0; } while (0) { } return 2; }",
        );
        assert_eq!(decls.len(), 1);
        assert!(builder.errors.is_empty());
    }

    #[test]
    fn test_parses_struct_declaration_and_member_access() {
        let (builder, decls) = parse(
            "struct Point { int x; int y; }; int f() { struct Point p; p.x = 1; return p.x; }",
        );
        assert_eq!(decls.len(), 2);
        assert!(builder.errors.is_empty());
    }

    #[test]
    fn test_parses_abs_call() {
        let (builder, decls) = parse("int f(int x) { return abs(x); }");
        assert_eq!(decls.len(), 1);
        assert!(builder.errors.is_empty());
    }

    #[test]
    fn test_parses_upb_with_default_and_explicit_dimension() {
        let (builder, decls) =
            parse("int f(int a[10][20]) { return upb(a) + upb(a, 2); }");
        assert_eq!(decls.len(), 1);
        assert!(builder.errors.is_empty());
    }
}
