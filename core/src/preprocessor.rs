//! The preprocessor: a narrow collaborator that expands
//! `#define`/`#undef` macros, resolves `#include`, and evaluates `#if`-family
//! conditional inclusion, before the lexer ever sees the result.
//!
//! `#eval`/`#set`/`#while`/`#endw` are accepted syntactically (so a file that
//! uses them doesn't trip a syntax error) but their bodies pass through a
//! single evaluation, not a fixed-point re-expansion loop: this is a
//! deliberate limitation, since the preprocessor is treated as a narrow
//! interface beyond "produce token-ready text."
//!
//! A single forward pass threads a running macro table through the source
//! lines.

use crate::error::CompileError;
use crate::util::Span;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
enum Macro {
    Object(String),
    Function(Vec<String>, String),
}

pub struct Preprocessor {
    macros: HashMap<String, Macro>,
    include_dirs: Vec<PathBuf>,
}

impl Preprocessor {
    pub fn new(include_dirs: Vec<PathBuf>) -> Self {
        Self {
            macros: HashMap::new(),
            include_dirs,
        }
    }

    /// Run the full `#define`/`#undef`/`#include`/`#if`-family pass over
    /// `source`, returning the macro-expanded, directive-free text.
    pub fn process(&mut self, source: &str) -> Result<String, (CompileError, Span)> {
        self.process_lines(source, 0)
    }

    fn process_lines(&mut self, source: &str, depth: usize) -> Result<String, (CompileError, Span)> {
        if depth > 64 {
            return Err((CompileError::MacroDoesNotExist, Span::synthetic()));
        }
        let mut out = String::new();
        let mut lines = source.lines().peekable();
        // Stack of (branch_taken_ever, currently_active, parent_active).
        let mut cond_stack: Vec<(bool, bool)> = Vec::new();

        while let Some(line) = lines.next() {
            let trimmed = line.trim_start();
            let active = cond_stack.iter().all(|(_, a)| *a);

            if let Some(rest) = trimmed.strip_prefix('#') {
                let rest = rest.trim_start();
                if rest.starts_with("define") {
                    if active {
                        self.handle_define(rest);
                    }
                } else if rest.starts_with("undef") {
                    if active {
                        let name = rest["undef".len()..].trim();
                        self.macros.remove(name);
                    }
                } else if rest.starts_with("include") {
                    if active {
                        let included = self.handle_include(rest, depth)?;
                        out.push_str(&included);
                    }
                } else if let Some(cond) = rest.strip_prefix("ifdef") {
                    let defined = self.macros.contains_key(cond.trim());
                    cond_stack.push((defined, active && defined));
                } else if let Some(cond) = rest.strip_prefix("ifndef") {
                    let defined = self.macros.contains_key(cond.trim());
                    cond_stack.push((!defined, active && !defined));
                } else if let Some(cond) = rest.strip_prefix("elif") {
                    if let Some((taken, _)) = cond_stack.last_mut() {
                        let parent_active = cond_stack
                            .get(cond_stack.len().saturating_sub(2))
                            .map_or(true, |(_, a)| *a);
                        let value = !*taken && parent_active && evaluate_condition(&self.expand_line(cond), &self.macros) != 0;
                        let taken_now = *taken || value;
                        let len = cond_stack.len();
                        cond_stack[len - 1] = (taken_now, value);
                    }
                } else if rest.starts_with("else") {
                    if let Some((taken, _)) = cond_stack.last().copied() {
                        let parent_active = cond_stack
                            .get(cond_stack.len().saturating_sub(2))
                            .map_or(true, |(_, a)| *a);
                        let len = cond_stack.len();
                        cond_stack[len - 1] = (true, !taken && parent_active);
                    }
                } else if rest.starts_with("endif") {
                    cond_stack.pop();
                } else if let Some(cond) = rest.strip_prefix("if") {
                    let parent_active = active;
                    let value = parent_active
                        && evaluate_condition(&self.expand_line(cond), &self.macros) != 0;
                    cond_stack.push((value, value));
                } else if rest.starts_with("eval")
                    || rest.starts_with("set")
                    || rest.starts_with("while")
                    || rest.starts_with("endw")
                {
                    // Accepted syntactically; not iteratively re-expanded
                    // (see module doc comment).
                } else {
                    // Unknown directive; ignore rather than hard failing,
                    // matching the narrow-interface scope of this collaborator.
                }
                continue;
            }

            if active {
                out.push_str(&self.expand_line(line));
                out.push('\n');
            }
        }
        Ok(out)
    }

    fn handle_define(&mut self, rest: &str) {
        let body = rest["define".len()..].trim_start();
        let (name_and_params, value) = match body.find(char::is_whitespace) {
            Some(idx) => (&body[..idx], body[idx..].trim_start()),
            None => (body, ""),
        };
        if let Some(open) = name_and_params.find('(') {
            if name_and_params.ends_with(')') {
                let name = name_and_params[..open].to_owned();
                let params: Vec<String> = name_and_params[open + 1..name_and_params.len() - 1]
                    .split(',')
                    .map(|p| p.trim().to_owned())
                    .filter(|p| !p.is_empty())
                    .collect();
                self.macros
                    .insert(name, Macro::Function(params, value.to_owned()));
                return;
            }
        }
        self.macros
            .insert(name_and_params.to_owned(), Macro::Object(value.to_owned()));
    }

    fn handle_include(&mut self, rest: &str, depth: usize) -> Result<String, (CompileError, Span)> {
        let rest = rest["include".len()..].trim();
        let filename = rest.trim_matches(|c| c == '"' || c == '<' || c == '>');
        for dir in &self.include_dirs {
            let candidate: PathBuf = dir.join(filename);
            if candidate.is_file() {
                let contents = fs::read_to_string(&candidate)
                    .map_err(|_| (CompileError::MacroDoesNotExist, Span::synthetic()))?;
                return self.process_lines(&contents, depth + 1);
            }
        }
        let direct = Path::new(filename);
        if direct.is_file() {
            let contents = fs::read_to_string(direct)
                .map_err(|_| (CompileError::MacroDoesNotExist, Span::synthetic()))?;
            return self.process_lines(&contents, depth + 1);
        }
        Err((CompileError::MacroDoesNotExist, Span::synthetic()))
    }

    /// Expand every macro reference on one line of (non-directive) source
    /// text, object-like macros first, then function-like call sites.
    fn expand_line(&self, line: &str) -> String {
        let mut out = String::new();
        let mut chars = line.char_indices().peekable();
        while let Some((idx, c)) = chars.next() {
            if c.is_alphabetic() || c == '_' {
                let start = idx;
                let mut end = idx + c.len_utf8();
                while let Some(&(next_idx, next_c)) = chars.peek() {
                    if next_c.is_alphanumeric() || next_c == '_' {
                        end = next_idx + next_c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let word = &line[start..end];
                match self.macros.get(word) {
                    Some(Macro::Object(value)) => out.push_str(&self.expand_line(value)),
                    Some(Macro::Function(params, body)) => {
                        if let Some((args, rest_len)) = parse_call_args(&line[end..]) {
                            for _ in 0..rest_len {
                                chars.next();
                            }
                            out.push_str(&self.expand_line(&substitute_params(params, &args, body)));
                        } else {
                            out.push_str(word);
                        }
                    }
                    None => out.push_str(word),
                }
            } else {
                out.push(c);
            }
        }
        out
    }
}

/// Parse a `(a, b, c)` argument list starting right after a macro name.
/// Returns the argument texts and how many characters of `rest` were
/// consumed, or `None` if `rest` doesn't open with `(`.
fn parse_call_args(rest: &str) -> Option<(Vec<String>, usize)> {
    let rest = rest.trim_start();
    let skipped = rest.len();
    let mut chars = rest.char_indices();
    match chars.next() {
        Some((_, '(')) => {}
        _ => return None,
    }
    let mut depth = 1;
    let mut end = None;
    for (idx, c) in chars {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(idx);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end?;
    let inner = &rest[1..end];
    let args: Vec<String> = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(|a| a.trim().to_owned()).collect()
    };
    let consumed_before_trim = skipped - rest.len();
    Some((args, consumed_before_trim + end + 1))
}

fn substitute_params(params: &[String], args: &[String], body: &str) -> String {
    let mut result = body.to_owned();
    for (param, arg) in params.iter().zip(args.iter()) {
        result = replace_word(&result, param, arg);
    }
    result
}

fn replace_word(text: &str, word: &str, replacement: &str) -> String {
    let mut out = String::new();
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c.is_alphabetic() || c == '_' {
            let start = idx;
            let mut end = idx + c.len_utf8();
            while let Some(&(next_idx, next_c)) = chars.peek() {
                if next_c.is_alphanumeric() || next_c == '_' {
                    end = next_idx + next_c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let found = &text[start..end];
            if found == word {
                out.push_str(replacement);
            } else {
                out.push_str(found);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Evaluate a `#if`/`#elif` integer-constant condition. A small standalone
/// evaluator mirroring the same operator semantics as `builder.rs`'s
/// constant folder (`+ - * / % == != < > <= >= && || !`), plus
/// `defined(NAME)`; kept separate from the builder to avoid a dependency
/// cycle (preprocessor runs before the parser/builder exist).
fn evaluate_condition(expr: &str, macros: &HashMap<String, Macro>) -> i32 {
    let tokens = tokenize_condition(expr);
    let mut pos = 0;
    parse_or(&tokens, &mut pos, macros)
}

#[derive(Clone, Debug, PartialEq)]
enum CondTok {
    Num(i32),
    Ident(String),
    Op(String),
    LParen,
    RParen,
}

fn tokenize_condition(expr: &str) -> Vec<CondTok> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(CondTok::Num(text.parse().unwrap_or(0)));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(CondTok::Ident(chars[start..i].iter().collect()));
        } else if c == '(' {
            tokens.push(CondTok::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(CondTok::RParen);
            i += 1;
        } else {
            let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
            if matches!(two.as_str(), "==" | "!=" | "<=" | ">=" | "&&" | "||") {
                tokens.push(CondTok::Op(two));
                i += 2;
            } else {
                tokens.push(CondTok::Op(c.to_string()));
                i += 1;
            }
        }
    }
    tokens
}

fn parse_or(tokens: &[CondTok], pos: &mut usize, macros: &HashMap<String, Macro>) -> i32 {
    let mut lhs = parse_and(tokens, pos, macros);
    while matches!(tokens.get(*pos), Some(CondTok::Op(op)) if op == "||") {
        *pos += 1;
        let rhs = parse_and(tokens, pos, macros);
        lhs = ((lhs != 0) || (rhs != 0)) as i32;
    }
    lhs
}

fn parse_and(tokens: &[CondTok], pos: &mut usize, macros: &HashMap<String, Macro>) -> i32 {
    let mut lhs = parse_equality(tokens, pos, macros);
    while matches!(tokens.get(*pos), Some(CondTok::Op(op)) if op == "&&") {
        *pos += 1;
        let rhs = parse_equality(tokens, pos, macros);
        lhs = ((lhs != 0) && (rhs != 0)) as i32;
    }
    lhs
}

fn parse_equality(tokens: &[CondTok], pos: &mut usize, macros: &HashMap<String, Macro>) -> i32 {
    let mut lhs = parse_relational(tokens, pos, macros);
    while let Some(CondTok::Op(op)) = tokens.get(*pos) {
        if op == "==" {
            *pos += 1;
            let rhs = parse_relational(tokens, pos, macros);
            lhs = (lhs == rhs) as i32;
        } else if op == "!=" {
            *pos += 1;
            let rhs = parse_relational(tokens, pos, macros);
            lhs = (lhs != rhs) as i32;
        } else {
            break;
        }
    }
    lhs
}

fn parse_relational(tokens: &[CondTok], pos: &mut usize, macros: &HashMap<String, Macro>) -> i32 {
    let mut lhs = parse_additive(tokens, pos, macros);
    loop {
        match tokens.get(*pos) {
            Some(CondTok::Op(op)) if op == "<" => {
                *pos += 1;
                lhs = (lhs < parse_additive(tokens, pos, macros)) as i32;
            }
            Some(CondTok::Op(op)) if op == ">" => {
                *pos += 1;
                lhs = (lhs > parse_additive(tokens, pos, macros)) as i32;
            }
            Some(CondTok::Op(op)) if op == "<=" => {
                *pos += 1;
                lhs = (lhs <= parse_additive(tokens, pos, macros)) as i32;
            }
            Some(CondTok::Op(op)) if op == ">=" => {
                *pos += 1;
                lhs = (lhs >= parse_additive(tokens, pos, macros)) as i32;
            }
            _ => break,
        }
    }
    lhs
}

fn parse_additive(tokens: &[CondTok], pos: &mut usize, macros: &HashMap<String, Macro>) -> i32 {
    let mut lhs = parse_multiplicative(tokens, pos, macros);
    loop {
        match tokens.get(*pos) {
            Some(CondTok::Op(op)) if op == "+" => {
                *pos += 1;
                lhs = lhs.wrapping_add(parse_multiplicative(tokens, pos, macros));
            }
            Some(CondTok::Op(op)) if op == "-" => {
                *pos += 1;
                lhs = lhs.wrapping_sub(parse_multiplicative(tokens, pos, macros));
            }
            _ => break,
        }
    }
    lhs
}

fn parse_multiplicative(tokens: &[CondTok], pos: &mut usize, macros: &HashMap<String, Macro>) -> i32 {
    let mut lhs = parse_unary(tokens, pos, macros);
    loop {
        match tokens.get(*pos) {
            Some(CondTok::Op(op)) if op == "*" => {
                *pos += 1;
                lhs = lhs.wrapping_mul(parse_unary(tokens, pos, macros));
            }
            Some(CondTok::Op(op)) if op == "/" => {
                *pos += 1;
                let rhs = parse_unary(tokens, pos, macros);
                lhs = if rhs == 0 { 0 } else { lhs.wrapping_div(rhs) };
            }
            Some(CondTok::Op(op)) if op == "%" => {
                *pos += 1;
                let rhs = parse_unary(tokens, pos, macros);
                lhs = if rhs == 0 { 0 } else { lhs.wrapping_rem(rhs) };
            }
            _ => break,
        }
    }
    lhs
}

fn parse_unary(tokens: &[CondTok], pos: &mut usize, macros: &HashMap<String, Macro>) -> i32 {
    match tokens.get(*pos) {
        Some(CondTok::Op(op)) if op == "!" => {
            *pos += 1;
            (parse_unary(tokens, pos, macros) == 0) as i32
        }
        Some(CondTok::Op(op)) if op == "-" => {
            *pos += 1;
            parse_unary(tokens, pos, macros).wrapping_neg()
        }
        _ => parse_primary(tokens, pos, macros),
    }
}

fn parse_primary(tokens: &[CondTok], pos: &mut usize, macros: &HashMap<String, Macro>) -> i32 {
    match tokens.get(*pos) {
        Some(CondTok::Num(n)) => {
            *pos += 1;
            *n
        }
        Some(CondTok::Ident(name)) if name == "defined" => {
            *pos += 1;
            let paren = matches!(tokens.get(*pos), Some(CondTok::LParen));
            if paren {
                *pos += 1;
            }
            let result = match tokens.get(*pos) {
                Some(CondTok::Ident(inner)) => {
                    *pos += 1;
                    macros.contains_key(inner) as i32
                }
                _ => 0,
            };
            if paren && matches!(tokens.get(*pos), Some(CondTok::RParen)) {
                *pos += 1;
            }
            result
        }
        Some(CondTok::Ident(_)) => {
            // An undefined macro name used bare in a condition evaluates to 0,
            // matching the preprocessor convention of "undefined is false".
            *pos += 1;
            0
        }
        Some(CondTok::LParen) => {
            *pos += 1;
            let value = parse_or(tokens, pos, macros);
            if matches!(tokens.get(*pos), Some(CondTok::RParen)) {
                *pos += 1;
            }
            value
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_macro_expansion() {
        let mut pp = Preprocessor::new(vec![]);
        let out = pp.process("#define SIZE 10\nint a[SIZE];\n").unwrap();
        assert_eq!(out.trim(), "int a[10];");
    }

    #[test]
    fn test_function_macro_expansion() {
        let mut pp = Preprocessor::new(vec![]);
        let out = pp
            .process("#define MAX(a, b) a\nint x = MAX(1, 2);\n")
            .unwrap();
        assert_eq!(out.trim(), "int x = 1;");
    }

    #[test]
    fn test_ifdef_excludes_undefined_branch() {
        let mut pp = Preprocessor::new(vec![]);
        let out = pp
            .process("#ifdef FOO\nint a;\n#else\nint b;\n#endif\n")
            .unwrap();
        assert_eq!(out.trim(), "int b;");
    }

    #[test]
    fn test_if_evaluates_integer_condition() {
        let mut pp = Preprocessor::new(vec![]);
        let out = pp
            .process("#define N 5\n#if N > 2\nint ok;\n#endif\n")
            .unwrap();
        assert_eq!(out.trim(), "int ok;");
    }

    #[test]
    fn test_undef_removes_macro() {
        let mut pp = Preprocessor::new(vec![]);
        let out = pp
            .process("#define X 1\n#undef X\nint X;\n")
            .unwrap();
        assert_eq!(out.trim(), "int X;");
    }
}
