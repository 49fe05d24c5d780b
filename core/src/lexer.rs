//! The lexer: a narrow collaborator that turns already
//! preprocessed source text into a flat token stream, each token carrying
//! the [Span] it occupies. The rest of the pipeline (parser, builder, IR
//! emitter) never looks at raw source characters again after this point.
//!
//! One `nom` combinator per token family, composed with `alt`, driven by a
//! small loop that also strips whitespace and comments between tokens.

use crate::error::CompileError;
use crate::util::{RawSpan, Span};
use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag};
use nom::character::complete::{alpha1, alphanumeric1, char as nom_char, digit1, one_of};
use nom::combinator::{map, opt, recognize, value};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, tuple};
use nom::IResult;

/// A single lexical token.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Ident(String),
    IntLit(i32),
    FloatLit(f64),
    CharLit(char),
    StringLit(String),

    Int,
    Float,
    Char,
    Bool,
    Void,
    Struct,
    Enum,
    If,
    Else,
    While,
    Do,
    For,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Return,
    Goto,
    Printf,
    Print,
    Printid,
    Getid,
    Abs,
    Upb,
    File,
    Null,
    True,
    False,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    AmpAmp,
    PipePipe,
    Bang,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    PlusPlus,
    MinusMinus,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    ShlEq,
    ShrEq,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Dot,
    Arrow,
    Question,
    Colon,
    Ellipsis,
    Eof,
}

/// A token together with the source span it was scanned from.
pub type Spanned = (Token, Span);

fn keyword_or_ident(raw: RawSpan) -> IResult<RawSpan, Token> {
    let (rest, matched) = recognize(pair(
        alt((alpha1, recognize(nom_char('_')))),
        many0(alt((alphanumeric1, recognize(nom_char('_'))))),
    ))(raw)?;
    let text = *matched.fragment();
    let token = match text {
        "int" => Token::Int,
        "float" => Token::Float,
        "char" => Token::Char,
        "bool" => Token::Bool,
        "void" => Token::Void,
        "struct" => Token::Struct,
        "enum" => Token::Enum,
        "if" => Token::If,
        "else" => Token::Else,
        "while" => Token::While,
        "do" => Token::Do,
        "for" => Token::For,
        "switch" => Token::Switch,
        "case" => Token::Case,
        "default" => Token::Default,
        "break" => Token::Break,
        "continue" => Token::Continue,
        "return" => Token::Return,
        "goto" => Token::Goto,
        "printf" => Token::Printf,
        "print" => Token::Print,
        "printid" => Token::Printid,
        "getid" => Token::Getid,
        "abs" => Token::Abs,
        "upb" => Token::Upb,
        "file" => Token::File,
        "NULL" => Token::Null,
        "true" => Token::True,
        "false" => Token::False,
        other => Token::Ident(other.to_owned()),
    };
    Ok((rest, token))
}

fn float_literal(raw: RawSpan) -> IResult<RawSpan, Token> {
    map(
        recognize(tuple((digit1, nom_char('.'), digit1))),
        |matched: RawSpan| Token::FloatLit(matched.fragment().parse().unwrap_or(0.0)),
    )(raw)
}

fn int_literal(raw: RawSpan) -> IResult<RawSpan, Token> {
    map(digit1, |matched: RawSpan| {
        Token::IntLit(matched.fragment().parse().unwrap_or(0))
    })(raw)
}

fn char_literal(raw: RawSpan) -> IResult<RawSpan, Token> {
    map(
        delimited(
            nom_char('\''),
            alt((
                preceded(nom_char('\\'), one_of("nt0\\'\"")),
                one_of_non_quote,
            )),
            nom_char('\''),
        ),
        |c| Token::CharLit(unescape_char(c)),
    )(raw)
}

fn one_of_non_quote(raw: RawSpan) -> IResult<RawSpan, char> {
    let fragment = *raw.fragment();
    match fragment.chars().next() {
        Some(c) if c != '\'' => {
            let (rest, _) = nom::bytes::complete::take(c.len_utf8())(raw)?;
            Ok((rest, c))
        }
        _ => Err(nom::Err::Error(nom::error::Error::new(
            raw,
            nom::error::ErrorKind::Char,
        ))),
    }
}

fn unescape_char(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        '0' => '\0',
        other => other,
    }
}

fn string_literal(raw: RawSpan) -> IResult<RawSpan, Token> {
    map(
        delimited(
            nom_char('"'),
            opt(escaped_transform(
                is_not("\\\""),
                '\\',
                alt((
                    value("\\", tag("\\")),
                    value("\"", tag("\"")),
                    value("\n", tag("n")),
                    value("\t", tag("t")),
                )),
            )),
            nom_char('"'),
        ),
        |s: Option<String>| Token::StringLit(s.unwrap_or_default()),
    )(raw)
}

/// Punctuation/operators, ordered longest-match-first so e.g. `<<=` is
/// tried before `<<` before `<`.
fn punctuation(raw: RawSpan) -> IResult<RawSpan, Token> {
    alt((
        alt((
            value(Token::Ellipsis, tag("...")),
            value(Token::ShlEq, tag("<<=")),
            value(Token::ShrEq, tag(">>=")),
        )),
        alt((
            value(Token::Arrow, tag("->")),
            value(Token::PlusPlus, tag("++")),
            value(Token::MinusMinus, tag("--")),
            value(Token::PlusEq, tag("+=")),
            value(Token::MinusEq, tag("-=")),
            value(Token::StarEq, tag("*=")),
            value(Token::SlashEq, tag("/=")),
            value(Token::PercentEq, tag("%=")),
            value(Token::AmpEq, tag("&=")),
            value(Token::PipeEq, tag("|=")),
            value(Token::CaretEq, tag("^=")),
            value(Token::AmpAmp, tag("&&")),
            value(Token::PipePipe, tag("||")),
            value(Token::Eq, tag("==")),
            value(Token::Ne, tag("!=")),
            value(Token::Le, tag("<=")),
            value(Token::Ge, tag(">=")),
            value(Token::Shl, tag("<<")),
            value(Token::Shr, tag(">>")),
        )),
        alt((
            value(Token::Plus, tag("+")),
            value(Token::Minus, tag("-")),
            value(Token::Star, tag("*")),
            value(Token::Slash, tag("/")),
            value(Token::Percent, tag("%")),
            value(Token::Assign, tag("=")),
            value(Token::Lt, tag("<")),
            value(Token::Gt, tag(">")),
            value(Token::Bang, tag("!")),
            value(Token::Amp, tag("&")),
            value(Token::Pipe, tag("|")),
            value(Token::Caret, tag("^")),
            value(Token::Tilde, tag("~")),
            value(Token::LParen, tag("(")),
            value(Token::RParen, tag(")")),
            value(Token::LBrace, tag("{")),
            value(Token::RBrace, tag("}")),
            value(Token::LBracket, tag("[")),
            value(Token::RBracket, tag("]")),
            value(Token::Semi, tag(";")),
            value(Token::Comma, tag(",")),
            value(Token::Dot, tag(".")),
            value(Token::Question, tag("?")),
            value(Token::Colon, tag(":")),
        )),
    ))(raw)
}

fn next_token(raw: RawSpan) -> IResult<RawSpan, Token> {
    alt((
        float_literal,
        int_literal,
        char_literal,
        string_literal,
        keyword_or_ident,
        punctuation,
    ))(raw)
}

/// Skip whitespace and both comment forms (`//`, `/* */`) between tokens.
fn skip_trivia(mut raw: RawSpan) -> RawSpan {
    loop {
        let start_len = raw.fragment().len();
        let trimmed = raw.fragment().trim_start();
        let skipped = raw.fragment().len() - trimmed.len();
        if skipped > 0 {
            raw = take_n(raw, skipped);
        }
        if raw.fragment().starts_with("//") {
            let end = raw.fragment().find('\n').unwrap_or_else(|| raw.fragment().len());
            raw = take_n(raw, end);
        } else if raw.fragment().starts_with("/*") {
            if let Some(end) = raw.fragment().find("*/") {
                raw = take_n(raw, end + 2);
            } else {
                raw = take_n(raw, raw.fragment().len());
            }
        }
        if raw.fragment().len() == start_len {
            break;
        }
    }
    raw
}

fn take_n<'a>(raw: RawSpan<'a>, n: usize) -> RawSpan<'a> {
    match nom::bytes::complete::take::<usize, RawSpan, nom::error::Error<RawSpan>>(n)(raw) {
        Ok((rest, _)) => rest,
        Err(_) => raw,
    }
}

/// Scan preprocessed source text into a token stream, appending a trailing
/// [Token::Eof]. Returns the single [CompileError::Syntax] diagnostic
/// the first time the scanner can't recognize what follows.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, (CompileError, Span)> {
    let mut tokens = Vec::new();
    let mut raw = RawSpan::new(source);
    loop {
        raw = skip_trivia(raw);
        if raw.fragment().is_empty() {
            tokens.push((Token::Eof, Span::synthetic()));
            break;
        }
        let start = raw;
        match next_token(raw) {
            Ok((rest, token)) => {
                let span = Span::from_raw_spans(&start, &rest);
                tokens.push((token, span));
                raw = rest;
            }
            Err(_) => {
                let span = Span::from_raw_span(&raw);
                return Err((CompileError::Syntax { expected: "a valid token" }, span));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenizes_simple_declaration() {
        let tokens = tokenize("int x = 5;").unwrap();
        let kinds: Vec<&Token> = tokens.iter().map(|(t, _)| t).collect();
        assert_eq!(
            kinds,
            vec![
                &Token::Int,
                &Token::Ident("x".to_owned()),
                &Token::Assign,
                &Token::IntLit(5),
                &Token::Semi,
                &Token::Eof,
            ]
        );
    }

    #[test]
    fn test_skips_line_and_block_comments() {
        let tokens = tokenize("int x; // comment\n/* block */ int y;").unwrap();
        let idents: Vec<&Token> = tokens
            .iter()
            .map(|(t, _)| t)
            .filter(|t| matches!(t, Token::Ident(_)))
            .collect();
        assert_eq!(idents.len(), 2);
    }

    #[test]
    fn test_longest_match_wins_for_operators() {
        let tokens = tokenize("a <<= b").unwrap();
        assert_eq!(tokens[1].0, Token::ShlEq);
    }

    #[test]
    fn test_unrecognized_character_reports_syntax_error() {
        let err = tokenize("int x = @;").unwrap_err();
        assert!(matches!(err.0, CompileError::Syntax { .. }));
    }

    #[test]
    fn test_string_literal_unescapes() {
        let tokens = tokenize("\"a\\nb\"").unwrap();
        match &tokens[0].0 {
            Token::StringLit(s) => assert_eq!(s, "a\nb"),
            other => panic!("expected string literal, got {:?}", other),
        }
    }
}
