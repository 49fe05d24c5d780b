//! Core implementation of a small C-flavored systems language compiled
//! straight to a textual, LLVM-flavored
//! IR. The pipeline is preprocessor -> lexer -> parser/builder (type
//! checking and constant folding happen incrementally as the parser drives
//! the builder) -> IR emitter.
//!
//! ```
//! use ruc::{compile, Target};
//!
//! let source = "
//! int main() {
//!     printf(\"%i\\n\", 1 + 2);
//!     return 0;
//! }
//! ".to_string();
//!
//! let ir = compile(&source, vec![], Target::X86_64).unwrap();
//! assert!(ir.contains("define i32 @main"));
//! ```

#![deny(clippy::all)]

mod ast;
mod builder;
mod consts;
mod desugar;
pub mod error;
pub mod ir;
mod lexer;
mod node;
mod parser;
mod preprocessor;
mod symbols;
mod types;
mod util;

pub use util::Span;

use builder::Builder;
use error::{CompileError, SourceErrorWrapper, WithSource};
use log::debug;
use std::path::PathBuf;

/// The target triple to stamp on the emitted module. The
/// emitter itself is target-agnostic; this only changes the leading
/// `target triple = "..."` line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    X86_64,
    Mipsel,
}

impl Target {
    fn triple(self) -> &'static str {
        match self {
            Target::X86_64 => "x86_64-pc-linux-gnu",
            Target::Mipsel => "mipsel-unknown-linux-gnu",
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Target::X86_64
    }
}

/// Compile a single translation unit down to textual IR.
///
/// `include_dirs` is the search path consulted by `#include "..."`
/// directives that don't resolve against the including file's own
/// directory.
///
/// Every error accumulated anywhere in the pipeline is reported against the
/// *preprocessed* source text: once macro expansion and `#include` splicing
/// have run, spans no longer line up with the original file's byte offsets.
/// This is a known simplification rather than a full source-map.
pub fn compile(
    source: &str,
    include_dirs: Vec<PathBuf>,
    target: Target,
) -> Result<String, WithSource<CompileError>> {
    let mut preprocessor = preprocessor::Preprocessor::new(include_dirs);
    let preprocessed = preprocessor.process(source).map_err(|(err, span)| {
        WithSource::new(
            vec![SourceErrorWrapper::new(err, span, source)],
            source.to_owned(),
        )
    })?;

    let tokens = lexer::tokenize(&preprocessed).map_err(|(err, span)| {
        WithSource::new(
            vec![SourceErrorWrapper::new(err, span, &preprocessed)],
            preprocessed.clone(),
        )
    })?;

    let mut builder = Builder::new(preprocessed.clone());
    let decls = parser::parse_translation_unit(&mut builder, tokens, &preprocessed);

    if !builder.errors.is_empty() {
        debug!(
            "compilation failed with {} error(s)",
            builder.errors.len()
        );
        return Err(WithSource::new(builder.errors, preprocessed));
    }

    let mut emitter = ir::Emitter::new(&builder.nodes, &builder.types, &builder.symbols);
    emitter.emit_line(format!("target triple = \"{}\"", target.triple()));
    ir::decl::emit_string_globals(&mut emitter, &builder.strings);
    ir::decl::emit_translation_unit(&mut emitter, &decls);
    Ok(emitter.into_output())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_emits_main_definition() {
        let source = "int main() { return 0; }".to_string();
        let ir = compile(&source, vec![], Target::X86_64).expect("should compile cleanly");
        assert!(ir.contains("define i32 @main"));
    }

    #[test]
    fn test_compile_reports_syntax_error_with_source() {
        let source = "int main() { return 0".to_string();
        let err = compile(&source, vec![], Target::X86_64).unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn test_compile_honors_preprocessor_defines() {
        let source = "#define TWO 2\nint main() { return TWO; }".to_string();
        let ir = compile(&source, vec![], Target::X86_64).expect("should compile cleanly");
        assert!(ir.contains("ret i32 2"));
    }

    #[test]
    fn test_compile_stamps_mipsel_target_triple() {
        let source = "int main() { return 0; }".to_string();
        let ir = compile(&source, vec![], Target::Mipsel).expect("should compile cleanly");
        assert!(ir.contains("mipsel-unknown-linux-gnu"));
    }
}
