//! Runtime stub / library declaration emission. Emitted
//! once at the end of the translation unit, and only for whichever
//! intrinsics [Emitter::used] actually recorded a reference to — a program
//! only pays for the runtime support it actually calls.

use super::Emitter;

/// Emit the trailing declarations a compiled module needs: `%struct._IO_FILE`,
/// the handwritten `assert`/`print`/`printid`/`getid` stub bodies, `abs`/
/// `llvm.fabs.f64`, and `llvm.stacksave`/`llvm.stackrestore`, each only if
/// referenced.
pub fn emit_epilogue(emitter: &mut Emitter) {
    emitter.emit_line("");
    if emitter.used.file_io {
        emitter.emit_line("%struct._IO_FILE = type opaque");
    }

    if emitter.used.assert_ {
        emit_assert_stub(emitter);
    }
    if emitter.used.abs {
        emitter.emit_line("declare i32 @abs(i32)");
    }
    if emitter.used.fabs {
        emitter.emit_line("declare double @llvm.fabs.f64(double)");
    }
    if emitter.used.stacksave {
        emitter.emit_line("declare i8* @llvm.stacksave()");
        emitter.emit_line("declare void @llvm.stackrestore(i8*)");
    }
    if emitter.used.print {
        emit_variadic_stub(emitter, "print");
    }
    if emitter.used.printid {
        emit_variadic_stub(emitter, "printid");
    }
    if emitter.used.getid {
        emit_variadic_stub(emitter, "getid");
    }
    emitter.emit_line("declare i32 @printf(i8*, ...)");
}

/// `assert(cond, msg)`: a guarded `printf` of `msg` followed by `exit(1)`
/// when `cond` is false, `ret void` otherwise.
fn emit_assert_stub(emitter: &mut Emitter) {
    emitter.emit_line(
        "@.str.assert = private unnamed_addr constant [3 x i8] c\"%s\\00\", align 1",
    );
    emitter.emit_line("define void @assert(i32, i8*) {");
    emitter.emit_line("  %3 = alloca i32, align 4");
    emitter.emit_line("  %4 = alloca i8*, align 8");
    emitter.emit_line("  store i32 %0, i32* %3, align 4");
    emitter.emit_line("  store i8* %1, i8** %4, align 8");
    emitter.emit_line("  %5 = load i32, i32* %3, align 4");
    emitter.emit_line("  %6 = icmp ne i32 %5, 0");
    emitter.emit_line("  br i1 %6, label %10, label %7");
    emitter.emit_line("7:");
    emitter.emit_line("  %8 = load i8*, i8** %4, align 8");
    emitter.emit_line(
        "  %9 = call i32 (i8*, ...) @printf(i8* getelementptr inbounds ([3 x i8], [3 x i8]* @.str.assert, i32 0, i32 0), i8* %8)",
    );
    emitter.emit_line("  call void @exit(i32 1)");
    emitter.emit_line("  unreachable");
    emitter.emit_line("10:");
    emitter.emit_line("  ret void");
    emitter.emit_line("}");
    emitter.emit_line("declare void @exit(i32)");
}

/// Empty variadic shim: `print`/`printid`/`getid` accept any arguments and do
/// nothing, so a program linking against them runs without a real library.
fn emit_variadic_stub(emitter: &mut Emitter, name: &str) {
    emitter.emit_line(format!("define void @{}(...) {{", name));
    emitter.emit_line("  ret void");
    emitter.emit_line("}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeStore;
    use crate::symbols::SymbolTable;
    use crate::types::TypeTable;

    #[test]
    fn test_epilogue_only_emits_referenced_intrinsics() {
        let nodes = NodeStore::new();
        let types = TypeTable::new();
        let symbols = SymbolTable::new();
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        emitter.used.abs = true;
        emit_epilogue(&mut emitter);
        let out = emitter.into_output();
        assert!(out.contains("declare i32 @abs(i32)"));
        assert!(!out.contains("llvm.stacksave"));
    }

    #[test]
    fn test_epilogue_always_declares_printf_but_not_file_stub() {
        let nodes = NodeStore::new();
        let types = TypeTable::new();
        let symbols = SymbolTable::new();
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        emit_epilogue(&mut emitter);
        let out = emitter.into_output();
        assert!(out.contains("declare i32 @printf"));
        assert!(!out.contains("%struct._IO_FILE"));
    }

    #[test]
    fn test_epilogue_declares_file_stub_only_when_file_io_used() {
        let nodes = NodeStore::new();
        let types = TypeTable::new();
        let symbols = SymbolTable::new();
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        emitter.used.file_io = true;
        emit_epilogue(&mut emitter);
        let out = emitter.into_output();
        assert!(out.contains("%struct._IO_FILE = type opaque"));
    }

    #[test]
    fn test_epilogue_emits_assert_stub_with_guarded_exit() {
        let nodes = NodeStore::new();
        let types = TypeTable::new();
        let symbols = SymbolTable::new();
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        emitter.used.assert_ = true;
        emit_epilogue(&mut emitter);
        let out = emitter.into_output();
        assert!(out.contains("define void @assert(i32, i8*) {"));
        assert!(out.contains("call void @exit(i32 1)"));
        assert!(out.contains("ret void"));
    }

    #[test]
    fn test_epilogue_emits_variadic_print_stubs() {
        let nodes = NodeStore::new();
        let types = TypeTable::new();
        let symbols = SymbolTable::new();
        let mut emitter = Emitter::new(&nodes, &types, &symbols);
        emitter.used.print = true;
        emitter.used.printid = true;
        emitter.used.getid = true;
        emit_epilogue(&mut emitter);
        let out = emitter.into_output();
        assert!(out.contains("define void @print(...) {"));
        assert!(out.contains("define void @printid(...) {"));
        assert!(out.contains("define void @getid(...) {"));
    }
}
