/// Maximum number of `%`-placeholders (excluding `%%`) accepted in a single
/// `printf` format string.
pub const MAX_PRINTF_ARGS: usize = 20;

/// Prefix used for synthetic locals generated while desugaring `print`/
/// `printid` of composite-typed arguments. The full name is
/// `_temporal_identifier_<n>_`, where `n` is the identifier-table size at
/// the time of generation.
pub const TEMPORAL_IDENTIFIER_PREFIX: &str = "_temporal_identifier_";

/// Sentinel slot id for the function-wide `llvm.stacksave`/`llvm.stackrestore`
/// pair, as opposed to the per-compound-statement slots keyed by the block
/// counter.
pub const FUNCTION_STACK_SLOT: isize = -1;
