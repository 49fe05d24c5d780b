//! Symbol tables: the representation table (interned name
//! strings), the identifier table (name -> {type, displacement, locality,
//! spelling}), and the string-literal pool.
//!
//! Three append-only tables, threaded through the builder, that persist for
//! the whole compilation rather than being rebuilt per pass.

use crate::types::TypeId;
use std::collections::HashMap;

/// Id of an interned name in the representation table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReprId(pub u32);

/// Chained hash of interned name strings. `repr_get_reference` semantics:
/// looking a name up returns the same [ReprId] every time, so later
/// identifier-table entries can be compared by id instead of string.
#[derive(Debug, Default)]
pub struct ReprTable {
    strings: Vec<String>,
    by_string: HashMap<String, ReprId>,
}

impl ReprTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning its (possibly pre-existing) [ReprId].
    pub fn intern(&mut self, name: &str) -> ReprId {
        if let Some(id) = self.by_string.get(name) {
            return *id;
        }
        let id = ReprId(self.strings.len() as u32);
        self.strings.push(name.to_owned());
        self.by_string.insert(name.to_owned(), id);
        id
    }

    pub fn spelling(&self, id: ReprId) -> &str {
        &self.strings[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Id of an entry in the identifier table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentId(pub u32);

/// Whether an identifier lives in function-local storage or file/global
/// storage. Determines whether the IR emitter addresses it as `%var.<id>`
/// or `@var.<id>`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Locality {
    Local,
    Global,
}

/// One identifier-table record. For an ordinary variable,
/// `displacement` is unused (`0`); for an `enum` constant (whose `ty` is
/// `enum-field(T)`), `displacement` stores the constant's integer value.
#[derive(Clone, Debug)]
pub struct IdentRecord {
    pub repr: ReprId,
    pub ty: TypeId,
    pub displacement: i64,
    pub locality: Locality,
}

/// The identifier table plus the representation table that backs name
/// lookup. A single, monotonically growing table for the whole
/// compilation.
#[derive(Debug, Default)]
pub struct SymbolTable {
    reprs: ReprTable,
    idents: Vec<IdentRecord>,
    /// Current binding for each interned name, scope-stacked: the innermost
    /// `Vec` entry shadows outer ones. `repr_get_reference` returns the top
    /// of the stack for a name, or `None` (the "unbound" sentinel).
    bindings: HashMap<ReprId, Vec<IdentId>>,
    /// One frame per open lexical scope, recording which names it bound so
    /// they can be unwound when the scope closes.
    scopes: Vec<Vec<ReprId>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            reprs: ReprTable::new(),
            idents: Vec::new(),
            bindings: HashMap::new(),
            scopes: vec![Vec::new()], // file scope, never popped
        }
    }

    pub fn intern(&mut self, name: &str) -> ReprId {
        self.reprs.intern(name)
    }

    pub fn spelling(&self, repr: ReprId) -> &str {
        self.reprs.spelling(repr)
    }

    pub fn ident_count(&self) -> usize {
        self.idents.len()
    }

    pub fn ident(&self, id: IdentId) -> &IdentRecord {
        &self.idents[id.0 as usize]
    }

    /// Open a new lexical scope (function body, compound statement, etc.).
    pub fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    /// Close the innermost lexical scope, un-shadowing whatever names it
    /// bound. Declarations made in the scope remain in the identifier table
    /// (they're never removed) but stop being resolvable by name.
    pub fn pop_scope(&mut self) {
        let frame = self.scopes.pop().expect("unbalanced scope pop");
        for repr in frame {
            if let Some(stack) = self.bindings.get_mut(&repr) {
                stack.pop();
            }
        }
    }

    /// Declare a new identifier, binding `repr` to it in the current scope.
    /// Shadows any outer binding of the same name.
    pub fn declare(
        &mut self,
        repr: ReprId,
        ty: TypeId,
        displacement: i64,
        locality: Locality,
    ) -> IdentId {
        let id = IdentId(self.idents.len() as u32);
        self.idents.push(IdentRecord {
            repr,
            ty,
            displacement,
            locality,
        });
        self.bindings.entry(repr).or_insert_with(Vec::new).push(id);
        self.scopes
            .last_mut()
            .expect("file scope always present")
            .push(repr);
        id
    }

    /// `repr_get_reference(name)`: the current binding for an interned name,
    /// or `None` if unbound.
    pub fn resolve(&self, repr: ReprId) -> Option<IdentId> {
        self.bindings.get(&repr).and_then(|stack| stack.last().copied())
    }

    /// Convenience wrapper that interns and resolves in one step, the way
    /// `build_identifier` uses it.
    pub fn resolve_name(&mut self, name: &str) -> Option<IdentId> {
        let repr = self.intern(name);
        self.resolve(repr)
    }
}

/// Id of an entry in the string-literal pool.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(pub u32);

/// A single interned string literal: its bytes (decoded from source escapes)
/// and its length excluding the terminating null.
#[derive(Clone, Debug)]
pub struct StringEntry {
    pub bytes: String,
}

impl StringEntry {
    /// Length excluding the terminating null.
    pub fn len_excluding_null(&self) -> usize {
        self.bytes.len()
    }
}

/// Deduplicated pool of string literals.
#[derive(Debug, Default)]
pub struct StringPool {
    entries: Vec<StringEntry>,
    by_content: HashMap<String, StringId>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, content: &str) -> StringId {
        if let Some(id) = self.by_content.get(content) {
            return *id;
        }
        let id = StringId(self.entries.len() as u32);
        self.entries.push(StringEntry {
            bytes: content.to_owned(),
        });
        self.by_content.insert(content.to_owned(), id);
        id
    }

    pub fn get(&self, id: StringId) -> &StringEntry {
        &self.entries[id.0 as usize]
    }

    pub fn entries(&self) -> &[StringEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTable;

    #[test]
    fn test_repr_table_interns_once() {
        let mut reprs = ReprTable::new();
        let a = reprs.intern("foo");
        let b = reprs.intern("foo");
        let c = reprs.intern("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(reprs.spelling(a), "foo");
    }

    #[test]
    fn test_scoped_shadowing() {
        let types = TypeTable::new();
        let mut symbols = SymbolTable::new();
        let x = symbols.intern("x");
        let outer = symbols.declare(x, types.int, 0, Locality::Global);
        assert_eq!(symbols.resolve(x), Some(outer));

        symbols.push_scope();
        let inner = symbols.declare(x, types.float, 0, Locality::Local);
        assert_eq!(symbols.resolve(x), Some(inner));
        symbols.pop_scope();

        assert_eq!(symbols.resolve(x), Some(outer));
    }

    #[test]
    fn test_unbound_name_resolves_to_none() {
        let mut symbols = SymbolTable::new();
        let missing = symbols.intern("missing");
        assert_eq!(symbols.resolve(missing), None);
    }

    #[test]
    fn test_string_pool_dedup_and_length() {
        let mut pool = StringPool::new();
        let a = pool.intern("hello");
        let b = pool.intern("hello");
        assert_eq!(a, b);
        assert_eq!(pool.get(a).len_excluding_null(), 5);
    }
}
