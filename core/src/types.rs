//! The type system. Types form a closed sum with shared integer
//! identity: primitive kinds get fixed ids, composite kinds (`pointer`,
//! `array`, `struct`, `function`) are structurally deduplicated and
//! allocated an id the first time a given shape is built.
//!
//! Predicates over the closed sum (`is_copy_type`/`is_numeric` via
//! `matches!`) cover the full arithmetic/scalar/pointer/array lattice.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

/// Opaque identity for a type. Cheap to copy, compare, and hash; the actual
/// structure (for composite kinds) lives in [TypeTable].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

/// Identifier for an interned name (see `symbols.rs`). Re-exported here so
/// `enum-field(enum-id)` and struct field names can reference it without a
/// dependency cycle.
pub type NameId = crate::symbols::ReprId;

/// A struct's fields, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructShape {
    pub fields: Vec<(NameId, TypeId)>,
}

/// A function's signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionShape {
    pub return_type: TypeId,
    pub parameters: Vec<TypeId>,
}

/// The structural key used to deduplicate composite types. Two types with
/// equal keys are given the same [TypeId].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum TypeKey {
    Pointer(TypeId),
    Array(TypeId),
    Struct(StructShape),
    Function(FunctionShape),
    EnumField(TypeId),
}

/// The tag every [TypeId] resolves to. Scalar kinds carry no extra data;
/// composite kinds index into [TypeTable]'s side tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Void,
    NullPointer,
    Bool,
    Char,
    Int,
    Float,
    /// An anonymous enum type. `id` distinguishes one `enum` declaration
    /// from another (needed to reject cross-enum comparisons).
    Enum { id: u32 },
    /// The type of an enum constant: `enum-field(T)` where `T` is the
    /// enclosing enum's type.
    EnumField(TypeId),
    File,
    /// The type of a bare `...` vararg marker in a parameter list.
    Vararg,
    Pointer(TypeId),
    Array(TypeId),
    Struct(StructShape),
    Function(FunctionShape),
}

/// The central type interner. Lives for the whole compilation.
#[derive(Debug)]
pub struct TypeTable {
    kinds: Vec<TypeKind>,
    by_key: HashMap<TypeKey, TypeId>,
    next_enum_id: u32,

    pub void: TypeId,
    pub null_pointer: TypeId,
    pub bool_: TypeId,
    pub char_: TypeId,
    pub int: TypeId,
    pub float: TypeId,
    pub file: TypeId,
    pub vararg: TypeId,
    /// `string` is `pointer(char)`, stored as a plain alias.
    pub string: TypeId,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        let mut kinds = Vec::new();
        let mut push = |kind: TypeKind| -> TypeId {
            let id = TypeId(kinds.len() as u32);
            kinds.push(kind);
            id
        };
        let void = push(TypeKind::Void);
        let null_pointer = push(TypeKind::NullPointer);
        let bool_ = push(TypeKind::Bool);
        let char_ = push(TypeKind::Char);
        let int = push(TypeKind::Int);
        let float = push(TypeKind::Float);
        let file = push(TypeKind::File);
        let vararg = push(TypeKind::Vararg);

        let mut table = Self {
            kinds,
            by_key: HashMap::new(),
            next_enum_id: 0,
            void,
            null_pointer,
            bool_,
            char_,
            int,
            float,
            file,
            vararg,
            string: void, // patched immediately below
        };
        table.string = table.pointer_to(char_);
        table
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.0 as usize]
    }

    fn intern(&mut self, key: TypeKey, kind: TypeKind) -> TypeId {
        if let Some(existing) = self.by_key.get(&key) {
            return *existing;
        }
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind);
        self.by_key.insert(key, id);
        id
    }

    pub fn pointer_to(&mut self, element: TypeId) -> TypeId {
        self.intern(TypeKey::Pointer(element), TypeKind::Pointer(element))
    }

    pub fn array_of(&mut self, element: TypeId) -> TypeId {
        self.intern(TypeKey::Array(element), TypeKind::Array(element))
    }

    pub fn struct_of(&mut self, fields: Vec<(NameId, TypeId)>) -> TypeId {
        let shape = StructShape { fields };
        self.intern(
            TypeKey::Struct(shape.clone()),
            TypeKind::Struct(shape),
        )
    }

    pub fn function_of(
        &mut self,
        return_type: TypeId,
        parameters: Vec<TypeId>,
    ) -> TypeId {
        let shape = FunctionShape {
            return_type,
            parameters,
        };
        self.intern(
            TypeKey::Function(shape.clone()),
            TypeKind::Function(shape),
        )
    }

    pub fn enum_field_of(&mut self, enum_type: TypeId) -> TypeId {
        self.intern(
            TypeKey::EnumField(enum_type),
            TypeKind::EnumField(enum_type),
        )
    }

    /// Allocate a brand new, distinct `enum` type (each `enum` declaration
    /// gets its own identity, never deduplicated against another).
    pub fn new_enum(&mut self) -> TypeId {
        let id = self.next_enum_id;
        self.next_enum_id += 1;
        let type_id = TypeId(self.kinds.len() as u32);
        self.kinds.push(TypeKind::Enum { id });
        type_id
    }

    // --- predicates ---

    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Int | TypeKind::Char | TypeKind::Bool
        ) || self.is_enumish(id)
    }

    fn is_enumish(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Enum { .. } | TypeKind::EnumField(_))
    }

    pub fn is_floating(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Float)
    }

    pub fn is_arithmetic(&self, id: TypeId) -> bool {
        self.is_integer(id) || self.is_floating(id)
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Pointer(_))
    }

    pub fn is_null_pointer(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::NullPointer)
    }

    pub fn is_scalar(&self, id: TypeId) -> bool {
        self.is_arithmetic(id) || self.is_pointer(id) || self.is_null_pointer(id)
    }

    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Array(_))
    }

    pub fn is_struct(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Struct(_))
    }

    pub fn is_function(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Function(_))
    }

    pub fn is_void(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Void)
    }

    pub fn is_enum(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Enum { .. })
    }

    pub fn is_enum_field(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::EnumField(_))
    }

    pub fn is_file(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::File)
    }

    /// The enclosing enum type, for either an `enum` type itself or one of
    /// its `enum-field` constants. Used to reject cross-enum comparisons.
    pub fn enum_identity(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            TypeKind::Enum { .. } => Some(id),
            TypeKind::EnumField(enum_ty) => Some(*enum_ty),
            _ => None,
        }
    }

    pub fn element_type(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            TypeKind::Pointer(el) | TypeKind::Array(el) => Some(*el),
            _ => None,
        }
    }

    pub fn struct_shape(&self, id: TypeId) -> Option<&StructShape> {
        match self.kind(id) {
            TypeKind::Struct(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn function_shape(&self, id: TypeId) -> Option<&FunctionShape> {
        match self.kind(id) {
            TypeKind::Function(shape) => Some(shape),
            _ => None,
        }
    }

    /// Structural equality between two type ids. Since composite types are
    /// interned, this reduces to id equality; kept as a named method so
    /// callers document intent.
    pub fn types_equal(&self, a: TypeId, b: TypeId) -> bool {
        a == b
    }
}

/// Render a type for use in diagnostics and the synthesized `print` output.
/// Needs a [TypeTable] to resolve composite shapes; exposed as a free
/// function rather than a `Display` impl because [TypeId] alone carries no
/// structure.
pub fn display_type(types: &TypeTable, id: TypeId) -> String {
    match types.kind(id) {
        TypeKind::Void => "void".into(),
        TypeKind::NullPointer => "null".into(),
        TypeKind::Bool => "bool".into(),
        TypeKind::Char => "char".into(),
        TypeKind::Int => "int".into(),
        TypeKind::Float => "float".into(),
        TypeKind::Enum { id } => format!("enum#{}", id),
        TypeKind::EnumField(t) => format!("enum-field({})", display_type(types, *t)),
        TypeKind::File => "file".into(),
        TypeKind::Vararg => "...".into(),
        TypeKind::Pointer(el) => format!("{}*", display_type(types, *el)),
        TypeKind::Array(el) => format!("{}[]", display_type(types, *el)),
        TypeKind::Struct(shape) => {
            format!("struct{{{} fields}}", shape.fields.len())
        }
        TypeKind::Function(shape) => format!(
            "fn({}) -> {}",
            shape.parameters.len(),
            display_type(types, shape.return_type)
        ),
    }
}

impl Display for TypeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_predicates() {
        let types = TypeTable::new();
        assert!(types.is_integer(types.int));
        assert!(types.is_arithmetic(types.int));
        assert!(types.is_arithmetic(types.float));
        assert!(!types.is_floating(types.int));
        assert!(types.is_scalar(types.null_pointer));
        assert!(!types.is_scalar(types.void));
    }

    #[test]
    fn test_string_is_pointer_to_char() {
        let types = TypeTable::new();
        assert!(types.is_pointer(types.string));
        assert_eq!(types.element_type(types.string), Some(types.char_));
    }

    #[test]
    fn test_structural_dedup() {
        let mut types = TypeTable::new();
        let p1 = types.pointer_to(types.int);
        let p2 = types.pointer_to(types.int);
        assert_eq!(p1, p2);

        let arr = types.array_of(types.int);
        assert_ne!(arr, p1);
    }

    #[test]
    fn test_struct_dedup_by_shape() {
        use crate::symbols::ReprId;
        let mut types = TypeTable::new();
        let name = ReprId(0);
        let s1 = types.struct_of(vec![(name, types.int)]);
        let s2 = types.struct_of(vec![(name, types.int)]);
        assert_eq!(s1, s2);

        let s3 = types.struct_of(vec![(name, types.float)]);
        assert_ne!(s1, s3);
    }

    #[test]
    fn test_each_enum_declaration_is_distinct() {
        let mut types = TypeTable::new();
        let e1 = types.new_enum();
        let e2 = types.new_enum();
        assert_ne!(e1, e2);
        assert!(types.is_enum(e1));
        assert_eq!(types.enum_identity(e1), Some(e1));
    }

    #[test]
    fn test_function_shape_dedup() {
        let mut types = TypeTable::new();
        let f1 = types.function_of(types.int, vec![types.int, types.float]);
        let f2 = types.function_of(types.int, vec![types.int, types.float]);
        assert_eq!(f1, f2);
    }
}
