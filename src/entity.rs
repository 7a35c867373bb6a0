// This module defines EntityKey, the canonical identity of every dedup-eligible
// module-scope value. Types and constants use deep recursive structural keys (TypeKey,
// ConstKey); global values and functions are identified by linkage symbol; opaque
// target-specific composites such as sampler literals use OpaqueKey, whose equality is
// a full comparison of the opcode and the fully-resolved operand keys. The invariant the
// rest of the pipeline relies on: two structurally equal keys recorded by different
// functions resolve to the same GlobalId after hoisting. Keys are produced by the
// instruction selector while it emits the per-function streams, so they can reference
// each other recursively without ever naming a local id.

//! Canonical identities for module-scope entities.

use std::fmt;

use crate::operands::StorageClass;

/// Coarse entity kind, driving alias-allocation order.
///
/// Opaque composites are aliased and hoisted with the constants; the producers
/// we model only use the opaque path for constant-like values (sampler
/// literals, combined image handles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Type,
    Constant,
    GlobalValue,
    Function,
}

/// Canonical identity of one dedup-eligible module-scope value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Type(TypeKey),
    Constant(ConstKey),
    GlobalValue { symbol: String },
    Function { symbol: String },
    Opaque(OpaqueKey),
}

impl EntityKey {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityKey::Type(_) => EntityKind::Type,
            EntityKey::Constant(_) | EntityKey::Opaque(_) => EntityKind::Constant,
            EntityKey::GlobalValue { .. } => EntityKind::GlobalValue,
            EntityKey::Function { .. } => EntityKind::Function,
        }
    }

    pub fn global_value(symbol: impl Into<String>) -> Self {
        EntityKey::GlobalValue { symbol: symbol.into() }
    }

    pub fn function(symbol: impl Into<String>) -> Self {
        EntityKey::Function { symbol: symbol.into() }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Type(t) => write!(f, "type {t}"),
            EntityKey::Constant(c) => write!(f, "constant {c}"),
            EntityKey::GlobalValue { symbol } => write!(f, "global `{symbol}`"),
            EntityKey::Function { symbol } => write!(f, "function `{symbol}`"),
            EntityKey::Opaque(o) => write!(f, "opaque {}", o.opcode),
        }
    }
}

/// Deep structural key of a type declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Void,
    Bool,
    Int { width: u32, signed: bool },
    Float { width: u32 },
    Vector { elem: Box<TypeKey>, len: u32 },
    Matrix { column: Box<TypeKey>, cols: u32 },
    Array { elem: Box<TypeKey>, len: u64 },
    RuntimeArray { elem: Box<TypeKey> },
    Struct { members: Vec<TypeKey> },
    Pointer { storage: StorageClass, pointee: Box<TypeKey> },
    /// Placeholder for a self-referential pointer; `tag` names the struct the
    /// placeholder will eventually point to.
    ForwardPointer { storage: StorageClass, tag: String },
    Function { ret: Box<TypeKey>, params: Vec<TypeKey> },
    Sampler,
    SampledImage { image: Box<TypeKey> },
    Image { sampled: Box<TypeKey>, dim: u32, depth: u32, arrayed: u32, ms: u32, usage: u32, format: u32 },
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKey::Void => write!(f, "void"),
            TypeKey::Bool => write!(f, "bool"),
            TypeKey::Int { width, signed: true } => write!(f, "i{width}"),
            TypeKey::Int { width, signed: false } => write!(f, "u{width}"),
            TypeKey::Float { width } => write!(f, "f{width}"),
            TypeKey::Vector { elem, len } => write!(f, "vec{len}<{elem}>"),
            TypeKey::Matrix { column, cols } => write!(f, "mat{cols}<{column}>"),
            TypeKey::Array { elem, len } => write!(f, "[{elem}; {len}]"),
            TypeKey::RuntimeArray { elem } => write!(f, "[{elem}]"),
            TypeKey::Struct { members } => {
                write!(f, "struct{{")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{m}")?;
                }
                write!(f, "}}")
            }
            TypeKey::Pointer { storage, pointee } => write!(f, "*{storage} {pointee}"),
            TypeKey::ForwardPointer { storage, tag } => write!(f, "*{storage} fwd({tag})"),
            TypeKey::Function { ret, params } => {
                write!(f, "fn(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
            TypeKey::Sampler => write!(f, "sampler"),
            TypeKey::SampledImage { image } => write!(f, "sampled_image<{image}>"),
            TypeKey::Image { sampled, dim, .. } => write!(f, "image<{sampled}, dim{dim}>"),
        }
    }
}

/// Deep structural key of a constant declaration.
///
/// Float payloads are keyed by bit pattern, so equal constants hash equal and
/// NaN payloads still deduplicate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstKey {
    Bool { value: bool },
    Scalar { ty: Box<TypeKey>, bits: u64 },
    Null { ty: Box<TypeKey> },
    Composite { ty: Box<TypeKey>, members: Vec<ConstKey> },
}

impl fmt::Display for ConstKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstKey::Bool { value } => write!(f, "{value}"),
            ConstKey::Scalar { ty, bits } => write!(f, "{bits}: {ty}"),
            ConstKey::Null { ty } => write!(f, "null: {ty}"),
            ConstKey::Composite { ty, members } => write!(f, "composite[{}]: {ty}", members.len()),
        }
    }
}

/// Key of an opaque target-specific composite.
///
/// Equality is the bespoke comparison the dedup group performs: same opcode
/// word, same fully-resolved operand keys, position by position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpaqueKey {
    /// Raw opcode word; groups are formed per opcode.
    pub opcode: u16,
    pub operands: Vec<OperandKey>,
}

/// One resolved operand inside an [`OpaqueKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperandKey {
    Int(u64),
    /// Float payload by bit pattern.
    Float(u64),
    Str(String),
    Entity(Box<EntityKey>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_key() -> TypeKey {
        TypeKey::Int { width: 32, signed: false }
    }

    #[test]
    fn test_structural_equality_is_deep() {
        let a = TypeKey::Pointer {
            storage: StorageClass::Private,
            pointee: Box::new(TypeKey::Vector { elem: Box::new(u32_key()), len: 4 }),
        };
        let b = TypeKey::Pointer {
            storage: StorageClass::Private,
            pointee: Box::new(TypeKey::Vector { elem: Box::new(u32_key()), len: 4 }),
        };
        assert_eq!(a, b);

        let c = TypeKey::Pointer {
            storage: StorageClass::Input,
            pointee: Box::new(TypeKey::Vector { elem: Box::new(u32_key()), len: 4 }),
        };
        assert_ne!(a, c);
    }

    #[test]
    fn test_kind_routing() {
        assert_eq!(EntityKey::Type(TypeKey::Void).kind(), EntityKind::Type);
        assert_eq!(
            EntityKey::Opaque(OpaqueKey { opcode: 45, operands: vec![] }).kind(),
            EntityKind::Constant
        );
        assert_eq!(EntityKey::function("memset").kind(), EntityKind::Function);
    }

    #[test]
    fn test_opaque_equality_compares_operands() {
        let a = OpaqueKey { opcode: 45, operands: vec![OperandKey::Int(0), OperandKey::Int(1)] };
        let b = OpaqueKey { opcode: 45, operands: vec![OperandKey::Int(0), OperandKey::Int(1)] };
        let c = OpaqueKey { opcode: 45, operands: vec![OperandKey::Int(0), OperandKey::Int(2)] };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_display_names() {
        let key = EntityKey::Type(TypeKey::Function {
            ret: Box::new(TypeKey::Void),
            params: vec![u32_key()],
        });
        assert_eq!(key.to_string(), "type fn(u32) -> void");
    }
}
