// This module models the enumerated operand values the assembler has to understand:
// storage classes, execution models, addressing and memory models, execution modes,
// decorations, and linkage types. Each enum mirrors the public binary enumerant
// numbering and offers from_u32 decoding. Decoding is deliberately partial: values the
// assembler does not know decode to None, which callers turn into a fatal error when a
// requirement derivation or section-assembly rule depends on the value, or into a
// display placeholder when the value is only being printed. Keeping these decoders in
// one place means the requirement resolver and the section assembler agree on what is
// known and what is not.

//! Enumerated operand values and their decoders.

use std::fmt;

/// Storage class of a pointer or variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageClass {
    UniformConstant,
    Input,
    Uniform,
    Output,
    Workgroup,
    CrossWorkgroup,
    Private,
    Function,
    Generic,
    PushConstant,
    AtomicCounter,
    Image,
    StorageBuffer,
}

impl StorageClass {
    pub fn from_u32(word: u32) -> Option<Self> {
        Some(match word {
            0 => StorageClass::UniformConstant,
            1 => StorageClass::Input,
            2 => StorageClass::Uniform,
            3 => StorageClass::Output,
            4 => StorageClass::Workgroup,
            5 => StorageClass::CrossWorkgroup,
            6 => StorageClass::Private,
            7 => StorageClass::Function,
            8 => StorageClass::Generic,
            9 => StorageClass::PushConstant,
            10 => StorageClass::AtomicCounter,
            11 => StorageClass::Image,
            12 => StorageClass::StorageBuffer,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        match self {
            StorageClass::UniformConstant => 0,
            StorageClass::Input => 1,
            StorageClass::Uniform => 2,
            StorageClass::Output => 3,
            StorageClass::Workgroup => 4,
            StorageClass::CrossWorkgroup => 5,
            StorageClass::Private => 6,
            StorageClass::Function => 7,
            StorageClass::Generic => 8,
            StorageClass::PushConstant => 9,
            StorageClass::AtomicCounter => 10,
            StorageClass::Image => 11,
            StorageClass::StorageBuffer => 12,
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageClass::UniformConstant => "UniformConstant",
            StorageClass::Input => "Input",
            StorageClass::Uniform => "Uniform",
            StorageClass::Output => "Output",
            StorageClass::Workgroup => "Workgroup",
            StorageClass::CrossWorkgroup => "CrossWorkgroup",
            StorageClass::Private => "Private",
            StorageClass::Function => "Function",
            StorageClass::Generic => "Generic",
            StorageClass::PushConstant => "PushConstant",
            StorageClass::AtomicCounter => "AtomicCounter",
            StorageClass::Image => "Image",
            StorageClass::StorageBuffer => "StorageBuffer",
        };
        f.write_str(name)
    }
}

/// Execution model named by an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionModel {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    GlCompute,
    Kernel,
}

impl ExecutionModel {
    pub fn from_u32(word: u32) -> Option<Self> {
        Some(match word {
            0 => ExecutionModel::Vertex,
            1 => ExecutionModel::TessellationControl,
            2 => ExecutionModel::TessellationEvaluation,
            3 => ExecutionModel::Geometry,
            4 => ExecutionModel::Fragment,
            5 => ExecutionModel::GlCompute,
            6 => ExecutionModel::Kernel,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        match self {
            ExecutionModel::Vertex => 0,
            ExecutionModel::TessellationControl => 1,
            ExecutionModel::TessellationEvaluation => 2,
            ExecutionModel::Geometry => 3,
            ExecutionModel::Fragment => 4,
            ExecutionModel::GlCompute => 5,
            ExecutionModel::Kernel => 6,
        }
    }
}

/// Addressing model declared by the memory-model instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingModel {
    Logical,
    Physical32,
    Physical64,
}

impl AddressingModel {
    pub fn from_u32(word: u32) -> Option<Self> {
        Some(match word {
            0 => AddressingModel::Logical,
            1 => AddressingModel::Physical32,
            2 => AddressingModel::Physical64,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        match self {
            AddressingModel::Logical => 0,
            AddressingModel::Physical32 => 1,
            AddressingModel::Physical64 => 2,
        }
    }
}

/// Memory model declared by the memory-model instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryModelKind {
    Simple,
    Glsl450,
    OpenCl,
    Vulkan,
}

impl MemoryModelKind {
    pub fn from_u32(word: u32) -> Option<Self> {
        Some(match word {
            0 => MemoryModelKind::Simple,
            1 => MemoryModelKind::Glsl450,
            2 => MemoryModelKind::OpenCl,
            3 => MemoryModelKind::Vulkan,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        match self {
            MemoryModelKind::Simple => 0,
            MemoryModelKind::Glsl450 => 1,
            MemoryModelKind::OpenCl => 2,
            MemoryModelKind::Vulkan => 3,
        }
    }
}

/// Execution modes the requirement resolver understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionModeKind {
    Invocations,
    OriginUpperLeft,
    OriginLowerLeft,
    LocalSize,
    LocalSizeHint,
    VecTypeHint,
    ContractionOff,
}

impl ExecutionModeKind {
    pub fn from_u32(word: u32) -> Option<Self> {
        Some(match word {
            0 => ExecutionModeKind::Invocations,
            7 => ExecutionModeKind::OriginUpperLeft,
            8 => ExecutionModeKind::OriginLowerLeft,
            17 => ExecutionModeKind::LocalSize,
            18 => ExecutionModeKind::LocalSizeHint,
            30 => ExecutionModeKind::VecTypeHint,
            31 => ExecutionModeKind::ContractionOff,
            _ => return None,
        })
    }
}

/// Decorations the assembler inspects.
///
/// Only a subset matters here: linkage attributes feed the symbol map and the
/// Linkage capability; everything else is carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decoration {
    RelaxedPrecision,
    SpecId,
    Block,
    ArrayStride,
    BuiltIn,
    Constant,
    Location,
    Binding,
    DescriptorSet,
    Offset,
    LinkageAttributes,
}

impl Decoration {
    pub fn from_u32(word: u32) -> Option<Self> {
        Some(match word {
            0 => Decoration::RelaxedPrecision,
            1 => Decoration::SpecId,
            2 => Decoration::Block,
            6 => Decoration::ArrayStride,
            11 => Decoration::BuiltIn,
            22 => Decoration::Constant,
            30 => Decoration::Location,
            33 => Decoration::Binding,
            34 => Decoration::DescriptorSet,
            35 => Decoration::Offset,
            41 => Decoration::LinkageAttributes,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        match self {
            Decoration::RelaxedPrecision => 0,
            Decoration::SpecId => 1,
            Decoration::Block => 2,
            Decoration::ArrayStride => 6,
            Decoration::BuiltIn => 11,
            Decoration::Constant => 22,
            Decoration::Location => 30,
            Decoration::Binding => 33,
            Decoration::DescriptorSet => 34,
            Decoration::Offset => 35,
            Decoration::LinkageAttributes => 41,
        }
    }
}

/// Linkage type carried by a LinkageAttributes decoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkageType {
    Export,
    Import,
}

impl LinkageType {
    pub fn from_u32(word: u32) -> Option<Self> {
        Some(match word {
            0 => LinkageType::Export,
            1 => LinkageType::Import,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        match self {
            LinkageType::Export => 0,
            LinkageType::Import => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_class_roundtrip() {
        for word in 0..=12 {
            let sc = StorageClass::from_u32(word).unwrap();
            assert_eq!(sc.code(), word);
        }
        assert!(StorageClass::from_u32(99).is_none());
    }

    #[test]
    fn test_execution_model_decode() {
        assert_eq!(ExecutionModel::from_u32(6), Some(ExecutionModel::Kernel));
        assert_eq!(ExecutionModel::from_u32(4), Some(ExecutionModel::Fragment));
        assert!(ExecutionModel::from_u32(42).is_none());
    }

    #[test]
    fn test_decoration_decode_sparse() {
        assert_eq!(Decoration::from_u32(41), Some(Decoration::LinkageAttributes));
        assert!(Decoration::from_u32(3).is_none());
    }
}
