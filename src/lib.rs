//! spvlink - module assembly for a SPIR-V-shaped binary IR.
//!
//! This crate is the stage between instruction selection and byte-level
//! serialization. Instructions arrive per independently compiled function,
//! each function with its own zero-based local id space and each re-emitting
//! the module-scope instructions it depends on (type declarations, constants,
//! capability requests). The assembler merges those id spaces into one global
//! space, deduplicates repeated entities, orders everything into the fixed
//! logical sections, and reduces the accumulated capability/extension/version
//! requirements to a minimal set the target must satisfy.
//!
//! # Primary Usage
//!
//! ```ignore
//! use bumpalo::Bump;
//! use spvlink::{assemble, AssemblySession, ModuleInput, TargetEnv, Version};
//!
//! let arena = Bump::new();
//! let session = AssemblySession::new(&arena);
//! let target = TargetEnv::new(Version::V1_0);
//!
//! let mut input = ModuleInput::new();
//! // ... instruction selection fills the streams and the registry ...
//! let module = assemble(&session, &target, input)?;
//! ```
//!
//! # Pipeline
//!
//! ```text
//! streams + registry -> aliases -> hoist -> number -> extract -> bodies -> finish
//! ```
//!
//! - [`registry`] - which local register defines which canonical entity
//! - [`alias`] - the local-to-global id map, immutable once written
//! - [`require`] - capability/extension/version lattice and satisfiability
//! - [`assemble`] - the per-run orchestrator and body emission
//! - [`section`] - fixed section order, header, assembled output

pub mod alias;
pub mod assemble;
pub mod entity;
pub mod error;
pub mod inst;
pub mod operands;
pub mod registry;
pub mod require;
pub mod section;
pub mod session;
pub mod target;

mod hoist;
mod number;

pub use alias::AliasTable;
pub use assemble::{assemble, Assembler};
pub use entity::{ConstKey, EntityKey, EntityKind, OpaqueKey, OperandKey, TypeKey};
pub use error::{AssembleError, AssembleResult, UnsatisfiableReport};
pub use inst::{
    FunctionStream, GlobalId, Id, Instruction, LocalId, ModuleInput, Opcode, Operand,
    MODULE_DATA_FUNC,
};
pub use operands::{
    AddressingModel, Decoration, ExecutionModeKind, ExecutionModel, LinkageType,
    MemoryModelKind, StorageClass,
};
pub use registry::EntityRegistry;
pub use require::{Capability, RequirementSet};
pub use section::{AssembledModule, ModuleHeader, ModuleSection, GENERATOR_ID, MAGIC_NUMBER};
pub use session::{AssemblySession, AssemblyStats};
pub use target::{Target, TargetEnv, Version};
