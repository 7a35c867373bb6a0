// This module defines the Assembler, the per-run orchestrator that owns every piece of
// assembly state: the input streams, the entity registry, the alias table, the running
// requirement set, the section lists, and the id counter. One Assembler serves exactly
// one module; constructing a fresh instance per run is what makes repeated invocation
// safe. The pipeline is fixed: pre-alias entities, hoist them, number everything that
// remains, extract the late module-scope instructions, emit function bodies (rewriting
// symbolic calls through the name map built from declarations, definitions and
// imported-symbol annotations), then finish: apply the linkage policy for entry-point-
// free modules, synthesize a memory model if none arrived, augment entry points with
// their interface operands, gate on requirement satisfiability, synthesize the
// capability/extension sections from the resolved set, and stamp the header.

//! The assembly pipeline.
//!
//! ```text
//! per-function streams + registry
//!   -> build_aliases      (ids reserved, nothing moves)
//!   -> hoist_entities     (types/constants/globals -> one copy each)
//!   -> hoist_functions    (declaration runs, shared id blocks)
//!   -> number_streams     (every remaining register, fixed order)
//!   -> extract            (debug/annotation/entry-point/... sweep)
//!   -> emit bodies        (renumbered, symbolic calls resolved)
//!   -> finish             (policies, satisfiability, header)
//! ```

use std::collections::HashMap;

use crate::alias::AliasTable;
use crate::error::{AssembleError, AssembleResult};
use crate::hoist::rewrite;
use crate::inst::{GlobalId, Id, Instruction, ModuleInput, Opcode, Operand, MODULE_DATA_FUNC};
use crate::operands::{AddressingModel, MemoryModelKind, StorageClass};
use crate::registry::EntityRegistry;
use crate::require::{requirements_of, Capability, RequirementSet};
use crate::section::{
    AssembledModule, ModuleHeader, ModuleSection, SectionLists, GENERATOR_ID, MAGIC_NUMBER,
};
use crate::session::AssemblySession;
use crate::target::{Target, Version};

/// Assemble one module in a single call.
pub fn assemble<'arena, T: Target>(
    session: &AssemblySession<'arena>,
    target: &T,
    input: ModuleInput,
) -> AssembleResult<AssembledModule> {
    Assembler::new(session, target, input)?.assemble()
}

/// One input stream plus the bookkeeping the passes share.
#[derive(Debug)]
pub(crate) struct StreamState {
    pub(crate) name: String,
    pub(crate) insts: Vec<Instruction>,
    /// Instructions already moved (or stripped) by an earlier pass.
    pub(crate) taken: Vec<bool>,
    /// Local index -> position of the defining instruction.
    pub(crate) defs: HashMap<u32, usize>,
}

impl StreamState {
    fn build(func: u32, name: String, insts: Vec<Instruction>) -> AssembleResult<Self> {
        let mut defs = HashMap::new();
        for (pos, inst) in insts.iter().enumerate() {
            if let Some(Id::Local(local)) = inst.result {
                if local.func != func {
                    return Err(AssembleError::MalformedFunction {
                        func,
                        reason: format!("result {local} does not belong to this stream"),
                    });
                }
                if defs.insert(local.index, pos).is_some() {
                    return Err(AssembleError::LocalRedefined { func, index: local.index });
                }
            }
        }
        Ok(Self { name, taken: vec![false; insts.len()], insts, defs })
    }
}

/// Per-module assembly state and pipeline driver.
///
/// All shared state lives here and nowhere else; a fresh instance is required
/// per module and is consumed by [`Assembler::assemble`].
#[derive(Debug)]
pub struct Assembler<'s, 'arena, T: Target> {
    pub(crate) session: &'s AssemblySession<'arena>,
    pub(crate) target: &'s T,
    /// Stream 0 is the reserved module-data pseudo-function.
    pub(crate) streams: Vec<StreamState>,
    pub(crate) registry: EntityRegistry,
    pub(crate) aliases: AliasTable,
    pub(crate) requirements: RequirementSet,
    pub(crate) sections: SectionLists,
    pub(crate) next_id: GlobalId,
    /// Extended-instruction-set imports by literal name.
    pub(crate) import_ids: HashMap<&'arena str, GlobalId>,
    /// Debug strings by content.
    pub(crate) string_ids: HashMap<&'arena str, GlobalId>,
    /// Linkage name -> id, from declarations, definitions and annotations.
    pub(crate) symbol_ids: HashMap<&'arena str, GlobalId>,
    /// Hoisted module-scope variables and their storage kinds.
    pub(crate) global_vars: Vec<(GlobalId, StorageClass)>,
    /// Memory-model instruction found in a stream, if any.
    pub(crate) memory_model: Option<Instruction>,
}

impl<'s, 'arena, T: Target> Assembler<'s, 'arena, T> {
    pub fn new(
        session: &'s AssemblySession<'arena>,
        target: &'s T,
        input: ModuleInput,
    ) -> AssembleResult<Self> {
        let ModuleInput { module_data, functions, registry } = input;
        let mut streams = Vec::with_capacity(functions.len() + 1);
        streams.push(StreamState::build(
            MODULE_DATA_FUNC,
            "<module-data>".to_string(),
            module_data,
        )?);
        for (i, function) in functions.into_iter().enumerate() {
            streams.push(StreamState::build(i as u32 + 1, function.name, function.insts)?);
        }
        session.record_functions_merged(streams.len() - 1);
        log::debug!("assembling module from {} function streams", streams.len() - 1);
        Ok(Self {
            session,
            target,
            streams,
            registry,
            aliases: AliasTable::new(),
            requirements: RequirementSet::new(),
            sections: SectionLists::new(),
            next_id: 1,
            import_ids: HashMap::new(),
            string_ids: HashMap::new(),
            symbol_ids: HashMap::new(),
            global_vars: Vec::new(),
            memory_model: None,
        })
    }

    /// Run the full pipeline, consuming the assembler.
    pub fn assemble(mut self) -> AssembleResult<AssembledModule> {
        self.build_aliases()?;
        self.hoist_entities()?;
        self.hoist_functions()?;
        self.number_streams()?;
        self.extract_module_scope()?;
        self.emit_function_bodies()?;
        self.finish()
    }

    /// Next unused global id.
    pub(crate) fn fresh_id(&mut self) -> GlobalId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Emit every function body: the renumbered instructions that survived
    /// hoisting and extraction, in declaration order.
    pub(crate) fn emit_function_bodies(&mut self) -> AssembleResult<()> {
        let mut streams = std::mem::take(&mut self.streams);
        let result = self.emit_bodies_inner(&mut streams);
        self.streams = streams;
        result
    }

    fn emit_bodies_inner(&mut self, streams: &mut [StreamState]) -> AssembleResult<()> {
        // Register each definition under its linkage name first, so calls
        // between the merged functions resolve regardless of order.
        for stream in streams.iter().skip(1) {
            for (pos, inst) in stream.insts.iter().enumerate() {
                if stream.taken[pos] || inst.opcode != Opcode::Function {
                    continue;
                }
                if let Some(Id::Local(local)) = inst.result {
                    let gid = self.aliases.resolve(local, "registering a function definition")?;
                    let interned = self.session.intern_str(&stream.name);
                    self.symbol_ids.entry(interned).or_insert(gid);
                }
                break;
            }
        }

        for stream in streams.iter_mut().skip(1) {
            for pos in 0..stream.insts.len() {
                if stream.taken[pos] {
                    continue;
                }
                let mut rewritten =
                    rewrite(&stream.insts[pos], &self.aliases, "emitting a function body")?;
                if rewritten.opcode == Opcode::FunctionCall {
                    self.resolve_callee(&mut rewritten)?;
                }
                stream.taken[pos] = true;
                self.sections.push(ModuleSection::FunctionDefinitions, rewritten);
            }
        }
        Ok(())
    }

    /// Rewrite a symbolic callee operand through the name map.
    fn resolve_callee(&self, inst: &mut Instruction) -> AssembleResult<()> {
        let Some(op) = inst.operands.get_mut(1) else {
            return Ok(());
        };
        let Operand::LitString(name) = op else {
            return Ok(());
        };
        let gid = self.lookup_symbol(name)?;
        *op = Operand::IdRef(Id::Global(gid));
        Ok(())
    }

    /// Exact lookup, then a best-effort overload heuristic: a unique candidate
    /// matching by prefix or suffix.
    fn lookup_symbol(&self, name: &str) -> AssembleResult<GlobalId> {
        if let Some(&gid) = self.symbol_ids.get(name) {
            return Ok(gid);
        }
        let candidates: Vec<(&str, GlobalId)> = self
            .symbol_ids
            .iter()
            .filter(|(key, _)| key.starts_with(name) || key.ends_with(name))
            .map(|(&key, &gid)| (key, gid))
            .collect();
        if candidates.len() == 1 {
            let (key, gid) = candidates[0];
            log::debug!("resolved call to `{name}` via overload heuristic as `{key}`");
            return Ok(gid);
        }
        Err(AssembleError::UnresolvedCallee { name: name.to_string() })
    }

    fn finish(mut self) -> AssembleResult<AssembledModule> {
        // A module exporting nothing runnable is a library: it participates in
        // linking even when no stream asked for that.
        if self.sections.list(ModuleSection::EntryPoints).is_empty() {
            log::debug!("no entry points; requiring the linkage capability");
            self.requirements.add_capability(Capability::Linkage);
        }

        let memory_model = match self.memory_model.take() {
            Some(inst) => inst,
            None => self.synthesize_memory_model()?,
        };
        self.sections.push(ModuleSection::MemoryModel, memory_model);

        self.augment_entry_points();

        // The one satisfiability gate: nothing is returned past a failure.
        self.requirements.check_satisfiable(self.target)?;

        let caps: Vec<Capability> = self.requirements.minimal().to_vec();
        for cap in caps {
            self.sections.push(
                ModuleSection::Capabilities,
                Instruction::no_result(Opcode::Capability, vec![Operand::LitInt(cap.code() as u64)]),
            );
        }
        let exts: Vec<String> = self.requirements.extensions().map(str::to_string).collect();
        for ext in exts {
            self.sections.push(
                ModuleSection::Extensions,
                Instruction::no_result(Opcode::Extension, vec![Operand::string(ext)]),
            );
        }

        let header = ModuleHeader {
            magic: MAGIC_NUMBER,
            version: self.target.version(),
            generator: GENERATOR_ID,
            bound: self.next_id,
            schema: 0,
        };
        self.session.record_ids_assigned((self.next_id - 1) as usize);
        self.session.record_module_assembled(self.sections.total_len());
        Ok(AssembledModule { header, sections: self.sections })
    }

    /// Build a memory-model instruction from the target and the observed
    /// capability profile when no stream declared one.
    fn synthesize_memory_model(&mut self) -> AssembleResult<Instruction> {
        let addressing = if self.requirements.includes(Capability::Addresses) {
            match self.target.pointer_width() {
                32 => AddressingModel::Physical32,
                _ => AddressingModel::Physical64,
            }
        } else {
            AddressingModel::Logical
        };
        let memory = if self.requirements.includes(Capability::Kernel) {
            MemoryModelKind::OpenCl
        } else if self.requirements.includes(Capability::Shader) {
            MemoryModelKind::Glsl450
        } else {
            MemoryModelKind::Simple
        };
        let inst = Instruction::no_result(
            Opcode::MemoryModel,
            vec![
                Operand::LitInt(addressing.code() as u64),
                Operand::LitInt(memory.code() as u64),
            ],
        );
        self.requirements.fold(requirements_of(&inst)?);
        Ok(inst)
    }

    /// Append the qualifying module-scope variables to every entry point.
    ///
    /// Below the 1.4 interface threshold only Input/Output storage qualifies;
    /// from 1.4 on, every module-scope storage kind in use does.
    fn augment_entry_points(&mut self) {
        let wide = self.target.version() >= Version::V1_4;
        let vars = &self.global_vars;
        for entry in self.sections.list_mut(ModuleSection::EntryPoints) {
            for &(gid, storage) in vars {
                let qualifies = if wide {
                    storage != StorageClass::Function
                } else {
                    matches!(storage, StorageClass::Input | StorageClass::Output)
                };
                if !qualifies {
                    continue;
                }
                let operand = Operand::IdRef(Id::Global(gid));
                if !entry.operands.contains(&operand) {
                    entry.operands.push(operand);
                }
            }
        }
    }
}
