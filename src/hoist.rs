// This module implements the global hoisting engine. Phase one pre-allocates global
// ids: one per distinct entity in kind order (types, constants and opaque composites,
// global values, then functions, which get an id block covering the declaration plus
// its parameters), aliasing every (function, local) occurrence before anything moves.
// Phase two physically copies each defining instruction exactly once per distinct id,
// walking the registry in first-record order so referenced entities land before their
// referencers, rewriting the result and every id operand through the alias table; a
// missing alias during rewriting is a fatal dependency-order violation. Function
// declarations hoist as a short run closed by a synthesized end marker. The final
// sub-phase runs only after global numbering: it extracts naming, entry-point,
// execution-mode, decoration, spec-constant, debug-string, module-processed, import
// and memory-model instructions from the streams, deduplicating by structural
// comparison of the fully resolved copies, and strips embedded capability/extension
// requests entirely.

//! Entity hoisting and module-scope extraction.

use std::mem;

use crate::alias::AliasTable;
use crate::assemble::{Assembler, StreamState};
use crate::entity::{EntityKey, EntityKind};
use crate::error::{AssembleError, AssembleResult};
use crate::inst::{ExtractClass, Id, Instruction, LocalId, Opcode, Operand};
use crate::operands::{Decoration, StorageClass};
use crate::registry::EntityRegistry;
use crate::section::ModuleSection;
use crate::target::Target;

/// Rewrite one id through the alias table, leaving globals untouched.
fn resolve_id(id: Id, aliases: &AliasTable, context: &'static str) -> AssembleResult<Id> {
    match id {
        Id::Local(local) => Ok(Id::Global(aliases.resolve(local, context)?)),
        global @ Id::Global(_) => Ok(global),
    }
}

/// Copy an instruction with its result and every id operand rewritten to the
/// global space.
pub(crate) fn rewrite(
    inst: &Instruction,
    aliases: &AliasTable,
    context: &'static str,
) -> AssembleResult<Instruction> {
    let mut out = inst.clone();
    out.result = match out.result {
        Some(id) => Some(resolve_id(id, aliases, context)?),
        None => None,
    };
    for op in &mut out.operands {
        match op {
            Operand::IdRef(id) => *id = resolve_id(*id, aliases, context)?,
            Operand::BlockRef(id) => *id = resolve_id(*id, aliases, context)?,
            _ => {}
        }
    }
    Ok(out)
}

/// Shape of a function declaration run inside a stream.
pub(crate) struct DeclRun {
    pub(crate) start: usize,
    /// Parameter local indices, in order.
    pub(crate) params: Vec<u32>,
    /// Position of a trailing end marker, if the producer emitted one.
    pub(crate) end: Option<usize>,
}

impl<'s, 'arena, T: Target> Assembler<'s, 'arena, T> {
    /// Pre-allocate one global id per distinct entity and alias every
    /// occurrence, before any instruction moves.
    pub(crate) fn build_aliases(&mut self) -> AssembleResult<()> {
        let registry = mem::take(&mut self.registry);
        let result = self.build_aliases_inner(&registry);
        self.registry = registry;
        result
    }

    fn build_aliases_inner(&mut self, registry: &EntityRegistry) -> AssembleResult<()> {
        // Types, constants and global values may cross-reference each other;
        // functions may reference any of them, so they alias last.
        for kind in [EntityKind::Type, EntityKind::Constant, EntityKind::GlobalValue] {
            for entry in registry.entries_of_kind(kind) {
                let gid = self.fresh_id();
                for &(func, local) in entry.occurrences() {
                    self.aliases.define(LocalId::new(func, local), gid)?;
                }
            }
        }

        for entry in registry.entries_of_kind(EntityKind::Function) {
            let (first_func, first_local) = entry.first();
            let shape = self.decl_run(first_func, first_local)?;
            let mut block = Vec::with_capacity(shape.params.len() + 1);
            for _ in 0..=shape.params.len() {
                block.push(self.fresh_id());
            }
            for &(func, local) in entry.occurrences() {
                let run = self.decl_run(func, local)?;
                if run.params.len() != shape.params.len() {
                    return Err(AssembleError::MalformedFunction {
                        func,
                        reason: format!(
                            "declaration of {} has {} parameters, another occurrence has {}",
                            entry.key,
                            run.params.len(),
                            shape.params.len()
                        ),
                    });
                }
                self.aliases
                    .define(LocalId::new(func, local), block[0])?;
                for (i, &param) in run.params.iter().enumerate() {
                    self.aliases
                        .define(LocalId::new(func, param), block[i + 1])?;
                }
            }
        }

        log::debug!("alias table built: {} pre-aliased ids", self.aliases.len());
        Ok(())
    }

    /// Walk a declaration run: one OpFunction, its parameters, and an optional
    /// end marker emitted by the producer.
    pub(crate) fn decl_run(&self, func: u32, local: u32) -> AssembleResult<DeclRun> {
        let stream = &self.streams[func as usize];
        let start = *stream.defs.get(&local).ok_or_else(|| AssembleError::MalformedFunction {
            func,
            reason: format!("no defining instruction for local %{local}"),
        })?;
        if stream.insts[start].opcode != Opcode::Function {
            return Err(AssembleError::MalformedFunction {
                func,
                reason: format!(
                    "recorded function entity defined by {}, expected OpFunction",
                    stream.insts[start].opcode
                ),
            });
        }
        let mut params = Vec::new();
        let mut pos = start + 1;
        while pos < stream.insts.len() && stream.insts[pos].opcode == Opcode::FunctionParameter {
            match stream.insts[pos].result {
                Some(Id::Local(l)) => params.push(l.index),
                _ => {
                    return Err(AssembleError::MalformedFunction {
                        func,
                        reason: "parameter declaration without a local result".to_string(),
                    })
                }
            }
            pos += 1;
        }
        let end = (pos < stream.insts.len() && stream.insts[pos].opcode == Opcode::FunctionEnd)
            .then_some(pos);
        Ok(DeclRun { start, params, end })
    }

    /// Physically hoist types, constants, opaque composites and global values
    /// into the types/constants/variables section.
    ///
    /// First-record order is dependency order: every producer records an
    /// entity's dependencies before the entity itself, so walking entries in
    /// that order keeps referenced entities ahead of their referencers. Only
    /// the first-seen occurrence is copied; the rest share its id.
    pub(crate) fn hoist_entities(&mut self) -> AssembleResult<()> {
        let registry = mem::take(&mut self.registry);
        let result = self.hoist_entities_inner(&registry);
        self.registry = registry;
        result
    }

    fn hoist_entities_inner(&mut self, registry: &EntityRegistry) -> AssembleResult<()> {
        for entry in registry.entries() {
            if entry.key.kind() == EntityKind::Function {
                continue;
            }
            let (func, local) = entry.first();
            let pos = *self.streams[func as usize].defs.get(&local).ok_or_else(|| {
                AssembleError::MalformedFunction {
                    func,
                    reason: format!("no defining instruction for local %{local}"),
                }
            })?;
            let rewritten = rewrite(
                &self.streams[func as usize].insts[pos],
                &self.aliases,
                "hoisting a module entity",
            )?;
            if entry.key.kind() == EntityKind::GlobalValue {
                self.note_global_variable(&rewritten)?;
            }
            log::trace!("hoisted {} from function {func}", entry.key);
            self.sections
                .push(ModuleSection::TypesConstantsVariables, rewritten);
            for &(f, l) in entry.occurrences() {
                if let Some(&p) = self.streams[f as usize].defs.get(&l) {
                    self.streams[f as usize].taken[p] = true;
                }
            }
            self.session.record_entity_hoisted(entry.occurrences().len() - 1);
        }
        Ok(())
    }

    fn note_global_variable(&mut self, inst: &Instruction) -> AssembleResult<()> {
        if inst.opcode != Opcode::Variable {
            return Ok(());
        }
        let Some(Id::Global(gid)) = inst.result else {
            return Ok(());
        };
        let Some(&Operand::LitInt(word)) = inst.operands.get(1) else {
            return Ok(());
        };
        let storage = StorageClass::from_u32(word as u32).ok_or_else(|| {
            AssembleError::UnknownEnumerant {
                what: "storage class",
                value: word,
                opcode: inst.opcode.to_string(),
            }
        })?;
        self.global_vars.push((gid, storage));
        Ok(())
    }

    /// Hoist each distinct function declaration once, as a declaration run
    /// closed by a synthesized end marker.
    pub(crate) fn hoist_functions(&mut self) -> AssembleResult<()> {
        let registry = mem::take(&mut self.registry);
        let result = self.hoist_functions_inner(&registry);
        self.registry = registry;
        result
    }

    fn hoist_functions_inner(&mut self, registry: &EntityRegistry) -> AssembleResult<()> {
        for entry in registry.entries_of_kind(EntityKind::Function) {
            let (func, local) = entry.first();
            let run = self.decl_run(func, local)?;
            let mut hoisted = Vec::with_capacity(run.params.len() + 2);
            {
                let stream = &self.streams[func as usize];
                hoisted.push(rewrite(
                    &stream.insts[run.start],
                    &self.aliases,
                    "hoisting a function declaration",
                )?);
                for i in 0..run.params.len() {
                    hoisted.push(rewrite(
                        &stream.insts[run.start + 1 + i],
                        &self.aliases,
                        "hoisting a function parameter",
                    )?);
                }
            }
            hoisted.push(Instruction::no_result(Opcode::FunctionEnd, vec![]));

            if let EntityKey::Function { symbol } = &entry.key {
                if let Some(Id::Global(gid)) = hoisted[0].result {
                    let name = self.session.intern_str(symbol);
                    self.symbol_ids.entry(name).or_insert(gid);
                }
            }

            log::trace!(
                "hoisted {} as a {}-instruction declaration run",
                entry.key,
                hoisted.len()
            );
            for inst in hoisted {
                self.sections.push(ModuleSection::FunctionDeclarations, inst);
            }

            for &(f, l) in entry.occurrences() {
                let run = self.decl_run(f, l)?;
                let stream = &mut self.streams[f as usize];
                stream.taken[run.start] = true;
                for i in 0..run.params.len() {
                    stream.taken[run.start + 1 + i] = true;
                }
                if let Some(end) = run.end {
                    stream.taken[end] = true;
                }
            }
            self.session.record_entity_hoisted(entry.occurrences().len() - 1);
        }
        Ok(())
    }

    /// Post-numbering sub-phase: pull module-scope instructions whose operands
    /// reference non-entity registers out of the streams.
    ///
    /// These cannot hoist earlier because their operands only become global
    /// after numbering. Dedup is a direct structural comparison of the fully
    /// resolved copies.
    pub(crate) fn extract_module_scope(&mut self) -> AssembleResult<()> {
        let mut streams = mem::take(&mut self.streams);
        let result = self.extract_inner(&mut streams);
        self.streams = streams;
        result
    }

    fn extract_inner(
        &mut self,
        streams: &mut [StreamState],
    ) -> AssembleResult<()> {
        for stream in streams.iter_mut() {
            for pos in 0..stream.insts.len() {
                if stream.taken[pos] {
                    continue;
                }
                let Some(class) = stream.insts[pos].opcode.extract_class() else {
                    continue;
                };
                stream.taken[pos] = true;
                if class == ExtractClass::Requirement {
                    // Folded into the requirement set during numbering; the
                    // final sections are synthesized fresh, never copied.
                    continue;
                }
                let rewritten = rewrite(
                    &stream.insts[pos],
                    &self.aliases,
                    "extracting a module-scope instruction",
                )?;
                if class == ExtractClass::MemoryModel {
                    match self.memory_model.take() {
                        None => self.memory_model = Some(rewritten),
                        Some(existing) => {
                            if existing != rewritten {
                                log::warn!(
                                    "conflicting memory-model declarations; keeping the first"
                                );
                            }
                            self.memory_model = Some(existing);
                        }
                    }
                    continue;
                }
                let section = match class {
                    ExtractClass::DebugString => ModuleSection::DebugStrings,
                    ExtractClass::DebugName => ModuleSection::DebugNames,
                    ExtractClass::ModuleProcessed => ModuleSection::ModuleProcessed,
                    ExtractClass::EntryPoint => ModuleSection::EntryPoints,
                    ExtractClass::ExecutionMode => ModuleSection::ExecutionModes,
                    ExtractClass::Annotation => ModuleSection::Annotations,
                    ExtractClass::SpecConstant => ModuleSection::TypesConstantsVariables,
                    ExtractClass::ExtImport => ModuleSection::ExtInstImports,
                    ExtractClass::MemoryModel | ExtractClass::Requirement => unreachable!(),
                };
                if class == ExtractClass::Annotation {
                    self.note_linkage_symbol(&rewritten);
                }
                if self.sections.contains(section, &rewritten) {
                    log::trace!("folded duplicate {} in {section}", rewritten.opcode);
                    continue;
                }
                self.sections.push(section, rewritten);
            }
        }

        // Whatever the module-data pseudo-function still holds was synthesized
        // at module scope and belongs with the types/constants/variables.
        let data = &mut streams[0];
        for pos in 0..data.insts.len() {
            if data.taken[pos] {
                continue;
            }
            let rewritten = rewrite(
                &data.insts[pos],
                &self.aliases,
                "placing module-data instructions",
            )?;
            data.taken[pos] = true;
            self.sections
                .push(ModuleSection::TypesConstantsVariables, rewritten);
        }
        Ok(())
    }

    /// Record `name -> id` for imported-symbol annotations.
    fn note_linkage_symbol(&mut self, inst: &Instruction) {
        if inst.opcode != Opcode::Decorate {
            return;
        }
        let Some(&Operand::LitInt(word)) = inst.operands.get(1) else {
            return;
        };
        if Decoration::from_u32(word as u32) != Some(Decoration::LinkageAttributes) {
            return;
        }
        let Some(Operand::LitString(name)) = inst.operands.get(2) else {
            return;
        };
        let Some(&Operand::IdRef(Id::Global(gid))) = inst.operands.first() else {
            return;
        };
        let interned = self.session.intern_str(name);
        self.symbol_ids.entry(interned).or_insert(gid);
    }
}
