// This module implements global numbering, the pass that assigns a global id to every
// local register the alias-table builder did not pre-alias. Processing order is fixed
// and is what makes the output reproducible: the reserved module-data pseudo-function
// first, then each real function in declaration order, instructions in original order,
// result first and then operands left to right; any identity without an alias receives
// the next unused global id. Forward references inside a function (branch targets,
// interface lists) resolve naturally because the first sight of a reference allocates
// the id the later definition then reuses. Extended-instruction-set imports and debug
// strings are keyed by their literal name at first sight, so every re-emission across
// functions shares one id and the later extraction sweep folds the copies. Requirement
// derivation also runs here, once per instruction at first observation.

//! Global numbering of the remaining local registers.

use std::mem;

use crate::assemble::{Assembler, StreamState};
use crate::error::AssembleResult;
use crate::inst::{Id, Instruction, LocalId, Opcode, Operand};
use crate::require::requirements_of;
use crate::target::Target;

impl<'s, 'arena, T: Target> Assembler<'s, 'arena, T> {
    /// Number every remaining register, in the fixed order that makes ids
    /// deterministic, folding each instruction's requirements as it is seen.
    pub(crate) fn number_streams(&mut self) -> AssembleResult<()> {
        let streams = mem::take(&mut self.streams);
        let result = self.number_streams_inner(&streams);
        self.streams = streams;
        result
    }

    fn number_streams_inner(&mut self, streams: &[StreamState]) -> AssembleResult<()> {
        let before = self.aliases.len();
        for stream in streams {
            for inst in &stream.insts {
                self.requirements.fold(requirements_of(inst)?);
                match inst.opcode {
                    Opcode::ExtInstImport => self.number_named(inst, true)?,
                    Opcode::String => self.number_named(inst, false)?,
                    _ => {
                        if let Some(Id::Local(local)) = inst.result {
                            self.ensure_alias(local)?;
                        }
                        for op in &inst.operands {
                            if let Operand::IdRef(Id::Local(local))
                            | Operand::BlockRef(Id::Local(local)) = op
                            {
                                self.ensure_alias(*local)?;
                            }
                        }
                    }
                }
            }
        }
        log::debug!(
            "numbering assigned {} ids (bound {})",
            self.aliases.len() - before,
            self.next_id
        );
        Ok(())
    }

    fn ensure_alias(&mut self, local: LocalId) -> AssembleResult<()> {
        if self.aliases.get(local).is_none() {
            let gid = self.fresh_id();
            self.aliases.define(local, gid)?;
        }
        Ok(())
    }

    /// Share one id per distinct literal name across every re-emission.
    fn number_named(&mut self, inst: &Instruction, import: bool) -> AssembleResult<()> {
        let Some(Id::Local(local)) = inst.result else {
            return Ok(());
        };
        if self.aliases.get(local).is_some() {
            return Ok(());
        }
        let Some(Operand::LitString(name)) = inst.operands.first() else {
            return self.ensure_alias(local);
        };
        let interned = self.session.intern_str(name);
        let existing = if import {
            self.import_ids.get(interned).copied()
        } else {
            self.string_ids.get(interned).copied()
        };
        let gid = match existing {
            Some(gid) => gid,
            None => {
                let gid = self.fresh_id();
                if import {
                    self.import_ids.insert(interned, gid);
                } else {
                    self.string_ids.insert(interned, gid);
                }
                gid
            }
        };
        self.aliases.define(local, gid)
    }
}
