// This module implements the EntityRegistry, which records which function-local
// register defines which canonical module entity. The instruction selector calls
// record() once per entity it re-emits into a function stream; recording the same
// (key, function) pair twice indicates an upstream structural-equality bug and fails.
// Entries keep their first-record order, which is the deterministic order hoisting
// later walks: because every producer records an entity's dependencies before the
// entity itself, first-record order is also a valid dependency order. Structural keys
// (types, constants, globals, functions) go through a hash index; opaque composites
// are grouped by opcode word and deduplicated by pairwise comparison of their resolved
// operand keys instead of a key lookup.

//! Registry of module-scope entity definitions.

use std::collections::HashMap;

use crate::entity::{EntityKey, EntityKind};
use crate::error::{AssembleError, AssembleResult};

/// One distinct entity and every function-local register that defines it.
#[derive(Debug)]
pub struct EntityEntry {
    pub key: EntityKey,
    /// `(function index, local index)` pairs, in record order.
    occurrences: Vec<(u32, u32)>,
}

impl EntityEntry {
    pub fn occurrences(&self) -> &[(u32, u32)] {
        &self.occurrences
    }

    /// First-seen occurrence; its instruction is the one that gets hoisted.
    pub fn first(&self) -> (u32, u32) {
        self.occurrences[0]
    }
}

/// Records dedup-eligible entity definitions across all function streams.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entries: Vec<EntityEntry>,
    index: HashMap<EntityKey, usize>,
    /// Opaque composites grouped by opcode word; entries are found by scanning
    /// the group and comparing operand keys.
    opaque_groups: HashMap<u16, Vec<usize>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `(func, local)` defines `key`.
    ///
    /// Fails if this function already recorded a definition of the same key:
    /// the producer deduplicates within one function, so a second record means
    /// its structural-equality check is broken.
    pub fn record(&mut self, key: EntityKey, func: u32, local: u32) -> AssembleResult<()> {
        let slot = match self.find(&key) {
            Some(slot) => slot,
            None => self.insert(key),
        };
        let entry = &mut self.entries[slot];
        if entry.occurrences.iter().any(|&(f, _)| f == func) {
            return Err(AssembleError::DuplicateOccurrence {
                func,
                key: entry.key.to_string(),
            });
        }
        if !entry.occurrences.is_empty() {
            log::trace!("entity {} re-recorded by function {func}", entry.key);
        }
        entry.occurrences.push((func, local));
        Ok(())
    }

    /// All occurrences of `key`, empty if it was never recorded.
    pub fn occurrences(&self, key: &EntityKey) -> &[(u32, u32)] {
        match self.find(key) {
            Some(slot) => &self.entries[slot].occurrences,
            None => &[],
        }
    }

    /// Entries in first-record order.
    pub fn entries(&self) -> impl Iterator<Item = &EntityEntry> {
        self.entries.iter()
    }

    /// Entries of one kind, in first-record order.
    pub fn entries_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &EntityEntry> {
        self.entries.iter().filter(move |e| e.key.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, key: &EntityKey) -> Option<usize> {
        match key {
            EntityKey::Opaque(opaque) => {
                let group = self.opaque_groups.get(&opaque.opcode)?;
                group
                    .iter()
                    .copied()
                    .find(|&slot| self.entries[slot].key == *key)
            }
            _ => self.index.get(key).copied(),
        }
    }

    fn insert(&mut self, key: EntityKey) -> usize {
        let slot = self.entries.len();
        match &key {
            EntityKey::Opaque(opaque) => {
                self.opaque_groups.entry(opaque.opcode).or_default().push(slot);
            }
            _ => {
                self.index.insert(key.clone(), slot);
            }
        }
        self.entries.push(EntityEntry { key, occurrences: Vec::new() });
        slot
    }
}
