// This module provides arena-based assembly session management using the bumpalo crate.
// AssemblySession owns the arena allocator, an interned-string table, and statistics
// gathered across assemblies. Interning matters for the symbol and import maps: names
// re-emitted by many functions become one &'arena str usable as a map key without
// cloning, and error/log messages borrow the same storage. A session may serve several
// module assemblies in a row (e.g. across tests); the per-module mutable state lives in
// the Assembler, which is constructed fresh per run, so repeated invocation is safe by
// construction. Statistics are RefCell-guarded so the assembler can record counters
// through a shared reference.

//! Arena-based assembly session management.

use bumpalo::Bump;
use std::cell::RefCell;
use std::collections::HashMap;

/// Counters accumulated over one or more assemblies.
#[derive(Debug, Default, Clone)]
pub struct AssemblyStats {
    /// Real (non-module-data) function streams merged.
    pub functions_merged: usize,
    /// Distinct entities physically hoisted.
    pub entities_hoisted: usize,
    /// Occurrences folded away by dedup (recorded occurrences minus hoisted copies).
    pub duplicates_folded: usize,
    /// Global ids handed out.
    pub ids_assigned: usize,
    /// Instructions in emitted sections.
    pub instructions_emitted: usize,
    /// Completed assemblies.
    pub modules_assembled: usize,
}

/// Shared services for one or more assembly runs.
#[derive(Debug)]
pub struct AssemblySession<'arena> {
    arena: &'arena Bump,
    stats: RefCell<AssemblyStats>,
    interned: RefCell<HashMap<String, &'arena str>>,
}

impl<'arena> AssemblySession<'arena> {
    /// Create a new session backed by the given arena.
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(AssemblyStats::default()),
            interned: RefCell::new(HashMap::new()),
        }
    }

    /// Access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Intern a string in the arena, returning stable storage.
    pub fn intern_str(&self, s: &str) -> &'arena str {
        let mut interned = self.interned.borrow_mut();
        if let Some(&existing) = interned.get(s) {
            return existing;
        }
        let stored = self.arena.alloc_str(s);
        interned.insert(s.to_string(), stored);
        stored
    }

    /// Snapshot of the accumulated statistics.
    pub fn stats(&self) -> AssemblyStats {
        self.stats.borrow().clone()
    }

    pub(crate) fn record_functions_merged(&self, count: usize) {
        self.stats.borrow_mut().functions_merged += count;
    }

    pub(crate) fn record_entity_hoisted(&self, duplicates: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.entities_hoisted += 1;
        stats.duplicates_folded += duplicates;
    }

    pub(crate) fn record_ids_assigned(&self, count: usize) {
        self.stats.borrow_mut().ids_assigned += count;
    }

    pub(crate) fn record_module_assembled(&self, instructions: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.instructions_emitted += instructions;
        stats.modules_assembled += 1;
        log::debug!(
            "module assembled: {} instructions, {} entities hoisted, {} duplicates folded",
            instructions,
            stats.entities_hoisted,
            stats.duplicates_folded
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_dedups_storage() {
        let arena = Bump::new();
        let session = AssemblySession::new(&arena);
        let a = session.intern_str("GLSL.std.450");
        let b = session.intern_str("GLSL.std.450");
        assert!(std::ptr::eq(a, b));
        assert_eq!(a, "GLSL.std.450");
    }

    #[test]
    fn test_stats_accumulate() {
        let arena = Bump::new();
        let session = AssemblySession::new(&arena);
        session.record_entity_hoisted(2);
        session.record_entity_hoisted(0);
        session.record_ids_assigned(10);
        let stats = session.stats();
        assert_eq!(stats.entities_hoisted, 2);
        assert_eq!(stats.duplicates_folded, 2);
        assert_eq!(stats.ids_assigned, 10);
    }
}
