// This module implements the AliasTable, the partial map from function-local ids to
// module-wide global ids that every rewriting pass consults. Aliases are written by the
// alias-table builder (entities get theirs before any physical move) and by global
// numbering (everything left over); once set, an alias is immutable, and an attempt to
// remap one is a structural invariant violation from upstream. resolve() is the fatal
// lookup used while rewriting operands: a missing alias there means an instruction was
// hoisted before its dependencies were aliased, which the pipeline treats as
// unrecoverable.

//! Local-to-global id aliasing.

use std::collections::HashMap;

use crate::error::{AssembleError, AssembleResult};
use crate::inst::{GlobalId, LocalId};

/// Partial map `LocalId -> GlobalId`, immutable once set.
#[derive(Debug, Default)]
pub struct AliasTable {
    map: HashMap<LocalId, GlobalId>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an alias. Fails if `local` is already aliased.
    pub fn define(&mut self, local: LocalId, global: GlobalId) -> AssembleResult<()> {
        if let Some(&existing) = self.map.get(&local) {
            return Err(AssembleError::AliasRemap { local, existing, requested: global });
        }
        self.map.insert(local, global);
        Ok(())
    }

    /// Look up an alias, `None` if not yet assigned.
    pub fn get(&self, local: LocalId) -> Option<GlobalId> {
        self.map.get(&local).copied()
    }

    /// Look up an alias that must exist; `context` names the rewriting step
    /// for the error message.
    pub fn resolve(&self, local: LocalId, context: &'static str) -> AssembleResult<GlobalId> {
        self.map
            .get(&local)
            .copied()
            .ok_or(AssembleError::MissingAlias { local, context })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_stability() {
        let mut table = AliasTable::new();
        let local = LocalId::new(1, 4);
        table.define(local, 17).unwrap();
        assert_eq!(table.get(local), Some(17));
        assert_eq!(table.get(local), Some(17));
        assert_eq!(table.resolve(local, "test").unwrap(), 17);
    }

    #[test]
    fn test_remap_is_rejected() {
        let mut table = AliasTable::new();
        let local = LocalId::new(0, 1);
        table.define(local, 3).unwrap();
        let err = table.define(local, 4).unwrap_err();
        match err {
            AssembleError::AliasRemap { existing, requested, .. } => {
                assert_eq!(existing, 3);
                assert_eq!(requested, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_alias_is_fatal() {
        let table = AliasTable::new();
        let err = table.resolve(LocalId::new(2, 2), "rewriting a constant").unwrap_err();
        assert!(matches!(err, AssembleError::MissingAlias { .. }));
    }
}
