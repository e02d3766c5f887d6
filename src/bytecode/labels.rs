//! Label table: jump-target bookkeeping for one body
//!
//! Each entry records where its `label` instruction lives and how many jumps
//! currently target it. The count is maintained by the rules themselves:
//! whoever removes a jump calls [`LabelTable::drop_label`], whoever adds or
//! redirects one calls [`LabelTable::copy_label`]. Nothing reconciles the table
//! behind a rule's back, so a missed call shows up as a dead label being
//! deleted while something still jumps to it.

use super::{LabelId, Pos};
use crate::error::{Error, Result};
use rustc_hash::FxHashMap as HashMap;

/// One label of a body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEntry {
    /// Label id, as used by jump operands
    pub id: LabelId,
    /// Debug name for disassembly
    pub name: String,
    /// Position of the defining `label` instruction
    pub position: Pos,
    /// Number of jumps targeting this label
    pub references: u32,
}

/// Label id → entry map
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    entries: HashMap<LabelId, LabelEntry>,
    highest: Option<LabelId>,
}

impl LabelTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a label; used both by body construction and by rules that
    /// synthesize new jump targets.
    pub fn insert_new_label(
        &mut self,
        id: LabelId,
        name: impl Into<String>,
        position: Pos,
        references: u32,
    ) -> Result<()> {
        if self.entries.contains_key(&id) {
            return Err(Error::DuplicateLabel(id));
        }
        self.entries.insert(
            id,
            LabelEntry {
                id,
                name: name.into(),
                position,
                references,
            },
        );
        self.highest = self.highest.max(Some(id));
        Ok(())
    }

    /// An id larger than every id this table has seen, or `None` once
    /// `LabelId::MAX` has been used
    pub fn fresh_id(&self) -> Option<LabelId> {
        match self.highest {
            Some(id) => id.checked_add(1),
            None => Some(0),
        }
    }

    /// Record a new jump to `id`
    pub fn copy_label(&mut self, id: LabelId) -> Result<()> {
        let entry = self.entry_mut(id)?;
        entry.references += 1;
        Ok(())
    }

    /// Record that a jump to `id` went away
    pub fn drop_label(&mut self, id: LabelId) -> Result<()> {
        let entry = self.entry_mut(id)?;
        entry.references = entry
            .references
            .checked_sub(1)
            .ok_or(Error::LabelUnderflow(id))?;
        Ok(())
    }

    /// No jump targets `id`
    pub fn dead_label(&self, id: LabelId) -> Result<bool> {
        Ok(self.entry(id)?.references == 0)
    }

    /// Exactly one jump targets `id`
    pub fn unique_label(&self, id: LabelId) -> Result<bool> {
        Ok(self.entry(id)?.references == 1)
    }

    /// Delete the entry of a dead label
    pub fn remove(&mut self, id: LabelId) -> Result<LabelEntry> {
        let entry = self.entries.remove(&id).ok_or(Error::UnknownLabel(id))?;
        if entry.references != 0 {
            let message = format!("removed with {} live references", entry.references);
            self.entries.insert(id, entry);
            return Err(Error::desync(id, message));
        }
        Ok(entry)
    }

    /// Look up an entry
    pub fn get(&self, id: LabelId) -> Option<&LabelEntry> {
        self.entries.get(&id)
    }

    /// Look up an entry, treating a miss as an internal error
    pub fn entry(&self, id: LabelId) -> Result<&LabelEntry> {
        self.entries.get(&id).ok_or(Error::UnknownLabel(id))
    }

    fn entry_mut(&mut self, id: LabelId) -> Result<&mut LabelEntry> {
        self.entries.get_mut(&id).ok_or(Error::UnknownLabel(id))
    }

    /// Re-point an entry after its `label` instruction was re-inserted
    pub(crate) fn set_position(&mut self, id: LabelId, position: Pos) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.position = position;
        }
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by id
    pub fn iter(&self) -> impl Iterator<Item = &LabelEntry> {
        let mut entries: Vec<&LabelEntry> = self.entries.values().collect();
        entries.sort_by_key(|entry| entry.id);
        entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> LabelTable {
        let mut labels = LabelTable::new();
        labels.insert_new_label(1, "stop_1", Pos(4), 1).unwrap();
        labels.insert_new_label(7, "loop_7", Pos(0), 0).unwrap();
        labels
    }

    #[test]
    fn test_copy_and_drop() {
        let mut labels = table();
        assert!(labels.unique_label(1).unwrap());
        labels.copy_label(1).unwrap();
        assert_eq!(labels.entry(1).unwrap().references, 2);
        labels.drop_label(1).unwrap();
        labels.drop_label(1).unwrap();
        assert!(labels.dead_label(1).unwrap());
    }

    #[test]
    fn test_drop_underflow_is_internal_error() {
        let mut labels = table();
        let err = labels.drop_label(7).unwrap_err();
        assert!(matches!(err, Error::LabelUnderflow(7)));
        assert!(err.is_internal());
    }

    #[test]
    fn test_unknown_label() {
        let mut labels = table();
        assert!(matches!(labels.copy_label(3), Err(Error::UnknownLabel(3))));
        assert!(matches!(labels.dead_label(3), Err(Error::UnknownLabel(3))));
    }

    #[test]
    fn test_fresh_id_and_duplicates() {
        let mut labels = table();
        assert_eq!(LabelTable::new().fresh_id(), Some(0));
        assert_eq!(labels.fresh_id(), Some(8));
        assert!(matches!(
            labels.insert_new_label(7, "again", Pos(9), 0),
            Err(Error::DuplicateLabel(7))
        ));
        labels.insert_new_label(8, "split_8", Pos(9), 1).unwrap();
        assert_eq!(labels.fresh_id(), Some(9));
    }

    #[test]
    fn test_fresh_id_exhausted() {
        let mut labels = table();
        labels.insert_new_label(LabelId::MAX, "last", Pos(12), 0).unwrap();
        assert_eq!(labels.fresh_id(), None);
    }

    #[test]
    fn test_remove_only_dead() {
        let mut labels = table();
        assert!(labels.remove(1).is_err());
        assert!(labels.get(1).is_some());
        let removed = labels.remove(7).unwrap();
        assert_eq!(removed.name, "loop_7");
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn test_ordering() {
        let labels = table();
        let ids: Vec<LabelId> = labels.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 7]);
    }
}
