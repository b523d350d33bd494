use std::collections::VecDeque;

use crate::canvas::MaskLayerStore;

/// Default number of snapshots kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 30;

// ============================================================================
// SNAPSHOT – immutable copy of both mask layers
// ============================================================================

#[derive(Clone, Debug)]
pub struct Snapshot {
    label: &'static str,
    masks: MaskLayerStore,
}

impl Snapshot {
    pub fn capture(label: &'static str, masks: &MaskLayerStore) -> Self {
        Self {
            label,
            masks: masks.clone(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn masks(&self) -> &MaskLayerStore {
        &self.masks
    }

    pub fn restore(&self, masks: &mut MaskLayerStore) {
        masks.clone_from(&self.masks);
    }

    pub fn memory_size(&self) -> usize {
        self.masks.memory_bytes()
    }
}

// ============================================================================
// HISTORY MANAGER – bounded linear undo/redo over snapshots
// ============================================================================

/// Snapshots in chronological order plus a cursor. Entries after the cursor
/// are redo-reachable until the next snapshot truncates them.
pub struct HistoryManager {
    entries: VecDeque<Snapshot>,
    index: usize,
    max_history_size: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            index: 0,
            max_history_size: max_history_size.max(1),
        }
    }

    /// Record the current state as the newest entry.
    pub fn snapshot(&mut self, label: &'static str, masks: &MaskLayerStore) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push_back(Snapshot::capture(label, masks));
        self.index = self.entries.len() - 1;

        while self.entries.len() > self.max_history_size {
            if let Some(evicted) = self.entries.pop_front() {
                log::debug!("history full, evicted '{}'", evicted.label());
            }
            self.index = self.index.saturating_sub(1);
        }
    }

    /// Step back one entry. Returns the label of the undone entry.
    pub fn undo(&mut self, masks: &mut MaskLayerStore) -> Option<&'static str> {
        if !self.can_undo() {
            log::debug!("undo at oldest entry ignored");
            return None;
        }
        let undone = self.entries[self.index].label();
        self.index -= 1;
        self.entries[self.index].restore(masks);
        Some(undone)
    }

    /// Step forward one entry. Returns the label of the redone entry.
    pub fn redo(&mut self, masks: &mut MaskLayerStore) -> Option<&'static str> {
        if !self.can_redo() {
            log::debug!("redo at newest entry ignored");
            return None;
        }
        self.index += 1;
        let entry = &self.entries[self.index];
        entry.restore(masks);
        Some(entry.label())
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn undo_description(&self) -> Option<&'static str> {
        self.can_undo().then(|| self.entries[self.index].label())
    }

    pub fn redo_description(&self) -> Option<&'static str> {
        self.entries.get(self.index + 1).map(|s| s.label())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    pub fn memory_usage(&self) -> usize {
        self.entries.iter().map(Snapshot::memory_size).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = 0;
    }
}
