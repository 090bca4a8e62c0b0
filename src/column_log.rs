use crate::constants::COLUMN_LOG_CAPACITY;
use crate::types::{ColumnClassificationRecord, ColumnOutcome};

/// Fixed-capacity buffer that overwrites its oldest entry once full.
#[derive(Clone, Debug)]
pub struct RingBuffer<T> {
    items: Vec<T>,
    head: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() < self.capacity {
            self.items.push(item);
            return;
        }
        self.items[self.head] = item;
        self.head = (self.head + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.head = 0;
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let (newer, older) = self.items.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    pub fn latest(&self) -> Option<&T> {
        if self.items.is_empty() {
            return None;
        }
        let idx = if self.head == 0 {
            self.items.len() - 1
        } else {
            self.head - 1
        };
        self.items.get(idx)
    }
}

/// Inspection-only log of column classifications; nothing reads it back
/// into the propagation path.
#[derive(Clone, Debug)]
pub struct ColumnLog {
    records: RingBuffer<ColumnClassificationRecord>,
}

impl Default for ColumnLog {
    fn default() -> Self {
        Self {
            records: RingBuffer::with_capacity(COLUMN_LOG_CAPACITY),
        }
    }
}

impl ColumnLog {
    pub fn record_section(&mut self, section_id: &str, columns: &[ColumnOutcome]) {
        for column in columns {
            self.records.push(ColumnClassificationRecord {
                section_id: section_id.to_string(),
                column_index: column.column_index,
                participation_rate: column.participation_rate,
                state: column.state,
            });
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn recent(&self, limit: usize) -> Vec<ColumnClassificationRecord> {
        let skip = self.records.len().saturating_sub(limit);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub fn all(&self) -> Vec<ColumnClassificationRecord> {
        self.records.iter().cloned().collect()
    }
}
