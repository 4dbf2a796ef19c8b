use std::collections::BTreeMap;
use std::fmt;

use crate::source::MessagePosition;

/// Highest consumed offset per topic partition.
///
/// Offsets are the offsets of consumed messages, not the next offset to read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumptionPosition {
    offsets: BTreeMap<(String, i32), i64>,
}

impl ConsumptionPosition {
    pub fn observe(&mut self, position: &MessagePosition) {
        self.advance(position.topic.clone(), position.partition, position.offset);
    }

    /// Folds `other` into this position, keeping the highest offsets.
    pub fn merge(&mut self, other: ConsumptionPosition) {
        for ((topic, partition), offset) in other.offsets {
            self.advance(topic, partition, offset);
        }
    }

    /// Takes the current position, leaving an empty one behind.
    pub fn take(&mut self) -> ConsumptionPosition {
        std::mem::take(self)
    }

    pub fn offset(&self, topic: &str, partition: i32) -> Option<i64> {
        self.offsets.get(&(topic.to_string(), partition)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32, i64)> {
        self.offsets
            .iter()
            .map(|((topic, partition), offset)| (topic.as_str(), *partition, *offset))
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    fn advance(&mut self, topic: String, partition: i32, offset: i64) {
        self.offsets
            .entry((topic, partition))
            .and_modify(|current| *current = (*current).max(offset))
            .or_insert(offset);
    }
}

impl fmt::Display for ConsumptionPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (topic, partition, offset) in self.iter() {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "{topic}/{partition}@{offset}")?;
        }
        Ok(())
    }
}
