use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::value::StateValue;

/// One committed change, kept for debugging and inspection only.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub key: String,
    pub old_value: Option<StateValue>,
    pub new_value: Option<StateValue>,
}

/// Append-only change log capped at `limit` entries. FIFO eviction.
#[derive(Debug)]
pub(crate) struct HistoryLog {
    records: VecDeque<HistoryRecord>,
    limit: usize,
}

impl HistoryLog {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(limit.min(1024)),
            limit,
        }
    }

    pub(crate) fn push(&mut self, key: &str, old: Option<StateValue>, new: Option<StateValue>) {
        if self.limit == 0 {
            return;
        }
        while self.records.len() >= self.limit {
            self.records.pop_front();
        }
        self.records.push_back(HistoryRecord {
            timestamp: Utc::now(),
            key: key.to_string(),
            old_value: old,
            new_value: new,
        });
    }

    pub(crate) fn records(&self) -> Vec<HistoryRecord> {
        self.records.iter().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_most_recent_entries() {
        let mut log = HistoryLog::new(3);
        for i in 0..5i64 {
            log.push("counter", None, Some(StateValue::from(i)));
        }

        assert_eq!(log.len(), 3);
        let values: Vec<i64> = log
            .records()
            .iter()
            .map(|r| r.new_value.as_ref().unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(values, vec![2, 3, 4]);
    }

    #[test]
    fn zero_limit_records_nothing() {
        let mut log = HistoryLog::new(0);
        log.push("k", None, Some(StateValue::from(1i64)));
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn clear_empties_log() {
        let mut log = HistoryLog::new(10);
        log.push("k", None, None);
        log.clear();
        assert_eq!(log.len(), 0);
    }
}
