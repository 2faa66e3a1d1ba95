//! Intervention history.
//!
//! Insertion-ordered log of every intervention that was activated and every
//! restore command sent when one ended. Nothing reads it back to make
//! decisions; it only feeds the debug snapshot.
//!
//! An intervention record stays `active` only while that intervention holds
//! the slot, so at most one record is active at any time.
//!
//! The log is a ring buffer: once `limit` records are held, the oldest one
//! is dropped for each new record. A limit of 0 keeps everything.

use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

use crate::types::{ActiveIntervention, RestoreCommand};

/// A restore command as it was recorded when sent
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRecord {
    #[serde(flatten)]
    pub command: RestoreCommand,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub is_restore_command: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HistoryRecord {
    Intervention(ActiveIntervention),
    Restore(RestoreRecord),
}

impl HistoryRecord {
    /// When the recorded event happened, epoch milliseconds
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Intervention(intervention) => intervention.timestamp,
            Self::Restore(restore) => restore.timestamp,
        }
    }

    pub fn is_restore(&self) -> bool {
        matches!(self, Self::Restore(_))
    }
}

#[derive(Debug, Clone)]
pub struct History {
    records: VecDeque<HistoryRecord>,
    limit: usize,
    dropped: u64,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            records: VecDeque::new(),
            limit,
            dropped: 0,
        }
    }

    pub fn record_intervention(&mut self, intervention: &ActiveIntervention) {
        self.push(HistoryRecord::Intervention(intervention.clone()));
    }

    pub fn record_restore(&mut self, command: &RestoreCommand, now_ms: i64) {
        self.push(HistoryRecord::Restore(RestoreRecord {
            command: command.clone(),
            timestamp: now_ms,
            is_restore_command: true,
        }));
    }

    /// Flag the record of intervention `id` as no longer active
    pub fn mark_ended(&mut self, id: Uuid) {
        let record = self.records.iter_mut().rev().find_map(|record| match record {
            HistoryRecord::Intervention(intervention) if intervention.id == id => {
                Some(intervention)
            }
            _ => None,
        });
        if let Some(intervention) = record {
            intervention.active = false;
        }
    }

    fn push(&mut self, record: HistoryRecord) {
        if self.limit > 0 && self.records.len() >= self.limit {
            self.records.pop_front();
            self.dropped += 1;
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records evicted by the retention limit
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.records.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryRecord> {
        self.records.iter().cloned().collect()
    }
}
