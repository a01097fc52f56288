//! Fixed-capacity log of recent predictions.
//!
//! History lives in memory only and does not survive a restart.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::passenger::{PredictionRequest, PredictionResponse};

pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// One served request batch and its response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Position in append order, starting at 1.
    pub sequence: u64,
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    /// Artifact name of the model that served the request.
    pub model: String,
    pub request: PredictionRequest,
    pub response: PredictionResponse,
}

#[derive(Debug)]
struct Ring {
    entries: VecDeque<HistoryEntry>,
    next_sequence: u64,
}

#[derive(Debug)]
pub struct HistoryBuffer {
    capacity: usize,
    ring: Mutex<Ring>,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

impl HistoryBuffer {
    /// A buffer keeping the last `capacity` entries. Zero keeps nothing.
    ///
    /// Storage grows with use; `capacity` is only an upper bound.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ring: Mutex::new(Ring {
                entries: VecDeque::new(),
                next_sequence: 1,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a request/response pair, evicting the oldest entry when full.
    /// Returns the entry's sequence number.
    pub fn append(
        &self,
        model: impl Into<String>,
        request: PredictionRequest,
        response: PredictionResponse,
    ) -> u64 {
        let mut ring = self.lock();
        let sequence = ring.next_sequence;
        ring.next_sequence += 1;

        if self.capacity == 0 {
            return sequence;
        }
        if ring.entries.len() == self.capacity {
            ring.entries.pop_front();
        }
        ring.entries.push_back(HistoryEntry {
            sequence,
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            model: model.into(),
            request,
            response,
        });
        sequence
    }

    /// Point-in-time copy, oldest first.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Ring> {
        // Appends never leave the ring half-updated, so a poisoned lock is still usable.
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
