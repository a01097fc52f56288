//! ModelSlot: the single active model, swapped atomically.
//!
//! Readers clone an `Arc` under a read lock and release it immediately, so a
//! prediction keeps using the model it started with even if a new one is
//! installed mid-flight. Deserialization happens before `install`, never while
//! the lock is held.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::predictor::LoadedModel;

/// The model a reader obtained from the slot, with the generation it was installed as.
#[derive(Debug, Clone)]
pub struct ActiveModel {
    pub model: Arc<LoadedModel>,
    pub generation: u64,
}

#[derive(Debug, Default)]
pub struct ModelSlot {
    current: RwLock<Option<ActiveModel>>,
    /// Number of successful installs so far.
    generation: AtomicU64,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The active model, or `None` when the slot is empty.
    pub fn current(&self) -> Option<ActiveModel> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Replace the active model. Returns the new generation.
    ///
    /// Installs are serialized by the write lock; the last one wins. The
    /// replaced model is dropped after the lock is released, so a slow
    /// destructor never stalls readers.
    pub fn install(&self, model: Arc<LoadedModel>) -> u64 {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let previous = current.replace(ActiveModel { model, generation });
        drop(current);
        drop(previous);
        generation
    }

    /// Empty the slot. The generation counter is kept.
    pub fn clear(&self) -> Option<ActiveModel> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Generation of the most recent install (0 before the first).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}
