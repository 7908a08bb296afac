use std::cell::{Cell, RefCell};

use crate::{
    models::store::Store,
    storage::{Storage, StorageError},
};

/// Keeps the last saved store in memory. Used by service tests.
#[derive(Default)]
pub struct MemoryStorage {
    store: RefCell<Option<Store>>,
    saves: Cell<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `save` has been called
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Store, StorageError> {
        Ok(self.store.borrow().clone().unwrap_or_default())
    }

    fn save(&self, store: &Store) -> Result<(), StorageError> {
        *self.store.borrow_mut() = Some(store.clone());
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}
