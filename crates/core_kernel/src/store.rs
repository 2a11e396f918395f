//! In-memory versioned tables
//!
//! Building block for the in-memory port adapters. A table only knows how to
//! check a batch of incoming rows against what it holds and then store them;
//! the adapter holds every table behind one lock and runs all checks before
//! any write, which makes a commit all-or-nothing.

use std::collections::{HashMap, HashSet};

use crate::ports::{PortError, Versioned};

/// Rows keyed by id, guarded by their version
#[derive(Debug, Clone)]
pub struct VersionedTable<T: Versioned> {
    rows: HashMap<T::Id, T>,
}

impl<T: Versioned + Clone> VersionedTable<T> {
    pub fn new() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }

    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.rows.get(id)
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.rows.contains_key(id)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Verifies a batch could be written without touching the table
    ///
    /// A stored row must still be at the incoming row's version; an unknown
    /// row must arrive with version 0. The same id twice in one batch is
    /// rejected because the second write would skip the version check.
    pub fn check_batch(&self, batch: &[T]) -> Result<(), PortError> {
        let mut seen = HashSet::with_capacity(batch.len());
        for row in batch {
            let id = row.id();
            if !seen.insert(id) {
                return Err(PortError::validation(format!(
                    "{} {} appears twice in one commit",
                    T::ENTITY,
                    id
                )));
            }

            match self.rows.get(&id) {
                Some(stored) if stored.version() != row.version() => {
                    return Err(PortError::conflict(format!(
                        "{} {} is at version {}, commit was based on version {}",
                        T::ENTITY,
                        id,
                        stored.version(),
                        row.version()
                    )));
                }
                Some(_) => {}
                None if row.version() != 0 => {
                    return Err(PortError::not_found(T::ENTITY, id));
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Stores a checked batch, bumping each row's version
    pub fn write_batch(&mut self, batch: Vec<T>) -> Vec<T> {
        batch
            .into_iter()
            .map(|mut row| {
                row.set_version(row.version() + 1);
                self.rows.insert(row.id(), row.clone());
                row
            })
            .collect()
    }

    /// Loads a row as-is, e.g. from a snapshot; unstored rows become version 1
    pub fn seed(&mut self, mut row: T) {
        if row.version() == 0 {
            row.set_version(1);
        }
        self.rows.insert(row.id(), row);
    }
}

impl<T: Versioned + Clone> Default for VersionedTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
