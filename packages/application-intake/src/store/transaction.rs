use std::collections::HashSet;

use super::{Item, RecordKey, StoreError};

/// An all-or-nothing batch. `creates` must not exist yet; `puts` overwrite.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    creates: Vec<Item>,
    puts: Vec<Item>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(mut self, item: impl Into<Item>) -> Self {
        self.creates.push(item.into());
        self
    }

    pub fn put(mut self, item: impl Into<Item>) -> Self {
        self.puts.push(item.into());
        self
    }

    pub fn creates(&self) -> &[Item] {
        &self.creates
    }

    pub fn puts(&self) -> &[Item] {
        &self.puts
    }

    pub fn len(&self) -> usize {
        self.creates.len() + self.puts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_parts(self) -> (Vec<Item>, Vec<Item>) {
        (self.creates, self.puts)
    }

    /// A key may appear only once per transaction.
    pub fn validate(&self) -> Result<(), StoreError> {
        let mut seen: HashSet<RecordKey> = HashSet::with_capacity(self.len());
        for item in self.creates.iter().chain(self.puts.iter()) {
            let key = item.key();
            if !seen.insert(key.clone()) {
                return Err(StoreError::RepeatedKey { key });
            }
        }
        Ok(())
    }
}
