use std::collections::HashMap;

use crate::item::{Item, ItemId, ItemStatus, SourceFile};

/// The currently registered items, in insertion order, keyed by identity.
#[derive(Debug, Default)]
pub struct Batch {
    items: Vec<Item>,
    index: HashMap<ItemId, usize>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new pending item. A file whose identity is already present
    /// is ignored and `None` is returned.
    pub fn insert(&mut self, source: SourceFile) -> Option<&Item> {
        let id = source.id();
        if self.index.contains_key(&id) {
            return None;
        }
        self.index.insert(id, self.items.len());
        self.items.push(Item::new(source));
        self.items.last()
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, id: &ItemId) -> Option<&mut Item> {
        match self.index.get(id) {
            Some(&i) => self.items.get_mut(i),
            None => None,
        }
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn with_status(&self, status: ItemStatus) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(move |item| item.status() == status)
    }

    pub fn count(&self, status: ItemStatus) -> usize {
        self.with_status(status).count()
    }

    /// Removes every item, dropping their payloads. Returns how many were held.
    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        self.index.clear();
        count
    }
}
