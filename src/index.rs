//! Identity index: item id -> current score.
//!
//! Answers "does this id already have pending work, and at what score".
//! No range queries by id ever happen, so a hash map is enough.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::{ItemId, Score};

#[derive(Debug, Default)]
pub struct IdentityIndex {
    scores: HashMap<ItemId, Score>,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, id: ItemId) -> Option<Score> {
        self.scores.get(&id).copied()
    }

    /// Index a previously unseen id. Callers check with [`lookup`](Self::lookup) first.
    pub fn insert(&mut self, id: ItemId, score: Score) -> Result<()> {
        match self.scores.entry(id) {
            std::collections::hash_map::Entry::Occupied(_) => Err(Error::DuplicateKey(id)),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(score);
                Ok(())
            }
        }
    }

    pub fn set_score(&mut self, id: ItemId, score: Score) -> Result<()> {
        let slot = self
            .scores
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("item {id} in identity index")))?;
        *slot = score;
        Ok(())
    }

    /// Drop the record for `id`, returning its final score.
    pub fn remove(&mut self, id: ItemId) -> Result<Score> {
        self.scores
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("item {id} in identity index")))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.scores.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, Score)> + '_ {
        self.scores.iter().map(|(id, score)| (*id, *score))
    }
}
