//! Score-bucketed priority structure.
//!
//! Each pool holds the ids that currently share one exact score. Pools live
//! in a `BTreeMap` keyed by score, so only populated scores take space and the
//! maximum is the map's last key. A pool exists if and only if it has members.
//!
//! Within a pool, ids drain in arrival order: every insertion takes a fresh
//! ticket from a structure-wide counter and the lowest ticket pops first.
//! An id that moves into a pool queues behind ids already there.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::model::{ItemId, Score};

/// Ids sharing one score, in arrival order.
#[derive(Debug, Default)]
struct Pool {
    order: BTreeMap<u64, ItemId>,
    tickets: HashMap<ItemId, u64>,
}

impl Pool {
    fn len(&self) -> usize {
        self.order.len()
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// An id taken from the highest pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Popped {
    pub id: ItemId,
    pub score: Score,
    /// The pop emptied (and destroyed) the pool.
    pub reclaimed: bool,
}

#[derive(Debug, Default)]
pub struct PriorityPools {
    pools: BTreeMap<Score, Pool>,
    next_ticket: u64,
    created: u64,
    reclaimed: u64,
}

impl PriorityPools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` to the pool at `score`, creating the pool if needed.
    ///
    /// Returns `true` when a new pool was created.
    pub fn add_to_pool(&mut self, score: Score, id: ItemId) -> Result<bool> {
        let ticket = self.next_ticket;
        let mut created = false;
        let pool = self.pools.entry(score).or_insert_with(|| {
            created = true;
            Pool::default()
        });

        if pool.tickets.contains_key(&id) {
            return Err(Error::DuplicateKey(id));
        }
        pool.tickets.insert(id, ticket);
        pool.order.insert(ticket, id);
        self.next_ticket += 1;

        if created {
            self.created += 1;
        }
        Ok(created)
    }

    /// Remove `id` from the pool at `score`, destroying the pool if it empties.
    ///
    /// Returns `true` when the pool was reclaimed.
    pub fn remove_from_pool(&mut self, score: Score, id: ItemId) -> Result<bool> {
        let pool = self
            .pools
            .get_mut(&score)
            .ok_or_else(|| Error::NotFound(format!("pool at score {score}")))?;
        let ticket = pool
            .tickets
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("item {id} in pool at score {score}")))?;
        pool.order.remove(&ticket);

        Ok(self.reclaim_if_empty(score))
    }

    /// Highest score among existing pools.
    pub fn peek_max_pool(&self) -> Option<Score> {
        self.pools.last_key_value().map(|(score, _)| *score)
    }

    /// Remove and return the oldest member of the highest pool.
    pub fn pop_from_max_pool(&mut self) -> Option<Popped> {
        let mut entry = self.pools.last_entry()?;
        let score = *entry.key();
        let pool = entry.get_mut();

        let (_, id) = pool.order.pop_first()?;
        pool.tickets.remove(&id);

        let reclaimed = pool.is_empty();
        if reclaimed {
            entry.remove();
            self.reclaimed += 1;
        }
        Some(Popped {
            id,
            score,
            reclaimed,
        })
    }

    fn reclaim_if_empty(&mut self, score: Score) -> bool {
        let empty = self.pools.get(&score).is_some_and(Pool::is_empty);
        if empty {
            self.pools.remove(&score);
            self.reclaimed += 1;
        }
        empty
    }

    /// Number of live pools (distinct pending scores).
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Total members across all pools.
    pub fn member_count(&self) -> usize {
        self.pools.values().map(Pool::len).sum()
    }

    /// Members of the pool at `score` in drain order. Empty if no such pool.
    pub fn members(&self, score: Score) -> Vec<ItemId> {
        self.pools
            .get(&score)
            .map(|pool| pool.order.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, score: Score, id: ItemId) -> bool {
        self.pools
            .get(&score)
            .is_some_and(|pool| pool.tickets.contains_key(&id))
    }

    /// Every `(score, id)` membership, highest score first.
    pub fn iter(&self) -> impl Iterator<Item = (Score, ItemId)> + '_ {
        self.pools
            .iter()
            .rev()
            .flat_map(|(score, pool)| pool.order.values().map(move |id| (*score, *id)))
    }

    /// Pools created since construction.
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Pools destroyed since construction.
    pub fn reclaimed(&self) -> u64 {
        self.reclaimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_member_creates_pool() {
        let mut pools = PriorityPools::new();
        assert!(pools.add_to_pool(10, ItemId(1)).unwrap());
        assert!(!pools.add_to_pool(10, ItemId(2)).unwrap());

        assert_eq!(pools.len(), 1);
        assert_eq!(pools.created(), 1);
        assert_eq!(pools.members(10), vec![ItemId(1), ItemId(2)]);
    }

    #[test]
    fn adding_existing_member_is_rejected() {
        let mut pools = PriorityPools::new();
        pools.add_to_pool(3, ItemId(1)).unwrap();

        assert!(matches!(
            pools.add_to_pool(3, ItemId(1)),
            Err(Error::DuplicateKey(ItemId(1)))
        ));
        assert_eq!(pools.member_count(), 1);
    }

    #[test]
    fn removing_last_member_reclaims_pool() {
        let mut pools = PriorityPools::new();
        pools.add_to_pool(4, ItemId(1)).unwrap();
        pools.add_to_pool(4, ItemId(2)).unwrap();

        assert!(!pools.remove_from_pool(4, ItemId(1)).unwrap());
        assert_eq!(pools.len(), 1);

        assert!(pools.remove_from_pool(4, ItemId(2)).unwrap());
        assert!(pools.is_empty());
        assert_eq!(pools.reclaimed(), 1);
        assert_eq!(pools.peek_max_pool(), None);
    }

    #[test]
    fn remove_missing_is_not_found() {
        let mut pools = PriorityPools::new();
        assert!(matches!(
            pools.remove_from_pool(1, ItemId(1)),
            Err(Error::NotFound(_))
        ));

        pools.add_to_pool(1, ItemId(1)).unwrap();
        assert!(matches!(
            pools.remove_from_pool(1, ItemId(2)),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            pools.remove_from_pool(2, ItemId(1)),
            Err(Error::NotFound(_))
        ));
        assert_eq!(pools.reclaimed(), 0);
    }

    #[test]
    fn peek_tracks_highest_score() {
        let mut pools = PriorityPools::new();
        pools.add_to_pool(-5, ItemId(1)).unwrap();
        assert_eq!(pools.peek_max_pool(), Some(-5));

        pools.add_to_pool(20, ItemId(2)).unwrap();
        pools.add_to_pool(7, ItemId(3)).unwrap();
        assert_eq!(pools.peek_max_pool(), Some(20));
    }

    #[test]
    fn pop_drains_max_pool_in_arrival_order() {
        let mut pools = PriorityPools::new();
        pools.add_to_pool(9, ItemId(30)).unwrap();
        pools.add_to_pool(9, ItemId(10)).unwrap();
        pools.add_to_pool(2, ItemId(99)).unwrap();
        pools.add_to_pool(9, ItemId(20)).unwrap();

        let popped = pools.pop_from_max_pool().unwrap();
        assert_eq!(popped.id, ItemId(30));
        assert_eq!(popped.score, 9);
        assert!(!popped.reclaimed);

        assert_eq!(pools.pop_from_max_pool().unwrap().id, ItemId(10));

        let last = pools.pop_from_max_pool().unwrap();
        assert_eq!(last.id, ItemId(20));
        assert!(last.reclaimed);

        assert_eq!(pools.peek_max_pool(), Some(2));
        assert_eq!(pools.pop_from_max_pool().unwrap().id, ItemId(99));
        assert_eq!(pools.pop_from_max_pool(), None);
        assert_eq!(pools.reclaimed(), 2);
    }

    #[test]
    fn moved_member_queues_behind_residents() {
        let mut pools = PriorityPools::new();
        pools.add_to_pool(5, ItemId(1)).unwrap();
        pools.add_to_pool(8, ItemId(2)).unwrap();

        // Item 1 climbs to score 8 after item 2 got there
        pools.remove_from_pool(5, ItemId(1)).unwrap();
        pools.add_to_pool(8, ItemId(1)).unwrap();

        assert_eq!(pools.members(8), vec![ItemId(2), ItemId(1)]);
    }

    #[test]
    fn iter_walks_highest_score_first() {
        let mut pools = PriorityPools::new();
        pools.add_to_pool(1, ItemId(1)).unwrap();
        pools.add_to_pool(3, ItemId(2)).unwrap();
        pools.add_to_pool(3, ItemId(3)).unwrap();

        let all: Vec<_> = pools.iter().collect();
        assert_eq!(all, vec![(3, ItemId(2)), (3, ItemId(3)), (1, ItemId(1))]);
    }
}
