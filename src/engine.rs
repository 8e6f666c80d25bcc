//! Core engine. The public API for submitting and draining work.
//!
//! The engine owns the identity index and the score pools and keeps them in
//! lockstep: every pending id is indexed at score S and is a member of exactly
//! one pool, the one at S. Both operations are synchronous and never block, so
//! the connection layer can call them from inside a single critical section.

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use tracing::{error, trace};

use crate::error::{Error, Result};
use crate::index::IdentityIndex;
use crate::model::{Item, ItemId, Score};
use crate::pool::PriorityPools;
use crate::stats::Stats;
use crate::telemetry::metrics;

/// What happened when a score delta was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitResult {
    /// First submission for this id; a new item now waits at `score`.
    Created { score: Score },
    /// Coalesced into the existing item, which moved pools.
    Coalesced { previous: Score, score: Score },
    /// Zero delta against a pending item. Nothing moved.
    Unchanged { score: Score },
}

impl SubmitResult {
    pub fn score(&self) -> Score {
        match *self {
            SubmitResult::Created { score }
            | SubmitResult::Coalesced { score, .. }
            | SubmitResult::Unchanged { score } => score,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            SubmitResult::Created { .. } => "created",
            SubmitResult::Coalesced { .. } => "coalesced",
            SubmitResult::Unchanged { .. } => "unchanged",
        }
    }
}

/// The priority engine. Owns all queue state and enforces its invariants.
#[derive(Debug)]
pub struct Engine {
    index: IdentityIndex,
    pools: PriorityPools,
    updates: u64,
    items_reclaimed: u64,
    started_at: DateTime<Utc>,
    poisoned: Option<String>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            index: IdentityIndex::new(),
            pools: PriorityPools::new(),
            updates: 0,
            items_reclaimed: 0,
            started_at: Utc::now(),
            poisoned: None,
        }
    }

    /// Add `delta` to the score of `id`, creating the item on first sight.
    ///
    /// An overflowing delta is rejected without touching state.
    pub fn submit(&mut self, id: ItemId, delta: Score) -> Result<SubmitResult> {
        self.ensure_healthy()?;

        let result = match self.index.lookup(id) {
            None => {
                let inserted = self.index.insert(id, delta);
                self.consistent("submit", inserted)?;
                let added = self.pools.add_to_pool(delta, id);
                let created = self.consistent("submit", added)?;
                self.note_pool_created(created, delta);
                SubmitResult::Created { score: delta }
            }
            Some(previous) if delta == 0 => {
                trace!(%id, score = previous, "zero delta, item stays put");
                SubmitResult::Unchanged { score: previous }
            }
            Some(previous) => {
                let score = previous.checked_add(delta).ok_or(Error::ScoreOverflow {
                    id,
                    score: previous,
                    delta,
                })?;

                let updated = self.index.set_score(id, score);
                self.consistent("submit", updated)?;
                // Out of the old pool before into the new one.
                let removed = self.pools.remove_from_pool(previous, id);
                let reclaimed = self.consistent("submit", removed)?;
                self.note_pool_reclaimed(reclaimed, previous);
                let added = self.pools.add_to_pool(score, id);
                let created = self.consistent("submit", added)?;
                self.note_pool_created(created, score);

                SubmitResult::Coalesced { previous, score }
            }
        };

        self.updates += 1;
        metrics::queue_updates().add(1, &[KeyValue::new("result", result.kind())]);
        Ok(result)
    }

    /// Remove and return the highest-scoring item, or `None` when empty.
    ///
    /// Among equal scores, the item that reached that score first wins.
    pub fn dequeue_max(&mut self) -> Result<Option<Item>> {
        self.ensure_healthy()?;

        let Some(popped) = self.pools.pop_from_max_pool() else {
            metrics::queue_dequeues().add(1, &[KeyValue::new("result", "empty")]);
            return Ok(None);
        };
        self.note_pool_reclaimed(popped.reclaimed, popped.score);

        let removed = self.index.remove(popped.id);
        let indexed = self.consistent("dequeue", removed)?;
        if indexed != popped.score {
            let detail = format!(
                "item {} popped from pool {} but indexed at {indexed}",
                popped.id, popped.score
            );
            return Err(self.poison("dequeue", detail));
        }

        self.items_reclaimed += 1;
        metrics::queue_dequeues().add(1, &[KeyValue::new("result", "item")]);
        Ok(Some(Item {
            id: popped.id,
            score: popped.score,
        }))
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn score_of(&self, id: ItemId) -> Option<Score> {
        self.index.lookup(id)
    }

    pub fn peek_max_score(&self) -> Option<Score> {
        self.pools.peek_max_pool()
    }

    /// Pending items.
    pub fn item_count(&self) -> usize {
        self.index.len()
    }

    /// Live pools, one per distinct pending score.
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub fn items_reclaimed(&self) -> u64 {
        self.items_reclaimed
    }

    pub fn pools_reclaimed(&self) -> u64 {
        self.pools.reclaimed()
    }

    pub fn pools_created(&self) -> u64 {
        self.pools.created()
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Counter snapshot as of now.
    pub fn stats(&self) -> Stats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> Stats {
        Stats {
            uptime_secs: (now - self.started_at).num_seconds().max(0) as u64,
            version: env!("CARGO_PKG_VERSION").to_string(),
            updates: self.updates,
            items: self.index.len() as u64,
            pools: self.pools.len() as u64,
            pools_gc: self.pools.reclaimed(),
            items_gc: self.items_reclaimed,
        }
    }

    /// Full cross-check of the index against the pools.
    ///
    /// Linear in the number of pending items; meant for tests and diagnostics.
    pub fn verify(&self) -> Result<()> {
        if self.index.len() != self.pools.member_count() {
            return Err(Error::Inconsistent(format!(
                "{} indexed items but {} pool memberships",
                self.index.len(),
                self.pools.member_count()
            )));
        }
        for (id, score) in self.index.iter() {
            if !self.pools.contains(score, id) {
                return Err(Error::Inconsistent(format!(
                    "item {id} indexed at {score} but missing from that pool"
                )));
            }
        }
        for (score, id) in self.pools.iter() {
            if self.index.lookup(id) != Some(score) {
                return Err(Error::Inconsistent(format!(
                    "pool {score} holds item {id} which is not indexed there"
                )));
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn ensure_healthy(&self) -> Result<()> {
        match &self.poisoned {
            Some(reason) => Err(Error::Poisoned(reason.clone())),
            None => Ok(()),
        }
    }

    /// Sub-structure failures inside an operation mean the two structures
    /// disagree. Record it and refuse all further work.
    fn consistent<T>(&mut self, op: &str, result: Result<T>) -> Result<T> {
        result.map_err(|e| self.poison(op, e.to_string()))
    }

    fn poison(&mut self, op: &str, detail: String) -> Error {
        error!(op, %detail, "queue state inconsistent, refusing further operations");
        self.poisoned = Some(detail.clone());
        Error::Inconsistent(detail)
    }

    fn note_pool_created(&self, created: bool, score: Score) {
        if created {
            trace!(score, "pool created");
            metrics::pools_created().add(1, &[]);
        }
    }

    fn note_pool_reclaimed(&self, reclaimed: bool, score: Score) {
        if reclaimed {
            trace!(score, "pool reclaimed");
            metrics::pools_reclaimed().add(1, &[]);
        }
    }
}
