/*
Block data structure proposed in https://arxiv.org/pdf/2504.17033v1.

Parameterized by a subset size M (block capacity) and a fixed ceiling over
all values. Supported operations are Insert (decrease-key), BatchPrepend,
Delete, and Pull.

Insert(k, v): drops the update if the key already holds a value <= v,
otherwise evicts the stale entry, routes v to the D1 block whose interval
covers it via the red-black index (O(log(N/M))), and splits the block if it
overflows.
Batch-Prepend(L): deduplicates L to one minimum entry per key and pushes the
survivors as new blocks onto the D0 chain, bucketing oversized batches with
quicksplit through an explicit work stack.
Pull: removes up to the pull size globally-cheapest keys and returns them
with a watermark bounding everything left behind.
*/

use fnv::FnvHashMap;
use hashbrown::HashMap;
use log::{debug, trace};
use ordered_float::OrderedFloat;

use crate::arena::{Arena, Handle};
use crate::error::{Error, Result};
use crate::quicksplit::{quicksplit, quicksplit_dict};
use crate::rbtree::{FindMode, RbTree};
use crate::{Cost, NodeId};

/// Keys removed by a pull plus the smallest value known to remain (the
/// structure's ceiling when nothing does).
pub struct PullResult(pub Vec<NodeId>, pub Cost);

#[derive(Debug)]
struct Block {
    entries: Vec<(NodeId, Cost)>,
    upper_bound: Cost,
    prev: Option<Handle>,
    next: Option<Handle>,
}

/// Which chain a key currently lives in, and the block that owns its entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BlockLocation {
    Prepend(Handle),
    Insert(Handle),
}

impl BlockLocation {
    fn handle(self) -> Handle {
        match self {
            BlockLocation::Prepend(h) | BlockLocation::Insert(h) => h,
        }
    }
}

#[derive(Debug)]
pub struct BlockList {
    subset_size: usize,
    pull_size: usize,
    upper_bound: Cost,
    blocks: Arena<Block>,
    d0_head: Option<Handle>,
    d1: RbTree<OrderedFloat<Cost>, Handle>,
    keys: HashMap<NodeId, BlockLocation>,
}

impl BlockList {
    /// Creates an empty structure. The block capacity is `subset_size`
    /// clamped to at least 2 and the pull size is `subset_size` clamped to
    /// at least 1; `upper_bound` is the fixed ceiling over every value that
    /// will ever be inserted. One sentinel D1 block covering the whole
    /// value axis up to the ceiling is created up front and never removed.
    pub fn new(subset_size: usize, upper_bound: Cost) -> Self {
        let mut blocks = Arena::new();
        let mut d1 = RbTree::new();
        let sentinel = blocks.alloc(Block {
            entries: Vec::new(),
            upper_bound,
            prev: None,
            next: None,
        });
        d1.insert(OrderedFloat(upper_bound), sentinel);
        Self {
            subset_size: subset_size.max(2),
            pull_size: subset_size.max(1),
            upper_bound,
            blocks,
            d0_head: None,
            d1,
            keys: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Current location and value of a live key.
    fn lookup(&self, key: NodeId) -> Result<Option<(BlockLocation, Cost)>> {
        let Some(&loc) = self.keys.get(&key) else {
            return Ok(None);
        };
        let block = self.blocks.get(loc.handle());
        let value = block
            .entries
            .iter()
            .find(|e| e.0 == key)
            .map(|e| e.1)
            .ok_or_else(|| Error::defect(format!("key {key} missing from its mapped block")))?;
        Ok(Some((loc, value)))
    }

    /// Removes the key's entry from the block claiming to own it.
    fn remove_entry(&mut self, h: Handle, key: NodeId) -> Result<Cost> {
        let block = self.blocks.get_mut(h);
        let Some(i) = block.entries.iter().position(|e| e.0 == key) else {
            return Err(Error::invalid_argument(format!(
                "key {key} is not owned by its mapped block"
            )));
        };
        Ok(block.entries.remove(i).1)
    }

    fn unlink(&mut self, prev: Option<Handle>, next: Option<Handle>) {
        if let Some(p) = prev {
            self.blocks.get_mut(p).next = next;
        }
        if let Some(n) = next {
            self.blocks.get_mut(n).prev = prev;
        }
    }

    fn delete_d0(&mut self, key: NodeId, h: Handle) -> Result<()> {
        self.remove_entry(h, key)?;
        self.keys.remove(&key);

        let block = self.blocks.get(h);
        let (empty, prev, next) = (block.entries.is_empty(), block.prev, block.next);
        if empty {
            self.unlink(prev, next);
            if self.d0_head == Some(h) {
                self.d0_head = next;
            }
            self.blocks.free(h);
        }
        Ok(())
    }

    fn delete_d1(&mut self, key: NodeId, h: Handle) -> Result<()> {
        self.remove_entry(h, key)?;
        self.keys.remove(&key);

        let block = self.blocks.get(h);
        let (empty, ub, prev, next) = (block.entries.is_empty(), block.upper_bound, block.prev, block.next);
        // The sentinel block stays even when emptied.
        if empty && ub != self.upper_bound {
            if self.d1.get(&OrderedFloat(ub)).copied() == Some(h) {
                // Another block may share this bound right behind us; if so
                // it takes over the index entry instead of dropping it.
                match next.filter(|&n| self.blocks.get(n).upper_bound == ub) {
                    Some(n) => self.d1.insert(OrderedFloat(ub), n),
                    None => self.d1.remove(&OrderedFloat(ub)),
                }
            }
            self.unlink(prev, next);
            self.blocks.free(h);
        }
        Ok(())
    }

    fn evict(&mut self, key: NodeId, loc: BlockLocation) -> Result<()> {
        match loc {
            BlockLocation::Prepend(h) => self.delete_d0(key, h),
            BlockLocation::Insert(h) => self.delete_d1(key, h),
        }
    }

    /// Removes a key outright. Deleting an absent key is a usage error.
    pub fn delete(&mut self, key: NodeId) -> Result<()> {
        match self.keys.get(&key).copied() {
            Some(loc) => self.evict(key, loc),
            None => Err(Error::invalid_argument(format!(
                "key {key} is not in the structure"
            ))),
        }
    }

    /// Decrease-key insert: a value not strictly better than the key's
    /// current one is a no-op.
    pub fn insert(&mut self, key: NodeId, value: Cost) -> Result<()> {
        if let Some((loc, existing)) = self.lookup(key)? {
            if existing <= value {
                return Ok(());
            }
            self.evict(key, loc)?;
        }

        let target = self
            .d1
            .find(&OrderedFloat(value), FindMode::Upper)
            .map(|(_, &h)| h)
            .ok_or_else(|| {
                Error::defect(format!(
                    "no D1 block covers value {value}; ceiling is {}",
                    self.upper_bound
                ))
            })?;
        self.blocks.get_mut(target).entries.push((key, value));
        self.keys.insert(key, BlockLocation::Insert(target));

        if self.blocks.get(target).entries.len() > self.subset_size {
            self.split(target)?;
        }
        Ok(())
    }

    /// Splits an overflowing D1 block around its median: everything
    /// strictly below the median, topped up with median-valued entries to
    /// half the original size, moves into a new block chained immediately
    /// before the original and registered under the median as its bound.
    fn split(&mut self, h: Handle) -> Result<()> {
        let values: Vec<Cost> = self.blocks.get(h).entries.iter().map(|e| e.1).collect();
        let median_value = quicksplit(&values, values.len().div_ceil(2))?.pivot;

        let own_bound = self.blocks.get(h).upper_bound;
        let existing_head = self
            .d1
            .get(&OrderedFloat(median_value))
            .copied()
            .filter(|_| median_value != own_bound);

        let maximum_size = self.blocks.get(h).entries.len() / 2;
        let entries = std::mem::take(&mut self.blocks.get_mut(h).entries);
        let mut moved: Vec<(NodeId, Cost)> = Vec::new();
        let mut rest: Vec<(NodeId, Cost)> = Vec::with_capacity(entries.len());
        for e in entries {
            if e.1 < median_value {
                moved.push(e);
            } else {
                rest.push(e);
            }
        }
        let mut kept: Vec<(NodeId, Cost)> = Vec::with_capacity(rest.len());
        for e in rest {
            if moved.len() < maximum_size && e.1 == median_value {
                moved.push(e);
            } else {
                kept.push(e);
            }
        }

        if moved.is_empty() {
            // Every entry sat at or above an all-median boundary; nothing
            // to move, the block stays as it was.
            self.blocks.get_mut(h).entries = kept;
            return Ok(());
        }
        if kept.is_empty() {
            return Err(Error::defect("split emptied the source block"));
        }
        self.blocks.get_mut(h).entries = kept;

        trace!(
            "split block at median {median_value}: {} moved, {} kept",
            moved.len(),
            self.blocks.get(h).entries.len()
        );

        let moved_keys: Vec<NodeId> = moved.iter().map(|e| e.0).collect();
        let new_h = match existing_head {
            None => {
                // Take over the interval below the median.
                let prev = self.blocks.get(h).prev;
                let new_h = self.blocks.alloc(Block {
                    entries: moved,
                    upper_bound: median_value,
                    prev,
                    next: Some(h),
                });
                if let Some(p) = prev {
                    self.blocks.get_mut(p).next = Some(new_h);
                }
                self.blocks.get_mut(h).prev = Some(new_h);
                self.d1.insert(OrderedFloat(median_value), new_h);
                new_h
            }
            Some(head) => {
                // A block with this exact bound already exists. That is
                // only consistent when every moved entry sits exactly on
                // the boundary; the new block then chains right after the
                // registered one without its own index entry.
                if moved.iter().any(|e| e.1 != median_value) {
                    return Err(Error::defect(
                        "split collided with an existing bound over non-boundary entries",
                    ));
                }
                let next = self.blocks.get(head).next;
                let new_h = self.blocks.alloc(Block {
                    entries: moved,
                    upper_bound: median_value,
                    prev: Some(head),
                    next,
                });
                if let Some(n) = next {
                    self.blocks.get_mut(n).prev = Some(new_h);
                }
                self.blocks.get_mut(head).next = Some(new_h);
                new_h
            }
        };
        for key in moved_keys {
            self.keys.insert(key, BlockLocation::Insert(new_h));
        }
        Ok(())
    }

    fn push_d0_block(&mut self, pairs: FnvHashMap<NodeId, Cost>) {
        let entries: Vec<(NodeId, Cost)> = pairs.into_iter().collect();
        let ids: Vec<NodeId> = entries.iter().map(|e| e.0).collect();
        let old_head = self.d0_head;
        let h = self.blocks.alloc(Block {
            entries,
            upper_bound: Cost::INFINITY,
            prev: None,
            next: old_head,
        });
        if let Some(o) = old_head {
            self.blocks.get_mut(o).prev = Some(h);
        }
        self.d0_head = Some(h);
        for id in ids {
            self.keys.insert(id, BlockLocation::Prepend(h));
        }
    }

    /// Pushes a batch of entries ahead of the main order. The batch is
    /// deduplicated to one minimum entry per key; pairs strictly dominated
    /// by an entry already in the structure are dropped, anything else
    /// evicts the weaker-or-equal entry it replaces.
    pub fn batch_prepend(&mut self, pairs: impl IntoIterator<Item = (NodeId, Cost)>) -> Result<()> {
        let mut min_pairs: FnvHashMap<NodeId, Cost> = FnvHashMap::default();
        for (key, value) in pairs {
            if min_pairs.get(&key).is_some_and(|&v| value >= v) {
                continue;
            }
            if let Some((loc, existing)) = self.lookup(key)? {
                if existing < value {
                    continue;
                }
                self.evict(key, loc)?;
            }
            min_pairs.insert(key, value);
        }
        if min_pairs.is_empty() {
            return Ok(());
        }

        if min_pairs.len() <= self.subset_size {
            self.push_d0_block(min_pairs);
            return Ok(());
        }

        // Bucket the batch into block-sized halves with an explicit work
        // stack; the lower half of each split is pushed last so the
        // cheapest bucket ends up at the head of D0.
        let mut stack = vec![min_pairs];
        while let Some(current) = stack.pop() {
            if current.len() <= self.subset_size {
                self.push_d0_block(current);
            } else {
                let split = quicksplit_dict(&current, current.len().div_ceil(2))?;
                trace!(
                    "batch bucket split: {} below pivot {}, {} above",
                    split.lower.len(),
                    split.pivot,
                    split.higher.len()
                );
                if !split.lower.is_empty() {
                    stack.push(split.lower);
                }
                if !split.higher.is_empty() {
                    stack.push(split.higher);
                }
            }
        }
        Ok(())
    }

    /// Removes and returns up to the pull size globally-cheapest keys.
    ///
    /// Candidates are gathered block-wise from the front of D0 and from the
    /// minimum D1 block onward, each side capped at the subset size; when
    /// the union is too large the selector trims it to exactly the pull
    /// size smallest by value. The returned watermark is the smallest value
    /// remaining at the front of either chain, or the ceiling when the
    /// structure is empty.
    pub fn pull(&mut self) -> Result<PullResult> {
        let mut smallest_d0: Vec<NodeId> = Vec::new();
        let mut cur = self.d0_head;
        while let Some(h) = cur {
            if smallest_d0.len() >= self.subset_size {
                break;
            }
            let block = self.blocks.get(h);
            smallest_d0.extend(block.entries.iter().map(|e| e.0));
            cur = block.next;
        }

        let mut smallest_d1: Vec<NodeId> = Vec::new();
        let mut cur = self.d1.get_min().map(|(_, &h)| h);
        while let Some(h) = cur {
            if smallest_d1.len() >= self.subset_size {
                break;
            }
            let block = self.blocks.get(h);
            smallest_d1.extend(block.entries.iter().map(|e| e.0));
            cur = block.next;
        }

        let mut combined = smallest_d0;
        combined.extend(smallest_d1);

        let subset: Vec<NodeId> = if combined.len() > self.pull_size {
            let mut values: FnvHashMap<NodeId, Cost> = FnvHashMap::default();
            for &key in &combined {
                let (_, value) = self
                    .lookup(key)?
                    .ok_or_else(|| Error::defect(format!("pull candidate {key} is not live")))?;
                values.insert(key, value);
            }
            quicksplit_dict(&values, self.pull_size)?
                .lower
                .into_keys()
                .collect()
        } else {
            combined
        };

        for &key in &subset {
            if let Some(&loc) = self.keys.get(&key) {
                self.evict(key, loc)?;
            }
        }

        let mut remaining_best = self.upper_bound;
        if let Some(h) = self.d0_head {
            for &(_, v) in &self.blocks.get(h).entries {
                remaining_best = remaining_best.min(v);
            }
        }
        if let Some((_, &h)) = self.d1.get_min() {
            for &(_, v) in &self.blocks.get(h).entries {
                remaining_best = remaining_best.min(v);
            }
        }

        debug!("pull: {} keys, watermark {remaining_best}", subset.len());
        Ok(PullResult(subset, remaining_best))
    }
}
