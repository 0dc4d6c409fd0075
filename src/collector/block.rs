//! Block table: maps block bases to their bookkeeping.

use std::collections::BTreeMap;

use super::{Finalizer, Region};

/// Bookkeeping for one collector block.
pub(crate) struct Block {
    /// Generation id; never reused, so stale queue entries can be detected.
    pub id: u64,
    /// Payload bytes actually reserved (granule multiple, never zero).
    pub capacity: usize,
    pub region: Region,
    pub finalizer: Option<Finalizer>,
    /// Queued for finalization, callback not yet run.
    pub finalization_pending: bool,
    /// Finalizer callback currently running.
    pub finalizing: bool,
    /// Bumped on every enqueue and every registration change; only the
    /// queue entry carrying the current value may run.
    pub finalization_seq: u64,
    pub marked: bool,
}

impl Block {
    pub fn new(id: u64, capacity: usize, region: Region) -> Self {
        Self {
            id,
            capacity,
            region,
            finalizer: None,
            finalization_pending: false,
            finalizing: false,
            finalization_seq: 0,
            marked: false,
        }
    }

    /// Kept alive regardless of reachability.
    pub fn is_root(&self) -> bool {
        self.region == Region::Uncollectable || self.finalization_pending || self.finalizing
    }

    /// Bytes of the block visible to the scanner, in whole words.
    pub fn scan_words(&self) -> usize {
        self.capacity / std::mem::size_of::<usize>()
    }
}

/// Ordered map of live blocks keyed by base address.
#[derive(Default)]
pub(crate) struct BlockTable {
    blocks: BTreeMap<usize, Block>,
}

impl BlockTable {
    pub fn insert(&mut self, base: usize, block: Block) {
        self.blocks.insert(base, block);
    }

    pub fn remove(&mut self, base: usize) -> Option<Block> {
        self.blocks.remove(&base)
    }

    pub fn get(&self, base: usize) -> Option<&Block> {
        self.blocks.get(&base)
    }

    pub fn get_mut(&mut self, base: usize) -> Option<&mut Block> {
        self.blocks.get_mut(&base)
    }

    /// Base of the block whose payload contains `addr` (interior pointers included).
    pub fn containing(&self, addr: usize) -> Option<usize> {
        let (&base, block) = self.blocks.range(..=addr).next_back()?;
        if addr - base < block.capacity {
            Some(base)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Block)> {
        self.blocks.iter().map(|(&base, block)| (base, block))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Block)> {
        self.blocks.iter_mut().map(|(&base, block)| (base, block))
    }

    /// Remove every block matching `pred`, returning them with their bases.
    pub fn drain_where(&mut self, mut pred: impl FnMut(&Block) -> bool) -> Vec<(usize, Block)> {
        let doomed: Vec<usize> = self
            .blocks
            .iter()
            .filter(|(_, block)| pred(block))
            .map(|(&base, _)| base)
            .collect();
        doomed
            .into_iter()
            .filter_map(|base| self.blocks.remove(&base).map(|block| (base, block)))
            .collect()
    }
}
