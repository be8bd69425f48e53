//! Satellite-side preamble reception and collision resolution
//!
//! A node holds a fixed preamble space of `Z` orthogonal codes and a per-slot
//! map of terminal id to chosen code index. The map never survives a slot
//! boundary: the satellite has no cross-slot memory.

use rand::Rng;
use std::collections::{BTreeMap, HashMap};

/// One serving satellite's RA receiver.
#[derive(Debug, Clone)]
pub struct SatelliteNode {
    pub id: u32,
    preamble_space: u32,
    picks: BTreeMap<u32, u32>,
}

impl SatelliteNode {
    pub fn new(id: u32, preamble_space: u32) -> Self {
        Self {
            id,
            preamble_space,
            picks: BTreeMap::new(),
        }
    }

    /// Count of orthogonal preamble codes, `Z`.
    pub fn preamble_space(&self) -> u32 {
        self.preamble_space
    }

    /// Attempts submitted so far this slot.
    pub fn attempts(&self) -> usize {
        self.picks.len()
    }

    /// Accept an RA attempt from a terminal. The uniform draw in `[0, Z)`
    /// happens here at the receiver; the only observable quantity is which
    /// code index was chosen.
    pub fn receive_preamble(&mut self, terminal_id: u32, rng: &mut impl Rng) {
        let preamble = rng.gen_range(0..self.preamble_space);
        self.record_pick(terminal_id, preamble);
    }

    pub(crate) fn record_pick(&mut self, terminal_id: u32, preamble: u32) {
        self.picks.insert(terminal_id, preamble);
    }

    /// Resolve the current slot: terminals holding a singleton preamble index
    /// succeed, collided indices yield nothing. Clears the per-slot map
    /// unconditionally. Must be called exactly once per slot per node, after
    /// all attempts have been submitted.
    pub fn resolve_slot(&mut self) -> Vec<u32> {
        let mut index_counts: HashMap<u32, usize> = HashMap::new();
        for &preamble in self.picks.values() {
            *index_counts.entry(preamble).or_insert(0) += 1;
        }

        let winners: Vec<u32> = self
            .picks
            .iter()
            .filter(|(_, preamble)| index_counts[preamble] == 1)
            .map(|(&terminal, _)| terminal)
            .collect();

        self.picks.clear();
        winners
    }
}
