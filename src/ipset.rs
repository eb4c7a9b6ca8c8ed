//! Sorted IP interval index.
//!
//! Ranges are collected through [`IpRangeSetBuilder`] and frozen into
//! an [`IpRangeSet`] by `prepare`. The frozen set has no mutators, so
//! concurrent readers need no synchronisation; lookup is a binary
//! search over 128-bit keys.

use std::net::IpAddr;

use ipnet::IpNet;

use crate::key;

#[derive(Debug)]
struct RangeEntry<T> {
    start: u128,
    end: u128,
    data: T,
}

impl<T> RangeEntry<T> {
    fn contains(&self, k: u128) -> bool {
        self.start <= k && k <= self.end
    }
}

/// Accumulates ranges before the freeze.
pub struct IpRangeSetBuilder<T> {
    set: Vec<RangeEntry<T>>,
}

impl<T> IpRangeSetBuilder<T> {
    pub fn new() -> Self {
        Self { set: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            set: Vec::with_capacity(capacity),
        }
    }

    /// Append the range a prefix denotes.
    pub fn add_prefix(&mut self, net: &IpNet, data: T) {
        let (start, end) = key::prefix_range(net);
        self.set.push(RangeEntry { start, end, data });
    }

    /// Append an explicit closed address range.
    pub fn add_range(&mut self, start: IpAddr, end: IpAddr, data: T) {
        self.set.push(RangeEntry {
            start: key::addr_key(start),
            end: key::addr_key(end),
            data,
        });
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Sort by start key (stable, ties by end key), trim capacity and
    /// freeze. Insertion order does not affect the result.
    pub fn prepare(mut self) -> IpRangeSet<T> {
        self.set.sort_by(|a, b| (a.start, a.end).cmp(&(b.start, b.end)));
        self.set.shrink_to_fit();
        IpRangeSet { set: self.set }
    }
}

impl<T> Default for IpRangeSetBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Frozen, binary-searchable set of disjoint IP ranges.
#[derive(Debug)]
pub struct IpRangeSet<T> {
    set: Vec<RangeEntry<T>>,
}

impl<T> IpRangeSet<T> {
    /// Find the range containing `addr`.
    ///
    /// Returns the prefix the winning range encodes and its data.
    pub fn get(&self, addr: IpAddr) -> Option<(IpNet, &T)> {
        let k = key::addr_key(addr);

        // lower bound: first entry with start >= k
        let i = self.set.partition_point(|e| e.start < k);

        if let Some(e) = self.set.get(i) {
            if e.contains(k) {
                return Some((key::range_prefix(e.start, e.end), &e.data));
            }
        }

        // k may sit inside the previous range when it is strictly
        // greater than that range's start
        if i > 0 {
            let e = &self.set[i - 1];
            if e.contains(k) {
                return Some((key::range_prefix(e.start, e.end), &e.data));
            }
        }

        None
    }

    /// Number of stored ranges.
    pub fn size(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}
