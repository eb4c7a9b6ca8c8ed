//! Metadata interning.
//!
//! Registry inputs repeat the same country/AS rows across huge numbers
//! of prefixes. The table stores each structurally distinct value once
//! and keeps the list of prefixes that reference it, so downstream
//! range entries carry a small id instead of the strings.

use std::hash::Hash;

use ahash::AHashMap;
use ipnet::IpNet;

use crate::error::{Error, Result};

/// Upper bound on distinct ids in one table.
pub const MAX_TABLE_IDS: u32 = 1 << 24;

/// Deduplicating prefix-to-value table with 1-based ids.
///
/// Id 0 is reserved to mean "absent" in joined metadata. Equality is
/// structural over all fields of `T`.
pub struct UniquePrefixTable<T> {
    ids: AHashMap<T, u32>,
    values: Vec<T>,
    prefixes: Vec<Vec<IpNet>>,
}

impl<T: Clone + Eq + Hash> UniquePrefixTable<T> {
    pub fn new() -> Self {
        Self {
            ids: AHashMap::new(),
            values: Vec::new(),
            prefixes: Vec::new(),
        }
    }

    /// Associate `net` with `value`, interning the value.
    ///
    /// Returns the value's id. Exceeding [`MAX_TABLE_IDS`] distinct
    /// values is fatal to ingestion.
    pub fn add(&mut self, net: IpNet, value: T) -> Result<u32> {
        if let Some(&id) = self.ids.get(&value) {
            self.prefixes[(id - 1) as usize].push(net);
            return Ok(id);
        }

        if self.values.len() as u32 >= MAX_TABLE_IDS {
            return Err(Error::InternOverflow);
        }

        self.values.push(value.clone());
        self.prefixes.push(vec![net]);
        let id = self.values.len() as u32;
        self.ids.insert(value, id);
        Ok(id)
    }

    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Interned values in insertion (id) order.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Prefixes associated with an id; empty for unknown ids.
    pub fn prefixes(&self, id: u32) -> &[IpNet] {
        match id.checked_sub(1).map(|i| self.prefixes.get(i as usize)) {
            Some(Some(list)) => list,
            _ => &[],
        }
    }

    /// Visit every `(id, prefixes, value)` triple in id order.
    pub fn for_each(&self, mut f: impl FnMut(u32, &[IpNet], &T)) {
        for (i, value) in self.values.iter().enumerate() {
            f((i + 1) as u32, &self.prefixes[i], value);
        }
    }

    /// Keep only the value array, releasing the id map and all prefix
    /// lists.
    pub fn into_values(self) -> Vec<T> {
        self.values
    }

    /// Release all internal storage.
    pub fn clear(&mut self) {
        self.ids = AHashMap::new();
        self.values = Vec::new();
        self.prefixes = Vec::new();
    }
}

impl<T: Clone + Eq + Hash> Default for UniquePrefixTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn test_equal_values_share_one_id() {
        let mut table = UniquePrefixTable::new();

        let a = table.add(net("10.0.0.0/8"), ("US", "United States")).unwrap();
        let b = table.add(net("8.8.8.0/24"), ("US", "United States")).unwrap();
        let c = table.add(net("77.0.0.0/8"), ("DE", "Germany")).unwrap();

        assert_eq!(a, 1);
        assert_eq!(b, 1);
        assert_eq!(c, 2);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.prefixes(1),
            &[net("10.0.0.0/8"), net("8.8.8.0/24")]
        );
        assert_eq!(table.prefixes(2), &[net("77.0.0.0/8")]);
    }

    #[test]
    fn test_ids_are_one_based_insertion_order() {
        let mut table = UniquePrefixTable::new();
        table.add(net("1.0.0.0/8"), "first").unwrap();
        table.add(net("2.0.0.0/8"), "second").unwrap();

        assert_eq!(table.values(), &["first", "second"]);

        let mut seen = Vec::new();
        table.for_each(|id, prefixes, value| {
            seen.push((id, prefixes.len(), *value));
        });
        assert_eq!(seen, [(1, 1, "first"), (2, 1, "second")]);
    }

    #[test]
    fn test_unknown_id_has_no_prefixes() {
        let table: UniquePrefixTable<&str> = UniquePrefixTable::new();
        assert!(table.prefixes(0).is_empty());
        assert!(table.prefixes(7).is_empty());
    }

    #[test]
    fn test_into_values_keeps_order() {
        let mut table = UniquePrefixTable::new();
        table.add(net("1.0.0.0/8"), "a").unwrap();
        table.add(net("2.0.0.0/8"), "b").unwrap();
        table.add(net("3.0.0.0/8"), "a").unwrap();

        assert_eq!(table.into_values(), ["a", "b"]);
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut table = UniquePrefixTable::new();
        table.add(net("1.0.0.0/8"), "a").unwrap();
        table.clear();
        assert!(table.is_empty());
        assert!(table.prefixes(1).is_empty());
    }
}
