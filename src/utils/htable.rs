//! An open-addressing hash table.
//!
//! [`HTable`] stores entries that know their own hash value in a single
//! array of slots, resolving collisions by linear probing. Unlike a
//! `HashMap`, the table exposes its slots: callers walk the probe sequence
//! for a hash value themselves and compare whatever they need to compare.
//! This allows several entries with the same hash to coexist, which is
//! exactly what the record cache needs: all records of a domain name share
//! the name's hash and are told apart by type and value.
//!
//! Entries are either appended to the end of their probe chain, which
//! keeps entries with equal hash in the order they were added, or
//! inserted at the front of it. Removal shifts later entries of the chain
//! back so that every entry stays reachable from its primary slot without
//! the need for tombstones.

use std::collections::TryReserveError;
use std::{fmt, mem};

/// The smallest number of slots a table is created with.
pub const MIN_SIZE: usize = 31;

//------------ HashEntry -----------------------------------------------------

/// An entry that can be stored in a hash table.
pub trait HashEntry {
    /// Returns the hash value of the entry.
    ///
    /// The value must not change while the entry is in a table.
    fn hash(&self) -> u64;
}

//------------ HTable --------------------------------------------------------

/// A hash table using open addressing with linear probing.
pub struct HTable<T> {
    /// The slots.
    slots: Vec<Option<T>>,

    /// The number of occupied slots.
    used: usize,
}

impl<T> HTable<T> {
    /// Creates a new empty table without allocating slots.
    pub const fn new() -> Self {
        HTable {
            slots: Vec::new(),
            used: 0,
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.used
    }

    /// Returns whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Returns the number of slots.
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Returns whether the table should be resized before adding entries.
    ///
    /// This is the case if no slots have been allocated yet or if more
    /// than two thirds of the slots are used.
    pub fn is_full(&self) -> bool {
        self.slots.is_empty() || 3 * self.used > 2 * self.slots.len()
    }

    /// Returns the slot following `slot` in a probe sequence.
    pub fn next(&self, slot: usize) -> usize {
        if slot + 1 >= self.slots.len() {
            0
        } else {
            slot + 1
        }
    }

    /// Returns a reference to the entry in a slot.
    pub fn get(&self, slot: usize) -> Option<&T> {
        self.slots.get(slot)?.as_ref()
    }

    /// Returns a mutable reference to the entry in a slot.
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.slots.get_mut(slot)?.as_mut()
    }

    /// Returns an iterator over all occupied slots and their entries.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| Some((slot, entry.as_ref()?)))
    }

    /// Removes all entries, keeping the slots.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.used = 0;
    }
}

impl<T: HashEntry> HTable<T> {
    /// Returns the primary slot for a hash value.
    ///
    /// Must only be called on a table with slots.
    pub fn bucket(&self, hash: u64) -> usize {
        // The remainder is smaller than the size, so it fits.
        (hash % self.slots.len() as u64) as usize
    }

    /// Returns an iterator over the probe sequence for `hash`.
    ///
    /// The iterator yields all entries from the primary slot of `hash` up
    /// to the next empty slot. Those may include entries with other hash
    /// values.
    pub fn probe(&self, hash: u64) -> Probe<T> {
        Probe {
            table: self,
            slot: if self.slots.is_empty() {
                None
            } else {
                Some(self.bucket(hash))
            },
            steps: 0,
        }
    }

    /// Changes the number of slots, rehashing all entries.
    ///
    /// The new size is `requested` or, if that is zero, twice the current
    /// size plus one. It is never less than [`MIN_SIZE`] or five fourths of
    /// the number of entries. If allocating the new slots fails, the table
    /// is left unchanged.
    pub fn resize(&mut self, requested: usize) -> Result<(), TryReserveError> {
        let mut new_size = if requested == 0 {
            2 * self.slots.len() + 1
        } else {
            requested
        };
        new_size = new_size.max(MIN_SIZE).max(5 * self.used / 4);

        let mut new_slots = Vec::new();
        new_slots.try_reserve_exact(new_size)?;
        new_slots.resize_with(new_size, || None);

        let mut old_slots = mem::replace(&mut self.slots, new_slots);
        let old_size = old_slots.len();

        // The first pass moves entries in slot order, skipping the ones
        // that wrapped around the end of the old table. These belong
        // behind the end of their chain and are moved in the second pass
        // so that entries with equal hash keep their order.
        for pass in 0..2 {
            for (index, slot) in old_slots.iter_mut().enumerate() {
                let wrapped = match slot {
                    Some(entry) => {
                        (entry.hash() % old_size as u64) as usize > index
                    }
                    None => continue,
                };
                if pass == 0 && wrapped {
                    continue;
                }
                if let Some(entry) = slot.take() {
                    let mut i = self.bucket(entry.hash());
                    while self.slots[i].is_some() {
                        i = self.next(i);
                    }
                    self.slots[i] = Some(entry);
                }
            }
        }
        Ok(())
    }

    /// Makes sure there is room for one more entry.
    fn reserve(&mut self) -> Result<(), TryReserveError> {
        if self.is_full() {
            self.resize(0)
        } else {
            Ok(())
        }
    }

    /// Adds an entry at the end of its probe chain.
    ///
    /// Returns the slot the entry was placed in. If the table needs to
    /// grow and allocating fails, the entry is handed back.
    pub fn append(&mut self, entry: T) -> Result<usize, T> {
        if self.reserve().is_err() {
            return Err(entry);
        }
        let mut slot = self.bucket(entry.hash());
        while self.slots[slot].is_some() {
            slot = self.next(slot);
        }
        self.slots[slot] = Some(entry);
        self.used += 1;
        Ok(slot)
    }

    /// Adds an entry at the front of its probe chain.
    ///
    /// All entries from the primary slot up to the next empty slot move
    /// one slot further. Returns the slot the entry was placed in. If the
    /// table needs to grow and allocating fails, the entry is handed back.
    pub fn insert(&mut self, entry: T) -> Result<usize, T> {
        if self.reserve().is_err() {
            return Err(entry);
        }
        let first = self.bucket(entry.hash());
        let mut slot = first;
        let mut entry = Some(entry);
        while entry.is_some() {
            entry = mem::replace(&mut self.slots[slot], entry);
            slot = self.next(slot);
        }
        self.used += 1;
        Ok(first)
    }

    /// Removes the entry in a slot.
    ///
    /// Later entries of the probe sequence are moved back into the gap
    /// unless that would move them in front of their primary slot.
    pub fn remove(&mut self, slot: usize) -> Option<T> {
        let res = self.slots.get_mut(slot)?.take()?;
        self.used -= 1;

        let mut gap = slot;
        let mut j = self.next(gap);
        while let Some(entry) = self.slots[j].as_ref() {
            let k = self.bucket(entry.hash());
            // The entry has to stay if its primary slot lies cyclically
            // in (gap, j].
            let stays = if gap <= j {
                gap < k && k <= j
            } else {
                gap < k || k <= j
            };
            if !stays {
                self.slots[gap] = self.slots[j].take();
                gap = j;
            }
            j = self.next(j);
        }
        Some(res)
    }
}

impl<T> Default for HTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for HTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HTable")
            .field("size", &self.slots.len())
            .field("used", &self.used)
            .finish()
    }
}

//------------ Probe ---------------------------------------------------------

/// An iterator over a probe sequence.
///
/// Yields the slot index and entry of each occupied slot starting at the
/// primary slot of a hash value up to the first empty slot.
pub struct Probe<'a, T> {
    table: &'a HTable<T>,
    slot: Option<usize>,
    steps: usize,
}

impl<'a, T> Iterator for Probe<'a, T> {
    type Item = (usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.slot?;
        // Stop after one full round.
        if self.steps >= self.table.size() {
            self.slot = None;
            return None;
        }
        match self.table.get(slot) {
            Some(entry) => {
                self.slot = Some(self.table.next(slot));
                self.steps += 1;
                Some((slot, entry))
            }
            None => {
                self.slot = None;
                None
            }
        }
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Clone, Debug, Eq, PartialEq)]
    struct Entry {
        hash: u64,
        tag: u32,
    }

    impl HashEntry for Entry {
        fn hash(&self) -> u64 {
            self.hash
        }
    }

    fn entry(hash: u64, tag: u32) -> Entry {
        Entry { hash, tag }
    }

    fn chain(table: &HTable<Entry>, hash: u64) -> Vec<u32> {
        table
            .probe(hash)
            .filter(|(_, e)| e.hash == hash)
            .map(|(_, e)| e.tag)
            .collect()
    }

    #[test]
    fn full_heuristic() {
        let mut table = HTable::new();
        assert!(table.is_full());
        table.resize(0).unwrap();
        assert_eq!(table.size(), MIN_SIZE);
        for i in 0..20 {
            table.append(entry(i, 0)).unwrap();
        }
        assert!(!table.is_full());
        table.append(entry(20, 0)).unwrap();
        assert!(table.is_full());
        table.append(entry(21, 0)).unwrap();
        assert_eq!(table.size(), 2 * MIN_SIZE + 1);
        assert_eq!(table.len(), 22);
    }

    #[test]
    fn append_keeps_order_insert_goes_first() {
        let mut table = HTable::new();
        table.append(entry(5, 1)).unwrap();
        table.append(entry(5, 2)).unwrap();
        table.append(entry(6, 3)).unwrap();
        table.insert(entry(5, 0)).unwrap();
        assert_eq!(chain(&table, 5), [0, 1, 2]);
        assert_eq!(chain(&table, 6), [3]);
    }

    #[test]
    fn wrapping_chain() {
        let mut table = HTable::new();
        table.resize(MIN_SIZE).unwrap();
        let last = (MIN_SIZE - 1) as u64;
        for tag in 0..4 {
            table.append(entry(last, tag)).unwrap();
        }
        table.append(entry(0, 10)).unwrap();
        assert_eq!(table.get(0).unwrap().hash, last);
        assert_eq!(chain(&table, last), [0, 1, 2, 3]);
        assert_eq!(chain(&table, 0), [10]);

        // Growing keeps the order of the wrapped chain.
        table.resize(0).unwrap();
        assert_eq!(chain(&table, last), [0, 1, 2, 3]);
        assert_eq!(chain(&table, 0), [10]);
    }

    #[test]
    fn remove_keeps_entries_reachable() {
        let mut table = HTable::new();
        table.resize(MIN_SIZE).unwrap();
        let last = (MIN_SIZE - 1) as u64;
        table.append(entry(last, 0)).unwrap();
        table.append(entry(last, 1)).unwrap();
        table.append(entry(0, 2)).unwrap();
        table.append(entry(1, 3)).unwrap();
        table.append(entry(0, 4)).unwrap();

        let slot = table
            .probe(last)
            .find(|(_, e)| e.tag == 0)
            .map(|(slot, _)| slot)
            .unwrap();
        assert_eq!(table.remove(slot), Some(entry(last, 0)));
        assert_eq!(table.len(), 4);
        assert_eq!(chain(&table, last), [1]);
        assert_eq!(chain(&table, 0), [2, 4]);
        assert_eq!(chain(&table, 1), [3]);

        // Every entry is still found starting from its primary slot.
        for (_, e) in table.iter() {
            assert!(table.probe(e.hash).any(|(_, x)| x == e));
        }
        assert_eq!(table.remove(slot + 100), None);
    }

    #[test]
    fn remove_everything() {
        let mut table = HTable::new();
        for i in 0..100u32 {
            table.append(entry(u64::from(i % 7), i)).unwrap();
        }
        for i in 0..100u32 {
            let hash = u64::from(i % 7);
            let slot = table
                .probe(hash)
                .find(|(_, e)| e.tag == i)
                .map(|(slot, _)| slot)
                .unwrap();
            table.remove(slot).unwrap();
            for (_, e) in table.iter() {
                assert!(table.probe(e.hash).any(|(_, x)| x == e));
            }
        }
        assert!(table.is_empty());
        assert_eq!(table.iter().count(), 0);
    }
}
