//! The record cache.
//!
//! The cache keeps every record received by the resolver until its TTL
//! runs out. Records are kept in an [`HTable`] keyed by the hash of their
//! owner name, so that all records for a name are found by walking a
//! single probe sequence.
//!
//! A cache is shared by all clones of a resolver. All access goes through
//! one lock. Readers only take out clones of the `Arc`s of the records,
//! so a record stays valid for its holders even if it is removed from the
//! cache right after.

use crate::base::iana::Rtype;
use crate::base::name::{name_eq, name_hash};
use crate::base::record::{Answers, Record};
use crate::utils::htable::{HTable, HashEntry};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// The minimum interval between two runs of [`Cache::clean`].
pub const CLEAN_INTERVAL: Duration = Duration::from_secs(5);

//------------ CacheEntry ----------------------------------------------------

/// A record stored in the cache.
#[derive(Debug)]
struct CacheEntry {
    /// The hash of the owner name.
    hash: u64,

    /// When the record was received.
    received: Instant,

    /// The record itself.
    record: Arc<Record>,
}

impl CacheEntry {
    /// Returns whether the record has outlived its TTL at `now`.
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.received)
            > Duration::from_secs(self.record.ttl().into())
    }

    /// Returns whether the entry is for `name` and of type `rtype`.
    ///
    /// A type of ANY matches every type.
    fn matches(&self, rtype: Rtype, name: &str) -> bool {
        (rtype == Rtype::ANY || self.record.rtype() == rtype)
            && name_eq(self.record.name(), name)
    }
}

impl HashEntry for CacheEntry {
    fn hash(&self) -> u64 {
        self.hash
    }
}

//------------ Cache ---------------------------------------------------------

/// A cache of resource records.
#[derive(Debug, Default)]
pub struct Cache {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// The entries.
    table: HTable<CacheEntry>,

    /// When the cache was last cleaned.
    cleaned: Option<Instant>,
}

impl Cache {
    /// Creates a new, empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records currently in the cache.
    ///
    /// This includes expired records not cleaned out yet.
    pub fn len(&self) -> usize {
        self.inner.lock().table.len()
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all live records of type `rtype` for `name`.
    ///
    /// The records are returned in the order they were added. If there
    /// are none, the returned list is empty.
    pub fn get(&self, rtype: Rtype, name: &str, now: Instant) -> Answers {
        let hash = name_hash(name);
        let inner = self.inner.lock();

        let live = || {
            inner
                .table
                .probe(hash)
                .map(|(_, entry)| entry)
                .filter(|entry| {
                    entry.hash == hash
                        && entry.matches(rtype, name)
                        && !entry.is_expired(now)
                })
        };
        let mut res = Answers::with_capacity(live().count());
        res.extend(live().map(|entry| entry.record.clone()));
        res
    }

    /// Stores a record.
    ///
    /// If the cache already holds an equal record for the same name and
    /// type, that record is replaced. For SOA records any record for the
    /// same name is replaced.
    pub fn store(&self, record: Arc<Record>, now: Instant) {
        let hash = name_hash(record.name());
        let mut inner = self.inner.lock();

        let existing = inner.table.probe(hash).find_map(|(slot, entry)| {
            if entry.hash == hash
                && entry.matches(record.rtype(), record.name())
                && (record.rtype() == Rtype::SOA
                    || entry.record.compare(&record).is_eq())
            {
                Some(slot)
            } else {
                None
            }
        });
        if let Some(entry) = existing.and_then(|slot| inner.table.get_mut(slot))
        {
            trace!("replacing {} {} in cache", record.name(), record.rtype());
            entry.received = now;
            entry.record = record;
            return;
        }

        trace!("storing {} {} in cache", record.name(), record.rtype());
        let entry = CacheEntry {
            hash,
            received: now,
            record,
        };
        if let Err(entry) = inner.table.append(entry) {
            debug!("cache full, dropping {}", entry.record.name());
        }
    }

    /// Stores all records produced by an iterator.
    pub fn store_all<'a>(
        &self,
        records: impl IntoIterator<Item = &'a Arc<Record>>,
        now: Instant,
    ) {
        for record in records {
            self.store(record.clone(), now)
        }
    }

    /// Removes expired records.
    ///
    /// Cleaning happens at most every [`CLEAN_INTERVAL`]. Calls in between
    /// do nothing. Returns the number of records removed.
    pub fn clean(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock();
        if let Some(cleaned) = inner.cleaned {
            if now.saturating_duration_since(cleaned) < CLEAN_INTERVAL {
                return 0;
            }
        }
        inner.cleaned = Some(now);

        // Removing an entry may move a later one back into its slot, so
        // only advance past slots that stay.
        let mut removed = 0;
        let mut slot = 0;
        while slot < inner.table.size() {
            match inner.table.get(slot) {
                Some(entry) if entry.is_expired(now) => {
                    inner.table.remove(slot);
                    removed += 1;
                }
                _ => slot += 1,
            }
        }
        if removed > 0 {
            trace!("cleaned {} expired records from cache", removed);
        }
        removed
    }

    /// Changes priority and TTL of cached SRV records.
    ///
    /// All SRV records for `domain` pointing to `target` and `port` get
    /// the given `priority` and a TTL of `ttl` seconds from `now`. This
    /// allows demoting a target that has been found unresponsive.
    ///
    /// Returns the number of modified records.
    pub fn set_srv_priority(
        &self,
        domain: &str,
        target: &str,
        port: u16,
        ttl: u32,
        priority: u16,
        now: Instant,
    ) -> usize {
        let hash = name_hash(domain);
        let mut inner = self.inner.lock();
        let slots: Vec<_> = inner
            .table
            .probe(hash)
            .filter(|(_, entry)| {
                entry.hash == hash
                    && entry.matches(Rtype::SRV, domain)
                    && entry.record.as_srv().map_or(false, |srv| {
                        srv.port == port && name_eq(&srv.target, target)
                    })
            })
            .map(|(slot, _)| slot)
            .collect();
        for &slot in &slots {
            if let Some(entry) = inner.table.get_mut(slot) {
                if let Some(srv) = entry.record.as_srv() {
                    srv.set_priority(priority);
                }
                entry.record.set_ttl(ttl);
                entry.received = now;
            }
        }
        slots.len()
    }
}

//============ Testing =======================================================
