pub mod clock;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use mdnsd_proto::packet::record::Record;
use mdnsd_proto::packet::RecordType;

pub use clock::{Clock, FakeClock, SystemClock};

/// A record as held in the cache, carrying when it was learned so its
/// remaining TTL can be computed on every read instead of counted down by a
/// background timer.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub record: Record,
    pub created_at_ms: i64,
}

impl CacheEntry {
    fn elapsed_secs(&self, now_ms: i64) -> u32 {
        now_ms.saturating_sub(self.created_at_ms).max(0) as u32 / 1000
    }

    fn remaining_ttl(&self, now_ms: i64) -> u32 {
        self.record.ttl().saturating_sub(self.elapsed_secs(now_ms))
    }

    fn is_expired(&self, now_ms: i64) -> bool {
        self.remaining_ttl(now_ms) == 0
    }

    /// True once at least half the record's original TTL has elapsed.
    /// RFC 6762 §5.2 has a querier re-ask at 80/85/90/95% of the TTL; this
    /// cache surfaces the coarser 50% mark and leaves the exact schedule to
    /// the browser that owns the query timing.
    fn is_stale(&self, now_ms: i64) -> bool {
        let elapsed = self.elapsed_secs(now_ms);
        let half_life = self.record.ttl() / 2;
        elapsed >= half_life
    }

    fn aged_record(&self, now_ms: i64) -> Record {
        self.record.with_ttl(self.remaining_ttl(now_ms))
    }
}

/// The operations a responder or browser needs from the shared answer cache.
/// Kept as a trait so tests can substitute an in-memory mock, matching the
/// pluggable-service pattern used throughout this codebase.
pub trait CacheService: Send + Sync {
    /// Insert or refresh a record. A record with the same name/type/class/
    /// payload replaces the previous entry and resets its age; a TTL of zero
    /// is a proper RFC 6762 §10.1 goodbye record and immediately evicts any
    /// matching entry instead of being stored.
    fn add(&self, record: Record);

    /// Remove a specific record, if present.
    fn remove(&self, name: &str, record: &Record);

    /// All unexpired records for `name` restricted to `qtype`, aged to the
    /// caller's current time.
    fn get(&self, name: &str, qtype: RecordType) -> Vec<Record>;

    /// All unexpired records for `name`, of any type, aged to the caller's
    /// current time. Used to answer queries covering a whole service
    /// instance (e.g. fetching a PTR target's SRV/TXT/A set together).
    fn entries_with_name(&self, name: &str) -> Vec<Record>;

    /// Records for `name`/`qtype` whose TTL is at least half elapsed and
    /// that a browser should consider refreshing.
    fn stale(&self, name: &str, qtype: RecordType) -> Vec<Record>;

    /// Remove every entry that has fully expired, returning what was
    /// evicted so callers can synthesize removal notifications for them.
    fn expire(&self) -> Vec<Record>;
}

#[derive(Default)]
struct Shard {
    entries: HashMap<String, Vec<CacheEntry>>,
}

/// In-memory, name-indexed answer cache. Lookups are case-insensitive since
/// DNS names are (RFC 1035 §2.3.3 / RFC 6762 §16).
pub struct MemoryCache {
    clock: Arc<dyn Clock>,
    shard: Mutex<Shard>,
}

impl MemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            shard: Mutex::new(Shard::default()),
        }
    }

    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl CacheService for MemoryCache {
    #[tracing::instrument(skip(self, record), fields(name = %record.domain()))]
    fn add(&self, record: Record) {
        let now = self.clock.now_ms();
        let key = record.domain().to_ascii_lowercase();
        let mut shard = self.shard.lock().expect("cache mutex poisoned");
        let bucket = shard.entries.entry(key).or_default();

        if record.ttl() == 0 {
            tracing::debug!("goodbye record, evicting matching entry");
            bucket.retain(|entry| !entry.record.same_identity(&record));
            return;
        }

        if let Some(existing) = bucket
            .iter_mut()
            .find(|entry| entry.record.same_identity(&record))
        {
            existing.record = record;
            existing.created_at_ms = now;
        } else {
            bucket.push(CacheEntry {
                record,
                created_at_ms: now,
            });
        }
    }

    fn remove(&self, name: &str, record: &Record) {
        let key = name.to_ascii_lowercase();
        let mut shard = self.shard.lock().expect("cache mutex poisoned");
        if let Some(bucket) = shard.entries.get_mut(&key) {
            bucket.retain(|entry| !entry.record.same_identity(record));
        }
    }

    fn get(&self, name: &str, qtype: RecordType) -> Vec<Record> {
        let now = self.clock.now_ms();
        let key = name.to_ascii_lowercase();
        let shard = self.shard.lock().expect("cache mutex poisoned");
        shard
            .entries
            .get(&key)
            .into_iter()
            .flatten()
            .filter(|entry| entry.record.record_type() == qtype && !entry.is_expired(now))
            .map(|entry| entry.aged_record(now))
            .collect()
    }

    fn entries_with_name(&self, name: &str) -> Vec<Record> {
        let now = self.clock.now_ms();
        let key = name.to_ascii_lowercase();
        let shard = self.shard.lock().expect("cache mutex poisoned");
        shard
            .entries
            .get(&key)
            .into_iter()
            .flatten()
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.aged_record(now))
            .collect()
    }

    fn stale(&self, name: &str, qtype: RecordType) -> Vec<Record> {
        let now = self.clock.now_ms();
        let key = name.to_ascii_lowercase();
        let shard = self.shard.lock().expect("cache mutex poisoned");
        shard
            .entries
            .get(&key)
            .into_iter()
            .flatten()
            .filter(|entry| {
                entry.record.record_type() == qtype && !entry.is_expired(now) && entry.is_stale(now)
            })
            .map(|entry| entry.aged_record(now))
            .collect()
    }

    #[tracing::instrument(skip(self))]
    fn expire(&self) -> Vec<Record> {
        let now = self.clock.now_ms();
        let mut shard = self.shard.lock().expect("cache mutex poisoned");
        let mut expired = Vec::new();
        shard.entries.retain(|_, bucket| {
            let (keep, gone): (Vec<_>, Vec<_>) =
                std::mem::take(bucket).into_iter().partition(|entry| !entry.is_expired(now));
            expired.extend(gone.into_iter().map(|entry| entry.record));
            *bucket = keep;
            !bucket.is_empty()
        });
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "expired cache entries");
        }
        expired
    }
}

#[cfg(test)]
pub struct MockCache {
    records: Mutex<Vec<Record>>,
}

#[cfg(test)]
impl MockCache {
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

#[cfg(test)]
impl CacheService for MockCache {
    fn add(&self, record: Record) {
        self.records.lock().unwrap().push(record);
    }

    fn remove(&self, _name: &str, record: &Record) {
        self.records
            .lock()
            .unwrap()
            .retain(|existing| !existing.same_identity(record));
    }

    fn get(&self, name: &str, qtype: RecordType) -> Vec<Record> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.domain().eq_ignore_ascii_case(name) && r.record_type() == qtype)
            .cloned()
            .collect()
    }

    fn entries_with_name(&self, name: &str) -> Vec<Record> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.domain().eq_ignore_ascii_case(name))
            .cloned()
            .collect()
    }

    fn stale(&self, _name: &str, _qtype: RecordType) -> Vec<Record> {
        Vec::new()
    }

    fn expire(&self) -> Vec<Record> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdnsd_proto::packet::question::Class;
    use similar_asserts::assert_eq;
    use std::net::Ipv4Addr;

    fn a_record(ttl: u32) -> Record {
        Record::A {
            domain: "host.local".to_string(),
            class: Class::IN,
            addr: Ipv4Addr::new(10, 0, 0, 1),
            ttl,
        }
    }

    #[test]
    fn should_store_and_retrieve_a_record() {
        let cache = MemoryCache::new(Arc::new(FakeClock::new(0)));
        cache.add(a_record(120));
        let found = cache.get("host.local", RecordType::A);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ttl(), 120);
    }

    #[test]
    fn should_age_ttl_as_time_passes() {
        let clock = Arc::new(FakeClock::new(0));
        let cache = MemoryCache::new(clock.clone());
        cache.add(a_record(120));
        clock.advance(30_000);
        let found = cache.get("host.local", RecordType::A);
        assert_eq!(found[0].ttl(), 90);
    }

    #[test]
    fn should_stop_returning_an_expired_record() {
        let clock = Arc::new(FakeClock::new(0));
        let cache = MemoryCache::new(clock.clone());
        cache.add(a_record(10));
        clock.advance(11_000);
        assert!(cache.get("host.local", RecordType::A).is_empty());
    }

    #[test]
    fn should_evict_expired_entries_on_expire() {
        let clock = Arc::new(FakeClock::new(0));
        let cache = MemoryCache::new(clock.clone());
        cache.add(a_record(10));
        clock.advance(11_000);
        let expired = cache.expire();
        assert_eq!(expired.len(), 1);
        assert!(cache.entries_with_name("host.local").is_empty());
    }

    #[test]
    fn should_flag_stale_entries_past_half_ttl() {
        let clock = Arc::new(FakeClock::new(0));
        let cache = MemoryCache::new(clock.clone());
        cache.add(a_record(100));
        assert!(cache.stale("host.local", RecordType::A).is_empty());
        clock.advance(51_000);
        assert_eq!(cache.stale("host.local", RecordType::A).len(), 1);
    }

    #[test]
    fn should_treat_a_zero_ttl_record_as_a_goodbye() {
        let clock = Arc::new(FakeClock::new(0));
        let cache = MemoryCache::new(clock.clone());
        cache.add(a_record(120));
        cache.add(a_record(0));
        assert!(cache.get("host.local", RecordType::A).is_empty());
    }

    #[test]
    fn should_look_up_case_insensitively() {
        let cache = MemoryCache::new(Arc::new(FakeClock::new(0)));
        cache.add(a_record(120));
        assert_eq!(cache.get("HOST.LOCAL", RecordType::A).len(), 1);
    }

    #[test]
    fn mock_cache_supports_the_same_trait() {
        let mock = MockCache::with_records(vec![a_record(120)]);
        assert_eq!(mock.get("host.local", RecordType::A).len(), 1);
        mock.remove("host.local", &a_record(120));
        assert!(mock.get("host.local", RecordType::A).is_empty());
    }
}
