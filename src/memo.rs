//! Bounded memoization cache for `do_rewrite` results, keyed by an atom's
//! structural digest plus the active-ruleset bitset it was rewritten
//! under. Entries are tagged with the rule/ruleset generation they were
//! computed against; a generation bump (any rule or ruleset mutation)
//! makes every existing entry stale without needing a full flush, since
//! staleness is checked lazily on lookup.

use lru::LruCache;

use crate::atom::Atom;
use crate::errors::fatal_cache_inconsistent;

type Key = (u64, u64);

struct Entry {
    generation: u64,
    result: Atom,
}

pub struct MemoCache {
    cache: LruCache<Key, Entry>,
}

impl MemoCache {
    pub fn with_capacity(cap: usize) -> MemoCache {
        MemoCache { cache: LruCache::new(cap) }
    }

    pub fn get(&mut self, atom: &Atom, active_rulesets: u64, generation: u64) -> Option<Atom> {
        let key = (atom.digest(), active_rulesets);
        match self.cache.get(&key) {
            Some(entry) if entry.generation == generation => Some(entry.result.clone()),
            _ => None,
        }
    }

    pub fn insert(&mut self, atom: &Atom, active_rulesets: u64, generation: u64, result: Atom) {
        let key = (atom.digest(), active_rulesets);
        if let Some(existing) = self.cache.peek(&key) {
            if existing.generation == generation && existing.result != result {
                fatal_cache_inconsistent(line!(), &key);
            }
        }
        self.cache.put(key, Entry { generation, result });
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod memo_tests {
    use super::*;
    use crate::atom::mk_int;

    #[test]
    fn miss_then_hit() {
        let mut cache = MemoCache::with_capacity(8);
        assert!(cache.get(&mk_int(1), 0, 0).is_none());
        cache.insert(&mk_int(1), 0, 0, mk_int(2));
        assert_eq!(cache.get(&mk_int(1), 0, 0), Some(mk_int(2)));
    }

    #[test]
    fn generation_bump_invalidates_entry() {
        let mut cache = MemoCache::with_capacity(8);
        cache.insert(&mk_int(1), 0, 0, mk_int(2));
        assert!(cache.get(&mk_int(1), 0, 1).is_none());
    }

    #[test]
    fn distinct_ruleset_bitsets_are_distinct_keys() {
        let mut cache = MemoCache::with_capacity(8);
        cache.insert(&mk_int(1), 0, 0, mk_int(2));
        assert!(cache.get(&mk_int(1), 1, 0).is_none());
    }
}
