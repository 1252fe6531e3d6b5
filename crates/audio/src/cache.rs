//! Resampling result cache (§4.4, §8).
//!
//! Ported from the original's `AudioProcessor._resampling_cache`: key on the first 1KB of the
//! source payload plus the conversion parameters, evict in FIFO order once the cache is full.
//! `dashmap` gives us the concurrent map the teacher's pipeline reaches for elsewhere; the FIFO
//! order book is a small `parking_lot`-guarded `VecDeque` alongside it, since `DashMap` itself
//! has no insertion-order concept.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;

use voice_core::audio::Channels;
use voice_core::traits::ResampleMethod;

const CACHE_KEY_SAMPLE_BYTES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    payload_digest: [u8; 16],
    src_rate: u32,
    tgt_rate: u32,
    channels: usize,
    method: u8,
}

impl CacheKey {
    pub fn new(
        payload: &[u8],
        src_rate: u32,
        tgt_rate: u32,
        channels: Channels,
        method: ResampleMethod,
    ) -> Self {
        let sample = &payload[..payload.len().min(CACHE_KEY_SAMPLE_BYTES)];
        Self {
            payload_digest: md5::compute(sample).0,
            src_rate,
            tgt_rate,
            channels: channels.count(),
            method: method as u8,
        }
    }
}

/// FIFO-evicted cache mapping a resampling request to its result bytes.
pub struct ResamplingCache {
    entries: DashMap<CacheKey, Vec<u8>>,
    order: Mutex<VecDeque<CacheKey>>,
    max_entries: usize,
}

impl ResamplingCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            max_entries,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        self.entries.get(key).map(|v| v.clone())
    }

    pub fn insert(&self, key: CacheKey, bytes: Vec<u8>) {
        if self.entries.contains_key(&key) {
            return;
        }
        let mut order = self.order.lock();
        if self.entries.len() >= self.max_entries {
            if let Some(oldest) = order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        order.push_back(key.clone());
        self.entries.insert(key, bytes);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.order.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(tag: u8) -> CacheKey {
        CacheKey::new(&[tag; 32], 16000, 8000, Channels::Mono, ResampleMethod::Linear)
    }

    #[test]
    fn insert_then_get_round_trips() {
        let cache = ResamplingCache::new(2);
        let k = key(1);
        cache.insert(k.clone(), vec![1, 2, 3]);
        assert_eq!(cache.get(&k), Some(vec![1, 2, 3]));
    }

    #[test]
    fn evicts_oldest_entry_once_full() {
        let cache = ResamplingCache::new(2);
        let k1 = key(1);
        let k2 = key(2);
        let k3 = key(3);
        cache.insert(k1.clone(), vec![1]);
        cache.insert(k2.clone(), vec![2]);
        cache.insert(k3.clone(), vec![3]);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&k1), None);
        assert_eq!(cache.get(&k2), Some(vec![2]));
        assert_eq!(cache.get(&k3), Some(vec![3]));
    }

    #[test]
    fn different_first_kb_yields_different_keys() {
        let a = CacheKey::new(&[0u8; 2048], 16000, 8000, Channels::Mono, ResampleMethod::Linear);
        let mut other = vec![0u8; 2048];
        other[2000] = 1;
        let b = CacheKey::new(&other, 16000, 8000, Channels::Mono, ResampleMethod::Linear);
        assert_eq!(a, b, "bytes beyond the first KB must not affect the key");

        let mut different_prefix = vec![0u8; 2048];
        different_prefix[0] = 1;
        let c = CacheKey::new(&different_prefix, 16000, 8000, Channels::Mono, ResampleMethod::Linear);
        assert_ne!(a, c);
    }
}
