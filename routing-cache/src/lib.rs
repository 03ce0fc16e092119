/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! # routing-cache
//!
//! TTL-bounded, explicitly-invalidated key→value cache shared by the gateway's
//! routing-info and pending-correlation namespaces. The cache is never a source
//! of truth: consumers treat it as a latency optimization and fall through to
//! their backing store on every miss.
//!
//! An entry whose TTL has elapsed is indistinguishable from an absent entry;
//! expired entries are lazily purged on access rather than swept by a
//! background task.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct CacheSlot<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheSlot<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// A [`TtlCache`] stores each value together with its own deadline. All
/// operations take a single lock acquisition, so check-then-set sequences like
/// [`TtlCache::put_if_absent`] are atomic with respect to concurrent callers.
pub struct TtlCache<K, V> {
    slots: Mutex<HashMap<K, CacheSlot<V>>>,
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the live value for `key`, treating an expired slot as a miss
    /// and purging it in passing.
    pub async fn get(&self, key: &K) -> Option<V> {
        let mut slots = self.slots.lock().await;
        let now = Instant::now();
        match slots.get(key) {
            Some(slot) if slot.is_expired(now) => {}
            Some(slot) => return Some(slot.value.clone()),
            None => return None,
        }
        slots.remove(key);
        None
    }

    /// Inserts or replaces the value for `key` with a fresh deadline.
    pub async fn put(&self, key: K, value: V, ttl: Duration) {
        let mut slots = self.slots.lock().await;
        slots.insert(
            key,
            CacheSlot {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Inserts the value only when no live entry exists for `key`. Returns
    /// `true` when the insert happened. An expired slot counts as absent.
    pub async fn put_if_absent(&self, key: K, value: V, ttl: Duration) -> bool {
        let mut slots = self.slots.lock().await;
        let now = Instant::now();
        if let Some(slot) = slots.get(&key) {
            if !slot.is_expired(now) {
                return false;
            }
        }
        slots.insert(
            key,
            CacheSlot {
                value,
                expires_at: now + ttl,
            },
        );
        true
    }

    /// Drops the entry for `key`, returning its value when one was still live.
    pub async fn invalidate(&self, key: &K) -> Option<V> {
        let mut slots = self.slots.lock().await;
        let now = Instant::now();
        slots
            .remove(key)
            .filter(|slot| !slot.is_expired(now))
            .map(|slot| slot.value)
    }

    /// Number of physically present slots, live or expired. Lookups never see
    /// expired slots, so this is an upper bound on reachable entries.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::TtlCache;
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn get_returns_value_before_ttl_elapses() {
        let cache = TtlCache::new();
        cache.put("suffix", "https://cm.example", TTL).await;

        assert_eq!(cache.get(&"suffix").await, Some("https://cm.example"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_a_miss_even_if_still_present() {
        let cache = TtlCache::new();
        cache.put("suffix", "https://cm.example", TTL).await;

        tokio::time::advance(TTL + Duration::from_millis(1)).await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&"suffix").await, None);
        // The miss purged the slot.
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn put_if_absent_rejects_live_duplicate() {
        let cache = TtlCache::new();

        assert!(cache.put_if_absent("corr-42", 1, TTL).await);
        assert!(!cache.put_if_absent("corr-42", 2, TTL).await);
        assert_eq!(cache.get(&"corr-42").await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn put_if_absent_reclaims_expired_slot() {
        let cache = TtlCache::new();
        assert!(cache.put_if_absent("corr-42", 1, TTL).await);

        tokio::time::advance(TTL + Duration::from_millis(1)).await;

        assert!(cache.put_if_absent("corr-42", 2, TTL).await);
        assert_eq!(cache.get(&"corr-42").await, Some(2));
    }

    #[tokio::test]
    async fn invalidate_removes_and_returns_live_value() {
        let cache = TtlCache::new();
        cache.put("suffix", "https://cm.example", TTL).await;

        assert_eq!(
            cache.invalidate(&"suffix").await,
            Some("https://cm.example")
        );
        assert_eq!(cache.get(&"suffix").await, None);
        assert_eq!(cache.invalidate(&"suffix").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_of_expired_slot_reports_absent() {
        let cache = TtlCache::new();
        cache.put("suffix", "stale", TTL).await;

        tokio::time::advance(TTL + Duration::from_millis(1)).await;

        assert_eq!(cache.invalidate(&"suffix").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn replacement_refreshes_the_deadline() {
        let cache = TtlCache::new();
        cache.put("suffix", "first", TTL).await;

        tokio::time::advance(TTL / 2).await;
        cache.put("suffix", "second", TTL).await;
        tokio::time::advance((TTL / 4) * 3).await;

        // Original deadline has passed; the rewrite's has not.
        assert_eq!(cache.get(&"suffix").await, Some("second"));
    }
}
