// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Group cache: resident groups keyed by group key.
//!
//! `install` and `remove` are the only mutators. Lookups never block and never
//! start a load.

use crate::assets::{Asset, AssetHandle, AssetObject};
use crate::error::{AssetError, Result};
use ahash::AHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Called with a record just before it leaves the cache
pub type ReleaseHook = Box<dyn Fn(&GroupRecord) + Send + Sync>;

/// Resident representation of one loaded group
#[derive(Debug)]
pub struct GroupRecord {
    name: String,
    objects: Vec<Arc<AssetObject>>,
    size: usize,
    last_access: u64,
}

impl GroupRecord {
    pub fn new(name: impl Into<String>, objects: Vec<AssetObject>) -> Self {
        let objects: Vec<_> = objects.into_iter().map(Arc::new).collect();
        let size = objects.iter().map(|object| object.memory_size()).sum();
        Self {
            name: name.into(),
            objects,
            size,
            last_access: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Objects in load order
    pub fn objects(&self) -> &[Arc<AssetObject>] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn memory_size(&self) -> usize {
        self.size
    }

    /// First object named `item`, whatever its kind
    pub fn find_object(&self, item: &str) -> Option<&Arc<AssetObject>> {
        self.objects.iter().find(|object| object.name() == item)
    }

    /// First object named `item` whose kind matches `T`
    pub fn find<T: Asset>(&self, item: &str) -> Option<AssetHandle<T>> {
        self.objects
            .iter()
            .filter(|object| object.name() == item)
            .find_map(AssetHandle::<T>::from_object)
    }
}

/// Cache statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub installs: u64,
    pub replacements: u64,
    pub removals: u64,
    pub evictions: u64,
}

/// In-memory map from group key to resident group
pub struct GroupCache {
    groups: AHashMap<String, GroupRecord>,
    total_size: usize,
    max_size: Option<usize>,
    access_counter: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    stats: CacheStats,
    release_hook: Option<ReleaseHook>,
}

impl GroupCache {
    /// Create an unbounded cache
    pub fn new() -> Self {
        Self {
            groups: AHashMap::new(),
            total_size: 0,
            max_size: None,
            access_counter: 0,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stats: CacheStats::default(),
            release_hook: None,
        }
    }

    /// Evict least recently requested groups once usage exceeds `max_size`
    pub fn with_memory_budget(mut self, max_size: Option<usize>) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the disposal hook run for every replaced, removed or evicted record
    pub fn with_release_hook(mut self, hook: ReleaseHook) -> Self {
        self.release_hook = Some(hook);
        self
    }

    pub fn exists(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    /// Install a loaded group, releasing any record it replaces
    pub fn install(&mut self, group: &str, objects: Vec<AssetObject>) {
        if self.remove_record(group) {
            self.stats.replacements += 1;
        }

        let mut record = GroupRecord::new(group, objects);
        record.last_access = self.next_access();
        self.total_size += record.size;
        tracing::debug!(
            group,
            objects = record.len(),
            bytes = record.size,
            "group installed"
        );
        self.groups.insert(group.to_string(), record);
        self.stats.installs += 1;

        self.evict_over_budget(group);
    }

    /// Remove and release a group; no-op when absent
    pub fn remove(&mut self, group: &str) -> bool {
        let removed = self.remove_record(group);
        if removed {
            self.stats.removals += 1;
        }
        removed
    }

    /// Typed lookup of `item` inside a resident group
    pub fn find<T: Asset>(&self, group: &str, item: &str) -> Option<AssetHandle<T>> {
        let found = self.groups.get(group).and_then(|record| record.find(item));
        self.record_lookup(found.is_some());
        found
    }

    /// Untyped lookup of `item` inside a resident group
    pub fn find_object(&self, group: &str, item: &str) -> Option<Arc<AssetObject>> {
        let found = self
            .groups
            .get(group)
            .and_then(|record| record.find_object(item))
            .cloned();
        self.record_lookup(found.is_some());
        found
    }

    /// Like `find`, but says why nothing was found
    pub fn try_find<T: Asset>(&self, group: &str, item: &str) -> Result<AssetHandle<T>> {
        if !self.exists(group) {
            self.record_lookup(false);
            return Err(AssetError::GroupNotResident(group.to_string()));
        }
        self.find(group, item).ok_or_else(|| AssetError::ItemNotFound {
            group: group.to_string(),
            item: item.to_string(),
        })
    }

    pub fn get(&self, group: &str) -> Option<&GroupRecord> {
        self.groups.get(group)
    }

    /// Mark a group as recently requested
    pub fn touch(&mut self, group: &str) {
        let access = self.next_access();
        if let Some(record) = self.groups.get_mut(group) {
            record.last_access = access;
        }
    }

    /// Release every resident group
    pub fn clear(&mut self) {
        let names: Vec<String> = self.groups.keys().cloned().collect();
        for name in names {
            self.remove(&name);
        }
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Sum of resident asset sizes in bytes
    pub fn memory_usage(&self) -> usize {
        self.total_size
    }

    /// Get memory utilization (0.0 to 1.0); zero without a budget
    pub fn utilization(&self) -> f32 {
        match self.max_size {
            Some(max) if max > 0 => self.total_size as f32 / max as f32,
            _ => 0.0,
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ..self.stats.clone()
        }
    }

    fn record_lookup(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn next_access(&mut self) -> u64 {
        self.access_counter += 1;
        self.access_counter
    }

    fn remove_record(&mut self, group: &str) -> bool {
        match self.groups.remove(group) {
            Some(record) => {
                self.total_size = self.total_size.saturating_sub(record.size);
                if let Some(hook) = &self.release_hook {
                    hook(&record);
                }
                true
            }
            None => false,
        }
    }

    /// Evict least recently requested groups, never `protected`
    fn evict_over_budget(&mut self, protected: &str) {
        let Some(max_size) = self.max_size else {
            return;
        };

        while self.total_size > max_size {
            let victim = self
                .groups
                .iter()
                .filter(|(name, _)| name.as_str() != protected)
                .min_by_key(|(_, record)| record.last_access)
                .map(|(name, _)| name.clone());

            let Some(victim) = victim else {
                break;
            };
            tracing::info!(group = %victim, budget = max_size, "evicting group over memory budget");
            self.remove_record(&victim);
            self.stats.evictions += 1;
        }
    }
}

impl Default for GroupCache {
    fn default() -> Self {
        Self::new()
    }
}
