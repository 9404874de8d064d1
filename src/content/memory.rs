//! In-memory content store.
//!
//! Groups, remote sizes and catalog updates are registered up front. In
//! deferred mode every operation is queued until [`MemoryContentStore::flush`]
//! runs it, which lets callers observe the state while loads are in flight.

use crate::assets::AssetObject;
use crate::content::{Completion, ContentSystem, ProgressSink};
use ahash::AHashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

type Deferred = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct MemoryState {
    groups: AHashMap<String, Vec<AssetObject>>,
    remote_bytes: AHashMap<String, u64>,
    scripted_failures: AHashMap<String, VecDeque<String>>,
    catalog_updates: Vec<String>,
    applied_catalogs: Vec<String>,
    catalog_failure: Option<String>,
    fetch_counts: AHashMap<String, usize>,
    released: Vec<String>,
    queue: VecDeque<Deferred>,
}

/// Content system holding every group in memory
#[derive(Clone)]
pub struct MemoryContentStore {
    state: Arc<Mutex<MemoryState>>,
    deferred: bool,
    download_steps: u32,
}

impl MemoryContentStore {
    /// Store that resolves every operation as soon as it is issued
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            deferred: false,
            download_steps: 4,
        }
    }

    /// Store that queues operations until `flush`
    pub fn deferred() -> Self {
        Self {
            deferred: true,
            ..Self::new()
        }
    }

    /// Register (or replace) a group
    pub fn with_group(self, group: &str, objects: Vec<AssetObject>) -> Self {
        self.insert_group(group, objects);
        self
    }

    /// Mark a group as not yet downloaded
    pub fn with_remote_bytes(self, group: &str, bytes: u64) -> Self {
        self.state.lock().remote_bytes.insert(group.to_string(), bytes);
        self
    }

    /// Catalogs reported by the next update check
    pub fn with_catalog_updates(self, catalogs: &[&str]) -> Self {
        self.state.lock().catalog_updates = catalogs.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn insert_group(&self, group: &str, objects: Vec<AssetObject>) {
        self.state.lock().groups.insert(group.to_string(), objects);
    }

    /// Fail the next `count` fetches of `group` with `status`
    pub fn fail_next_fetches(&self, group: &str, count: usize, status: &str) {
        let mut state = self.state.lock();
        let failures = state.scripted_failures.entry(group.to_string()).or_default();
        failures.extend(std::iter::repeat(status.to_string()).take(count));
    }

    /// Fail catalog checks until cleared with `None`
    pub fn set_catalog_failure(&self, status: Option<&str>) {
        self.state.lock().catalog_failure = status.map(str::to_string);
    }

    /// Number of fetches issued for `group`
    pub fn fetch_count(&self, group: &str) -> usize {
        self.state.lock().fetch_counts.get(group).copied().unwrap_or(0)
    }

    /// Groups released by the cache, in order
    pub fn released_groups(&self) -> Vec<String> {
        self.state.lock().released.clone()
    }

    pub fn applied_catalogs(&self) -> Vec<String> {
        self.state.lock().applied_catalogs.clone()
    }

    /// Number of queued operations (deferred mode)
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Run queued operations, including any they queue in turn; returns how many ran
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        loop {
            // The lock must not be held while an operation runs.
            let next = self.state.lock().queue.pop_front();
            match next {
                Some(op) => {
                    op();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    fn run(&self, op: impl FnOnce() + Send + 'static) {
        if self.deferred {
            self.state.lock().queue.push_back(Box::new(op));
        } else {
            op();
        }
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentSystem for MemoryContentStore {
    fn fetch_group(&self, group: &str, done: Completion<Vec<AssetObject>>) {
        *self
            .state
            .lock()
            .fetch_counts
            .entry(group.to_string())
            .or_insert(0) += 1;

        let state = self.state.clone();
        let group = group.to_string();
        self.run(move || {
            let mut state = state.lock();
            let scripted = state
                .scripted_failures
                .get_mut(&group)
                .and_then(VecDeque::pop_front);
            let result = match scripted {
                Some(status) => Err(status),
                None => state
                    .groups
                    .get(&group)
                    .cloned()
                    .ok_or_else(|| format!("invalid key: {group}")),
            };
            drop(state);
            done.resolve(result);
        });
    }

    fn estimate_remaining_bytes(&self, group: &str, done: Completion<u64>) {
        let state = self.state.clone();
        let group = group.to_string();
        self.run(move || {
            let state = state.lock();
            let result = if state.groups.contains_key(&group) {
                Ok(state.remote_bytes.get(&group).copied().unwrap_or(0))
            } else {
                Err(format!("invalid key: {group}"))
            };
            drop(state);
            done.resolve(result);
        });
    }

    fn download_dependencies(&self, group: &str, progress: ProgressSink, done: Completion<()>) {
        let state = self.state.clone();
        let group = group.to_string();
        let steps = self.download_steps.max(1);
        self.run(move || {
            if !state.lock().groups.contains_key(&group) {
                done.fail(format!("invalid key: {group}"));
                return;
            }
            for step in 1..=steps {
                progress.report(step as f32 / steps as f32);
            }
            state.lock().remote_bytes.remove(&group);
            done.succeed(());
        });
    }

    fn check_catalog_updates(&self, done: Completion<Vec<String>>) {
        let state = self.state.clone();
        self.run(move || {
            let state = state.lock();
            let result = match &state.catalog_failure {
                Some(status) => Err(status.clone()),
                None => Ok(state.catalog_updates.clone()),
            };
            drop(state);
            done.resolve(result);
        });
    }

    fn apply_catalog_updates(&self, catalogs: Vec<String>, done: Completion<Vec<String>>) {
        let state = self.state.clone();
        self.run(move || {
            let mut state = state.lock();
            state.catalog_updates.retain(|id| !catalogs.contains(id));
            state.applied_catalogs.extend(catalogs.iter().cloned());
            drop(state);
            done.succeed(catalogs);
        });
    }

    fn release_group(&self, group: &str, _objects: &[Arc<AssetObject>]) {
        self.state.lock().released.push(group.to_string());
    }
}
