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

//! Single-flight group loading.
//!
//! At most one load request exists per group key. Requests for a group that
//! is already loading attach to the outstanding request instead of issuing a
//! second fetch. When the fetch resolves the result is installed (on success)
//! and every waiter is handed back, in registration order, for notification.
//!
//! While the coordinator is held (catalog refresh) new requests are parked:
//! their waiters are registered but the fetch is only issued on release.

use crate::assets::AssetObject;
use crate::cache::GroupCache;
use crate::config::RetryPolicy;
use crate::content::{ContentLink, ContentResult, JobId};
use crate::error::AssetError;
use ahash::AHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::time::Instant;

/// Callback told whether its group ended up resident
pub type LoadCallback = Box<dyn FnOnce(&GroupCache, bool)>;

/// Party waiting on a group load
pub enum Waiter {
    /// Caller callback
    Notify(LoadCallback),
    /// Preload job whose current group is loading
    Preload(JobId),
}

impl Waiter {
    pub fn notify(callback: impl FnOnce(&GroupCache, bool) + 'static) -> Self {
        Waiter::Notify(Box::new(callback))
    }
}

impl fmt::Debug for Waiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Waiter::Notify(_) => f.write_str("Notify"),
            Waiter::Preload(job) => f.debug_tuple("Preload").field(job).finish(),
        }
    }
}

pub type Waiters = SmallVec<[Waiter; 2]>;

/// In-flight load of one group
#[derive(Debug, Default)]
struct LoadRequest {
    waiters: Waiters,
    /// Fetches issued so far for this request
    attempts: u32,
}

/// How `ensure_loaded` handled a request
#[derive(Debug)]
pub enum Admission {
    /// Group already resident; the waiter is returned for immediate notification
    Resident(Waiter),
    /// Attached to the load already in flight
    Attached,
    /// New fetch issued
    Issued,
    /// Registered, fetch deferred until the hold is released
    Parked,
}

/// Finished load handed back for notification
#[derive(Debug)]
pub struct Resolution {
    pub group: String,
    pub loaded: bool,
    pub waiters: Waiters,
}

/// Coalesces group loads and installs their results
#[derive(Debug, Default)]
pub struct LoadCoordinator {
    in_flight: AHashMap<String, LoadRequest>,
    retry: RetryPolicy,
    retry_queue: Vec<(Instant, String)>,
    parked: Vec<String>,
    held: bool,
    fetches_issued: u64,
}

impl LoadCoordinator {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            ..Self::default()
        }
    }

    /// Make sure `group` is resident or loading, registering `waiter`
    pub(crate) fn ensure_loaded(
        &mut self,
        cache: &mut GroupCache,
        link: &ContentLink,
        group: &str,
        waiter: Waiter,
    ) -> Admission {
        if cache.exists(group) {
            cache.touch(group);
            return Admission::Resident(waiter);
        }

        if let Some(request) = self.in_flight.get_mut(group) {
            request.waiters.push(waiter);
            tracing::debug!(group, waiters = request.waiters.len(), "attached to load in flight");
            return Admission::Attached;
        }

        let mut request = LoadRequest::default();
        request.waiters.push(waiter);
        self.in_flight.insert(group.to_string(), request);

        if self.held {
            tracing::debug!(group, "load parked until catalog refresh finishes");
            self.parked.push(group.to_string());
            Admission::Parked
        } else {
            self.dispatch(link, group);
            Admission::Issued
        }
    }

    /// Apply a fetch result; `None` while a retry is pending
    pub(crate) fn resolve(
        &mut self,
        cache: &mut GroupCache,
        group: String,
        result: ContentResult<Vec<AssetObject>>,
        now: Instant,
    ) -> Option<Resolution> {
        let Some(request) = self.in_flight.get(&group) else {
            tracing::debug!(group = %group, "dropping fetch result without a request");
            return None;
        };
        let attempts = request.attempts;

        let loaded = match result {
            Ok(objects) => {
                tracing::info!(group = %group, objects = objects.len(), attempts, "group loaded");
                cache.install(&group, objects);
                true
            }
            Err(status) if self.retry.allows_retry(attempts) => {
                let delay = self.retry.delay_for(attempts);
                tracing::warn!(
                    group = %group,
                    status = %status,
                    attempt = attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    "group fetch failed, retrying"
                );
                self.retry_queue.push((now + delay, group));
                return None;
            }
            Err(status) => {
                let error = AssetError::GroupFetchFailed {
                    group: group.clone(),
                    status,
                };
                tracing::warn!(group = %group, attempts, "{error}");
                false
            }
        };

        let request = self.in_flight.remove(&group)?;
        Some(Resolution {
            group,
            loaded,
            waiters: request.waiters,
        })
    }

    /// Re-issue fetches whose backoff has elapsed; returns how many were issued
    pub(crate) fn issue_due_retries(&mut self, link: &ContentLink, now: Instant) -> usize {
        if self.retry_queue.is_empty() {
            return 0;
        }

        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.retry_queue)
            .into_iter()
            .partition(|(at, _)| *at <= now);
        self.retry_queue = waiting;

        let mut issued = 0;
        for (_, group) in due {
            if self.held {
                self.parked.push(group);
            } else {
                self.dispatch(link, &group);
                issued += 1;
            }
        }
        issued
    }

    /// Park new fetches until `release_hold`
    pub(crate) fn hold(&mut self) {
        self.held = true;
    }

    /// Issue every parked fetch in the order it was requested
    pub(crate) fn release_hold(&mut self, link: &ContentLink) {
        self.held = false;
        for group in std::mem::take(&mut self.parked) {
            self.dispatch(link, &group);
        }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn is_loading(&self, group: &str) -> bool {
        self.in_flight.contains_key(group)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Total fetches issued, retries included
    pub fn fetches_issued(&self) -> u64 {
        self.fetches_issued
    }

    pub fn pending_retries(&self) -> usize {
        self.retry_queue.len()
    }

    /// Earliest instant a queued retry becomes due
    pub fn next_retry_at(&self) -> Option<Instant> {
        self.retry_queue.iter().map(|(at, _)| *at).min()
    }

    fn dispatch(&mut self, link: &ContentLink, group: &str) {
        let Some(request) = self.in_flight.get_mut(group) else {
            return;
        };
        request.attempts += 1;
        self.fetches_issued += 1;
        tracing::debug!(group, attempt = request.attempts, "fetching group");
        link.fetch_group(group);
    }
}
