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

//! Catalog refresh: initialize, check for updates, apply them.
//!
//! A refresh always completes. A failing stage is logged and the refresh ends
//! early, leaving the current catalog in use. Requests made while a refresh
//! is running join it instead of starting another.

use crate::content::{ContentLink, ContentResult};
use crate::error::AssetError;
use crate::preload::CompleteCallback;

/// Callback receiving one status line per applied catalog
pub type StatusCallback = Box<dyn FnMut(&str)>;

/// Prefix of the status reported for each applied catalog
pub const CATALOG_STATUS_PREFIX: &str = "catalog result: ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Idle,
    Initializing,
    Checking,
    Applying,
}

struct RefreshWaiter {
    on_complete: CompleteCallback,
    on_status: StatusCallback,
}

/// Completion callbacks of a finished refresh, in request order
pub type FinishedRefresh = Vec<CompleteCallback>;

/// State of the catalog refresh
pub struct CatalogRefresher {
    stage: Stage,
    initialized: bool,
    waiters: Vec<RefreshWaiter>,
    applied: Vec<String>,
}

impl CatalogRefresher {
    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            initialized: false,
            waiters: Vec::new(),
            applied: Vec::new(),
        }
    }

    /// Request a refresh; returns `true` when a new refresh was started
    pub(crate) fn begin(
        &mut self,
        link: &ContentLink,
        on_complete: CompleteCallback,
        on_status: StatusCallback,
    ) -> bool {
        self.waiters.push(RefreshWaiter {
            on_complete,
            on_status,
        });
        if self.stage != Stage::Idle {
            tracing::debug!(waiters = self.waiters.len(), "joined running catalog refresh");
            return false;
        }

        if self.initialized {
            self.check(link);
        } else {
            tracing::info!("initializing content system");
            self.stage = Stage::Initializing;
            link.initialize();
        }
        true
    }

    pub(crate) fn on_initialized(
        &mut self,
        link: &ContentLink,
        result: ContentResult<()>,
    ) -> Option<FinishedRefresh> {
        if self.stage != Stage::Initializing {
            return None;
        }
        match result {
            Ok(()) => {
                self.initialized = true;
                self.check(link);
                None
            }
            Err(status) => Some(self.fail(format!("initialize: {status}"))),
        }
    }

    pub(crate) fn on_checked(
        &mut self,
        link: &ContentLink,
        result: ContentResult<Vec<String>>,
    ) -> Option<FinishedRefresh> {
        if self.stage != Stage::Checking {
            return None;
        }
        match result {
            Ok(catalogs) if catalogs.is_empty() => {
                tracing::info!("catalogs up to date");
                Some(self.finish())
            }
            Ok(catalogs) => {
                tracing::info!(updates = catalogs.len(), "applying catalog updates");
                self.stage = Stage::Applying;
                link.apply_catalog_updates(catalogs);
                None
            }
            Err(status) => Some(self.fail(format!("check: {status}"))),
        }
    }

    pub(crate) fn on_applied(&mut self, result: ContentResult<Vec<String>>) -> Option<FinishedRefresh> {
        if self.stage != Stage::Applying {
            return None;
        }
        match result {
            Ok(catalogs) => {
                for id in catalogs {
                    let status = format!("{CATALOG_STATUS_PREFIX}{id}");
                    tracing::info!("{status}");
                    for waiter in &mut self.waiters {
                        (waiter.on_status)(&status);
                    }
                    self.applied.push(id);
                }
                Some(self.finish())
            }
            Err(status) => Some(self.fail(format!("apply: {status}"))),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.stage != Stage::Idle
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Every catalog applied since startup, in order
    pub fn applied(&self) -> &[String] {
        &self.applied
    }

    fn check(&mut self, link: &ContentLink) {
        tracing::debug!("checking for catalog updates");
        self.stage = Stage::Checking;
        link.check_catalog_updates();
    }

    fn fail(&mut self, message: String) -> FinishedRefresh {
        let error = AssetError::CatalogCheckFailed(message);
        tracing::warn!("{error}; keeping current catalog");
        self.finish()
    }

    fn finish(&mut self) -> FinishedRefresh {
        self.stage = Stage::Idle;
        self.waiters
            .drain(..)
            .map(|waiter| waiter.on_complete)
            .collect()
    }
}

impl Default for CatalogRefresher {
    fn default() -> Self {
        Self::new()
    }
}
