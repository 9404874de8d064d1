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

//! Content system boundary.
//!
//! A [`ContentSystem`] performs the slow work (fetching groups, measuring and
//! downloading dependencies, checking catalogs) and may finish it on any
//! thread. Every operation is handed a [`Completion`]; resolving it sends a
//! message over a channel, and the owning `AssetManager` applies it on its
//! own thread during `update()`. Content systems never touch the cache.

pub mod directory;
pub mod memory;

pub use directory::DirectoryContentStore;
pub use memory::MemoryContentStore;

use crate::assets::AssetObject;
use crossbeam::channel::{unbounded, Receiver, Sender};
use slotmap::new_key_type;
use std::fmt;
use std::sync::Arc;

new_key_type! {
    /// Identifies a pending probe, download or preload job
    pub struct JobId;
}

/// Outcome reported by a content system; the error is a status message
pub type ContentResult<T> = std::result::Result<T, String>;

/// Backing store for groups and catalogs
pub trait ContentSystem: Send + Sync {
    /// Prepare the store; runs once before the first catalog check
    fn initialize(&self, done: Completion<()>) {
        done.succeed(());
    }

    /// Load every object of `group`, in order
    fn fetch_group(&self, group: &str, done: Completion<Vec<AssetObject>>);

    /// Bytes that must still be downloaded before `group` is local
    fn estimate_remaining_bytes(&self, group: &str, done: Completion<u64>);

    /// Download everything `group` needs, reporting progress in `[0, 1]`
    fn download_dependencies(&self, group: &str, progress: ProgressSink, done: Completion<()>);

    /// Identifiers of catalogs that have updates available
    fn check_catalog_updates(&self, done: Completion<Vec<String>>);

    /// Apply catalog updates, resolving with the identifiers actually applied
    fn apply_catalog_updates(&self, catalogs: Vec<String>, done: Completion<Vec<String>>);

    /// Disposal hook run when a group leaves the cache
    fn release_group(&self, _group: &str, _objects: &[Arc<AssetObject>]) {}
}

/// Messages marshaled back to the owning thread
pub(crate) enum Message {
    Initialized(ContentResult<()>),
    GroupFetched {
        group: String,
        result: ContentResult<Vec<AssetObject>>,
    },
    SizeEstimated {
        job: JobId,
        result: ContentResult<u64>,
    },
    DownloadProgress {
        job: JobId,
        fraction: f32,
    },
    DownloadFinished {
        job: JobId,
        result: ContentResult<()>,
    },
    CatalogsChecked(ContentResult<Vec<String>>),
    CatalogsApplied(ContentResult<Vec<String>>),
}

type Wrap<T> = Box<dyn FnOnce(ContentResult<T>) -> Message + Send>;

/// One-shot completion of a content operation.
///
/// Dropping a completion without resolving it reports a failure, so nobody
/// waits forever on a store that lost track of a request.
pub struct Completion<T> {
    tx: Sender<Message>,
    wrap: Option<Wrap<T>>,
}

impl<T> Completion<T> {
    fn new(tx: Sender<Message>, wrap: Wrap<T>) -> Self {
        Self {
            tx,
            wrap: Some(wrap),
        }
    }

    pub fn succeed(self, value: T) {
        self.resolve(Ok(value));
    }

    pub fn fail(self, status: impl Into<String>) {
        self.resolve(Err(status.into()));
    }

    pub fn resolve(mut self, result: ContentResult<T>) {
        self.send(result);
    }

    fn send(&mut self, result: ContentResult<T>) {
        if let Some(wrap) = self.wrap.take() {
            // The manager may already be gone; nothing is waiting then.
            let _ = self.tx.send(wrap(result));
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        self.send(Err("completion dropped".to_string()));
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("resolved", &self.wrap.is_none())
            .finish()
    }
}

/// Progress reporter for a dependency download
#[derive(Clone, Debug)]
pub struct ProgressSink {
    job: JobId,
    tx: Sender<Message>,
}

impl ProgressSink {
    /// Report progress; values are clamped to `[0, 1]`
    pub fn report(&self, fraction: f32) {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let _ = self.tx.send(Message::DownloadProgress {
            job: self.job,
            fraction,
        });
    }
}

/// Content system plus the sending half of the completion channel
pub(crate) struct ContentLink {
    content: Arc<dyn ContentSystem>,
    tx: Sender<Message>,
}

impl ContentLink {
    pub(crate) fn new(content: Arc<dyn ContentSystem>) -> (Self, Receiver<Message>) {
        let (tx, rx) = unbounded();
        (Self { content, tx }, rx)
    }

    pub(crate) fn content(&self) -> &Arc<dyn ContentSystem> {
        &self.content
    }

    fn completion<T>(
        &self,
        wrap: impl FnOnce(ContentResult<T>) -> Message + Send + 'static,
    ) -> Completion<T> {
        Completion::new(self.tx.clone(), Box::new(wrap))
    }

    pub(crate) fn initialize(&self) {
        self.content.initialize(self.completion(Message::Initialized));
    }

    pub(crate) fn fetch_group(&self, group: &str) {
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!("content.fetch_group", group).entered();

        let key = group.to_string();
        self.content.fetch_group(
            group,
            self.completion(move |result| Message::GroupFetched { group: key, result }),
        );
    }

    pub(crate) fn estimate_remaining_bytes(&self, job: JobId, group: &str) {
        self.content.estimate_remaining_bytes(
            group,
            self.completion(move |result| Message::SizeEstimated { job, result }),
        );
    }

    pub(crate) fn download_dependencies(&self, job: JobId, group: &str) {
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!("content.download_dependencies", group).entered();

        let progress = ProgressSink {
            job,
            tx: self.tx.clone(),
        };
        self.content.download_dependencies(
            group,
            progress,
            self.completion(move |result| Message::DownloadFinished { job, result }),
        );
    }

    pub(crate) fn check_catalog_updates(&self) {
        self.content
            .check_catalog_updates(self.completion(Message::CatalogsChecked));
    }

    pub(crate) fn apply_catalog_updates(&self, catalogs: Vec<String>) {
        self.content
            .apply_catalog_updates(catalogs, self.completion(Message::CatalogsApplied));
    }
}
