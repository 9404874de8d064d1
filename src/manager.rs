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

//! Asset manager: the caller-facing service.
//!
//! The manager owns the cache and all load bookkeeping. Content systems report
//! back over a channel; [`AssetManager::update`] applies those results and
//! runs the callbacks, so it must be called regularly (once per frame) from
//! the thread that owns the manager.
//!
//! ```
//! use group_assets::prelude::*;
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! let store = MemoryContentStore::new().with_group(
//!     "common",
//!     vec![AssetObject::from_asset("hello", TextAsset::new("hi".to_string()))],
//! );
//! let mut manager = AssetManager::new(Arc::new(store));
//!
//! let loaded = Rc::new(Cell::new(false));
//! let flag = loaded.clone();
//! manager.ensure_loaded("common", move |ok| flag.set(ok));
//! manager.update();
//!
//! assert!(loaded.get());
//! assert_eq!(manager.find::<TextAsset>("common/hello").unwrap().content(), "hi");
//! ```

use crate::address;
use crate::assets::{
    Asset, AssetHandle, AssetObject, Prefab, PrefabInstance, Sprite, SpriteAtlas, Texture,
};
use crate::cache::{CacheStats, GroupCache};
use crate::catalog::{CatalogRefresher, FinishedRefresh};
use crate::config::AssetConfig;
use crate::content::{ContentLink, ContentSystem, JobId, Message};
use crate::coordinator::{Admission, LoadCoordinator, Waiter};
use crate::download::{DownloadState, DownloadTracker, FinishedDownload, ProbeOutcome, ProbeThen};
use crate::error::Result;
use crate::preload::PreloadSequencer;
use crossbeam::channel::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Group cache plus asynchronous load coordination
pub struct AssetManager {
    link: ContentLink,
    inbox: Receiver<Message>,
    cache: GroupCache,
    coordinator: LoadCoordinator,
    preloads: PreloadSequencer,
    downloads: DownloadTracker,
    catalog: CatalogRefresher,
    config: AssetConfig,
}

impl AssetManager {
    /// Create a manager with the default configuration
    pub fn new(content: Arc<dyn ContentSystem>) -> Self {
        Self::with_config(content, AssetConfig::default())
    }

    pub fn with_config(content: Arc<dyn ContentSystem>, config: AssetConfig) -> Self {
        let releaser = content.clone();
        let cache = GroupCache::new()
            .with_memory_budget(config.memory_budget)
            .with_release_hook(Box::new(move |record| {
                tracing::debug!(group = record.name(), "releasing group");
                releaser.release_group(record.name(), record.objects());
            }));
        let (link, inbox) = ContentLink::new(content);

        Self {
            link,
            inbox,
            cache,
            coordinator: LoadCoordinator::new(config.retry.clone()),
            preloads: PreloadSequencer::new(),
            downloads: DownloadTracker::new(),
            catalog: CatalogRefresher::new(),
            config,
        }
    }

    // ---- loading ----

    /// Load `group` once; `on_complete` receives whether it is resident.
    ///
    /// A resident group completes synchronously, before this returns.
    pub fn ensure_loaded(&mut self, group: &str, on_complete: impl FnOnce(bool) + 'static) {
        self.request(group, Waiter::notify(move |_, loaded| on_complete(loaded)));
    }

    /// Load the group of `address`, then resolve the item inside it
    pub fn load_asset<T: Asset>(
        &mut self,
        address: &str,
        on_loaded: impl FnOnce(Option<AssetHandle<T>>) + 'static,
    ) {
        let (group, item) = address::split(address);
        if group.is_empty() {
            on_loaded(None);
            return;
        }

        let key = group.to_string();
        let item = item.to_string();
        self.request(
            group,
            Waiter::notify(move |cache, loaded| {
                on_loaded(if loaded { cache.find(&key, &item) } else { None });
            }),
        );
    }

    /// Load `groups` one after another, reporting `i / count` after each
    pub fn preload<I, S>(
        &mut self,
        groups: I,
        on_progress: impl FnMut(f32) + 'static,
        on_complete: impl FnOnce() + 'static,
    ) -> Option<JobId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let groups = groups.into_iter().map(Into::into).collect();
        let job = self.preloads.start(groups, on_progress, on_complete)?;
        self.drive_preload(job);
        Some(job)
    }

    /// Preload the groups listed in the configuration
    pub fn preload_configured(
        &mut self,
        on_progress: impl FnMut(f32) + 'static,
        on_complete: impl FnOnce() + 'static,
    ) -> Option<JobId> {
        let groups = self.config.preload_groups.clone();
        self.preload(groups, on_progress, on_complete)
    }

    /// Remove a resident group; no-op when absent
    pub fn remove(&mut self, group: &str) -> bool {
        self.cache.remove(group)
    }

    /// Release every resident group
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    // ---- downloads ----

    /// Report whether `group` is fully local and how many bytes remain
    pub fn check_downloaded(
        &mut self,
        group: &str,
        on_result: impl FnOnce(Result<DownloadState>) + 'static,
    ) {
        self.downloads
            .probe(&self.link, group, ProbeThen::Report(Box::new(on_result)));
    }

    /// Download the dependencies of `group`, then load it
    pub fn download_then_load(
        &mut self,
        group: &str,
        on_progress: impl FnMut(f32) + 'static,
        on_complete: impl FnOnce(bool) + 'static,
    ) {
        self.downloads.download(
            &self.link,
            group,
            Some(Box::new(on_progress)),
            Box::new(on_complete),
            true,
        );
    }

    /// Download the dependencies of `group` without loading it
    pub fn download_group(&mut self, group: &str, on_complete: impl FnOnce(bool) + 'static) {
        self.downloads
            .download(&self.link, group, None, Box::new(on_complete), false);
    }

    /// Load `group`, downloading it first when it is not local
    pub fn load_with_download(
        &mut self,
        group: &str,
        on_progress: impl FnMut(f32) + 'static,
        on_complete: impl FnOnce(bool) + 'static,
    ) {
        self.downloads.probe(
            &self.link,
            group,
            ProbeThen::Load {
                on_progress: Box::new(on_progress),
                on_complete: Box::new(on_complete),
            },
        );
    }

    // ---- catalog ----

    /// Initialize the content system and apply any catalog updates.
    ///
    /// Loads requested while the refresh runs are held back until it finishes.
    pub fn refresh_catalog(
        &mut self,
        on_complete: impl FnOnce() + 'static,
        on_status: impl FnMut(&str) + 'static,
    ) {
        if self
            .catalog
            .begin(&self.link, Box::new(on_complete), Box::new(on_status))
        {
            self.coordinator.hold();
        }
    }

    pub fn is_refreshing_catalog(&self) -> bool {
        self.catalog.is_refreshing()
    }

    /// Catalogs applied since startup
    pub fn applied_catalogs(&self) -> &[String] {
        self.catalog.applied()
    }

    // ---- lookups ----

    pub fn exists(&self, group: &str) -> bool {
        self.cache.exists(group)
    }

    /// Typed lookup of a `group/item` address in the cache
    pub fn find<T: Asset>(&self, address: &str) -> Option<AssetHandle<T>> {
        let (group, item) = address::split(address);
        if group.is_empty() {
            return None;
        }
        self.cache.find(group, item)
    }

    pub fn find_in<T: Asset>(&self, group: &str, item: &str) -> Option<AssetHandle<T>> {
        self.cache.find(group, item)
    }

    /// Untyped lookup of a `group/item` address
    pub fn find_object(&self, address: &str) -> Option<Arc<AssetObject>> {
        let (group, item) = address::split(address);
        if group.is_empty() {
            return None;
        }
        self.cache.find_object(group, item)
    }

    /// Sprite at `address`, or a full-size sprite over a texture there
    pub fn load_sprite(&self, address: &str) -> Option<Sprite> {
        if let Some(sprite) = self.find::<Sprite>(address) {
            return Some((*sprite).clone());
        }
        self.find::<Texture>(address).map(Sprite::from_texture)
    }

    /// Named sprite from the atlas at `atlas_address`
    pub fn load_sprite_from_atlas(&self, atlas_address: &str, name: &str) -> Option<Sprite> {
        self.find::<SpriteAtlas>(atlas_address)?
            .get_sprite(name)
            .cloned()
    }

    pub fn load_texture(&self, address: &str) -> Option<AssetHandle<Texture>> {
        self.find(address)
    }

    pub fn load_atlas(&self, address: &str) -> Option<AssetHandle<SpriteAtlas>> {
        self.find(address)
    }

    /// New instance of the prefab at `address`
    pub fn instantiate(&self, address: &str) -> Option<PrefabInstance> {
        self.find::<Prefab>(address)
            .map(|prefab| prefab.instantiate(address))
    }

    // ---- pumping ----

    /// Apply every finished content operation; returns how many were applied
    pub fn update(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(message) = self.inbox.try_recv() {
            self.handle(message);
            applied += 1;
        }
        self.coordinator.issue_due_retries(&self.link, Instant::now());
        applied
    }

    /// Like [`update`](Self::update), but first waits up to `timeout` for a result
    pub fn update_timeout(&mut self, timeout: Duration) -> usize {
        let wait = match self.coordinator.next_retry_at() {
            Some(at) => timeout.min(at.saturating_duration_since(Instant::now())),
            None => timeout,
        };
        match self.inbox.recv_timeout(wait) {
            Ok(message) => {
                self.handle(message);
                1 + self.update()
            }
            Err(_) => self.update(),
        }
    }

    /// Whether any load, download, preload or refresh is still outstanding
    pub fn has_pending_work(&self) -> bool {
        self.coordinator.in_flight_count() > 0
            || self.downloads.pending_probes() > 0
            || self.downloads.pending_downloads() > 0
            || self.preloads.active_jobs() > 0
            || self.catalog.is_refreshing()
    }

    // ---- accessors ----

    pub fn is_loading(&self, group: &str) -> bool {
        self.coordinator.is_loading(group)
    }

    pub fn cache(&self) -> &GroupCache {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn coordinator(&self) -> &LoadCoordinator {
        &self.coordinator
    }

    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    pub fn content(&self) -> &Arc<dyn ContentSystem> {
        self.link.content()
    }

    // ---- internals ----

    fn request(&mut self, group: &str, waiter: Waiter) {
        let admission = self
            .coordinator
            .ensure_loaded(&mut self.cache, &self.link, group, waiter);
        if let Admission::Resident(waiter) = admission {
            self.notify(waiter, true);
        }
    }

    fn notify(&mut self, waiter: Waiter, loaded: bool) {
        match waiter {
            Waiter::Notify(callback) => callback(&self.cache, loaded),
            Waiter::Preload(job) => {
                if self.preloads.group_finished(job, loaded) {
                    self.drive_preload(job);
                }
            }
        }
    }

    /// Request the current group of `job`, stepping over resident groups
    fn drive_preload(&mut self, job: JobId) {
        while let Some(group) = self.preloads.current_group(job).map(str::to_string) {
            let admission = self.coordinator.ensure_loaded(
                &mut self.cache,
                &self.link,
                &group,
                Waiter::Preload(job),
            );
            match admission {
                Admission::Resident(_) => {
                    if !self.preloads.group_finished(job, true) {
                        return;
                    }
                }
                Admission::Attached | Admission::Issued | Admission::Parked => return,
            }
        }
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::GroupFetched { group, result } => {
                let resolution =
                    self.coordinator
                        .resolve(&mut self.cache, group, result, Instant::now());
                if let Some(resolution) = resolution {
                    for waiter in resolution.waiters {
                        self.notify(waiter, resolution.loaded);
                    }
                }
            }
            Message::SizeEstimated { job, result } => {
                if let Some(outcome) = self.downloads.probe_resolved(job, result) {
                    self.after_probe(outcome);
                }
            }
            Message::DownloadProgress { job, fraction } => self.downloads.progress(job, fraction),
            Message::DownloadFinished { job, result } => {
                if let Some(finished) = self.downloads.download_finished(job, result) {
                    self.after_download(finished);
                }
            }
            Message::Initialized(result) => {
                let finished = self.catalog.on_initialized(&self.link, result);
                self.finish_refresh(finished);
            }
            Message::CatalogsChecked(result) => {
                let finished = self.catalog.on_checked(&self.link, result);
                self.finish_refresh(finished);
            }
            Message::CatalogsApplied(result) => {
                let finished = self.catalog.on_applied(result);
                self.finish_refresh(finished);
            }
        }
    }

    fn after_probe(&mut self, outcome: ProbeOutcome) {
        let ProbeOutcome { group, state, then } = outcome;
        match then {
            ProbeThen::Report(on_result) => on_result(state),
            ProbeThen::Load {
                on_progress,
                on_complete,
            } => match state {
                Ok(state) if state.is_local => self.ensure_loaded(&group, on_complete),
                Ok(_) => {
                    self.downloads
                        .download(&self.link, &group, Some(on_progress), on_complete, true);
                }
                Err(_) => on_complete(false),
            },
        }
    }

    fn after_download(&mut self, finished: FinishedDownload) {
        if finished.downloaded && finished.load_after {
            self.ensure_loaded(&finished.group, finished.on_complete);
        } else {
            (finished.on_complete)(finished.downloaded);
        }
    }

    fn finish_refresh(&mut self, finished: Option<FinishedRefresh>) {
        let Some(callbacks) = finished else {
            return;
        };
        self.coordinator.release_hold(&self.link);
        for on_complete in callbacks {
            on_complete();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Rect, TextAsset};
    use crate::content::MemoryContentStore;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn sprite(name: &str) -> AssetObject {
        AssetObject::from_asset(name, Sprite::new(Rect::new(0.0, 0.0, 16.0, 16.0)))
    }

    fn flag() -> (Rc<Cell<Option<bool>>>, impl FnOnce(bool) + 'static) {
        let result = Rc::new(Cell::new(None));
        let sink = result.clone();
        (result, move |ok| sink.set(Some(ok)))
    }

    #[test]
    fn test_common_scenario() {
        let store = MemoryContentStore::new().with_group("common", vec![sprite("x")]);
        let mut manager = AssetManager::new(Arc::new(store));

        let (result, on_complete) = flag();
        manager.ensure_loaded("common", on_complete);
        assert_eq!(result.get(), None);
        manager.update();

        assert_eq!(result.get(), Some(true));
        assert!(manager.exists("common"));
        assert_eq!(manager.find::<Sprite>("common/x").unwrap().name(), "x");
        assert!(manager.find::<Sprite>("common/y").is_none());
        assert!(manager.find::<Sprite>("nogroup").is_none());
    }

    #[test]
    fn test_resident_completes_synchronously() {
        let store = MemoryContentStore::new().with_group("common", vec![sprite("x")]);
        let mut manager = AssetManager::new(Arc::new(store.clone()));
        manager.ensure_loaded("common", |_| {});
        manager.update();

        let (result, on_complete) = flag();
        manager.ensure_loaded("common", on_complete);
        assert_eq!(result.get(), Some(true));
        assert_eq!(store.fetch_count("common"), 1);

        assert!(manager.remove("common"));
        manager.ensure_loaded("common", |_| {});
        assert_eq!(store.fetch_count("common"), 2);
        assert_eq!(store.released_groups(), vec!["common".to_string()]);
    }

    #[test]
    fn test_load_asset() {
        let store = MemoryContentStore::new().with_group(
            "ui",
            vec![AssetObject::from_asset("title", TextAsset::new("Hello".to_string()))],
        );
        let mut manager = AssetManager::new(Arc::new(store));
        let text = Rc::new(RefCell::new(None));
        let missing = Rc::new(Cell::new(false));

        let sink = text.clone();
        manager.load_asset::<TextAsset>("ui/title", move |handle| {
            *sink.borrow_mut() = handle.map(|h| h.content().to_string());
        });
        let sink = missing.clone();
        manager.load_asset::<TextAsset>("ui/other", move |handle| sink.set(handle.is_none()));
        manager.update();

        assert_eq!(text.borrow().as_deref(), Some("Hello"));
        assert!(missing.get());

        let malformed = Rc::new(Cell::new(false));
        let sink = malformed.clone();
        manager.load_asset::<TextAsset>("no-separator", move |handle| sink.set(handle.is_none()));
        assert!(malformed.get());
    }

    #[test]
    fn test_convenience_lookups() {
        let texture = AssetObject::from_asset("bg", Texture::new(2, 3, vec![0; 24]));
        let atlas = AssetObject::from_asset(
            "icons",
            SpriteAtlas::new().with_sprite("coin", Sprite::new(Rect::new(1.0, 1.0, 8.0, 8.0))),
        );
        let prefab = AssetObject::from_asset("enemy", Prefab::new(json!({"hp": 10})));
        let store = MemoryContentStore::new()
            .with_group("game", vec![texture, atlas, prefab, sprite("hero")]);
        let mut manager = AssetManager::new(Arc::new(store));
        manager.ensure_loaded("game", |_| {});
        manager.update();

        assert_eq!(
            manager.load_sprite("game/hero").map(|s| s.rect()),
            Some(Rect::new(0.0, 0.0, 16.0, 16.0))
        );
        let full = manager.load_sprite("game/bg").unwrap();
        assert_eq!(full.rect(), Rect::new(0.0, 0.0, 2.0, 3.0));
        assert!(full.texture().is_some());

        assert_eq!(
            manager
                .load_sprite_from_atlas("game/icons", "coin")
                .map(|s| s.rect().width),
            Some(8.0)
        );
        assert!(manager.load_sprite_from_atlas("game/icons", "gem").is_none());
        assert!(manager.load_texture("game/bg").is_some());
        assert!(manager.load_atlas("game/icons").is_some());

        let mut first = manager.instantiate("game/enemy").unwrap();
        first.state["hp"] = json!(3);
        let second = manager.instantiate("game/enemy").unwrap();
        assert_eq!(second.state["hp"], json!(10));
        assert_eq!(second.source, "game/enemy");
    }

    #[test]
    fn test_has_pending_work() {
        let store = MemoryContentStore::deferred().with_group("common", vec![sprite("x")]);
        let mut manager = AssetManager::new(Arc::new(store.clone()));
        assert!(!manager.has_pending_work());

        manager.ensure_loaded("common", |_| {});
        assert!(manager.has_pending_work());
        assert!(manager.is_loading("common"));

        store.flush();
        manager.update();
        assert!(!manager.has_pending_work());
    }

    #[test]
    fn test_memory_budget_releases_through_content() {
        let big = |name: &str| {
            AssetObject::from_asset(name, crate::assets::BinaryAsset::new(vec![0; 100]))
        };
        let store = MemoryContentStore::new()
            .with_group("a", vec![big("x")])
            .with_group("b", vec![big("y")]);
        let config = AssetConfig::default().with_memory_budget(150);
        let mut manager = AssetManager::with_config(Arc::new(store.clone()), config);

        manager.ensure_loaded("a", |_| {});
        manager.update();
        manager.ensure_loaded("b", |_| {});
        manager.update();

        assert!(!manager.exists("a"));
        assert!(manager.exists("b"));
        assert_eq!(store.released_groups(), vec!["a".to_string()]);
        assert_eq!(manager.stats().evictions, 1);
    }
}
