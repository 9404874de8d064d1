//! Directory-backed content store.
//!
//! Layout under the local root:
//!
//! ```text
//! <root>/catalog.json        active catalog: {"catalogs": {"<id>": "<hash>"}}
//! <root>/<group>/<item>.<ext>
//! ```
//!
//! An optional remote root with the same layout acts as the download source:
//! a group is local once every remote file exists locally with the same size,
//! and a catalog has an update when its remote hash differs from the active one.
//! File work runs on the rayon pool with the `parallel` feature, inline otherwise.

use crate::assets::{AssetObject, LoaderRegistry};
use crate::content::{Completion, ContentSystem, ProgressSink};
use crate::error::{AssetError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of the catalog in a content root
pub const CATALOG_FILE: &str = "catalog.json";

/// Catalog identifiers mapped to content hashes
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub catalogs: BTreeMap<String, String>,
}

impl CatalogFile {
    /// Read a catalog; a missing file is an empty catalog
    pub fn read(root: &Path) -> Result<Self> {
        let path = root.join(CATALOG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn write(&self, root: &Path) -> Result<()> {
        fs::create_dir_all(root)?;
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(root.join(CATALOG_FILE), json)?;
        Ok(())
    }
}

struct DirectoryInner {
    root: PathBuf,
    remote: Option<PathBuf>,
    loaders: LoaderRegistry,
    active: Mutex<CatalogFile>,
}

/// Content system reading groups from a directory tree
#[derive(Clone)]
pub struct DirectoryContentStore {
    inner: Arc<DirectoryInner>,
}

impl DirectoryContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DirectoryInner {
                root: root.into(),
                remote: None,
                loaders: LoaderRegistry::with_defaults(),
                active: Mutex::new(CatalogFile::default()),
            }),
        }
    }

    /// Download groups and catalog updates from `remote`
    pub fn with_remote(self, remote: impl Into<PathBuf>) -> Self {
        self.rebuild(|inner| inner.remote = Some(remote.into()))
    }

    /// Replace the loaders used to decode group files
    pub fn with_loaders(self, loaders: LoaderRegistry) -> Self {
        self.rebuild(|inner| inner.loaders = loaders)
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Catalog currently in use
    pub fn active_catalog(&self) -> CatalogFile {
        self.inner.active.lock().clone()
    }

    fn rebuild(self, edit: impl FnOnce(&mut DirectoryInner)) -> Self {
        let mut inner = DirectoryInner {
            root: self.inner.root.clone(),
            remote: self.inner.remote.clone(),
            loaders: self.inner.loaders.clone(),
            active: Mutex::new(self.inner.active.lock().clone()),
        };
        edit(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    fn spawn(&self, work: impl FnOnce(&DirectoryInner) + Send + 'static) {
        let inner = self.inner.clone();
        let job = move || work(&inner);

        #[cfg(feature = "parallel")]
        rayon::spawn(job);

        #[cfg(not(feature = "parallel"))]
        job();
    }
}

impl DirectoryInner {
    fn group_dir(&self, group: &str) -> Result<PathBuf> {
        if group.is_empty() || group.contains(['/', '\\']) || group == ".." || group == "." {
            return Err(AssetError::AddressMalformed(group.to_string()));
        }
        Ok(self.root.join(group))
    }

    fn load_group(&self, group: &str) -> Result<Vec<AssetObject>> {
        let dir = self.group_dir(group)?;
        if !dir.is_dir() {
            return Err(AssetError::GroupNotResident(format!("invalid key: {group}")));
        }

        let mut objects = Vec::new();
        for path in list_files(&dir)? {
            let supported = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| self.loaders.supports(ext));
            if !supported {
                tracing::debug!(path = %path.display(), "skipping file without loader");
                continue;
            }
            let bytes = fs::read(&path)?;
            objects.push(self.loaders.load_file(&path, &bytes)?);
        }
        Ok(objects)
    }

    /// Remote files of `group` missing locally, with their sizes
    fn missing_files(&self, group: &str) -> Result<Vec<(PathBuf, u64)>> {
        let local = self.group_dir(group)?;
        let remote = match &self.remote {
            Some(remote) if remote.join(group).is_dir() => remote.join(group),
            _ if local.is_dir() => return Ok(Vec::new()),
            _ => return Err(AssetError::GroupNotResident(format!("invalid key: {group}"))),
        };

        let mut missing = Vec::new();
        for path in list_files(&remote)? {
            let size = fs::metadata(&path)?.len();
            let present = path
                .file_name()
                .map(|name| local.join(name))
                .and_then(|local_path| fs::metadata(local_path).ok())
                .is_some_and(|meta| meta.len() == size);
            if !present {
                missing.push((path, size));
            }
        }
        Ok(missing)
    }

    fn download(&self, group: &str, progress: &ProgressSink) -> Result<()> {
        let missing = self.missing_files(group)?;
        let total: u64 = missing.iter().map(|(_, size)| size).sum();
        let local = self.group_dir(group)?;
        fs::create_dir_all(&local)?;

        let mut copied = 0u64;
        for (path, size) in missing {
            if let Some(name) = path.file_name() {
                fs::copy(&path, local.join(name))?;
            }
            copied += size;
            if total > 0 {
                progress.report(copied as f32 / total as f32);
            }
        }
        progress.report(1.0);
        Ok(())
    }

    fn remote_catalog(&self) -> Result<CatalogFile> {
        match &self.remote {
            Some(remote) => CatalogFile::read(remote),
            None => Ok(CatalogFile::default()),
        }
    }

    fn pending_catalogs(&self) -> Result<Vec<String>> {
        let remote = self.remote_catalog()?;
        let active = self.active.lock();
        Ok(remote
            .catalogs
            .into_iter()
            .filter(|(id, hash)| active.catalogs.get(id) != Some(hash))
            .map(|(id, _)| id)
            .collect())
    }

    fn apply_catalogs(&self, ids: &[String]) -> Result<Vec<String>> {
        let remote = self.remote_catalog()?;
        let mut active = self.active.lock();
        let mut applied = Vec::new();
        for id in ids {
            if let Some(hash) = remote.catalogs.get(id) {
                active.catalogs.insert(id.clone(), hash.clone());
                applied.push(id.clone());
            }
        }
        active.write(&self.root)?;
        Ok(applied)
    }
}

/// Files directly inside `dir`, sorted by name
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl ContentSystem for DirectoryContentStore {
    fn initialize(&self, done: Completion<()>) {
        self.spawn(move |inner| {
            let result = CatalogFile::read(&inner.root).map(|catalog| {
                *inner.active.lock() = catalog;
            });
            done.resolve(result.map_err(|e| e.to_string()));
        });
    }

    fn fetch_group(&self, group: &str, done: Completion<Vec<AssetObject>>) {
        let group = group.to_string();
        self.spawn(move |inner| {
            done.resolve(inner.load_group(&group).map_err(|e| e.to_string()));
        });
    }

    fn estimate_remaining_bytes(&self, group: &str, done: Completion<u64>) {
        let group = group.to_string();
        self.spawn(move |inner| {
            let result = inner
                .missing_files(&group)
                .map(|missing| missing.iter().map(|(_, size)| size).sum());
            done.resolve(result.map_err(|e| e.to_string()));
        });
    }

    fn download_dependencies(&self, group: &str, progress: ProgressSink, done: Completion<()>) {
        let group = group.to_string();
        self.spawn(move |inner| {
            done.resolve(inner.download(&group, &progress).map_err(|e| e.to_string()));
        });
    }

    fn check_catalog_updates(&self, done: Completion<Vec<String>>) {
        self.spawn(move |inner| {
            done.resolve(inner.pending_catalogs().map_err(|e| e.to_string()));
        });
    }

    fn apply_catalog_updates(&self, catalogs: Vec<String>, done: Completion<Vec<String>>) {
        self.spawn(move |inner| {
            done.resolve(inner.apply_catalogs(&catalogs).map_err(|e| e.to_string()));
        });
    }
}
