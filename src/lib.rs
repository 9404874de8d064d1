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

//! Group Assets - grouped asset cache with single-flight async loading
//!
//! Assets are addressed as `group/item` and loaded a whole group at a time
//! from a pluggable content system. The [`AssetManager`] loads each group at
//! most once, coalesces concurrent requests, sequences preloads, drives
//! downloads and catalog refreshes, and answers synchronous lookups once a
//! group is resident.

pub mod address;
pub mod assets;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod content;
pub mod coordinator;
pub mod download;
pub mod error;
pub mod logging;
pub mod manager;
pub mod prelude;
pub mod preload;

pub use assets::{Asset, AssetHandle, AssetKind, AssetObject, AssetPayload};
pub use cache::{CacheStats, GroupCache, GroupRecord};
pub use config::{AssetConfig, LogConfig, RetryPolicy};
pub use content::{
    Completion, ContentResult, ContentSystem, DirectoryContentStore, JobId, MemoryContentStore,
    ProgressSink,
};
pub use download::DownloadState;
pub use error::{AssetError, Result};
pub use logging::{init_logging, LogGuard};
pub use manager::AssetManager;
