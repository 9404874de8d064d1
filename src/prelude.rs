//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use group_assets::prelude::*;
//! ```

pub use crate::assets::{
    Asset, AssetHandle, AssetKind, AssetObject, AssetPayload, BinaryAsset, JsonAsset, Prefab,
    PrefabInstance, Rect, Sprite, SpriteAtlas, TextAsset, Texture,
};
pub use crate::cache::{CacheStats, GroupCache};
pub use crate::config::{AssetConfig, LogConfig, RetryPolicy};
pub use crate::content::{
    Completion, ContentSystem, DirectoryContentStore, MemoryContentStore, ProgressSink,
};
pub use crate::download::DownloadState;
pub use crate::error::{AssetError, Result};
pub use crate::manager::AssetManager;
