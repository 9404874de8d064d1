// Asset model
//
// Assets are a tagged union rather than type-erased boxes:
// - `AssetKind` is the declared type tag carried by every loaded object
// - `AssetPayload` holds the decoded data
// - `AssetHandle<T>` is a typed, cheaply cloned view of a shared object

pub mod loader;
pub mod types;

pub use loader::{AssetLoader, LoadContext, LoaderRegistry};
pub use types::{
    BinaryAsset, JsonAsset, Prefab, PrefabInstance, Rect, Sprite, SpriteAtlas, TextAsset,
    Texture,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

/// Declared type tag of a loaded asset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Texture,
    Sprite,
    SpriteAtlas,
    Prefab,
    Text,
    Json,
    Binary,
}

impl AssetKind {
    pub fn name(&self) -> &'static str {
        match self {
            AssetKind::Texture => "Texture",
            AssetKind::Sprite => "Sprite",
            AssetKind::SpriteAtlas => "SpriteAtlas",
            AssetKind::Prefab => "Prefab",
            AssetKind::Text => "Text",
            AssetKind::Json => "Json",
            AssetKind::Binary => "Binary",
        }
    }
}

/// Decoded asset data, one variant per kind
#[derive(Clone, Debug)]
pub enum AssetPayload {
    Texture(Texture),
    Sprite(Sprite),
    SpriteAtlas(SpriteAtlas),
    Prefab(Prefab),
    Text(TextAsset),
    Json(JsonAsset),
    Binary(BinaryAsset),
}

impl AssetPayload {
    pub fn kind(&self) -> AssetKind {
        match self {
            AssetPayload::Texture(_) => AssetKind::Texture,
            AssetPayload::Sprite(_) => AssetKind::Sprite,
            AssetPayload::SpriteAtlas(_) => AssetKind::SpriteAtlas,
            AssetPayload::Prefab(_) => AssetKind::Prefab,
            AssetPayload::Text(_) => AssetKind::Text,
            AssetPayload::Json(_) => AssetKind::Json,
            AssetPayload::Binary(_) => AssetKind::Binary,
        }
    }

    /// Approximate memory size in bytes
    pub fn memory_size(&self) -> usize {
        match self {
            AssetPayload::Texture(asset) => asset.memory_size(),
            AssetPayload::Sprite(asset) => asset.memory_size(),
            AssetPayload::SpriteAtlas(asset) => asset.memory_size(),
            AssetPayload::Prefab(asset) => asset.memory_size(),
            AssetPayload::Text(asset) => asset.memory_size(),
            AssetPayload::Json(asset) => asset.memory_size(),
            AssetPayload::Binary(asset) => asset.memory_size(),
        }
    }
}

/// Trait for concrete asset types stored in an `AssetPayload`
pub trait Asset: Send + Sync + Sized + 'static {
    /// Tag this type is stored under
    const KIND: AssetKind;

    /// Borrow `Self` out of a payload of the matching kind
    fn from_payload(payload: &AssetPayload) -> Option<&Self>;

    /// Wrap into a payload
    fn into_payload(self) -> AssetPayload;

    /// Get approximate memory size in bytes
    fn memory_size(&self) -> usize {
        std::mem::size_of_val(self)
    }
}

/// Implements `Asset` for a type stored under the payload variant of the same name.
macro_rules! impl_asset {
    ($ty:ident, $size:expr) => {
        $crate::assets::impl_asset!($ty => $ty, $size);
    };
    ($ty:ident => $variant:ident, $size:expr) => {
        impl $crate::assets::Asset for $ty {
            const KIND: $crate::assets::AssetKind = $crate::assets::AssetKind::$variant;

            fn from_payload(payload: &$crate::assets::AssetPayload) -> Option<&Self> {
                match payload {
                    $crate::assets::AssetPayload::$variant(asset) => Some(asset),
                    _ => None,
                }
            }

            fn into_payload(self) -> $crate::assets::AssetPayload {
                $crate::assets::AssetPayload::$variant(self)
            }

            fn memory_size(&self) -> usize {
                let size: fn(&$ty) -> usize = $size;
                size(self)
            }
        }
    };
}

pub(crate) use impl_asset;

/// One named object of a loaded group
#[derive(Clone, Debug)]
pub struct AssetObject {
    name: String,
    payload: AssetPayload,
}

impl AssetObject {
    pub fn new(name: impl Into<String>, payload: AssetPayload) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Wrap a concrete asset under `name`
    pub fn from_asset<T: Asset>(name: impl Into<String>, asset: T) -> Self {
        Self::new(name, asset.into_payload())
    }

    /// Item key of this object inside its group
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AssetKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &AssetPayload {
        &self.payload
    }

    pub fn memory_size(&self) -> usize {
        self.name.len() + self.payload.memory_size()
    }
}

/// Typed handle to a resident asset object.
///
/// A handle can only be built for an object whose kind matches `T`, and it
/// keeps the object alive after its group is removed from the cache.
pub struct AssetHandle<T: Asset> {
    object: Arc<AssetObject>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Asset> AssetHandle<T> {
    /// Create a handle if the object holds a `T`
    pub fn from_object(object: &Arc<AssetObject>) -> Option<Self> {
        T::from_payload(&object.payload)?;
        Some(Self {
            object: Arc::clone(object),
            _phantom: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        self.object.name()
    }

    /// Shared object behind this handle
    pub fn object(&self) -> &Arc<AssetObject> {
        &self.object
    }

    /// Whether both handles point at the same loaded object
    pub fn ptr_eq(&self, other: &AssetHandle<T>) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
    }
}

impl<T: Asset> Deref for AssetHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match T::from_payload(&self.object.payload) {
            Some(asset) => asset,
            None => unreachable!("asset handle built over a {:?}", self.object.kind()),
        }
    }
}

impl<T: Asset> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        Self {
            object: Arc::clone(&self.object),
            _phantom: PhantomData,
        }
    }
}

impl<T: Asset> fmt::Debug for AssetHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("name", &self.object.name)
            .field("kind", &T::KIND)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_requires_matching_kind() {
        let object = Arc::new(AssetObject::from_asset(
            "readme",
            TextAsset::new("hello".to_string()),
        ));

        let text = AssetHandle::<TextAsset>::from_object(&object).unwrap();
        assert_eq!(text.content(), "hello");
        assert_eq!(text.name(), "readme");
        assert!(AssetHandle::<Texture>::from_object(&object).is_none());
    }

    #[test]
    fn test_handle_clone_shares_object() {
        let object = Arc::new(AssetObject::from_asset(
            "blob",
            BinaryAsset::new(vec![1, 2, 3]),
        ));
        let a = AssetHandle::<BinaryAsset>::from_object(&object).unwrap();
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert_eq!(Arc::strong_count(&object), 3);
    }

    #[test]
    fn test_payload_kind_and_size() {
        let object = AssetObject::from_asset("blob", BinaryAsset::new(vec![0u8; 64]));
        assert_eq!(object.kind(), AssetKind::Binary);
        assert_eq!(object.memory_size(), "blob".len() + 64);
        assert_eq!(AssetKind::SpriteAtlas.name(), "SpriteAtlas");
    }
}
