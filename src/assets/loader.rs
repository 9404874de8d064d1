use crate::assets::{
    Asset, AssetObject, BinaryAsset, JsonAsset, Prefab, Rect, Sprite, SpriteAtlas, TextAsset,
    Texture,
};
use crate::error::{AssetError, Result};
use ahash::AHashMap;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Context provided to asset loaders
pub struct LoadContext<'a> {
    pub path: &'a Path,
    pub bytes: &'a [u8],
}

/// Trait for decoding assets from bytes
pub trait AssetLoader: Send + Sync {
    type Asset: Asset;

    /// Load asset from bytes
    fn load(&self, context: LoadContext<'_>) -> Result<Self::Asset>;

    /// File extensions this loader supports
    fn extensions(&self) -> &[&str];
}

/// Binary asset loader
pub struct BinaryLoader;

impl AssetLoader for BinaryLoader {
    type Asset = BinaryAsset;

    fn load(&self, context: LoadContext<'_>) -> Result<Self::Asset> {
        Ok(BinaryAsset::new(context.bytes.to_vec()))
    }

    fn extensions(&self) -> &[&str] {
        &["bin", "dat", "bytes"]
    }
}

/// JSON asset loader
pub struct JsonLoader;

impl AssetLoader for JsonLoader {
    type Asset = JsonAsset;

    fn load(&self, context: LoadContext<'_>) -> Result<Self::Asset> {
        let value: serde_json::Value = serde_json::from_slice(context.bytes)
            .map_err(|e| AssetError::DecodeError(format!("JSON parse error: {e}")))?;
        Ok(JsonAsset::new(value))
    }

    fn extensions(&self) -> &[&str] {
        &["json"]
    }
}

/// Text asset loader
pub struct TextLoader;

impl AssetLoader for TextLoader {
    type Asset = TextAsset;

    fn load(&self, context: LoadContext<'_>) -> Result<Self::Asset> {
        let content = String::from_utf8(context.bytes.to_vec())
            .map_err(|e| AssetError::DecodeError(format!("UTF-8 decode error: {e}")))?;
        Ok(TextAsset::new(content))
    }

    fn extensions(&self) -> &[&str] {
        &["txt", "md", "toml", "yaml", "yml"]
    }
}

/// PNG texture loader, decoded to RGBA8
pub struct TextureLoader;

impl AssetLoader for TextureLoader {
    type Asset = Texture;

    fn load(&self, context: LoadContext<'_>) -> Result<Self::Asset> {
        let rgba = image::load_from_memory(context.bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Texture::new(width, height, rgba.into_raw()))
    }

    fn extensions(&self) -> &[&str] {
        &["png"]
    }
}

/// Prefab loader; the file body is the JSON template
pub struct PrefabLoader;

impl AssetLoader for PrefabLoader {
    type Asset = Prefab;

    fn load(&self, context: LoadContext<'_>) -> Result<Self::Asset> {
        let template = serde_json::from_slice(context.bytes)
            .map_err(|e| AssetError::DecodeError(format!("Prefab parse error: {e}")))?;
        Ok(Prefab::new(template))
    }

    fn extensions(&self) -> &[&str] {
        &["prefab"]
    }
}

#[derive(Deserialize)]
struct SpriteDesc {
    rect: Rect,
}

#[derive(Deserialize)]
struct AtlasDesc {
    sprites: Vec<AtlasEntry>,
}

#[derive(Deserialize)]
struct AtlasEntry {
    name: String,
    rect: Rect,
}

/// Sprite descriptor loader (`{"rect": {...}}`)
pub struct SpriteLoader;

impl AssetLoader for SpriteLoader {
    type Asset = Sprite;

    fn load(&self, context: LoadContext<'_>) -> Result<Self::Asset> {
        let desc: SpriteDesc = serde_json::from_slice(context.bytes)
            .map_err(|e| AssetError::DecodeError(format!("Sprite parse error: {e}")))?;
        Ok(Sprite::new(desc.rect))
    }

    fn extensions(&self) -> &[&str] {
        &["sprite"]
    }
}

/// Sprite atlas descriptor loader (`{"sprites": [{"name", "rect"}]}`)
pub struct SpriteAtlasLoader;

impl AssetLoader for SpriteAtlasLoader {
    type Asset = SpriteAtlas;

    fn load(&self, context: LoadContext<'_>) -> Result<Self::Asset> {
        let desc: AtlasDesc = serde_json::from_slice(context.bytes)
            .map_err(|e| AssetError::DecodeError(format!("Atlas parse error: {e}")))?;
        Ok(desc
            .sprites
            .into_iter()
            .fold(SpriteAtlas::new(), |atlas, entry| {
                atlas.with_sprite(entry.name, Sprite::new(entry.rect))
            }))
    }

    fn extensions(&self) -> &[&str] {
        &["atlas"]
    }
}

/// Wrapper trait for type-erased loaders
trait LoaderWrapper: Send + Sync {
    fn load_object(&self, name: &str, context: LoadContext<'_>) -> Result<AssetObject>;
    fn extensions(&self) -> &[&str];
}

struct TypedLoaderWrapper<L: AssetLoader> {
    loader: L,
}

impl<L: AssetLoader> LoaderWrapper for TypedLoaderWrapper<L> {
    fn load_object(&self, name: &str, context: LoadContext<'_>) -> Result<AssetObject> {
        let asset = self.loader.load(context)?;
        Ok(AssetObject::from_asset(name, asset))
    }

    fn extensions(&self) -> &[&str] {
        self.loader.extensions()
    }
}

/// Extension-keyed set of loaders
#[derive(Clone)]
pub struct LoaderRegistry {
    loaders: AHashMap<String, Arc<dyn LoaderWrapper>>,
}

impl LoaderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            loaders: AHashMap::new(),
        }
    }

    /// Registry with every built-in loader
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(BinaryLoader);
        registry.register(JsonLoader);
        registry.register(TextLoader);
        registry.register(TextureLoader);
        registry.register(PrefabLoader);
        registry.register(SpriteLoader);
        registry.register(SpriteAtlasLoader);
        registry
    }

    /// Register an asset loader; later registrations win on shared extensions
    pub fn register<L: AssetLoader + 'static>(&mut self, loader: L) {
        let wrapper = Arc::new(TypedLoaderWrapper { loader });
        for ext in wrapper.extensions() {
            self.loaders.insert(ext.to_string(), wrapper.clone());
        }
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.loaders.contains_key(extension)
    }

    /// Decode one file into a named object; the item key is the file stem
    pub fn load_file(&self, path: &Path, bytes: &[u8]) -> Result<AssetObject> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| AssetError::DecodeError(format!("No file extension: {path:?}")))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| AssetError::DecodeError(format!("Invalid file name: {path:?}")))?;

        let loader = self.loaders.get(extension).ok_or_else(|| {
            AssetError::DecodeError(format!("No loader for extension: {extension}"))
        })?;

        loader.load_object(name, LoadContext { path, bytes })
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetKind;

    #[test]
    fn test_loader_registration() {
        let mut registry = LoaderRegistry::new();
        registry.register(BinaryLoader);
        registry.register(JsonLoader);
        registry.register(TextLoader);

        assert_eq!(registry.len(), 9); // bin, dat, bytes, json, txt, md, toml, yaml, yml
        assert!(registry.supports("yml"));
        assert!(!registry.supports("png"));
    }

    #[test]
    fn test_load_file_uses_stem_as_name() {
        let registry = LoaderRegistry::with_defaults();
        let object = registry
            .load_file(Path::new("common/readme.txt"), b"hello")
            .unwrap();
        assert_eq!(object.name(), "readme");
        assert_eq!(object.kind(), AssetKind::Text);
    }

    #[test]
    fn test_load_atlas_descriptor() {
        let registry = LoaderRegistry::with_defaults();
        let bytes = br#"{"sprites": [{"name": "coin", "rect": {"x": 0, "y": 0, "width": 8, "height": 8}}]}"#;
        let object = registry
            .load_file(Path::new("atlas_common.atlas"), bytes)
            .unwrap();
        let atlas = SpriteAtlas::from_payload(object.payload()).unwrap();
        assert_eq!(atlas.get_sprite("coin").map(|s| s.rect().width), Some(8.0));
    }

    #[test]
    fn test_load_png_texture() {
        let image = image::RgbaImage::from_pixel(3, 2, image::Rgba([255, 0, 0, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();

        let object = LoaderRegistry::with_defaults()
            .load_file(Path::new("bg.png"), &bytes)
            .unwrap();
        let texture = Texture::from_payload(object.payload()).unwrap();
        assert_eq!((texture.width(), texture.height()), (3, 2));
        assert_eq!(texture.data().len(), 3 * 2 * 4);
    }

    #[test]
    fn test_unknown_extension_and_bad_json() {
        let registry = LoaderRegistry::with_defaults();
        assert!(matches!(
            registry.load_file(Path::new("clip.wav"), b""),
            Err(AssetError::DecodeError(_))
        ));
        assert!(registry.load_file(Path::new("data.json"), b"{").is_err());
    }
}
