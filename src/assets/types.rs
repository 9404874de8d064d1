use crate::assets::{impl_asset, AssetHandle};
use serde::{Deserialize, Serialize};

/// Pixel rectangle inside a texture
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Decoded RGBA8 texture
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Texture {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }
    pub fn height(&self) -> u32 {
        self.height
    }
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl_asset!(Texture, |texture| texture.data.len());

/// Region of a texture drawn as one image
#[derive(Clone, Debug)]
pub struct Sprite {
    rect: Rect,
    texture: Option<AssetHandle<Texture>>,
}

impl Sprite {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            texture: None,
        }
    }

    /// Sprite covering the whole texture, anchored at the origin
    pub fn from_texture(texture: AssetHandle<Texture>) -> Self {
        let rect = Rect::new(0.0, 0.0, texture.width() as f32, texture.height() as f32);
        Self {
            rect,
            texture: Some(texture),
        }
    }

    pub fn with_texture(mut self, texture: AssetHandle<Texture>) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }
    pub fn texture(&self) -> Option<&AssetHandle<Texture>> {
        self.texture.as_ref()
    }
}

impl_asset!(Sprite, |_| std::mem::size_of::<Sprite>());

/// Packed collection of named sprites
#[derive(Clone, Debug, Default)]
pub struct SpriteAtlas {
    sprites: Vec<(String, Sprite)>,
}

impl SpriteAtlas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sprite(mut self, name: impl Into<String>, sprite: Sprite) -> Self {
        self.sprites.push((name.into(), sprite));
        self
    }

    /// Look up a sprite by name; first match wins
    pub fn get_sprite(&self, name: &str) -> Option<&Sprite> {
        self.sprites
            .iter()
            .find(|(sprite_name, _)| sprite_name == name)
            .map(|(_, sprite)| sprite)
    }

    pub fn sprite_names(&self) -> impl Iterator<Item = &str> {
        self.sprites.iter().map(|(name, _)| name.as_str())
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites.len()
    }
}

impl_asset!(SpriteAtlas, |atlas| atlas
    .sprites
    .iter()
    .map(|(name, _)| name.len() + std::mem::size_of::<Sprite>())
    .sum());

/// Template object that is cloned into independent instances
#[derive(Clone, Debug, PartialEq)]
pub struct Prefab {
    template: serde_json::Value,
}

impl Prefab {
    pub fn new(template: serde_json::Value) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &serde_json::Value {
        &self.template
    }

    /// Create a fresh instance; later edits to it never reach the prefab
    pub fn instantiate(&self, source: impl Into<String>) -> PrefabInstance {
        PrefabInstance {
            source: source.into(),
            state: self.template.clone(),
        }
    }
}

impl_asset!(Prefab, |prefab| prefab.template.to_string().len());

/// Instance created from a prefab
#[derive(Clone, Debug, PartialEq)]
pub struct PrefabInstance {
    /// Address of the prefab this instance came from
    pub source: String,
    pub state: serde_json::Value,
}

/// Text file asset
#[derive(Clone, Debug, PartialEq)]
pub struct TextAsset {
    content: String,
}

impl TextAsset {
    pub fn new(content: String) -> Self {
        Self { content }
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl_asset!(TextAsset => Text, |text| text.content.len());

/// JSON data asset
#[derive(Clone, Debug, PartialEq)]
pub struct JsonAsset {
    value: serde_json::Value,
}

impl JsonAsset {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }
}

impl_asset!(JsonAsset => Json, |json| json.value.to_string().len());

/// Binary data asset
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryAsset {
    data: Vec<u8>,
}

impl BinaryAsset {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl_asset!(BinaryAsset => Binary, |binary| binary.data.len());
