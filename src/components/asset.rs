//! Asset declarations and loaded payloads.
//!
//! An [`AssetDecl`] is what callers hand to the asset manager; an [`Asset`]
//! is what comes back once the loader for its [`AssetKind`] has run. Assets
//! are owned by the manager; consumers only borrow them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared asset type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Audio,
    Json,
    Spritesheet,
    Font,
}

/// One entry of an asset list:
/// `{ "id": "...", "type": "image", "src": "...", "metadata": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDecl {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl AssetDecl {
    pub fn new(id: impl Into<String>, kind: AssetKind, src: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            src: src.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Read a string field from the metadata object.
    pub fn meta_str(&self, field: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(field)?.as_str()
    }

    /// Read an unsigned integer field from the metadata object.
    pub fn meta_u32(&self, field: &str) -> Option<u32> {
        self.metadata
            .as_ref()?
            .get(field)?
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
}

/// Decoded image size plus the encoded bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Ogg,
    Mp3,
    Flac,
}

/// Audio bytes that passed the decodability probe.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub format: AudioFormat,
    pub bytes: Vec<u8>,
}

/// One frame rectangle of a sprite sheet, in image pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteFrame {
    #[serde(default)]
    pub name: Option<String>,
    pub x: u32,
    pub y: u32,
    #[serde(alias = "w")]
    pub width: u32,
    #[serde(alias = "h")]
    pub height: u32,
}

/// Image plus frame layout.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteSheet {
    pub image: ImageData,
    pub frames: Vec<SpriteFrame>,
}

impl SpriteSheet {
    pub fn frame(&self, index: usize) -> Option<&SpriteFrame> {
        self.frames.get(index)
    }

    pub fn frame_named(&self, name: &str) -> Option<&SpriteFrame> {
        self.frames
            .iter()
            .find(|f| f.name.as_deref() == Some(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFormat {
    TrueType,
    OpenType,
}

/// A registered font face.
#[derive(Debug, Clone, PartialEq)]
pub struct FontFace {
    pub family: String,
    pub format: FontFormat,
    pub bytes: Vec<u8>,
}

/// Loaded payload, one case per [`AssetKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum AssetPayload {
    Image(ImageData),
    Audio(AudioClip),
    Json(Value),
    Spritesheet(SpriteSheet),
    Font(FontFace),
}

/// A loaded asset as cached by the manager.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub id: String,
    pub kind: AssetKind,
    pub src: String,
    pub payload: AssetPayload,
    pub metadata: Option<Value>,
}
