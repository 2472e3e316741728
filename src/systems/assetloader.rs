//! Background asset loader.
//!
//! [`asset_loader_thread`] runs on its own OS thread, owns nothing but the
//! [`AssetSource`], and answers every [`AssetCmd::Load`] with exactly one
//! [`AssetMessage`]. The main thread talks to it through
//! `crossbeam_channel` senders/receivers held by
//! [`AssetManager`](crate::resources::assetstore::AssetManager).
//!
//! Each [`AssetKind`] has a dedicated loader:
//! - image: full decode through `image` (PNG, JPEG, GIF, BMP)
//! - audio: decodability probe on the container signature
//! - json: fetch + parse
//! - spritesheet: image + frame layout from metadata
//! - font: parsed with `fontdue`, then registered under its family

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use fontdue::{Font, FontSettings};
use image::GenericImageView;
use log::{debug, error};
use serde_json::Value;

use crate::components::asset::{
    Asset, AssetDecl, AssetKind, AssetPayload, AudioClip, AudioFormat, FontFace, FontFormat,
    ImageData, ImageFormat, SpriteFrame, SpriteSheet,
};
use crate::error::AssetError;
use crate::events::asset::{AssetCmd, AssetMessage};
use crate::resources::assetsource::AssetSource;

/// Entry point of the loader thread. Blocks until [`AssetCmd::Shutdown`] or
/// until every command sender is dropped.
pub fn asset_loader_thread(
    rx_cmd: Receiver<AssetCmd>,
    tx_msg: Sender<AssetMessage>,
    source: Arc<dyn AssetSource>,
) {
    debug!("[assets] loader thread starting (id={:?})", std::thread::current().id());
    for cmd in rx_cmd.iter() {
        match cmd {
            AssetCmd::Load { decl } => {
                let msg = match load_asset(&decl, source.as_ref()) {
                    Ok(asset) => {
                        debug!("[assets] loaded id='{}' src='{}'", decl.id, decl.src);
                        AssetMessage::Loaded {
                            asset: Box::new(asset),
                        }
                    }
                    Err(e) => {
                        error!("[assets] load failed id='{}': {}", decl.id, e);
                        AssetMessage::Failed { id: decl.id, error: e }
                    }
                };
                if tx_msg.send(msg).is_err() {
                    break;
                }
            }
            AssetCmd::Shutdown => break,
        }
    }
    debug!("[assets] loader thread exiting");
}

/// Fetch and decode one declared asset.
pub fn load_asset(decl: &AssetDecl, source: &dyn AssetSource) -> Result<Asset, AssetError> {
    let bytes = fetch(decl, &decl.src, source)?;
    let payload = match decl.kind {
        AssetKind::Image => AssetPayload::Image(decode_image(&decl.id, bytes)?),
        AssetKind::Audio => AssetPayload::Audio(probe_audio(&decl.id, bytes)?),
        AssetKind::Json => AssetPayload::Json(parse_json(&decl.id, &bytes)?),
        AssetKind::Spritesheet => {
            let image = decode_image(&decl.id, bytes)?;
            let frames = sprite_frames(decl, &image, source)?;
            AssetPayload::Spritesheet(SpriteSheet { image, frames })
        }
        AssetKind::Font => AssetPayload::Font(register_font(decl, bytes)?),
    };
    Ok(Asset {
        id: decl.id.clone(),
        kind: decl.kind,
        src: decl.src.clone(),
        payload,
        metadata: decl.metadata.clone(),
    })
}

fn fetch(decl: &AssetDecl, src: &str, source: &dyn AssetSource) -> Result<Vec<u8>, AssetError> {
    source.fetch(src).map_err(|e| AssetError::Fetch {
        id: decl.id.clone(),
        src: src.to_string(),
        reason: e.to_string(),
    })
}

fn decode_error(id: &str, reason: impl Into<String>) -> AssetError {
    AssetError::Decode {
        id: id.to_string(),
        reason: reason.into(),
    }
}

/// Decode the whole image so a corrupt body fails here and not at draw time.
pub fn decode_image(id: &str, bytes: Vec<u8>) -> Result<ImageData, AssetError> {
    let format = match image::guess_format(&bytes) {
        Ok(image::ImageFormat::Png) => ImageFormat::Png,
        Ok(image::ImageFormat::Jpeg) => ImageFormat::Jpeg,
        Ok(image::ImageFormat::Gif) => ImageFormat::Gif,
        Ok(image::ImageFormat::Bmp) => ImageFormat::Bmp,
        Ok(other) => return Err(decode_error(id, format!("unsupported image format {other:?}"))),
        Err(e) => return Err(decode_error(id, e.to_string())),
    };
    let img = image::load_from_memory(&bytes).map_err(|e| decode_error(id, e.to_string()))?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(decode_error(id, format!("image has zero size {width}x{height}")));
    }
    Ok(ImageData {
        format,
        width,
        height,
        bytes,
    })
}

/// Check the container signature so undecodable audio fails at load time.
pub fn probe_audio(id: &str, bytes: Vec<u8>) -> Result<AudioClip, AssetError> {
    let format = if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WAVE".as_slice()) {
        AudioFormat::Wav
    } else if bytes.starts_with(b"OggS") {
        AudioFormat::Ogg
    } else if bytes.starts_with(b"fLaC") {
        AudioFormat::Flac
    } else if bytes.starts_with(b"ID3")
        || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
    {
        AudioFormat::Mp3
    } else {
        return Err(decode_error(id, "audio is not wav, ogg, mp3 or flac"));
    };
    Ok(AudioClip { format, bytes })
}

fn parse_json(id: &str, bytes: &[u8]) -> Result<Value, AssetError> {
    serde_json::from_slice(bytes).map_err(|e| decode_error(id, format!("invalid json: {e}")))
}

fn register_font(decl: &AssetDecl, bytes: Vec<u8>) -> Result<FontFace, AssetError> {
    let font = Font::from_bytes(bytes.as_slice(), FontSettings::default())
        .map_err(|e| decode_error(&decl.id, format!("font parse failed: {e}")))?;
    let format = if bytes.starts_with(b"OTTO") {
        FontFormat::OpenType
    } else {
        FontFormat::TrueType
    };
    let family = decl.meta_str("family").unwrap_or(&decl.id).to_string();
    debug!("[assets] font '{}' has {} glyphs", family, font.glyph_count());
    Ok(FontFace {
        family,
        format,
        bytes,
    })
}

/// Frame layout for a sprite sheet, in order of precedence:
/// explicit `frames`, an `atlas` JSON locator, a `frameWidth`/`frameHeight`
/// grid, or a single frame covering the whole image.
fn sprite_frames(
    decl: &AssetDecl,
    image: &ImageData,
    source: &dyn AssetSource,
) -> Result<Vec<SpriteFrame>, AssetError> {
    if let Some(frames) = decl.metadata.as_ref().and_then(|m| m.get("frames")) {
        return parse_frames(&decl.id, frames);
    }
    if let Some(atlas) = decl.meta_str("atlas") {
        let bytes = fetch(decl, atlas, source)?;
        let value = parse_json(&decl.id, &bytes)?;
        let frames = value.get("frames").unwrap_or(&value);
        return parse_frames(&decl.id, frames);
    }
    if let (Some(fw), Some(fh)) = (decl.meta_u32("frameWidth"), decl.meta_u32("frameHeight")) {
        if fw == 0 || fh == 0 {
            return Err(decode_error(&decl.id, "frame size must be positive"));
        }
        let cols = image.width / fw;
        let rows = image.height / fh;
        let limit = decl
            .meta_u32("frameCount")
            .map_or(usize::MAX, |n| n as usize);
        let frames: Vec<SpriteFrame> = (0..rows)
            .flat_map(|r| (0..cols).map(move |c| (c, r)))
            .take(limit)
            .map(|(c, r)| SpriteFrame {
                name: None,
                x: c * fw,
                y: r * fh,
                width: fw,
                height: fh,
            })
            .collect();
        if frames.is_empty() {
            return Err(decode_error(&decl.id, "frame size larger than the image"));
        }
        return Ok(frames);
    }
    Ok(vec![SpriteFrame {
        name: None,
        x: 0,
        y: 0,
        width: image.width,
        height: image.height,
    }])
}

/// Accepts a plain array of rectangles, or TexturePacker-style array/hash
/// entries that nest the rectangle under `frame`.
fn parse_frames(id: &str, value: &Value) -> Result<Vec<SpriteFrame>, AssetError> {
    fn one(name: Option<String>, entry: &Value) -> Option<SpriteFrame> {
        let rect = entry.get("frame").unwrap_or(entry);
        let mut frame: SpriteFrame = serde_json::from_value(rect.clone()).ok()?;
        frame.name = name
            .or_else(|| entry.get("filename").and_then(Value::as_str).map(str::to_string))
            .or(frame.name);
        Some(frame)
    }
    let frames: Option<Vec<SpriteFrame>> = match value {
        Value::Array(entries) => entries.iter().map(|e| one(None, e)).collect(),
        Value::Object(map) => map.iter().map(|(k, e)| one(Some(k.clone()), e)).collect(),
        _ => None,
    };
    frames.ok_or_else(|| decode_error(id, "malformed sprite frame metadata"))
}


#[cfg(test)]
mod tests {
    use super::fixtures::{TTF, encoded, png, wav};
    use super::*;
    use crate::resources::assetsource::MemorySource;
    use image::ImageOutputFormat;
    use serde_json::json;

    #[test]
    fn png_dimensions() {
        let img = decode_image("a", png(64, 32)).unwrap();
        assert_eq!(img.format, ImageFormat::Png);
        assert_eq!((img.width, img.height), (64, 32));
    }

    #[test]
    fn gif_bmp_and_jpeg_decode() {
        let img = decode_image("g", encoded(10, 20, ImageOutputFormat::Gif)).unwrap();
        assert_eq!((img.format, img.width, img.height), (ImageFormat::Gif, 10, 20));

        let img = decode_image("b", encoded(7, 9, ImageOutputFormat::Bmp)).unwrap();
        assert_eq!((img.format, img.width, img.height), (ImageFormat::Bmp, 7, 9));

        let img = decode_image("j", encoded(64, 48, ImageOutputFormat::Jpeg(80))).unwrap();
        assert_eq!((img.format, img.width, img.height), (ImageFormat::Jpeg, 64, 48));
    }

    #[test]
    fn garbage_image_is_a_decode_error() {
        let err = decode_image("x", b"not an image".to_vec()).unwrap_err();
        assert!(matches!(err, AssetError::Decode { ref id, .. } if id == "x"));
    }

    #[test]
    fn png_with_corrupt_body_is_rejected() {
        // Valid signature and IHDR, then junk where the image data belongs.
        let mut bytes = png(64, 64)[..33].to_vec();
        bytes.extend_from_slice(b"garbage-not-a-png-body");
        let source = MemorySource::new().with("bad.png", bytes);
        let decl = AssetDecl::new("bad", AssetKind::Image, "bad.png");
        assert!(matches!(
            load_asset(&decl, &source),
            Err(AssetError::Decode { ref id, .. }) if id == "bad"
        ));
    }

    #[test]
    fn truncated_png_is_rejected() {
        let mut bytes = png(16, 16);
        bytes.truncate(bytes.len() / 2);
        assert!(decode_image("t", bytes).is_err());
    }

    #[test]
    fn audio_probe_accepts_known_containers() {
        assert_eq!(probe_audio("a", wav()).unwrap().format, AudioFormat::Wav);
        assert_eq!(probe_audio("a", b"OggS....".to_vec()).unwrap().format, AudioFormat::Ogg);
        assert_eq!(probe_audio("a", b"ID3\x04".to_vec()).unwrap().format, AudioFormat::Mp3);
        assert!(probe_audio("a", b"MThd".to_vec()).is_err());
    }

    #[test]
    fn spritesheet_grid_slicing() {
        let source = MemorySource::new().with("hero.png", png(64, 32));
        let decl = AssetDecl::new("hero", AssetKind::Spritesheet, "hero.png")
            .with_metadata(json!({"frameWidth": 16, "frameHeight": 16, "frameCount": 6}));
        let asset = load_asset(&decl, &source).unwrap();
        let AssetPayload::Spritesheet(sheet) = asset.payload else {
            panic!("expected spritesheet");
        };
        assert_eq!(sheet.frames.len(), 6);
        assert_eq!((sheet.frames[5].x, sheet.frames[5].y), (16, 16));
    }

    #[test]
    fn spritesheet_atlas_hash_format() {
        let atlas = json!({"frames": {"idle": {"frame": {"x": 0, "y": 0, "w": 8, "h": 8}}}});
        let source = MemorySource::new()
            .with("s.png", png(8, 8))
            .with("s.json", serde_json::to_vec(&atlas).unwrap());
        let decl = AssetDecl::new("s", AssetKind::Spritesheet, "s.png")
            .with_metadata(json!({"atlas": "s.json"}));
        let AssetPayload::Spritesheet(sheet) = load_asset(&decl, &source).unwrap().payload else {
            panic!("expected spritesheet");
        };
        assert_eq!(sheet.frame_named("idle").map(|f| f.width), Some(8));
    }

    #[test]
    fn font_family_from_metadata() {
        let source = MemorySource::new().with("f.ttf", TTF.to_vec());
        let decl = AssetDecl::new("title_font", AssetKind::Font, "f.ttf")
            .with_metadata(json!({"family": "Pixel"}));
        let AssetPayload::Font(face) = load_asset(&decl, &source).unwrap().payload else {
            panic!("expected font");
        };
        assert_eq!(face.family, "Pixel");
        assert_eq!(face.format, FontFormat::TrueType);
    }

    #[test]
    fn font_with_only_a_signature_is_rejected() {
        let source = MemorySource::new().with("f.otf", b"OTTO\0\0\0\0".to_vec());
        let decl = AssetDecl::new("title_font", AssetKind::Font, "f.otf")
            .with_metadata(json!({"family": "Pixel"}));
        assert!(matches!(
            load_asset(&decl, &source),
            Err(AssetError::Decode { ref id, .. }) if id == "title_font"
        ));
    }

    #[test]
    fn missing_locator_is_a_fetch_error() {
        let source = MemorySource::new();
        let decl = AssetDecl::new("cfg", AssetKind::Json, "cfg.json");
        assert!(matches!(
            load_asset(&decl, &source),
            Err(AssetError::Fetch { .. })
        ));
    }
}
