//! Asset cache and bridge to the loader thread.
//!
//! [`AssetManager::new`] spawns the background loader
//! ([`asset_loader_thread`]) and keeps the command sender and message
//! receiver. [`AssetManager::load`] blocks until every asset of the batch
//! has settled or the first one fails; results that arrive after a failed
//! batch returned are cached by [`AssetManager::poll`], which the engine
//! calls once per frame.
//!
//! The cache is only ever mutated here. `get` never fails: unknown or
//! unloaded ids yield `None`.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, info, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use crate::components::asset::{
    Asset, AssetDecl, AssetPayload, AudioClip, FontFace, ImageData, SpriteSheet,
};
use crate::error::AssetError;
use crate::events::asset::{AssetCmd, AssetMessage};
use crate::events::{EventSystem, Payload, topics};
use crate::resources::assetsource::AssetSource;
use crate::systems::assetloader::asset_loader_thread;

pub struct AssetManager {
    cache: FxHashMap<String, Asset>,
    pending: FxHashSet<String>,
    fonts: FxHashMap<String, String>,
    tx_cmd: Option<Sender<AssetCmd>>,
    rx_msg: Receiver<AssetMessage>,
    handle: Option<JoinHandle<()>>,
    events: EventSystem,
}

impl AssetManager {
    /// Spawn the loader thread over `source`.
    pub fn new(source: Arc<dyn AssetSource>, events: EventSystem) -> Self {
        let (tx_cmd, rx_cmd) = unbounded::<AssetCmd>();
        let (tx_msg, rx_msg) = unbounded::<AssetMessage>();
        let handle = std::thread::Builder::new()
            .name("asset-loader".into())
            .spawn(move || asset_loader_thread(rx_cmd, tx_msg, source))
            .map_err(|e| warn!("could not spawn asset loader thread: {}", e))
            .ok();
        Self {
            cache: FxHashMap::default(),
            pending: FxHashSet::default(),
            fonts: FxHashMap::default(),
            tx_cmd: handle.as_ref().map(|_| tx_cmd),
            rx_msg,
            handle,
            events,
        }
    }

    /// Load every declared asset.
    ///
    /// Ids already cached, or repeated within `decls`, are skipped with a
    /// warning. Ids still in flight from an earlier call are waited on, not
    /// re-requested. Returns the first failure of this batch.
    pub fn load(&mut self, decls: &[AssetDecl]) -> Result<(), AssetError> {
        self.poll();

        let mut batch: FxHashSet<String> = FxHashSet::default();
        for decl in decls {
            if self.cache.contains_key(&decl.id) || batch.contains(&decl.id) {
                warn!("asset '{}' is already loaded, skipping", decl.id);
                continue;
            }
            if self.pending.contains(&decl.id) {
                debug!("asset '{}' already in flight, waiting on it", decl.id);
                batch.insert(decl.id.clone());
                continue;
            }
            let tx = self.tx_cmd.as_ref().ok_or(AssetError::LoaderUnavailable)?;
            tx.send(AssetCmd::Load { decl: decl.clone() })
                .map_err(|_| AssetError::LoaderUnavailable)?;
            self.pending.insert(decl.id.clone());
            batch.insert(decl.id.clone());
        }

        while !batch.is_empty() {
            let msg = self
                .rx_msg
                .recv()
                .map_err(|_| AssetError::LoaderUnavailable)?;
            let id = msg.id().to_string();
            let outcome = self.settle(msg);
            if batch.remove(&id) {
                outcome?;
            }
        }
        Ok(())
    }

    /// Cache any completed loads without blocking. Returns how many settled.
    pub fn poll(&mut self) -> usize {
        let msgs: Vec<AssetMessage> = self.rx_msg.try_iter().collect();
        let count = msgs.len();
        for msg in msgs {
            // Failures were already logged and emitted by `settle`.
            let _ = self.settle(msg);
        }
        count
    }

    fn settle(&mut self, msg: AssetMessage) -> Result<(), AssetError> {
        match msg {
            AssetMessage::Loaded { asset } => {
                self.pending.remove(&asset.id);
                if let AssetPayload::Font(face) = &asset.payload {
                    self.fonts.insert(asset.id.clone(), face.family.clone());
                }
                let id = asset.id.clone();
                self.cache.insert(id.clone(), *asset);
                self.events
                    .emit(topics::ASSET_LOADED, &Payload::Asset { id });
                Ok(())
            }
            AssetMessage::Failed { id, error } => {
                self.pending.remove(&id);
                self.events.emit(
                    topics::ASSET_ERROR,
                    &Payload::AssetFailed {
                        id,
                        error: error.to_string(),
                    },
                );
                Err(error)
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Asset> {
        self.cache.get(id)
    }

    pub fn image(&self, id: &str) -> Option<&ImageData> {
        match &self.get(id)?.payload {
            AssetPayload::Image(img) => Some(img),
            AssetPayload::Spritesheet(sheet) => Some(&sheet.image),
            _ => None,
        }
    }

    pub fn audio(&self, id: &str) -> Option<&AudioClip> {
        match &self.get(id)?.payload {
            AssetPayload::Audio(clip) => Some(clip),
            _ => None,
        }
    }

    pub fn json(&self, id: &str) -> Option<&Value> {
        match &self.get(id)?.payload {
            AssetPayload::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn spritesheet(&self, id: &str) -> Option<&SpriteSheet> {
        match &self.get(id)?.payload {
            AssetPayload::Spritesheet(sheet) => Some(sheet),
            _ => None,
        }
    }

    pub fn font(&self, id: &str) -> Option<&FontFace> {
        match &self.get(id)?.payload {
            AssetPayload::Font(face) => Some(face),
            _ => None,
        }
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.cache.contains_key(id)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    /// Font families registered by loaded font assets.
    pub fn registered_fonts(&self) -> Vec<&str> {
        let mut families: Vec<&str> = self.fonts.values().map(String::as_str).collect();
        families.sort_unstable();
        families.dedup();
        families
    }

    /// `(loaded, requested)` where requested counts loaded plus in-flight.
    pub fn progress(&self) -> (usize, usize) {
        (self.cache.len(), self.cache.len() + self.pending.len())
    }

    /// Evict one asset. Returns false for unknown ids.
    pub fn unload(&mut self, id: &str) -> bool {
        if self.cache.remove(id).is_none() {
            return false;
        }
        self.fonts.remove(id);
        self.events.emit(
            topics::ASSET_UNLOADED,
            &Payload::Asset { id: id.to_string() },
        );
        true
    }

    pub fn unload_all(&mut self) {
        let ids: Vec<String> = self.cache.keys().cloned().collect();
        for id in ids {
            self.unload(&id);
        }
    }

    /// Stop and join the loader thread. Further loads fail with
    /// [`AssetError::LoaderUnavailable`]; cached assets stay readable.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.tx_cmd.take() {
            let _ = tx.send(AssetCmd::Shutdown);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            info!("asset loader stopped");
        }
        self.pending.clear();
    }
}

impl Drop for AssetManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
