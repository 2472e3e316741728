//! Messages exchanged with the background asset loader thread.

use crate::components::asset::{Asset, AssetDecl};
use crate::error::AssetError;

/// Commands sent *to* the loader thread.
#[derive(Debug, Clone)]
pub enum AssetCmd {
    Load { decl: AssetDecl },
    Shutdown,
}

/// Results sent *back* from the loader thread.
#[derive(Debug)]
pub enum AssetMessage {
    Loaded { asset: Box<Asset> },
    Failed { id: String, error: AssetError },
}

impl AssetMessage {
    pub fn id(&self) -> &str {
        match self {
            AssetMessage::Loaded { asset } => &asset.id,
            AssetMessage::Failed { id, .. } => id,
        }
    }
}
