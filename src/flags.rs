use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::{debug, info};
use tokio::sync::Mutex;

use crate::error::FlagStoreError;

const IS_ONBOARDED: &str = "is_onboarded";

/// Boolean flags per chat, kept in a small JSON file next to the dialogue database.
pub struct FlagStore {
    path: PathBuf,
    flags: Mutex<HashMap<String, bool>>,
}

fn key(chat_id: i64, flag: &str) -> String {
    format!("{}:{}", flag, chat_id)
}

impl FlagStore {
    /// Opens the store, starting empty when the file doesn't exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, FlagStoreError> {
        let path = path.into();
        let flags = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No flag store at {}, starting empty", path.display());
                HashMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            flags: Mutex::new(flags),
        })
    }

    pub async fn is_onboarded(&self, chat_id: i64) -> bool {
        let flags = self.flags.lock().await;
        flags.get(&key(chat_id, IS_ONBOARDED)).copied() == Some(true)
    }

    pub async fn set_onboarded(&self, chat_id: i64) -> Result<(), FlagStoreError> {
        let mut flags = self.flags.lock().await;
        let mut updated = flags.clone();
        updated.insert(key(chat_id, IS_ONBOARDED), true);

        // Memory only changes once the file is replaced.
        let bytes = serde_json::to_vec_pretty(&updated)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        *flags = updated;
        debug!("Chat {} marked as onboarded", chat_id);
        Ok(())
    }
}
