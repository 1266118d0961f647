use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::config::{Config, StorageBackend};
use crate::error::Result;
use crate::models::{StoredMessage, UserProfile};

pub const CHAT_HISTORY_PREFIX: &str = "chat_history";
pub const MESSAGE_COUNTS_KEY: &str = "message_counts";
pub const USER_PROFILE_KEY: &str = "user_profile";

pub fn chat_history_key(persona_id: &str) -> String {
    format!("{CHAT_HISTORY_PREFIX}_{persona_id}")
}

/// String key-value persistence. Values are JSON text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn keys(&self) -> Result<Vec<String>>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

/// Whole store kept as one JSON object on disk, rewritten on every change
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.into_keys().collect())
    }
}

/// Open the backend named in the storage config
pub async fn open_store(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::File => {
            let store = FileStore::new(&config.storage.path);
            tracing::info!("Using file storage at {}", store.path().display());
            Arc::new(store)
        }
        StorageBackend::Redis => Arc::new(crate::redis::RedisStore::new_with_config(config).await?),
    };
    Ok(store)
}

/// Typed access to chat histories, the message ledger and the profile
#[derive(Clone)]
pub struct StudyStorage {
    store: Arc<dyn KeyValueStore>,
}

impl StudyStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn save_chats(&self, persona_id: &str, messages: &[StoredMessage]) -> Result<()> {
        let json = serde_json::to_string(messages)?;
        self.store.set(&chat_history_key(persona_id), &json).await
    }

    pub async fn get_chats(&self, persona_id: &str) -> Result<Vec<StoredMessage>> {
        match self.store.get(&chat_history_key(persona_id)).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    /// Bump the persona's count and return the new value
    pub async fn increment_message_count(&self, persona_id: &str) -> Result<u32> {
        let mut counts = self.get_message_counts().await?;
        let count = counts.entry(persona_id.to_string()).or_insert(0);
        *count += 1;
        let new_count = *count;
        self.store
            .set(MESSAGE_COUNTS_KEY, &serde_json::to_string(&counts)?)
            .await?;
        tracing::debug!(persona = persona_id, count = new_count, "Message count updated");
        Ok(new_count)
    }

    pub async fn get_message_counts(&self) -> Result<HashMap<String, u32>> {
        match self.store.get(MESSAGE_COUNTS_KEY).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(HashMap::new()),
        }
    }

    pub async fn save_user_profile(&self, profile: &UserProfile) -> Result<()> {
        self.store
            .set(USER_PROFILE_KEY, &serde_json::to_string(profile)?)
            .await
    }

    pub async fn get_user_profile(&self) -> Result<Option<UserProfile>> {
        match self.store.get(USER_PROFILE_KEY).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Remove every chat history, the ledger and the profile
    pub async fn clear_all_data(&self) -> Result<()> {
        let keys = self.store.keys().await?;
        for key in keys.iter().filter(|k| k.starts_with(CHAT_HISTORY_PREFIX)) {
            self.store.remove(key).await?;
        }
        self.store.remove(MESSAGE_COUNTS_KEY).await?;
        self.store.remove(USER_PROFILE_KEY).await?;
        tracing::info!("Cleared all study data");
        Ok(())
    }
}
