use crate::env;
use crate::flow::types::FlowError;
use crate::session::model::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Version of the persisted record layout
pub const FORMAT_VERSION: u32 = 1;

/// Durable home of the single live session.
///
/// Each call is atomic: a `load` never observes a partially written record.
/// Unreadable records are discarded and reported as `None`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<Session>>;
    async fn save(&self, session: &Session) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Configuration for the file-backed store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub state_dir: PathBuf,
    pub checksum_validation: bool,
    pub preserve_corrupted: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(env::APP_DIR_NAME),
            checksum_validation: true,
            preserve_corrupted: true,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordOut<'a> {
    format_version: u32,
    #[serde(flatten)]
    session: &'a Session,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordIn {
    #[serde(default = "default_format_version")]
    format_version: u32,
    #[serde(flatten)]
    session: Session,
}

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

/// Serialize a session into its persisted JSON record
pub fn encode_session(session: &Session) -> Result<String> {
    serde_json::to_string_pretty(&RecordOut {
        format_version: FORMAT_VERSION,
        session,
    })
    .context("Failed to serialize session record")
}

/// Parse a persisted JSON record
pub fn decode_session(raw: &str) -> Result<Session, FlowError> {
    let record: RecordIn =
        serde_json::from_str(raw).map_err(|e| FlowError::StorageCorrupt(e.to_string()))?;

    if record.format_version != FORMAT_VERSION {
        return Err(FlowError::StorageCorrupt(format!(
            "unsupported format version {}",
            record.format_version
        )));
    }

    Ok(record.session)
}

/// Hex SHA-256 digest of a serialized record
pub fn calculate_checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Key/value store kept in memory, one serialized record per key
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a raw record under the session key, bypassing serialization
    pub async fn insert_raw(&self, raw: impl Into<String>) {
        self.entries
            .lock()
            .await
            .insert(env::storage::SESSION_KEY.to_string(), raw.into());
    }

    pub async fn raw(&self) -> Option<String> {
        self.entries
            .lock()
            .await
            .get(env::storage::SESSION_KEY)
            .cloned()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        let mut entries = self.entries.lock().await;
        let Some(raw) = entries.get(env::storage::SESSION_KEY) else {
            return Ok(None);
        };

        match decode_session(raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!("Discarding stored session: {}", e);
                entries.remove(env::storage::SESSION_KEY);
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let raw = encode_session(session)?;
        self.entries
            .lock()
            .await
            .insert(env::storage::SESSION_KEY.to_string(), raw);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.lock().await.remove(env::storage::SESSION_KEY);
        Ok(())
    }
}

/// Session record kept as a JSON file, replaced atomically on every save
pub struct FileSessionStore {
    state_dir: PathBuf,
    temp_dir: PathBuf,
    pub config: StorageConfig,
}

impl FileSessionStore {
    /// Create the store, making sure its directories exist
    pub fn new(config: StorageConfig) -> Result<Self> {
        let state_dir = config.state_dir.clone();
        let temp_dir = env::temp_dir_path(&state_dir);

        for dir in [&state_dir, &temp_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        Ok(Self {
            state_dir,
            temp_dir,
            config,
        })
    }

    pub fn session_file(&self) -> PathBuf {
        env::session_file_path(&self.state_dir)
    }

    /// Write `data` to `target` through a synced temp file and a rename
    async fn write_atomic(&self, target: &Path, data: &[u8]) -> Result<()> {
        let temp_file = self
            .temp_dir
            .join(format!("write_{}.tmp", uuid::Uuid::new_v4()));

        let mut file = async_fs::File::create(&temp_file)
            .await
            .with_context(|| format!("Failed to create temp file: {}", temp_file.display()))?;
        file.write_all(data)
            .await
            .context("Failed to write session data")?;
        file.sync_all()
            .await
            .context("Failed to sync session file")?;
        drop(file);

        if let Err(e) = async_fs::rename(&temp_file, target).await {
            let _ = async_fs::remove_file(&temp_file).await;
            return Err(e).with_context(|| format!("Failed to replace {}", target.display()));
        }
        Ok(())
    }

    async fn validate_checksum(&self, data: &[u8]) -> Result<(), FlowError> {
        let checksum_file = env::checksum_file_path(&self.state_dir);

        match async_fs::read_to_string(&checksum_file).await {
            Ok(stored) => {
                if stored.trim() != calculate_checksum(data) {
                    return Err(FlowError::StorageCorrupt(
                        "checksum validation failed".to_string(),
                    ));
                }
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FlowError::Storage(format!(
                "failed to read checksum file: {}",
                e
            ))),
        }
    }

    /// Move a corrupt record aside (or delete it) so the next load starts clean
    async fn discard_corrupt(&self, error: &FlowError) -> Result<()> {
        warn!("Discarding stored session: {}", error);
        let session_file = self.session_file();

        if self.config.preserve_corrupted {
            let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f").to_string();
            let target = env::corrupt_file_path(&self.state_dir, &stamp);
            async_fs::rename(&session_file, &target)
                .await
                .with_context(|| format!("Failed to quarantine {}", session_file.display()))?;
            info!("Corrupt session record preserved at {}", target.display());
        } else {
            remove_if_exists(&session_file).await?;
        }

        remove_if_exists(&env::checksum_file_path(&self.state_dir)).await
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        let session_file = self.session_file();

        let content = match async_fs::read(&session_file).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read session file: {}", session_file.display())
                });
            }
        };

        if self.config.checksum_validation {
            match self.validate_checksum(&content).await {
                Ok(()) => {}
                Err(e @ FlowError::StorageCorrupt(_)) => {
                    self.discard_corrupt(&e).await?;
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let decoded = std::str::from_utf8(&content)
            .map_err(|e| FlowError::StorageCorrupt(e.to_string()))
            .and_then(decode_session);

        match decoded {
            Ok(session) => {
                debug!("Loaded session {} from {}", session.session_id, session_file.display());
                Ok(Some(session))
            }
            Err(e) => {
                self.discard_corrupt(&e).await?;
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let data = encode_session(session)?.into_bytes();
        self.write_atomic(&self.session_file(), &data).await?;

        if self.config.checksum_validation {
            let checksum = calculate_checksum(&data);
            self.write_atomic(&env::checksum_file_path(&self.state_dir), checksum.as_bytes())
                .await?;
        }

        debug!(
            "Saved session {} ({} bytes, step {})",
            session.session_id,
            data.len(),
            session.current_step
        );
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        remove_if_exists(&self.session_file()).await?;
        remove_if_exists(&env::checksum_file_path(&self.state_dir)).await?;
        remove_if_exists(&env::legacy_step_file_path(&self.state_dir)).await?;
        debug!("Cleared session record in {}", self.state_dir.display());
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match async_fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}
