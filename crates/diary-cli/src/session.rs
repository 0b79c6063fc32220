//! Signed-in user persisted next to the local databases.

use std::path::{Path, PathBuf};

use diary_core::auth::AuthUser;
use serde::{Deserialize, Serialize};

const SESSION_FILE_NAME: &str = "session.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredSession {
    #[serde(default = "default_session_version")]
    pub version: u32,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

const fn default_session_version() -> u32 {
    1
}

pub fn session_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SESSION_FILE_NAME)
}

impl StoredSession {
    pub fn signed_in(user: AuthUser) -> Self {
        Self {
            version: default_session_version(),
            user: Some(user),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read session at {}: {}", path.display(), error))?;
        serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse session at {}: {}", path.display(), error))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create session directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let serialized = serde_json::to_string_pretty(self)
            .map_err(|error| format!("Failed to serialize session: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write session at {}: {}", path.display(), error))
    }

    pub fn clear_at_path(path: &Path) -> Result<bool, String> {
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)
            .map(|()| true)
            .map_err(|error| format!("Failed to remove session at {}: {}", path.display(), error))
    }
}
