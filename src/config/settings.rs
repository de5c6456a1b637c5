//! settings.json：初始化向导写入的持久设置

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{CoreError, CoreResult};
use crate::infra::fs::{read_optional, write_atomic};

/// 持久设置（字段名与 UI 保持 camelCase）
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_path: Option<PathBuf>,
    #[serde(default)]
    pub setup_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_date: Option<DateTime<Utc>>,
}

impl Settings {
    /// 文件不存在时返回默认值
    pub async fn load(path: &Path) -> CoreResult<Self> {
        let Some(bytes) = read_optional(path)
            .await
            .map_err(|e| CoreError::store("Failed to read settings", path, e))?
        else {
            return Ok(Self::default());
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| CoreError::store("Failed to parse settings", path, e))
    }

    pub async fn save(&self, path: &Path) -> CoreResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::store("Failed to serialize settings", path, e))?;
        write_atomic(path, content)
            .await
            .map_err(|e| CoreError::store("Failed to write settings", path, e))?;
        info!(path = %path.display(), stack = ?self.stack, "Saved settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json")).await.unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn test_reads_wizard_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{
  "stack": "xampp",
  "projectsPath": "/home/dev/Sites",
  "configPath": "/home/dev/localhost-manager",
  "sslPath": "/home/dev/localhost-manager/ssl",
  "setupCompleted": true,
  "setupDate": "2024-11-02T10:15:00Z"
}"#,
        )
        .unwrap();

        let settings = Settings::load(&path).await.unwrap();
        assert_eq!(settings.stack.as_deref(), Some("xampp"));
        assert_eq!(settings.ssl_path, Some(PathBuf::from("/home/dev/localhost-manager/ssl")));
        assert!(settings.setup_completed);
        assert!(settings.setup_date.is_some());
    }

    #[tokio::test]
    async fn test_save_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("settings.json");
        let settings = Settings {
            stack: Some("mamp".to_string()),
            setup_completed: true,
            ..Settings::default()
        };

        settings.save(&path).await.unwrap();
        assert_eq!(Settings::load(&path).await.unwrap(), settings);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"setupCompleted\": true"));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Settings::load(&path).await,
            Err(CoreError::Store { .. })
        ));
    }
}
