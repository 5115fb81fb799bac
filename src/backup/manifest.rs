use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::OpsError;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Describes what a backup archive contains. Written into the staging tree
/// before packing; required when restoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    pub backup_date: DateTime<Utc>,
    pub toolkit_version: String,
    /// File name of the database dump, when the database was captured.
    pub database: Option<String>,
    /// Directory name of the uploaded-files copy, when captured.
    pub files: Option<String>,
    /// Directory name of the ML model copy, when captured.
    pub ml_models: Option<String>,
    /// Directory name of the application-data copy, when captured.
    pub data: Option<String>,
}

impl BackupManifest {
    pub fn new(backup_date: DateTime<Utc>) -> Self {
        Self {
            backup_date,
            toolkit_version: env!("CARGO_PKG_VERSION").to_string(),
            database: None,
            files: None,
            ml_models: None,
            data: None,
        }
    }

    /// Names of the components this backup captured.
    pub fn captured(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.database.is_some() {
            out.push("database");
        }
        if self.files.is_some() {
            out.push("files");
        }
        if self.ml_models.is_some() {
            out.push("ml_models");
        }
        if self.data.is_some() {
            out.push("data");
        }
        out
    }

    pub fn write(&self, dir: &Path) -> anyhow::Result<()> {
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn read(dir: &Path) -> Result<Self, OpsError> {
        let path = dir.join(MANIFEST_FILE);
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| OpsError::InvalidBackup(format!("manifest not readable: {e}")))?;
        serde_json::from_str(&raw)
            .map_err(|e| OpsError::InvalidBackup(format!("manifest not parseable: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = BackupManifest::new(Utc::now());
        manifest.database = Some("database.dump".to_string());
        manifest.ml_models = Some("ml_models".to_string());

        manifest.write(dir.path()).unwrap();
        let loaded = BackupManifest::read(dir.path()).unwrap();

        assert_eq!(loaded.database.as_deref(), Some("database.dump"));
        assert_eq!(loaded.files, None);
        assert_eq!(loaded.captured(), vec!["database", "ml_models"]);
    }

    #[test]
    fn test_missing_manifest_is_invalid_backup() {
        let dir = tempfile::tempdir().unwrap();
        let err = BackupManifest::read(dir.path()).unwrap_err();
        assert!(matches!(err, OpsError::InvalidBackup(_)));
    }

    #[test]
    fn test_garbage_manifest_is_invalid_backup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "not json").unwrap();
        let err = BackupManifest::read(dir.path()).unwrap_err();
        assert!(matches!(err, OpsError::InvalidBackup(_)));
    }
}
