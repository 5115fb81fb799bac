//! System backup orchestration.
//!
//! A backup is a `hotel_system_backup_<timestamp>.tar.gz` artifact holding a
//! database dump, copies of the upload/model/data directories, and a
//! manifest. Creation stages everything under a temporary directory inside
//! the backup dir, packs it, and always removes the staging tree.

pub mod manifest;
pub mod retention;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::db;
use crate::error::OpsError;
use self::manifest::BackupManifest;
use self::retention::RetentionPolicy;

pub const BACKUP_PREFIX: &str = "hotel_system_backup_";
pub const BACKUP_SUFFIX: &str = ".tar.gz";
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const FILES_DIR: &str = "files";
const MODELS_DIR: &str = "ml_models";
const DATA_DIR: &str = "data";

/// One backup artifact on disk.
#[derive(Debug, Clone)]
pub struct BackupInfo {
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl BackupInfo {
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }
}

/// Which components `restore` should leave untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOptions {
    pub skip_database: bool,
    pub skip_files: bool,
    pub skip_models: bool,
}

/// What a restore actually put back.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreReport {
    pub database: bool,
    pub files: u64,
    pub ml_models: u64,
    pub data: u64,
}

pub fn backup_file_name(ts: DateTime<Utc>) -> String {
    format!(
        "{BACKUP_PREFIX}{}{BACKUP_SUFFIX}",
        ts.format(TIMESTAMP_FORMAT)
    )
}

/// Timestamp embedded in a backup file name, when the name matches the
/// naming scheme and carries a well-formed timestamp.
pub fn parse_backup_file_name(name: &str) -> Option<DateTime<Utc>> {
    let ts = name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_SUFFIX)?;
    NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT)
        .ok()
        .map(|n| n.and_utc())
}

pub struct BackupService {
    cfg: Config,
}

impl BackupService {
    pub fn new(cfg: &Config) -> Self {
        Self { cfg: cfg.clone() }
    }

    fn backup_dir(&self) -> &Path {
        self.cfg.paths.backup_dir.as_path()
    }

    /// Full system backup: probe connectivity, dump the database, stage
    /// directory copies, write the manifest, pack the archive.
    pub async fn create(&self) -> Result<PathBuf> {
        if !self.cfg.backup.enabled {
            anyhow::bail!("backups are disabled in configuration");
        }

        db::probe_with_retry(&self.cfg.database).await?;

        let now = Utc::now();
        fs::create_dir_all(self.backup_dir())
            .with_context(|| format!("cannot create {}", self.backup_dir().display()))?;

        let staging = self
            .backup_dir()
            .join(format!("staging_{}", now.format(TIMESTAMP_FORMAT)));
        fs::create_dir_all(&staging)?;

        let populated = self.populate_staging(&staging, now).await;
        let packed = match populated {
            Ok(()) => {
                let path = self.backup_dir().join(backup_file_name(now));
                pack_archive(&staging, &path).map(|()| path)
            }
            Err(e) => Err(e),
        };

        if let Err(e) = fs::remove_dir_all(&staging) {
            warn!(path = %staging.display(), error = %e, "failed to remove staging directory");
        }

        let path = packed?;
        let size_bytes = fs::metadata(&path)?.len();
        info!(path = %path.display(), size_bytes, "backup created");
        Ok(path)
    }

    async fn populate_staging(&self, staging: &Path, now: DateTime<Utc>) -> Result<()> {
        let mut manifest = BackupManifest::new(now);

        let dump_path = staging.join(db::DUMP_FILE_NAME);
        db::dump(&self.cfg.database, &dump_path).await?;
        manifest.database = Some(db::DUMP_FILE_NAME.to_string());

        manifest.files = stage_dir(
            &self.cfg.paths.ocr_upload_dir,
            &staging.join(FILES_DIR),
            FILES_DIR,
        )?;
        manifest.ml_models = stage_dir(
            &self.cfg.paths.ml_model_dir,
            &staging.join(MODELS_DIR),
            MODELS_DIR,
        )?;
        manifest.data = stage_dir(&self.cfg.paths.data_dir, &staging.join(DATA_DIR), DATA_DIR)?;

        manifest.write(staging)?;
        Ok(())
    }

    /// Backups in the backup directory, newest first. Files outside the
    /// naming scheme are ignored; a missing directory yields an empty list.
    pub fn list(&self) -> Result<Vec<BackupInfo>> {
        list_backups(self.backup_dir())
    }

    /// Restore a backup archive, skipping components per `opts`.
    pub async fn restore(&self, archive: &Path, opts: &RestoreOptions) -> Result<RestoreReport> {
        if !archive.exists() {
            return Err(OpsError::BackupNotFound(archive.display().to_string()).into());
        }

        let temp = self
            .backup_dir()
            .join(format!("restore_{}", Utc::now().format(TIMESTAMP_FORMAT)));
        fs::create_dir_all(&temp)?;

        let result = self.restore_from(archive, &temp, opts).await;

        if let Err(e) = fs::remove_dir_all(&temp) {
            warn!(path = %temp.display(), error = %e, "failed to remove extraction directory");
        }

        result
    }

    async fn restore_from(
        &self,
        archive: &Path,
        temp: &Path,
        opts: &RestoreOptions,
    ) -> Result<RestoreReport> {
        unpack_archive(archive, temp)?;
        let root = find_staging_root(temp)?;
        let manifest = BackupManifest::read(&root)?;

        let mut report = RestoreReport::default();

        if !opts.skip_database {
            if let Some(dump_name) = &manifest.database {
                db::restore(&self.cfg.database, &root.join(dump_name)).await?;
                report.database = true;
            }
        }

        if !opts.skip_files {
            if let Some(dir) = &manifest.files {
                report.files =
                    replace_dir_contents(&root.join(dir), &self.cfg.paths.ocr_upload_dir)?;
            }
            if let Some(dir) = &manifest.data {
                report.data = replace_dir_contents(&root.join(dir), &self.cfg.paths.data_dir)?;
            }
        }

        if !opts.skip_models {
            if let Some(dir) = &manifest.ml_models {
                report.ml_models =
                    replace_dir_contents(&root.join(dir), &self.cfg.paths.ml_model_dir)?;
            }
        }

        info!(
            archive = %archive.display(),
            components = ?manifest.captured(),
            "backup restored"
        );
        Ok(report)
    }

    /// Delete one backup artifact by file name.
    pub fn delete(&self, file_name: &str) -> Result<(), OpsError> {
        let known = list_backups(self.backup_dir())
            .map_err(|e| OpsError::InvalidBackup(e.to_string()))?
            .into_iter()
            .find(|b| b.file_name == file_name)
            .ok_or_else(|| OpsError::BackupNotFound(file_name.to_string()))?;

        fs::remove_file(&known.path)
            .map_err(|e| OpsError::InvalidBackup(format!("cannot delete {file_name}: {e}")))?;
        info!(file_name, "backup deleted");
        Ok(())
    }

    /// Apply the retention policy; returns the number of artifacts deleted.
    /// Individual deletion failures are logged and skipped.
    pub fn prune(&self, now: DateTime<Utc>) -> Result<usize> {
        let backups = self.list()?;
        let policy = RetentionPolicy::from(&self.cfg.backup);
        let doomed = retention::select_for_deletion(&backups, &policy, now);

        let mut deleted = 0;
        for backup in doomed {
            match fs::remove_file(&backup.path) {
                Ok(()) => {
                    info!(file_name = %backup.file_name, "deleted old backup");
                    deleted += 1;
                }
                Err(e) => {
                    warn!(file_name = %backup.file_name, error = %e, "failed to delete backup");
                }
            }
        }
        Ok(deleted)
    }
}

/// Scan a directory for backup artifacts, newest first.
pub fn list_backups(dir: &Path) -> Result<Vec<BackupInfo>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut backups = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(BACKUP_PREFIX) || !name.ends_with(BACKUP_SUFFIX) {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }

        // Names that match the scheme but carry a mangled timestamp fall
        // back to the file's modification time.
        let created_at = parse_backup_file_name(&name)
            .or_else(|| meta.modified().ok().map(DateTime::<Utc>::from))
            .unwrap_or_else(Utc::now);

        backups.push(BackupInfo {
            file_name: name,
            path: entry.path(),
            size_bytes: meta.len(),
            created_at,
        });
    }

    backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(backups)
}

/// Pack a staging directory into a gzip-compressed tar archive. The staging
/// directory's own name becomes the archive's top-level entry.
pub fn pack_archive(staging: &Path, dest: &Path) -> Result<()> {
    let inner = staging
        .file_name()
        .and_then(|n| n.to_str())
        .context("staging path has no usable name")?;

    let file = File::create(dest)
        .with_context(|| format!("cannot create archive {}", dest.display()))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(inner, staging)?;
    builder.into_inner()?.finish()?;
    Ok(())
}

/// Unpack an archive into `dest`.
pub fn unpack_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)
        .with_context(|| format!("cannot open archive {}", archive.display()))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.unpack(dest)
        .with_context(|| format!("cannot extract {}", archive.display()))?;
    Ok(())
}

/// Locate the staged tree inside an extracted archive: either the extraction
/// root itself or a single top-level directory holding the manifest.
pub fn find_staging_root(extracted: &Path) -> Result<PathBuf, OpsError> {
    if extracted.join(manifest::MANIFEST_FILE).exists() {
        return Ok(extracted.to_path_buf());
    }
    for entry in fs::read_dir(extracted)
        .map_err(|e| OpsError::InvalidBackup(format!("cannot scan extraction dir: {e}")))?
    {
        let entry = entry.map_err(|e| OpsError::InvalidBackup(e.to_string()))?;
        let path = entry.path();
        if path.is_dir() && path.join(manifest::MANIFEST_FILE).exists() {
            return Ok(path);
        }
    }
    Err(OpsError::InvalidBackup(
        "no manifest found in archive".to_string(),
    ))
}

/// Copy a source directory into the staging tree when it exists and is
/// non-empty. Returns the staged directory name for the manifest.
fn stage_dir(src: &Path, dest: &Path, label: &str) -> Result<Option<String>> {
    if !src.exists() {
        warn!(path = %src.display(), "skipping {label}: directory missing");
        return Ok(None);
    }
    if fs::read_dir(src)?.next().is_none() {
        warn!(path = %src.display(), "skipping {label}: directory empty");
        return Ok(None);
    }

    let copied = copy_dir_all(src, dest)?;
    info!(files = copied, from = %src.display(), "staged {label}");
    Ok(Some(label.to_string()))
}

/// Recursively copy `src` into `dst`, returning the number of files copied.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<u64> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_dir_all(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Clear `dst` and copy `src` into it, returning the number of files copied.
pub fn replace_dir_contents(src: &Path, dst: &Path) -> Result<u64> {
    if dst.exists() {
        for entry in fs::read_dir(dst)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
        }
    }
    copy_dir_all(src, dst)
}
