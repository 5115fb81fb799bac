//! Age- and count-based retention for backup artifacts.
//!
//! An artifact is deleted when it is older than `max_age_days`, or when the
//! newest `max_count` artifacts already cover it. Selection is pure so the
//! policy can be tested without touching the filesystem.

use chrono::{DateTime, Utc};

use super::BackupInfo;
use crate::config::BackupConfig;

#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub max_age_days: i64,
    pub max_count: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age_days: 30,
            max_count: 10,
        }
    }
}

impl From<&BackupConfig> for RetentionPolicy {
    fn from(cfg: &BackupConfig) -> Self {
        Self {
            max_age_days: cfg.max_age_days,
            max_count: cfg.max_count,
        }
    }
}

/// Pick the artifacts to delete, oldest first. The newest `max_count`
/// survive unless they have exceeded `max_age_days`.
pub fn select_for_deletion<'a>(
    backups: &'a [BackupInfo],
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Vec<&'a BackupInfo> {
    let mut newest_first: Vec<&BackupInfo> = backups.iter().collect();
    newest_first.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut doomed: Vec<&BackupInfo> = newest_first
        .iter()
        .enumerate()
        .filter(|(idx, b)| b.age_days(now) > policy.max_age_days || *idx >= policy.max_count)
        .map(|(_, b)| *b)
        .collect();

    doomed.sort_by_key(|b| b.created_at);
    doomed
}
