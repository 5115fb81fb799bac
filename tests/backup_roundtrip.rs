//! Backup lifecycle without external tools: staging, archiving, listing,
//! and retention over a temporary tree. The database dump itself needs a
//! live PostgreSQL and its client tools, so it stays out of scope here.

use chrono::{Duration, TimeZone, Utc};
use std::fs;
use std::path::Path;

use hotel_ops::backup::manifest::BackupManifest;
use hotel_ops::backup::retention::{select_for_deletion, RetentionPolicy};
use hotel_ops::backup::{
    backup_file_name, copy_dir_all, find_staging_root, list_backups, pack_archive,
    replace_dir_contents, unpack_archive,
};

fn stage_tree(staging: &Path) {
    fs::create_dir_all(staging.join("files")).unwrap();
    fs::create_dir_all(staging.join("ml_models")).unwrap();
    fs::write(staging.join("database.dump"), b"-- dump --").unwrap();
    fs::write(staging.join("files/passport_scan.png"), b"img").unwrap();
    fs::write(staging.join("ml_models/occupancy_model.bin"), b"model").unwrap();

    let mut manifest = BackupManifest::new(Utc::now());
    manifest.database = Some("database.dump".to_string());
    manifest.files = Some("files".to_string());
    manifest.ml_models = Some("ml_models".to_string());
    manifest.write(staging).unwrap();
}

#[test]
fn archive_roundtrip_preserves_staged_tree() {
    let work = tempfile::tempdir().unwrap();
    let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    let staging = work.path().join("staging_20240501_120000");
    stage_tree(&staging);

    let archive = work.path().join(backup_file_name(ts));
    pack_archive(&staging, &archive).unwrap();
    fs::remove_dir_all(&staging).unwrap();

    // The artifact is discoverable and carries the embedded timestamp.
    let listed = list_backups(work.path()).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].created_at, ts);
    assert!(listed[0].size_bytes > 0);

    // Extraction finds the staged tree through the manifest.
    let extracted = work.path().join("extracted");
    unpack_archive(&archive, &extracted).unwrap();
    let root = find_staging_root(&extracted).unwrap();

    let manifest = BackupManifest::read(&root).unwrap();
    assert_eq!(manifest.captured(), vec!["database", "files", "ml_models"]);
    assert_eq!(fs::read(root.join("database.dump")).unwrap(), b"-- dump --");
    assert!(root.join("files/passport_scan.png").exists());
}

#[test]
fn restore_replaces_destination_directories() {
    let work = tempfile::tempdir().unwrap();

    let staged_files = work.path().join("staged/files");
    fs::create_dir_all(&staged_files).unwrap();
    fs::write(staged_files.join("fresh.png"), b"fresh").unwrap();

    let live = work.path().join("uploads/ocr");
    fs::create_dir_all(&live).unwrap();
    fs::write(live.join("stale.png"), b"stale").unwrap();

    let copied = replace_dir_contents(&staged_files, &live).unwrap();
    assert_eq!(copied, 1);
    assert!(live.join("fresh.png").exists());
    assert!(!live.join("stale.png").exists());
}

#[test]
fn archive_without_manifest_is_rejected() {
    let work = tempfile::tempdir().unwrap();
    let staging = work.path().join("staging_x");
    fs::create_dir_all(&staging).unwrap();
    fs::write(staging.join("database.dump"), b"x").unwrap();

    let archive = work.path().join("bad.tar.gz");
    pack_archive(&staging, &archive).unwrap();

    let extracted = work.path().join("extracted");
    unpack_archive(&archive, &extracted).unwrap();
    assert!(find_staging_root(&extracted).is_err());
}

#[test]
fn retention_on_disk_listing() {
    let work = tempfile::tempdir().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

    // Four backups: two fresh, two past the 30-day threshold.
    for days_old in [1, 10, 35, 60] {
        let ts = now - Duration::days(days_old);
        fs::write(work.path().join(backup_file_name(ts)), b"backup").unwrap();
    }

    let listed = list_backups(work.path()).unwrap();
    assert_eq!(listed.len(), 4);

    let policy = RetentionPolicy::default();
    let doomed = select_for_deletion(&listed, &policy, now);
    let names: Vec<&str> = doomed.iter().map(|b| b.file_name.as_str()).collect();

    assert_eq!(doomed.len(), 2);
    assert!(names.contains(&backup_file_name(now - Duration::days(35)).as_str()));
    assert!(names.contains(&backup_file_name(now - Duration::days(60)).as_str()));

    // Deleting the selected artifacts leaves the fresh ones in place.
    for backup in &doomed {
        fs::remove_file(&backup.path).unwrap();
    }
    assert_eq!(list_backups(work.path()).unwrap().len(), 2);
}

#[test]
fn copy_dir_all_preserves_nesting() {
    let work = tempfile::tempdir().unwrap();
    let src = work.path().join("src");
    fs::create_dir_all(src.join("a/b")).unwrap();
    fs::write(src.join("top.txt"), b"1").unwrap();
    fs::write(src.join("a/mid.txt"), b"2").unwrap();
    fs::write(src.join("a/b/leaf.txt"), b"3").unwrap();

    let dst = work.path().join("dst");
    let copied = copy_dir_all(&src, &dst).unwrap();
    assert_eq!(copied, 3);
    assert_eq!(fs::read(dst.join("a/b/leaf.txt")).unwrap(), b"3");
}
