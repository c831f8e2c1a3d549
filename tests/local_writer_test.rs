// Local directory writer tests
// Real files in a temp directory; modification times are set explicitly

use pretty_assertions::assert_eq;
use snapshot_agent::snapshot::{is_snapshot_name, SnapshotBlob};
use snapshot_agent::writer::{temp_file_name, LocalDirectoryWriter, SnapshotWriter, WriterError, WriterTarget};
use std::fs::File;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn seed_snapshot(dir: &Path, name: &str, modified: SystemTime) {
    let file = File::create(dir.join(name)).expect("create seed file");
    file.set_modified(modified).expect("set mtime");
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("entry").file_name().into_string().expect("utf-8 name"))
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_keeps_newest_two() {
    let dir = tempfile::tempdir().expect("temp dir");
    for ts in [100u64, 200, 300] {
        seed_snapshot(
            dir.path(),
            &format!("raft_snapshot-{}.snap", ts),
            UNIX_EPOCH + Duration::from_nanos(ts),
        );
    }

    let writer = LocalDirectoryWriter::new(dir.path(), 2);
    let report = writer
        .write_snapshot(&SnapshotBlob::new(&b"raft-data"[..], 400))
        .await
        .expect("write should succeed");

    assert_eq!(
        file_names(dir.path()),
        vec!["raft_snapshot-300.snap", "raft_snapshot-400.snap"]
    );
    assert_eq!(report.deleted.len(), 2);
    assert!(report.deleted[0].ends_with("raft_snapshot-100.snap"));
    assert!(report.deleted[1].ends_with("raft_snapshot-200.snap"));
    assert!(report.trim_errors.is_empty());
}

#[tokio::test]
async fn test_retain_zero_keeps_everything() {
    let dir = tempfile::tempdir().expect("temp dir");
    for ts in 1..=5u64 {
        seed_snapshot(
            dir.path(),
            &format!("raft_snapshot-{}.snap", ts),
            UNIX_EPOCH + Duration::from_secs(ts),
        );
    }

    let writer = LocalDirectoryWriter::new(dir.path(), 0);
    let report = writer
        .write_snapshot(&SnapshotBlob::new(&b"raft-data"[..], 6))
        .await
        .expect("write should succeed");

    assert_eq!(file_names(dir.path()).len(), 6);
    assert!(report.deleted.is_empty());
}

#[tokio::test]
async fn test_retention_follows_mtime_not_name() {
    let dir = tempfile::tempdir().expect("temp dir");
    // Name order and age disagree
    seed_snapshot(dir.path(), "raft_snapshot-900.snap", UNIX_EPOCH + Duration::from_secs(10));
    seed_snapshot(dir.path(), "raft_snapshot-100.snap", UNIX_EPOCH + Duration::from_secs(20));

    let writer = LocalDirectoryWriter::new(dir.path(), 2);
    writer
        .write_snapshot(&SnapshotBlob::new(&b"raft-data"[..], 1000))
        .await
        .expect("write should succeed");

    assert_eq!(
        file_names(dir.path()),
        vec!["raft_snapshot-100.snap", "raft_snapshot-1000.snap"]
    );
}

#[tokio::test]
async fn test_unrelated_files_are_never_deleted() {
    let dir = tempfile::tempdir().expect("temp dir");
    let old = UNIX_EPOCH + Duration::from_secs(1);
    seed_snapshot(dir.path(), "notes.txt", old);
    seed_snapshot(dir.path(), "raft_snapshot-latest.snap", old);
    seed_snapshot(dir.path(), "raft_snapshot-5.snap.partial", old);
    seed_snapshot(dir.path(), "raft_snapshot-5.snap", old);
    std::fs::create_dir(dir.path().join("raft_snapshot-6.snap")).expect("create dir");

    let writer = LocalDirectoryWriter::new(dir.path(), 1);
    let report = writer
        .write_snapshot(&SnapshotBlob::new(&b"raft-data"[..], 10))
        .await
        .expect("write should succeed");

    assert_eq!(report.deleted.len(), 1);
    assert_eq!(
        file_names(dir.path()),
        vec![
            "notes.txt",
            "raft_snapshot-10.snap",
            "raft_snapshot-5.snap.partial",
            "raft_snapshot-6.snap",
            "raft_snapshot-latest.snap",
        ]
    );
}

#[tokio::test]
async fn test_written_bytes_match_snapshot() {
    let dir = tempfile::tempdir().expect("temp dir");
    let target = dir.path().join("nested").join("snapshots");

    let writer = SnapshotWriter::from_target(WriterTarget::LocalDirectory {
        path: target.clone(),
        retain: 3,
    })
    .await
    .expect("local writer");

    let payload: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
    let report = writer
        .write_snapshot(&SnapshotBlob::new(payload.clone(), 1_700_000_000_000_000_000))
        .await
        .expect("write should succeed");

    let written = std::fs::read(target.join("raft_snapshot-1700000000000000000.snap")).expect("read back");
    assert_eq!(written, payload);
    assert!(report.location.ends_with("raft_snapshot-1700000000000000000.snap"));
    assert_eq!(writer.name(), format!("local:{}", target.display()));
}

#[tokio::test]
async fn test_unwritable_directory_is_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").expect("create file");

    let writer = LocalDirectoryWriter::new(blocker.join("snapshots"), 2);
    let err = writer
        .write_snapshot(&SnapshotBlob::new(&b"raft-data"[..], 1))
        .await
        .unwrap_err();

    assert!(matches!(err, WriterError::IoError(_)));
}

#[tokio::test]
async fn test_failed_write_leaves_no_snapshot_behind() {
    let dir = tempfile::tempdir().expect("temp dir");
    // A directory squatting on the final name makes the last step fail
    let squatter = dir.path().join("raft_snapshot-5.snap");
    std::fs::create_dir(&squatter).expect("create dir");
    std::fs::write(squatter.join("keep"), b"x").expect("fill dir");

    let writer = LocalDirectoryWriter::new(dir.path(), 2);
    let err = writer
        .write_snapshot(&SnapshotBlob::new(&b"raft-data"[..], 5))
        .await
        .unwrap_err();

    assert!(matches!(err, WriterError::IoError(_)));
    assert_eq!(file_names(dir.path()), vec!["raft_snapshot-5.snap"]);
    assert!(!dir.path().join(temp_file_name("raft_snapshot-5.snap")).exists());
}

#[tokio::test]
async fn test_cancelled_write_never_displaces_good_snapshots() {
    let dir = tempfile::tempdir().expect("temp dir");
    let writer = LocalDirectoryWriter::new(dir.path(), 2);

    writer
        .write_snapshot(&SnapshotBlob::new(&b"first-good"[..], 1))
        .await
        .expect("first write");

    let large = SnapshotBlob::new(vec![7u8; 64 * 1024 * 1024], 2);
    let interrupted = tokio::time::timeout(Duration::from_millis(1), writer.write_snapshot(&large))
        .await
        .is_err();

    writer
        .write_snapshot(&SnapshotBlob::new(&b"third-good"[..], 3))
        .await
        .expect("third write");

    let snapshots: Vec<(String, u64)> = file_names(dir.path())
        .into_iter()
        .filter(|name| is_snapshot_name(name))
        .map(|name| {
            let len = std::fs::metadata(dir.path().join(&name)).expect("metadata").len();
            (name, len)
        })
        .collect();

    if interrupted {
        assert_eq!(
            snapshots,
            vec![
                ("raft_snapshot-1.snap".to_string(), 10),
                ("raft_snapshot-3.snap".to_string(), 10),
            ]
        );
    } else {
        // Machine fast enough to finish: the full snapshot counts normally
        assert_eq!(
            snapshots,
            vec![
                ("raft_snapshot-2.snap".to_string(), 64 * 1024 * 1024),
                ("raft_snapshot-3.snap".to_string(), 10),
            ]
        );
    }
}

#[tokio::test]
async fn test_stale_partial_is_ignored_and_swept() {
    let dir = tempfile::tempdir().expect("temp dir");
    seed_snapshot(dir.path(), "raft_snapshot-1.snap", UNIX_EPOCH + Duration::from_secs(1));
    seed_snapshot(
        dir.path(),
        &temp_file_name("raft_snapshot-2.snap"),
        UNIX_EPOCH + Duration::from_secs(2),
    );

    let writer = LocalDirectoryWriter::new(dir.path(), 2);
    let report = writer
        .write_snapshot(&SnapshotBlob::new(&b"raft-data"[..], 3))
        .await
        .expect("write should succeed");

    assert!(report.deleted.is_empty());
    assert_eq!(
        file_names(dir.path()),
        vec!["raft_snapshot-1.snap", "raft_snapshot-3.snap"]
    );
}
