// tests/end_to_end.rs

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use filetime::{FileTime, set_file_mtime};
use tokio::sync::mpsc;

use world_backup::config::{BackupConfiguration, ConfigFile};
use world_backup::engine::{BackupGuard, Runtime, RuntimeEvent, RuntimeOptions, RunSummary, TriggerReason};
use world_backup::exec::RealExecutorBackend;
use world_backup::host::Session;
use world_backup::types::SelectionMode;
use world_backup_test_utils::builders::ConfigFileBuilder;
use world_backup_test_utils::fake_host::FakeHost;
use world_backup_test_utils::{init_tracing, with_timeout, write_file};

type TestResult = Result<(), Box<dyn Error>>;

fn server_tree(root: &Path, backup_dir: &str) {
    write_file(root, &format!("{backup_dir}/previous/level.dat"), "old");
    write_file(root, "server.log", "log");
    write_file(root, "world/level.dat", "level");
    write_file(root, "world/region/r.0.0.mca", "region");
    write_file(root, "plugins/A/a.yml", "a");
    write_file(root, "plugins/B/b.yml", "b");
}

async fn run_once(cfg: &ConfigFile) -> Result<(RunSummary, BackupGuard), Box<dyn Error>> {
    let backup_cfg = Arc::new(BackupConfiguration::from_config(cfg));
    let guard = BackupGuard::from_config(cfg);
    let (tx, rx) = mpsc::channel(16);
    let executor = RealExecutorBackend::new(Arc::clone(&backup_cfg), tx.clone());
    let host = FakeHost::new()
        .with_sessions(vec![Session::new("alex")])
        .with_regions(&["world"]);

    tx.send(RuntimeEvent::Tick {
        reason: TriggerReason::Manual,
    })
    .await?;

    let runtime = Runtime::new(backup_cfg, guard.clone(), host, executor, rx).with_options(
        RuntimeOptions {
            exit_when_idle: true,
            final_backup_on_shutdown: false,
        },
    );
    let summary = with_timeout(runtime.run()).await?;
    Ok((summary, guard))
}

fn entries_with_ext(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().map(|e| e == ext).unwrap_or(false))
        .collect();
    found.sort();
    found
}

fn zip_names(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    archive.file_names().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn allow_listed_extension_nested_in_zip() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    server_tree(dir.path(), "backuppath");
    let cfg = ConfigFileBuilder::new()
        .server_root(dir.path())
        .backup_path("backuppath")
        .extensions(SelectionMode::Allow, &["A"])
        .build();

    let (summary, guard) = run_once(&cfg).await?;
    assert_eq!(summary.succeeded, 1, "{summary:?}");
    assert!(!guard.is_in_progress());

    let backup_root = dir.path().join("backuppath");
    let zips = entries_with_ext(&backup_root, "zip");
    assert_eq!(zips.len(), 1);

    let names = zip_names(&zips[0]);
    assert!(names.contains(&"world/level.dat".to_string()), "{names:?}");
    assert!(names.contains(&"world/region/r.0.0.mca".to_string()));
    assert!(names.contains(&"plugins/A/a.yml".to_string()));
    assert!(!names.iter().any(|n| n.starts_with("backuppath")));
    assert!(!names.iter().any(|n| n.ends_with("server.log")));
    assert!(!names.iter().any(|n| n.starts_with("plugins/B")));

    // The staged copy is gone after a successful archive.
    let temp = backup_root.join("temp");
    let leftover = fs::read_dir(&temp).map(|r| r.count()).unwrap_or(0);
    assert_eq!(leftover, 0);
    Ok(())
}

#[tokio::test]
async fn split_uncompressed_run_writes_two_directories() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    server_tree(dir.path(), "backups");
    let cfg = ConfigFileBuilder::new()
        .server_root(dir.path())
        .zip(false)
        .split_extensions(true)
        .extensions(SelectionMode::Deny, &["B"])
        .date_format("job-%Y")
        .build();

    let (summary, _) = run_once(&cfg).await?;
    assert_eq!(summary.succeeded, 1, "{summary:?}");

    let backup_root = dir.path().join("backups");
    let job = fs::read_dir(&backup_root)?
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .find(|n| n.starts_with("job-"))
        .expect("full-tree artifact");

    let full = backup_root.join(&job);
    assert!(full.join("world/level.dat").is_file());
    assert!(!full.join("plugins").exists());
    assert!(!full.join("server.log").exists());

    let ext = backup_root.join("plugins").join(&job);
    assert!(ext.join("A/a.yml").is_file());
    assert!(!ext.join("B").exists());
    Ok(())
}

#[tokio::test]
async fn failed_job_is_reported_and_guard_released() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write_file(dir.path(), "world/level.dat", "level");
    // Staging below a regular file cannot be created.
    write_file(dir.path(), "not-a-dir", "x");
    let temp = dir.path().join("not-a-dir");
    let cfg = ConfigFileBuilder::new()
        .server_root(dir.path())
        .temp_folder(&temp.to_string_lossy())
        .build();

    let (summary, guard) = run_once(&cfg).await?;

    assert_eq!(summary.started, 1);
    assert_eq!(summary.failed, 1);
    assert!(!guard.is_in_progress());
    Ok(())
}

#[tokio::test]
async fn retention_prunes_oldest_artifacts() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    server_tree(dir.path(), "backups");
    let backup_root = dir.path().join("backups");
    fs::remove_dir_all(backup_root.join("previous"))?;

    let now = SystemTime::now();
    for (name, age_secs) in [("20200101-000000.zip", 3000), ("20200102-000000.zip", 2000)] {
        let path = backup_root.join(name);
        fs::write(&path, "zip")?;
        set_file_mtime(
            &path,
            FileTime::from_system_time(now - Duration::from_secs(age_secs)),
        )?;
    }

    let cfg = ConfigFileBuilder::new()
        .server_root(dir.path())
        .max_backups(2)
        .build();

    let (summary, _) = run_once(&cfg).await?;
    assert_eq!(summary.succeeded, 1, "{summary:?}");

    let zips = entries_with_ext(&backup_root, "zip");
    assert_eq!(zips.len(), 2, "{zips:?}");
    assert!(!backup_root.join("20200101-000000.zip").exists());
    assert!(backup_root.join("20200102-000000.zip").exists());
    Ok(())
}
