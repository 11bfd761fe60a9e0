//! Integration tests for archive export, backup and extraction.

use std::fs;

use logkeeper::archive::{archive_file, backup_documents, extract_entry, list_entries};
use logkeeper::config::{MonitorConfig, Settings};
use logkeeper::session::MonitorSession;
use tempfile::TempDir;

#[test]
fn test_backup_of_session_documents() {
    let dir = TempDir::new().unwrap();
    let config = MonitorConfig {
        data_dir: Some(dir.path().join("data")),
        wake_on_change: false,
        ..Default::default()
    };
    let log = dir.path().join("app.log");
    fs::write(&log, "x\n").unwrap();

    let mut session = MonitorSession::open(config.clone()).unwrap();
    session.add_bookmark(&log).unwrap();

    let dest = dir.path().join("backup.zip");
    let documents = [config.settings_path(), config.bookmarks_path()];
    let report = backup_documents(&documents, &dest).unwrap();
    assert_eq!(report.included, vec!["bookmarks.json".to_string()]);
    assert_eq!(report.skipped, vec![config.settings_path()]);

    let mut settings = Settings::default();
    settings.set_default_log_directory(dir.path());
    settings.save(&config.settings_path()).unwrap();
    let report = backup_documents(&documents, &dest).unwrap();
    assert!(report.is_complete());
    assert_eq!(
        list_entries(&dest).unwrap(),
        vec!["settings.json".to_string(), "bookmarks.json".to_string()]
    );
}

#[test]
fn test_archive_then_open_extracted() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("service.log");
    fs::write(&log, "started\nERROR failed to bind\n").unwrap();
    let zip = dir.path().join("service.zip");
    archive_file(&log, &zip).unwrap();

    let extracted = extract_entry(&zip, None, &dir.path().join("out")).unwrap();
    assert_eq!(extracted.file_name().unwrap(), "service.log");

    let config = MonitorConfig {
        data_dir: Some(dir.path().join("data")),
        wake_on_change: false,
        ..Default::default()
    };
    let mut session = MonitorSession::open(config).unwrap();
    let loaded = session.select_file(&extracted).unwrap();
    assert_eq!(&*loaded.text, "started\nERROR failed to bind\n");
    assert_eq!(
        session.analyze_errors().unwrap().lines(),
        ["ERROR failed to bind"]
    );
}
