//! Zip archives of log files and of the persisted documents.

mod bundle;
mod error;

pub use bundle::{
    archive_file, backup_documents, default_backup_name, extract_entry, list_entries,
    BackupReport, BACKUP_PREFIX,
};
pub use error::ArchiveError;
