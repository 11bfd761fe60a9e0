//! Zip export, backup and extraction.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use super::error::ArchiveError;

/// Prefix of generated backup file names.
pub const BACKUP_PREFIX: &str = "logkeeper_backup";

/// Outcome of [`backup_documents`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupReport {
    /// Archive that was written.
    pub archive: PathBuf,
    /// Entry names written to the archive.
    pub included: Vec<String>,
    /// Documents that did not exist and were left out.
    pub skipped: Vec<PathBuf>,
}

impl BackupReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

fn options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated)
}

fn entry_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    )
}

/// Write `file` into a new zip at `dest`, stored under its base name.
///
/// # Errors
///
/// Returns `ArchiveError::SourceMissing` if `file` does not exist, or an
/// I/O or zip error if the archive cannot be written.
pub fn archive_file(file: &Path, dest: &Path) -> Result<(), ArchiveError> {
    if !file.is_file() {
        return Err(ArchiveError::SourceMissing(file.to_path_buf()));
    }

    let mut source = File::open(file)?;
    let mut zip = ZipWriter::new(File::create(dest)?);
    zip.start_file(entry_name(file), options())?;
    io::copy(&mut source, &mut zip)?;
    zip.finish()?;

    tracing::info!(
        file = %file.display(),
        archive = %dest.display(),
        "Archived file"
    );
    Ok(())
}

/// Bundle whichever of `documents` exist into a zip at `dest`.
///
/// Missing documents are skipped and reported, not treated as errors. Each
/// document is stored under its base name.
///
/// # Errors
///
/// Returns an I/O or zip error if the archive cannot be written or an
/// existing document cannot be read.
pub fn backup_documents(documents: &[PathBuf], dest: &Path) -> Result<BackupReport, ArchiveError> {
    let mut report = BackupReport {
        archive: dest.to_path_buf(),
        ..Default::default()
    };
    let mut zip = ZipWriter::new(File::create(dest)?);

    for document in documents {
        if !document.is_file() {
            tracing::debug!(document = %document.display(), "Backup skipping missing document");
            report.skipped.push(document.clone());
            continue;
        }
        let name = entry_name(document);
        zip.start_file(name.as_str(), options())?;
        io::copy(&mut File::open(document)?, &mut zip)?;
        report.included.push(name);
    }
    zip.finish()?;

    tracing::info!(
        archive = %dest.display(),
        included = report.included.len(),
        skipped = report.skipped.len(),
        "Backup written"
    );
    Ok(report)
}

/// `logkeeper_backup_YYYYMMDD.zip` for `date`.
#[must_use]
pub fn default_backup_name(date: NaiveDate) -> String {
    format!("{BACKUP_PREFIX}_{}.zip", date.format("%Y%m%d"))
}

/// Names of the file entries in `archive`, in archive order.
///
/// # Errors
///
/// Returns an I/O or zip error if the archive cannot be read.
pub fn list_entries(archive: &Path) -> Result<Vec<String>, ArchiveError> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    let mut names = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let entry = zip.by_index(i)?;
        if !entry.is_dir() {
            names.push(entry.name().to_string());
        }
    }
    Ok(names)
}

/// Extract one entry of `archive` into `dest_dir` and return its path.
///
/// With `entry` unset the first file entry is extracted.
///
/// # Errors
///
/// Returns `ArchiveError::EntryNotFound` if the entry does not exist (or the
/// archive has no files), `ArchiveError::UnsafeEntry` if its name would
/// leave `dest_dir`, or an I/O or zip error.
pub fn extract_entry(
    archive: &Path,
    entry: Option<&str>,
    dest_dir: &Path,
) -> Result<PathBuf, ArchiveError> {
    let name = match entry {
        Some(name) => name.to_string(),
        None => list_entries(archive)?
            .into_iter()
            .next()
            .ok_or_else(|| ArchiveError::EntryNotFound {
                archive: archive.to_path_buf(),
                entry: String::new(),
            })?,
    };

    let mut zip = ZipArchive::new(File::open(archive)?)?;
    let mut file = match zip.by_name(&name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ArchiveError::EntryNotFound {
                archive: archive.to_path_buf(),
                entry: name,
            })
        }
        Err(e) => return Err(e.into()),
    };
    let relative = file
        .enclosed_name()
        .ok_or_else(|| ArchiveError::UnsafeEntry(name.clone()))?;

    let target = dest_dir.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    io::copy(&mut file, &mut File::create(&target)?)?;

    tracing::info!(
        archive = %archive.display(),
        entry = %name,
        target = %target.display(),
        "Extracted archive entry"
    );
    Ok(target)
}
