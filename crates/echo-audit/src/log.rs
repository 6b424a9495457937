// log.rs — Append-only JSONL activity log with a hash chain.
//
// One JSON record per line. Each record's `previous_hash` is the SHA-256 of
// the preceding raw line, so inserting, deleting or editing any line breaks
// the chain and `verify_chain` reports where.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::AuditError;
use crate::hasher;
use crate::record::ActivityRecord;

/// An append-only activity log backed by a JSONL file.
pub struct ActivityLog {
    writer: BufWriter<File>,
    path: PathBuf,
    /// Hash of the last line written, for the next record's `previous_hash`.
    last_hash: Option<String>,
}

impl ActivityLog {
    /// Open (or create) a log, recovering the chain head from existing content.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| AuditError::OpenFailed {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let last_hash = if path.exists() {
            Self::read_last_hash(&path)?
        } else {
            None
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(path = %path.display(), resumed = last_hash.is_some(), "activity log opened");
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            last_hash,
        })
    }

    /// Append a record, linking it to the previous one. Flushes before returning.
    pub fn append(&mut self, record: &mut ActivityRecord) -> Result<(), AuditError> {
        record.previous_hash = self.last_hash.clone();
        let json = serde_json::to_string(record)?;
        self.last_hash = Some(hasher::hash_str(&json));
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        Ok(())
    }

    /// All records, oldest first. Blank lines are skipped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<ActivityRecord>, AuditError> {
        let reader = open_reader(path.as_ref())?;
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    /// The last `n` records, oldest first. A missing log has no records.
    pub fn tail(path: impl AsRef<Path>, n: usize) -> Result<Vec<ActivityRecord>, AuditError> {
        if !path.as_ref().exists() {
            return Ok(Vec::new());
        }
        let mut records = Self::read_all(path)?;
        let skip = records.len().saturating_sub(n);
        Ok(records.split_off(skip))
    }

    /// Verify the hash chain. Returns the number of records checked.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<usize, AuditError> {
        let reader = open_reader(path.as_ref())?;
        let mut previous_hash: Option<String> = None;
        let mut count = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: ActivityRecord = serde_json::from_str(&line)?;
            if record.previous_hash != previous_hash {
                tracing::warn!(line = line_num + 1, "activity log hash chain broken");
                return Err(AuditError::IntegrityViolation {
                    line: line_num + 1,
                    expected: previous_hash.unwrap_or_else(|| "None".to_string()),
                    actual: record.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }
            // Hash the raw line: re-serializing could reorder fields.
            previous_hash = Some(hasher::hash_str(&line));
            count += 1;
        }

        Ok(count)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_last_hash(path: &Path) -> Result<Option<String>, AuditError> {
        let reader = open_reader(path)?;
        let mut last_line: Option<String> = None;
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                last_line = Some(line);
            }
        }
        Ok(last_line.map(|line| hasher::hash_str(&line)))
    }
}

fn open_reader(path: &Path) -> Result<BufReader<File>, AuditError> {
    let file = File::open(path).map_err(|source| AuditError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}
