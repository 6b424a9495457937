//! # echo-audit
//!
//! Append-only, hash-chained activity log for Echo.
//!
//! Every authorization decision (and every change of the authority in force)
//! is written as an [`ActivityRecord`] to a JSONL file. Each line carries the
//! SHA-256 of the line before it, so [`ActivityLog::verify_chain`] detects
//! insertion, deletion or modification.
//!
//! ```rust,no_run
//! use echo_audit::{ActivityLog, ActivityRecord, RecordKind};
//!
//! let mut log = ActivityLog::open("/tmp/activity.jsonl").unwrap();
//! let mut record = ActivityRecord::lifecycle(RecordKind::PolicyCleared, "cleared by user");
//! log.append(&mut record).unwrap();
//! ```

pub mod error;
pub mod hasher;
pub mod log;
pub mod record;

pub use error::AuditError;
pub use log::ActivityLog;
pub use record::{ActivityRecord, RecordKind};
